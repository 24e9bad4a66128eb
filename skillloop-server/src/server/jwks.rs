//! Verification against an identity provider's published JWKS.

use std::time::{Duration, Instant};

use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{DecodingKey, Validation, decode_header};
use skillloop_shared::auth::Principal;
use skillloop_shared::jwt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::auth::{TokenVerifier, VerifyError};
use super::config::JwksConfig;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

struct CachedKeys {
    keys: JwkSet,
    fetched_at: Instant,
}

pub struct JwksVerifier {
    cfg: JwksConfig,
    url: String,
    ttl: Duration,
    /// An unknown `kid` forces a refetch only once the cached set is this old.
    min_refresh: Duration,
    validation: Validation,
    http: reqwest::Client,
    cache: RwLock<Option<CachedKeys>>,
}

impl JwksVerifier {
    pub fn new(cfg: JwksConfig) -> Result<Self, VerifyError> {
        let http = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| VerifyError::KeyFetch(e.to_string()))?;
        let mut audiences = vec![cfg.api_audience.as_str()];
        if let Some(client_id) = cfg.client_id.as_deref() {
            audiences.push(client_id);
        }
        let validation = jwt::validation(&cfg.algorithms, Some(&cfg.issuer), &audiences);
        Ok(Self {
            url: cfg.jwks_url(),
            ttl: Duration::from_secs(cfg.jwks_cache_ttl_secs),
            min_refresh: Duration::from_secs(cfg.jwks_min_refresh_secs),
            validation,
            http,
            cache: RwLock::new(None),
            cfg,
        })
    }

    async fn fetch(&self) -> Result<JwkSet, VerifyError> {
        let res = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| VerifyError::KeyFetch(e.to_string()))?;
        let status = res.status();
        if !status.is_success() {
            return Err(VerifyError::KeyFetch(format!(
                "{} returned {}",
                self.url, status
            )));
        }
        let keys = res
            .json::<JwkSet>()
            .await
            .map_err(|e| VerifyError::KeyFetch(e.to_string()))?;
        info!(url = %self.url, keys = keys.keys.len(), "jwks: fetched signing keys");
        Ok(keys)
    }

    /// Cached key for `kid`. The set is refetched when it has expired, or
    /// when `kid` is unknown and the set is older than the refresh interval.
    async fn key_for(&self, kid: &str) -> Result<Jwk, VerifyError> {
        {
            let guard = self.cache.read().await;
            if let Some(cached) = guard.as_ref() {
                let age = cached.fetched_at.elapsed();
                if age < self.ttl {
                    if let Some(jwk) = cached.keys.find(kid) {
                        return Ok(jwk.clone());
                    }
                    if age < self.min_refresh {
                        return Err(VerifyError::UnknownKey(kid.to_string()));
                    }
                }
            }
        }

        let mut guard = self.cache.write().await;
        // Another request may have refreshed while we waited for the lock.
        if let Some(cached) = guard.as_ref()
            && cached.fetched_at.elapsed() < self.min_refresh.min(self.ttl)
        {
            return cached
                .keys
                .find(kid)
                .cloned()
                .ok_or_else(|| VerifyError::UnknownKey(kid.to_string()));
        }
        debug!(kid, domain = %self.cfg.domain, "jwks: refreshing key cache");
        let keys = self.fetch().await?;
        let found = keys.find(kid).cloned();
        *guard = Some(CachedKeys {
            keys,
            fetched_at: Instant::now(),
        });
        found.ok_or_else(|| {
            warn!(kid, "jwks: key not published by identity provider");
            VerifyError::UnknownKey(kid.to_string())
        })
    }
}

#[async_trait::async_trait]
impl TokenVerifier for JwksVerifier {
    async fn verify(&self, token: &str) -> Result<Principal, VerifyError> {
        let header = decode_header(token).map_err(|e| VerifyError::Header(e.to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| VerifyError::Header("missing kid".into()))?;
        let jwk = self.key_for(&kid).await?;
        let key = DecodingKey::from_jwk(&jwk).map_err(|e| VerifyError::Header(e.to_string()))?;
        let claims = jwt::decode_with(token, &key, &self.validation)?;
        Ok(claims.into_principal())
    }
}
