use std::sync::Arc;

use axum::http::{Request, header};
use axum::middleware::Next;
use axum::response::Response;
use skillloop_shared::auth::Principal;
use skillloop_shared::jwt;
use tracing::{error, warn};

use super::config::{AuthConfig, SharedSecretConfig};
use super::jwks::JwksVerifier;
use super::{AppError, AppState};

#[derive(Clone, Debug)]
pub struct AuthCtx {
    pub principal: Principal,
    /// Local user id the principal resolved to.
    pub user_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error(transparent)]
    Jwt(#[from] jwt::JwtError),
    #[error("signing key unavailable: {0}")]
    KeyFetch(String),
    #[error("no signing key for kid {0}")]
    UnknownKey(String),
    #[error("token header: {0}")]
    Header(String),
}

/// Turns a bearer token into a verified [`Principal`].
#[async_trait::async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Principal, VerifyError>;
}

pub struct SharedSecretVerifier {
    cfg: SharedSecretConfig,
}

impl SharedSecretVerifier {
    pub fn new(cfg: SharedSecretConfig) -> Self {
        Self { cfg }
    }
}

#[async_trait::async_trait]
impl TokenVerifier for SharedSecretVerifier {
    async fn verify(&self, token: &str) -> Result<Principal, VerifyError> {
        let claims = jwt::decode_and_verify(
            token,
            self.cfg.secret.as_bytes(),
            self.cfg.issuer.as_deref(),
            self.cfg.audience.as_deref(),
        )?;
        Ok(claims.into_principal())
    }
}

pub fn verifier_from_config(cfg: &AuthConfig) -> Result<Arc<dyn TokenVerifier>, VerifyError> {
    Ok(match cfg {
        AuthConfig::Jwks(j) => Arc::new(JwksVerifier::new(j.clone())?),
        AuthConfig::SharedSecret(s) => Arc::new(SharedSecretVerifier::new(s.clone())),
    })
}

pub async fn require_bearer(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AppError> {
    let unauthorized = || Err(AppError::unauthorized());
    let header_val = match req.headers().get(header::AUTHORIZATION) {
        Some(v) => v,
        None => return unauthorized(),
    };
    let header_str = header_val.to_str().map_err(|_| AppError::unauthorized())?;
    let prefix = "Bearer ";
    if !header_str.starts_with(prefix) {
        return unauthorized();
    }
    let token = header_str[prefix.len()..].trim();
    if token.is_empty() {
        return unauthorized();
    }

    let principal = match state.verifier.verify(token).await {
        Ok(p) => p,
        Err(e) => {
            warn!(error=%e, "auth: token verification failed");
            return Err(AppError::forbidden());
        }
    };

    let user = state.store.ensure_user(&principal).await.map_err(|e| {
        error!(subject=%principal.subject, error=%e, "auth: ensure_user failed");
        AppError::internal(e)
    })?;

    let auth = AuthCtx {
        principal,
        user_id: user.id,
    };
    req.extensions_mut().insert(auth);
    Ok(next.run(req).await)
}
