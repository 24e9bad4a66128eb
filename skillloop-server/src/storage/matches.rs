use chrono::Utc;
use diesel::prelude::*;
use skillloop_shared::domain::MatchStatus;
use tracing::info;

use super::models::{Match, NewMatch};
use super::{StorageError, Store, schema, user_exists};

impl Store {
    pub async fn create_match(
        &self,
        requester: &str,
        matched_user: &str,
        skill: Option<&str>,
    ) -> Result<Match, StorageError> {
        use schema::matches::dsl as m;
        if requester == matched_user {
            return Err(StorageError::InvalidInput(
                "cannot create a match with yourself".into(),
            ));
        }
        let requester = requester.to_string();
        let matched = matched_user.to_string();
        let skill = skill.map(|s| s.to_string());
        self.write_tx(move |conn| {
            if !user_exists(conn, &matched)? {
                return Err(StorageError::InvalidInput(format!(
                    "unknown matched_user_id: {}",
                    matched
                )));
            }
            let now = Utc::now().naive_utc();
            let id = uuid::Uuid::new_v4().to_string();
            let row = NewMatch {
                id: &id,
                user_id: &requester,
                matched_user_id: &matched,
                skill: skill.as_deref(),
                status: MatchStatus::Pending.as_str(),
                created_at: now,
                updated_at: now,
            };
            Ok(diesel::insert_into(m::matches)
                .values(&row)
                .get_result::<Match>(conn)?)
        })
        .await
    }

    pub async fn list_matches_for_user(&self, user_id: &str) -> Result<Vec<Match>, StorageError> {
        use schema::matches::dsl as m;
        let uid = user_id.to_string();
        self.read(move |conn| {
            Ok(m::matches
                .filter(m::user_id.eq(&uid))
                .order(m::created_at.desc())
                .load::<Match>(conn)?)
        })
        .await
    }

    /// Resolves a match owned by `owner`. Re-applying the current status is a
    /// no-op; pending is the only state that may change.
    pub async fn set_match_status(
        &self,
        match_id: &str,
        owner: &str,
        next: MatchStatus,
    ) -> Result<Match, StorageError> {
        use schema::matches::dsl as m;
        let mid = match_id.to_string();
        let owner = owner.to_string();
        self.write_tx(move |conn| {
            let current = m::matches
                .filter(m::id.eq(&mid))
                .filter(m::user_id.eq(&owner))
                .first::<Match>(conn)
                .optional()?
                .ok_or_else(|| StorageError::NotFound("Match not found".to_string()))?;
            let status: MatchStatus = current
                .status
                .parse()
                .map_err(|e: skillloop_shared::domain::ParseEnumError| {
                    StorageError::InvalidState(e.to_string())
                })?;
            if !status.can_transition_to(next) {
                return Err(StorageError::InvalidState(format!(
                    "Match already {}",
                    status
                )));
            }
            if status == next {
                return Ok(current);
            }
            let updated = diesel::update(m::matches.filter(m::id.eq(&mid)))
                .set((m::status.eq(next.as_str()), m::updated_at.eq(Utc::now().naive_utc())))
                .get_result::<Match>(conn)?;
            info!(match_id = %mid, owner = %owner, status = %next, "matches: status changed");
            Ok(updated)
        })
        .await
    }
}
