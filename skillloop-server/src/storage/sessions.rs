use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use skillloop_shared::domain::{self, SessionStatus, SessionType};
use tracing::{debug, info};

use super::ledger::append_credit;
use super::models::{NewSession, Session, SessionChangeset};
use super::{StorageError, Store, schema, user_exists};

/// Fields for a new session; the organizer comes from the caller.
#[derive(Debug, Clone)]
pub struct SessionDraft {
    pub title: String,
    pub description: Option<String>,
    pub session_type: SessionType,
    pub duration: i32,
    pub scheduled_at: Option<NaiveDateTime>,
    pub participant_id: Option<String>,
}

/// Outcome of [`Store::complete_session`].
#[derive(Debug, Clone)]
pub struct Completion {
    pub session: Session,
    /// Credits granted to the organizer, `None` for non-teaching sessions.
    pub credits_earned: Option<i32>,
}

fn not_found() -> StorageError {
    StorageError::NotFound("Session not found".to_string())
}

/// Session visible to `actor` as organizer or participant.
fn find_for_party(
    conn: &mut SqliteConnection,
    session_id: &str,
    actor: &str,
) -> QueryResult<Option<Session>> {
    use schema::sessions::dsl as s;
    s::sessions
        .filter(s::id.eq(session_id))
        .filter(s::user_id.eq(actor).or(s::participant_id.eq(actor)))
        .first::<Session>(conn)
        .optional()
}

fn find_for_owner(
    conn: &mut SqliteConnection,
    session_id: &str,
    owner: &str,
) -> QueryResult<Option<Session>> {
    use schema::sessions::dsl as s;
    s::sessions
        .filter(s::id.eq(session_id))
        .filter(s::user_id.eq(owner))
        .first::<Session>(conn)
        .optional()
}

fn check_participant(
    conn: &mut SqliteConnection,
    organizer: &str,
    participant: Option<&str>,
) -> Result<(), StorageError> {
    let Some(participant) = participant else {
        return Ok(());
    };
    if participant == organizer {
        return Err(StorageError::InvalidInput(
            "participant must differ from organizer".to_string(),
        ));
    }
    if !user_exists(conn, participant)? {
        return Err(StorageError::InvalidInput(format!(
            "unknown participant_id: {}",
            participant
        )));
    }
    Ok(())
}

/// Recomputes `user_id`'s average over every rated session they took part in.
fn recompute_rating(conn: &mut SqliteConnection, user_id: &str) -> Result<Option<f64>, StorageError> {
    use schema::sessions::dsl as s;
    use schema::users::dsl as u;
    let ratings: Vec<i32> = s::sessions
        .filter(s::user_id.eq(user_id).or(s::participant_id.eq(user_id)))
        .filter(s::rating.is_not_null())
        .select(s::rating)
        .load::<Option<i32>>(conn)?
        .into_iter()
        .flatten()
        .collect();
    let Some(avg) = domain::average_rating(&ratings) else {
        return Ok(None);
    };
    let updated = diesel::update(u::users.filter(u::id.eq(user_id)))
        .set((u::rating.eq(Some(avg)), u::updated_at.eq(Utc::now().naive_utc())))
        .execute(conn)?;
    if updated == 0 {
        return Ok(None);
    }
    debug!(user_id, rating = avg, count = ratings.len(), "sessions: rating recomputed");
    Ok(Some(avg))
}

impl Store {
    pub async fn create_session(
        &self,
        organizer: &str,
        draft: SessionDraft,
    ) -> Result<Session, StorageError> {
        use schema::sessions::dsl as s;
        if draft.title.trim().is_empty() {
            return Err(StorageError::InvalidInput("title must not be empty".into()));
        }
        if draft.duration <= 0 {
            return Err(StorageError::InvalidInput(
                "duration must be positive".into(),
            ));
        }
        let organizer = organizer.to_string();
        self.write_tx(move |conn| {
            check_participant(conn, &organizer, draft.participant_id.as_deref())?;
            let now = Utc::now().naive_utc();
            let id = uuid::Uuid::new_v4().to_string();
            let row = NewSession {
                id: &id,
                user_id: &organizer,
                participant_id: draft.participant_id.as_deref(),
                title: &draft.title,
                description: draft.description.as_deref(),
                session_type: draft.session_type.as_str(),
                status: SessionStatus::Scheduled.as_str(),
                duration: draft.duration,
                scheduled_at: draft.scheduled_at,
                created_at: now,
                updated_at: now,
            };
            Ok(diesel::insert_into(s::sessions)
                .values(&row)
                .get_result::<Session>(conn)?)
        })
        .await
    }

    /// Sessions where `user_id` is organizer or participant, newest first.
    pub async fn list_sessions_for_user(
        &self,
        user_id: &str,
        status: Option<SessionStatus>,
    ) -> Result<Vec<Session>, StorageError> {
        use schema::sessions::dsl as s;
        let uid = user_id.to_string();
        self.read(move |conn| {
            let mut query = s::sessions
                .filter(s::user_id.eq(uid.clone()).or(s::participant_id.eq(uid.clone())))
                .into_boxed();
            if let Some(st) = status {
                query = query.filter(s::status.eq(st.as_str()));
            }
            Ok(query.order(s::created_at.desc()).load::<Session>(conn)?)
        })
        .await
    }

    /// Completed sessions for `user_id`, most recently updated first.
    pub async fn session_history(&self, user_id: &str) -> Result<Vec<Session>, StorageError> {
        use schema::sessions::dsl as s;
        let uid = user_id.to_string();
        self.read(move |conn| {
            Ok(s::sessions
                .filter(s::user_id.eq(&uid).or(s::participant_id.eq(&uid)))
                .filter(s::status.eq(SessionStatus::Completed.as_str()))
                .order(s::updated_at.desc())
                .load::<Session>(conn)?)
        })
        .await
    }

    pub async fn update_session(
        &self,
        session_id: &str,
        owner: &str,
        changes: SessionChangeset,
    ) -> Result<Session, StorageError> {
        use schema::sessions::dsl as s;
        if changes.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(StorageError::InvalidInput("title must not be empty".into()));
        }
        if changes.duration.is_some_and(|d| d <= 0) {
            return Err(StorageError::InvalidInput(
                "duration must be positive".into(),
            ));
        }
        let sid = session_id.to_string();
        let owner = owner.to_string();
        self.write_tx(move |conn| {
            let session = find_for_owner(conn, &sid, &owner)?.ok_or_else(not_found)?;
            if session.rating.is_some() {
                return Err(StorageError::InvalidState(
                    "Rated sessions cannot be modified".to_string(),
                ));
            }
            if changes.is_empty() {
                return Ok(session);
            }
            check_participant(
                conn,
                &owner,
                changes.participant_id.as_ref().and_then(Option::as_deref),
            )?;
            let now = Utc::now().naive_utc();
            Ok(diesel::update(s::sessions.filter(s::id.eq(&sid)))
                .set((
                    &changes,
                    s::version.eq(s::version + 1),
                    s::updated_at.eq(now),
                ))
                .get_result::<Session>(conn)?)
        })
        .await
    }

    /// Moves a scheduled session to completed. Teaching sessions credit the
    /// organizer `duration / 15` and append a ledger row.
    pub async fn complete_session(
        &self,
        session_id: &str,
        actor: &str,
    ) -> Result<Completion, StorageError> {
        use schema::sessions::dsl as s;
        let sid = session_id.to_string();
        let actor = actor.to_string();
        self.write_tx(move |conn| {
            let session = find_for_party(conn, &sid, &actor)?.ok_or_else(not_found)?;
            if session.status != SessionStatus::Scheduled.as_str() {
                return Err(StorageError::InvalidState(
                    "Can only complete scheduled sessions".to_string(),
                ));
            }
            let now = Utc::now().naive_utc();
            let session = diesel::update(
                s::sessions
                    .filter(s::id.eq(&sid))
                    .filter(s::version.eq(session.version)),
            )
            .set((
                s::status.eq(SessionStatus::Completed.as_str()),
                s::version.eq(s::version + 1),
                s::updated_at.eq(now),
            ))
            .get_result::<Session>(conn)
            .optional()?
            .ok_or_else(|| StorageError::Conflict("Session changed concurrently".to_string()))?;

            let mut credits_earned = None;
            if session.session_type == SessionType::Teaching.as_str() {
                let earned = domain::credits_for_duration(session.duration);
                let description = format!("Earned from teaching session: {}", session.title);
                if append_credit(
                    conn,
                    &session.user_id,
                    &session.id,
                    earned,
                    domain::TX_EARNED,
                    &description,
                )?
                .is_some()
                {
                    credits_earned = Some(earned);
                }
            }
            info!(
                session_id = %session.id,
                actor = %actor,
                credits = ?credits_earned,
                "sessions: completed"
            );
            Ok(Completion {
                session,
                credits_earned,
            })
        })
        .await
    }

    /// Records the single rating for a completed session and refreshes the
    /// rated party's average.
    pub async fn rate_session(
        &self,
        session_id: &str,
        actor: &str,
        rating: i32,
        feedback: Option<String>,
    ) -> Result<Session, StorageError> {
        use schema::sessions::dsl as s;
        if !domain::rating_in_range(rating) {
            return Err(StorageError::InvalidInput(format!(
                "rating must be between {} and {}",
                domain::MIN_RATING,
                domain::MAX_RATING
            )));
        }
        let sid = session_id.to_string();
        let actor = actor.to_string();
        self.write_tx(move |conn| {
            let session = find_for_party(conn, &sid, &actor)?.ok_or_else(not_found)?;
            if session.status != SessionStatus::Completed.as_str() {
                return Err(StorageError::InvalidState(
                    "Can only rate completed sessions".to_string(),
                ));
            }
            if session.rating.is_some() {
                return Err(StorageError::Conflict("Session already rated".to_string()));
            }
            let now = Utc::now().naive_utc();
            // Version and null-rating guards make a lost race a conflict rather
            // than a silent overwrite.
            let rated = diesel::update(
                s::sessions
                    .filter(s::id.eq(&sid))
                    .filter(s::version.eq(session.version))
                    .filter(s::rating.is_null()),
            )
            .set((
                s::rating.eq(Some(rating)),
                s::feedback.eq(feedback.as_deref()),
                s::rated_by.eq(Some(actor.as_str())),
                s::version.eq(s::version + 1),
                s::updated_at.eq(now),
            ))
            .get_result::<Session>(conn)
            .optional()?
            .ok_or_else(|| StorageError::Conflict("Session already rated".to_string()))?;

            if let Some(rated_user) = session.counterpart_of(&actor) {
                recompute_rating(conn, rated_user)?;
            }
            info!(session_id = %rated.id, actor = %actor, rating, "sessions: rated");
            Ok(rated)
        })
        .await
    }

    pub async fn delete_session(&self, session_id: &str, owner: &str) -> Result<(), StorageError> {
        use schema::sessions::dsl as s;
        let sid = session_id.to_string();
        let owner = owner.to_string();
        self.write_tx(move |conn| {
            let deleted = diesel::delete(
                s::sessions
                    .filter(s::id.eq(&sid))
                    .filter(s::user_id.eq(&owner)),
            )
            .execute(conn)?;
            if deleted == 0 {
                return Err(not_found());
            }
            info!(session_id = %sid, owner = %owner, "sessions: deleted");
            Ok(())
        })
        .await
    }

    pub async fn get_session_for_party(
        &self,
        session_id: &str,
        actor: &str,
    ) -> Result<Session, StorageError> {
        let sid = session_id.to_string();
        let actor = actor.to_string();
        self.read(move |conn| find_for_party(conn, &sid, &actor)?.ok_or_else(not_found))
            .await
    }
}
