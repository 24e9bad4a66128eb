use serde::{Deserialize, Serialize};

use crate::domain::{MatchStatus, SessionStatus, SessionType};

pub mod endpoints;

pub const API_V1_PREFIX: &str = "/api/v1";

// Users
#[derive(Debug, Serialize, Deserialize)]
pub struct UserDto {
    pub id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub credits: i32,
    pub rating: Option<f64>,
}

// Matches
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateMatchReq {
    pub matched_user_id: String,
    pub skill: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MatchDto {
    pub id: String,
    pub user_id: String,
    pub matched_user_id: String,
    pub skill: Option<String>,
    pub status: MatchStatus,
    pub created_at: String, // RFC3339 UTC
    pub updated_at: String, // RFC3339 UTC
}

// Sessions
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSessionReq {
    pub title: String,
    pub description: Option<String>,
    pub session_type: SessionType,
    pub duration: i32,
    pub scheduled_at: Option<String>, // RFC3339
    pub participant_id: Option<String>,
}

/// Partial update; absent fields are left untouched. The nullable fields
/// take an explicit `null` to clear the stored value.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UpdateSessionReq {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_type: Option<SessionType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i32>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub scheduled_at: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub participant_id: Option<Option<String>>,
}

/// Absent stays `None` (via `default`); present-but-null becomes `Some(None)`.
fn nullable<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RateSessionReq {
    pub rating: i32,
    pub feedback: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionDto {
    pub id: String,
    pub user_id: String,
    pub participant_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub session_type: SessionType,
    pub status: SessionStatus,
    pub duration: i32,
    pub scheduled_at: Option<String>,
    pub rating: Option<i32>,
    pub feedback: Option<String>,
    pub rated_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionListQuery {
    pub status: Option<SessionStatus>,
}

// Credits
#[derive(Debug, Serialize, Deserialize)]
pub struct CreditTransactionDto {
    pub id: String,
    pub session_id: String,
    pub amount: i32,
    pub transaction_type: String,
    pub description: Option<String>,
    pub balance_after: i32,
    pub created_at: String,
}
