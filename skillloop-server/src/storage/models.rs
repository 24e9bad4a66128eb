use crate::storage::schema::{credit_transactions, matches, sessions, users};
use chrono::NaiveDateTime;
use diesel::prelude::*;

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: String,
    pub auth_subject: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub credits: i32,
    pub rating: Option<f64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub id: &'a str,
    pub auth_subject: &'a str,
    pub email: Option<&'a str>,
    pub display_name: Option<&'a str>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = matches)]
pub struct Match {
    pub id: String,
    pub user_id: String,
    pub matched_user_id: String,
    pub skill: Option<String>,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = matches)]
pub struct NewMatch<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub matched_user_id: &'a str,
    pub skill: Option<&'a str>,
    pub status: &'a str,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = sessions)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub participant_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub session_type: String,
    pub status: String,
    pub duration: i32,
    pub scheduled_at: Option<NaiveDateTime>,
    pub rating: Option<i32>,
    pub feedback: Option<String>,
    pub rated_by: Option<String>,
    pub version: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Session {
    /// The party on the other side of `rater`, if there is one.
    pub fn counterpart_of(&self, rater: &str) -> Option<&str> {
        if self.user_id == rater {
            self.participant_id.as_deref()
        } else {
            Some(self.user_id.as_str())
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = sessions)]
pub struct NewSession<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub participant_id: Option<&'a str>,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub session_type: &'a str,
    pub status: &'a str,
    pub duration: i32,
    pub scheduled_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Field-by-field session update. `None` leaves the column untouched; on the
/// nullable columns `Some(None)` writes NULL.
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = sessions)]
pub struct SessionChangeset {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub session_type: Option<String>,
    pub duration: Option<i32>,
    pub scheduled_at: Option<Option<NaiveDateTime>>,
    pub participant_id: Option<Option<String>>,
}

impl SessionChangeset {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.session_type.is_none()
            && self.duration.is_none()
            && self.scheduled_at.is_none()
            && self.participant_id.is_none()
    }
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable)]
#[diesel(table_name = credit_transactions)]
#[diesel(belongs_to(User, foreign_key = user_id))]
pub struct CreditTransaction {
    pub id: String,
    pub user_id: String,
    pub session_id: String,
    pub amount: i32,
    pub transaction_type: String,
    pub description: Option<String>,
    pub balance_after: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = credit_transactions)]
pub struct NewCreditTransaction<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub session_id: &'a str,
    pub amount: i32,
    pub transaction_type: &'a str,
    pub description: Option<&'a str>,
    pub balance_after: i32,
    pub created_at: NaiveDateTime,
}
