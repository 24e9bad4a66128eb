//! Append-only credit ledger. Rows are only ever inserted; balance changes and
//! their ledger entry are written by the same transaction.

use chrono::Utc;
use diesel::prelude::*;
use tracing::{info, warn};

use super::models::{CreditTransaction, NewCreditTransaction};
use super::{StorageError, Store, schema};

/// Credits `amount` to `user_id` and appends the matching ledger row with the
/// resulting balance. Must run inside the caller's transaction.
///
/// Returns `None` when the user row is gone; nothing is written in that case.
pub(crate) fn append_credit(
    conn: &mut SqliteConnection,
    user_id: &str,
    session_id: &str,
    amount: i32,
    transaction_type: &str,
    description: &str,
) -> Result<Option<CreditTransaction>, StorageError> {
    use schema::credit_transactions::dsl as ct;
    use schema::users::dsl as u;

    let now = Utc::now().naive_utc();
    let balance_after = diesel::update(u::users.filter(u::id.eq(user_id)))
        .set((u::credits.eq(u::credits + amount), u::updated_at.eq(now)))
        .returning(u::credits)
        .get_result::<i32>(conn)
        .optional()?;
    let Some(balance_after) = balance_after else {
        warn!(user_id, session_id, amount, "ledger: user missing, credit skipped");
        return Ok(None);
    };

    let id = uuid::Uuid::new_v4().to_string();
    let row = NewCreditTransaction {
        id: &id,
        user_id,
        session_id,
        amount,
        transaction_type,
        description: Some(description),
        balance_after,
        created_at: now,
    };
    let tx = diesel::insert_into(ct::credit_transactions)
        .values(&row)
        .get_result::<CreditTransaction>(conn)?;
    info!(
        user_id,
        session_id,
        amount,
        balance_after,
        transaction_type,
        "ledger: credit appended"
    );
    Ok(Some(tx))
}

const MAX_PAGE_SIZE: usize = 100;

impl Store {
    /// Ledger rows for `user_id`, newest first. `page` is 1-based; `per_page`
    /// is clamped to `1..=100`.
    pub async fn list_credit_transactions(
        &self,
        user_id: &str,
        page: usize,
        per_page: usize,
    ) -> Result<Vec<CreditTransaction>, StorageError> {
        use schema::credit_transactions::dsl as ct;
        let uid = user_id.to_string();
        let per_page = per_page.clamp(1, MAX_PAGE_SIZE) as i64;
        // Pages past the end of any ledger saturate instead of overflowing.
        let offset = i64::try_from(page.max(1) - 1)
            .unwrap_or(i64::MAX)
            .saturating_mul(per_page);
        self.read(move |conn| {
            Ok(ct::credit_transactions
                .filter(ct::user_id.eq(&uid))
                .order((ct::created_at.desc(), ct::id.desc()))
                .offset(offset)
                .limit(per_page)
                .load::<CreditTransaction>(conn)?)
        })
        .await
    }
}
