use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Teaching minutes that earn one credit.
pub const MINUTES_PER_CREDIT: i32 = 15;

/// Ledger tag for credits earned by teaching.
pub const TX_EARNED: &str = "earned";

pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 5;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(ParseEnumError {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

text_enum!(SessionStatus, "session status", {
    Scheduled => "scheduled",
    Completed => "completed",
});

text_enum!(SessionType, "session type", {
    Teaching => "teaching",
    Learning => "learning",
});

text_enum!(MatchStatus, "match status", {
    Pending => "pending",
    Accepted => "accepted",
    Rejected => "rejected",
});

impl MatchStatus {
    /// Whether a match currently in `self` may be moved to `next`.
    ///
    /// Pending resolves to either terminal state. Re-applying the current
    /// terminal state is accepted as a no-op; switching between terminal
    /// states is not.
    pub fn can_transition_to(self, next: MatchStatus) -> bool {
        match (self, next) {
            (_, MatchStatus::Pending) => false,
            (MatchStatus::Pending, _) => true,
            (current, next) => current == next,
        }
    }
}

/// Credits awarded for a completed teaching session of `duration_minutes`.
pub fn credits_for_duration(duration_minutes: i32) -> i32 {
    if duration_minutes <= 0 {
        return 0;
    }
    duration_minutes / MINUTES_PER_CREDIT
}

/// Arithmetic mean of all ratings, `None` when nothing has been rated yet.
pub fn average_rating(ratings: &[i32]) -> Option<f64> {
    if ratings.is_empty() {
        return None;
    }
    let total: i64 = ratings.iter().map(|r| i64::from(*r)).sum();
    Some(total as f64 / ratings.len() as f64)
}

pub fn rating_in_range(rating: i32) -> bool {
    (MIN_RATING..=MAX_RATING).contains(&rating)
}
