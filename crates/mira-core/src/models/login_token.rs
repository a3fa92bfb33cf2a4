use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Single-use login credential. Only the HMAC of the raw token is stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct LoginToken {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl LoginToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }

    /// A token can be consumed only once and only before expiry.
    pub fn is_consumable(&self, now: DateTime<Utc>) -> bool {
        !self.is_used() && !self.is_expired(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn token(expires_in: Duration, used: bool) -> LoginToken {
        let now = Utc::now();
        LoginToken {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            token_hash: "abc".to_string(),
            expires_at: now + expires_in,
            used_at: used.then_some(now),
            created_at: now,
        }
    }

    #[test]
    fn expired_or_used_tokens_are_not_consumable() {
        let now = Utc::now();
        assert!(token(Duration::minutes(15), false).is_consumable(now));
        assert!(!token(Duration::minutes(-1), false).is_consumable(now));
        assert!(!token(Duration::minutes(15), true).is_consumable(now));
    }
}
