use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tenant (company): the boundary for shared credentials and documents.
/// At most one tenant exists per email domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub domain: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Extract the lowercase domain part of an email address.
pub fn email_domain(email: &str) -> Option<String> {
    let (_, domain) = email.trim().rsplit_once('@')?;
    let domain = domain.trim().to_lowercase();
    if domain.is_empty() {
        None
    } else {
        Some(domain)
    }
}

/// Derive a display name from a domain: first label, capitalized
/// (`acme.com` -> `Acme`).
pub fn company_name_from_domain(domain: &str) -> Option<String> {
    let label = domain.split('.').next()?.trim();
    let mut chars = label.chars();
    let first = chars.next()?;
    Some(first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_lowercase_domain() {
        assert_eq!(email_domain("Dana@Acme.COM"), Some("acme.com".to_string()));
        assert_eq!(email_domain("no-at-sign"), None);
        assert_eq!(email_domain("trailing@"), None);
    }

    #[test]
    fn company_name_capitalizes_first_label() {
        assert_eq!(company_name_from_domain("acme.com"), Some("Acme".to_string()));
        assert_eq!(
            company_name_from_domain("NEXORA.co.uk"),
            Some("Nexora".to_string())
        );
        assert_eq!(company_name_from_domain(""), None);
    }
}
