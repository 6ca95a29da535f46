use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Public identity record for a signed-in user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(rename = "isPro", default)]
    pub is_pro: bool,
    #[serde(rename = "isVerified", default)]
    pub is_verified: bool,
    #[serde(rename = "lastLoginAt", default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub last_login_at: Option<DateTime<Utc>>,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    /// Name to show in greetings, falling back to the email address
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.email
        } else {
            &self.name
        }
    }

    pub fn tier_display(&self) -> &'static str {
        if self.is_pro {
            "Pro"
        } else {
            "Free"
        }
    }
}

/// Payload returned by login, register and magic-link verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
}

/// Payload returned by `/auth/refresh`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct TokenPair {
    pub token: String,
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_public_user() {
        let json = r#"{"id":"5b0c3f1e-2c1d-4a8e-9a77-0d1b7f3e2a10","email":"ada@example.com","name":"Ada Obi","avatar":"","isPro":true,"isVerified":false,"lastLoginAt":null,"createdAt":"2025-01-12T09:30:00Z"}"#;

        let user: User = serde_json::from_str(json).expect("Failed to parse user test JSON");
        assert_eq!(user.email, "ada@example.com");
        assert!(user.is_pro);
        assert!(!user.is_verified);
        assert!(user.last_login_at.is_none());
        assert!(user.created_at.is_some());
        assert_eq!(user.tier_display(), "Pro");
    }

    #[test]
    fn test_parse_sparse_user_from_me() {
        // /me currently answers with id, email and isPro only
        let json = r#"{"id":"u-1","email":"ada@example.com","isPro":false}"#;
        let user: User = serde_json::from_str(json).expect("Failed to parse sparse user");
        assert_eq!(user.name, "");
        assert_eq!(user.display_name(), "ada@example.com");
    }

    #[test]
    fn test_token_pair_wire_names() {
        let pair = TokenPair {
            token: "access".to_string(),
            refresh_token: "refresh".to_string(),
        };
        let value = serde_json::to_value(&pair).unwrap();
        assert_eq!(value["refreshToken"], "refresh");
        assert_eq!(value["token"], "access");
    }
}
