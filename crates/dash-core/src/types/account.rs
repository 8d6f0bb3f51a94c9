//! Users and their stored exchange connections.
//!
//! Rows come from the hosted database as JSON, so field names follow the
//! table columns (`exchange_platform`, `api_key_encrypted`, ...).

use serde::{Deserialize, Deserializer, Serialize};

use super::enums::Platform;

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// One stored exchange account of a user (`user_exchange_connections` row).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeConnection {
    pub id: String,
    pub user_id: String,
    pub exchange_platform: Platform,
    /// Stored API key. Despite the column name the value is stored as-is.
    #[serde(default)]
    pub api_key_encrypted: String,
    /// Stored API secret. Stored as-is, see [`ExchangeConnection::credentials`].
    #[serde(default)]
    pub api_secret_encrypted: String,
    #[serde(default, deserialize_with = "bool_or_string")]
    pub is_testnet: bool,
    #[serde(default, deserialize_with = "bool_or_string")]
    pub is_active: bool,
}

impl ExchangeConnection {
    /// Returns the `(api_key, secret)` pair, or `None` if either is blank.
    ///
    /// Credentials are stored in plaintext: this is a pass-through, there is
    /// no decryption step yet.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let key = self.api_key_encrypted.trim();
        let secret = self.api_secret_encrypted.trim();
        if key.is_empty() || secret.is_empty() {
            None
        } else {
            Some((key, secret))
        }
    }
}

/// Accept `true`, `"true"` and friends. Some rows were written with string
/// flags by older settings forms.
fn bool_or_string<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
        Null(()),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Text(s) => s.trim().eq_ignore_ascii_case("true"),
        Flag::Null(()) => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_row_with_string_flags() {
        let row = serde_json::json!({
            "id": "c1",
            "user_id": "u1",
            "exchange_platform": "binance",
            "api_key_encrypted": "key",
            "api_secret_encrypted": "secret",
            "is_testnet": "true",
            "is_active": true,
        });
        let conn: ExchangeConnection = serde_json::from_value(row).unwrap();
        assert!(conn.is_testnet);
        assert!(conn.is_active);
        assert_eq!(conn.exchange_platform, Platform::Binance);
        assert_eq!(conn.credentials(), Some(("key", "secret")));
    }

    #[test]
    fn blank_secret_has_no_credentials() {
        let row = serde_json::json!({
            "id": "c1",
            "user_id": "u1",
            "exchange_platform": "binance",
            "api_key_encrypted": "key",
            "is_testnet": null,
        });
        let conn: ExchangeConnection = serde_json::from_value(row).unwrap();
        assert!(!conn.is_testnet);
        assert!(!conn.is_active);
        assert_eq!(conn.credentials(), None);
    }
}
