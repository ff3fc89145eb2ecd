use crate::auth::{Credentials, ServiceAccountKey};
use crate::error::ConfigError;

/// Google Sheets settings read from the environment.
#[derive(Debug, Clone)]
pub struct SheetConfig {
    pub spreadsheet_id: String,
    pub worksheet: Option<String>,
    pub credentials: Credentials,
}

impl SheetConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let spreadsheet_id = get("SPREADSHEET_ID").ok_or(ConfigError::Missing("SPREADSHEET_ID"))?;
        let worksheet = get("WORKSHEET_NAME");

        let credentials = if let Some(raw) = get("GOOGLE_CREDS_JSON") {
            let key = ServiceAccountKey::load(&raw).map_err(|e| ConfigError::Invalid {
                name: "GOOGLE_CREDS_JSON",
                message: e.to_string(),
            })?;
            Credentials::service_account(key)
        } else if let Some(token) = get("GOOGLE_ACCESS_TOKEN") {
            Credentials::AccessToken(token.trim().to_string())
        } else {
            return Err(ConfigError::Missing("GOOGLE_CREDS_JSON"));
        };

        Ok(Self {
            spreadsheet_id: spreadsheet_id.trim().to_string(),
            worksheet: worksheet.map(|w| w.trim().to_string()),
            credentials,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn missing_spreadsheet_id_is_named() {
        let err = SheetConfig::from_lookup(lookup(&[("GOOGLE_ACCESS_TOKEN", "t")])).unwrap_err();
        assert_eq!(err.to_string(), "SPREADSHEET_ID is missing");
    }

    #[test]
    fn missing_credentials_are_named() {
        let err = SheetConfig::from_lookup(lookup(&[("SPREADSHEET_ID", "abc")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("GOOGLE_CREDS_JSON")));
    }

    #[test]
    fn blank_values_count_as_missing() {
        let err = SheetConfig::from_lookup(lookup(&[
            ("SPREADSHEET_ID", "  "),
            ("GOOGLE_ACCESS_TOKEN", "t"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("SPREADSHEET_ID")));
    }

    #[test]
    fn access_token_and_worksheet_are_picked_up() {
        let config = SheetConfig::from_lookup(lookup(&[
            ("SPREADSHEET_ID", " abc "),
            ("WORKSHEET_NAME", "Grades"),
            ("GOOGLE_ACCESS_TOKEN", "token"),
        ]))
        .expect("config");
        assert_eq!(config.spreadsheet_id, "abc");
        assert_eq!(config.worksheet.as_deref(), Some("Grades"));
        assert!(matches!(config.credentials, Credentials::AccessToken(ref t) if t == "token"));
    }

    #[test]
    fn unreadable_key_path_is_invalid() {
        let err = SheetConfig::from_lookup(lookup(&[
            ("SPREADSHEET_ID", "abc"),
            ("GOOGLE_CREDS_JSON", "/nonexistent/key.json"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: "GOOGLE_CREDS_JSON",
                ..
            }
        ));
    }
}
