use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerKind {
    Kodjin,
    Hapi,
    Custom,
}

impl ServerKind {
    pub const ALL: [ServerKind; 3] = [ServerKind::Kodjin, ServerKind::Hapi, ServerKind::Custom];
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    #[default]
    None,
    Basic,
    Bearer,
    ClientCredentials,
}

impl AuthType {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthType::None => "none",
            AuthType::Basic => "basic",
            AuthType::Bearer => "bearer",
            AuthType::ClientCredentials => "client_credentials",
        }
    }
}

/// How requests to a server authenticate. Each mode carries exactly the
/// fields it needs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "authType", rename_all = "snake_case")]
pub enum AuthMode {
    None,
    Basic {
        username: String,
        password: String,
    },
    Bearer {
        token: String,
    },
    #[serde(rename_all = "camelCase")]
    ClientCredentials {
        client_id: String,
        client_secret: String,
        token_url: String,
    },
}

impl AuthMode {
    pub fn auth_type(&self) -> AuthType {
        match self {
            AuthMode::None => AuthType::None,
            AuthMode::Basic { .. } => AuthType::Basic,
            AuthMode::Bearer { .. } => AuthType::Bearer,
            AuthMode::ClientCredentials { .. } => AuthType::ClientCredentials,
        }
    }
}

impl fmt::Debug for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMode::None => f.write_str("None"),
            AuthMode::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            AuthMode::Bearer { .. } => f
                .debug_struct("Bearer")
                .field("token", &"<redacted>")
                .finish(),
            AuthMode::ClientCredentials {
                client_id,
                token_url,
                ..
            } => f
                .debug_struct("ClientCredentials")
                .field("client_id", client_id)
                .field("client_secret", &"<redacted>")
                .field("token_url", token_url)
                .finish(),
        }
    }
}

/// One remote FHIR server. Never mutated in place: switching servers or
/// credentials builds a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(rename = "type")]
    pub kind: ServerKind,
    pub base_url: String,
    pub name: String,
    pub auth: AuthMode,
}

impl ServerConfig {
    pub fn preset(kind: ServerKind) -> Self {
        let (base_url, name) = match kind {
            ServerKind::Kodjin => ("https://demo.kodjin.com/fhir", "Kodjin FHIR Server"),
            ServerKind::Hapi => ("https://hapi.fhir.org/baseR4", "HAPI FHIR Server"),
            ServerKind::Custom => ("", "Custom FHIR Server"),
        };
        Self {
            kind,
            base_url: base_url.to_string(),
            name: name.to_string(),
            auth: AuthMode::None,
        }
    }

    pub fn with_auth(&self, auth: AuthMode) -> Self {
        Self {
            auth,
            ..self.clone()
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::preset(ServerKind::Kodjin)
    }
}

pub fn presets() -> Vec<ServerConfig> {
    ServerKind::ALL.into_iter().map(ServerConfig::preset).collect()
}

/// Flat form input for a custom server. Only the fields of the selected
/// auth type are read.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomServerInput {
    pub base_url: String,
    pub auth_type: AuthType,
    pub username: String,
    pub password: String,
    pub token: String,
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
}

impl CustomServerInput {
    /// Validates the input into a custom configuration. An empty base
    /// address keeps the current server's address.
    pub fn into_config(self, current: &ServerConfig) -> Result<ServerConfig, ConfigError> {
        let raw = if self.base_url.trim().is_empty() {
            current.base_url.as_str()
        } else {
            self.base_url.trim()
        };
        let base_url = normalize_base_url(raw)?;
        let mode = self.auth_type.as_str();
        let auth = match self.auth_type {
            AuthType::None => AuthMode::None,
            AuthType::Basic => AuthMode::Basic {
                username: required(self.username, mode, "username")?,
                password: required(self.password, mode, "password")?,
            },
            AuthType::Bearer => AuthMode::Bearer {
                token: required(self.token, mode, "token")?,
            },
            AuthType::ClientCredentials => AuthMode::ClientCredentials {
                client_id: required(self.client_id, mode, "client id")?,
                client_secret: required(self.client_secret, mode, "client secret")?,
                token_url: normalize_base_url(&required(self.token_url, mode, "token URL")?)?,
            },
        };
        Ok(ServerConfig {
            kind: ServerKind::Custom,
            base_url,
            name: ServerConfig::preset(ServerKind::Custom).name,
            auth,
        })
    }
}

fn required(value: String, mode: &'static str, field: &'static str) -> Result<String, ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::MissingAuthField { mode, field });
    }
    Ok(value)
}

/// Accepts absolute http(s) addresses and drops a trailing slash so that
/// `base + "/Type/id"` and prefix checks line up.
pub fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ConfigError::MissingBaseUrl);
    }
    let parsed = Url::parse(raw).map_err(|e| ConfigError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidBaseUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme {}", parsed.scheme()),
        });
    }
    Ok(raw.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn presets_default_to_no_auth() {
        let all = presets();
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|s| s.auth == AuthMode::None));
        assert_eq!(ServerConfig::default().base_url, "https://demo.kodjin.com/fhir");
        assert_eq!(all[2].base_url, "");
    }

    #[test]
    fn custom_input_builds_per_mode_payload() {
        let input = CustomServerInput {
            base_url: "https://fhir.example.org/r4/".into(),
            auth_type: AuthType::Basic,
            username: "u".into(),
            password: "p".into(),
            token: "ignored".into(),
            ..Default::default()
        };
        let config = input.into_config(&ServerConfig::default()).unwrap();
        assert_eq!(config.kind, ServerKind::Custom);
        assert_eq!(config.base_url, "https://fhir.example.org/r4");
        assert_eq!(
            config.auth,
            AuthMode::Basic {
                username: "u".into(),
                password: "p".into()
            }
        );
    }

    #[test]
    fn empty_base_keeps_current_address() {
        let current = ServerConfig::preset(ServerKind::Hapi);
        let config = CustomServerInput::default().into_config(&current).unwrap();
        assert_eq!(config.base_url, current.base_url);
        assert_eq!(config.name, "Custom FHIR Server");
    }

    #[test]
    fn missing_mode_fields_are_rejected() {
        let input = CustomServerInput {
            base_url: "https://fhir.example.org".into(),
            auth_type: AuthType::Bearer,
            ..Default::default()
        };
        assert_eq!(
            input.into_config(&ServerConfig::default()),
            Err(ConfigError::MissingAuthField {
                mode: "bearer",
                field: "token"
            })
        );
    }

    #[test]
    fn base_address_must_be_http() {
        let custom = ServerConfig::preset(ServerKind::Custom);
        assert_eq!(
            CustomServerInput::default().into_config(&custom),
            Err(ConfigError::MissingBaseUrl)
        );
        assert!(matches!(
            normalize_base_url("ftp://files.example.org"),
            Err(ConfigError::InvalidBaseUrl { .. })
        ));
        assert!(normalize_base_url("not a url").is_err());
    }

    #[test]
    fn auth_mode_wire_shape() {
        let mode: AuthMode = serde_json::from_value(json!({
            "authType": "client_credentials",
            "clientId": "id",
            "clientSecret": "secret",
            "tokenUrl": "https://auth.example.org/token"
        }))
        .unwrap();
        assert_eq!(mode.auth_type(), AuthType::ClientCredentials);
        let debug = format!("{mode:?}");
        assert!(!debug.contains("secret\""));
        assert!(debug.contains("<redacted>"));
    }
}
