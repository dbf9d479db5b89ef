//! Connection parameters for the Typesense server being administered.
//!
//! A [`ConnectionForm`] is what the browser submits or what a store hands back:
//! loosely typed, possibly empty. [`ConnectionForm::validate`] is the only way
//! to obtain a [`ConnectionConfig`], which every request builder requires.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scheme used to reach the search server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Http,
    Https,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Port as submitted: the setup form sends text, persisted configs carry a number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortInput {
    Number(i64),
    Text(String),
}

impl Default for PortInput {
    fn default() -> Self {
        PortInput::Text(String::new())
    }
}

/// Unvalidated connection candidate
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionForm {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: PortInput,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(default)]
    pub api_key: String,
}

fn default_protocol() -> String {
    Protocol::Http.as_str().to_string()
}

impl Default for ConnectionForm {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: PortInput::default(),
            protocol: default_protocol(),
            api_key: String::new(),
        }
    }
}

impl fmt::Debug for ConnectionForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionForm")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("protocol", &self.protocol)
            .field("api_key", &redact(&self.api_key))
            .finish()
    }
}

/// Fields of a connection that can fail validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionField {
    Host,
    Port,
    Protocol,
    ApiKey,
}

impl fmt::Display for ConnectionField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionField::Host => "host",
            ConnectionField::Port => "port",
            ConnectionField::Protocol => "protocol",
            ConnectionField::ApiKey => "apiKey",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: ConnectionField,
    pub message: String,
}

/// Every field that failed validation, in form order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn contains(&self, field: ConnectionField) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    pub fn fields(&self) -> Vec<ConnectionField> {
        self.errors.iter().map(|e| e.field).collect()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "invalid connection ({})", parts.join("; "))
    }
}

/// Validated connection to a Typesense server
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub protocol: Protocol,
    pub api_key: String,
}

impl ConnectionConfig {
    /// Root URL of the server, e.g. `http://localhost:8108`
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }

    pub fn to_form(&self) -> ConnectionForm {
        ConnectionForm {
            host: self.host.clone(),
            port: PortInput::Number(i64::from(self.port)),
            protocol: self.protocol.as_str().to_string(),
            api_key: self.api_key.clone(),
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("protocol", &self.protocol)
            .field("api_key", &redact(&self.api_key))
            .finish()
    }
}

impl TryFrom<ConnectionForm> for ConnectionConfig {
    type Error = ValidationErrors;

    fn try_from(form: ConnectionForm) -> Result<Self, Self::Error> {
        form.validate()
    }
}

impl ConnectionForm {
    /// True when nothing has been filled in (the store's empty default)
    pub fn is_empty(&self) -> bool {
        self.host.trim().is_empty() && self.api_key.is_empty()
    }

    /// Check every field and produce a normalized config.
    ///
    /// No network access happens here; reachability is checked separately by
    /// the connection test.
    pub fn validate(&self) -> Result<ConnectionConfig, ValidationErrors> {
        let mut errors = Vec::new();

        let host = self.host.trim().trim_end_matches('/').to_string();
        if host.is_empty() {
            errors.push(FieldError {
                field: ConnectionField::Host,
                message: "host is required".to_string(),
            });
        }

        let port = match parse_port(&self.port) {
            Ok(port) => Some(port),
            Err(message) => {
                errors.push(FieldError {
                    field: ConnectionField::Port,
                    message,
                });
                None
            }
        };

        let protocol = match self.protocol.as_str() {
            "http" => Some(Protocol::Http),
            "https" => Some(Protocol::Https),
            other => {
                errors.push(FieldError {
                    field: ConnectionField::Protocol,
                    message: format!("protocol must be \"http\" or \"https\", got {:?}", other),
                });
                None
            }
        };

        if self.api_key.is_empty() {
            errors.push(FieldError {
                field: ConnectionField::ApiKey,
                message: "API key is required".to_string(),
            });
        }

        match (port, protocol) {
            (Some(port), Some(protocol)) if errors.is_empty() => Ok(ConnectionConfig {
                host,
                port,
                protocol,
                api_key: self.api_key.clone(),
            }),
            _ => Err(ValidationErrors { errors }),
        }
    }
}

fn parse_port(input: &PortInput) -> Result<u16, String> {
    let value = match input {
        PortInput::Number(n) => *n,
        PortInput::Text(text) => {
            let text = text.trim();
            if text.is_empty() {
                return Err("port is required".to_string());
            }
            if !text.chars().all(|c| c.is_ascii_digit()) {
                return Err(format!("port must be an integer, got {:?}", text));
            }
            // Anything longer than i64 is out of range anyway
            text.parse::<i64>().unwrap_or(i64::MAX)
        }
    };

    if (1..=65535).contains(&value) {
        Ok(value as u16)
    } else {
        Err(format!("port must be between 1 and 65535, got {}", value))
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        ""
    } else {
        "***"
    }
}
