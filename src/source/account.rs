use std::{fmt::Display, str::FromStr};

use derive_getters::Getters;
use serde::Deserialize;
use serde_yaml::Value;
use thiserror::Error;

use super::overrides::FetchOverrides;

pub const PLAIN_SCHEME: &str = "PLAIN";

/// One account file as written by the user.
///
/// Any well-formed YAML document is accepted here; its shape is only checked by
/// validation, so a structurally wrong file fails the batch instead of being skipped.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct AccountDocument(pub(super) Value);

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AccountSection {
    pub(super) username: Option<ScalarText>,
    pub(super) password: Option<ScalarText>,
    pub(super) password_scheme: Option<ScalarText>,
    pub(super) enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SourceSection {
    pub(super) protocol: Option<ScalarText>,
    pub(super) host: Option<ScalarText>,
    pub(super) port: Option<ScalarText>,
    pub(super) ssl: Option<bool>,
    pub(super) username: Option<ScalarText>,
    pub(super) password: Option<ScalarText>,
}

/// Any YAML scalar read as text, so `password: 123456` means the string `123456`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawScalar")]
pub struct ScalarText(String);

impl ScalarText {
    pub fn into_string(self) -> String {
        self.0
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawScalar {
    Text(String),
    Bool(bool),
    Integer(i64),
    Unsigned(u64),
    Float(f64),
}

impl From<RawScalar> for ScalarText {
    fn from(raw: RawScalar) -> Self {
        Self(match raw {
            RawScalar::Text(text) => text,
            RawScalar::Bool(value) => value.to_string(),
            RawScalar::Integer(value) => value.to_string(),
            RawScalar::Unsigned(value) => value.to_string(),
            RawScalar::Float(value) => value.to_string(),
        })
    }
}

/// A validated account, keyed by the stem of the file it came from.
#[derive(Debug, Clone, Getters)]
pub struct AccountDefinition {
    name: String,
    enabled: bool,
    credentials: Credentials,
    source: RemoteSource,
    fetch: FetchOverrides,
}

impl AccountDefinition {
    pub(super) fn new(
        name: String,
        enabled: bool,
        credentials: Credentials,
        source: RemoteSource,
        fetch: FetchOverrides,
    ) -> Self {
        Self {
            name,
            enabled,
            credentials,
            source,
            fetch,
        }
    }
}

/// Local login of the mailbox owner.
#[derive(Debug, Clone, Getters)]
pub struct Credentials {
    username: String,
    #[getter(skip)]
    password: String,
    scheme: PasswordScheme,
}

impl Credentials {
    pub(super) fn new(username: String, password: String, scheme: PasswordScheme) -> Self {
        Self {
            username,
            password,
            scheme,
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// Password in passwd-file form, `{SCHEME}secret`.
    ///
    /// Values that already start with a scheme tag are used unchanged.
    pub fn tagged_password(&self) -> String {
        if self.password.starts_with('{') && self.password.contains('}') {
            self.password.clone()
        } else {
            format!("{{{}}}{}", self.scheme, self.password)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordScheme(String);

impl PasswordScheme {
    pub fn is_plaintext(&self) -> bool {
        self.0 == PLAIN_SCHEME
    }
}

impl Default for PasswordScheme {
    fn default() -> Self {
        Self(PLAIN_SCHEME.to_string())
    }
}

impl From<&str> for PasswordScheme {
    fn from(value: &str) -> Self {
        Self(value.trim().to_ascii_uppercase())
    }
}

impl Display for PasswordScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where mail for an account is fetched from.
#[derive(Debug, Clone, Getters)]
pub struct RemoteSource {
    #[getter(skip)]
    protocol: Protocol,
    host: String,
    port: u16,
    #[getter(skip)]
    ssl: Option<bool>,
    username: Option<String>,
    #[getter(skip)]
    password: Option<String>,
}

impl RemoteSource {
    pub(super) fn new(
        protocol: Protocol,
        host: String,
        port: u16,
        ssl: Option<bool>,
        username: Option<String>,
        password: Option<String>,
    ) -> Self {
        Self {
            protocol,
            host,
            port,
            ssl,
            username,
            password,
        }
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn ssl(&self) -> Option<bool> {
        self.ssl
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Imap,
    Pop3,
}

#[derive(Debug, Error)]
#[error("unsupported protocol {0:?}")]
pub struct UnknownProtocolError(String);

impl FromStr for Protocol {
    type Err = UnknownProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "imap" => Ok(Self::Imap),
            "pop3" => Ok(Self::Pop3),
            other => Err(UnknownProtocolError(other.to_string())),
        }
    }
}

impl Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Imap => f.write_str("imap"),
            Protocol::Pop3 => f.write_str("pop3"),
        }
    }
}
