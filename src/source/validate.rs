use std::collections::BTreeMap;

use log::error;
use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};
use thiserror::Error;

use super::{
    account::{
        AccountDefinition, AccountDocument, AccountSection, Credentials, PasswordScheme,
        Protocol, RemoteSource, ScalarText, SourceSection,
    },
    overrides::FetchOverrides,
};

#[derive(Debug, Error)]
#[error("account '{account}' is invalid: {reason}")]
pub struct ValidationError {
    account: String,
    reason: InvalidReason,
}

impl ValidationError {
    fn new(account: &str, reason: InvalidReason) -> Self {
        Self {
            account: account.to_string(),
            reason,
        }
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn reason(&self) -> &InvalidReason {
        &self.reason
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidReason {
    #[error("document is not a mapping of sections")]
    NotAMapping,
    #[error("missing required section '{0}'")]
    MissingSection(&'static str),
    #[error("section '{section}' is malformed: {detail}")]
    MalformedSection {
        section: &'static str,
        detail: String,
    },
    #[error("missing credentials")]
    MissingCredentials,
    #[error("invalid protocol {0:?}")]
    InvalidProtocol(Option<String>),
    #[error("missing server details")]
    MissingServer,
    #[error("invalid port {0:?}")]
    InvalidPort(String),
    #[error("host {0:?} contains control characters")]
    UnusableHost(String),
    #[error("username {0:?} cannot be used as a mailbox directory")]
    UnusableUsername(String),
    #[error("{0} password contains ':' or control characters")]
    UnusablePassword(&'static str),
    #[error("remote username {0:?} contains control characters")]
    UnusableRemoteUsername(String),
}

/// Checks every loaded document and converts it into an [`AccountDefinition`].
///
/// Stops at the first invalid account; the caller must not configure any account then.
pub fn validate(
    documents: BTreeMap<String, AccountDocument>,
) -> Result<Vec<AccountDefinition>, ValidationError> {
    documents
        .into_iter()
        .map(|(name, document)| {
            validate_account(&name, document)
                .map_err(|reason| ValidationError::new(&name, reason))
                .inspect_err(|e| {
                    error!("account '{}' validation failed: {}", e.account(), e.reason());
                })
        })
        .collect()
}

fn validate_account(
    name: &str,
    document: AccountDocument,
) -> Result<AccountDefinition, InvalidReason> {
    let document = match document.0 {
        Value::Mapping(mapping) => mapping,
        Value::Null => Mapping::new(),
        _ => return Err(InvalidReason::NotAMapping),
    };

    let account: AccountSection =
        section(&document, "account")?.ok_or(InvalidReason::MissingSection("account"))?;
    let source: SourceSection =
        section(&document, "source")?.ok_or(InvalidReason::MissingSection("source"))?;
    let fetch: FetchOverrides = section(&document, "fetch")?.unwrap_or_default();
    let enabled: Option<bool> = section(&document, "enabled")?;

    let (Some(username), Some(password)) = (
        account.username.map(ScalarText::into_string),
        account.password.map(ScalarText::into_string),
    ) else {
        return Err(InvalidReason::MissingCredentials);
    };
    if username.is_empty() || password.is_empty() {
        return Err(InvalidReason::MissingCredentials);
    }
    if !is_usable_username(&username) {
        return Err(InvalidReason::UnusableUsername(username));
    }
    if password.contains(':') || has_control(&password) {
        return Err(InvalidReason::UnusablePassword("local"));
    }

    let protocol_name = source.protocol.map(ScalarText::into_string);
    let protocol = match protocol_name.as_deref().map(str::parse::<Protocol>) {
        Some(Ok(protocol)) => protocol,
        Some(Err(_)) | None => return Err(InvalidReason::InvalidProtocol(protocol_name)),
    };

    let (Some(host), Some(port)) = (
        source.host.map(ScalarText::into_string),
        source.port.map(ScalarText::into_string),
    ) else {
        return Err(InvalidReason::MissingServer);
    };
    if host.is_empty() {
        return Err(InvalidReason::MissingServer);
    }
    if has_control(&host) {
        return Err(InvalidReason::UnusableHost(host));
    }
    let Ok(port) = port.trim().parse::<u16>() else {
        return Err(InvalidReason::InvalidPort(port));
    };

    let remote_username = source.username.map(ScalarText::into_string);
    if let Some(remote) = remote_username.as_deref().filter(|u| has_control(u)) {
        return Err(InvalidReason::UnusableRemoteUsername(remote.to_string()));
    }
    let remote_password = source.password.map(ScalarText::into_string);
    if remote_password.as_deref().is_some_and(has_control) {
        return Err(InvalidReason::UnusablePassword("remote"));
    }

    let scheme = account
        .password_scheme
        .map(ScalarText::into_string)
        .as_deref()
        .map(PasswordScheme::from)
        .unwrap_or_default();
    let enabled = enabled.unwrap_or(true) && account.enabled.unwrap_or(true);

    Ok(AccountDefinition::new(
        name.to_string(),
        enabled,
        Credentials::new(username, password, scheme),
        RemoteSource::new(
            protocol,
            host,
            port,
            source.ssl,
            remote_username,
            remote_password,
        ),
        fetch,
    ))
}

// A key that is absent or null yields `None`; any other value must have the
// section's shape.
fn section<T: DeserializeOwned>(
    document: &Mapping,
    key: &'static str,
) -> Result<Option<T>, InvalidReason> {
    match document.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_yaml::from_value(value.clone())
            .map(Some)
            .map_err(|e| InvalidReason::MalformedSection {
                section: key,
                detail: e.to_string(),
            }),
    }
}

// Usernames become path components under the mail roots and fields in the
// passwd-file, so separators of either are rejected.
fn is_usable_username(username: &str) -> bool {
    username != "."
        && username != ".."
        && !username.contains(['/', ':'])
        && !has_control(username)
}

fn has_control(value: &str) -> bool {
    value.chars().any(char::is_control)
}
