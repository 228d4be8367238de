use std::{
    collections::BTreeMap,
    fmt::Display,
    path::{Path, PathBuf},
};

use derive_getters::Getters;
use serde::Deserialize;

pub const DEFAULT_IMAP_PORT: u16 = 143;
pub const DEFAULT_IMAPS_PORT: u16 = 993;
pub const DEFAULT_POLL_INTERVAL: u64 = 300;

/// Server-wide parameters read from `global.yaml`.
///
/// An absent file yields [`GlobalSettings::default`].
#[derive(Debug, Clone, Default, Deserialize, Getters)]
#[serde(default)]
pub struct GlobalSettings {
    dovecot: DovecotSettings,
    fetchmail: FetchmailSettings,
}

#[derive(Debug, Clone, Deserialize, Getters)]
#[serde(default)]
pub struct DovecotSettings {
    imap_port: u16,
    imaps_port: u16,
    ssl_cert: Option<PathBuf>,
    ssl_key: Option<PathBuf>,
    performance: Tuning,
    fts: Tuning,
}

impl Default for DovecotSettings {
    fn default() -> Self {
        Self {
            imap_port: DEFAULT_IMAP_PORT,
            imaps_port: DEFAULT_IMAPS_PORT,
            ssl_cert: None,
            ssl_key: None,
            performance: Tuning::default(),
            fts: Tuning::default(),
        }
    }
}

impl DovecotSettings {
    /// Certificate and key paths, if both are configured.
    ///
    /// Says nothing about whether the files exist.
    pub fn tls_paths(&self) -> Option<(&Path, &Path)> {
        let cert = self.ssl_cert.as_deref().filter(|p| !p.as_os_str().is_empty())?;
        let key = self.ssl_key.as_deref().filter(|p| !p.as_os_str().is_empty())?;
        Some((cert, key))
    }
}

#[derive(Debug, Clone, Deserialize, Getters)]
#[serde(default)]
pub struct FetchmailSettings {
    poll_interval: u64,
    syslog: bool,
    keep_mail: bool,
    batch_limit: Option<u32>,
    folders: Option<Vec<String>>,
    mda: Option<String>,
}

impl Default for FetchmailSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            syslog: false,
            keep_mail: true,
            batch_limit: None,
            folders: None,
            mda: None,
        }
    }
}

/// A block of daemon tuning keys passed through to the generated config verbatim.
///
/// Keys are kept sorted so the rendered output does not depend on document order.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Tuning(BTreeMap<String, TuningValue>);

impl Tuning {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TuningValue)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }
}

impl<K: Into<String>> FromIterator<(K, TuningValue)> for Tuning {
    fn from_iter<T: IntoIterator<Item = (K, TuningValue)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TuningValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Display for TuningValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TuningValue::Bool(true) => f.write_str("yes"),
            TuningValue::Bool(false) => f.write_str("no"),
            TuningValue::Integer(value) => value.fmt(f),
            TuningValue::Float(value) => value.fmt(f),
            TuningValue::Text(value) => f.write_str(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use assertables::*;
    use rstest::*;

    use super::*;

    #[rstest]
    fn test_empty_mapping_uses_defaults() {
        let settings: GlobalSettings = assert_ok!(serde_yaml::from_str("{}"));
        assert_eq!(settings.dovecot().imap_port(), 143);
        assert_eq!(settings.dovecot().imaps_port(), 993);
        assert_eq!(settings.fetchmail().poll_interval(), 300);
        assert!(!settings.fetchmail().syslog());
        assert!(settings.fetchmail().keep_mail());
        assert_none!(settings.dovecot().tls_paths());
    }

    #[rstest]
    fn test_partial_sections_keep_remaining_defaults() {
        let settings: GlobalSettings = assert_ok!(serde_yaml::from_str(
            "dovecot:\n  imap_port: 1143\nfetchmail:\n  syslog: true\n"
        ));
        assert_eq!(settings.dovecot().imap_port(), 1143);
        assert_eq!(settings.dovecot().imaps_port(), 993);
        assert!(settings.fetchmail().syslog());
        assert_eq!(settings.fetchmail().poll_interval(), 300);
    }

    #[rstest]
    #[case("dovecot:\n  ssl_cert: /c.pem\n")]
    #[case("dovecot:\n  ssl_key: /k.pem\n")]
    #[case("dovecot:\n  ssl_cert: ''\n  ssl_key: /k.pem\n")]
    fn test_tls_paths_need_both_entries(#[case] document: &str) {
        let settings: GlobalSettings = assert_ok!(serde_yaml::from_str(document));
        assert_none!(settings.dovecot().tls_paths());
    }

    #[rstest]
    fn test_tuning_values_keep_their_types() {
        let settings: GlobalSettings = assert_ok!(serde_yaml::from_str(
            "dovecot:\n  performance:\n    mail_fsync: never\n    mmap_disable: true\n    default_process_limit: 50\n"
        ));
        let rendered: Vec<String> = settings
            .dovecot()
            .performance()
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();
        assert_eq!(
            rendered,
            [
                "default_process_limit=50",
                "mail_fsync=never",
                "mmap_disable=yes"
            ]
        );
    }
}
