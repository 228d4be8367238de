use derive_getters::Getters;
use serde::Deserialize;

use super::global::FetchmailSettings;

pub const DEFAULT_BATCH_LIMIT: u32 = 100;
pub const DEFAULT_FOLDER: &str = "INBOX";

/// Applies a partial section on top of a complete one; values present in the
/// patch win.
pub trait Overrides<Patch> {
    #[must_use]
    fn apply(self, patch: &Patch) -> Self;
}

/// Per-account `fetch` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FetchOverrides {
    keep_mail: Option<bool>,
    batch_limit: Option<u32>,
    folders: Option<Vec<String>>,
}

/// Fully resolved fetch parameters for one account.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct FetchOptions {
    keep_mail: bool,
    batch_limit: u32,
    folders: Vec<String>,
}

impl FetchOptions {
    /// Defaults taken from the global `fetchmail` section, falling back to built-ins.
    pub fn defaults(global: &FetchmailSettings) -> Self {
        let folders = global
            .folders()
            .clone()
            .filter(|folders| !folders.is_empty())
            .unwrap_or_else(|| vec![DEFAULT_FOLDER.to_string()]);
        Self {
            keep_mail: global.keep_mail(),
            batch_limit: global.batch_limit().unwrap_or(DEFAULT_BATCH_LIMIT),
            folders,
        }
    }
}

impl Overrides<FetchOverrides> for FetchOptions {
    fn apply(self, patch: &FetchOverrides) -> Self {
        Self {
            keep_mail: patch.keep_mail.unwrap_or(self.keep_mail),
            batch_limit: patch.batch_limit.unwrap_or(self.batch_limit),
            folders: patch
                .folders
                .clone()
                .filter(|folders| !folders.is_empty())
                .unwrap_or(self.folders),
        }
    }
}
