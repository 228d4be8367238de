mod account;
mod global;
mod loader;
mod overrides;
mod validate;

use std::{io, path::Path, path::PathBuf};

use derive_getters::Getters;
use log::info;
use thiserror::Error;

pub use account::{AccountDefinition, Protocol};
pub use global::{DovecotSettings, FetchmailSettings, GlobalSettings, Tuning};
pub use loader::{is_config_file, load_accounts, load_global};
pub use overrides::{FetchOptions, Overrides};
pub use validate::{ValidationError, validate};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Global settings plus every account that loaded and validated.
#[derive(Debug, Getters)]
pub struct SourceConfig {
    global: GlobalSettings,
    accounts: Vec<AccountDefinition>,
}

impl SourceConfig {
    /// Loads and validates the whole config directory.
    ///
    /// Unparseable account files are skipped; a single structurally invalid account
    /// fails the whole load.
    pub fn load(config_dir: &Path) -> Result<Self, LoadError> {
        info!("loading configuration from {}", config_dir.display());
        let global = load_global(config_dir)?;
        let accounts = validate(load_accounts(config_dir)?)?;
        info!(
            "configuration loaded: global config and {} account configs",
            accounts.len()
        );

        Ok(Self { global, accounts })
    }

    /// Accounts that take part in artifact generation.
    pub fn enabled_accounts(&self) -> Vec<&AccountDefinition> {
        self.accounts.iter().filter(|a| a.enabled()).collect()
    }
}
