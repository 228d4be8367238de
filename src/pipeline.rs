use std::{
    path::PathBuf,
    sync::{Mutex, PoisonError},
};

use derive_getters::Getters;
use log::{error, info};
use thiserror::Error;

use crate::{
    audit::{SecurityFinding, audit},
    compile::{
        CompileError, MailStoreCompiler, MailStoreReport, RemoteFetchCompiler,
        SYNTAX_CHECK_TIMEOUT, check_syntax,
    },
    config::Layout,
    source::{LoadError, SourceConfig},
};

#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error("no enabled accounts found in configuration")]
    NoEnabledAccounts,
}

#[derive(Debug, Getters)]
pub struct CycleReport {
    findings: Vec<SecurityFinding>,
    mail_store: MailStoreReport,
    fetchmail: Option<PathBuf>,
    #[getter(skip)]
    syntax_valid: Option<bool>,
}

impl CycleReport {
    /// Outcome of the external syntax check, `None` when it was not configured.
    pub fn syntax_valid(&self) -> Option<bool> {
        self.syntax_valid
    }
}

/// The full load, audit and generate cycle.
///
/// Cycles are serialised: a manual run and a watcher-triggered run never interleave
/// writes to the same artifacts.
pub struct Pipeline {
    layout: Layout,
    cycle: Mutex<()>,
}

impl Pipeline {
    pub fn new(layout: Layout) -> Self {
        Self {
            layout,
            cycle: Mutex::new(()),
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Runs one cycle from scratch.
    ///
    /// Nothing is written when loading fails. When no account is enabled the mail-store
    /// artifacts are still generated but the cycle reports
    /// [`CycleError::NoEnabledAccounts`]. Previously written files are never rolled back.
    pub fn run(&self) -> Result<CycleReport, CycleError> {
        let _cycle = self.cycle.lock().unwrap_or_else(PoisonError::into_inner);
        info!("starting configuration compilation");

        let config = SourceConfig::load(self.layout.config_dir()).inspect_err(|e| {
            error!("loading configuration failed: {e}");
        })?;
        let findings = audit(config.global(), config.accounts());
        let enabled = config.enabled_accounts();
        info!("{} enabled accounts", enabled.len());

        let mail_store = MailStoreCompiler::new(&self.layout).compile(config.global(), &enabled)?;
        let fetchmail = RemoteFetchCompiler::new(&self.layout).compile(config.global(), &enabled)?;
        let syntax_valid = self
            .layout
            .syntax_check_tool()
            .map(|tool| check_syntax(tool, self.layout.dovecot_conf(), SYNTAX_CHECK_TIMEOUT));

        if enabled.is_empty() {
            error!("no enabled accounts found in configuration");
            return Err(CycleError::NoEnabledAccounts);
        }

        info!("configuration compilation completed");
        Ok(CycleReport {
            findings,
            mail_store,
            fetchmail,
            syntax_valid,
        })
    }
}
