use std::{fmt::Display, path::PathBuf};

use log::{Level, log};

use crate::source::{AccountDefinition, GlobalSettings};

/// An unsafe configuration noticed while loading. Findings are reported and never
/// stop compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityFinding {
    TlsNotConfigured,
    TlsMaterialMissing { kind: TlsMaterial, path: PathBuf },
    PlaintextPassword { account: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMaterial {
    Certificate,
    Key,
}

impl SecurityFinding {
    pub fn level(&self) -> Level {
        match self {
            SecurityFinding::TlsMaterialMissing { .. } => Level::Error,
            SecurityFinding::TlsNotConfigured | SecurityFinding::PlaintextPassword { .. } => {
                Level::Warn
            }
        }
    }
}

impl Display for SecurityFinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecurityFinding::TlsNotConfigured => {
                write!(f, "TLS certificate or key not configured, IMAPS will be disabled")
            }
            SecurityFinding::TlsMaterialMissing { kind, path } => {
                let kind = match kind {
                    TlsMaterial::Certificate => "certificate",
                    TlsMaterial::Key => "key",
                };
                write!(f, "TLS {kind} file not found: {}", path.display())
            }
            SecurityFinding::PlaintextPassword { account } => write!(
                f,
                "account '{account}' stores a plain text password, consider a hashed scheme such as BLF-CRYPT"
            ),
        }
    }
}

/// Inspects the loaded configuration and logs every finding at its level.
pub fn audit(global: &GlobalSettings, accounts: &[AccountDefinition]) -> Vec<SecurityFinding> {
    let mut findings = Vec::new();

    match global.dovecot().tls_paths() {
        None => findings.push(SecurityFinding::TlsNotConfigured),
        Some((cert, key)) => {
            for (kind, path) in [(TlsMaterial::Certificate, cert), (TlsMaterial::Key, key)] {
                if !path.exists() {
                    findings.push(SecurityFinding::TlsMaterialMissing {
                        kind,
                        path: path.to_path_buf(),
                    });
                }
            }
        }
    }

    findings.extend(
        accounts
            .iter()
            .filter(|account| account.credentials().scheme().is_plaintext())
            .map(|account| SecurityFinding::PlaintextPassword {
                account: account.name().clone(),
            }),
    );

    for finding in &findings {
        log!(finding.level(), "{finding}");
    }

    findings
}
