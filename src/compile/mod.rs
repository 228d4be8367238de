mod dovecot;
mod fetchmail;
mod syntax_check;

use std::{
    fs::{self, DirBuilder, OpenOptions, Permissions},
    io::{self, Write as _},
    os::unix::fs::{DirBuilderExt as _, OpenOptionsExt as _, PermissionsExt as _},
    path::{Path, PathBuf},
};

use derive_getters::Getters;
use log::{debug, info};
use thiserror::Error;

use crate::{config::Ownership, provision::set_owner};

pub use dovecot::{MailStoreCompiler, MailStoreReport};
pub use fetchmail::RemoteFetchCompiler;
pub use syntax_check::{SYNTAX_CHECK_TIMEOUT, check_syntax};

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Rendered output together with where and how it has to land on disk.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct Artifact {
    path: PathBuf,
    contents: String,
    mode: u32,
    #[getter(skip)]
    owner: Option<Ownership>,
}

impl Artifact {
    pub fn new(path: PathBuf, contents: String, mode: u32, owner: Option<Ownership>) -> Self {
        Self {
            path,
            contents,
            mode,
            owner,
        }
    }

    /// Replaces the target file.
    ///
    /// Contents go to a sibling temporary file that gets its mode and owner before being
    /// renamed over the target, so readers never see a partial file, wider permissions
    /// or the wrong owner. A failed ownership change is only a warning.
    pub fn write(&self) -> Result<(), CompileError> {
        let write_error = |source| CompileError::Write {
            path: self.path.clone(),
            source,
        };
        let tmp = self.stage().map_err(write_error)?;
        fs::rename(&tmp, &self.path)
            .inspect_err(|_| {
                let _ = fs::remove_file(&tmp);
            })
            .map_err(write_error)?;
        info!("generated {}", self.path.display());
        Ok(())
    }

    /// Writes the temporary sibling with final mode and owner and returns its path.
    fn stage(&self) -> io::Result<PathBuf> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            DirBuilder::new().recursive(true).mode(0o755).create(parent)?;
        }

        let tmp = tmp_path(&self.path);
        debug!("writing to {}", tmp.display());
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(self.mode)
            .open(&tmp)?;
        file.set_permissions(Permissions::from_mode(self.mode))?;
        file.write_all(self.contents.as_bytes())?;
        file.sync_all()?;
        drop(file);

        if let Some(owner) = self.owner {
            set_owner(&tmp, owner);
        }
        Ok(tmp)
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
