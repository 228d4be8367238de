use std::path::{Path, PathBuf};

use derive_builder::Builder;
use derive_getters::Getters;

pub const DEFAULT_CONFIG_DIR: &str = "/config";
pub const DEFAULT_DOVECOT_CONF: &str = "/etc/dovecot/dovecot.conf";
pub const DEFAULT_USERS_FILE: &str = "/etc/dovecot/users";
pub const DEFAULT_FETCHMAILRC: &str = "/etc/fetchmailrc";
pub const DEFAULT_MAIL_ROOT: &str = "/data/mail";
pub const DEFAULT_FTS_ROOT: &str = "/data/fts";

/// Numeric identity of the mail daemon; owns every mailbox and index directory.
pub const VMAIL_UID: u32 = 5000;
pub const VMAIL_GID: u32 = 5000;
/// `root:dovecot`, owner of the credentials file.
pub const USERS_FILE_UID: u32 = 0;
pub const USERS_FILE_GID: u32 = 102;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ownership {
    uid: u32,
    gid: u32,
}

impl Ownership {
    pub fn new(uid: u32, gid: u32) -> Self {
        Self { uid, gid }
    }

    pub fn uid(self) -> u32 {
        self.uid
    }

    pub fn gid(self) -> u32 {
        self.gid
    }
}

/// Where sources are read from and artifacts are written to.
#[derive(Debug, Clone, Builder, Getters)]
#[builder(setter(into))]
pub struct Layout {
    #[builder(default = "PathBuf::from(DEFAULT_CONFIG_DIR)")]
    config_dir: PathBuf,
    #[builder(default = "PathBuf::from(DEFAULT_DOVECOT_CONF)")]
    dovecot_conf: PathBuf,
    #[builder(default = "PathBuf::from(DEFAULT_USERS_FILE)")]
    users_file: PathBuf,
    #[builder(default = "PathBuf::from(DEFAULT_FETCHMAILRC)")]
    fetchmailrc: PathBuf,
    #[builder(default = "PathBuf::from(DEFAULT_MAIL_ROOT)")]
    mail_root: PathBuf,
    #[builder(default = "PathBuf::from(DEFAULT_FTS_ROOT)")]
    fts_root: PathBuf,
    #[builder(default = "Ownership::new(VMAIL_UID, VMAIL_GID)")]
    #[getter(skip)]
    mail_owner: Ownership,
    #[builder(default = "Ownership::new(USERS_FILE_UID, USERS_FILE_GID)")]
    #[getter(skip)]
    users_owner: Ownership,
    /// Config checker run against the generated main config, if any.
    #[builder(default, setter(strip_option))]
    syntax_check: Option<PathBuf>,
}

impl Layout {
    pub fn mail_owner(&self) -> Ownership {
        self.mail_owner
    }

    pub fn users_owner(&self) -> Ownership {
        self.users_owner
    }

    pub fn mailbox_dir(&self, username: &str) -> PathBuf {
        self.mail_root.join(username)
    }

    pub fn index_dir(&self, username: &str) -> PathBuf {
        self.fts_root.join(username)
    }

    pub fn syntax_check_tool(&self) -> Option<&Path> {
        self.syntax_check.as_deref()
    }
}
