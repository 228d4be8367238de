use std::{
    fs::DirBuilder,
    os::unix::fs::{DirBuilderExt as _, chown},
    path::Path,
};

use log::{trace, warn};

use crate::config::Ownership;

pub const MAILDIR_SUBDIRS: [&str; 3] = ["cur", "new", "tmp"];

const ROOT_MODE: u32 = 0o755;
const MAILBOX_MODE: u32 = 0o700;

/// Creates `path` (and missing parents) if needed and hands it to `owner`.
///
/// Never fails: problems are logged as warnings and reported through the return
/// value, since a cycle must survive filesystems without ownership support.
pub fn provision_dir(path: &Path, mode: u32, owner: Ownership) -> bool {
    let mut builder = DirBuilder::new();
    builder.recursive(true).mode(mode);
    if let Err(e) = builder.create(path) {
        warn!("failed to create directory {}: {e}", path.display());
        return false;
    }
    set_owner(path, owner)
}

pub fn provision_root(path: &Path, owner: Ownership) -> bool {
    provision_dir(path, ROOT_MODE, owner)
}

/// Creates `<mailbox>/{cur,new,tmp}` and the mailbox itself.
pub fn provision_maildir(mailbox: &Path, owner: Ownership) -> bool {
    let mut ok = true;
    for subdir in MAILDIR_SUBDIRS {
        ok &= provision_dir(&mailbox.join(subdir), MAILBOX_MODE, owner);
    }
    ok & set_owner(mailbox, owner)
}

pub fn provision_index(index: &Path, owner: Ownership) -> bool {
    provision_dir(index, MAILBOX_MODE, owner)
}

/// Changes ownership of `path` unless it already has it.
pub fn set_owner(path: &Path, owner: Ownership) -> bool {
    if let Ok(stat) = rustix::fs::stat(path) {
        if stat.st_uid == owner.uid() && stat.st_gid == owner.gid() {
            trace!("{} already owned by {owner:?}", path.display());
            return true;
        }
    }

    match chown(path, Some(owner.uid()), Some(owner.gid())) {
        Ok(()) => true,
        Err(e) => {
            warn!(
                "failed to set owner {}:{} for {}: {e}",
                owner.uid(),
                owner.gid(),
                path.display()
            );
            false
        }
    }
}
