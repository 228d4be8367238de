use std::{
    collections::BTreeMap,
    fs::{read_dir, read_to_string},
    io::ErrorKind,
    path::Path,
};

use log::{debug, error, info, warn};
use serde::de::DeserializeOwned;

use super::{LoadError, account::AccountDocument, global::GlobalSettings};

pub const GLOBAL_FILE: &str = "global.yaml";
pub const ACCOUNTS_DIR: &str = "accounts";
pub const CONFIG_EXTENSION: &str = "yaml";

/// Reads `<config_dir>/global.yaml`.
///
/// A missing file is not an error and yields the defaults, a malformed one is.
pub fn load_global(config_dir: &Path) -> Result<GlobalSettings, LoadError> {
    let path = config_dir.join(GLOBAL_FILE);
    let contents = match read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(
                "global config {} not found, using defaults",
                path.display()
            );
            return Ok(GlobalSettings::default());
        }
        Err(source) => return Err(LoadError::Read { path, source }),
    };

    info!("loading global config {}", path.display());
    parse_document(&contents).map_err(|source| LoadError::Parse { path, source })
}

/// Reads every `*.yaml` file in `<config_dir>/accounts`, keyed by file stem.
///
/// Files that cannot be read or parsed are logged and skipped.
pub fn load_accounts(config_dir: &Path) -> Result<BTreeMap<String, AccountDocument>, LoadError> {
    let accounts_dir = config_dir.join(ACCOUNTS_DIR);
    let entries = match read_dir(&accounts_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!("accounts directory {} not found", accounts_dir.display());
            return Ok(BTreeMap::new());
        }
        Err(source) => {
            return Err(LoadError::Read {
                path: accounts_dir,
                source,
            });
        }
    };

    let mut accounts = BTreeMap::new();
    for entry in entries {
        let entry = entry.map_err(|source| LoadError::Read {
            path: accounts_dir.clone(),
            source,
        })?;
        let path = entry.path();
        let Some(name) = account_name(&path) else {
            debug!("ignoring {}", path.display());
            continue;
        };
        if path.is_dir() {
            debug!("ignoring directory {}", path.display());
            continue;
        }

        info!("loading account config {}", path.display());
        match read_account(&path) {
            Ok(document) => {
                accounts.insert(name, document);
            }
            Err(e) => error!("skipping account {name}: {e}"),
        }
    }

    Ok(accounts)
}

pub fn is_config_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == CONFIG_EXTENSION)
}

fn account_name(path: &Path) -> Option<String> {
    if !is_config_file(path) {
        return None;
    }
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
}

fn read_account(path: &Path) -> Result<AccountDocument, LoadError> {
    let contents = read_to_string(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_document(&contents).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

// An empty document is treated like an empty mapping.
fn parse_document<T: DeserializeOwned + Default>(contents: &str) -> Result<T, serde_yaml::Error> {
    if contents.trim().is_empty() {
        return Ok(T::default());
    }
    let value: serde_yaml::Value = serde_yaml::from_str(contents)?;
    if value.is_null() {
        Ok(T::default())
    } else {
        serde_yaml::from_value(value)
    }
}

#[cfg(test)]
mod tests {
    use std::fs::{create_dir, write};

    use assertables::*;
    use rstest::*;
    use tempfile::{TempDir, tempdir};

    use super::*;

    #[fixture]
    fn config_dir() -> TempDir {
        let dir = assert_ok!(tempdir());
        assert_ok!(create_dir(dir.path().join(ACCOUNTS_DIR)));
        dir
    }

    fn write_account(dir: &TempDir, file: &str, contents: &str) {
        assert_ok!(write(dir.path().join(ACCOUNTS_DIR).join(file), contents));
    }

    #[rstest]
    fn test_missing_global_yields_defaults(config_dir: TempDir) {
        let settings = assert_ok!(load_global(config_dir.path()));
        assert_eq!(settings.dovecot().imap_port(), 143);
    }

    #[rstest]
    fn test_empty_global_yields_defaults(config_dir: TempDir) {
        assert_ok!(write(config_dir.path().join(GLOBAL_FILE), ""));
        let settings = assert_ok!(load_global(config_dir.path()));
        assert_eq!(settings.fetchmail().poll_interval(), 300);
    }

    #[rstest]
    fn test_malformed_global_is_an_error(config_dir: TempDir) {
        assert_ok!(write(
            config_dir.path().join(GLOBAL_FILE),
            "dovecot: [unclosed"
        ));
        let e = assert_err!(load_global(config_dir.path()));
        assert!(matches!(e, LoadError::Parse { .. }));
    }

    #[rstest]
    fn test_missing_accounts_dir_yields_nothing() {
        let dir = assert_ok!(tempdir());
        assert!(assert_ok!(load_accounts(dir.path())).is_empty());
    }

    #[rstest]
    fn test_accounts_keyed_by_file_stem(config_dir: TempDir) {
        write_account(&config_dir, "alice.yaml", "account: {username: alice}\n");
        write_account(&config_dir, "bob.yaml", "enabled: false\n");
        write_account(&config_dir, "notes.txt", "not an account");
        write_account(&config_dir, "carol.yml", "account: {username: carol}\n");

        let accounts = assert_ok!(load_accounts(config_dir.path()));
        let names: Vec<&str> = accounts.keys().map(String::as_str).collect();
        assert_eq!(names, ["alice", "bob"]);
    }

    #[rstest]
    fn test_malformed_account_is_skipped(config_dir: TempDir) {
        write_account(&config_dir, "alice.yaml", "account: {username: alice}\n");
        write_account(&config_dir, "broken.yaml", "account: [unclosed\n");

        let accounts = assert_ok!(load_accounts(config_dir.path()));
        assert!(accounts.contains_key("alice"));
        assert!(!accounts.contains_key("broken"));
    }

    #[rstest]
    #[case("a.yaml", true)]
    #[case("dir/b.yaml", true)]
    #[case("a.yaml.swp", false)]
    #[case("a.yml", false)]
    #[case("yaml", false)]
    fn test_config_file_matches_extension_only(#[case] path: &str, #[case] expected: bool) {
        assert_eq!(is_config_file(Path::new(path)), expected);
    }
}
