use std::{fmt::Write as _, path::PathBuf};

use log::{info, warn};

use super::{Artifact, CompileError};
use crate::{
    config::Layout,
    source::{
        AccountDefinition, FetchOptions, FetchmailSettings, GlobalSettings, Overrides, Protocol,
    },
};

const RC_FILE_MODE: u32 = 0o600;

/// Generates the fetchmail rc file polling every enabled account.
pub struct RemoteFetchCompiler<'a> {
    layout: &'a Layout,
}

impl<'a> RemoteFetchCompiler<'a> {
    pub fn new(layout: &'a Layout) -> Self {
        Self { layout }
    }

    /// Writes the rc file and returns its path, or `None` if there was nothing to poll.
    pub fn compile(
        &self,
        global: &GlobalSettings,
        accounts: &[&AccountDefinition],
    ) -> Result<Option<PathBuf>, CompileError> {
        info!("generating fetchmail configuration");
        let Some(artifact) = self.rc_file(global.fetchmail(), accounts) else {
            warn!("no enabled accounts, skipping fetchmail configuration");
            return Ok(None);
        };
        artifact.write()?;
        info!(
            "fetchmail configuration {} polls {} accounts",
            artifact.path().display(),
            accounts.len()
        );
        Ok(Some(artifact.path().clone()))
    }

    pub fn rc_file(
        &self,
        settings: &FetchmailSettings,
        accounts: &[&AccountDefinition],
    ) -> Option<Artifact> {
        if accounts.is_empty() {
            return None;
        }

        let defaults = FetchOptions::defaults(settings);
        let mut out = String::from("# Generated by mailharbor, do not edit.\n");
        let _ = writeln!(out, "set daemon {}", settings.poll_interval());
        out.push_str(if settings.syslog() {
            "set syslog\n"
        } else {
            "set no syslog\n"
        });

        for account in accounts {
            let options = defaults.clone().apply(account.fetch());
            write_poll_entry(&mut out, account, &options, settings.mda().as_deref());
        }

        Some(Artifact::new(
            self.layout.fetchmailrc().clone(),
            out,
            RC_FILE_MODE,
            None,
        ))
    }
}

fn write_poll_entry(
    out: &mut String,
    account: &AccountDefinition,
    options: &FetchOptions,
    mda: Option<&str>,
) {
    let source = account.source();
    let credentials = account.credentials();
    let remote_user = source
        .username()
        .as_deref()
        .unwrap_or(credentials.username());
    let remote_password = source.password().unwrap_or(credentials.password());
    let protocol = match source.protocol() {
        Protocol::Imap => "IMAP",
        Protocol::Pop3 => "POP3",
    };

    let _ = writeln!(out);
    let _ = writeln!(out, "# account: {}", account.name());
    let _ = writeln!(
        out,
        "poll {} with proto {protocol} port {}",
        quote(source.host()),
        source.port()
    );
    let _ = writeln!(
        out,
        "    user {} there with password {} is {} here",
        quote(remote_user),
        quote(remote_password),
        quote(credentials.username())
    );
    if source.ssl().unwrap_or(true) {
        let _ = writeln!(out, "    ssl");
    }
    let _ = writeln!(
        out,
        "    {}",
        if options.keep_mail() { "keep" } else { "nokeep" }
    );
    let _ = writeln!(out, "    fetchlimit {}", options.batch_limit());
    if source.protocol() == Protocol::Imap {
        let folders: Vec<String> = options.folders().iter().map(|f| quote(f)).collect();
        let _ = writeln!(out, "    folder {}", folders.join(","));
    }
    if let Some(mda) = mda {
        let _ = writeln!(out, "    mda {}", quote(mda));
    }
}

fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeMap, fs, os::unix::fs::PermissionsExt as _};

    use assertables::*;
    use rstest::*;
    use tempfile::{TempDir, tempdir};

    use super::*;
    use crate::{config::LayoutBuilder, source::validate};

    struct TestLayout {
        _dir: TempDir,
        layout: Layout,
    }

    #[fixture]
    fn test_layout() -> TestLayout {
        let dir = assert_ok!(tempdir());
        let layout = assert_ok!(
            LayoutBuilder::default()
                .fetchmailrc(dir.path().join("etc/fetchmailrc"))
                .build()
        );
        TestLayout { _dir: dir, layout }
    }

    fn accounts(yaml: &[(&str, String)]) -> Vec<AccountDefinition> {
        let documents = yaml
            .iter()
            .map(|(name, doc)| ((*name).to_string(), assert_ok!(serde_yaml::from_str(doc))))
            .collect::<BTreeMap<_, _>>();
        assert_ok!(validate(documents))
    }

    fn settings(yaml: &str) -> GlobalSettings {
        assert_ok!(serde_yaml::from_str(yaml))
    }

    const POP3: &str = "account:
  username: alice
  password: local-pw
source:
  protocol: pop3
  host: pop.example.com
  port: 995
";

    const IMAP: &str = "account:
  username: bob
  password: local-pw
source:
  protocol: imap
  host: imap.example.com
  port: 143
  ssl: false
  username: bob@example.com
  password: remote \"pw\"
fetch:
  keep_mail: false
  batch_limit: 25
  folders: [INBOX, Archive]
";

    fn render(layout: &Layout, global: &str, accounts: &[AccountDefinition]) -> String {
        let refs: Vec<&AccountDefinition> = accounts.iter().collect();
        let artifact = assert_some!(
            RemoteFetchCompiler::new(layout).rc_file(settings(global).fetchmail(), &refs)
        );
        artifact.contents().clone()
    }

    #[rstest]
    fn test_global_defaults(test_layout: TestLayout) {
        let contents = render(&test_layout.layout, "{}", &accounts(&[("alice", POP3.into())]));
        assert_contains!(contents, "set daemon 300\nset no syslog\n");
    }

    #[rstest]
    fn test_global_overrides(test_layout: TestLayout) {
        let contents = render(
            &test_layout.layout,
            "fetchmail:\n  poll_interval: 60\n  syslog: true\n  mda: /usr/lib/dovecot/dovecot-lda -d %T\n",
            &accounts(&[("alice", POP3.into())]),
        );
        assert_contains!(contents, "set daemon 60\nset syslog\n");
        assert_contains!(contents, "    mda \"/usr/lib/dovecot/dovecot-lda -d %T\"\n");
    }

    #[rstest]
    fn test_pop3_entry_uses_defaults_and_local_credentials(test_layout: TestLayout) {
        let contents = render(&test_layout.layout, "{}", &accounts(&[("alice", POP3.into())]));
        assert_contains!(
            contents,
            "# account: alice
poll \"pop.example.com\" with proto POP3 port 995
    user \"alice\" there with password \"local-pw\" is \"alice\" here
    ssl
    keep
    fetchlimit 100
"
        );
        assert_not_contains!(contents, "folder");
    }

    #[rstest]
    fn test_account_fetch_section_wins(test_layout: TestLayout) {
        let contents = render(
            &test_layout.layout,
            "fetchmail:\n  keep_mail: true\n",
            &accounts(&[("bob", IMAP.into())]),
        );
        assert_contains!(
            contents,
            "# account: bob
poll \"imap.example.com\" with proto IMAP port 143
    user \"bob@example.com\" there with password \"remote \\\"pw\\\"\" is \"bob\" here
    nokeep
    fetchlimit 25
    folder \"INBOX\",\"Archive\"
"
        );
    }

    #[rstest]
    fn test_global_keep_mail_applies_without_account_override(test_layout: TestLayout) {
        let contents = render(
            &test_layout.layout,
            "fetchmail:\n  keep_mail: false\n",
            &accounts(&[("alice", POP3.into())]),
        );
        assert_contains!(contents, "    nokeep\n");
    }

    #[rstest]
    fn test_no_accounts_writes_nothing(test_layout: TestLayout) {
        let written = assert_ok!(
            RemoteFetchCompiler::new(&test_layout.layout).compile(&settings("{}"), &[])
        );
        assert_none!(written);
        assert!(!test_layout.layout.fetchmailrc().exists());
    }

    #[rstest]
    fn test_rc_file_is_owner_only(test_layout: TestLayout) {
        let accounts = accounts(&[("alice", POP3.into()), ("bob", IMAP.into())]);
        let refs: Vec<&AccountDefinition> = accounts.iter().collect();
        let path = assert_some!(assert_ok!(
            RemoteFetchCompiler::new(&test_layout.layout).compile(&settings("{}"), &refs)
        ));

        let mode = assert_ok!(fs::metadata(&path)).permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        let contents = assert_ok!(fs::read_to_string(&path));
        assert_contains!(contents, "# account: alice\n");
        assert_contains!(contents, "# account: bob\n");
    }

    #[rstest]
    #[case("plain", "\"plain\"")]
    #[case("a\"b", "\"a\\\"b\"")]
    #[case("back\\slash", "\"back\\\\slash\"")]
    fn test_quote_escapes(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(quote(raw), expected);
    }
}
