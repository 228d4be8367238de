use std::{fmt::Write as _, path::PathBuf};

use derive_getters::Getters;
use log::{info, warn};

use super::{Artifact, CompileError};
use crate::{
    config::Layout,
    provision::{provision_index, provision_maildir, provision_root},
    source::{AccountDefinition, DovecotSettings, GlobalSettings, Tuning},
};

const MAIN_CONFIG_MODE: u32 = 0o644;
const USERS_FILE_MODE: u32 = 0o640;
const DISABLED_PORT: u16 = 0;

#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct MailStoreReport {
    users: usize,
    tls_enabled: bool,
    provisioning_failures: usize,
}

/// Generates the IMAP server config, its passwd-file and the mailbox directories.
pub struct MailStoreCompiler<'a> {
    layout: &'a Layout,
}

impl<'a> MailStoreCompiler<'a> {
    pub fn new(layout: &'a Layout) -> Self {
        Self { layout }
    }

    pub fn compile(
        &self,
        global: &GlobalSettings,
        accounts: &[&AccountDefinition],
    ) -> Result<MailStoreReport, CompileError> {
        info!("generating dovecot configuration");
        let tls = verified_tls_paths(global.dovecot());
        self.main_config(global.dovecot(), tls.as_ref()).write()?;
        self.credentials(accounts).write()?;
        info!(
            "user file {} holds {} users",
            self.layout.users_file().display(),
            accounts.len()
        );
        let provisioning_failures = self.provision(accounts);

        Ok(MailStoreReport {
            users: accounts.len(),
            tls_enabled: tls.is_some(),
            provisioning_failures,
        })
    }

    pub fn main_config(
        &self,
        settings: &DovecotSettings,
        tls: Option<&(PathBuf, PathBuf)>,
    ) -> Artifact {
        Artifact::new(
            self.layout.dovecot_conf().clone(),
            self.render_main_config(settings, tls),
            MAIN_CONFIG_MODE,
            None,
        )
    }

    pub fn credentials(&self, accounts: &[&AccountDefinition]) -> Artifact {
        let mut contents = String::new();
        for account in accounts {
            let credentials = account.credentials();
            let _ = writeln!(
                contents,
                "{}:{}::::::",
                credentials.username(),
                credentials.tagged_password()
            );
        }
        Artifact::new(
            self.layout.users_file().clone(),
            contents,
            USERS_FILE_MODE,
            Some(self.layout.users_owner()),
        )
    }

    fn render_main_config(
        &self,
        settings: &DovecotSettings,
        tls: Option<&(PathBuf, PathBuf)>,
    ) -> String {
        let owner = self.layout.mail_owner();
        let mail_home = self.layout.mail_root().join("%u");
        let (imaps, ssl) = match tls {
            Some((cert, key)) => (
                format!("    port = {}\n    ssl = yes\n", settings.imaps_port()),
                format!(
                    "ssl = yes\nssl_cert = <{}\nssl_key = <{}\n",
                    cert.display(),
                    key.display()
                ),
            ),
            None => (
                format!("    port = {DISABLED_PORT}\n"),
                "ssl = no\n".to_string(),
            ),
        };

        let mut out = format!(
            "# Generated by mailharbor, do not edit.
protocols = imap
listen = *

mail_location = maildir:{mail_home}

passdb {{
  driver = passwd-file
  args = username_format=%u {users_file}
}}

userdb {{
  driver = static
  args = uid={uid} gid={gid} home={mail_home}
}}

service imap-login {{
  inet_listener imap {{
    port = {imap_port}
  }}
  inet_listener imaps {{
{imaps}  }}
}}

{ssl}",
            mail_home = mail_home.display(),
            users_file = self.layout.users_file().display(),
            uid = owner.uid(),
            gid = owner.gid(),
            imap_port = settings.imap_port(),
        );

        if !settings.performance().is_empty() {
            out.push('\n');
            write_tuning(&mut out, settings.performance(), "");
        }
        if !settings.fts().is_empty() {
            out.push_str("\nplugin {\n");
            write_tuning(&mut out, settings.fts(), "  ");
            out.push_str("}\n");
        }

        out
    }

    fn provision(&self, accounts: &[&AccountDefinition]) -> usize {
        let owner = self.layout.mail_owner();
        let mut failures = 0;
        let mut count = |ok: bool| failures += usize::from(!ok);

        count(provision_root(self.layout.mail_root(), owner));
        count(provision_root(self.layout.fts_root(), owner));

        for username in accounts
            .iter()
            .map(|account| account.credentials().username())
            .filter(|username| !username.is_empty())
        {
            let mailbox = self.layout.mailbox_dir(username);
            count(provision_maildir(&mailbox, owner));
            count(provision_index(&self.layout.index_dir(username), owner));
            info!("mailbox directory ready: {}", mailbox.display());
        }

        failures
    }
}

fn write_tuning(out: &mut String, tuning: &Tuning, indent: &str) {
    for (key, value) in tuning.iter() {
        let _ = writeln!(out, "{indent}{key} = {value}");
    }
}

/// Certificate and key, only if both are configured and present on disk right now.
fn verified_tls_paths(settings: &DovecotSettings) -> Option<(PathBuf, PathBuf)> {
    let Some((cert, key)) = settings.tls_paths() else {
        warn!("TLS certificates not configured, IMAPS disabled");
        return None;
    };
    if cert.is_file() && key.is_file() {
        info!("TLS enabled with {}", cert.display());
        Some((cert.to_path_buf(), key.to_path_buf()))
    } else {
        warn!("TLS certificate files not found, IMAPS disabled");
        None
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeMap, fs, os::unix::fs::MetadataExt as _};

    use assertables::*;
    use rstest::*;
    use tempfile::{TempDir, tempdir};

    use super::*;
    use crate::{
        config::{LayoutBuilder, Ownership},
        source::validate,
    };

    struct TestLayout {
        dir: TempDir,
        layout: Layout,
    }

    #[fixture]
    fn test_layout() -> TestLayout {
        let dir = assert_ok!(tempdir());
        let metadata = assert_ok!(fs::metadata(dir.path()));
        let me = Ownership::new(metadata.uid(), metadata.gid());
        let layout = assert_ok!(
            LayoutBuilder::default()
                .dovecot_conf(dir.path().join("dovecot/dovecot.conf"))
                .users_file(dir.path().join("dovecot/users"))
                .fetchmailrc(dir.path().join("fetchmailrc"))
                .mail_root(dir.path().join("mail"))
                .fts_root(dir.path().join("fts"))
                .mail_owner(me)
                .users_owner(me)
                .build()
        );
        TestLayout { dir, layout }
    }

    fn accounts(yaml: &[(&str, String)]) -> Vec<AccountDefinition> {
        let documents = yaml
            .iter()
            .map(|(name, doc)| ((*name).to_string(), assert_ok!(serde_yaml::from_str(doc))))
            .collect::<BTreeMap<_, _>>();
        assert_ok!(validate(documents))
    }

    fn account(username: &str, extra: &str) -> String {
        format!(
            "account:\n  username: {username}\n  password: pw-{username}\n{extra}source:\n  protocol: imap\n  host: imap.example.com\n  port: 993\n"
        )
    }

    fn settings(yaml: &str) -> GlobalSettings {
        assert_ok!(serde_yaml::from_str(yaml))
    }

    #[rstest]
    fn test_default_ports_and_disabled_tls(test_layout: TestLayout) {
        let compiler = MailStoreCompiler::new(&test_layout.layout);
        let artifact = compiler.main_config(settings("{}").dovecot(), None);
        let contents = artifact.contents();

        assert_contains!(contents, "inet_listener imap {\n    port = 143\n");
        assert_contains!(contents, "inet_listener imaps {\n    port = 0\n");
        assert_not_contains!(contents, "port = 993");
        assert_contains!(contents, "ssl = no\n");
        assert_not_contains!(contents, "ssl_cert");
    }

    #[rstest]
    fn test_mail_location_is_templated_by_username(test_layout: TestLayout) {
        let compiler = MailStoreCompiler::new(&test_layout.layout);
        let artifact = compiler.main_config(settings("{}").dovecot(), None);
        let expected = format!(
            "mail_location = maildir:{}/%u\n",
            test_layout.dir.path().join("mail").display()
        );
        assert_contains!(artifact.contents(), &expected);
    }

    #[rstest]
    fn test_enabled_tls_renders_paths(test_layout: TestLayout) {
        let compiler = MailStoreCompiler::new(&test_layout.layout);
        let tls = (PathBuf::from("/certs/c.pem"), PathBuf::from("/certs/k.pem"));
        let artifact = compiler.main_config(
            settings("dovecot:\n  imaps_port: 10993\n").dovecot(),
            Some(&tls),
        );
        let contents = artifact.contents();

        assert_contains!(contents, "inet_listener imaps {\n    port = 10993\n    ssl = yes\n");
        assert_contains!(contents, "ssl_cert = </certs/c.pem\n");
        assert_contains!(contents, "ssl_key = </certs/k.pem\n");
    }

    #[rstest]
    fn test_tuning_blocks_pass_through(test_layout: TestLayout) {
        let compiler = MailStoreCompiler::new(&test_layout.layout);
        let global = settings(
            "dovecot:\n  performance:\n    mail_fsync: optimized\n  fts:\n    fts: flatcurve\n    fts_autoindex: true\n",
        );
        let artifact = compiler.main_config(global.dovecot(), None);

        assert_contains!(artifact.contents(), "\nmail_fsync = optimized\n");
        assert_contains!(
            artifact.contents(),
            "plugin {\n  fts = flatcurve\n  fts_autoindex = yes\n}\n"
        );
    }

    #[rstest]
    fn test_credentials_have_one_row_per_account(test_layout: TestLayout) {
        let accounts = accounts(&[
            ("alice", account("alice", "")),
            ("bob", account("bob", "  password_scheme: SHA512-CRYPT\n")),
        ]);
        let refs: Vec<&AccountDefinition> = accounts.iter().collect();
        let artifact = MailStoreCompiler::new(&test_layout.layout).credentials(&refs);

        assert_eq!(
            artifact.contents(),
            "alice:{PLAIN}pw-alice::::::\nbob:{SHA512-CRYPT}pw-bob::::::\n"
        );
        assert_eq!(artifact.mode(), 0o640);
    }

    #[rstest]
    fn test_missing_tls_files_disable_secure_port() {
        let global = settings("dovecot:\n  ssl_cert: /nonexistent/c.pem\n  ssl_key: /nonexistent/k.pem\n");
        assert_none!(verified_tls_paths(global.dovecot()));
    }

    #[rstest]
    fn test_tls_directories_are_not_tls_files(test_layout: TestLayout) {
        let cert = test_layout.dir.path().join("c.pem");
        let key = test_layout.dir.path().join("k.pem");
        assert_ok!(fs::create_dir(&cert));
        assert_ok!(fs::write(&key, "k"));
        let global = settings(&format!(
            "dovecot:\n  ssl_cert: {}\n  ssl_key: {}\n",
            cert.display(),
            key.display()
        ));
        assert_none!(verified_tls_paths(global.dovecot()));
    }

    #[rstest]
    fn test_present_tls_files_enable_secure_port(test_layout: TestLayout) {
        let cert = test_layout.dir.path().join("c.pem");
        let key = test_layout.dir.path().join("k.pem");
        assert_ok!(fs::write(&cert, "c"));
        assert_ok!(fs::write(&key, "k"));
        let global = settings(&format!(
            "dovecot:\n  ssl_cert: {}\n  ssl_key: {}\n",
            cert.display(),
            key.display()
        ));
        assert_eq!(assert_some!(verified_tls_paths(global.dovecot())), (cert, key));
    }

    #[rstest]
    fn test_compile_writes_files_and_provisions(test_layout: TestLayout) {
        let accounts = accounts(&[("alice", account("alice", ""))]);
        let refs: Vec<&AccountDefinition> = accounts.iter().collect();
        let report = assert_ok!(
            MailStoreCompiler::new(&test_layout.layout).compile(&settings("{}"), &refs)
        );

        assert_eq!(report.users(), 1);
        assert!(!report.tls_enabled());
        assert_eq!(report.provisioning_failures(), 0);
        let layout = &test_layout.layout;
        assert!(layout.dovecot_conf().is_file());
        assert!(layout.users_file().is_file());
        for subdir in ["cur", "new", "tmp"] {
            assert!(layout.mailbox_dir("alice").join(subdir).is_dir());
        }
        assert!(layout.index_dir("alice").is_dir());
    }

    #[rstest]
    fn test_compile_without_accounts_still_creates_roots(test_layout: TestLayout) {
        let report = assert_ok!(
            MailStoreCompiler::new(&test_layout.layout).compile(&settings("{}"), &[])
        );
        assert_eq!(report.users(), 0);
        assert!(test_layout.layout.mail_root().is_dir());
        assert!(test_layout.layout.fts_root().is_dir());
        assert_eq!(
            assert_ok!(fs::read_to_string(test_layout.layout.users_file())),
            ""
        );
    }
}
