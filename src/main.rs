mod audit;
mod cli;
mod compile;
mod config;
mod logging;
mod pipeline;
mod provision;
mod source;
mod watch;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

/// Compiles the mail server configuration from YAML sources.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Directory holding `global.yaml` and `accounts/*.yaml`
    #[arg(long, env = "MAILHARBOR_CONFIG_DIR", default_value = config::DEFAULT_CONFIG_DIR)]
    config_dir: PathBuf,
    /// Generated dovecot main configuration
    #[arg(long, default_value = config::DEFAULT_DOVECOT_CONF)]
    dovecot_conf: PathBuf,
    /// Generated dovecot passwd-file
    #[arg(long, default_value = config::DEFAULT_USERS_FILE)]
    users_file: PathBuf,
    /// Generated fetchmail configuration
    #[arg(long, default_value = config::DEFAULT_FETCHMAILRC)]
    fetchmailrc: PathBuf,
    /// Root of the per-user maildirs
    #[arg(long, default_value = config::DEFAULT_MAIL_ROOT)]
    mail_root: PathBuf,
    /// Root of the per-user full-text-search indexes
    #[arg(long, default_value = config::DEFAULT_FTS_ROOT)]
    fts_root: PathBuf,
    #[arg(long, default_value_t = config::VMAIL_UID)]
    mail_uid: u32,
    #[arg(long, default_value_t = config::VMAIL_GID)]
    mail_gid: u32,
    #[arg(long, default_value_t = config::USERS_FILE_UID)]
    users_uid: u32,
    #[arg(long, default_value_t = config::USERS_FILE_GID)]
    users_gid: u32,
    /// Validate the generated dovecot configuration with `--doveconf`
    #[arg(long)]
    check: bool,
    #[arg(long, default_value = "doveconf")]
    doveconf: PathBuf,
    /// Keep running and recompile whenever the sources change
    #[arg(long)]
    watch: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init();

    cli::run(&args)
}
