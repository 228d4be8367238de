use std::sync::Arc;

use anyhow::{Context as _, Result};
use log::{error, info, warn};

use crate::{
    Args,
    config::{Layout, LayoutBuilder, Ownership},
    pipeline::{CycleReport, Pipeline},
    watch::ConfigWatcher,
};

pub fn run(args: &Args) -> Result<()> {
    let pipeline = Pipeline::new(layout(args)?);
    if args.watch {
        watch(pipeline)
    } else {
        compile_once(&pipeline)
    }
}

fn layout(args: &Args) -> Result<Layout> {
    let mut builder = LayoutBuilder::default();
    builder
        .config_dir(args.config_dir.clone())
        .dovecot_conf(args.dovecot_conf.clone())
        .users_file(args.users_file.clone())
        .fetchmailrc(args.fetchmailrc.clone())
        .mail_root(args.mail_root.clone())
        .fts_root(args.fts_root.clone())
        .mail_owner(Ownership::new(args.mail_uid, args.mail_gid))
        .users_owner(Ownership::new(args.users_uid, args.users_gid));
    if args.check {
        builder.syntax_check(args.doveconf.clone());
    }
    builder.build().context("incomplete output layout")
}

fn compile_once(pipeline: &Pipeline) -> Result<()> {
    let report = pipeline.run().context("configuration compilation failed")?;
    summarize(&report);
    Ok(())
}

fn summarize(report: &CycleReport) {
    let mail_store = report.mail_store();
    info!(
        "{} users, tls {}, {} security findings",
        mail_store.users(),
        if mail_store.tls_enabled() { "on" } else { "off" },
        report.findings().len()
    );
    if let Some(fetchmailrc) = report.fetchmail() {
        info!("fetchmail configuration written to {}", fetchmailrc.display());
    }
    if mail_store.provisioning_failures() > 0 {
        warn!(
            "{} directories could not be provisioned",
            mail_store.provisioning_failures()
        );
    }
    if report.syntax_valid() == Some(false) {
        warn!("generated dovecot configuration was rejected by the syntax check");
    }
}

/// Compiles once, then recompiles on every settled change until the watcher stops.
fn watch(pipeline: Pipeline) -> Result<()> {
    let pipeline = Arc::new(pipeline);
    if let Err(e) = compile_once(&pipeline) {
        error!("{e:#}");
    }

    let config_dir = pipeline.layout().config_dir().clone();
    let watcher = ConfigWatcher::start(&config_dir, move || {
        info!("recompiling after configuration change");
        if let Err(e) = compile_once(&pipeline) {
            error!("{e:#}");
        }
    })?;
    watcher.join();
    Ok(())
}
