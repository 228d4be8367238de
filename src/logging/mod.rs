mod journal;

use std::{io::Write as _, time::SystemTime};

use anstyle::{AnsiColor, Effects};
use env_logger::Env;
use journal::stderr_is_journal;
use log::Level;

/// Installs the process-wide logger; `RUST_LOG` overrides the default `info` filter.
pub fn init() {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    if stderr_is_journal() {
        builder.format(|buf, record| {
            writeln!(
                buf,
                "<{}>{}: {}",
                syslog_priority(record.level()),
                record.target(),
                record.args()
            )
        });
    } else {
        let subtle = AnsiColor::BrightBlack.on_default();
        builder.format(move |buf, record| {
            write!(buf, "{subtle}[{subtle:#}")?;
            match jiff::Timestamp::try_from(SystemTime::now()) {
                Ok(now) => write!(buf, "{now:.3} ")?,
                Err(_) => write!(buf, "timestamp_error ")?,
            }
            let level_style = match record.level() {
                Level::Error => AnsiColor::Red.on_default().effects(Effects::BOLD),
                Level::Warn => AnsiColor::Yellow.on_default(),
                Level::Info => AnsiColor::Green.on_default(),
                Level::Debug => AnsiColor::Blue.on_default(),
                Level::Trace => AnsiColor::Cyan.on_default(),
            };
            write!(
                buf,
                "{level_style}{}{level_style:#} {}",
                record.level(),
                record.target()
            )?;
            if let Some(line) = record.line() {
                write!(buf, ":{line}")?;
            }
            write!(buf, "{subtle}]{subtle:#} ")?;
            writeln!(buf, "{}", record.args())
        });
    }
    builder.init();
}

fn syslog_priority(level: Level) -> u8 {
    match level {
        Level::Error => 3,
        Level::Warn => 4,
        Level::Info => 6,
        Level::Debug | Level::Trace => 7,
    }
}
