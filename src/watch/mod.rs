mod debounce;

use std::{
    io,
    path::{Path, PathBuf},
    sync::mpsc::{self, Receiver, RecvTimeoutError},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use log::{debug, error, info};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher as _};
use thiserror::Error;

use crate::source::is_config_file;

use debounce::{Debouncer, QUIET_PERIOD};

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("cannot watch {path}: {source}")]
    Notify {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
    #[error("cannot start watcher thread: {0}")]
    Spawn(#[from] io::Error),
}

/// Recompiles whenever a config file below the watched directory changes.
#[derive(Debug)]
pub struct ConfigWatcher {
    watcher: RecommendedWatcher,
    handle: JoinHandle<()>,
}

impl ConfigWatcher {
    /// Starts watching `config_dir` recursively and calls `on_change` from a background
    /// thread once changes have settled for [`QUIET_PERIOD`].
    pub fn start<F>(config_dir: &Path, on_change: F) -> Result<Self, WatchError>
    where
        F: FnMut() + Send + 'static,
    {
        let notify_error = |source| WatchError::Notify {
            path: config_dir.to_path_buf(),
            source,
        };
        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(tx).map_err(notify_error)?;
        watcher
            .watch(config_dir, RecursiveMode::Recursive)
            .map_err(notify_error)?;

        let handle = thread::Builder::new()
            .name("config-watcher".to_string())
            .spawn(move || debounce_events(&rx, QUIET_PERIOD, on_change))?;
        info!("watching config directory {}", config_dir.display());

        Ok(Self { watcher, handle })
    }

    /// Blocks for as long as the watcher runs.
    pub fn join(self) {
        let Self { watcher, handle } = self;
        if handle.join().is_err() {
            error!("config watcher thread panicked");
        }
        drop(watcher);
    }
}

/// Drives a [`Debouncer`] from a queue of filesystem events until the queue closes.
pub fn debounce_events<F>(
    events: &Receiver<notify::Result<Event>>,
    quiet: Duration,
    mut on_change: F,
) where
    F: FnMut(),
{
    let mut debouncer = Debouncer::new(quiet);
    loop {
        let received = match debouncer.deadline() {
            None => events.recv().map_err(|_| RecvTimeoutError::Disconnected),
            Some(deadline) => {
                events.recv_timeout(deadline.saturating_duration_since(Instant::now()))
            }
        };

        match received {
            Ok(Ok(event)) => {
                if is_config_change(&event) {
                    info!("config changed: {:?}", event.paths);
                    debouncer.changed(Instant::now());
                    debug!("{:?}", debouncer.state());
                } else {
                    debug!("ignoring {event:?}");
                }
            }
            Ok(Err(e)) => error!("watch error: {e}"),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        // Unrelated events must not postpone a recompile that is already due.
        if debouncer.fire(Instant::now()) {
            on_change();
        }
    }
}

fn is_config_change(event: &Event) -> bool {
    (event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove())
        && event.paths.iter().any(|path| is_config_file(path))
}
