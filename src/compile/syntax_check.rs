use std::{path::Path, process::Stdio, time::Duration};

use log::{debug, error, info};
use tokio::{process::Command, time::timeout};

pub const SYNTAX_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs `<tool> -n -c <config>` and reports whether the daemon accepts the config.
///
/// Failures and timeouts are logged; written files are left untouched either way.
pub fn check_syntax(tool: &Path, config: &Path, limit: Duration) -> bool {
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .enable_time()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("cannot start runtime for config validation: {e}");
            return false;
        }
    };

    rt.block_on(async {
        let mut command = Command::new(tool);
        command
            .arg("-n")
            .arg("-c")
            .arg(config)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        debug!("running {command:?}");

        match timeout(limit, command.output()).await {
            Ok(Ok(output)) if output.status.success() => {
                info!("{} is valid", config.display());
                true
            }
            Ok(Ok(output)) => {
                error!(
                    "configuration validation failed ({}): {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                false
            }
            Ok(Err(e)) => {
                error!("configuration validation error: {e}");
                false
            }
            Err(_) => {
                error!("configuration validation timed out after {limit:?}");
                false
            }
        }
    })
}
