use std::{env, io, os::fd::AsFd as _};

/// Whether stderr is the stream systemd handed us for the journal.
///
/// systemd exports `$JOURNAL_STREAM` as `<device>:<inode>` of the stream it connected;
/// it is only trusted if it still describes our stderr (see `systemd.exec(5)`).
pub fn stderr_is_journal() -> bool {
    let Some(stream) = env::var_os("JOURNAL_STREAM") else {
        return false;
    };
    let Some((dev, ino)) = stream.to_str().and_then(parse_stream) else {
        return false;
    };
    rustix::fs::fstat(io::stderr().as_fd())
        .is_ok_and(|stat| u64::from(stat.st_dev) == dev && u64::from(stat.st_ino) == ino)
}

fn parse_stream(value: &str) -> Option<(u64, u64)> {
    let (dev, ino) = value.split_once(':')?;
    Some((dev.parse().ok()?, ino.parse().ok()?))
}
