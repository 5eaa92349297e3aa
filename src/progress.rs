/// Advisory progress notification for long-running stages.
///
/// Messages are human-readable milestones ("sorting", "partitioning",
/// "building XICs"); there is no contract on frequency or format and sinks
/// must not fail. Stages take `&dyn ProgressSink` so callers can forward
/// messages to a logger, a channel, or drop them entirely.
pub trait ProgressSink: Sync {
    fn progress(&self, message: &str);
}

/// Discards all messages.
pub struct NullSink;

impl ProgressSink for NullSink {
    fn progress(&self, _message: &str) {}
}

/// Forwards messages to the `log` crate at info level.
pub struct LogSink;

impl ProgressSink for LogSink {
    fn progress(&self, message: &str) {
        log::info!("{}", message);
    }
}
