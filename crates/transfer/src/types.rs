use tokio::time::Instant;

/// Streaming phase of a relay run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Pulling bytes from the origin platform into staging.
    Downloading,
    /// Pushing staged bytes to the destination.
    Uploading,
}

impl Phase {
    /// Header line shown above the progress bar.
    pub fn header(self) -> &'static str {
        match self {
            Phase::Downloading => "📥 Downloading from Telegram:",
            Phase::Uploading => "📤 Uploading to destination:",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Downloading => f.write_str("downloading"),
            Phase::Uploading => f.write_str("uploading"),
        }
    }
}

/// Per-run progress cursor owned by a [`ProgressThrottle`](crate::ProgressThrottle).
///
/// `last_emitted_at` never moves backwards within a run, and two emitted
/// reports are at least one throttle window apart unless the later one
/// completes its phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressState {
    pub phase: Phase,
    pub bytes_transferred: u64,
    pub bytes_total: Option<u64>,
    pub last_emitted_at: Option<Instant>,
    /// Byte count of the last emitted report in this phase.
    pub last_emitted_bytes: Option<u64>,
}

impl ProgressState {
    /// Fresh state at the start of `phase`.
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            bytes_transferred: 0,
            bytes_total: None,
            last_emitted_at: None,
            last_emitted_bytes: None,
        }
    }
}
