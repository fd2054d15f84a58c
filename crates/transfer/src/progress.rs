use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::types::{Phase, ProgressState};

/// Default minimum interval between two emitted progress reports.
pub const DEFAULT_THROTTLE_WINDOW: Duration = Duration::from_millis(2500);

/// Number of segments in the rendered progress bar.
pub const BAR_SEGMENTS: usize = 10;

const FILLED: char = '■';
const EMPTY: char = '□';
const INDETERMINATE: &str = "[░░░░░░░░░░] 0%";

/// A progress report that passed the throttle, ready to display.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedUpdate {
    pub phase: Phase,
    pub bytes_transferred: u64,
    /// `None` when the size is unknown.
    pub bytes_total: Option<u64>,
    /// `None` when the percentage is indeterminate.
    pub percent: Option<f64>,
    pub text: String,
}

/// Outcome of feeding one report into the throttle.
#[derive(Debug, Clone, PartialEq)]
pub enum ThrottleDecision {
    Emit(RenderedUpdate),
    Suppressed,
}

impl ThrottleDecision {
    /// Returns the rendered update if this report was emitted.
    pub fn into_update(self) -> Option<RenderedUpdate> {
        match self {
            ThrottleDecision::Emit(update) => Some(update),
            ThrottleDecision::Suppressed => None,
        }
    }
}

/// Rate-limits and deduplicates progress reports for a single run.
///
/// A report is emitted when it is the first of its phase, when at least
/// one throttle window has passed since the last emission, or when it
/// completes the phase. A report repeating the byte count and total of
/// the last emission of the same phase is always suppressed.
///
/// Each run owns its own throttle; there is no process-wide state.
#[derive(Debug)]
pub struct ProgressThrottle {
    window: Duration,
    state: Option<ProgressState>,
}

impl ProgressThrottle {
    /// Creates a throttle with the given minimum window.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: None,
        }
    }

    /// The configured throttle window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Current progress cursor, if any report has been seen.
    pub fn state(&self) -> Option<&ProgressState> {
        self.state.as_ref()
    }

    /// Feeds an intermediate report.
    ///
    /// `bytes_total` of `None` or `Some(0)` means the size is unknown.
    pub fn report(
        &mut self,
        phase: Phase,
        bytes_transferred: u64,
        bytes_total: Option<u64>,
    ) -> ThrottleDecision {
        self.evaluate(phase, bytes_transferred, bytes_total, false)
    }

    /// Feeds the final report of a phase.
    ///
    /// Always emitted unless an identical report was already emitted. When
    /// the total was unknown, the transferred count becomes the total.
    pub fn finish(
        &mut self,
        phase: Phase,
        bytes_transferred: u64,
        bytes_total: Option<u64>,
    ) -> ThrottleDecision {
        let total = bytes_total
            .filter(|t| *t > 0)
            .or(Some(bytes_transferred));
        self.evaluate(phase, bytes_transferred, total, true)
    }

    fn evaluate(
        &mut self,
        phase: Phase,
        bytes_transferred: u64,
        bytes_total: Option<u64>,
        force: bool,
    ) -> ThrottleDecision {
        let now = Instant::now();
        let bytes_total = bytes_total.filter(|t| *t > 0);

        let state = match self.state.take() {
            Some(prev) if prev.phase == phase => prev,
            // A new phase keeps the emission clock but forgets the byte cursor.
            Some(prev) => ProgressState {
                last_emitted_at: prev.last_emitted_at,
                ..ProgressState::new(phase)
            },
            None => ProgressState::new(phase),
        };
        let state = self.state.insert(state);

        if bytes_transferred < state.bytes_transferred {
            debug!(
                %phase,
                reported = bytes_transferred,
                cursor = state.bytes_transferred,
                "ignoring backwards progress report"
            );
            return ThrottleDecision::Suppressed;
        }
        let same_total = state.bytes_total == bytes_total;
        state.bytes_transferred = bytes_transferred;
        state.bytes_total = bytes_total;

        if same_total && state.last_emitted_bytes == Some(bytes_transferred) {
            return ThrottleDecision::Suppressed;
        }

        let first_of_phase = state.last_emitted_bytes.is_none();
        let window_elapsed = state
            .last_emitted_at
            .is_none_or(|at| now.saturating_duration_since(at) >= self.window);
        let complete = force || bytes_total.is_some_and(|t| bytes_transferred >= t);

        if !(first_of_phase || window_elapsed || complete) {
            return ThrottleDecision::Suppressed;
        }

        state.last_emitted_at = Some(now);
        state.last_emitted_bytes = Some(bytes_transferred);

        let percent = percent_of(bytes_transferred, bytes_total);
        ThrottleDecision::Emit(RenderedUpdate {
            phase,
            bytes_transferred,
            bytes_total,
            percent,
            text: render_text(phase, bytes_transferred, bytes_total),
        })
    }
}

fn percent_of(transferred: u64, total: Option<u64>) -> Option<f64> {
    total
        .filter(|t| *t > 0)
        .map(|t| transferred as f64 * 100.0 / t as f64)
}

/// Renders the block bar with its percentage, e.g. `[■■■□□□□□□□] 33.3%`.
///
/// Unknown or zero totals render as an indeterminate bar.
pub fn render_bar(transferred: u64, total: Option<u64>) -> String {
    let Some(percent) = percent_of(transferred, total) else {
        return INDETERMINATE.to_string();
    };
    let filled = ((percent / 10.0).floor() as usize).min(BAR_SEGMENTS);
    let mut bar = String::with_capacity(BAR_SEGMENTS * 3 + 12);
    bar.push('[');
    bar.extend(std::iter::repeat_n(FILLED, filled));
    bar.extend(std::iter::repeat_n(EMPTY, BAR_SEGMENTS - filled));
    bar.push_str(&format!("] {percent:.1}%"));
    bar
}

/// Formats a byte count with one decimal in the largest fitting unit.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes}B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1}{}", UNITS[unit])
}

fn render_text(phase: Phase, transferred: u64, total: Option<u64>) -> String {
    let total_text = match total {
        Some(t) if t > 0 => format_size(t),
        _ => "unknown".to_string(),
    };
    format!(
        "{}\n{}\n\n📦 {} / {}",
        phase.header(),
        render_bar(transferred, total),
        format_size(transferred),
        total_text
    )
}
