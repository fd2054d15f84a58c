//! Transfer primitives for the relay pipeline.
//!
//! - [`StagingStore`] owns the single transient file that bridges the
//!   download and upload streams of one run.
//! - [`ChunkReader`] turns any async byte source into fixed-size chunks.
//! - [`ProgressThrottle`] decides which progress reports reach the user
//!   and renders them.

mod chunked;
mod progress;
mod staging;
mod types;
mod validation;

pub use chunked::ChunkReader;
pub use progress::{
    BAR_SEGMENTS, DEFAULT_THROTTLE_WINDOW, ProgressThrottle, RenderedUpdate, ThrottleDecision,
    format_size, render_bar,
};
pub use staging::{StagingHandle, StagingReader, StagingStore, StagingWriter};
pub use types::{Phase, ProgressState};
pub use validation::sanitize_file_name;

/// Default chunk size: 1 MiB.
///
/// Smaller chunks give finer-grained progress at the cost of more
/// read/write calls per transfer.
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("staging allocation failed for {path}: {source}")]
    Allocation {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("staging handle already released")]
    Released,
}
