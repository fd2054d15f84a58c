//! User-facing message texts.

use filerelay_destinations::Destination;

use crate::error::RelayError;

/// Text of the status message posted when a run starts.
pub const STARTING: &str = "📥 Downloading from Telegram...";

/// Shown while the destination is being resolved.
pub const RESOLVING: &str = "🔍 Looking up upload server...";

pub fn uploading(destination: &Destination) -> String {
    format!("📤 Uploading to {destination}...")
}

pub fn success(display_name: &str, link: &str) -> String {
    format!("✅ Upload complete!\n\n📄 File: {display_name}\n🔗 Link: {link}")
}

pub fn failure(error: &RelayError) -> String {
    match error {
        RelayError::Cancelled => "⛔ Upload cancelled.".to_string(),
        other => format!("❌ Upload failed: {}", short_cause(&other.to_string())),
    }
}

/// First line of `detail`, bounded for display.
fn short_cause(detail: &str) -> String {
    const MAX: usize = 200;
    let line = detail.lines().next().unwrap_or_default();
    if line.chars().count() <= MAX {
        line.to_string()
    } else {
        let cut: String = line.chars().take(MAX).collect();
        format!("{cut}…")
    }
}
