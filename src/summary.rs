use crate::FailureKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Lock-free per-kind error counters shared by every worker of a run.
#[derive(Debug, Default)]
pub struct ErrorTally {
    rate_limited: AtomicU64,
    network: AtomicU64,
    remote: AtomicU64,
    decode: AtomicU64,
    auth: AtomicU64,
    cancelled: AtomicU64,
    local: AtomicU64,
}

impl ErrorTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, kind: FailureKind) {
        self.counter(kind).fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self, kind: FailureKind) -> u64 {
        self.counter(kind).load(Ordering::Relaxed)
    }

    fn counter(&self, kind: FailureKind) -> &AtomicU64 {
        match kind {
            FailureKind::RateLimited => &self.rate_limited,
            FailureKind::Network => &self.network,
            FailureKind::Remote => &self.remote,
            FailureKind::Decode => &self.decode,
            FailureKind::Auth => &self.auth,
            FailureKind::Cancelled => &self.cancelled,
            FailureKind::Local => &self.local,
        }
    }

    pub fn summary(&self) -> ErrorSummary {
        ErrorSummary {
            rate_limited: self.count(FailureKind::RateLimited),
            network: self.count(FailureKind::Network),
            remote: self.count(FailureKind::Remote),
            decode: self.count(FailureKind::Decode),
            auth: self.count(FailureKind::Auth),
            cancelled: self.count(FailureKind::Cancelled),
            local: self.count(FailureKind::Local),
        }
    }
}

/// Snapshot of [`ErrorTally`]: dropped branches per failure kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSummary {
    pub rate_limited: u64,
    pub network: u64,
    pub remote: u64,
    pub decode: u64,
    pub auth: u64,
    pub cancelled: u64,
    pub local: u64,
}

impl ErrorSummary {
    pub fn total(&self) -> u64 {
        self.rate_limited
            + self.network
            + self.remote
            + self.decode
            + self.auth
            + self.cancelled
            + self.local
    }

    pub fn is_clean(&self) -> bool {
        self.total() == 0
    }
}

impl fmt::Display for ErrorSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clean() {
            return write!(f, "no errors");
        }

        let parts: Vec<String> = [
            ("rate limited", self.rate_limited),
            ("network", self.network),
            ("remote", self.remote),
            ("decode", self.decode),
            ("auth", self.auth),
            ("cancelled", self.cancelled),
            ("local", self.local),
        ]
        .iter()
        .filter(|(_, count)| *count > 0)
        .map(|(label, count)| format!("{count} {label}"))
        .collect();

        write!(f, "{}", parts.join(", "))
    }
}

/// Outcome of one export run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSummary {
    pub artist_id: String,
    /// Album ids handed to the track discovery stage
    pub albums_discovered: u64,
    /// Distinct track ids handed to the detail stage
    pub tracks_discovered: u64,
    /// Track ids seen more than once and skipped
    pub duplicate_tracks: u64,
    /// Records present in the final flush
    pub records_written: usize,
    pub rate_limit_raises: u64,
    pub flushes: u64,
    pub errors: ErrorSummary,
    pub elapsed: Duration,
    /// The run was stopped early, either externally or by a fatal error
    pub cancelled: bool,
}

impl ExportSummary {
    /// Whether every discovered track made it into the output.
    pub fn is_complete(&self) -> bool {
        !self.cancelled
            && self.errors.is_clean()
            && self.records_written as u64 == self.tracks_discovered
    }

    /// One-line human readable report.
    pub fn summary_message(&self) -> String {
        let mut message = format!(
            "Exported {} of {} tracks from {} albums for artist {} in {:.1}s ({})",
            self.records_written,
            self.tracks_discovered,
            self.albums_discovered,
            self.artist_id,
            self.elapsed.as_secs_f64(),
            self.errors
        );
        if self.rate_limit_raises > 0 {
            message.push_str(&format!(
                "; throttled {} times",
                self.rate_limit_raises
            ));
        }
        if self.duplicate_tracks > 0 {
            message.push_str(&format!(
                "; skipped {} duplicate tracks",
                self.duplicate_tracks
            ));
        }
        if self.cancelled {
            message.push_str("; run was cancelled, output is partial");
        }
        message
    }
}
