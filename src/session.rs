//! Per-connection session state and commit pacing.
//!
//! A `Session` lives exactly as long as one open channel: created on
//! connect, dropped on disconnect, rebuilt from scratch on reconnect. The
//! commit throttle decides when the appended capture audio is finalized into
//! a recognizable segment; committing on every frame would fragment
//! recognition, so commits require both a minimum of appended audio and a
//! minimum spacing in time.

use std::time::{Duration, Instant};

use crate::protocol::AudioFormat;

/// Commit throttle tunables.
#[derive(Debug, Clone, Copy)]
pub struct CommitPolicy {
    /// Appended audio required before a throttled commit may fire.
    pub min_commit_ms: u32,
    /// Minimum spacing between consecutive commits.
    pub min_commit_interval_ms: u64,
}

impl Default for CommitPolicy {
    fn default() -> Self {
        Self {
            min_commit_ms: 120,
            min_commit_interval_ms: 300,
        }
    }
}

#[derive(Debug)]
pub struct Session {
    pub channel_open: bool,
    pub input_format: AudioFormat,
    pub output_format: AudioFormat,
    appended_ms_since_commit: u32,
    last_commit_at: Option<Instant>,
}

impl Session {
    pub fn new(input_format: AudioFormat, output_format: AudioFormat) -> Self {
        Self {
            channel_open: true,
            input_format,
            output_format,
            appended_ms_since_commit: 0,
            last_commit_at: None,
        }
    }

    /// Account for one transmitted capture frame.
    pub fn record_append(&mut self, duration_ms: u32) {
        self.appended_ms_since_commit += duration_ms;
    }

    pub fn appended_ms_since_commit(&self) -> u32 {
        self.appended_ms_since_commit
    }

    /// Throttled commit decision. The caller supplies `now` so tests control
    /// the clock.
    pub fn should_commit(&self, policy: &CommitPolicy, now: Instant) -> bool {
        if self.appended_ms_since_commit < policy.min_commit_ms {
            return false;
        }
        match self.last_commit_at {
            None => true,
            Some(last) => {
                now.duration_since(last) >= Duration::from_millis(policy.min_commit_interval_ms)
            }
        }
    }

    /// Reset the accounting after a commit was sent.
    pub fn mark_commit(&mut self, now: Instant) {
        self.appended_ms_since_commit = 0;
        self.last_commit_at = Some(now);
    }

    /// Forced-commit guard: true if there is anything to commit. A commit
    /// with zero appended audio is a no-op, never an error.
    pub fn has_pending_audio(&self) -> bool {
        self.appended_ms_since_commit > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(rate: u32) -> AudioFormat {
        AudioFormat {
            encoding: "pcm16".to_string(),
            sample_rate: rate,
        }
    }

    fn session() -> Session {
        Session::new(format(16000), format(24000))
    }

    #[test]
    fn no_commit_below_minimum_appended() {
        let policy = CommitPolicy {
            min_commit_ms: 120,
            min_commit_interval_ms: 300,
        };
        let mut s = session();
        let now = Instant::now();
        s.record_append(110);
        assert!(!s.should_commit(&policy, now));
        s.record_append(10);
        assert!(s.should_commit(&policy, now));
    }

    #[test]
    fn commits_respect_minimum_interval() {
        // Appends of 50ms every 10ms for 500ms; commits must come no more
        // often than once per 300ms once 120ms has accumulated.
        let policy = CommitPolicy {
            min_commit_ms: 120,
            min_commit_interval_ms: 300,
        };
        let mut s = session();
        let base = Instant::now();
        let mut commit_times: Vec<u64> = Vec::new();

        for step in 0..50u64 {
            let now = base + Duration::from_millis(step * 10);
            s.record_append(50);
            if s.should_commit(&policy, now) {
                s.mark_commit(now);
                commit_times.push(step * 10);
            }
        }

        assert!(!commit_times.is_empty());
        // First commit waits for 120ms of appended audio (3 x 50ms appends).
        assert_eq!(commit_times[0], 20);
        for pair in commit_times.windows(2) {
            assert!(
                pair[1] - pair[0] >= 300,
                "commits at {} and {} are closer than 300ms",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn mark_commit_resets_accounting() {
        let policy = CommitPolicy::default();
        let mut s = session();
        let now = Instant::now();
        s.record_append(500);
        assert!(s.should_commit(&policy, now));
        s.mark_commit(now);
        assert_eq!(s.appended_ms_since_commit(), 0);
        assert!(!s.has_pending_audio());
        assert!(!s.should_commit(&policy, now));
    }

    #[test]
    fn forced_commit_guard_requires_pending_audio() {
        let mut s = session();
        assert!(!s.has_pending_audio());
        s.record_append(10);
        assert!(s.has_pending_audio());
    }
}
