//! Finished-session notifications and the in-memory listening log.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::library::{Track, TrackId};


/// Why a playback session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EndReason {
    /// Explicit stop request.
    Stopped,
    /// A newer play request took over the device.
    Preempted,
    /// The decoder ran out of samples.
    Finished,
    /// The track was deleted from the library.
    Removed,
    /// The engine was shut down.
    Shutdown,
}

impl EndReason {
    pub fn as_str(self) -> &'static str {
        match self {
            EndReason::Stopped => "stopped",
            EndReason::Preempted => "preempted",
            EndReason::Finished => "finished",
            EndReason::Removed => "removed",
            EndReason::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of one session, delivered after its stream was released.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub track: Track,
    pub started_at: DateTime<Utc>,
    /// Listening time, paused intervals excluded.
    pub elapsed: Duration,
    pub reason: EndReason,
}

/// Receiver of finished-session notifications.
///
/// Called from the engine worker at most once per session, never while the
/// output device is still bound.
pub trait SessionSink: Send + Sync {
    fn session_finished(&self, report: &SessionReport);
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListenedTrack {
    pub track_name: String,
    pub track_id: TrackId,
    pub at: DateTime<Utc>,
    /// Whole seconds listened.
    pub during: u64,
    pub reason: EndReason,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MostListened {
    pub track_name: String,
    /// First listen within the queried window.
    pub since: DateTime<Utc>,
    pub during: u64,
    pub count: usize,
}

/// Bounded log of finished sessions, oldest evicted first.
pub struct ListeningLog {
    entries: Mutex<VecDeque<ListenedTrack>>,
    capacity: usize,
}

impl ListeningLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    pub fn record(&self, entry: ListenedTrack) {
        let mut entries = self.entries();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Sessions started strictly after `since`, newest first.
    pub fn listened_since(&self, since: DateTime<Utc>) -> Vec<ListenedTrack> {
        let mut out: Vec<_> = self
            .entries()
            .iter()
            .filter(|e| e.at > since)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.at.cmp(&a.at));
        out
    }

    /// Tracks grouped by name, by total listening time after `since`.
    ///
    /// Ties are broken by the most recent first listen.
    pub fn most_listened(&self, since: DateTime<Utc>, top: usize) -> Vec<MostListened> {
        let mut groups: HashMap<String, MostListened> = HashMap::new();
        for e in self.entries().iter().filter(|e| e.at > since) {
            groups
                .entry(e.track_name.clone())
                .and_modify(|g| {
                    g.since = g.since.min(e.at);
                    g.during += e.during;
                    g.count += 1;
                })
                .or_insert_with(|| MostListened {
                    track_name: e.track_name.clone(),
                    since: e.at,
                    during: e.during,
                    count: 1,
                });
        }

        let mut out: Vec<_> = groups.into_values().collect();
        out.sort_by(|a, b| {
            b.during
                .cmp(&a.during)
                .then_with(|| b.since.cmp(&a.since))
                .then_with(|| a.track_name.cmp(&b.track_name))
        });
        out.truncate(top);
        out
    }

    fn entries(&self) -> MutexGuard<'_, VecDeque<ListenedTrack>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionSink for ListeningLog {
    fn session_finished(&self, report: &SessionReport) {
        let entry = ListenedTrack {
            track_name: report.track.name.clone(),
            track_id: report.track.id,
            at: report.started_at,
            during: report.elapsed.as_secs(),
            reason: report.reason,
        };
        debug!(name = %entry.track_name, during = entry.during, reason = %entry.reason, "recorded listen");
        self.record(entry);
    }
}
