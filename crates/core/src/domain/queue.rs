// Admission Queue Domain Types

use serde::{Deserialize, Serialize};

/// One unit of work waiting for admission.
///
/// Transient: held only in the queue's in-memory FIFO until submitted or
/// dropped. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: String,
    pub title: String,
    pub prompt: String,
}

/// Process-local pause state, set on rate-limit detection and cleared once
/// the resume instant has passed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PauseState {
    pub is_paused: bool,
    pub paused_until: Option<i64>, // epoch ms
}

impl PauseState {
    pub fn paused(until: i64) -> Self {
        Self {
            is_paused: true,
            paused_until: Some(until),
        }
    }

    /// A pause instant in the past is invalid and must be cleared before
    /// further pause decisions are made.
    pub fn is_expired(&self, now: i64) -> bool {
        match self.paused_until {
            Some(until) => self.is_paused && now >= until,
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.is_paused = false;
        self.paused_until = None;
    }
}

/// Receipt returned from `enqueue`: where the entry landed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueReceipt {
    pub position: usize,
    pub queue_length: usize,
}

/// Head-of-queue preview for status reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuePreview {
    pub id: String,
    pub title: String,
}

/// Read-only queue snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStatus {
    pub length: usize,
    pub is_processing: bool,
    pub is_paused: bool,
    pub paused_until: Option<i64>,
    pub next_entry: Option<QueuePreview>,
}

/// Read-only poller snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerStatus {
    pub is_active: bool,
}
