// Admission Queue - rate-limit-aware FIFO of pending submissions
//
// Drains at a fixed cadence, one entry per tick, so submissions never
// exceed the remote rate limit. A rate-limited submission pauses the whole
// queue until the quota reset instant without losing the entry; any other
// submission failure drops only that entry.

use crate::application::constants::QUEUE_TICK_INTERVAL;
use crate::application::control::{ActorSlot, StopToken};
use crate::application::resume::ResumeSchedule;
use crate::application::submit::Submitter;
use crate::domain::{EnqueueReceipt, PauseState, QueueEntry, QueuePreview, QueueStatus};
use crate::port::TimeProvider;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

pub struct AdmissionConfig {
    pub tick_interval: Duration,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            tick_interval: QUEUE_TICK_INTERVAL,
        }
    }
}

#[derive(Default)]
struct QueueState {
    entries: VecDeque<QueueEntry>,
    /// Single-flight guard: true while one submission is outstanding.
    in_flight: bool,
    pause: PauseState,
}

pub struct AdmissionQueue {
    state: Mutex<QueueState>,
    submitter: Submitter,
    time_provider: Arc<dyn TimeProvider>,
    resume_schedule: ResumeSchedule,
    config: AdmissionConfig,
    slot: ActorSlot,
}

impl AdmissionQueue {
    pub fn new(
        submitter: Submitter,
        time_provider: Arc<dyn TimeProvider>,
        resume_schedule: ResumeSchedule,
        config: AdmissionConfig,
    ) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            submitter,
            time_provider,
            resume_schedule,
            config,
            slot: ActorSlot::new(),
        }
    }

    /// Append an entry to the tail. Always succeeds.
    pub fn enqueue(&self, entry: QueueEntry) -> EnqueueReceipt {
        let mut state = self.state.lock().unwrap();
        info!(shot_id = %entry.id, title = %entry.title, "Entry enqueued");
        state.entries.push_back(entry);
        let len = state.entries.len();
        EnqueueReceipt {
            position: len,
            queue_length: len,
        }
    }

    /// Read-only snapshot for the control surface.
    pub fn status(&self) -> QueueStatus {
        let state = self.state.lock().unwrap();
        QueueStatus {
            length: state.entries.len(),
            is_processing: state.in_flight,
            is_paused: state.pause.is_paused,
            paused_until: state.pause.paused_until,
            next_entry: state.entries.front().map(|e| QueuePreview {
                id: e.id.clone(),
                title: e.title.clone(),
            }),
        }
    }

    /// One admission attempt: release at most the head entry.
    pub async fn tick(&self) {
        let entry = {
            let mut state = self.state.lock().unwrap();
            if state.entries.is_empty() || state.in_flight {
                return;
            }
            if state.pause.is_paused {
                let now = self.time_provider.now_millis();
                if state.pause.is_expired(now) {
                    info!("Pause window elapsed; resuming admissions");
                    state.pause.clear();
                } else {
                    return;
                }
            }
            let Some(entry) = state.entries.front().cloned() else {
                return;
            };
            state.in_flight = true;
            entry
        };

        let result = self.submitter.submit(&entry).await;

        let mut state = self.state.lock().unwrap();
        match result {
            Ok(receipt) => {
                state.entries.pop_front();
                info!(
                    job_id = %receipt.job_id,
                    remaining = state.entries.len(),
                    "Entry submitted"
                );
            }
            Err(e) if e.is_rate_limit() => {
                // Recoverable and expected: keep the entry, stall until
                // the quota reset
                let now = self.time_provider.now_millis();
                let until = self.resume_schedule.next_resume(now);
                state.pause = PauseState::paused(until);
                warn!(
                    error = %e,
                    paused_until = until,
                    "Rate limited; admissions paused, entry retained"
                );
            }
            Err(e) => {
                // Unrecoverable for this entry: drop it so it cannot
                // block the rest of the queue
                let dropped = state.entries.pop_front();
                error!(
                    error = %e,
                    shot_id = ?dropped.map(|d| d.id),
                    "Submission failed; entry dropped"
                );
            }
        }
        state.in_flight = false;
    }

    async fn run(self: Arc<Self>, mut stop: StopToken) {
        info!(
            interval_secs = self.config.tick_interval.as_secs(),
            "Admission queue started"
        );
        // Process once immediately, then on the fixed interval
        self.tick().await;
        loop {
            tokio::select! {
                _ = sleep(self.config.tick_interval) => self.tick().await,
                _ = stop.wait() => break,
            }
        }
        info!("Admission queue stopped");
    }

    /// Arm the tick loop. No-op (returns false) when already active.
    pub fn start(self: Arc<Self>) -> bool {
        let queue = Arc::clone(&self);
        self.slot.start(move |token| {
            tokio::spawn(queue.run(token));
        })
    }

    /// Disarm future ticks. Does not cancel a tick already executing.
    pub fn stop(&self) -> bool {
        self.slot.stop()
    }

    pub fn is_active(&self) -> bool {
        self.slot.is_active()
    }
}
