//! Dial Session Scheduler: walks the entry store one call at a time.
//!
//! Single-threaded state machine. Two inputs drive it: operator commands
//! and delay-timer expiries (delivered back as tickets). It owns the cursor
//! and phase, places calls through a [`Dialer`], and writes outcomes and
//! stats before any following command is processed.
//!
//! ```text
//! Idle ──start──▶ Dialing ──place call──▶ AwaitingAnnotation
//!                   ▲  │                        │ submit_annotation
//!                   │  └─ cursor % N == 0 ─▶ AwaitingMilestoneConfirm
//!                   └──── delay timer ◀─────────┘
//! pause: Dialing/AwaitingAnnotation/Milestone → Paused, resume → back
//! stop:  any active phase → Idle       last entry done → Completed
//! ```

use std::sync::Arc;
use std::time::Duration;

use autodial_core::config::{SchedulerConfig, positive};
use autodial_core::{
    Annotation, AnnotationTicket, CloudSync, DelayTimer, DialError, Dialer, Phase, SchedulerError,
    SessionSnapshot,
};
use chrono::Utc;

use crate::entries::EntryStore;
use crate::notify::{EventListener, EventLog, SessionEvent};
use crate::stats::StatsAggregator;
use crate::store::EntryFile;

/// Everything a scheduler needs to run.
pub struct SchedulerParts {
    pub entries: EntryStore,
    pub stats: StatsAggregator,
    pub dialer: Arc<dyn Dialer>,
    pub sync: Arc<dyn CloudSync>,
    /// Where annotated entries are written back, if anywhere.
    pub entry_file: Option<EntryFile>,
    pub config: SchedulerConfig,
}

/// State owned by the scheduler for the duration of one dialing run.
#[derive(Debug, Clone)]
struct SessionState {
    /// Index of the next entry to dial. Never exceeds the entry count.
    cursor: usize,
    phase: Phase,
    dial_interval: Duration,
    milestone_size: u64,
}

/// The dial session state machine.
pub struct DialScheduler {
    state: SessionState,
    entries: EntryStore,
    stats: StatsAggregator,
    dialer: Arc<dyn Dialer>,
    sync: Arc<dyn CloudSync>,
    timer: Box<dyn DelayTimer>,
    entry_file: Option<EntryFile>,
    events: EventLog,
    /// Bumped on every start from idle; part of each annotation ticket.
    run: u64,
    /// Entry whose call was placed and still needs an annotation.
    pending: Option<usize>,
    /// Ticket of the armed delay timer.
    armed: Option<u64>,
    next_ticket: u64,
    /// Phase to go back to on resume.
    paused_from: Option<Phase>,
    /// Pause cancelled a running delay; resume re-arms it in full.
    delay_interrupted: bool,
    /// Cursor value whose milestone the operator already acknowledged.
    milestone_acked: Option<usize>,
    last_dial_error: Option<DialError>,
}

impl DialScheduler {
    /// Build a scheduler. A dial interval persisted in the stats store takes
    /// precedence over the configured default.
    pub fn new(parts: SchedulerParts, timer: Box<dyn DelayTimer>) -> Result<Self, SchedulerError> {
        let SchedulerParts {
            entries,
            mut stats,
            dialer,
            sync,
            entry_file,
            config,
        } = parts;

        let configured_interval = positive("dial_interval_ms", config.dial_interval_ms)?;
        let milestone_size = positive("milestone_size", config.milestone_size)?;
        let interval_ms = stats.dial_interval_ms().unwrap_or(configured_interval);

        for batch in entries.batches() {
            if let Err(e) = stats.register_batch(batch) {
                tracing::warn!("⚠️ Failed to persist stats for batch '{}': {e}", batch.id);
            }
        }

        Ok(Self {
            state: SessionState {
                cursor: 0,
                phase: Phase::Idle,
                dial_interval: Duration::from_millis(interval_ms),
                milestone_size,
            },
            entries,
            stats,
            dialer,
            sync,
            timer,
            entry_file,
            events: EventLog::new(),
            run: 0,
            pending: None,
            armed: None,
            next_ticket: 0,
            paused_from: None,
            delay_interrupted: false,
            milestone_acked: None,
            last_dial_error: None,
        })
    }

    /// Forward every session event to `listener`.
    pub fn set_event_listener(&mut self, listener: EventListener) {
        self.events.set_listener(listener);
    }

    // ─── Operator commands ──────────────────────────────────

    /// Begin (or continue, after `stop`) dialing from the current cursor.
    /// The first call is placed immediately.
    pub fn start(&mut self) -> Result<(), SchedulerError> {
        match self.state.phase {
            Phase::Completed => return Err(SchedulerError::SessionAlreadyFinished),
            Phase::Idle => {}
            _ => return Ok(()),
        }
        if self.entries.is_empty() {
            return Err(SchedulerError::EmptyList);
        }

        self.run += 1;
        self.state.phase = Phase::Dialing;
        tracing::info!(
            "▶️ Dial session run {} started at #{} of {}",
            self.run,
            self.state.cursor + 1,
            self.entries.len()
        );
        self.events.record(SessionEvent::Started {
            run: self.run,
            cursor: self.state.cursor,
        });
        self.dial_next();
        Ok(())
    }

    /// Record the operator's decision for the call awaiting annotation.
    /// Only accepted in `AwaitingAnnotation`; a paused call must be resumed first.
    pub fn submit_annotation(&mut self, annotation: Annotation) -> Result<(), SchedulerError> {
        let index = self.awaiting_annotation()?;
        self.record_annotation(index, annotation);
        Ok(())
    }

    /// Like [`submit_annotation`](Self::submit_annotation), but rejects a
    /// ticket from an earlier run or for a different entry.
    pub fn submit_annotation_at(
        &mut self,
        ticket: AnnotationTicket,
        annotation: Annotation,
    ) -> Result<(), SchedulerError> {
        if ticket.run != self.run || ticket.index != self.state.cursor {
            return Err(SchedulerError::StaleAnnotation);
        }
        if self.awaiting_annotation()? != ticket.index {
            return Err(SchedulerError::NoPendingAnnotation);
        }
        self.record_annotation(ticket.index, annotation);
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), SchedulerError> {
        match self.state.phase {
            Phase::Dialing => {
                self.delay_interrupted = self.armed.is_some();
                self.disarm();
                self.paused_from = Some(Phase::Dialing);
            }
            Phase::AwaitingAnnotation => {
                self.delay_interrupted = false;
                self.paused_from = Some(Phase::AwaitingAnnotation);
            }
            Phase::AwaitingMilestoneConfirm => {
                // Pausing at a checkpoint acknowledges it.
                self.milestone_acked = Some(self.state.cursor);
                self.delay_interrupted = false;
                self.paused_from = Some(Phase::Dialing);
            }
            Phase::Paused => return Ok(()),
            phase @ (Phase::Idle | Phase::Completed) => {
                return Err(SchedulerError::InvalidTransition {
                    command: "pause",
                    phase,
                });
            }
        }
        self.state.phase = Phase::Paused;
        tracing::info!("⏸️ Paused at #{}", self.state.cursor + 1);
        self.events.record(SessionEvent::Paused {
            cursor: self.state.cursor,
        });
        Ok(())
    }

    /// Return to the phase before `pause`. An interrupted delay restarts in
    /// full; nothing is skipped and nothing is dialed twice.
    pub fn resume(&mut self) -> Result<(), SchedulerError> {
        match self.state.phase {
            Phase::Paused => {}
            phase @ (Phase::Idle | Phase::Completed) => {
                return Err(SchedulerError::InvalidTransition {
                    command: "resume",
                    phase,
                });
            }
            _ => return Ok(()),
        }

        let from = self.paused_from.take().unwrap_or(Phase::Dialing);
        tracing::info!("▶️ Resumed at #{}", self.state.cursor + 1);
        self.events.record(SessionEvent::Resumed {
            cursor: self.state.cursor,
        });

        if from == Phase::AwaitingAnnotation && self.pending.is_some() {
            self.state.phase = Phase::AwaitingAnnotation;
            return Ok(());
        }

        self.state.phase = Phase::Dialing;
        if self.state.cursor >= self.entries.len() {
            self.complete();
        } else if std::mem::take(&mut self.delay_interrupted) {
            self.arm_delay();
        } else {
            self.dial_next();
        }
        Ok(())
    }

    /// Dial now instead of waiting out the delay. No-op without a pending delay.
    pub fn skip_delay(&mut self) -> Result<(), SchedulerError> {
        if self.state.phase != Phase::Dialing || self.armed.is_none() {
            return Ok(());
        }
        self.disarm();
        tracing::info!("⏭️ Delay skipped");
        self.events.record(SessionEvent::DelaySkipped {
            cursor: self.state.cursor,
        });
        self.dial_next();
        Ok(())
    }

    /// Answer a milestone checkpoint: continue dialing, or pause.
    pub fn confirm_milestone(&mut self, proceed: bool) -> Result<(), SchedulerError> {
        if self.state.phase != Phase::AwaitingMilestoneConfirm {
            return Err(SchedulerError::InvalidTransition {
                command: "confirm milestone",
                phase: self.state.phase,
            });
        }
        self.milestone_acked = Some(self.state.cursor);

        if proceed {
            tracing::info!("🏁 Milestone at {} confirmed", self.state.cursor);
            self.state.phase = Phase::Dialing;
            self.dial_next();
        } else {
            self.state.phase = Phase::Paused;
            self.paused_from = Some(Phase::Dialing);
            self.delay_interrupted = false;
            tracing::info!("⏸️ Paused at milestone {}", self.state.cursor);
            self.events.record(SessionEvent::Paused {
                cursor: self.state.cursor,
            });
        }
        Ok(())
    }

    /// Abort the run. Recorded outcomes and stats stay; the cursor stays.
    /// Safe from any phase.
    pub fn stop(&mut self) -> Result<(), SchedulerError> {
        if !self.state.phase.is_active() {
            return Ok(());
        }
        self.disarm();
        self.pending = None;
        self.paused_from = None;
        self.delay_interrupted = false;
        self.state.phase = Phase::Idle;
        tracing::info!("⏹️ Stopped at #{}", self.state.cursor + 1);
        self.events.record(SessionEvent::Stopped {
            cursor: self.state.cursor,
        });
        Ok(())
    }

    /// Change the delay between calls. Takes effect from the next delay.
    pub fn set_dial_interval_ms(&mut self, ms: i64) -> Result<(), SchedulerError> {
        let ms = positive("dial_interval_ms", ms)?;
        self.state.dial_interval = Duration::from_millis(ms);
        if let Err(e) = self.stats.save_dial_interval_ms(ms) {
            self.persistence_failed(e.to_string());
        }
        Ok(())
    }

    /// Surface a cloud sync failure to the operator. Session state is untouched.
    pub fn note_sync_failure(&mut self, error: String) {
        self.events.record(SessionEvent::SyncFailed { error });
    }

    /// Delay timer expiry. Tickets from cancelled or replaced timers are ignored.
    pub fn timer_fired(&mut self, ticket: u64) {
        if self.armed != Some(ticket) || self.state.phase != Phase::Dialing {
            tracing::debug!("⏲️ Ignoring stale timer ticket {ticket}");
            return;
        }
        self.armed = None;
        self.dial_next();
    }

    // ─── Read-only views ────────────────────────────────────

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.state.phase,
            cursor: self.state.cursor,
            total_entries: self.entries.len(),
            current_number: self.entries.number_at(self.state.cursor).map(String::from),
            dial_interval_ms: self.state.dial_interval.as_millis() as u64,
            milestone_size: self.state.milestone_size,
            total_calls: self.stats.total_calls(),
            daily_calls: self.stats.daily_calls(),
            delay_pending: self.armed.is_some(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn cursor(&self) -> usize {
        self.state.cursor
    }

    /// Ticket for the call awaiting annotation, if any.
    pub fn pending_ticket(&self) -> Option<AnnotationTicket> {
        self.pending.map(|index| AnnotationTicket {
            run: self.run,
            index,
        })
    }

    pub fn entries(&self) -> &EntryStore {
        &self.entries
    }

    pub fn stats(&self) -> &StatsAggregator {
        &self.stats
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn last_dial_error(&self) -> Option<&DialError> {
        self.last_dial_error.as_ref()
    }

    // ─── Transitions ────────────────────────────────────────

    /// Dial the entry at the cursor, unless the list is done or a milestone
    /// checkpoint is due. Caller has set the phase to `Dialing`.
    fn dial_next(&mut self) {
        let cursor = self.state.cursor;
        let number = match self.entries.number_at(cursor) {
            Some(n) => n.to_string(),
            None => {
                self.complete();
                return;
            }
        };

        let every = self.state.milestone_size as usize;
        if cursor > 0 && cursor % every == 0 && self.milestone_acked != Some(cursor) {
            self.state.phase = Phase::AwaitingMilestoneConfirm;
            tracing::info!("🏁 Milestone: {cursor} calls done, waiting for confirmation");
            self.events.record(SessionEvent::MilestoneReached { cursor });
            return;
        }

        self.state.phase = Phase::AwaitingAnnotation;
        self.pending = Some(cursor);
        let ticket = AnnotationTicket {
            run: self.run,
            index: cursor,
        };

        tracing::info!("📞 Dialing #{}: {}", cursor + 1, number);
        let result = self.dialer.place_call(&number);
        self.events.record(SessionEvent::CallPlaced {
            index: cursor,
            number: number.clone(),
            ticket,
        });
        match result {
            Ok(()) => self.last_dial_error = None,
            Err(e) => {
                tracing::warn!("⚠️ Call to {} failed: {e}", number);
                self.events
                    .record(SessionEvent::dial_failed(cursor, &number, &e));
                self.last_dial_error = Some(e);
            }
        }
    }

    fn awaiting_annotation(&self) -> Result<usize, SchedulerError> {
        match (self.state.phase, self.pending) {
            (Phase::AwaitingAnnotation, Some(index)) => Ok(index),
            _ => Err(SchedulerError::NoPendingAnnotation),
        }
    }

    fn record_annotation(&mut self, index: usize, annotation: Annotation) {
        let now = Utc::now();
        let outcome = annotation.outcome();
        let previous = self.entries.record(index, annotation, now).flatten();
        self.pending = None;
        self.state.cursor = index + 1;

        let batch_id = self
            .entries
            .get(index)
            .map(|e| e.batch_id.clone())
            .unwrap_or_default();
        if let Err(e) = self.stats.record_call(&batch_id, previous, outcome) {
            self.persistence_failed(e.to_string());
        }
        self.persist_entries();
        if let Some(entry) = self.entries.get(index) {
            self.sync.sync_call_event(entry, now);
        }

        tracing::info!("📝 #{} marked {}", index + 1, outcome);
        self.events
            .record(SessionEvent::AnnotationRecorded { index, outcome });

        if self.state.cursor >= self.entries.len() {
            self.complete();
        } else {
            self.state.phase = Phase::Dialing;
            self.arm_delay();
        }
    }

    fn complete(&mut self) {
        self.disarm();
        self.pending = None;
        self.paused_from = None;
        self.state.phase = Phase::Completed;
        tracing::info!("✅ Dial session complete ({} entries)", self.state.cursor);
        self.events.record(SessionEvent::Completed {
            dialed: self.state.cursor,
        });
    }

    fn arm_delay(&mut self) {
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.armed = Some(ticket);
        self.timer.arm(ticket, self.state.dial_interval);
        tracing::debug!(
            "⏲️ Next call in {}ms (ticket {ticket})",
            self.state.dial_interval.as_millis()
        );
    }

    fn disarm(&mut self) {
        if self.armed.take().is_some() {
            self.timer.cancel();
        }
    }

    fn persist_entries(&mut self) {
        let Some(file) = &self.entry_file else {
            return;
        };
        if let Err(e) = file.merge(&self.entries) {
            self.persistence_failed(e.to_string());
        }
    }

    fn persistence_failed(&mut self, error: String) {
        tracing::warn!("⚠️ Persistence failed, will retry on next change: {error}");
        self.events.record(SessionEvent::PersistenceFailed { error });
    }
}
