//! Session actor: owns a [`DialScheduler`] inside one tokio task.
//!
//! Operator commands arrive as envelopes on a bounded channel, each with a
//! oneshot reply; delay-timer tickets and sync failures arrive on their own
//! channels into the same task. One `select!` loop means no two
//! transitions ever run at once.

use std::sync::Arc;
use std::time::Duration;

use autodial_core::{Annotation, AnnotationTicket, SchedulerError, SessionSnapshot};
use chrono::{DateTime, Local};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;

use crate::engine::{DialScheduler, SchedulerParts};
use crate::notify::SessionEvent;
use crate::timer::TokioTimer;

const COMMAND_QUEUE: usize = 32;
const EVENT_BUFFER: usize = 256;

type Reply = oneshot::Sender<Result<SessionSnapshot, SchedulerError>>;

#[derive(Debug)]
enum Command {
    Start,
    StartAt(DateTime<Local>),
    Annotate(Annotation),
    AnnotateAt(AnnotationTicket, Annotation),
    Pause,
    Resume,
    SkipDelay,
    ConfirmMilestone(bool),
    Stop,
    SetDialInterval(i64),
    Snapshot,
    Shutdown,
}

struct Envelope {
    command: Command,
    reply: Reply,
}

/// Cloneable handle to a running session. Every method waits until the
/// command has been fully applied and returns the resulting snapshot.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Envelope>,
    events: broadcast::Sender<SessionEvent>,
}

/// Start a session task. Must be called from inside a tokio runtime.
///
/// `sync_failures` carries errors reported by a background cloud sync
/// adapter; they are surfaced as [`SessionEvent::SyncFailed`].
pub fn spawn_session(
    parts: SchedulerParts,
    sync_failures: Option<mpsc::UnboundedReceiver<String>>,
) -> Result<SessionHandle, SchedulerError> {
    let (timer, ticks) = TokioTimer::channel();
    let mut scheduler = DialScheduler::new(parts, Box::new(timer))?;

    let (events, _) = broadcast::channel(EVENT_BUFFER);
    let forward = events.clone();
    scheduler.set_event_listener(Arc::new(move |event: &SessionEvent| {
        // No subscribers is fine.
        let _ = forward.send(event.clone());
    }));

    let (commands, rx) = mpsc::channel(COMMAND_QUEUE);
    tokio::spawn(run(scheduler, rx, ticks, sync_failures));

    Ok(SessionHandle { commands, events })
}

impl SessionHandle {
    pub async fn start(&self) -> Result<SessionSnapshot, SchedulerError> {
        self.send(Command::Start).await
    }

    /// Start at a wall-clock time. A time already past starts at once;
    /// otherwise a countdown runs that `stop` cancels.
    pub async fn start_at(&self, at: DateTime<Local>) -> Result<SessionSnapshot, SchedulerError> {
        self.send(Command::StartAt(at)).await
    }

    pub async fn submit_annotation(
        &self,
        annotation: Annotation,
    ) -> Result<SessionSnapshot, SchedulerError> {
        self.send(Command::Annotate(annotation)).await
    }

    pub async fn submit_annotation_at(
        &self,
        ticket: AnnotationTicket,
        annotation: Annotation,
    ) -> Result<SessionSnapshot, SchedulerError> {
        self.send(Command::AnnotateAt(ticket, annotation)).await
    }

    pub async fn pause(&self) -> Result<SessionSnapshot, SchedulerError> {
        self.send(Command::Pause).await
    }

    pub async fn resume(&self) -> Result<SessionSnapshot, SchedulerError> {
        self.send(Command::Resume).await
    }

    pub async fn skip_delay(&self) -> Result<SessionSnapshot, SchedulerError> {
        self.send(Command::SkipDelay).await
    }

    pub async fn confirm_milestone(&self, proceed: bool) -> Result<SessionSnapshot, SchedulerError> {
        self.send(Command::ConfirmMilestone(proceed)).await
    }

    pub async fn stop(&self) -> Result<SessionSnapshot, SchedulerError> {
        self.send(Command::Stop).await
    }

    pub async fn set_dial_interval(&self, ms: i64) -> Result<SessionSnapshot, SchedulerError> {
        self.send(Command::SetDialInterval(ms)).await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, SchedulerError> {
        self.send(Command::Snapshot).await
    }

    /// Stop any run and end the session task.
    pub async fn shutdown(&self) -> Result<SessionSnapshot, SchedulerError> {
        self.send(Command::Shutdown).await
    }

    /// Stream of session events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    async fn send(&self, command: Command) -> Result<SessionSnapshot, SchedulerError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Envelope { command, reply })
            .await
            .map_err(|_| SchedulerError::SessionClosed)?;
        rx.await.map_err(|_| SchedulerError::SessionClosed)?
    }
}

async fn run(
    mut scheduler: DialScheduler,
    mut commands: mpsc::Receiver<Envelope>,
    mut ticks: mpsc::UnboundedReceiver<u64>,
    mut sync_failures: Option<mpsc::UnboundedReceiver<String>>,
) {
    let mut scheduled_start: Option<Instant> = None;
    tracing::debug!("🧵 Session task started");

    loop {
        tokio::select! {
            envelope = commands.recv() => {
                let Some(Envelope { command, reply }) = envelope else {
                    break;
                };
                let shutdown = matches!(command, Command::Shutdown);
                let result = apply(&mut scheduler, &mut scheduled_start, command)
                    .map(|()| scheduler.snapshot());
                let _ = reply.send(result);
                if shutdown {
                    break;
                }
            }
            Some(ticket) = ticks.recv() => scheduler.timer_fired(ticket),
            Some(error) = recv_failure(&mut sync_failures) => scheduler.note_sync_failure(error),
            _ = wait_until(scheduled_start), if scheduled_start.is_some() => {
                scheduled_start = None;
                tracing::info!("⏰ Scheduled start time reached");
                if let Err(e) = scheduler.start() {
                    tracing::warn!("⚠️ Scheduled start failed: {e}");
                }
            }
        }
    }

    let _ = scheduler.stop();
    tracing::debug!("🧵 Session task finished");
}

fn apply(
    scheduler: &mut DialScheduler,
    scheduled_start: &mut Option<Instant>,
    command: Command,
) -> Result<(), SchedulerError> {
    match command {
        Command::Start => {
            *scheduled_start = None;
            scheduler.start()
        }
        Command::StartAt(at) => {
            let wait = (at - Local::now()).to_std().unwrap_or(Duration::ZERO);
            if wait.is_zero() {
                *scheduled_start = None;
                return scheduler.start();
            }
            if scheduler.phase().is_active() {
                return Ok(());
            }
            tracing::info!("⏰ Calling starts at {} (in {}s)", at.format("%Y-%m-%d %H:%M"), wait.as_secs());
            *scheduled_start = Some(Instant::now() + wait);
            Ok(())
        }
        Command::Annotate(annotation) => scheduler.submit_annotation(annotation),
        Command::AnnotateAt(ticket, annotation) => scheduler.submit_annotation_at(ticket, annotation),
        Command::Pause => scheduler.pause(),
        Command::Resume => scheduler.resume(),
        Command::SkipDelay => scheduler.skip_delay(),
        Command::ConfirmMilestone(proceed) => scheduler.confirm_milestone(proceed),
        Command::Stop => {
            if scheduled_start.take().is_some() {
                tracing::info!("⏰ Scheduled start cancelled");
            }
            scheduler.stop()
        }
        Command::SetDialInterval(ms) => scheduler.set_dial_interval_ms(ms),
        Command::Snapshot => Ok(()),
        Command::Shutdown => {
            *scheduled_start = None;
            scheduler.stop()
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn recv_failure(rx: &mut Option<mpsc::UnboundedReceiver<String>>) -> Option<String> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryKv;
    use crate::test_support::{RecordingDialer, parts};
    use autodial_core::Phase;

    fn spawn(numbers: &[&str], interval_ms: i64) -> (SessionHandle, RecordingDialer) {
        let (parts, dialer, _sync) = parts(numbers, Box::new(MemoryKv::new()), 30, interval_ms);
        (spawn_session(parts, None).unwrap(), dialer)
    }

    async fn advance(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_between_calls() {
        let (session, dialer) = spawn(&["111", "222", "333"], 100);
        let snap = session.start().await.unwrap();
        assert_eq!(snap.phase, Phase::AwaitingAnnotation);
        assert_eq!(snap.current_number.as_deref(), Some("111"));

        let snap = session
            .submit_annotation(Annotation::Customer(Some("ok".into())))
            .await
            .unwrap();
        assert_eq!(snap.cursor, 1);
        assert!(snap.delay_pending);

        advance(50).await;
        assert_eq!(dialer.calls(), vec!["111"]);
        advance(60).await;
        assert_eq!(dialer.calls(), vec!["111", "222"]);

        let snap = session.stop().await.unwrap();
        assert_eq!((snap.phase, snap.cursor), (Phase::Idle, 1));
        advance(1000).await;
        assert_eq!(dialer.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_cancels_pending_delay() {
        let (session, dialer) = spawn(&["111", "222"], 100);
        session.start().await.unwrap();
        session.submit_annotation(Annotation::Useless).await.unwrap();
        advance(60).await;
        session.pause().await.unwrap();
        advance(500).await;
        assert_eq!(dialer.calls(), vec!["111"]);

        session.resume().await.unwrap();
        advance(60).await;
        assert_eq!(dialer.calls(), vec!["111"]);
        advance(50).await;
        assert_eq!(dialer.calls(), vec!["111", "222"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_are_broadcast() {
        let (session, _dialer) = spawn(&["111"], 100);
        let mut events = session.subscribe();
        session.start().await.unwrap();
        session.submit_annotation(Annotation::Unset).await.unwrap();

        assert!(matches!(events.recv().await, Ok(SessionEvent::Started { run: 1, .. })));
        assert!(matches!(events.recv().await, Ok(SessionEvent::CallPlaced { index: 0, .. })));
        assert!(matches!(
            events.recv().await,
            Ok(SessionEvent::AnnotationRecorded { index: 0, .. })
        ));
        assert_eq!(events.recv().await.unwrap(), SessionEvent::Completed { dialed: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_at_future_time_counts_down() {
        let (session, dialer) = spawn(&["111"], 100);
        let at = Local::now() + chrono::Duration::seconds(60);
        let snap = session.start_at(at).await.unwrap();
        assert_eq!(snap.phase, Phase::Idle);

        advance(30_000).await;
        assert!(dialer.calls().is_empty());
        advance(31_000).await;
        assert_eq!(dialer.calls(), vec!["111"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_at_past_time_starts_now() {
        let (session, dialer) = spawn(&["111"], 100);
        let at = Local::now() - chrono::Duration::minutes(5);
        let snap = session.start_at(at).await.unwrap();
        assert_eq!(snap.phase, Phase::AwaitingAnnotation);
        assert_eq!(dialer.calls(), vec!["111"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_scheduled_start() {
        let (session, dialer) = spawn(&["111"], 100);
        session
            .start_at(Local::now() + chrono::Duration::seconds(10))
            .await
            .unwrap();
        session.stop().await.unwrap();
        advance(20_000).await;
        assert!(dialer.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sync_failures_become_events() {
        let (parts, _dialer, _sync) = parts(&["111"], Box::new(MemoryKv::new()), 30, 100);
        let (tx, rx) = mpsc::unbounded_channel();
        let session = spawn_session(parts, Some(rx)).unwrap();
        let mut events = session.subscribe();

        tx.send("timeout".to_string()).unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::SyncFailed { error: "timeout".into() }
        );
        assert_eq!(session.snapshot().await.unwrap().phase, Phase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_commands_after_shutdown_fail() {
        let (session, _dialer) = spawn(&["111"], 100);
        session.start().await.unwrap();
        let snap = session.shutdown().await.unwrap();
        assert_eq!(snap.phase, Phase::Idle);
        assert!(matches!(session.pause().await, Err(SchedulerError::SessionClosed)));
    }
}
