//! Operator console: session events out, one-letter commands in.

use anyhow::Result;
use autodial_core::{SchedulerError, SessionSnapshot};
use autodial_scheduler::{AnnotationCollector, Decision, SessionEvent, SessionHandle};
use chrono::{DateTime, Local};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

const HELP: &str = "\
Commands:
  c [remark]  customer (optional remark)
  u           useless
  d           dismiss without deciding
  p / r       pause / resume
  s           skip the delay, dial now
  y / n       continue / pause at a milestone
  ?           status
  q           stop and quit";

/// Drive one session from stdin until it completes or the operator quits.
pub async fn run(session: SessionHandle, start_at: Option<DateTime<Local>>) -> Result<()> {
    let mut events = session.subscribe();
    let mut collector = AnnotationCollector::new();
    println!("{HELP}\n");

    let started = match start_at {
        Some(at) => session.start_at(at).await,
        None => session.start().await,
    };
    if let Err(e) = started {
        println!("❌ {e}");
        session.shutdown().await.ok();
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    collector.observe(&event);
                    println!("{event}");
                    match event {
                        SessionEvent::CallPlaced { .. } => println!("   → c [remark] / u / d"),
                        SessionEvent::Completed { .. } => break,
                        _ => {}
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!("⚠️ Console fell behind, {missed} events not shown");
                }
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line() => match line? {
                Some(line) => {
                    if !handle_line(&session, &collector, &line).await {
                        break;
                    }
                }
                None => break,
            },
        }
    }

    let snapshot = session.shutdown().await?;
    print_status(&snapshot);
    Ok(())
}

/// Apply one input line. Returns false when the console should exit.
async fn handle_line(session: &SessionHandle, collector: &AnnotationCollector, line: &str) -> bool {
    let Some(key) = line.trim().chars().next() else {
        return true;
    };

    let result = match key.to_ascii_lowercase() {
        'c' | 'u' | 'd' => match line.parse::<Decision>() {
            Ok(decision) => match collector.prepare(decision) {
                Ok((ticket, annotation)) => session.submit_annotation_at(ticket, annotation).await,
                Err(e) => Err(e),
            },
            Err(msg) => {
                println!("❓ {msg}");
                return true;
            }
        },
        'p' => session.pause().await,
        'r' => session.resume().await,
        's' => session.skip_delay().await,
        'y' => session.confirm_milestone(true).await,
        'n' => session.confirm_milestone(false).await,
        '?' => session.snapshot().await.map(|snap| {
            print_status(&snap);
            snap
        }),
        'q' => {
            session.stop().await.ok();
            return false;
        }
        _ => {
            println!("{HELP}");
            return true;
        }
    };

    match result {
        Ok(_) => true,
        Err(SchedulerError::SessionClosed) => false,
        Err(e) => {
            println!("⚠️ {e}");
            true
        }
    }
}

fn print_status(snap: &SessionSnapshot) {
    println!(
        "📊 {} | {}/{} done | next: {} | interval {}ms | calls today {} / total {}",
        snap.phase,
        snap.cursor,
        snap.total_entries,
        snap.current_number.as_deref().unwrap_or("-"),
        snap.dial_interval_ms,
        snap.daily_calls,
        snap.total_calls
    );
}
