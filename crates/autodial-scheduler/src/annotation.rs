//! Annotation Collector: turns an operator decision into the annotation
//! for the call it was made about.
//!
//! The collector follows session events: each placed call hands it a fresh
//! ticket, and a decision is always submitted against that ticket, so a
//! late decision can never land on a different entry.

use std::str::FromStr;

use autodial_core::{Annotation, AnnotationTicket, SchedulerError};

use crate::engine::DialScheduler;
use crate::notify::SessionEvent;

/// What the operator decided about a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Interested party, with an optional free-text remark.
    Customer(Option<String>),
    Useless,
    /// Closed without choosing.
    Dismissed,
}

impl From<Decision> for Annotation {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Customer(remark) => Annotation::Customer(remark),
            Decision::Useless => Annotation::Useless,
            Decision::Dismissed => Annotation::Unset,
        }
    }
}

/// Parse console input: `c [remark]`, `u`, `d`.
impl FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim_start();
        let (word, rest) = match s.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, Some(rest)),
            None => (s.trim_end(), None),
        };
        match word.to_lowercase().as_str() {
            "c" | "customer" => {
                // Remark is stored verbatim, only the separator is dropped.
                let remark = rest
                    .map(|r| r.trim_end_matches(['\r', '\n']))
                    .filter(|r| !r.trim().is_empty())
                    .map(String::from);
                Ok(Decision::Customer(remark))
            }
            "u" | "useless" => Ok(Decision::Useless),
            "d" | "dismiss" => Ok(Decision::Dismissed),
            other => Err(format!("unknown decision '{other}' (use c [remark], u or d)")),
        }
    }
}

/// Tracks the call awaiting a decision.
#[derive(Debug, Default)]
pub struct AnnotationCollector {
    current: Option<(AnnotationTicket, String)>,
}

impl AnnotationCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Follow the session: a placed call opens a ticket, anything that
    /// ends that call closes it.
    pub fn observe(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::CallPlaced { number, ticket, .. } => {
                self.current = Some((*ticket, number.clone()));
            }
            SessionEvent::AnnotationRecorded { .. }
            | SessionEvent::Stopped { .. }
            | SessionEvent::Completed { .. } => self.current = None,
            _ => {}
        }
    }

    /// The open ticket and the number it is for.
    pub fn pending(&self) -> Option<(AnnotationTicket, &str)> {
        self.current
            .as_ref()
            .map(|(ticket, number)| (*ticket, number.as_str()))
    }

    /// Pair a decision with the open ticket. The ticket stays open until the
    /// scheduler confirms the annotation.
    pub fn prepare(&self, decision: Decision) -> Result<(AnnotationTicket, Annotation), SchedulerError> {
        let (ticket, _) = self.pending().ok_or(SchedulerError::NoPendingAnnotation)?;
        Ok((ticket, decision.into()))
    }

    /// Submit a decision straight to a scheduler.
    pub fn decide(
        &mut self,
        scheduler: &mut DialScheduler,
        decision: Decision,
    ) -> Result<(), SchedulerError> {
        let (ticket, annotation) = self.prepare(decision)?;
        scheduler.submit_annotation_at(ticket, annotation)?;
        self.current = None;
        tracing::debug!("📝 Decision submitted for #{}", ticket.index + 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::harness;
    use autodial_core::{Outcome, Phase};

    fn sync_collector(scheduler: &DialScheduler, collector: &mut AnnotationCollector) {
        if let Some(event) = scheduler.events().last() {
            collector.observe(event);
        }
    }

    #[test]
    fn test_parse_decisions() {
        assert_eq!(
            "c wants a callback Friday".parse(),
            Ok(Decision::Customer(Some("wants a callback Friday".into())))
        );
        assert_eq!("c".parse(), Ok(Decision::Customer(None)));
        assert_eq!("C   ".parse(), Ok(Decision::Customer(None)));
        assert_eq!("u".parse(), Ok(Decision::Useless));
        assert_eq!("dismiss".parse(), Ok(Decision::Dismissed));
        assert!("x".parse::<Decision>().is_err());
    }

    #[test]
    fn test_remark_is_verbatim() {
        let long = "a".repeat(5000);
        let parsed: Decision = format!("c  {long}  ").parse().unwrap();
        assert_eq!(parsed, Decision::Customer(Some(format!(" {long}  "))));
    }

    #[test]
    fn test_decide_records_on_current_entry() {
        let mut h = harness(&["111", "222"], 30, 100);
        let mut collector = AnnotationCollector::new();
        h.scheduler.start().unwrap();
        sync_collector(&h.scheduler, &mut collector);
        assert_eq!(collector.pending().map(|(_, n)| n), Some("111"));

        collector
            .decide(&mut h.scheduler, Decision::Customer(Some("hot".into())))
            .unwrap();
        let entry = h.scheduler.entries().get(0).unwrap();
        assert_eq!(entry.outcome, Outcome::Customer);
        assert_eq!(entry.remark.as_deref(), Some("hot"));
        assert!(collector.pending().is_none());
        assert_eq!(h.scheduler.phase(), Phase::Dialing);
    }

    #[test]
    fn test_dismiss_counts_as_dialed() {
        let mut h = harness(&["111"], 30, 100);
        let mut collector = AnnotationCollector::new();
        h.scheduler.start().unwrap();
        sync_collector(&h.scheduler, &mut collector);
        collector.decide(&mut h.scheduler, Decision::Dismissed).unwrap();

        let b = h.scheduler.stats().batch("b1").unwrap();
        assert_eq!((b.dialed, b.customer, b.useless), (1, 0, 0));
        assert_eq!(h.scheduler.phase(), Phase::Completed);
    }

    #[test]
    fn test_no_open_ticket() {
        let mut h = harness(&["111"], 30, 100);
        let mut collector = AnnotationCollector::new();
        assert!(matches!(
            collector.decide(&mut h.scheduler, Decision::Useless),
            Err(SchedulerError::NoPendingAnnotation)
        ));
    }

    #[test]
    fn test_ticket_from_previous_run_is_stale() {
        let mut h = harness(&["111", "222"], 30, 100);
        let mut collector = AnnotationCollector::new();
        h.scheduler.start().unwrap();
        sync_collector(&h.scheduler, &mut collector);
        let (old, _) = collector.prepare(Decision::Useless).unwrap();

        h.scheduler.stop().unwrap();
        h.scheduler.start().unwrap();
        assert!(matches!(
            h.scheduler.submit_annotation_at(old, Annotation::Useless),
            Err(SchedulerError::StaleAnnotation)
        ));
        assert_eq!(h.scheduler.cursor(), 0);
    }
}
