//! Diagnostic status state machine.
//!
//! ```text
//! pending ──▶ processing ──▶ ready
//!                  │  ▲
//!                  │  └── (re-delivery of the same payment event)
//!                  └────▶ failed
//! ```
//!
//! `ready` and `failed` are terminal: nothing moves out of them.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticStatus {
    /// Created, awaiting payment confirmation
    Pending,
    /// Fulfillment is running
    Processing,
    /// Artifact uploaded and retrievable
    Ready,
    /// Fulfillment failed; requires resubmission
    Failed,
}

impl DiagnosticStatus {
    pub const ALL: [DiagnosticStatus; 4] = [
        DiagnosticStatus::Pending,
        DiagnosticStatus::Processing,
        DiagnosticStatus::Ready,
        DiagnosticStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticStatus::Pending => "pending",
            DiagnosticStatus::Processing => "processing",
            DiagnosticStatus::Ready => "ready",
            DiagnosticStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DiagnosticStatus::Ready | DiagnosticStatus::Failed)
    }

    /// Position in the partial order `pending < processing < {ready, failed}`.
    pub fn rank(&self) -> u8 {
        match self {
            DiagnosticStatus::Pending => 0,
            DiagnosticStatus::Processing => 1,
            DiagnosticStatus::Ready | DiagnosticStatus::Failed => 2,
        }
    }

    /// Whether `self -> next` is an edge of the state machine.
    pub fn can_transition_to(&self, next: DiagnosticStatus) -> bool {
        use DiagnosticStatus::*;
        matches!(
            (self, next),
            (Pending, Processing) | (Processing, Processing) | (Processing, Ready) | (Processing, Failed)
        )
    }

    /// Statuses from which `next` may be entered.
    pub fn predecessors(next: DiagnosticStatus) -> Vec<DiagnosticStatus> {
        Self::ALL
            .into_iter()
            .filter(|s| s.can_transition_to(next))
            .collect()
    }

    pub fn ensure_transition(&self, next: DiagnosticStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(DomainError::illegal_transition(*self, next))
        }
    }
}

impl core::fmt::Display for DiagnosticStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiagnosticStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DiagnosticStatus::Pending),
            "processing" => Ok(DiagnosticStatus::Processing),
            "ready" => Ok(DiagnosticStatus::Ready),
            "failed" => Ok(DiagnosticStatus::Failed),
            other => Err(DomainError::validation(format!("unknown status: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn any_status() -> impl Strategy<Value = DiagnosticStatus> {
        prop::sample::select(DiagnosticStatus::ALL.to_vec())
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for next in DiagnosticStatus::ALL {
            assert!(!DiagnosticStatus::Ready.can_transition_to(next));
            assert!(!DiagnosticStatus::Failed.can_transition_to(next));
        }
    }

    #[test]
    fn pending_cannot_skip_processing() {
        assert!(!DiagnosticStatus::Pending.can_transition_to(DiagnosticStatus::Ready));
        assert!(!DiagnosticStatus::Pending.can_transition_to(DiagnosticStatus::Failed));
        assert!(DiagnosticStatus::Pending.can_transition_to(DiagnosticStatus::Processing));
    }

    #[test]
    fn predecessors_of_ready_is_processing_only() {
        assert_eq!(
            DiagnosticStatus::predecessors(DiagnosticStatus::Ready),
            vec![DiagnosticStatus::Processing]
        );
        assert_eq!(
            DiagnosticStatus::predecessors(DiagnosticStatus::Processing),
            vec![DiagnosticStatus::Pending, DiagnosticStatus::Processing]
        );
    }

    #[test]
    fn string_form_round_trips() {
        for s in DiagnosticStatus::ALL {
            assert_eq!(s.as_str().parse::<DiagnosticStatus>().unwrap(), s);
            assert_eq!(serde_json::to_value(s).unwrap(), s.as_str());
        }
    }

    proptest! {
        #[test]
        fn legal_edges_never_move_backwards(from in any_status(), to in any_status()) {
            if from.can_transition_to(to) {
                prop_assert!(to.rank() >= from.rank());
                prop_assert!(!from.is_terminal());
            }
        }

        #[test]
        fn any_walk_stays_monotone(steps in prop::collection::vec(any_status(), 0..16)) {
            let mut current = DiagnosticStatus::Pending;
            for next in steps {
                if current.ensure_transition(next).is_ok() {
                    prop_assert!(next.rank() >= current.rank());
                    current = next;
                }
            }
        }
    }
}
