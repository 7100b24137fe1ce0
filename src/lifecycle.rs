// 🔁 Observation lifecycle
//
//   OPEN ──► RESURFACED ──► CLOSED
//     │                      │
//     └──────► CLOSED ◄──────┘ (and CLOSED ──► RESURFACED)
//
// Transitions are permissive: any status can be moved to CLOSED or
// RESURFACED. The function below is deterministic and never rejects; it only
// reports whether the move changed the observation between open and closed.

use serde::{Deserialize, Serialize};

use crate::observation::Status;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionTarget {
    Close,
    Resurface,
}

impl TransitionTarget {
    pub fn status(&self) -> Status {
        match self {
            TransitionTarget::Close => Status::Closed,
            TransitionTarget::Resurface => Status::Resurfaced,
        }
    }

    /// Audit event name written to observation_events
    pub fn event_type(&self) -> &'static str {
        match self {
            TransitionTarget::Close => "observation_closed",
            TransitionTarget::Resurface => "observation_resurfaced",
        }
    }

    /// Column holding the timestamp of the latest such transition
    pub(crate) fn timestamp_column(&self) -> &'static str {
        match self {
            TransitionTarget::Close => "closed_at",
            TransitionTarget::Resurface => "resurfaced_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: Status,
    pub to: Status,
}

impl Transition {
    /// False when the move leaves the observation on the same side of
    /// open/closed (re-closing, or resurfacing something still open)
    pub fn is_effective(&self) -> bool {
        self.from.is_open_like() != self.to.is_open_like()
    }
}

pub fn transition(current: Status, target: TransitionTarget) -> Transition {
    Transition {
        from: current,
        to: target.status(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_status_can_close_and_resurface() {
        for current in [Status::Open, Status::Resurfaced, Status::Closed] {
            assert_eq!(transition(current, TransitionTarget::Close).to, Status::Closed);
            assert_eq!(
                transition(current, TransitionTarget::Resurface).to,
                Status::Resurfaced
            );
        }
    }

    #[test]
    fn test_effective_transitions() {
        assert!(transition(Status::Open, TransitionTarget::Close).is_effective());
        assert!(transition(Status::Closed, TransitionTarget::Resurface).is_effective());
        assert!(transition(Status::Resurfaced, TransitionTarget::Close).is_effective());

        assert!(!transition(Status::Open, TransitionTarget::Resurface).is_effective());
        assert!(!transition(Status::Closed, TransitionTarget::Close).is_effective());
        assert!(!transition(Status::Resurfaced, TransitionTarget::Resurface).is_effective());
    }
}
