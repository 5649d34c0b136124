//! Payment attempt lifecycle
//!
//! Every payment attempt moves through exactly one of two paths:
//!
//! ```text
//! PENDING --commit(success)-----------> COMPLETED  (terminal)
//! PENDING --commit(capacity exceeded)-> FAILED     (terminal)
//! PENDING --fail(any reason)----------> FAILED     (terminal)
//! ```
//!
//! Terminal states absorb any further transition request: asking for the
//! state an attempt is already in is a no-op (gateway retries are routine),
//! asking for the *other* terminal state is a conflict. The transition table
//! below is the single source of legality; both store backends consult it
//! before touching a row.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// State of a payment attempt, stored as text in `payment_attempts.state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    Pending,
    Completed,
    Failed,
}

/// Result of asking for a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The change is legal and produces the new state.
    Applied(PaymentState),
    /// The record is already in the requested terminal state.
    NoOp,
    /// The change would leave a terminal state (or re-enter pending).
    Conflict,
}

impl PaymentState {
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// COMPLETED and FAILED never change again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// The transition table.
    pub fn transition(self, to: PaymentState) -> Transition {
        use PaymentState::*;
        match (self, to) {
            (Pending, Completed) => Transition::Applied(Completed),
            (Pending, Failed) => Transition::Applied(Failed),
            (Completed, Completed) | (Failed, Failed) => Transition::NoOp,
            _ => Transition::Conflict,
        }
    }
}

impl std::fmt::Display for PaymentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_db())
    }
}

/// Error when decoding an unknown state string from the database.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid payment state: {0}")]
pub struct InvalidPaymentState(pub String);

impl TryFrom<String> for PaymentState {
    type Error = InvalidPaymentState;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_db(&value).ok_or(InvalidPaymentState(value))
    }
}
