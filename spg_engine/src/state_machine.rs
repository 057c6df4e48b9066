//! The order status state machine.
//!
//! [`decide`] is a pure function. It is called inside the reconciliation critical section, so it must never do I/O.
//!
//! ```text
//!   PENDING ──► PAID ──► PROCESSING ──► SHIPPED ──► DELIVERED ──► COMPLETED
//!      │          │           │
//!      ├──────────┴───────────┴──► CANCELLED
//!      └──────────┴───────────┴──► FAILED
//! ```
use std::fmt::Display;

use crate::db_types::OrderStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The current status is terminal. Nothing moves out of it.
    TerminalState,
    /// There is no edge from the current status to the proposed one.
    IllegalTransition,
}

impl Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::TerminalState => write!(f, "current status is terminal"),
            RejectReason::IllegalTransition => write!(f, "illegal transition"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    NoOp,
    Reject(RejectReason),
}

impl Decision {
    pub fn is_accept(&self) -> bool {
        matches!(self, Decision::Accept)
    }
}

/// Returns true if `from -> to` is one of the legal forward edges.
pub fn is_legal_edge(from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::*;
    matches!(
        (from, to),
        (Pending, Paid)
            | (Pending, Cancelled)
            | (Pending, Failed)
            | (Paid, Processing)
            | (Paid, Cancelled)
            | (Paid, Failed)
            | (Processing, Shipped)
            | (Processing, Cancelled)
            | (Processing, Failed)
            | (Shipped, Delivered)
            | (Delivered, Completed)
    )
}

/// Decide what to do with a proposed status change.
///
/// * Same status: `NoOp`, even for terminal states.
/// * Any other proposal out of a terminal state: `Reject(TerminalState)`.
/// * Otherwise `Accept` iff the edge is legal.
pub fn decide(current: OrderStatus, proposed: OrderStatus) -> Decision {
    if current == proposed {
        return Decision::NoOp;
    }
    if current.is_terminal() {
        return Decision::Reject(RejectReason::TerminalState);
    }
    if is_legal_edge(current, proposed) {
        Decision::Accept
    } else {
        Decision::Reject(RejectReason::IllegalTransition)
    }
}
