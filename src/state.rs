//! Role-indexed protocol state machine
//!
//! Two static transition tables, one per role, consulted by every state
//! change a `Connection` makes. [`next_state`] is pure: it either returns
//! the successor state or reports the exact `(role, state, event)` triple
//! that has no transition.

use std::fmt;

use crate::error::{FrameError, Result};
use crate::events::EventKind;
use crate::role::Role;

/// A point in the per-role state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Nothing in flight yet.
    Idle,
    /// Header sent, body bytes outstanding.
    SendBody,
    /// Server has the full request and owes a response.
    SendResponse,
    /// This side's part of the exchange is complete.
    Done,
    /// Terminal.
    Closed,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Idle => "IDLE",
            State::SendBody => "SEND_BODY",
            State::SendResponse => "SEND_RESPONSE",
            State::Done => "DONE",
            State::Closed => "CLOSED",
        };
        write!(f, "{name}")
    }
}

/// Look up the successor of `state` for `role` on `event`.
///
/// Triples outside the transition table are protocol violations.
pub fn next_state(role: Role, state: State, event: EventKind) -> Result<State> {
    use EventKind::*;
    use State::*;

    let next = match role {
        Role::Client => match (state, event) {
            (Idle, RequestSent) => Some(SendBody),
            (Idle, Close) => Some(Closed),
            (SendBody, DataSent) => Some(SendBody),
            (SendBody, MessageEnd) => Some(Done),
            (SendBody, Close) => Some(Closed),
            (Done, Close) => Some(Closed),
            _ => None,
        },
        Role::Server => match (state, event) {
            (Idle, RequestReceived) => Some(SendResponse),
            (Idle, Close) => Some(Closed),
            (SendResponse, ResponseSent) => Some(SendBody),
            (SendResponse, Close) => Some(Closed),
            (SendBody, DataSent) => Some(SendBody),
            (SendBody, MessageEnd) => Some(Done),
            (SendBody, Close) => Some(Closed),
            (Done, Close) => Some(Closed),
            _ => None,
        },
    };
    next.ok_or_else(|| {
        FrameError::Protocol(format!(
            "no transition for {role} in state {state} on event {event}"
        ))
    })
}
