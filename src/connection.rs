//! Connection façade
//!
//! Wires the receive buffer, the two collectors, and the state machine into
//! the sans-I/O surface: bytes in via [`Connection::receive`], events out via
//! [`Connection::next_event`], events in via [`Connection::send`], bytes out
//! as return values. The connection never touches a socket; the caller owns
//! all I/O.

use bytes::Bytes;
use serde_json::Value;

use crate::buffer::ReceiveBuffer;
use crate::collector::FixedLengthCollector;
use crate::error::{FrameError, Result};
use crate::events::{Event, EventKind, Header, Payload};
use crate::role::Role;
use crate::state::{next_state, State};

/// Outcome of polling for the next inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum NextEvent {
    /// An event extracted from the inbound buffer.
    Event(Event),
    /// Not enough buffered bytes; feed more via [`Connection::receive`].
    NeedData,
}

impl NextEvent {
    pub fn is_need_data(&self) -> bool {
        matches!(self, NextEvent::NeedData)
    }

    pub fn into_event(self) -> Option<Event> {
        match self {
            NextEvent::Event(event) => Some(event),
            NextEvent::NeedData => None,
        }
    }
}

/// Collaborator invariant failures crossing the connection boundary are
/// protocol errors from the caller's point of view.
fn promote(err: FrameError) -> FrameError {
    match err {
        FrameError::Invariant(msg) => FrameError::Protocol(msg),
        other => other,
    }
}

/// Sans-I/O protocol engine for one LSP base-framing connection.
///
/// Tracks both sides of the exchange: `our_state` moves on what we send,
/// `their_state` mirrors what the byte streams imply about the peer. One
/// request/response exchange is a "circle"; [`Connection::go_next_circle`]
/// resets for the next one.
#[derive(Debug)]
pub struct Connection {
    our_role: Role,
    their_role: Role,
    our_state: State,
    their_state: State,
    in_buffer: ReceiveBuffer,
    in_collector: FixedLengthCollector,
    out_collector: FixedLengthCollector,
}

impl Connection {
    /// Construct from a role name, `"client"` or `"server"`.
    pub fn new(role: &str) -> Result<Self> {
        Ok(Self::with_role(role.parse()?))
    }

    /// Construct from a typed role.
    pub fn with_role(role: Role) -> Self {
        Self {
            our_role: role,
            their_role: role.opposite(),
            our_state: State::Idle,
            their_state: State::Idle,
            in_buffer: ReceiveBuffer::new(),
            in_collector: FixedLengthCollector::new(),
            out_collector: FixedLengthCollector::new(),
        }
    }

    pub fn our_role(&self) -> Role {
        self.our_role
    }

    pub fn their_role(&self) -> Role {
        self.their_role
    }

    pub fn our_state(&self) -> State {
        self.our_state
    }

    pub fn their_state(&self) -> State {
        self.their_state
    }

    /// Turn an outbound event into the bytes to transmit.
    ///
    /// Advances `our_state` through the transition table; a request header
    /// additionally moves the peer slot, since transmitting it commits the
    /// peer to receiving it. Header events declare the body length on the
    /// outbound collector, data events are checked against it, and
    /// `MessageEnd` is rejected while declared bytes are still owed.
    pub fn send(&mut self, event: &Event) -> Result<Bytes> {
        let our_next = next_state(self.our_role, self.our_state, event.kind())?;
        let mut their_next = self.their_state;
        let data = event.to_data()?;

        match event {
            Event::RequestReceived(header)
            | Event::RequestSent(header)
            | Event::ResponseReceived(header)
            | Event::ResponseSent(header) => {
                self.out_collector
                    .set_length(header.content_length)
                    .map_err(promote)?;
                if event.kind() == EventKind::RequestSent {
                    their_next =
                        next_state(self.their_role, self.their_state, EventKind::RequestReceived)?;
                }
            }
            Event::DataReceived(_) | Event::DataSent(_) => {
                self.out_collector.append(&data).map_err(promote)?;
            }
            Event::MessageEnd => {
                if self.out_collector.remain() > 0 {
                    return Err(FrameError::Protocol(format!(
                        "message ended too early: {} declared bytes still unsent",
                        self.out_collector.remain()
                    )));
                }
            }
            Event::Close => {}
        }

        tracing::debug!(
            role = %self.our_role,
            event = %event.kind(),
            from = %self.our_state,
            to = %our_next,
            "send"
        );
        self.our_state = our_next;
        self.their_state = their_next;
        Ok(data)
    }

    /// One-shot JSON message: header and body bytes in a single call.
    ///
    /// Semantically equivalent to header + data + `MessageEnd`, but skips
    /// the `SEND_BODY` sojourn: a client goes `IDLE -> DONE` (peer to
    /// `SEND_RESPONSE`), a server goes `SEND_RESPONSE -> DONE`. Only legal
    /// from those states.
    pub fn send_json(&mut self, value: &Value) -> Result<Bytes> {
        self.send_json_with(value, |v| serde_json::to_vec(v))
    }

    /// Like [`Connection::send_json`] with a caller-supplied JSON encoder.
    pub fn send_json_with<F>(&mut self, value: &Value, encode: F) -> Result<Bytes>
    where
        F: FnOnce(&Value) -> serde_json::Result<Vec<u8>>,
    {
        let body = encode(value)?;
        let header = Header::new(body.len());
        match self.our_role {
            Role::Client => {
                if self.our_state != State::Idle || self.their_state != State::Idle {
                    return Err(FrameError::Protocol(format!(
                        "client send_json requires a fresh exchange, states are {}/{}",
                        self.our_state, self.their_state
                    )));
                }
                self.out_collector.set_length(body.len()).map_err(promote)?;
                self.out_collector.append(&body).map_err(promote)?;
                self.our_state = State::Done;
                self.their_state = State::SendResponse;
            }
            Role::Server => {
                if self.our_state != State::SendResponse || self.their_state != State::Done {
                    return Err(FrameError::Protocol(format!(
                        "server send_json requires a fully received request, states are {}/{}",
                        self.our_state, self.their_state
                    )));
                }
                self.out_collector.set_length(body.len()).map_err(promote)?;
                self.out_collector.append(&body).map_err(promote)?;
                self.our_state = State::Done;
            }
        }
        tracing::debug!(role = %self.our_role, length = body.len(), "send_json");
        let mut data = header.to_data();
        data.extend_from_slice(&body);
        Ok(Bytes::from(data))
    }

    /// Feed bytes read off the wire into the inbound buffer. Never fails;
    /// parsing happens in [`Connection::next_event`].
    pub fn receive(&mut self, data: &[u8]) {
        self.in_buffer.append(data);
    }

    /// Parse the next event out of the inbound buffer.
    ///
    /// Yields the header event first, then one `DataReceived` per newly
    /// buffered chunk, then `MessageEnd` once the declared length is
    /// reached. Returns [`NextEvent::NeedData`] whenever the buffer is
    /// starved. A client may only read once its own request is done.
    pub fn next_event(&mut self) -> Result<NextEvent> {
        if self.our_role == Role::Client && self.our_state != State::Done {
            return Err(FrameError::Protocol(
                "client may only read after its request is fully sent".to_string(),
            ));
        }
        if !self.in_buffer.header_extracted() {
            let Some(fields) = self.in_buffer.try_extract_header()? else {
                return Ok(NextEvent::NeedData);
            };
            let header = Header::from_fields(&fields)?;
            self.in_collector
                .set_length(header.content_length)
                .map_err(promote)?;
            let event = match self.our_role {
                Role::Server => {
                    let our_next =
                        next_state(self.our_role, self.our_state, EventKind::RequestReceived)?;
                    let their_next =
                        next_state(self.their_role, self.their_state, EventKind::RequestSent)?;
                    self.our_state = our_next;
                    self.their_state = their_next;
                    Event::RequestReceived(header)
                }
                Role::Client => {
                    self.their_state =
                        next_state(self.their_role, self.their_state, EventKind::ResponseSent)?;
                    Event::ResponseReceived(header)
                }
            };
            tracing::debug!(role = %self.our_role, event = %event.kind(), "next_event");
            return Ok(NextEvent::Event(event));
        }
        match self.in_buffer.try_extract_data().map_err(promote)? {
            None if self.in_collector.remain() == 0 => {
                self.their_state =
                    next_state(self.their_role, self.their_state, EventKind::MessageEnd)?;
                Ok(NextEvent::Event(Event::MessageEnd))
            }
            None => Ok(NextEvent::NeedData),
            Some(data) => {
                // the collector rejects bytes beyond the declared length
                self.in_collector.append(&data).map_err(promote)?;
                self.their_state =
                    next_state(self.their_role, self.their_state, EventKind::DataSent)?;
                Ok(NextEvent::Event(Event::DataReceived(Payload::Bytes(data))))
            }
        }
    }

    /// The completed inbound message as a header and JSON-decoded body.
    ///
    /// Only available once the header is in and the body is complete.
    pub fn received_body(&mut self) -> Result<(Header, Value)> {
        let (header, raw) = self.received_body_raw()?;
        let value = serde_json::from_slice(&raw)?;
        Ok((header, value))
    }

    /// The completed inbound message as a header and raw body bytes.
    pub fn received_body_raw(&mut self) -> Result<(Header, Bytes)> {
        let header = self.received_header()?;
        Ok((header, Bytes::copy_from_slice(self.in_collector.data())))
    }

    fn received_header(&mut self) -> Result<Header> {
        if !self.in_buffer.header_extracted() {
            return Err(FrameError::Invariant(
                "no header has been received yet".to_string(),
            ));
        }
        if !self.in_collector.full() {
            return Err(FrameError::Invariant(format!(
                "body is incomplete: {} bytes still expected",
                self.in_collector.remain()
            )));
        }
        let fields = self.in_buffer.try_extract_header()?.ok_or_else(|| {
            FrameError::Invariant("header vanished from the inbound buffer".to_string())
        })?;
        Header::from_fields(&fields)
    }

    /// Reset a completed request/response exchange.
    ///
    /// A client may move on once it is done and the peer has at least
    /// reached `SEND_RESPONSE` (the one-shot JSON path parks it there); a
    /// server once it has the full request and its own side is done or
    /// still owes only the response. Both states return to `IDLE` and all
    /// three buffers clear.
    pub fn go_next_circle(&mut self) -> Result<()> {
        let finished = match self.our_role {
            Role::Client => {
                self.our_state == State::Done
                    && matches!(self.their_state, State::SendResponse | State::Done)
            }
            Role::Server => {
                matches!(self.our_state, State::SendResponse | State::Done)
                    && self.their_state == State::Done
            }
        };
        if !finished {
            return Err(FrameError::Protocol(format!(
                "cannot start the next circle: {} states are {}/{}",
                self.our_role, self.our_state, self.their_state
            )));
        }
        tracing::debug!(role = %self.our_role, "go_next_circle");
        self.our_state = State::Idle;
        self.their_state = State::Idle;
        self.in_buffer.clear();
        self.in_collector.clear();
        self.out_collector.clear();
        Ok(())
    }

    /// Terminate the connection. Both state slots end up `CLOSED`;
    /// idempotent.
    pub fn close(&mut self) {
        self.our_state = State::Closed;
        self.their_state = State::Closed;
    }
}
