//! Sans-I/O engine for Language Server Protocol base framing
//!
//! Converts between a stream of bytes and a stream of protocol events,
//! enforcing the `Content-Length` framing contract and a role-aware state
//! machine. The engine performs no network, file, or thread operations:
//! the caller feeds inbound bytes into [`Connection::receive`] and
//! transmits whatever bytes [`Connection::send`] / [`Connection::send_json`]
//! return.
//!
//! # Components
//!
//! - [`Connection`] - the façade tying everything together
//! - [`Event`] / [`Header`] / [`Payload`] - the event algebra
//! - [`Role`] / [`State`] - the role-indexed state machine
//! - [`FrameError`] - protocol and invariant failures
//!
//! # Example
//!
//! ```
//! use lsp_frame::{Connection, Event, NextEvent};
//! use serde_json::json;
//!
//! # fn main() -> lsp_frame::Result<()> {
//! let mut client = Connection::new("client")?;
//! let request = client.send_json(&json!({"method": "didOpen"}))?;
//!
//! // `request` now goes out over whatever transport the caller owns;
//! // the server side turns the same bytes back into events:
//! let mut server = Connection::new("server")?;
//! server.receive(&request);
//! loop {
//!     match server.next_event()? {
//!         NextEvent::Event(Event::MessageEnd) => break,
//!         NextEvent::Event(_) => continue,
//!         NextEvent::NeedData => unreachable!("request is complete"),
//!     }
//! }
//! let (header, body) = server.received_body()?;
//! assert_eq!(body, json!({"method": "didOpen"}));
//! assert_eq!(header.content_length, serde_json::to_vec(&body)?.len());
//! # Ok(())
//! # }
//! ```

mod buffer;
mod collector;
mod connection;
mod error;
mod events;
mod role;
mod state;

pub use connection::{Connection, NextEvent};
pub use error::{FrameError, Result};
pub use events::{Event, EventKind, Header, Payload, DEFAULT_CONTENT_TYPE};
pub use role::Role;
pub use state::State;
