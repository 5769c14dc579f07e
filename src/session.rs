//! The client-side RNDC session state machine.
//!
//! [`Session`] performs no I/O of its own. It is driven by repeatedly
//! calling [`Session::start`] then [`Session::next`], reacting to the
//! [`Event`] each returns - this keeps the protocol logic usable from both
//! blocking and asynchronous callers, with all of the actual socket work
//! left to the caller (see [`crate::Client`] for a blocking one).

use crate::{
    packet::Packet,
    value::{Table, Value},
    Error,
};

/// An instruction returned by [`Session::start`] or [`Session::next`],
/// describing what the caller should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Write these bytes to the transport, then call [`Session::next`] with
    /// `None`.
    Write(Vec<u8>),

    /// Read one packet from the transport, then call [`Session::next`] with
    /// the bytes read.
    Read,

    /// The session completed successfully; this is the command's textual
    /// response. The session is finished - it must not be driven further.
    Finish(String),

    /// The session failed. The session is finished - it must not be driven
    /// further.
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    WantWrite,
    WantRead,
    Finished,
}

/// The client side of the four-packet RNDC handshake: open, nonce reply,
/// command, result.
#[derive(Debug)]
pub struct Session {
    key: String,
    command: String,
    nonce_seen: bool,
    state: State,
}

impl Session {
    /// Constructs a client session that will run `command` once connected.
    pub fn new_client(key: impl Into<String>, command: impl Into<String>) -> Self {
        Session {
            key: key.into(),
            command: command.into(),
            nonce_seen: false,
            state: State::Start,
        }
    }

    /// Would construct the server side of a session.
    ///
    /// The server role is not implemented by this crate - see `DESIGN.md`.
    pub fn new_server(_key: impl Into<String>) -> Result<Self, Error> {
        Err(Error::ServerRoleUnsupported)
    }

    /// Starts the session, producing the initial connection-open packet.
    ///
    /// # Panics
    ///
    /// Panics if called more than once on the same session.
    pub fn start(&mut self) -> Event {
        assert_eq!(
            self.state,
            State::Start,
            "Session::start called more than once"
        );

        match Packet::new(self.key.clone(), None, None).to_bytes() {
            Ok(bytes) => {
                self.state = State::WantWrite;
                Event::Write(bytes)
            }
            Err(e) => {
                self.state = State::Finished;
                Event::Error(e.to_string())
            }
        }
    }

    /// Advances the session with the result of the action requested by the
    /// previous [`Event`].
    ///
    /// Pass `None` after writing the bytes from an [`Event::Write`]; pass
    /// `Some(bytes)` with exactly one packet's worth of bytes after an
    /// [`Event::Read`].
    ///
    /// # Panics
    ///
    /// Panics if called before [`Session::start`], after the session has
    /// reached [`Event::Finish`] or [`Event::Error`], or with data that
    /// doesn't match what the current state expects.
    pub fn next(&mut self, data: Option<&[u8]>) -> Event {
        match self.state {
            State::Start => panic!("Session::next called before Session::start"),
            State::Finished => panic!("Session::next called on a finished session"),
            State::WantWrite => {
                assert!(
                    data.is_none(),
                    "Session::next called with data while awaiting a write"
                );
                self.state = State::WantRead;
                Event::Read
            }
            State::WantRead => {
                let data =
                    data.expect("Session::next called without data while awaiting a read");
                self.advance_on_read(data)
            }
        }
    }

    fn advance_on_read(&mut self, data: &[u8]) -> Event {
        let packet = match Packet::parse(&self.key, data) {
            Ok(packet) => packet,
            Err(e) => {
                self.state = State::Finished;
                return Event::Error(e.to_string());
            }
        };

        if !self.nonce_seen {
            return self.send_command(packet);
        }

        let text = packet.text().unwrap_or("").to_owned();
        self.state = State::Finished;
        Event::Finish(text)
    }

    fn send_command(&mut self, first_reply: Packet) -> Event {
        let nonce = match first_reply.nonce() {
            Some(n) => n,
            None => {
                self.state = State::Finished;
                return Event::Error(
                    "malformed rndc packet: missing nonce in server's first reply".into(),
                );
            }
        };
        self.nonce_seen = true;

        let mut data = Table::new();
        data.insert(
            "type".into(),
            if self.command.is_empty() {
                Value::null()
            } else {
                Value::binary(self.command.clone())
            },
        );

        match Packet::new(self.key.clone(), Some(data), Some(nonce)).to_bytes() {
            Ok(bytes) => {
                self.state = State::WantWrite;
                Event::Write(bytes)
            }
            Err(e) => {
                self.state = State::Finished;
                Event::Error(e.to_string())
            }
        }
    }
}
