//! A blocking, convenience façade over [`Session`] and [`Transport`].

use std::marker::PhantomData;

use crate::{
    session::{Event, Session},
    transport::{TcpTransport, Transport, DEFAULT_PORT},
};

/// The largest single packet this client will read off the wire.
const MAX_PACKET_SIZE: usize = 64 * 1024;

/// A blocking RNDC client: connect over `T`, run one command, read back the
/// textual response.
///
/// ```no_run
/// use rndc_client::Client;
///
/// let mut client = Client::new();
/// client.set_key("c3RvcCBoYW1tZXJ0aW1l");
/// client.set_host("127.0.0.1");
///
/// if client.do_command("status") {
///     println!("{}", client.response());
/// } else {
///     eprintln!("rndc failed: {}", client.error());
/// }
/// ```
#[derive(Debug)]
pub struct Client<T: Transport = TcpTransport> {
    key: Option<String>,
    host: Option<String>,
    port: u16,
    response: String,
    error: String,
    _transport: PhantomData<T>,
}

impl<T: Transport> Default for Client<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> Client<T> {
    /// Constructs a client with no key or host set and the default RNDC
    /// port.
    pub fn new() -> Self {
        Client {
            key: None,
            host: None,
            port: DEFAULT_PORT,
            response: String::new(),
            error: String::new(),
            _transport: PhantomData,
        }
    }

    /// Sets the Base64-encoded HMAC-MD5 key shared with the server.
    pub fn set_key(&mut self, key: impl Into<String>) -> &mut Self {
        self.key = Some(key.into());
        self
    }

    /// Sets the server host to connect to.
    pub fn set_host(&mut self, host: impl Into<String>) -> &mut Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the server port to connect to. Defaults to
    /// [`DEFAULT_PORT`](crate::transport::DEFAULT_PORT).
    pub fn set_port(&mut self, port: u16) -> &mut Self {
        self.port = port;
        self
    }

    /// The server's textual response to the last command run, if it
    /// succeeded.
    pub fn response(&self) -> &str {
        &self.response
    }

    /// The error encountered by the last command run, if it failed.
    pub fn error(&self) -> &str {
        &self.error
    }

    /// Connects, runs `command`, and reads back the server's response.
    ///
    /// Returns `true` on success, with the response available from
    /// [`Client::response`]; returns `false` on failure, with the failure
    /// reason available from [`Client::error`].
    ///
    /// # Panics
    ///
    /// Panics if no key has been set via [`Client::set_key`], or no host has
    /// been set via [`Client::set_host`].
    pub fn do_command(&mut self, command: &str) -> bool {
        let key = self.key.clone().expect("missing required argument 'key'");
        let host = self
            .host
            .clone()
            .expect("missing required argument 'host'");

        self.response.clear();
        self.error.clear();

        let addr = format!("{host}:{port}", port = self.port);

        let mut transport = match T::connect(&addr) {
            Ok(t) => t,
            Err(e) => {
                self.error = e.to_string();
                return false;
            }
        };

        let mut session = Session::new_client(key, command);
        let mut event = session.start();

        loop {
            match event {
                Event::Write(bytes) => {
                    if let Err(e) = transport.send(&bytes) {
                        self.error = e.to_string();
                        return false;
                    }
                    event = session.next(None);
                }
                Event::Read => {
                    let mut buf = vec![0u8; MAX_PACKET_SIZE];
                    let n = match transport.recv(&mut buf) {
                        Ok(n) => n,
                        Err(e) => {
                            self.error = e.to_string();
                            return false;
                        }
                    };
                    event = session.next(Some(&buf[..n]));
                }
                Event::Finish(text) => {
                    self.response = text;
                    break;
                }
                Event::Error(message) => {
                    self.error = message;
                    break;
                }
            }
        }

        let _ = transport.close();

        if self.error.is_empty() && self.response.is_empty() {
            self.error = "rndc: empty response from server".to_owned();
        }
        self.error.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        packet::Packet,
        transport::test_double::{register_replies, sent_to, PairTransport},
        value::{Table, Value},
    };

    use super::*;

    const KEY: &str = "c3RvcCBoYW1tZXJ0aW1l";

    fn command_result(key: &str, nonce: u32, text: &str) -> Vec<u8> {
        let mut data = Table::new();
        data.insert("text".into(), Value::binary(text.as_bytes().to_vec()));
        Packet::new(key, Some(data), Some(nonce))
            .to_bytes()
            .unwrap()
    }

    fn open_reply(key: &str, nonce: u32) -> Vec<u8> {
        Packet::new(key, None, Some(nonce)).to_bytes().unwrap()
    }

    #[test]
    fn test_do_command_happy_path() {
        let addr = "rndc-client-test-host-1:953";
        register_replies(
            addr,
            vec![open_reply(KEY, 11), command_result(KEY, 11, "server is up and running")],
        );

        let mut client: Client<PairTransport> = Client::new();
        client.set_key(KEY);
        client.set_host("rndc-client-test-host-1");

        assert!(client.do_command("status"));
        assert_eq!(client.response(), "server is up and running");
        assert_eq!(client.error(), "");
        assert_eq!(sent_to(addr).len(), 2);
    }

    #[test]
    fn test_do_command_default_command_is_literal_null() {
        let addr = "rndc-client-test-host-4:953";
        register_replies(addr, vec![open_reply(KEY, 4), command_result(KEY, 4, "ok")]);

        let mut client: Client<PairTransport> = Client::new();
        client.set_key(KEY);
        client.set_host("rndc-client-test-host-4");

        assert!(client.do_command(""));

        let sent = sent_to(addr);
        let command_packet = Packet::parse(KEY, &sent[1]).unwrap();
        assert_eq!(command_packet.command(), Some("null"));
    }

    #[test]
    fn test_do_command_host_and_port_override() {
        let addr = "10.0.0.1:9953";
        register_replies(addr, vec![open_reply(KEY, 3), command_result(KEY, 3, "ok")]);

        let mut client: Client<PairTransport> = Client::new();
        client.set_key(KEY);
        client.set_host("10.0.0.1");
        client.set_port(9953);

        assert!(client.do_command("reload"));
        assert_eq!(client.response(), "ok");
    }

    #[test]
    fn test_do_command_wrong_key_fails() {
        let addr = "rndc-client-test-host-2:953";
        register_replies(addr, vec![open_reply("d3JvbmdrZXlpc3dyb25n", 5)]);

        let mut client: Client<PairTransport> = Client::new();
        client.set_key(KEY);
        client.set_host("rndc-client-test-host-2");

        assert!(!client.do_command("status"));
        assert!(!client.error().is_empty());
    }

    #[test]
    fn test_do_command_empty_response_is_failure() {
        let addr = "rndc-client-test-host-3:953";
        register_replies(addr, vec![open_reply(KEY, 9), command_result(KEY, 9, "")]);

        let mut client: Client<PairTransport> = Client::new();
        client.set_key(KEY);
        client.set_host("rndc-client-test-host-3");

        assert!(!client.do_command("status"));
        assert!(client.response().is_empty());
        assert!(!client.error().is_empty());
    }

    #[test]
    #[should_panic(expected = "missing required argument 'key'")]
    fn test_do_command_without_key_panics() {
        let mut client: Client<PairTransport> = Client::new();
        client.set_host("127.0.0.1");
        client.do_command("status");
    }

    #[test]
    #[should_panic(expected = "missing required argument 'host'")]
    fn test_do_command_without_host_panics() {
        let mut client: Client<PairTransport> = Client::new();
        client.set_key(KEY);
        client.do_command("status");
    }
}
