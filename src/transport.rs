//! The socket abstraction [`crate::Client`] drives a [`crate::Session`] over.

use std::{
    io::{self, Read, Write},
    net::{Shutdown, TcpStream, ToSocketAddrs},
};

/// The default RNDC control channel port.
pub const DEFAULT_PORT: u16 = 953;

/// A transport capable of carrying RNDC packets.
///
/// This is the seam a caller overrides to run a [`crate::Session`] over
/// something other than a plain blocking TCP socket - a Unix domain socket,
/// a TLS tunnel, or an in-process pipe for testing.
pub trait Transport: Sized {
    /// Connects to `addr` (an address in `host:port` form).
    fn connect(addr: &str) -> io::Result<Self>;

    /// Writes `buf` in full.
    fn send(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Reads one packet's worth of bytes into `buf`, returning the number of
    /// bytes read.
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Closes the transport.
    fn close(self) -> io::Result<()>;
}

/// A blocking [`Transport`] over a plain TCP socket.
#[derive(Debug)]
pub struct TcpTransport(TcpStream);

impl Transport for TcpTransport {
    fn connect(addr: &str) -> io::Result<Self> {
        let addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no addresses resolved"))?;
        TcpStream::connect(addr).map(TcpTransport)
    }

    fn send(&mut self, buf: &[u8]) -> io::Result<()> {
        self.0.write_all(buf)
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // The frame is self-delimiting: a 4 byte big-endian length prefix
        // followed by exactly that many more bytes. A single `read` can
        // return a partial TCP segment, so read the prefix and body to
        // completion rather than handing back whatever arrived first.
        let mut len_buf = [0u8; 4];
        self.0.read_exact(&mut len_buf)?;
        let body_len = u32::from_be_bytes(len_buf) as usize;
        let total_len = 4 + body_len;

        if total_len > buf.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("rndc packet of {total_len} bytes exceeds receive buffer of {} bytes", buf.len()),
            ));
        }

        buf[..4].copy_from_slice(&len_buf);
        self.0.read_exact(&mut buf[4..total_len])?;
        Ok(total_len)
    }

    fn close(self) -> io::Result<()> {
        self.0.shutdown(Shutdown::Both)
    }
}

#[cfg(test)]
mod tests {
    use std::{net::TcpListener, thread, time::Duration};

    use super::*;

    #[test]
    fn test_recv_reassembles_a_frame_split_across_writes() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let body = b"_ctrl entries and _data entries live here".to_vec();
        let frame_len = body.len() as u32;

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream.write_all(&frame_len.to_be_bytes()[..2]).unwrap();
            thread::sleep(Duration::from_millis(20));
            stream.write_all(&frame_len.to_be_bytes()[2..]).unwrap();
            thread::sleep(Duration::from_millis(20));
            stream.write_all(&body[..10]).unwrap();
            thread::sleep(Duration::from_millis(20));
            stream.write_all(&body[10..]).unwrap();
        });

        let mut transport = TcpTransport::connect(&addr.to_string()).unwrap();
        let mut buf = vec![0u8; 1024];
        let n = transport.recv(&mut buf).unwrap();

        assert_eq!(n, 4 + body.len());
        assert_eq!(&buf[4..n], body.as_slice());

        server.join().unwrap();
    }

    #[test]
    fn test_recv_rejects_a_frame_larger_than_the_buffer() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream.write_all(&100u32.to_be_bytes()).unwrap();
            stream.write_all(&[0u8; 100]).unwrap();
        });

        let mut transport = TcpTransport::connect(&addr.to_string()).unwrap();
        let mut buf = vec![0u8; 16];

        assert_eq!(
            transport.recv(&mut buf).unwrap_err().kind(),
            io::ErrorKind::InvalidData
        );

        server.join().unwrap();
    }
}
