use thiserror::Error;

/// Error types returned by this crate.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// The buffer is too small to contain the 4 byte length-prefix header of
    /// a packet.
    #[error("incomplete packet header")]
    IncompleteHeader,

    /// The length prefix in a packet header does not match the amount of
    /// data actually available in the buffer.
    #[error("incomplete rndc packet (got {buffer_len} bytes, expected {expected})")]
    IncompleteMessage {
        /// The length of the buffer provided.
        buffer_len: usize,

        /// The length expected for this packet, per its header.
        expected: usize,
    },

    /// A type tag byte in the ISCCC value stream does not match any of the
    /// known [`Value`](crate::Value) variants.
    #[error("unknown isccc type tag {0:#04x}")]
    UnknownTypeTag(u8),

    /// A length-prefixed value (a [`Value`](crate::Value) body, or a table
    /// key) claims to be longer than the remaining bytes in the buffer.
    #[error("invalid length in isccc value stream")]
    InvalidLength,

    /// The top-level value of a packet, or of a sub-table such as `_ctrl` or
    /// `_data`, was not a [`Value::Table`](crate::Value::Table).
    #[error("malformed rndc packet: expected a table")]
    NotATable,

    /// A table key was not valid UTF-8.
    #[error("malformed rndc packet: non-utf8 table key")]
    InvalidTableKey(#[source] std::str::Utf8Error),

    /// The packet declares a protocol version other than the one this crate
    /// implements.
    #[error("unsupported rndc protocol version {0}")]
    InvalidVersion(u32),

    /// The packet is missing its `_auth` table, or the `_auth` table is
    /// missing the `hmd5` entry.
    #[error("malformed rndc packet: missing authenticator")]
    MissingAuthenticator,

    /// The provided HMAC key is not valid Base64.
    #[error("invalid hmac key: {0}")]
    InvalidKey(#[from] base64::DecodeError),

    /// The computed HMAC-MD5 digest of the packet payload does not match the
    /// `_auth.hmd5` value carried in the packet.
    #[error("couldn't validate response with provided key")]
    SignatureMismatch,

    /// The server returned a non-empty `_data.err` entry.
    #[error("server error: {0}")]
    ServerError(String),

    /// The caller constructed a [`Session`](crate::Session) with the server
    /// role.
    ///
    /// The server side of RNDC is not implemented by this crate - see
    /// `DESIGN.md` for why.
    #[error("server role is not supported")]
    ServerRoleUnsupported,

    /// An I/O error occurred reading or writing a packet.
    #[error("i/o error ({0:?}): {1}")]
    IOError(std::io::ErrorKind, String),
}

impl From<std::io::Error> for Error {
    fn from(v: std::io::Error) -> Self {
        Self::IOError(v.kind(), v.to_string())
    }
}
