//! The signed RNDC packet envelope.

use std::{
    io::{Cursor, Write},
    time::{SystemTime, UNIX_EPOCH},
};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use hmac::{Hmac, Mac};
use md5::Md5;

use crate::{
    serial::next_serial,
    value::{Table, Value},
    Error,
};

type HmacMd5 = Hmac<Md5>;

/// The only RNDC protocol version this crate speaks.
const VERSION: u32 = 1;

/// A signed RNDC packet: the `_auth`/`_ctrl`/`_data` triple exchanged over
/// the wire, keyed by a shared HMAC-MD5 secret.
#[derive(Debug, Clone)]
pub struct Packet {
    key: String,
    ctrl: Table,
    data: Table,
}

impl Packet {
    /// Constructs a new outbound packet.
    ///
    /// `data` defaults to `{ type: null }`, the shape of the initial
    /// connection-open packet. `nonce`, when provided, is carried in
    /// `_ctrl._nonce` as its ASCII decimal representation - present on every
    /// packet after the server's first reply.
    pub fn new(key: impl Into<String>, data: Option<Table>, nonce: Option<u32>) -> Self {
        let mut ctrl = Table::new();
        ctrl.insert("_ser".into(), Value::binary(next_serial().to_string()));
        if let Some(nonce) = nonce {
            ctrl.insert("_nonce".into(), Value::binary(nonce.to_string()));
        }

        let data = data.unwrap_or_else(|| {
            let mut data = Table::new();
            data.insert("type".into(), Value::null());
            data
        });

        Packet {
            key: key.into(),
            ctrl,
            data,
        }
    }

    /// Returns the ASCII-decimal `_ctrl._nonce` value carried by this
    /// packet, if present and well-formed.
    pub fn nonce(&self) -> Option<u32> {
        self.ctrl.get("_nonce")?.as_str()?.parse().ok()
    }

    /// Returns `_data.type`, the command this packet carries.
    pub fn command(&self) -> Option<&str> {
        self.data.get("type")?.as_str()
    }

    /// Returns `_data.text`, the server's textual response to a command.
    pub fn text(&self) -> Option<&str> {
        self.data.get("text")?.as_str()
    }

    /// Returns `_data.err`, the server's error text, if any.
    pub fn err(&self) -> Option<&str> {
        self.data.get("err")?.as_str()
    }

    /// Serializes and signs this packet, producing the bytes ready to write
    /// to the wire.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let now = now_secs();

        let mut ctrl = self.ctrl.clone();
        ctrl.insert("_tim".into(), Value::binary(now.to_string()));
        ctrl.insert("_exp".into(), Value::binary((now + 60).to_string()));

        let mut payload = Table::new();
        payload.insert("_ctrl".into(), Value::Table(ctrl));
        payload.insert("_data".into(), Value::Table(self.data.clone()));
        let payload_bytes = payload.serialise_no_header();

        let signature = sign(&self.key, &payload_bytes)?;
        let mut auth_inner = Table::new();
        auth_inner.insert("hmd5".into(), Value::binary(signature));
        let mut auth = Table::new();
        auth.insert("_auth".into(), Value::Table(auth_inner));
        let auth_bytes = auth.serialise_no_header();

        let body_len = 4 + auth_bytes.len() + payload_bytes.len();

        let mut out = Vec::with_capacity(4 + body_len);
        out.write_u32::<BigEndian>(body_len as u32)?;
        out.write_u32::<BigEndian>(VERSION)?;
        out.write_all(&auth_bytes)?;
        out.write_all(&payload_bytes)?;

        Ok(out)
    }

    /// Parses and verifies a packet read off the wire.
    ///
    /// `buf` must contain exactly one length-prefixed packet - the 4 byte
    /// length header plus that many bytes of body, with nothing left over.
    pub fn parse(key: &str, buf: &[u8]) -> Result<Self, Error> {
        if buf.len() < 4 {
            return Err(Error::IncompleteHeader);
        }

        let mut header = Cursor::new(buf);
        let body_len = header.read_u32::<BigEndian>()? as usize;

        if buf.len() - 4 != body_len {
            return Err(Error::IncompleteMessage {
                buffer_len: buf.len(),
                expected: body_len + 4,
            });
        }

        let body = &buf[4..];
        let mut c = Cursor::new(body);

        let version = c.read_u32::<BigEndian>()?;
        if version != VERSION {
            return Err(Error::InvalidVersion(version));
        }

        let auth = Table::parse_single_entry(&mut c)?;
        let signature = auth
            .get("_auth")
            .and_then(Value::as_table)
            .and_then(|t| t.get("hmd5"))
            .and_then(Value::as_str)
            .ok_or(Error::MissingAuthenticator)?
            .to_owned();

        let payload_start = c.position() as usize;
        let payload_bytes = &body[payload_start..];

        verify(key, payload_bytes, &signature)?;

        let mut payload_cursor = Cursor::new(payload_bytes);
        let payload = Table::parse_body(&mut payload_cursor, payload_bytes.len() as u32)?;

        let ctrl = match payload.get("_ctrl") {
            Some(v) => v.as_table().ok_or(Error::NotATable)?.clone(),
            None => Table::new(),
        };
        let data = match payload.get("_data") {
            Some(v) => v.as_table().ok_or(Error::NotATable)?.clone(),
            None => Table::new(),
        };

        let packet = Packet {
            key: key.to_owned(),
            ctrl,
            data,
        };

        if let Some(err) = packet.err() {
            if !err.is_empty() {
                return Err(Error::ServerError(err.to_owned()));
            }
        }

        Ok(packet)
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
        .as_secs()
}

fn hmac_for_key(key: &str) -> Result<HmacMd5, Error> {
    let key_bytes = STANDARD.decode(key)?;
    Ok(HmacMd5::new_from_slice(&key_bytes).expect("HMAC-MD5 accepts a key of any length"))
}

fn sign(key: &str, payload: &[u8]) -> Result<String, Error> {
    let mut mac = hmac_for_key(key)?;
    mac.update(payload);
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

fn verify(key: &str, payload: &[u8], expected: &str) -> Result<(), Error> {
    let computed = sign(key, payload)?;
    if computed != expected {
        return Err(Error::SignatureMismatch);
    }
    Ok(())
}
