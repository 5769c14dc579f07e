//! The ISCCC (Internet Systems Consortium Command Channel) binary value
//! format: a small, recursive, typed value tree used to build the signed
//! RNDC packet envelope.

use std::{
    collections::BTreeMap,
    collections::btree_map,
    io::{Cursor, Write},
    ops::{Deref, DerefMut},
};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::Error;

const TAG_STRING: u8 = 0x00;
const TAG_BINARY: u8 = 0x01;
const TAG_TABLE: u8 = 0x02;
const TAG_LIST: u8 = 0x03;

/// The literal body ISCCC writes in place of a missing [`Value::Binary`].
const NULL: &[u8] = b"null";

/// A value in the ISCCC universe: a recursive, typed value tree.
///
/// Every [`Value`] is serialized as a 1 byte type tag, a 4 byte big-endian
/// length, then that many bytes of body. There are no integers on the wire -
/// numbers such as the packet serial or timestamp travel as the ASCII digits
/// of their decimal representation, inside a [`Value::Binary`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// An opaque octet string - the leaf type.
    Binary(Vec<u8>),

    /// An ordered mapping from short (at most 255 byte) string keys to
    /// [`Value`]s.
    Table(Table),

    /// An ordered sequence of [`Value`]s.
    List(Vec<Value>),
}

impl Value {
    /// Constructs the [`Value::Binary`] ISCCC uses in place of a missing
    /// value: the literal four byte ASCII string `null`.
    pub fn null() -> Self {
        Value::Binary(NULL.to_vec())
    }

    /// Constructs a [`Value::Binary`] from `body`.
    pub fn binary(body: impl Into<Vec<u8>>) -> Self {
        Value::Binary(body.into())
    }

    /// Returns this value's payload as a `str`, if it is a [`Value::Binary`]
    /// and its body is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Binary(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    /// Returns this value's raw bytes, if it is a [`Value::Binary`].
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Binary(b) => Some(b),
            _ => None,
        }
    }

    /// Returns this value as a [`Table`], if it is one.
    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Value::Table(t) => Some(t),
            _ => None,
        }
    }

    /// Serializes this value into `buf`, including its tag and length
    /// header.
    pub fn serialise_into<W: Write>(&self, buf: &mut W) -> Result<(), std::io::Error> {
        match self {
            Value::Binary(b) => {
                buf.write_u8(TAG_BINARY)?;
                buf.write_u32::<BigEndian>(b.len() as u32)?;
                buf.write_all(b)
            }
            Value::Table(t) => {
                buf.write_u8(TAG_TABLE)?;
                buf.write_u32::<BigEndian>(t.body_len())?;
                t.serialise_body_into(buf)
            }
            Value::List(items) => {
                buf.write_u8(TAG_LIST)?;
                let body_len: u32 = items.iter().map(Value::serialised_len).sum();
                buf.write_u32::<BigEndian>(body_len)?;
                for item in items {
                    item.serialise_into(buf)?;
                }
                Ok(())
            }
        }
    }

    /// Returns the on-wire length of this value, including its 1 byte tag
    /// and 4 byte length header.
    pub(crate) fn serialised_len(&self) -> u32 {
        5 + match self {
            Value::Binary(b) => b.len() as u32,
            Value::Table(t) => t.body_len(),
            Value::List(items) => items.iter().map(Value::serialised_len).sum(),
        }
    }

    /// Parses a tagged `Value` (tag + length + body) from `c`, advancing the
    /// cursor to the end of the value.
    pub fn parse(c: &mut Cursor<&[u8]>) -> Result<Self, Error> {
        let tag = c.read_u8()?;
        let len = c.read_u32::<BigEndian>()?;

        match tag {
            TAG_STRING | TAG_BINARY => Ok(Value::Binary(read_exact(c, len)?)),
            TAG_TABLE => Ok(Value::Table(Table::parse_body(c, len)?)),
            TAG_LIST => {
                let end = c.position() + u64::from(len);
                let mut items = Vec::new();
                while c.position() < end {
                    items.push(Value::parse(c)?);
                }
                if c.position() != end {
                    return Err(Error::InvalidLength);
                }
                Ok(Value::List(items))
            }
            v => Err(Error::UnknownTypeTag(v)),
        }
    }
}

/// Reads exactly `len` bytes from `c` without panicking on a length prefix
/// that would run past the end of the buffer.
fn read_exact(c: &mut Cursor<&[u8]>, len: u32) -> Result<Vec<u8>, Error> {
    let data = *c.get_ref();
    let start = c.position() as usize;
    let end = start.checked_add(len as usize).ok_or(Error::InvalidLength)?;

    if end > data.len() {
        return Err(Error::InvalidLength);
    }

    c.set_position(end as u64);
    Ok(data[start..end].to_vec())
}

/// An ordered mapping from short string keys to [`Value`]s.
///
/// `Table` is backed by a [`BTreeMap`], which keeps entries in ascending
/// byte order of their keys by construction. That ordering is exactly the
/// canonical form the envelope's HMAC signature is computed over, so there
/// is no separate "sort before serializing" step that a caller could forget.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table(BTreeMap<String, Value>);

impl Table {
    /// Constructs an empty `Table`.
    pub fn new() -> Self {
        Table(BTreeMap::new())
    }

    pub(crate) fn body_len(&self) -> u32 {
        self.0
            .iter()
            .map(|(k, v)| 1 + k.len() as u32 + v.serialised_len())
            .sum()
    }

    pub(crate) fn serialise_body_into<W: Write>(&self, buf: &mut W) -> Result<(), std::io::Error> {
        for (k, v) in &self.0 {
            buf.write_u8(k.len() as u8)?;
            buf.write_all(k.as_bytes())?;
            v.serialise_into(buf)?;
        }
        Ok(())
    }

    /// Serializes this table's entries without the outer tag/length header.
    ///
    /// Used for the envelope's auth and payload tables, and for the exact
    /// bytes that get HMAC-signed - in both cases the enclosing length is
    /// carried by the envelope itself, not by this table.
    pub(crate) fn serialise_no_header(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.body_len() as usize);
        self.serialise_body_into(&mut buf)
            .expect("writing to a Vec cannot fail");
        buf
    }

    /// Parses `len` bytes of table entries from `c` into a `Table`.
    pub(crate) fn parse_body(c: &mut Cursor<&[u8]>, len: u32) -> Result<Self, Error> {
        let end = c.position() + u64::from(len);
        let mut table = BTreeMap::new();

        while c.position() < end {
            let (key, value) = parse_entry(c)?;
            table.insert(key, value);
        }

        if c.position() != end {
            return Err(Error::InvalidLength);
        }

        Ok(Table(table))
    }

    /// Parses a single table entry from `c` and wraps it in a one-entry
    /// `Table`.
    ///
    /// The envelope's auth table is always exactly `{ _auth: { hmd5: ... }
    /// }`, a single entry whose own tag/length header is self-describing.
    /// Reading one entry this way finds the auth/payload boundary without
    /// needing to know - or hard-code - the auth table's serialized length
    /// up front.
    pub(crate) fn parse_single_entry(c: &mut Cursor<&[u8]>) -> Result<Self, Error> {
        let (key, value) = parse_entry(c)?;
        let mut table = BTreeMap::new();
        table.insert(key, value);
        Ok(Table(table))
    }
}

fn parse_entry(c: &mut Cursor<&[u8]>) -> Result<(String, Value), Error> {
    let key_len = c.read_u8()?;
    let key_bytes = read_exact(c, u32::from(key_len))?;
    let key = String::from_utf8(key_bytes).map_err(|e| Error::InvalidTableKey(e.utf8_error()))?;
    let value = Value::parse(c)?;
    Ok((key, value))
}

impl Deref for Table {
    type Target = BTreeMap<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Table {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl FromIterator<(String, Value)> for Table {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Table(iter.into_iter().collect())
    }
}

impl IntoIterator for Table {
    type Item = (String, Value);
    type IntoIter = btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use proptest::prelude::*;

    use super::*;

    fn roundtrip(v: &Value) -> Value {
        let mut buf = Vec::new();
        v.serialise_into(&mut buf).unwrap();
        let mut c = Cursor::new(buf.as_slice());
        Value::parse(&mut c).unwrap()
    }

    #[test]
    fn test_binary_roundtrip() {
        let v = Value::binary(*b"hello");
        assert_eq!(roundtrip(&v), v);
    }

    #[test]
    fn test_null_is_four_ascii_bytes() {
        let mut buf = Vec::new();
        Value::null().serialise_into(&mut buf).unwrap();
        assert_eq!(&buf[5..], b"null");
    }

    #[test]
    fn test_parse_known_binary_wire_fixture() {
        use hex_literal::hex;

        let raw = hex!("01 00 00 00 0f 4c4150544f502d315151425044474d");
        let mut c = Cursor::new(raw.as_slice());
        let v = Value::parse(&mut c).unwrap();
        assert_eq!(v, Value::binary(*b"LAPTOP-1QQBPDGM"));
    }

    #[test]
    fn test_table_roundtrip() {
        let mut t = Table::new();
        t.insert("b".into(), Value::binary(*b"2"));
        t.insert("a".into(), Value::binary(*b"1"));
        let v = Value::Table(t);
        assert_eq!(roundtrip(&v), v);
    }

    #[test]
    fn test_table_canonical_order_independent_of_insertion() {
        let mut t1 = Table::new();
        t1.insert("zzz".into(), Value::binary(*b"1"));
        t1.insert("aaa".into(), Value::binary(*b"2"));

        let mut t2 = Table::new();
        t2.insert("aaa".into(), Value::binary(*b"2"));
        t2.insert("zzz".into(), Value::binary(*b"1"));

        let mut buf1 = Vec::new();
        Value::Table(t1).serialise_into(&mut buf1).unwrap();
        let mut buf2 = Vec::new();
        Value::Table(t2).serialise_into(&mut buf2).unwrap();

        assert_eq!(buf1, buf2);
    }

    #[test]
    fn test_list_roundtrip() {
        let v = Value::List(vec![Value::binary(*b"a"), Value::binary(*b"bb")]);
        assert_eq!(roundtrip(&v), v);
    }

    #[test]
    fn test_nested_table_roundtrip() {
        let mut inner = Table::new();
        inner.insert("hmd5".into(), Value::binary(*b"c2lnbmF0dXJl"));
        let mut outer = Table::new();
        outer.insert("_auth".into(), Value::Table(inner));
        let v = Value::Table(outer);
        assert_eq!(roundtrip(&v), v);
    }

    #[test]
    fn test_unknown_type_tag() {
        let buf = [0xffu8, 0x00, 0x00, 0x00, 0x00];
        let mut c = Cursor::new(buf.as_slice());
        assert!(matches!(
            Value::parse(&mut c),
            Err(Error::UnknownTypeTag(0xff))
        ));
    }

    #[test]
    fn test_truncated_binary_length() {
        // Claims a 10 byte body but only provides 2.
        let buf = [TAG_BINARY, 0x00, 0x00, 0x00, 0x0a, 0x01, 0x02];
        let mut c = Cursor::new(buf.as_slice());
        assert!(matches!(Value::parse(&mut c), Err(Error::InvalidLength)));
    }

    #[test]
    fn test_table_no_header_roundtrip() {
        let mut t = Table::new();
        t.insert("_ser".into(), Value::binary(*b"1"));
        t.insert("_tim".into(), Value::binary(*b"2"));

        let bytes = t.serialise_no_header();
        let mut c = Cursor::new(bytes.as_slice());
        let parsed = Table::parse_body(&mut c, bytes.len() as u32).unwrap();
        assert_eq!(parsed, t);
    }

    #[test]
    fn test_single_entry_table_stops_at_entry_boundary() {
        let mut inner = Table::new();
        inner.insert("hmd5".into(), Value::binary(*b"sig"));
        let mut outer = Table::new();
        outer.insert("_auth".into(), Value::Table(inner));

        let auth_bytes = outer.serialise_no_header();
        let mut trailer = auth_bytes.clone();
        trailer.extend_from_slice(b"trailing-payload-bytes");

        let mut c = Cursor::new(trailer.as_slice());
        let parsed = Table::parse_single_entry(&mut c).unwrap();
        assert_eq!(parsed, outer);
        assert_eq!(c.position(), auth_bytes.len() as u64);
    }

    proptest! {
        #[test]
        fn prop_binary_roundtrip(data in prop::collection::vec(any::<u8>(), 0..512)) {
            let v = Value::binary(data);
            prop_assert_eq!(roundtrip(&v), v);
        }

        #[test]
        fn prop_table_roundtrip(
            entries in prop::collection::vec(
                ("[a-z]{1,8}", prop::collection::vec(any::<u8>(), 0..32)),
                0..8,
            )
        ) {
            let table: Table = entries
                .into_iter()
                .map(|(k, v)| (k, Value::binary(v)))
                .collect();
            let v = Value::Table(table);
            prop_assert_eq!(roundtrip(&v), v);
        }
    }
}
