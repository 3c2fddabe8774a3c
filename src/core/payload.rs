//! Record to payload text.
//!
//! The payload is JSON in the layout printed tags have always carried:
//! `", "` between members, `": "` after keys, and every non-ASCII character
//! escaped as `\uXXXX` (UTF-16 code units, lowercase hex). Fields stay in
//! stored order; keys are not sorted, so a record always serializes the way
//! it was written and output is reproducible for a given stored state.

use crate::core::error::QrtagError;
use crate::core::store::{IDENTITY_FIELD, Record};
use serde::Serialize;
use serde_json::ser::Formatter;
use sha2::{Digest, Sha256};
use std::io;

/// Spaced separators plus ASCII-only strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct TagFormatter;

impl Formatter for TagFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if fragment.is_ascii() {
            return writer.write_all(fragment.as_bytes());
        }
        let mut units = [0u16; 2];
        for ch in fragment.chars() {
            if ch.is_ascii() {
                writer.write_all(&[ch as u8])?;
            } else {
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            }
        }
        Ok(())
    }
}

/// Cleaned copy of `record` without the identity field. The caller's record
/// is left untouched; a record without the field comes back unchanged.
pub fn strip_identity(record: &Record) -> Record {
    record
        .iter()
        .filter(|(k, _)| k.as_str() != IDENTITY_FIELD)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Canonical text form. Anything that cannot be represented as JSON text
/// (e.g. maps with non-string keys) is a `SerializationError`.
pub fn serialize<T: Serialize + ?Sized>(record: &T) -> Result<String, QrtagError> {
    let mut buf = Vec::with_capacity(128);
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, TagFormatter);
    record.serialize(&mut ser)?;
    String::from_utf8(buf).map_err(|e| QrtagError::EncodingError(e.to_string()))
}

pub fn payload_digest(payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    format!("{:x}", hasher.finalize())
}
