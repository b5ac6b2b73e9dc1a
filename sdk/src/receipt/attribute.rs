// Copyright 2025 Adobe. All rights reserved.
// This file is licensed to you under the Apache License,
// Version 2.0 (http://www.apache.org/licenses/LICENSE-2.0)
// or the MIT license (http://opensource.org/licenses/MIT),
// at your option.

// Unless required by applicable law or agreed to in writing,
// this software is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR REPRESENTATIONS OF ANY KIND, either express or
// implied. See the LICENSE-MIT and LICENSE-APACHE files for the
// specific language governing permissions and limitations under
// each license.

//! The `{type, version, value}` attribute records that make up a receipt
//! payload and each in-app purchase record.
//!
//! ```ASN.1
//! ReceiptAttribute ::= SEQUENCE {
//!   type    INTEGER,
//!   version INTEGER,
//!   value   OCTET STRING }
//!
//! Payload ::= SET OF ReceiptAttribute
//! ```
//!
//! The `value` octets are themselves an encoded value whose shape depends on
//! `type`. The helpers here decode the shapes that occur in receipts.

use bcder::{
    decode::{Constructed, DecodeError, Source},
    Integer, Mode, OctetString, Tag,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::{Error, Result};

/// One receipt attribute with its value left encoded.
#[derive(Clone, Debug)]
pub(crate) struct ReceiptAttribute {
    pub typ: i64,

    #[allow(dead_code)]
    pub version: i64,

    pub value: Bytes,
}

impl ReceiptAttribute {
    fn take_opt_from<S: Source>(
        cons: &mut Constructed<S>,
    ) -> std::result::Result<Option<Self>, DecodeError<S::Error>> {
        cons.take_opt_sequence(|cons| {
            let typ = take_i64(cons)?;
            let version = take_i64(cons)?;
            let value = OctetString::take_from(cons)?.into_bytes();

            Ok(Self {
                typ,
                version,
                value,
            })
        })
    }

    /// The value as a UTF8String or IA5String.
    pub fn string(&self) -> Result<String> {
        decode_string(&self.value)
    }

    /// The value as an RFC 3339 timestamp carried in a string.
    pub fn date(&self) -> Result<DateTime<Utc>> {
        parse_date(&self.string()?)
    }

    /// The value as a date, or `None` if it is empty or malformed.
    pub fn optional_date(&self) -> Option<DateTime<Utc>> {
        self.date().ok()
    }

    /// The value as an INTEGER.
    pub fn integer(&self) -> Result<i64> {
        Constructed::decode(self.value.clone(), Mode::Ber, |cons| take_i64(cons))
            .map_err(|e| Error::DecodingFailed(format!("attribute {}: {e}", self.typ)))
    }

    /// The value as a nested attribute set.
    pub fn attributes(&self) -> Result<Vec<ReceiptAttribute>> {
        decode_attribute_set(self.value.clone())
            .map_err(|e| Error::DecodingFailed(format!("attribute {}: {e}", self.typ)))
    }
}

/// Decode a `SET OF ReceiptAttribute`, accepting BER.
pub(crate) fn decode_attribute_set(
    data: Bytes,
) -> std::result::Result<Vec<ReceiptAttribute>, DecodeError<std::convert::Infallible>> {
    Constructed::decode(data, Mode::Ber, |cons| {
        cons.take_set(|cons| {
            let mut attributes = Vec::new();
            while let Some(attr) = ReceiptAttribute::take_opt_from(cons)? {
                attributes.push(attr);
            }
            Ok(attributes)
        })
    })
}

fn take_i64<S: Source>(cons: &mut Constructed<S>) -> std::result::Result<i64, DecodeError<S::Error>> {
    let int = Integer::take_from(cons)?;
    integer_to_i64(&int).ok_or_else(|| cons.content_err("integer does not fit in 64 bits"))
}

/// Interpret the two's complement content octets of an INTEGER.
fn integer_to_i64(int: &Integer) -> Option<i64> {
    let octets = int.as_slice();
    let first = *octets.first()?;
    if octets.len() > 8 {
        return None;
    }

    let fill = if first & 0x80 != 0 { 0xff } else { 0x00 };
    let mut buf = [fill; 8];
    buf[8 - octets.len()..].copy_from_slice(octets);
    Some(i64::from_be_bytes(buf))
}

fn decode_string(value: &Bytes) -> Result<String> {
    let octets = Constructed::decode(value.clone(), Mode::Ber, |cons| {
        cons.take_value(|tag, content| {
            if tag == Tag::UTF8_STRING || tag == Tag::IA5_STRING {
                content.as_primitive()?.take_all()
            } else {
                Err(content.content_err("expected a UTF8String or IA5String"))
            }
        })
    })
    .map_err(|e| Error::DecodingFailed(e.to_string()))?;

    String::from_utf8(octets.to_vec()).map_err(|e| Error::DecodingFailed(e.to_string()))
}

fn parse_date(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::DecodingFailed(format!("invalid date {s:?}: {e}")))
}

#[cfg(test)]
pub mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn attribute(value: &[u8]) -> ReceiptAttribute {
        ReceiptAttribute {
            typ: 2,
            version: 1,
            value: Bytes::copy_from_slice(value),
        }
    }

    #[test]
    fn utf8_and_ia5_strings() {
        assert_eq!(attribute(b"\x0c\x03abc").string().unwrap(), "abc");
        assert_eq!(attribute(b"\x16\x03xyz").string().unwrap(), "xyz");
    }

    #[test]
    fn other_string_types_are_rejected() {
        // PrintableString
        assert!(attribute(b"\x13\x03abc").string().is_err());
    }

    #[test]
    fn integers() {
        assert_eq!(attribute(b"\x02\x01\x01").integer().unwrap(), 1);
        assert_eq!(attribute(b"\x02\x02\x00\xff").integer().unwrap(), 255);
        assert_eq!(attribute(b"\x02\x01\xff").integer().unwrap(), -1);
        assert_eq!(
            attribute(b"\x02\x04\x77\x35\x94\x00").integer().unwrap(),
            2_000_000_000
        );
    }

    #[test]
    fn oversized_integer() {
        let mut value = vec![0x02, 0x09, 0x01];
        value.extend_from_slice(&[0; 8]);
        assert!(attribute(&value).integer().is_err());
    }

    #[test]
    fn dates() {
        let value = b"\x16\x142024-06-01T12:00:00Z";
        let date = attribute(value).date().unwrap();
        assert_eq!(date.to_rfc3339(), "2024-06-01T12:00:00+00:00");
    }

    #[test]
    fn malformed_dates_degrade() {
        assert!(attribute(b"\x16\x0anot-a-date").optional_date().is_none());
        assert!(attribute(b"\x16\x00").optional_date().is_none());
        assert!(attribute(b"\x16\x0anot-a-date").date().is_err());
    }

    #[test]
    fn attribute_set() {
        // SET { SEQUENCE { 2, 1, OCTET STRING { UTF8String "a" } } }
        let set = b"\x31\x0d\x30\x0b\x02\x01\x02\x02\x01\x01\x04\x03\x0c\x01a";
        let attrs = decode_attribute_set(Bytes::from_static(set)).unwrap();
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs[0].typ, 2);
        assert_eq!(attrs[0].version, 1);
        assert_eq!(attrs[0].string().unwrap(), "a");
    }

    #[test]
    fn not_an_attribute_set() {
        assert!(decode_attribute_set(Bytes::from_static(b"\x04\x01\x00")).is_err());
        assert!(decode_attribute_set(Bytes::from_static(b"\x31\x05\x30\x03\x02\x01")).is_err());
    }
}
