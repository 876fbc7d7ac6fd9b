//! JSON header codec
//!
//! Wire layout: `CIS_MSG_HEAD` + JSON header fields + `CIS_MSG_HEAD` + body.
//! A message that does not start with the marker has no header at all.

use crate::domain::{CommHeader, HeaderFields, EOF_SENTINEL, MSG_HEAD_MARKER};
use crate::ports::HeaderCodec;

/// Header codec using a marker-delimited JSON section
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonHeaderCodec;

impl JsonHeaderCodec {
    pub fn new() -> Self {
        Self
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

impl HeaderCodec for JsonHeaderCodec {
    fn parse_header(&self, raw: &[u8]) -> CommHeader {
        let marker = MSG_HEAD_MARKER.as_bytes();
        let Some(rest) = raw.strip_prefix(marker) else {
            return CommHeader::plain(raw.len());
        };
        let Some(end) = find(rest, marker) else {
            return CommHeader::invalid();
        };

        match serde_json::from_slice::<HeaderFields>(&rest[..end]) {
            Ok(fields) => CommHeader::from_fields(fields, marker.len() * 2 + end),
            Err(_) => CommHeader::invalid(),
        }
    }

    fn is_eof(&self, raw: &[u8]) -> bool {
        raw == EOF_SENTINEL
    }

    fn encode(&self, fields: &HeaderFields, body: &[u8]) -> Vec<u8> {
        let mut fields = fields.clone();
        fields.size.get_or_insert(body.len());

        // HeaderFields has only string and integer members
        let json = serde_json::to_vec(&fields).unwrap_or_default();

        let marker = MSG_HEAD_MARKER.as_bytes();
        let mut message = Vec::with_capacity(marker.len() * 2 + json.len() + body.len());
        message.extend_from_slice(marker);
        message.extend_from_slice(&json);
        message.extend_from_slice(marker);
        message.extend_from_slice(body);
        message
    }
}
