//! Message header model
//!
//! The header is the only place a requester can say where its reply should go.

use serde::{Deserialize, Serialize};

/// Marker delimiting the header section of a message
pub const MSG_HEAD_MARKER: &str = "CIS_MSG_HEAD";

/// Reserved payload marking the logical end of a message stream
pub const EOF_SENTINEL: &[u8] = b"EOF!!!";

/// Header fields as they travel on the wire
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderFields {
    /// Request identifier
    pub id: String,
    /// Address the requester listens on for the reply
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub response_address: String,
    /// Body size in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
}

impl HeaderFields {
    /// Header for a request expecting a reply on `response_address`
    pub fn request(id: impl Into<String>, response_address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            response_address: response_address.into(),
            size: None,
        }
    }

    /// Builder-style method to set the body size
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }
}

/// Result of parsing a raw message
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommHeader {
    /// Whether the header section could be parsed
    pub valid: bool,
    /// Request identifier
    pub id: String,
    /// Reply address, empty when the requester gave none
    pub response_address: String,
    /// Declared body size
    pub size: Option<usize>,
    /// Offset of the body within the raw message
    pub body_offset: usize,
}

impl CommHeader {
    /// Header of an unparseable message
    pub fn invalid() -> Self {
        Self {
            valid: false,
            id: String::new(),
            response_address: String::new(),
            size: None,
            body_offset: 0,
        }
    }

    /// Header of a message sent without a header section
    pub fn plain(len: usize) -> Self {
        Self {
            valid: true,
            id: String::new(),
            response_address: String::new(),
            size: Some(len),
            body_offset: 0,
        }
    }

    /// Header built from decoded wire fields
    pub fn from_fields(fields: HeaderFields, body_offset: usize) -> Self {
        Self {
            valid: true,
            id: fields.id,
            response_address: fields.response_address,
            size: fields.size,
            body_offset,
        }
    }

    /// True if the requester supplied a reply address
    pub fn has_response_address(&self) -> bool {
        !self.response_address.is_empty()
    }

    /// Body slice of `raw` according to this header
    pub fn body<'a>(&self, raw: &'a [u8]) -> &'a [u8] {
        raw.get(self.body_offset..).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_header_has_no_address() {
        let head = CommHeader::invalid();
        assert!(!head.valid);
        assert!(!head.has_response_address());
    }

    #[test]
    fn test_plain_header_is_valid_without_address() {
        let head = CommHeader::plain(5);
        assert!(head.valid);
        assert!(!head.has_response_address());
        assert_eq!(head.body(b"hello"), b"hello");
    }

    #[test]
    fn test_body_offset_past_end_is_empty() {
        let head = CommHeader::from_fields(HeaderFields::request("a", "b"), 100);
        assert!(head.body(b"short").is_empty());
    }

    #[test]
    fn test_fields_skip_empty_response_address() {
        let json = serde_json::to_string(&HeaderFields {
            id: "x".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(json, r#"{"id":"x"}"#);
    }
}
