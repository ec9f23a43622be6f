use chrono::{DateTime, SecondsFormat, Utc};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How an attribute's raw value bytes are to be interpreted. The numeric
/// codes are the ones stored in the snapshot's attribute schema section;
/// codes we do not know about are preserved in `Other` and their values
/// decode as `Value::Unknown`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntaxKind {
    String,
    Integer,
    Boolean,
    Guid,
    Sid,
    Filetime,
    OctetString,
    Dn,
    SecurityDescriptor,
    Other(u32),
}

impl SyntaxKind {
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => Self::String,
            2 => Self::Integer,
            3 => Self::Boolean,
            4 => Self::Guid,
            5 => Self::Sid,
            6 => Self::Filetime,
            7 => Self::OctetString,
            8 => Self::Dn,
            9 => Self::SecurityDescriptor,
            other => Self::Other(other),
        }
    }

    pub fn code(self) -> u32 {
        match self {
            Self::String => 1,
            Self::Integer => 2,
            Self::Boolean => 3,
            Self::Guid => 4,
            Self::Sid => 5,
            Self::Filetime => 6,
            Self::OctetString => 7,
            Self::Dn => 8,
            Self::SecurityDescriptor => 9,
            Self::Other(code) => code,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Guid => "guid",
            Self::Sid => "sid",
            Self::Filetime => "filetime",
            Self::OctetString => "octet-string",
            Self::Dn => "dn",
            Self::SecurityDescriptor => "security-descriptor",
            Self::Other(_) => "unknown",
        }
    }

    /// Substring filters only apply to text-shaped values.
    pub fn is_text(self) -> bool {
        matches!(self, Self::String | Self::Dn)
    }
}

/// A decoded FILETIME. The snapshot uses `0` and `0x7FFF_FFFF_FFFF_FFFF`
/// as "no expiry" sentinels, which render as the literal `never`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timestamp {
    Never,
    At(DateTime<Utc>),
}

impl Timestamp {
    pub fn render(&self) -> String {
        match self {
            Self::Never => "never".to_owned(),
            Self::At(dt) => dt.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

/// A single decoded attribute value. The variant matches the attribute's
/// declared syntax except for `Unknown`, which is the non-fatal fallback
/// when a value blob does not decode.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Boolean(bool),
    Guid(String),
    Sid(String),
    Timestamp(Timestamp),
    Dn(String),
    Binary(Vec<u8>),
    Unknown(Vec<u8>),
}

impl Value {
    /// Textual form used for output and for string-shaped comparisons:
    /// GUIDs canonical, SIDs `S-1-...`, timestamps ISO-8601 UTC, binary
    /// payloads lowercase hex.
    pub fn render(&self) -> String {
        match self {
            Self::String(s) | Self::Guid(s) | Self::Sid(s) | Self::Dn(s) => s.clone(),
            Self::Integer(n) => n.to_string(),
            Self::Boolean(true) => "TRUE".to_owned(),
            Self::Boolean(false) => "FALSE".to_owned(),
            Self::Timestamp(ts) => ts.render(),
            Self::Binary(bytes) | Self::Unknown(bytes) => hex_lower(bytes),
        }
    }
}

fn hex_lower(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

/// One directory object from the snapshot: its resolved distinguished
/// name and an ordered mapping from attribute id to decoded values. An
/// attribute that is not in the mapping is absent, not empty.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    pub dn: String,
    pub attributes: Vec<(u32, Vec<Value>)>,
}

impl Object {
    pub fn values(&self, attribute_id: u32) -> Option<&[Value]> {
        self.attributes
            .iter()
            .find(|(id, _)| *id == attribute_id)
            .map(|(_, values)| values.as_slice())
    }
}

/// Snapshot metadata decoded from the file header.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderRecord {
    pub signature: String,
    pub version: u32,
    pub captured_at: Timestamp,
    pub description: String,
    pub server: String,
    pub object_count: u32,
    pub object_offset: u64,
    pub attribute_count: u32,
    pub attribute_offset: u64,
    pub class_count: u32,
    pub class_offset: u64,
    pub prefix_count: u32,
    pub prefix_offset: u64,
    pub file_size: u64,
}
