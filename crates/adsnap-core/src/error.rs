use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Filter(#[from] FilterError),
}

/// Failures while decoding a snapshot file. `Truncated` and
/// `CorruptSnapshot` are fatal for the reader that hit them; per-value
/// decode problems are demoted to `Value::Unknown` and never surface here.
#[derive(Debug, Clone, Error)]
pub enum FormatError {
    #[error("truncated input at byte {at}, need {needed} bytes")]
    Truncated { at: u64, needed: usize },

    #[error("bad signature: expected \"win-ad-obj\", got {0:?}")]
    BadSignature(String),

    #[error("unsupported snapshot version {found} (supported: {supported:?})")]
    UnsupportedVersion {
        found: u32,
        supported: &'static [u32],
    },

    #[error("corrupt snapshot at byte {offset}: {reason}")]
    CorruptSnapshot { offset: u64, reason: &'static str },

    #[error("invalid offset/length for {field}")]
    InvalidRange { field: &'static str },

    #[error("prefix id {id} out of range (table holds {count})")]
    InvalidPrefixId { id: u32, count: u32 },

    #[error("attribute id {id} out of range (schema holds {count})")]
    InvalidAttributeId { id: u32, count: u32 },
}

/// Filter syntax errors. Every variant carries the byte offset into the
/// filter string where parsing stopped.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("unbalanced parenthesis at byte {at}")]
    UnbalancedParen { at: usize },

    #[error("unexpected character {found:?} at byte {at}")]
    UnexpectedChar { at: usize, found: char },

    #[error("invalid escape sequence at byte {at}")]
    InvalidEscape { at: usize },

    #[error("empty attribute description at byte {at}")]
    EmptyAttribute { at: usize },

    #[error("unexpected trailing input at byte {at}")]
    TrailingInput { at: usize },
}

impl FilterError {
    /// Byte offset into the filter string the error points at.
    pub fn position(&self) -> usize {
        match self {
            Self::UnbalancedParen { at }
            | Self::UnexpectedChar { at, .. }
            | Self::InvalidEscape { at }
            | Self::EmptyAttribute { at }
            | Self::TrailingInput { at } => *at,
        }
    }
}
