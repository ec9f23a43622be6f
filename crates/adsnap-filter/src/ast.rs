use std::borrow::Cow;
use std::fmt;

/// An assertion value as raw unescaped bytes. RFC 4515 escapes (`\2a` and
/// friends) are already resolved by the parser; type coercion against an
/// attribute's syntax happens at evaluation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionValue(pub Vec<u8>);

impl AssertionValue {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for AssertionValue {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

/// Parsed RFC 4515 filter tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterNode {
    Present(String),
    Equality(String, AssertionValue),
    Substring {
        attribute: String,
        initial: Option<AssertionValue>,
        any: Vec<AssertionValue>,
        final_: Option<AssertionValue>,
    },
    GreaterOrEqual(String, AssertionValue),
    LessOrEqual(String, AssertionValue),
    ApproxMatch(String, AssertionValue),
    Extensible {
        attribute: Option<String>,
        matching_rule: Option<String>,
        value: AssertionValue,
        dn_attributes: bool,
    },
    And(Vec<FilterNode>),
    Or(Vec<FilterNode>),
    Not(Box<FilterNode>),
}

impl fmt::Display for FilterNode {
    /// Renders the node back to RFC 4515 filter text. Parsing the rendered
    /// text yields a structurally identical tree.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Present(attr) => write!(f, "({attr}=*)"),
            Self::Equality(attr, value) => {
                write!(f, "({attr}=")?;
                escape_value(value.bytes(), f)?;
                write!(f, ")")
            }
            Self::Substring {
                attribute,
                initial,
                any,
                final_,
            } => {
                write!(f, "({attribute}=")?;
                if let Some(initial) = initial {
                    escape_value(initial.bytes(), f)?;
                }
                for segment in any {
                    write!(f, "*")?;
                    escape_value(segment.bytes(), f)?;
                }
                write!(f, "*")?;
                if let Some(final_) = final_ {
                    escape_value(final_.bytes(), f)?;
                }
                write!(f, ")")
            }
            Self::GreaterOrEqual(attr, value) => {
                write!(f, "({attr}>=")?;
                escape_value(value.bytes(), f)?;
                write!(f, ")")
            }
            Self::LessOrEqual(attr, value) => {
                write!(f, "({attr}<=")?;
                escape_value(value.bytes(), f)?;
                write!(f, ")")
            }
            Self::ApproxMatch(attr, value) => {
                write!(f, "({attr}~=")?;
                escape_value(value.bytes(), f)?;
                write!(f, ")")
            }
            Self::Extensible {
                attribute,
                matching_rule,
                value,
                dn_attributes,
            } => {
                write!(f, "(")?;
                if let Some(attr) = attribute {
                    write!(f, "{attr}")?;
                }
                if *dn_attributes {
                    write!(f, ":dn")?;
                }
                if let Some(rule) = matching_rule {
                    write!(f, ":{rule}")?;
                }
                write!(f, ":=")?;
                escape_value(value.bytes(), f)?;
                write!(f, ")")
            }
            Self::And(children) => {
                write!(f, "(&")?;
                for child in children {
                    write!(f, "{child}")?;
                }
                write!(f, ")")
            }
            Self::Or(children) => {
                write!(f, "(|")?;
                for child in children {
                    write!(f, "{child}")?;
                }
                write!(f, ")")
            }
            Self::Not(child) => write!(f, "(!{child})"),
        }
    }
}

/// RFC 4515 escaping: `( ) * \` and non-printable bytes as `\xx`.
fn escape_value(bytes: &[u8], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for &b in bytes {
        match b {
            b'(' | b')' | b'*' | b'\\' => write!(f, "\\{b:02x}")?,
            0x20..=0x7e => write!(f, "{}", b as char)?,
            _ => write!(f, "\\{b:02x}")?,
        }
    }
    Ok(())
}
