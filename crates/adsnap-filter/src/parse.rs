use adsnap_core::error::FilterError;

use crate::ast::{AssertionValue, FilterNode};

/// Parses an RFC 4515 filter string. The whole input must be a single
/// parenthesized filter; errors carry the byte offset they point at.
pub fn parse(input: &str) -> Result<FilterNode, FilterError> {
    let mut parser = Parser::new(input);
    parser.skip_ws();
    let node = parser.parse_filter()?;
    parser.skip_ws();
    if parser.pos != parser.bytes.len() {
        return Err(FilterError::TrailingInput { at: parser.pos });
    }
    Ok(node)
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ') | Some(b'\t')) {
            self.bump();
        }
    }

    fn expect_open(&mut self) -> Result<(), FilterError> {
        match self.peek() {
            Some(b'(') => {
                self.bump();
                Ok(())
            }
            Some(found) => Err(FilterError::UnexpectedChar {
                at: self.pos,
                found: found as char,
            }),
            None => Err(FilterError::UnbalancedParen { at: self.pos }),
        }
    }

    fn expect_close(&mut self) -> Result<(), FilterError> {
        match self.peek() {
            Some(b')') => {
                self.bump();
                Ok(())
            }
            _ => Err(FilterError::UnbalancedParen { at: self.pos }),
        }
    }

    fn parse_filter(&mut self) -> Result<FilterNode, FilterError> {
        self.expect_open()?;
        self.skip_ws();
        match self.peek() {
            Some(b'&') => {
                self.bump();
                let children = self.parse_children()?;
                self.expect_close()?;
                Ok(FilterNode::And(children))
            }
            Some(b'|') => {
                self.bump();
                let children = self.parse_children()?;
                self.expect_close()?;
                Ok(FilterNode::Or(children))
            }
            Some(b'!') => {
                self.bump();
                self.skip_ws();
                let child = self.parse_filter()?;
                self.skip_ws();
                self.expect_close()?;
                Ok(FilterNode::Not(Box::new(child)))
            }
            Some(_) => self.parse_simple(),
            None => Err(FilterError::UnbalancedParen { at: self.pos }),
        }
    }

    fn parse_children(&mut self) -> Result<Vec<FilterNode>, FilterError> {
        let mut children = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() != Some(b'(') {
                break;
            }
            children.push(self.parse_filter()?);
        }
        Ok(children)
    }

    fn parse_simple(&mut self) -> Result<FilterNode, FilterError> {
        let attr_start = self.pos;
        let attribute = self.parse_attribute();

        match self.peek() {
            Some(b'=') => {
                self.require_attribute(&attribute, attr_start)?;
                self.bump();
                self.parse_equality_tail(attribute)
            }
            Some(b'>') => {
                self.require_attribute(&attribute, attr_start)?;
                self.bump();
                self.expect_equals()?;
                let value = self.parse_plain_value()?;
                self.expect_close()?;
                Ok(FilterNode::GreaterOrEqual(attribute, value))
            }
            Some(b'<') => {
                self.require_attribute(&attribute, attr_start)?;
                self.bump();
                self.expect_equals()?;
                let value = self.parse_plain_value()?;
                self.expect_close()?;
                Ok(FilterNode::LessOrEqual(attribute, value))
            }
            Some(b'~') => {
                self.require_attribute(&attribute, attr_start)?;
                self.bump();
                self.expect_equals()?;
                let value = self.parse_plain_value()?;
                self.expect_close()?;
                Ok(FilterNode::ApproxMatch(attribute, value))
            }
            Some(b':') => self.parse_extensible_tail(attribute),
            Some(found) => Err(FilterError::UnexpectedChar {
                at: self.pos,
                found: found as char,
            }),
            None => Err(FilterError::UnbalancedParen { at: self.pos }),
        }
    }

    fn parse_attribute(&mut self) -> String {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if matches!(b, b'=' | b'<' | b'>' | b'~' | b':' | b'(' | b')') {
                break;
            }
            self.bump();
        }
        // Safe: we only ever stop on single-byte delimiters.
        std::str::from_utf8(&self.bytes[start..self.pos])
            .expect("attribute slice ends on ascii delimiter")
            .trim()
            .to_owned()
    }

    fn require_attribute(&self, attribute: &str, at: usize) -> Result<(), FilterError> {
        if attribute.is_empty() {
            return Err(FilterError::EmptyAttribute { at });
        }
        Ok(())
    }

    fn expect_equals(&mut self) -> Result<(), FilterError> {
        match self.peek() {
            Some(b'=') => {
                self.bump();
                Ok(())
            }
            Some(found) => Err(FilterError::UnexpectedChar {
                at: self.pos,
                found: found as char,
            }),
            None => Err(FilterError::UnbalancedParen { at: self.pos }),
        }
    }

    /// Equality, presence, or substring, discriminated by unescaped `*`.
    fn parse_equality_tail(&mut self, attribute: String) -> Result<FilterNode, FilterError> {
        let (segments, stars) = self.parse_segments()?;
        self.expect_close()?;

        if stars == 0 {
            let value = segments.into_iter().next().unwrap_or_default();
            return Ok(FilterNode::Equality(attribute, AssertionValue(value)));
        }
        if stars == 1 && segments.iter().all(Vec::is_empty) {
            return Ok(FilterNode::Present(attribute));
        }

        let mut segments = segments;
        let last = segments.pop().unwrap_or_default();
        let mut iter = segments.into_iter();
        let first = iter.next().unwrap_or_default();
        let initial = (!first.is_empty()).then_some(AssertionValue(first));
        let any: Vec<AssertionValue> = iter
            .filter(|seg| !seg.is_empty())
            .map(AssertionValue)
            .collect();
        let final_ = (!last.is_empty()).then_some(AssertionValue(last));
        Ok(FilterNode::Substring {
            attribute,
            initial,
            any,
            final_,
        })
    }

    /// Splits the assertion value on unescaped `*`, resolving escapes.
    fn parse_segments(&mut self) -> Result<(Vec<Vec<u8>>, usize), FilterError> {
        let mut segments = Vec::new();
        let mut buf = Vec::new();
        let mut stars = 0usize;
        loop {
            match self.peek() {
                None => return Err(FilterError::UnbalancedParen { at: self.pos }),
                Some(b')') => {
                    segments.push(buf);
                    return Ok((segments, stars));
                }
                Some(b'*') => {
                    segments.push(std::mem::take(&mut buf));
                    stars += 1;
                    self.bump();
                }
                Some(b'\\') => buf.push(self.parse_escape()?),
                Some(b'(') => {
                    return Err(FilterError::UnexpectedChar {
                        at: self.pos,
                        found: '(',
                    })
                }
                Some(b) => {
                    buf.push(b);
                    self.bump();
                }
            }
        }
    }

    /// Assertion value with no unescaped `*` (>=, <=, ~=, :=).
    fn parse_plain_value(&mut self) -> Result<AssertionValue, FilterError> {
        let mut buf = Vec::new();
        loop {
            match self.peek() {
                None => return Err(FilterError::UnbalancedParen { at: self.pos }),
                Some(b')') => return Ok(AssertionValue(buf)),
                Some(b'\\') => buf.push(self.parse_escape()?),
                Some(found @ (b'*' | b'(')) => {
                    return Err(FilterError::UnexpectedChar {
                        at: self.pos,
                        found: found as char,
                    })
                }
                Some(b) => {
                    buf.push(b);
                    self.bump();
                }
            }
        }
    }

    /// `\XX` with two hex digits, yielding one raw byte.
    fn parse_escape(&mut self) -> Result<u8, FilterError> {
        let at = self.pos;
        self.bump();
        if self.pos + 2 > self.bytes.len() {
            return Err(FilterError::InvalidEscape { at });
        }
        let hex = &self.bytes[self.pos..self.pos + 2];
        let hex = std::str::from_utf8(hex).map_err(|_| FilterError::InvalidEscape { at })?;
        let byte = u8::from_str_radix(hex, 16).map_err(|_| FilterError::InvalidEscape { at })?;
        self.pos += 2;
        Ok(byte)
    }

    /// `attr[:dn][:rule]:=value`, entered with the cursor on the first `:`.
    /// The attribute may be empty; evaluation then matches any attribute.
    fn parse_extensible_tail(&mut self, attribute: String) -> Result<FilterNode, FilterError> {
        let mut dn_attributes = false;
        let mut matching_rule: Option<String> = None;
        loop {
            match self.peek() {
                Some(b':') => self.bump(),
                Some(found) => {
                    return Err(FilterError::UnexpectedChar {
                        at: self.pos,
                        found: found as char,
                    })
                }
                None => return Err(FilterError::UnbalancedParen { at: self.pos }),
            }
            if self.peek() == Some(b'=') {
                self.bump();
                break;
            }
            let start = self.pos;
            while let Some(b) = self.peek() {
                if matches!(b, b':' | b'=' | b'(' | b')') {
                    break;
                }
                self.bump();
            }
            if start == self.pos {
                return Err(FilterError::EmptyAttribute { at: start });
            }
            let token = std::str::from_utf8(&self.bytes[start..self.pos])
                .expect("token slice ends on ascii delimiter");
            if token.eq_ignore_ascii_case("dn") && !dn_attributes && matching_rule.is_none() {
                dn_attributes = true;
            } else if matching_rule.is_none() {
                matching_rule = Some(token.to_owned());
            } else {
                return Err(FilterError::UnexpectedChar {
                    at: start,
                    found: token.chars().next().unwrap_or(':'),
                });
            }
        }
        let value = self.parse_plain_value()?;
        self.expect_close()?;
        Ok(FilterNode::Extensible {
            attribute: (!attribute.is_empty()).then_some(attribute),
            matching_rule,
            value,
            dn_attributes,
        })
    }
}
