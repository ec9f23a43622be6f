//! Three-valued filter evaluation per RFC 4511 §4.5.1.7. UNDEFINED is
//! carried through the AND/OR/NOT algebra; only a top-level TRUE is a
//! match.

use adsnap_core::types::{Object, SyntaxKind, Value};
use adsnap_format::Schema;

use crate::ast::{AssertionValue, FilterNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ternary {
    True,
    False,
    Undefined,
}

impl Ternary {
    pub fn from_bool(value: bool) -> Self {
        if value {
            Self::True
        } else {
            Self::False
        }
    }

    pub fn not3(self) -> Self {
        match self {
            Self::True => Self::False,
            Self::False => Self::True,
            Self::Undefined => Self::Undefined,
        }
    }

    pub fn or3(self, other: Self) -> Self {
        match (self, other) {
            (Self::True, _) | (_, Self::True) => Self::True,
            (Self::Undefined, _) | (_, Self::Undefined) => Self::Undefined,
            _ => Self::False,
        }
    }

    pub fn and3(self, other: Self) -> Self {
        match (self, other) {
            (Self::False, _) | (_, Self::False) => Self::False,
            (Self::Undefined, _) | (_, Self::Undefined) => Self::Undefined,
            _ => Self::True,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub schema: &'a Schema,
    pub case_insensitive: bool,
}

/// Collapses the three-valued result to a match decision: UNDEFINED and
/// FALSE are both non-matches.
pub fn matches(node: &FilterNode, object: &Object, ctx: &EvalContext<'_>) -> bool {
    evaluate(node, object, ctx) == Ternary::True
}

pub fn evaluate(node: &FilterNode, object: &Object, ctx: &EvalContext<'_>) -> Ternary {
    match node {
        FilterNode::And(children) => {
            // Empty AND is TRUE (RFC 4526).
            let mut undefined = false;
            for child in children {
                match evaluate(child, object, ctx) {
                    Ternary::False => return Ternary::False,
                    Ternary::Undefined => undefined = true,
                    Ternary::True => {}
                }
            }
            if undefined {
                Ternary::Undefined
            } else {
                Ternary::True
            }
        }
        FilterNode::Or(children) => {
            // Empty OR is FALSE (RFC 4526).
            let mut undefined = false;
            for child in children {
                match evaluate(child, object, ctx) {
                    Ternary::True => return Ternary::True,
                    Ternary::Undefined => undefined = true,
                    Ternary::False => {}
                }
            }
            if undefined {
                Ternary::Undefined
            } else {
                Ternary::False
            }
        }
        FilterNode::Not(child) => evaluate(child, object, ctx).not3(),
        FilterNode::Present(attr) => eval_present(attr, object, ctx),
        FilterNode::Equality(attr, value) | FilterNode::ApproxMatch(attr, value) => {
            eval_equality(attr, value, object, ctx)
        }
        FilterNode::Substring {
            attribute,
            initial,
            any,
            final_,
        } => eval_substring(attribute, initial.as_ref(), any, final_.as_ref(), object, ctx),
        FilterNode::GreaterOrEqual(attr, value) => {
            eval_ordering(attr, value, object, ctx, true)
        }
        FilterNode::LessOrEqual(attr, value) => {
            eval_ordering(attr, value, object, ctx, false)
        }
        FilterNode::Extensible {
            attribute,
            matching_rule,
            value,
            dn_attributes,
        } => eval_extensible(
            attribute.as_deref(),
            matching_rule.as_deref(),
            value,
            *dn_attributes,
            object,
            ctx,
        ),
    }
}

fn eval_present(attr: &str, object: &Object, ctx: &EvalContext<'_>) -> Ternary {
    let Some(def) = ctx.schema.attribute_by_name(attr) else {
        return Ternary::False;
    };
    Ternary::from_bool(object.values(def.id).is_some_and(|v| !v.is_empty()))
}

fn eval_equality(
    attr: &str,
    assertion: &AssertionValue,
    object: &Object,
    ctx: &EvalContext<'_>,
) -> Ternary {
    let Some(def) = ctx.schema.attribute_by_name(attr) else {
        return Ternary::Undefined;
    };
    let Some(values) = object.values(def.id) else {
        return Ternary::Undefined;
    };
    let Some(needle) = Needle::coerce(assertion, def.syntax) else {
        return Ternary::Undefined;
    };
    Ternary::from_bool(
        values
            .iter()
            .any(|value| needle.matches(value, ctx.case_insensitive)),
    )
}

/// The assertion value coerced to the attribute's syntax; `None` means the
/// comparison is undefined for that syntax.
enum Needle<'a> {
    Int(i64),
    Bool(bool),
    Text(String),
    Dn { canonical: String, raw: String },
    Bytes(&'a [u8]),
}

impl<'a> Needle<'a> {
    fn coerce(assertion: &'a AssertionValue, syntax: SyntaxKind) -> Option<Self> {
        match syntax {
            SyntaxKind::Integer => assertion.text().trim().parse().ok().map(Self::Int),
            SyntaxKind::Boolean => match assertion.text().trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(Self::Bool(true)),
                "false" | "0" => Some(Self::Bool(false)),
                _ => None,
            },
            SyntaxKind::String | SyntaxKind::Guid | SyntaxKind::Sid | SyntaxKind::Filetime => {
                Some(Self::Text(assertion.text().into_owned()))
            }
            SyntaxKind::Dn => {
                let raw = assertion.text().into_owned();
                Some(Self::Dn {
                    canonical: canonicalize_dn(&raw),
                    raw,
                })
            }
            SyntaxKind::OctetString | SyntaxKind::SecurityDescriptor | SyntaxKind::Other(_) => {
                Some(Self::Bytes(assertion.bytes()))
            }
        }
    }

    fn matches(&self, value: &Value, case_insensitive: bool) -> bool {
        match (value, self) {
            (Value::Integer(n), Self::Int(expected)) => n == expected,
            (Value::Boolean(b), Self::Bool(expected)) => b == expected,
            (Value::String(s), Self::Text(t)) => text_eq(s, t, case_insensitive),
            // GUID and SID textual forms are case-preserving hex/digits;
            // compare them case-blind regardless of the flag.
            (Value::Guid(s), Self::Text(t)) | (Value::Sid(s), Self::Text(t)) => {
                s.eq_ignore_ascii_case(t)
            }
            (Value::Timestamp(ts), Self::Text(t)) => ts.render().eq_ignore_ascii_case(t),
            (Value::Dn(dn), Self::Dn { canonical, raw }) => {
                text_eq(&canonicalize_dn(dn), canonical, case_insensitive)
                    || rdn_value(dn).is_some_and(|rdn| text_eq(rdn, raw, case_insensitive))
            }
            (Value::Binary(bytes), Self::Bytes(expected))
            | (Value::Unknown(bytes), Self::Bytes(expected)) => bytes == expected,
            _ => false,
        }
    }
}

fn eval_substring(
    attr: &str,
    initial: Option<&AssertionValue>,
    any: &[AssertionValue],
    final_: Option<&AssertionValue>,
    object: &Object,
    ctx: &EvalContext<'_>,
) -> Ternary {
    let Some(def) = ctx.schema.attribute_by_name(attr) else {
        return Ternary::Undefined;
    };
    if !def.syntax.is_text() {
        return Ternary::Undefined;
    }
    let Some(values) = object.values(def.id) else {
        return Ternary::Undefined;
    };

    let ci = ctx.case_insensitive;
    let initial = initial.map(|v| fold(&v.text(), ci));
    let any: Vec<String> = any.iter().map(|v| fold(&v.text(), ci)).collect();
    let final_ = final_.map(|v| fold(&v.text(), ci));

    for value in values {
        let candidate = match value {
            Value::String(s) | Value::Dn(s) => fold(s, ci),
            _ => continue,
        };
        if substring_match(&candidate, initial.as_deref(), &any, final_.as_deref()) {
            return Ternary::True;
        }
    }
    Ternary::False
}

/// Left-anchored on `initial`, right-anchored on `final_`, `any` segments
/// found left to right without overlap.
fn substring_match(
    candidate: &str,
    initial: Option<&str>,
    any: &[String],
    final_: Option<&str>,
) -> bool {
    let mut pos = 0;
    if let Some(initial) = initial {
        if !candidate.starts_with(initial) {
            return false;
        }
        pos = initial.len();
    }
    for segment in any {
        match candidate[pos..].find(segment.as_str()) {
            Some(found) => pos += found + segment.len(),
            None => return false,
        }
    }
    match final_ {
        Some(final_) => candidate.len() >= pos + final_.len() && candidate.ends_with(final_),
        None => true,
    }
}

fn eval_ordering(
    attr: &str,
    assertion: &AssertionValue,
    object: &Object,
    ctx: &EvalContext<'_>,
    greater: bool,
) -> Ternary {
    let Some(def) = ctx.schema.attribute_by_name(attr) else {
        return Ternary::Undefined;
    };
    let Some(values) = object.values(def.id) else {
        return Ternary::Undefined;
    };

    if def.syntax == SyntaxKind::Integer {
        let Ok(expected) = assertion.text().trim().parse::<i64>() else {
            return Ternary::Undefined;
        };
        let hit = values.iter().any(|value| match value {
            Value::Integer(n) => {
                if greater {
                    *n >= expected
                } else {
                    *n <= expected
                }
            }
            _ => false,
        });
        return Ternary::from_bool(hit);
    }

    // Lexicographic on the rendered text for every other syntax.
    let expected = fold(&assertion.text(), ctx.case_insensitive);
    let hit = values.iter().any(|value| {
        let rendered = fold(&value.render(), ctx.case_insensitive);
        if greater {
            rendered >= expected
        } else {
            rendered <= expected
        }
    });
    Ternary::from_bool(hit)
}

fn eval_extensible(
    attribute: Option<&str>,
    matching_rule: Option<&str>,
    value: &AssertionValue,
    dn_attributes: bool,
    object: &Object,
    ctx: &EvalContext<'_>,
) -> Ternary {
    // No matching rules are implemented; naming one is undefined.
    if matching_rule.is_some() {
        return Ternary::Undefined;
    }

    let mut result = match attribute {
        Some(attr) => eval_equality(attr, value, object, ctx),
        None => {
            // Equality against every attribute the object carries.
            let mut acc = Ternary::False;
            for (id, _) in &object.attributes {
                let Some(def) = ctx.schema.attribute_by_id(*id) else {
                    continue;
                };
                acc = acc.or3(eval_equality(&def.name, value, object, ctx));
                if acc == Ternary::True {
                    break;
                }
            }
            acc
        }
    };

    if dn_attributes && result != Ternary::True {
        result = result.or3(Ternary::from_bool(dn_components_match(
            &object.dn,
            attribute,
            value,
            ctx.case_insensitive,
        )));
    }
    result
}

/// True when any RDN component of the DN (optionally restricted to one
/// attribute type) has the assertion as its value.
fn dn_components_match(
    dn: &str,
    attribute: Option<&str>,
    value: &AssertionValue,
    case_insensitive: bool,
) -> bool {
    let needle = value.text();
    dn.split(',').any(|component| {
        let Some((typ, val)) = component.split_once('=') else {
            return false;
        };
        let type_ok = attribute.is_none_or(|a| typ.trim().eq_ignore_ascii_case(a));
        type_ok && text_eq(val.trim(), &needle, case_insensitive)
    })
}

/// DN canonical form for comparisons: whitespace around commas trimmed,
/// attribute type names ASCII-folded, attribute values untouched.
fn canonicalize_dn(dn: &str) -> String {
    let mut out = String::with_capacity(dn.len());
    for (i, component) in dn.split(',').enumerate() {
        if i > 0 {
            out.push(',');
        }
        let component = component.trim();
        match component.split_once('=') {
            Some((typ, val)) => {
                out.push_str(&typ.trim().to_ascii_lowercase());
                out.push('=');
                out.push_str(val);
            }
            None => out.push_str(component),
        }
    }
    out
}

/// First RDN value of a DN, e.g. `Alice` in `CN=Alice,DC=corp`.
fn rdn_value(dn: &str) -> Option<&str> {
    let first = dn.split(',').next()?;
    let (_, value) = first.split_once('=')?;
    Some(value.trim())
}

fn text_eq(a: &str, b: &str, case_insensitive: bool) -> bool {
    if case_insensitive {
        a.eq_ignore_ascii_case(b)
    } else {
        a == b
    }
}

fn fold(text: &str, case_insensitive: bool) -> String {
    if case_insensitive {
        text.to_ascii_lowercase()
    } else {
        text.to_owned()
    }
}
