//! Filter expressions selecting which style rules apply to a feature.
//!
//! Filters arrive as JSON trees keyed by `"op"`:
//!
//! ```json
//! { "op": "and", "children": [
//!     { "op": "equal", "property": "category", "literal": "X" },
//!     { "op": "greater", "property": "size", "literal": 10 }
//! ] }
//! ```
//!
//! Anything that cannot be understood compiles to [`FilterExpr::Unsupported`],
//! which never matches. Compilation never fails.

use regex::{Regex, RegexBuilder};
use serde_json::Value;
use streaming::Properties;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Comparison {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl Comparison {
    fn from_op(op: &str) -> Option<Self> {
        Some(match op {
            "equal" => Comparison::Equal,
            "not_equal" => Comparison::NotEqual,
            "less" => Comparison::Less,
            "less_or_equal" => Comparison::LessOrEqual,
            "greater" => Comparison::Greater,
            "greater_or_equal" => Comparison::GreaterOrEqual,
            _ => return None,
        })
    }

    fn accepts(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            Comparison::Equal => ordering == Equal,
            Comparison::NotEqual => ordering != Equal,
            Comparison::Less => ordering == Less,
            Comparison::LessOrEqual => ordering != Greater,
            Comparison::Greater => ordering == Greater,
            Comparison::GreaterOrEqual => ordering != Less,
        }
    }
}

#[derive(Debug, Clone)]
pub enum FilterExpr {
    Compare {
        op: Comparison,
        property: String,
        literal: Value,
    },
    IsNull {
        property: String,
    },
    IsNotNull {
        property: String,
    },
    Like {
        property: String,
        pattern: Regex,
    },
    And(Vec<FilterExpr>),
    Or(Vec<FilterExpr>),
    Not(Box<FilterExpr>),
    /// Never matches; carries the reason for logging.
    Unsupported(String),
}

impl FilterExpr {
    pub fn compile(value: &Value) -> FilterExpr {
        let Some(obj) = value.as_object() else {
            return FilterExpr::Unsupported("filter is not an object".into());
        };
        let Some(op) = obj.get("op").and_then(Value::as_str) else {
            return FilterExpr::Unsupported("missing op".into());
        };
        let property = obj
            .get("property")
            .and_then(Value::as_str)
            .map(str::to_string);

        if let Some(cmp) = Comparison::from_op(op) {
            return match (property, obj.get("literal")) {
                (Some(property), Some(literal)) => FilterExpr::Compare {
                    op: cmp,
                    property,
                    literal: literal.clone(),
                },
                _ => FilterExpr::Unsupported(format!("{op} needs property and literal")),
            };
        }

        match op {
            "is_null" | "is_not_null" => match property {
                Some(property) if op == "is_null" => FilterExpr::IsNull { property },
                Some(property) => FilterExpr::IsNotNull { property },
                None => FilterExpr::Unsupported(format!("{op} needs property")),
            },
            "like" => {
                let Some(property) = property else {
                    return FilterExpr::Unsupported("like needs property".into());
                };
                let Some(pattern) = obj.get("pattern").and_then(Value::as_str) else {
                    return FilterExpr::Unsupported("like needs pattern".into());
                };
                let opts = LikeOptions {
                    wildcard: char_option(obj.get("wildcard"), '*'),
                    single_char: char_option(obj.get("single_char"), '.'),
                    escape: char_option(obj.get("escape"), '!'),
                    match_case: obj
                        .get("match_case")
                        .and_then(Value::as_bool)
                        .unwrap_or(true),
                };
                match like_regex(pattern, &opts) {
                    Ok(pattern) => FilterExpr::Like { property, pattern },
                    Err(e) => FilterExpr::Unsupported(format!("bad like pattern: {e}")),
                }
            }
            "and" | "or" => {
                let Some(children) = obj.get("children").and_then(Value::as_array) else {
                    return FilterExpr::Unsupported(format!("{op} needs children"));
                };
                let children = children.iter().map(FilterExpr::compile).collect();
                if op == "and" {
                    FilterExpr::And(children)
                } else {
                    FilterExpr::Or(children)
                }
            }
            "not" => match obj.get("child") {
                Some(child) => FilterExpr::Not(Box::new(FilterExpr::compile(child))),
                None => FilterExpr::Unsupported("not needs child".into()),
            },
            other => FilterExpr::Unsupported(format!("unknown op {other}")),
        }
    }

    pub fn evaluate(&self, properties: &Properties) -> bool {
        match self {
            FilterExpr::Compare {
                op,
                property,
                literal,
            } => match present(properties, property) {
                Some(value) => compare(value, literal).is_some_and(|o| op.accepts(o)),
                None => false,
            },
            FilterExpr::IsNull { property } => present(properties, property).is_none(),
            FilterExpr::IsNotNull { property } => present(properties, property).is_some(),
            FilterExpr::Like { property, pattern } => present(properties, property)
                .and_then(as_text)
                .is_some_and(|text| pattern.is_match(&text)),
            FilterExpr::And(children) => children.iter().all(|c| c.evaluate(properties)),
            FilterExpr::Or(children) => children.iter().any(|c| c.evaluate(properties)),
            // A negated unsupported node still never matches.
            FilterExpr::Not(child) => match child.as_ref() {
                FilterExpr::Unsupported(_) => false,
                child => !child.evaluate(properties),
            },
            FilterExpr::Unsupported(_) => false,
        }
    }

    /// `true` if this node or any descendant is unsupported.
    pub fn has_unsupported(&self) -> bool {
        match self {
            FilterExpr::Unsupported(_) => true,
            FilterExpr::And(c) | FilterExpr::Or(c) => c.iter().any(FilterExpr::has_unsupported),
            FilterExpr::Not(c) => c.has_unsupported(),
            _ => false,
        }
    }
}

struct LikeOptions {
    wildcard: char,
    single_char: char,
    escape: char,
    match_case: bool,
}

fn char_option(value: Option<&Value>, default: char) -> char {
    value
        .and_then(Value::as_str)
        .and_then(|s| s.chars().next())
        .unwrap_or(default)
}

fn like_regex(pattern: &str, opts: &LikeOptions) -> Result<Regex, regex::Error> {
    let mut source = String::from("^");
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if c == opts.escape {
            // A trailing escape matches itself.
            let literal = chars.next().unwrap_or(c);
            source.push_str(&regex::escape(&literal.to_string()));
        } else if c == opts.wildcard {
            source.push_str(".*");
        } else if c == opts.single_char {
            source.push('.');
        } else {
            source.push_str(&regex::escape(&c.to_string()));
        }
    }
    source.push('$');
    RegexBuilder::new(&source)
        .case_insensitive(!opts.match_case)
        .dot_matches_new_line(true)
        .build()
}

/// Property value, with JSON null treated as absent.
fn present<'a>(properties: &'a Properties, name: &str) -> Option<&'a Value> {
    properties.get(name).filter(|v| !v.is_null())
}

pub(crate) fn as_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|v| v.is_finite())
}

pub(crate) fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn compare(value: &Value, literal: &Value) -> Option<std::cmp::Ordering> {
    if let (Some(a), Some(b)) = (as_number(value), as_number(literal)) {
        return a.partial_cmp(&b);
    }
    Some(as_text(value)?.cmp(&as_text(literal)?))
}
