//! Parser for Helm-style `key=value` override strings.
//!
//! A string holds comma separated assignments like
//! `global.domainName=example.com,chart.enabled=true`. Keys are split into
//! nested mappings at dots. A value wrapped in braces (`{a,b}`) becomes a
//! sequence. A backslash escapes the next character, so `a\.b=c` sets the key
//! `a.b`.
//!
//! Values are typed: `true`, `false` and `null` (in any case) become
//! booleans and null, integers without leading zeros become integers,
//! everything else stays a string. List index keys like `a[0]=x` are
//! rejected.
use snafu::{Snafu, ensure};

use crate::value::{self, Mapping, Value};

const ESCAPE: char = '\\';

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum Error {
    #[snafu(display("key {key:?} has no value"))]
    MissingValue { key: String },

    #[snafu(display("assignment {assignment:?} contains an empty key"))]
    EmptyKey { assignment: String },

    #[snafu(display("assignment {assignment:?} uses list index syntax, which is not supported"))]
    IndexSyntax { assignment: String },
}

/// Parses a `key=value[,key=value...]` string into nested overrides.
pub fn parse(input: &str) -> Result<Mapping, Error> {
    let mut parsed = Mapping::new();

    for assignment in split_unescaped(input, ',') {
        if assignment.is_empty() {
            continue;
        }

        let Some((key, raw_value)) = split_once_unescaped(assignment, '=') else {
            return MissingValueSnafu {
                key: unescape(assignment),
            }
            .fail();
        };

        ensure!(
            split_once_unescaped(key, '[').is_none(),
            IndexSyntaxSnafu { assignment }
        );

        let segments: Vec<String> = split_unescaped(key, value::KEY_SEPARATOR)
            .into_iter()
            .map(unescape)
            .collect();
        ensure!(
            segments.iter().all(|segment| !segment.is_empty()),
            EmptyKeySnafu { assignment }
        );

        let nested = segments
            .into_iter()
            .rev()
            .fold(typed_value(raw_value), |nested, segment| {
                Value::Mapping(Mapping::from([(segment, nested)]))
            });
        if let Value::Mapping(nested) = nested {
            value::deep_merge(&mut parsed, nested);
        }
    }

    Ok(parsed)
}

fn typed_value(raw: &str) -> Value {
    match raw
        .strip_prefix('{')
        .and_then(|inner| inner.strip_suffix('}'))
    {
        Some("") => Value::Sequence(Vec::new()),
        Some(inner) => Value::Sequence(
            split_unescaped(inner, ',')
                .into_iter()
                .map(|item| typed_scalar(unescape(item)))
                .collect(),
        ),
        None => typed_scalar(unescape(raw)),
    }
}

fn typed_scalar(raw: String) -> Value {
    let typed = match raw.to_ascii_lowercase().as_str() {
        "true" => Some(Value::Bool(true)),
        "false" => Some(Value::Bool(false)),
        "null" => Some(Value::Null),
        "0" => Some(Value::Integer(0)),
        number if !number.starts_with('0') => number.parse().ok().map(Value::Integer),
        _ => None,
    };

    typed.unwrap_or_else(|| Value::String(raw))
}

/// Splits at every unescaped `separator` outside of braces. Escapes are kept.
fn split_unescaped(input: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    let mut depth = 0_usize;

    for (index, c) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }

        match c {
            ESCAPE => escaped = true,
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            c if c == separator && depth == 0 => {
                parts.push(&input[start..index]);
                start = index + c.len_utf8();
            }
            _ => {}
        }
    }

    parts.push(&input[start..]);
    parts
}

fn split_once_unescaped(input: &str, separator: char) -> Option<(&str, &str)> {
    let mut escaped = false;

    for (index, c) in input.char_indices() {
        if escaped {
            escaped = false;
        } else if c == ESCAPE {
            escaped = true;
        } else if c == separator {
            return Some((&input[..index], &input[index + c.len_utf8()..]));
        }
    }

    None
}

fn unescape(input: &str) -> String {
    let mut unescaped = String::with_capacity(input.len());
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        if c == ESCAPE {
            unescaped.push(chars.next().unwrap_or(ESCAPE));
        } else {
            unescaped.push(c);
        }
    }

    unescaped
}
