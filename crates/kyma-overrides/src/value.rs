//! The value model of override mappings.
//!
//! An override mapping is a tree of string keys to [`Value`]s. Locations in
//! the tree are addressed by dot-separated key paths like
//! `global.domainName`.
use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use serde_yaml::Value as YamlValue;
use snafu::Snafu;

/// Separates the segments of a key path.
pub const KEY_SEPARATOR: char = '.';

/// One level of an override tree. Ordered, so rendering and iteration are
/// deterministic.
pub type Mapping = BTreeMap<String, Value>;

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum PathError {
    #[snafu(display("failed to set value, key {key:?} refers to a mapping"))]
    KeyIsMapping { key: String },

    #[snafu(display(
        "failed to set value, path {key:?} is incorrect: mapping expected at sub-key {sub_key:?} but found {found}"
    ))]
    NotAMapping {
        key: String,
        sub_key: String,
        found: &'static str,
    },
}

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum YamlError {
    #[snafu(display("mapping keys have to be scalars, but found a {found} key"))]
    NonScalarKey { found: &'static str },
}

/// A single override value, either a scalar, a sequence or a nested
/// [`Mapping`].
///
/// Sequences are treated like scalars when merging: they are replaced as a
/// whole and never concatenated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Sequence(Vec<Value>),
    Mapping(Mapping),
}

impl Value {
    /// A human readable name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Sequence(_) => "sequence",
            Self::Mapping(_) => "mapping",
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Self::Mapping(mapping) => Some(mapping),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(string) => Some(string),
            _ => None,
        }
    }

    pub fn is_mapping(&self) -> bool {
        matches!(self, Self::Mapping(_))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Self::Sequence(value)
    }
}

impl From<Mapping> for Value {
    fn from(value: Mapping) -> Self {
        Self::Mapping(value)
    }
}

/// Converts a parsed YAML document. Tags are dropped, and scalar mapping keys
/// (`80: http`, `true: x`) become their string form.
impl TryFrom<YamlValue> for Value {
    type Error = YamlError;

    fn try_from(yaml: YamlValue) -> Result<Self, Self::Error> {
        Ok(match yaml {
            YamlValue::Null => Self::Null,
            YamlValue::Bool(value) => Self::Bool(value),
            YamlValue::Number(number) => match number.as_i64() {
                Some(integer) => Self::Integer(integer),
                None => number.as_f64().map_or(Self::Null, Self::Float),
            },
            YamlValue::String(value) => Self::String(value),
            YamlValue::Sequence(items) => Self::Sequence(
                items
                    .into_iter()
                    .map(Self::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            YamlValue::Mapping(mapping) => Self::Mapping(
                mapping
                    .into_iter()
                    .map(|(key, value)| Ok((yaml_key(key)?, Self::try_from(value)?)))
                    .collect::<Result<_, YamlError>>()?,
            ),
            YamlValue::Tagged(tagged) => Self::try_from(tagged.value)?,
        })
    }
}

fn yaml_key(key: YamlValue) -> Result<String, YamlError> {
    match key {
        YamlValue::Null => Ok("null".to_owned()),
        YamlValue::Bool(value) => Ok(value.to_string()),
        YamlValue::Number(number) => Ok(number.to_string()),
        YamlValue::String(value) => Ok(value),
        YamlValue::Tagged(tagged) => yaml_key(tagged.value),
        YamlValue::Sequence(_) => NonScalarKeySnafu { found: "sequence" }.fail(),
        YamlValue::Mapping(_) => NonScalarKeySnafu { found: "mapping" }.fail(),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::String(value) => f.write_str(value),
            Self::Sequence(items) => {
                f.write_str("[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Mapping(mapping) => write!(f, "{}", DisplayMapping(mapping)),
        }
    }
}

/// Renders a [`Mapping`] in compact flow style, e.g. `{a: {b: c}, d: 1}`.
pub struct DisplayMapping<'a>(pub &'a Mapping);

impl fmt::Display for DisplayMapping<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (index, (key, value)) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}: {value}")?;
        }
        f.write_str("}")
    }
}

/// Resolves a dot-separated key path.
///
/// Every segment but the last one has to resolve to a nested mapping. The
/// last segment may resolve to any value, including a mapping.
pub fn find<'a>(mapping: &'a Mapping, key: &str) -> Option<&'a Value> {
    let mut segments = key.split(KEY_SEPARATOR).peekable();
    let mut current = mapping;

    loop {
        let value = current.get(segments.next()?)?;
        if segments.peek().is_none() {
            return Some(value);
        }
        current = value.as_mapping()?;
    }
}

/// Writes `value` at the dot-separated key path.
///
/// All intermediate segments have to exist and be mappings already, this
/// function never creates them. Overwriting a mapping with a value is
/// rejected as well.
pub fn set_value(mapping: &mut Mapping, key: &str, value: Value) -> Result<(), PathError> {
    let segments: Vec<&str> = key.split(KEY_SEPARATOR).collect();
    set_value_at(mapping, key, &segments, value)
}

fn set_value_at(
    mapping: &mut Mapping,
    key: &str,
    path: &[&str],
    value: Value,
) -> Result<(), PathError> {
    let Some((segment, rest)) = path.split_first() else {
        return KeyIsMappingSnafu { key }.fail();
    };

    if let Some(Value::Mapping(inner)) = mapping.get_mut(*segment) {
        return set_value_at(inner, key, rest, value);
    }

    if !rest.is_empty() {
        return NotAMappingSnafu {
            key,
            sub_key: *segment,
            found: mapping.get(*segment).map_or("nothing", Value::kind),
        }
        .fail();
    }

    mapping.insert((*segment).to_owned(), value);
    Ok(())
}

/// Merges `incoming` into `base`.
///
/// Nested mappings present on both sides are merged recursively, in every
/// other case the incoming value replaces the existing one.
pub fn deep_merge(base: &mut Mapping, incoming: Mapping) {
    for (key, value) in incoming {
        match value {
            Value::Mapping(incoming) => match base.get_mut(&key) {
                Some(Value::Mapping(existing)) => deep_merge(existing, incoming),
                _ => {
                    base.insert(key, Value::Mapping(incoming));
                }
            },
            value => {
                base.insert(key, value);
            }
        }
    }
}

/// Flattens a mapping into a single level, joining nested keys with dots.
///
/// Leaves keep their type. Empty nested mappings don't produce any entry.
pub fn flatten(mapping: &Mapping) -> BTreeMap<String, Value> {
    let mut flattened = BTreeMap::new();
    flatten_into(&mut flattened, None, mapping);
    flattened
}

fn flatten_into(flattened: &mut BTreeMap<String, Value>, prefix: Option<&str>, mapping: &Mapping) {
    for (key, value) in mapping {
        let path = match prefix {
            Some(prefix) => format!("{prefix}{KEY_SEPARATOR}{key}"),
            None => key.clone(),
        };

        match value {
            Value::Mapping(inner) => flatten_into(flattened, Some(&path), inner),
            leaf => {
                flattened.insert(path, leaf.clone());
            }
        }
    }
}
