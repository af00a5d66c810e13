use async_trait::async_trait;

use crate::{
    interceptor::{Interceptor, Result, SubKeyNotMappingSnafu},
    value::{KEY_SEPARATOR, Mapping, Value},
};

/// Sets a static default for an undefined override and leaves present values
/// untouched.
#[derive(Clone, Debug, PartialEq)]
pub struct FallbackInterceptor {
    fallback: Value,
}

impl FallbackInterceptor {
    pub fn new(fallback: impl Into<Value>) -> Self {
        Self {
            fallback: fallback.into(),
        }
    }

    pub fn fallback(&self) -> &Value {
        &self.fallback
    }

    /// Writes the fallback at `key`, creating missing intermediate mappings.
    ///
    /// Fails if an existing sub-key on the way is not a mapping. The last
    /// segment may be absent or hold a mapping, which is replaced.
    pub fn apply(&self, overrides: &mut Mapping, key: &str) -> Result<()> {
        let segments: Vec<&str> = key.split(KEY_SEPARATOR).collect();
        let not_a_mapping = |depth: usize| {
            SubKeyNotMappingSnafu {
                key,
                sub_key: segments[..=depth].join("."),
            }
            .fail()
        };

        let Some((last, parents)) = segments.split_last() else {
            return Ok(());
        };

        let mut current = overrides;
        for (depth, segment) in parents.iter().enumerate() {
            let entry = current
                .entry((*segment).to_owned())
                .or_insert_with(|| Value::Mapping(Mapping::new()));

            match entry {
                Value::Mapping(inner) => current = inner,
                _ => return not_a_mapping(depth),
            }
        }

        match current.get(*last) {
            None | Some(Value::Mapping(_)) => {
                tracing::debug!(key, fallback = %self.fallback, "setting default value");
                current.insert((*last).to_owned(), self.fallback.clone());
                Ok(())
            }
            Some(_) => not_a_mapping(parents.len()),
        }
    }
}

#[async_trait]
impl Interceptor for FallbackInterceptor {
    async fn intercept(&self, value: Value, _key: &str) -> Result<Value> {
        Ok(value)
    }

    async fn undefined(&self, overrides: &mut Mapping, key: &str) -> Result<()> {
        self.apply(overrides, key)
    }
}
