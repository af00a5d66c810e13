use std::{collections::BTreeMap, fmt, sync::Arc};

use snafu::{ResultExt, Snafu};
use tracing::instrument;

use crate::{
    interceptor::{self, Interceptor},
    value::{self, DisplayMapping, Mapping, PathError, Value},
};

/// Maps key paths to the interceptor responsible for them.
pub type Registry = BTreeMap<String, Arc<dyn Interceptor>>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to intercept override {key:?}"))]
    Intercept {
        source: interceptor::Error,
        key: String,
    },

    #[snafu(display("failed to set default for undefined override {key:?}"))]
    Undefined {
        source: interceptor::Error,
        key: String,
    },

    #[snafu(display("failed to write intercepted override {key:?}"))]
    SetValue { source: PathError, key: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Operation {
    Render,
    Intercept,
}

/// An immutable snapshot of merged overrides, produced by
/// [`Builder::raw`](crate::builder::Builder::raw) and
/// [`Builder::build`](crate::builder::Builder::build).
///
/// All accessors hand out copies, the snapshot itself never changes.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    overrides: Mapping,
    interceptors: Registry,
}

impl Overrides {
    pub(crate) fn new(overrides: Mapping, interceptors: Registry) -> Self {
        Self {
            overrides,
            interceptors,
        }
    }

    /// Returns a copy of the overrides as nested mapping.
    pub fn map(&self) -> Mapping {
        self.overrides.clone()
    }

    /// Looks up the value at a dot-separated key path, see [`value::find`].
    pub fn find(&self, key: &str) -> Option<Value> {
        value::find(&self.overrides, key).cloned()
    }

    /// Returns the overrides as single level map with dot-separated keys, see
    /// [`value::flatten`].
    pub fn flattened_map(&self) -> BTreeMap<String, Value> {
        value::flatten(&self.overrides)
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }

    /// Renders the overrides for the user.
    ///
    /// Present values are replaced by what their interceptor shows (e.g.
    /// masked certificates), absent ones are defaulted like when building.
    /// This can query the cluster.
    pub async fn render(&self) -> Result<Mapping, Error> {
        self.run(Operation::Render).await
    }

    /// Runs all interceptors, returning the intercepted copy of the
    /// overrides.
    pub(crate) async fn intercept(&self) -> Result<Mapping, Error> {
        self.run(Operation::Intercept).await
    }

    /// Keys are always looked up in the original overrides, while results
    /// are written into a copy.
    #[instrument(skip(self))]
    async fn run(&self, operation: Operation) -> Result<Mapping, Error> {
        let mut result = self.overrides.clone();

        for (key, interceptor) in &self.interceptors {
            match value::find(&self.overrides, key) {
                Some(present) => {
                    let new_value = match operation {
                        Operation::Render => Value::String(interceptor.render(present, key).await),
                        Operation::Intercept => interceptor
                            .intercept(present.clone(), key)
                            .await
                            .context(InterceptSnafu { key })?,
                    };
                    value::set_value(&mut result, key, new_value)
                        .context(SetValueSnafu { key })?;
                }
                None => {
                    tracing::debug!(%key, "override is undefined");
                    interceptor
                        .undefined(&mut result, key)
                        .await
                        .context(UndefinedSnafu { key })?;
                }
            }
        }

        Ok(result)
    }

    fn masked(&self) -> Result<Mapping, Error> {
        let mut result = self.overrides.clone();

        for (key, interceptor) in &self.interceptors {
            if let Some(present) = value::find(&self.overrides, key) {
                let displayed = Value::String(interceptor.display(present, key));
                value::set_value(&mut result, key, displayed).context(SetValueSnafu { key })?;
            }
        }

        Ok(result)
    }
}

/// Shows the present overrides as their interceptors display them, without
/// querying the cluster. Undefined keys are left out.
impl fmt::Display for Overrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.masked() {
            Ok(masked) => write!(f, "{}", DisplayMapping(&masked)),
            Err(err) => write!(f, "{err}"),
        }
    }
}
