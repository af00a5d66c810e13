use async_trait::async_trait;

use crate::{
    interceptor::{Interceptor, Result},
    value::{Mapping, Value},
};

/// Shown instead of sensitive values.
pub const MASKED: &str = "<masked>";

/// Hides values when overrides are displayed, but never changes or defaults
/// them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MaskInterceptor;

#[async_trait]
impl Interceptor for MaskInterceptor {
    fn display(&self, _value: &Value, _key: &str) -> String {
        MASKED.to_owned()
    }

    async fn intercept(&self, value: Value, _key: &str) -> Result<Value> {
        Ok(value)
    }

    async fn undefined(&self, _overrides: &mut Mapping, _key: &str) -> Result<()> {
        Ok(())
    }
}
