use serde::Serialize;
use serde_json::{Map, Value};

use crate::context::Context;
use crate::template::TemplateError;

/// Variables handed to a template.
///
/// Three layers are merged in order, later layers winning: pipeline
/// globals, the typed fields a task always provides, and caller-supplied
/// extra fields.
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    globals: Map<String, Value>,
    base: Map<String, Value>,
    extra: Map<String, Value>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_globals(globals: &Context) -> Self {
        Self {
            globals: globals.as_map().clone(),
            ..Self::default()
        }
    }

    /// Set the typed base fields from any struct serialising to an object.
    /// Non-object values are ignored.
    pub fn set_base<T: Serialize>(&mut self, base: &T) -> Result<(), serde_json::Error> {
        if let Value::Object(map) = serde_json::to_value(base)? {
            self.base = map;
        }
        Ok(())
    }

    /// Add a single base field.
    pub fn add_to_context<T: Serialize + ?Sized>(
        &mut self,
        key: &str,
        value: &T,
    ) -> Result<(), TemplateError> {
        let value = serde_json::to_value(value)?;
        self.base.insert(key.to_string(), value);
        Ok(())
    }

    /// Merge caller-supplied fields; these override everything else.
    pub fn extend(&mut self, extra: Map<String, Value>) {
        self.extra.extend(extra);
    }

    /// Flattened view with precedence applied.
    pub fn merged(&self) -> Map<String, Value> {
        let mut merged = self.globals.clone();
        merged.extend(self.base.clone());
        merged.extend(self.extra.clone());
        merged
    }

    pub fn to_tera(&self) -> Result<tera::Context, TemplateError> {
        Ok(tera::Context::from_value(Value::Object(self.merged()))?)
    }
}
