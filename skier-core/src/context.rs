use serde_json::{Map, Value};

/// Variables shared between tasks for the lifetime of one pipeline run.
///
/// Only the pipeline executor writes to it, by merging each task's output
/// once the task has finished. Tasks get a shared reference while they run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    vars: Map<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(vars: Map<String, Value>) -> Self {
        Self { vars }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Insert a variable, returning the value it replaced.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.vars.insert(name.into(), value)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.vars.iter()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.vars
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.vars
    }
}

/// Return the variable name if `s` is exactly `${name}`.
///
/// References embedded in a longer string are not recognised.
pub fn variable_reference(s: &str) -> Option<&str> {
    let name = s.strip_prefix("${")?.strip_suffix('}')?;
    if name.is_empty() || name.contains(['{', '}']) {
        return None;
    }
    Some(name)
}

/// Resolve every `${name}` string in `config` against `context`.
///
/// Arrays and objects are walked recursively. A reference to a variable
/// that is not set yet resolves to `Value::Null`, which tasks read as
/// "not provided", and is logged as a warning.
pub fn resolve_config_vars(config: &Value, context: &Context) -> Value {
    resolve_and_report(config, context).0
}

/// Like [`resolve_config_vars`], also returning the names of references
/// that could not be resolved, in the order they were met.
pub fn resolve_and_report(config: &Value, context: &Context) -> (Value, Vec<String>) {
    let mut unresolved = Vec::new();
    let value = resolve(config, context, &mut unresolved);
    (value, unresolved)
}

fn resolve(config: &Value, context: &Context, unresolved: &mut Vec<String>) -> Value {
    match config {
        Value::String(s) => match variable_reference(s) {
            Some(name) => match context.get(name) {
                Some(value) => {
                    tracing::debug!(variable = name, value = %value, "Resolved variable");
                    value.clone()
                }
                None => {
                    tracing::warn!(
                        variable = name,
                        "Variable '{name}' not found in context, leaving as undefined"
                    );
                    unresolved.push(name.to_string());
                    Value::Null
                }
            },
            None => config.clone(),
        },
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| resolve(item, context, unresolved))
                .collect(),
        ),
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(key, value)| (key.clone(), resolve(value, context, unresolved)))
                .collect(),
        ),
        _ => config.clone(),
    }
}
