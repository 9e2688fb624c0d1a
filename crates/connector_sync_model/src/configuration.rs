use serde_json::{
    Map,
    Value,
};

/// One entry of an adapter's configuration: `{value, label, type, required}`
/// per §6, plus `display`/`order` for rendering (SPEC_FULL §3 supplement,
/// grounded on `original_source/connectors/sources/jira.py`'s labeled,
/// ordered configuration fields).
#[derive(Debug, Clone, PartialEq)]
pub struct OptionDescriptor {
    pub value: Value,
    pub label: Option<String>,
    pub option_type: Option<String>,
    pub required: Option<bool>,
    pub display: Option<String>,
    pub order: Option<i64>,
}

impl OptionDescriptor {
    pub fn from_value(value: &Value) -> Self {
        Self {
            value: value.get("value").cloned().unwrap_or(Value::Null),
            label: value.get("label").and_then(|v| v.as_str()).map(str::to_string),
            option_type: value.get("type").and_then(|v| v.as_str()).map(str::to_string),
            required: value.get("required").and_then(|v| v.as_bool()),
            display: value.get("display").and_then(|v| v.as_str()).map(str::to_string),
            order: value.get("order").and_then(|v| v.as_i64()),
        }
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("value".to_string(), self.value.clone());
        if let Some(label) = &self.label {
            map.insert("label".to_string(), Value::String(label.clone()));
        }
        if let Some(option_type) = &self.option_type {
            map.insert("type".to_string(), Value::String(option_type.clone()));
        }
        if let Some(required) = self.required {
            map.insert("required".to_string(), Value::Bool(required));
        }
        if let Some(display) = &self.display {
            map.insert("display".to_string(), Value::String(display.clone()));
        }
        if let Some(order) = self.order {
            map.insert("order".to_string(), Value::Number(order.into()));
        }
        Value::Object(map)
    }
}

/// A Connector's `configuration` mapping: option name -> descriptor (§3).
#[derive(Debug, Clone, Default)]
pub struct Configuration {
    options: Map<String, Value>,
}

impl Configuration {
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Object(map)) => Self { options: map.clone() },
            _ => Self::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<OptionDescriptor> {
        self.options.get(name).map(OptionDescriptor::from_value)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.options.clone())
    }
}

/// Validates a proposed configuration against its descriptors: every
/// `required` field must be present and non-empty, and the supplied value
/// must coerce to the descriptor's declared `type` (§6).
pub fn validate_configuration(defaults: &Configuration, proposed: &Configuration) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();
    for (name, default_value) in &defaults.options {
        let descriptor = OptionDescriptor::from_value(default_value);
        let supplied = proposed.options.get(name).map(OptionDescriptor::from_value);

        let value = supplied.as_ref().map(|d| &d.value).unwrap_or(&Value::Null);
        let is_empty = matches!(value, Value::Null) || matches!(value, Value::String(s) if s.is_empty());

        if descriptor.required == Some(true) && is_empty {
            errors.push(format!("Field `{name}` is required"));
            continue;
        }
        if is_empty {
            continue;
        }
        let type_matches = match descriptor.option_type.as_deref() {
            Some("bool") => value.is_boolean(),
            Some("int") => value.is_i64() || value.is_u64(),
            Some("str") | None => true,
            Some(other) => {
                errors.push(format!("Field `{name}` has unknown type `{other}`"));
                continue;
            },
        };
        if !type_matches {
            errors.push(format!("Field `{name}` does not match declared type"));
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        for error in &errors {
            tracing::warn!(%error, "rejected proposed configuration field");
        }
        Err(errors)
    }
}
