use serde_json::{
    json,
    Map,
    Value,
};

/// Ingestion post-processing defaults merged under caller-supplied pipeline
/// options (§4.0 overview, §8).
pub fn pipeline_defaults() -> Map<String, Value> {
    let Value::Object(map) = json!({
        "name": "ent-search-generic-ingestion",
        "extract_binary_content": true,
        "reduce_whitespace": true,
        "run_ml_inference": true,
    }) else {
        unreachable!()
    };
    map
}

/// A Connector/SyncJob's `pipeline` mapping: caller values layered over
/// [`pipeline_defaults`] (§4.0, §8). Missing keys fall back to the default;
/// present keys (even `false`/`null`) override it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    data: Map<String, Value>,
}

impl Pipeline {
    pub fn from_value(value: Option<Value>) -> Self {
        let mut data = pipeline_defaults();
        if let Some(Value::Object(overrides)) = value {
            for (key, value) in overrides {
                data.insert(key, value);
            }
        }
        Self { data }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.data)
    }

    pub fn as_value(&self) -> Value {
        Value::Object(self.data.clone())
    }

    fn flag(&self, key: &str) -> bool {
        self.data.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Whether the pipeline runtime should invoke an `AdapterDocument`'s
    /// `fetch_content` at all; gates attachment/binary extraction (§4.7).
    pub fn extract_binary_content(&self) -> bool {
        self.flag("extract_binary_content")
    }

    pub fn reduce_whitespace(&self) -> bool {
        self.flag("reduce_whitespace")
    }

    pub fn run_ml_inference(&self) -> bool {
        self.flag("run_ml_inference")
    }

    pub fn name(&self) -> Option<&str> {
        self.data.get("name").and_then(Value::as_str)
    }
}
