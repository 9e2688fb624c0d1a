use serde_json::{
    json,
    Map,
    Value,
};

use crate::status::FilteringValidationState;

/// The default filtering bundle domain. Connectors with a single filtering
/// concern (the common case) only ever populate this domain (§4.4).
pub const DEFAULT_DOMAIN: &str = "DEFAULT";

/// The slot of a [`FilterBundle`] a caller is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterState {
    Draft,
    Active,
}

impl FilterState {
    fn key(self) -> &'static str {
        match self {
            FilterState::Draft => "draft",
            FilterState::Active => "active",
        }
    }
}

/// One per-domain rule bundle: `{domain, draft, active}` (§3).
#[derive(Debug, Clone)]
pub struct FilterBundle {
    pub domain: String,
    raw: Map<String, Value>,
}

impl FilterBundle {
    fn slot(&self, state: FilterState) -> Filter {
        Filter::from_value(self.raw.get(state.key()).cloned())
    }
}

/// A basic-rules + advanced-snippet + validation-verdict filter (§3, §4.4).
/// Wraps the raw JSON object so that unknown/extra keys round-trip exactly —
/// `transform_filtering` depends on that (§8).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    raw: Map<String, Value>,
}

impl Filter {
    pub fn from_value(value: Option<Value>) -> Self {
        match value {
            Some(Value::Object(map)) => Self { raw: map },
            _ => Self::default(),
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.raw)
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    fn advanced_snippet(&self) -> Map<String, Value> {
        match self.raw.get("advanced_snippet") {
            Some(Value::Object(m)) => m.clone(),
            _ => Map::new(),
        }
    }

    pub fn get_advanced_rules(&self) -> Value {
        self.advanced_snippet().get("value").cloned().unwrap_or(Value::Object(Map::new()))
    }

    /// True iff `advanced_snippet.value` is present and non-empty (§4.4).
    pub fn has_advanced_rules(&self) -> bool {
        match self.get_advanced_rules() {
            Value::Object(m) => !m.is_empty(),
            Value::Array(a) => !a.is_empty(),
            Value::Null => false,
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn validation_state(&self) -> FilteringValidationState {
        let state = self
            .raw
            .get("validation")
            .and_then(|v| v.get("state"))
            .and_then(|v| v.as_str());
        FilteringValidationState::from_opt_str(state)
    }

    pub fn has_validation_state(&self, state: FilteringValidationState) -> bool {
        self.validation_state() == state
    }

    /// Writes a `{state, errors}` validation verdict into this filter.
    pub fn set_validation(&mut self, state: FilteringValidationState, errors: Vec<String>) {
        self.raw.insert(
            "validation".to_string(),
            json!({
                "state": state.as_str(),
                "errors": errors,
            }),
        );
    }

    /// Normalizes this filter into the always-shaped `{advanced_snippet,
    /// rules}` form a SyncJob snapshot captures (§4.4, §8): the empty filter
    /// becomes `{advanced_snippet: {}, rules: []}` exactly; a non-empty
    /// filter is returned unchanged (all keys, including `validation`,
    /// round-trip).
    pub fn transform_filtering(&self) -> Value {
        if self.is_empty() {
            json!({"advanced_snippet": {}, "rules": []})
        } else {
            Value::Object(self.raw.clone())
        }
    }
}

/// The set of per-domain filter bundles attached to a Connector (§3, §4.4).
#[derive(Debug, Clone, Default)]
pub struct Filtering {
    bundles: Vec<FilterBundle>,
}

impl Filtering {
    pub fn from_value(value: Option<&Value>) -> Self {
        let bundles = match value {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| {
                    let Value::Object(map) = item else {
                        return None;
                    };
                    let domain = map.get("domain")?.as_str()?.to_string();
                    Some(FilterBundle {
                        domain,
                        raw: map.clone(),
                    })
                })
                .collect(),
            _ => Vec::new(),
        };
        Self { bundles }
    }

    /// Returns the first bundle's `state` slot whose domain matches, or an
    /// empty [`Filter`] if none matches (§4.4, §8).
    pub fn get_filter(&self, state: FilterState, domain: &str) -> Filter {
        self.bundles
            .iter()
            .find(|bundle| bundle.domain == domain)
            .map(|bundle| bundle.slot(state))
            .unwrap_or_default()
    }

    pub fn get_active_filter(&self, domain: &str) -> Filter {
        self.get_filter(FilterState::Active, domain)
    }

    pub fn get_draft_filter(&self, domain: &str) -> Filter {
        self.get_filter(FilterState::Draft, domain)
    }

    pub fn to_value(&self) -> Value {
        Value::Array(
            self.bundles
                .iter()
                .map(|bundle| Value::Object(bundle.raw.clone()))
                .collect(),
        )
    }

    /// Promotes `draft` into `active` for the matching domain bundle and
    /// records the validation verdict on the draft slot (used by
    /// `Connector::validate_filtering`, §4.2).
    pub fn apply_validation(
        &mut self,
        domain: &str,
        state: FilteringValidationState,
        errors: Vec<String>,
    ) {
        for bundle in &mut self.bundles {
            if bundle.domain != domain {
                continue;
            }
            let mut draft = Filter::from_value(bundle.raw.get("draft").cloned());
            draft.set_validation(state, errors.clone());
            bundle.raw.insert("draft".to_string(), draft.clone().into_value());
            if state == FilteringValidationState::Valid {
                bundle.raw.insert("active".to_string(), draft.into_value());
            }
        }
    }
}
