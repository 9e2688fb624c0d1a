use serde_json::Value;

/// Legacy-first feature lookup over a Connector's `features` mapping (§4.5).
#[derive(Debug, Clone, Default)]
pub struct Features {
    raw: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    BasicRulesNew,
    AdvancedRulesNew,
    BasicRulesOld,
    AdvancedRulesOld,
}

impl Features {
    pub fn from_value(value: Option<Value>) -> Self {
        Self {
            raw: value.unwrap_or(Value::Null),
        }
    }

    /// OR over the four legacy+new nested lookups; an unknown feature name
    /// returns `false` (§4.5, §8).
    pub fn sync_rules_enabled(&self) -> bool {
        [
            Feature::BasicRulesNew,
            Feature::BasicRulesOld,
            Feature::AdvancedRulesNew,
            Feature::AdvancedRulesOld,
        ]
        .into_iter()
        .any(|f| self.feature_enabled(f))
    }

    pub fn feature_enabled(&self, feature: Feature) -> bool {
        match feature {
            Feature::BasicRulesNew => self.nested_bool(&["sync_rules", "basic", "enabled"]),
            Feature::AdvancedRulesNew => self.nested_bool(&["sync_rules", "advanced", "enabled"]),
            Feature::BasicRulesOld => self.nested_bool(&["filtering_rules"]),
            Feature::AdvancedRulesOld => self.nested_bool(&["filtering_advanced_config"]),
        }
    }

    fn nested_bool(&self, keys: &[&str]) -> bool {
        let mut current = &self.raw;
        for key in keys {
            match current.get(key) {
                Some(next) => current = next,
                None => return false,
            }
        }
        current.as_bool().unwrap_or(false)
    }
}
