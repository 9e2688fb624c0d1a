use std::{
    collections::HashMap,
    sync::Arc,
};

use connector_sync_model::{
    Configuration,
    Connector,
};
use connector_sync_source::{
    FilteringValidator,
    SourceAdapter,
};

/// Stands in for the deployment-level service registry `byoc.py`'s
/// `prepare()` consults (`config["sources"]` mapping service type to an
/// importable adapter class, plus `get_source_klass`). Out of scope per §1
/// is *how* an adapter talks to its upstream; in scope is this lookup
/// surface, since `prepare()`/the tick loop genuinely needs one to
/// construct an adapter and a filtering validator per connector.
pub trait ConnectorServices: Send + Sync {
    fn default_configuration(&self, service_type: &str) -> Option<Configuration>;
    fn adapter(&self, connector: &Connector) -> anyhow::Result<Arc<dyn SourceAdapter>>;
    fn validator(&self, connector: &Connector) -> Arc<dyn FilteringValidator>;
}

/// A registry keyed by service type, backed by caller-supplied factories.
/// Good enough for wiring a concrete deployment (each service type maps to
/// one real adapter implementation) and for tests.
pub struct StaticServiceRegistry {
    configurations: HashMap<String, Configuration>,
    adapters: HashMap<String, Arc<dyn Fn(&Connector) -> Arc<dyn SourceAdapter> + Send + Sync>>,
    validators: HashMap<String, Arc<dyn FilteringValidator>>,
    default_validator: Arc<dyn FilteringValidator>,
}

impl StaticServiceRegistry {
    pub fn new(default_validator: Arc<dyn FilteringValidator>) -> Self {
        Self {
            configurations: HashMap::new(),
            adapters: HashMap::new(),
            validators: HashMap::new(),
            default_validator,
        }
    }

    pub fn register(
        mut self,
        service_type: impl Into<String>,
        default_configuration: Configuration,
        adapter_factory: impl Fn(&Connector) -> Arc<dyn SourceAdapter> + Send + Sync + 'static,
    ) -> Self {
        let service_type = service_type.into();
        self.configurations.insert(service_type.clone(), default_configuration);
        self.adapters.insert(service_type, Arc::new(adapter_factory));
        self
    }

    pub fn with_validator(mut self, service_type: impl Into<String>, validator: Arc<dyn FilteringValidator>) -> Self {
        self.validators.insert(service_type.into(), validator);
        self
    }
}

impl ConnectorServices for StaticServiceRegistry {
    fn default_configuration(&self, service_type: &str) -> Option<Configuration> {
        self.configurations.get(service_type).cloned()
    }

    fn adapter(&self, connector: &Connector) -> anyhow::Result<Arc<dyn SourceAdapter>> {
        let service_type = connector
            .service_type()
            .ok_or_else(|| anyhow::anyhow!("connector {} has no service_type", connector.id))?;
        let factory = self
            .adapters
            .get(service_type)
            .ok_or_else(|| anyhow::anyhow!("no adapter registered for service type `{service_type}`"))?;
        Ok(factory(connector))
    }

    fn validator(&self, connector: &Connector) -> Arc<dyn FilteringValidator> {
        match connector.service_type() {
            Some(service_type) => self.validators.get(service_type).cloned().unwrap_or_else(|| self.default_validator.clone()),
            None => self.default_validator.clone(),
        }
    }
}
