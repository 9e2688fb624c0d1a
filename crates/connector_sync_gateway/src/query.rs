use std::sync::Arc;

use crate::Document;

/// A predicate over documents in one index. The transport-level translation
/// into whatever query DSL the real cluster speaks (bool queries, SQL,
/// whatever) is a wire-layer concern and out of scope (§1); what matters to
/// the core is the four named shapes in §6, built with the constructors
/// below.
#[derive(Clone)]
pub struct Query {
    description: String,
    predicate: Arc<dyn Fn(&Document) -> bool + Send + Sync>,
}

impl Query {
    pub fn new(
        description: impl Into<String>,
        predicate: impl Fn(&Document) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            description: description.into(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        (self.predicate)(doc)
    }

    pub fn all() -> Self {
        Self::new("all documents", |_| true)
    }
}

impl std::fmt::Debug for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Query({})", self.description)
    }
}
