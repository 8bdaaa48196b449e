//! Optional external classification hook. A collaborator (for example a
//! local ML service) can be plugged in; when it is absent or failing the rule
//! set always decides, so classification can never fail a session.

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use super::{Category, CategoryRuleSet};

/// Contract for an out-of-process classifier. Implementations are expected
/// to answer with one of the known category names.
#[async_trait]
pub trait ExternalClassifier: Send + Sync {
    async fn classify(&self, label: &str) -> Result<String>;
}

/// Combines the rule set with an optional [ExternalClassifier].
pub struct Categorizer {
    rules: CategoryRuleSet,
    external: Option<Box<dyn ExternalClassifier>>,
}

impl Categorizer {
    pub fn new(rules: CategoryRuleSet) -> Self {
        Self {
            rules,
            external: None,
        }
    }

    pub fn with_external(rules: CategoryRuleSet, external: Box<dyn ExternalClassifier>) -> Self {
        Self {
            rules,
            external: Some(external),
        }
    }

    pub fn replace_rules(&mut self, rules: CategoryRuleSet) {
        self.rules = rules;
    }

    /// Resolves a category for a label. The external hook is consulted
    /// first; an error, or an answer that is not a known category, falls
    /// back to the rules.
    pub async fn resolve(&self, label: &str) -> Category {
        if let Some(external) = &self.external {
            match external.classify(label).await {
                Ok(name) => {
                    if let Some(category) = Category::from_name(&name) {
                        return category;
                    }
                    debug!("External classifier returned unknown category {name:?}");
                }
                Err(e) => {
                    debug!("External classifier unavailable, using rules: {e:?}");
                }
            }
        }
        self.rules.classify(label)
    }
}
