//! In-process override resolver: explicit `provider/model` limits set by config.

use std::collections::HashMap;

use async_trait::async_trait;

use super::resolver::ModelLimitResolver;
use super::spec::ModelSpec;

/// Resolves limits from a fixed `provider/model -> ModelSpec` map, built from
/// user configuration rather than a network or on-disk source. Meant to sit
/// first in a [`CompositeResolver`](super::CompositeResolver) chain so an
/// operator override always wins.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverride {
    overrides: HashMap<String, ModelSpec>,
}

impl ConfigOverride {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_override(
        mut self,
        provider_id: impl Into<String>,
        model_id: impl Into<String>,
        spec: ModelSpec,
    ) -> Self {
        self.overrides
            .insert(format!("{}/{}", provider_id.into(), model_id.into()), spec);
        self
    }
}

#[async_trait]
impl ModelLimitResolver for ConfigOverride {
    async fn resolve(&self, provider_id: &str, model_id: &str) -> Option<ModelSpec> {
        self.overrides
            .get(&format!("{provider_id}/{model_id}"))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_configured_override() {
        let resolver = ConfigOverride::new().with_override(
            "openai",
            "gpt-5",
            ModelSpec::new(400_000, 64_000),
        );
        let spec = resolver.resolve("openai", "gpt-5").await.unwrap();
        assert_eq!(spec.context_limit, 400_000);
    }

    #[tokio::test]
    async fn returns_none_for_unknown_model() {
        let resolver = ConfigOverride::new();
        assert!(resolver.resolve("openai", "gpt-5").await.is_none());
    }
}
