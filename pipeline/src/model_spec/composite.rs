//! Composite resolver: tries each inner resolver in order, returns the first hit.

use async_trait::async_trait;

use super::resolver::ModelLimitResolver;
use super::spec::ModelSpec;

/// Tries each resolver in order and returns the first `Some`.
///
/// Typical ordering: a fast local override first, then a cached network
/// resolver, so a user-configured limit always wins over the fetched one.
pub struct CompositeResolver {
    resolvers: Vec<Box<dyn ModelLimitResolver>>,
}

impl CompositeResolver {
    pub fn new(resolvers: Vec<Box<dyn ModelLimitResolver>>) -> Self {
        Self { resolvers }
    }
}

#[async_trait]
impl ModelLimitResolver for CompositeResolver {
    async fn resolve(&self, provider_id: &str, model_id: &str) -> Option<ModelSpec> {
        for resolver in &self.resolvers {
            if let Some(spec) = resolver.resolve(provider_id, model_id).await {
                return Some(spec);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Option<ModelSpec>);

    #[async_trait]
    impl ModelLimitResolver for Fixed {
        async fn resolve(&self, _provider_id: &str, _model_id: &str) -> Option<ModelSpec> {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn returns_first_hit() {
        let composite = CompositeResolver::new(vec![
            Box::new(Fixed(None)),
            Box::new(Fixed(Some(ModelSpec::new(1000, 100)))),
            Box::new(Fixed(Some(ModelSpec::new(2000, 200)))),
        ]);
        let spec = composite.resolve("p", "m").await.unwrap();
        assert_eq!(spec.context_limit, 1000);
    }

    #[tokio::test]
    async fn returns_none_when_all_miss() {
        let composite = CompositeResolver::new(vec![Box::new(Fixed(None)), Box::new(Fixed(None))]);
        assert!(composite.resolve("p", "m").await.is_none());
    }
}
