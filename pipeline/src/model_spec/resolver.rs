//! `ModelLimitResolver`: the trait every model-limit source implements.

use async_trait::async_trait;

use super::spec::ModelSpec;

/// Resolves a model's token limits given a provider and model id.
///
/// Implementations: [`ModelsDevResolver`](super::ModelsDevResolver) (network),
/// [`LocalFileResolver`](super::LocalFileResolver) (on-disk overrides),
/// [`CachedResolver`](super::CachedResolver) (in-memory cache wrapper),
/// [`CompositeResolver`](super::CompositeResolver) (ordered fallback chain).
#[async_trait]
pub trait ModelLimitResolver: Send + Sync {
    async fn resolve(&self, provider_id: &str, model_id: &str) -> Option<ModelSpec>;
}
