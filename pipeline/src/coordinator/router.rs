//! Maps a [`ModelProfile`] to the [`LlmClient`] that should run it.
//!
//! Real deployments wire distinct models per tier (e.g. a small model for
//! `light` triage, a frontier model for `primary` drafting); tests and single
//! model deployments can use [`SingleModelRouter`] to route every profile to
//! one client.

use std::collections::HashMap;
use std::sync::Arc;

use crate::llm::LlmClient;
use crate::stage::ModelProfile;

/// Resolves the [`LlmClient`] backing a given [`ModelProfile`].
pub trait ModelRouter: Send + Sync {
    fn llm_for(&self, profile: ModelProfile) -> &dyn LlmClient;
}

/// Routes every profile to the same client.
pub struct SingleModelRouter {
    client: Arc<dyn LlmClient>,
}

impl SingleModelRouter {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }
}

impl ModelRouter for SingleModelRouter {
    fn llm_for(&self, _profile: ModelProfile) -> &dyn LlmClient {
        self.client.as_ref()
    }
}

/// Routes each profile to its own client, falling back to an explicit
/// default for any profile that wasn't registered.
pub struct ProfileModelRouter {
    by_profile: HashMap<ModelProfile, Arc<dyn LlmClient>>,
    default: Arc<dyn LlmClient>,
}

impl ProfileModelRouter {
    pub fn new(default: Arc<dyn LlmClient>) -> Self {
        Self {
            by_profile: HashMap::new(),
            default,
        }
    }

    pub fn with_profile(mut self, profile: ModelProfile, client: Arc<dyn LlmClient>) -> Self {
        self.by_profile.insert(profile, client);
        self
    }
}

impl ModelRouter for ProfileModelRouter {
    fn llm_for(&self, profile: ModelProfile) -> &dyn LlmClient {
        self.by_profile
            .get(&profile)
            .unwrap_or(&self.default)
            .as_ref()
    }
}
