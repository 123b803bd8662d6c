//! Store: cross-session key-value memory isolated by namespace.
//!
//! Backed by [`InMemoryStore`](crate::memory::InMemoryStore) or
//! [`SqliteStore`](crate::memory::SqliteStore). Namespaces are path-like
//! (`["user-123", "memories"]`); search is currently string containment,
//! not vector similarity.

use std::time::SystemTime;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Path-like namespace for isolating stored items (e.g. `[user_id, "memories"]`).
pub type Namespace = Vec<String>;

/// Errors from a `Store` implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key not found")]
    NotFound,
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("embedding error: {0}")]
    EmbeddingError(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// One stored value with its namespace, key, and timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub namespace: Namespace,
    pub key: String,
    pub value: serde_json::Value,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

impl Item {
    pub fn with_timestamps(
        namespace: Namespace,
        key: String,
        value: serde_json::Value,
        created_at: SystemTime,
        updated_at: SystemTime,
    ) -> Self {
        Self {
            namespace,
            key,
            value,
            created_at,
            updated_at,
        }
    }
}

/// An `Item` returned from `search`, optionally scored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchItem {
    pub item: Item,
    pub score: Option<f32>,
}

impl SearchItem {
    pub fn from_item(item: Item) -> Self {
        Self { item, score: None }
    }

    pub fn with_score(item: Item, score: f32) -> Self {
        Self {
            item,
            score: Some(score),
        }
    }
}

/// A flattened search hit (key/value/score), used by `search_simple`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSearchHit {
    pub key: String,
    pub value: serde_json::Value,
    pub score: Option<f32>,
}

/// Equality/ordering filter applied to a field's value during `search`.
#[derive(Debug, Clone)]
pub enum FilterOp {
    Eq(serde_json::Value),
    Ne(serde_json::Value),
    Gt(serde_json::Value),
    Gte(serde_json::Value),
    Lt(serde_json::Value),
    Lte(serde_json::Value),
}

/// Options for `Store::search`.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub query: Option<String>,
    pub filter: Option<std::collections::HashMap<String, FilterOp>>,
    pub limit: usize,
    pub offset: usize,
}

impl SearchOptions {
    pub fn new() -> Self {
        Self {
            query: None,
            filter: None,
            limit: 10,
            offset: 0,
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

/// Namespace match type for `ListNamespacesOptions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceMatchType {
    Prefix,
    Suffix,
}

/// One namespace match condition.
#[derive(Debug, Clone)]
pub struct MatchCondition {
    pub match_type: NamespaceMatchType,
    pub path: Vec<String>,
}

impl MatchCondition {
    pub fn prefix(path: Vec<String>) -> Self {
        Self {
            match_type: NamespaceMatchType::Prefix,
            path,
        }
    }

    pub fn suffix(path: Vec<String>) -> Self {
        Self {
            match_type: NamespaceMatchType::Suffix,
            path,
        }
    }
}

/// Options for `Store::list_namespaces`.
#[derive(Debug, Clone, Default)]
pub struct ListNamespacesOptions {
    pub match_conditions: Vec<MatchCondition>,
    pub max_depth: Option<usize>,
    pub limit: usize,
    pub offset: usize,
}

impl ListNamespacesOptions {
    pub fn new() -> Self {
        Self {
            match_conditions: Vec::new(),
            max_depth: None,
            limit: 100,
            offset: 0,
        }
    }

    pub fn with_prefix(mut self, path: Vec<String>) -> Self {
        self.match_conditions.push(MatchCondition::prefix(path));
        self
    }

    pub fn with_suffix(mut self, path: Vec<String>) -> Self {
        self.match_conditions.push(MatchCondition::suffix(path));
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }
}

/// One operation in a `Store::batch` call.
#[derive(Debug, Clone)]
pub enum StoreOp {
    Get {
        namespace: Namespace,
        key: String,
    },
    /// `value: None` deletes the key.
    Put {
        namespace: Namespace,
        key: String,
        value: Option<serde_json::Value>,
    },
    Search {
        namespace_prefix: Namespace,
        options: SearchOptions,
    },
    ListNamespaces {
        options: ListNamespacesOptions,
    },
}

/// The result of one `StoreOp`, matched positionally to the request.
#[derive(Debug, Clone)]
pub enum StoreOpResult {
    Get(Option<Item>),
    Put,
    Search(Vec<SearchItem>),
    ListNamespaces(Vec<Namespace>),
}

/// Cross-session key-value store isolated by [`Namespace`].
///
/// Implementations: [`InMemoryStore`](crate::memory::InMemoryStore) (dev/test),
/// [`SqliteStore`](crate::memory::SqliteStore) (single-node, durable).
#[async_trait]
pub trait Store: Send + Sync {
    async fn put(
        &self,
        namespace: &Namespace,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), StoreError>;

    async fn get(
        &self,
        namespace: &Namespace,
        key: &str,
    ) -> Result<Option<serde_json::Value>, StoreError>;

    async fn get_item(&self, namespace: &Namespace, key: &str) -> Result<Option<Item>, StoreError>;

    async fn delete(&self, namespace: &Namespace, key: &str) -> Result<(), StoreError>;

    async fn list(&self, namespace: &Namespace) -> Result<Vec<String>, StoreError>;

    async fn search(
        &self,
        namespace_prefix: &Namespace,
        options: SearchOptions,
    ) -> Result<Vec<SearchItem>, StoreError>;

    async fn list_namespaces(
        &self,
        options: ListNamespacesOptions,
    ) -> Result<Vec<Namespace>, StoreError>;

    async fn batch(&self, ops: Vec<StoreOp>) -> Result<Vec<StoreOpResult>, StoreError>;

    async fn search_simple(
        &self,
        namespace: &Namespace,
        query: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<StoreSearchHit>, StoreError> {
        let options = SearchOptions {
            query: query.map(String::from),
            filter: None,
            limit: limit.unwrap_or(10),
            offset: 0,
        };
        let results = self.search(namespace, options).await?;
        Ok(results
            .into_iter()
            .map(|si| StoreSearchHit {
                key: si.item.key,
                value: si.item.value,
                score: si.score,
            })
            .collect())
    }
}
