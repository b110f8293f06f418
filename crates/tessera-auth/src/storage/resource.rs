//! Resource catalog storage trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AuthResult;

/// Default page size for catalog reads.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Largest page size a caller may request.
pub const MAX_PAGE_SIZE: u32 = 500;

/// A catalog entry: an action on a path template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Canonical identifier.
    pub id: Uuid,

    /// Action name, e.g. `read`.
    pub action: String,

    /// Path template, e.g. `/users/{user_id}`.
    pub path: String,

    /// Human description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Catalog query filter.
///
/// `pattern` values are anchored regular expressions matched against
/// [`Resource::path`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceFilter {
    /// Every resource.
    All,
    /// Resources with this exact action.
    Action {
        /// Action name.
        action: String,
    },
    /// Resources whose path matches `pattern`.
    Path {
        /// Anchored regex.
        pattern: String,
    },
    /// Resources with this action whose path matches `pattern`.
    ActionAndPath {
        /// Action name.
        action: String,
        /// Anchored regex.
        pattern: String,
    },
}

/// Offset pagination with a clamped page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paginator {
    offset: u64,
    limit: u32,
}

impl Paginator {
    /// Creates a paginator; `limit` is clamped to `1..=MAX_PAGE_SIZE`.
    #[must_use]
    pub fn new(offset: u64, limit: u32) -> Self {
        Self {
            offset,
            limit: limit.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// The largest page, starting at the beginning.
    #[must_use]
    pub fn max_page() -> Self {
        Self::new(0, MAX_PAGE_SIZE)
    }

    /// Number of items to skip.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Page size.
    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit
    }
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(0, DEFAULT_PAGE_SIZE)
    }
}

/// Read access to the resource catalog.
#[async_trait]
pub trait ResourceCatalog: Send + Sync {
    /// Selects resources matching `filter`, ordered by path then action.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if a filter pattern is not a valid regex,
    /// `Dependency` if the storage operation fails.
    async fn select(&self, filter: &ResourceFilter, page: &Paginator) -> AuthResult<Vec<Resource>>;

    /// Find a resource by ID. Returns `None` if it doesn't exist.
    async fn find_by_id(&self, id: &Uuid) -> AuthResult<Option<Resource>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paginator_clamps_limit() {
        assert_eq!(Paginator::new(0, 0).limit(), 1);
        assert_eq!(Paginator::new(0, 10_000).limit(), MAX_PAGE_SIZE);
        assert_eq!(Paginator::new(20, 30).offset(), 20);
        assert_eq!(Paginator::default().limit(), DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_filter_serializes_tagged() {
        let json = serde_json::to_string(&ResourceFilter::Action {
            action: "read".into(),
        })
        .unwrap();
        assert_eq!(json, r#"{"kind":"action","action":"read"}"#);
    }
}
