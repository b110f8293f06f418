//! Resource catalog reads and action/path matching.
//!
//! [`ResourceDirectory::list_matches`] turns a human-given `action` and
//! `path` (which may contain `*` or UUID segments) into a catalog filter:
//!
//! | action | path      | filter                         |
//! |--------|-----------|--------------------------------|
//! | `*`    | `*`       | everything                     |
//! | `*`    | a path    | path pattern only              |
//! | name   | a path    | action and path pattern        |
//! | name   | `*`       | action only                    |

use std::sync::Arc;
use std::time::Duration;

use tracing::instrument;
use uuid::Uuid;

use super::pattern;
use crate::AuthResult;
use crate::cache::{CacheAside, Json, MessagePack, keys};
use crate::context::OperationContext;
use crate::error::AuthError;
use crate::storage::{Paginator, Resource, ResourceCatalog, ResourceFilter};
use crate::telemetry::{DynTelemetry, observe};

/// Default TTL for cached catalog reads.
pub const DEFAULT_RESOURCE_TTL: Duration = Duration::from_secs(300);

const WILDCARD: &str = "*";

/// Builds the catalog filter for an action/path pair.
#[must_use]
pub fn match_filter(action: &str, path: &str) -> ResourceFilter {
    match (action == WILDCARD, path == WILDCARD) {
        (true, true) => ResourceFilter::All,
        (true, false) => ResourceFilter::Path {
            pattern: pattern::normalize(path),
        },
        (false, false) => ResourceFilter::ActionAndPath {
            action: action.to_string(),
            pattern: pattern::normalize(path),
        },
        (false, true) => ResourceFilter::Action {
            action: action.to_string(),
        },
    }
}

/// Cached, read-only view of the resource catalog.
pub struct ResourceDirectory {
    catalog: Arc<dyn ResourceCatalog>,
    cache: Option<CacheAside>,
    resource_ttl: Duration,
    telemetry: DynTelemetry,
}

#[derive(serde::Serialize)]
struct ListQuery<'a> {
    filter: &'a ResourceFilter,
    page: &'a Paginator,
}

impl ResourceDirectory {
    /// Creates a directory reading straight from `catalog`.
    #[must_use]
    pub fn new(catalog: Arc<dyn ResourceCatalog>, telemetry: DynTelemetry) -> Self {
        Self {
            catalog,
            cache: None,
            resource_ttl: DEFAULT_RESOURCE_TTL,
            telemetry,
        }
    }

    /// Serves `get_resource` and `list_resources` through `cache`.
    #[must_use]
    pub fn with_cache(mut self, cache: CacheAside, ttl: Duration) -> Self {
        self.cache = Some(cache);
        self.resource_ttl = ttl;
        self
    }

    /// Loads one resource.
    ///
    /// # Errors
    /// `NotFound` when no resource has this ID.
    #[instrument(skip(self, ctx))]
    pub async fn get_resource(&self, ctx: &OperationContext, id: &Uuid) -> AuthResult<Resource> {
        let catalog = &self.catalog;
        let load = move || async move {
            catalog
                .find_by_id(id)
                .await?
                .ok_or_else(|| AuthError::not_found("resource"))
        };
        let result = match &self.cache {
            Some(cache) => {
                cache
                    .fetch(ctx, &keys::resource_key(id), &Json, self.resource_ttl, load)
                    .await
            }
            None => ctx.run(load()).await.and_then(|r| r),
        };
        observe(self.telemetry.as_ref(), "get_resource", result)
    }

    /// Lists resources matching `filter`.
    #[instrument(skip(self, ctx))]
    pub async fn list_resources(
        &self,
        ctx: &OperationContext,
        filter: &ResourceFilter,
        page: &Paginator,
    ) -> AuthResult<Vec<Resource>> {
        let catalog = &self.catalog;
        let load = move || async move { catalog.select(filter, page).await };
        let result = match &self.cache {
            Some(cache) => {
                let key = keys::resources_key(&ListQuery { filter, page })
                    .map_err(|e| AuthError::internal(e.to_string()))?;
                cache
                    .fetch(ctx, &key, &MessagePack, self.resource_ttl, load)
                    .await
            }
            None => ctx.run(load()).await.and_then(|r| r),
        };
        observe(self.telemetry.as_ref(), "list_resources", result)
    }

    /// Catalog entries matching a human-given action and path.
    ///
    /// Always reads the catalog directly so ID resolution never sees a
    /// stale list.
    #[instrument(skip(self, ctx))]
    pub async fn list_matches(
        &self,
        ctx: &OperationContext,
        action: &str,
        path: &str,
        page: &Paginator,
    ) -> AuthResult<Vec<Resource>> {
        let filter = match_filter(action, path);
        let result = ctx
            .run(self.catalog.select(&filter, page))
            .await
            .and_then(|r| r);
        observe(self.telemetry.as_ref(), "list_matches", result)
    }

    /// Resolves an action/path pair to exactly one catalog resource ID.
    ///
    /// # Errors
    /// - `NotFound` when nothing matches.
    /// - `AmbiguousResource` when more than one distinct resource matches.
    #[instrument(skip(self, ctx))]
    pub async fn resolve_resource_id(
        &self,
        ctx: &OperationContext,
        action: &str,
        path: &str,
    ) -> AuthResult<Uuid> {
        let matches = self
            .list_matches(ctx, action, path, &Paginator::max_page())
            .await?;

        let mut ids: Vec<Uuid> = matches.iter().map(|r| r.id).collect();
        ids.sort_unstable();
        ids.dedup();

        let result = match ids.as_slice() {
            [] => Err(AuthError::not_found("resource")),
            [id] => Ok(*id),
            many => Err(AuthError::AmbiguousResource {
                matches: many.len(),
            }),
        };
        observe(self.telemetry.as_ref(), "resolve_resource_id", result)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use regex::Regex;

    use super::*;
    use crate::cache::{DEFAULT_QUERY_TIMEOUT, LocalStore};
    use crate::testutil::RecordingTelemetry;

    const USER: &str = "3f0c8d4e-2b7a-4c1e-9f6d-0a1b2c3d4e5f";

    struct Catalog {
        items: Vec<Resource>,
        selects: AtomicUsize,
        finds: AtomicUsize,
    }

    fn resource(action: &str, path: &str) -> Resource {
        Resource {
            id: Uuid::new_v4(),
            action: action.into(),
            path: path.into(),
            description: None,
        }
    }

    impl Catalog {
        fn sample() -> Self {
            Self {
                items: vec![
                    resource("read", "/users/{user_id}"),
                    resource("write", "/users/{user_id}"),
                    resource("read", "/users"),
                    resource("read", "/reports/{report_id}"),
                ],
                selects: AtomicUsize::new(0),
                finds: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ResourceCatalog for Catalog {
        async fn select(&self, filter: &ResourceFilter, page: &Paginator) -> AuthResult<Vec<Resource>> {
            self.selects.fetch_add(1, Ordering::SeqCst);
            let path_re = |p: &str| Regex::new(p).map_err(|e| AuthError::validation(e.to_string()));
            let keep: Box<dyn Fn(&Resource) -> bool> = match filter {
                ResourceFilter::All => Box::new(|_| true),
                ResourceFilter::Action { action } => {
                    let action = action.clone();
                    Box::new(move |r| r.action == action)
                }
                ResourceFilter::Path { pattern } => {
                    let re = path_re(pattern)?;
                    Box::new(move |r| re.is_match(&r.path))
                }
                ResourceFilter::ActionAndPath { action, pattern } => {
                    let re = path_re(pattern)?;
                    let action = action.clone();
                    Box::new(move |r| r.action == action && re.is_match(&r.path))
                }
            };
            Ok(self
                .items
                .iter()
                .filter(|r| keep(*r))
                .skip(page.offset() as usize)
                .take(page.limit() as usize)
                .cloned()
                .collect())
        }

        async fn find_by_id(&self, id: &Uuid) -> AuthResult<Option<Resource>> {
            self.finds.fetch_add(1, Ordering::SeqCst);
            Ok(self.items.iter().find(|r| &r.id == id).cloned())
        }
    }

    fn directory(cached: bool) -> (ResourceDirectory, Arc<Catalog>) {
        let catalog = Arc::new(Catalog::sample());
        let telemetry = Arc::new(RecordingTelemetry::default());
        let mut directory = ResourceDirectory::new(catalog.clone(), telemetry.clone());
        if cached {
            let cache = CacheAside::new(Arc::new(LocalStore::new()), telemetry, DEFAULT_QUERY_TIMEOUT);
            directory = directory.with_cache(cache, DEFAULT_RESOURCE_TTL);
        }
        (directory, catalog)
    }

    #[test]
    fn test_match_filter_cases() {
        assert_eq!(match_filter("*", "*"), ResourceFilter::All);
        assert_eq!(
            match_filter("*", "/users/*"),
            ResourceFilter::Path {
                pattern: r"^/users/\{[a-z_]{1,50}\}$".into()
            }
        );
        assert_eq!(
            match_filter("read", "/users"),
            ResourceFilter::ActionAndPath {
                action: "read".into(),
                pattern: "^/users$".into()
            }
        );
        assert_eq!(
            match_filter("read", "*"),
            ResourceFilter::Action {
                action: "read".into()
            }
        );
    }

    #[tokio::test]
    async fn test_list_matches() {
        let (directory, _) = directory(false);
        let ctx = OperationContext::new();
        let page = Paginator::default();

        assert_eq!(directory.list_matches(&ctx, "*", "*", &page).await.unwrap().len(), 4);
        assert_eq!(
            directory
                .list_matches(&ctx, "*", &format!("/users/{USER}"), &page)
                .await
                .unwrap()
                .len(),
            2
        );
        assert_eq!(directory.list_matches(&ctx, "read", "*", &page).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_resolve_unique_match() {
        let (directory, catalog) = directory(false);
        let ctx = OperationContext::new();
        let id = directory
            .resolve_resource_id(&ctx, "write", "/users/*")
            .await
            .unwrap();
        assert_eq!(id, catalog.items[1].id);
    }

    #[tokio::test]
    async fn test_resolve_no_match() {
        let (directory, _) = directory(false);
        let result = directory
            .resolve_resource_id(&OperationContext::new(), "delete", "/users/*")
            .await;
        assert!(matches!(result, Err(AuthError::NotFound { entity: "resource" })));
    }

    #[tokio::test]
    async fn test_resolve_ambiguous() {
        let (directory, _) = directory(false);
        let result = directory
            .resolve_resource_id(&OperationContext::new(), "*", "/users/*")
            .await;
        assert!(matches!(result, Err(AuthError::AmbiguousResource { matches: 2 })));
    }

    #[tokio::test]
    async fn test_get_resource_cached() {
        let (directory, catalog) = directory(true);
        let ctx = OperationContext::new();
        let id = catalog.items[0].id;

        for _ in 0..2 {
            let found = directory.get_resource(&ctx, &id).await.unwrap();
            assert_eq!(found.path, "/users/{user_id}");
        }
        assert_eq!(catalog.finds.load(Ordering::SeqCst), 1);

        let missing = directory.get_resource(&ctx, &Uuid::new_v4()).await;
        assert!(matches!(missing, Err(AuthError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_list_resources_cached_per_query() {
        let (directory, catalog) = directory(true);
        let ctx = OperationContext::new();
        let filter = ResourceFilter::Action {
            action: "read".into(),
        };

        let first = directory
            .list_resources(&ctx, &filter, &Paginator::new(0, 2))
            .await
            .unwrap();
        let again = directory
            .list_resources(&ctx, &filter, &Paginator::new(0, 2))
            .await
            .unwrap();
        let next_page = directory
            .list_resources(&ctx, &filter, &Paginator::new(2, 2))
            .await
            .unwrap();

        assert_eq!(first, again);
        assert_eq!(first.len(), 2);
        assert_eq!(next_page.len(), 1);
        assert_eq!(catalog.selects.load(Ordering::SeqCst), 2);
    }
}
