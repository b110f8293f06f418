//! Per-subject permission documents.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Everything one subject may (or may not) do.
///
/// Documents are computed wholesale by the subject store, cached under
/// `authz:<subject>` and never patched in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDocument {
    /// Grants keyed by `"<action>:<resource>"`.
    #[serde(default)]
    pub permissions: BTreeMap<String, PermissionGrant>,
}

impl PermissionDocument {
    /// Creates an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a document from grants. Later grants for the same descriptor
    /// can only narrow: a deny is never overwritten by an allow.
    #[must_use]
    pub fn from_grants(grants: impl IntoIterator<Item = PermissionGrant>) -> Self {
        let mut doc = Self::new();
        for grant in grants {
            doc.insert(grant);
        }
        doc
    }

    /// Adds a grant, keeping an existing deny for the same descriptor.
    pub fn insert(&mut self, grant: PermissionGrant) {
        let key = grant.descriptor();
        match self.permissions.get_mut(&key) {
            Some(existing) => {
                existing.allowed &= grant.allowed;
                existing.metadata.extend(grant.metadata);
            }
            None => {
                self.permissions.insert(key, grant);
            }
        }
    }

    /// Returns `true` if the document holds no grants.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }

    /// Number of grants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    /// Iterates over grants in descriptor order.
    pub fn grants(&self) -> impl Iterator<Item = &PermissionGrant> {
        self.permissions.values()
    }
}

/// A single action on a resource path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    /// Action name, or `*` for any action.
    pub action: String,

    /// Resource path in catalog form, e.g. `/users/{user_id}`.
    pub resource: String,

    /// `false` records an explicit deny.
    pub allowed: bool,

    /// Free-form attributes carried from the policy.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl PermissionGrant {
    /// Creates an allowing grant.
    #[must_use]
    pub fn allow(action: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            resource: resource.into(),
            allowed: true,
            metadata: BTreeMap::new(),
        }
    }

    /// Creates an explicit deny.
    #[must_use]
    pub fn deny(action: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            allowed: false,
            ..Self::allow(action, resource)
        }
    }

    /// Attaches a metadata attribute.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Descriptor key `"<action>:<resource>"`.
    #[must_use]
    pub fn descriptor(&self) -> String {
        format!("{}:{}", self.action, self.resource)
    }

    /// Returns `true` if this grant names `action` or any action.
    #[must_use]
    pub fn covers_action(&self, action: &str) -> bool {
        self.action == "*" || self.action == action
    }
}
