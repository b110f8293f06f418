use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use regex::Regex;
use tessera_auth::AuthResult;
use tessera_auth::authz::{PermissionDocument, PermissionGrant};
use tessera_auth::error::AuthError;
use tessera_auth::storage::{
    AccessStore, NewSubject, Paginator, Policy, Resource, ResourceCatalog, ResourceFilter, Subject,
    SubjectStore, SubjectUpdate,
};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Role links, kept together so permission documents see a consistent view.
#[derive(Debug, Default)]
struct Links {
    /// (role, policy id)
    role_policies: BTreeSet<(String, Uuid)>,
    /// (subject id, role)
    subject_roles: BTreeSet<(String, String)>,
}

/// In-memory subject store, resource catalog and access-link store.
///
/// All three traits are served by one value so permission documents can be
/// computed from the same data the admin operations mutate.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    subjects: DashMap<Uuid, Subject>,
    /// email -> subject id, the uniqueness index
    emails: DashMap<String, Uuid>,
    resources: DashMap<Uuid, Resource>,
    policies: DashMap<Uuid, Policy>,
    /// policy name -> policy id, the uniqueness index
    policy_names: DashMap<String, Uuid>,
    links: RwLock<Links>,
    offline: AtomicBool,
    document_loads: AtomicUsize,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a catalog entry.
    pub fn add_resource(
        &self,
        action: impl Into<String>,
        path: impl Into<String>,
        description: Option<&str>,
    ) -> Resource {
        let resource = Resource {
            id: Uuid::new_v4(),
            action: action.into(),
            path: path.into(),
            description: description.map(str::to_string),
        };
        self.resources.insert(resource.id, resource.clone());
        resource
    }

    /// Simulates an outage: while offline every call fails with `Dependency`.
    pub fn set_online(&self, online: bool) {
        self.offline.store(!online, Ordering::SeqCst);
    }

    /// How many permission documents have been computed.
    pub fn document_loads(&self) -> usize {
        self.document_loads.load(Ordering::SeqCst)
    }

    /// Number of stored subjects.
    pub fn subject_count(&self) -> usize {
        self.subjects.len()
    }

    fn check_online(&self) -> AuthResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(AuthError::dependency("in-memory store is offline"));
        }
        Ok(())
    }
}

#[async_trait]
impl SubjectStore for InMemoryStore {
    async fn load_permission_document(&self, subject_id: &str) -> AuthResult<PermissionDocument> {
        self.check_online()?;
        self.document_loads.fetch_add(1, Ordering::SeqCst);

        let links = self.links.read().await;
        let roles: HashSet<&str> = links
            .subject_roles
            .iter()
            .filter(|(subject, _)| subject == subject_id)
            .map(|(_, role)| role.as_str())
            .collect();

        let mut document = PermissionDocument::new();
        for (_, policy_id) in links
            .role_policies
            .iter()
            .filter(|(role, _)| roles.contains(role.as_str()))
        {
            let Some(policy) = self.policies.get(policy_id) else {
                continue;
            };
            let Some(resource) = self.resources.get(&policy.resource_id) else {
                tracing::warn!(policy_id = %policy.id, "policy points at a missing resource");
                continue;
            };
            let grant = if policy.allowed {
                PermissionGrant::allow(resource.action.clone(), resource.path.clone())
            } else {
                PermissionGrant::deny(resource.action.clone(), resource.path.clone())
            };
            document.insert(grant.with_metadata("policy", policy.name.clone()));
        }

        tracing::debug!(subject_id, grants = document.len(), "permission document computed");
        Ok(document)
    }

    async fn find_by_id(&self, id: &Uuid) -> AuthResult<Option<Subject>> {
        self.check_online()?;
        Ok(self.subjects.get(id).map(|s| s.value().clone()))
    }

    async fn find_by_email(&self, email: &str) -> AuthResult<Option<Subject>> {
        self.check_online()?;
        let id = self.emails.get(email).map(|r| *r.value());
        Ok(id.and_then(|id| self.subjects.get(&id).map(|s| s.value().clone())))
    }

    async fn insert(&self, subject: NewSubject) -> AuthResult<Subject> {
        self.check_online()?;
        let id = Uuid::new_v4();
        match self.emails.entry(subject.email.clone()) {
            Entry::Occupied(_) => return Err(AuthError::conflict("email is already registered")),
            Entry::Vacant(slot) => {
                slot.insert(id);
            }
        }

        let stored = Subject {
            id,
            email: subject.email,
            password_hash: subject.password_hash,
            disabled: subject.disabled,
            created_at: OffsetDateTime::now_utc(),
        };
        self.subjects.insert(id, stored.clone());
        Ok(stored)
    }

    async fn update_by_id(&self, id: &Uuid, update: SubjectUpdate) -> AuthResult<Subject> {
        self.check_online()?;
        let mut subject = self
            .subjects
            .get_mut(id)
            .ok_or_else(|| AuthError::not_found("subject"))?;

        if let Some(new_email) = update.email.as_set().filter(|e| **e != subject.email) {
            match self.emails.entry(new_email.clone()) {
                Entry::Occupied(_) => {
                    return Err(AuthError::conflict("email is already registered"));
                }
                Entry::Vacant(slot) => {
                    slot.insert(*id);
                }
            }
            self.emails.remove(&subject.email);
        }

        update.apply(&mut subject);
        Ok(subject.clone())
    }

    async fn ping(&self) -> AuthResult<()> {
        self.check_online()
    }
}

#[async_trait]
impl ResourceCatalog for InMemoryStore {
    async fn select(&self, filter: &ResourceFilter, page: &Paginator) -> AuthResult<Vec<Resource>> {
        self.check_online()?;
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| AuthError::validation(format!("invalid path pattern: {e}")))
        };
        let (action, path): (Option<&str>, Option<Regex>) = match filter {
            ResourceFilter::All => (None, None),
            ResourceFilter::Action { action } => (Some(action), None),
            ResourceFilter::Path { pattern } => (None, Some(compile(pattern)?)),
            ResourceFilter::ActionAndPath { action, pattern } => (Some(action), Some(compile(pattern)?)),
        };

        let mut matches: Vec<Resource> = self
            .resources
            .iter()
            .filter(|r| action.is_none_or(|a| r.action == a))
            .filter(|r| path.as_ref().is_none_or(|re| re.is_match(&r.path)))
            .map(|r| r.value().clone())
            .collect();
        matches.sort_by(|a, b| (&a.path, &a.action).cmp(&(&b.path, &b.action)));

        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        Ok(matches
            .into_iter()
            .skip(offset)
            .take(page.limit() as usize)
            .collect())
    }

    async fn find_by_id(&self, id: &Uuid) -> AuthResult<Option<Resource>> {
        self.check_online()?;
        Ok(self.resources.get(id).map(|r| r.value().clone()))
    }
}

#[async_trait]
impl AccessStore for InMemoryStore {
    async fn insert_policy(&self, policy: &Policy) -> AuthResult<()> {
        self.check_online()?;
        match self.policy_names.entry(policy.name.clone()) {
            Entry::Occupied(_) => return Err(AuthError::conflict("policy name is already taken")),
            Entry::Vacant(slot) => {
                slot.insert(policy.id);
            }
        }
        self.policies.insert(policy.id, policy.clone());
        Ok(())
    }

    async fn link_policy(&self, role: &str, policy_id: &Uuid) -> AuthResult<()> {
        self.check_online()?;
        if !self.policies.contains_key(policy_id) {
            return Err(AuthError::not_found("policy"));
        }
        self.links
            .write()
            .await
            .role_policies
            .insert((role.to_string(), *policy_id));
        Ok(())
    }

    async fn unlink_policy(&self, role: &str, policy_id: &Uuid) -> AuthResult<()> {
        self.check_online()?;
        self.links
            .write()
            .await
            .role_policies
            .remove(&(role.to_string(), *policy_id));
        Ok(())
    }

    async fn link_role(&self, subject_id: &str, role: &str) -> AuthResult<()> {
        self.check_online()?;
        self.links
            .write()
            .await
            .subject_roles
            .insert((subject_id.to_string(), role.to_string()));
        Ok(())
    }

    async fn unlink_role(&self, subject_id: &str, role: &str) -> AuthResult<()> {
        self.check_online()?;
        self.links
            .write()
            .await
            .subject_roles
            .remove(&(subject_id.to_string(), role.to_string()));
        Ok(())
    }

    async fn subjects_for_role(&self, role: &str) -> AuthResult<Vec<String>> {
        self.check_online()?;
        Ok(self
            .links
            .read()
            .await
            .subject_roles
            .iter()
            .filter(|(_, r)| r == role)
            .map(|(subject, _)| subject.clone())
            .collect())
    }
}
