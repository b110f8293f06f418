//! Subject storage trait.
//!
//! The authoritative record of who can sign in. Implementations live in
//! storage crates (e.g. `tessera-db-memory`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::AuthResult;
use crate::authz::PermissionDocument;

/// A principal that can authenticate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    /// Store-assigned identifier.
    pub id: Uuid,

    /// Sign-in email, unique across subjects.
    pub email: String,

    /// Argon2 PHC string. Never a clear password.
    pub password_hash: String,

    /// Disabled until the email address is verified.
    pub disabled: bool,

    /// When the subject was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Fields for a subject that does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubject {
    /// Sign-in email.
    pub email: String,

    /// Argon2 PHC string.
    pub password_hash: String,

    /// Initial disabled flag.
    pub disabled: bool,
}

/// One field of a partial update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FieldUpdate<T> {
    /// Keep the stored value.
    #[default]
    Unchanged,
    /// Replace the stored value.
    SetTo(T),
}

impl<T> FieldUpdate<T> {
    /// Returns `true` for [`FieldUpdate::Unchanged`].
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Self::Unchanged)
    }

    /// Writes the new value into `target`, if any.
    pub fn apply_to(self, target: &mut T) {
        if let Self::SetTo(value) = self {
            *target = value;
        }
    }

    /// Maps the new value, if any.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> FieldUpdate<U> {
        match self {
            Self::Unchanged => FieldUpdate::Unchanged,
            Self::SetTo(value) => FieldUpdate::SetTo(f(value)),
        }
    }

    /// Like [`map`](Self::map) with a fallible function.
    pub fn try_map<U, E>(self, f: impl FnOnce(T) -> Result<U, E>) -> Result<FieldUpdate<U>, E> {
        Ok(match self {
            Self::Unchanged => FieldUpdate::Unchanged,
            Self::SetTo(value) => FieldUpdate::SetTo(f(value)?),
        })
    }

    /// The new value, if any.
    pub fn as_set(&self) -> Option<&T> {
        match self {
            Self::Unchanged => None,
            Self::SetTo(value) => Some(value),
        }
    }
}

/// Stored-field update for a subject.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectUpdate {
    /// New sign-in email.
    pub email: FieldUpdate<String>,
    /// New password hash.
    pub password_hash: FieldUpdate<String>,
    /// New disabled flag.
    pub disabled: FieldUpdate<bool>,
}

impl SubjectUpdate {
    /// Returns `true` when no field changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.email.is_unchanged() && self.password_hash.is_unchanged() && self.disabled.is_unchanged()
    }

    /// Applies the update to an in-memory subject.
    pub fn apply(self, subject: &mut Subject) {
        self.email.apply_to(&mut subject.email);
        self.password_hash.apply_to(&mut subject.password_hash);
        self.disabled.apply_to(&mut subject.disabled);
    }
}

/// Storage operations for subjects.
#[async_trait]
pub trait SubjectStore: Send + Sync {
    /// Computes the subject's permission document from its role and policy
    /// links. An unknown subject has an empty document.
    ///
    /// # Errors
    ///
    /// Returns `Dependency` if the storage operation fails.
    async fn load_permission_document(&self, subject_id: &str) -> AuthResult<PermissionDocument>;

    /// Find a subject by ID. Returns `None` if it doesn't exist.
    async fn find_by_id(&self, id: &Uuid) -> AuthResult<Option<Subject>>;

    /// Find a subject by email (exact match after normalization by the caller).
    async fn find_by_email(&self, email: &str) -> AuthResult<Option<Subject>>;

    /// Create a subject and return it with its assigned ID.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the email is already taken.
    async fn insert(&self, subject: NewSubject) -> AuthResult<Subject>;

    /// Apply a partial update and return the updated subject.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the subject doesn't exist, `Conflict` if a new
    /// email is already taken.
    async fn update_by_id(&self, id: &Uuid, update: SubjectUpdate) -> AuthResult<Subject>;

    /// Checks that the store is reachable.
    async fn ping(&self) -> AuthResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject() -> Subject {
        Subject {
            id: Uuid::new_v4(),
            email: "ada@example.com".into(),
            password_hash: "$argon2id$old".into(),
            disabled: true,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn test_empty_update() {
        assert!(SubjectUpdate::default().is_empty());
        let update = SubjectUpdate {
            disabled: FieldUpdate::SetTo(false),
            ..SubjectUpdate::default()
        };
        assert!(!update.is_empty());
    }

    #[test]
    fn test_apply_only_touches_set_fields() {
        let mut s = subject();
        SubjectUpdate {
            disabled: FieldUpdate::SetTo(false),
            ..SubjectUpdate::default()
        }
        .apply(&mut s);

        assert!(!s.disabled);
        assert_eq!(s.email, "ada@example.com");
        assert_eq!(s.password_hash, "$argon2id$old");
    }

    #[test]
    fn test_field_update_try_map() {
        let update: FieldUpdate<&str> = FieldUpdate::SetTo("pw");
        let mapped: Result<FieldUpdate<usize>, ()> = update.try_map(|s| Ok(s.len()));
        assert_eq!(mapped.unwrap(), FieldUpdate::SetTo(2));

        let unchanged: FieldUpdate<&str> = FieldUpdate::Unchanged;
        let mapped: Result<FieldUpdate<usize>, ()> = unchanged.try_map(|_| Err(()));
        assert_eq!(mapped.unwrap(), FieldUpdate::Unchanged);
    }
}
