//! Storage traits for identity and access data.
//!
//! This module defines the collaborator interfaces the core consumes:
//!
//! - Subjects and their permission documents
//! - The resource catalog
//! - Policies and role links
//!
//! # Implementations
//!
//! - `tessera-db-memory` - in-process storage for tests and single-node use

pub mod access;
pub mod resource;
pub mod subject;

pub use access::{AccessStore, NewPolicy, Policy};
pub use resource::{Paginator, Resource, ResourceCatalog, ResourceFilter};
pub use subject::{FieldUpdate, NewSubject, Subject, SubjectStore, SubjectUpdate};
