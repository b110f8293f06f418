//! In-memory storage for tessera.
//!
//! Implements the collaborator traits from `tessera-auth`:
//!
//! - [`InMemoryStore`] - `SubjectStore`, `ResourceCatalog` and `AccessStore`
//!   over concurrent maps, with permission documents computed from role links
//! - [`InMemoryMailbox`] - a `MailDispatch` that keeps messages for inspection
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tessera_auth::{Collaborators, Services, TesseraConfig};
//! use tessera_auth::telemetry::NoopTelemetry;
//! use tessera_db_memory::{InMemoryMailbox, InMemoryStore};
//!
//! let store = Arc::new(InMemoryStore::new());
//! let services = Services::build(
//!     &TesseraConfig::default(),
//!     Collaborators {
//!         subjects: store.clone(),
//!         catalog: store.clone(),
//!         access: store,
//!         mail: Arc::new(InMemoryMailbox::new()),
//!         telemetry: Arc::new(NoopTelemetry),
//!     },
//! )
//! .await?;
//! ```

pub mod mailbox;
pub mod store;

pub use mailbox::InMemoryMailbox;
pub use store::InMemoryStore;
