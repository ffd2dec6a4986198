//! # assertion-service
//!
//! Business logic for keeping affiliation assertions in step with the
//! remote registry:
//!
//! - [`status`]: the pure status derivation and registry error classifier
//! - [`sync`]: create and update sweeps plus explicit deletes
//! - [`notification`]: batched permission-link notifications
//! - [`identity`]: linked identity records, token slots, permission links
//! - [`assertion`]: assertion lifecycle for portal users
//!
//! Services follow constructor injection; all dependencies are provided
//! at construction time via `Arc` references.

pub mod assertion;
pub mod context;
pub mod identity;
pub mod notification;
pub mod status;
pub mod sync;

pub use assertion::AssertionService;
pub use context::RequestContext;
pub use identity::{KeyedLocks, LinkSigner, LinkageService};
pub use notification::{NotificationDispatcher, SendReport};
pub use status::{classify_error, derive_status};
pub use sync::{DeleteOutcome, SweepReport, SyncOrchestrator};
