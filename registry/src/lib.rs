//! Daybook Client Registry
//!
//! Client CRUD layered over the audit trail. Deletion is soft: archiving
//! flips the status and keeps every history entry, so a client's current
//! state is always derivable by folding its audit entries in order.

pub mod client;
pub mod registry;

pub use client::{Client, ClientDraft, ClientFilter, ClientPatch, ClientStatus};
pub use registry::ClientRegistry;
