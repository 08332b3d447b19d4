//! Daybook Common Types
//!
//! This crate contains shared types used across the daybook workspace,
//! including identifiers, monetary types, the actor/role model, mutation
//! events, and the workspace error taxonomy.

pub mod actor;
pub mod error;
pub mod event;
pub mod identifiers;
pub mod monetary;
pub mod operation;
pub mod time;

pub use actor::*;
pub use error::*;
pub use event::*;
pub use identifiers::*;
pub use monetary::*;
pub use operation::*;
pub use time::*;
