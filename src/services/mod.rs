//! Service layer between the HTTP routes and the stores.
//!
//! SYSTEM CONTEXT
//! ==============
//! Route handlers hold these services through `AppState`. The services own
//! validation and orchestration; persistence stays behind the store traits.

pub mod account;
pub mod lint;
pub mod snippet;
pub mod token;
