//! Session state and its stores.

mod libsql_store;
pub mod locks;
pub mod migrations;
pub mod model;
pub mod store;

pub use libsql_store::LibSqlSessionStore;
pub use locks::SessionLocks;
pub use model::{Anomaly, AuditEntry, Session, enforce_monotonic};
pub use store::{CasOutcome, MemorySessionStore, SessionStore};
