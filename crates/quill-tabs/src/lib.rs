//! Quill Tab Management
//!
//! An ordered set of open tab ids with one active selection. Capacity is
//! optionally bounded (oldest-opened position is evicted first), tabs can be
//! reordered, and every committed change is written to a [`KeyValueStore`]
//! so the next instance over the same storage key picks it up again.
//!
//! Nothing here fails on an unknown id: those calls are no-ops.
//!
//! [`KeyValueStore`]: quill_storage::KeyValueStore

mod config;
mod error;
mod manager;
mod state;
mod tab;

pub use config::{TabChangeObserver, TabCloseInterceptor, TabManagerConfig};
pub use error::TabError;
pub use manager::{BulkClose, CloseOutcome, StateListener, SubscriptionId, TabManager};
pub use state::TabsState;
pub use tab::Tab;

pub type Result<T> = std::result::Result<T, TabError>;
