//! azptu-store
//!
//! Persisted user defaults for azptu: resource group, subscription, current
//! project and a cached project list. Every field carries its own timestamp and
//! is treated as absent once it is older than the configured TTL. Expiry is
//! checked on read; nothing sweeps the file in the background.
//!
//! Reads never fail: a missing, unreadable or corrupt record is an empty
//! record. Writes go through a temp file and a rename so a crash mid-write
//! leaves either the old record or the new one.

pub mod clock;
pub mod error;
pub mod record;
pub mod store;

pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::error::{StoreError, StoreResult};
pub use crate::record::{CachedProjects, FieldStatus, PersistedState, Stamped, StateField, STATE_VERSION};
pub use crate::store::{StateStore, StoreConfig, DEFAULT_TTL_SECONDS};
