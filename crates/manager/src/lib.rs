//! Thread-safe allocation manager with deadlock detection.
//!
//! The [`AllocationManager`] owns the allocation graph behind a single
//! readers-writer lock:
//!
//! ```text
//!   acquire / release / register / unregister      detect_deadlock
//!                    │                                    │
//!                    ▼                                    ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │              RwLock<AllocationGraph>                        │
//! │                                                             │
//! │   write lock: every mutation, including queue promotion     │
//! │   read lock:  detector scans, snapshots, queries            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Mutations are linearizable and a detector scan always sees a graph that
//! satisfies every invariant. No operation waits on anything but the lock:
//! a `Queued` acquire returns immediately and the caller decides how to
//! wait for promotion.

mod config;
mod manager;

pub use config::{ManagerConfig, DEFAULT_MAX_ENTITIES};
pub use manager::{AllocationManager, Promotion};
