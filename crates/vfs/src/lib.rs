//! The stowage storage engine.
//!
//! One hierarchical namespace per user assembled from several physical
//! backends, with the workflows that keep it coherent:
//!
//! - **[`Router`](router::Router)**: (user, storage type, path) -> physical
//!   root and node, including the aggregated shared-with-me view
//! - **[`Tree`](node::Tree)**: the disk-backed node tree of one backend
//! - **[`CopyEngine`](copy::CopyEngine)**: recursive cross-backend copy/move
//!   with policy checks and per-child collision resolution
//! - **[`TrashManager`](trash::TrashManager)**: soft-delete and restore
//! - **[`LinkRegistry`](links::LinkRegistry)**: hash-keyed public links
//! - **[`QuotaTracker`](quota::QuotaTracker)**: cached used/limit accounting
//! - **[`Propagation`](propagation::Propagation)**: centralized migration of
//!   links, favorites and share records on every path change
//! - **[`FileStore`](store::FileStore)**: the facade tying it all together
//!
//! Transport, authentication and permission checks live outside this crate;
//! the facade is a library-level contract fronted by whatever protocol the
//! surrounding system uses.

pub mod config;
pub mod copy;
pub mod favorites;
pub mod item;
pub mod links;
pub mod node;
pub mod propagation;
pub mod quota;
pub mod router;
pub mod shares;
pub mod store;
pub mod thumbs;
pub mod trash;
pub mod users;

pub mod prelude {
    pub use crate::config::Config;
    pub use crate::node::WriteMode;
    pub use crate::quota::Quota;
    pub use crate::shares::{Access, ShareRecord};
    pub use crate::store::{FileStore, ItemOutcome, ItemRef, ListOptions};
    pub use common::prelude::*;
}
