//! Lock-free ordered map for Skipjack
//!
//! This crate implements a concurrent skip list that maps totally ordered
//! keys to values, with the following properties:
//!
//! - **Lock-free insert and remove**: writers never block each other; the
//!   only waits are bounded compare-and-swap retry loops on contended cells
//! - **Wait-free lookup**: readers perform no compare-and-swap at all and
//!   complete in O(log n) expected steps regardless of contention
//! - **Logical deletion**: removal marks a node first and unlinks it lazily;
//!   every traversal opportunistically excises marked nodes it passes
//! - **Epoch-based memory safety**: readers pin an epoch so nodes they
//!   observe are never freed under them
//!
//! # Architecture
//!
//! ```text
//! Write Path:
//! insert/remove → find (per-level pred/succ + cleanup) → CAS at each level
//!
//! Read Path:
//! get → CAS-free descent, skipping marked nodes
//! ```
//!
//! # Example
//!
//! ```
//! use skipjack_map::SkipListMap;
//!
//! let map: SkipListMap<u64, String> = SkipListMap::new();
//! map.insert(1, "one".to_string());
//! assert!(map.contains_key(&1));
//! assert!(map.remove(&1));
//! assert!(map.is_empty());
//! ```

pub mod list;

pub use list::{Entry, SkipListMap};
pub use skipjack_core::{Error, Result, SkipListConfig};
