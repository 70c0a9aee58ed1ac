//! Concurrent skip list with logical deletion
//!
//! The list is a multi-level linked structure bracketed by two sentinel
//! nodes of maximum height. Each node carries a tower of markable forward
//! pointers, one per level; the low bit of every pointer doubles as the
//! logical-delete mark for that level, so a forward edge and its mark are
//! always read and written together by a single atomic operation.
//!
//! Membership is decided by the bottom-level chain alone: a key is present
//! iff an unmarked node with that key is reachable there. Upper levels are
//! an index that only accelerates the descent.

mod level;
mod markable;
mod node;
mod skiplist;

pub use skiplist::{Entry, SkipListMap};
