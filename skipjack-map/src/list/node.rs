//! Skip-list nodes and sentinel keys

use super::markable::MarkableAtomic;
use std::cmp::Ordering;

/// A node key extended with the two sentinel bounds
///
/// `Head` compares below every user key and `Nil` above, so boundary cases
/// in the traversal fall out of ordinary comparison. The derive relies on
/// the variant order.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum NodeKey<K> {
    Head,
    Key(K),
    Nil,
}

impl<K: Ord> NodeKey<K> {
    /// Compares this key against a user key, sentinels taking ±∞
    pub(crate) fn cmp_key(&self, key: &K) -> Ordering {
        match self {
            NodeKey::Head => Ordering::Less,
            NodeKey::Key(k) => k.cmp(key),
            NodeKey::Nil => Ordering::Greater,
        }
    }
}

/// A record in the skip list
///
/// The key, value, and tower height are fixed at construction; only the
/// tower cells are ever written after the node is published. Sentinels are
/// built at the full configured height so a descent starting at the top
/// level never indexes out of a tower.
pub(crate) struct Node<K, V> {
    pub(crate) key: NodeKey<K>,
    pub(crate) value: Option<V>,
    pub(crate) tower: Box<[MarkableAtomic<Node<K, V>>]>,
}

impl<K, V> Node<K, V> {
    pub(crate) fn new(key: K, value: V, height: usize) -> Self {
        Self {
            key: NodeKey::Key(key),
            value: Some(value),
            tower: Self::empty_tower(height),
        }
    }

    pub(crate) fn sentinel(key: NodeKey<K>, height: usize) -> Self {
        Self {
            key,
            value: None,
            tower: Self::empty_tower(height),
        }
    }

    fn empty_tower(height: usize) -> Box<[MarkableAtomic<Node<K, V>>]> {
        (0..height).map(|_| MarkableAtomic::null()).collect()
    }

    /// Number of levels this node participates in
    pub(crate) fn height(&self) -> usize {
        self.tower.len()
    }

    /// Key of a regular node; sentinels never reach this
    pub(crate) fn user_key(&self) -> &K {
        match &self.key {
            NodeKey::Key(k) => k,
            _ => unreachable!("sentinel nodes carry no user key"),
        }
    }

    /// Value of a regular node; sentinels never reach this
    pub(crate) fn user_value(&self) -> &V {
        match &self.value {
            Some(v) => v,
            None => unreachable!("sentinel nodes carry no value"),
        }
    }
}
