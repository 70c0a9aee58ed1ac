//! The concurrent skip-list map

use super::level::random_height;
use super::node::{Node, NodeKey};
use crossbeam::epoch::{self, Atomic, Guard, Owned, Shared};
use log::{debug, trace};
use skipjack_core::{Result, SkipListConfig};
use std::cmp::Ordering;
use std::fmt::Debug;
use std::io::Write;
use std::marker::PhantomData;
use std::sync::atomic::Ordering as AtomicOrdering;

/// A concurrent ordered map backed by a lock-free skip list
///
/// Keys are unique and totally ordered. Any number of threads may call any
/// operation at the same time:
///
/// - [`insert`](Self::insert) and [`remove`](Self::remove) are lock-free;
///   their linearization points are single compare-and-swap instructions on
///   the bottom-level chain
/// - [`get`](Self::get) is wait-free; it never performs a compare-and-swap
///   and never retries
///
/// # Thread Safety
///
/// Every cross-thread write goes through the markable forward cells. A
/// node's key and value are written only before the node is published, so
/// readers that reach a node through a forward pointer always observe fully
/// initialized fields.
///
/// # Memory Management
///
/// Operations run under an epoch guard, so a node observed by a traversal
/// outlives the observation even if it is concurrently unlinked.
/// Single-level nodes are reclaimed as soon as they are unlinked from the
/// bottom chain; taller towers stay allocated until the map is dropped,
/// since an in-flight insert may still briefly re-expose them at an upper
/// level.
///
/// # Example
///
/// ```
/// use skipjack_map::SkipListMap;
///
/// let map = SkipListMap::new();
/// assert!(map.insert(2, "world"));
/// assert!(map.insert(1, "hello"));
/// assert_eq!(map.get(&1).map(|e| *e.value()), Some("hello"));
/// assert_eq!(map.len(), 2);
/// ```
pub struct SkipListMap<K, V> {
    head: Atomic<Node<K, V>>,
    max_height: usize,
    probability: f64,
}

// SkipListMap is Send + Sync whenever K and V are: all shared state lives
// behind the markable atomic cells.

impl<K, V> SkipListMap<K, V> {
    /// Creates an empty map with the default height and probability
    pub fn new() -> Self {
        Self::from_config(SkipListConfig::default())
    }

    /// Creates an empty map with the given parameters
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`](skipjack_core::Error::InvalidConfig)
    /// if the configuration fails [`SkipListConfig::validate`].
    pub fn with_config(config: SkipListConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_config(config))
    }

    fn from_config(config: SkipListConfig) -> Self {
        let SkipListConfig {
            max_height,
            probability,
        } = config;

        // Both sentinels span every level, so a descent starting at the top
        // level stays in bounds on any tower it touches.
        let head = Node::sentinel(NodeKey::Head, max_height);
        let guard = epoch::pin();
        let nil = Owned::new(Node::sentinel(NodeKey::Nil, max_height)).into_shared(&guard);
        for cell in head.tower.iter() {
            cell.store(nil, false);
        }

        debug!("skip list created: max_height={max_height}, probability={probability}");
        Self {
            head: Atomic::new(head),
            max_height,
            probability,
        }
    }

    /// Counts the unmarked nodes on the bottom chain
    ///
    /// The walk is not linearizable: entries inserted or removed while it
    /// runs may or may not be counted. Under quiescence the count is exact.
    pub fn len(&self) -> usize {
        let guard = &epoch::pin();
        let head = self.head.load(AtomicOrdering::Acquire, guard);
        let mut curr = unsafe { head.deref() }.tower[0].load_ref(guard);
        let mut count = 0;
        loop {
            let curr_ref = unsafe { curr.deref() };
            if matches!(curr_ref.key, NodeKey::Nil) {
                break;
            }
            let (succ, marked) = curr_ref.tower[0].load(guard);
            if !marked {
                count += 1;
            }
            curr = succ;
        }
        count
    }

    /// Whether the bottom chain holds no unmarked node
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> SkipListMap<K, V>
where
    K: Ord,
{
    /// Inserts a binding, keeping any binding that is already present
    ///
    /// Returns `true` if a new node was created, `false` if the key was
    /// already present (the existing value wins and the new one is dropped).
    ///
    /// The node's height is drawn once; linking the bottom level is the
    /// linearization point, after which the key is visible to every lookup
    /// even while the upper levels are still being stitched in.
    pub fn insert(&self, key: K, value: V) -> bool {
        let guard = &epoch::pin();
        let height = random_height(self.max_height, self.probability);
        let mut preds = vec![Shared::null(); self.max_height];
        let mut succs = vec![Shared::null(); self.max_height];
        let mut node = Owned::new(Node::new(key, value, height));

        loop {
            if self.find_with_gc(node.user_key(), &mut preds, &mut succs, guard) {
                return false;
            }

            for level in 0..height {
                node.tower[level].store(succs[level], false);
            }

            // The bottom chain alone is authoritative for membership, so
            // this publish is where the insert takes effect.
            match unsafe { preds[0].deref() }.tower[0]
                .compare_set_owned(succs[0], false, node, guard)
            {
                Ok(published) => {
                    self.link_upper(published, height, &mut preds, &mut succs, guard);
                    return true;
                }
                Err(returned) => node = returned,
            }
        }
    }

    /// Stitches an already-published node into levels `1..height`
    fn link_upper<'g>(
        &self,
        node: Shared<'g, Node<K, V>>,
        height: usize,
        preds: &mut [Shared<'g, Node<K, V>>],
        succs: &mut [Shared<'g, Node<K, V>>],
        guard: &'g Guard,
    ) {
        let node_ref = unsafe { node.deref() };
        for level in 1..height {
            loop {
                let (current_succ, marked) = node_ref.tower[level].load(guard);
                if marked {
                    // A remover owns this tower now; whatever is already
                    // linked will be excised by later traversals.
                    return;
                }
                // Refresh the node's own forward edge before retrying, so a
                // successful link always points at the successor the
                // predecessor was holding.
                if current_succ != succs[level]
                    && !node_ref.tower[level].compare_set(
                        current_succ,
                        false,
                        succs[level],
                        false,
                        guard,
                    )
                {
                    return;
                }
                if unsafe { preds[level].deref() }.tower[level].compare_set(
                    succs[level],
                    false,
                    node,
                    false,
                    guard,
                ) {
                    break;
                }
                self.find_with_gc(node_ref.user_key(), preds, succs, guard);
            }
        }
    }

    /// Logically removes a key
    ///
    /// Returns `true` if this call removed the binding, `false` if the key
    /// was absent or another remover won the race. The winning step is the
    /// bottom-level mark; physical unlinking is left to later traversals,
    /// with one helping pass made here.
    pub fn remove(&self, key: &K) -> bool {
        let guard = &epoch::pin();
        let mut preds = vec![Shared::null(); self.max_height];
        let mut succs = vec![Shared::null(); self.max_height];

        if !self.find_with_gc(key, &mut preds, &mut succs, guard) {
            return false;
        }
        let victim = succs[0];
        let victim_ref = unsafe { victim.deref() };

        // Mark the upper levels top-down, spinning past concurrent mark
        // traffic. Only the successor half of a cell can change under us.
        for level in (1..victim_ref.height()).rev() {
            loop {
                let (succ, marked) = victim_ref.tower[level].load(guard);
                if marked {
                    break;
                }
                victim_ref.tower[level].compare_set(succ, false, succ, true, guard);
            }
        }

        // The bottom-level mark commits the removal: exactly one caller wins.
        loop {
            let (succ, marked) = victim_ref.tower[0].load(guard);
            if victim_ref.tower[0].compare_set(succ, false, succ, true, guard) {
                self.find_with_gc(key, &mut preds, &mut succs, guard);
                return true;
            }
            if marked {
                return false;
            }
        }
    }

    /// Wait-free lookup
    ///
    /// Descends without ever writing: marked nodes are stepped over rather
    /// than unlinked, so the operation completes in O(log n) expected steps
    /// no matter how contended the map is. The returned [`Entry`] keeps the
    /// epoch pinned, so the borrow stays valid even if the binding is
    /// removed right after the call.
    pub fn get(&self, key: &K) -> Option<Entry<'_, K, V>> {
        let guard = epoch::pin();
        let mut found: *const Node<K, V> = std::ptr::null();
        {
            let guard = &guard;
            let mut pred = self.head.load(AtomicOrdering::Acquire, guard);
            for level in (0..self.max_height).rev() {
                let mut curr = unsafe { pred.deref() }.tower[level].load_ref(guard);
                loop {
                    let (mut succ, mut marked) = unsafe { curr.deref() }.tower[level].load(guard);
                    while marked {
                        curr = succ;
                        (succ, marked) = unsafe { curr.deref() }.tower[level].load(guard);
                    }
                    if unsafe { curr.deref() }.key.cmp_key(key) == Ordering::Less {
                        pred = curr;
                        curr = succ;
                    } else {
                        break;
                    }
                }
                if level == 0 && unsafe { curr.deref() }.key.cmp_key(key) == Ordering::Equal {
                    found = curr.as_raw();
                }
            }
        }
        if found.is_null() {
            None
        } else {
            Some(Entry {
                node: found,
                _guard: guard,
                _map: PhantomData,
            })
        }
    }

    /// Whether the key is present
    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Locates `key` and records its predecessor and successor at each level
    ///
    /// This traversal is the engine of the structure: every marked node it
    /// passes is physically unlinked on the way. A failed unlink means the
    /// neighborhood shifted under us, which may also invalidate choices made
    /// at higher levels, so the whole descent restarts from the head.
    ///
    /// On return, `succs[level]` was observed unmarked at `level`,
    /// `preds[level]` pointed at it, and `preds[level] < key <= succs[level]`
    /// held at the observation. Returns whether `succs[0]` carries `key`.
    fn find_with_gc<'g>(
        &self,
        key: &K,
        preds: &mut [Shared<'g, Node<K, V>>],
        succs: &mut [Shared<'g, Node<K, V>>],
        guard: &'g Guard,
    ) -> bool {
        'retry: loop {
            let mut pred = self.head.load(AtomicOrdering::Acquire, guard);
            for level in (0..self.max_height).rev() {
                let mut curr = unsafe { pred.deref() }.tower[level].load_ref(guard);
                loop {
                    let (mut succ, mut marked) = unsafe { curr.deref() }.tower[level].load(guard);
                    while marked {
                        if !unsafe { pred.deref() }.tower[level].compare_set(
                            curr, false, succ, false, guard,
                        ) {
                            continue 'retry;
                        }
                        trace!("excised marked node at level {level}");
                        if level == 0 && unsafe { curr.deref() }.height() == 1 {
                            // A single-level tower has no upper edges, and no
                            // cell can regain a pointer to it once its bottom
                            // edge is gone: the only stores of an existing
                            // node expect an unmarked witness, and every cell
                            // that held this node is marked or rewritten.
                            unsafe { guard.defer_destroy(curr) };
                        }
                        curr = succ;
                        (succ, marked) = unsafe { curr.deref() }.tower[level].load(guard);
                    }
                    if unsafe { curr.deref() }.key.cmp_key(key) == Ordering::Less {
                        pred = curr;
                        curr = succ;
                    } else {
                        break;
                    }
                }
                preds[level] = pred;
                succs[level] = curr;
            }
            return unsafe { succs[0].deref() }.key.cmp_key(key) == Ordering::Equal;
        }
    }
}

impl<K, V> SkipListMap<K, V>
where
    K: Debug,
    V: Debug,
{
    /// Writes one line per bottom-chain node, flagging logically deleted ones
    ///
    /// Marked nodes are included so the physical shape of the structure can
    /// be inspected.
    ///
    /// # Errors
    ///
    /// IO errors from the sink propagate as [`Error::Io`](skipjack_core::Error::Io).
    pub fn dump<W: Write>(&self, out: &mut W) -> Result<()> {
        let guard = &epoch::pin();
        let head = self.head.load(AtomicOrdering::Acquire, guard);
        let mut curr = unsafe { head.deref() }.tower[0].load_ref(guard);
        loop {
            let curr_ref = unsafe { curr.deref() };
            let key = match &curr_ref.key {
                NodeKey::Key(k) => k,
                _ => break,
            };
            let (succ, marked) = curr_ref.tower[0].load(guard);
            writeln!(
                out,
                "key: {:?} value: {:?} height: {}{}",
                key,
                curr_ref.user_value(),
                curr_ref.height(),
                if marked { " [marked]" } else { "" }
            )?;
            curr = succ;
        }
        Ok(())
    }
}

impl<K, V> Default for SkipListMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Drop for SkipListMap<K, V> {
    fn drop(&mut self) {
        let guard = &epoch::pin();

        let mut curr = self.head.load(AtomicOrdering::Acquire, guard);
        while !curr.is_null() {
            let next = unsafe { curr.deref() }.tower[0].load_ref(guard);
            unsafe { guard.defer_destroy(curr) };
            curr = next;
        }
    }
}

/// A borrowed view of one binding
///
/// Produced by [`SkipListMap::get`]. The entry pins the current epoch for
/// as long as it lives, which keeps the node it points at allocated even if
/// the binding is concurrently removed.
pub struct Entry<'a, K, V> {
    node: *const Node<K, V>,
    _guard: Guard,
    _map: PhantomData<&'a SkipListMap<K, V>>,
}

impl<K, V> Entry<'_, K, V> {
    pub fn key(&self) -> &K {
        unsafe { (*self.node).user_key() }
    }

    pub fn value(&self) -> &V {
        unsafe { (*self.node).user_value() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    /// Walks every level and asserts the structural invariants that must
    /// hold once no operation is in flight: strictly increasing keys per
    /// level, towers contained downward, and `len` agreeing with the
    /// unmarked bottom chain.
    fn check_invariants(map: &SkipListMap<u64, u64>) {
        let guard = &epoch::pin();
        let head = map.head.load(AtomicOrdering::Acquire, guard);
        let mut unmarked_per_level: Vec<Vec<*const Node<u64, u64>>> = Vec::new();

        for level in 0..map.max_height {
            let mut curr = unsafe { head.deref() }.tower[level].load_ref(guard);
            let mut previous: Option<u64> = None;
            let mut unmarked = Vec::new();
            loop {
                let curr_ref = unsafe { curr.deref() };
                let (succ, marked) = curr_ref.tower[level].load(guard);
                match &curr_ref.key {
                    NodeKey::Nil => break,
                    NodeKey::Key(k) => {
                        if let Some(p) = previous {
                            assert!(p < *k, "level {level} chain out of order: {p} !< {k}");
                        }
                        previous = Some(*k);
                        if !marked {
                            unmarked.push(curr.as_raw());
                        }
                    }
                    NodeKey::Head => panic!("head sentinel reachable mid-chain"),
                }
                curr = succ;
            }
            unmarked_per_level.push(unmarked);
        }

        for level in 1..map.max_height {
            for node in &unmarked_per_level[level] {
                assert!(
                    unmarked_per_level[level - 1].contains(node),
                    "node reachable at level {level} but not below"
                );
            }
        }

        assert_eq!(map.len(), unmarked_per_level[0].len());
    }

    #[test]
    fn test_insert_and_get() {
        let map = SkipListMap::new();
        assert!(map.insert(2, 20));
        assert!(map.insert(1, 10));
        assert!(map.insert(3, 30));

        assert_eq!(map.get(&1).map(|e| *e.value()), Some(10));
        assert_eq!(map.get(&2).map(|e| *e.value()), Some(20));
        assert_eq!(map.get(&3).map(|e| *e.value()), Some(30));
        assert!(map.get(&4).is_none());
        assert_eq!(map.len(), 3);
        check_invariants(&map);
    }

    #[test]
    fn test_duplicate_insert_keeps_first_binding() {
        let map = SkipListMap::new();
        assert!(map.insert(1, 10));
        assert!(!map.insert(1, 99));
        assert_eq!(map.get(&1).map(|e| *e.value()), Some(10));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_remove_absent_key() {
        let map: SkipListMap<u64, u64> = SkipListMap::new();
        assert!(!map.remove(&42));
        assert_eq!(map.len(), 0);
    }

    #[test]
    fn test_remove_then_reinsert() {
        let map = SkipListMap::new();
        assert!(map.insert(5, 50));
        assert!(map.remove(&5));
        assert!(map.get(&5).is_none());
        assert!(!map.remove(&5));

        assert!(map.insert(5, 51));
        assert_eq!(map.get(&5).map(|e| *e.value()), Some(51));
        assert_eq!(map.len(), 1);
        check_invariants(&map);
    }

    #[test]
    fn test_entry_outlives_concurrent_removal() {
        let map = SkipListMap::new();
        map.insert(7, 70);
        let entry = map.get(&7).unwrap();
        assert!(map.remove(&7));
        // The binding is gone from the map, but the borrow stays readable.
        assert_eq!(*entry.key(), 7);
        assert_eq!(*entry.value(), 70);
        assert!(map.get(&7).is_none());
    }

    #[test]
    fn test_ordering_is_by_key_not_insertion() {
        let map = SkipListMap::new();
        for key in [9u64, 1, 7, 3, 5] {
            map.insert(key, key);
        }
        let mut out = Vec::new();
        map.dump(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let keys: Vec<&str> = text
            .lines()
            .map(|l| l.split_whitespace().nth(1).unwrap())
            .collect();
        assert_eq!(keys, ["1", "3", "5", "7", "9"]);
    }

    #[test]
    fn test_dump_flags_marked_nodes() {
        let map = SkipListMap::new();
        map.insert(1, 10);
        map.insert(2, 20);

        let guard = &epoch::pin();
        let mut preds = vec![Shared::null(); map.max_height];
        let mut succs = vec![Shared::null(); map.max_height];
        assert!(map.find_with_gc(&2, &mut preds, &mut succs, guard));
        // Mark without the helping unlink, so the node stays on the chain.
        let victim = unsafe { succs[0].deref() };
        let (succ, _) = victim.tower[0].load(guard);
        assert!(victim.tower[0].compare_set(succ, false, succ, true, guard));

        let mut out = Vec::new();
        map.dump(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("key: 2"));
        assert!(text.contains("[marked]"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_custom_config() {
        let config = SkipListConfig {
            max_height: 4,
            probability: 0.25,
        };
        let map = SkipListMap::with_config(config).unwrap();
        for key in 0..100u64 {
            map.insert(key, key);
        }
        assert_eq!(map.len(), 100);
        check_invariants(&map);

        let rejected = SkipListConfig {
            max_height: 0,
            ..Default::default()
        };
        assert!(SkipListMap::<u64, u64>::with_config(rejected).is_err());
    }

    #[test]
    fn test_mixed_workload_invariants() {
        let map = SkipListMap::new();
        for key in 0..512u64 {
            map.insert(key, key * 10);
        }
        for key in (0..512u64).step_by(3) {
            assert!(map.remove(&key));
        }
        for key in (0..512u64).step_by(6) {
            map.insert(key, key * 100);
        }
        check_invariants(&map);

        for key in 0..512u64 {
            let expected = if key % 6 == 0 {
                Some(key * 100)
            } else if key % 3 == 0 {
                None
            } else {
                Some(key * 10)
            };
            assert_eq!(map.get(&key).map(|e| *e.value()), expected, "key {key}");
        }
    }

    proptest! {
        #[test]
        fn prop_matches_btreemap_model(
            ops in proptest::collection::vec((0u8..=1, 0u64..64), 1..256)
        ) {
            let map = SkipListMap::new();
            let mut model: BTreeMap<u64, u64> = BTreeMap::new();

            for (i, (op, key)) in ops.into_iter().enumerate() {
                let value = i as u64;
                match op {
                    0 => {
                        let vacant = !model.contains_key(&key);
                        if vacant {
                            model.insert(key, value);
                        }
                        prop_assert_eq!(map.insert(key, value), vacant);
                    }
                    _ => {
                        prop_assert_eq!(map.remove(&key), model.remove(&key).is_some());
                    }
                }
            }

            prop_assert_eq!(map.len(), model.len());
            for (key, value) in &model {
                prop_assert_eq!(map.get(key).map(|e| *e.value()), Some(*value));
            }
            check_invariants(&map);
        }
    }
}
