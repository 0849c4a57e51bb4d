//! A persistent, content-addressed ordered map from byte keys to byte values.
//!
//! The map is a treap whose node priorities are derived from a hash of each key.
//! For a given set of keys there is exactly one treap satisfying both the search-tree order
//! and the heap order on priorities, so the shape of the tree,
//! and with it every node hash, is a function of the contents alone.
//! Two maps built by different edit histories hash equal exactly when their entries are equal.
//!
//! Nodes are immutable and shared through [`Arc`].
//! Edits copy the path from the root to the edited node and share everything else,
//! so cloning a map is `O(1)` and an edit allocates `O(log n)` expected nodes.

use crate::value_store::ValueStore;
use crate::{Result, StoreError};
use std::cmp::Ordering;
use std::fmt;
use std::ops::Bound;
use std::sync::Arc;
use strata_sats::buffer::{BufReader, BufWriter, DecodeError};
use strata_sats::codec::{get_len, put_len};
use strata_sats::{hash_bytes, Hash};

type Link = Option<Arc<Node>>;

struct Node {
    key: Arc<[u8]>,
    value: Arc<[u8]>,
    left: Link,
    right: Link,
    priority: u64,
    /// Number of entries in this subtree.
    len: usize,
    /// Hash of this node's encoding, which includes its children's hashes.
    hash: Hash,
}

fn priority_of(key: &[u8]) -> u64 {
    let hash = hash_bytes(key);
    u64::from_le_bytes(hash.data[..8].try_into().unwrap_or_default())
}

/// Returns whether `a` belongs above `b` in the heap order.
/// Priority ties are broken by key so the order stays total.
fn outranks(a_priority: u64, a_key: &[u8], b: &Node) -> bool {
    (a_priority, a_key) > (b.priority, &*b.key)
}

fn link_len(link: &Link) -> usize {
    link.as_ref().map_or(0, |n| n.len)
}

fn link_hash(link: &Link) -> Option<Hash> {
    link.as_ref().map(|n| n.hash)
}

fn encode_node(key: &[u8], value: &[u8], left: Option<Hash>, right: Option<Hash>, buf: &mut Vec<u8>) {
    put_len(buf, key.len());
    buf.put_slice(key);
    put_len(buf, value.len());
    buf.put_slice(value);
    for child in [left, right] {
        match child {
            None => buf.put_u8(0),
            Some(hash) => {
                buf.put_u8(1);
                buf.put_slice(&hash.data);
            }
        }
    }
}

impl Node {
    fn new(key: Arc<[u8]>, value: Arc<[u8]>, left: Link, right: Link) -> Arc<Self> {
        let priority = priority_of(&key);
        Self::with_priority(key, value, priority, left, right)
    }

    fn with_priority(key: Arc<[u8]>, value: Arc<[u8]>, priority: u64, left: Link, right: Link) -> Arc<Self> {
        let mut buf = Vec::with_capacity(key.len() + value.len() + 74);
        encode_node(&key, &value, link_hash(&left), link_hash(&right), &mut buf);
        Arc::new(Self {
            len: 1 + link_len(&left) + link_len(&right),
            hash: hash_bytes(&buf),
            key,
            value,
            left,
            right,
            priority,
        })
    }

    /// Returns a copy of `self` with new children.
    fn with_children(&self, left: Link, right: Link) -> Arc<Self> {
        Self::with_priority(self.key.clone(), self.value.clone(), self.priority, left, right)
    }

    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        encode_node(&self.key, &self.value, link_hash(&self.left), link_hash(&self.right), &mut buf);
        buf
    }
}

/// Splits `link` into the entries less than `key` and those greater than `key`.
/// An entry equal to `key` is dropped.
fn split(link: &Link, key: &[u8]) -> (Link, Link) {
    let Some(node) = link else {
        return (None, None);
    };
    match key.cmp(&node.key) {
        Ordering::Equal => (node.left.clone(), node.right.clone()),
        Ordering::Less => {
            let (less, greater) = split(&node.left, key);
            (less, Some(node.with_children(greater, node.right.clone())))
        }
        Ordering::Greater => {
            let (less, greater) = split(&node.right, key);
            (Some(node.with_children(node.left.clone(), less)), greater)
        }
    }
}

/// Joins two treaps where every key of `a` is less than every key of `b`.
fn merge(a: &Link, b: &Link) -> Link {
    match (a, b) {
        (None, _) => b.clone(),
        (_, None) => a.clone(),
        (Some(x), Some(y)) => {
            if outranks(x.priority, &x.key, y) {
                Some(x.with_children(x.left.clone(), merge(&x.right, b)))
            } else {
                Some(y.with_children(merge(a, &y.left), y.right.clone()))
            }
        }
    }
}

fn insert(link: &Link, key: Arc<[u8]>, value: Arc<[u8]>, priority: u64) -> Arc<Node> {
    let Some(node) = link else {
        return Node::with_priority(key, value, priority, None, None);
    };
    match key.cmp(&node.key) {
        Ordering::Equal => Node::with_priority(key, value, priority, node.left.clone(), node.right.clone()),
        _ if outranks(priority, &key, node) => {
            let (less, greater) = split(link, &key);
            Node::with_priority(key, value, priority, less, greater)
        }
        Ordering::Less => node.with_children(Some(insert(&node.left, key, value, priority)), node.right.clone()),
        Ordering::Greater => node.with_children(node.left.clone(), Some(insert(&node.right, key, value, priority))),
    }
}

fn remove(link: &Link, key: &[u8]) -> Link {
    let node = link.as_ref()?;
    match key.cmp(&node.key) {
        Ordering::Equal => merge(&node.left, &node.right),
        Ordering::Less => Some(node.with_children(remove(&node.left, key), node.right.clone())),
        Ordering::Greater => Some(node.with_children(node.left.clone(), remove(&node.right, key))),
    }
}

/// A persistent ordered map from byte keys to byte values.
#[derive(Clone, Default)]
pub struct ProllyMap {
    root: Link,
}

impl ProllyMap {
    /// The hash of the empty map.
    pub const EMPTY_HASH: Hash = Hash::ZERO;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        link_len(&self.root)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// The content hash of this map.
    pub fn hash(&self) -> Hash {
        link_hash(&self.root).unwrap_or(Self::EMPTY_HASH)
    }

    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        let mut link = &self.root;
        while let Some(node) = link {
            link = match key.cmp(&node.key) {
                Ordering::Equal => return Some(&*node.value),
                Ordering::Less => &node.left,
                Ordering::Greater => &node.right,
            };
        }
        None
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Inserts `key => value`, returning the previous value for `key`, if any.
    pub fn insert(&mut self, key: impl Into<Arc<[u8]>>, value: impl Into<Arc<[u8]>>) -> Option<Arc<[u8]>> {
        let key = key.into();
        let value = value.into();
        let old = self.get_arc(&key);
        if old.as_deref() == Some(&*value) {
            return old;
        }
        let priority = priority_of(&key);
        self.root = Some(insert(&self.root, key, value, priority));
        old
    }

    /// Removes `key`, returning its value, if any.
    pub fn remove(&mut self, key: &[u8]) -> Option<Arc<[u8]>> {
        let old = self.get_arc(key)?;
        self.root = remove(&self.root, key);
        Some(old)
    }

    fn get_arc(&self, key: &[u8]) -> Option<Arc<[u8]>> {
        let mut link = &self.root;
        while let Some(node) = link {
            link = match key.cmp(&node.key) {
                Ordering::Equal => return Some(node.value.clone()),
                Ordering::Less => &node.left,
                Ordering::Greater => &node.right,
            };
        }
        None
    }

    /// Iterates all entries in key order.
    pub fn iter(&self) -> Iter<'_> {
        self.range((Bound::Unbounded, Bound::Unbounded))
    }

    /// Iterates the entries whose keys fall within `bounds`, in key order.
    pub fn range<'a>(&'a self, (lower, upper): (Bound<&[u8]>, Bound<&[u8]>)) -> Iter<'a> {
        let upper = match upper {
            Bound::Unbounded => Upper::Unbounded,
            Bound::Included(k) => Upper::Included(k.into()),
            Bound::Excluded(k) => Upper::Excluded(k.into()),
        };
        Iter::seek(&self.root, lower, upper)
    }

    /// Iterates the entries whose keys start with `prefix`, in key order.
    pub fn prefix_iter<'a>(&'a self, prefix: &[u8]) -> Iter<'a> {
        Iter::seek(&self.root, Bound::Included(prefix), Upper::Prefix(prefix.into()))
    }

    /// Persists every node of this map that `store` doesn't hold yet.
    ///
    /// A stored node implies its whole subtree is stored, so shared subtrees are skipped.
    pub fn write_to(&self, store: &dyn ValueStore) -> Result<Hash> {
        fn write(node: &Node, store: &dyn ValueStore) -> Result<()> {
            if store.contains(&node.hash)? {
                return Ok(());
            }
            for child in [&node.left, &node.right].into_iter().flatten() {
                write(child, store)?;
            }
            let hash = store.put(&node.encode())?;
            debug_assert_eq!(hash, node.hash);
            Ok(())
        }
        if let Some(root) = &self.root {
            write(root, store)?;
        }
        Ok(self.hash())
    }

    /// Loads the map with root `hash` from `store`.
    pub fn read_from(store: &dyn ValueStore, hash: &Hash) -> Result<Self> {
        fn read(store: &dyn ValueStore, hash: &Hash) -> Result<Arc<Node>> {
            let bytes = store.get(hash)?.ok_or(StoreError::Missing(*hash))?;
            let decode_err = |source| StoreError::Decode { hash: *hash, source };
            let mut r = &bytes[..];
            let key = read_bytes(&mut r).map_err(decode_err)?;
            let value = read_bytes(&mut r).map_err(decode_err)?;
            let mut children = [None, None];
            for child in &mut children {
                *child = match read_child(&mut r).map_err(decode_err)? {
                    Some(child_hash) => Some(read(store, &child_hash)?),
                    None => None,
                };
            }
            if !r.is_empty() {
                return Err(decode_err(DecodeError::TrailingBytes(r.len())));
            }
            let [left, right] = children;
            let node = Node::new(key, value, left, right);
            if node.hash != *hash {
                return Err(StoreError::Corrupt {
                    expected: *hash,
                    actual: node.hash,
                });
            }
            Ok(node)
        }
        if *hash == Self::EMPTY_HASH {
            return Ok(Self::new());
        }
        let root = read(store, hash)?;
        log::trace!("MAP LOADED: {} entries at {}", root.len, hash.abbreviate());
        Ok(Self { root: Some(root) })
    }
}

fn read_bytes(r: &mut &[u8]) -> core::result::Result<Arc<[u8]>, DecodeError> {
    let len = get_len(r)?;
    r.get_slice(len).map(Into::into)
}

fn read_child(r: &mut &[u8]) -> core::result::Result<Option<Hash>, DecodeError> {
    match r.get_u8()? {
        0 => Ok(None),
        1 => r.get_array().map(|data| Some(Hash::from_byte_array(data))),
        tag => Err(DecodeError::InvalidTag { what: "map node child", tag }),
    }
}

impl PartialEq for ProllyMap {
    fn eq(&self, other: &Self) -> bool {
        self.hash() == other.hash()
    }
}

impl Eq for ProllyMap {}

impl fmt::Debug for ProllyMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(k, v)| (hex::encode(k), hex::encode(v))))
            .finish()
    }
}

impl<K: Into<Arc<[u8]>>, V: Into<Arc<[u8]>>> FromIterator<(K, V)> for ProllyMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl<'a> IntoIterator for &'a ProllyMap {
    type Item = (&'a [u8], &'a [u8]);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

enum Upper {
    Unbounded,
    Included(Box<[u8]>),
    Excluded(Box<[u8]>),
    Prefix(Box<[u8]>),
}

impl Upper {
    fn admits(&self, key: &[u8]) -> bool {
        match self {
            Self::Unbounded => true,
            Self::Included(k) => key <= &**k,
            Self::Excluded(k) => key < &**k,
            Self::Prefix(p) => key.starts_with(p),
        }
    }
}

/// An in-order iterator over a [`ProllyMap`].
pub struct Iter<'a> {
    /// Nodes yet to be yielded, each of whose left subtree is already exhausted or skipped.
    stack: Vec<&'a Node>,
    upper: Upper,
}

impl<'a> Iter<'a> {
    fn seek(root: &'a Link, lower: Bound<&[u8]>, upper: Upper) -> Self {
        let mut stack = Vec::new();
        let mut link = root;
        while let Some(node) = link {
            let in_range = match lower {
                Bound::Unbounded => true,
                Bound::Included(k) => *node.key >= *k,
                Bound::Excluded(k) => *node.key > *k,
            };
            link = if in_range {
                stack.push(&**node);
                &node.left
            } else {
                &node.right
            };
        }
        Self { stack, upper }
    }

    fn push_left_spine(&mut self, mut link: &'a Link) {
        while let Some(node) = link {
            self.stack.push(node);
            link = &node.left;
        }
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a [u8], &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        if !self.upper.admits(&node.key) {
            self.stack.clear();
            return None;
        }
        self.push_left_spine(&node.right);
        Some((&*node.key, &*node.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryValueStore;
    use pretty_assertions::assert_eq;
    use proptest::collection::{btree_map, vec};
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn map_of(entries: &[(&[u8], &[u8])]) -> ProllyMap {
        entries.iter().map(|&(k, v)| (k, v)).collect()
    }

    fn key() -> impl Strategy<Value = Vec<u8>> {
        vec(any::<u8>(), 0..6)
    }

    #[derive(Debug, Clone)]
    enum Op {
        Insert(Vec<u8>, Vec<u8>),
        Remove(Vec<u8>),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (key(), key()).prop_map(|(k, v)| Op::Insert(k, v)),
            key().prop_map(Op::Remove),
        ]
    }

    proptest! {
        #[test]
        fn behaves_like_btree_map(ops in vec(op(), 0..64)) {
            let mut model = BTreeMap::new();
            let mut map = ProllyMap::new();
            for op in ops {
                match op {
                    Op::Insert(k, v) => {
                        let expected = model.insert(k.clone(), v.clone());
                        let got = map.insert(k, v);
                        prop_assert_eq!(got.as_deref(), expected.as_deref());
                    }
                    Op::Remove(k) => {
                        let expected = model.remove(&k);
                        let got = map.remove(&k);
                        prop_assert_eq!(got.as_deref(), expected.as_deref());
                    }
                }
                prop_assert_eq!(map.len(), model.len());
            }
            let entries: Vec<_> = map.iter().map(|(k, v)| (k.to_vec(), v.to_vec())).collect();
            let expected: Vec<_> = model.into_iter().collect();
            prop_assert_eq!(entries, expected);
        }

        #[test]
        fn hash_is_independent_of_history(
            entries in btree_map(key(), key(), 0..32),
            extra in btree_map(key(), key(), 0..8),
        ) {
            let forward: ProllyMap = entries.iter().map(|(k, v)| (&k[..], &v[..])).collect();
            let backward: ProllyMap = entries.iter().rev().map(|(k, v)| (&k[..], &v[..])).collect();
            prop_assert_eq!(forward.hash(), backward.hash());

            // Adding and then removing entries restores the original hash.
            let mut edited = forward.clone();
            for (k, v) in &extra {
                if !entries.contains_key(k) {
                    edited.insert(&k[..], &v[..]);
                }
            }
            for k in extra.keys() {
                if !entries.contains_key(k) {
                    edited.remove(k);
                }
            }
            prop_assert_eq!(edited.hash(), forward.hash());
        }

        #[test]
        fn ranges_match_btree_map(
            entries in btree_map(key(), key(), 0..32),
            lo in key(),
            hi in key(),
        ) {
            let map: ProllyMap = entries.iter().map(|(k, v)| (&k[..], &v[..])).collect();
            let got: Vec<_> = map
                .range((Bound::Included(&lo[..]), Bound::Excluded(&hi[..])))
                .map(|(k, _)| k.to_vec())
                .collect();
            let expected: Vec<_> = if lo <= hi {
                entries.range(lo.clone()..hi.clone()).map(|(k, _)| k.clone()).collect()
            } else {
                Vec::new()
            };
            prop_assert_eq!(got, expected);
        }
    }

    #[test]
    fn prefix_iteration() {
        let map = map_of(&[(b"a", b"1"), (b"ab", b"2"), (b"abc", b"3"), (b"b", b"4")]);
        let keys: Vec<_> = map.prefix_iter(b"ab").map(|(k, _)| k.to_vec()).collect();
        assert_eq!(keys, vec![b"ab".to_vec(), b"abc".to_vec()]);
    }

    #[test]
    fn empty_map_hash() {
        let mut map = ProllyMap::new();
        assert_eq!(map.hash(), ProllyMap::EMPTY_HASH);
        map.insert(&b"k"[..], &b"v"[..]);
        assert_ne!(map.hash(), ProllyMap::EMPTY_HASH);
        map.remove(b"k");
        assert_eq!(map.hash(), ProllyMap::EMPTY_HASH);
    }

    #[test]
    fn clones_are_independent() {
        let a = map_of(&[(b"x", b"1")]);
        let mut b = a.clone();
        b.insert(&b"y"[..], &b"2"[..]);
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 2);
        assert_ne!(a, b);
    }

    #[test]
    fn write_then_read() {
        let store = MemoryValueStore::new();
        let map: ProllyMap = (0u32..100).map(|i| (i.to_be_bytes().to_vec(), i.to_le_bytes().to_vec())).collect();
        let hash = map.write_to(&store).unwrap();
        assert_eq!(store.len(), 100);

        let read = ProllyMap::read_from(&store, &hash).unwrap();
        assert_eq!(read, map);
        assert_eq!(read.len(), 100);
        assert_eq!(read.get(&7u32.to_be_bytes()), Some(&7u32.to_le_bytes()[..]));

        // Only the copied path is new.
        let mut edited = map.clone();
        edited.insert(100u32.to_be_bytes().to_vec(), vec![]);
        edited.write_to(&store).unwrap();
        assert!(store.len() < 150);
    }

    #[test]
    fn missing_nodes_are_reported() {
        let store = MemoryValueStore::new();
        let map = map_of(&[(b"k", b"v")]);
        assert!(matches!(
            ProllyMap::read_from(&store, &map.hash()),
            Err(StoreError::Missing(_))
        ));
    }
}
