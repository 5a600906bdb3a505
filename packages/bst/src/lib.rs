//! An unbalanced binary search tree whose nodes allocate through an
//! instrumented [`memhook::Heap`].
//!
//! This is a test subject, not a production container: every node lives in a
//! [`TrackedBox`], so hooks observing the heap see exactly one allocation per
//! inserted key and exactly one free per removed key. The tree exists to give
//! allocation-tracking tests a realistic recursive ownership structure to
//! exercise.
//!
//! ```
//! use bst::BinarySearchTree;
//! use memhook::Heap;
//!
//! let heap = Heap::new();
//! let hook = heap.hook();
//!
//! let mut tree = BinarySearchTree::new_in(&heap);
//! tree.insert(2, "two");
//! tree.insert(1, "one");
//! tree.insert(3, "three");
//! assert_eq!(hook.n_allocs(), 3);
//!
//! assert!(tree.remove(&2));
//! assert_eq!(hook.n_frees(), 1);
//! assert_eq!(tree.len(), 2);
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::mem;

use memhook::{Heap, TrackedBox};

type Link<K, V> = Option<TrackedBox<Node<K, V>>>;

struct Node<K, V> {
    key: K,
    value: V,
    left: Link<K, V>,
    right: Link<K, V>,
}

impl<K: Clone, V: Clone> Clone for Node<K, V> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            value: self.value.clone(),
            left: self.left.clone(),
            right: self.right.clone(),
        }
    }
}

/// An unbalanced map from `K` to `V`, one tracked heap block per entry.
///
/// Keys are ordered by their [`Ord`] implementation. Inserting an existing key
/// replaces the value in place without touching the heap; removing a key frees
/// exactly one block, whichever shape the tree is in.
///
/// The tree is bound to the heap it was created in and routes all node
/// ownership through it, clones included. Like the heap itself it is
/// `!Send + !Sync`.
pub struct BinarySearchTree<K, V> {
    heap: Heap,
    root: Link<K, V>,
    len: usize,
}

impl<K: Ord, V> BinarySearchTree<K, V> {
    /// Creates an empty tree whose nodes will allocate from `heap`.
    #[must_use]
    pub fn new_in(heap: &Heap) -> Self {
        Self {
            heap: heap.clone(),
            root: None,
            len: 0,
        }
    }

    /// The heap this tree allocates from.
    #[must_use]
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Number of entries in the tree.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the tree holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts a key-value entry.
    ///
    /// A new key allocates one node; an existing key replaces the value in
    /// place with no allocator traffic.
    pub fn insert(&mut self, key: K, value: V) {
        if Self::insert_link(&self.heap, &mut self.root, key, value) {
            self.len = self
                .len
                .checked_add(1)
                .expect("entry count overflows usize - this indicates an unrealistic scenario");
        }
    }

    /// Removes the entry with this key, freeing exactly one node.
    ///
    /// Returns whether an entry was removed.
    pub fn remove(&mut self, key: &K) -> bool {
        let removed = Self::remove_link(&mut self.root, key);

        if removed {
            self.len = self
                .len
                .checked_sub(1)
                .expect("a node was just detached, so the tree was non-empty");
        }

        removed
    }

    /// A shared reference to the value of this key, if present.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        Self::get_link(self.root.as_deref(), key)
    }

    /// An exclusive reference to the value of this key, if present.
    #[must_use]
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        Self::get_link_mut(self.root.as_deref_mut(), key)
    }

    /// Whether an entry with this key is present.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// The entry with the smallest key, if any.
    #[must_use]
    pub fn min(&self) -> Option<(&K, &V)> {
        let mut node = self.root.as_deref()?;

        while let Some(left) = node.left.as_deref() {
            node = left;
        }

        Some((&node.key, &node.value))
    }

    /// The entry with the largest key, if any.
    #[must_use]
    pub fn max(&self) -> Option<(&K, &V)> {
        let mut node = self.root.as_deref()?;

        while let Some(right) = node.right.as_deref() {
            node = right;
        }

        Some((&node.key, &node.value))
    }

    /// The entry at the root of the tree, if any.
    ///
    /// Which entry that is depends on insertion and removal order.
    #[must_use]
    pub fn root(&self) -> Option<(&K, &V)> {
        self.root.as_deref().map(|node| (&node.key, &node.value))
    }

    /// Removes every entry, freeing one block per node.
    pub fn clear(&mut self) {
        self.root = None;
        self.len = 0;
    }

    fn insert_link(heap: &Heap, link: &mut Link<K, V>, key: K, value: V) -> bool {
        match link {
            None => {
                *link = Some(TrackedBox::new(
                    heap,
                    Node {
                        key,
                        value,
                        left: None,
                        right: None,
                    },
                ));
                true
            }
            Some(node) => match key.cmp(&node.key) {
                Ordering::Less => Self::insert_link(heap, &mut node.left, key, value),
                Ordering::Greater => Self::insert_link(heap, &mut node.right, key, value),
                Ordering::Equal => {
                    node.value = value;
                    false
                }
            },
        }
    }

    fn get_link<'a>(node: Option<&'a Node<K, V>>, key: &K) -> Option<&'a V> {
        let node = node?;

        match key.cmp(&node.key) {
            Ordering::Less => Self::get_link(node.left.as_deref(), key),
            Ordering::Greater => Self::get_link(node.right.as_deref(), key),
            Ordering::Equal => Some(&node.value),
        }
    }

    fn get_link_mut<'a>(node: Option<&'a mut Node<K, V>>, key: &K) -> Option<&'a mut V> {
        let node = node?;

        match key.cmp(&node.key) {
            Ordering::Less => Self::get_link_mut(node.left.as_deref_mut(), key),
            Ordering::Greater => Self::get_link_mut(node.right.as_deref_mut(), key),
            Ordering::Equal => Some(&mut node.value),
        }
    }

    fn remove_link(link: &mut Link<K, V>, key: &K) -> bool {
        let Some(node) = link.as_mut() else {
            return false;
        };

        match key.cmp(&node.key) {
            Ordering::Less => Self::remove_link(&mut node.left, key),
            Ordering::Greater => Self::remove_link(&mut node.right, key),
            Ordering::Equal => {
                if node.left.is_some() && node.right.is_some() {
                    // Two children: detach the in-order successor node and
                    // take over its entry, so exactly one block frees.
                    let mut successor = Self::detach_min(&mut node.right);
                    mem::swap(&mut node.key, &mut successor.key);
                    mem::swap(&mut node.value, &mut successor.value);
                } else {
                    let mut removed =
                        link.take().expect("this link matched the key just above");
                    *link = removed.left.take().or_else(|| removed.right.take());
                }

                true
            }
        }
    }

    // Unlinks the leftmost node of a non-empty subtree, promoting its right
    // child into its place.
    fn detach_min(link: &mut Link<K, V>) -> TrackedBox<Node<K, V>> {
        if link.as_deref().is_some_and(|node| node.left.is_some()) {
            let node = link
                .as_deref_mut()
                .expect("just observed this link holds a node");
            Self::detach_min(&mut node.left)
        } else {
            let mut detached = link
                .take()
                .expect("caller guarantees the subtree is non-empty");
            *link = detached.right.take();
            detached
        }
    }
}

impl<K, V> BinarySearchTree<K, V>
where
    K: fmt::Display,
    V: fmt::Display,
{
    /// Writes the tree one level per line, breadth-first.
    ///
    /// Every present node is written as `(key, value)` and every absent slot
    /// as `null`, each followed by a space, so entries line up positionally
    /// across levels. Output stops after the first line whose nodes have no
    /// children; an empty tree writes nothing.
    ///
    /// # Errors
    ///
    /// Forwards whatever error the writer produces.
    ///
    /// # Examples
    ///
    /// ```
    /// use bst::BinarySearchTree;
    /// use memhook::Heap;
    ///
    /// let heap = Heap::new();
    /// let mut tree = BinarySearchTree::new_in(&heap);
    /// tree.insert(2, 'b');
    /// tree.insert(1, 'a');
    ///
    /// let mut out = String::new();
    /// tree.write_level_by_level(&mut out).unwrap();
    /// assert_eq!(out, "(2, b) \n(1, a) null \n");
    /// ```
    pub fn write_level_by_level<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        if self.root.is_none() {
            return Ok(());
        }

        let mut level: Vec<Option<&Node<K, V>>> = vec![self.root.as_deref()];

        loop {
            let mut next = Vec::new();
            let mut has_children = false;

            for slot in &level {
                match slot {
                    Some(node) => {
                        write!(out, "({}, {}) ", node.key, node.value)?;

                        if node.left.is_some() || node.right.is_some() {
                            has_children = true;
                        }

                        next.push(node.left.as_deref());
                        next.push(node.right.as_deref());
                    }
                    None => {
                        write!(out, "null ")?;

                        // Absent slots keep their positions on deeper levels.
                        next.push(None);
                        next.push(None);
                    }
                }
            }

            writeln!(out)?;

            if !has_children {
                return Ok(());
            }

            level = next;
        }
    }
}

impl<K: Clone + Ord, V: Clone> Clone for BinarySearchTree<K, V> {
    /// Deep-copies the tree, allocating one fresh block per node from the
    /// same heap.
    fn clone(&self) -> Self {
        Self {
            heap: self.heap.clone(),
            root: self.root.clone(),
            len: self.len,
        }
    }
}

impl<K, V> fmt::Debug for BinarySearchTree<K, V> {
    #[cfg_attr(test, mutants::skip)] // No API contract.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinarySearchTree")
            .field("len", &self.len)
            .field("heap", &self.heap)
            .finish_non_exhaustive()
    }
}
