//! Augmented AVL tree of `[start, end]` intervals.
//!
//! Nodes live in an arena and are addressed by [`IntervalHandle`]s. Each
//! handle carries a generation so a handle to a removed entry never aliases
//! a later insert that reuses the slot. Deletion relinks nodes rather than
//! swapping payloads, so handles to other entries stay valid.
//!
//! Every node tracks the largest `end` in its subtree; all searches use it
//! to skip subtrees that cannot contain a match.

use std::cmp::max;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntervalHandle {
    index: usize,
    generation: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct Entry<'a, K, P> {
    pub handle: IntervalHandle,
    pub start: K,
    pub end: K,
    pub payload: &'a P,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntegrityError {
    #[error("node {0}: stored height {1} but computed {2}")]
    Height(usize, i32, i32),
    #[error("node {0}: stored max_end does not match its subtree")]
    MaxEnd(usize),
    #[error("node {0}: balance factor {1} out of range")]
    Unbalanced(usize, i32),
    #[error("node {0}: child ordered on the wrong side")]
    Order(usize),
    #[error("node {0}: parent link is inconsistent")]
    ParentLink(usize),
    #[error("tree reports {0} entries but {1} are reachable")]
    Count(usize, usize),
}

#[derive(Debug, Clone)]
struct Node<K, P> {
    start: K,
    end: K,
    max_end: K,
    height: i32,
    payload: P,
    left: Option<usize>,
    right: Option<usize>,
    parent: Option<usize>,
}

#[derive(Debug, Clone)]
struct Slot<K, P> {
    generation: u64,
    node: Option<Node<K, P>>,
}

#[derive(Debug, Clone)]
pub struct IntervalTree<K, P> {
    slots: Vec<Slot<K, P>>,
    free: Vec<usize>,
    root: Option<usize>,
    len: usize,
}

impl<K: Ord + Copy, P> Default for IntervalTree<K, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Copy, P> IntervalTree<K, P> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: None,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn height(&self) -> i32 {
        self.height_of(self.root)
    }

    pub fn insert(&mut self, start: K, end: K, payload: P) -> IntervalHandle {
        let node = Node {
            start,
            end,
            max_end: end,
            height: 1,
            payload,
            left: None,
            right: None,
            parent: None,
        };
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index].node = Some(node);
                index
            }
            None => {
                self.slots.push(Slot { generation: 0, node: Some(node) });
                self.slots.len() - 1
            }
        };
        let handle = IntervalHandle {
            index,
            generation: self.slots[index].generation,
        };

        let mut parent = None;
        let mut cursor = self.root;
        let mut go_left = false;
        while let Some(current) = cursor {
            parent = Some(current);
            go_left = start < self.node(current).start;
            cursor = if go_left {
                self.node(current).left
            } else {
                self.node(current).right
            };
        }

        self.node_mut(index).parent = parent;
        match parent {
            None => self.root = Some(index),
            Some(p) if go_left => self.node_mut(p).left = Some(index),
            Some(p) => self.node_mut(p).right = Some(index),
        }

        self.len += 1;
        self.retrace(parent);
        handle
    }

    /// Remove the entry `handle` refers to. Returns `None` for a handle whose
    /// entry was already removed.
    pub fn delete(&mut self, handle: IntervalHandle) -> Option<P> {
        if !self.is_live(handle) {
            return None;
        }
        let z = handle.index;
        let (z_left, z_right, z_parent) = {
            let n = self.node(z);
            (n.left, n.right, n.parent)
        };

        let fix_from = match (z_left, z_right) {
            (None, child) | (child, None) => {
                self.transplant(z, child);
                z_parent
            }
            (Some(left), Some(right)) => {
                let y = self.leftmost(right);
                let fix_from = if self.node(y).parent != Some(z) {
                    let y_parent = self.node(y).parent;
                    let y_right = self.node(y).right;
                    self.transplant(y, y_right);
                    self.node_mut(y).right = Some(right);
                    self.node_mut(right).parent = Some(y);
                    y_parent
                } else {
                    Some(y)
                };
                self.transplant(z, Some(y));
                self.node_mut(y).left = Some(left);
                self.node_mut(left).parent = Some(y);
                fix_from
            }
        };

        self.retrace(fix_from);
        self.len -= 1;

        let slot = &mut self.slots[z];
        slot.generation += 1;
        let node = slot.node.take();
        self.free.push(z);
        node.map(|n| n.payload)
    }

    pub fn get(&self, handle: IntervalHandle) -> Option<Entry<'_, K, P>> {
        if !self.is_live(handle) {
            return None;
        }
        Some(self.entry(handle.index))
    }

    /// Remove every entry. Slots are kept and their generations bumped so
    /// handles issued before the clear stay dead.
    pub fn clear(&mut self) {
        self.free.clear();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.node.take().is_some() {
                slot.generation += 1;
            }
            self.free.push(index);
        }
        self.root = None;
        self.len = 0;
    }

    /// All entries ordered by start.
    pub fn iter(&self) -> impl Iterator<Item = Entry<'_, K, P>> {
        let mut out = Vec::with_capacity(self.len);
        self.collect_all(self.root, &mut out);
        out.into_iter()
    }

    /// Entries with `entry.end >= start && entry.start <= end`.
    pub fn find_intersecting(&self, start: K, end: K) -> impl Iterator<Item = Entry<'_, K, P>> {
        let mut out = Vec::new();
        self.intersecting(self.root, start, end, &mut out);
        out.into_iter()
    }

    /// Entries that fully enclose `[start, end]`.
    pub fn find_containing(&self, start: K, end: K) -> impl Iterator<Item = Entry<'_, K, P>> {
        let mut out = Vec::new();
        self.containing(self.root, start, end, &mut out);
        out.into_iter()
    }

    /// Entries lying fully inside `[start, end]`.
    pub fn find_contained(&self, start: K, end: K) -> impl Iterator<Item = Entry<'_, K, P>> {
        let mut out = Vec::new();
        self.contained(self.root, start, end, &mut out);
        out.into_iter()
    }

    /// Entries covering the instant `point`.
    pub fn find_overlapping(&self, point: K) -> impl Iterator<Item = Entry<'_, K, P>> {
        self.find_containing(point, point)
    }

    /// Re-derive heights and `max_end` bottom-up and compare with what the
    /// nodes store. Meant for tests; the tree never calls it itself.
    pub fn verify_integrity(&self) -> Result<(), IntegrityError> {
        let mut reachable = 0;
        if let Some(root) = self.root {
            if self.node(root).parent.is_some() {
                return Err(IntegrityError::ParentLink(root));
            }
            self.verify_node(root, &mut reachable)?;
        }
        if reachable != self.len {
            return Err(IntegrityError::Count(self.len, reachable));
        }
        Ok(())
    }

    fn verify_node(&self, index: usize, reachable: &mut usize) -> Result<(i32, K), IntegrityError> {
        *reachable += 1;
        let n = self.node(index);
        let mut max_end = n.end;
        let mut heights = [0, 0];

        for (side, child) in [n.left, n.right].into_iter().enumerate() {
            let Some(child) = child else { continue };
            let c = self.node(child);
            if c.parent != Some(index) {
                return Err(IntegrityError::ParentLink(child));
            }
            let misordered = if side == 0 { c.start > n.start } else { c.start < n.start };
            if misordered {
                return Err(IntegrityError::Order(index));
            }
            let (h, m) = self.verify_node(child, reachable)?;
            heights[side] = h;
            max_end = max(max_end, m);
        }

        let height = 1 + max(heights[0], heights[1]);
        if height != n.height {
            return Err(IntegrityError::Height(index, n.height, height));
        }
        if max_end != n.max_end {
            return Err(IntegrityError::MaxEnd(index));
        }
        let balance = heights[0] - heights[1];
        if balance.abs() > 1 {
            return Err(IntegrityError::Unbalanced(index, balance));
        }
        Ok((height, max_end))
    }

    fn is_live(&self, handle: IntervalHandle) -> bool {
        self.slots
            .get(handle.index)
            .map(|slot| slot.generation == handle.generation && slot.node.is_some())
            .unwrap_or(false)
    }

    // Every index reachable from the root or a node link refers to an occupied
    // slot; delete clears links before vacating.
    fn node(&self, index: usize) -> &Node<K, P> {
        match &self.slots[index].node {
            Some(node) => node,
            None => unreachable!("linked interval node {} is vacant", index),
        }
    }

    fn node_mut(&mut self, index: usize) -> &mut Node<K, P> {
        match &mut self.slots[index].node {
            Some(node) => node,
            None => unreachable!("linked interval node {} is vacant", index),
        }
    }

    fn entry(&self, index: usize) -> Entry<'_, K, P> {
        let n = self.node(index);
        Entry {
            handle: IntervalHandle {
                index,
                generation: self.slots[index].generation,
            },
            start: n.start,
            end: n.end,
            payload: &n.payload,
        }
    }

    fn height_of(&self, index: Option<usize>) -> i32 {
        index.map(|i| self.node(i).height).unwrap_or(0)
    }

    fn balance_of(&self, index: usize) -> i32 {
        let n = self.node(index);
        self.height_of(n.left) - self.height_of(n.right)
    }

    fn update(&mut self, index: usize) {
        let (left, right, end) = {
            let n = self.node(index);
            (n.left, n.right, n.end)
        };
        let mut max_end = end;
        if let Some(l) = left {
            max_end = max(max_end, self.node(l).max_end);
        }
        if let Some(r) = right {
            max_end = max(max_end, self.node(r).max_end);
        }
        let height = 1 + max(self.height_of(left), self.height_of(right));
        let n = self.node_mut(index);
        n.height = height;
        n.max_end = max_end;
    }

    fn leftmost(&self, mut index: usize) -> usize {
        while let Some(left) = self.node(index).left {
            index = left;
        }
        index
    }

    /// Put `replacement` where `target` hangs from its parent.
    fn transplant(&mut self, target: usize, replacement: Option<usize>) {
        let parent = self.node(target).parent;
        match parent {
            None => self.root = replacement,
            Some(p) => {
                if self.node(p).left == Some(target) {
                    self.node_mut(p).left = replacement;
                } else {
                    self.node_mut(p).right = replacement;
                }
            }
        }
        if let Some(r) = replacement {
            self.node_mut(r).parent = parent;
        }
    }

    fn rotate_left(&mut self, x: usize) -> usize {
        let Some(y) = self.node(x).right else { return x };
        let y_left = self.node(y).left;

        self.node_mut(x).right = y_left;
        if let Some(b) = y_left {
            self.node_mut(b).parent = Some(x);
        }
        self.transplant(x, Some(y));
        self.node_mut(y).left = Some(x);
        self.node_mut(x).parent = Some(y);

        self.update(x);
        self.update(y);
        y
    }

    fn rotate_right(&mut self, x: usize) -> usize {
        let Some(y) = self.node(x).left else { return x };
        let y_right = self.node(y).right;

        self.node_mut(x).left = y_right;
        if let Some(b) = y_right {
            self.node_mut(b).parent = Some(x);
        }
        self.transplant(x, Some(y));
        self.node_mut(y).right = Some(x);
        self.node_mut(x).parent = Some(y);

        self.update(x);
        self.update(y);
        y
    }

    /// Walk from `start` to the root restoring heights, `max_end` and balance.
    fn retrace(&mut self, start: Option<usize>) {
        let mut cursor = start;
        while let Some(mut index) = cursor {
            self.update(index);
            let balance = self.balance_of(index);
            if balance > 1 {
                if let Some(left) = self.node(index).left {
                    if self.balance_of(left) < 0 {
                        self.rotate_left(left);
                    }
                }
                index = self.rotate_right(index);
            } else if balance < -1 {
                if let Some(right) = self.node(index).right {
                    if self.balance_of(right) > 0 {
                        self.rotate_right(right);
                    }
                }
                index = self.rotate_left(index);
            }
            cursor = self.node(index).parent;
        }
    }

    fn collect_all<'a>(&'a self, index: Option<usize>, out: &mut Vec<Entry<'a, K, P>>) {
        let Some(i) = index else { return };
        let n = self.node(i);
        self.collect_all(n.left, out);
        out.push(self.entry(i));
        self.collect_all(n.right, out);
    }

    fn intersecting<'a>(&'a self, index: Option<usize>, start: K, end: K, out: &mut Vec<Entry<'a, K, P>>) {
        let Some(i) = index else { return };
        let n = self.node(i);
        if n.max_end < start {
            return;
        }
        self.intersecting(n.left, start, end, out);
        if n.start <= end {
            if n.end >= start {
                out.push(self.entry(i));
            }
            self.intersecting(n.right, start, end, out);
        }
    }

    fn containing<'a>(&'a self, index: Option<usize>, start: K, end: K, out: &mut Vec<Entry<'a, K, P>>) {
        let Some(i) = index else { return };
        let n = self.node(i);
        if n.max_end < end {
            return;
        }
        self.containing(n.left, start, end, out);
        if n.start <= start {
            if n.end >= end {
                out.push(self.entry(i));
            }
            self.containing(n.right, start, end, out);
        }
    }

    fn contained<'a>(&'a self, index: Option<usize>, start: K, end: K, out: &mut Vec<Entry<'a, K, P>>) {
        let Some(i) = index else { return };
        let n = self.node(i);
        if n.max_end < start {
            return;
        }
        if n.start >= start {
            self.contained(n.left, start, end, out);
        }
        if n.start <= end {
            if n.start >= start && n.end <= end {
                out.push(self.entry(i));
            }
            self.contained(n.right, start, end, out);
        }
    }
}

impl<K: Ord + Copy, P> FromIterator<(K, K, P)> for IntervalTree<K, P> {
    fn from_iter<I: IntoIterator<Item = (K, K, P)>>(iter: I) -> Self {
        let mut tree = IntervalTree::new();
        for (start, end, payload) in iter {
            tree.insert(start, end, payload);
        }
        tree
    }
}
