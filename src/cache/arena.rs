//! Node Arena Module
//!
//! Slot storage for doubly-linked key lists. Nodes are addressed by stable
//! indices with explicit `prev`/`next` links, and freed slots are recycled
//! through a free list. One arena can host many independent lists, each
//! described by a [`ListLinks`] header.
//!
//! Every list runs from head (most recently used) to tail (least recently
//! used).

/// Stable handle to a node in a [`NodeArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(usize);

#[derive(Debug)]
struct Node<K> {
    prev: Option<SlotId>,
    next: Option<SlotId>,
    freq: u64,
    key: K,
}

// == List Links ==
/// Head/tail header of one list threaded through an arena.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListLinks {
    head: Option<SlotId>,
    tail: Option<SlotId>,
    len: usize,
}

impl ListLinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tail(&self) -> Option<SlotId> {
        self.tail
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

// == Node Arena ==
#[derive(Debug)]
pub struct NodeArena<K> {
    slots: Vec<Option<Node<K>>>,
    free_list: Vec<usize>,
    len: usize,
}

impl<K> NodeArena<K> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            len: 0,
        }
    }

    /// Allocates an unlinked node.
    pub fn insert(&mut self, key: K, freq: u64) -> SlotId {
        let node = Node {
            prev: None,
            next: None,
            freq,
            key,
        };
        let idx = if let Some(idx) = self.free_list.pop() {
            self.slots[idx] = Some(node);
            idx
        } else {
            self.slots.push(Some(node));
            self.slots.len() - 1
        };
        self.len += 1;
        SlotId(idx)
    }

    /// Frees a node, returning its key and frequency.
    ///
    /// The node must already be unlinked from its list.
    pub fn remove(&mut self, id: SlotId) -> Option<(K, u64)> {
        let node = self.slots.get_mut(id.0)?.take()?;
        self.free_list.push(id.0);
        self.len -= 1;
        Some((node.key, node.freq))
    }

    pub fn key(&self, id: SlotId) -> Option<&K> {
        self.node(id).map(|node| &node.key)
    }

    pub fn freq(&self, id: SlotId) -> Option<u64> {
        self.node(id).map(|node| node.freq)
    }

    pub fn set_freq(&mut self, id: SlotId, freq: u64) -> bool {
        match self.node_mut(id) {
            Some(node) => {
                node.freq = freq;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free_list.clear();
        self.len = 0;
    }

    // == Linking ==
    /// Links an unlinked node at the head of `list`.
    pub fn push_front(&mut self, list: &mut ListLinks, id: SlotId) {
        let old_head = list.head;
        match self.node_mut(id) {
            Some(node) => {
                node.prev = None;
                node.next = old_head;
            }
            None => return,
        }
        match old_head.and_then(|head| self.node_mut(head)) {
            Some(head) => head.prev = Some(id),
            None => list.tail = Some(id),
        }
        list.head = Some(id);
        list.len += 1;
    }

    /// Detaches a node from `list`, leaving it allocated.
    pub fn unlink(&mut self, list: &mut ListLinks, id: SlotId) -> bool {
        let (prev, next) = match self.node(id) {
            Some(node) => (node.prev, node.next),
            None => return false,
        };

        match prev.and_then(|p| self.node_mut(p)) {
            Some(prev_node) => prev_node.next = next,
            None => list.head = next,
        }
        match next.and_then(|n| self.node_mut(n)) {
            Some(next_node) => next_node.prev = prev,
            None => list.tail = prev,
        }

        if let Some(node) = self.node_mut(id) {
            node.prev = None;
            node.next = None;
        }
        list.len -= 1;
        true
    }

    /// Moves a linked node to the head of `list`.
    pub fn move_to_front(&mut self, list: &mut ListLinks, id: SlotId) -> bool {
        if list.head == Some(id) {
            return true;
        }
        if !self.unlink(list, id) {
            return false;
        }
        self.push_front(list, id);
        true
    }

    /// Walks `list` from head to tail.
    pub fn iter_list<'a>(&'a self, list: &ListLinks) -> ListIter<'a, K> {
        ListIter {
            arena: self,
            cursor: list.head,
        }
    }

    fn node(&self, id: SlotId) -> Option<&Node<K>> {
        self.slots.get(id.0).and_then(|slot| slot.as_ref())
    }

    fn node_mut(&mut self, id: SlotId) -> Option<&mut Node<K>> {
        self.slots.get_mut(id.0).and_then(|slot| slot.as_mut())
    }
}

impl<K> Default for NodeArena<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Head-to-tail iterator over one list's keys.
pub struct ListIter<'a, K> {
    arena: &'a NodeArena<K>,
    cursor: Option<SlotId>,
}

impl<'a, K> Iterator for ListIter<'a, K> {
    type Item = (SlotId, &'a K);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cursor?;
        let node = self.arena.node(id)?;
        self.cursor = node.next;
        Some((id, &node.key))
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn keys(arena: &NodeArena<&'static str>, list: &ListLinks) -> Vec<&'static str> {
        arena.iter_list(list).map(|(_, key)| *key).collect()
    }

    #[test]
    fn test_push_front_orders_head_to_tail() {
        let mut arena = NodeArena::new();
        let mut list = ListLinks::new();
        for key in ["a", "b", "c"] {
            let id = arena.insert(key, 1);
            arena.push_front(&mut list, id);
        }

        assert_eq!(keys(&arena, &list), vec!["c", "b", "a"]);
        assert_eq!(list.len(), 3);
        assert_eq!(arena.key(list.tail().unwrap()), Some(&"a"));
    }

    #[test]
    fn test_unlink_middle_head_and_tail() {
        let mut arena = NodeArena::new();
        let mut list = ListLinks::new();
        let a = arena.insert("a", 1);
        let b = arena.insert("b", 1);
        let c = arena.insert("c", 1);
        arena.push_front(&mut list, a);
        arena.push_front(&mut list, b);
        arena.push_front(&mut list, c);

        assert!(arena.unlink(&mut list, b));
        assert_eq!(keys(&arena, &list), vec!["c", "a"]);

        assert!(arena.unlink(&mut list, c));
        assert_eq!(list.tail(), Some(a));

        assert!(arena.unlink(&mut list, a));
        assert!(list.is_empty());
        assert_eq!(list.tail(), None);
    }

    #[test]
    fn test_move_to_front() {
        let mut arena = NodeArena::new();
        let mut list = ListLinks::new();
        let a = arena.insert("a", 1);
        let b = arena.insert("b", 1);
        arena.push_front(&mut list, a);
        arena.push_front(&mut list, b);

        assert!(arena.move_to_front(&mut list, a));
        assert_eq!(keys(&arena, &list), vec!["a", "b"]);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_remove_recycles_slot() {
        let mut arena = NodeArena::new();
        let a = arena.insert("a", 3);
        assert_eq!(arena.remove(a), Some(("a", 3)));
        assert_eq!(arena.remove(a), None);
        assert_eq!(arena.len(), 0);

        let b = arena.insert("b", 1);
        assert_eq!(a, b);
        assert_eq!(arena.key(b), Some(&"b"));
    }

    #[test]
    fn test_lists_share_one_arena() {
        let mut arena = NodeArena::new();
        let mut low = ListLinks::new();
        let mut high = ListLinks::new();
        let a = arena.insert("a", 1);
        let b = arena.insert("b", 2);
        arena.push_front(&mut low, a);
        arena.push_front(&mut high, b);

        arena.unlink(&mut low, a);
        arena.set_freq(a, 2);
        arena.push_front(&mut high, a);

        assert!(low.is_empty());
        assert_eq!(keys(&arena, &high), vec!["a", "b"]);
        assert_eq!(arena.freq(a), Some(2));
    }
}
