// Copyright (c) 2026 the evloop-core authors. Licensed under Apache License, Version 2.0.

//! The array-backed binary min-heap backing [`super::Timers`].
//!
//! Ordering matches libuv's `timer_less_than`: primarily by `deadline`, and by `start_id`
//! (assignment order) when two timers share a deadline. Each node records its own index in
//! the backing `Vec` so an arbitrary timer — not just the root — can be removed in
//! O(log n), which is what `Timers::stop` needs.

use std::cell::RefCell;
use std::rc::Rc;

pub(super) struct TimerNode {
    pub(super) deadline: u64,
    pub(super) repeat: u64,
    pub(super) start_id: u64,
    pub(super) heap_index: Option<usize>,
    pub(super) callback: Option<super::TimerCallback>,
}

pub(super) type NodeRef = Rc<RefCell<TimerNode>>;

fn less_than(a: &TimerNode, b: &TimerNode) -> bool {
    (a.deadline, a.start_id) < (b.deadline, b.start_id)
}

#[derive(Default)]
pub(super) struct TimerHeap {
    nodes: Vec<NodeRef>,
}

impl TimerHeap {
    pub(super) fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(super) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(super) fn peek_min(&self) -> Option<NodeRef> {
        self.nodes.first().cloned()
    }

    pub(super) fn insert(&mut self, node: NodeRef) {
        let index = self.nodes.len();
        node.borrow_mut().heap_index = Some(index);
        self.nodes.push(node);
        self.sift_up(index);
    }

    /// Removes `node` from the heap. No-op if it is not currently linked (already
    /// popped or never inserted).
    pub(super) fn remove(&mut self, node: &NodeRef) {
        let Some(index) = node.borrow().heap_index else { return };
        let last = self.nodes.len() - 1;
        self.nodes.swap(index, last);
        self.nodes.pop();
        node.borrow_mut().heap_index = None;
        if index < self.nodes.len() {
            self.nodes[index].borrow_mut().heap_index = Some(index);
            self.sift_down(index);
            self.sift_up(index);
        }
    }

    /// Removes and returns the minimum element, if any.
    pub(super) fn pop_min(&mut self) -> Option<NodeRef> {
        let min = self.peek_min()?;
        self.remove(&min);
        Some(min)
    }

    fn sift_up(&mut self, mut index: usize) {
        while index > 0 {
            let parent = (index - 1) / 2;
            let swap = less_than(&self.nodes[index].borrow(), &self.nodes[parent].borrow());
            if !swap {
                break;
            }
            self.swap(index, parent);
            index = parent;
        }
    }

    fn sift_down(&mut self, mut index: usize) {
        loop {
            let left = index * 2 + 1;
            let right = index * 2 + 2;
            let mut smallest = index;
            if left < self.nodes.len()
                && less_than(&self.nodes[left].borrow(), &self.nodes[smallest].borrow())
            {
                smallest = left;
            }
            if right < self.nodes.len()
                && less_than(&self.nodes[right].borrow(), &self.nodes[smallest].borrow())
            {
                smallest = right;
            }
            if smallest == index {
                break;
            }
            self.swap(index, smallest);
            index = smallest;
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.nodes.swap(a, b);
        self.nodes[a].borrow_mut().heap_index = Some(a);
        self.nodes[b].borrow_mut().heap_index = Some(b);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(deadline: u64, start_id: u64) -> NodeRef {
        Rc::new(RefCell::new(TimerNode {
            deadline,
            repeat: 0,
            start_id,
            heap_index: None,
            callback: None,
        }))
    }

    #[test]
    fn pop_min_returns_ascending_deadlines() {
        let mut heap = TimerHeap::default();
        heap.insert(node(30, 0));
        heap.insert(node(10, 1));
        heap.insert(node(20, 2));

        let mut order = Vec::new();
        while let Some(n) = heap.pop_min() {
            order.push(n.borrow().deadline);
        }
        assert_eq!(order, vec![10, 20, 30]);
    }

    #[test]
    fn ties_break_on_start_id() {
        let mut heap = TimerHeap::default();
        heap.insert(node(5, 2));
        heap.insert(node(5, 0));
        heap.insert(node(5, 1));

        let mut order = Vec::new();
        while let Some(n) = heap.pop_min() {
            order.push(n.borrow().start_id);
        }
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn remove_arbitrary_node_keeps_heap_consistent() {
        let mut heap = TimerHeap::default();
        let middle = node(20, 1);
        heap.insert(node(10, 0));
        heap.insert(middle.clone());
        heap.insert(node(30, 2));

        heap.remove(&middle);
        assert!(middle.borrow().heap_index.is_none());

        let mut order = Vec::new();
        while let Some(n) = heap.pop_min() {
            order.push(n.borrow().deadline);
        }
        assert_eq!(order, vec![10, 30]);
    }
}
