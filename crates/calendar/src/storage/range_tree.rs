//! Interval store backed by an augmented AVL tree
//!
//! Each node holds one distinct range together with every value that was
//! added with exactly that range, and remembers the greatest end found in
//! its subtree. Overlap queries use that maximum to skip subtrees that end
//! before the queried range starts.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

use crate::models::Range;

/// Identity of a value stored in a [`RangeTree`]
///
/// Removal and deduplication compare values by identity, never by deep
/// equality: two distinct events with identical contents are two entries.
pub trait Identity {
    /// A key that is equal for two values iff they are the same value
    fn identity(&self) -> usize;

    fn same(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl<T: ?Sized> Identity for Arc<T> {
    fn identity(&self) -> usize {
        Arc::as_ptr(self).cast::<()>() as usize
    }
}

/// Order in which [`RangeTree::traverse`] visits nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraverseOrder {
    PreOrder,
    InOrder,
    PostOrder,
}

type Link<V> = Option<Box<Node<V>>>;

struct Node<V> {
    range: Range,
    max_end: DateTime<Utc>,
    height: i32,
    values: Vec<V>,
    left: Link<V>,
    right: Link<V>,
}

impl<V> Node<V> {
    fn new(range: Range, value: V) -> Box<Self> {
        Box::new(Self {
            range,
            max_end: range.end(),
            height: 1,
            values: vec![value],
            left: None,
            right: None,
        })
    }

    fn refresh(&mut self) {
        self.height = 1 + height(&self.left).max(height(&self.right));

        let mut max_end = self.range.end();
        for child in [&self.left, &self.right].into_iter().flatten() {
            max_end = max_end.max(child.max_end);
        }
        self.max_end = max_end;
    }

    fn balance(&self) -> i32 {
        height(&self.left) - height(&self.right)
    }
}

fn height<V>(link: &Link<V>) -> i32 {
    link.as_ref().map_or(0, |n| n.height)
}

fn rotate_left<V>(mut node: Box<Node<V>>) -> Box<Node<V>> {
    let Some(mut pivot) = node.right.take() else {
        return node;
    };
    node.right = pivot.left.take();
    node.refresh();
    pivot.left = Some(node);
    pivot.refresh();
    pivot
}

fn rotate_right<V>(mut node: Box<Node<V>>) -> Box<Node<V>> {
    let Some(mut pivot) = node.left.take() else {
        return node;
    };
    node.left = pivot.right.take();
    node.refresh();
    pivot.right = Some(node);
    pivot.refresh();
    pivot
}

fn rebalance<V>(mut node: Box<Node<V>>) -> Box<Node<V>> {
    node.refresh();
    let balance = node.balance();

    if balance > 1 {
        if let Some(left) = node.left.take() {
            let left = if height(&left.right) > height(&left.left) {
                rotate_left(left)
            } else {
                left
            };
            node.left = Some(left);
        }
        return rotate_right(node);
    }

    if balance < -1 {
        if let Some(right) = node.right.take() {
            let right = if height(&right.left) > height(&right.right) {
                rotate_right(right)
            } else {
                right
            };
            node.right = Some(right);
        }
        return rotate_left(node);
    }

    node
}

fn insert<V>(link: Link<V>, range: Range, value: V) -> Box<Node<V>> {
    let Some(mut node) = link else {
        return Node::new(range, value);
    };

    match range.cmp(&node.range) {
        Ordering::Less => node.left = Some(insert(node.left.take(), range, value)),
        Ordering::Greater => node.right = Some(insert(node.right.take(), range, value)),
        Ordering::Equal => {
            node.values.push(value);
            return node;
        }
    }

    rebalance(node)
}

fn remove<V: Identity>(link: Link<V>, range: &Range, value: &V, removed: &mut bool) -> Link<V> {
    let mut node = link?;

    match range.cmp(&node.range) {
        Ordering::Less => node.left = remove(node.left.take(), range, value, removed),
        Ordering::Greater => node.right = remove(node.right.take(), range, value, removed),
        Ordering::Equal => {
            if let Some(index) = node.values.iter().position(|v| v.same(value)) {
                node.values.remove(index);
                *removed = true;

                // Only drop the node once its last value is gone
                if node.values.is_empty() {
                    return delete_node(node);
                }
            }
            return Some(node);
        }
    }

    Some(rebalance(node))
}

fn delete_node<V>(node: Box<Node<V>>) -> Link<V> {
    let Node { left, right, .. } = *node;
    let Some(right) = right else {
        return left;
    };

    let (rest, mut min) = take_min(right);
    min.left = left;
    min.right = rest;
    Some(rebalance(min))
}

/// Detach the leftmost node, returning the remaining subtree and that node
fn take_min<V>(mut node: Box<Node<V>>) -> (Link<V>, Box<Node<V>>) {
    match node.left.take() {
        None => {
            let rest = node.right.take();
            (rest, node)
        }
        Some(left) => {
            let (rest, min) = take_min(left);
            node.left = rest;
            (Some(rebalance(node)), min)
        }
    }
}

fn visit_at_range<V>(link: &Link<V>, range: &Range, visit: &mut impl FnMut(&V)) {
    let Some(node) = link else {
        return;
    };

    // Nothing in this subtree reaches the queried range
    if node.max_end < range.start() {
        return;
    }

    visit_at_range(&node.left, range, visit);

    if node.range.intersects(range) {
        node.values.iter().for_each(&mut *visit);
    }

    // Right subtree only holds ranges starting at or after this one
    let right_may_intersect = node.range.start() < range.end()
        || (range.is_empty() && node.range.start() == range.end());
    if right_may_intersect {
        visit_at_range(&node.right, range, visit);
    }
}

fn traverse<V>(
    link: &Link<V>,
    order: TraverseOrder,
    func: &mut impl FnMut(&Range, &V) -> ControlFlow<()>,
) -> ControlFlow<()> {
    let Some(node) = link else {
        return ControlFlow::Continue(());
    };

    if order == TraverseOrder::PreOrder {
        visit_node(node, func)?;
    }
    traverse(&node.left, order, func)?;
    if order == TraverseOrder::InOrder {
        visit_node(node, func)?;
    }
    traverse(&node.right, order, func)?;
    if order == TraverseOrder::PostOrder {
        visit_node(node, func)?;
    }

    ControlFlow::Continue(())
}

fn visit_node<V>(
    node: &Node<V>,
    func: &mut impl FnMut(&Range, &V) -> ControlFlow<()>,
) -> ControlFlow<()> {
    for value in &node.values {
        func(&node.range, value)?;
    }
    ControlFlow::Continue(())
}

/// An ordered multimap from half-open ranges to values
///
/// The same value may be added under several ranges, and several values
/// may share one range.
pub struct RangeTree<V> {
    root: Link<V>,
    len: usize,
}

impl<V> RangeTree<V> {
    /// Create an empty tree
    pub fn new() -> Self {
        Self { root: None, len: 0 }
    }

    /// Number of (range, value) associations
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Remove every association
    pub fn clear(&mut self) {
        self.root = None;
        self.len = 0;
    }

    /// Associate `value` with `range`
    pub fn add(&mut self, range: Range, value: V) {
        self.root = Some(insert(self.root.take(), range, value));
        self.len += 1;
    }

    /// Count associations whose range intersects `range`
    pub fn count_at_range(&self, range: &Range) -> usize {
        let mut count = 0;
        visit_at_range(&self.root, range, &mut |_| count += 1);
        count
    }

    /// Walk every association in the given order until `func` breaks
    pub fn traverse(
        &self,
        order: TraverseOrder,
        mut func: impl FnMut(&Range, &V) -> ControlFlow<()>,
    ) -> ControlFlow<()> {
        traverse(&self.root, order, &mut func)
    }
}

impl<V: Identity + Clone> RangeTree<V> {
    /// Remove exactly one association of `value` with `range`.
    ///
    /// Callers must pass the same range the value was added with. Returns
    /// `false` when no such association exists.
    pub fn remove(&mut self, range: &Range, value: &V) -> bool {
        let mut removed = false;
        self.root = remove(self.root.take(), range, value, &mut removed);
        if removed {
            self.len -= 1;
        }
        removed
    }

    /// Remove the first association of `value`, whatever its range
    pub fn remove_value(&mut self, value: &V) -> bool {
        let mut found = None;
        let _ = self.traverse(TraverseOrder::InOrder, |range, candidate| {
            if candidate.same(value) {
                found = Some(*range);
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });

        match found {
            Some(range) => self.remove(&range, value),
            None => false,
        }
    }

    /// Every value whose range intersects `range`, each value at most once.
    ///
    /// The result has no particular order.
    pub fn data_at_range(&self, range: &Range) -> Vec<V> {
        let mut seen = HashSet::new();
        let mut data = Vec::new();
        visit_at_range(&self.root, range, &mut |value: &V| {
            if seen.insert(value.identity()) {
                data.push(value.clone());
            }
        });
        data
    }

    /// Every stored value, each at most once, in range order
    pub fn all_data(&self) -> Vec<V> {
        let mut seen = HashSet::new();
        let mut data = Vec::new();
        let _ = self.traverse(TraverseOrder::InOrder, |_, value| {
            if seen.insert(value.identity()) {
                data.push(value.clone());
            }
            ControlFlow::Continue(())
        });
        data
    }
}

impl<V> Default for RangeTree<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for RangeTree<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write_node<V>(f: &mut fmt::Formatter<'_>, link: &Link<V>, depth: usize) -> fmt::Result {
            write!(f, "{:width$}", "", width = depth * 2)?;
            match link {
                None => writeln!(f, "(null)"),
                Some(node) => {
                    writeln!(f, "Node {} (hits: {})", node.range, node.values.len())?;
                    write_node(f, &node.left, depth + 1)?;
                    write_node(f, &node.right, depth + 1)
                }
            }
        }

        writeln!(f, "RangeTree ({} entries)", self.len)?;
        write_node(f, &self.root, 0)
    }
}
