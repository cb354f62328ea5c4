//! In-memory view of one story graph.
//!
//! [`StoryGraph`] holds the root and every block of a story, applies edits
//! and deletions to them, and remembers which records changed so the caller
//! can persist exactly those inside one transaction.
//!
//! Liveness for `delete` is reference counting: a block survives while at
//! least one edge anywhere in the story (the root included) targets it.
//! Blocks that only reference each other in a cycle are therefore never
//! collected by a delete; [`StoryGraph::collect_unreachable`] is the
//! separate mark-and-sweep pass that removes them.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::Serialize;
use talegraph_core::node::{Block, Edge, NodeId, Story};

/// An edge whose target no longer exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DanglingEdge {
    /// Node holding the edge.
    pub source: NodeId,
    /// Missing target.
    pub target: NodeId,
}

/// Records touched by a sequence of graph operations.
#[derive(Debug, Default)]
pub struct GraphChanges {
    /// The root, if its fields or edges changed.
    pub story: Option<Story>,
    /// Surviving blocks whose fields or edges changed, ordered by id.
    pub blocks: Vec<Block>,
    /// Blocks removed, ordered by id.
    pub removed: Vec<NodeId>,
    /// Nodes among `story` and `blocks` whose edge list changed. Nodes not
    /// listed keep their stored edges as they are.
    pub rewired: BTreeSet<NodeId>,
}

impl GraphChanges {
    /// Returns `true` if nothing needs to be written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.story.is_none() && self.blocks.is_empty() && self.removed.is_empty()
    }
}

/// A story root together with all of its blocks.
#[derive(Debug, Clone)]
pub struct StoryGraph {
    story: Story,
    blocks: BTreeMap<NodeId, Block>,
    touched: BTreeSet<NodeId>,
    rewired: BTreeSet<NodeId>,
    removed: BTreeSet<NodeId>,
}

impl StoryGraph {
    /// Builds a graph from a root and its blocks. Blocks that belong to
    /// another story are ignored.
    #[must_use]
    pub fn new(story: Story, blocks: impl IntoIterator<Item = Block>) -> Self {
        let blocks = blocks
            .into_iter()
            .filter(|b| b.story_id == story.id)
            .map(|b| (b.id, b))
            .collect();
        Self {
            story,
            blocks,
            touched: BTreeSet::new(),
            rewired: BTreeSet::new(),
            removed: BTreeSet::new(),
        }
    }

    /// The story root.
    #[must_use]
    pub fn story(&self) -> &Story {
        &self.story
    }

    /// The root id, which is also the story id.
    #[must_use]
    pub fn root_id(&self) -> NodeId {
        self.story.id
    }

    /// A live block of this story.
    #[must_use]
    pub fn block(&self, id: NodeId) -> Option<&Block> {
        self.blocks.get(&id)
    }

    /// Live blocks, ordered by id.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    /// Returns `true` if `id` is the root or a live block of this story.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        id == self.story.id || self.blocks.contains_key(&id)
    }

    /// The edges of a node, if it is part of the graph.
    #[must_use]
    pub fn edges(&self, id: NodeId) -> Option<&[Edge]> {
        if id == self.story.id {
            Some(&self.story.edges)
        } else {
            self.blocks.get(&id).map(|b| b.edges.as_slice())
        }
    }

    /// Mutable edges of a node; marks the node's edges as changed.
    pub fn edges_mut(&mut self, id: NodeId) -> Option<&mut Vec<Edge>> {
        if id == self.story.id {
            self.rewire(id);
            return Some(&mut self.story.edges);
        }
        if !self.blocks.contains_key(&id) {
            return None;
        }
        self.rewire(id);
        self.blocks.get_mut(&id).map(|b| &mut b.edges)
    }

    fn rewire(&mut self, id: NodeId) {
        self.touched.insert(id);
        self.rewired.insert(id);
    }

    /// Replaces a node's body text. Returns `false` if the node is gone.
    pub fn set_body(&mut self, id: NodeId, body: &str) -> bool {
        let slot = if id == self.story.id {
            &mut self.story.body
        } else {
            match self.blocks.get_mut(&id) {
                Some(block) => &mut block.body,
                None => return false,
            }
        };
        if slot.as_str() != body {
            body.clone_into(slot);
            self.touched.insert(id);
        }
        true
    }

    /// Replaces the story title.
    pub fn set_title(&mut self, title: &str) {
        if self.story.title != title {
            title.clone_into(&mut self.story.title);
            self.touched.insert(self.story.id);
        }
    }

    /// Adds a block that was just created in the store.
    pub fn insert_block(&mut self, block: Block) {
        debug_assert_eq!(block.story_id, self.story.id);
        self.blocks.insert(block.id, block);
    }

    fn all_edges(&self) -> impl Iterator<Item = (NodeId, &Edge)> {
        let root = self.story.edges.iter().map(|e| (self.story.id, e));
        let blocks = self
            .blocks
            .values()
            .flat_map(|b| b.edges.iter().map(move |e| (b.id, e)));
        root.chain(blocks)
    }

    /// Number of edges across the story targeting each node id. Ids with no
    /// incoming edge are absent.
    #[must_use]
    pub fn reference_counts(&self) -> BTreeMap<NodeId, usize> {
        let mut counts = BTreeMap::new();
        for (_, edge) in self.all_edges() {
            *counts.entry(edge.target).or_insert(0) += 1;
        }
        counts
    }

    /// Number of edges across the story targeting `id`.
    #[must_use]
    pub fn reference_count(&self, id: NodeId) -> usize {
        self.all_edges().filter(|(_, e)| e.target == id).count()
    }

    /// Deletes `target` and every block whose reference count drops to zero
    /// as a consequence, then strips edges to the deleted blocks from every
    /// survivor. Returns the deleted ids in deletion order; empty if
    /// `target` is not a live block.
    ///
    /// `target` itself is deleted whatever its count. The root is never
    /// deleted.
    pub fn cascade_delete(&mut self, target: NodeId) -> Vec<NodeId> {
        if !self.blocks.contains_key(&target) {
            return Vec::new();
        }
        let mut counts = self.reference_counts();
        let mut deleted = Vec::new();
        let mut pending = vec![target];

        while let Some(id) = pending.pop() {
            // A node can be queued again after it is gone; the map is the guard.
            let Some(block) = self.blocks.remove(&id) else {
                continue;
            };
            deleted.push(id);
            // Reverse so children are visited in edge order.
            for edge in block.edges.iter().rev() {
                let Some(count) = counts.get_mut(&edge.target) else {
                    continue;
                };
                *count = count.saturating_sub(1);
                if *count == 0 && edge.target != self.story.id {
                    pending.push(edge.target);
                }
            }
        }

        self.forget(&deleted);
        deleted
    }

    /// Ids of live blocks not reachable from the root by following edges.
    #[must_use]
    pub fn unreachable_from_root(&self) -> Vec<NodeId> {
        let mut seen = BTreeSet::from([self.story.id]);
        let mut queue = VecDeque::from([self.story.id]);
        while let Some(id) = queue.pop_front() {
            for edge in self.edges(id).unwrap_or_default() {
                if self.blocks.contains_key(&edge.target) && seen.insert(edge.target) {
                    queue.push_back(edge.target);
                }
            }
        }
        self.blocks
            .keys()
            .filter(|id| !seen.contains(id))
            .copied()
            .collect()
    }

    /// Mark-and-sweep: deletes every block unreachable from the root,
    /// including cycles, and strips edges to them. Returns the deleted ids.
    pub fn collect_unreachable(&mut self) -> Vec<NodeId> {
        let garbage = self.unreachable_from_root();
        for id in &garbage {
            self.blocks.remove(id);
        }
        self.forget(&garbage);
        garbage
    }

    /// Edges whose target is neither the root nor a live block.
    #[must_use]
    pub fn dangling_edges(&self) -> Vec<DanglingEdge> {
        self.all_edges()
            .filter(|(_, e)| !self.contains(e.target))
            .map(|(source, e)| DanglingEdge {
                source,
                target: e.target,
            })
            .collect()
    }

    /// Records `deleted` as removed and sweeps edges pointing at them.
    fn forget(&mut self, deleted: &[NodeId]) {
        if deleted.is_empty() {
            return;
        }
        let gone: BTreeSet<NodeId> = deleted.iter().copied().collect();
        for id in &gone {
            self.touched.remove(id);
            self.rewired.remove(id);
        }
        self.removed.extend(gone.iter().copied());

        let mut stripped = Vec::new();
        if strip_edges(&mut self.story.edges, &gone) {
            stripped.push(self.story.id);
        }
        for block in self.blocks.values_mut() {
            if strip_edges(&mut block.edges, &gone) {
                stripped.push(block.id);
            }
        }
        for id in stripped {
            self.rewire(id);
        }
    }

    /// Consumes the graph, returning the records that need writing.
    #[must_use]
    pub fn into_changes(mut self) -> GraphChanges {
        let story = self
            .touched
            .remove(&self.story.id)
            .then_some(self.story);
        let blocks = self
            .touched
            .iter()
            .filter_map(|id| self.blocks.remove(id))
            .collect();
        GraphChanges {
            story,
            blocks,
            removed: self.removed.into_iter().collect(),
            rewired: self.rewired,
        }
    }
}

fn strip_edges(edges: &mut Vec<Edge>, gone: &BTreeSet<NodeId>) -> bool {
    let before = edges.len();
    edges.retain(|e| !gone.contains(&e.target));
    edges.len() != before
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use talegraph_core::node::{Privacy, UserId};

    use super::*;

    const ROOT: NodeId = NodeId(1);

    fn story(edges: Vec<Edge>) -> Story {
        let at = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        Story {
            id: ROOT,
            owner_id: UserId(1),
            title: "The Cave".into(),
            body: "It is dark.".into(),
            privacy: Privacy::Public,
            edges,
            created_at: at,
            updated_at: at,
        }
    }

    fn block(id: i64, edges: Vec<Edge>) -> Block {
        let at = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        Block {
            id: NodeId(id),
            story_id: ROOT,
            owner_id: UserId(1),
            body: String::new(),
            edges,
            created_at: at,
            updated_at: at,
        }
    }

    fn edge(target: i64) -> Edge {
        Edge::new(NodeId(target), format!("to {target}"))
    }

    fn ids(values: &[i64]) -> Vec<NodeId> {
        values.iter().copied().map(NodeId).collect()
    }

    /// root -> 2 -> 3 -> 4, root -> 5
    fn chain() -> StoryGraph {
        StoryGraph::new(
            story(vec![edge(2), edge(5)]),
            vec![
                block(2, vec![edge(3)]),
                block(3, vec![edge(4)]),
                block(4, vec![]),
                block(5, vec![]),
            ],
        )
    }

    #[test]
    fn test_reference_counts_include_root_edges_and_duplicates() {
        let graph = StoryGraph::new(
            story(vec![edge(2), edge(2)]),
            vec![block(2, vec![edge(3)]), block(3, vec![edge(1)])],
        );

        let counts = graph.reference_counts();

        assert_eq!(counts.get(&NodeId(2)), Some(&2));
        assert_eq!(counts.get(&NodeId(3)), Some(&1));
        assert_eq!(counts.get(&ROOT), Some(&1));
        assert_eq!(graph.reference_count(NodeId(4)), 0);
    }

    #[test]
    fn test_blocks_from_other_stories_are_ignored() {
        let mut foreign = block(9, vec![]);
        foreign.story_id = NodeId(99);

        let graph = StoryGraph::new(story(vec![]), vec![foreign]);

        assert!(!graph.contains(NodeId(9)));
    }

    #[test]
    fn test_cascade_delete_removes_whole_private_chain() {
        let mut graph = chain();

        let deleted = graph.cascade_delete(NodeId(2));

        assert_eq!(deleted, ids(&[2, 3, 4]));
        assert!(graph.contains(NodeId(5)));
        assert_eq!(graph.story().edges, vec![edge(5)]);
        assert!(graph.dangling_edges().is_empty());
    }

    #[test]
    fn test_cascade_delete_keeps_shared_child_until_last_reference() {
        // root -> A, root -> B, A -> C, B -> C
        let mut graph = StoryGraph::new(
            story(vec![edge(2), edge(3)]),
            vec![
                block(2, vec![edge(4)]),
                block(3, vec![edge(4)]),
                block(4, vec![]),
            ],
        );
        assert_eq!(graph.reference_count(NodeId(4)), 2);

        let first = graph.cascade_delete(NodeId(2));
        assert_eq!(first, ids(&[2]));
        assert!(graph.contains(NodeId(4)));
        assert_eq!(graph.reference_count(NodeId(4)), 1);

        let second = graph.cascade_delete(NodeId(3));
        assert_eq!(second, ids(&[3, 4]));
        assert!(!graph.contains(NodeId(4)));
        assert_eq!(graph.story().edges, Vec::<Edge>::new());
    }

    #[test]
    fn test_cascade_delete_target_is_removed_even_if_referenced_elsewhere() {
        // root -> 2, root -> 3, 3 -> 2
        let mut graph = StoryGraph::new(
            story(vec![edge(2), edge(3)]),
            vec![block(2, vec![]), block(3, vec![edge(2)])],
        );

        let deleted = graph.cascade_delete(NodeId(2));

        assert_eq!(deleted, ids(&[2]));
        assert_eq!(graph.block(NodeId(3)).unwrap().edges, Vec::<Edge>::new());
        assert_eq!(graph.story().edges, vec![edge(3)]);
        assert!(graph.dangling_edges().is_empty());
    }

    #[test]
    fn test_cascade_delete_never_removes_root() {
        // root -> 2 -> root
        let mut graph = StoryGraph::new(story(vec![edge(2)]), vec![block(2, vec![edge(1)])]);

        let deleted = graph.cascade_delete(NodeId(2));

        assert_eq!(deleted, ids(&[2]));
        assert!(graph.contains(ROOT));
        assert!(graph.story().edges.is_empty());
    }

    #[test]
    fn test_cascade_delete_of_missing_or_root_is_noop() {
        let mut graph = chain();

        assert!(graph.cascade_delete(NodeId(42)).is_empty());
        assert!(graph.cascade_delete(ROOT).is_empty());
        assert!(graph.into_changes().is_empty());
    }

    #[test]
    fn test_cascade_delete_follows_cycle_back_to_target() {
        // root -> 2, 2 -> 3, 3 -> 2
        let mut graph = StoryGraph::new(
            story(vec![edge(2)]),
            vec![block(2, vec![edge(3)]), block(3, vec![edge(2)])],
        );

        let deleted = graph.cascade_delete(NodeId(2));

        assert_eq!(deleted, ids(&[2, 3]));
        assert!(graph.dangling_edges().is_empty());
    }

    #[test]
    fn test_detached_cycle_survives_delete_but_not_collection() {
        // root -> 2, 2 -> 3, 3 -> 4, 4 -> 3: once 2 goes, {3, 4} keep each
        // other alive by count but are unreachable.
        let mut graph = StoryGraph::new(
            story(vec![edge(2)]),
            vec![
                block(2, vec![edge(3)]),
                block(3, vec![edge(4)]),
                block(4, vec![edge(3)]),
            ],
        );

        let deleted = graph.cascade_delete(NodeId(2));
        assert_eq!(deleted, ids(&[2]));
        assert_eq!(graph.unreachable_from_root(), ids(&[3, 4]));

        let collected = graph.collect_unreachable();
        assert_eq!(collected, ids(&[3, 4]));
        assert!(graph.unreachable_from_root().is_empty());
        assert!(graph.blocks().next().is_none());
    }

    #[test]
    fn test_into_changes_reports_touched_and_removed() {
        let mut graph = chain();

        graph.cascade_delete(NodeId(3));
        graph.set_body(NodeId(5), "A quiet room.");
        let changes = graph.into_changes();

        assert!(changes.story.is_none());
        assert_eq!(changes.removed, ids(&[3, 4]));
        let changed: Vec<NodeId> = changes.blocks.iter().map(|b| b.id).collect();
        assert_eq!(changed, ids(&[2, 5]));
        assert!(changes.blocks[0].edges.is_empty());
        assert!(changes.rewired.contains(&NodeId(2)));
    }

    #[test]
    fn test_body_only_change_leaves_edges_unmarked() {
        // Arrange
        let mut graph = chain();

        // Act
        graph.set_body(NodeId(5), "A quiet room.");
        graph.set_title("The Deep Cave");
        let changes = graph.into_changes();

        // Assert
        assert!(changes.story.is_some());
        assert_eq!(changes.blocks.len(), 1);
        assert!(changes.rewired.is_empty());
    }

    #[test]
    fn test_set_body_on_removed_block_returns_false() {
        let mut graph = chain();
        graph.cascade_delete(NodeId(4));

        assert!(!graph.set_body(NodeId(4), "gone"));
        assert!(graph.set_body(ROOT, "It is very dark."));
    }

    #[test]
    fn test_dangling_edges_reports_missing_targets() {
        let graph = StoryGraph::new(story(vec![edge(2), edge(77)]), vec![block(2, vec![edge(88)])]);

        assert_eq!(
            graph.dangling_edges(),
            vec![
                DanglingEdge {
                    source: ROOT,
                    target: NodeId(77)
                },
                DanglingEdge {
                    source: NodeId(2),
                    target: NodeId(88)
                },
            ]
        );
    }
}
