//! # Comment Tree Builder
//!
//! Hydrates a comment forest from the flat comment store. Loading is
//! breadth-first into an arena keyed by ID (one batched store call per tree
//! level); assembly is a pure recursive pass over that arena. Records in the
//! store are never modified.
//!
//! Malformed data is tolerated: IDs that do not resolve are skipped, and a node
//! already placed in the forest is not placed again, so a cycle in `children`
//! ends the branch instead of recursing forever.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use domains::{Comment, CommentId, CommentRepository, CommentTree, Result};
use tracing::warn;

use crate::deadline::Deadline;

/// Deepest level hydrated below a top-level comment.
pub const MAX_TREE_DEPTH: usize = 256;

#[derive(Clone)]
pub struct CommentTreeBuilder {
    comments: Arc<dyn CommentRepository>,
    deadline: Deadline,
}

impl CommentTreeBuilder {
    pub fn new(comments: Arc<dyn CommentRepository>, deadline: Deadline) -> Self {
        Self { comments, deadline }
    }

    /// Hydrates every root in order.
    pub async fn load_forest(&self, roots: &[CommentId]) -> Result<Vec<CommentTree>> {
        let arena = self.load_arena(roots).await?;
        Ok(assemble_forest(roots, &arena))
    }

    /// Hydrates the subtree rooted at `id`. `None` if the root does not exist.
    pub async fn load_tree(&self, id: &CommentId) -> Result<Option<CommentTree>> {
        let roots = std::slice::from_ref(id);
        let arena = self.load_arena(roots).await?;
        Ok(assemble_forest(roots, &arena).into_iter().next())
    }

    async fn load_arena(&self, roots: &[CommentId]) -> Result<HashMap<CommentId, Comment>> {
        let mut arena = HashMap::new();
        let mut seen: HashSet<CommentId> = HashSet::new();
        let mut frontier: Vec<CommentId> = roots
            .iter()
            .filter(|id| seen.insert((*id).clone()))
            .cloned()
            .collect();

        let mut depth = 0;
        while !frontier.is_empty() && depth <= MAX_TREE_DEPTH {
            let level = self
                .deadline
                .run("load comments", self.comments.load_many(&frontier))
                .await?;
            let mut next = Vec::new();
            for comment in level {
                for child in &comment.children {
                    if seen.insert(child.clone()) {
                        next.push(child.clone());
                    }
                }
                arena.insert(comment.id.clone(), comment);
            }
            frontier = next;
            depth += 1;
        }
        Ok(arena)
    }
}

/// Builds trees for `roots` out of an already-loaded arena.
pub fn assemble_forest(roots: &[CommentId], arena: &HashMap<CommentId, Comment>) -> Vec<CommentTree> {
    let mut placed = HashSet::new();
    roots
        .iter()
        .filter_map(|id| assemble(id, arena, &mut placed, 0))
        .collect()
}

fn assemble(
    id: &CommentId,
    arena: &HashMap<CommentId, Comment>,
    placed: &mut HashSet<CommentId>,
    depth: usize,
) -> Option<CommentTree> {
    if depth > MAX_TREE_DEPTH {
        warn!(comment_id = %id, "comment tree deeper than {MAX_TREE_DEPTH}, truncating");
        return None;
    }
    let Some(comment) = arena.get(id) else {
        warn!(comment_id = %id, "dangling comment reference skipped");
        return None;
    };
    if !placed.insert(id.clone()) {
        warn!(comment_id = %id, "comment referenced twice (cycle?), skipped");
        return None;
    }
    let replies = comment
        .children
        .iter()
        .filter_map(|child| assemble(child, arena, placed, depth + 1))
        .collect();
    Some(CommentTree {
        comment: comment.clone(),
        replies,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domains::MockCommentRepository;

    fn comment(seq: u64, children: &[u64]) -> Comment {
        let mut c = Comment::new(CommentId::mint(seq, "T"), "u", format!("c{seq}"), None, Utc::now());
        c.children = children.iter().map(|s| CommentId::mint(*s, "T")).collect();
        c
    }

    fn arena(comments: Vec<Comment>) -> HashMap<CommentId, Comment> {
        comments.into_iter().map(|c| (c.id.clone(), c)).collect()
    }

    fn ids(seqs: &[u64]) -> Vec<CommentId> {
        seqs.iter().map(|s| CommentId::mint(*s, "T")).collect()
    }

    #[test]
    fn assembles_nested_replies_in_order() {
        let store = arena(vec![comment(1, &[3, 2]), comment(2, &[4]), comment(3, &[]), comment(4, &[]), comment(5, &[])]);
        let forest = assemble_forest(&ids(&[1, 5]), &store);

        assert_eq!(forest.len(), 2);
        let first = &forest[0];
        assert_eq!(first.replies[0].comment.id, CommentId::mint(3, "T"));
        assert_eq!(first.replies[1].comment.id, CommentId::mint(2, "T"));
        assert_eq!(first.replies[1].replies[0].comment.body, "c4");
        assert_eq!(first.size(), 4);
    }

    #[test]
    fn missing_children_are_skipped() {
        let store = arena(vec![comment(1, &[2, 9])]);
        let forest = assemble_forest(&ids(&[1, 8]), &store);
        assert_eq!(forest.len(), 1);
        assert!(forest[0].replies.is_empty());
    }

    #[test]
    fn cycles_terminate() {
        let store = arena(vec![comment(1, &[2]), comment(2, &[1, 2])]);
        let forest = assemble_forest(&ids(&[1]), &store);
        assert_eq!(forest[0].size(), 2);
    }

    #[tokio::test]
    async fn loads_one_level_per_store_call() {
        let mut repo = MockCommentRepository::new();
        let mut seq = mockall::Sequence::new();
        repo.expect_load_many()
            .withf(|ids: &[CommentId]| ids.len() == 1 && ids[0] == CommentId::mint(1, "T"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![comment(1, &[2, 3])]));
        repo.expect_load_many()
            .withf(|ids: &[CommentId]| ids.len() == 2)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![comment(2, &[]), comment(3, &[1])]));

        let builder = CommentTreeBuilder::new(Arc::new(repo), Deadline::default());
        let tree = builder.load_tree(&CommentId::mint(1, "T")).await.unwrap().unwrap();
        assert_eq!(tree.size(), 3);
    }
}
