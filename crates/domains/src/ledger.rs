//! # Like Ledger
//!
//! Per-account membership sets of liked comments and threads. The ledger is
//! the source of truth for "has this account liked X"; target like counters are
//! a materialized view that the like store moves by the delta a toggle returns.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::ids::CommentId;

/// Which like set a target lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LikeKind {
    Comment,
    Thread,
}

/// Something an account can like.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LikeTarget {
    Comment(CommentId),
    Thread(String),
}

impl LikeTarget {
    pub fn kind(&self) -> LikeKind {
        match self {
            Self::Comment(_) => LikeKind::Comment,
            Self::Thread(_) => LikeKind::Thread,
        }
    }

    /// The target's key in its store.
    pub fn key(&self) -> &str {
        match self {
            Self::Comment(id) => id.as_str(),
            Self::Thread(title) => title,
        }
    }
}

/// Result of a toggle: the direction the target's counter must move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LikeDelta {
    Liked,
    Unliked,
}

impl LikeDelta {
    /// Signed amount to apply to the target's like count.
    pub fn amount(self) -> i64 {
        match self {
            Self::Liked => 1,
            Self::Unliked => -1,
        }
    }
}

/// The liked-target sets of a single account.
///
/// Comment IDs always contain the ID delimiter and thread titles never do, so
/// no key can sit in both sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeLedger {
    pub comments: BTreeSet<CommentId>,
    pub threads: BTreeSet<String>,
}

impl LikeLedger {
    pub fn contains(&self, target: &LikeTarget) -> bool {
        match target {
            LikeTarget::Comment(id) => self.comments.contains(id),
            LikeTarget::Thread(title) => self.threads.contains(title),
        }
    }

    /// Flips membership of `target`: present → removed (`Unliked`), absent → added (`Liked`).
    pub fn toggle(&mut self, target: &LikeTarget) -> LikeDelta {
        let was_present = match target {
            LikeTarget::Comment(id) => {
                let removed = self.comments.remove(id);
                if !removed {
                    self.comments.insert(id.clone());
                }
                removed
            }
            LikeTarget::Thread(title) => {
                let removed = self.threads.remove(title);
                if !removed {
                    self.threads.insert(title.clone());
                }
                removed
            }
        };
        if was_present {
            LikeDelta::Unliked
        } else {
            LikeDelta::Liked
        }
    }

    /// Drops the thread and all of its comments. Returns how many entries went away.
    pub fn forget_thread(&mut self, title: &str) -> usize {
        let before = self.comments.len() + self.threads.len();
        self.comments.retain(|id| !id.belongs_to(title));
        self.threads.remove(title);
        before - (self.comments.len() + self.threads.len())
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty() && self.threads.is_empty()
    }
}
