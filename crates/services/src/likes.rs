use std::sync::Arc;

use domains::{CommentId, DomainError, LikeDelta, LikeRepository, LikeTarget, Result};
use tracing::{info, instrument};

use crate::accounts::AccountService;
use crate::deadline::Deadline;

/// Builds the like target from the optional `comment` / `thread` request fields.
/// Exactly one of them must be present and non-empty.
pub fn target_from(comment: Option<&str>, thread: Option<&str>) -> Result<LikeTarget> {
    let comment = comment.filter(|c| !c.is_empty());
    let thread = thread.filter(|t| !t.is_empty());
    match (comment, thread) {
        (Some(comment), None) => CommentId::from_transport(comment).map(LikeTarget::Comment),
        (None, Some(thread)) => Ok(LikeTarget::Thread(thread.to_string())),
        (Some(_), Some(_)) => Err(DomainError::validation(
            "Specify either a comment or a thread to like, not both",
        )),
        (None, None) => Err(DomainError::validation(
            "A comment or thread to like is required",
        )),
    }
}

/// Toggles likes in the account ledger together with the target's counter.
#[derive(Clone)]
pub struct LikeService {
    auth: AccountService,
    likes: Arc<dyn LikeRepository>,
    deadline: Deadline,
}

impl LikeService {
    pub fn new(auth: AccountService, likes: Arc<dyn LikeRepository>, deadline: Deadline) -> Self {
        Self {
            auth,
            likes,
            deadline,
        }
    }

    /// Likes `target` if the user has not, unlikes it otherwise.
    ///
    /// The store moves the ledger and the counter as one unit. An overrun
    /// deadline surfaces as `Unavailable` and the outcome is whatever the
    /// store committed, ledger and counter still in agreement.
    #[instrument(skip(self, password))]
    pub async fn update_like_count(
        &self,
        username: &str,
        password: &str,
        target: &LikeTarget,
    ) -> Result<LikeDelta> {
        self.auth.authorize(username, password).await?;
        let delta = self
            .deadline
            .run("toggle like", self.likes.toggle_like(username, target))
            .await?;
        info!(key = target.key(), ?delta, "like toggled");
        Ok(delta)
    }
}
