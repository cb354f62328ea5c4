//! Who may see and who may change a story graph.

use talegraph_core::error::DomainError;
use talegraph_core::node::{Block, NodeId, Story, UserId};
use talegraph_core::repository::StoryFilter;

/// Default number of stories in a listing.
pub const DEFAULT_VISIBLE_LIMIT: i64 = 10;

/// Upper bound on a listing, whatever the caller asks for.
pub const MAX_VISIBLE_LIMIT: i64 = 100;

/// Read-side policy: public stories for everyone, private stories for their
/// owner only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewerPolicy {
    viewer: Option<UserId>,
}

impl ViewerPolicy {
    /// Policy for `viewer`; `None` is an anonymous reader.
    #[must_use]
    pub fn new(viewer: Option<UserId>) -> Self {
        Self { viewer }
    }

    /// The store filter implementing this policy.
    #[must_use]
    pub fn filter(self) -> StoryFilter {
        StoryFilter::VisibleTo(self.viewer)
    }

    /// Resolves a requested listing size: `default` when absent, then
    /// clamped to `1..=MAX_VISIBLE_LIMIT`.
    #[must_use]
    pub fn clamp_limit(requested: Option<i64>, default: i64) -> i64 {
        requested.unwrap_or(default).clamp(1, MAX_VISIBLE_LIMIT)
    }

    /// Checks that the viewer may read `story` and its blocks.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Unauthorized` for a private story the viewer
    /// does not own.
    pub fn ensure_can_view(self, story: &Story) -> Result<(), DomainError> {
        if self.filter().matches(story) {
            return Ok(());
        }
        Err(DomainError::Unauthorized {
            // Anonymous readers are reported as user 0.
            actor: self.viewer.unwrap_or(UserId(0)),
            node: story.id,
        })
    }
}

/// Checks that `actor` may edit or delete `block`, or the root when `block`
/// is `None`: the story owner may
/// touch every node, a block's creator may touch that block.
///
/// # Errors
///
/// Returns `DomainError::Unauthorized` otherwise.
pub fn ensure_can_modify(
    actor: UserId,
    story: &Story,
    block: Option<&Block>,
) -> Result<(), DomainError> {
    let node_id: NodeId = block.map_or(story.id, |b| b.id);
    if actor == story.owner_id || block.is_some_and(|b| b.owner_id == actor) {
        Ok(())
    } else {
        Err(DomainError::Unauthorized {
            actor,
            node: node_id,
        })
    }
}

/// Checks that `actor` owns `story`.
///
/// # Errors
///
/// Returns `DomainError::Unauthorized` otherwise.
pub fn ensure_story_owner(actor: UserId, story: &Story) -> Result<(), DomainError> {
    ensure_can_modify(actor, story, None)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use talegraph_core::node::Privacy;

    use super::*;

    fn story(owner: i64, privacy: Privacy) -> Story {
        let at = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        Story {
            id: NodeId(1),
            owner_id: UserId(owner),
            title: "The Cave".into(),
            body: String::new(),
            privacy,
            edges: Vec::new(),
            created_at: at,
            updated_at: at,
        }
    }

    fn block(owner: i64) -> Block {
        let at = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        Block {
            id: NodeId(2),
            story_id: NodeId(1),
            owner_id: UserId(owner),
            body: String::new(),
            edges: Vec::new(),
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_clamp_limit_defaults_and_bounds() {
        assert_eq!(ViewerPolicy::clamp_limit(None, DEFAULT_VISIBLE_LIMIT), 10);
        assert_eq!(ViewerPolicy::clamp_limit(Some(3), DEFAULT_VISIBLE_LIMIT), 3);
        assert_eq!(ViewerPolicy::clamp_limit(Some(0), DEFAULT_VISIBLE_LIMIT), 1);
        assert_eq!(ViewerPolicy::clamp_limit(Some(5_000), DEFAULT_VISIBLE_LIMIT), 100);
        assert_eq!(ViewerPolicy::clamp_limit(None, 500), 100);
    }

    #[test]
    fn test_private_story_hidden_from_others() {
        let private = story(1, Privacy::Private);

        assert!(ViewerPolicy::new(Some(UserId(1))).ensure_can_view(&private).is_ok());
        assert!(matches!(
            ViewerPolicy::new(Some(UserId(2))).ensure_can_view(&private),
            Err(DomainError::Unauthorized { .. })
        ));
        assert!(ViewerPolicy::new(None).ensure_can_view(&private).is_err());
    }

    #[test]
    fn test_story_owner_may_modify_any_block() {
        let story = story(1, Privacy::Public);
        assert!(ensure_can_modify(UserId(1), &story, Some(&block(9))).is_ok());
    }

    #[test]
    fn test_block_creator_may_modify_own_block_only() {
        let story = story(1, Privacy::Public);
        assert!(ensure_can_modify(UserId(9), &story, Some(&block(9))).is_ok());
        assert!(ensure_story_owner(UserId(9), &story).is_err());

        match ensure_can_modify(UserId(7), &story, Some(&block(9))) {
            Err(DomainError::Unauthorized { actor, node }) => {
                assert_eq!(actor, UserId(7));
                assert_eq!(node, NodeId(2));
            }
            other => panic!("expected Unauthorized, got {other:?}"),
        }
    }
}
