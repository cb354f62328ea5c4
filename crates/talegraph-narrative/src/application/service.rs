//! The entry point callers use: handlers plus per-story locking.

use std::sync::Arc;

use talegraph_core::clock::Clock;
use talegraph_core::error::DomainError;
use talegraph_core::node::{NodeId, UserId};
use talegraph_core::repository::GraphStore;

use crate::application::command_handlers::{
    self, CreatedStory, DeletedStory, EditReport,
};
use crate::application::locks::StoryLocks;
use crate::application::query_handlers::{
    self, BlockView, GraphAudit, StorySummary, StoryView,
};
use crate::application::settings::NarrativeSettings;
use crate::domain::commands::{
    CollectUnreachable, CreateStory, DeleteNode, DeleteStory, EditNode,
};
use crate::domain::visibility::ViewerPolicy;

/// Story-graph operations over a shared store.
///
/// Mutations on an existing story take that story's in-process lock before
/// opening a session, and the session takes the store-level lock as well,
/// so two writers never compute reference counts from the same snapshot.
/// Reads take no lock.
#[derive(Clone)]
pub struct NarrativeService {
    store: Arc<dyn GraphStore>,
    clock: Arc<dyn Clock>,
    settings: NarrativeSettings,
    locks: StoryLocks,
}

impl NarrativeService {
    /// Creates a service over `store`.
    #[must_use]
    pub fn new(
        store: Arc<dyn GraphStore>,
        clock: Arc<dyn Clock>,
        settings: NarrativeSettings,
    ) -> Self {
        Self {
            store,
            clock,
            settings,
            locks: StoryLocks::new(),
        }
    }

    /// See [`command_handlers::handle_create_story`].
    ///
    /// # Errors
    ///
    /// Propagates the handler's errors.
    pub async fn create_story(&self, command: &CreateStory) -> Result<CreatedStory, DomainError> {
        command_handlers::handle_create_story(command, self.clock.as_ref(), self.store.as_ref())
            .await
    }

    /// See [`command_handlers::handle_edit_node`].
    ///
    /// # Errors
    ///
    /// Propagates the handler's errors.
    pub async fn edit_node(&self, command: &EditNode) -> Result<EditReport, DomainError> {
        let story_id = query_handlers::story_id_of(self.store.as_ref(), command.node_id).await?;
        let _guard = self.locks.acquire(story_id).await;
        command_handlers::handle_edit_node(
            command,
            self.clock.as_ref(),
            self.store.as_ref(),
            &self.settings,
        )
        .await
    }

    /// See [`command_handlers::handle_delete_node`].
    ///
    /// # Errors
    ///
    /// Propagates the handler's errors.
    pub async fn delete_node(&self, command: &DeleteNode) -> Result<Vec<NodeId>, DomainError> {
        let story_id = self
            .store
            .get_block(command.block_id)
            .await?
            .ok_or_else(|| DomainError::block_not_found(command.block_id))?
            .story_id;
        let _guard = self.locks.acquire(story_id).await;
        command_handlers::handle_delete_node(command, self.clock.as_ref(), self.store.as_ref())
            .await
    }

    /// See [`command_handlers::handle_delete_story`].
    ///
    /// # Errors
    ///
    /// Propagates the handler's errors.
    pub async fn delete_story(&self, command: &DeleteStory) -> Result<DeletedStory, DomainError> {
        let _guard = self.locks.acquire(command.story_id).await;
        command_handlers::handle_delete_story(command, self.store.as_ref()).await
    }

    /// See [`command_handlers::handle_collect_unreachable`].
    ///
    /// # Errors
    ///
    /// Propagates the handler's errors.
    pub async fn collect_unreachable(
        &self,
        command: &CollectUnreachable,
    ) -> Result<Vec<NodeId>, DomainError> {
        let _guard = self.locks.acquire(command.story_id).await;
        command_handlers::handle_collect_unreachable(
            command,
            self.clock.as_ref(),
            self.store.as_ref(),
        )
        .await
    }

    /// Lists stories visible to `viewer`, newest first. `limit` falls back
    /// to the configured default and is clamped to the listing maximum.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Persistence` if the store read fails.
    pub async fn list_visible(
        &self,
        viewer: Option<UserId>,
        limit: Option<i64>,
    ) -> Result<Vec<StorySummary>, DomainError> {
        let limit = ViewerPolicy::clamp_limit(limit, self.settings.visible_limit);
        query_handlers::list_visible(self.store.as_ref(), viewer, limit).await
    }

    /// See [`query_handlers::get_story_view`].
    ///
    /// # Errors
    ///
    /// Propagates the handler's errors.
    pub async fn story_view(
        &self,
        story_id: NodeId,
        viewer: Option<UserId>,
    ) -> Result<StoryView, DomainError> {
        query_handlers::get_story_view(self.store.as_ref(), story_id, viewer).await
    }

    /// See [`query_handlers::get_block_view`].
    ///
    /// # Errors
    ///
    /// Propagates the handler's errors.
    pub async fn block_view(
        &self,
        block_id: NodeId,
        viewer: Option<UserId>,
    ) -> Result<BlockView, DomainError> {
        query_handlers::get_block_view(self.store.as_ref(), block_id, viewer).await
    }

    /// See [`query_handlers::audit_story`].
    ///
    /// # Errors
    ///
    /// Propagates the handler's errors.
    pub async fn audit_story(
        &self,
        story_id: NodeId,
        viewer: Option<UserId>,
    ) -> Result<GraphAudit, DomainError> {
        query_handlers::audit_story(self.store.as_ref(), story_id, viewer).await
    }
}
