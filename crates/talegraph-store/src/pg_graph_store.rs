//! `PostgreSQL` implementation of the `GraphStore` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgExecutor, PgPool, Postgres, QueryBuilder, Transaction};
use tracing::{debug, warn};

use talegraph_core::codec::EdgeCodec;
use talegraph_core::error::DomainError;
use talegraph_core::node::{Block, Edge, NodeId, Privacy, Story, UserId};
use talegraph_core::repository::{
    BlockUpdate, GraphSession, GraphStore, StoryFilter, StoryOrder, StoryUpdate,
};

const STORY_COLUMNS: &str =
    "id, owner_id, title, body, privacy, edges::text AS edges, created_at, updated_at";
const BLOCK_COLUMNS: &str =
    "id, story_id, owner_id, body, edges::text AS edges, created_at, updated_at";

#[derive(Debug, FromRow)]
struct StoryRow {
    id: i64,
    owner_id: i64,
    title: String,
    body: String,
    privacy: bool,
    edges: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<StoryRow> for Story {
    fn from(row: StoryRow) -> Self {
        let id = NodeId(row.id);
        Self {
            id,
            owner_id: UserId(row.owner_id),
            title: row.title,
            body: row.body,
            privacy: Privacy::from_flag(row.privacy),
            edges: decode_edges(id, &row.edges),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct BlockRow {
    id: i64,
    story_id: i64,
    owner_id: i64,
    body: String,
    edges: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BlockRow> for Block {
    fn from(row: BlockRow) -> Self {
        let id = NodeId(row.id);
        Self {
            id,
            story_id: NodeId(row.story_id),
            owner_id: UserId(row.owner_id),
            body: row.body,
            edges: decode_edges(id, &row.edges),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Decodes a stored edge list, logging (but tolerating) malformed data.
fn decode_edges(node_id: NodeId, raw: &str) -> Vec<Edge> {
    match EdgeCodec::try_decode(raw) {
        Ok(edges) => edges,
        Err(e) => {
            warn!(%node_id, error = %e, "stored edge list is unreadable; treating as empty");
            Vec::new()
        }
    }
}

fn persistence(context: &str, err: sqlx::Error) -> DomainError {
    DomainError::Persistence(format!("{context}: {err}"))
}

async fn fetch_story<'e>(
    executor: impl PgExecutor<'e>,
    id: NodeId,
) -> Result<Option<Story>, DomainError> {
    let row: Option<StoryRow> =
        sqlx::query_as(&format!("SELECT {STORY_COLUMNS} FROM stories WHERE id = $1"))
            .bind(id.0)
            .fetch_optional(executor)
            .await
            .map_err(|e| persistence("failed to load story", e))?;
    Ok(row.map(Story::from))
}

async fn fetch_block<'e>(
    executor: impl PgExecutor<'e>,
    id: NodeId,
) -> Result<Option<Block>, DomainError> {
    let row: Option<BlockRow> =
        sqlx::query_as(&format!("SELECT {BLOCK_COLUMNS} FROM blocks WHERE id = $1"))
            .bind(id.0)
            .fetch_optional(executor)
            .await
            .map_err(|e| persistence("failed to load block", e))?;
    Ok(row.map(Block::from))
}

async fn fetch_blocks_by_story<'e>(
    executor: impl PgExecutor<'e>,
    story_id: NodeId,
) -> Result<Vec<Block>, DomainError> {
    let rows: Vec<BlockRow> = sqlx::query_as(&format!(
        "SELECT {BLOCK_COLUMNS} FROM blocks WHERE story_id = $1 ORDER BY id"
    ))
    .bind(story_id.0)
    .fetch_all(executor)
    .await
    .map_err(|e| persistence("failed to load story blocks", e))?;
    Ok(rows.into_iter().map(Block::from).collect())
}

/// PostgreSQL-backed story-graph store.
#[derive(Debug, Clone)]
pub struct PgGraphStore {
    pool: PgPool,
}

impl PgGraphStore {
    /// Creates a new `PgGraphStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GraphStore for PgGraphStore {
    async fn begin(&self) -> Result<Box<dyn GraphSession>, DomainError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| persistence("failed to start transaction", e))?;
        Ok(Box::new(PgGraphSession { tx }))
    }

    async fn get_story(&self, id: NodeId) -> Result<Option<Story>, DomainError> {
        fetch_story(&self.pool, id).await
    }

    async fn get_block(&self, id: NodeId) -> Result<Option<Block>, DomainError> {
        fetch_block(&self.pool, id).await
    }

    async fn list_blocks_by_story(&self, story_id: NodeId) -> Result<Vec<Block>, DomainError> {
        fetch_blocks_by_story(&self.pool, story_id).await
    }

    async fn list_stories(
        &self,
        filter: StoryFilter,
        limit: i64,
        order: StoryOrder,
    ) -> Result<Vec<Story>, DomainError> {
        let mut query = QueryBuilder::<Postgres>::new(format!("SELECT {STORY_COLUMNS} FROM stories"));
        match filter {
            StoryFilter::All => {}
            StoryFilter::VisibleTo(viewer) => {
                query
                    .push(" WHERE privacy = FALSE OR owner_id = ")
                    .push_bind(viewer.map(|v| v.0));
            }
            StoryFilter::OwnedBy(owner) => {
                query.push(" WHERE owner_id = ").push_bind(owner.0);
            }
        }
        query.push(match order {
            StoryOrder::NewestFirst => " ORDER BY id DESC",
            StoryOrder::OldestFirst => " ORDER BY id ASC",
        });
        query.push(" LIMIT ").push_bind(limit);

        let rows: Vec<StoryRow> = query
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| persistence("failed to list stories", e))?;
        Ok(rows.into_iter().map(Story::from).collect())
    }
}

/// One `PostgreSQL` transaction. Dropping it without `commit` rolls back.
pub struct PgGraphSession {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl GraphSession for PgGraphSession {
    async fn lock_story(&mut self, story_id: NodeId) -> Result<(), DomainError> {
        let locked: Option<i64> = sqlx::query_scalar("SELECT id FROM stories WHERE id = $1 FOR UPDATE")
            .bind(story_id.0)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| persistence("failed to lock story", e))?;
        match locked {
            Some(_) => Ok(()),
            None => Err(DomainError::story_not_found(story_id)),
        }
    }

    async fn create_story(
        &mut self,
        owner_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Story, DomainError> {
        let row: StoryRow = sqlx::query_as(&format!(
            "INSERT INTO stories (owner_id, created_at, updated_at) VALUES ($1, $2, $2) \
             RETURNING {STORY_COLUMNS}"
        ))
        .bind(owner_id.0)
        .bind(now)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| persistence("failed to create story", e))?;
        debug!(story_id = row.id, "story row inserted");
        Ok(row.into())
    }

    async fn get_story(&mut self, id: NodeId) -> Result<Option<Story>, DomainError> {
        fetch_story(&mut *self.tx, id).await
    }

    async fn update_story(
        &mut self,
        id: NodeId,
        update: StoryUpdate,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            "UPDATE stories SET \
                title = COALESCE($2, title), \
                body = COALESCE($3, body), \
                privacy = COALESCE($4, privacy), \
                edges = COALESCE($5::jsonb, edges), \
                updated_at = $6 \
             WHERE id = $1",
        )
        .bind(id.0)
        .bind(update.title)
        .bind(update.body)
        .bind(update.privacy.map(Privacy::is_private))
        .bind(update.edges.as_deref().map(EdgeCodec::encode))
        .bind(now)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| persistence("failed to update story", e))?;
        if result.rows_affected() == 0 {
            return Err(DomainError::story_not_found(id));
        }
        Ok(())
    }

    async fn delete_story(&mut self, id: NodeId) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM stories WHERE id = $1")
            .bind(id.0)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| persistence("failed to delete story", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_block(
        &mut self,
        story_id: NodeId,
        owner_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Block, DomainError> {
        let row: BlockRow = sqlx::query_as(&format!(
            "INSERT INTO blocks (story_id, owner_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $3) RETURNING {BLOCK_COLUMNS}"
        ))
        .bind(story_id.0)
        .bind(owner_id.0)
        .bind(now)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| persistence("failed to create block", e))?;
        debug!(story_id = row.story_id, block_id = row.id, "block row inserted");
        Ok(row.into())
    }

    async fn get_block(&mut self, id: NodeId) -> Result<Option<Block>, DomainError> {
        fetch_block(&mut *self.tx, id).await
    }

    async fn update_block(
        &mut self,
        id: NodeId,
        update: BlockUpdate,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            "UPDATE blocks SET \
                body = COALESCE($2, body), \
                edges = COALESCE($3::jsonb, edges), \
                updated_at = $4 \
             WHERE id = $1",
        )
        .bind(id.0)
        .bind(update.body)
        .bind(update.edges.as_deref().map(EdgeCodec::encode))
        .bind(now)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| persistence("failed to update block", e))?;
        if result.rows_affected() == 0 {
            return Err(DomainError::block_not_found(id));
        }
        Ok(())
    }

    async fn delete_block(&mut self, id: NodeId) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM blocks WHERE id = $1")
            .bind(id.0)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| persistence("failed to delete block", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_blocks_by_story(&mut self, story_id: NodeId) -> Result<Vec<Block>, DomainError> {
        fetch_blocks_by_story(&mut *self.tx, story_id).await
    }

    async fn delete_blocks_by_story(&mut self, story_id: NodeId) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM blocks WHERE story_id = $1")
            .bind(story_id.0)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| persistence("failed to delete story blocks", e))?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        self.tx
            .commit()
            .await
            .map_err(|e| persistence("failed to commit transaction", e))
    }
}
