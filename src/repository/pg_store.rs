//! PostgreSQL 存储实现

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use serde_json::Value;
use sqlx::{
    postgres::{PgExecutor, PgPoolOptions},
    types::Json,
    PgPool,
};
use std::time::Duration;
use uuid::Uuid;

use super::store::{
    import_edge_error, missing_endpoint_error, HealthStatus, ImportOutcome, InventoryStore,
    NodeRemoval,
};
use crate::{
    config::DatabaseConfig,
    error::{AppError, Result},
    models::{DeviceMetadata, Edge, EdgeDraft, Node, NodeDraft, NodeListFilters, Position, Service},
    services::{validate_update, ImportPlan},
};

/// nodes 表的一行
#[derive(Debug, sqlx::FromRow)]
struct NodeRow {
    id: Uuid,
    name: String,
    ip: String,
    os_type: String,
    device_type: String,
    status: String,
    tags: Vec<String>,
    services: Json<Vec<Service>>,
    storage_total: Option<String>,
    storage_used: Option<String>,
    metadata: Option<Json<Value>>,
    position: Json<Position>,
    uptime: Option<String>,
    last_seen: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<NodeRow> for Node {
    type Error = AppError;

    fn try_from(row: NodeRow) -> Result<Self> {
        let device_type = row.device_type.parse().map_err(|_| {
            AppError::Internal(format!("node {} has unknown device_type {}", row.id, row.device_type))
        })?;
        let status = row
            .status
            .parse()
            .map_err(|_| AppError::Internal(format!("node {} has unknown status {}", row.id, row.status)))?;
        let metadata = match row.metadata {
            Some(Json(value)) => Some(DeviceMetadata::from_value(device_type, value).map_err(|e| {
                AppError::Internal(format!("node {} has malformed metadata: {}", row.id, e))
            })?),
            None => None,
        };

        Ok(Node {
            id: row.id,
            name: row.name,
            ip: row.ip,
            os_type: row.os_type,
            device_type,
            status,
            tags: row.tags,
            services: row.services.0,
            storage_total: row.storage_total,
            storage_used: row.storage_used,
            metadata,
            position: row.position.0,
            uptime: row.uptime,
            last_seen: row.last_seen,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn metadata_json(metadata: &Option<DeviceMetadata>) -> Option<Json<Value>> {
    metadata.as_ref().map(|m| Json(m.to_value()))
}

/// LIKE 通配符转义
fn like_pattern(search: &str) -> String {
    let escaped = search.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{}%", escaped)
}

async fn insert_node<'e, E: PgExecutor<'e>>(executor: E, draft: &NodeDraft) -> Result<Node> {
    let row = sqlx::query_as::<_, NodeRow>(
        r#"
        INSERT INTO nodes (
            id, name, ip, os_type, device_type, status, tags, services,
            storage_total, storage_used, metadata, position, uptime
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&draft.name)
    .bind(&draft.ip)
    .bind(&draft.os_type)
    .bind(draft.device_type.as_str())
    .bind(draft.status.as_str())
    .bind(&draft.tags)
    .bind(Json(&draft.services))
    .bind(&draft.storage_total)
    .bind(&draft.storage_used)
    .bind(metadata_json(&draft.metadata))
    .bind(Json(draft.position))
    .bind(&draft.uptime)
    .fetch_one(executor)
    .await?;

    Node::try_from(row)
}

async fn insert_edge<'e, E: PgExecutor<'e>>(
    executor: E,
    draft: &EdgeDraft,
) -> std::result::Result<Edge, sqlx::Error> {
    sqlx::query_as::<_, Edge>(
        r#"
        INSERT INTO edges (id, source, target, animated)
        VALUES ($1, $2, $3, $4)
        RETURNING id, source, target, animated, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(draft.source)
    .bind(draft.target)
    .bind(draft.animated_text())
    .fetch_one(executor)
    .await
}

/// 外键冲突时返回 (source 缺失, target 缺失)
fn foreign_key_violation(e: &sqlx::Error) -> Option<(bool, bool)> {
    let sqlx::Error::Database(db_err) = e else {
        return None;
    };
    if !db_err.is_foreign_key_violation() {
        return None;
    }
    match db_err.constraint() {
        Some(c) if c.contains("source") => Some((true, false)),
        Some(c) if c.contains("target") => Some((false, true)),
        _ => Some((true, true)),
    }
}

pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// 建立连接池并执行 `migrations/` 下的迁移
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let url = config
            .url
            .as_ref()
            .ok_or_else(|| AppError::Config("database.url is not configured".to_string()))?;

        let db = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .test_before_acquire(true)
            .connect(url.expose_secret())
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to connect to inventory database");
                AppError::Database(e)
            })?;

        tracing::info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Inventory database pool created"
        );

        sqlx::migrate!("./migrations").run(&db).await.map_err(|e| {
            tracing::error!(error = %e, "Inventory schema migration failed");
            AppError::Database(e.into())
        })?;

        tracing::info!("Inventory schema is up to date");
        Ok(Self { db })
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }
}

#[async_trait]
impl InventoryStore for PgStore {
    async fn list_nodes(&self, filters: &NodeListFilters) -> Result<Vec<Node>> {
        let mut query = String::from("SELECT * FROM nodes WHERE 1=1");
        let mut index = 0;

        if filters.device_type.is_some() {
            index += 1;
            query.push_str(&format!(" AND device_type = ${}", index));
        }
        if filters.status.is_some() {
            index += 1;
            query.push_str(&format!(" AND status = ${}", index));
        }
        if filters.tag.is_some() {
            index += 1;
            query.push_str(&format!(" AND ${} = ANY(tags)", index));
        }
        if filters.search.is_some() {
            index += 1;
            query.push_str(&format!(
                " AND (name ILIKE ${0} OR ip ILIKE ${0} OR os_type ILIKE ${0})",
                index
            ));
        }
        query.push_str(" ORDER BY created_at, id");

        let mut query_builder = sqlx::query_as::<_, NodeRow>(&query);
        if let Some(device_type) = filters.device_type {
            query_builder = query_builder.bind(device_type.as_str());
        }
        if let Some(status) = filters.status {
            query_builder = query_builder.bind(status.as_str());
        }
        if let Some(tag) = &filters.tag {
            query_builder = query_builder.bind(tag);
        }
        if let Some(search) = &filters.search {
            query_builder = query_builder.bind(like_pattern(search));
        }

        let rows = query_builder.fetch_all(&self.db).await?;
        rows.into_iter().map(Node::try_from).collect()
    }

    async fn get_node(&self, id: Uuid) -> Result<Option<Node>> {
        let row = sqlx::query_as::<_, NodeRow>("SELECT * FROM nodes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        row.map(Node::try_from).transpose()
    }

    async fn create_node(&self, draft: &NodeDraft) -> Result<Node> {
        insert_node(&self.db, draft).await
    }

    async fn update_node(&self, id: Uuid, payload: &Value) -> Result<Option<Node>> {
        let mut tx = self.db.begin().await?;

        // 行锁内完成读-校验-改-写
        let row = sqlx::query_as::<_, NodeRow>("SELECT * FROM nodes WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let mut node = Node::try_from(row)?;
        // 校验失败时事务随 drop 回滚
        let patch = validate_update(payload, &node)?;
        node.apply_patch(&patch, Utc::now());

        let row = sqlx::query_as::<_, NodeRow>(
            r#"
            UPDATE nodes
            SET
                name = $2,
                ip = $3,
                os_type = $4,
                device_type = $5,
                status = $6,
                tags = $7,
                services = $8,
                storage_total = $9,
                storage_used = $10,
                metadata = $11,
                uptime = $12,
                updated_at = $13
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&node.name)
        .bind(&node.ip)
        .bind(&node.os_type)
        .bind(node.device_type.as_str())
        .bind(node.status.as_str())
        .bind(&node.tags)
        .bind(Json(&node.services))
        .bind(&node.storage_total)
        .bind(&node.storage_used)
        .bind(metadata_json(&node.metadata))
        .bind(&node.uptime)
        .bind(node.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Node::try_from(row).map(Some)
    }

    async fn delete_node(&self, id: Uuid) -> Result<NodeRemoval> {
        let mut tx = self.db.begin().await?;

        // 先锁住节点，避免统计期间有新连线引用它
        let locked: Option<Uuid> = sqlx::query_scalar("SELECT id FROM nodes WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Ok(NodeRemoval { existed: false, edges_removed: 0 });
        }

        let edges_removed: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM edges WHERE source = $1 OR target = $1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;

        // ON DELETE CASCADE 负责删除连线
        let result = sqlx::query("DELETE FROM nodes WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(NodeRemoval {
            existed: result.rows_affected() > 0,
            edges_removed: edges_removed as u64,
        })
    }

    async fn list_edges(&self) -> Result<Vec<Edge>> {
        let edges = sqlx::query_as::<_, Edge>(
            "SELECT id, source, target, animated, created_at FROM edges ORDER BY created_at, id",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(edges)
    }

    async fn get_edge(&self, id: Uuid) -> Result<Option<Edge>> {
        let edge = sqlx::query_as::<_, Edge>(
            "SELECT id, source, target, animated, created_at FROM edges WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(edge)
    }

    async fn create_edge(&self, draft: &EdgeDraft) -> Result<Edge> {
        insert_edge(&self.db, draft).await.map_err(|e| match foreign_key_violation(&e) {
            Some((source, target)) => missing_endpoint_error(source, target),
            None => AppError::Database(e),
        })
    }

    async fn delete_edge(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM edges WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn import_topology(&self, plan: &ImportPlan) -> Result<ImportOutcome> {
        let mut tx = self.db.begin().await?;

        let mut nodes = Vec::with_capacity(plan.nodes.len());
        for draft in &plan.nodes {
            nodes.push(insert_node(&mut *tx, draft).await?);
        }

        let ids: Vec<Uuid> = nodes.iter().map(|n| n.id).collect();
        let mut edges = Vec::with_capacity(plan.edges.len());
        for (i, draft) in plan.resolve_edges(&ids).iter().enumerate() {
            let edge = insert_edge(&mut *tx, draft).await.map_err(|e| match foreign_key_violation(&e) {
                Some((source, target)) => import_edge_error(i, source, target),
                None => AppError::Database(e),
            })?;
            edges.push(edge);
        }

        // 提前返回时事务随 drop 回滚
        tx.commit().await?;

        Ok(ImportOutcome { nodes, edges })
    }

    async fn health_check(&self) -> HealthStatus {
        metrics::gauge!("inventory_db_pool_size").set(self.db.size() as f64);
        metrics::gauge!("inventory_db_pool_idle").set(self.db.num_idle() as f64);

        match sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM nodes").fetch_one(&self.db).await {
            Ok(nodes) => {
                tracing::debug!(nodes, "Inventory store health check: OK");
                HealthStatus::Healthy
            }
            Err(e) => {
                tracing::warn!(error = %e, "Inventory store health check failed");
                HealthStatus::Unhealthy(e.to_string())
            }
        }
    }
}
