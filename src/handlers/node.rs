//! 节点的 HTTP 处理器

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use super::{json_body, parse_id};
use crate::{
    error::AppError,
    middleware::AppState,
    models::NodeListFilters,
    services::validate_create,
};

/// 列出节点，支持 deviceType / status / tag / search 过滤
pub async fn list_nodes(
    State(state): State<Arc<AppState>>,
    filters: Result<Query<NodeListFilters>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(filters) = filters.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let nodes = state.store.list_nodes(&filters).await?;
    Ok(Json(nodes))
}

/// 获取节点详情
pub async fn get_node(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id, "Node")?;
    let node = state
        .store
        .get_node(id)
        .await?
        .ok_or_else(|| AppError::not_found("Node"))?;

    Ok(Json(node))
}

/// 创建节点
pub async fn create_node(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let payload = json_body(payload)?;
    let draft = validate_create(&payload)?;

    let node = state.store.create_node(&draft).await?;

    tracing::info!(
        node_id = %node.id,
        name = %node.name,
        device_type = %node.device_type,
        "Node created"
    );

    Ok((StatusCode::CREATED, Json(node)))
}

/// 部分更新节点
///
/// `id`、`position` 和时间戳即使出现在请求体中也会被忽略。
pub async fn update_node(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id, "Node")?;
    let payload = json_body(payload)?;

    // 校验在存储层的锁内完成
    let node = state
        .store
        .update_node(id, &payload)
        .await?
        .ok_or_else(|| AppError::not_found("Node"))?;

    tracing::info!(node_id = %node.id, "Node updated");

    Ok(Json(node))
}

/// 删除节点，引用它的连线级联删除
///
/// 节点不存在时同样返回 204。
pub async fn delete_node(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let Ok(id) = Uuid::parse_str(&id) else {
        return Ok(StatusCode::NO_CONTENT);
    };

    let removal = state.store.delete_node(id).await?;
    if removal.existed {
        tracing::info!(node_id = %id, edges_removed = removal.edges_removed, "Node deleted");
    } else {
        tracing::debug!(node_id = %id, "Delete of unknown node ignored");
    }

    Ok(StatusCode::NO_CONTENT)
}
