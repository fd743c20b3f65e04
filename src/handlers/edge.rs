//! 连线的 HTTP 处理器

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use super::{json_body, parse_id};
use crate::{error::AppError, middleware::AppState, services::validate_edge};

pub async fn list_edges(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let edges = state.store.list_edges().await?;
    Ok(Json(edges))
}

pub async fn get_edge(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id, "Edge")?;
    let edge = state
        .store
        .get_edge(id)
        .await?
        .ok_or_else(|| AppError::not_found("Edge"))?;

    Ok(Json(edge))
}

/// 创建连线；端点必须是已存在的节点
pub async fn create_edge(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let payload = json_body(payload)?;
    let draft = validate_edge(&payload)?;

    let edge = state.store.create_edge(&draft).await?;

    tracing::info!(
        edge_id = %edge.id,
        source = %edge.source,
        target = %edge.target,
        "Edge created"
    );

    Ok((StatusCode::CREATED, Json(edge)))
}

/// 删除连线，连线不存在时同样返回 204
pub async fn delete_edge(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let Ok(id) = Uuid::parse_str(&id) else {
        return Ok(StatusCode::NO_CONTENT);
    };

    if state.store.delete_edge(id).await? {
        tracing::info!(edge_id = %id, "Edge deleted");
    }

    Ok(StatusCode::NO_CONTENT)
}
