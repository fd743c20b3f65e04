//! 拓扑、导入导出与汇总统计

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use super::json_body;
use crate::{
    error::AppError,
    middleware::AppState,
    models::{Edge, Node, NodeListFilters, Topology},
    services::{summarize, ImportPlan},
};

/// 导入响应
#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub message: String,
}

async fn load_topology(state: &AppState) -> Result<Topology, AppError> {
    let filters = NodeListFilters::default();
    let (nodes, edges) =
        futures::try_join!(state.store.list_nodes(&filters), state.store.list_edges())?;
    Ok(Topology { nodes, edges })
}

/// 全部节点与连线
pub async fn get_topology(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(load_topology(&state).await?))
}

/// 以附件形式导出拓扑
pub async fn export_topology(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let topology = load_topology(&state).await?;

    tracing::info!(
        nodes = topology.nodes.len(),
        edges = topology.edges.len(),
        "Topology exported"
    );

    Ok((
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::CONTENT_DISPOSITION, "attachment; filename=topology.json"),
        ],
        Json(topology),
    ))
}

/// 批量导入节点与连线
///
/// 先校验整个批次，再在一个事务内写入；任何错误都不会留下部分数据。
pub async fn import_topology(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let payload = json_body(payload)?;
    let plan = ImportPlan::from_payload(&payload)?;

    let outcome = state.store.import_topology(&plan).await?;
    let message = format!(
        "Imported {} nodes and {} edges",
        outcome.nodes.len(),
        outcome.edges.len()
    );

    tracing::info!(
        nodes = outcome.nodes.len(),
        edges = outcome.edges.len(),
        "Topology imported"
    );

    Ok((
        StatusCode::CREATED,
        Json(ImportResponse {
            nodes: outcome.nodes,
            edges: outcome.edges,
            message,
        }),
    ))
}

/// 仪表盘汇总：在线比例、服务数、NAS 存储
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let nodes = state.store.list_nodes(&NodeListFilters::default()).await?;
    Ok(Json(summarize(&nodes)))
}
