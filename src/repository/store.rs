//! 存储网关接口
//! 节点与连线的 CRUD，外加原子批量导入

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::{Edge, EdgeDraft, Node, NodeDraft, NodeListFilters},
    services::{validation::ValidationErrors, ImportPlan},
};

/// 存储后端健康状态
#[derive(Debug, Clone, PartialEq)]
pub enum HealthStatus {
    Healthy,
    Unhealthy(String),
}

/// 删除节点的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRemoval {
    /// 节点删除前是否存在
    pub existed: bool,
    /// 级联删除的连线数量
    pub edges_removed: u64,
}

/// 导入结果
#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn list_nodes(&self, filters: &NodeListFilters) -> Result<Vec<Node>>;

    async fn get_node(&self, id: Uuid) -> Result<Option<Node>>;

    /// 分配 ID 与时间戳后写入
    async fn create_node(&self, draft: &NodeDraft) -> Result<Node>;

    /// 在锁内读取当前记录、校验更新负载、合并并刷新 updated_at
    ///
    /// 节点不存在时返回 None；校验失败返回 `AppError::Validation`，不写入任何数据。
    async fn update_node(&self, id: Uuid, payload: &Value) -> Result<Option<Node>>;

    /// 删除节点，引用它的连线一并删除
    async fn delete_node(&self, id: Uuid) -> Result<NodeRemoval>;

    async fn list_edges(&self) -> Result<Vec<Edge>>;

    async fn get_edge(&self, id: Uuid) -> Result<Option<Edge>>;

    /// 端点不存在时返回校验错误
    async fn create_edge(&self, draft: &EdgeDraft) -> Result<Edge>;

    async fn delete_edge(&self, id: Uuid) -> Result<bool>;

    /// 在单个事务内写入整批节点和连线，任一失败则全部回滚
    async fn import_topology(&self, plan: &ImportPlan) -> Result<ImportOutcome>;

    async fn health_check(&self) -> HealthStatus;
}

/// 连线端点不存在时的错误
pub(crate) fn missing_endpoint_errors(source_missing: bool, target_missing: bool) -> ValidationErrors {
    let mut errors = ValidationErrors::default();
    if source_missing {
        errors.push("source", "source must reference an existing node");
    }
    if target_missing {
        errors.push("target", "target must reference an existing node");
    }
    errors
}

pub(crate) fn missing_endpoint_error(source_missing: bool, target_missing: bool) -> AppError {
    AppError::Validation(missing_endpoint_errors(source_missing, target_missing))
}

/// 批量导入时的端点错误，字段名带上连线序号
pub(crate) fn import_edge_error(index: usize, source_missing: bool, target_missing: bool) -> AppError {
    let mut errors = ValidationErrors::default();
    errors.merge_prefixed(
        &format!("edges[{}]", index),
        missing_endpoint_errors(source_missing, target_missing),
    );
    AppError::Validation(errors)
}
