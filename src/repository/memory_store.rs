//! 内存存储实现
//! 与 PostgreSQL 实现语义一致（级联删除、外键检查、原子导入），用于演示与测试

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::store::{
    import_edge_error, missing_endpoint_error, HealthStatus, ImportOutcome, InventoryStore,
    NodeRemoval,
};
use crate::{
    error::Result,
    models::{Edge, EdgeDraft, Node, NodeDraft, NodeListFilters},
    services::{validate_update, ImportPlan},
};

#[derive(Default)]
struct Tables {
    // 按插入顺序保存，与 PostgreSQL 的 created_at 排序一致
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl Tables {
    fn has_node(&self, id: Uuid) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn list_nodes(&self, filters: &NodeListFilters) -> Result<Vec<Node>> {
        let tables = self.tables.read().await;
        Ok(tables.nodes.iter().filter(|n| filters.matches(n)).cloned().collect())
    }

    async fn get_node(&self, id: Uuid) -> Result<Option<Node>> {
        let tables = self.tables.read().await;
        Ok(tables.nodes.iter().find(|n| n.id == id).cloned())
    }

    async fn create_node(&self, draft: &NodeDraft) -> Result<Node> {
        let node = draft.clone().into_node(Uuid::new_v4(), Utc::now());
        self.tables.write().await.nodes.push(node.clone());
        Ok(node)
    }

    async fn update_node(&self, id: Uuid, payload: &Value) -> Result<Option<Node>> {
        let mut tables = self.tables.write().await;
        let Some(node) = tables.nodes.iter_mut().find(|n| n.id == id) else {
            return Ok(None);
        };
        // 写锁内校验
        let patch = validate_update(payload, node)?;
        node.apply_patch(&patch, Utc::now());
        Ok(Some(node.clone()))
    }

    async fn delete_node(&self, id: Uuid) -> Result<NodeRemoval> {
        let mut tables = self.tables.write().await;
        let before = tables.nodes.len();
        tables.nodes.retain(|n| n.id != id);
        if tables.nodes.len() == before {
            return Ok(NodeRemoval { existed: false, edges_removed: 0 });
        }

        let edges_before = tables.edges.len();
        tables.edges.retain(|e| e.source != id && e.target != id);

        Ok(NodeRemoval {
            existed: true,
            edges_removed: (edges_before - tables.edges.len()) as u64,
        })
    }

    async fn list_edges(&self) -> Result<Vec<Edge>> {
        Ok(self.tables.read().await.edges.clone())
    }

    async fn get_edge(&self, id: Uuid) -> Result<Option<Edge>> {
        let tables = self.tables.read().await;
        Ok(tables.edges.iter().find(|e| e.id == id).cloned())
    }

    async fn create_edge(&self, draft: &EdgeDraft) -> Result<Edge> {
        let mut tables = self.tables.write().await;
        let source_missing = !tables.has_node(draft.source);
        let target_missing = !tables.has_node(draft.target);
        if source_missing || target_missing {
            return Err(missing_endpoint_error(source_missing, target_missing));
        }

        let edge = draft.clone().into_edge(Uuid::new_v4(), Utc::now());
        tables.edges.push(edge.clone());
        Ok(edge)
    }

    async fn delete_edge(&self, id: Uuid) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.edges.len();
        tables.edges.retain(|e| e.id != id);
        Ok(tables.edges.len() < before)
    }

    async fn import_topology(&self, plan: &ImportPlan) -> Result<ImportOutcome> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();

        let nodes: Vec<Node> = plan
            .nodes
            .iter()
            .map(|draft| draft.clone().into_node(Uuid::new_v4(), now))
            .collect();
        let ids: Vec<Uuid> = nodes.iter().map(|n| n.id).collect();
        let exists = |id: Uuid| ids.contains(&id) || tables.has_node(id);

        // 先全部检查再写入，失败时不留下任何记录
        let drafts = plan.resolve_edges(&ids);
        for (i, draft) in drafts.iter().enumerate() {
            let source_missing = !exists(draft.source);
            let target_missing = !exists(draft.target);
            if source_missing || target_missing {
                return Err(import_edge_error(i, source_missing, target_missing));
            }
        }

        let edges: Vec<Edge> = drafts
            .into_iter()
            .map(|draft| draft.into_edge(Uuid::new_v4(), now))
            .collect();

        tables.nodes.extend(nodes.iter().cloned());
        tables.edges.extend(edges.iter().cloned());

        Ok(ImportOutcome { nodes, edges })
    }

    async fn health_check(&self) -> HealthStatus {
        HealthStatus::Healthy
    }
}
