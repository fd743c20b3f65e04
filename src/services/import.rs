//! 拓扑导入
//!
//! 在写入任何数据之前，先完整校验所有节点，再校验所有连线。
//! 导入的节点可以带上导出时的 `id`，引用这些 id 的连线会改接到新建的节点上。

use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{EdgeDraft, NodeDraft};
use crate::services::validation::{parse_edge_fields, validate_create, ValidationErrors};

/// 连线端点
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeEndpoint {
    /// 本批次导入的第 N 个节点
    Imported(usize),
    /// 库中已有的节点
    Existing(Uuid),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportEdge {
    pub source: EdgeEndpoint,
    pub target: EdgeEndpoint,
    pub animated: bool,
}

/// 校验通过的导入批次
#[derive(Debug, Clone, PartialEq)]
pub struct ImportPlan {
    pub nodes: Vec<NodeDraft>,
    pub edges: Vec<ImportEdge>,
}

impl ImportPlan {
    /// 解析并校验导入负载
    ///
    /// `nodes` 缺失或不是数组返回 BadRequest；任何元素校验失败返回全部字段错误。
    pub fn from_payload(payload: &Value) -> Result<Self, AppError> {
        let Some(raw_nodes) = payload.get("nodes").and_then(Value::as_array) else {
            return Err(AppError::bad_request("Invalid import data: nodes must be an array"));
        };
        // edges 不是数组时按未提供处理
        let raw_edges = payload.get("edges").and_then(Value::as_array);

        let mut errors = ValidationErrors::default();
        let mut nodes = Vec::with_capacity(raw_nodes.len());
        let mut keys: HashMap<String, usize> = HashMap::new();

        for (i, raw) in raw_nodes.iter().enumerate() {
            let prefix = format!("nodes[{}]", i);
            match validate_create(raw) {
                Ok(draft) => nodes.push(draft),
                Err(e) => errors.merge_prefixed(&prefix, e),
            }
            if let Some(key) = raw.get("id").and_then(Value::as_str).filter(|k| !k.is_empty()) {
                if let Some(first) = keys.insert(key.to_string(), i) {
                    errors.push(
                        format!("{}.id", prefix),
                        format!("Duplicate node id, already used by nodes[{}]", first),
                    );
                }
            }
        }

        let mut edges = Vec::new();
        for (i, raw) in raw_edges.into_iter().flatten().enumerate() {
            let prefix = format!("edges[{}]", i);
            let mut edge_errors = ValidationErrors::default();
            let fields = parse_edge_fields(raw, &mut edge_errors);

            let source = fields.source.and_then(|s| resolve_endpoint(&s, &keys, "source", &mut edge_errors));
            let target = fields.target.and_then(|t| resolve_endpoint(&t, &keys, "target", &mut edge_errors));

            match (source, target) {
                (Some(source), Some(target)) if edge_errors.is_empty() => {
                    edges.push(ImportEdge { source, target, animated: fields.animated })
                }
                _ => errors.merge_prefixed(&prefix, edge_errors),
            }
        }

        if errors.is_empty() {
            Ok(ImportPlan { nodes, edges })
        } else {
            Err(AppError::Validation(errors))
        }
    }

    /// 节点写入后，按新节点 ID 生成连线
    ///
    /// `created` 与 `self.nodes` 一一对应。
    pub fn resolve_edges(&self, created: &[Uuid]) -> Vec<EdgeDraft> {
        let resolve = |endpoint: EdgeEndpoint| match endpoint {
            EdgeEndpoint::Imported(index) => created[index],
            EdgeEndpoint::Existing(id) => id,
        };
        self.edges
            .iter()
            .map(|edge| EdgeDraft {
                source: resolve(edge.source),
                target: resolve(edge.target),
                animated: edge.animated,
            })
            .collect()
    }
}

/// 导入节点的 id 优先，其次按已有节点 UUID 解析
fn resolve_endpoint(
    raw: &str,
    keys: &HashMap<String, usize>,
    field: &str,
    errors: &mut ValidationErrors,
) -> Option<EdgeEndpoint> {
    if let Some(&index) = keys.get(raw) {
        return Some(EdgeEndpoint::Imported(index));
    }
    match Uuid::parse_str(raw) {
        Ok(id) => Some(EdgeEndpoint::Existing(id)),
        Err(_) => {
            errors.push(field, format!("{} does not reference an imported or existing node", field));
            None
        }
    }
}
