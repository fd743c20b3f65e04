//! Edge domain models

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// 两个节点之间的有向连线
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: Uuid,
    pub source: Uuid,
    pub target: Uuid,
    /// 文本形式的布尔值："true" / "false"
    pub animated: String,
    pub created_at: DateTime<Utc>,
}

/// 校验通过的连线创建数据
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeDraft {
    pub source: Uuid,
    pub target: Uuid,
    pub animated: bool,
}

impl EdgeDraft {
    pub fn animated_text(&self) -> &'static str {
        if self.animated {
            "true"
        } else {
            "false"
        }
    }

    pub fn into_edge(self, id: Uuid, now: DateTime<Utc>) -> Edge {
        Edge {
            id,
            source: self.source,
            target: self.target,
            animated: self.animated_text().to_string(),
            created_at: now,
        }
    }
}

/// 拓扑（全部节点与连线）
#[derive(Debug, Clone, Serialize)]
pub struct Topology {
    pub nodes: Vec<super::node::Node>,
    pub edges: Vec<Edge>,
}
