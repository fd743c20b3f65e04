//! Node domain models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use super::metadata::DeviceMetadata;

/// 设备类型（同时决定元数据结构）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceType {
    #[default]
    Server,
    Router,
    Switch,
    AccessPoint,
    Nas,
    Container,
}

impl DeviceType {
    pub const ALL: [DeviceType; 6] = [
        DeviceType::Server,
        DeviceType::Router,
        DeviceType::Switch,
        DeviceType::AccessPoint,
        DeviceType::Nas,
        DeviceType::Container,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Server => "server",
            DeviceType::Router => "router",
            DeviceType::Switch => "switch",
            DeviceType::AccessPoint => "access-point",
            DeviceType::Nas => "nas",
            DeviceType::Container => "container",
        }
    }

    /// 该类型元数据允许出现的字段（JSON 名称）
    pub fn metadata_fields(&self) -> &'static [&'static str] {
        match self {
            DeviceType::Server => &["cpu", "ram", "platform"],
            DeviceType::Router => &["wanIp", "gateway", "dhcpRange"],
            DeviceType::Switch => &["portCount", "portSpeed", "managementType", "vlanSupport"],
            DeviceType::AccessPoint => &["wifiStandard", "ssid", "channel", "security"],
            DeviceType::Nas => &["raidType", "protocols"],
            DeviceType::Container => &["runtime", "image", "ports"],
        }
    }
}

impl FromStr for DeviceType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|v| v.as_str() == s).ok_or(())
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 节点状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Online,
    Offline,
    Degraded,
    #[default]
    Unknown,
}

impl NodeStatus {
    pub const ALL: [NodeStatus; 4] =
        [NodeStatus::Online, NodeStatus::Offline, NodeStatus::Degraded, NodeStatus::Unknown];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Online => "online",
            NodeStatus::Offline => "offline",
            NodeStatus::Degraded => "degraded",
            NodeStatus::Unknown => "unknown",
        }
    }
}

impl FromStr for NodeStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|v| v.as_str() == s).ok_or(())
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 节点对外暴露的服务（例如 Web 管理界面）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Service {
    #[validate(length(min = 1, message = "Service name is required"))]
    pub name: String,
    #[validate(url(message = "Service URL must be a valid absolute URL"))]
    pub url: String,
}

/// 拓扑画布坐标
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// 设备节点
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: Uuid,
    pub name: String,
    pub ip: String,
    pub os_type: String,
    pub device_type: DeviceType,
    pub status: NodeStatus,
    pub tags: Vec<String>,
    pub services: Vec<Service>,
    pub storage_total: Option<String>,
    pub storage_used: Option<String>,
    pub metadata: Option<DeviceMetadata>,
    pub position: Position,
    pub uptime: Option<String>,
    pub last_seen: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 校验通过的创建数据
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDraft {
    pub name: String,
    pub ip: String,
    pub os_type: String,
    pub device_type: DeviceType,
    pub status: NodeStatus,
    pub tags: Vec<String>,
    pub services: Vec<Service>,
    pub storage_total: Option<String>,
    pub storage_used: Option<String>,
    pub metadata: Option<DeviceMetadata>,
    pub position: Position,
    pub uptime: Option<String>,
}

impl NodeDraft {
    /// 以系统字段补全为完整节点
    pub fn into_node(self, id: Uuid, now: DateTime<Utc>) -> Node {
        Node {
            id,
            name: self.name,
            ip: self.ip,
            os_type: self.os_type,
            device_type: self.device_type,
            status: self.status,
            tags: self.tags,
            services: self.services,
            storage_total: self.storage_total,
            storage_used: self.storage_used,
            metadata: self.metadata,
            position: self.position,
            uptime: self.uptime,
            last_seen: Some(now),
            created_at: now,
            updated_at: now,
        }
    }
}

/// 校验通过的部分更新
///
/// 外层 `None` 表示未提供该字段；可清空字段使用 `Some(None)`。
/// id、position 与时间戳不在此结构中，无法通过更新修改。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodePatch {
    pub name: Option<String>,
    pub ip: Option<String>,
    pub os_type: Option<String>,
    pub device_type: Option<DeviceType>,
    pub status: Option<NodeStatus>,
    pub tags: Option<Vec<String>>,
    pub services: Option<Vec<Service>>,
    pub storage_total: Option<Option<String>>,
    pub storage_used: Option<Option<String>>,
    pub metadata: Option<Option<DeviceMetadata>>,
    pub uptime: Option<Option<String>>,
}

impl NodePatch {
    pub fn is_empty(&self) -> bool {
        *self == NodePatch::default()
    }
}

impl Node {
    /// 将部分更新合并到当前记录，并刷新 updated_at
    pub fn apply_patch(&mut self, patch: &NodePatch, now: DateTime<Utc>) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(ip) = &patch.ip {
            self.ip = ip.clone();
        }
        if let Some(os_type) = &patch.os_type {
            self.os_type = os_type.clone();
        }
        if let Some(device_type) = patch.device_type {
            // 设备类型变化且未同时提供元数据时，旧元数据不再匹配，直接清除
            if device_type != self.device_type && patch.metadata.is_none() {
                self.metadata = None;
            }
            self.device_type = device_type;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(tags) = &patch.tags {
            self.tags = tags.clone();
        }
        if let Some(services) = &patch.services {
            self.services = services.clone();
        }
        if let Some(total) = &patch.storage_total {
            self.storage_total = total.clone();
        }
        if let Some(used) = &patch.storage_used {
            self.storage_used = used.clone();
        }
        if let Some(metadata) = &patch.metadata {
            self.metadata = metadata.clone();
        }
        if let Some(uptime) = &patch.uptime {
            self.uptime = uptime.clone();
        }
        self.updated_at = now;
    }
}

/// Node list filters
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeListFilters {
    pub device_type: Option<DeviceType>,
    pub status: Option<NodeStatus>,
    pub tag: Option<String>,
    pub search: Option<String>, // name/ip/osType 模糊匹配
}

impl NodeListFilters {
    pub fn matches(&self, node: &Node) -> bool {
        if self.device_type.is_some_and(|t| t != node.device_type) {
            return false;
        }
        if self.status.is_some_and(|s| s != node.status) {
            return false;
        }
        if let Some(tag) = &self.tag {
            if !node.tags.iter().any(|t| t == tag) {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            return [&node.name, &node.ip, &node.os_type]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle));
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::metadata::{NasMetadata, RouterMetadata};

    fn sample_node() -> Node {
        let now = Utc::now();
        NodeDraft {
            name: "TrueNAS".to_string(),
            ip: "192.168.1.20".to_string(),
            os_type: "TrueNAS Scale".to_string(),
            device_type: DeviceType::Nas,
            status: NodeStatus::Online,
            tags: vec!["storage".to_string()],
            services: vec![],
            storage_total: Some("4000".to_string()),
            storage_used: Some("1200".to_string()),
            metadata: Some(DeviceMetadata::Nas(NasMetadata {
                raid_type: Some("raidz1".to_string()),
                protocols: Some(vec!["smb".to_string(), "nfs".to_string()]),
            })),
            position: Position { x: 40.0, y: 80.0 },
            uptime: None,
        }
        .into_node(Uuid::new_v4(), now)
    }

    #[test]
    fn test_device_type_wire_names() {
        assert_eq!(DeviceType::AccessPoint.as_str(), "access-point");
        assert_eq!("access-point".parse::<DeviceType>(), Ok(DeviceType::AccessPoint));
        assert!("firewall".parse::<DeviceType>().is_err());
        assert_eq!(
            serde_json::to_value(DeviceType::AccessPoint).unwrap(),
            serde_json::json!("access-point")
        );
    }

    #[test]
    fn test_defaults() {
        assert_eq!(DeviceType::default(), DeviceType::Server);
        assert_eq!(NodeStatus::default(), NodeStatus::Unknown);
    }

    #[test]
    fn test_node_serializes_camel_case() {
        let node = sample_node();
        let value = serde_json::to_value(&node).unwrap();

        assert_eq!(value["osType"], "TrueNAS Scale");
        assert_eq!(value["deviceType"], "nas");
        assert_eq!(value["storageTotal"], "4000");
        assert_eq!(value["metadata"]["raidType"], "raidz1");
        assert_eq!(value["position"]["x"], 40.0);
        assert!(value["createdAt"].is_string());
    }

    #[test]
    fn test_apply_patch_keeps_system_fields() {
        let mut node = sample_node();
        let before = node.clone();
        let patch = NodePatch {
            name: Some("Backup NAS".to_string()),
            storage_used: Some(None),
            ..Default::default()
        };

        node.apply_patch(&patch, Utc::now());

        assert_eq!(node.name, "Backup NAS");
        assert_eq!(node.storage_used, None);
        assert_eq!(node.id, before.id);
        assert_eq!(node.position, before.position);
        assert_eq!(node.created_at, before.created_at);
        assert_eq!(node.storage_total, before.storage_total);
    }

    #[test]
    fn test_apply_patch_device_type_change_clears_metadata() {
        let mut node = sample_node();
        node.apply_patch(
            &NodePatch { device_type: Some(DeviceType::Server), ..Default::default() },
            Utc::now(),
        );
        assert_eq!(node.device_type, DeviceType::Server);
        assert!(node.metadata.is_none());

        let mut node = sample_node();
        let router = DeviceMetadata::Router(RouterMetadata::default());
        node.apply_patch(
            &NodePatch {
                device_type: Some(DeviceType::Router),
                metadata: Some(Some(router.clone())),
                ..Default::default()
            },
            Utc::now(),
        );
        assert_eq!(node.metadata, Some(router));
    }

    #[test]
    fn test_list_filters() {
        let node = sample_node();

        assert!(NodeListFilters::default().matches(&node));
        assert!(NodeListFilters { search: Some("truenas".to_string()), ..Default::default() }
            .matches(&node));
        assert!(NodeListFilters { search: Some("1.20".to_string()), ..Default::default() }
            .matches(&node));
        assert!(!NodeListFilters { device_type: Some(DeviceType::Router), ..Default::default() }
            .matches(&node));
        assert!(!NodeListFilters { tag: Some("media".to_string()), ..Default::default() }
            .matches(&node));
        assert!(NodeListFilters {
            status: Some(NodeStatus::Online),
            tag: Some("storage".to_string()),
            ..Default::default()
        }
        .matches(&node));
    }
}
