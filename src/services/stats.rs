//! 仪表盘统计
//! 对节点集合做一次性聚合：在线率、服务数量、NAS 存储汇总，纯计算无 I/O

use serde::Serialize;

use crate::models::{DeviceType, Node, NodeStatus};

/// 仪表盘汇总
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventorySummary {
    pub total_nodes: usize,
    pub online_nodes: usize,
    /// 没有节点时为 None
    pub online_percent: Option<u32>,
    pub service_count: usize,
    pub storage: StorageUsage,
}

/// NAS 存储汇总
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum StorageUsage {
    /// 没有可统计的 NAS 节点（或总量为 0）
    NoNasData,
    #[serde(rename_all = "camelCase")]
    Measured {
        total_gb: f64,
        used_gb: f64,
        used_percent: u32,
        total_display: String,
        used_display: String,
    },
}

impl StorageUsage {
    pub fn used_percent(&self) -> Option<u32> {
        match self {
            StorageUsage::NoNasData => None,
            StorageUsage::Measured { used_percent, .. } => Some(*used_percent),
        }
    }
}

pub fn summarize(nodes: &[Node]) -> InventorySummary {
    let (online_nodes, total_nodes) = online_ratio(nodes);
    InventorySummary {
        total_nodes,
        online_nodes,
        online_percent: percent(online_nodes as f64, total_nodes as f64),
        service_count: service_count(nodes),
        storage: storage_usage(nodes),
    }
}

/// (在线数, 总数)
pub fn online_ratio(nodes: &[Node]) -> (usize, usize) {
    let online = nodes.iter().filter(|n| n.status == NodeStatus::Online).count();
    (online, nodes.len())
}

pub fn service_count(nodes: &[Node]) -> usize {
    nodes.iter().map(|n| n.services.len()).sum()
}

/// 汇总 NAS 存储
///
/// 只统计 deviceType 为 nas 且总量、已用都非空的节点。
/// 无法解析的数值按 0 计入，节点本身不会被排除。
pub fn storage_usage(nodes: &[Node]) -> StorageUsage {
    let (total, used) = nodes
        .iter()
        .filter(|n| n.device_type == DeviceType::Nas)
        .filter_map(|n| match (n.storage_total.as_deref(), n.storage_used.as_deref()) {
            (Some(t), Some(u)) if !t.is_empty() && !u.is_empty() => Some((t, u)),
            _ => None,
        })
        .fold((0.0, 0.0), |(total, used), (t, u)| {
            (total + parse_or_zero(t), used + parse_or_zero(u))
        });

    match percent(used, total) {
        Some(used_percent) => StorageUsage::Measured {
            total_gb: total,
            used_gb: used,
            used_percent,
            total_display: format_storage(total),
            used_display: format_storage(used),
        },
        None => StorageUsage::NoNasData,
    }
}

fn parse_or_zero(value: &str) -> f64 {
    value.trim().parse::<f64>().ok().filter(|n| n.is_finite()).unwrap_or(0.0)
}

fn percent(part: f64, whole: f64) -> Option<u32> {
    if whole > 0.0 {
        Some((part / whole * 100.0).round() as u32)
    } else {
        None
    }
}

/// GB 数值格式化：≥ 1000 显示为 TB，保留一位小数并去掉末尾的 ".0"
pub fn format_storage(gb: f64) -> String {
    if gb >= 1000.0 {
        format!("{} TB", one_decimal(gb / 1000.0))
    } else {
        format!("{} GB", one_decimal(gb))
    }
}

fn one_decimal(value: f64) -> String {
    let formatted = format!("{:.1}", value);
    match formatted.strip_suffix(".0") {
        Some(whole) => whole.to_string(),
        None => formatted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NodeDraft, Position, Service};
    use chrono::Utc;
    use uuid::Uuid;

    fn node(device_type: DeviceType, status: NodeStatus, storage: Option<(&str, &str)>) -> Node {
        NodeDraft {
            name: "node".to_string(),
            ip: "10.0.0.1".to_string(),
            os_type: "Linux".to_string(),
            device_type,
            status,
            tags: vec![],
            services: vec![],
            storage_total: storage.map(|(t, _)| t.to_string()),
            storage_used: storage.map(|(_, u)| u.to_string()),
            metadata: None,
            position: Position::default(),
            uptime: None,
        }
        .into_node(Uuid::new_v4(), Utc::now())
    }

    #[test]
    fn test_format_storage() {
        assert_eq!(format_storage(1000.0), "1 TB");
        assert_eq!(format_storage(1500.0), "1.5 TB");
        assert_eq!(format_storage(512.0), "512 GB");
        assert_eq!(format_storage(512.26), "512.3 GB");
        assert_eq!(format_storage(0.0), "0 GB");
        assert_eq!(format_storage(12_400.0), "12.4 TB");
        assert_eq!(format_storage(1500.0), format_storage(1500.0));
    }

    #[test]
    fn test_storage_aggregation() {
        let nodes = vec![
            node(DeviceType::Nas, NodeStatus::Online, Some(("1000", "500"))),
            node(DeviceType::Nas, NodeStatus::Online, Some(("2000", "1000"))),
        ];

        match storage_usage(&nodes) {
            StorageUsage::Measured { total_gb, used_gb, used_percent, total_display, used_display } => {
                assert_eq!(total_gb, 3000.0);
                assert_eq!(used_gb, 1500.0);
                assert_eq!(used_percent, 50);
                assert_eq!(total_display, "3 TB");
                assert_eq!(used_display, "1.5 TB");
            }
            StorageUsage::NoNasData => panic!("expected measured storage"),
        }
    }

    #[test]
    fn test_storage_without_nas_nodes() {
        let nodes = vec![
            node(DeviceType::Server, NodeStatus::Online, Some(("1000", "500"))),
            node(DeviceType::Nas, NodeStatus::Online, Some(("1000", ""))),
            node(DeviceType::Nas, NodeStatus::Online, None),
        ];
        assert_eq!(storage_usage(&nodes), StorageUsage::NoNasData);
        assert_eq!(storage_usage(&[]), StorageUsage::NoNasData);
    }

    #[test]
    fn test_unparsable_storage_counts_as_zero() {
        let nodes = vec![
            node(DeviceType::Nas, NodeStatus::Online, Some(("1000", "250"))),
            node(DeviceType::Nas, NodeStatus::Online, Some(("garbage", "750"))),
        ];

        let usage = storage_usage(&nodes);
        assert_eq!(usage.used_percent(), Some(100));

        let nodes = vec![node(DeviceType::Nas, NodeStatus::Online, Some(("n/a", "n/a")))];
        assert_eq!(storage_usage(&nodes), StorageUsage::NoNasData);
    }

    #[test]
    fn test_summary_counts() {
        let mut pve = node(DeviceType::Server, NodeStatus::Online, None);
        pve.services = vec![
            Service { name: "Web UI".to_string(), url: "https://10.0.0.2:8006".to_string() },
            Service { name: "SSH".to_string(), url: "ssh://10.0.0.2".to_string() },
        ];
        let nodes = vec![
            pve,
            node(DeviceType::Router, NodeStatus::Offline, None),
            node(DeviceType::Switch, NodeStatus::Degraded, None),
            node(DeviceType::Nas, NodeStatus::Online, Some(("4000", "1000"))),
        ];

        let summary = summarize(&nodes);
        assert_eq!(summary.total_nodes, 4);
        assert_eq!(summary.online_nodes, 2);
        assert_eq!(summary.online_percent, Some(50));
        assert_eq!(summary.service_count, 2);
        assert_eq!(summary.storage.used_percent(), Some(25));
    }

    #[test]
    fn test_empty_summary() {
        let summary = summarize(&[]);
        assert_eq!(summary.online_percent, None);
        assert_eq!(summary.service_count, 0);

        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["storage"]["state"], "no-nas-data");
        assert!(value["onlinePercent"].is_null());
    }
}
