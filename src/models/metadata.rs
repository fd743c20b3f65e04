//! 设备类型专属元数据
//! 每种 deviceType 对应一个元数据结构，由同级的 deviceType 字段作为判别

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::node::DeviceType;

/// 交换机管理类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManagementType {
    Managed,
    Unmanaged,
    Smart,
}

impl ManagementType {
    pub const ALL: [ManagementType; 3] =
        [ManagementType::Managed, ManagementType::Unmanaged, ManagementType::Smart];

    pub fn as_str(&self) -> &'static str {
        match self {
            ManagementType::Managed => "managed",
            ManagementType::Unmanaged => "unmanaged",
            ManagementType::Smart => "smart",
        }
    }
}

impl FromStr for ManagementType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|v| v.as_str() == s).ok_or(())
    }
}

/// 容器运行时
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerRuntime {
    Docker,
    Podman,
    Containerd,
}

impl ContainerRuntime {
    pub const ALL: [ContainerRuntime; 3] =
        [ContainerRuntime::Docker, ContainerRuntime::Podman, ContainerRuntime::Containerd];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerRuntime::Docker => "docker",
            ContainerRuntime::Podman => "podman",
            ContainerRuntime::Containerd => "containerd",
        }
    }
}

impl FromStr for ContainerRuntime {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|v| v.as_str() == s).ok_or(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ServerMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ram: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RouterMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wan_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dhcp_range: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SwitchMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_count: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_speed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub management_type: Option<ManagementType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan_support: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AccessPointMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wifi_standard: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NasMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raid_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocols: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ContainerMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<ContainerRuntime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<String>,
}

/// 设备元数据
///
/// 序列化时只输出内部结构体（不带标签），判别依据是节点上的 `deviceType`。
/// 反序列化必须先知道 deviceType，因此不实现 `Deserialize`，改用 [`DeviceMetadata::from_value`]。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DeviceMetadata {
    Server(ServerMetadata),
    Router(RouterMetadata),
    Switch(SwitchMetadata),
    AccessPoint(AccessPointMetadata),
    Nas(NasMetadata),
    Container(ContainerMetadata),
}

impl DeviceMetadata {
    /// 元数据所属的设备类型
    pub fn device_type(&self) -> DeviceType {
        match self {
            DeviceMetadata::Server(_) => DeviceType::Server,
            DeviceMetadata::Router(_) => DeviceType::Router,
            DeviceMetadata::Switch(_) => DeviceType::Switch,
            DeviceMetadata::AccessPoint(_) => DeviceType::AccessPoint,
            DeviceMetadata::Nas(_) => DeviceType::Nas,
            DeviceMetadata::Container(_) => DeviceType::Container,
        }
    }

    /// 按设备类型解析元数据对象
    pub fn from_value(
        device_type: DeviceType,
        value: serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        let metadata = match device_type {
            DeviceType::Server => DeviceMetadata::Server(serde_json::from_value(value)?),
            DeviceType::Router => DeviceMetadata::Router(serde_json::from_value(value)?),
            DeviceType::Switch => DeviceMetadata::Switch(serde_json::from_value(value)?),
            DeviceType::AccessPoint => DeviceMetadata::AccessPoint(serde_json::from_value(value)?),
            DeviceType::Nas => DeviceMetadata::Nas(serde_json::from_value(value)?),
            DeviceType::Container => DeviceMetadata::Container(serde_json::from_value(value)?),
        };
        Ok(metadata)
    }

    pub fn to_value(&self) -> serde_json::Value {
        // 内部结构体只包含字符串/布尔/数组，序列化不会失败
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl fmt::Display for ManagementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ContainerRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
