//! 节点与连线的输入校验
//!
//! 输入是原始 JSON 负载，输出是规范化后的记录（创建用 [`NodeDraft`]，更新用 [`NodePatch`]）
//! 或完整的字段级错误列表。所有规则都会执行，错误一次性返回，不会在第一个错误处停止。

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    ContainerRuntime, DeviceMetadata, DeviceType, EdgeDraft, ManagementType, Node, NodeDraft,
    NodePatch, NodeStatus, Position, Service,
};

/// 存储容量只接受无符号的十进制数（不允许符号和指数）
static STORAGE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]+(\.[0-9]+)?$").expect("valid storage pattern"));

/// 更新时客户端不能设置的字段
const SYSTEM_FIELDS: [&str; 5] = ["id", "position", "createdAt", "updatedAt", "lastSeen"];

/// 单个字段错误
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// 字段错误集合（保持发现顺序）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError { field: field.into(), message: message.into() });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[FieldError] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    /// 是否包含指定字段的错误
    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    /// 指定字段的全部错误消息
    pub fn messages_for(&self, field: &str) -> Vec<&str> {
        self.0.iter().filter(|e| e.field == field).map(|e| e.message.as_str()).collect()
    }

    /// 合并嵌套错误，字段名加上前缀，例如 `nodes[2].name`
    pub fn merge_prefixed(&mut self, prefix: &str, other: ValidationErrors) {
        for error in other.0 {
            let field = if error.field.is_empty() {
                prefix.to_string()
            } else {
                format!("{}.{}", prefix, error.field)
            };
            self.0.push(FieldError { field, message: error.message });
        }
    }

    fn into_result<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> =
            self.0.iter().map(|e| format!("{}: {}", e.field, e.message)).collect();
        f.write_str(&parts.join("; "))
    }
}

/// 字段在负载中的三种状态
enum Slot<'a> {
    Absent,
    Null,
    Present(&'a Value),
}

fn slot<'a>(map: &'a Map<String, Value>, key: &str) -> Slot<'a> {
    match map.get(key) {
        None => Slot::Absent,
        Some(Value::Null) => Slot::Null,
        Some(value) => Slot::Present(value),
    }
}

fn one_of<T: fmt::Display>(values: &[T]) -> String {
    values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ")
}

fn node_object(payload: &Value) -> Result<&Map<String, Value>, ValidationErrors> {
    payload.as_object().ok_or_else(|| {
        let mut errors = ValidationErrors::default();
        errors.push("", "Node payload must be a JSON object");
        errors
    })
}

/// 校验创建负载
pub fn validate_create(payload: &Value) -> Result<NodeDraft, ValidationErrors> {
    let map = node_object(payload)?;
    NodeFields::parse(map, None).into_draft()
}

/// 校验更新负载
///
/// `current` 必须是本次写入所基于的记录（存储层在锁内读取），
/// 设备类型与 NAS 存储约束按它与补丁合并后的结果判断。
pub fn validate_update(payload: &Value, current: &Node) -> Result<NodePatch, ValidationErrors> {
    let mut map = node_object(payload)?.clone();
    for field in SYSTEM_FIELDS {
        if map.remove(field).is_some() {
            tracing::debug!(node_id = %current.id, field, "Stripped system field from update payload");
        }
    }
    NodeFields::parse(&map, Some(current)).into_patch()
}

/// 逐字段解析的中间结果
///
/// 外层 Option 表示字段是否出现在负载中，内层 Option 表示是否被显式清空。
struct NodeFields {
    creating: bool,
    errors: ValidationErrors,
    name: Option<String>,
    ip: Option<String>,
    os_type: Option<String>,
    device_type: Option<DeviceType>,
    status: Option<NodeStatus>,
    tags: Option<Vec<String>>,
    services: Option<Vec<Service>>,
    metadata: Option<Option<DeviceMetadata>>,
    storage_total: Option<Option<String>>,
    storage_used: Option<Option<String>>,
    position: Option<Position>,
    uptime: Option<Option<String>>,
}

impl NodeFields {
    fn parse(map: &Map<String, Value>, current: Option<&Node>) -> Self {
        let mut fields = NodeFields {
            creating: current.is_none(),
            errors: ValidationErrors::default(),
            name: None,
            ip: None,
            os_type: None,
            device_type: None,
            status: None,
            tags: None,
            services: None,
            metadata: None,
            storage_total: None,
            storage_used: None,
            position: None,
            uptime: None,
        };

        // 1. 必填文本
        fields.name = fields.required_text(map, "name", "Name");
        fields.ip = fields.required_text(map, "ip", "IP address");
        fields.os_type = fields.required_text(map, "osType", "OS type");

        // 2. 枚举
        let (device_type, device_type_ok) = fields.enum_field(map, "deviceType", &DeviceType::ALL);
        fields.device_type = device_type;
        let (status, _) = fields.enum_field(map, "status", &NodeStatus::ALL);
        fields.status = status;

        // 设备类型非法时无法判断元数据和存储规则
        let effective_type = device_type_ok.then(|| {
            fields
                .device_type
                .or(current.map(|n| n.device_type))
                .unwrap_or_default()
        });
        if let Some(device_type) = effective_type {
            fields.metadata = fields.metadata(map, device_type);
        }

        // 3. 标签
        fields.tags = fields.tags(map);

        // 4. 服务
        fields.services = fields.services(map);

        // 5. 存储（仅 NAS 校验）
        fields.storage_total = fields.optional_text(map, "storageTotal");
        fields.storage_used = fields.optional_text(map, "storageUsed");
        if effective_type == Some(DeviceType::Nas) {
            let total = merged(&fields.storage_total, current.and_then(|n| n.storage_total.as_ref()));
            let used = merged(&fields.storage_used, current.and_then(|n| n.storage_used.as_ref()));
            check_storage(&mut fields.errors, total, used);
        }

        if fields.creating {
            fields.position = fields.position(map);
        }
        fields.uptime = fields.optional_text(map, "uptime");

        fields
    }

    fn required_text(&mut self, map: &Map<String, Value>, key: &str, label: &str) -> Option<String> {
        match slot(map, key) {
            Slot::Absent if !self.creating => None,
            Slot::Absent | Slot::Null if self.creating => {
                self.errors.push(key, format!("{} is required", label));
                None
            }
            Slot::Absent | Slot::Null => {
                self.errors.push(key, format!("{} cannot be empty", label));
                None
            }
            Slot::Present(Value::String(s)) if s.trim().is_empty() => {
                let message = if self.creating {
                    format!("{} is required", label)
                } else {
                    format!("{} cannot be empty", label)
                };
                self.errors.push(key, message);
                None
            }
            Slot::Present(Value::String(s)) => Some(s.trim().to_string()),
            Slot::Present(_) => {
                self.errors.push(key, format!("{} must be a string", label));
                None
            }
        }
    }

    /// 返回 (解析结果, 是否合法)
    fn enum_field<T>(&mut self, map: &Map<String, Value>, key: &str, all: &[T]) -> (Option<T>, bool)
    where
        T: Copy + fmt::Display + std::str::FromStr,
    {
        match slot(map, key) {
            Slot::Absent | Slot::Null => (None, true),
            Slot::Present(value) => match value.as_str().and_then(|s| s.parse::<T>().ok()) {
                Some(parsed) => (Some(parsed), true),
                None => {
                    self.errors.push(key, format!("{} must be one of: {}", key, one_of(all)));
                    (None, false)
                }
            },
        }
    }

    fn metadata(
        &mut self,
        map: &Map<String, Value>,
        device_type: DeviceType,
    ) -> Option<Option<DeviceMetadata>> {
        let value = match slot(map, "metadata") {
            Slot::Absent => return None,
            Slot::Null => return Some(None),
            Slot::Present(value) => value,
        };
        let Some(object) = value.as_object() else {
            self.errors.push("metadata", "metadata must be an object");
            return None;
        };

        let before = self.errors.len();
        let allowed = device_type.metadata_fields();
        for key in object.keys() {
            if !allowed.contains(&key.as_str()) {
                self.errors.push(
                    format!("metadata.{}", key),
                    format!("Field is not valid metadata for deviceType {}", device_type),
                );
            }
        }
        match device_type {
            DeviceType::Switch => self.sub_enum(object, "managementType", &ManagementType::ALL),
            DeviceType::Container => self.sub_enum(object, "runtime", &ContainerRuntime::ALL),
            _ => {}
        }
        if self.errors.len() > before {
            return None;
        }

        match DeviceMetadata::from_value(device_type, value.clone()) {
            Ok(metadata) => Some(Some(metadata)),
            Err(e) => {
                self.errors.push("metadata", format!("Invalid {} metadata: {}", device_type, e));
                None
            }
        }
    }

    fn sub_enum<T>(&mut self, object: &Map<String, Value>, key: &str, all: &[T])
    where
        T: fmt::Display + std::str::FromStr,
    {
        if let Slot::Present(value) = slot(object, key) {
            if value.as_str().and_then(|s| s.parse::<T>().ok()).is_none() {
                self.errors.push(
                    format!("metadata.{}", key),
                    format!("{} must be one of: {}", key, one_of(all)),
                );
            }
        }
    }

    fn tags(&mut self, map: &Map<String, Value>) -> Option<Vec<String>> {
        let value = match slot(map, "tags") {
            Slot::Absent | Slot::Null => return None,
            Slot::Present(value) => value,
        };
        let Some(items) = value.as_array() else {
            self.errors.push("tags", "tags must be an array of strings");
            return None;
        };

        let mut tags = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            match item.as_str() {
                Some(tag) => tags.push(tag.to_string()),
                None => self.errors.push(format!("tags[{}]", i), "Tag must be a string"),
            }
        }
        Some(tags)
    }

    fn services(&mut self, map: &Map<String, Value>) -> Option<Vec<Service>> {
        let value = match slot(map, "services") {
            Slot::Absent | Slot::Null => return None,
            Slot::Present(value) => value,
        };
        let Some(items) = value.as_array() else {
            self.errors.push("services", "services must be an array");
            return None;
        };

        let mut services = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let prefix = format!("services[{}]", i);
            let mut service: Service = match serde_json::from_value(item.clone()) {
                Ok(service) => service,
                Err(_) => {
                    self.errors.push(prefix, "Service must be an object with string name and url");
                    continue;
                }
            };
            // 与节点名称一致，纯空白视为空
            service.name = service.name.trim().to_string();
            if let Err(e) = service.validate() {
                let mut field_errors: Vec<_> = e.field_errors().into_iter().collect();
                field_errors.sort_by(|a, b| a.0.cmp(&b.0));
                for (field, errs) in field_errors {
                    for err in errs {
                        let message = err
                            .message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| format!("Invalid {}", field));
                        self.errors.push(format!("{}.{}", prefix, field), message);
                    }
                }
                continue;
            }
            services.push(service);
        }
        Some(services)
    }

    /// 可选文本；null 或空字符串表示清空。数字按原样转成文本。
    fn optional_text(&mut self, map: &Map<String, Value>, key: &str) -> Option<Option<String>> {
        match slot(map, key) {
            Slot::Absent => None,
            Slot::Null => Some(None),
            Slot::Present(Value::String(s)) if s.is_empty() => Some(None),
            Slot::Present(Value::String(s)) => Some(Some(s.clone())),
            Slot::Present(Value::Number(n)) => Some(Some(n.to_string())),
            Slot::Present(_) => {
                self.errors.push(key, format!("{} must be a string", key));
                None
            }
        }
    }

    fn position(&mut self, map: &Map<String, Value>) -> Option<Position> {
        match slot(map, "position") {
            Slot::Absent | Slot::Null => None,
            Slot::Present(value) => match serde_json::from_value::<Position>(value.clone()) {
                Ok(position) => Some(position),
                Err(_) => {
                    self.errors.push("position", "position must be an object with numeric x and y");
                    None
                }
            },
        }
    }

    fn into_draft(self) -> Result<NodeDraft, ValidationErrors> {
        let draft = NodeDraft {
            name: self.name.unwrap_or_default(),
            ip: self.ip.unwrap_or_default(),
            os_type: self.os_type.unwrap_or_default(),
            device_type: self.device_type.unwrap_or_default(),
            status: self.status.unwrap_or_default(),
            tags: self.tags.unwrap_or_default(),
            services: self.services.unwrap_or_default(),
            storage_total: self.storage_total.flatten(),
            storage_used: self.storage_used.flatten(),
            metadata: self.metadata.flatten(),
            position: self.position.unwrap_or_default(),
            uptime: self.uptime.flatten(),
        };
        self.errors.into_result(draft)
    }

    fn into_patch(self) -> Result<NodePatch, ValidationErrors> {
        let patch = NodePatch {
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
            uptime: self.uptime,
        };
        self.errors.into_result(patch)
    }
}

/// 更新后的有效值：负载中给出的优先，否则沿用当前记录
fn merged<'a>(patched: &'a Option<Option<String>>, current: Option<&'a String>) -> Option<&'a str> {
    match patched {
        Some(value) => value.as_deref(),
        None => current.map(String::as_str),
    }
}

/// 校验单个存储值，合法时返回数值
fn check_storage_value(
    errors: &mut ValidationErrors,
    field: &str,
    label: &str,
    value: Option<&str>,
) -> Option<f64> {
    let value = value.filter(|v| !v.is_empty())?;
    if !STORAGE_PATTERN.is_match(value) {
        // 形如 "-5" 的值单独提示非负约束
        let message = match value.trim().parse::<f64>() {
            Ok(n) if n.is_finite() && n < 0.0 => format!("{} storage must be non-negative", label),
            _ => format!("{} storage must be a valid number", label),
        };
        errors.push(field, message);
        return None;
    }
    let parsed = value.parse::<f64>().ok()?;
    if parsed < 0.0 {
        errors.push(field, format!("{} storage must be non-negative", label));
        return None;
    }
    Some(parsed)
}

/// NAS 存储约束：格式、非负、已用不超过总量
fn check_storage(errors: &mut ValidationErrors, total: Option<&str>, used: Option<&str>) {
    let total = check_storage_value(errors, "storageTotal", "Total", total);
    let used = check_storage_value(errors, "storageUsed", "Used", used);
    if let (Some(total), Some(used)) = (total, used) {
        if used > total {
            errors.push("storageUsed", "Used storage cannot exceed total storage");
        }
    }
}

/// 连线负载中的原始字段
pub(crate) struct EdgeFields {
    pub source: Option<String>,
    pub target: Option<String>,
    pub animated: bool,
}

pub(crate) fn parse_edge_fields(payload: &Value, errors: &mut ValidationErrors) -> EdgeFields {
    let mut fields = EdgeFields { source: None, target: None, animated: false };
    let Some(map) = payload.as_object() else {
        errors.push("", "Edge payload must be a JSON object");
        return fields;
    };

    for key in ["source", "target"] {
        let value = match slot(map, key) {
            Slot::Present(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Slot::Present(Value::String(_)) | Slot::Absent | Slot::Null => {
                errors.push(key, format!("{} is required", key));
                None
            }
            Slot::Present(_) => {
                errors.push(key, format!("{} must be a string", key));
                None
            }
        };
        if key == "source" {
            fields.source = value;
        } else {
            fields.target = value;
        }
    }

    fields.animated = match slot(map, "animated") {
        Slot::Absent | Slot::Null => false,
        Slot::Present(Value::Bool(b)) => *b,
        Slot::Present(Value::String(s)) if s == "true" => true,
        Slot::Present(Value::String(s)) if s == "false" => false,
        Slot::Present(_) => {
            errors.push("animated", "animated must be \"true\" or \"false\"");
            false
        }
    };

    fields
}

/// 校验连线创建负载
///
/// 端点是否存在由存储层的外键约束保证，这里只检查 ID 格式。
pub fn validate_edge(payload: &Value) -> Result<EdgeDraft, ValidationErrors> {
    let mut errors = ValidationErrors::default();
    let fields = parse_edge_fields(payload, &mut errors);

    let mut endpoint = |key: &str, raw: Option<String>| {
        raw.and_then(|s| match Uuid::parse_str(&s) {
            Ok(id) => Some(id),
            Err(_) => {
                errors.push(key, format!("{} must be a valid node id", key));
                None
            }
        })
    };
    let source = endpoint("source", fields.source);
    let target = endpoint("target", fields.target);

    match (source, target) {
        (Some(source), Some(target)) if errors.is_empty() => {
            Ok(EdgeDraft { source, target, animated: fields.animated })
        }
        _ => Err(errors),
    }
}
