//! 业务服务层
//! 输入校验、导入批次规划与仪表盘统计

pub mod import;
pub mod stats;
pub mod validation;

pub use import::{EdgeEndpoint, ImportEdge, ImportPlan};
pub use stats::{format_storage, summarize, InventorySummary, StorageUsage};
pub use validation::{validate_create, validate_edge, validate_update, FieldError, ValidationErrors};
