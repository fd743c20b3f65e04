//! 数据模型模块
//! 节点、连线与设备元数据

pub mod edge;
pub mod metadata;
pub mod node;

pub use edge::*;
pub use metadata::*;
pub use node::*;
