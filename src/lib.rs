//! 家庭实验室设备清单服务
//! 节点、连线与拓扑的存储、校验和 REST API

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod routes;
pub mod services;
pub mod telemetry;
