//! HTTP 处理器模块

pub mod edge;
pub mod health;
pub mod node;
pub mod topology;

use axum::{extract::rejection::JsonRejection, Json};
use serde_json::Value;
use uuid::Uuid;

use crate::error::AppError;

/// 解析路径中的 ID；格式不合法的 ID 不可能存在，按 404 处理
pub(crate) fn parse_id(raw: &str, what: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::not_found(what))
}

/// 请求体解析失败时沿用统一的错误结构
pub(crate) fn json_body(payload: Result<Json<Value>, JsonRejection>) -> Result<Value, AppError> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => Err(AppError::BadRequest(rejection.body_text())),
    }
}
