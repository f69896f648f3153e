pub mod admin;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod performers;
pub mod teams;

use crate::error::{ApiError, ApiResult};

/// 路径中的ID必须为正整数
pub(crate) fn ensure_id(name: &str, id: i64) -> ApiResult<i64> {
    if id <= 0 {
        return Err(ApiError::BadRequest(format!("{} 必须为正整数: {}", name, id)));
    }
    Ok(id)
}
