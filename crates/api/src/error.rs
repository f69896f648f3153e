use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use gigmarket_core::MarketError;
use serde_json::json;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("市场服务错误: {0}")]
    Market(#[from] MarketError),

    #[error("请求参数错误: {0}")]
    BadRequest(String),

    #[error("未找到资源")]
    NotFound,
}

impl ApiError {
    /// HTTP 状态码和错误类型标识
    pub fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Market(err) => match err {
                MarketError::OrderNotFound { .. } => (StatusCode::NOT_FOUND, "ORDER_NOT_FOUND"),
                MarketError::TeamNotFound { .. } => (StatusCode::NOT_FOUND, "TEAM_NOT_FOUND"),
                MarketError::PerformerNotFound { .. } => {
                    (StatusCode::NOT_FOUND, "PERFORMER_NOT_FOUND")
                }
                MarketError::CustomerNotFound { .. } => {
                    (StatusCode::NOT_FOUND, "CUSTOMER_NOT_FOUND")
                }
                MarketError::OrderInaccessible { .. } => {
                    (StatusCode::FORBIDDEN, "ORDER_INACCESSIBLE")
                }
                MarketError::PerformerBlocked { .. } => {
                    (StatusCode::FORBIDDEN, "PERFORMER_BLOCKED")
                }
                MarketError::CustomerBlocked { .. } => (StatusCode::FORBIDDEN, "CUSTOMER_BLOCKED"),
                MarketError::NotOrderOwner { .. } => (StatusCode::FORBIDDEN, "NOT_ORDER_OWNER"),
                MarketError::NotTeamOwner { .. } => (StatusCode::FORBIDDEN, "NOT_TEAM_OWNER"),
                MarketError::AlreadyAssigned { .. } => {
                    (StatusCode::BAD_REQUEST, "ALREADY_ASSIGNED")
                }
                MarketError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
                MarketError::InvalidPercentage { .. } => {
                    (StatusCode::BAD_REQUEST, "INVALID_PERCENTAGE")
                }
                MarketError::InvalidPrice(_) => (StatusCode::BAD_REQUEST, "INVALID_PRICE"),
                MarketError::NotTeamMember { .. } => (StatusCode::BAD_REQUEST, "NOT_TEAM_MEMBER"),
                MarketError::AlreadyTaken { .. } => (StatusCode::CONFLICT, "ALREADY_TAKEN"),
                MarketError::TeamLeadAlreadySet { .. } => {
                    (StatusCode::CONFLICT, "TEAM_LEAD_ALREADY_SET")
                }
                MarketError::Contention(_) => (StatusCode::SERVICE_UNAVAILABLE, "CONTENTION"),
                MarketError::Database(_) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "INFRASTRUCTURE_ERROR")
                }
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            },
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Market(err) if err.is_retryable())
    }

    fn message(&self) -> String {
        match self {
            ApiError::Market(err) => err.user_message().to_string(),
            ApiError::BadRequest(msg) => format!("请求参数错误: {}", msg),
            ApiError::NotFound => "请求的资源不存在".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.classify();
        if status.is_server_error() {
            error!("请求处理失败: {}", self);
        }

        let body = Json(json!({
            "error": {
                "message": self.message(),
                "type": error_type,
                "code": status.as_u16(),
                "retryable": self.is_retryable(),
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
