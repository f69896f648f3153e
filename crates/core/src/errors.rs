use thiserror::Error;

/// 市场服务错误类型定义
#[derive(Debug, Error)]
pub enum MarketError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("订单未找到: {id}")]
    OrderNotFound { id: i64 },

    #[error("订单不可访问: {id}")]
    OrderInaccessible { id: i64 },

    #[error("执行者 {performer_id} 已认领订单 {order_id}")]
    AlreadyAssigned { order_id: i64, performer_id: i64 },

    #[error("订单已被其他执行者认领: {order_id}")]
    AlreadyTaken { order_id: i64 },

    #[error("团队未找到: {id}")]
    TeamNotFound { id: i64 },

    #[error("无效的调价百分比: {percent}，允许值: 10, 20, 25, 50, 75")]
    InvalidPercentage { percent: u32 },

    #[error("资源争用，请稍后重试: {0}")]
    Contention(String),

    #[error("执行者未找到: {id}")]
    PerformerNotFound { id: i64 },

    #[error("执行者已被封禁: {id}")]
    PerformerBlocked { id: i64 },

    #[error("客户未找到: {id}")]
    CustomerNotFound { id: i64 },

    #[error("客户已被封禁: {id}")]
    CustomerBlocked { id: i64 },

    #[error("客户 {customer_id} 不是订单 {order_id} 的所有者")]
    NotOrderOwner { order_id: i64, customer_id: i64 },

    #[error("客户 {customer_id} 不是团队 {team_id} 的所有者")]
    NotTeamOwner { team_id: i64, customer_id: i64 },

    #[error("执行者 {performer_id} 不是团队 {team_id} 的成员")]
    NotTeamMember { team_id: i64, performer_id: i64 },

    #[error("团队 {team_id} 已指定负责人")]
    TeamLeadAlreadySet { team_id: i64 },

    #[error("无效的价格: {0}")]
    InvalidPrice(String),

    #[error("数据验证失败: {0}")]
    Validation(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 统一的Result类型
pub type MarketResult<T> = std::result::Result<T, MarketError>;

impl MarketError {
    pub fn contention<S: Into<String>>(msg: S) -> Self {
        Self::Contention(msg.into())
    }
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// 仅资源争用和基础设施错误可以重试，业务规则拒绝永远不重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, MarketError::Contention(_) | MarketError::Database(_))
    }

    /// 确定性的业务规则拒绝，原样返回给调用方
    pub fn is_domain_rejection(&self) -> bool {
        matches!(
            self,
            MarketError::OrderNotFound { .. }
                | MarketError::OrderInaccessible { .. }
                | MarketError::AlreadyAssigned { .. }
                | MarketError::AlreadyTaken { .. }
                | MarketError::TeamNotFound { .. }
                | MarketError::InvalidPercentage { .. }
                | MarketError::PerformerNotFound { .. }
                | MarketError::PerformerBlocked { .. }
                | MarketError::CustomerNotFound { .. }
                | MarketError::CustomerBlocked { .. }
                | MarketError::NotOrderOwner { .. }
                | MarketError::NotTeamOwner { .. }
                | MarketError::NotTeamMember { .. }
                | MarketError::TeamLeadAlreadySet { .. }
                | MarketError::InvalidPrice(_)
                | MarketError::Validation(_)
        )
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, MarketError::Configuration(_))
    }

    pub fn user_message(&self) -> &str {
        match self {
            MarketError::OrderNotFound { .. } => "请求的订单不存在",
            MarketError::OrderInaccessible { .. } => "当前订单不可访问",
            MarketError::AlreadyAssigned { .. } => "您已认领该订单",
            MarketError::AlreadyTaken { .. } => "该订单已被其他用户认领，请刷新订单列表",
            MarketError::TeamNotFound { .. } => "请求的团队不存在",
            MarketError::InvalidPercentage { .. } => "无效的百分比，允许值: 10, 20, 25, 50, 75",
            MarketError::PerformerNotFound { .. } => "执行者不存在",
            MarketError::PerformerBlocked { .. } => "用户被禁止认领订单",
            MarketError::CustomerNotFound { .. } => "客户不存在",
            MarketError::CustomerBlocked { .. } => "用户被禁止创建订单",
            MarketError::NotOrderOwner { .. } => "只能操作自己创建的订单",
            MarketError::NotTeamOwner { .. } => "只能管理自己订单的团队",
            MarketError::NotTeamMember { .. } => "负责人必须是团队成员",
            MarketError::TeamLeadAlreadySet { .. } => "团队负责人已确定",
            MarketError::InvalidPrice(_) => "价格无效",
            MarketError::Validation(_) => "输入数据验证失败",
            MarketError::Contention(_) => "系统繁忙，请稍后重试",
            _ => "系统内部错误，请稍后重试",
        }
    }
}

impl From<serde_json::Error> for MarketError {
    fn from(err: serde_json::Error) -> Self {
        MarketError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for MarketError {
    fn from(err: anyhow::Error) -> Self {
        MarketError::Internal(err.to_string())
    }
}
