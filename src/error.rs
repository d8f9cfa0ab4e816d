//! 数据源错误类型
//!
//! 适配器层使用 `DataSourceError`，报表、命令行和 HTTP 层使用 `anyhow`

use thiserror::Error;

/// 数据源错误
#[derive(Debug, Error)]
pub enum DataSourceError {
    /// 数据源未连接
    #[error("数据源未连接: {0}")]
    NotConnected(String),

    /// 数据源不支持该查询
    #[error("{source_name} 不支持 {operation}")]
    Unsupported {
        source_name: String,
        operation: String,
    },

    /// 请求参数错误
    #[error("参数错误: {0}")]
    InvalidRequest(String),

    /// 认证失败（token 缺失或无效）
    #[error("认证失败: {0}")]
    Auth(String),

    #[error("网络错误: {0}")]
    Network(String),

    /// 供应商返回的业务错误
    #[error("{source_name} 返回错误 [{code}]: {message}")]
    Vendor {
        source_name: String,
        code: String,
        message: String,
    },

    #[error("解析失败: {0}")]
    Parse(String),

    /// baostock 报文格式错误
    #[error("协议错误: {0}")]
    Protocol(String),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 所有数据源均查询失败
    #[error("所有数据源都查询失败，最后错误: {last_error}")]
    AllSourcesFailed { tried: Vec<String>, last_error: String },
}

pub type DataResult<T> = std::result::Result<T, DataSourceError>;

impl DataSourceError {
    pub fn unsupported(source_name: &str, operation: &str) -> Self {
        Self::Unsupported {
            source_name: source_name.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn vendor(source_name: &str, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Vendor {
            source_name: source_name.to_string(),
            code: code.into(),
            message: message.into(),
        }
    }

    /// 是否属于数据源自身的故障（切换到下一个数据源可能成功）
    pub fn should_failover(&self) -> bool {
        !matches!(
            self,
            Self::Unsupported { .. } | Self::InvalidRequest(_) | Self::AllSourcesFailed { .. }
        )
    }
}

impl From<reqwest::Error> for DataSourceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Parse(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for DataSourceError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e.to_string())
    }
}
