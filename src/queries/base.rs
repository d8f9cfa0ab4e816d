//! 查询基础设施
//!
//! 查询可以运行在三种上下文中：
//! - baostock 会话（未指定数据源时的默认方式）
//! - 单个数据源
//! - 数据源管理器（每次调用都走降级查询）

use std::future::Future;
use std::sync::Arc;

use crate::connection::BaostockConnection;
use crate::datasource::baostock::BaostockDataSource;
use crate::datasource::{DataSource, DataSourceManager, DataSourceType};
use crate::error::DataResult;

/// 批量查询结果，按输入顺序排列，失败的项为 None
pub type BatchResult<T> = Vec<(String, Option<T>)>;

#[derive(Clone)]
pub enum QueryContext {
    Session(Arc<BaostockConnection>),
    Single(Arc<dyn DataSource>),
    Manager(Arc<DataSourceManager>),
}

impl Default for QueryContext {
    fn default() -> Self {
        QueryContext::Session(BaostockConnection::global())
    }
}

impl From<Arc<dyn DataSource>> for QueryContext {
    fn from(source: Arc<dyn DataSource>) -> Self {
        QueryContext::Single(source)
    }
}

impl From<Arc<DataSourceManager>> for QueryContext {
    fn from(manager: Arc<DataSourceManager>) -> Self {
        QueryContext::Manager(manager)
    }
}

impl QueryContext {
    pub fn is_session(&self) -> bool {
        matches!(self, QueryContext::Session(_))
    }

    /// 确保已连接；管理器在查询时自行连接
    pub async fn ensure_connection(&self) -> DataResult<()> {
        match self {
            QueryContext::Session(conn) => {
                if !conn.is_connected() {
                    conn.login().await?;
                }
                Ok(())
            }
            QueryContext::Single(source) => {
                if !source.is_connected() {
                    source.connect().await?;
                }
                Ok(())
            }
            QueryContext::Manager(_) => Ok(()),
        }
    }

    /// 在当前上下文中执行查询
    ///
    /// `source` 只对管理器上下文生效，用于指定数据源
    pub async fn run<T, F, Fut>(&self, source: Option<DataSourceType>, op: F) -> DataResult<T>
    where
        F: Fn(Arc<dyn DataSource>) -> Fut,
        Fut: Future<Output = DataResult<T>>,
    {
        match self {
            QueryContext::Session(conn) => {
                self.ensure_connection().await?;
                let ds: Arc<dyn DataSource> = Arc::new(BaostockDataSource::new(conn.clone()));
                op(ds).await
            }
            QueryContext::Single(ds) => {
                self.ensure_connection().await?;
                op(ds.clone()).await
            }
            QueryContext::Manager(manager) => manager.query_with_fallback(source, op).await,
        }
    }
}

/// 逐项顺序查询，单项失败记录日志并以 None 占位
pub async fn batch_query<T, F, Fut>(items: &[String], query_fn: F) -> BatchResult<T>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = DataResult<T>>,
{
    let mut results = Vec::with_capacity(items.len());
    for item in items {
        match query_fn(item.clone()).await {
            Ok(value) => results.push((item.clone(), Some(value))),
            Err(e) => {
                log::error!("查询 {} 时出错: {}", item, e);
                results.push((item.clone(), None));
            }
        }
    }
    results
}

/// 成功且非空的结果数
pub fn success_count(results: &BatchResult<crate::models::table::DataTable>) -> usize {
    results
        .iter()
        .filter(|(_, r)| r.as_ref().map(|t| !t.is_empty()).unwrap_or(false))
        .count()
}
