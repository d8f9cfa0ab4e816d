//! 数据源工厂

use std::sync::Arc;

use super::akshare::AkshareDataSource;
use super::baostock::BaostockDataSource;
use super::tushare::TushareDataSource;
use super::{DataSource, DataSourceType};
use crate::config::AppConfig;
use crate::connection::BaostockConnection;
use crate::error::{DataResult, DataSourceError};

/// 按类型创建数据源实例
pub struct DataSourceFactory;

impl DataSourceFactory {
    /// 已实现适配器的数据源
    pub fn available_sources() -> Vec<DataSourceType> {
        DataSourceType::ALL
            .iter()
            .copied()
            .filter(|t| Self::is_available(*t))
            .collect()
    }

    pub fn is_available(source_type: DataSourceType) -> bool {
        !matches!(source_type, DataSourceType::Wind)
    }

    fn unavailable(name: &str) -> DataSourceError {
        let available: Vec<&str> = Self::available_sources().iter().map(|t| t.as_str()).collect();
        DataSourceError::InvalidRequest(format!(
            "数据源 {} 不可用，可用的数据源: {}",
            name,
            available.join(", ")
        ))
    }

    /// 创建数据源；自动连接失败只记录警告，仍返回实例
    pub async fn create(
        source_type: DataSourceType,
        config: &AppConfig,
        auto_connect: bool,
    ) -> DataResult<Arc<dyn DataSource>> {
        let source: Arc<dyn DataSource> = match source_type {
            DataSourceType::Baostock => Arc::new(BaostockDataSource::new(
                BaostockConnection::init_global(config),
            )),
            DataSourceType::Tushare => Arc::new(TushareDataSource::from_config(config)?),
            DataSourceType::Akshare => Arc::new(AkshareDataSource::from_config(config)?),
            DataSourceType::Wind => return Err(Self::unavailable(source_type.as_str())),
        };
        log::info!("创建数据源: {}", source_type);

        if auto_connect {
            if let Err(e) = source.connect().await {
                log::warn!("数据源 {} 自动连接失败: {}", source_type, e);
            }
        }
        Ok(source)
    }

    /// 按名称创建，名称不区分大小写
    pub async fn create_from_str(
        name: &str,
        config: &AppConfig,
        auto_connect: bool,
    ) -> DataResult<Arc<dyn DataSource>> {
        let source_type: DataSourceType = name.parse().map_err(|_| Self::unavailable(name.trim()))?;
        Self::create(source_type, config, auto_connect).await
    }
}
