//! 数据源管理器
//!
//! 缓存各类型的数据源实例，按「默认数据源 → 备用数据源」的顺序查询，
//! 前一个数据源失败或不支持时自动切换到下一个

use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{DataSource, DataSourceFactory, DataSourceType};
use crate::config::AppConfig;
use crate::error::{DataResult, DataSourceError};

/// 数据源状态（用于 /sources 接口和 sources 子命令）
#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub name: String,
    pub available: bool,
    pub connected: bool,
    pub is_default: bool,
    pub is_fallback: bool,
}

pub struct DataSourceManager {
    config: AppConfig,
    default_source: RwLock<DataSourceType>,
    fallback_sources: RwLock<Vec<DataSourceType>>,
    instances: RwLock<HashMap<DataSourceType, Arc<dyn DataSource>>>,
}

impl DataSourceManager {
    pub fn new(config: AppConfig) -> Self {
        let default_source = match config.default_source.parse::<DataSourceType>() {
            Ok(t) if DataSourceFactory::is_available(t) => t,
            _ => {
                log::warn!(
                    "默认数据源 {} 无效或不可用，使用 baostock",
                    config.default_source
                );
                DataSourceType::Baostock
            }
        };

        let mut fallback_sources = Vec::new();
        for name in &config.fallback_sources {
            match name.parse::<DataSourceType>() {
                Ok(t) if DataSourceFactory::is_available(t) => {
                    if t != default_source && !fallback_sources.contains(&t) {
                        fallback_sources.push(t);
                    }
                }
                _ => log::warn!("备用数据源 {} 无效或不可用，已忽略", name),
            }
        }

        log::info!(
            "数据源管理器初始化: 默认 {}，备用 {:?}",
            default_source,
            fallback_sources.iter().map(|t| t.as_str()).collect::<Vec<_>>()
        );

        Self {
            config,
            default_source: RwLock::new(default_source),
            fallback_sources: RwLock::new(fallback_sources),
            instances: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub async fn default_source(&self) -> DataSourceType {
        *self.default_source.read().await
    }

    pub async fn fallback_sources(&self) -> Vec<DataSourceType> {
        self.fallback_sources.read().await.clone()
    }

    /// 放入已创建的实例（替换同类型的缓存）
    #[cfg(test)]
    pub async fn register(&self, source: Arc<dyn DataSource>) {
        let source_type = source.source_type();
        self.instances.write().await.insert(source_type, source);
    }

    /// 获取数据源实例，未指定类型时使用默认数据源
    ///
    /// 已缓存的实例断开时会重新连接
    pub async fn get_datasource(
        &self,
        source_type: Option<DataSourceType>,
        auto_connect: bool,
    ) -> DataResult<Arc<dyn DataSource>> {
        let source_type = match source_type {
            Some(t) => t,
            None => self.default_source().await,
        };

        let cached = self.instances.read().await.get(&source_type).cloned();
        if let Some(source) = cached {
            if auto_connect && !source.is_connected() {
                log::info!("数据源 {} 已断开，重新连接", source_type);
                if let Err(e) = source.connect().await {
                    log::warn!("数据源 {} 重新连接失败: {}", source_type, e);
                }
            }
            return Ok(source);
        }

        let source = DataSourceFactory::create(source_type, &self.config, auto_connect).await?;
        self.instances
            .write()
            .await
            .entry(source_type)
            .or_insert_with(|| source.clone());
        Ok(source)
    }

    /// 本次查询要尝试的数据源顺序
    async fn query_order(&self, explicit: Option<DataSourceType>) -> Vec<DataSourceType> {
        if let Some(t) = explicit {
            return vec![t];
        }
        let mut order = vec![self.default_source().await];
        for t in self.fallback_sources.read().await.iter() {
            if !order.contains(t) {
                order.push(*t);
            }
        }
        order
    }

    /// 带降级的查询
    ///
    /// 指定类型时只查询该数据源；否则依次尝试默认数据源和备用数据源。
    /// 任何数据源返回结果（包括空表）即返回；全部失败时返回 `AllSourcesFailed`。
    /// 参数错误对所有数据源都一样，原样返回不再尝试
    pub async fn query_with_fallback<T, F, Fut>(
        &self,
        source_type: Option<DataSourceType>,
        op: F,
    ) -> DataResult<T>
    where
        F: Fn(Arc<dyn DataSource>) -> Fut,
        Fut: Future<Output = DataResult<T>>,
    {
        let order = self.query_order(source_type).await;
        let mut tried = Vec::with_capacity(order.len());
        let mut last_error: Option<DataSourceError> = None;

        for t in order {
            tried.push(t.as_str().to_string());

            let source = match self.get_datasource(Some(t), true).await {
                Ok(s) => s,
                Err(e @ DataSourceError::InvalidRequest(_)) => return Err(e),
                Err(e) => {
                    log::warn!("获取数据源 {} 失败: {}", t, e);
                    last_error = Some(e);
                    continue;
                }
            };
            if !source.is_connected() {
                log::warn!("数据源 {} 未连接，尝试下一个", t);
                last_error = Some(DataSourceError::NotConnected(t.as_str().to_string()));
                continue;
            }

            log::debug!("使用数据源 {} 查询", t);
            match op(source).await {
                Ok(result) => return Ok(result),
                Err(e @ DataSourceError::InvalidRequest(_)) => {
                    log::warn!("数据源 {} 拒绝请求: {}", t, e);
                    return Err(e);
                }
                Err(e) => {
                    if e.should_failover() {
                        log::warn!("数据源 {} 查询失败: {}", t, e);
                    } else {
                        log::info!("数据源 {}: {}", t, e);
                    }
                    last_error = Some(e);
                }
            }
        }

        let last_error = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "没有可用的数据源".to_string());
        log::error!("所有数据源都查询失败 (已尝试: {})", tried.join(", "));
        Err(DataSourceError::AllSourcesFailed { tried, last_error })
    }

    pub async fn set_default_source(&self, source_type: DataSourceType) -> DataResult<()> {
        if !DataSourceFactory::is_available(source_type) {
            return Err(DataSourceError::InvalidRequest(format!(
                "数据源 {} 不可用",
                source_type
            )));
        }
        *self.default_source.write().await = source_type;
        log::info!("默认数据源已设置为 {}", source_type);
        Ok(())
    }

    /// 添加备用数据源，已存在时忽略
    pub async fn add_fallback_source(&self, source_type: DataSourceType) -> DataResult<()> {
        if !DataSourceFactory::is_available(source_type) {
            return Err(DataSourceError::InvalidRequest(format!(
                "数据源 {} 不可用",
                source_type
            )));
        }
        let mut fallbacks = self.fallback_sources.write().await;
        if !fallbacks.contains(&source_type) {
            fallbacks.push(source_type);
            log::info!("添加备用数据源: {}", source_type);
        }
        Ok(())
    }

    /// 断开并清空所有缓存的数据源
    pub async fn disconnect_all(&self) {
        let instances: Vec<_> = self.instances.write().await.drain().collect();
        for (t, source) in instances {
            if let Err(e) = source.disconnect().await {
                log::warn!("断开数据源 {} 失败: {}", t, e);
            }
        }
        log::info!("已断开所有数据源");
    }

    pub fn available_sources(&self) -> Vec<DataSourceType> {
        DataSourceFactory::available_sources()
    }

    pub async fn status(&self) -> Vec<SourceStatus> {
        let default_source = self.default_source().await;
        let fallbacks = self.fallback_sources().await;
        let instances = self.instances.read().await;
        DataSourceType::ALL
            .iter()
            .map(|t| SourceStatus {
                name: t.as_str().to_string(),
                available: DataSourceFactory::is_available(*t),
                connected: instances.get(t).map(|s| s.is_connected()).unwrap_or(false),
                is_default: *t == default_source,
                is_fallback: fallbacks.contains(t),
            })
            .collect()
    }
}
