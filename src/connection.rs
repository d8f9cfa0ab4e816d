//! baostock 会话管理
//!
//! 进程内全局唯一的会话保存登录状态，登录和登出都是幂等的

use once_cell::sync::OnceCell;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

use crate::config::AppConfig;
use crate::datasource::baostock::client::BaostockClient;
use crate::error::{DataResult, DataSourceError};

static GLOBAL: OnceCell<Arc<BaostockConnection>> = OnceCell::new();

/// baostock 会话
pub struct BaostockConnection {
    client: Mutex<BaostockClient>,
    /// 由客户端维护，通信失败断开连接时自动清除
    logged_in: Arc<AtomicBool>,
}

impl BaostockConnection {
    pub fn new(client: BaostockClient) -> Self {
        Self {
            logged_in: client.login_state(),
            client: Mutex::new(client),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(BaostockClient::new(
            config.sources.baostock.clone(),
            config.query.timeout_secs,
        ))
    }

    /// 用配置初始化全局会话，已初始化时返回现有实例
    pub fn init_global(config: &AppConfig) -> Arc<Self> {
        GLOBAL
            .get_or_init(|| Arc::new(Self::from_config(config)))
            .clone()
    }

    /// 全局会话，未初始化时使用默认配置
    pub fn global() -> Arc<Self> {
        GLOBAL
            .get_or_init(|| Arc::new(Self::from_config(&AppConfig::default())))
            .clone()
    }

    pub fn is_connected(&self) -> bool {
        self.logged_in.load(Ordering::SeqCst)
    }

    /// 登录 baostock，已登录时直接返回
    pub async fn login(&self) -> DataResult<()> {
        let mut client = self.client.lock().await;
        if client.is_logged_in() {
            log::info!("已经登录BaoStock");
            return Ok(());
        }
        match client.login().await {
            Ok(msg) => {
                log::info!("登录BaoStock成功: {}", msg);
                Ok(())
            }
            Err(e) => {
                log::error!("登录BaoStock失败: {}", e);
                Err(e)
            }
        }
    }

    /// 登出 baostock，未登录时直接返回
    pub async fn logout(&self) -> DataResult<()> {
        let mut client = self.client.lock().await;
        if !client.is_logged_in() {
            log::info!("未登录BaoStock，无需登出");
            return Ok(());
        }
        match client.logout().await {
            Ok(msg) => {
                log::info!("登出BaoStock成功: {}", msg);
                Ok(())
            }
            Err(e) => {
                log::error!("登出BaoStock失败: {}", e);
                Err(e)
            }
        }
    }

    /// 获取客户端执行查询
    pub async fn client(&self) -> MutexGuard<'_, BaostockClient> {
        self.client.lock().await
    }

    /// 登录后执行 f，结束时无论成败都登出
    pub async fn scoped<T, E, F, Fut>(self: &Arc<Self>, f: F) -> Result<T, E>
    where
        E: From<DataSourceError>,
        F: FnOnce(Arc<Self>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.login().await?;
        let result = f(self.clone()).await;
        if let Err(e) = self.logout().await {
            log::warn!("会话结束时登出失败: {}", e);
        }
        result
    }
}
