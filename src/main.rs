//! fin-query
//!
//! 上市公司财务数据与基金数据查询工具，支持 baostock、akshare、tushare 多数据源自动降级，
//! 提供命令行报告和 RESTful API 服务

mod cli;
mod config;
mod connection;
mod datasource;
mod error;
mod handlers;
mod logger;
mod middleware;
mod models;
mod queries;
mod reports;

use actix_web::{middleware::Logger, web, App, HttpServer};
use clap::Parser;
use std::sync::Arc;

use crate::cli::Cli;
use crate::config::AppConfig;
use crate::datasource::DataSourceManager;
use crate::middleware::ApiKeyMiddleware;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (config, notes) = AppConfig::load(cli.config.as_deref());
    logger::init(&config.log);
    notes.emit();

    let manager = Arc::new(DataSourceManager::new(config));
    cli::apply_overrides(&manager, &cli).await?;
    let result = cli::execute(cli.command, cli.session, manager.clone()).await;
    manager.disconnect_all().await;
    result
}

/// 启动 HTTP 服务，监听 `server.host:server.port`
async fn serve(manager: Arc<DataSourceManager>) -> anyhow::Result<()> {
    let config = manager.config();
    let api_key = config.server.api_key.clone();
    if api_key.is_empty() {
        log::warn!("未设置 API_KEY，接口不做认证");
    }
    let bind_addr = config.bind_addr();
    let workers = config.server.workers;

    log::info!("启动 fin-query 服务，监听 {}", bind_addr);

    let data = web::Data::from(manager.clone());
    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .wrap(Logger::default()) // 请求日志
            .wrap(ApiKeyMiddleware::new(api_key.clone())) // API Key 认证
            .configure(handlers::config)
    });
    if workers > 0 {
        server = server.workers(workers);
    }
    server.bind(bind_addr)?.run().await?;
    Ok(())
}

