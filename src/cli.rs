//! 命令行定义与分发

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::connection::BaostockConnection;
use crate::datasource::{DailyQuery, DataSourceFactory, DataSourceManager, DataSourceType};
use crate::models::table::DataTable;
use crate::queries::QueryContext;
use crate::reports::{self, balance, cashflow, fund_industry, fund_monitor, fundamental, holdings, output};

/// 上市公司财务与基金数据查询
#[derive(Parser)]
#[command(name = "fin-query", version, about, long_about = None)]
pub struct Cli {
    /// 配置文件路径
    #[arg(short, long, global = true, env = "FINQUERY_CONFIG")]
    pub config: Option<PathBuf>,

    /// 指定默认数据源（baostock/akshare/tushare）
    #[arg(short, long, global = true)]
    pub source: Option<DataSourceType>,

    /// 追加备用数据源（逗号分隔）
    #[arg(long, global = true, value_delimiter = ',')]
    pub fallback: Vec<DataSourceType>,

    /// 直接使用 baostock 会话查询，结束后登出
    #[arg(long, global = true, conflicts_with = "source")]
    pub session: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 查询多家公司的现金流量
    Cashflow {
        /// 公司，形如 600000=浦发银行，不指定时使用默认列表
        companies: Vec<String>,
        #[arg(long, default_value_t = cashflow::DEFAULT_YEAR)]
        year: i32,
        /// 查询从该年份到 --year 的历史数据
        #[arg(long, value_name = "START_YEAR", conflicts_with = "compare")]
        history: Option<i32>,
        /// 以表格对比各公司的现金流比率
        #[arg(long)]
        compare: bool,
    },

    /// 查询多家公司的资产负债率
    Balance {
        /// 公司，形如 601107=四川成渝，不指定时使用默认列表
        companies: Vec<String>,
        #[arg(long, default_value_t = balance::DEFAULT_YEAR)]
        year: i32,
        #[arg(long, default_value_t = balance::DEFAULT_QUARTER)]
        quarter: u8,
    },

    /// 基本面汇总
    Fundamental {
        /// 股票代码，形如 600519=贵州茅台
        companies: Vec<String>,
        /// 按公司名称查询（逗号分隔）
        #[arg(long, value_delimiter = ',')]
        names: Vec<String>,
        #[arg(long)]
        year: Option<i32>,
        /// 保存为 CSV
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// 基金行业配置报告
    FundIndustry {
        /// 年份，可多个
        #[arg(required = true)]
        years: Vec<i32>,
    },

    /// 基金资金动向监测
    FundMonitor {
        /// 每个周期监测的基金数
        #[arg(long, default_value_t = fund_monitor::DEFAULT_TOP_N)]
        top_n: usize,
    },

    /// 查询个股的机构持仓
    Institutional {
        code: String,
        /// 报告期，如 2024Q3、20240930，默认最近一个季度
        #[arg(long)]
        period: Option<String>,
    },

    /// 对比多只基金的持仓
    FundCompare {
        /// 基金代码，至少两只
        #[arg(required = true, num_args = 2..)]
        codes: Vec<String>,
        /// 报告期，如 2024Q3
        #[arg(long)]
        period: Option<String>,
    },

    /// 查询日线行情
    Daily {
        code: String,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        /// 复权方式
        #[arg(long)]
        adjust: Option<String>,
        /// 只显示最近 N 条
        #[arg(long, default_value_t = 20)]
        tail: usize,
    },

    /// 列出可用数据源
    Sources {
        /// 逐个创建并连接数据源，检查是否可用
        #[arg(long)]
        check: bool,
    },

    /// 启动 HTTP 服务
    Serve,
}

/// 执行子命令
///
/// `session` 为真时在 baostock 会话中执行，结束时无论成败都登出
pub async fn execute(command: Commands, session: bool, manager: Arc<DataSourceManager>) -> Result<()> {
    if session {
        let conn = BaostockConnection::init_global(manager.config());
        let ctx = QueryContext::Session(conn.clone());
        return conn.scoped(|_| dispatch(command, ctx, manager)).await;
    }
    let ctx = QueryContext::Manager(manager.clone());
    dispatch(command, ctx, manager).await
}

async fn dispatch(command: Commands, ctx: QueryContext, manager: Arc<DataSourceManager>) -> Result<()> {
    let output_dir = manager.config().output_path();

    match command {
        Commands::Cashflow {
            companies,
            year,
            history,
            compare,
        } => {
            let companies = reports::companies_or(&companies, &cashflow::DEFAULT_COMPANIES);
            match history {
                Some(start_year) => cashflow::run_history(ctx, &companies, start_year, year).await,
                None if compare => cashflow::run_compare(ctx, &companies, year).await,
                None => cashflow::run(ctx, &companies, year).await,
            }
        }
        Commands::Balance {
            companies,
            year,
            quarter,
        } => {
            let companies = reports::companies_or(&companies, &balance::DEFAULT_COMPANIES);
            balance::run(ctx, &companies, year, quarter).await
        }
        Commands::Fundamental {
            companies,
            names,
            year,
            csv,
        } => {
            let target = if names.is_empty() {
                fundamental::Target::Codes(reports::companies_or(&companies, &fundamental::DEFAULT_COMPANIES))
            } else {
                fundamental::Target::Names(names)
            };
            fundamental::run(ctx, target, year, csv.as_deref()).await
        }
        Commands::FundIndustry { years } => {
            fund_industry::run(ctx, &years, &output_dir).await?;
            Ok(())
        }
        Commands::FundMonitor { top_n } => {
            fund_monitor::run(ctx, top_n, &output_dir).await?;
            Ok(())
        }
        Commands::Institutional { code, period } => {
            holdings::run_institutional(ctx, &code, period.as_deref()).await
        }
        Commands::FundCompare { codes, period } => {
            holdings::run_fund_compare(ctx, &codes, period.as_deref()).await
        }
        Commands::Daily {
            code,
            start,
            end,
            adjust,
            tail,
        } => {
            let query = DailyQuery {
                start_date: start,
                end_date: end,
                adjust,
                ..DailyQuery::default()
            };
            let table = ctx
                .run(None, |ds| {
                    let (code, query) = (code.clone(), query.clone());
                    async move { ds.query_daily_data(&code, &query).await }
                })
                .await?;
            if table.is_empty() {
                println!("{}: 未查询到数据", code);
            } else {
                let skip = table.len().saturating_sub(tail);
                let rows = table.rows()[skip..].to_vec();
                output::print_table(&DataTable::from_rows(table.columns().to_vec(), rows));
            }
            Ok(())
        }
        Commands::Sources { check } => {
            output::print_table(&sources_table(&manager).await);
            let available: Vec<&str> = manager.available_sources().iter().map(|t| t.as_str()).collect();
            println!("可用数据源: {}", available.join(", "));
            if check {
                output::print_table(&check_sources(manager.config(), &available).await);
            }
            Ok(())
        }
        Commands::Serve => crate::serve(manager).await,
    }
}

async fn sources_table(manager: &DataSourceManager) -> DataTable {
    let flag = |b: bool| Value::String(if b { "是" } else { "否" }.to_string());
    let rows = manager
        .status()
        .await
        .into_iter()
        .map(|s| {
            vec![
                Value::String(s.name),
                flag(s.available),
                flag(s.connected),
                flag(s.is_default),
                flag(s.is_fallback),
            ]
        })
        .collect();
    DataTable::from_rows(["数据源", "可用", "已连接", "默认", "备用"], rows)
}

/// 逐个创建数据源并尝试连接，检查后断开
async fn check_sources(config: &AppConfig, names: &[&str]) -> DataTable {
    let mut rows = Vec::with_capacity(names.len());
    for name in names {
        let status = match DataSourceFactory::create_from_str(name, config, true).await {
            Ok(source) => {
                let connected = source.is_connected();
                if connected {
                    if let Err(e) = source.disconnect().await {
                        log::warn!("断开数据源 {} 失败: {}", name, e);
                    }
                }
                let status = if connected { "连接成功" } else { "连接失败" };
                status.to_string()
            }
            Err(e) => e.to_string(),
        };
        rows.push(vec![Value::String(name.to_string()), Value::String(status)]);
    }
    DataTable::from_rows(["数据源", "连接检查"], rows)
}

/// 命令行指定的默认数据源和备用数据源写入管理器
pub async fn apply_overrides(manager: &DataSourceManager, cli: &Cli) -> Result<()> {
    if let Some(source) = cli.source {
        manager.set_default_source(source).await?;
    }
    for source in &cli.fallback {
        manager.add_fallback_source(*source).await?;
    }
    Ok(())
}
