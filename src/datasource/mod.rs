//! 数据源抽象层
//!
//! 所有数据源（baostock、akshare、tushare）实现 `DataSource` trait，
//! 由 `DataSourceFactory` 创建、`DataSourceManager` 统一调度和降级

pub mod akshare;
pub mod baostock;
pub mod code;
pub mod factory;
pub mod manager;
pub mod tushare;

use async_trait::async_trait;
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{DataResult, DataSourceError};
use crate::models::response::beijing_now;
use crate::models::table::DataTable;

pub use factory::DataSourceFactory;
pub use manager::DataSourceManager;

/// 数据源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSourceType {
    Baostock,
    Tushare,
    Akshare,
    /// 已识别但尚未实现适配器
    Wind,
}

impl DataSourceType {
    pub const ALL: [DataSourceType; 4] = [
        DataSourceType::Baostock,
        DataSourceType::Tushare,
        DataSourceType::Akshare,
        DataSourceType::Wind,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataSourceType::Baostock => "baostock",
            DataSourceType::Tushare => "tushare",
            DataSourceType::Akshare => "akshare",
            DataSourceType::Wind => "wind",
        }
    }
}

impl fmt::Display for DataSourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataSourceType {
    type Err = DataSourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "baostock" => Ok(DataSourceType::Baostock),
            "tushare" => Ok(DataSourceType::Tushare),
            "akshare" => Ok(DataSourceType::Akshare),
            "wind" => Ok(DataSourceType::Wind),
            other => Err(DataSourceError::InvalidRequest(format!(
                "未知的数据源类型: {}",
                other
            ))),
        }
    }
}

/// 报告期
///
/// 年份和季度都给出时直接使用；只有年份时取第 4 季度；
/// 都没有时取当前年份第 4 季度
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportPeriod {
    pub year: Option<i32>,
    pub quarter: Option<u8>,
}

impl ReportPeriod {
    pub fn new(year: Option<i32>, quarter: Option<u8>) -> Self {
        Self { year, quarter }
    }

    pub fn year(year: i32) -> Self {
        Self::new(Some(year), None)
    }

    /// 解析出实际查询的 (年份, 季度)
    pub fn resolve(&self) -> DataResult<(i32, u8)> {
        if let Some(q) = self.quarter {
            if !(1..=4).contains(&q) {
                return Err(DataSourceError::InvalidRequest(format!(
                    "季度必须在 1-4 之间: {}",
                    q
                )));
            }
        }
        Ok(match (self.year, self.quarter) {
            (Some(y), Some(q)) => (y, q),
            (Some(y), None) => (y, 4),
            (None, _) => (beijing_now().year(), 4),
        })
    }
}

impl fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.year, self.quarter) {
            (Some(y), Some(q)) => write!(f, "{}年第{}季度", y, q),
            (Some(y), None) => write!(f, "{}年", y),
            (None, _) => f.write_str("最新"),
        }
    }
}

/// 日线查询参数
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DailyQuery {
    /// 开始日期，`YYYY-MM-DD` 或 `YYYYMMDD`
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    /// 返回字段（baostock）
    pub fields: Option<String>,
    /// 频率（baostock: d/w/m）
    pub frequency: Option<String>,
    /// 复权方式（akshare: qfq/hfq/空；baostock: 1/2/3）
    pub adjust: Option<String>,
}

/// 数据源接口
///
/// 资产负债表、现金流量表、利润表、股票列表和日线为必需查询；
/// 其余查询默认返回 `Unsupported`
#[async_trait]
pub trait DataSource: Send + Sync {
    fn source_type(&self) -> DataSourceType;

    fn name(&self) -> &'static str {
        self.source_type().as_str()
    }

    async fn connect(&self) -> DataResult<()>;

    async fn disconnect(&self) -> DataResult<()>;

    fn is_connected(&self) -> bool;

    /// 标准化股票代码为本数据源格式
    fn normalize_code(&self, code: &str) -> String;

    /// 未连接时返回 `NotConnected`
    fn ensure_connected(&self) -> DataResult<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(DataSourceError::NotConnected(self.name().to_string()))
        }
    }

    async fn query_balance_sheet(&self, code: &str, period: ReportPeriod) -> DataResult<DataTable>;

    async fn query_cash_flow(&self, code: &str, period: ReportPeriod) -> DataResult<DataTable>;

    async fn query_income_statement(&self, code: &str, period: ReportPeriod)
        -> DataResult<DataTable>;

    async fn query_stock_basic(&self) -> DataResult<DataTable>;

    async fn query_daily_data(&self, code: &str, query: &DailyQuery) -> DataResult<DataTable>;

    /// 基本面数据
    async fn query_stock_fundamental(&self, _code: &str, _year: Option<i32>) -> DataResult<DataTable> {
        Err(DataSourceError::unsupported(self.name(), "基本面查询"))
    }

    /// 财务指标
    async fn query_financial_indicator(&self, _code: &str, _year: Option<i32>) -> DataResult<DataTable> {
        Err(DataSourceError::unsupported(self.name(), "财务指标查询"))
    }

    /// 基金持仓，period 形如 `2024Q3` 或 `20240930`
    async fn query_fund_holdings(&self, _fund_code: &str, _period: Option<&str>) -> DataResult<DataTable> {
        Err(DataSourceError::unsupported(self.name(), "基金持仓查询"))
    }

    async fn query_fund_basic(&self) -> DataResult<DataTable> {
        Err(DataSourceError::unsupported(self.name(), "基金基本信息查询"))
    }

    async fn query_fund_nav(
        &self,
        _fund_code: &str,
        _start_date: Option<&str>,
        _end_date: Option<&str>,
    ) -> DataResult<DataTable> {
        Err(DataSourceError::unsupported(self.name(), "基金净值查询"))
    }

    /// 开放式基金排行
    async fn query_fund_rank(&self, _fund_type: &str, _sort_by: &str, _top_n: Option<usize>) -> DataResult<DataTable> {
        Err(DataSourceError::unsupported(self.name(), "基金排行查询"))
    }

    async fn query_institutional_holdings(&self, _stock_code: &str, _period: Option<&str>) -> DataResult<DataTable> {
        Err(DataSourceError::unsupported(self.name(), "机构持仓查询"))
    }

    /// 基金行业配置，date 为 `YYYYMMDD`
    async fn query_fund_industry_allocation(&self, _date: &str) -> DataResult<DataTable> {
        Err(DataSourceError::unsupported(self.name(), "基金行业配置查询"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_type_parse() {
        let test_cases = vec![
            ("baostock", Some(DataSourceType::Baostock)),
            (" AkShare ", Some(DataSourceType::Akshare)),
            ("TUSHARE", Some(DataSourceType::Tushare)),
            ("wind", Some(DataSourceType::Wind)),
            ("yahoo", None),
        ];

        for (input, expected) in test_cases {
            assert_eq!(input.parse::<DataSourceType>().ok(), expected, "输入: {}", input);
        }
    }

    /// 测试报告期解析
    #[test]
    fn test_report_period_resolve() {
        let current = beijing_now().year();

        assert_eq!(ReportPeriod::new(Some(2023), Some(2)).resolve().unwrap(), (2023, 2));
        assert_eq!(ReportPeriod::year(2023).resolve().unwrap(), (2023, 4));
        assert_eq!(ReportPeriod::default().resolve().unwrap(), (current, 4));
        // 只给季度时按当前年份第 4 季度处理
        assert_eq!(ReportPeriod::new(None, Some(2)).resolve().unwrap(), (current, 4));

        for bad in [0u8, 5] {
            let err = ReportPeriod::new(Some(2023), Some(bad)).resolve().unwrap_err();
            assert!(matches!(err, DataSourceError::InvalidRequest(_)));
        }
    }

    #[test]
    fn test_report_period_display() {
        assert_eq!(ReportPeriod::new(Some(2024), Some(3)).to_string(), "2024年第3季度");
        assert_eq!(ReportPeriod::year(2024).to_string(), "2024年");
    }
}
