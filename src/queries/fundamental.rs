//! 股票基本面查询
//!
//! 需要 akshare 等支持基本面接口的数据源，baostock 会话不支持

use serde_json::{Map, Value};

use crate::datasource::DataSourceType;
use crate::error::{DataResult, DataSourceError};
use crate::models::table::DataTable;

use super::base::{batch_query, success_count, BatchResult, QueryContext};

const CODE_COLUMNS: [&str; 4] = ["code", "代码", "symbol", "股票代码"];
const NAME_COLUMNS: [&str; 5] = ["name", "名称", "stock_name", "股票名称", "简称"];

/// 汇总表中保留的常见指标（存在才输出）
pub const SUMMARY_INDICATORS: [&str; 22] = [
    "净利润",
    "净利润(亿元)",
    "营业总收入",
    "营业总收入(亿元)",
    "净资产收益率",
    "净资产收益率(%)",
    "ROE",
    "毛利率",
    "毛利率(%)",
    "总资产收益率",
    "总资产收益率(%)",
    "ROA",
    "资产负债率",
    "资产负债率(%)",
    "每股收益",
    "每股收益(元)",
    "每股净资产",
    "每股净资产(元)",
    "市盈率",
    "PE",
    "市净率",
    "PB",
];

pub struct FundamentalQuery {
    ctx: QueryContext,
    source: Option<DataSourceType>,
}

impl FundamentalQuery {
    pub fn new(ctx: QueryContext) -> Self {
        Self { ctx, source: None }
    }

    pub fn with_source(mut self, source: Option<DataSourceType>) -> Self {
        self.source = source;
        self
    }

    fn check_context(&self) -> DataResult<()> {
        if self.ctx.is_session() {
            log::warn!("BaoStock不支持基本面查询，请使用AkShare或Tushare数据源");
            return Err(DataSourceError::unsupported("baostock", "基本面查询"));
        }
        Ok(())
    }

    pub async fn query(&self, code: &str, year: Option<i32>) -> DataResult<DataTable> {
        self.check_context()?;
        let table = self
            .ctx
            .run(self.source, |ds| async move { ds.query_stock_fundamental(code, year).await })
            .await?;
        if !table.is_empty() {
            log::info!("成功查询 {} 的基本面数据，共 {} 条记录", code, table.len());
        }
        Ok(table)
    }

    pub async fn query_multiple(&self, codes: &[String], year: Option<i32>) -> BatchResult<DataTable> {
        log::info!("开始批量查询 {} 个公司的基本面数据", codes.len());
        let results = batch_query(codes, |code| async move { self.query(&code, year).await }).await;
        log::info!("批量查询完成，成功 {}/{}", success_count(&results), codes.len());
        results
    }

    /// 公司名称到股票代码的映射，先精确匹配再模糊匹配，顺序同输入
    pub async fn name_to_code(&self, names: &[String]) -> DataResult<Vec<(String, String)>> {
        self.check_context()?;
        let stock_info = self
            .ctx
            .run(self.source, |ds| async move { ds.query_stock_basic().await })
            .await?;
        if stock_info.is_empty() {
            return Err(DataSourceError::Parse("无法获取股票基本信息".to_string()));
        }
        match_names(&stock_info, names)
    }

    /// 根据公司名称查询并汇总
    pub async fn query_by_names(&self, names: &[String], year: Option<i32>) -> DataResult<DataTable> {
        log::info!("根据 {} 个公司名称查询基本面数据", names.len());
        let mapping = self.name_to_code(names).await?;
        if mapping.is_empty() {
            log::error!("无法获取股票代码映射");
            return Ok(DataTable::default());
        }
        log::info!("成功匹配 {} 个公司代码", mapping.len());
        Ok(self.summarize(&mapping, year).await)
    }

    /// 按 (名称, 代码) 查询并汇总，每个公司取最近一期
    pub async fn summarize(&self, companies: &[(String, String)], year: Option<i32>) -> DataTable {
        let codes: Vec<String> = companies.iter().map(|(_, code)| code.clone()).collect();
        let results = self.query_multiple(&codes, year).await;
        let summary = build_summary(companies, &results);
        if summary.is_empty() {
            log::warn!("未能提取到任何基本面数据");
        } else {
            log::info!("成功创建基本面汇总表，共 {} 家公司", summary.len());
        }
        summary
    }
}

/// 在股票列表中匹配公司名称
pub fn match_names(stock_info: &DataTable, names: &[String]) -> DataResult<Vec<(String, String)>> {
    let (Some(code_col), Some(name_col)) = (
        stock_info.find_column(&CODE_COLUMNS),
        stock_info.find_column(&NAME_COLUMNS),
    ) else {
        return Err(DataSourceError::Parse(format!(
            "无法识别股票信息表的列名，可用列: {:?}",
            stock_info.columns()
        )));
    };

    let mut mapping = Vec::new();
    for name in names {
        let mut matched = stock_info.filter_equals(&name_col, name);
        if matched.is_empty() {
            matched = stock_info.filter_contains(&name_col, name);
        }
        match matched.row(0).and_then(|r| r.get_str(&code_col)) {
            Some(code) => {
                log::info!("匹配成功: {} -> {}", name, code);
                mapping.push((name.clone(), code));
            }
            None => log::warn!("未找到公司: {}", name),
        }
    }
    Ok(mapping)
}

/// 汇总表：股票代码、公司名称、报告期和存在的常见指标
pub fn build_summary(companies: &[(String, String)], results: &BatchResult<DataTable>) -> DataTable {
    let mut summary = DataTable::new(["股票代码", "公司名称", "报告期"]);
    for (name, code) in companies {
        let latest = results
            .iter()
            .find(|(c, _)| c == code)
            .and_then(|(_, t)| t.as_ref())
            .and_then(|t| t.last_row());
        let Some(latest) = latest else {
            log::warn!("{}({}): 无数据", name, code);
            continue;
        };

        let mut record = Map::new();
        record.insert("股票代码".to_string(), Value::String(code.clone()));
        record.insert("公司名称".to_string(), Value::String(name.clone()));
        record.insert(
            "报告期".to_string(),
            latest
                .get("报告期")
                .cloned()
                .unwrap_or_else(|| Value::String("N/A".to_string())),
        );
        for indicator in SUMMARY_INDICATORS {
            if let Some(v) = latest.get(indicator) {
                record.insert(indicator.to_string(), v.clone());
            }
        }
        summary.push_record(record);
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::BaostockConnection;
    use crate::datasource::manager::mock::{table, MockDataSource};
    use serde_json::json;
    use std::sync::Arc;

    fn stock_list() -> DataTable {
        DataTable::from_rows(
            ["code", "name"],
            vec![
                vec![json!("600519"), json!("贵州茅台")],
                vec![json!("000858"), json!("五粮液")],
                vec![json!("000568"), json!("泸州老窖")],
            ],
        )
    }

    fn indicator(period: &str, roe: f64) -> DataTable {
        table(
            &["报告期", "净资产收益率(%)", "摊薄每股收益(元)"],
            vec![json!(period), json!(roe), json!(1.0)],
        )
    }

    #[test]
    fn test_match_names() {
        let names: Vec<String> = vec!["五粮液".into(), "茅台".into(), "不存在".into()];
        let mapping = match_names(&stock_list(), &names).unwrap();
        assert_eq!(
            mapping,
            vec![
                ("五粮液".to_string(), "000858".to_string()),
                ("茅台".to_string(), "600519".to_string()),
            ]
        );

        let bad = DataTable::new(["ts_code", "fullname"]);
        assert!(match_names(&bad, &names).is_err());
    }

    /// 测试汇总表取最近一期并只保留存在的指标
    #[tokio::test]
    async fn test_query_by_names() {
        let mut history = indicator("20221231", 30.0);
        history.push_row(vec![json!("20231231"), json!(34.2), json!(1.2)]);
        let source = MockDataSource::new(DataSourceType::Akshare)
            .with_table("stock_basic", stock_list())
            .with_table("fundamental:600519", history)
            .with_table("fundamental:000858", indicator("20231231", 25.0));
        let query = FundamentalQuery::new(QueryContext::Single(Arc::new(source)));

        let names: Vec<String> = vec!["贵州茅台".into(), "五粮液".into(), "泸州老窖".into()];
        let summary = query.query_by_names(&names, None).await.unwrap();
        assert_eq!(summary.len(), 2);
        assert_eq!(
            summary.columns(),
            &["股票代码", "公司名称", "报告期", "净资产收益率(%)"]
        );
        assert_eq!(summary.cell(0, "报告期"), Some(&json!("20231231")));
        assert_eq!(summary.cell(0, "净资产收益率(%)"), Some(&json!(34.2)));
        assert_eq!(summary.cell(1, "公司名称"), Some(&json!("五粮液")));
    }

    #[tokio::test]
    async fn test_session_context_is_unsupported() {
        let query = FundamentalQuery::new(QueryContext::Session(BaostockConnection::global()));
        let err = query.query("600519", None).await.unwrap_err();
        assert!(matches!(err, DataSourceError::Unsupported { .. }));
    }
}
