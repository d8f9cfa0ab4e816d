//! 现金流量报告

use anyhow::Result;
use serde_json::Value;

use crate::models::table::{display_value, DataTable};
use crate::queries::base::BatchResult;
use crate::queries::cashflow::DEFAULT_METRICS;
use crate::queries::{CashFlowQuery, QueryContext};

use super::output;

pub const DEFAULT_COMPANIES: [(&str, &str); 3] = [
    ("600000", "浦发银行"),
    ("601398", "工商银行"),
    ("600519", "贵州茅台"),
];

pub const DEFAULT_YEAR: i32 = 2023;

const FIELDS: [(&str, &str); 5] = [
    ("统计日期", "statDate"),
    ("发布日期", "pubDate"),
    ("经营活动现金流", "CAToAsset"),
    ("投资活动现金流", "NCAToAsset"),
    ("筹资活动现金流", "NCFFromFAToAsset"),
];

pub async fn run(ctx: QueryContext, companies: &[(String, String)], year: i32) -> Result<()> {
    println!("\n{}", "=".repeat(60));
    println!("公司分析工具 - 现金流量查询");
    println!("{}", "=".repeat(60));
    println!("\n正在查询 {} 家公司的{}年现金流量数据...\n", companies.len(), year);

    let codes: Vec<String> = companies.iter().map(|(code, _)| code.clone()).collect();
    let results = CashFlowQuery::new(ctx).query_multiple(&codes, Some(year), None).await;
    for line in render(companies, &results) {
        println!("{}", line);
    }

    println!("\n{}", "=".repeat(60));
    println!("查询完成!");
    Ok(())
}

/// 逐个公司打印 start_year 到 end_year 的现金流量
pub async fn run_history(
    ctx: QueryContext,
    companies: &[(String, String)],
    start_year: i32,
    end_year: i32,
) -> Result<()> {
    let query = CashFlowQuery::new(ctx);
    for (code, name) in companies {
        println!("\n{} ({}) {}-{}年现金流量:", name, code, start_year, end_year);
        let table = query.query_history(code, start_year, Some(end_year), None).await?;
        if table.is_empty() {
            println!("  未查询到数据");
        } else {
            output::print_table(&history_view(&table));
        }
    }
    Ok(())
}

/// 历史表只保留日期和比率列，都不存在时原样返回
pub fn history_view(table: &DataTable) -> DataTable {
    let columns: Vec<&str> = FIELDS
        .iter()
        .map(|(_, column)| *column)
        .filter(|column| table.has_column(column))
        .collect();
    if columns.is_empty() {
        table.clone()
    } else {
        table.select(&columns)
    }
}

/// 同一年份各公司的现金流比率对比
pub async fn run_compare(ctx: QueryContext, companies: &[(String, String)], year: i32) -> Result<()> {
    let codes: Vec<String> = companies.iter().map(|(code, _)| code.clone()).collect();
    let comparison = CashFlowQuery::new(ctx)
        .compare_companies(&codes, year, None, None)
        .await;
    if comparison.is_empty() {
        println!("没有可对比的数据");
    } else {
        println!("\n{}年现金流量对比:", year);
        output::print_table(&with_names(comparison, companies));
    }
    Ok(())
}

/// 在代码后插入公司名称列
pub fn with_names(mut comparison: DataTable, companies: &[(String, String)]) -> DataTable {
    comparison.with_column("公司名称", |row| {
        let code = row.get_str("code").unwrap_or_default();
        companies
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, name)| Value::String(name.clone()))
            .unwrap_or(Value::Null)
    });
    let mut columns = vec!["code", "公司名称"];
    columns.extend_from_slice(&DEFAULT_METRICS);
    comparison.select(&columns)
}

/// 每个公司打印最新一条记录的日期和三项现金流比率
pub fn render(companies: &[(String, String)], results: &BatchResult<DataTable>) -> Vec<String> {
    let mut lines = Vec::new();
    for (code, name) in companies {
        let latest = results
            .iter()
            .find(|(c, _)| c == code)
            .and_then(|(_, t)| t.as_ref())
            .and_then(|t| t.last_row());
        let Some(latest) = latest else {
            lines.push(format!("\n{} ({}): 未查询到数据", name, code));
            continue;
        };
        lines.push(format!("\n{} ({}):", name, code));
        lines.push("-".repeat(60));
        for (label, column) in FIELDS {
            let value = latest.get(column).map(display_value).unwrap_or_else(|| "N/A".to_string());
            lines.push(format!("  {}: {}", label, value));
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::manager::mock::table;
    use serde_json::json;

    #[test]
    fn test_render() {
        let companies = vec![
            ("600000".to_string(), "浦发银行".to_string()),
            ("600519".to_string(), "贵州茅台".to_string()),
        ];
        let results = vec![
            (
                "600000".to_string(),
                Some(table(
                    &["statDate", "pubDate", "CAToAsset"],
                    vec![json!("2023-12-31"), json!("2024-03-30"), json!(0.05)],
                )),
            ),
            ("600519".to_string(), None),
        ];
        let lines = render(&companies, &results);
        assert_eq!(lines[0], "\n浦发银行 (600000):");
        assert_eq!(lines[2], "  统计日期: 2023-12-31");
        assert_eq!(lines[4], "  经营活动现金流: 0.05");
        assert_eq!(lines[5], "  投资活动现金流: N/A");
        assert_eq!(lines.last().unwrap(), "\n贵州茅台 (600519): 未查询到数据");
    }

    #[test]
    fn test_history_view_keeps_ratio_columns() {
        let history = DataTable::from_rows(
            ["code", "statDate", "CAToAsset", "CCE"],
            vec![
                vec![json!("sh.600000"), json!("2022-12-31"), json!(0.4), json!(1.0)],
                vec![json!("sh.600000"), json!("2023-12-31"), json!(0.5), json!(2.0)],
            ],
        );
        let view = history_view(&history);
        assert_eq!(view.columns(), &["statDate", "CAToAsset"]);
        assert_eq!(view.len(), 2);

        let other = table(&["报告期"], vec![json!("20231231")]);
        assert_eq!(history_view(&other), other);
    }

    /// 测试对比表按代码补上公司名称
    #[tokio::test]
    async fn test_run_compare_with_names() {
        use crate::datasource::manager::mock::MockDataSource;
        use crate::datasource::DataSourceType;
        use std::sync::Arc;

        let source = MockDataSource::new(DataSourceType::Akshare).with_table(
            "cashflow:600000:2023",
            table(&["code", "CAToAsset"], vec![json!("sh.600000"), json!("0.3")]),
        );
        let ctx = QueryContext::Single(Arc::new(source));
        let companies = vec![
            ("600000".to_string(), "浦发银行".to_string()),
            ("600519".to_string(), "贵州茅台".to_string()),
        ];
        let codes: Vec<String> = companies.iter().map(|(c, _)| c.clone()).collect();
        let comparison = CashFlowQuery::new(ctx.clone())
            .compare_companies(&codes, 2023, None, None)
            .await;

        let named = with_names(comparison, &companies);
        assert_eq!(named.len(), 1);
        assert_eq!(
            named.columns(),
            &["code", "公司名称", "CAToAsset", "NCAToAsset", "NCFFromFAToAsset"]
        );
        assert_eq!(named.cell(0, "公司名称"), Some(&json!("浦发银行")));
        assert_eq!(named.cell(0, "CAToAsset"), Some(&json!(0.3)));

        run_compare(ctx, &companies, 2023).await.unwrap();
    }
}
