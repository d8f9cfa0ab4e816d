//! 资产负债率报告

use anyhow::Result;

use crate::models::table::DataTable;
use crate::queries::base::BatchResult;
use crate::queries::{BalanceQuery, QueryContext};

/// 高速公路板块
pub const DEFAULT_COMPANIES: [(&str, &str); 9] = [
    ("601107", "四川成渝"),
    ("000429", "粤高速A"),
    ("600350", "山东高速"),
    ("000828", "东莞控股"),
    ("600035", "楚天高速"),
    ("001965", "招商公路"),
    ("600377", "宁沪高速"),
    ("600012", "皖通高速"),
    ("000755", "山西路桥"),
];

pub const DEFAULT_YEAR: i32 = 2025;
pub const DEFAULT_QUARTER: u8 = 3;

pub async fn run(ctx: QueryContext, companies: &[(String, String)], year: i32, quarter: u8) -> Result<()> {
    let codes: Vec<String> = companies.iter().map(|(code, _)| code.clone()).collect();
    let results = BalanceQuery::new(ctx)
        .query_multiple(&codes, Some(year), Some(quarter))
        .await;
    for line in render(companies, &results) {
        println!("{}", line);
    }
    Ok(())
}

/// 资产负债率（百分比），取最新一条记录
pub fn render(companies: &[(String, String)], results: &BatchResult<DataTable>) -> Vec<String> {
    companies
        .iter()
        .map(|(code, name)| {
            let ratio = results
                .iter()
                .find(|(c, _)| c == code)
                .and_then(|(_, t)| t.as_ref())
                .and_then(|t| t.last_row())
                .and_then(|r| r.get_f64("liabilityToAsset"));
            match ratio {
                Some(ratio) => format!("{}({}): {:.2}%", name, code, ratio * 100.0),
                None => format!("{}({}): 无数据", name, code),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::manager::mock::table;
    use serde_json::json;

    #[test]
    fn test_render() {
        let companies = vec![
            ("601107".to_string(), "四川成渝".to_string()),
            ("000429".to_string(), "粤高速A".to_string()),
            ("600350".to_string(), "山东高速".to_string()),
        ];
        let results = vec![
            (
                "601107".to_string(),
                Some(table(&["code", "liabilityToAsset"], vec![json!("sh.601107"), json!(0.6123)])),
            ),
            (
                "000429".to_string(),
                Some(table(&["code", "liabilityToAsset"], vec![json!("sz.000429"), json!("")])),
            ),
            ("600350".to_string(), None),
        ];
        assert_eq!(
            render(&companies, &results),
            vec![
                "四川成渝(601107): 61.23%".to_string(),
                "粤高速A(000429): 无数据".to_string(),
                "山东高速(600350): 无数据".to_string(),
            ]
        );
    }
}
