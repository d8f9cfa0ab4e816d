//! 基本面汇总报告

use anyhow::Result;
use std::path::Path;

use crate::models::table::DataTable;
use crate::queries::{FundamentalQuery, QueryContext};

use super::output;

/// 白酒板块
pub const DEFAULT_COMPANIES: [(&str, &str); 5] = [
    ("600519", "贵州茅台"),
    ("000858", "五粮液"),
    ("000568", "泸州老窖"),
    ("600809", "山西汾酒"),
    ("002304", "洋河股份"),
];

/// 查询目标：公司名称或 (代码, 名称)
pub enum Target {
    Names(Vec<String>),
    Codes(Vec<(String, String)>),
}

pub async fn run(ctx: QueryContext, target: Target, year: Option<i32>, csv: Option<&Path>) -> Result<()> {
    println!("\n{}", "=".repeat(80));
    println!("上市公司基本面信息查询");
    println!("{}", "=".repeat(80));
    if let Some(year) = year {
        println!("查询年份: {}", year);
    }

    let query = FundamentalQuery::new(ctx);
    let summary = match target {
        Target::Names(names) => query.query_by_names(&names, year).await?,
        Target::Codes(companies) => {
            // 汇总表的公司名称列沿用 (名称, 代码) 顺序
            let companies: Vec<(String, String)> =
                companies.into_iter().map(|(code, name)| (name, code)).collect();
            query.summarize(&companies, year).await
        }
    };

    print_summary(&summary);
    if let Some(path) = csv.filter(|_| !summary.is_empty()) {
        output::write_csv(path, &summary)?;
        println!("\n数据已保存到: {}", path.display());
    }
    Ok(())
}

fn print_summary(summary: &DataTable) {
    if summary.is_empty() {
        println!("\n未查询到任何数据");
        return;
    }
    println!("\n基本面信息汇总表:");
    output::print_table(summary);
}
