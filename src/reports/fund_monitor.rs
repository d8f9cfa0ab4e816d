//! 基金资金动向监测
//!
//! 取近3年、近2年、近1年收益率靠前的股票型基金（只保留A类份额），
//! 合并去重后分析这些基金共同重仓的股票

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::models::response::beijing_now;
use crate::models::table::{display_value, DataTable};
use crate::queries::{FundHoldingsQuery, QueryContext};

use super::output;

pub const PERIODS: [&str; 3] = ["近3年", "近2年", "近1年"];
pub const FUND_TYPE: &str = "股票型";
pub const DEFAULT_TOP_N: usize = 20;
const PREFERENCE_TOP_N: usize = 30;

const CODE_COLUMNS: [&str; 2] = ["基金代码", "代码"];
const NAME_COLUMNS: [&str; 2] = ["基金简称", "基金名称"];

static SHARE_CLASS_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[BCDEH]$").unwrap());

/// 入选基金
#[derive(Debug, Clone, PartialEq)]
pub struct FundEntry {
    pub seq: usize,
    pub code: String,
    pub name: String,
    pub return_rate: String,
}

#[derive(Debug, Clone, Default)]
pub struct MonitorResult {
    /// 按周期的入选基金，顺序同 `PERIODS`
    pub fund_lists: Vec<(String, Vec<FundEntry>)>,
    pub top_holdings: Option<DataTable>,
}

impl MonitorResult {
    pub fn all_codes(&self) -> Vec<String> {
        self.fund_lists
            .iter()
            .flat_map(|(_, funds)| funds.iter().map(|f| f.code.clone()))
            .collect()
    }
}

/// A类份额或没有份额后缀
pub fn is_primary_share_class(name: &str) -> bool {
    !SHARE_CLASS_SUFFIX.is_match(name) || name.ends_with('A')
}

/// 保持顺序去重
pub fn dedupe(codes: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    codes.iter().filter(|c| seen.insert(c.as_str())).cloned().collect()
}

/// 从排行中筛选前 `top_n` 只A类基金
pub fn select_funds(rank: &DataTable, period: &str, top_n: usize) -> (DataTable, Vec<FundEntry>) {
    let (Some(code_col), Some(name_col)) = (rank.find_column(&CODE_COLUMNS), rank.find_column(&NAME_COLUMNS)) else {
        log::warn!("无法识别基金排行的列名: {:?}", rank.columns());
        return (DataTable::default(), Vec::new());
    };

    let filtered = rank
        .filter_rows(|r| r.get_str(&name_col).map(|n| is_primary_share_class(&n)).unwrap_or(true))
        .head(top_n);

    let funds = filtered
        .iter_rows()
        .enumerate()
        .filter_map(|(i, r)| {
            Some(FundEntry {
                seq: i + 1,
                code: r.get_str(&code_col)?,
                name: r.get_str(&name_col).unwrap_or_default(),
                return_rate: r.get(period).map(display_value).unwrap_or_else(|| "N/A".to_string()),
            })
        })
        .collect();

    let display = filtered.select(&[code_col.as_str(), name_col.as_str(), period]);
    (display, funds)
}

/// 查询各周期排行并分析机构偏好，偏好结果写入 CSV
pub async fn monitor(ctx: QueryContext, top_n: usize, output_dir: &Path) -> Result<MonitorResult> {
    log::info!("开始监测近3年、近2年、近1年各前 {} 只基金的资金动向...", top_n);
    let query = FundHoldingsQuery::new(ctx);
    let mut result = MonitorResult::default();

    for period in PERIODS {
        log::info!("查询 {} 收益率前 {} 的股票型基金...", period, top_n);
        let rank = match query.query_fund_rank(FUND_TYPE, period, Some(top_n * 2)).await {
            Ok(rank) if !rank.is_empty() => rank,
            Ok(_) => {
                log::warn!("未查询到 {} 的基金排名数据", period);
                result.fund_lists.push((period.to_string(), Vec::new()));
                continue;
            }
            Err(e) => {
                log::error!("查询 {} 基金排名失败: {}", period, e);
                result.fund_lists.push((period.to_string(), Vec::new()));
                continue;
            }
        };

        let (display, funds) = select_funds(&rank, period, top_n);
        println!("\n{}", "=".repeat(80));
        println!("{} 收益率前 {} 只股票型基金（已过滤，只保留A类）", period, funds.len());
        println!("{}", "=".repeat(80));
        output::print_table(&display);
        log::info!("{} 筛选出 {} 只基金", period, funds.len());
        result.fund_lists.push((period.to_string(), funds));
    }

    let all_codes = result.all_codes();
    let unique_codes = dedupe(&all_codes);
    println!("\n{}", "=".repeat(80));
    println!("三组基金去重合并结果");
    println!("{}", "=".repeat(80));
    println!("原始总数: {} 只", all_codes.len());
    println!("去重后: {} 只", unique_codes.len());

    if unique_codes.is_empty() {
        log::warn!("没有可分析的基金");
        return Ok(result);
    }

    let analysis = query
        .analyze_institutional_preference(Some(unique_codes.as_slice()), None, PREFERENCE_TOP_N)
        .await?;
    if let Some(analysis) = analysis {
        let path = output_dir.join(format!(
            "institutional_preference_{}.csv",
            beijing_now().format("%Y%m%d")
        ));
        output::write_csv(&path, &analysis.top_holdings)?;
        log::info!("机构偏好分析结果已保存至: {}", path.display());

        println!("\n{}", "=".repeat(80));
        println!("机构偏好股票 Top 10");
        println!("{}", "=".repeat(80));
        output::print_table(&analysis.top_holdings.head(10));
        result.top_holdings = Some(analysis.top_holdings);
    }
    Ok(result)
}

/// 监测报告正文
pub fn report_lines(result: &MonitorResult, generated_at: &str) -> Vec<String> {
    let mut lines = vec![
        "=".repeat(80),
        "基金资金动向监测报告".to_string(),
        format!("生成时间: {}", generated_at),
        "=".repeat(80),
        "\n【监测基金列表】".to_string(),
        "-".repeat(80),
    ];

    for period in PERIODS {
        let funds = result
            .fund_lists
            .iter()
            .find(|(p, _)| p == period)
            .map(|(_, f)| f.as_slice())
            .unwrap_or_default();
        if funds.is_empty() {
            lines.push(format!("\n{}: 未查询到数据", period));
            continue;
        }
        lines.push(format!(
            "\n{} 收益率前 {} 只股票型基金（已过滤，只保留A类）:",
            period,
            funds.len()
        ));
        lines.push("-".repeat(80));
        for fund in funds {
            lines.push(format!("  {}. {} {} ({})", fund.seq, fund.code, fund.name, fund.return_rate));
        }
    }

    let all_codes = result.all_codes();
    lines.push(format!(
        "\n三组基金去重合并: 原始总数 {} 只，去重后 {} 只",
        all_codes.len(),
        dedupe(&all_codes).len()
    ));

    if let Some(top) = result.top_holdings.as_ref().filter(|t| !t.is_empty()) {
        lines.push("\n【机构偏好分析】".to_string());
        lines.push("-".repeat(80));
        lines.push("最受机构偏好的前10只股票:".to_string());
        for (i, row) in top.head(10).iter_rows().enumerate() {
            let code = row
                .get("股票代码")
                .or_else(|| row.get("代码"))
                .map(display_value)
                .unwrap_or_else(|| "N/A".to_string());
            let name = row.get("股票名称").map(display_value).unwrap_or_else(|| "N/A".to_string());
            let count = row.get("持有基金数").map(display_value).unwrap_or_else(|| "0".to_string());
            lines.push(format!("  {}. {} {}: 被 {} 只基金持有", i + 1, code, name, count));
        }
    }
    lines
}

/// 运行监测并写入文本报告
pub async fn run(ctx: QueryContext, top_n: usize, output_dir: &Path) -> Result<PathBuf> {
    println!("{}", "=".repeat(80));
    println!("基金资金动向定期监测系统");
    println!("{}", "=".repeat(80));

    let result = monitor(ctx, top_n, output_dir).await?;
    let now = beijing_now();
    let lines = report_lines(&result, &now.format("%Y-%m-%d %H:%M:%S").to_string());
    let path = output_dir.join(format!("fund_report_{}.txt", now.format("%Y%m%d")));
    output::write_text(&path, &lines)?;
    log::info!("报告已保存至: {}", path.display());

    println!("{}", lines.join("\n"));
    println!("\n监测完成！报告已保存至: {}", path.display());
    Ok(path)
}
