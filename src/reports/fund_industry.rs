//! 基金行业配置报告
//!
//! 按季度报告期查询基金行业配置，计算各行业占净资产比例的环比变化，
//! 生成总排名表、环比排名表和各报告期分表

use anyhow::Result;
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::models::response::beijing_now;
use crate::models::table::{number, parse_number, DataTable};
use crate::queries::{FundHoldingsQuery, QueryContext};

use super::output::{self, format_date_display, rule};

const PERIOD_COLUMN: &str = "报告期";
const CHANGE_COLUMN: &str = "环比变化";
const CHANGE_SORT_KEY: &str = "环比变化_数值";
const NO_CHANGE: &str = "-";

const RATIO_FRAGMENTS: [&str; 3] = ["占净资产比例", "占净值比例", "市值占净值比"];
const INDUSTRY_FRAGMENTS: [&str; 1] = ["行业名称"];

const QUARTER_ENDS: [&str; 4] = ["0331", "0630", "0930", "1231"];

/// 处理后的报告数据
#[derive(Debug, Clone)]
pub struct IndustryReport {
    /// 全部记录按比例降序
    pub by_ratio: DataTable,
    /// 全部记录按环比变化降序，无环比的排在最后
    pub by_change: DataTable,
    pub ratio_column: Option<String>,
    /// 报告期，新的在前
    pub periods: Vec<String>,
    /// 各报告期分表，顺序同 `periods`
    pub period_tables: Vec<(String, DataTable)>,
}

/// 一年的四个季度报告日期（YYYYMMDD）
pub fn report_dates(year: i32) -> Vec<String> {
    QUARTER_ENDS.iter().map(|md| format!("{}{}", year, md)).collect()
}

pub async fn run(ctx: QueryContext, years: &[i32], output_dir: &Path) -> Result<Option<PathBuf>> {
    println!("{}", "=".repeat(80));
    println!("基金行业配置报告");
    println!("查询时间: {}", beijing_now().format("%Y-%m-%d %H:%M:%S"));
    println!("{}\n", "=".repeat(80));

    let mut dates = Vec::new();
    for year in years {
        let year_dates = report_dates(*year);
        let display: Vec<String> = year_dates.iter().map(|d| format_date_display(d)).collect();
        println!("{}年报告期: {}", year, display.join(", "));
        dates.extend(year_dates);
    }
    println!();

    let data = collect(&FundHoldingsQuery::new(ctx), &dates).await;
    if data.is_empty() {
        println!("未获取到数据");
        return Ok(None);
    }
    println!("数据记录数: {}", data.len());

    let report = process(data);
    println!("报告期数: {}", report.periods.len());
    println!("报告期: {}", display_periods(&report.periods));

    let path = write_report(&report, years, output_dir)?;
    println!("\n报告已保存到: {}", path.display());
    print_summary(&report, years);
    Ok(Some(path))
}

/// 逐个报告期查询，报告期列统一为查询日期
pub async fn collect(query: &FundHoldingsQuery, dates: &[String]) -> DataTable {
    println!("查询报告期: {}\n", dates.join(", "));
    let mut tables = Vec::new();
    for date in dates {
        match query.query_fund_industry_allocation(date).await {
            Ok(mut table) if !table.is_empty() => {
                table.set_constant_column(PERIOD_COLUMN, Value::String(date.clone()));
                println!("正在查询 {}... ✓ 获取 {} 条记录", date, table.len());
                tables.push(table);
            }
            Ok(_) => println!("正在查询 {}... ✗ 无数据", date),
            Err(e) => {
                log::error!("查询 {} 行业配置失败: {}", date, e);
                println!("正在查询 {}... ✗ 查询失败: {}", date, e);
            }
        }
    }
    if tables.is_empty() {
        println!("\n所有报告期均无数据");
        return DataTable::default();
    }
    let combined = DataTable::concat(&tables);
    log::debug!("数据列: {:?}", combined.columns());
    combined
}

/// 计算相邻报告期同一行业的比例变化
///
/// 上一期没有该行业、任一期比例为空或上一期为 0 时记为 `-`
pub fn add_period_change(data: &mut DataTable, ratio_column: &str) {
    let Some(industry_column) = data.find_column_containing(&INDUSTRY_FRAGMENTS) else {
        return;
    };
    if !data.has_column(PERIOD_COLUMN) {
        return;
    }

    let mut periods = period_list(data);
    periods.sort();

    let lookup = |period: &str, industry: &str| {
        data.iter_rows()
            .find(|r| {
                r.get_str(PERIOD_COLUMN).as_deref() == Some(period)
                    && r.get_str(&industry_column).as_deref() == Some(industry)
            })
            .and_then(|r| r.get_f64(ratio_column))
    };

    let changes: Vec<Value> = data
        .iter_rows()
        .map(|row| {
            let change = (|| {
                let period = row.get_str(PERIOD_COLUMN)?;
                let pos = periods.iter().position(|p| *p == period)?;
                let previous = periods.get(pos.checked_sub(1)?)?;
                let industry = row.get_str(&industry_column)?;
                let current = row.get_f64(ratio_column)?;
                let prev = lookup(previous.as_str(), industry.as_str()).filter(|p| *p != 0.0)?;
                Some(format!("{:+.2}", current - prev))
            })();
            Value::String(change.unwrap_or_else(|| NO_CHANGE.to_string()))
        })
        .collect();

    data.with_column(CHANGE_COLUMN, |r| changes[r.index()].clone());
}

fn period_list(data: &DataTable) -> Vec<String> {
    data.unique_values(PERIOD_COLUMN)
        .iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        })
        .collect()
}

/// 识别比例列、计算环比并生成各排名表
pub fn process(mut data: DataTable) -> IndustryReport {
    let ratio_column = data.find_column_containing(&RATIO_FRAGMENTS);
    if let Some(ratio) = &ratio_column {
        data.coerce_numeric(&[ratio.as_str()]);
        add_period_change(&mut data, ratio);
    }

    let mut periods = period_list(&data);
    periods.sort_by(|a, b| b.cmp(a));

    let mut by_ratio = data.clone();
    if let Some(ratio) = &ratio_column {
        by_ratio.sort_by(ratio, true);
    }

    let mut by_change = data.clone();
    if by_change.has_column(CHANGE_COLUMN) {
        by_change.with_column(CHANGE_SORT_KEY, |r| {
            r.get_str(CHANGE_COLUMN)
                .and_then(|s| parse_number(&s))
                .map(number)
                .unwrap_or(Value::Null)
        });
        by_change.sort_by(CHANGE_SORT_KEY, true);
        by_change.drop_column(CHANGE_SORT_KEY);
    }

    let period_tables = periods
        .iter()
        .map(|period| {
            let mut table = data.filter_equals(PERIOD_COLUMN, period);
            if let Some(ratio) = &ratio_column {
                table.sort_by(ratio, true);
            }
            (period.clone(), table)
        })
        .collect();

    IndustryReport {
        by_ratio,
        by_change,
        ratio_column,
        periods,
        period_tables,
    }
}

fn display_periods(periods: &[String]) -> String {
    periods
        .iter()
        .map(|p| format_date_display(p))
        .collect::<Vec<_>>()
        .join(", ")
}

fn years_label(years: &[i32]) -> String {
    years.iter().map(|y| y.to_string()).collect::<Vec<_>>().join(", ")
}

/// 单一年份时标题带上年份
fn scope_label(years: &[i32], suffix: &str) -> String {
    match years {
        [year] => format!("（{}年{}）", year, suffix),
        _ => format!("（{}）", suffix),
    }
}

/// 报告正文
pub fn report_lines(report: &IndustryReport, years: &[i32], generated_at: &str) -> Vec<String> {
    let mut lines = vec![
        rule('='),
        format!("基金行业配置报告 - {}年", years_label(years)),
        format!("查询时间: {}", generated_at),
        rule('='),
        String::new(),
        format!("数据记录数: {}", report.by_ratio.len()),
        format!("报告期数: {}", report.periods.len()),
        format!("报告期: {}", display_periods(&report.periods)),
    ];
    if let Some(ratio) = &report.ratio_column {
        lines.push(format!("排序依据: {}", ratio));
    }
    lines.push(String::new());

    let sections = [
        (
            format!("总排名表 - 按占净资产比例排序{}", scope_label(years, "所有报告期数据汇总")),
            &report.by_ratio,
        ),
        (
            format!("总排名表 - 按环比变化排序{}", scope_label(years, "所有报告期数据汇总")),
            &report.by_change,
        ),
    ];
    for (title, table) in sections {
        push_section(&mut lines, &title, table);
    }
    for (period, table) in &report.period_tables {
        let title = format!("报告期: {} - 共 {} 条记录", format_date_display(period), table.len());
        push_section(&mut lines, &title, table);
    }

    lines.push(rule('='));
    lines.push("报告生成完成".to_string());
    lines.push(rule('='));
    lines
}

fn push_section(lines: &mut Vec<String>, title: &str, table: &DataTable) {
    lines.push(rule('='));
    lines.push(title.to_string());
    lines.push(rule('='));
    lines.push(String::new());
    lines.push(output::plain_table(table).to_string());
    lines.push(String::new());
}

pub fn write_report(report: &IndustryReport, years: &[i32], output_dir: &Path) -> Result<PathBuf> {
    let now = beijing_now();
    let year_part = if years.is_empty() {
        "all".to_string()
    } else {
        years.iter().map(|y| y.to_string()).collect::<Vec<_>>().join("_")
    };
    let path = output_dir.join(format!(
        "fund_industry_allocation_{}_{}.txt",
        year_part,
        now.format("%Y%m%d_%H%M%S")
    ));
    let lines = report_lines(report, years, &now.format("%Y-%m-%d %H:%M:%S").to_string());
    output::write_text(&path, &lines)?;
    Ok(path)
}

fn print_summary(report: &IndustryReport, years: &[i32]) {
    println!("\n{}", rule('='));
    println!("总排名表 - 按占净资产比例排序{}", scope_label(years, "前20条"));
    println!("{}", rule('='));
    output::print_table(&report.by_ratio.head(20));

    println!("\n{}", rule('='));
    println!("总排名表 - 按环比变化排序{}", scope_label(years, "前20条"));
    println!("{}", rule('='));
    output::print_table(&report.by_change.head(20));

    for (period, table) in &report.period_tables {
        println!("\n{}", rule('='));
        println!("报告期: {} - 前10条记录", format_date_display(period));
        println!("{}", rule('='));
        output::print_table(&table.head(10));
    }

    println!("\n{}", rule('='));
    println!("报告生成完成");
    println!("{}", rule('='));
}
