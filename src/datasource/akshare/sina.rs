//! 新浪财经接口
//!
//! - 财务报表: quotes.sina.cn CompanyFinanceService.getFinanceReport2022
//! - 财务指标: money.finance.sina.com.cn vFD_FinancialGuideLine（GBK 页面）
//! - 机构持股: vip.stock.finance.sina.com.cn ComStockHoldService.getJGCGDetail

use reqwest::Client;
use scraper::Html;
use serde_json::{Map, Value};

use super::common::{self, cell_text, selector};
use crate::error::{DataResult, DataSourceError};
use crate::models::table::DataTable;

/// 报表类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Balance,
    Income,
    CashFlow,
}

impl ReportKind {
    pub fn source_param(&self) -> &'static str {
        match self {
            ReportKind::Balance => "fzb",
            ReportKind::Income => "lrb",
            ReportKind::CashFlow => "llb",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReportKind::Balance => "资产负债表",
            ReportKind::Income => "利润表",
            ReportKind::CashFlow => "现金流量表",
        }
    }
}

/// 获取财务报表，每个报告期一行，按报告期升序
///
/// `paper_code` 为 `sh600000` 格式
pub async fn fetch_finance_report(
    client: &Client,
    base_url: &str,
    paper_code: &str,
    kind: ReportKind,
) -> DataResult<DataTable> {
    let url = format!("{}{}", base_url, common::SINA_FINANCE_REPORT_PATH);
    log::debug!("📡 请求新浪{}: {} {}", kind.label(), url, paper_code);

    let response = client
        .get(&url)
        .query(&[
            ("paperCode", paper_code),
            ("source", kind.source_param()),
            ("type", "0"),
            ("page", "1"),
            ("num", "1000"),
        ])
        .header("Referer", "https://finance.sina.com.cn/")
        .send()
        .await?;
    let response = common::check_status(response, kind.label())?;
    let json: Value = response.json().await?;
    parse_finance_report(&json)
}

/// 解析财务报表 JSON
pub fn parse_finance_report(json: &Value) -> DataResult<DataTable> {
    let data = &json["result"]["data"];
    if data.is_null() {
        let msg = json["result"]["status"]["msg"].as_str().unwrap_or("无数据");
        log::warn!("新浪财报返回空数据: {}", msg);
        return Ok(DataTable::new(["报告期"]));
    }

    let dates: Vec<String> = data["report_date"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|d| d["date_value"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    let mut table = DataTable::new(["报告期"]);
    for date in &dates {
        let report = &data["report_list"][date.as_str()];
        if report.is_null() {
            continue;
        }
        let mut record = Map::new();
        record.insert("报告期".to_string(), Value::String(date.clone()));
        if let Some(items) = report["data"].as_array() {
            for item in items {
                let Some(title) = item["item_title"].as_str() else {
                    continue;
                };
                let value = common::numeric_cell(&item["item_value"]);
                // 同名科目保留第一个非空值
                let slot = record.entry(title.to_string()).or_insert(Value::Null);
                if slot.is_null() {
                    *slot = value;
                }
            }
        }
        for (key, label) in [
            ("publish_date", "公告日期"),
            ("rCurrency", "币种"),
            ("data_source", "数据源"),
            ("is_audit", "是否审计"),
        ] {
            if let Some(v) = report[key].as_str() {
                record.insert(label.to_string(), Value::String(v.to_string()));
            }
        }
        table.push_record(record);
    }

    table.sort_by("报告期", false);
    Ok(table)
}

/// 获取某一年的财务指标页面
pub async fn fetch_financial_guideline(
    client: &Client,
    base_url: &str,
    code: &str,
    year: i32,
) -> DataResult<DataTable> {
    let url = format!(
        "{}{}/{}/ctrl/{}/displaytype/4.phtml",
        base_url,
        common::SINA_GUIDELINE_PATH,
        code,
        year
    );
    log::debug!("📡 请求新浪财务指标: {}", url);

    let response = client.get(&url).send().await?;
    let response = common::check_status(response, "财务指标")?;
    let bytes = response.bytes().await?;
    let html = common::decode_gbk(&bytes);
    parse_financial_guideline(&html)
}

/// 解析财务指标表格（原表按列为报告期，这里转置为每期一行）
pub fn parse_financial_guideline(html: &str) -> DataResult<DataTable> {
    let document = Html::parse_document(html);
    let table_sel = selector("table#BalanceSheetNewTable0")?;
    let tr_sel = selector("tr")?;
    let td_sel = selector("td")?;

    let Some(table) = document.select(&table_sel).next() else {
        return Ok(DataTable::new(["报告期"]));
    };

    let mut dates: Vec<String> = Vec::new();
    let mut indicators: Vec<(String, Vec<String>)> = Vec::new();
    for row in table.select(&tr_sel) {
        let cells: Vec<String> = row.select(&td_sel).map(cell_text).collect();
        if cells.is_empty() {
            continue;
        }
        if cells[0] == "报告日期" {
            dates = cells[1..].to_vec();
            continue;
        }
        // 分组标题行只有一个单元格
        if dates.is_empty() || cells.len() != dates.len() + 1 {
            continue;
        }
        indicators.push((cells[0].clone(), cells[1..].to_vec()));
    }

    let mut columns = vec!["报告期".to_string()];
    columns.extend(indicators.iter().map(|(name, _)| name.clone()));
    let rows = dates
        .iter()
        .enumerate()
        .map(|(i, date)| {
            let mut row = vec![Value::String(date.clone())];
            row.extend(indicators.iter().map(|(_, values)| common::to_number(&values[i])));
            row
        })
        .collect();

    let mut result = DataTable::from_rows(columns, rows);
    result.sort_by("报告期", false);
    Ok(result)
}

/// 获取机构持股明细，quarter 形如 `20243`
pub async fn fetch_institutional_holdings(
    client: &Client,
    base_url: &str,
    code: &str,
    quarter: &str,
) -> DataResult<DataTable> {
    let url = format!("{}{}", base_url, common::SINA_INSTITUTE_HOLD_PATH);
    log::debug!("📡 请求新浪机构持股: {} {} {}", url, code, quarter);

    let response = client
        .get(&url)
        .query(&[("symbol", code), ("quarter", quarter)])
        .send()
        .await?;
    let response = common::check_status(response, "机构持股")?;
    let text = response.text().await?;
    parse_institutional_holdings(&text)
}

/// 解析机构持股 JSONP，按机构类型展开
pub fn parse_institutional_holdings(text: &str) -> DataResult<DataTable> {
    let body = common::slice_between(text, '{', '}')?;
    let json = common::loose_json(body)?;
    let data = match &json["data"] {
        Value::Null => return Ok(DataTable::new(["持股机构类型"])),
        Value::Object(map) => map,
        other => {
            return Err(DataSourceError::Parse(format!(
                "机构持股数据格式错误: {}",
                other
            )))
        }
    };

    let mut table = DataTable::new(["持股机构类型"]);
    for (kind, group) in data {
        let entries: Vec<&Value> = match group {
            Value::Object(map) => map.values().collect(),
            Value::Array(arr) => arr.iter().collect(),
            _ => continue,
        };
        for entry in entries {
            let Value::Object(fields) = entry else {
                continue;
            };
            let mut record = Map::new();
            record.insert("持股机构类型".to_string(), Value::String(kind.clone()));
            for (k, v) in fields {
                record.insert(k.clone(), common::numeric_cell(v));
            }
            table.push_record(record);
        }
    }
    Ok(table)
}
