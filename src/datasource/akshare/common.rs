//! 公共常量和辅助函数

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, Response};
use scraper::{ElementRef, Selector};
use serde_json::Value;
use std::time::Duration;

use crate::error::{DataResult, DataSourceError};
use crate::models::table::{number, parse_number, DataTable};

pub const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

// ==================== 接口路径 ====================

/// 新浪财报（资产负债表/利润表/现金流量表）
pub const SINA_FINANCE_REPORT_PATH: &str =
    "/cn/api/openapi.php/CompanyFinanceService.getFinanceReport2022";
/// 新浪财务指标页面
pub const SINA_GUIDELINE_PATH: &str = "/corp/go.php/vFD_FinancialGuideLine/stockid";
/// 新浪机构持股明细
pub const SINA_INSTITUTE_HOLD_PATH: &str =
    "/q/api/jsonp.php/var%20details=/ComStockHoldService.getJGCGDetail";
/// 东方财富 A 股列表
pub const EM_STOCK_LIST_PATH: &str = "/api/qt/clist/get";
/// 东方财富历史 K 线
pub const EM_KLINE_PATH: &str = "/api/qt/stock/kline/get";
/// 天天基金基金列表
pub const EM_FUND_LIST_PATH: &str = "/js/fundcode_search.js";
/// 天天基金净值数据
pub const EM_FUND_NAV_PATH: &str = "/pingzhongdata";
/// 天天基金开放式基金排行
pub const EM_FUND_RANK_PATH: &str = "/data/rankhandler.aspx";
/// 基金持仓明细
pub const EM_FUND_HOLDINGS_PATH: &str = "/FundArchivesDatas.aspx";
/// 巨潮基金行业配置
pub const CNINFO_INDUSTRY_PATH: &str = "/api/sysapi/p_sysapi1113";

/// 创建 HTTP 客户端
pub fn build_client(timeout_secs: u64, connect_timeout_secs: u64) -> DataResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(connect_timeout_secs))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| DataSourceError::Network(format!("创建 HTTP 客户端失败: {}", e)))
}

/// 检查响应状态
pub fn check_status(response: Response, what: &str) -> DataResult<Response> {
    if !response.status().is_success() {
        return Err(DataSourceError::Network(format!(
            "获取{}失败: {}",
            what,
            response.status()
        )));
    }
    Ok(response)
}

/// GBK 解码（新浪页面）
pub fn decode_gbk(bytes: &[u8]) -> String {
    encoding_rs::GBK.decode(bytes).0.to_string()
}

pub fn selector(css: &str) -> DataResult<Selector> {
    Selector::parse(css).map_err(|e| DataSourceError::Parse(format!("选择器 {} 无效: {:?}", css, e)))
}

/// 提取单元格文本
pub fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text()
        .collect::<Vec<_>>()
        .join("")
        .replace('\u{a0}', " ")
        .trim()
        .to_string()
}

static BARE_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)\s*:"#).unwrap());

/// 给 JS 对象字面量中未加引号的键补上引号
pub fn quote_bare_keys(text: &str) -> String {
    BARE_KEY.replace_all(text, r#"$1"$2":"#).into_owned()
}

/// 宽松解析 JS 对象（键可能没有引号）
pub fn loose_json(text: &str) -> DataResult<Value> {
    match serde_json::from_str(text) {
        Ok(v) => Ok(v),
        Err(_) => serde_json::from_str(&quote_bare_keys(text))
            .map_err(|e| DataSourceError::Parse(format!("JSON 解析失败: {}", e))),
    }
}

/// 截取第一个 `open` 到最后一个 `close` 之间（含）的内容
pub fn slice_between(text: &str, open: char, close: char) -> DataResult<&str> {
    let start = text
        .find(open)
        .ok_or_else(|| DataSourceError::Parse(format!("未找到 '{}'", open)))?;
    let end = text
        .rfind(close)
        .ok_or_else(|| DataSourceError::Parse(format!("未找到 '{}'", close)))?;
    if end < start {
        return Err(DataSourceError::Parse("响应格式错误".to_string()));
    }
    Ok(&text[start..=end])
}

/// 提取 `var name = ...;` 的值
pub fn js_var<'a>(text: &'a str, name: &str) -> Option<&'a str> {
    let marker = format!("var {}", name);
    let start = text.find(&marker)? + marker.len();
    let rest = text[start..].trim_start();
    let rest = rest.strip_prefix('=')?.trim_start();
    let end = rest.find(';').unwrap_or(rest.len());
    Some(rest[..end].trim())
}

/// 字符串转数值，无法解析时返回空值
pub fn to_number(s: &str) -> Value {
    parse_number(s).map(number).unwrap_or(Value::Null)
}

/// JSON 值转单元格：数字原样，字符串尝试转为数字
pub fn numeric_cell(v: &Value) -> Value {
    match v {
        Value::String(s) => parse_number(s).map(number).unwrap_or_else(|| {
            if s.trim().is_empty() {
                Value::Null
            } else {
                Value::String(s.clone())
            }
        }),
        other => other.clone(),
    }
}

/// 解析 HTML 表格：表头取 `th`（没有时取第一行 `td`）
pub fn parse_html_table(table: ElementRef<'_>) -> DataResult<DataTable> {
    let tr = selector("tr")?;
    let th = selector("th")?;
    let td = selector("td")?;

    let mut header: Vec<String> = Vec::new();
    let mut rows: Vec<Vec<Value>> = Vec::new();
    for row in table.select(&tr) {
        let heads: Vec<String> = row.select(&th).map(cell_text).collect();
        if header.is_empty() && !heads.is_empty() {
            header = heads;
            continue;
        }
        let cells: Vec<String> = row.select(&td).map(cell_text).collect();
        if cells.is_empty() {
            continue;
        }
        if header.is_empty() {
            header = cells;
            continue;
        }
        rows.push(cells.into_iter().map(Value::String).collect());
    }
    Ok(DataTable::from_rows(header, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_loose_json() {
        let text = r#"{datas:["a,b"],allRecords:2,pageIndex:1}"#;
        let v = loose_json(text).unwrap();
        assert_eq!(v["allRecords"], json!(2));
        assert_eq!(v["datas"][0], json!("a,b"));

        let strict = r#"{"a": "x:y"}"#;
        assert_eq!(loose_json(strict).unwrap()["a"], json!("x:y"));
    }

    #[test]
    fn test_js_var_and_slice() {
        let text = r#"var r = [["000001","HXCZHH"]];"#;
        assert_eq!(js_var(text, "r"), Some(r#"[["000001","HXCZHH"]]"#));
        assert_eq!(js_var(text, "missing"), None);

        let jsonp = r#"var details=({data:{}});"#;
        assert_eq!(slice_between(jsonp, '{', '}').unwrap(), "{data:{}}");
    }

    #[test]
    fn test_numeric_cell() {
        assert_eq!(numeric_cell(&json!("1,234.5")), json!(1234.5));
        assert_eq!(numeric_cell(&json!("5.2%")), json!(5.2));
        assert_eq!(numeric_cell(&json!("")), Value::Null);
        assert_eq!(numeric_cell(&json!("定期报告")), json!("定期报告"));
        assert_eq!(numeric_cell(&json!(3)), json!(3));
    }

    #[test]
    fn test_parse_html_table() {
        let html = r#"
            <table>
              <thead><tr><th>序号</th><th>股票代码</th><th>股票名称</th></tr></thead>
              <tbody>
                <tr><td>1</td><td><a>600519</a></td><td>贵州茅台</td></tr>
                <tr><td>2</td><td>000858</td><td>五粮液&nbsp;</td></tr>
              </tbody>
            </table>"#;
        let document = scraper::Html::parse_document(html);
        let table_el = document.select(&selector("table").unwrap()).next().unwrap();
        let table = parse_html_table(table_el).unwrap();
        assert_eq!(table.columns(), &["序号", "股票代码", "股票名称"]);
        assert_eq!(table.cell(0, "股票代码"), Some(&json!("600519")));
        assert_eq!(table.cell(1, "股票名称"), Some(&json!("五粮液")));
    }
}
