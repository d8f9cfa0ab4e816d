//! 巨潮资讯基金行业配置

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde_json::Value;

use super::common;
use crate::error::{DataResult, DataSourceError};
use crate::models::response::beijing_now;
use crate::models::table::DataTable;

const FIELD_NAMES: [(&str, &str); 8] = [
    ("F001V", "行业编码"),
    ("F002V", "证监会行业名称"),
    ("F003N", "基金覆盖家数"),
    ("F004N", "行业规模"),
    ("F005N", "占净资产比例"),
    ("F006N", "行业规模变动"),
    ("F007N", "基金覆盖家数变动"),
    ("ENDDATE", "报告期"),
];

const NUMERIC_FIELDS: [&str; 5] = [
    "基金覆盖家数",
    "行业规模",
    "占净资产比例",
    "行业规模变动",
    "基金覆盖家数变动",
];

/// 请求头 Accept-EncKey：当前时间戳的 base64
fn enc_key() -> String {
    STANDARD.encode(beijing_now().timestamp().to_string())
}

/// 获取某一报告期（`YYYYMMDD`）的基金行业配置
pub async fn fetch_industry_allocation(
    client: &Client,
    base_url: &str,
    date: &str,
) -> DataResult<DataTable> {
    let date = date.trim();
    if date.len() != 8 || !date.chars().all(|c| c.is_ascii_digit()) {
        return Err(DataSourceError::InvalidRequest(format!(
            "日期格式应为 YYYYMMDD: {}",
            date
        )));
    }

    let url = format!("{}{}", base_url, common::CNINFO_INDUSTRY_PATH);
    log::debug!("📡 请求巨潮基金行业配置: {}", date);
    let response = client
        .post(&url)
        .header("Accept-EncKey", enc_key())
        .header("Origin", "https://webapi.cninfo.com.cn")
        .header("Referer", "https://webapi.cninfo.com.cn/")
        .form(&[("rdate", date)])
        .send()
        .await?;
    let response = common::check_status(response, "基金行业配置")?;
    let json: Value = response.json().await?;
    parse_industry_allocation(&json)
}

pub fn parse_industry_allocation(json: &Value) -> DataResult<DataTable> {
    let empty = || DataTable::new(FIELD_NAMES.iter().map(|(_, name)| *name));

    if let Some(code) = json["resultcode"].as_i64() {
        if code != 200 {
            let msg = json["resultmsg"].as_str().unwrap_or_default();
            return Err(DataSourceError::vendor("akshare", code.to_string(), msg));
        }
    }
    let Some(records) = json["records"].as_array() else {
        return Ok(empty());
    };

    if records.is_empty() {
        return Ok(empty());
    }

    let mut table = DataTable::default();
    for record in records {
        let Value::Object(map) = record else {
            continue;
        };
        table.push_record(map.clone());
    }
    table.rename_columns(&FIELD_NAMES);
    table.coerce_numeric(&NUMERIC_FIELDS);
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample() -> Value {
        json!({
            "resultcode": 200,
            "resultmsg": "success",
            "records": [
                {"F001V": "C", "F002V": "制造业", "F003N": 3000, "F004N": 150000.5, "F005N": 45.12, "F006N": 1200.0, "F007N": 12, "ENDDATE": "2024-06-30"},
                {"F001V": "J", "F002V": "金融业", "F003N": 1500, "F004N": 30000.0, "F005N": 8.5, "F006N": -200.0, "F007N": -3, "ENDDATE": "2024-06-30"}
            ]
        })
    }

    #[test]
    fn test_parse_industry_allocation() {
        let table = parse_industry_allocation(&sample()).unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.has_column("证监会行业名称"));
        assert!(!table.has_column("F002V"));
        assert_eq!(table.row(0).unwrap().get_f64("占净资产比例"), Some(45.12));
        assert_eq!(table.cell(1, "报告期"), Some(&json!("2024-06-30")));
    }

    #[test]
    fn test_parse_vendor_error() {
        let err = parse_industry_allocation(&json!({"resultcode": 401, "resultmsg": "unauthorized"}))
            .unwrap_err();
        assert!(matches!(err, DataSourceError::Vendor { .. }));
    }

    #[test]
    fn test_enc_key_is_base64_timestamp() {
        let decoded = STANDARD.decode(enc_key()).unwrap();
        let text = String::from_utf8(decoded).unwrap();
        assert!(text.parse::<i64>().is_ok());
    }

    #[tokio::test]
    async fn test_fetch_industry_allocation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(common::CNINFO_INDUSTRY_PATH))
            .and(header_exists("Accept-EncKey"))
            .and(body_string_contains("rdate=20240630"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample()))
            .mount(&server)
            .await;

        let client = Client::new();
        let table = fetch_industry_allocation(&client, &server.uri(), "20240630")
            .await
            .unwrap();
        assert_eq!(table.len(), 2);

        let err = fetch_industry_allocation(&client, &server.uri(), "2024-06")
            .await
            .unwrap_err();
        assert!(matches!(err, DataSourceError::InvalidRequest(_)));
    }
}
