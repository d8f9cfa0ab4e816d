//! baostock 报文编解码
//!
//! 请求：`版本 \x01 消息类型 \x01 正文长度(10位)` + 正文 + `\x01` + CRC32 + `\n`
//! 响应：报头 + 正文（部分类型为 zlib 压缩）+ ... + `<![CDATA[]]>\n`

use flate2::read::ZlibDecoder;
use serde::Deserialize;
use std::io::Read;

use crate::error::{DataResult, DataSourceError};
use crate::models::table::DataTable;
use serde_json::Value;

pub const CLIENT_VERSION: &str = "00.9.10";
pub const MESSAGE_SPLIT: char = '\x01';
pub const DELIMITER: &str = "\n";
pub const RESPONSE_TERMINATOR: &[u8] = b"<![CDATA[]]>\n";
/// 报头长度: 版本(7) + 分隔符 + 类型(2) + 分隔符 + 长度(10)
pub const HEADER_LENGTH: usize = 21;
pub const PER_PAGE_COUNT: usize = 10000;

pub const MSG_LOGIN_REQUEST: &str = "00";
#[cfg(test)]
pub const MSG_LOGIN_RESPONSE: &str = "01";
pub const MSG_LOGOUT_REQUEST: &str = "02";
#[cfg(test)]
pub const MSG_LOGOUT_RESPONSE: &str = "03";
pub const MSG_EXCEPTION: &str = "04";
pub const MSG_PROFIT_REQUEST: &str = "21";
pub const MSG_BALANCE_REQUEST: &str = "29";
pub const MSG_CASH_FLOW_REQUEST: &str = "31";
pub const MSG_STOCK_BASIC_REQUEST: &str = "45";
pub const MSG_K_DATA_PLUS_REQUEST: &str = "95";
pub const MSG_K_DATA_PLUS_RESPONSE: &str = "96";

/// 正文经过 zlib 压缩的响应类型
const COMPRESSED_TYPES: &[&str] = &[MSG_K_DATA_PLUS_RESPONSE];

/// 编码请求报文
pub fn encode_request(msg_type: &str, fields: &[&str]) -> Vec<u8> {
    let body = fields.join(&MESSAGE_SPLIT.to_string());
    let header = format!(
        "{}{}{}{}{:010}",
        CLIENT_VERSION,
        MESSAGE_SPLIT,
        msg_type,
        MESSAGE_SPLIT,
        body.len()
    );
    let head_body = format!("{}{}", header, body);
    let crc = crc32fast::hash(head_body.as_bytes());
    format!("{}{}{}{}", head_body, MESSAGE_SPLIT, crc, DELIMITER).into_bytes()
}

/// 解析请求报文（模拟服务端使用），返回 (消息类型, 正文字段)
#[cfg(test)]
pub fn decode_request(raw: &[u8]) -> DataResult<(String, Vec<String>)> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| DataSourceError::Protocol(format!("请求不是合法 UTF-8: {}", e)))?;
    let text = text.trim_end_matches(DELIMITER);
    let (head_body, crc) = text
        .rsplit_once(MESSAGE_SPLIT)
        .ok_or_else(|| DataSourceError::Protocol("请求缺少校验码".to_string()))?;
    let expected = crc32fast::hash(head_body.as_bytes()).to_string();
    if crc != expected {
        return Err(DataSourceError::Protocol(format!(
            "校验码不匹配: {} != {}",
            crc, expected
        )));
    }
    let (msg_type, body) = split_header(head_body.as_bytes())?;
    let body = String::from_utf8_lossy(body);
    Ok((msg_type, body.split(MESSAGE_SPLIT).map(str::to_string).collect()))
}

/// 编码响应报文（模拟服务端使用），compress 为真时压缩正文
#[cfg(test)]
pub fn encode_response(msg_type: &str, fields: &[&str], compress: bool) -> Vec<u8> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    let body = fields.join(&MESSAGE_SPLIT.to_string()).into_bytes();
    let body = if compress {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        // 写入内存缓冲不会失败
        let _ = encoder.write_all(&body);
        encoder.finish().unwrap_or_default()
    } else {
        body
    };
    let mut out = format!(
        "{}{}{}{}{:010}",
        CLIENT_VERSION,
        MESSAGE_SPLIT,
        msg_type,
        MESSAGE_SPLIT,
        body.len()
    )
    .into_bytes();
    out.extend_from_slice(&body);
    out.extend_from_slice(RESPONSE_TERMINATOR);
    out
}

/// 拆分报头，返回 (消息类型, 正文)
fn split_header(raw: &[u8]) -> DataResult<(String, &[u8])> {
    if raw.len() < HEADER_LENGTH {
        return Err(DataSourceError::Protocol(format!(
            "报文长度不足: {} 字节",
            raw.len()
        )));
    }
    let header = String::from_utf8_lossy(&raw[..HEADER_LENGTH]);
    let parts: Vec<&str> = header.split(MESSAGE_SPLIT).collect();
    if parts.len() != 3 {
        return Err(DataSourceError::Protocol(format!("报头格式错误: {:?}", header)));
    }
    let body_len: usize = parts[2]
        .parse()
        .map_err(|_| DataSourceError::Protocol(format!("正文长度无效: {}", parts[2])))?;
    let end = HEADER_LENGTH + body_len;
    if raw.len() < end {
        return Err(DataSourceError::Protocol(format!(
            "正文不完整: 需要 {} 字节，实际 {}",
            end,
            raw.len()
        )));
    }
    Ok((parts[1].to_string(), &raw[HEADER_LENGTH..end]))
}

/// 服务端响应
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub msg_type: String,
    pub fields: Vec<String>,
}

impl Response {
    pub fn error_code(&self) -> &str {
        self.fields.first().map(String::as_str).unwrap_or("")
    }

    pub fn error_msg(&self) -> &str {
        self.fields.get(1).map(String::as_str).unwrap_or("")
    }

    /// 错误码 "0" 为成功，其余转为 Vendor 错误
    pub fn check(self) -> DataResult<Self> {
        if self.msg_type == MSG_EXCEPTION || self.error_code() != "0" {
            return Err(DataSourceError::vendor(
                "baostock",
                self.error_code(),
                self.error_msg(),
            ));
        }
        Ok(self)
    }
}

/// 解码完整响应报文（含结束标记）
pub fn decode_response(raw: &[u8]) -> DataResult<Response> {
    let (msg_type, body) = split_header(raw)?;
    let body = if COMPRESSED_TYPES.contains(&msg_type.as_str()) {
        let mut decoder = ZlibDecoder::new(body);
        let mut out = String::new();
        decoder
            .read_to_string(&mut out)
            .map_err(|e| DataSourceError::Protocol(format!("解压失败: {}", e)))?;
        out
    } else {
        String::from_utf8_lossy(body).into_owned()
    };
    Ok(Response {
        msg_type,
        fields: body.split(MESSAGE_SPLIT).map(str::to_string).collect(),
    })
}

#[derive(Debug, Deserialize)]
struct RecordSet {
    #[serde(default)]
    record: Vec<Vec<Value>>,
}

/// 查询结果页
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub fields: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Page {
    pub fn into_table(self) -> DataTable {
        DataTable::from_rows(self.fields, self.rows)
    }
}

/// 解析查询响应：第 7 个字段是 JSON 数据，最后一个字段是逗号分隔的列名
pub fn parse_page(response: &Response) -> DataResult<Page> {
    const DATA_INDEX: usize = 6;
    if response.fields.len() <= DATA_INDEX {
        return Err(DataSourceError::Protocol(format!(
            "查询响应字段不足: {}",
            response.fields.len()
        )));
    }
    let data = response.fields[DATA_INDEX].trim();
    let rows = if data.is_empty() {
        Vec::new()
    } else {
        serde_json::from_str::<RecordSet>(data)?.record
    };
    let fields = response
        .fields
        .last()
        .map(|f| {
            f.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();
    Ok(Page { fields, rows })
}
