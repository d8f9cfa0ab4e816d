//! baostock TCP 客户端
//!
//! 一个客户端对应一条 TCP 连接和一次登录会话，查询结果自动翻页

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::protocol::{self, Page, Response};
use crate::config::BaostockConfig;
use crate::error::{DataResult, DataSourceError};
use crate::models::response::beijing_now;
use crate::models::table::DataTable;

/// 写入请求并读到响应结束标记
async fn exchange(stream: &mut TcpStream, payload: &[u8]) -> std::io::Result<Vec<u8>> {
    stream.write_all(payload).await?;
    let mut buf = Vec::with_capacity(4096);
    let mut chunk = [0u8; 8192];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "服务器关闭了连接",
            ));
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.ends_with(protocol::RESPONSE_TERMINATOR) {
            return Ok(buf);
        }
    }
}

pub struct BaostockClient {
    config: BaostockConfig,
    timeout: Duration,
    stream: Option<TcpStream>,
    user_id: Option<String>,
    /// 与会话共享的登录状态，连接断开时一并清除
    logged_in: Arc<AtomicBool>,
}

impl BaostockClient {
    pub fn new(config: BaostockConfig, timeout_secs: u64) -> Self {
        Self {
            config,
            timeout: Duration::from_secs(timeout_secs.max(1)),
            stream: None,
            user_id: None,
            logged_in: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.user_id.is_some()
    }

    pub fn login_state(&self) -> Arc<AtomicBool> {
        self.logged_in.clone()
    }

    /// 丢弃连接和登录状态，服务端的会话随连接失效
    fn reset_session(&mut self) {
        if self.user_id.take().is_some() {
            log::warn!("baostock 连接已断开，需要重新登录");
        }
        self.stream = None;
        self.logged_in.store(false, Ordering::SeqCst);
    }

    fn addr(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    async fn ensure_stream(&mut self) -> DataResult<&mut TcpStream> {
        if self.stream.is_none() {
            let addr = self.addr();
            log::debug!("📡 连接 baostock 服务器: {}", addr);
            let stream = timeout(self.timeout, TcpStream::connect(&addr))
                .await
                .map_err(|_| DataSourceError::Network(format!("连接 {} 超时", addr)))?
                .map_err(|e| DataSourceError::Network(format!("连接 {} 失败: {}", addr, e)))?;
            self.stream = Some(stream);
        }
        self.stream
            .as_mut()
            .ok_or_else(|| DataSourceError::NotConnected("baostock".to_string()))
    }

    /// 发送请求并读取完整响应
    async fn request(&mut self, msg_type: &str, fields: &[&str]) -> DataResult<Response> {
        let io_timeout = self.timeout;
        let payload = protocol::encode_request(msg_type, fields);
        let stream = self.ensure_stream().await?;

        let result = timeout(io_timeout, exchange(stream, &payload)).await;

        let raw = match result {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                self.reset_session();
                return Err(DataSourceError::Network(format!("baostock 通信失败: {}", e)));
            }
            Err(_) => {
                self.reset_session();
                return Err(DataSourceError::Network("baostock 响应超时".to_string()));
            }
        };

        protocol::decode_response(&raw)?.check()
    }

    /// 登录，返回服务器消息
    pub async fn login(&mut self) -> DataResult<String> {
        let user = self.config.user.clone();
        let password = self.config.password.clone();
        let response = self
            .request(protocol::MSG_LOGIN_REQUEST, &["login", user.as_str(), password.as_str(), "0"])
            .await?;
        self.user_id = Some(user);
        self.logged_in.store(true, Ordering::SeqCst);
        Ok(response.error_msg().to_string())
    }

    /// 登出并关闭连接
    pub async fn logout(&mut self) -> DataResult<String> {
        let Some(user) = self.user_id.clone() else {
            return Ok(String::new());
        };
        let now = beijing_now().format("%Y%m%d%H%M%S").to_string();
        let result = self
            .request(protocol::MSG_LOGOUT_REQUEST, &["logout", user.as_str(), now.as_str()])
            .await;
        self.reset_session();
        result.map(|r| r.error_msg().to_string())
    }

    fn user(&self) -> DataResult<String> {
        self.user_id
            .clone()
            .ok_or_else(|| DataSourceError::NotConnected("baostock 未登录".to_string()))
    }

    /// 分页查询，直到某页返回不足一页
    async fn query_paged(&mut self, msg_type: &str, method: &str, args: &[&str]) -> DataResult<DataTable> {
        let user = self.user()?;
        let per_page = protocol::PER_PAGE_COUNT.to_string();
        let mut page_no = 1usize;
        let mut fields: Vec<String> = Vec::new();
        let mut rows = Vec::new();

        loop {
            let page_str = page_no.to_string();
            let mut body: Vec<&str> = vec![method, user.as_str(), page_str.as_str(), per_page.as_str()];
            body.extend_from_slice(args);
            let response = self.request(msg_type, &body).await?;
            let Page { fields: page_fields, rows: page_rows } = protocol::parse_page(&response)?;

            if fields.is_empty() {
                fields = page_fields;
            }
            let count = page_rows.len();
            rows.extend(page_rows);
            log::debug!("{} 第 {} 页返回 {} 条记录", method, page_no, count);

            if count < protocol::PER_PAGE_COUNT {
                break;
            }
            page_no += 1;
        }

        Ok(DataTable::from_rows(fields, rows))
    }

    /// 季频偿债能力
    pub async fn query_balance_data(&mut self, code: &str, year: i32, quarter: u8) -> DataResult<DataTable> {
        let (y, q) = (year.to_string(), quarter.to_string());
        self.query_paged(protocol::MSG_BALANCE_REQUEST, "query_balance_data", &[code, y.as_str(), q.as_str()])
            .await
    }

    /// 季频现金流量
    pub async fn query_cash_flow_data(&mut self, code: &str, year: i32, quarter: u8) -> DataResult<DataTable> {
        let (y, q) = (year.to_string(), quarter.to_string());
        self.query_paged(protocol::MSG_CASH_FLOW_REQUEST, "query_cash_flow_data", &[code, y.as_str(), q.as_str()])
            .await
    }

    /// 季频盈利能力
    pub async fn query_profit_data(&mut self, code: &str, year: i32, quarter: u8) -> DataResult<DataTable> {
        let (y, q) = (year.to_string(), quarter.to_string());
        self.query_paged(protocol::MSG_PROFIT_REQUEST, "query_profit_data", &[code, y.as_str(), q.as_str()])
            .await
    }

    /// 证券基本资料，code 为空时返回全部
    pub async fn query_stock_basic(&mut self, code: &str, code_name: &str) -> DataResult<DataTable> {
        self.query_paged(protocol::MSG_STOCK_BASIC_REQUEST, "query_stock_basic", &[code, code_name])
            .await
    }

    /// 历史 K 线
    pub async fn query_history_k_data_plus(
        &mut self,
        code: &str,
        fields: &str,
        start_date: &str,
        end_date: &str,
        frequency: &str,
        adjust_flag: &str,
    ) -> DataResult<DataTable> {
        self.query_paged(
            protocol::MSG_K_DATA_PLUS_REQUEST,
            "query_history_k_data_plus",
            &[code, fields, start_date, end_date, frequency, adjust_flag],
        )
        .await
    }
}

/// 测试用的模拟 baostock 服务器
#[cfg(test)]
pub(crate) mod fake_server {
    use super::protocol;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    /// 查询该代码时服务器直接断开连接
    pub const DROP_CODE: &str = "sh.600666";

    pub struct FakeServer {
        pub port: u16,
        pub logins: Arc<AtomicUsize>,
        /// 每条连接收到的第一个消息类型
        pub first_messages: Arc<Mutex<Vec<String>>>,
    }

    /// 启动模拟服务器
    ///
    /// - 登录密码为 "bad" 时返回错误码
    /// - 资产负债查询返回 sh.600000 一行，查询 `DROP_CODE` 时断开连接
    /// - K 线查询返回压缩正文
    pub async fn start() -> FakeServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let logins = Arc::new(AtomicUsize::new(0));
        let first_messages = Arc::new(Mutex::new(Vec::new()));
        let (l, f) = (logins.clone(), first_messages.clone());

        tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    break;
                };
                let (l, f) = (l.clone(), f.clone());
                tokio::spawn(async move {
                    let (read_half, mut write_half) = socket.into_split();
                    let mut reader = BufReader::new(read_half);
                    let mut first = true;
                    loop {
                        let mut line = Vec::new();
                        match reader.read_until(b'\n', &mut line).await {
                            Ok(0) | Err(_) => break,
                            Ok(_) => {}
                        }
                        let (msg_type, fields) = protocol::decode_request(&line).unwrap();
                        if first {
                            f.lock().unwrap().push(msg_type.clone());
                            first = false;
                        }
                        if fields.get(4).map(String::as_str) == Some(DROP_CODE) {
                            break;
                        }
                        let reply = respond(&msg_type, &fields, &l);
                        if write_half.write_all(&reply).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });

        FakeServer { port, logins, first_messages }
    }

    fn respond(msg_type: &str, fields: &[String], logins: &AtomicUsize) -> Vec<u8> {
        match msg_type {
            protocol::MSG_LOGIN_REQUEST => {
                if fields.get(2).map(String::as_str) == Some("bad") {
                    return protocol::encode_response(
                        protocol::MSG_LOGIN_RESPONSE,
                        &["10001001", "密码错误"],
                        false,
                    );
                }
                logins.fetch_add(1, Ordering::SeqCst);
                protocol::encode_response(
                    protocol::MSG_LOGIN_RESPONSE,
                    &["0", "success", "login", "anonymous"],
                    false,
                )
            }
            protocol::MSG_LOGOUT_REQUEST => protocol::encode_response(
                protocol::MSG_LOGOUT_RESPONSE,
                &["0", "success", "logout", "anonymous"],
                false,
            ),
            protocol::MSG_K_DATA_PLUS_REQUEST => {
                let data = json!({"record": [
                    ["2024-01-02", fields[4].as_str(), "10.1"],
                    ["2024-01-03", fields[4].as_str(), "10.3"]
                ]})
                .to_string();
                protocol::encode_response(
                    protocol::MSG_K_DATA_PLUS_RESPONSE,
                    &[
                        "0", "success", "query_history_k_data_plus", "anonymous", "1", "10000",
                        data.as_str(), "date,code,close",
                    ],
                    true,
                )
            }
            _ => {
                let method = fields.first().cloned().unwrap_or_default();
                let code = fields.get(4).cloned().unwrap_or_default();
                let data = if code == "sh.999999" {
                    json!({"record": []}).to_string()
                } else {
                    json!({"record": [[code, "2023-12-31", "0.9123", "1.05"]]}).to_string()
                };
                let reply_type = format!("{:02}", msg_type.parse::<u32>().unwrap_or(0) + 1);
                protocol::encode_response(
                    &reply_type,
                    &[
                        "0", "success", method.as_str(), "anonymous", "1", "10000", data.as_str(),
                        "code,statDate,liabilityToAsset,currentRatio",
                    ],
                    false,
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(port: u16) -> BaostockConfig {
        BaostockConfig {
            host: "127.0.0.1".to_string(),
            port,
            ..BaostockConfig::default()
        }
    }

    #[tokio::test]
    async fn test_login_query_logout() {
        let server = fake_server::start().await;
        let mut client = BaostockClient::new(config(server.port), 5);

        assert_eq!(client.login().await.unwrap(), "success");
        assert!(client.is_logged_in());

        let table = client.query_balance_data("sh.600000", 2023, 4).await.unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.cell(0, "code"), Some(&serde_json::json!("sh.600000")));

        client.logout().await.unwrap();
        assert!(!client.is_logged_in());
    }

    #[tokio::test]
    async fn test_compressed_k_data() {
        let server = fake_server::start().await;
        let mut client = BaostockClient::new(config(server.port), 5);
        client.login().await.unwrap();

        let table = client
            .query_history_k_data_plus("sz.000001", "date,code,close", "2024-01-01", "2024-01-31", "d", "3")
            .await
            .unwrap();
        assert_eq!(table.columns(), &["date", "code", "close"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(1, "close"), Some(&serde_json::json!("10.3")));
    }

    #[tokio::test]
    async fn test_login_failure_is_vendor_error() {
        let server = fake_server::start().await;
        let mut cfg = config(server.port);
        cfg.password = "bad".to_string();
        let mut client = BaostockClient::new(cfg, 5);

        let err = client.login().await.unwrap_err();
        assert!(matches!(err, DataSourceError::Vendor { .. }));
        assert!(!client.is_logged_in());
    }

    #[tokio::test]
    async fn test_query_without_login() {
        let server = fake_server::start().await;
        let mut client = BaostockClient::new(config(server.port), 5);
        let err = client.query_profit_data("sh.600000", 2023, 4).await.unwrap_err();
        assert!(matches!(err, DataSourceError::NotConnected(_)));
    }

    /// 测试连接断开后登录状态清除，重新登录走新连接
    #[tokio::test]
    async fn test_dropped_connection_requires_login() {
        let server = fake_server::start().await;
        let mut client = BaostockClient::new(config(server.port), 5);
        let state = client.login_state();
        client.login().await.unwrap();
        assert!(state.load(Ordering::SeqCst));

        let err = client.query_balance_data(fake_server::DROP_CODE, 2023, 4).await.unwrap_err();
        assert!(matches!(err, DataSourceError::Network(_)));
        assert!(!client.is_logged_in());
        assert!(!state.load(Ordering::SeqCst));

        let err = client.query_balance_data("sh.600000", 2023, 4).await.unwrap_err();
        assert!(matches!(err, DataSourceError::NotConnected(_)));

        client.login().await.unwrap();
        let table = client.query_balance_data("sh.600000", 2023, 4).await.unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(
            *server.first_messages.lock().unwrap(),
            vec![protocol::MSG_LOGIN_REQUEST.to_string(), protocol::MSG_LOGIN_REQUEST.to_string()]
        );
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut client = BaostockClient::new(config(port), 2);
        let err = client.login().await.unwrap_err();
        assert!(matches!(err, DataSourceError::Network(_)));
    }
}
