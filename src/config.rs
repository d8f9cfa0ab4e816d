//! 配置模块
//!
//! 支持从 JSON 文件加载系统配置，环境变量优先于文件，文件优先于默认值

use log::Level;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// 配置加载过程中的日志，按产生顺序保存
#[derive(Debug, Default)]
pub struct LoadNotes(Vec<(Level, String)>);

impl LoadNotes {
    fn push(&mut self, level: Level, message: String) {
        self.0.push((level, message));
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Level, String)> {
        self.0.iter()
    }

    /// 写入日志
    pub fn emit(self) {
        for (level, message) in self.0 {
            log::log!(level, "{}", message);
        }
    }
}

/// baostock 连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaostockConfig {
    #[serde(default = "default_baostock_host")]
    pub host: String,
    #[serde(default = "default_baostock_port")]
    pub port: u16,
    #[serde(default = "default_baostock_user")]
    pub user: String,
    #[serde(default = "default_baostock_password")]
    pub password: String,
}

/// tushare 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TushareConfig {
    /// 接口 token（为空时读取 TUSHARE_TOKEN）
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_tushare_url")]
    pub base_url: String,
}

/// akshare 风格抓取的接口地址，测试时可指向本地模拟服务
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AkshareConfig {
    /// 新浪财报接口（quotes.sina.cn）
    #[serde(default = "default_sina_quotes_url")]
    pub sina_quotes_url: String,
    /// 新浪财务指标页面（money.finance.sina.com.cn）
    #[serde(default = "default_sina_money_url")]
    pub sina_money_url: String,
    /// 新浪机构持股接口（vip.stock.finance.sina.com.cn）
    #[serde(default = "default_sina_vip_url")]
    pub sina_vip_url: String,
    /// 东方财富行情列表（push2.eastmoney.com）
    #[serde(default = "default_em_push_url")]
    pub eastmoney_push_url: String,
    /// 东方财富历史行情（push2his.eastmoney.com）
    #[serde(default = "default_em_push_his_url")]
    pub eastmoney_push_his_url: String,
    /// 天天基金（fund.eastmoney.com）
    #[serde(default = "default_em_fund_url")]
    pub eastmoney_fund_url: String,
    /// 基金档案（fundf10.eastmoney.com）
    #[serde(default = "default_em_fundf10_url")]
    pub eastmoney_fundf10_url: String,
    /// 巨潮资讯（webapi.cninfo.com.cn）
    #[serde(default = "default_cninfo_url")]
    pub cninfo_url: String,
}

/// 各数据源配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub baostock: BaostockConfig,
    #[serde(default)]
    pub tushare: TushareConfig,
    #[serde(default)]
    pub akshare: AkshareConfig,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 日志级别: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 日志文件（为空只输出到控制台）
    #[serde(default)]
    pub file: Option<String>,
}

/// 查询配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// 请求超时时间（秒）
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// 连接超时时间（秒）
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,
    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
    /// 工作线程数（0 表示使用 CPU 核心数）
    #[serde(default)]
    pub workers: usize,
    /// API Key（为空则不启用认证）
    #[serde(default)]
    pub api_key: String,
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 默认数据源
    #[serde(default = "default_source")]
    pub default_source: String,
    /// 备用数据源（按顺序尝试）
    #[serde(default)]
    pub fallback_sources: Vec<String>,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub server: ServerConfig,
    /// 报告输出目录
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

// 默认值函数
fn default_source() -> String { "baostock".to_string() }
fn default_output_dir() -> String { "output".to_string() }
fn default_baostock_host() -> String { "public-api.baostock.com".to_string() }
fn default_baostock_port() -> u16 { 10030 }
fn default_baostock_user() -> String { "anonymous".to_string() }
fn default_baostock_password() -> String { "123456".to_string() }
fn default_tushare_url() -> String { "http://api.tushare.pro".to_string() }
fn default_sina_quotes_url() -> String { "https://quotes.sina.cn".to_string() }
fn default_sina_money_url() -> String { "https://money.finance.sina.com.cn".to_string() }
fn default_sina_vip_url() -> String { "http://vip.stock.finance.sina.com.cn".to_string() }
fn default_em_push_url() -> String { "https://82.push2.eastmoney.com".to_string() }
fn default_em_push_his_url() -> String { "https://push2his.eastmoney.com".to_string() }
fn default_em_fund_url() -> String { "https://fund.eastmoney.com".to_string() }
fn default_em_fundf10_url() -> String { "https://fundf10.eastmoney.com".to_string() }
fn default_cninfo_url() -> String { "http://webapi.cninfo.com.cn".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_timeout() -> u64 { 30 }
fn default_connect_timeout() -> u64 { 10 }
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }

impl Default for BaostockConfig {
    fn default() -> Self {
        Self {
            host: default_baostock_host(),
            port: default_baostock_port(),
            user: default_baostock_user(),
            password: default_baostock_password(),
        }
    }
}

impl Default for TushareConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            base_url: default_tushare_url(),
        }
    }
}

impl Default for AkshareConfig {
    fn default() -> Self {
        Self {
            sina_quotes_url: default_sina_quotes_url(),
            sina_money_url: default_sina_money_url(),
            sina_vip_url: default_sina_vip_url(),
            eastmoney_push_url: default_em_push_url(),
            eastmoney_push_his_url: default_em_push_his_url(),
            eastmoney_fund_url: default_em_fund_url(),
            eastmoney_fundf10_url: default_em_fundf10_url(),
            cninfo_url: default_cninfo_url(),
        }
    }
}

impl AkshareConfig {
    /// 所有接口都指向同一个地址（用于本地模拟服务）
    #[cfg(test)]
    pub fn with_base_url(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            sina_quotes_url: base.clone(),
            sina_money_url: base.clone(),
            sina_vip_url: base.clone(),
            eastmoney_push_url: base.clone(),
            eastmoney_push_his_url: base.clone(),
            eastmoney_fund_url: base.clone(),
            eastmoney_fundf10_url: base.clone(),
            cninfo_url: base,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: 0,
            api_key: String::new(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_source: default_source(),
            fallback_sources: Vec::new(),
            sources: SourcesConfig::default(),
            log: LogConfig::default(),
            query: QueryConfig::default(),
            server: ServerConfig::default(),
            output_dir: default_output_dir(),
        }
    }
}

impl AppConfig {
    /// 从 JSON 文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// 加载配置
    ///
    /// 查找顺序：指定路径 -> config.json -> config/config.json -> 默认值，
    /// 最后应用环境变量覆盖。日志级别来自配置，所以加载过程的提示
    /// 先收集起来，由调用方在日志初始化后输出
    pub fn load(explicit: Option<&Path>) -> (Self, LoadNotes) {
        let mut notes = LoadNotes::default();
        let mut candidates: Vec<PathBuf> = Vec::new();
        if let Some(path) = explicit {
            candidates.push(path.to_path_buf());
        }
        candidates.push(PathBuf::from("config.json"));
        candidates.push(PathBuf::from("config/config.json"));

        let mut config = None;
        for path in candidates {
            if path.exists() {
                match Self::from_file(&path) {
                    Ok(c) => {
                        notes.push(Level::Info, format!("从 {} 加载配置成功", path.display()));
                        config = Some(c);
                        break;
                    }
                    Err(e) => {
                        notes.push(Level::Warn, format!("加载配置文件 {} 失败: {}", path.display(), e));
                    }
                }
            } else if explicit.map(|p| p == path.as_path()).unwrap_or(false) {
                notes.push(Level::Warn, format!("配置文件不存在: {}", path.display()));
            }
        }

        let mut config = config.unwrap_or_else(|| {
            notes.push(Level::Info, "使用默认配置".to_string());
            Self::default()
        });
        config.apply_env(|key| env::var(key).ok());
        notes.push(
            Level::Info,
            format!("配置加载完成，使用数据源: {}", config.default_source),
        );
        (config, notes)
    }

    /// 应用环境变量覆盖，`lookup` 便于测试时注入
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("FINQUERY_DEFAULT_SOURCE") {
            self.default_source = v.trim().to_string();
        }
        if let Some(v) = non_empty("FINQUERY_FALLBACK_SOURCES") {
            self.fallback_sources = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(v) = non_empty("FINQUERY_LOG_LEVEL") {
            self.log.level = v;
        }
        if let Some(v) = non_empty("FINQUERY_OUTPUT_DIR") {
            self.output_dir = v;
        }
        if let Some(v) = non_empty("TUSHARE_TOKEN") {
            self.sources.tushare.token = v;
        }
        if let Some(v) = non_empty("API_KEY") {
            self.server.api_key = v;
        }
    }

    /// 获取服务器绑定地址
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(&self.output_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    /// 测试默认配置
    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.default_source, "baostock");
        assert!(config.fallback_sources.is_empty());
        assert_eq!(config.sources.baostock.port, 10030);
        assert_eq!(config.sources.tushare.base_url, "http://api.tushare.pro");
        assert_eq!(config.log.level, "info");
        assert_eq!(config.output_dir, "output");
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
    }

    /// 测试部分字段的 JSON 文件
    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"default_source": "akshare", "fallback_sources": ["baostock"], "sources": {{"tushare": {{"token": "abc"}}}}}}"#
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.default_source, "akshare");
        assert_eq!(config.fallback_sources, vec!["baostock"]);
        assert_eq!(config.sources.tushare.token, "abc");
        assert_eq!(config.sources.tushare.base_url, "http://api.tushare.pro");
        assert_eq!(config.sources.baostock.host, "public-api.baostock.com");
    }

    /// 测试环境变量覆盖
    #[test]
    fn test_apply_env() {
        let vars: HashMap<&str, &str> = [
            ("FINQUERY_DEFAULT_SOURCE", "tushare"),
            ("FINQUERY_FALLBACK_SOURCES", "akshare, baostock,,"),
            ("FINQUERY_OUTPUT_DIR", "/tmp/reports"),
            ("TUSHARE_TOKEN", "token-1"),
            ("API_KEY", ""),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.server.api_key = "from-file".to_string();
        config.apply_env(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.default_source, "tushare");
        assert_eq!(config.fallback_sources, vec!["akshare", "baostock"]);
        assert_eq!(config.output_dir, "/tmp/reports");
        assert_eq!(config.sources.tushare.token, "token-1");
        // 空值不覆盖
        assert_eq!(config.server.api_key, "from-file");
        assert_eq!(config.log.level, "info");
    }

    /// 测试指定的配置文件缺失或无法解析时留下警告
    #[test]
    fn test_load_reports_bad_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        let (_, notes) = AppConfig::load(Some(&missing));
        assert!(notes
            .iter()
            .any(|(level, msg)| *level == Level::Warn && msg.contains("配置文件不存在")));

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{not json").unwrap();
        let (_, notes) = AppConfig::load(Some(&broken));
        let warning = notes
            .iter()
            .find(|(level, _)| *level == Level::Warn)
            .map(|(_, msg)| msg.clone())
            .unwrap_or_default();
        assert!(warning.contains("broken.json"), "{}", warning);
        assert!(notes.iter().any(|(_, msg)| msg.starts_with("配置加载完成")));
    }

    #[test]
    fn test_akshare_with_base_url() {
        let config = AkshareConfig::with_base_url("http://127.0.0.1:9000/");
        assert_eq!(config.sina_quotes_url, "http://127.0.0.1:9000");
        assert_eq!(config.cninfo_url, "http://127.0.0.1:9000");
    }
}
