//! 股票代码标准化
//!
//! - baostock: `sh.600000` / `sz.000001`
//! - tushare: `600000.SH` / `000001.SZ`
//! - akshare: 纯数字 `600000`

/// 根据首位数字判断市场，6 开头为上海，0/3 开头为深圳，其他默认上海
fn market_of(digits: &str) -> &'static str {
    if digits.starts_with('6') {
        "sh"
    } else if digits.starts_with('0') || digits.starts_with('3') {
        "sz"
    } else {
        log::warn!("无法识别股票代码 {} 的市场，默认使用上海市场", digits);
        "sh"
    }
}

/// 转为 baostock 格式
pub fn to_baostock(code: &str) -> String {
    let code = code.trim().to_lowercase();
    if code.starts_with("sh.") || code.starts_with("sz.") {
        return code;
    }
    let digits = code.replace(".sh", "").replace(".sz", "");
    format!("{}.{}", market_of(&digits), digits)
}

/// 转为 tushare 格式
pub fn to_tushare(code: &str) -> String {
    let code = code.trim().to_uppercase();
    if code.ends_with(".SH") || code.ends_with(".SZ") {
        return code;
    }
    let digits = code.replace("SH.", "").replace("SZ.", "");
    format!("{}.{}", digits, market_of(&digits).to_uppercase())
}

/// 提取纯数字代码
pub fn to_plain(code: &str) -> String {
    let mut code = code.trim().to_string();
    for affix in ["sh.", "sz.", "SH.", "SZ.", ".SH", ".SZ", ".sh", ".sz"] {
        code = code.replace(affix, "");
    }
    code
}

/// 新浪接口使用的 `sh600000` 格式
pub fn to_sina(code: &str) -> String {
    let digits = to_plain(code);
    format!("{}{}", market_of(&digits), digits)
}

/// 东方财富 secid：上海 `1.`，深圳 `0.`
pub fn to_eastmoney_secid(code: &str) -> String {
    let digits = to_plain(code);
    let market = if market_of(&digits) == "sh" { 1 } else { 0 };
    format!("{}.{}", market, digits)
}
