//! 命令行报告
//!
//! 每个报告对应一个子命令，查询数据后打印到终端，部分报告写入输出目录

pub mod balance;
pub mod cashflow;
pub mod fund_industry;
pub mod fund_monitor;
pub mod fundamental;
pub mod holdings;
pub mod output;

/// 解析 `代码=名称` 形式的公司参数，没有名称时用代码代替
pub fn parse_company(arg: &str) -> (String, String) {
    match arg.split_once(['=', ':']) {
        Some((code, name)) if !name.trim().is_empty() => (code.trim().to_string(), name.trim().to_string()),
        Some((code, _)) => (code.trim().to_string(), code.trim().to_string()),
        None => (arg.trim().to_string(), arg.trim().to_string()),
    }
}

/// 命令行给出公司时使用命令行参数，否则使用默认列表
pub fn companies_or(args: &[String], defaults: &[(&str, &str)]) -> Vec<(String, String)> {
    if args.is_empty() {
        defaults
            .iter()
            .map(|(code, name)| (code.to_string(), name.to_string()))
            .collect()
    } else {
        args.iter().map(|a| parse_company(a)).collect()
    }
}
