//! 表格输出：终端表格、文本报告和 CSV

use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_FULL_CONDENSED, ContentArrangement, Table};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::models::table::{display_value, DataTable};

/// UTF-8 BOM，便于 Excel 正确识别中文
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub const RULE_WIDTH: usize = 100;

pub fn rule(ch: char) -> String {
    ch.to_string().repeat(RULE_WIDTH)
}

/// 终端表格，宽度自适应
pub fn create_table(data: &DataTable) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    fill(&mut table, data);
    table
}

/// 写入文件的表格，不限制宽度
pub fn plain_table(data: &DataTable) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Disabled);
    fill(&mut table, data);
    table
}

fn fill(table: &mut Table, data: &DataTable) {
    table.set_header(data.columns());
    for row in data.rows() {
        table.add_row(row.iter().map(display_value).collect::<Vec<_>>());
    }
}

pub fn print_table(data: &DataTable) {
    println!("{}", create_table(data));
}

/// 创建输出目录
pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("创建输出目录失败: {}", dir.display()))
}

/// 写入 CSV（UTF-8 BOM），空值写为空字符串
pub fn write_csv(path: &Path, data: &DataTable) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let mut file = File::create(path).with_context(|| format!("创建文件失败: {}", path.display()))?;
    file.write_all(UTF8_BOM)?;

    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(data.columns())?;
    for row in data.rows() {
        writer.write_record(row.iter().map(|v| match v {
            serde_json::Value::Null => String::new(),
            other => display_value(other),
        }))?;
    }
    writer.flush()?;
    Ok(())
}

/// 写入文本文件
pub fn write_text(path: &Path, lines: &[String]) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, lines.join("\n")).with_context(|| format!("写入文件失败: {}", path.display()))
}

/// `YYYYMMDD` 显示为 `YYYY-MM-DD`
pub fn format_date_display(date: &str) -> String {
    if date.len() == 8 && date.chars().all(|c| c.is_ascii_digit()) {
        format!("{}-{}-{}", &date[..4], &date[4..6], &date[6..])
    } else {
        date.to_string()
    }
}
