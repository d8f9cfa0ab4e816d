//! 通用表格数据模型
//!
//! 各数据源返回的列随接口和调用而变化，列名只能在运行时探测。
//! `DataTable` 保存有序列名和 JSON 单元格，提供查询层需要的
//! 重命名、类型转换、排序、过滤、合并和分组操作。

use serde_json::{Map, Number, Value};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// 表格结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTable {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

/// 表格中某一行的只读视图
#[derive(Debug, Clone, Copy)]
pub struct RowRef<'a> {
    table: &'a DataTable,
    index: usize,
}

impl<'a> RowRef<'a> {
    /// 按列名取值
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        let idx = self.table.column_index(column)?;
        self.table.rows[self.index].get(idx)
    }

    /// 按列名取显示字符串，空值返回 None
    pub fn get_str(&self, column: &str) -> Option<String> {
        match self.get(column)? {
            Value::Null => None,
            v => Some(display_value(v)),
        }
    }

    /// 按列名取数值
    pub fn get_f64(&self, column: &str) -> Option<f64> {
        self.get(column).and_then(value_as_f64)
    }

    pub fn values(&self) -> &'a [Value] {
        &self.table.rows[self.index]
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

impl DataTable {
    /// 创建只有列名的空表
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// 由列名和行数据创建表格，行长度不一致时补空或截断
    pub fn from_rows<I, S>(columns: I, rows: Vec<Vec<Value>>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
    }

    /// 追加一条记录，遇到新列时自动扩展，已有行补空值
    pub fn push_record(&mut self, record: Map<String, Value>) {
        for key in record.keys() {
            if !self.has_column(key) {
                self.columns.push(key.clone());
                for row in self.rows.iter_mut() {
                    row.push(Value::Null);
                }
            }
        }
        let mut row = vec![Value::Null; self.columns.len()];
        for (key, value) in record {
            if let Some(idx) = self.column_index(&key) {
                row[idx] = value;
            }
        }
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_index(column).is_some()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// 在候选列名中返回第一个存在的列
    pub fn find_column(&self, candidates: &[&str]) -> Option<String> {
        candidates
            .iter()
            .find(|c| self.has_column(c))
            .map(|c| c.to_string())
    }

    /// 返回第一个名称包含任一片段的列
    pub fn find_column_containing(&self, fragments: &[&str]) -> Option<String> {
        self.columns
            .iter()
            .find(|c| fragments.iter().any(|f| c.contains(f)))
            .cloned()
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    pub fn row(&self, index: usize) -> Option<RowRef<'_>> {
        (index < self.rows.len()).then_some(RowRef { table: self, index })
    }

    /// 最近一期记录（最后一行）
    pub fn last_row(&self) -> Option<RowRef<'_>> {
        self.rows.len().checked_sub(1).and_then(|i| self.row(i))
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = RowRef<'_>> {
        (0..self.rows.len()).map(move |index| RowRef { table: self, index })
    }

    pub fn column_values(&self, column: &str) -> Vec<&Value> {
        match self.column_index(column) {
            Some(idx) => self.rows.iter().map(|r| &r[idx]).collect(),
            None => Vec::new(),
        }
    }

    /// 列值去重，保持首次出现的顺序
    pub fn unique_values(&self, column: &str) -> Vec<Value> {
        let mut seen = HashSet::new();
        self.column_values(column)
            .into_iter()
            .filter(|v| seen.insert(group_key(v)))
            .cloned()
            .collect()
    }

    /// 批量重命名列，不存在的列忽略
    pub fn rename_columns(&mut self, mapping: &[(&str, &str)]) {
        for (from, to) in mapping {
            self.rename_column(from, to);
        }
    }

    pub fn rename_column(&mut self, from: &str, to: &str) {
        if let Some(idx) = self.column_index(from) {
            self.columns[idx] = to.to_string();
        }
    }

    /// 数值列转换，无法解析的值置为空（等同 errors='coerce'）
    pub fn coerce_numeric(&mut self, columns: &[&str]) {
        for column in columns {
            let Some(idx) = self.column_index(column) else {
                continue;
            };
            for row in self.rows.iter_mut() {
                let converted = value_as_f64(&row[idx]).map(number).unwrap_or(Value::Null);
                row[idx] = converted;
            }
        }
    }

    pub fn filter_rows<F>(&self, predicate: F) -> DataTable
    where
        F: Fn(&RowRef<'_>) -> bool,
    {
        let rows = self
            .iter_rows()
            .filter(|r| predicate(r))
            .map(|r| r.values().to_vec())
            .collect();
        DataTable {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// 保留指定列包含子串的行；列不存在时原样返回
    pub fn filter_contains(&self, column: &str, needle: &str) -> DataTable {
        if !self.has_column(column) {
            return self.clone();
        }
        self.filter_rows(|r| {
            r.get_str(column)
                .map(|s| s.contains(needle))
                .unwrap_or(false)
        })
    }

    pub fn filter_equals(&self, column: &str, value: &str) -> DataTable {
        self.filter_rows(|r| r.get_str(column).as_deref() == Some(value))
    }

    /// 按列稳定排序，数值优先按数值比较，空值始终排在最后
    pub fn sort_by(&mut self, column: &str, descending: bool) {
        let Some(idx) = self.column_index(column) else {
            return;
        };
        self.rows.sort_by(|a, b| {
            let (x, y) = (&a[idx], &b[idx]);
            match (x.is_null(), y.is_null()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => {
                    let ord = compare_values(x, y);
                    if descending {
                        ord.reverse()
                    } else {
                        ord
                    }
                }
            }
        });
    }

    pub fn head(&self, n: usize) -> DataTable {
        DataTable {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// 只保留给定的列（按给定顺序），不存在的列跳过
    pub fn select(&self, columns: &[&str]) -> DataTable {
        let indices: Vec<(usize, &str)> = columns
            .iter()
            .filter_map(|c| self.column_index(c).map(|i| (i, *c)))
            .collect();
        DataTable {
            columns: indices.iter().map(|(_, c)| c.to_string()).collect(),
            rows: self
                .rows
                .iter()
                .map(|r| indices.iter().map(|(i, _)| r[*i].clone()).collect())
                .collect(),
        }
    }

    /// 新增或覆盖一列，值由行计算得出
    pub fn with_column<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&RowRef<'_>) -> Value,
    {
        let values: Vec<Value> = self.iter_rows().map(|r| f(&r)).collect();
        match self.column_index(name) {
            Some(idx) => {
                for (row, v) in self.rows.iter_mut().zip(values) {
                    row[idx] = v;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for (row, v) in self.rows.iter_mut().zip(values) {
                    row.push(v);
                }
            }
        }
    }

    pub fn set_constant_column(&mut self, name: &str, value: Value) {
        self.with_column(name, |_| value.clone());
    }

    pub fn drop_column(&mut self, name: &str) {
        if let Some(idx) = self.column_index(name) {
            self.columns.remove(idx);
            for row in self.rows.iter_mut() {
                row.remove(idx);
            }
        }
    }

    /// 纵向合并，列取并集（按首次出现顺序），缺失单元格为空
    pub fn concat(tables: &[DataTable]) -> DataTable {
        let mut columns: Vec<String> = Vec::new();
        for table in tables {
            for c in &table.columns {
                if !columns.contains(c) {
                    columns.push(c.clone());
                }
            }
        }

        let mut result = DataTable::new(columns);
        for table in tables {
            let mapping: Vec<Option<usize>> = result
                .columns
                .iter()
                .map(|c| table.column_index(c))
                .collect();
            for row in &table.rows {
                let merged = mapping
                    .iter()
                    .map(|m| m.map(|i| row[i].clone()).unwrap_or(Value::Null))
                    .collect();
                result.rows.push(merged);
            }
        }
        result
    }

    /// 按列计数，返回 [column, count_name]，保持首次出现顺序
    pub fn group_count(&self, column: &str, count_name: &str) -> DataTable {
        let mut order: Vec<Value> = Vec::new();
        let mut counts: HashMap<String, u64> = HashMap::new();
        for v in self.column_values(column) {
            let key = group_key(v);
            let entry = counts.entry(key).or_insert_with(|| {
                order.push(v.clone());
                0
            });
            *entry += 1;
        }
        let rows = order
            .into_iter()
            .map(|v| {
                let count = counts[&group_key(&v)];
                vec![v, Value::from(count)]
            })
            .collect();
        DataTable::from_rows([column.to_string(), count_name.to_string()], rows)
    }

    /// 按列对数值列求和，空值按 0 计
    pub fn group_sum(&self, column: &str, value_column: &str, out_name: &str) -> DataTable {
        let mut order: Vec<Value> = Vec::new();
        let mut sums: HashMap<String, f64> = HashMap::new();
        for r in self.iter_rows() {
            let Some(key_value) = r.get(column) else {
                continue;
            };
            let key = group_key(key_value);
            let entry = sums.entry(key).or_insert_with(|| {
                order.push(key_value.clone());
                0.0
            });
            *entry += r.get_f64(value_column).unwrap_or(0.0);
        }
        let rows = order
            .into_iter()
            .map(|v| {
                let sum = sums[&group_key(&v)];
                vec![v, number(sum)]
            })
            .collect();
        DataTable::from_rows([column.to_string(), out_name.to_string()], rows)
    }

    /// 每组取第一个值
    pub fn group_first(&self, column: &str, value_column: &str) -> DataTable {
        let mut seen = HashSet::new();
        let mut result = DataTable::new([column.to_string(), value_column.to_string()]);
        for r in self.iter_rows() {
            let Some(key_value) = r.get(column) else {
                continue;
            };
            if seen.insert(group_key(key_value)) {
                let value = r.get(value_column).cloned().unwrap_or(Value::Null);
                result.push_row(vec![key_value.clone(), value]);
            }
        }
        result
    }

    /// 以 key 列左连接，右表其余列追加在后
    pub fn left_join_on(&self, other: &DataTable, key: &str) -> DataTable {
        let Some(other_key) = other.column_index(key) else {
            return self.clone();
        };
        let extra: Vec<usize> = (0..other.columns.len())
            .filter(|&i| i != other_key && !self.has_column(&other.columns[i]))
            .collect();

        let mut lookup: HashMap<String, &Vec<Value>> = HashMap::new();
        for row in &other.rows {
            lookup.entry(group_key(&row[other_key])).or_insert(row);
        }

        let mut columns = self.columns.clone();
        columns.extend(extra.iter().map(|&i| other.columns[i].clone()));

        let self_key = self.column_index(key);
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let matched = self_key.and_then(|k| lookup.get(&group_key(&row[k])));
                let mut merged = row.clone();
                for &i in &extra {
                    merged.push(matched.map(|m| m[i].clone()).unwrap_or(Value::Null));
                }
                merged
            })
            .collect();

        DataTable { columns, rows }
    }

    /// 转为 JSON 记录列表
    pub fn to_records(&self) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }
}

/// 单元格显示字符串
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "N/A".to_string(),
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() => format_float(f),
            _ => n.to_string(),
        },
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

fn format_float(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{:.1}", f)
    } else {
        let s = format!("{:.6}", f);
        let trimmed = s.trim_end_matches('0');
        // 小于精度的值舍入为整数
        match trimmed.strip_suffix('.') {
            Some(int) => format!("{}.0", int),
            None => trimmed.to_string(),
        }
    }
}

/// 解析数值字符串，去掉千分位逗号和百分号
pub fn parse_number(s: &str) -> Option<f64> {
    let cleaned: String = s
        .trim()
        .trim_end_matches('%')
        .chars()
        .filter(|c| *c != ',')
        .collect();
    if cleaned.is_empty() || cleaned == "-" || cleaned == "--" {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|f| f.is_finite())
}

pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

/// f64 转 JSON 数值，NaN 与无穷转为空值
pub fn number(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (value_as_f64(a), value_as_f64(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => display_value(a).cmp(&display_value(b)),
    }
}

fn group_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => display_value(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn holdings() -> DataTable {
        DataTable::from_rows(
            ["股票代码", "股票名称", "持仓市值"],
            vec![
                vec![json!("600519"), json!("贵州茅台"), json!("1,200.5")],
                vec![json!("000858"), json!("五粮液"), json!("300")],
                vec![json!("600519"), json!("贵州茅台"), json!("800")],
            ],
        )
    }

    #[test]
    fn test_push_row_pads_short_rows() {
        let mut table = DataTable::new(["a", "b", "c"]);
        table.push_row(vec![json!(1)]);
        assert_eq!(table.rows()[0], vec![json!(1), Value::Null, Value::Null]);
    }

    #[test]
    fn test_push_record_extends_columns() {
        let mut table = DataTable::new(["股票代码"]);
        table.push_row(vec![json!("600519")]);

        let mut record = Map::new();
        record.insert("股票代码".into(), json!("000858"));
        record.insert("ROE".into(), json!(25.1));
        table.push_record(record);

        assert_eq!(table.columns(), &["股票代码".to_string(), "ROE".to_string()]);
        assert_eq!(table.cell(0, "ROE"), Some(&Value::Null));
        assert_eq!(table.cell(1, "ROE"), Some(&json!(25.1)));
    }

    #[test]
    fn test_coerce_numeric() {
        let mut table = DataTable::from_rows(
            ["liabilityToAsset", "code"],
            vec![
                vec![json!("0.9123"), json!("sh.600000")],
                vec![json!(""), json!("sh.600001")],
                vec![json!("abc"), json!("sh.600002")],
            ],
        );
        table.coerce_numeric(&["liabilityToAsset", "missing"]);

        assert_eq!(table.cell(0, "liabilityToAsset"), Some(&json!(0.9123)));
        assert_eq!(table.cell(1, "liabilityToAsset"), Some(&Value::Null));
        assert_eq!(table.cell(2, "liabilityToAsset"), Some(&Value::Null));
        assert_eq!(table.cell(0, "code"), Some(&json!("sh.600000")));
    }

    #[test]
    fn test_sort_numeric_descending_nulls_last() {
        let mut table = DataTable::from_rows(
            ["v"],
            vec![
                vec![json!("2")],
                vec![Value::Null],
                vec![json!("10")],
                vec![json!(3.5)],
            ],
        );
        table.sort_by("v", true);
        let values: Vec<String> = table.iter_rows().map(|r| display_value(r.get("v").unwrap())).collect();
        assert_eq!(values, vec!["10", "3.5", "2", "N/A"]);
    }

    #[test]
    fn test_concat_unions_columns() {
        let a = DataTable::from_rows(["x", "y"], vec![vec![json!(1), json!(2)]]);
        let b = DataTable::from_rows(["y", "z"], vec![vec![json!(3), json!(4)]]);
        let merged = DataTable::concat(&[a, b]);

        assert_eq!(merged.columns(), &["x".to_string(), "y".to_string(), "z".to_string()]);
        assert_eq!(merged.rows()[1], vec![Value::Null, json!(3), json!(4)]);
    }

    #[test]
    fn test_group_count_keeps_first_seen_order() {
        let counts = holdings().group_count("股票代码", "持有基金数");
        assert_eq!(counts.len(), 2);
        assert_eq!(counts.cell(0, "股票代码"), Some(&json!("600519")));
        assert_eq!(counts.cell(0, "持有基金数"), Some(&json!(2)));
        assert_eq!(counts.cell(1, "持有基金数"), Some(&json!(1)));
    }

    #[test]
    fn test_group_sum_parses_thousands() {
        let sums = holdings().group_sum("股票代码", "持仓市值", "持仓市值");
        assert_eq!(sums.row(0).unwrap().get_f64("持仓市值"), Some(2000.5));
        assert_eq!(sums.row(1).unwrap().get_f64("持仓市值"), Some(300.0));
    }

    #[test]
    fn test_left_join_fills_missing() {
        let left = DataTable::from_rows(
            ["股票代码", "持有基金数"],
            vec![vec![json!("600519"), json!(2)], vec![json!("300750"), json!(1)]],
        );
        let names = holdings().group_first("股票代码", "股票名称");
        let joined = left.left_join_on(&names, "股票代码");

        assert_eq!(joined.cell(0, "股票名称"), Some(&json!("贵州茅台")));
        assert_eq!(joined.cell(1, "股票名称"), Some(&Value::Null));
    }

    #[test]
    fn test_filter_contains_and_find_column() {
        let table = DataTable::from_rows(
            ["报告期", "ROE"],
            vec![vec![json!("2023-12-31"), json!(1)], vec![json!("2024-12-31"), json!(2)]],
        );
        let filtered = table.filter_contains("报告期", "2024");
        assert_eq!(filtered.len(), 1);
        assert_eq!(table.filter_contains("不存在", "2024").len(), 2);

        assert_eq!(table.find_column(&["代码", "ROE"]), Some("ROE".to_string()));
        assert_eq!(table.find_column_containing(&["报告"]), Some("报告期".to_string()));
    }

    #[test]
    fn test_display_value_floats() {
        let test_cases = vec![
            (json!(12.5), "12.5"),
            (json!(3.0), "3.0"),
            (json!(0.123456789), "0.123457"),
            (json!(1e-7), "0.0"),
            (json!(-1e-7), "-0.0"),
            (json!(2.0000001), "2.0"),
            (json!(42), "42"),
            (Value::Null, "N/A"),
        ];

        for (value, expected) in test_cases {
            assert_eq!(display_value(&value), expected, "值: {}", value);
        }
    }

    #[test]
    fn test_parse_number_edge_cases() {
        assert_eq!(parse_number(" 12.5% "), Some(12.5));
        assert_eq!(parse_number("1,234"), Some(1234.0));
        assert_eq!(parse_number("--"), None);
        assert_eq!(parse_number(""), None);
    }
}
