//! 日志初始化
//!
//! 默认输出到终端，配置了日志文件时同时写入文件

use env_logger::{Builder, Env, Target};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use crate::config::LogConfig;

/// 同时写入标准错误和日志文件
struct TeeWriter {
    file: File,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// 初始化日志系统，RUST_LOG 优先于配置的级别
pub fn init(config: &LogConfig) {
    let mut builder = Builder::from_env(Env::default().default_filter_or(config.level.as_str()));
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} - {} - {} - {}",
            buf.timestamp_seconds(),
            record.target(),
            record.level(),
            record.args()
        )
    });

    let mut file_error = None;
    if let Some(path) = config.file.as_deref().filter(|p| !p.is_empty()) {
        match open_log_file(Path::new(path)) {
            Ok(file) => {
                builder.target(Target::Pipe(Box::new(TeeWriter { file })));
            }
            Err(e) => file_error = Some((path.to_string(), e)),
        }
    }

    // 重复初始化（如测试中）忽略即可
    let _ = builder.try_init();

    if let Some((path, e)) = file_error {
        log::warn!("无法打开日志文件 {}: {}，仅输出到终端", path, e);
    }
}
