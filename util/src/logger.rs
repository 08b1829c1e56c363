// Copyright (c) 2024 Huawei Technologies Co.,Ltd. All rights reserved.
//
// StratoVirt is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan
// PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//         http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY
// KIND, EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO
// NON-INFRINGEMENT, MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

use std::fs::File;
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::sync::Mutex;

use anyhow::{Context, Result};
use log::{Level, LevelFilter, Log, Metadata, Record};
use nix::unistd::getpid;

use crate::time::{get_format_time, gettime};
use crate::unix::gettid;

/// Environment variable selecting the log level.
pub const LOG_LEVEL_ENV: &str = "CPRVIRT_LOG_LEVEL";

fn format_now() -> String {
    let (sec, nsec) = gettime().unwrap_or_else(|e| {
        println!("{:?}", e);
        (0, 0)
    });
    let format_time = get_format_time(sec).unwrap_or([1970, 1, 1, 0, 0, 0]);

    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:09}",
        format_time[0],
        format_time[1],
        format_time[2],
        format_time[3],
        format_time[4],
        format_time[5],
        nsec
    )
}

/// Format like "%year-%mon-%dayT%hour:%min:%sec.%nsec
struct VmLogger {
    handler: Mutex<Box<dyn Write + Send>>,
    level: Level,
}

impl Log for VmLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let formatmsg = format_args!(
            "{:<5}: [{}][{}][{}: {}]:{}: {}\n",
            format_now(),
            getpid().as_raw(),
            gettid(),
            record.file().unwrap_or(""),
            record.line().unwrap_or(0),
            record.level(),
            record.args()
        )
        .to_string();

        let mut handler = self.handler.lock().unwrap();
        if let Err(e) = handler.write_all(formatmsg.as_bytes()) {
            println!("Failed to log message {:?}", e);
        }
    }

    fn flush(&self) {
        let _ = self.handler.lock().unwrap().flush();
    }
}

/// Parse a level name, anything unknown falls back to `Info`.
pub fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "error" => Level::Error,
        "warn" => Level::Warn,
        "info" => Level::Info,
        "debug" => Level::Debug,
        "trace" => Level::Trace,
        _ => Level::Info,
    }
}

fn init_logger_with_env(logfile: Box<dyn Write + Send>) -> Result<()> {
    let level = std::env::var(LOG_LEVEL_ENV).map_or(Level::Info, |l| parse_level(&l));

    let logger = VmLogger {
        handler: Mutex::new(logfile),
        level,
    };
    log::set_boxed_logger(Box::new(logger)).map(|()| log::set_max_level(LevelFilter::Trace))?;
    Ok(())
}

fn open_log_file(path: &str) -> Result<File> {
    std::fs::OpenOptions::new()
        .read(false)
        .write(true)
        .append(true)
        .create(true)
        .mode(0o640)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path))
}

/// Install the process logger. An empty `path` logs to stderr.
pub fn init_log(path: &str) -> Result<()> {
    let logfile: Box<dyn Write + Send> = if path.is_empty() {
        Box::new(std::io::stderr())
    } else {
        Box::new(open_log_file(path)?)
    };
    init_logger_with_env(logfile).with_context(|| format!("Failed to init logger: {}", path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("ERROR"), Level::Error);
        assert_eq!(parse_level("warn"), Level::Warn);
        assert_eq!(parse_level("Debug"), Level::Debug);
        assert_eq!(parse_level("trace"), Level::Trace);
        assert_eq!(parse_level("verbose"), Level::Info);
    }

    #[test]
    fn test_format_now() {
        let now = format_now();
        // 2024-01-01T00:00:00.000000000
        assert_eq!(now.len(), 29);
        assert_eq!(&now[10..11], "T");
    }
}
