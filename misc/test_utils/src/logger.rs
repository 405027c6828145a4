use std::{env, io::Write, sync::Once};

use chrono::Local;
use env_logger::{fmt::Formatter, Builder as EnvLoggerBuilder};
use log::{LevelFilter, Record};

use crate::errors::error::{TestUtilsError, TestUtilsResult};

static TEST_LOGGING_INIT: Once = Once::new();

/// Initialize the test logger once per process, driven by `RUST_LOG`.
/// Without `RUST_LOG` logging stays off.
pub fn init_logger() {
    TEST_LOGGING_INIT.call_once(|| {
        if let Ok(pattern) = env::var("RUST_LOG") {
            init(Some(pattern)).expect("Failed to initialize the test logger");
        }
    })
}

fn text_format(buf: &mut Formatter, record: &Record) -> std::io::Result<()> {
    let level = buf.default_level_style(record.level());
    writeln!(
        buf,
        "{}|{:>5}|{:<30}|{:>35}:{:<4}| {}",
        Local::now().format("%Y-%m-%d %H:%M:%S.%f"),
        level,
        record.target(),
        record.file().get_or_insert(""),
        record.line().get_or_insert(0),
        record.args()
    )
}

pub fn init(pattern: Option<String>) -> TestUtilsResult<()> {
    let pattern = pattern.or(env::var("RUST_LOG").ok());
    EnvLoggerBuilder::new()
        .format(text_format)
        .filter(None, LevelFilter::Off)
        .parse_filters(pattern.as_deref().unwrap_or("warn"))
        .try_init()
        .map_err(|err| TestUtilsError::LoggingError(format!("Cannot init logger: {err:?}")))?;
    Ok(())
}
