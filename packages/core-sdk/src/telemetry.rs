use std::{fs::OpenOptions, path::Path, sync::Mutex};

use anyhow::Result;
use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;

static INITIALIZED: OnceCell<()> = OnceCell::new();

/**
 * \brief 安装全局 tracing 订阅者，重复调用无副作用。
 * \param verbose  未设置 RUST_LOG 时使用 debug 级别
 * \param log_file 指定时日志追加写入该文件，否则写 stderr
 */
pub fn init(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    INITIALIZED.get_or_try_init(|| install(verbose, log_file))?;
    Ok(())
}

fn install(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "chatlink={0},chatlink_core_sdk={0},warn",
            default_level
        ))
    });

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = match log_file {
        Some(path) => {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("install tracing subscriber failed: {}", e))
}
