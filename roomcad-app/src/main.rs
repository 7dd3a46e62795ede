use std::path::PathBuf;

use clap::{Parser, Subcommand};
use roomcad_config::{AppConfig, ConfigError};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

mod cli;

/// RoomCAD 命令行：驱动事务引擎并打印草图拓扑。
#[derive(Debug, Parser)]
#[command(name = "roomcad", version, about)]
struct Args {
    /// 配置文件路径，缺省时按 ROOMCAD_CONFIG 与 ./config/default.toml 查找
    #[arg(long)]
    config: Option<PathBuf>,

    /// 覆盖配置中的日志等级
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Mode>,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum Mode {
    /// 执行一组示例命令并演示撤销/重做
    Demo,
    /// 列出已注册的请求类型
    Requests,
}

fn main() {
    let args = Args::parse();

    let mut config = load_configuration(args.config);
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    init_logging(&config);
    info!("启动 RoomCAD");

    match args.command.unwrap_or(Mode::Demo) {
        Mode::Demo => {
            if let Err(err) = cli::run_demo(&config) {
                error!(error = %err, "执行 CLI 演示失败");
                std::process::exit(1);
            }
        }
        Mode::Requests => cli::print_request_types(),
    }
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
            AppConfig::default()
        }),
        None => match AppConfig::discover() {
            Ok(cfg) => cfg,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                        warn!(path = %path.display(), error = %err, "加载默认配置失败，使用内建默认值");
                    }
                    ConfigError::Invalid { .. } | ConfigError::Context { .. } => {
                        warn!(error = %err, "加载默认配置失败，使用内建默认值");
                    }
                }
                AppConfig::default()
            }
        },
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
