mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use edt_core::config::DEFAULT_CONFIG_FILE;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "edt")]
#[command(about = "Emploi du temps unifié du M2 LOGOS")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 配置文件路径
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: String,

    /// 启用详细日志
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// 获取课程并生成合并后的日历
    Calendar {
        /// 选中的课程（子串匹配，可重复）
        #[arg(short, long = "select")]
        select: Vec<String>,

        /// 选中配置中的全部课程
        #[arg(short, long)]
        all: bool,

        /// ADE 订阅地址
        #[arg(long, env = "EDT_FEED_URL")]
        feed_url: Option<String>,

        /// 离线订阅目录（每个专业一个 <code>.ics）
        #[arg(long)]
        feed_dir: Option<String>,

        /// 请求超时（秒）
        #[arg(long, default_value = "30")]
        timeout: u64,

        /// 窗口起始日期（YYYY-MM-DD），默认 2024-09-16
        #[arg(long)]
        from: Option<String>,

        /// 窗口结束日期（YYYY-MM-DD），默认 2025-07-17
        #[arg(long)]
        to: Option<String>,

        /// 输出格式
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        /// 输出文件路径（默认标准输出）
        #[arg(short, long)]
        output: Option<String>,
    },

    /// 列出配置中的专业及其课程
    Programs,

    /// 常驻事件管理
    Events {
        #[command(subcommand)]
        action: EventCommands,
    },
}

#[derive(Subcommand)]
enum EventCommands {
    /// 列出所有常驻事件
    List,

    /// 添加常驻事件
    Add {
        /// 事件类型
        #[arg(short = 't', long = "type", value_enum)]
        kind: EventKind,

        /// 标题
        #[arg(short, long)]
        summary: String,

        /// 星期（Lundi … Vendredi），每周事件
        #[arg(long, required_if_eq("kind", "weekly"))]
        day: Option<String>,

        /// 日期（YYYY-MM-DD），单次事件
        #[arg(long, required_if_eq("kind", "one-time"))]
        date: Option<String>,

        /// 开始时间（HH:MM）
        #[arg(long)]
        time: String,

        /// 时长（分钟）
        #[arg(short, long, default_value = "60")]
        duration: u32,

        /// 教室
        #[arg(short, long, default_value = "")]
        room: String,
    },

    /// 启用常驻事件
    Enable {
        /// 事件编号（见 `events list`）
        index: usize,
    },

    /// 停用常驻事件
    Disable {
        /// 事件编号（见 `events list`）
        index: usize,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Ics,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum EventKind {
    Weekly,
    OneTime,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 设置日志级别
    let log_level = if cli.verbose { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("edt_cli={0},edt_core={0}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Calendar {
            select,
            all,
            feed_url,
            feed_dir,
            timeout,
            from,
            to,
            format,
            output,
        } => {
            commands::calendar_command(commands::CalendarParams {
                config_path: cli.config,
                select,
                all,
                feed_url,
                feed_dir,
                timeout,
                from,
                to,
                format,
                output,
            })
            .await
        }

        Commands::Programs => commands::programs_command(&cli.config),

        Commands::Events { action } => match action {
            EventCommands::List => commands::events_list_command(&cli.config),
            EventCommands::Add {
                kind,
                summary,
                day,
                date,
                time,
                duration,
                room,
            } => commands::events_add_command(
                &cli.config,
                commands::NewEventParams {
                    kind,
                    summary,
                    day,
                    date,
                    time,
                    duration,
                    room,
                },
            ),
            EventCommands::Enable { index } => {
                commands::events_toggle_command(&cli.config, index, true)
            }
            EventCommands::Disable { index } => {
                commands::events_toggle_command(&cli.config, index, false)
            }
        },
    }
}
