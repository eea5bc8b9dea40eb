use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use person_frames::{ConfigLoader, GcpCredentials, PartialConfig, PersonFramePipeline};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// 人物截帧工具 - 用 Video Intelligence 找出人物出现的时间点，并用 ffmpeg 截帧
#[derive(Parser, Debug)]
#[command(name = "person-frames")]
#[command(about = "检测视频中人物出现的时间点并截取对应帧", long_about = None)]
struct Args {
    /// 配置文件路径（可选，支持 .ini 格式）
    /// 优先级：命令行参数 > 环境变量 > 配置文件 > 默认值
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 运行完整流程（不带子命令时的默认行为），结果 JSON 输出到 stdout
    Run(RunArgs),
    /// 生成默认配置文件
    InitConfig {
        /// 配置文件路径
        #[arg(default_value = "person-frames.ini")]
        path: PathBuf,
    },
}

#[derive(clap::Args, Debug, Default)]
struct RunArgs {
    /// bucket 中的视频对象名
    #[arg(long)]
    video: Option<String>,

    /// GCS bucket
    #[arg(long)]
    bucket: Option<String>,

    /// 上传结果 JSON 和截帧到 GCS
    #[arg(long, conflicts_with = "no_upload")]
    upload: bool,

    /// 不上传（覆盖配置文件和环境变量）
    #[arg(long)]
    no_upload: bool,

    /// 等待标注任务完成的最长时间（秒）
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// ffmpeg 可执行文件路径
    #[arg(long)]
    ffmpeg: Option<PathBuf>,
}

impl RunArgs {
    fn into_overrides(self) -> PartialConfig {
        let upload_enabled = match (self.upload, self.no_upload) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };
        PartialConfig {
            gcs_bucket: self.bucket,
            video_name: self.video,
            upload_enabled,
            annotation_timeout_secs: self.timeout_secs,
            ffmpeg_binary: self.ffmpeg,
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match args.command.unwrap_or(Commands::Run(RunArgs::default())) {
        Commands::Run(run_args) => {
            let config = ConfigLoader::load_config(args.config.as_deref(), run_args.into_overrides())
                .context("加载配置失败")?;

            // 日志写到 stderr，stdout 只输出结果 JSON
            tracing_subscriber::fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
                )
                .with_writer(std::io::stderr)
                .init();

            let credentials = GcpCredentials::from_env()?;
            let pipeline = PersonFramePipeline::new(config, credentials)?;
            let bundle = pipeline.run().await.context("处理视频失败")?;

            println!(
                "{}",
                serde_json::to_string_pretty(&bundle).context("序列化结果失败")?
            );
        }
        Commands::InitConfig { path } => {
            ConfigLoader::create_default_config(&path)?;
            println!("已生成默认配置文件: {}", path.display());
        }
    }

    Ok(())
}
