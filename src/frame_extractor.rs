use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::error::CaptureError;

/// 一次截帧的结果
#[derive(Debug, Clone, PartialEq)]
pub struct FrameCapture {
    /// 时间偏移（秒）
    pub offset: f64,
    /// 截取的图片路径
    pub path: PathBuf,
}

impl FrameCapture {
    /// 图片文件名（不含目录）
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// 截帧命令，按参数数组执行，不经过 shell
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub output: PathBuf,
}

/// 调用 ffmpeg 在指定时间点截取单帧
pub struct FrameExtractor {
    ffmpeg_binary: PathBuf,
    input_path: PathBuf,
    output_dir: PathBuf,
}

impl FrameExtractor {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            ffmpeg_binary: config.ffmpeg_binary.clone(),
            input_path: config.local_video_path(),
            output_dir: config.frames_dir(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// 构造某个时间点的截帧命令
    pub fn capture_command(&self, offset: f64) -> Option<CaptureCommand> {
        let label = offset_label(offset)?;
        let output = self.output_dir.join(format!("{}.jpg", label));

        let mut args: Vec<OsString> = ["-loglevel", "error", "-y", "-i"]
            .iter()
            .map(OsString::from)
            .collect();
        args.push(self.input_path.clone().into_os_string());
        args.push("-ss".into());
        args.push(label.into());
        args.push("-frames:v".into());
        args.push("1".into());
        args.push(output.clone().into_os_string());

        Some(CaptureCommand {
            program: self.ffmpeg_binary.clone(),
            args,
            output,
        })
    }

    /// 按顺序截取每个时间点的帧
    ///
    /// 遇到第一个失败就停止，错误里带有之前已经完成的截帧。
    pub async fn capture_frames(&self, offsets: &[f64]) -> Result<Vec<FrameCapture>, CaptureError> {
        let mut captures = Vec::with_capacity(offsets.len());
        if offsets.is_empty() {
            return Ok(captures);
        }

        std::fs::create_dir_all(&self.output_dir).map_err(|source| CaptureError::OutputDir {
            path: self.output_dir.clone(),
            source,
        })?;

        for &offset in offsets {
            let Some(command) = self.capture_command(offset) else {
                return Err(CaptureError::InvalidOffset {
                    offset,
                    captured: captures,
                });
            };

            info!("📸 [截帧] 正在截取: {}", command.output.display());
            debug!("执行: {} {:?}", command.program.display(), command.args);

            let status = match Command::new(&command.program)
                .args(&command.args)
                .status()
                .await
            {
                Ok(status) => status,
                Err(source) => {
                    return Err(CaptureError::Spawn {
                        offset,
                        source,
                        captured: captures,
                    })
                }
            };

            if !status.success() {
                return Err(CaptureError::ToolFailed {
                    offset,
                    status,
                    captured: captures,
                });
            }

            captures.push(FrameCapture {
                offset,
                path: command.output,
            });
        }

        Ok(captures)
    }
}

/// 时间偏移的文本形式，用作 ffmpeg 的 `-ss` 参数和图片文件名
///
/// 使用最短的可还原十进制表示（不用科学计数法），并且总带小数部分（`5.0`、`0.661993`）。
/// NaN、无穷大和负数没有合法的文件名，返回 `None`。
pub fn offset_label(offset: f64) -> Option<String> {
    if !offset.is_finite() || offset < 0.0 {
        return None;
    }
    let mut label = offset.to_string();
    if !label.contains('.') {
        label.push_str(".0");
    }
    Some(label)
}
