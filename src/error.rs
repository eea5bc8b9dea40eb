use std::path::PathBuf;
use std::time::Duration;

use crate::frame_extractor::FrameCapture;

/// 视频标注阶段的错误
#[derive(Debug, thiserror::Error)]
pub enum AnnotationError {
    /// 长任务在限定时间内没有完成
    #[error("视频标注任务超时: operation={operation}, 等待 {}s", .timeout.as_secs_f64())]
    Timeout { operation: String, timeout: Duration },

    /// 服务端报告任务失败
    #[error("视频标注任务失败: code={code}, message={message}")]
    OperationFailed { code: i32, message: String },

    #[error("Video Intelligence 返回错误状态: HTTP {status} - {body}")]
    Http { status: u16, body: String },

    #[error("标注结果为空: 没有 annotationResults")]
    EmptyResponse,

    #[error("请求 Video Intelligence 失败: {0}")]
    Request(#[from] reqwest::Error),

    #[error("解析标注结果失败: {0}")]
    InvalidResponse(String),
}

/// 截帧阶段的错误
///
/// 每个变体都带上出错前已经完成的截帧结果，调用方不会丢失部分成果。
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// 时间偏移无法转换成输出文件名（NaN、无穷大或负数）
    #[error("无效的时间偏移: {offset}")]
    InvalidOffset {
        offset: f64,
        captured: Vec<FrameCapture>,
    },

    #[error("创建截帧输出目录失败: {}: {source}", .path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("启动 ffmpeg 失败 (offset={offset}): {source}")]
    Spawn {
        offset: f64,
        #[source]
        source: std::io::Error,
        captured: Vec<FrameCapture>,
    },

    /// ffmpeg 以非零状态退出
    #[error("ffmpeg 截帧失败 (offset={offset}): {status}")]
    ToolFailed {
        offset: f64,
        status: std::process::ExitStatus,
        captured: Vec<FrameCapture>,
    },
}

impl CaptureError {
    /// 出错前已经成功截取的帧
    pub fn captured(&self) -> &[FrameCapture] {
        match self {
            CaptureError::InvalidOffset { captured, .. }
            | CaptureError::Spawn { captured, .. }
            | CaptureError::ToolFailed { captured, .. } => captured,
            CaptureError::OutputDir { .. } => &[],
        }
    }
}
