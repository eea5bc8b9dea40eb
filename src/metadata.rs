use serde::{Deserialize, Serialize};

use crate::frame_extractor::FrameCapture;

/// 标注结果：检测到人物的时间偏移（秒），升序且去重
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationResult {
    pub person: Vec<f64>,
}

impl AnnotationResult {
    /// 排序并去重后构造
    pub fn from_offsets(mut offsets: Vec<f64>) -> Self {
        offsets.sort_by(f64::total_cmp);
        offsets.dedup();
        Self { person: offsets }
    }
}

/// 一次运行的最终输出，也是上传到 GCS 的 JSON 内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultBundle {
    /// 人物出现的时间偏移（秒）
    pub person: Vec<f64>,
    /// 截取的帧图片文件名（不含目录）
    pub frame_images: Vec<String>,
}

impl ResultBundle {
    pub fn new(result: AnnotationResult, captures: &[FrameCapture]) -> Self {
        Self {
            person: result.person,
            frame_images: captures.iter().map(FrameCapture::file_name).collect(),
        }
    }
}
