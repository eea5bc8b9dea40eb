use serde::{Deserialize, Serialize};

/// videos:annotate 请求体
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotateVideoRequest {
    /// 视频地址，格式 gs://{bucket}/{object}
    pub input_uri: String,
    pub features: Vec<String>,
    pub video_context: VideoContext,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoContext {
    pub label_detection_config: LabelDetectionConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelDetectionConfig {
    pub label_detection_mode: String,
}

impl AnnotateVideoRequest {
    /// 帧级别标签检测（SHOT_AND_FRAME_MODE）
    pub fn label_detection(input_uri: impl Into<String>) -> Self {
        Self {
            input_uri: input_uri.into(),
            features: vec!["LABEL_DETECTION".to_string()],
            video_context: VideoContext {
                label_detection_config: LabelDetectionConfig {
                    label_detection_mode: "SHOT_AND_FRAME_MODE".to_string(),
                },
            },
        }
    }
}

/// 长任务（google.longrunning.Operation）
#[derive(Debug, Clone, Deserialize)]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    pub response: Option<AnnotateVideoResponse>,
    pub error: Option<Status>,
}

/// 任务失败时的状态
#[derive(Debug, Clone, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotateVideoResponse {
    #[serde(default)]
    pub annotation_results: Vec<VideoAnnotationResults>,
}

/// 单个视频的标注结果，这里只关心帧级别标签
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoAnnotationResults {
    pub input_uri: Option<String>,
    #[serde(default)]
    pub frame_label_annotations: Vec<LabelAnnotation>,
    pub error: Option<Status>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelAnnotation {
    pub entity: Option<Entity>,
    #[serde(default)]
    pub category_entities: Vec<Entity>,
    #[serde(default)]
    pub frames: Vec<LabelFrame>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub entity_id: Option<String>,
    #[serde(default)]
    pub description: String,
    pub language_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelFrame {
    #[serde(default)]
    pub time_offset: TimeOffset,
    #[serde(default)]
    pub confidence: f32,
}

/// 相对视频开头的时间偏移（protobuf Duration）
///
/// JSON 中通常是 `"1.787127s"` 这样的字符串，也兼容 `{"seconds": .., "nanos": ..}`。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawTimeOffset")]
pub struct TimeOffset {
    pub seconds: i64,
    pub nanos: i32,
}

impl TimeOffset {
    pub fn as_secs_f64(&self) -> f64 {
        self.seconds as f64 + self.nanos as f64 / 1e9
    }
}

impl std::str::FromStr for TimeOffset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .trim()
            .strip_suffix('s')
            .ok_or_else(|| format!("时间偏移缺少 s 后缀: {}", s))?;

        // 负数时 seconds 和 nanos 同号
        let (negative, value) = match value.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, value),
        };

        let (whole, fraction) = value.split_once('.').unwrap_or((value, ""));
        if whole.is_empty() || !whole.chars().all(|c| c.is_ascii_digit()) {
            return Err(format!("无法解析时间偏移秒数: {}", s));
        }
        let seconds: i64 = whole
            .parse()
            .map_err(|_| format!("无法解析时间偏移秒数: {}", s))?;

        if fraction.len() > 9 || !fraction.chars().all(|c| c.is_ascii_digit()) {
            return Err(format!("无法解析时间偏移小数部分: {}", s));
        }
        let nanos = if fraction.is_empty() {
            0
        } else {
            format!("{:0<9}", fraction)
                .parse::<i32>()
                .map_err(|_| format!("无法解析时间偏移小数部分: {}", s))?
        };

        if negative {
            Ok(Self {
                seconds: -seconds,
                nanos: -nanos,
            })
        } else {
            Ok(Self { seconds, nanos })
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimeOffset {
    Text(String),
    Parts {
        #[serde(default)]
        seconds: Option<RawSeconds>,
        #[serde(default)]
        nanos: i32,
    },
}

// int64 在 proto3 JSON 中会被编码成字符串
#[derive(Deserialize)]
#[serde(untagged)]
enum RawSeconds {
    Number(i64),
    Text(String),
}

impl TryFrom<RawTimeOffset> for TimeOffset {
    type Error = String;

    fn try_from(raw: RawTimeOffset) -> Result<Self, Self::Error> {
        match raw {
            RawTimeOffset::Text(text) => text.parse(),
            RawTimeOffset::Parts { seconds, nanos } => {
                let seconds = match seconds {
                    None => 0,
                    Some(RawSeconds::Number(n)) => n,
                    Some(RawSeconds::Text(t)) => t
                        .parse()
                        .map_err(|_| format!("无法解析时间偏移秒数: {}", t))?,
                };
                Ok(Self { seconds, nanos })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_strings() {
        let offset: TimeOffset = "1.787127s".parse().unwrap();
        assert_eq!(offset, TimeOffset { seconds: 1, nanos: 787_127_000 });
        assert_eq!(offset.as_secs_f64(), 1.787127);

        let whole: TimeOffset = "12s".parse().unwrap();
        assert_eq!(whole, TimeOffset { seconds: 12, nanos: 0 });

        let negative: TimeOffset = "-0.5s".parse().unwrap();
        assert_eq!(negative, TimeOffset { seconds: 0, nanos: -500_000_000 });
        assert_eq!(negative.as_secs_f64(), -0.5);
        let negative: TimeOffset = "-1.5s".parse().unwrap();
        assert_eq!(negative, TimeOffset { seconds: -1, nanos: -500_000_000 });
        assert_eq!(negative.as_secs_f64(), -1.5);

        assert!("--1s".parse::<TimeOffset>().is_err());
        assert!("+1s".parse::<TimeOffset>().is_err());
        assert!(".5s".parse::<TimeOffset>().is_err());
        assert!("1.5".parse::<TimeOffset>().is_err());
        assert!("abc s".parse::<TimeOffset>().is_err());
        assert!("1.0000000001s".parse::<TimeOffset>().is_err());
    }

    #[test]
    fn test_deserialize_both_wire_forms() {
        let text: TimeOffset = serde_json::from_str(r#""0.661993s""#).unwrap();
        assert_eq!(text.as_secs_f64(), 0.661993);

        let parts: TimeOffset =
            serde_json::from_str(r#"{"seconds": "3", "nanos": 656487000}"#).unwrap();
        assert_eq!(parts, TimeOffset { seconds: 3, nanos: 656_487_000 });

        let numeric: TimeOffset = serde_json::from_str(r#"{"seconds": 5}"#).unwrap();
        assert_eq!(numeric, TimeOffset { seconds: 5, nanos: 0 });

        // 偏移为 0 时服务端会省略字段
        let frame: LabelFrame = serde_json::from_str(r#"{"confidence": 0.9}"#).unwrap();
        assert_eq!(frame.time_offset, TimeOffset::default());
    }

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(AnnotateVideoRequest::label_detection("gs://bucket/clip.mp4"))
            .unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "inputUri": "gs://bucket/clip.mp4",
                "features": ["LABEL_DETECTION"],
                "videoContext": {
                    "labelDetectionConfig": {"labelDetectionMode": "SHOT_AND_FRAME_MODE"}
                }
            })
        );
    }
}
