use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::credentials::GcpCredentials;
use crate::error::AnnotationError;
use crate::metadata::AnnotationResult;
use crate::operation::{AnnotateVideoRequest, Operation, VideoAnnotationResults};

/// 目标标签，匹配 category entity 的 description
pub const PERSON_LABEL: &str = "person";

/// Video Intelligence 客户端
///
/// 提交帧级别标签检测任务，轮询直到完成，然后取出人物出现的时间偏移。
pub struct AnnotationClient {
    client: Client,
    endpoint: String,
    credentials: GcpCredentials,
    /// 等待长任务完成的最长时间
    timeout: Duration,
    poll_interval: Duration,
}

impl AnnotationClient {
    pub fn new(config: &PipelineConfig, credentials: GcpCredentials) -> Result<Self, AnnotationError> {
        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()?,
            endpoint: config.annotation_endpoint.trim_end_matches('/').to_string(),
            credentials,
            timeout: config.annotation_timeout,
            poll_interval: config.poll_interval,
        })
    }

    /// 标注视频并返回人物出现的时间偏移
    ///
    /// 任务在 `timeout` 内没有完成时返回 [`AnnotationError::Timeout`]，不重试。
    pub async fn annotate(&self, input_uri: &str) -> Result<AnnotationResult, AnnotationError> {
        let operation = self.submit(input_uri).await?;
        let name = operation.name.clone();
        info!("⏳ [视频标注] 任务已提交: {}", name);

        let finished = match tokio::time::timeout(self.timeout, self.wait_for(operation)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(AnnotationError::Timeout {
                    operation: name,
                    timeout: self.timeout,
                })
            }
        };

        let results = finished
            .response
            .and_then(|r| r.annotation_results.into_iter().next())
            .ok_or(AnnotationError::EmptyResponse)?;

        if let Some(status) = &results.error {
            return Err(AnnotationError::OperationFailed {
                code: status.code,
                message: status.message.clone(),
            });
        }

        Ok(person_offsets(&results))
    }

    async fn submit(&self, input_uri: &str) -> Result<Operation, AnnotationError> {
        let url = format!("{}/v1/videos:annotate", self.endpoint);
        let response = self
            .client
            .post(&url)
            .header("Authorization", self.credentials.bearer())
            .json(&AnnotateVideoRequest::label_detection(input_uri))
            .send()
            .await?;

        Self::parse_operation(response).await
    }

    async fn wait_for(&self, mut operation: Operation) -> Result<Operation, AnnotationError> {
        let name = operation.name.clone();
        let url = format!("{}/v1/{}", self.endpoint, name);

        loop {
            if operation.done {
                if let Some(status) = operation.error {
                    return Err(AnnotationError::OperationFailed {
                        code: status.code,
                        message: status.message,
                    });
                }
                return Ok(operation);
            }

            tokio::time::sleep(self.poll_interval).await;
            debug!("轮询标注任务: {}", name);

            let response = self
                .client
                .get(&url)
                .header("Authorization", self.credentials.bearer())
                .send()
                .await?;
            operation = Self::parse_operation(response).await?;
        }
    }

    async fn parse_operation(response: reqwest::Response) -> Result<Operation, AnnotationError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnnotationError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| AnnotationError::InvalidResponse(e.to_string()))
    }
}

/// 每个包含 person 类别的帧标签组只取第一帧的时间偏移
pub fn person_offsets(results: &VideoAnnotationResults) -> AnnotationResult {
    let mut offsets = Vec::new();

    for label in &results.frame_label_annotations {
        let is_person = label
            .category_entities
            .iter()
            .any(|category| category.description == PERSON_LABEL);
        if !is_person {
            continue;
        }

        let Some(frame) = label.frames.first() else {
            warn!(
                "⚠️  [视频标注] 标签组没有帧信息，跳过: {}",
                label.entity.as_ref().map(|e| e.description.as_str()).unwrap_or("?")
            );
            continue;
        };

        let time_offset = frame.time_offset.as_secs_f64();
        info!("  • 第一帧时间偏移: {}s", time_offset);
        info!("  • 第一帧置信度: {}", frame.confidence);
        offsets.push(time_offset);
    }

    AnnotationResult::from_offsets(offsets)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> VideoAnnotationResults {
        serde_json::from_value(serde_json::json!({
            "inputUri": "/bucket/clip.mp4",
            "frameLabelAnnotations": [
                {
                    "entity": {"description": "man"},
                    "categoryEntities": [{"description": "person"}],
                    "frames": [
                        {"timeOffset": "1.787127s", "confidence": 0.81},
                        {"timeOffset": "2.5s", "confidence": 0.77}
                    ]
                },
                {
                    "entity": {"description": "car"},
                    "categoryEntities": [{"description": "vehicle"}],
                    "frames": [{"timeOffset": "0.2s", "confidence": 0.9}]
                },
                {
                    "entity": {"description": "woman"},
                    "categoryEntities": [{"description": "person"}],
                    "frames": [{"timeOffset": "0.661993s", "confidence": 0.66}]
                },
                {
                    "entity": {"description": "face"},
                    "categoryEntities": [{"description": "body part"}, {"description": "person"}],
                    "frames": [{"timeOffset": "0.661993s", "confidence": 0.5}]
                },
                {
                    "entity": {"description": "crowd"},
                    "categoryEntities": [{"description": "person"}],
                    "frames": []
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_person_offsets_first_frame_sorted_unique() {
        let result = person_offsets(&fixture());
        assert_eq!(result.person, vec![0.661993, 1.787127]);
    }

    #[test]
    fn test_category_match_is_exact() {
        let results: VideoAnnotationResults = serde_json::from_value(serde_json::json!({
            "frameLabelAnnotations": [{
                "entity": {"description": "person"},
                "categoryEntities": [{"description": "Person"}, {"description": "persons"}],
                "frames": [{"timeOffset": "1s", "confidence": 0.9}]
            }]
        }))
        .unwrap();
        assert!(person_offsets(&results).person.is_empty());
    }

    #[test]
    fn test_no_frame_labels() {
        let results: VideoAnnotationResults =
            serde_json::from_value(serde_json::json!({"inputUri": "/bucket/clip.mp4"})).unwrap();
        assert!(person_offsets(&results).person.is_empty());
    }
}
