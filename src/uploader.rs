use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;

use crate::config::PipelineConfig;
use crate::credentials::GcpCredentials;
use crate::frame_extractor::FrameCapture;
use crate::gcs_client::GcsClient;
use crate::metadata::ResultBundle;

/// 结果 JSON 的文件名（本地和 GCS 相同）
pub const RESULT_FILE_NAME: &str = "person_video_intelligence.json";

/// 把结果 JSON 和截帧图片上传到 GCS
///
/// 没有重试，也不保证本地写入和上传的原子性，第一个错误直接返回。
pub struct ResultUploader {
    gcs: GcsClient,
    bucket: String,
    json_dir: PathBuf,
    json_prefix: String,
    frames_prefix: String,
}

impl ResultUploader {
    pub fn new(config: &PipelineConfig, credentials: GcpCredentials) -> Result<Self> {
        Ok(Self {
            gcs: GcsClient::new(&config.storage_endpoint, credentials)?,
            bucket: config.gcs_bucket.clone(),
            json_dir: config.frames_json_dir(),
            json_prefix: config.video_frames_json.clone(),
            frames_prefix: config.video_frames_folder.clone(),
        })
    }

    /// 写入本地结果 JSON，目录不存在时创建
    pub fn write_bundle(&self, bundle: &ResultBundle) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.json_dir)
            .with_context(|| format!("创建结果目录失败: {}", self.json_dir.display()))?;

        let target_path = self.json_dir.join(RESULT_FILE_NAME);
        let json = serde_json::to_string_pretty(bundle).context("序列化结果失败")?;
        std::fs::write(&target_path, json)
            .with_context(|| format!("写入结果文件失败: {}", target_path.display()))?;

        info!("💾 [上传] 结果已保存到: {}", target_path.display());
        Ok(target_path)
    }

    /// 保存并上传结果 JSON，返回对象名
    pub async fn upload_bundle(&self, bundle: &ResultBundle) -> Result<String> {
        let local_path = self.write_bundle(bundle)?;
        let object_name = format!("{}/{}", self.json_prefix, RESULT_FILE_NAME);

        self.gcs
            .upload_file(&self.bucket, &object_name, &local_path)
            .await
            .with_context(|| format!("上传结果 JSON 失败: {}", object_name))?;

        info!("✅ [上传] 结果 JSON 已上传: {}", object_name);
        Ok(object_name)
    }

    /// 逐个上传截帧图片，返回对象名列表
    pub async fn upload_images(&self, captures: &[FrameCapture]) -> Result<Vec<String>> {
        let mut uploaded = Vec::with_capacity(captures.len());

        for capture in captures {
            let object_name = format!("{}/{}", self.frames_prefix, capture.file_name());
            self.gcs
                .upload_file(&self.bucket, &object_name, &capture.path)
                .await
                .with_context(|| format!("上传截帧失败: {}", capture.path.display()))?;
            uploaded.push(object_name);
        }

        info!("✅ [上传] 已上传 {} 张截帧", uploaded.len());
        Ok(uploaded)
    }
}
