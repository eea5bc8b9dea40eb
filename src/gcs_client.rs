use anyhow::{Context, Result};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::Client;
use std::fs;
use std::path::Path;

use crate::credentials::GcpCredentials;

/// GCS 客户端，用于上传文件
///
/// 使用 JSON API 的 media 上传（uploadType=media），单次请求上传整个文件。
pub struct GcsClient {
    client: Client,
    endpoint: String,
    credentials: GcpCredentials,
}

impl GcsClient {
    /// 创建新的 GCS 客户端
    ///
    /// # 参数
    /// - `endpoint`: GCS 地址（例如：https://storage.googleapis.com）
    /// - `credentials`: OAuth 凭证
    pub fn new(endpoint: &str, credentials: GcpCredentials) -> Result<Self> {
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(300))
                .build()
                .context("创建 HTTP 客户端失败")?,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    /// 构建上传 URL
    fn build_upload_url(&self, bucket: &str, object_name: &str) -> String {
        // 对象名作为查询参数，路径分隔符也要编码
        format!(
            "{}/upload/storage/v1/b/{}/o?uploadType=media&name={}",
            self.endpoint,
            utf8_percent_encode(bucket, NON_ALPHANUMERIC),
            utf8_percent_encode(object_name, NON_ALPHANUMERIC)
        )
    }

    /// 上传文件到 GCS
    ///
    /// # 参数
    /// - `bucket`: GCS bucket 名称
    /// - `object_name`: 对象名（文件路径）
    /// - `file_path`: 本地文件路径
    pub async fn upload_file(
        &self,
        bucket: &str,
        object_name: &str,
        file_path: impl AsRef<Path>,
    ) -> Result<()> {
        let file_path = file_path.as_ref();

        // 检查文件是否存在
        if !file_path.exists() {
            anyhow::bail!("文件不存在: {}", file_path.display());
        }

        tracing::info!(
            "正在上传文件到 GCS: {} -> bucket={}, name={}",
            file_path.display(),
            bucket,
            object_name
        );

        // 读取文件内容
        let file_content = fs::read(file_path)
            .with_context(|| format!("读取文件失败: {}", file_path.display()))?;

        let url = self.build_upload_url(bucket, object_name);

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.credentials.bearer())
            .header("Content-Type", guess_content_type(object_name))
            .body(file_content)
            .send()
            .await
            .context("上传文件失败")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("上传文件失败: HTTP {} - {}", status, error_text);
        }

        tracing::info!("文件已上传到 GCS: bucket={}, name={}", bucket, object_name);

        Ok(())
    }
}

/// 根据文件扩展名猜测 Content-Type
pub fn guess_content_type(object_name: &str) -> &'static str {
    let ext = Path::new(object_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "json" => "application/json",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}
