use anyhow::{Context, Result};

/// Google Cloud 访问凭证
///
/// 只使用 OAuth access token，通过环境变量提供：
/// - GOOGLE_OAUTH_ACCESS_TOKEN（例如 `gcloud auth print-access-token` 的输出）
#[derive(Clone)]
pub struct GcpCredentials {
    access_token: String,
}

impl GcpCredentials {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }

    /// 从环境变量读取凭证
    pub fn from_env() -> Result<Self> {
        let access_token = std::env::var("GOOGLE_OAUTH_ACCESS_TOKEN")
            .context("未找到 GOOGLE_OAUTH_ACCESS_TOKEN 环境变量")?;
        let access_token = access_token.trim();
        if access_token.is_empty() {
            anyhow::bail!("GOOGLE_OAUTH_ACCESS_TOKEN 为空");
        }
        Ok(Self::new(access_token))
    }

    /// Authorization 请求头的值
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

// token 不进日志
impl std::fmt::Debug for GcpCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcpCredentials")
            .field("access_token", &"***")
            .finish()
    }
}
