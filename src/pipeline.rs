use anyhow::{Context, Result};
use std::time::Instant;
use tracing::{error, info};

use crate::{
    AnnotationClient, FrameExtractor, GcpCredentials, PipelineConfig, ResultBundle, ResultUploader,
};

/// 人物截帧流程：视频标注 → 截帧 →（可选）上传
pub struct PersonFramePipeline {
    config: PipelineConfig,
    annotator: AnnotationClient,
    extractor: FrameExtractor,
    /// 只有开启上传时才创建
    uploader: Option<ResultUploader>,
}

impl PersonFramePipeline {
    pub fn new(config: PipelineConfig, credentials: GcpCredentials) -> Result<Self> {
        let annotator = AnnotationClient::new(&config, credentials.clone())
            .context("创建 Video Intelligence 客户端失败")?;
        let extractor = FrameExtractor::new(&config);
        let uploader = if config.upload_enabled {
            Some(ResultUploader::new(&config, credentials).context("创建 GCS 客户端失败")?)
        } else {
            None
        };

        Ok(Self {
            config,
            annotator,
            extractor,
            uploader,
        })
    }

    /// 执行一次完整流程并返回结果
    pub async fn run(&self) -> Result<ResultBundle> {
        let total_start = Instant::now();
        let input_uri = self.config.input_uri();
        info!("🎬 [人物截帧] 开始处理视频: {}", input_uri);
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        // 1. 视频标注
        let annotate_start = Instant::now();
        info!(
            "⏳ [人物截帧] 正在等待视频标注（超时: {}s）...",
            self.config.annotation_timeout.as_secs()
        );
        let annotation = self
            .annotator
            .annotate(&input_uri)
            .await
            .map_err(|e| {
                error!("❌ [人物截帧] 视频标注失败: {}", e);
                e
            })?;
        let annotate_duration = annotate_start.elapsed();
        info!("✅ [人物截帧] 视频标注完成，耗时: {:.2}秒", annotate_duration.as_secs_f64());
        info!("  • 人物出现次数: {}", annotation.person.len());
        info!("  • 时间偏移: {:?}", annotation.person);

        // 2. 截帧
        let capture_start = Instant::now();
        info!("⏳ [人物截帧] 正在截取帧: {}", self.extractor.output_dir().display());
        let captures = self
            .extractor
            .capture_frames(&annotation.person)
            .await
            .map_err(|e| {
                error!(
                    "❌ [人物截帧] 截帧失败: {}（已完成 {} 张）",
                    e,
                    e.captured().len()
                );
                e
            })?;
        let capture_duration = capture_start.elapsed();
        info!("✅ [人物截帧] 截帧完成，耗时: {:.2}秒", capture_duration.as_secs_f64());
        info!("  • 截帧数量: {}", captures.len());

        let bundle = ResultBundle::new(annotation, &captures);

        // 3. 上传（可选）
        match &self.uploader {
            Some(uploader) => {
                let upload_start = Instant::now();
                info!("⏳ [人物截帧] 正在上传结果到 gs://{} ...", self.config.gcs_bucket);
                uploader.upload_bundle(&bundle).await?;
                uploader.upload_images(&captures).await?;
                info!(
                    "✅ [人物截帧] 上传完成，耗时: {:.2}秒",
                    upload_start.elapsed().as_secs_f64()
                );
            }
            None => info!("未开启上传，跳过"),
        }

        let total_duration = total_start.elapsed();
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!(
            "🎉 [人物截帧] 处理完成！总耗时: {:.2}秒 ({:.0}ms)",
            total_duration.as_secs_f64(),
            total_duration.as_millis()
        );

        Ok(bundle)
    }
}
