use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_ANNOTATION_ENDPOINT: &str = "https://videointelligence.googleapis.com";
pub const DEFAULT_STORAGE_ENDPOINT: &str = "https://storage.googleapis.com";

/// 运行配置，构造时传入各个组件
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// GCS bucket，视频和结果都在这里
    pub gcs_bucket: String,
    /// bucket 中的视频对象名，同时也是本地视频文件名
    pub video_name: String,
    /// 本地视频所在目录
    pub local_video_folder: PathBuf,
    /// 本地临时目录，截帧图片和结果 JSON 写在这里
    pub local_tmp_folder: PathBuf,
    /// 截帧子目录，也是上传图片的对象前缀
    pub video_frames_folder: String,
    /// 结果 JSON 子目录，也是上传 JSON 的对象前缀
    pub video_frames_json: String,
    /// 是否上传结果到 GCS
    pub upload_enabled: bool,
    /// 等待标注任务完成的最长时间
    pub annotation_timeout: Duration,
    /// 标注任务轮询间隔
    pub poll_interval: Duration,
    pub ffmpeg_binary: PathBuf,
    pub annotation_endpoint: String,
    pub storage_endpoint: String,
    /// 日志级别（trace, debug, info, warn, error）
    pub log_level: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            gcs_bucket: String::new(),
            video_name: String::new(),
            local_video_folder: PathBuf::from("/tmp/videos"),
            local_tmp_folder: PathBuf::from("/tmp/videos/tmp"),
            video_frames_folder: "frames".to_string(),
            video_frames_json: "frames_json".to_string(),
            upload_enabled: false,
            annotation_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_millis(5000),
            ffmpeg_binary: PathBuf::from("ffmpeg"),
            annotation_endpoint: DEFAULT_ANNOTATION_ENDPOINT.to_string(),
            storage_endpoint: DEFAULT_STORAGE_ENDPOINT.to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl PipelineConfig {
    /// 提交给 Video Intelligence 的视频地址
    pub fn input_uri(&self) -> String {
        format!("gs://{}/{}", self.gcs_bucket, self.video_name)
    }

    pub fn local_video_path(&self) -> PathBuf {
        self.local_video_folder.join(&self.video_name)
    }

    /// 截帧输出目录
    pub fn frames_dir(&self) -> PathBuf {
        self.local_tmp_folder.join(&self.video_frames_folder)
    }

    /// 结果 JSON 的本地目录
    pub fn frames_json_dir(&self) -> PathBuf {
        self.local_tmp_folder.join(&self.video_frames_json)
    }
}

/// 来自单一来源（命令行、环境变量或配置文件）的部分配置
#[derive(Debug, Clone, Default)]
pub struct PartialConfig {
    pub gcs_bucket: Option<String>,
    pub video_name: Option<String>,
    pub local_video_folder: Option<PathBuf>,
    pub local_tmp_folder: Option<PathBuf>,
    pub video_frames_folder: Option<String>,
    pub video_frames_json: Option<String>,
    pub upload_enabled: Option<bool>,
    pub annotation_timeout_secs: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub ffmpeg_binary: Option<PathBuf>,
    pub annotation_endpoint: Option<String>,
    pub storage_endpoint: Option<String>,
    pub log_level: Option<String>,
}

impl PartialConfig {
    /// 字段级合并，self 优先
    pub fn or(self, fallback: PartialConfig) -> PartialConfig {
        PartialConfig {
            gcs_bucket: self.gcs_bucket.or(fallback.gcs_bucket),
            video_name: self.video_name.or(fallback.video_name),
            local_video_folder: self.local_video_folder.or(fallback.local_video_folder),
            local_tmp_folder: self.local_tmp_folder.or(fallback.local_tmp_folder),
            video_frames_folder: self.video_frames_folder.or(fallback.video_frames_folder),
            video_frames_json: self.video_frames_json.or(fallback.video_frames_json),
            upload_enabled: self.upload_enabled.or(fallback.upload_enabled),
            annotation_timeout_secs: self
                .annotation_timeout_secs
                .or(fallback.annotation_timeout_secs),
            poll_interval_ms: self.poll_interval_ms.or(fallback.poll_interval_ms),
            ffmpeg_binary: self.ffmpeg_binary.or(fallback.ffmpeg_binary),
            annotation_endpoint: self.annotation_endpoint.or(fallback.annotation_endpoint),
            storage_endpoint: self.storage_endpoint.or(fallback.storage_endpoint),
            log_level: self.log_level.or(fallback.log_level),
        }
    }

    /// 补上默认值并校验必填项
    pub fn into_config(self) -> Result<PipelineConfig> {
        let defaults = PipelineConfig::default();

        let gcs_bucket = self
            .gcs_bucket
            .filter(|v| !v.is_empty())
            .context("未配置 GCS bucket（[gcs] bucket 或 PERSON_FRAMES_GCS_BUCKET）")?;
        let video_name = self
            .video_name
            .filter(|v| !v.is_empty())
            .context("未配置视频名称（[gcs] video_name 或 PERSON_FRAMES_VIDEO_NAME）")?;

        let annotation_timeout = self
            .annotation_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.annotation_timeout);
        if annotation_timeout.is_zero() {
            anyhow::bail!("annotation_timeout_secs 必须大于 0");
        }
        let poll_interval = self
            .poll_interval_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.poll_interval);
        if poll_interval.is_zero() {
            anyhow::bail!("poll_interval_ms 必须大于 0");
        }

        Ok(PipelineConfig {
            gcs_bucket,
            video_name,
            local_video_folder: self.local_video_folder.unwrap_or(defaults.local_video_folder),
            local_tmp_folder: self.local_tmp_folder.unwrap_or(defaults.local_tmp_folder),
            video_frames_folder: self.video_frames_folder.unwrap_or(defaults.video_frames_folder),
            video_frames_json: self.video_frames_json.unwrap_or(defaults.video_frames_json),
            upload_enabled: self.upload_enabled.unwrap_or(defaults.upload_enabled),
            annotation_timeout,
            poll_interval,
            ffmpeg_binary: self.ffmpeg_binary.unwrap_or(defaults.ffmpeg_binary),
            annotation_endpoint: self.annotation_endpoint.unwrap_or(defaults.annotation_endpoint),
            storage_endpoint: self.storage_endpoint.unwrap_or(defaults.storage_endpoint),
            log_level: self.log_level.unwrap_or(defaults.log_level),
        })
    }
}

/// 配置加载器
pub struct ConfigLoader;

impl ConfigLoader {
    /// 从多个源加载配置，优先级：命令行参数 > 环境变量 > 配置文件 > 默认值
    pub fn load_config(config_file: Option<&Path>, overrides: PartialConfig) -> Result<PipelineConfig> {
        // 1. 配置文件：显式指定的必须能读，否则尝试默认位置
        let file_config = match config_file {
            Some(config_path) => Self::load_from_file(config_path)?,
            None => Self::load_from_default_locations()?.unwrap_or_default(),
        };

        // 2. 环境变量
        let env_config = Self::load_from_env()?;

        // 3. 合并
        overrides.or(env_config).or(file_config).into_config()
    }

    /// 从环境变量加载配置
    pub fn load_from_env() -> Result<PartialConfig> {
        Self::load_from_lookup(|key| env::var(key).ok())
    }

    /// 按 PERSON_FRAMES_* 名称查找配置，数值和开关写错时报错
    pub fn load_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<PartialConfig> {
        let get = |key: &str| lookup(&format!("PERSON_FRAMES_{}", key)).filter(|v| !v.is_empty());

        let upload_enabled = get("UPLOAD_ENABLED")
            .map(|v| {
                parse_bool(&v)
                    .with_context(|| format!("PERSON_FRAMES_UPLOAD_ENABLED 不是有效的开关: {}", v))
            })
            .transpose()?;
        let annotation_timeout_secs = get("ANNOTATION_TIMEOUT_SECS")
            .map(|v| {
                v.parse::<u64>()
                    .with_context(|| format!("PERSON_FRAMES_ANNOTATION_TIMEOUT_SECS 不是有效的秒数: {}", v))
            })
            .transpose()?;
        let poll_interval_ms = get("POLL_INTERVAL_MS")
            .map(|v| {
                v.parse::<u64>()
                    .with_context(|| format!("PERSON_FRAMES_POLL_INTERVAL_MS 不是有效的毫秒数: {}", v))
            })
            .transpose()?;

        Ok(PartialConfig {
            gcs_bucket: get("GCS_BUCKET"),
            video_name: get("VIDEO_NAME"),
            local_video_folder: get("LOCAL_VIDEO_FOLDER").map(PathBuf::from),
            local_tmp_folder: get("LOCAL_TMP_FOLDER").map(PathBuf::from),
            video_frames_folder: get("VIDEO_FRAMES_FOLDER"),
            video_frames_json: get("VIDEO_FRAMES_JSON"),
            upload_enabled,
            annotation_timeout_secs,
            poll_interval_ms,
            ffmpeg_binary: get("FFMPEG_BINARY").map(PathBuf::from),
            annotation_endpoint: get("ANNOTATION_ENDPOINT"),
            storage_endpoint: get("STORAGE_ENDPOINT"),
            log_level: get("LOG_LEVEL"),
        })
    }

    /// 从INI配置文件加载配置
    pub fn load_from_file(config_path: &Path) -> Result<PartialConfig> {
        if !config_path.exists() {
            return Err(anyhow::anyhow!("配置文件不存在: {}", config_path.display()));
        }

        let mut config_parser = configparser::ini::Ini::new();
        config_parser
            .load(config_path)
            .map_err(|e| anyhow::anyhow!("读取配置文件失败: {}: {}", config_path.display(), e))?;

        // 先读指定节，没有则使用 [DEFAULT] 节
        let get = |section: &str, key: &str| {
            config_parser
                .get(section, key)
                .or_else(|| config_parser.get("DEFAULT", key))
                .filter(|v| !v.is_empty())
        };

        let annotation_timeout_secs = match get("pipeline", "annotation_timeout_secs") {
            Some(v) => Some(v.parse().with_context(|| {
                format!("annotation_timeout_secs 不是有效的秒数: {}", v)
            })?),
            None => None,
        };
        let poll_interval_ms = match get("pipeline", "poll_interval_ms") {
            Some(v) => Some(
                v.parse()
                    .with_context(|| format!("poll_interval_ms 不是有效的毫秒数: {}", v))?,
            ),
            None => None,
        };

        let upload_enabled = match get("pipeline", "upload_enabled") {
            Some(v) => Some(
                parse_bool(&v).with_context(|| format!("upload_enabled 不是有效的开关: {}", v))?,
            ),
            None => None,
        };

        Ok(PartialConfig {
            gcs_bucket: get("gcs", "bucket"),
            video_name: get("gcs", "video_name"),
            annotation_endpoint: get("gcs", "annotation_endpoint"),
            storage_endpoint: get("gcs", "storage_endpoint"),
            local_video_folder: get("paths", "local_video_folder").map(PathBuf::from),
            local_tmp_folder: get("paths", "local_tmp_folder").map(PathBuf::from),
            video_frames_folder: get("paths", "video_frames_folder"),
            video_frames_json: get("paths", "video_frames_json"),
            upload_enabled,
            annotation_timeout_secs,
            poll_interval_ms,
            ffmpeg_binary: get("pipeline", "ffmpeg_binary").map(PathBuf::from),
            log_level: get("logging", "level"),
        })
    }

    /// 从默认位置加载配置文件，都不存在时返回 None
    fn load_from_default_locations() -> Result<Option<PartialConfig>> {
        let mut candidates = vec![
            // 1. 当前目录的 person-frames.ini
            PathBuf::from("person-frames.ini"),
            // 2. 当前目录的 .person-frames.ini
            PathBuf::from(".person-frames.ini"),
        ];
        // 3. 用户主目录的 .person-frames.ini
        if let Some(home) = env::var_os("HOME") {
            candidates.push(PathBuf::from(home).join(".person-frames.ini"));
        }
        // 4. /etc/person-frames.ini (Linux/macOS)
        candidates.push(PathBuf::from("/etc/person-frames.ini"));

        match candidates.iter().find(|path| path.exists()) {
            Some(path) => {
                tracing::debug!("使用配置文件: {}", path.display());
                Self::load_from_file(path).map(Some)
            }
            None => Ok(None),
        }
    }

    /// 创建默认配置文件
    pub fn create_default_config(config_path: &Path) -> Result<()> {
        let defaults = PipelineConfig::default();
        let mut config_parser = configparser::ini::Ini::new();

        config_parser.set("gcs", "bucket", Some(String::new()));
        config_parser.set("gcs", "video_name", Some(String::new()));
        config_parser.set("gcs", "annotation_endpoint", Some(defaults.annotation_endpoint));
        config_parser.set("gcs", "storage_endpoint", Some(defaults.storage_endpoint));
        config_parser.set(
            "paths",
            "local_video_folder",
            Some(defaults.local_video_folder.display().to_string()),
        );
        config_parser.set(
            "paths",
            "local_tmp_folder",
            Some(defaults.local_tmp_folder.display().to_string()),
        );
        config_parser.set("paths", "video_frames_folder", Some(defaults.video_frames_folder));
        config_parser.set("paths", "video_frames_json", Some(defaults.video_frames_json));
        config_parser.set("pipeline", "upload_enabled", Some(defaults.upload_enabled.to_string()));
        config_parser.set(
            "pipeline",
            "annotation_timeout_secs",
            Some(defaults.annotation_timeout.as_secs().to_string()),
        );
        config_parser.set(
            "pipeline",
            "poll_interval_ms",
            Some(defaults.poll_interval.as_millis().to_string()),
        );
        config_parser.set(
            "pipeline",
            "ffmpeg_binary",
            Some(defaults.ffmpeg_binary.display().to_string()),
        );
        config_parser.set("logging", "level", Some(defaults.log_level));

        config_parser
            .write(config_path)
            .map_err(|e| anyhow::anyhow!("写入配置文件失败: {}: {}", config_path.display(), e))?;

        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("person-frames.ini");
        std::fs::write(
            &path,
            "[gcs]\nbucket = media-bucket\nvideo_name = clip.mp4\n\n\
             [paths]\nlocal_video_folder = /data/videos\n\n\
             [pipeline]\nupload_enabled = true\nannotation_timeout_secs = 300\n",
        )
        .unwrap();

        let config = ConfigLoader::load_from_file(&path).unwrap().into_config().unwrap();
        assert_eq!(config.gcs_bucket, "media-bucket");
        assert_eq!(config.video_name, "clip.mp4");
        assert_eq!(config.local_video_folder, PathBuf::from("/data/videos"));
        assert!(config.upload_enabled);
        assert_eq!(config.annotation_timeout, Duration::from_secs(300));
        // 未设置的字段使用默认值
        assert_eq!(config.video_frames_folder, "frames");
        assert_eq!(config.poll_interval, Duration::from_millis(5000));
    }

    #[test]
    fn test_invalid_timeout_in_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.ini");
        std::fs::write(&path, "[pipeline]\nannotation_timeout_secs = soon\n").unwrap();
        assert!(ConfigLoader::load_from_file(&path).is_err());
    }

    #[test]
    fn test_priority_cli_over_env_over_file() {
        let file = PartialConfig {
            gcs_bucket: Some("file-bucket".to_string()),
            video_name: Some("file.mp4".to_string()),
            ffmpeg_binary: Some(PathBuf::from("/opt/ffmpeg")),
            ..Default::default()
        };
        let vars: HashMap<&str, &str> = [
            ("PERSON_FRAMES_GCS_BUCKET", "env-bucket"),
            ("PERSON_FRAMES_VIDEO_NAME", "env.mp4"),
            ("PERSON_FRAMES_UPLOAD_ENABLED", "yes"),
        ]
        .into_iter()
        .collect();
        let env = ConfigLoader::load_from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();
        let cli = PartialConfig {
            video_name: Some("cli.mp4".to_string()),
            ..Default::default()
        };

        let config = cli.or(env).or(file).into_config().unwrap();
        assert_eq!(config.video_name, "cli.mp4");
        assert_eq!(config.gcs_bucket, "env-bucket");
        assert!(config.upload_enabled);
        assert_eq!(config.ffmpeg_binary, PathBuf::from("/opt/ffmpeg"));
        assert_eq!(config.input_uri(), "gs://env-bucket/cli.mp4");
    }

    #[test]
    fn test_invalid_env_values_are_errors() {
        let lookup = |vars: HashMap<&'static str, &'static str>| {
            ConfigLoader::load_from_lookup(move |key| vars.get(key).map(|v| v.to_string()))
        };

        let err = lookup([("PERSON_FRAMES_ANNOTATION_TIMEOUT_SECS", "soon")].into_iter().collect())
            .unwrap_err();
        assert!(err.to_string().contains("PERSON_FRAMES_ANNOTATION_TIMEOUT_SECS"));

        let err = lookup([("PERSON_FRAMES_POLL_INTERVAL_MS", "-5")].into_iter().collect())
            .unwrap_err();
        assert!(err.to_string().contains("PERSON_FRAMES_POLL_INTERVAL_MS"));

        let err = lookup([("PERSON_FRAMES_UPLOAD_ENABLED", "maybe")].into_iter().collect())
            .unwrap_err();
        assert!(err.to_string().contains("PERSON_FRAMES_UPLOAD_ENABLED"));

        // 空值等同于未设置
        let partial = lookup([("PERSON_FRAMES_ANNOTATION_TIMEOUT_SECS", "")].into_iter().collect())
            .unwrap();
        assert!(partial.annotation_timeout_secs.is_none());
    }

    #[test]
    fn test_invalid_upload_flag_in_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.ini");
        std::fs::write(&path, "[pipeline]\nupload_enabled = maybe\n").unwrap();
        let err = ConfigLoader::load_from_file(&path).unwrap_err();
        assert!(err.to_string().contains("upload_enabled"));
    }

    #[test]
    fn test_zero_durations_are_rejected() {
        let base = || PartialConfig {
            gcs_bucket: Some("bucket".to_string()),
            video_name: Some("clip.mp4".to_string()),
            ..Default::default()
        };

        let err = PartialConfig {
            poll_interval_ms: Some(0),
            ..base()
        }
        .into_config()
        .unwrap_err();
        assert!(err.to_string().contains("poll_interval_ms"));

        let err = PartialConfig {
            annotation_timeout_secs: Some(0),
            ..base()
        }
        .into_config()
        .unwrap_err();
        assert!(err.to_string().contains("annotation_timeout_secs"));

        let config = PartialConfig {
            poll_interval_ms: Some(1),
            ..base()
        }
        .into_config()
        .unwrap();
        assert_eq!(config.poll_interval, Duration::from_millis(1));
    }

    #[test]
    fn test_bucket_and_video_are_required() {
        let err = PartialConfig {
            video_name: Some("clip.mp4".to_string()),
            ..Default::default()
        }
        .into_config()
        .unwrap_err();
        assert!(err.to_string().contains("bucket"));

        let err = PartialConfig {
            gcs_bucket: Some("bucket".to_string()),
            video_name: Some(String::new()),
            ..Default::default()
        }
        .into_config()
        .unwrap_err();
        assert!(err.to_string().contains("视频名称"));
    }

    #[test]
    fn test_default_config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("person-frames.ini");
        ConfigLoader::create_default_config(&path).unwrap();

        let partial = ConfigLoader::load_from_file(&path).unwrap();
        // 模板里 bucket 和 video_name 为空，需要用户填写
        assert!(partial.gcs_bucket.is_none());
        let config = PartialConfig {
            gcs_bucket: Some("bucket".to_string()),
            video_name: Some("clip.mp4".to_string()),
            ..Default::default()
        }
        .or(partial)
        .into_config()
        .unwrap();
        assert!(!config.upload_enabled);
        assert_eq!(config.annotation_timeout, Duration::from_secs(120));
        assert_eq!(config.frames_dir(), PathBuf::from("/tmp/videos/tmp/frames"));
        assert_eq!(config.frames_json_dir(), PathBuf::from("/tmp/videos/tmp/frames_json"));
    }
}
