pub mod annotation;
pub mod config;
pub mod credentials;
pub mod error;
pub mod frame_extractor;
pub mod gcs_client;
pub mod metadata;
pub mod operation;
pub mod pipeline;
pub mod uploader;

pub use annotation::{AnnotationClient, PERSON_LABEL};
pub use config::{ConfigLoader, PartialConfig, PipelineConfig};
pub use credentials::GcpCredentials;
pub use error::{AnnotationError, CaptureError};
pub use frame_extractor::{FrameCapture, FrameExtractor};
pub use gcs_client::GcsClient;
pub use metadata::{AnnotationResult, ResultBundle};
pub use pipeline::PersonFramePipeline;
pub use uploader::{ResultUploader, RESULT_FILE_NAME};
