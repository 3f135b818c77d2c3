//! Ingestion 错误类型

use attacher::AttachmentError;
use thiserror::Error;

/// 单通道处理失败，只影响本周期该通道
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 通道未挂载或拷贝失败
    #[error(transparent)]
    Attachment(#[from] AttachmentError),

    /// 缓冲区长度与通道布局不符
    #[error("buffer for {channel_id} has {actual} bytes, layout needs {expected}")]
    BufferSize {
        /// 通道 ID
        channel_id: String,
        expected: usize,
        actual: usize,
    },

    /// 通道布局无法编码
    #[error("unsupported layout for {channel_id}: {message}")]
    UnsupportedLayout {
        /// 通道 ID
        channel_id: String,
        /// 错误消息
        message: String,
    },

    /// JPEG 编码失败
    #[error("failed to encode {channel_id}: {message}")]
    Encode {
        /// 通道 ID
        channel_id: String,
        /// 错误消息
        message: String,
    },
}

impl IngestionError {
    pub fn encode(channel_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Encode {
            channel_id: channel_id.into(),
            message: message.into(),
        }
    }

    pub fn unsupported_layout(channel_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UnsupportedLayout {
            channel_id: channel_id.into(),
            message: message.into(),
        }
    }

    /// Metrics label
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Attachment(e) => e.reason(),
            Self::BufferSize { .. } => "buffer_size",
            Self::UnsupportedLayout { .. } => "unsupported_layout",
            Self::Encode { .. } => "encode",
        }
    }
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
