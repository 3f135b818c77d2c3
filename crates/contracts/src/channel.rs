//! ChannelDescriptor - 共享内存通道描述
//!
//! 生产者与桥接端通过 `(region, shape, element, byte_size)` 线下约定布局。

use serde::{Deserialize, Serialize};

use crate::ChannelId;

/// 单个元素的二进制布局
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementLayout {
    /// 8-bit 无符号整数 (彩色图像)
    U8,
    /// 32-bit 浮点 (深度图, 单位: 米)
    F32,
}

impl ElementLayout {
    /// 元素字节数
    pub const fn size_bytes(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::F32 => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::U8 => "u8",
            Self::F32 => "f32",
        }
    }
}

/// 通道内容类型，决定编码路径
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// RGB / Gray / RGBA 图像，直接 JPEG 编码
    Color,
    /// 深度图，先裁剪归一化为 8-bit 灰度再编码
    Depth,
}

impl ChannelKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Color => "color",
            Self::Depth => "depth",
        }
    }
}

/// 深度裁剪范围 (米)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepthRange {
    pub min: f32,
    pub max: f32,
}

impl Default for DepthRange {
    fn default() -> Self {
        Self { min: 0.1, max: 2.0 }
    }
}

/// 通道描述，启动时确定，运行期不可变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelDescriptor {
    /// 通道 ID (e.g., "mobile_rgb")
    pub id: ChannelId,

    /// 共享内存区域名称 (e.g., "shm_mobile_rgb")
    pub region: String,

    /// 形状: `[height, width]` 或 `[height, width, components]`
    pub shape: Vec<usize>,

    /// 元素布局
    #[serde(default = "default_element")]
    pub element: ElementLayout,

    /// 内容类型
    #[serde(default = "default_kind")]
    pub kind: ChannelKind,

    /// 深度裁剪范围 (仅 depth 通道)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth_range: Option<DepthRange>,
}

fn default_element() -> ElementLayout {
    ElementLayout::U8
}

fn default_kind() -> ChannelKind {
    ChannelKind::Color
}

impl ChannelDescriptor {
    /// Three-component u8 color channel backed by region `shm_<id>`.
    pub fn color(id: &str, height: usize, width: usize) -> Self {
        Self {
            id: id.into(),
            region: format!("shm_{id}"),
            shape: vec![height, width, 3],
            element: ElementLayout::U8,
            kind: ChannelKind::Color,
            depth_range: None,
        }
    }

    /// Single-component f32 depth channel backed by region `shm_<id>`.
    pub fn depth(id: &str, height: usize, width: usize, range: DepthRange) -> Self {
        Self {
            id: id.into(),
            region: format!("shm_{id}"),
            shape: vec![height, width],
            element: ElementLayout::F32,
            kind: ChannelKind::Depth,
            depth_range: Some(range),
        }
    }

    /// `product(shape) * element size`
    pub fn byte_size(&self) -> usize {
        self.element_count() * self.element.size_bytes()
    }

    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn height(&self) -> usize {
        self.shape.first().copied().unwrap_or(0)
    }

    pub fn width(&self) -> usize {
        self.shape.get(1).copied().unwrap_or(0)
    }

    /// Components per pixel (1 when the shape is two-dimensional).
    pub fn components(&self) -> usize {
        self.shape.get(2).copied().unwrap_or(1)
    }

    pub fn effective_depth_range(&self) -> DepthRange {
        self.depth_range.unwrap_or_default()
    }
}
