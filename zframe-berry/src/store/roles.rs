//! 图像角色.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// 图像在一次穿刺流程中的角色.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ImageRole {
    /// 未分配.
    #[default]
    NotAssigned,

    /// 标定图像, 包含 Z-frame.
    Calibration,

    /// 规划图像.
    Planning,

    /// 确认图像.
    Confirmation,
}

impl ImageRole {
    /// 全部角色.
    pub const ALL: [ImageRole; 4] = [
        Self::NotAssigned,
        Self::Calibration,
        Self::Planning,
        Self::Confirmation,
    ];

    /// 显示用的标签.
    pub fn label(&self) -> &'static str {
        match self {
            Self::NotAssigned => "N/A",
            Self::Calibration => "CALIBRATION",
            Self::Planning => "PLANNING",
            Self::Confirmation => "CONFIRMATION",
        }
    }

    /// 由图像名称推断角色: 含 `Template` 为标定图像, 含 `cover` 为规划图像, 否则未分配.
    pub fn from_name(name: &str) -> Self {
        if name.contains("Template") {
            Self::Calibration
        } else if name.contains("cover") {
            Self::Planning
        } else {
            Self::NotAssigned
        }
    }

    /// 该角色是否同一时刻只能属于一幅图像.
    #[inline]
    pub fn is_exclusive(&self) -> bool {
        matches!(self, Self::Calibration | Self::Planning)
    }
}

impl Display for ImageRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// 无法识别的角色标签.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRoleError(pub String);

impl Display for ParseRoleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown image role `{}`", self.0)
    }
}

impl std::error::Error for ParseRoleError {}

impl FromStr for ImageRole {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseRoleError(s.to_string()))
    }
}
