//! 通用常量.

/// 单通道颜色.
pub mod gray {
    /// 掩膜中背景的体素值.
    pub const MASK_BACKGROUND: u8 = 0;

    /// 掩膜中前景 (候选 fiducial) 的体素值.
    pub const MASK_FOREGROUND: u8 = 1;

    /// 单通道黑色.
    pub const BLACK: u8 = 0b_0000_0000;

    /// 单通道白色.
    pub const WHITE: u8 = 0b_1111_1111;

    /// 体素是否是前景?
    #[inline]
    pub const fn is_foreground(p: u8) -> bool {
        matches!(p, MASK_FOREGROUND)
    }

    /// 体素是否是背景?
    #[inline]
    pub const fn is_background(p: u8) -> bool {
        matches!(p, MASK_BACKGROUND)
    }
}

/// 外部几何求解器假定的水平切片边长 (体素个数).
pub const SOLVER_SLICE_DIM: usize = 256;

/// 支持自动修复的模板的 fiducial 个数.
pub const REPAIRABLE_FIDUCIAL_COUNT: usize = 7;

/// 一次最多允许合成的 fiducial 个数. 超过该值时图像被认为不可修复.
pub const MAX_SYNTHESIZED_FIDUCIALS: usize = 2;

/// 导出到图像库的掩膜名称. 该名称的图像不会出现在图像列表中.
pub const CALIBRATION_OUT_VOLUME: &str = "CalibrationOutVolume";

/// 体素类型.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ElemType {
    /// `MASK_BACKGROUND`, 代表背景.
    Background,

    /// `MASK_FOREGROUND`, 代表前景.
    Foreground,
}

impl ElemType {
    /// 是否为前景.
    #[inline]
    pub fn is_foreground(&self) -> bool {
        matches!(self, Self::Foreground)
    }

    /// 是否为背景.
    #[inline]
    pub fn is_background(&self) -> bool {
        !self.is_foreground()
    }
}

impl From<u8> for ElemType {
    #[inline]
    fn from(value: u8) -> Self {
        if gray::is_foreground(value) {
            Self::Foreground
        } else {
            Self::Background
        }
    }
}
