//! 模板配置文件和配准参数.

mod error;
mod frame;
mod template;

pub use error::ConfigError;
pub use frame::{FiducialBox, FiducialSpec, FrameConfig, FrameTopology};
pub use template::{TemplateGrid, DEFAULT_HOLE_OFFSET};

use crate::consts::SOLVER_SLICE_DIM;
use crate::fiducial::RepairConfig;
use crate::Connectivity;
use std::path::PathBuf;

/// 指定模板目录的环境变量.
pub const TEMPLATE_DIR_ENV: &str = "ZFRAME_TEMPLATE_DIR";

/// 获取模板目录. 优先使用环境变量 [`TEMPLATE_DIR_ENV`], 否则为 `{用户主目录}/zframe/templates`.
pub fn templates_dir() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os(TEMPLATE_DIR_ENV) {
        return Some(PathBuf::from(dir));
    }
    let mut ans = dirs::home_dir()?;
    ans.push("zframe");
    ans.push("templates");
    Some(ans)
}

/// 一次配准中可调的参数, 以及两个阈值扫描方向标记.
///
/// 每次配准开始时被重置为 [`RegistrationConfig::parameters`], 使用前总是被限制到
/// [`ParameterBounds`] 之内.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegistrationParameters {
    /// 阈值在扫描强度范围中的比例.
    pub threshold_fraction: f64,

    /// 保留岛屿的最小体素个数 (含).
    pub min_island_size: usize,

    /// 保留岛屿的最大体素个数 (不含).
    pub max_island_size: usize,

    /// 边缘区域宽度 (像素).
    pub border_margin: usize,

    /// 普通模式的阈值扫描是否已经转为递增.
    pub increasing_for_retry: bool,

    /// 修复模式的阈值扫描是否已经转为递增.
    pub increasing_for_repair: bool,
}

impl Default for RegistrationParameters {
    fn default() -> Self {
        Self {
            threshold_fraction: 0.1,
            min_island_size: 10,
            max_island_size: 5000,
            border_margin: 10,
            increasing_for_retry: false,
            increasing_for_repair: false,
        }
    }
}

impl RegistrationParameters {
    /// 将所有参数限制到 `bounds` 之内. 最大岛屿尺寸不会小于最小岛屿尺寸.
    pub fn clamped(&self, bounds: &ParameterBounds) -> Self {
        let [t_lo, t_hi] = bounds.threshold;
        let [s_lo, s_hi] = bounds.island_size;
        let [m_lo, m_hi] = bounds.border_margin;
        let threshold_fraction = if self.threshold_fraction.is_nan() {
            t_lo
        } else {
            self.threshold_fraction.clamp(t_lo, t_hi)
        };
        let min_island_size = self.min_island_size.clamp(s_lo, s_hi);
        let max_island_size = self.max_island_size.clamp(s_lo, s_hi).max(min_island_size);
        Self {
            threshold_fraction,
            min_island_size,
            max_island_size,
            border_margin: self.border_margin.clamp(m_lo, m_hi),
            ..self.clone()
        }
    }
}

/// 各参数允许的闭区间 `[下限, 上限]`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParameterBounds {
    /// 阈值比例.
    pub threshold: [f64; 2],

    /// 岛屿体素个数.
    pub island_size: [usize; 2],

    /// 边缘区域宽度.
    pub border_margin: [usize; 2],
}

impl Default for ParameterBounds {
    fn default() -> Self {
        Self {
            threshold: [0.0, 1.0],
            island_size: [1, 100_000],
            border_margin: [0, 128],
        }
    }
}

/// 阈值扫描设置.
///
/// 扫描从初始阈值开始, 按 `step` 递减直到 `floor`; 之后跳到 `初始阈值 + jump_offset`,
/// 按 `step` 递增直到 `ceiling`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SweepConfig {
    /// 递减的下限.
    pub floor: f64,

    /// 递增的上限.
    pub ceiling: f64,

    /// 步长.
    pub step: f64,

    /// 转为递增时相对初始阈值的跳跃量.
    pub jump_offset: f64,
}

impl SweepConfig {
    /// 普通模式的默认扫描. 上限为阈值比例上限的五分之一.
    pub fn retry_default() -> Self {
        Self {
            floor: 0.02,
            ceiling: ParameterBounds::default().threshold[1] / 5.0,
            step: 0.01,
            jump_offset: 0.01,
        }
    }

    /// 修复模式的默认扫描.
    pub fn repair_default() -> Self {
        Self {
            floor: 0.04,
            ceiling: 0.3,
            step: 0.02,
            jump_offset: 0.02,
        }
    }

    fn check(&self, name: &str) -> Result<(), ConfigError> {
        let all_finite = [self.floor, self.ceiling, self.step, self.jump_offset]
            .iter()
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(ConfigError::InvalidParameter(format!(
                "{name}: non-finite value"
            )));
        }
        if self.step <= 0.0 {
            return Err(ConfigError::InvalidParameter(format!(
                "{name}: step must be positive"
            )));
        }
        if self.floor > self.ceiling {
            return Err(ConfigError::InvalidParameter(format!(
                "{name}: floor above ceiling"
            )));
        }
        if self.jump_offset < 0.0 {
            return Err(ConfigError::InvalidParameter(format!(
                "{name}: negative jump offset"
            )));
        }
        Ok(())
    }
}

/// 配准流程的全部配置.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RegistrationConfig {
    /// 每次配准开始时的参数.
    pub parameters: RegistrationParameters,

    /// 参数允许的范围.
    pub bounds: ParameterBounds,

    /// 岛屿的相邻规则.
    pub connectivity: Connectivity,

    /// 提取掩膜时是否删除接触边缘的岛屿.
    pub remove_border_islands: bool,

    /// 普通模式失败后是否扫描阈值重试.
    pub retry: bool,

    /// 是否在普通模式失败后进入修复模式.
    pub repair: bool,

    /// 每次求解后是否去除变换的旋转分量.
    pub strip_orientation: bool,

    /// 普通模式的阈值扫描.
    pub retry_sweep: SweepConfig,

    /// 修复模式的阈值扫描.
    pub repair_sweep: SweepConfig,

    /// 修复时的探测与绘制参数.
    pub repair_geometry: RepairConfig,

    /// 包围盒尺寸与框架理论尺寸允许的误差, 以毫米为单位.
    pub bbox_tolerance_mm: f64,

    /// 求解器输入的水平切片边长.
    pub solver_slice_dim: usize,

    /// 校验时邻域采样的偏移 (体素个数).
    pub validation_offset: usize,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            parameters: RegistrationParameters::default(),
            bounds: ParameterBounds::default(),
            connectivity: Connectivity::Face,
            remove_border_islands: true,
            retry: true,
            repair: true,
            strip_orientation: false,
            retry_sweep: SweepConfig::retry_default(),
            repair_sweep: SweepConfig::repair_default(),
            repair_geometry: RepairConfig::default(),
            bbox_tolerance_mm: 15.0,
            solver_slice_dim: SOLVER_SLICE_DIM,
            validation_offset: 2,
        }
    }
}

impl RegistrationConfig {
    /// 检查配置是否合法.
    pub fn check(&self) -> Result<(), ConfigError> {
        let [t_lo, t_hi] = self.bounds.threshold;
        if !(t_lo.is_finite() && t_hi.is_finite() && t_lo <= t_hi) {
            return Err(ConfigError::InvalidParameter(
                "threshold bounds".to_string(),
            ));
        }
        if self.bounds.island_size[0] > self.bounds.island_size[1]
            || self.bounds.border_margin[0] > self.bounds.border_margin[1]
        {
            return Err(ConfigError::InvalidParameter("size bounds".to_string()));
        }
        self.retry_sweep.check("retry sweep")?;
        self.repair_sweep.check("repair sweep")?;
        if self.bbox_tolerance_mm.is_nan() || self.bbox_tolerance_mm < 0.0 {
            return Err(ConfigError::InvalidParameter(
                "bounding box tolerance".to_string(),
            ));
        }
        if self.solver_slice_dim == 0 {
            return Err(ConfigError::InvalidParameter(
                "solver slice dimension".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ParameterBounds, RegistrationConfig, RegistrationParameters, SweepConfig};

    #[test]
    fn test_default_is_valid() {
        let cfg = RegistrationConfig::default();
        assert!(cfg.check().is_ok());
        assert!((cfg.retry_sweep.ceiling - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_sweep() {
        let mut cfg = RegistrationConfig::default();
        cfg.repair_sweep = SweepConfig {
            step: 0.0,
            ..SweepConfig::repair_default()
        };
        assert!(cfg.check().is_err());

        let mut cfg = RegistrationConfig::default();
        cfg.retry_sweep.floor = 0.5;
        assert!(cfg.check().is_err());
    }

    #[test]
    fn test_clamped() {
        let p = RegistrationParameters {
            threshold_fraction: 1.7,
            min_island_size: 0,
            max_island_size: 1_000_000,
            border_margin: 500,
            ..Default::default()
        };
        let c = p.clamped(&ParameterBounds::default());
        assert_eq!(c.threshold_fraction, 1.0);
        assert_eq!(c.min_island_size, 1);
        assert_eq!(c.max_island_size, 100_000);
        assert_eq!(c.border_margin, 128);

        let p = RegistrationParameters {
            threshold_fraction: f64::NAN,
            min_island_size: 50,
            max_island_size: 20,
            ..Default::default()
        };
        let c = p.clamped(&ParameterBounds::default());
        assert_eq!(c.threshold_fraction, 0.0);
        assert_eq!(c.max_island_size, 50);
    }
}
