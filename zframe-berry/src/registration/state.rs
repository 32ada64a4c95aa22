//! 一次配准尝试的状态与轨迹.

use crate::config::RegistrationParameters;
use crate::fiducial::Probe;
use std::fmt::{Display, Formatter};

/// 配准流程的阶段.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Phase {
    /// 尚未开始.
    Init,

    /// 普通模式: 提取 -> 求解 -> 校验, 失败时扫描阈值重试.
    TryPlain,

    /// 修复模式: 提取 -> 计数 -> 修复, 找到可修复的掩膜后求解一次.
    TryRepair,

    /// 结束.
    Done,
}

/// 单次迭代中遇到的非致命异常. 异常只会被记录和打印, 不会中断配准.
#[derive(Debug, Clone, PartialEq)]
pub enum Anomaly {
    /// 掩膜为全背景, 未调用求解器.
    EmptyMask,

    /// 包围盒尺寸与框架不符.
    GeometryMismatch,

    /// 缺失的标记过多, 无法修复.
    RepairAnomaly {
        /// 缺失标记的探测位置.
        missing: Vec<Probe>,
    },

    /// 求解器报告失败. 参数为求解器给出的信息.
    SolverError(String),

    /// 求解完成, 但变换未通过校验.
    InvalidTransform,

    /// 模板不支持修复, 跳过修复模式.
    UnsupportedTopology,
}

impl Display for Anomaly {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMask => f.write_str("empty mask"),
            Self::GeometryMismatch => f.write_str("bounding box does not match the frame"),
            Self::RepairAnomaly { missing } => {
                write!(f, "{} fiducials missing, cannot repair", missing.len())
            }
            Self::SolverError(s) => write!(f, "solver error: {s}"),
            Self::InvalidTransform => f.write_str("transform failed validation"),
            Self::UnsupportedTopology => f.write_str("frame does not support repair"),
        }
    }
}

/// 一次迭代的记录.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptRecord {
    /// 所处阶段.
    pub phase: Phase,

    /// 使用的阈值比例.
    pub threshold_fraction: f64,

    /// 修复模式中数到的 fiducial 个数. 普通模式不计数, 为 `None`.
    pub fiducial_count: Option<usize>,

    /// 是否调用了求解器.
    pub solver_called: bool,

    /// 变换是否通过校验.
    pub valid: bool,

    /// 遇到的异常.
    pub anomaly: Option<Anomaly>,
}

/// 一次配准尝试的全部状态. 每次配准开始时重新创建.
#[derive(Debug, Clone)]
pub struct RegistrationAttemptState {
    parameters: RegistrationParameters,
    phase: Phase,
    transitions: Vec<Phase>,
    records: Vec<AttemptRecord>,
    skipped: Vec<(Phase, Anomaly)>,
}

impl RegistrationAttemptState {
    /// 以 `parameters` 为初始参数创建.
    pub fn new(parameters: RegistrationParameters) -> Self {
        Self {
            parameters,
            phase: Phase::Init,
            transitions: vec![Phase::Init],
            records: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// 当前参数.
    #[inline]
    pub fn parameters(&self) -> &RegistrationParameters {
        &self.parameters
    }

    #[inline]
    pub(crate) fn parameters_mut(&mut self) -> &mut RegistrationParameters {
        &mut self.parameters
    }

    /// 当前阶段.
    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// 经历过的所有阶段, 按时间顺序排列.
    #[inline]
    pub fn transitions(&self) -> &[Phase] {
        &self.transitions
    }

    /// 所有迭代记录, 按时间顺序排列.
    #[inline]
    pub fn records(&self) -> &[AttemptRecord] {
        &self.records
    }

    /// 整个被跳过的阶段及原因. 跳过的阶段不产生迭代记录.
    #[inline]
    pub fn skipped(&self) -> &[(Phase, Anomaly)] {
        &self.skipped
    }

    /// 求解器被调用的次数.
    pub fn solver_calls(&self) -> usize {
        self.records.iter().filter(|r| r.solver_called).count()
    }

    /// 在阶段 `phase` 中尝试过的阈值, 按时间顺序排列.
    pub fn thresholds(&self, phase: Phase) -> Vec<f64> {
        self.records
            .iter()
            .filter(|r| r.phase == phase)
            .map(|r| r.threshold_fraction)
            .collect()
    }

    pub(crate) fn enter(&mut self, phase: Phase) {
        log::debug!("配准阶段: {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
        self.transitions.push(phase);
    }

    pub(crate) fn skip(&mut self, phase: Phase, anomaly: Anomaly) {
        log::info!("跳过 {phase:?}: {anomaly}");
        self.skipped.push((phase, anomaly));
    }

    pub(crate) fn record(&mut self, record: AttemptRecord) {
        if let Some(a) = &record.anomaly {
            log::info!(
                "{:?}, 阈值比例 {:.4}: {a}",
                record.phase,
                record.threshold_fraction
            );
        }
        self.records.push(record);
    }
}
