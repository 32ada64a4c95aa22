//! 外部几何求解器接口.

use crate::{Transform, VoxelMask};

/// 一次求解的输入.
#[derive(Debug)]
pub struct SolverRequest<'a> {
    /// 已裁剪的候选 fiducial 掩膜.
    pub mask: &'a VoxelMask,

    /// 含有前景的第一层切片.
    pub start_slice: usize,

    /// 含有前景的最后一层切片.
    pub end_slice: usize,

    /// 模板名称.
    pub frame_config_id: &'a str,

    /// 框架拓扑, 格式见 [`crate::config::FrameTopology::to_solver_string`].
    pub frame_topology: String,

    /// fiducial 编号, 格式见 [`crate::config::FiducialSpec::ids_string`].
    pub fiducial_ids: String,
}

/// 求解器的返回状态.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolverStatus {
    /// 正常结束. 结果仍需校验.
    Completed,

    /// 求解器报告失败. 参数为求解器给出的信息.
    Failed(String),
}

/// 外部几何求解器. 由掩膜求出模板坐标系到扫描 (RAS) 坐标系的变换.
///
/// 调用是同步、阻塞的. 求解器直接修改 `transform`, 即使失败也可能已经修改过.
pub trait GeometricSolver {
    /// 求解一次.
    fn solve(&mut self, request: &SolverRequest<'_>, transform: &mut Transform) -> SolverStatus;
}
