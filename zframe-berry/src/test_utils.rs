//! 测试用的合成数据与求解器.

use crate::config::{
    FiducialBox, FiducialSpec, FrameConfig, FrameTopology, RegistrationConfig,
    RegistrationParameters, TemplateGrid,
};
use crate::fiducial::Probe;
use crate::registration::{GeometricSolver, SolverRequest, SolverStatus};
use crate::{Idx2d, Idx3d, Transform, VolumeAttr, VolumeGeometry, VoxelMask, VoxelVolume};
use nalgebra::Vector3;
use ndarray::Array3;

/// 合成扫描的形状 `(z, h, w)`.
pub const PHANTOM_SHAPE: (usize, usize, usize) = (20, 64, 64);

/// 体素间距 `[i, j, k]`.
pub const PHANTOM_SPACING: [f64; 3] = [1.5, 1.5, 2.0];

/// 标记所在的切片范围 (闭区间).
pub const ROD_Z: (usize, usize) = (4, 15);

/// 全部七根标记, 顺序与 fiducial 编号一致.
pub const ALL_RODS: [Probe; 7] = Probe::ALL;

/// 标记中心的 `(h, w)` 坐标.
pub fn rod_center(p: Probe) -> Idx2d {
    match p {
        Probe::TopLeft => (10, 10),
        Probe::TopRight => (10, 50),
        Probe::BottomLeft => (50, 10),
        Probe::BottomRight => (50, 50),
        Probe::MiddleLeft => (30, 10),
        Probe::TopMiddle => (10, 30),
        Probe::MiddleRight => (30, 50),
    }
}

fn geometry() -> VolumeGeometry {
    VolumeGeometry::axis_aligned(PHANTOM_SPACING, [0.0; 3]).unwrap()
}

/// 合成扫描: 背景为 0, 每根标记为截面 3x3 的 `z` 方向柱体, 强度 1000.
pub fn phantom_volume(rods: &[Probe]) -> VoxelVolume {
    let mut data = Array3::<f32>::zeros(PHANTOM_SHAPE);
    for pos in rod_voxels(rods) {
        data[pos] = 1000.0;
    }
    VoxelVolume::new(data, geometry())
}

/// 在水平方向四周各填充 `pad` 个背景像素的合成扫描. 原点随之平移,
/// 标记的 RAS 坐标与 [`phantom_volume`] 相同.
pub fn padded_phantom_volume(rods: &[Probe], pad: usize) -> VoxelVolume {
    let (lz, lh, lw) = PHANTOM_SHAPE;
    let mut data = Array3::<f32>::zeros((lz, lh + 2 * pad, lw + 2 * pad));
    for (z, h, w) in rod_voxels(rods) {
        data[(z, h + pad, w + pad)] = 1000.0;
    }
    let origin = [
        -(pad as f64) * PHANTOM_SPACING[0],
        -(pad as f64) * PHANTOM_SPACING[1],
        0.0,
    ];
    let geometry = VolumeGeometry::axis_aligned(PHANTOM_SPACING, origin).unwrap();
    VoxelVolume::new(data, geometry)
}

/// 与 [`phantom_volume`] 对应的掩膜.
pub fn phantom_mask(rods: &[Probe]) -> VoxelMask {
    let mut mask = VoxelMask::zeros(PHANTOM_SHAPE, geometry());
    for pos in rod_voxels(rods) {
        mask.set_foreground(pos);
    }
    mask
}

fn rod_voxels(rods: &[Probe]) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
    rods.iter().flat_map(|p| {
        let (h, w) = rod_center(*p);
        itertools::iproduct!(ROD_Z.0..=ROD_Z.1, h - 1..=h + 1, w - 1..=w + 1)
    })
}

/// 与合成扫描尺寸相符的拓扑.
pub fn test_topology() -> FrameTopology {
    FrameTopology {
        side1: [30.0, 30.0, 0.0],
        side2: [-30.0, 30.0, 0.0],
        base: [-30.0, -30.0, 0.0],
    }
}

/// 以单位变换与合成扫描对齐的 7-fiducial 模板.
pub fn test_frame() -> FrameConfig {
    let boxes = ALL_RODS
        .into_iter()
        .zip(1..)
        .map(|(p, id)| {
            let (h, w) = rod_center(p);
            let (x, y) = (w as f64 * PHANTOM_SPACING[0], h as f64 * PHANTOM_SPACING[1]);
            FiducialBox {
                id,
                corners: [x - 1.0, y - 1.0, 8.0, x + 1.0, y + 1.0, 30.0],
            }
        })
        .collect();
    FrameConfig {
        id: "phantom".to_string(),
        topology: test_topology(),
        fiducials: FiducialSpec::new(boxes),
        grid: TemplateGrid {
            origin: [-30.0, -30.0, 0.0],
            horizontal_offset: 5.0,
            vertical_offset: 5.0,
            horizontal_labels: vec![],
            vertical_labels: vec![],
        },
    }
}

/// 适合合成扫描的配置: 标记体积为 108 个体素, 距离边缘 9 个像素.
pub fn test_config() -> RegistrationConfig {
    RegistrationConfig {
        parameters: RegistrationParameters {
            min_island_size: 20,
            max_island_size: 500,
            border_margin: 5,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// 求解器收到的请求.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub shape: Idx3d,
    pub start_slice: usize,
    pub end_slice: usize,
    pub topology: String,
    pub ids: String,
}

/// 总是给出 `result` 的求解器.
#[derive(Debug)]
pub struct StubSolver {
    pub calls: usize,
    pub last_request: Option<RecordedRequest>,
    result: Transform,
    status: SolverStatus,
}

impl Default for StubSolver {
    /// 给出单位变换.
    fn default() -> Self {
        Self {
            calls: 0,
            last_request: None,
            result: Transform::identity(),
            status: SolverStatus::Completed,
        }
    }
}

impl StubSolver {
    /// 总是给出 `result`, 并报告成功.
    pub fn returning(result: Transform) -> Self {
        Self {
            result,
            ..Default::default()
        }
    }

    /// 报告失败, 并把变换移到很远的地方.
    pub fn failing() -> Self {
        Self {
            result: Transform::new_translation(&Vector3::new(500.0, 0.0, 0.0)),
            status: SolverStatus::Failed("no convergence".to_string()),
            ..Default::default()
        }
    }
}

impl GeometricSolver for StubSolver {
    fn solve(&mut self, request: &SolverRequest<'_>, transform: &mut Transform) -> SolverStatus {
        self.calls += 1;
        self.last_request = Some(RecordedRequest {
            shape: request.mask.shape(),
            start_slice: request.start_slice,
            end_slice: request.end_slice,
            topology: request.frame_topology.clone(),
            ids: request.fiducial_ids.clone(),
        });
        *transform = self.result;
        self.status.clone()
    }
}

/// 安装日志. 多次调用是安全的.
pub fn init_logger() {
    let _ = simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Debug)
        .init();
}
