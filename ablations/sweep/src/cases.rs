//! 合成用例.

use itertools::iproduct;
use ndarray::Array3;
use zframe_berry::fiducial::Probe;
use zframe_berry::prelude::*;

/// 与合成扫描对齐的 7-fiducial 模板.
pub const TEMPLATE: &str = "\
# synthetic Z-frame, aligned with the phantom under the identity transform
Side 1: [28, 28, 0]
Side 2: [-28, 28, 0]
Base: [-28, -28, 0]
Fiducial 1: 19, 19, 8, 21, 21, 40
Fiducial 2: 75, 19, 8, 77, 21, 40
Fiducial 3: 19, 75, 8, 21, 77, 40
Fiducial 4: 75, 75, 8, 77, 77, 40
Fiducial 5: 19, 47, 8, 21, 49, 40
Fiducial 6: 47, 19, 8, 49, 21, 40
Fiducial 7: 75, 47, 8, 77, 49, 40
Template origin: -30, -30, 0
Horizontal offset: 5
Vertical offset: 5
Horizontal labels: A, B, C, D, E, F, G, H, I, J, K, L, M
Vertical labels: 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13
";

const SHAPE: (usize, usize, usize) = (24, 96, 96);
const ROD_Z: std::ops::RangeInclusive<usize> = 4..=19;

/// 标记中心的 `(h, w)` 坐标. 顺序与模板中的 fiducial 编号一致.
fn rod_center(p: Probe) -> Idx2d {
    match p {
        Probe::TopLeft => (20, 20),
        Probe::TopRight => (20, 76),
        Probe::BottomLeft => (76, 20),
        Probe::BottomRight => (76, 76),
        Probe::MiddleLeft => (48, 20),
        Probe::TopMiddle => (20, 48),
        Probe::MiddleRight => (48, 76),
    }
}

/// 一个合成用例.
pub struct Case {
    /// 用例名.
    pub name: String,

    /// 缺失的标记.
    pub missing: Vec<Probe>,

    /// 合成扫描.
    pub volume: VoxelVolume,
}

/// 合成扫描: 七根 (减去缺失的) 强度 1000 的标记, 一块强度 300 的大软组织,
/// 以及一条贴着左边缘的高亮伪影.
fn phantom(missing: &[Probe]) -> VoxelVolume {
    let mut data = Array3::<f32>::zeros(SHAPE);
    let (z_len, _, _) = SHAPE;

    for (z, h, w) in iproduct!(6..18, 34..62, 34..62) {
        data[(z, h, w)] = 300.0;
    }
    for (z, h, w) in iproduct!(0..z_len, 40..56, 0..3) {
        data[(z, h, w)] = 1200.0;
    }
    for p in Probe::ALL.into_iter().filter(|p| !missing.contains(p)) {
        let (h, w) = rod_center(p);
        for (z, h, w) in iproduct!(ROD_Z, h - 1..h + 2, w - 1..w + 2) {
            data[(z, h, w)] = 1000.0;
        }
    }

    let geometry = VolumeGeometry::axis_aligned([1.0, 1.0, 2.0], [0.0; 3])
        .expect("Phantom geometry error");
    VoxelVolume::new(data, geometry)
}

/// 全部用例: 分别缺失 0 到 4 根标记.
pub fn all_cases() -> Vec<Case> {
    use Probe::*;

    let groups: [&[Probe]; 5] = [
        &[],
        &[TopMiddle],
        &[TopMiddle, MiddleRight],
        &[MiddleLeft, TopMiddle, MiddleRight],
        &[MiddleLeft, TopMiddle, MiddleRight, BottomRight],
    ];
    groups
        .into_iter()
        .map(|missing| Case {
            name: format!("missing-{}", missing.len()),
            missing: missing.to_vec(),
            volume: phantom(missing),
        })
        .collect()
}

/// 总是给出单位变换的求解器. 合成扫描与模板在单位变换下对齐.
#[derive(Debug, Default)]
pub struct IdentitySolver;

impl GeometricSolver for IdentitySolver {
    fn solve(&mut self, _: &SolverRequest<'_>, transform: &mut Transform) -> SolverStatus {
        *transform = Transform::identity();
        SolverStatus::Completed
    }
}
