//! 配准流程.
//!
//! 流程为 `Init -> TryPlain -> Done` 或 `Init -> TryPlain -> TryRepair -> Done`:
//!
//! 1. 普通模式: 提取掩膜, 求解, 校验. 失败时按阈值扫描重试, 扫描耗尽后进入修复模式;
//! 2. 修复模式: 独立的阈值扫描. 每个阈值下提取掩膜、计数、校验包围盒并修复,
//!   找到第一个可修复的掩膜后只调用一次求解器, 校验后结束.
//!
//! 所有求解共享同一个变换矩阵. 图像本身的问题只会使配准失败, 不会返回 `Err`.

mod error;
mod prepare;
mod solver;
mod state;
mod sweep;
mod validate;

pub use error::RegistrationError;
pub use prepare::{crop_range, crop_to_solver_dim, strip_orientation};
pub use solver::{GeometricSolver, SolverRequest, SolverStatus};
pub use state::{Anomaly, AttemptRecord, Phase, RegistrationAttemptState};
pub use sweep::{SweepStage, ThresholdSweep};
pub use validate::{locate_fiducial, validate, FiducialLocation};

use crate::config::{ConfigError, FrameConfig, RegistrationConfig, SweepConfig};
use crate::consts::CALIBRATION_OUT_VOLUME;
use crate::extract::{extract_mask, ExtractParams};
use crate::fiducial::{count_and_validate, repair_missing, RepairStatus};
use crate::store::{ImageRole, ImageStore};
use crate::{Transform, VoxelMask, VoxelVolume};

/// 一次配准的结果.
#[derive(Debug, Clone)]
pub struct RegistrationOutcome {
    /// 是否得到了通过校验的变换.
    pub success: bool,

    /// 最后一次求解后的变换. 从未调用求解器时为单位矩阵.
    pub transform: Transform,

    /// 配准轨迹.
    pub state: RegistrationAttemptState,

    /// 最后一次交给求解器的掩膜. 从未调用求解器时为 `None`.
    pub mask: Option<VoxelMask>,
}

/// 配准驱动器. 一个驱动器只执行一次配准.
pub struct RegistrationDriver<'a, S: GeometricSolver + ?Sized> {
    frame: &'a FrameConfig,
    config: &'a RegistrationConfig,
    solver: &'a mut S,
    transform: Transform,
    state: RegistrationAttemptState,
    solver_mask: Option<VoxelMask>,
    fiducial_count: Option<usize>,
}

impl<'a, S: GeometricSolver + ?Sized> RegistrationDriver<'a, S> {
    /// 创建驱动器. 配置不合法时返回错误.
    pub fn new(
        frame: &'a FrameConfig,
        config: &'a RegistrationConfig,
        solver: &'a mut S,
    ) -> Result<Self, ConfigError> {
        config.check()?;
        Ok(Self {
            frame,
            config,
            solver,
            transform: Transform::identity(),
            state: RegistrationAttemptState::new(config.parameters.clone()),
            solver_mask: None,
            fiducial_count: None,
        })
    }

    /// 对 `volume` 执行配准.
    pub fn run(mut self, volume: &VoxelVolume) -> RegistrationOutcome {
        log::info!("开始配准, 模板 `{}`", self.frame.id);
        self.state.enter(Phase::TryPlain);
        if self.try_plain(volume) {
            return self.finish(true);
        }
        if !self.config.repair {
            return self.finish(false);
        }
        if !self.frame.supports_repair() {
            self.state.skip(Phase::TryRepair, Anomaly::UnsupportedTopology);
            return self.finish(false);
        }
        self.state.enter(Phase::TryRepair);
        let success = self.try_repair(volume);
        self.finish(success)
    }

    fn sweep(&self, config: &SweepConfig) -> ThresholdSweep {
        ThresholdSweep::new(
            self.config.parameters.threshold_fraction,
            config,
            self.config.bounds.threshold,
        )
    }

    /// 以当前参数 (限制到范围内后) 提取掩膜.
    fn extract(&self, volume: &VoxelVolume) -> VoxelMask {
        let p = self.state.parameters().clamped(&self.config.bounds);
        let params = ExtractParams {
            threshold_fraction: p.threshold_fraction,
            min_size: p.min_island_size,
            max_size: p.max_island_size,
            border_margin: p.border_margin,
            remove_border_islands: self.config.remove_border_islands,
            connectivity: self.config.connectivity,
        };
        extract_mask(volume, &params)
    }

    fn record(&mut self, phase: Phase, solver_called: bool, valid: bool, anomaly: Option<Anomaly>) {
        let threshold = self.state.parameters().threshold_fraction;
        self.state.record(AttemptRecord {
            phase,
            threshold_fraction: threshold,
            fiducial_count: self.fiducial_count.take(),
            solver_called,
            valid,
            anomaly,
        });
    }

    fn try_plain(&mut self, volume: &VoxelVolume) -> bool {
        let mut sweep = self.sweep(&self.config.retry_sweep);
        loop {
            let Some(threshold) = sweep.next() else {
                break;
            };
            let params = self.state.parameters_mut();
            params.threshold_fraction = threshold;
            params.increasing_for_retry = sweep.is_increasing();

            let mask = self.extract(volume);
            if mask.is_all_background() {
                self.record(Phase::TryPlain, false, false, Some(Anomaly::EmptyMask));
            } else {
                let (called, valid, anomaly) = self.solve_and_validate(mask);
                self.record(Phase::TryPlain, called, valid, anomaly);
                if valid {
                    return true;
                }
            }
            if !self.config.retry {
                break;
            }
        }
        false
    }

    fn try_repair(&mut self, volume: &VoxelVolume) -> bool {
        let mut sweep = self.sweep(&self.config.repair_sweep);
        loop {
            let Some(threshold) = sweep.next() else {
                break;
            };
            let params = self.state.parameters_mut();
            params.threshold_fraction = threshold;
            params.increasing_for_repair = sweep.is_increasing();

            let mask = self.extract(volume);
            let count = count_and_validate(
                &mask,
                &self.frame.topology,
                self.config.bbox_tolerance_mm,
                self.config.connectivity,
            );
            let Some(count) = count else {
                self.record(Phase::TryRepair, false, false, Some(Anomaly::EmptyMask));
                continue;
            };
            self.fiducial_count = Some(count.count);
            let Some(bbox) = count.bounding_box.filter(|_| count.geometry_ok()) else {
                self.record(Phase::TryRepair, false, false, Some(Anomaly::GeometryMismatch));
                continue;
            };

            let outcome = repair_missing(mask, &bbox, count.mid_slice, &self.config.repair_geometry);
            if let RepairStatus::Anomaly { missing } = outcome.status {
                self.record(
                    Phase::TryRepair,
                    false,
                    false,
                    Some(Anomaly::RepairAnomaly { missing }),
                );
                continue;
            }
            let (called, valid, anomaly) = self.solve_and_validate(outcome.mask);
            self.record(Phase::TryRepair, called, valid, anomaly);
            return valid;
        }
        false
    }

    /// 裁剪掩膜, 调用求解器并校验. 返回 `(是否调用了求解器, 是否合法, 异常)`.
    fn solve_and_validate(&mut self, mask: VoxelMask) -> (bool, bool, Option<Anomaly>) {
        let mask = crop_to_solver_dim(&mask, self.config.solver_slice_dim);
        let Some((start_slice, end_slice)) = mask.foreground_z_range() else {
            return (false, false, Some(Anomaly::EmptyMask));
        };

        let request = SolverRequest {
            mask: &mask,
            start_slice,
            end_slice,
            frame_config_id: &self.frame.id,
            frame_topology: self.frame.topology.to_solver_string(),
            fiducial_ids: self.frame.fiducials.ids_string(),
        };
        let mut anomaly = match self.solver.solve(&request, &mut self.transform) {
            SolverStatus::Completed => None,
            SolverStatus::Failed(text) => {
                log::warn!("求解器报告失败: {text}");
                Some(Anomaly::SolverError(text))
            }
        };
        if self.config.strip_orientation {
            strip_orientation(&mut self.transform);
        }

        let valid = validate(
            &self.transform,
            &mask,
            &self.frame.fiducials,
            self.config.validation_offset,
        );
        if !valid && anomaly.is_none() {
            anomaly = Some(Anomaly::InvalidTransform);
        }
        self.solver_mask = Some(mask);
        (true, valid, anomaly)
    }

    fn finish(mut self, success: bool) -> RegistrationOutcome {
        self.state.enter(Phase::Done);
        if success {
            log::info!(
                "配准成功, 共调用求解器 {} 次",
                self.state.solver_calls()
            );
        } else {
            log::warn!(
                "配准失败, 共调用求解器 {} 次",
                self.state.solver_calls()
            );
        }
        RegistrationOutcome {
            success,
            transform: self.transform,
            state: self.state,
            mask: self.solver_mask,
        }
    }
}

/// 对图像库中的标定图像执行配准, 并把最后一次交给求解器的掩膜以
/// [`CALIBRATION_OUT_VOLUME`] 为名导出.
///
/// # 返回值
///
/// 只有配置错误和缺少标定图像会返回 `Err`; 配准失败以 `success == false` 表示.
pub fn register<I, S>(
    store: &mut I,
    solver: &mut S,
    frame: &FrameConfig,
    config: &RegistrationConfig,
) -> Result<RegistrationOutcome, RegistrationError>
where
    I: ImageStore + ?Sized,
    S: GeometricSolver + ?Sized,
{
    let volume = store
        .volume(ImageRole::Calibration)
        .ok_or(RegistrationError::MissingVolume(ImageRole::Calibration))?;
    let outcome = RegistrationDriver::new(frame, config, solver)?.run(volume);
    if let Some(mask) = &outcome.mask {
        store.export_mask(CALIBRATION_OUT_VOLUME, mask);
    }
    Ok(outcome)
}

/// 打开模板目录下名为 `template` 的模板, 然后执行 [`register`].
pub fn register_named<I, S>(
    store: &mut I,
    solver: &mut S,
    template: &str,
    config: &RegistrationConfig,
) -> Result<RegistrationOutcome, RegistrationError>
where
    I: ImageStore + ?Sized,
    S: GeometricSolver + ?Sized,
{
    let frame = FrameConfig::open_named(template)?;
    register(store, solver, &frame, config)
}

#[cfg(test)]
mod tests {
    use super::{register, Anomaly, Phase, RegistrationDriver, RegistrationError};
    use crate::config::{FiducialSpec, FrameConfig, FrameTopology, RegistrationConfig};
    use crate::consts::CALIBRATION_OUT_VOLUME;
    use crate::fiducial::Probe;
    use crate::store::{ImageRole, MemoryStore};
    use crate::test_utils::{
        init_logger, padded_phantom_volume, phantom_volume, test_config, test_frame, StubSolver,
        ALL_RODS, PHANTOM_SHAPE,
    };
    use crate::{Transform, VolumeAttr, VoxelVolume};
    use nalgebra::{Rotation3, Vector3};
    use ndarray::Array3;

    fn without(missing: &[Probe]) -> Vec<Probe> {
        ALL_RODS
            .into_iter()
            .filter(|p| !missing.contains(p))
            .collect()
    }

    #[test]
    fn test_all_rods_first_attempt() {
        init_logger();
        let frame = test_frame();
        let config = test_config();
        let mut solver = StubSolver::default();
        let volume = phantom_volume(&ALL_RODS);
        let out = RegistrationDriver::new(&frame, &config, &mut solver)
            .unwrap()
            .run(&volume);
        assert!(out.success);
        assert_eq!(out.state.solver_calls(), 1);
        assert_eq!(solver.calls, 1);
        assert_eq!(
            out.state.transitions(),
            &[Phase::Init, Phase::TryPlain, Phase::Done]
        );
        let req = solver.last_request.unwrap();
        assert_eq!(req.ids, "1,2,3,4,5,6,7");
        assert_eq!(req.topology, "[30, 30, 0], [-30, 30, 0], [-30, -30, 0]");
        assert_eq!((req.start_slice, req.end_slice), (4, 15));
    }

    #[test]
    fn test_two_missing_repaired() {
        init_logger();
        let frame = test_frame();
        let config = RegistrationConfig {
            retry: false,
            ..test_config()
        };
        let mut solver = StubSolver::default();
        let volume = phantom_volume(&without(&[Probe::TopMiddle, Probe::MiddleRight]));
        let out = RegistrationDriver::new(&frame, &config, &mut solver)
            .unwrap()
            .run(&volume);
        assert!(out.success);
        assert_eq!(out.state.solver_calls(), 2);
        assert_eq!(
            out.state.transitions(),
            &[Phase::Init, Phase::TryPlain, Phase::TryRepair, Phase::Done]
        );
        assert_eq!(out.state.records()[0].anomaly, Some(Anomaly::InvalidTransform));
        assert!(out.state.records().last().unwrap().valid);
    }

    #[test]
    fn test_plain_sweep_never_revisits() {
        init_logger();
        let frame = test_frame();
        let config = RegistrationConfig {
            repair: false,
            ..test_config()
        };
        let mut solver = StubSolver::default();
        let volume = phantom_volume(&without(&[Probe::TopMiddle]));
        let out = RegistrationDriver::new(&frame, &config, &mut solver)
            .unwrap()
            .run(&volume);
        assert!(!out.success);
        let tried = out.state.thresholds(Phase::TryPlain);
        assert_eq!(tried.len(), 19);
        for (i, a) in tried.iter().enumerate() {
            assert!(tried[i + 1..].iter().all(|b| (a - b).abs() > 1e-9));
        }
    }

    fn six_fiducial_frame() -> FrameConfig {
        let mut frame = test_frame();
        let six: Vec<_> = frame.fiducials.iter().take(6).cloned().collect();
        frame.fiducials = FiducialSpec::new(six);
        frame
    }

    #[test]
    fn test_unsupported_topology_skips_repair() {
        init_logger();
        let frame = six_fiducial_frame();
        let config = RegistrationConfig {
            retry: false,
            ..test_config()
        };
        let mut solver = StubSolver::failing();
        let volume = phantom_volume(&ALL_RODS);
        let out = RegistrationDriver::new(&frame, &config, &mut solver)
            .unwrap()
            .run(&volume);
        assert!(!out.success);
        assert_eq!(solver.calls, 1);
        assert_eq!(out.state.records().len(), 1);
        assert!(matches!(
            out.state.records()[0].anomaly,
            Some(Anomaly::SolverError(_))
        ));
        assert_eq!(
            out.state.skipped(),
            &[(Phase::TryRepair, Anomaly::UnsupportedTopology)]
        );
        assert_eq!(
            out.state.transitions(),
            &[Phase::Init, Phase::TryPlain, Phase::Done]
        );
    }

    #[test]
    fn test_skipped_repair_adds_no_threshold() {
        init_logger();
        let frame = six_fiducial_frame();
        let config = test_config();
        let mut solver = StubSolver::failing();
        let volume = phantom_volume(&ALL_RODS);
        let out = RegistrationDriver::new(&frame, &config, &mut solver)
            .unwrap()
            .run(&volume);
        assert!(!out.success);
        assert_eq!(solver.calls, 19);
        let tried = out.state.thresholds(Phase::TryPlain);
        assert_eq!(tried.len(), 19);
        for (i, a) in tried.iter().enumerate() {
            assert!(tried[i + 1..].iter().all(|b| (a - b).abs() > 1e-9));
        }
        assert!(out.state.thresholds(Phase::TryRepair).is_empty());
        assert_eq!(out.state.skipped().len(), 1);
    }

    #[test]
    fn test_empty_mask_never_calls_solver() {
        init_logger();
        let frame = test_frame();
        let config = test_config();
        let mut solver = StubSolver::default();
        // 整个扫描是一个远超最大尺寸的岛屿, 提取结果为空.
        let volume = VoxelVolume::new(
            Array3::from_elem(PHANTOM_SHAPE, 1000.0),
            phantom_volume(&[]).geometry().clone(),
        );
        let out = RegistrationDriver::new(&frame, &config, &mut solver)
            .unwrap()
            .run(&volume);
        assert!(!out.success);
        assert_eq!(solver.calls, 0);
        assert!(out.mask.is_none());
        assert_eq!(out.transform, Transform::identity());
        assert_eq!(out.state.thresholds(Phase::TryPlain).len(), 19);
        assert_eq!(out.state.thresholds(Phase::TryRepair).len(), 14);
        assert!(out
            .state
            .records()
            .iter()
            .all(|r| r.anomaly == Some(Anomaly::EmptyMask) && !r.solver_called));
    }

    #[test]
    fn test_three_missing_exhausts_repair() {
        init_logger();
        let frame = test_frame();
        let config = RegistrationConfig {
            retry: false,
            ..test_config()
        };
        let mut solver = StubSolver::default();
        let missing = [Probe::MiddleLeft, Probe::TopMiddle, Probe::MiddleRight];
        let volume = phantom_volume(&without(&missing));
        let out = RegistrationDriver::new(&frame, &config, &mut solver)
            .unwrap()
            .run(&volume);
        assert!(!out.success);
        assert_eq!(solver.calls, 1);

        let repair: Vec<_> = out
            .state
            .records()
            .iter()
            .filter(|r| r.phase == Phase::TryRepair)
            .collect();
        assert_eq!(repair.len(), 14);
        for r in repair {
            assert!(!r.solver_called);
            assert_eq!(r.fiducial_count, Some(4));
            assert_eq!(
                r.anomaly,
                Some(Anomaly::RepairAnomaly {
                    missing: missing.to_vec()
                })
            );
        }
    }

    #[test]
    fn test_geometry_mismatch_skips_repair_attempt() {
        init_logger();
        let mut frame = test_frame();
        frame.topology = FrameTopology {
            side1: [100.0, 30.0, 0.0],
            side2: [-100.0, 30.0, 0.0],
            base: [-100.0, -30.0, 0.0],
        };
        let config = RegistrationConfig {
            retry: false,
            ..test_config()
        };
        let mut solver = StubSolver::default();
        let volume = phantom_volume(&without(&[Probe::TopMiddle]));
        let out = RegistrationDriver::new(&frame, &config, &mut solver)
            .unwrap()
            .run(&volume);
        assert!(!out.success);
        assert_eq!(solver.calls, 1);

        let records = out.state.records();
        assert_eq!(records[0].phase, Phase::TryPlain);
        assert_eq!(records[0].fiducial_count, None);
        assert!(records[1..].iter().all(|r| r.phase == Phase::TryRepair
            && r.anomaly == Some(Anomaly::GeometryMismatch)
            && r.fiducial_count == Some(6)));
        assert_eq!(records.len(), 1 + 14);
    }

    #[test]
    fn test_strip_orientation_after_solve() {
        init_logger();
        let frame = test_frame();
        let rotated =
            Rotation3::from_axis_angle(&Vector3::z_axis(), 10f64.to_radians()).to_homogeneous();
        let volume = phantom_volume(&ALL_RODS);

        let config = RegistrationConfig {
            strip_orientation: true,
            ..test_config()
        };
        let mut solver = StubSolver::returning(rotated);
        let out = RegistrationDriver::new(&frame, &config, &mut solver)
            .unwrap()
            .run(&volume);
        assert!(out.success);
        assert_eq!(solver.calls, 1);
        assert_eq!(out.transform, Transform::identity());

        let config = RegistrationConfig {
            retry: false,
            repair: false,
            ..test_config()
        };
        let mut solver = StubSolver::returning(rotated);
        let out = RegistrationDriver::new(&frame, &config, &mut solver)
            .unwrap()
            .run(&volume);
        assert!(!out.success);
        assert_eq!(out.transform, rotated);
    }

    #[test]
    fn test_large_slices_cropped_for_solver() {
        init_logger();
        let frame = test_frame();
        let config = test_config();
        let mut solver = StubSolver::default();
        let volume = padded_phantom_volume(&ALL_RODS, 150);
        assert_eq!(volume.shape(), (20, 364, 364));
        let out = RegistrationDriver::new(&frame, &config, &mut solver)
            .unwrap()
            .run(&volume);
        assert!(out.success);
        assert_eq!(solver.calls, 1);
        assert_eq!(solver.last_request.unwrap().shape, (20, 256, 256));
        assert_eq!(out.mask.unwrap().shape(), (20, 256, 256));
    }

    #[test]
    fn test_register_exports_mask() {
        init_logger();
        let mut store = MemoryStore::new();
        let mut solver = StubSolver::default();
        let frame = test_frame();
        let config = test_config();
        assert!(matches!(
            register(&mut store, &mut solver, &frame, &config),
            Err(RegistrationError::MissingVolume(ImageRole::Calibration))
        ));

        store.add_volume("2: Template", phantom_volume(&ALL_RODS));
        let out = register(&mut store, &mut solver, &frame, &config).unwrap();
        assert!(out.success);
        assert_eq!(store.exported(CALIBRATION_OUT_VOLUME), out.mask.as_ref());
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let mut store = MemoryStore::new();
        store.add_volume("Template", phantom_volume(&ALL_RODS));
        let mut solver = StubSolver::default();
        let mut config = test_config();
        config.retry_sweep.step = -1.0;
        assert!(matches!(
            register(&mut store, &mut solver, &test_frame(), &config),
            Err(RegistrationError::Configuration(_))
        ));
        assert_eq!(solver.calls, 0);
    }
}
