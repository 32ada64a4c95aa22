//! 阈值扫描.

use crate::config::SweepConfig;

const EPS: f64 = 1e-9;

/// 扫描所处的阶段.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SweepStage {
    /// 从初始阈值开始递减.
    Decreasing,

    /// 到达下限后, 从初始阈值之上开始递增.
    Increasing,

    /// 到达上限, 不再产生新阈值.
    Exhausted,
}

/// 有界的阈值扫描迭代器.
///
/// 依次产生: 初始阈值; 按步长递减的阈值, 直到下限 (最后一个值恰为下限);
/// 从 `初始阈值 + jump_offset` 开始按步长递增的阈值, 直到上限 (最后一个值恰为上限).
/// 递减段的值都不大于初始阈值, 递增段的值都严格大于初始阈值, 因此同一个值不会出现两次.
///
/// 所有值都位于构造时给定的 `bounds` 之内.
#[derive(Debug, Clone)]
pub struct ThresholdSweep {
    initial: f64,
    floor: f64,
    ceiling: f64,
    step: f64,
    jump: f64,
    stage: SweepStage,
    k: usize,
    last: f64,
}

impl ThresholdSweep {
    /// 创建扫描. `initial`, `config.floor` 和 `config.ceiling` 会先被限制到 `bounds` 之内.
    pub fn new(initial: f64, config: &SweepConfig, [lo, hi]: [f64; 2]) -> Self {
        let initial = if initial.is_nan() { lo } else { initial.clamp(lo, hi) };
        let step = config.step.abs().max(EPS);
        let jump = if config.jump_offset > EPS {
            config.jump_offset
        } else {
            step
        };
        Self {
            initial,
            floor: config.floor.clamp(lo, hi),
            ceiling: config.ceiling.clamp(lo, hi),
            step,
            jump,
            stage: SweepStage::Decreasing,
            k: 0,
            last: initial,
        }
    }

    /// 当前阶段.
    #[inline]
    pub fn stage(&self) -> SweepStage {
        self.stage
    }

    /// 是否已经转为递增 (含已耗尽).
    #[inline]
    pub fn is_increasing(&self) -> bool {
        self.stage != SweepStage::Decreasing
    }

    fn next_decreasing(&mut self) -> Option<f64> {
        if self.k == 0 {
            self.k = 1;
            self.last = self.initial;
            return Some(self.initial);
        }
        if self.last <= self.floor + EPS {
            return None;
        }
        let v = (self.initial - self.k as f64 * self.step).max(self.floor);
        self.k += 1;
        self.last = v;
        Some(v)
    }

    fn next_increasing(&mut self) -> Option<f64> {
        let start = self.initial + self.jump;
        let v = if self.k == 0 {
            if start > self.ceiling + EPS {
                return None;
            }
            start.min(self.ceiling)
        } else {
            if self.last >= self.ceiling - EPS {
                return None;
            }
            (start + self.k as f64 * self.step).min(self.ceiling)
        };
        self.k += 1;
        self.last = v;
        Some(v)
    }
}

impl Iterator for ThresholdSweep {
    type Item = f64;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.stage {
                SweepStage::Decreasing => match self.next_decreasing() {
                    Some(v) => return Some(v),
                    None => {
                        log::debug!("阈值扫描到达下限 {:.4}, 转为递增", self.floor);
                        self.stage = SweepStage::Increasing;
                        self.k = 0;
                    }
                },
                SweepStage::Increasing => match self.next_increasing() {
                    Some(v) => return Some(v),
                    None => {
                        log::debug!("阈值扫描到达上限 {:.4}", self.ceiling);
                        self.stage = SweepStage::Exhausted;
                    }
                },
                SweepStage::Exhausted => return None,
            }
        }
    }
}
