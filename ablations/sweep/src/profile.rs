//! 配准运行统计.

use std::time::{Duration, Instant};
use zframe_berry::prelude::RegistrationOutcome;
use zframe_berry::registration::Phase;

/// ablation 计时器.
///
/// 该计时器支持 "中途中断" 与 "结束中断, 继续开始计时".
#[derive(Clone, Debug)]
struct AccTimer {
    consumed: Duration,
    since: Instant,
}

impl AccTimer {
    /// 初始化计时器. 初始化时会视为已经开始计时 (`self.start()`).
    #[inline]
    fn new() -> Self {
        Self {
            consumed: Duration::from_secs(0),
            since: Instant::now(),
        }
    }

    /// 开始计时.
    #[inline]
    fn start(&mut self) {
        self.since = Instant::now();
    }

    /// 结束计时, 并将这一区间的时间累加. 返回本轮计时时长.
    ///
    /// # 注意
    ///
    /// 上一次调用必须是 `self.start()`, 否则计算时间值无意义.
    #[inline]
    fn elapsed(&mut self) -> Duration {
        let d = self.since.elapsed();
        self.consumed += d;
        d
    }

    /// 获得总共累计下来的时间综合 (以微秒为单位).
    #[inline]
    fn get_total_us(&self) -> u64 {
        self.consumed.as_micros() as u64
    }
}

/// 一组配置在全部用例上的统计.
#[derive(Clone, Debug)]
pub struct Profile {
    /// 用例个数.
    cases: u64,

    /// 配准成功的用例.
    succeeded: Vec<String>,

    /// 配准失败的用例.
    failed: Vec<String>,

    /// 求解器总调用次数.
    solver_calls: u64,

    /// 普通模式下尝试过的阈值总数.
    plain_thresholds: u64,

    /// 修复模式下尝试过的阈值总数.
    repair_thresholds: u64,

    /// 配准本身花费的总时间.
    registration_time: AccTimer,

    /// 整个任务花费的总时间 (包括构造合成扫描).
    real_time: AccTimer,

    /// 最耗时的一次配准.
    most: Option<Duration>,
}

impl Profile {
    /// 初始化.
    #[inline]
    pub fn new() -> Self {
        Self {
            cases: 0,
            succeeded: vec![],
            failed: vec![],
            solver_calls: 0,
            plain_thresholds: 0,
            repair_thresholds: 0,
            registration_time: AccTimer::new(),
            real_time: AccTimer::new(),
            most: None,
        }
    }

    /// 开始一次配准计时.
    #[inline]
    pub fn registration_start(&mut self) {
        self.registration_time.start();
    }

    /// 结束一次配准计时, 并记录用例 `name` 的结果.
    pub fn registration_elapsed(&mut self, name: &str, outcome: &RegistrationOutcome) {
        let d = self.registration_time.elapsed();
        self.most = Some(self.most.map_or(d, |m| m.max(d)));

        self.cases += 1;
        if outcome.success {
            self.succeeded.push(name.to_string());
        } else {
            self.failed.push(name.to_string());
        }
        let state = &outcome.state;
        self.solver_calls += state.solver_calls() as u64;
        self.plain_thresholds += state.thresholds(Phase::TryPlain).len() as u64;
        self.repair_thresholds += state.thresholds(Phase::TryRepair).len() as u64;
    }

    /// 结束全部计时.
    #[inline]
    pub fn finish(mut self) -> Self {
        self.real_time.elapsed();
        self
    }

    /// 获得用例个数.
    #[inline]
    pub fn get_cases(&self) -> u64 {
        self.cases
    }

    /// 获得配准成功的用例.
    #[inline]
    pub fn get_succeeded(&self) -> &[String] {
        &self.succeeded
    }

    /// 获得配准失败的用例.
    #[inline]
    pub fn get_failed(&self) -> &[String] {
        &self.failed
    }

    /// 获得求解器总调用次数.
    #[inline]
    pub fn get_solver_calls(&self) -> u64 {
        self.solver_calls
    }

    /// 获得 `(普通模式, 修复模式)` 下尝试过的阈值总数.
    #[inline]
    pub fn get_thresholds(&self) -> (u64, u64) {
        (self.plain_thresholds, self.repair_thresholds)
    }

    /// 以微秒为单位获得配准的总花费时间.
    #[inline]
    pub fn get_registration_time_us(&self) -> u64 {
        self.registration_time.get_total_us()
    }

    /// 以微秒为单位获得任务的总自然时间.
    #[inline]
    pub fn get_real_time_us(&self) -> u64 {
        self.real_time.get_total_us()
    }

    /// 以微秒为单位获得每个用例的平均配准时间.
    #[inline]
    pub fn get_avg_registration_time_us(&self) -> Option<f64> {
        match self.cases {
            0 => None,
            cases => Some(self.get_registration_time_us() as f64 / cases as f64),
        }
    }

    /// 获得每个用例的平均求解器调用次数.
    #[inline]
    pub fn get_avg_solver_calls(&self) -> Option<f64> {
        match self.cases {
            0 => None,
            cases => Some(self.solver_calls as f64 / cases as f64),
        }
    }

    /// 获取最耗时的一次配准所消耗的时间. 如果不存在用例, 则返回 `None`.
    #[inline]
    pub fn get_most_time_consuming(&self) -> Option<Duration> {
        self.most
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self::new()
    }
}
