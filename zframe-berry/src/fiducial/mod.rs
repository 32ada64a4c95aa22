//! fiducial 计数、包围盒校验与缺失修复.

mod count;
mod repair;

pub use count::{count_and_validate, FiducialCount};
pub use repair::{missing_probes, repair_missing, Probe, RepairConfig, RepairOutcome, RepairStatus};
