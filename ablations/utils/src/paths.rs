//! 实验用到的目录.

use std::env;
use std::path::PathBuf;

/// 指定掩膜导出目录的环境变量.
pub const DUMP_DIR_ENV: &str = "ZFRAME_DUMP_DIR";

/// 获取掩膜导出目录.
///
/// 1. 若环境变量 `$ZFRAME_DUMP_DIR` 非空, 则返回其值;
/// 2. 否则返回 `None`, 即不导出.
pub fn dump_dir_from_env() -> Option<PathBuf> {
    env::var_os(DUMP_DIR_ENV)
        .filter(|d| !d.is_empty())
        .map(PathBuf::from)
}
