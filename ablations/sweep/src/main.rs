//! 在合成扫描上比较不同缺失程度下的配准流程.
//!
//! 每个用例缺失 0 到 4 根标记, 统计求解器调用次数、尝试过的阈值和最终结果.
//! 设置 `$ZFRAME_DUMP_DIR` 时, 会把每个用例最后交给求解器的掩膜导出到该目录.

mod cases;
mod profile;
mod result;
mod runner;

fn main() {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Warn)
        .env()
        .init()
        .expect("Logger initialization error");

    let result = runner::run();
    result.analyze();
}
