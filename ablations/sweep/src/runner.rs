//! 程序运行函数.

use crate::cases::{self, Case, IdentitySolver};
use crate::profile::Profile;
use crate::result::AblationResult;
use std::path::Path;
use std::thread;
use zframe_berry::prelude::*;

/// 参与比较的配置.
fn configs() -> [(&'static str, RegistrationConfig); 3] {
    let full = RegistrationConfig::default();
    [
        ("retry+repair", full.clone()),
        (
            "repair-only",
            RegistrationConfig {
                retry: false,
                ..full.clone()
            },
        ),
        (
            "retry-only",
            RegistrationConfig {
                repair: false,
                ..full
            },
        ),
    ]
}

/// 把最后交给求解器的掩膜和它的质心切片导出到 `dir`.
fn dump(dir: &Path, profile: &str, case: &str, mask: &VoxelMask) {
    let stem = format!("{profile}-{case}");
    if let Err(e) = mask.write_npy(dir.join(format!("{stem}.npy"))) {
        log::warn!("导出 `{stem}.npy` 失败: {e}");
    }
    let Some(z) = mask.centroid_z() else {
        return;
    };
    if let Err(e) = mask.slice_at(z.round() as usize).save(dir.join(format!("{stem}.png"))) {
        log::warn!("导出 `{stem}.png` 失败: {e}");
    }
}

/// 以 `config` 配准全部用例.
fn profile(
    name: &str,
    frame: &FrameConfig,
    config: &RegistrationConfig,
    cases: &[Case],
    dump_dir: Option<&Path>,
) -> Profile {
    let mut profile = Profile::new();
    for case in cases {
        let mut solver = IdentitySolver;
        let driver = RegistrationDriver::new(frame, config, &mut solver)
            .expect("Registration config error");

        profile.registration_start();
        let outcome = driver.run(&case.volume);
        profile.registration_elapsed(&case.name, &outcome);

        log::info!(
            "{name}/{}: 缺失 {:?}, 结果 {}",
            case.name,
            case.missing,
            outcome.success
        );
        if let (Some(dir), Some(mask)) = (dump_dir, outcome.mask.as_ref()) {
            dump(dir, name, &case.name, mask);
        }
    }
    profile.finish()
}

/// 实际运行.
pub fn run() -> AblationResult {
    let frame = FrameConfig::parse("synthetic", cases::TEMPLATE).expect("Template parsing error");
    assert!(frame.supports_repair());

    let dump_dir = utils::paths::dump_dir_from_env();
    if let Some(dir) = dump_dir.as_deref() {
        std::fs::create_dir_all(dir).expect("Dump directory creation error");
    }
    let cases = cases::all_cases();

    println!("Running ablation studies...");
    let configs = configs();
    thread::scope(|s| {
        let handles: Vec<_> = configs
            .iter()
            .map(|(name, config)| {
                let (frame, cases, dump_dir) = (&frame, &cases, dump_dir.as_deref());
                s.spawn(move || profile(name, frame, config, cases, dump_dir))
            })
            .collect();

        AblationResult::from_iter(
            configs.iter().map(|(name, _)| *name).zip(
                handles
                    .into_iter()
                    .map(|th| th.join().expect("Thread joining error")),
            ),
        )
    })
}
