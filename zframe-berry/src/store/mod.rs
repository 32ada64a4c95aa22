//! 图像库接口及其内存实现.

mod roles;

pub use roles::{ImageRole, ParseRoleError};

use crate::consts::CALIBRATION_OUT_VOLUME;
use crate::{VoxelMask, VoxelVolume};

/// 配准流程所需的图像库.
pub trait ImageStore {
    /// 获取角色为 `role` 的扫描. 不存在时返回 `None`.
    fn volume(&self, role: ImageRole) -> Option<&VoxelVolume>;

    /// 以 `name` 为名称导出掩膜. 同名掩膜会被覆盖.
    fn export_mask(&mut self, name: &str, mask: &VoxelMask);
}

/// 图像库中的一项.
#[derive(Debug, Clone)]
struct Entry {
    name: String,
    role: ImageRole,
    volume: VoxelVolume,
}

/// 内存中的图像库. 图像按加入顺序编号.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Vec<Entry>,
    exported: Vec<(String, VoxelMask)>,
}

impl MemoryStore {
    /// 创建空图像库.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 加入一幅扫描, 并按名称自动分配角色. 返回其编号.
    ///
    /// 名为 [`CALIBRATION_OUT_VOLUME`] 的图像不会被加入列表, 此时返回 `None`.
    pub fn add_volume(&mut self, name: &str, volume: VoxelVolume) -> Option<usize> {
        if name == CALIBRATION_OUT_VOLUME {
            return None;
        }
        let index = self.entries.len();
        self.entries.push(Entry {
            name: name.to_string(),
            role: ImageRole::NotAssigned,
            volume,
        });
        let role = ImageRole::from_name(name);
        if role != ImageRole::NotAssigned {
            self.assign_role(index, role);
        }
        Some(index)
    }

    /// 为编号 `index` 的图像分配角色. 独占角色会先从其他图像上移除.
    ///
    /// `index` 越界时返回 `false`.
    pub fn assign_role(&mut self, index: usize, role: ImageRole) -> bool {
        if index >= self.entries.len() {
            return false;
        }
        if role.is_exclusive() {
            for e in self.entries.iter_mut().filter(|e| e.role == role) {
                log::debug!("`{}` 不再是 {role} 图像", e.name);
                e.role = ImageRole::NotAssigned;
            }
        }
        self.entries[index].role = role;
        log::info!("`{}` 被指定为 {role} 图像", self.entries[index].name);
        true
    }

    /// 编号 `index` 的图像的角色.
    #[inline]
    pub fn role_of(&self, index: usize) -> Option<ImageRole> {
        self.entries.get(index).map(|e| e.role)
    }

    /// 编号 `index` 的图像的名称.
    #[inline]
    pub fn name_of(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|e| e.name.as_str())
    }

    /// 图像个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否为空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 获取导出的掩膜.
    pub fn exported(&self, name: &str) -> Option<&VoxelMask> {
        self.exported
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, m)| m)
    }
}

impl ImageStore for MemoryStore {
    fn volume(&self, role: ImageRole) -> Option<&VoxelVolume> {
        self.entries
            .iter()
            .find(|e| e.role == role)
            .map(|e| &e.volume)
    }

    fn export_mask(&mut self, name: &str, mask: &VoxelMask) {
        match self.exported.iter_mut().find(|(n, _)| n == name) {
            Some((_, m)) => *m = mask.clone(),
            None => self.exported.push((name.to_string(), mask.clone())),
        }
    }
}
