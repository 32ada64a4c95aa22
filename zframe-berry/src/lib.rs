#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 在 3D 扫描上检测 Z-frame 标定框架的 fiducial 标记,
//! 借助外部几何求解器得到模板 (设备) 坐标系到扫描 (病人) 坐标系的刚体变换,
//! 并在标记检测不完整时校验、修复和重试.
//!
//! 该 crate 只负责决定 **何时**、**以何种输入**、**调用几次** 外部求解器,
//! 以及如何判定结果是否可信. 求解器本身对该 crate 而言是不透明的.
//!
//! # 注意
//!
//! 1. 体数据一律按照 `(z, h, w)` 模式访问. `z` 为相邻切片方向 (IJK 中的 k),
//!   `h` 为切片的垂直方向 (j), `w` 为切片的水平方向 (i).
//! 2. 掩膜只允许存在 0, 1 两种体素值.
//! 3. 图像本身的变化 (阈值不合适, fiducial 缺失等) 不会导致 panic,
//!   只有模板配置文件错误和缺少标定图像会以 `Err` 的形式返回给调用者.
//!
//! # 开发计划
//!
//! ### 阈值 + 岛屿尺寸过滤的掩膜提取 ✅
//!
//! 按扫描强度范围的比例取阈值, 再只保留体素个数落在 `[min, max)` 的岛屿.
//!
//! 实现位于 `zframe-berry/src/extract`.
//!
//! ### 边缘岛屿清除 ✅
//!
//! 反复洪泛删除接触水平切片边缘的岛屿, 直到边缘区域没有前景.
//!
//! 实现位于 `zframe-berry/src/extract/border.rs`.
//!
//! ### fiducial 计数与包围盒校验 ✅
//!
//! 实现位于 `zframe-berry/src/fiducial/count.rs`.
//!
//! ### 缺失 fiducial 修复 ✅
//!
//! 仅支持 7-fiducial 模板, 且只修复 1 到 2 个缺失标记.
//!
//! 实现位于 `zframe-berry/src/fiducial/repair.rs`.
//!
//! ### 阈值扫描 + 修复的配准流程 ✅
//!
//! 1. 普通模式: 阈值先降后升, 同一个值在一次配准中不会出现两次; ✅
//! 2. 修复模式: 独立的阈值扫描, 找到第一个可修复的掩膜后只调用一次求解器; ✅
//! 3. 求解前中心裁剪为 256 x 256, 求解后可选地去除旋转分量. ✅
//!
//! 实现位于 `zframe-berry/src/registration`.
//!
//! ### 模板配置文件解析 ✅
//!
//! 包括框架拓扑, fiducial 包围盒和模板孔位网格.
//!
//! 实现位于 `zframe-berry/src/config`.
//!
//! ### 图像角色分配 ✅
//!
//! 实现位于 `zframe-berry/src/store`.
//!
//! ### 求解器超时 ⌛️
//!
//! 目前外部求解器的调用是阻塞的, 一旦求解器卡死, 整个流程都会卡死.
//! 需要在 [`registration::GeometricSolver`] 上增加带超时的调用方式.

use nalgebra::Matrix4;

/// 二维索引 `(h, w)`, 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 三维索引 `(z, h, w)`, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

/// 一个三维岛屿 (连通区域) 的全部体素索引.
pub type Area3d = Vec<Idx3d>;

/// 多个三维岛屿.
pub type Areas3d = Vec<Area3d>;

/// 4x4 齐次变换矩阵. 配准结果即为这种矩阵.
pub type Transform = Matrix4<f64>;

/// 体数据, 掩膜和切片.
mod data;

pub use data::{
    BoundingBox, Connectivity, ImgWriteVis, LoadVolumeError, MaskSlice, RectIter, VolumeAttr,
    VolumeGeometry, VoxelMask, VoxelVolume,
};

pub mod consts;

pub mod config;

pub mod extract;

pub mod fiducial;

pub mod registration;

pub mod store;

pub mod prelude;

#[cfg(test)]
pub(crate) mod test_utils;
