//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx3d, Transform};

pub use crate::data::{
    BoundingBox, Connectivity, ImgWriteVis, MaskSlice, VolumeAttr, VolumeGeometry, VoxelMask,
    VoxelVolume,
};

pub use crate::consts::gray::{MASK_BACKGROUND, MASK_FOREGROUND};
pub use crate::consts::{ElemType, CALIBRATION_OUT_VOLUME};

pub use crate::config::{templates_dir, FrameConfig, RegistrationConfig};

pub use crate::registration::{
    register, register_named, GeometricSolver, RegistrationDriver, RegistrationOutcome,
    SolverRequest, SolverStatus,
};

pub use crate::store::{ImageRole, ImageStore, MemoryStore};
