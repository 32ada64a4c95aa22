//! 掩膜水平切片的操作.

mod core;
mod iter;
mod save;

pub use core::{BoundingBox, MaskSlice};

pub use iter::RectIter;

pub use save::ImgWriteVis;
