use std::fmt::{Display, Formatter};
use std::ops::{Index, Range};
use std::path::Path;

use itertools::{Itertools, MinMaxResult};
use nalgebra::{Matrix3, Matrix4, Quaternion, UnitQuaternion, Vector3, Vector4};
use ndarray::{s, Array3, ArrayView3, ArrayViewMut3, Axis, Ix3};
use ndarray_npy::WriteNpyError;
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};
use ordered_float::OrderedFloat;

use crate::consts::{gray::*, ElemType};
use crate::{Idx2d, Idx3d};

mod draw;
mod island;
mod slice;

pub use island::Connectivity;
pub use slice::{BoundingBox, ImgWriteVis, MaskSlice, RectIter};

/// 体数据的空间几何信息, 即 IJK -> RAS 仿射矩阵及其逆矩阵.
///
/// 矩阵按照 `[i, j, k, 1]` 的齐次坐标作用, 其中 `i, j, k` 分别对应
/// `w, h, z` 三个索引分量.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeGeometry {
    ijk_to_ras: Matrix4<f64>,
    ras_to_ijk: Matrix4<f64>,
}

impl VolumeGeometry {
    /// 由体素间距与原点构造坐标轴对齐的几何信息.
    ///
    /// `spacing` 和 `origin` 都按照 `[i, j, k]` (即 `[w, h, z]`) 排列, 间距以毫米为单位.
    /// 任一间距不是正的有限值时返回 `None`.
    pub fn axis_aligned(spacing: [f64; 3], origin: [f64; 3]) -> Option<Self> {
        if !spacing.iter().all(|s| s.is_finite() && *s > 0.0) {
            return None;
        }
        let [si, sj, sk] = spacing;
        let [ox, oy, oz] = origin;
        #[rustfmt::skip]
        let m = Matrix4::new(
            si, 0.0, 0.0, ox,
            0.0, sj, 0.0, oy,
            0.0, 0.0, sk, oz,
            0.0, 0.0, 0.0, 1.0,
        );
        Self::from_ijk_to_ras(m)
    }

    /// 由 IJK -> RAS 矩阵直接构造. 矩阵不可逆时返回 `None`.
    pub fn from_ijk_to_ras(ijk_to_ras: Matrix4<f64>) -> Option<Self> {
        let ras_to_ijk = ijk_to_ras.try_inverse()?;
        Some(Self {
            ijk_to_ras,
            ras_to_ijk,
        })
    }

    /// IJK -> RAS 矩阵.
    #[inline]
    pub fn ijk_to_ras(&self) -> &Matrix4<f64> {
        &self.ijk_to_ras
    }

    /// RAS -> IJK 矩阵.
    #[inline]
    pub fn ras_to_ijk(&self) -> &Matrix4<f64> {
        &self.ras_to_ijk
    }

    /// 体素间距, 按照 `[i, j, k]` 排列, 以毫米为单位.
    pub fn spacing(&self) -> [f64; 3] {
        [0, 1, 2].map(|c| {
            let col = self.ijk_to_ras.column(c);
            (col[0].powi(2) + col[1].powi(2) + col[2].powi(2)).sqrt()
        })
    }

    /// 索引 `(0, 0, 0)` 体素中心的 RAS 坐标.
    #[inline]
    pub fn origin(&self) -> [f64; 3] {
        self.index_to_ras((0, 0, 0))
    }

    /// 将 RAS 坐标转换为连续的 `(z, h, w)` 索引坐标 (未取整).
    pub fn ras_to_index(&self, [x, y, z]: [f64; 3]) -> [f64; 3] {
        let p = self.ras_to_ijk * Vector4::new(x, y, z, 1.0);
        [p.z, p.y, p.x]
    }

    /// 获取 `(z, h, w)` 体素中心的 RAS 坐标.
    pub fn index_to_ras(&self, (z, h, w): Idx3d) -> [f64; 3] {
        let p = self.ijk_to_ras * Vector4::new(w as f64, h as f64, z as f64, 1.0);
        [p.x, p.y, p.z]
    }

    /// 把索引原点移动到 `offset`, 使新索引 `p` 与原索引 `p + offset` 对应同一个 RAS 坐标.
    pub(crate) fn shifted(&self, (z, h, w): Idx3d) -> Self {
        let origin = self.ijk_to_ras * Vector4::new(w as f64, h as f64, z as f64, 1.0);
        let mut ijk_to_ras = self.ijk_to_ras;
        ijk_to_ras.set_column(3, &origin);

        // ijk' = ijk - offset
        let mut ras_to_ijk = self.ras_to_ijk;
        ras_to_ijk[(0, 3)] -= w as f64;
        ras_to_ijk[(1, 3)] -= h as f64;
        ras_to_ijk[(2, 3)] -= z as f64;
        Self {
            ijk_to_ras,
            ras_to_ijk,
        }
    }

    /// 从 nifti header 中恢复 IJK -> RAS 矩阵. 优先使用 sform, 其次 qform,
    /// 都不存在时退化为只有体素间距的对角矩阵.
    fn from_nifti_header(h: &NiftiHeader) -> Option<Self> {
        let pix = h.pixdim.map(f64::from);
        let m = if h.sform_code > 0 {
            let [x, y, z] = [h.srow_x, h.srow_y, h.srow_z].map(|r| r.map(f64::from));
            #[rustfmt::skip]
            let m = Matrix4::new(
                x[0], x[1], x[2], x[3],
                y[0], y[1], y[2], y[3],
                z[0], z[1], z[2], z[3],
                0.0, 0.0, 0.0, 1.0,
            );
            m
        } else if h.qform_code > 0 {
            let (b, c, d) = (
                f64::from(h.quatern_b),
                f64::from(h.quatern_c),
                f64::from(h.quatern_d),
            );
            let a = (1.0 - (b * b + c * c + d * d)).max(0.0).sqrt();
            let rot = UnitQuaternion::from_quaternion(Quaternion::new(a, b, c, d));
            let qfac = if pix[0] < 0.0 { -1.0 } else { 1.0 };
            let scale = Matrix3::from_diagonal(&Vector3::new(pix[1], pix[2], pix[3] * qfac));
            let r = rot.to_rotation_matrix().into_inner() * scale;

            let mut m = Matrix4::identity();
            for (row, col) in itertools::iproduct!(0..3, 0..3) {
                m[(row, col)] = r[(row, col)];
            }
            m[(0, 3)] = f64::from(h.quatern_x);
            m[(1, 3)] = f64::from(h.quatern_y);
            m[(2, 3)] = f64::from(h.quatern_z);
            m
        } else {
            Matrix4::from_diagonal(&Vector4::new(pix[1], pix[2], pix[3], 1.0))
        };
        Self::from_ijk_to_ras(m)
    }
}

/// 3D 体数据 (扫描或掩膜) 的共用属性和部分通用操作.
pub trait VolumeAttr {
    /// 获取空间几何信息.
    fn geometry(&self) -> &VolumeGeometry;

    /// 获取数据形状大小 `(z, h, w)`.
    fn shape(&self) -> Idx3d;

    /// 获取数据水平切片形状大小.
    #[inline]
    fn slice_shape(&self) -> Idx2d {
        let (_, h, w) = self.shape();
        (h, w)
    }

    /// 获取水平切片个数.
    #[inline]
    fn len_z(&self) -> usize {
        self.shape().0
    }

    /// 获取数据体素个数.
    #[inline]
    fn size(&self) -> usize {
        let (z, h, w) = self.shape();
        z * h * w
    }

    /// 检查索引是否合法.
    #[inline]
    fn check(&self, (z0, h0, w0): &Idx3d) -> bool {
        let (z, h, w) = self.shape();
        *z0 < z && *h0 < h && *w0 < w
    }

    /// 获取单个体素分辨率. 该分辨率以毫米为单位, 分别代表空间 (相邻切片方向),
    /// 高 (切片的垂直方向), 宽 (切片的水平方向).
    #[inline]
    fn pix_dim(&self) -> [f64; 3] {
        let [i, j, k] = self.geometry().spacing();
        [k, j, i]
    }

    /// 获取 width 方向体素分辨率, 以毫米为单位.
    #[inline]
    fn width_mm(&self) -> f64 {
        self.pix_dim()[2]
    }

    /// 获取 height 方向体素分辨率, 以毫米为单位.
    #[inline]
    fn height_mm(&self) -> f64 {
        self.pix_dim()[1]
    }

    /// 获取空间方向 (相邻切片方向) 体素分辨率, 以毫米为单位.
    #[inline]
    fn z_mm(&self) -> f64 {
        self.pix_dim()[0]
    }
}

/// 打开 nifti 体数据时的错误.
#[derive(Debug)]
pub enum LoadVolumeError {
    /// nifti 文件读取或解码错误.
    Nifti(nifti::NiftiError),

    /// 体数据形状无法转换为三维.
    Shape(ndarray::ShapeError),

    /// 不是三维数据. 参数为实际维度数.
    NotVolume(usize),

    /// header 中的仿射矩阵不可逆.
    SingularAffine,
}

impl Display for LoadVolumeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nifti(e) => write!(f, "nifti error: {e}"),
            Self::Shape(e) => write!(f, "shape error: {e}"),
            Self::NotVolume(n) => write!(f, "expected a 3D volume, found {n} dimensions"),
            Self::SingularAffine => f.write_str("IJK to RAS matrix is singular"),
        }
    }
}

impl std::error::Error for LoadVolumeError {}

impl From<nifti::NiftiError> for LoadVolumeError {
    fn from(value: nifti::NiftiError) -> Self {
        Self::Nifti(value)
    }
}

impl From<ndarray::ShapeError> for LoadVolumeError {
    fn from(value: ndarray::ShapeError) -> Self {
        Self::Shape(value)
    }
}

/// 3D 扫描, 包括空间几何信息和标量强度. 强度以 `f32` 保存.
#[derive(Debug, Clone)]
pub struct VoxelVolume {
    geometry: VolumeGeometry,
    data: Array3<f32>,
}

impl VolumeAttr for VoxelVolume {
    #[inline]
    fn geometry(&self) -> &VolumeGeometry {
        &self.geometry
    }

    #[inline]
    fn shape(&self) -> Idx3d {
        self.data.dim()
    }
}

impl Index<Idx3d> for VoxelVolume {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl VoxelVolume {
    /// 由 `(z, h, w)` 排列的强度数据和几何信息直接创建.
    #[inline]
    pub fn new(data: Array3<f32>, geometry: VolumeGeometry) -> Self {
        Self { geometry, data }
    }

    /// 打开 nii 文件格式的 3D 扫描. `path` 为 nii 文件的本地路径.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LoadVolumeError> {
        let obj = ReaderOptions::new().read_file(path.as_ref())?;
        let geometry = VolumeGeometry::from_nifti_header(obj.header())
            .ok_or(LoadVolumeError::SingularAffine)?;

        let data = obj.into_volume().into_ndarray::<f32>()?;
        if data.ndim() != 3 {
            return Err(LoadVolumeError::NotVolume(data.ndim()));
        }

        // [W, H, z] -> [z, H, W].
        let data = data
            .permuted_axes([2, 1, 0].as_slice())
            .into_dimensionality::<Ix3>()?
            .as_standard_layout()
            .into_owned();
        Ok(Self { geometry, data })
    }

    /// 获取有限强度值的最小值和最大值. 若不存在有限值则返回 `None`.
    pub fn scalar_range(&self) -> Option<(f32, f32)> {
        match self
            .data
            .iter()
            .filter(|v| v.is_finite())
            .map(|v| OrderedFloat(*v))
            .minmax()
        {
            MinMaxResult::NoElements => None,
            MinMaxResult::OneElement(v) => Some((v.0, v.0)),
            MinMaxResult::MinMax(lo, hi) => Some((lo.0, hi.0)),
        }
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView3<'_, f32> {
        self.data.view()
    }

    /// 获得数据的一份可变 shallow copy.
    #[inline]
    pub fn data_mut(&mut self) -> ArrayViewMut3<'_, f32> {
        self.data.view_mut()
    }
}

/// 3D 二值掩膜. 体素值只能是 [`MASK_BACKGROUND`] 或 [`MASK_FOREGROUND`],
/// 形状和几何信息与其来源扫描一致.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelMask {
    geometry: VolumeGeometry,
    data: Array3<u8>,
}

impl VolumeAttr for VoxelMask {
    #[inline]
    fn geometry(&self) -> &VolumeGeometry {
        &self.geometry
    }

    #[inline]
    fn shape(&self) -> Idx3d {
        self.data.dim()
    }
}

impl Index<Idx3d> for VoxelMask {
    type Output = u8;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl VoxelMask {
    /// 创建全背景掩膜.
    #[inline]
    pub fn zeros(shape: Idx3d, geometry: VolumeGeometry) -> Self {
        Self {
            geometry,
            data: Array3::zeros(shape),
        }
    }

    /// 创建与 `volume` 形状、几何信息相同的全背景掩膜.
    #[inline]
    pub fn zeros_like<V: VolumeAttr>(volume: &V) -> Self {
        Self::zeros(volume.shape(), volume.geometry().clone())
    }

    /// 由 `(z, h, w)` 排列的原始数据创建. 所有非零体素都被视为前景.
    pub fn from_raw(mut data: Array3<u8>, geometry: VolumeGeometry) -> Self {
        data.mapv_inplace(|p| if p == 0 { MASK_BACKGROUND } else { MASK_FOREGROUND });
        Self { geometry, data }
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView3<'_, u8> {
        self.data.view()
    }

    /// 获得数据的一份可变 shallow copy. 调用者负责保持二值性.
    #[inline]
    pub(crate) fn data_mut(&mut self) -> ArrayViewMut3<'_, u8> {
        self.data.view_mut()
    }

    /// 获取第 `z_index` 层水平切片.
    ///
    /// 当 `z_index` 越界时 panic.
    #[inline]
    pub fn slice_at(&self, z_index: usize) -> MaskSlice<'_> {
        MaskSlice::new(self.data.index_axis(Axis(0), z_index))
    }

    /// 获取能按升序迭代水平切片的迭代器.
    #[inline]
    pub fn slice_iter(&self) -> impl ExactSizeIterator<Item = MaskSlice<'_>> {
        self.data.axis_iter(Axis(0)).map(MaskSlice::new)
    }

    /// 将 `pos` 设置为前景. 越界时 panic.
    #[inline]
    pub fn set_foreground(&mut self, pos: Idx3d) {
        self.data[pos] = MASK_FOREGROUND;
    }

    /// 将 `pos` 设置为背景. 越界时 panic.
    #[inline]
    pub fn set_background(&mut self, pos: Idx3d) {
        self.data[pos] = MASK_BACKGROUND;
    }

    /// 获取 `pos` 处的体素类型. 越界时返回 `None`.
    #[inline]
    pub fn elem_at(&self, pos: Idx3d) -> Option<ElemType> {
        self.data.get(pos).map(|&p| ElemType::from(p))
    }

    /// `pos` 是否是前景. 越界时返回 `false`.
    #[inline]
    pub fn is_foreground_at(&self, pos: Idx3d) -> bool {
        self.elem_at(pos).is_some_and(|e| e.is_foreground())
    }

    /// 前景体素个数.
    #[inline]
    pub fn foreground_count(&self) -> usize {
        self.data.iter().filter(|p| is_foreground(**p)).count()
    }

    /// 该掩膜是否为全背景?
    #[inline]
    pub fn is_all_background(&self) -> bool {
        self.data.iter().copied().all(is_background)
    }

    /// 收集所有前景体素的索引. 结果按行优先存储.
    pub fn foreground_pos(&self) -> Vec<Idx3d> {
        self.data
            .indexed_iter()
            .filter_map(|(pos, p)| is_foreground(*p).then_some(pos))
            .collect()
    }

    /// 前景在 `z` 方向的质心. 掩膜是二值的, 因此等价于前景 `z` 索引的平均值.
    /// 若不存在前景则返回 `None`.
    pub fn centroid_z(&self) -> Option<f64> {
        let (mut cnt, mut sum) = (0u64, 0.0);
        for ((z, _, _), _) in self.data.indexed_iter().filter(|(_, p)| is_foreground(**p)) {
            cnt += 1;
            sum += z as f64;
        }
        (cnt != 0).then(|| sum / cnt as f64)
    }

    /// 含有前景的最低、最高水平切片索引 (闭区间). 若不存在前景则返回 `None`.
    pub fn foreground_z_range(&self) -> Option<(usize, usize)> {
        let mut it = self
            .slice_iter()
            .enumerate()
            .filter(|(_, s)| !s.is_background())
            .map(|(z, _)| z);
        let first = it.next()?;
        Some((first, it.last().unwrap_or(first)))
    }

    /// 在水平方向上裁剪出 `h` 行和 `w` 列 (所有切片均保留),
    /// 并平移几何原点使每个体素的 RAS 坐标保持不变.
    ///
    /// 范围越界时 panic.
    pub fn cropped(&self, h: Range<usize>, w: Range<usize>) -> Self {
        let geometry = self.geometry.shifted((0, h.start, w.start));
        let data = self.data.slice(s![.., h, w]).to_owned();
        Self { geometry, data }
    }

    /// 从 `self` 中去掉 `other` 的前景. 返回被去掉的体素个数.
    ///
    /// 两个掩膜形状不一致时 panic.
    pub fn subtract(&mut self, other: &VoxelMask) -> usize {
        assert_eq!(self.shape(), other.shape(), "掩膜形状不一致");
        let mut cnt = 0usize;
        self.data
            .iter_mut()
            .zip(other.data.iter())
            .filter(|(p, q)| is_foreground(**p) && is_foreground(**q))
            .for_each(|(p, _)| {
                cnt += 1;
                *p = MASK_BACKGROUND;
            });
        cnt
    }

    /// 将掩膜数据按 `(z, h, w)` 排列保存为 npy 文件, 便于离线检查.
    pub fn write_npy<P: AsRef<Path>>(&self, path: P) -> Result<(), WriteNpyError> {
        ndarray_npy::write_npy(path, &self.data)
    }
}
