//! 模板孔位网格.

use crate::Transform;
use nalgebra::Vector4;

/// 孔位间距缺失时使用的默认值, 以毫米为单位.
pub const DEFAULT_HOLE_OFFSET: f64 = 5.0;

/// 模板上的穿刺孔位网格. 坐标均位于模板 (框架) 坐标系中.
///
/// 第 `col` 列、第 `row` 行的孔位于 `origin + [col * horizontal_offset, row * vertical_offset, 0]`,
/// 列由水平标签索引, 行由垂直标签索引.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TemplateGrid {
    /// 第一个孔的位置.
    pub origin: [f64; 3],

    /// 相邻列之间的距离.
    pub horizontal_offset: f64,

    /// 相邻行之间的距离.
    pub vertical_offset: f64,

    /// 列标签, 如 `A, B, C, ...`.
    pub horizontal_labels: Vec<String>,

    /// 行标签, 如 `1, 2, 3, ...`.
    pub vertical_labels: Vec<String>,
}

impl TemplateGrid {
    /// 网格的 `(行数, 列数)`.
    #[inline]
    pub fn dim(&self) -> (usize, usize) {
        (self.vertical_labels.len(), self.horizontal_labels.len())
    }

    /// 由标签找到孔位的 `(行, 列)` 索引. 任一标签不存在时返回 `None`.
    pub fn hole_index(&self, horizontal: &str, vertical: &str) -> Option<(usize, usize)> {
        let col = self.horizontal_labels.iter().position(|l| l == horizontal)?;
        let row = self.vertical_labels.iter().position(|l| l == vertical)?;
        Some((row, col))
    }

    /// 孔位在模板坐标系中的位置. 任一标签不存在时返回 `None`.
    pub fn hole_position(&self, horizontal: &str, vertical: &str) -> Option<[f64; 3]> {
        let (row, col) = self.hole_index(horizontal, vertical)?;
        let [x, y, z] = self.origin;
        Some([
            x + col as f64 * self.horizontal_offset,
            y + row as f64 * self.vertical_offset,
            z,
        ])
    }

    /// 孔位经配准变换后在扫描 (RAS) 坐标系中的位置. 任一标签不存在时返回 `None`.
    pub fn hole_world(
        &self,
        horizontal: &str,
        vertical: &str,
        transform: &Transform,
    ) -> Option<[f64; 3]> {
        let [x, y, z] = self.hole_position(horizontal, vertical)?;
        let p = transform * Vector4::new(x, y, z, 1.0);
        Some([p.x, p.y, p.z])
    }
}

#[cfg(test)]
mod tests {
    use super::TemplateGrid;
    use crate::Transform;
    use nalgebra::Vector3;

    fn grid() -> TemplateGrid {
        TemplateGrid {
            origin: [-30.0, -30.0, 0.0],
            horizontal_offset: 5.0,
            vertical_offset: 2.5,
            horizontal_labels: ["A", "B", "C"].map(String::from).to_vec(),
            vertical_labels: ["1", "2"].map(String::from).to_vec(),
        }
    }

    #[test]
    fn test_hole_position() {
        let g = grid();
        assert_eq!(g.dim(), (2, 3));
        assert_eq!(g.hole_position("A", "1"), Some([-30.0, -30.0, 0.0]));
        assert_eq!(g.hole_position("C", "2"), Some([-20.0, -27.5, 0.0]));
        assert_eq!(g.hole_position("D", "1"), None);
    }

    #[test]
    fn test_hole_world() {
        let t = Transform::new_translation(&Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(grid().hole_world("B", "2", &t), Some([-24.0, -25.5, 3.0]));
    }
}
