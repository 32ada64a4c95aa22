//! Z-frame 模板配置文件.
//!
//! 配置文件是逐行的文本, 每行由键和数值组成, 键和数值之间可以用 `:` 分隔.
//! `#` 开头的行为注释. 例如:
//!
//! ```text
//! # Z-frame, 7 fiducials
//! Side 1: [30, 30, 0]
//! Side 2: [-30, 30, 0]
//! Base: [-30, -30, 0]
//! Fiducial 1: 10, 10, -30, 12, 12, 30
//! Template origin: -30, -30, 0
//! Horizontal offset: 5
//! Vertical offset: 5
//! Horizontal labels: A, B, C, D
//! Vertical labels: 1, 2, 3, 4
//! ```

use super::error::ConfigError;
use super::template::{TemplateGrid, DEFAULT_HOLE_OFFSET};
use crate::consts::REPAIRABLE_FIDUCIAL_COUNT;
use std::collections::BTreeMap;
use std::path::Path;

/// 不带 `:` 时用于识别键的前缀. 较长的键在前.
const KNOWN_KEYS: [&str; 8] = [
    "Horizontal offset",
    "Horizontal labels",
    "Vertical offset",
    "Vertical labels",
    "Template origin",
    "Side 1",
    "Side 2",
    "Base",
];

const FIDUCIAL_KEY: &str = "Fiducial";

/// 框架拓扑: 三个定义框架形状的三维向量.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrameTopology {
    /// `Side 1`.
    pub side1: [f64; 3],

    /// `Side 2`.
    pub side2: [f64; 3],

    /// `Base`.
    pub base: [f64; 3],
}

impl FrameTopology {
    /// 框架的理论宽度, 即 `|side1.x - side2.x|`, 以毫米为单位.
    #[inline]
    pub fn expected_width(&self) -> f64 {
        (self.side1[0] - self.side2[0]).abs()
    }

    /// 框架的理论高度, 即 `|side2.y - base.y|`, 以毫米为单位.
    #[inline]
    pub fn expected_height(&self) -> f64 {
        (self.side2[1] - self.base[1]).abs()
    }

    /// 按照求解器接受的格式序列化, 如 `[30, 30, 0], [-30, 30, 0], [-30, -30, 0]`.
    pub fn to_solver_string(&self) -> String {
        let vec = |v: &[f64; 3]| format!("[{}, {}, {}]", v[0], v[1], v[2]);
        format!(
            "{}, {}, {}",
            vec(&self.side1),
            vec(&self.side2),
            vec(&self.base)
        )
    }
}

/// 一个 fiducial 在框架坐标系中的包围盒.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FiducialBox {
    /// 编号, 即 `Fiducial N` 中的 `N`.
    pub id: u32,

    /// 两个对角顶点 `[x0, y0, z0, x1, y1, z1]`.
    pub corners: [f64; 6],
}

impl FiducialBox {
    /// 包围盒中心.
    #[inline]
    pub fn midpoint(&self) -> [f64; 3] {
        let c = &self.corners;
        [
            (c[0] + c[3]) / 2.0,
            (c[1] + c[4]) / 2.0,
            (c[2] + c[5]) / 2.0,
        ]
    }
}

/// 按编号升序排列的全部 fiducial 包围盒.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FiducialSpec {
    boxes: Vec<FiducialBox>,
}

impl FiducialSpec {
    /// 由包围盒直接创建, 会按编号排序.
    pub fn new(mut boxes: Vec<FiducialBox>) -> Self {
        boxes.sort_by_key(|b| b.id);
        Self { boxes }
    }

    /// fiducial 个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    /// 是否没有任何 fiducial.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// 按编号升序迭代.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, FiducialBox> {
        self.boxes.iter()
    }

    /// 按照求解器接受的格式列出编号, 如 `1,2,3`.
    pub fn ids_string(&self) -> String {
        self.boxes
            .iter()
            .map(|b| b.id.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// 一个完整的模板配置.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrameConfig {
    /// 模板名称, 通常为配置文件名 (不含扩展名).
    pub id: String,

    /// 框架拓扑.
    pub topology: FrameTopology,

    /// fiducial 包围盒.
    pub fiducials: FiducialSpec,

    /// 孔位网格.
    pub grid: TemplateGrid,
}

/// 把一行拆成 `(键, 值)`. 空行和注释行返回 `None`.
fn split_line(line: &str) -> Option<(String, &str)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    if let Some((key, value)) = line.split_once(':') {
        return Some((key.trim().to_string(), value));
    }
    if let Some(rest) = line.strip_prefix(FIDUCIAL_KEY) {
        let rest = rest.trim_start();
        let (id, value) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        return Some((format!("{FIDUCIAL_KEY} {id}"), value));
    }
    if let Some(key) = KNOWN_KEYS.iter().find(|k| line.starts_with(*k)) {
        return Some((key.to_string(), &line[key.len()..]));
    }
    let (key, value) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    Some((key.to_string(), value))
}

/// 提取所有数值. 数值之间可以用逗号、空白、方括号或分号分隔.
fn numbers(line: usize, value: &str) -> Result<Vec<f64>, ConfigError> {
    value
        .split(|c: char| c == ',' || c == '[' || c == ']' || c == ';' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .map(|t| {
            t.parse::<f64>().map_err(|_| ConfigError::InvalidNumber {
                line,
                token: t.to_string(),
            })
        })
        .collect()
}

/// 提取恰好 `N` 个数值.
fn exact<const N: usize>(line: usize, key: &str, value: &str) -> Result<[f64; N], ConfigError> {
    let v = numbers(line, value)?;
    v.as_slice().try_into().map_err(|_| ConfigError::Arity {
        line,
        key: key.to_string(),
        expected: N,
        found: v.len(),
    })
}

/// 提取标签. 标签之间可以用逗号或空白分隔.
fn labels(value: &str) -> Vec<String> {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

impl FrameConfig {
    /// 从配置文件内容解析. `id` 为模板名称.
    pub fn parse(id: &str, text: &str) -> Result<Self, ConfigError> {
        let mut side1 = None;
        let mut side2 = None;
        let mut base = None;
        let mut origin = None;
        let mut h_offset = None;
        let mut v_offset = None;
        let mut h_labels = Vec::new();
        let mut v_labels = Vec::new();
        let mut fiducials = BTreeMap::new();

        for (idx, raw) in text.lines().enumerate() {
            let line = idx + 1;
            let Some((key, value)) = split_line(raw) else {
                continue;
            };
            match key.as_str() {
                "Side 1" => side1 = Some(exact::<3>(line, &key, value)?),
                "Side 2" => side2 = Some(exact::<3>(line, &key, value)?),
                "Base" => base = Some(exact::<3>(line, &key, value)?),
                "Template origin" => origin = Some(exact::<3>(line, &key, value)?),
                "Horizontal offset" => h_offset = Some(exact::<1>(line, &key, value)?[0]),
                "Vertical offset" => v_offset = Some(exact::<1>(line, &key, value)?[0]),
                "Horizontal labels" => h_labels = labels(value),
                "Vertical labels" => v_labels = labels(value),
                k if k.starts_with(FIDUCIAL_KEY) => {
                    let fid = k[FIDUCIAL_KEY.len()..]
                        .trim()
                        .parse::<u32>()
                        .ok()
                        .filter(|n| *n > 0)
                        .ok_or(ConfigError::InvalidFiducialId(line))?;
                    let corners = exact::<6>(line, &key, value)?;
                    if fiducials.insert(fid, corners).is_some() {
                        return Err(ConfigError::DuplicateFiducial(fid));
                    }
                }
                other => log::debug!("{id}: 第 {line} 行, 忽略未知的键 `{other}`"),
            }
        }

        let origin = origin.ok_or(ConfigError::MissingTemplateOrigin)?;
        let topology = FrameTopology {
            side1: side1.ok_or(ConfigError::MissingKey("Side 1"))?,
            side2: side2.ok_or(ConfigError::MissingKey("Side 2"))?,
            base: base.ok_or(ConfigError::MissingKey("Base"))?,
        };
        if fiducials.is_empty() {
            return Err(ConfigError::NoFiducials);
        }
        let fiducials = FiducialSpec::new(
            fiducials
                .into_iter()
                .map(|(id, corners)| FiducialBox { id, corners })
                .collect(),
        );

        let offset_or_default = |v: Option<f64>, name: &str| {
            v.unwrap_or_else(|| {
                log::warn!("{id}: 缺少 `{name}`, 使用默认值 {DEFAULT_HOLE_OFFSET}");
                DEFAULT_HOLE_OFFSET
            })
        };
        let grid = TemplateGrid {
            origin,
            horizontal_offset: offset_or_default(h_offset, "Horizontal offset"),
            vertical_offset: offset_or_default(v_offset, "Vertical offset"),
            horizontal_labels: h_labels,
            vertical_labels: v_labels,
        };

        Ok(Self {
            id: id.to_string(),
            topology,
            fiducials,
            grid,
        })
    }

    /// 打开配置文件. 模板名称取文件名 (不含扩展名).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::parse(&id, &text)
    }

    /// 打开模板目录 (见 [`super::templates_dir`]) 下的 `{name}.txt`.
    pub fn open_named(name: &str) -> Result<Self, ConfigError> {
        let dir = super::templates_dir().ok_or(ConfigError::NoTemplateDir)?;
        Self::open(dir.join(format!("{name}.txt")))
    }

    /// 该模板是否支持缺失 fiducial 修复. 只有恰好 7 个 fiducial 的模板支持.
    #[inline]
    pub fn supports_repair(&self) -> bool {
        self.fiducials.len() == REPAIRABLE_FIDUCIAL_COUNT
    }
}
