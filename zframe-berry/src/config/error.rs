//! 配置错误.

use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// 模板配置文件或配准配置的错误. 这类错误对一次配准而言是致命的.
#[derive(Debug)]
pub enum ConfigError {
    /// 读取文件失败.
    Io(PathBuf, std::io::Error),

    /// 缺少 `Template origin` 行.
    MissingTemplateOrigin,

    /// 缺少必需的键. 参数为键名.
    MissingKey(&'static str),

    /// 数值个数不符.
    Arity {
        /// 行号, 从 1 开始.
        line: usize,

        /// 键名.
        key: String,

        /// 应有的数值个数.
        expected: usize,

        /// 实际的数值个数.
        found: usize,
    },

    /// 无法解析的数值.
    InvalidNumber {
        /// 行号, 从 1 开始.
        line: usize,

        /// 原始文本.
        token: String,
    },

    /// `Fiducial N` 中的 `N` 不是正整数. 参数为行号.
    InvalidFiducialId(usize),

    /// 同一个 fiducial 编号出现多次. 参数为编号.
    DuplicateFiducial(u32),

    /// 配置文件中没有任何 fiducial.
    NoFiducials,

    /// 无法确定模板目录.
    NoTemplateDir,

    /// 配准参数不合法. 参数为描述.
    InvalidParameter(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(path, e) => write!(f, "cannot read `{}`: {e}", path.display()),
            Self::MissingTemplateOrigin => f.write_str("missing `Template origin`"),
            Self::MissingKey(key) => write!(f, "missing `{key}`"),
            Self::Arity {
                line,
                key,
                expected,
                found,
            } => write!(
                f,
                "line {line}: `{key}` expects {expected} numbers, found {found}"
            ),
            Self::InvalidNumber { line, token } => {
                write!(f, "line {line}: invalid number `{token}`")
            }
            Self::InvalidFiducialId(line) => write!(f, "line {line}: invalid fiducial id"),
            Self::DuplicateFiducial(id) => write!(f, "fiducial {id} defined more than once"),
            Self::NoFiducials => f.write_str("no fiducial defined"),
            Self::NoTemplateDir => f.write_str("cannot determine the templates directory"),
            Self::InvalidParameter(s) => write!(f, "invalid parameter: {s}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(_, e) => Some(e),
            _ => None,
        }
    }
}
