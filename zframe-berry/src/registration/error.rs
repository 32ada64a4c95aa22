//! 配准的致命错误.

use crate::config::ConfigError;
use crate::store::ImageRole;
use std::fmt::{Display, Formatter};

/// 使配准无法开始的错误. 图像本身的问题不属于此类, 只会使配准失败.
#[derive(Debug)]
pub enum RegistrationError {
    /// 模板配置或配准参数错误.
    Configuration(ConfigError),

    /// 图像库中没有所需角色的扫描.
    MissingVolume(ImageRole),
}

impl Display for RegistrationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(e) => write!(f, "configuration error: {e}"),
            Self::MissingVolume(role) => write!(f, "no {role} volume in the store"),
        }
    }
}

impl std::error::Error for RegistrationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Configuration(e) => Some(e),
            Self::MissingVolume(_) => None,
        }
    }
}

impl From<ConfigError> for RegistrationError {
    fn from(value: ConfigError) -> Self {
        Self::Configuration(value)
    }
}
