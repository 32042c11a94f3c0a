use crate::spec::DEFAULT_MAX_DEPTH;
use serde::{Deserialize, Serialize};

/// 对象容器的物化方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContainerRepresentation {
    /// 键恰好为 "0".."n-1" 的对象按数组处理
    ArrayPreferring,
    /// 对象始终保持为对象
    #[default]
    ObjectWhenKeyed,
}

/// 解码错误策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorPolicy {
    /// 立即返回错误，终止解码
    #[default]
    Strict,
    /// 将错误记录在结果中，受影响的步骤返回空值
    Lenient,
}

/// 未知或未实现的类型标记的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnknownTagPolicy {
    /// 报告 `UnsupportedTag` 错误
    #[default]
    Reject,
    /// 视为输入结束，静默截断剩余数据
    Truncate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeOptions {
    pub container_representation: ContainerRepresentation,
    pub error_policy: ErrorPolicy,
    pub unknown_tag_policy: UnknownTagPolicy,
    pub max_depth: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            container_representation: ContainerRepresentation::default(),
            error_policy: ErrorPolicy::default(),
            unknown_tag_policy: UnknownTagPolicy::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl DecodeOptions {
    pub fn lenient() -> Self {
        Self::default().with_error_policy(ErrorPolicy::Lenient)
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    pub fn with_container_representation(mut self, repr: ContainerRepresentation) -> Self {
        self.container_representation = repr;
        self
    }

    pub fn with_unknown_tag_policy(mut self, policy: UnknownTagPolicy) -> Self {
        self.unknown_tag_policy = policy;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeOptions {
    pub container_representation: ContainerRepresentation,
    pub max_depth: usize,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            container_representation: ContainerRepresentation::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl EncodeOptions {
    pub fn with_container_representation(mut self, repr: ContainerRepresentation) -> Self {
        self.container_representation = repr;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = DecodeOptions::default();
        assert_eq!(opts.error_policy, ErrorPolicy::Strict);
        assert_eq!(opts.container_representation, ContainerRepresentation::ObjectWhenKeyed);
        assert_eq!(opts.unknown_tag_policy, UnknownTagPolicy::Reject);
        assert_eq!(opts.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(DecodeOptions::lenient().error_policy, ErrorPolicy::Lenient);
    }

    #[test]
    fn test_options_from_json() {
        let opts: DecodeOptions = serde_json::from_str(
            r#"{"container_representation": "array-preferring", "error_policy": "lenient"}"#,
        )
        .unwrap();
        assert_eq!(opts.container_representation, ContainerRepresentation::ArrayPreferring);
        assert_eq!(opts.error_policy, ErrorPolicy::Lenient);
        assert_eq!(opts.max_depth, DEFAULT_MAX_DEPTH);
    }
}
