//! # UBJSON - Universal Binary JSON (草案格式)
//!
//! 实现早期草案版本的 UBJSON 二进制编码：与 JSON 相同的值空间，
//! 使用单字节类型标记和长度前缀代替文本分隔符。
//!
//! - **紧凑的整数编码**：自动选择 1/2/4 字节中最窄的宽度
//! - **网络字节序**：所有多字节数值均为大端序，与主机字节序无关
//! - **严格/宽松两种错误策略**：错误随每次调用返回，没有全局状态
//! - **Serde 集成**：支持任意 Rust 类型与 `UbjValue` 互转
//!
//! ## 快速开始
//!
//! ```rust,ignore
//! use ubjson_codec::{decode, encode_to_vec, ubj};
//!
//! let value = ubj!({ "name": "ubjson", "version": 1 });
//! let bytes = encode_to_vec(&value).unwrap();
//! assert_eq!(decode(&bytes).unwrap(), Some(value));
//! ```
//!
//! ## 限制
//!
//! - 不支持 64 位整数 (`L`) 与 64 位浮点数 (`D`)，浮点数一律以 32 位传输
//! - 不支持后续草案中的强类型/带计数容器，只实现 `[ ]` 与 `{ }` 定界容器
//! - 解码需要完整的输入缓冲区，不支持流式解码

pub mod spec;
pub mod numeric;
pub mod value;
pub mod options;
pub mod codec;
pub mod tokenizer;
pub mod decoder;
pub mod ser;
pub mod de;
pub mod json;

pub use codec::{encode, encode_to_vec, encode_with, from_slice, to_vec};
pub use decoder::{decode, decode_all, decode_with, Decoded};
pub use options::{ContainerRepresentation, DecodeOptions, EncodeOptions, ErrorPolicy, UnknownTagPolicy};
pub use tokenizer::{Cursor, Token, Tokenizer};
pub use value::{EntryKey, UbjValue};

use thiserror::Error;

/// UBJSON 操作的错误类型
///
/// 解码错误与编码错误共用一个枚举，可通过 [`UbjsonError::kind`] 区分
#[derive(Error, Debug)]
pub enum UbjsonError {
    /// 标记所需的负载超出了缓冲区末尾
    #[error("Unexpected end of input at offset {offset}: need {need} bytes, have {have}")]
    UnexpectedEof { offset: usize, need: usize, have: usize },

    /// 字符串长度前缀不是四种整数标记之一，或长度为负
    #[error("Malformed length prefix at offset {offset}: marker 0x{marker:02x}")]
    MalformedLengthPrefix { offset: usize, marker: u8 },

    /// 当前位置出现了不允许的标记（例如对象中的非字符串键）
    #[error("Unexpected token at offset {offset}: {found}")]
    UnexpectedToken { offset: usize, found: String },

    /// 未知或未实现的类型标记 (`L`, `D`, `N` 等)
    #[error("Unsupported type marker 0x{marker:02x} at offset {offset}")]
    UnsupportedTag { offset: usize, marker: u8 },

    /// 嵌套层级过深
    #[error("Nesting too deep: max {0}")]
    NestingTooDeep(usize),

    /// 整数超出 32 位有符号范围，无法编码
    #[error("Integer out of range: {0} does not fit in 32 signed bits")]
    IntegerOutOfRange(i128),

    /// 值类型在 UBJSON 值模型中没有对应
    #[error("Unsupported value kind: {0}")]
    UnsupportedValueKind(String),

    /// 序列化过程错误
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// 反序列化过程错误
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// JSON 转换错误
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// 错误所属的方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    Decoding,
    Encoding,
}

impl UbjsonError {
    /// 判断错误属于解码还是编码
    ///
    /// # Brief
    /// 嵌套过深在两个方向都可能出现，按解码处理；serde 桥接错误按方向归类
    pub fn kind(&self) -> FaultKind {
        match self {
            UbjsonError::UnexpectedEof { .. }
            | UbjsonError::MalformedLengthPrefix { .. }
            | UbjsonError::UnexpectedToken { .. }
            | UbjsonError::UnsupportedTag { .. }
            | UbjsonError::NestingTooDeep(_)
            | UbjsonError::Deserialization(_) => FaultKind::Decoding,
            UbjsonError::IntegerOutOfRange(_)
            | UbjsonError::UnsupportedValueKind(_)
            | UbjsonError::Serialization(_)
            | UbjsonError::Json(_) => FaultKind::Encoding,
        }
    }
}

/// UBJSON 操作的 Result 类型别名
pub type UbjsonResult<T> = Result<T, UbjsonError>;
