//! 数值编解码模块
//!
//! 编码器与分词器共用的整数宽度选择和大端序打包/解包逻辑。
//! `bytes` 的 `put_i16`/`get_i16` 等方法均为网络字节序（大端），与主机字节序无关。

use crate::spec::TypeMarker;
use crate::{UbjsonError, UbjsonResult};
use bytes::{Buf, BufMut};

/// 整数在线路上的四种宽度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntWidth {
    UInt8,
    Int8,
    Int16,
    Int32,
}

impl IntWidth {
    /// 选择能容纳 `n` 的最窄宽度
    ///
    /// # Brief
    /// 正数优先使用无符号单字节；零和 [-128, 0) 使用有符号单字节；
    /// 更小的负数按范围扩展到 2 字节或 4 字节，而不是截断到单字节
    ///
    /// # Arguments
    /// * `n` - 要编码的整数
    ///
    /// # Returns
    /// 成功返回宽度，超出 32 位有符号范围返回 `IntegerOutOfRange`
    pub fn select(n: i64) -> UbjsonResult<Self> {
        match n {
            1..=255 => Ok(Self::UInt8),
            -128..=0 => Ok(Self::Int8),
            -32768..=32767 => Ok(Self::Int16),
            n if n >= i32::MIN as i64 && n <= i32::MAX as i64 => Ok(Self::Int32),
            n => Err(UbjsonError::IntegerOutOfRange(n as i128)),
        }
    }

    pub fn from_marker(marker: TypeMarker) -> Option<Self> {
        match marker {
            TypeMarker::UInt8 => Some(Self::UInt8),
            TypeMarker::Int8 => Some(Self::Int8),
            TypeMarker::Int16 => Some(Self::Int16),
            TypeMarker::Int32 => Some(Self::Int32),
            _ => None,
        }
    }

    pub fn marker(self) -> TypeMarker {
        match self {
            Self::UInt8 => TypeMarker::UInt8,
            Self::Int8 => TypeMarker::Int8,
            Self::Int16 => TypeMarker::Int16,
            Self::Int32 => TypeMarker::Int32,
        }
    }

    /// 负载字节数（不含标记）
    pub fn size(self) -> usize {
        match self {
            Self::UInt8 | Self::Int8 => 1,
            Self::Int16 => 2,
            Self::Int32 => 4,
        }
    }

    /// 从负载开头读取整数并做符号/零扩展
    ///
    /// # Returns
    /// `payload` 不足 `size()` 字节时返回 `None`
    pub fn read(self, mut payload: &[u8]) -> Option<i64> {
        if payload.len() < self.size() {
            return None;
        }
        Some(match self {
            Self::UInt8 => payload.get_u8() as i64,
            Self::Int8 => payload.get_i8() as i64,
            Self::Int16 => payload.get_i16() as i64,
            Self::Int32 => payload.get_i32() as i64,
        })
    }
}

/// 写入整数：标记字节 + 大端负载
///
/// # Arguments
/// * `buf` - 目标缓冲区
/// * `n` - 要写入的整数
///
/// # Returns
/// 成功返回使用的宽度，超出范围返回错误（此时缓冲区未被修改）
pub fn put_int<B: BufMut>(buf: &mut B, n: i64) -> UbjsonResult<IntWidth> {
    let width = IntWidth::select(n)?;
    buf.put_u8(width.marker() as u8);
    match width {
        IntWidth::UInt8 => buf.put_u8(n as u8),
        IntWidth::Int8 => buf.put_i8(n as i8),
        IntWidth::Int16 => buf.put_i16(n as i16),
        IntWidth::Int32 => buf.put_i32(n as i32),
    }
    Ok(width)
}

/// 写入 32 位浮点数：标记字节 + 大端 IEEE-754 单精度
pub fn put_f32<B: BufMut>(buf: &mut B, v: f32) {
    buf.put_u8(TypeMarker::Float32 as u8);
    buf.put_f32(v);
}

/// 读取大端单精度浮点数，不足 4 字节时返回 `None`
pub fn read_f32(mut payload: &[u8]) -> Option<f32> {
    if payload.len() < 4 {
        return None;
    }
    Some(payload.get_f32())
}
