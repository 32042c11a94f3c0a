//! UBJSON 分词模块
//!
//! 拉取式词法扫描器：每次调用读取一个标记及其负载，产生一个 [`Token`]。
//! 读取位置是显式的 [`Cursor`] 值，[`read_token`] 接收并返回它，
//! [`Tokenizer`] 只是持有缓冲区、游标和当前标记的薄封装。

use crate::numeric::{read_f32, IntWidth};
use crate::options::UnknownTagPolicy;
use crate::spec::TypeMarker;
use crate::value::UbjValue;
use crate::{UbjsonError, UbjsonResult};
use tracing::debug;

/// 词法单元
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    EndOfInput,
    OpenArray,
    CloseArray,
    OpenObject,
    CloseObject,
    Data(UbjValue),
}

impl Token {
    pub fn describe(&self) -> String {
        match self {
            Token::EndOfInput => "end of input".to_string(),
            Token::OpenArray => "'['".to_string(),
            Token::CloseArray => "']'".to_string(),
            Token::OpenObject => "'{'".to_string(),
            Token::CloseObject => "'}'".to_string(),
            Token::Data(v) => format!("{} value", v.type_name()),
        }
    }
}

/// 缓冲区中的读取位置（字节偏移）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cursor {
    pos: usize,
}

impl Cursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(pos: usize) -> Self {
        Self { pos }
    }

    pub fn position(self) -> usize {
        self.pos
    }

    /// 读取 `len` 字节，返回负载切片和前进后的游标
    ///
    /// # Returns
    /// 剩余字节不足时返回 `UnexpectedEof`，游标不变
    fn take(self, data: &[u8], len: usize) -> UbjsonResult<(&[u8], Cursor)> {
        let have = data.len().saturating_sub(self.pos);
        if len > have {
            return Err(UbjsonError::UnexpectedEof {
                offset: self.pos,
                need: len,
                have,
            });
        }
        let end = self.pos + len;
        Ok((&data[self.pos..end], Cursor { pos: end }))
    }

    fn take_u8(self, data: &[u8]) -> UbjsonResult<(u8, Cursor)> {
        let (bytes, next) = self.take(data, 1)?;
        Ok((bytes[0], next))
    }
}

/// 从 `cursor` 处读取一个词法单元
///
/// # Brief
/// 读取标记字节并按标记读取负载。游标位于缓冲区末尾时返回 `EndOfInput` 且不消耗输入。
/// 任何越界读取都是错误，不会静默截断。
///
/// # Arguments
/// * `data` - 完整的输入缓冲区
/// * `cursor` - 当前读取位置
/// * `policy` - 未知标记的处理方式
///
/// # Returns
/// 成功返回 (词法单元, 新游标)，失败返回解码错误
pub fn read_token(
    data: &[u8],
    cursor: Cursor,
    policy: UnknownTagPolicy,
) -> UbjsonResult<(Token, Cursor)> {
    let Some(&byte) = data.get(cursor.pos) else {
        return Ok((Token::EndOfInput, cursor));
    };
    let after_marker = Cursor::at(cursor.pos + 1);

    let marker = match TypeMarker::from_u8(byte) {
        Some(marker) if !marker.is_unsupported() => marker,
        _ => return unsupported(byte, cursor, policy),
    };

    let (token, next) = match marker {
        TypeMarker::Null => (Token::Data(UbjValue::Null), after_marker),
        TypeMarker::True => (Token::Data(UbjValue::Bool(true)), after_marker),
        TypeMarker::False => (Token::Data(UbjValue::Bool(false)), after_marker),
        TypeMarker::UInt8 => read_int(data, IntWidth::UInt8, after_marker)?,
        TypeMarker::Int8 => read_int(data, IntWidth::Int8, after_marker)?,
        TypeMarker::Int16 => read_int(data, IntWidth::Int16, after_marker)?,
        TypeMarker::Int32 => read_int(data, IntWidth::Int32, after_marker)?,
        TypeMarker::Float32 => {
            let (payload, next) = after_marker.take(data, 4)?;
            let n = read_f32(payload).ok_or(UbjsonError::UnexpectedEof {
                offset: after_marker.pos,
                need: 4,
                have: payload.len(),
            })?;
            (Token::Data(UbjValue::Float32(n)), next)
        }
        TypeMarker::Char => {
            let (c, next) = after_marker.take_u8(data)?;
            (Token::Data(UbjValue::Char(c)), next)
        }
        TypeMarker::String | TypeMarker::HighPrecision => {
            let (bytes, next) = read_string_payload(data, after_marker)?;
            let value = if marker == TypeMarker::String {
                UbjValue::Str(bytes)
            } else {
                UbjValue::HighPrecision(bytes)
            };
            (Token::Data(value), next)
        }
        TypeMarker::ArrayOpen => (Token::OpenArray, after_marker),
        TypeMarker::ArrayClose => (Token::CloseArray, after_marker),
        TypeMarker::ObjectOpen => (Token::OpenObject, after_marker),
        TypeMarker::ObjectClose => (Token::CloseObject, after_marker),
        TypeMarker::NoOp | TypeMarker::Int64 | TypeMarker::Float64 => {
            return unsupported(byte, cursor, policy)
        }
    };
    Ok((token, next))
}

fn unsupported(byte: u8, cursor: Cursor, policy: UnknownTagPolicy) -> UbjsonResult<(Token, Cursor)> {
    match policy {
        UnknownTagPolicy::Reject => Err(UbjsonError::UnsupportedTag {
            offset: cursor.pos,
            marker: byte,
        }),
        UnknownTagPolicy::Truncate => {
            debug!(
                "Unsupported marker 0x{:02x} at offset {}, treating as end of input",
                byte, cursor.pos
            );
            Ok((Token::EndOfInput, cursor))
        }
    }
}

fn take_int(data: &[u8], width: IntWidth, cursor: Cursor) -> UbjsonResult<(i64, Cursor)> {
    let (payload, next) = cursor.take(data, width.size())?;
    let n = width.read(payload).ok_or(UbjsonError::UnexpectedEof {
        offset: cursor.pos,
        need: width.size(),
        have: payload.len(),
    })?;
    Ok((n, next))
}

fn read_int(data: &[u8], width: IntWidth, cursor: Cursor) -> UbjsonResult<(Token, Cursor)> {
    let (n, next) = take_int(data, width, cursor)?;
    Ok((Token::Data(UbjValue::Int(n)), next))
}

/// 读取字符串负载：整数标记的长度前缀 + 原始字节
fn read_string_payload(data: &[u8], cursor: Cursor) -> UbjsonResult<(Vec<u8>, Cursor)> {
    let (len_marker, after_len_marker) = cursor.take_u8(data)?;
    let width = TypeMarker::from_u8(len_marker)
        .and_then(IntWidth::from_marker)
        .ok_or(UbjsonError::MalformedLengthPrefix {
            offset: cursor.pos,
            marker: len_marker,
        })?;
    let (len, after_len) = take_int(data, width, after_len_marker)?;
    let len = usize::try_from(len).map_err(|_| {
        UbjsonError::MalformedLengthPrefix {
            offset: cursor.pos,
            marker: len_marker,
        }
    })?;
    let (bytes, next) = after_len.take(data, len)?;
    Ok((bytes.to_vec(), next))
}

/// 拉取式分词器
///
/// 每次 [`Tokenizer::advance`] 产生一个词法单元并保存为当前单元。
/// 出错时游标和当前单元保持不变。
pub struct Tokenizer<'a> {
    data: &'a [u8],
    cursor: Cursor,
    start: Cursor,
    current: Token,
    policy: UnknownTagPolicy,
    failed: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_policy(data, UnknownTagPolicy::default())
    }

    pub fn with_policy(data: &'a [u8], policy: UnknownTagPolicy) -> Self {
        Self {
            data,
            cursor: Cursor::new(),
            start: Cursor::new(),
            current: Token::EndOfInput,
            policy,
            failed: false,
        }
    }

    /// 读取下一个词法单元
    ///
    /// # Returns
    /// 成功返回新的当前单元的引用，失败返回解码错误
    pub fn advance(&mut self) -> UbjsonResult<&Token> {
        let (token, next) = read_token(self.data, self.cursor, self.policy)?;
        self.current = token;
        self.start = self.cursor;
        self.cursor = next;
        Ok(&self.current)
    }

    /// 放回先前取出的单元
    pub(crate) fn restore(&mut self, token: Token) {
        self.current = token;
    }

    /// 停止读取：游标移到末尾，此后只产生 `EndOfInput`
    pub(crate) fn halt(&mut self) {
        self.start = self.cursor;
        self.cursor = Cursor::at(self.data.len());
        self.current = Token::EndOfInput;
    }

    pub fn current(&self) -> &Token {
        &self.current
    }

    /// 取出当前单元，留下 `EndOfInput`
    pub fn take_current(&mut self) -> Token {
        std::mem::replace(&mut self.current, Token::EndOfInput)
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// 当前单元起始处的偏移
    pub fn token_offset(&self) -> usize {
        self.start.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.cursor.pos)
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = UbjsonResult<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.advance().map(Token::clone) {
            Ok(Token::EndOfInput) => None,
            Ok(token) => Some(Ok(token)),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
