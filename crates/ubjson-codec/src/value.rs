//! UBJSON 值类型定义模块
//!
//! 定义与 JSON 值空间对应的抽象值模型。字符串按字节保存，
//! 线路格式不做任何文本编码校验。

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::bytes::Regex;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::fmt;

/// 对象类型：保持插入顺序的字节串键映射
pub type Object = IndexMap<Vec<u8>, UbjValue>;

static NUMERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]+(\.[0-9]+)?$").expect("numeral pattern is valid"));

/// 判断字节串是否形如十进制数字（按高精度字符串 `H` 标记）
pub fn is_high_precision(bytes: &[u8]) -> bool {
    NUMERAL.is_match(bytes)
}

/// UBJSON 值的枚举类型
///
/// # 支持的类型
///
/// - **基础类型**: Null, Bool, Int, Float32
/// - **字符串类型**: Char (单字节), Str, HighPrecision (数字形式的文本)
/// - **复合类型**: Array, Object
///
/// 同一字节串无论存为 `Str`、`HighPrecision` 还是 `Char`，编码结果都由字节内容决定，
/// 相等比较也只看字节。`Float32` 按位比较，NaN 与自身相等。
/// 使用 [`UbjValue::string`] 或 `From<&str>` 构造可得到与解码结果一致的规范形式。
///
/// # 示例
///
/// ```rust,ignore
/// use ubjson_codec::UbjValue;
///
/// let value = UbjValue::from("hello");
/// assert_eq!(value.type_name(), "string");
/// ```
#[derive(Debug, Clone)]
pub enum UbjValue {
    /// 空值
    Null,
    /// 布尔值
    Bool(bool),
    /// 整数（只有 32 位有符号范围内的值可以编码）
    Int(i64),
    /// 32位浮点数
    Float32(f32),
    /// 单字节字符
    Char(u8),
    /// 任意字节串
    Str(Vec<u8>),
    /// 十进制数字形式的字节串，保持文本不解析
    HighPrecision(Vec<u8>),
    /// 值数组
    Array(Vec<UbjValue>),
    /// 对象（有序键值对）
    Object(Object),
}

/// 构造容器时的条目键
///
/// 整数下标和名称键混合时，由 [`UbjValue::from_entries`] 决定容器形状
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntryKey {
    Index(u64),
    Name(Vec<u8>),
}

impl EntryKey {
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            EntryKey::Index(i) => i.to_string().into_bytes(),
            EntryKey::Name(name) => name,
        }
    }
}

impl From<u64> for EntryKey {
    fn from(i: u64) -> Self {
        EntryKey::Index(i)
    }
}

impl From<&str> for EntryKey {
    fn from(name: &str) -> Self {
        EntryKey::Name(name.as_bytes().to_vec())
    }
}

impl UbjValue {
    /// 以规范形式构造字符串值
    ///
    /// # Brief
    /// 单字节为 `Char`，数字形式为 `HighPrecision`，其余为 `Str`，与线路标记一致
    ///
    /// # Arguments
    /// * `bytes` - 字符串的原始字节
    pub fn string(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        if bytes.len() == 1 {
            UbjValue::Char(bytes[0])
        } else if is_high_precision(&bytes) {
            UbjValue::HighPrecision(bytes)
        } else {
            UbjValue::Str(bytes)
        }
    }

    /// 由有序条目构造容器
    ///
    /// # Brief
    /// 键恰好按顺序为 `Index(0..n-1)` 时生成数组（丢弃键），
    /// 否则生成对象，下标键转为十进制字符串；后出现的重复键覆盖先前的值
    ///
    /// # Arguments
    /// * `entries` - (键, 值) 条目
    ///
    /// # Returns
    /// `Array` 或 `Object`
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (EntryKey, UbjValue)>,
    {
        let entries: Vec<(EntryKey, UbjValue)> = entries.into_iter().collect();
        let sequential = entries
            .iter()
            .enumerate()
            .all(|(i, (key, _))| matches!(key, EntryKey::Index(n) if *n == i as u64));
        if sequential {
            UbjValue::Array(entries.into_iter().map(|(_, v)| v).collect())
        } else {
            let mut obj = Object::with_capacity(entries.len());
            for (key, value) in entries {
                obj.insert(key.into_bytes(), value);
            }
            UbjValue::Object(obj)
        }
    }

    /// 获取值的类型名称
    pub fn type_name(&self) -> &'static str {
        match self {
            UbjValue::Null => "null",
            UbjValue::Bool(_) => "boolean",
            UbjValue::Int(_) => "int",
            UbjValue::Float32(_) => "float32",
            UbjValue::Char(_) => "char",
            UbjValue::Str(_) => "string",
            UbjValue::HighPrecision(_) => "highPrecision",
            UbjValue::Array(_) => "array",
            UbjValue::Object(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, UbjValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            UbjValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            UbjValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// 尝试获取 f32 值（整数会被转换）
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            UbjValue::Float32(n) => Some(*n),
            UbjValue::Int(n) => Some(*n as f32),
            _ => None,
        }
    }

    /// 尝试获取字符串类值的原始字节
    ///
    /// # Returns
    /// `Char`、`Str`、`HighPrecision` 返回其字节，其他类型返回 `None`
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            UbjValue::Char(c) => Some(std::slice::from_ref(c)),
            UbjValue::Str(s) | UbjValue::HighPrecision(s) => Some(s),
            _ => None,
        }
    }

    /// 尝试以 UTF-8 文本获取字符串类值
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    pub fn is_string(&self) -> bool {
        self.as_bytes().is_some()
    }

    pub fn as_array(&self) -> Option<&Vec<UbjValue>> {
        match self {
            UbjValue::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            UbjValue::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// 按键获取对象字段
    pub fn get(&self, key: impl AsRef<[u8]>) -> Option<&UbjValue> {
        self.as_object().and_then(|obj| obj.get(key.as_ref()))
    }
}

impl PartialEq for UbjValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (UbjValue::Null, UbjValue::Null) => true,
            (UbjValue::Bool(a), UbjValue::Bool(b)) => a == b,
            (UbjValue::Int(a), UbjValue::Int(b)) => a == b,
            (UbjValue::Float32(a), UbjValue::Float32(b)) => a.to_bits() == b.to_bits(),
            (UbjValue::Array(a), UbjValue::Array(b)) => a == b,
            (UbjValue::Object(a), UbjValue::Object(b)) => a == b,
            _ => match (self.as_bytes(), other.as_bytes()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

impl Eq for UbjValue {}

/// 对象的键是否恰好按顺序为 "0".."n-1"
pub(crate) fn is_index_keyed(obj: &Object) -> bool {
    obj.keys()
        .enumerate()
        .all(|(i, key)| key.as_slice() == i.to_string().as_bytes())
}

impl fmt::Display for UbjValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UbjValue::Null => write!(f, "null"),
            UbjValue::Bool(b) => write!(f, "{}", b),
            UbjValue::Int(n) => write!(f, "{}", n),
            UbjValue::Float32(n) => write!(f, "{}", n),
            UbjValue::Char(c) => write!(f, "'{}'", String::from_utf8_lossy(std::slice::from_ref(c))),
            UbjValue::Str(s) => write!(f, "\"{}\"", String::from_utf8_lossy(s)),
            UbjValue::HighPrecision(s) => write!(f, "{}", String::from_utf8_lossy(s)),
            UbjValue::Array(arr) => {
                write!(f, "[")?;
                for (i, v) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            UbjValue::Object(obj) => {
                write!(f, "{{")?;
                for (i, (k, v)) in obj.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "\"{}\": {}", String::from_utf8_lossy(k), v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl Serialize for UbjValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            UbjValue::Null => serializer.serialize_unit(),
            UbjValue::Bool(b) => serializer.serialize_bool(*b),
            UbjValue::Int(n) => serializer.serialize_i64(*n),
            UbjValue::Float32(n) => serializer.serialize_f32(*n),
            UbjValue::Char(_) | UbjValue::Str(_) | UbjValue::HighPrecision(_) => match self.as_str() {
                Some(s) => serializer.serialize_str(s),
                None => serializer.serialize_bytes(self.as_bytes().unwrap_or_default()),
            },
            UbjValue::Array(arr) => {
                let mut seq = serializer.serialize_seq(Some(arr.len()))?;
                for item in arr {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            UbjValue::Object(obj) => {
                let mut map = serializer.serialize_map(Some(obj.len()))?;
                for (k, v) in obj {
                    match std::str::from_utf8(k) {
                        Ok(key) => map.serialize_entry(key, v)?,
                        Err(_) => map.serialize_entry(k.as_slice(), v)?,
                    }
                }
                map.end()
            }
        }
    }
}

// ============================================================================
// From 特征实现
// ============================================================================

impl From<bool> for UbjValue {
    fn from(v: bool) -> Self {
        UbjValue::Bool(v)
    }
}

impl From<i8> for UbjValue {
    fn from(v: i8) -> Self {
        UbjValue::Int(v as i64)
    }
}

impl From<i16> for UbjValue {
    fn from(v: i16) -> Self {
        UbjValue::Int(v as i64)
    }
}

impl From<i32> for UbjValue {
    fn from(v: i32) -> Self {
        UbjValue::Int(v as i64)
    }
}

impl From<i64> for UbjValue {
    fn from(v: i64) -> Self {
        UbjValue::Int(v)
    }
}

impl From<u16> for UbjValue {
    fn from(v: u16) -> Self {
        UbjValue::Int(v as i64)
    }
}

impl From<u32> for UbjValue {
    fn from(v: u32) -> Self {
        UbjValue::Int(v as i64)
    }
}

impl From<f32> for UbjValue {
    fn from(v: f32) -> Self {
        UbjValue::Float32(v)
    }
}

/// 线路上只有单精度，转换时丢失精度
impl From<f64> for UbjValue {
    fn from(v: f64) -> Self {
        UbjValue::Float32(v as f32)
    }
}

impl From<&str> for UbjValue {
    fn from(v: &str) -> Self {
        UbjValue::string(v.as_bytes())
    }
}

impl From<String> for UbjValue {
    fn from(v: String) -> Self {
        UbjValue::string(v.into_bytes())
    }
}

impl From<Object> for UbjValue {
    fn from(v: Object) -> Self {
        UbjValue::Object(v)
    }
}

impl<T: Into<UbjValue>> From<Vec<T>> for UbjValue {
    fn from(v: Vec<T>) -> Self {
        UbjValue::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<UbjValue>> From<Option<T>> for UbjValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(UbjValue::Null)
    }
}

#[doc(hidden)]
pub fn key_bytes(key: impl AsRef<[u8]>) -> Vec<u8> {
    key.as_ref().to_vec()
}

/// 构造 UbjValue 的便捷宏
///
/// # 示例
///
/// ```rust,ignore
/// use ubjson_codec::ubj;
///
/// let null = ubj!(null);
/// let array = ubj!([1, 2, 3]);
/// let obj = ubj!({ "name": "test", "value": 123 });
/// ```
#[macro_export]
macro_rules! ubj {
    (null) => {
        $crate::UbjValue::Null
    };
    (true) => {
        $crate::UbjValue::Bool(true)
    };
    (false) => {
        $crate::UbjValue::Bool(false)
    };
    ([ $($elem:tt),* $(,)? ]) => {
        $crate::UbjValue::Array(vec![ $($crate::ubj!($elem)),* ])
    };
    ({ $($key:tt : $value:tt),* $(,)? }) => {
        {
            #[allow(unused_mut)]
            let mut obj = $crate::value::Object::new();
            $(
                obj.insert($crate::value::key_bytes($key), $crate::ubj!($value));
            )*
            $crate::UbjValue::Object(obj)
        }
    };
    ($e:expr) => {
        $crate::UbjValue::from($e)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_canonical_form() {
        assert!(matches!(UbjValue::from("A"), UbjValue::Char(b'A')));
        assert!(matches!(UbjValue::from("5"), UbjValue::Char(b'5')));
        assert!(matches!(UbjValue::from("42"), UbjValue::HighPrecision(ref s) if s == b"42"));
        assert!(matches!(UbjValue::from("3.14"), UbjValue::HighPrecision(ref s) if s == b"3.14"));
        assert!(matches!(UbjValue::from("hi"), UbjValue::Str(ref s) if s == b"hi"));
        assert!(matches!(UbjValue::from(""), UbjValue::Str(ref s) if s.is_empty()));
    }

    #[test]
    fn test_equality_by_bytes() {
        assert_eq!(UbjValue::Str(b"A".to_vec()), UbjValue::Char(b'A'));
        assert_eq!(UbjValue::Str(b"42".to_vec()), UbjValue::HighPrecision(b"42".to_vec()));
        assert_eq!(UbjValue::HighPrecision(b"ab".to_vec()), UbjValue::Str(b"ab".to_vec()));
        assert_ne!(UbjValue::Str(b"ab".to_vec()), UbjValue::Str(b"ba".to_vec()));
        assert_ne!(UbjValue::Char(b'1'), UbjValue::Int(1));
        assert_ne!(UbjValue::Null, UbjValue::Str(Vec::new()));

        assert_eq!(UbjValue::Float32(f32::NAN), UbjValue::Float32(f32::NAN));
        assert_ne!(UbjValue::Float32(0.0), UbjValue::Float32(-0.0));
        assert_ne!(UbjValue::Float32(1.0), UbjValue::Int(1));
    }

    #[test]
    fn test_numeral_pattern() {
        assert!(is_high_precision(b"0"));
        assert!(is_high_precision(b"123456789012345678901234567890"));
        assert!(is_high_precision(b"1.5"));
        assert!(!is_high_precision(b"1."));
        assert!(!is_high_precision(b".5"));
        assert!(!is_high_precision(b"-1"));
        assert!(!is_high_precision(b"1e5"));
        assert!(!is_high_precision(b"12\n"));
        assert!(!is_high_precision(b""));
    }

    #[test]
    fn test_from_entries_sequential() {
        let value = UbjValue::from_entries(vec![
            (EntryKey::Index(0), UbjValue::Int(1)),
            (EntryKey::Index(1), UbjValue::Int(2)),
        ]);
        assert_eq!(value, UbjValue::Array(vec![UbjValue::Int(1), UbjValue::Int(2)]));

        assert_eq!(UbjValue::from_entries(Vec::new()), UbjValue::Array(Vec::new()));
    }

    #[test]
    fn test_from_entries_keyed() {
        let value = UbjValue::from_entries(vec![
            (EntryKey::Index(1), UbjValue::Int(1)),
            (EntryKey::Index(0), UbjValue::Int(2)),
        ]);
        let obj = value.as_object().unwrap();
        let keys: Vec<&[u8]> = obj.keys().map(|k| k.as_slice()).collect();
        assert_eq!(keys, vec![b"1".as_slice(), b"0".as_slice()]);

        let value = UbjValue::from_entries(vec![
            (EntryKey::from("a"), UbjValue::Int(1)),
            (EntryKey::from("a"), UbjValue::Int(2)),
        ]);
        assert_eq!(value.get("a"), Some(&UbjValue::Int(2)));
        assert_eq!(value.as_object().unwrap().len(), 1);
    }

    #[test]
    fn test_index_keyed() {
        let mut obj = Object::new();
        assert!(is_index_keyed(&obj));
        obj.insert(b"0".to_vec(), UbjValue::Null);
        obj.insert(b"1".to_vec(), UbjValue::Null);
        assert!(is_index_keyed(&obj));
        obj.insert(b"3".to_vec(), UbjValue::Null);
        assert!(!is_index_keyed(&obj));
    }

    #[test]
    fn test_macro() {
        let value = ubj!({ "name": "ubj", "list": [1, 2, null], "ok": true });
        assert_eq!(value.get("name").and_then(|v| v.as_str()), Some("ubj"));
        assert_eq!(
            value.get("list"),
            Some(&UbjValue::Array(vec![UbjValue::Int(1), UbjValue::Int(2), UbjValue::Null]))
        );
        assert_eq!(value.get("ok"), Some(&UbjValue::Bool(true)));
        assert_eq!(value.to_string(), r#"{"name": "ubj", "list": [1, 2, null], "ok": true}"#);
    }
}
