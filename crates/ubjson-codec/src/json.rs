//! UBJSON 与 JSON 互转模块
//!
//! 在 UbjValue 与 `serde_json::Value` 之间转换。
//! 字符串与键必须是合法 UTF-8，整数不会被静默截断。

use crate::value::{Object, UbjValue};
use crate::{UbjsonError, UbjsonResult};
use serde_json::{Map, Number, Value as JsonValue};

fn utf8(bytes: &[u8], what: &str) -> UbjsonResult<String> {
    String::from_utf8(bytes.to_vec()).map_err(|_| {
        UbjsonError::UnsupportedValueKind(format!("{} is not valid UTF-8", what))
    })
}

/// 将 UbjValue 转换为 JSON
///
/// # Brief
/// 字符串类值（Char/Str/HighPrecision）都转换为 JSON 字符串，
/// 非有限的浮点数转换为其文本形式
///
/// # Arguments
/// * `value` - 要转换的 UBJSON 值
///
/// # Returns
/// 成功返回 JSON 值，字符串或键不是 UTF-8 时返回 `UnsupportedValueKind`
pub fn to_json(value: &UbjValue) -> UbjsonResult<JsonValue> {
    match value {
        UbjValue::Null => Ok(JsonValue::Null),
        UbjValue::Bool(b) => Ok(JsonValue::Bool(*b)),
        UbjValue::Int(n) => Ok(JsonValue::Number((*n).into())),
        UbjValue::Float32(f) => match Number::from_f64(*f as f64) {
            Some(n) => Ok(JsonValue::Number(n)),
            None => Ok(JsonValue::String(f.to_string())),
        },
        UbjValue::Char(_) | UbjValue::Str(_) | UbjValue::HighPrecision(_) => {
            let bytes = value.as_bytes().unwrap_or_default();
            Ok(JsonValue::String(utf8(bytes, "string")?))
        }
        UbjValue::Array(arr) => {
            let json_arr: Result<Vec<_>, _> = arr.iter().map(to_json).collect();
            Ok(JsonValue::Array(json_arr?))
        }
        UbjValue::Object(obj) => {
            let mut json_obj = Map::new();
            for (k, v) in obj {
                json_obj.insert(utf8(k, "object key")?, to_json(v)?);
            }
            Ok(JsonValue::Object(json_obj))
        }
    }
}

/// 从 JSON 转换为 UbjValue
///
/// # Brief
/// 字符串按规范形式转换（单字节为 Char，数字文本为 HighPrecision）
///
/// # Arguments
/// * `value` - JSON 值
///
/// # Returns
/// 成功返回 UBJSON 值；超出 32 位范围的整数返回 `IntegerOutOfRange`
pub fn from_json(value: &JsonValue) -> UbjsonResult<UbjValue> {
    match value {
        JsonValue::Null => Ok(UbjValue::Null),
        JsonValue::Bool(b) => Ok(UbjValue::Bool(*b)),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                if i >= i32::MIN as i64 && i <= i32::MAX as i64 {
                    Ok(UbjValue::Int(i))
                } else {
                    Err(UbjsonError::IntegerOutOfRange(i as i128))
                }
            } else if let Some(u) = n.as_u64() {
                Err(UbjsonError::IntegerOutOfRange(u as i128))
            } else if let Some(f) = n.as_f64() {
                Ok(UbjValue::Float32(f as f32))
            } else {
                Err(UbjsonError::Deserialization("Invalid number".to_string()))
            }
        }
        JsonValue::String(s) => Ok(UbjValue::string(s.as_bytes())),
        JsonValue::Array(arr) => {
            let items: Result<Vec<_>, _> = arr.iter().map(from_json).collect();
            Ok(UbjValue::Array(items?))
        }
        JsonValue::Object(map) => {
            let mut obj = Object::with_capacity(map.len());
            for (k, v) in map {
                obj.insert(k.as_bytes().to_vec(), from_json(v)?);
            }
            Ok(UbjValue::Object(obj))
        }
    }
}

/// 将 UbjValue 序列化为 JSON 字符串
pub fn to_json_string(value: &UbjValue) -> UbjsonResult<String> {
    let json_value = to_json(value)?;
    Ok(serde_json::to_string(&json_value)?)
}

/// 解析 JSON 字符串并转换为 UbjValue
pub fn from_json_string(json_str: &str) -> UbjsonResult<UbjValue> {
    let json_value: JsonValue = serde_json::from_str(json_str)?;
    from_json(&json_value)
}
