//! UBJSON 编码模块
//!
//! 将 [`UbjValue`] 序列化为草案格式的 UBJSON 字节。
//! 整数和长度前缀选择最窄宽度，所有多字节负载为大端序。

use crate::numeric::{put_f32, put_int};
use crate::options::{ContainerRepresentation, EncodeOptions};
use crate::spec::TypeMarker;
use crate::value::{is_high_precision, is_index_keyed, Object, UbjValue};
use crate::{de, decoder, ser, UbjsonError, UbjsonResult};
use bytes::{BufMut, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, trace};

/// 编码 UbjValue 到缓冲区
///
/// # Brief
/// 使用默认选项将值追加写入缓冲区
///
/// # Arguments
/// * `value` - 要编码的值
/// * `buf` - 目标缓冲区
///
/// # Returns
/// 成功返回 Ok(()), 失败返回错误（缓冲区恢复到调用前的长度）
pub fn encode(value: &UbjValue, buf: &mut BytesMut) -> UbjsonResult<()> {
    encode_into(value, buf, &EncodeOptions::default())
}

/// 编码 UbjValue 到 Vec<u8>
pub fn encode_to_vec(value: &UbjValue) -> UbjsonResult<Vec<u8>> {
    encode_with(value, &EncodeOptions::default())
}

/// 按指定选项编码 UbjValue
///
/// # Arguments
/// * `value` - 要编码的值
/// * `options` - 编码选项
///
/// # Returns
/// 成功返回字节向量, 失败返回错误
pub fn encode_with(value: &UbjValue, options: &EncodeOptions) -> UbjsonResult<Vec<u8>> {
    let mut buf = BytesMut::with_capacity(256);
    encode_into(value, &mut buf, options)?;
    Ok(buf.to_vec())
}

/// 将任意可序列化的 Rust 值编码为 UBJSON
///
/// # Brief
/// 先通过 Serde 转换为 UbjValue，再编码
pub fn to_vec<T: Serialize>(value: &T) -> UbjsonResult<Vec<u8>> {
    let value = ser::to_ubj(value)?;
    encode_to_vec(&value)
}

/// 从 UBJSON 字节解码任意可反序列化的 Rust 值
///
/// # Brief
/// 严格模式解码第一个值，再通过 Serde 转换为目标类型
///
/// # Returns
/// 空输入返回 `Deserialization` 错误
pub fn from_slice<T: DeserializeOwned>(data: &[u8]) -> UbjsonResult<T> {
    let value = decoder::decode(data)?
        .ok_or_else(|| UbjsonError::Deserialization("no value in input".to_string()))?;
    de::from_ubj(&value)
}

fn encode_into(value: &UbjValue, buf: &mut BytesMut, options: &EncodeOptions) -> UbjsonResult<()> {
    let start = buf.len();
    let result = Encoder::new(buf, options).encode_value(value);
    match result {
        Ok(()) => {
            trace!("Encoded {} as {} bytes", value.type_name(), buf.len() - start);
            Ok(())
        }
        Err(e) => {
            debug!("Encoding {} failed: {}", value.type_name(), e);
            buf.truncate(start);
            Err(e)
        }
    }
}

/// UBJSON 编码器
///
/// 内部结构，用于将 UbjValue 序列化为二进制格式
struct Encoder<'a> {
    buf: &'a mut BytesMut,
    options: &'a EncodeOptions,
    depth: usize,
}

impl<'a> Encoder<'a> {
    fn new(buf: &'a mut BytesMut, options: &'a EncodeOptions) -> Self {
        Self {
            buf,
            options,
            depth: 0,
        }
    }

    fn encode_value(&mut self, value: &UbjValue) -> UbjsonResult<()> {
        match value {
            UbjValue::Null => {
                self.buf.put_u8(TypeMarker::Null as u8);
            }
            UbjValue::Bool(true) => {
                self.buf.put_u8(TypeMarker::True as u8);
            }
            UbjValue::Bool(false) => {
                self.buf.put_u8(TypeMarker::False as u8);
            }
            UbjValue::Int(n) => {
                put_int(&mut *self.buf, *n)?;
            }
            UbjValue::Float32(n) => {
                put_f32(&mut *self.buf, *n);
            }
            UbjValue::Char(c) => {
                self.encode_string(std::slice::from_ref(c))?;
            }
            UbjValue::Str(s) | UbjValue::HighPrecision(s) => {
                self.encode_string(s)?;
            }
            UbjValue::Array(arr) => {
                self.encode_array(arr.iter())?;
            }
            UbjValue::Object(obj) => {
                if self.options.container_representation == ContainerRepresentation::ArrayPreferring
                    && is_index_keyed(obj)
                {
                    self.encode_array(obj.values())?;
                } else {
                    self.encode_object(obj)?;
                }
            }
        }
        Ok(())
    }

    /// 字符串：单字节用 `C`，否则 `S`/`H` + 长度 + 原始字节
    fn encode_string(&mut self, s: &[u8]) -> UbjsonResult<()> {
        if s.len() == 1 {
            self.buf.put_u8(TypeMarker::Char as u8);
            self.buf.put_u8(s[0]);
            return Ok(());
        }
        let marker = if is_high_precision(s) {
            TypeMarker::HighPrecision
        } else {
            TypeMarker::String
        };
        let len = i64::try_from(s.len()).map_err(|_| UbjsonError::IntegerOutOfRange(s.len() as i128))?;
        self.buf.put_u8(marker as u8);
        put_int(&mut *self.buf, len)?;
        self.buf.put_slice(s);
        Ok(())
    }

    fn enter(&mut self) -> UbjsonResult<()> {
        if self.depth >= self.options.max_depth {
            return Err(UbjsonError::NestingTooDeep(self.options.max_depth));
        }
        self.depth += 1;
        Ok(())
    }

    fn encode_array<'v>(&mut self, items: impl Iterator<Item = &'v UbjValue>) -> UbjsonResult<()> {
        self.enter()?;
        self.buf.put_u8(TypeMarker::ArrayOpen as u8);
        for item in items {
            self.encode_value(item)?;
        }
        self.buf.put_u8(TypeMarker::ArrayClose as u8);
        self.depth -= 1;
        Ok(())
    }

    fn encode_object(&mut self, obj: &Object) -> UbjsonResult<()> {
        self.enter()?;
        self.buf.put_u8(TypeMarker::ObjectOpen as u8);
        for (key, value) in obj {
            self.encode_string(key)?;
            self.encode_value(value)?;
        }
        self.buf.put_u8(TypeMarker::ObjectClose as u8);
        self.depth -= 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::decode;
    use crate::ubj;
    use crate::value::EntryKey;

    fn bytes(value: &UbjValue) -> Vec<u8> {
        encode_to_vec(value).unwrap()
    }

    #[test]
    fn test_encode_scalars() {
        assert_eq!(bytes(&UbjValue::Null), b"Z");
        assert_eq!(bytes(&UbjValue::Bool(true)), b"T");
        assert_eq!(bytes(&UbjValue::Bool(false)), b"F");
        assert_eq!(bytes(&UbjValue::Int(5)), vec![b'U', 0x05]);
        assert_eq!(bytes(&UbjValue::Int(-5)), vec![b'i', 0xFB]);
        assert_eq!(bytes(&UbjValue::Int(0)), vec![b'i', 0x00]);
        assert_eq!(bytes(&UbjValue::Float32(-2.0)), vec![b'd', 0xC0, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_encode_strings() {
        assert_eq!(bytes(&UbjValue::from("A")), b"CA");
        assert_eq!(bytes(&UbjValue::Str(b"5".to_vec())), b"C5");
        assert_eq!(bytes(&UbjValue::HighPrecision(b"7".to_vec())), b"C7");
        assert_eq!(bytes(&UbjValue::from("hi")), b"SU\x02hi");
        assert_eq!(bytes(&UbjValue::from("")), b"Si\x00");
        assert_eq!(bytes(&UbjValue::from("3.25")), b"HU\x043.25");
        // 不做 UTF-8 校验
        assert_eq!(bytes(&UbjValue::Str(vec![0xFF, 0x00])), b"SU\x02\xFF\x00");

        let long = "x".repeat(300);
        let encoded = bytes(&UbjValue::from(long.as_str()));
        assert_eq!(&encoded[..4], &[b'S', b'I', 0x01, 0x2C]);
        assert_eq!(encoded.len(), 4 + 300);
    }

    #[test]
    fn test_encode_containers() {
        assert_eq!(bytes(&ubj!([1, 2, 3])), b"[U\x01U\x02U\x03]");
        assert_eq!(bytes(&ubj!({ "a": 1 })), b"{CaU\x01}");
        assert_eq!(bytes(&UbjValue::Array(Vec::new())), b"[]");
        assert_eq!(bytes(&UbjValue::Object(Object::new())), b"{}");
        assert_eq!(
            bytes(&ubj!({ "list": [null], "n": "12" })),
            b"{SU\x04list[Z]CnHU\x0212}"
        );
    }

    #[test]
    fn test_entry_container_rule() {
        let seq = UbjValue::from_entries(vec![
            (EntryKey::Index(0), UbjValue::from("x")),
            (EntryKey::Index(1), UbjValue::from("y")),
        ]);
        assert_eq!(bytes(&seq), b"[CxCy]");

        let keyed = UbjValue::from_entries(vec![
            (EntryKey::Index(0), UbjValue::from("x")),
            (EntryKey::Index(2), UbjValue::from("y")),
        ]);
        assert_eq!(bytes(&keyed), b"{C0CxC2Cy}");
    }

    #[test]
    fn test_array_preferring_objects() {
        let value = ubj!({ "0": true, "1": false });
        assert_eq!(bytes(&value), b"{C0TC1F}");

        let opts = EncodeOptions::default()
            .with_container_representation(ContainerRepresentation::ArrayPreferring);
        assert_eq!(encode_with(&value, &opts).unwrap(), b"[TF]");
        assert_eq!(encode_with(&ubj!({ "a": true }), &opts).unwrap(), b"{CaT}");
    }

    #[test]
    fn test_integer_out_of_range() {
        for n in [2147483648i64, -2147483649] {
            assert!(matches!(
                encode_to_vec(&UbjValue::Int(n)),
                Err(UbjsonError::IntegerOutOfRange(v)) if v == n as i128
            ));
        }

        let mut buf = BytesMut::new();
        encode(&UbjValue::Null, &mut buf).unwrap();
        let err = encode(&ubj!([1, 2, (UbjValue::Int(1 << 33))]), &mut buf).unwrap_err();
        assert_eq!(err.kind(), crate::FaultKind::Encoding);
        assert_eq!(&buf[..], b"Z");
    }

    #[test]
    fn test_nesting_limit() {
        let mut value = UbjValue::Null;
        for _ in 0..5 {
            value = UbjValue::Array(vec![value]);
        }
        let opts = EncodeOptions::default().with_max_depth(5);
        assert!(encode_with(&value, &opts).is_ok());
        let opts = EncodeOptions::default().with_max_depth(4);
        assert!(matches!(
            encode_with(&value, &opts),
            Err(UbjsonError::NestingTooDeep(4))
        ));
    }

    #[test]
    fn test_roundtrip_document() {
        let value = ubj!({
            "name": "ubjson",
            "version": 1,
            "tags": ["a", "bc", "42"],
            "nested": { "x": 300, "y": (-70000), "z": 1.5 },
            "empty": {}
        });
        let encoded = bytes(&value);
        assert_eq!(decode(&encoded).unwrap(), Some(value));
    }

    #[test]
    fn test_float_precision_loss() {
        let value = UbjValue::from(0.1f64);
        let decoded = decode(&bytes(&value)).unwrap().unwrap();
        assert_eq!(decoded, UbjValue::Float32(0.1f32));
        assert_ne!(decoded.as_f32().map(f64::from), Some(0.1f64));
    }

    #[test]
    fn test_typed_entry_points() {
        let encoded = to_vec(&vec![1u8, 2, 3]).unwrap();
        assert_eq!(encoded, b"[U\x01U\x02U\x03]");
        let decoded: Vec<i32> = from_slice(&encoded).unwrap();
        assert_eq!(decoded, vec![1, 2, 3]);
        assert!(from_slice::<i32>(b"").is_err());
    }
}
