//! Serde 反序列化模块
//!
//! 实现 Serde Deserializer trait，将 UbjValue 反序列化为 Rust 数据结构。
//!
//! - 字符串类值（Char/Str/HighPrecision）均可反序列化为字符串
//! - HighPrecision 在目标为数值类型时按需解析
//! - 对象键在目标为整数时按十进制解析

use crate::value::UbjValue;
use crate::UbjsonError;
use serde::de::{self, DeserializeSeed, IntoDeserializer, MapAccess, SeqAccess, Visitor};
use serde::forward_to_deserialize_any;
use serde::Deserialize;
use std::fmt;

pub struct Deserializer<'de> {
    input: &'de UbjValue,
}

impl<'de> Deserializer<'de> {
    pub fn from_ubj(input: &'de UbjValue) -> Self {
        Deserializer { input }
    }

    fn mismatch(&self, expected: &str) -> UbjsonError {
        UbjsonError::Deserialization(format!(
            "Expected {}, got {}",
            expected,
            self.input.type_name()
        ))
    }

    fn text(&self) -> Option<&'de str> {
        self.input.as_str()
    }

    fn integer(&self) -> Result<i128, UbjsonError> {
        match self.input {
            UbjValue::Int(n) => Ok(*n as i128),
            UbjValue::HighPrecision(_) => self
                .text()
                .and_then(|s| s.parse::<i128>().ok())
                .ok_or_else(|| self.mismatch("integer")),
            _ => Err(self.mismatch("integer")),
        }
    }

    fn float(&self) -> Result<f64, UbjsonError> {
        match self.input {
            UbjValue::Float32(n) => Ok(*n as f64),
            UbjValue::Int(n) => Ok(*n as f64),
            UbjValue::HighPrecision(_) => self
                .text()
                .and_then(|s| s.parse::<f64>().ok())
                .ok_or_else(|| self.mismatch("float")),
            _ => Err(self.mismatch("float")),
        }
    }

    fn ranged<T: TryFrom<i128>>(&self, expected: &str) -> Result<T, UbjsonError> {
        let n = self.integer()?;
        T::try_from(n).map_err(|_| {
            UbjsonError::Deserialization(format!("Integer {} does not fit in {}", n, expected))
        })
    }
}

pub fn from_ubj<'a, T: Deserialize<'a>>(value: &'a UbjValue) -> Result<T, UbjsonError> {
    let deserializer = Deserializer::from_ubj(value);
    T::deserialize(deserializer)
}

impl de::Error for UbjsonError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        UbjsonError::Deserialization(msg.to_string())
    }
}

impl<'de> de::Deserializer<'de> for Deserializer<'de> {
    type Error = UbjsonError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.input {
            UbjValue::Null => visitor.visit_unit(),
            UbjValue::Bool(b) => visitor.visit_bool(*b),
            UbjValue::Int(n) => visitor.visit_i64(*n),
            UbjValue::Float32(n) => visitor.visit_f32(*n),
            UbjValue::Char(_) | UbjValue::Str(_) | UbjValue::HighPrecision(_) => {
                match self.text() {
                    Some(s) => visitor.visit_borrowed_str(s),
                    None => visitor.visit_borrowed_bytes(self.input.as_bytes().unwrap_or_default()),
                }
            }
            UbjValue::Array(arr) => visitor.visit_seq(SeqDeserializer::new(arr.iter())),
            UbjValue::Object(obj) => visitor.visit_map(MapDeserializer::new(obj.iter())),
        }
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.input {
            UbjValue::Bool(b) => visitor.visit_bool(*b),
            _ => Err(self.mismatch("boolean")),
        }
    }

    fn deserialize_i8<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_i8(self.ranged("i8")?)
    }

    fn deserialize_i16<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_i16(self.ranged("i16")?)
    }

    fn deserialize_i32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_i32(self.ranged("i32")?)
    }

    fn deserialize_i64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_i64(self.ranged("i64")?)
    }

    fn deserialize_i128<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_i128(self.integer()?)
    }

    fn deserialize_u8<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_u8(self.ranged("u8")?)
    }

    fn deserialize_u16<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_u16(self.ranged("u16")?)
    }

    fn deserialize_u32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_u32(self.ranged("u32")?)
    }

    fn deserialize_u64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_u64(self.ranged("u64")?)
    }

    fn deserialize_u128<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_u128(self.ranged("u128")?)
    }

    fn deserialize_f32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_f32(self.float()? as f32)
    }

    fn deserialize_f64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_f64(self.float()?)
    }

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        let mut chars = self.text().map(str::chars).ok_or_else(|| self.mismatch("char"))?;
        match (chars.next(), chars.next()) {
            (Some(c), None) => visitor.visit_char(c),
            _ => Err(self.mismatch("char")),
        }
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.text() {
            Some(s) => visitor.visit_borrowed_str(s),
            None if self.input.is_string() => Err(UbjsonError::Deserialization(
                "String is not valid UTF-8".to_string(),
            )),
            None => Err(self.mismatch("string")),
        }
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.input.as_bytes() {
            Some(b) => visitor.visit_borrowed_bytes(b),
            None => Err(self.mismatch("string")),
        }
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.input {
            UbjValue::Null => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.input {
            UbjValue::Null => visitor.visit_unit(),
            _ => Err(self.mismatch("null")),
        }
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_unit(visitor)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.input {
            UbjValue::Array(arr) => visitor.visit_seq(SeqDeserializer::new(arr.iter())),
            _ => Err(self.mismatch("array")),
        }
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.input {
            UbjValue::Object(obj) => visitor.visit_map(MapDeserializer::new(obj.iter())),
            _ => Err(self.mismatch("object")),
        }
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_map(visitor)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        match self.input {
            UbjValue::Object(obj) if obj.len() == 1 => {
                let (key, value) = obj
                    .iter()
                    .next()
                    .ok_or_else(|| self.mismatch("single-key object"))?;
                let variant = std::str::from_utf8(key).map_err(|_| {
                    UbjsonError::Deserialization("Enum variant is not valid UTF-8".to_string())
                })?;
                visitor.visit_enum(EnumDeserializer { variant, value })
            }
            _ => match self.text() {
                Some(s) => visitor.visit_enum(s.into_deserializer()),
                None => Err(self.mismatch("string or single-key object for enum")),
            },
        }
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_str(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }
}

/// 对象键的反序列化器
///
/// 键以 UTF-8 文本提供，整数目标按十进制解析。
struct KeyDeserializer<'de> {
    key: &'de [u8],
}

impl<'de> KeyDeserializer<'de> {
    fn parse<T: std::str::FromStr>(&self) -> Result<T, UbjsonError> {
        std::str::from_utf8(self.key)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                UbjsonError::Deserialization(format!(
                    "Object key {:?} is not a number",
                    String::from_utf8_lossy(self.key)
                ))
            })
    }
}

macro_rules! deserialize_numeric_key {
    ($($method:ident => $visit:ident : $ty:ty),* $(,)?) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
                visitor.$visit(self.parse::<$ty>()?)
            }
        )*
    };
}

impl<'de> de::Deserializer<'de> for KeyDeserializer<'de> {
    type Error = UbjsonError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match std::str::from_utf8(self.key) {
            Ok(s) => visitor.visit_borrowed_str(s),
            Err(_) => visitor.visit_borrowed_bytes(self.key),
        }
    }

    deserialize_numeric_key! {
        deserialize_i8 => visit_i8: i8,
        deserialize_i16 => visit_i16: i16,
        deserialize_i32 => visit_i32: i32,
        deserialize_i64 => visit_i64: i64,
        deserialize_u8 => visit_u8: u8,
        deserialize_u16 => visit_u16: u16,
        deserialize_u32 => visit_u32: u32,
        deserialize_u64 => visit_u64: u64,
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        let variant = std::str::from_utf8(self.key).map_err(|_| {
            UbjsonError::Deserialization("Enum variant is not valid UTF-8".to_string())
        })?;
        visitor.visit_enum(variant.into_deserializer())
    }

    forward_to_deserialize_any! {
        bool i128 u128 f32 f64 char str string bytes byte_buf option unit unit_struct
        seq tuple tuple_struct map struct identifier ignored_any
    }
}

struct SeqDeserializer<'de, I> {
    iter: I,
    _marker: std::marker::PhantomData<&'de ()>,
}

impl<'de, I: Iterator<Item = &'de UbjValue>> SeqDeserializer<'de, I> {
    fn new(iter: I) -> Self {
        Self {
            iter,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<'de, I: Iterator<Item = &'de UbjValue>> SeqAccess<'de> for SeqDeserializer<'de, I> {
    type Error = UbjsonError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, Self::Error> {
        match self.iter.next() {
            Some(value) => seed.deserialize(Deserializer::from_ubj(value)).map(Some),
            None => Ok(None),
        }
    }
}

struct MapDeserializer<'de, I> {
    iter: I,
    value: Option<&'de UbjValue>,
}

impl<'de, I: Iterator<Item = (&'de Vec<u8>, &'de UbjValue)>> MapDeserializer<'de, I> {
    fn new(iter: I) -> Self {
        Self { iter, value: None }
    }
}

impl<'de, I: Iterator<Item = (&'de Vec<u8>, &'de UbjValue)>> MapAccess<'de>
    for MapDeserializer<'de, I>
{
    type Error = UbjsonError;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, Self::Error> {
        match self.iter.next() {
            Some((key, value)) => {
                self.value = Some(value);
                seed.deserialize(KeyDeserializer { key }).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(
        &mut self,
        seed: V,
    ) -> Result<V::Value, Self::Error> {
        let value = self
            .value
            .take()
            .ok_or_else(|| UbjsonError::Deserialization("No value".to_string()))?;
        seed.deserialize(Deserializer::from_ubj(value))
    }
}

struct EnumDeserializer<'de> {
    variant: &'de str,
    value: &'de UbjValue,
}

impl<'de> de::EnumAccess<'de> for EnumDeserializer<'de> {
    type Error = UbjsonError;
    type Variant = VariantDeserializer<'de>;

    fn variant_seed<V: DeserializeSeed<'de>>(
        self,
        seed: V,
    ) -> Result<(V::Value, Self::Variant), Self::Error> {
        use serde::de::value::BorrowedStrDeserializer;
        let deserializer = BorrowedStrDeserializer::<UbjsonError>::new(self.variant);
        let variant: V::Value = seed.deserialize(deserializer)?;
        Ok((variant, VariantDeserializer { value: self.value }))
    }
}

struct VariantDeserializer<'de> {
    value: &'de UbjValue,
}

impl<'de> de::VariantAccess<'de> for VariantDeserializer<'de> {
    type Error = UbjsonError;

    fn unit_variant(self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(
        self,
        seed: T,
    ) -> Result<T::Value, Self::Error> {
        seed.deserialize(Deserializer::from_ubj(self.value))
    }

    fn tuple_variant<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value, Self::Error> {
        de::Deserializer::deserialize_seq(Deserializer::from_ubj(self.value), visitor)
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        de::Deserializer::deserialize_map(Deserializer::from_ubj(self.value), visitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ubj;
    use serde::{Deserialize, Serialize};
    use std::collections::{BTreeMap, HashMap};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct TestStruct {
        name: String,
        value: i32,
        active: bool,
        tags: Vec<String>,
        ratio: Option<f32>,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    enum Command {
        Stop,
        Move(i16),
        Pair(u8, u8),
        Resize { width: u32, height: u32 },
    }

    #[test]
    fn test_roundtrip_struct() {
        let original = TestStruct {
            name: "test".to_string(),
            value: 42,
            active: true,
            tags: vec!["a".to_string(), "bc".to_string(), "99".to_string()],
            ratio: Some(0.5),
        };

        let value = crate::ser::to_ubj(&original).unwrap();
        let restored: TestStruct = from_ubj(&value).unwrap();

        assert_eq!(original, restored);
    }

    #[test]
    fn test_roundtrip_enum() {
        for cmd in [
            Command::Stop,
            Command::Move(-400),
            Command::Pair(1, 2),
            Command::Resize { width: 640, height: 480 },
        ] {
            let value = crate::ser::to_ubj(&cmd).unwrap();
            let restored: Command = from_ubj(&value).unwrap();
            assert_eq!(cmd, restored);
        }
    }

    #[test]
    fn test_high_precision_as_number() {
        let value = UbjValue::HighPrecision(b"1234567890123".to_vec());
        assert_eq!(from_ubj::<i64>(&value).unwrap(), 1_234_567_890_123);
        assert_eq!(from_ubj::<String>(&value).unwrap(), "1234567890123");

        let value = UbjValue::HighPrecision(b"2.5".to_vec());
        assert_eq!(from_ubj::<f64>(&value).unwrap(), 2.5);
        assert!(from_ubj::<i32>(&value).is_err());
    }

    #[test]
    fn test_char_and_strings() {
        assert_eq!(from_ubj::<char>(&UbjValue::Char(b'x')).unwrap(), 'x');
        assert_eq!(from_ubj::<String>(&UbjValue::Char(b'x')).unwrap(), "x");
        assert!(from_ubj::<char>(&ubj!("xy")).is_err());
        assert!(from_ubj::<String>(&UbjValue::Str(vec![0xff, 0xfe])).is_err());
    }

    #[test]
    fn test_integer_ranges() {
        assert_eq!(from_ubj::<u8>(&ubj!(255)).unwrap(), 255);
        assert!(from_ubj::<u8>(&ubj!(256)).is_err());
        assert!(from_ubj::<u32>(&ubj!(-1)).is_err());
        assert_eq!(from_ubj::<f32>(&ubj!(3)).unwrap(), 3.0);
    }

    #[test]
    fn test_maps() {
        let value = ubj!({ "1": "one", "20": "twenty" });
        let by_number: BTreeMap<u32, String> = from_ubj(&value).unwrap();
        assert_eq!(by_number.get(&20).map(String::as_str), Some("twenty"));

        let by_name: HashMap<String, String> = from_ubj(&value).unwrap();
        assert_eq!(by_name.len(), 2);

        assert!(from_ubj::<BTreeMap<u32, String>>(&ubj!({ "x": 1 })).is_err());
    }
}
