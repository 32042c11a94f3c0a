//! Serde 序列化模块
//!
//! 实现 Serde Serializer trait，将 Rust 数据结构转换为 UbjValue。
//! 整数在转换时即检查 32 位有符号范围，浮点数统一转为单精度。

use crate::value::{Object, UbjValue};
use crate::UbjsonError;
use serde::ser::{self, Serialize};

pub struct Serializer {
    output: UbjValue,
}

impl Serializer {
    pub fn new() -> Self {
        Self {
            output: UbjValue::Null,
        }
    }

    pub fn into_value(self) -> UbjValue {
        self.output
    }
}

impl Default for Serializer {
    fn default() -> Self {
        Self::new()
    }
}

pub fn to_ubj<T: ?Sized + Serialize>(value: &T) -> Result<UbjValue, UbjsonError> {
    let mut serializer = Serializer::new();
    value.serialize(&mut serializer)?;
    Ok(serializer.into_value())
}

fn int(v: i128) -> Result<UbjValue, UbjsonError> {
    if v >= i32::MIN as i128 && v <= i32::MAX as i128 {
        Ok(UbjValue::Int(v as i64))
    } else {
        Err(UbjsonError::IntegerOutOfRange(v))
    }
}

/// 将序列化后的键转换为对象键的字节
fn map_key(key: UbjValue) -> Result<Vec<u8>, UbjsonError> {
    match key {
        UbjValue::Char(c) => Ok(vec![c]),
        UbjValue::Str(s) | UbjValue::HighPrecision(s) => Ok(s),
        UbjValue::Int(n) => Ok(n.to_string().into_bytes()),
        other => Err(UbjsonError::UnsupportedValueKind(format!(
            "map key must be a string or integer, got {}",
            other.type_name()
        ))),
    }
}

fn tagged(variant: &'static str, value: UbjValue) -> UbjValue {
    let mut obj = Object::with_capacity(1);
    obj.insert(variant.as_bytes().to_vec(), value);
    UbjValue::Object(obj)
}

impl<'a> ser::Serializer for &'a mut Serializer {
    type Ok = ();
    type Error = UbjsonError;
    type SerializeSeq = SeqSerializer<'a>;
    type SerializeTuple = SeqSerializer<'a>;
    type SerializeTupleStruct = SeqSerializer<'a>;
    type SerializeTupleVariant = SeqSerializer<'a>;
    type SerializeMap = MapSerializer<'a>;
    type SerializeStruct = MapSerializer<'a>;
    type SerializeStructVariant = MapSerializer<'a>;

    fn serialize_bool(self, v: bool) -> Result<Self::Ok, Self::Error> {
        self.output = UbjValue::Bool(v);
        Ok(())
    }

    fn serialize_i8(self, v: i8) -> Result<Self::Ok, Self::Error> {
        self.serialize_i32(v as i32)
    }

    fn serialize_i16(self, v: i16) -> Result<Self::Ok, Self::Error> {
        self.serialize_i32(v as i32)
    }

    fn serialize_i32(self, v: i32) -> Result<Self::Ok, Self::Error> {
        self.output = UbjValue::Int(v as i64);
        Ok(())
    }

    fn serialize_i64(self, v: i64) -> Result<Self::Ok, Self::Error> {
        self.output = int(v as i128)?;
        Ok(())
    }

    fn serialize_i128(self, v: i128) -> Result<Self::Ok, Self::Error> {
        self.output = int(v)?;
        Ok(())
    }

    fn serialize_u8(self, v: u8) -> Result<Self::Ok, Self::Error> {
        self.serialize_i32(v as i32)
    }

    fn serialize_u16(self, v: u16) -> Result<Self::Ok, Self::Error> {
        self.serialize_i32(v as i32)
    }

    fn serialize_u32(self, v: u32) -> Result<Self::Ok, Self::Error> {
        self.output = int(v as i128)?;
        Ok(())
    }

    fn serialize_u64(self, v: u64) -> Result<Self::Ok, Self::Error> {
        self.output = int(v as i128)?;
        Ok(())
    }

    fn serialize_u128(self, v: u128) -> Result<Self::Ok, Self::Error> {
        let v = i128::try_from(v).map_err(|_| UbjsonError::IntegerOutOfRange(i128::MAX))?;
        self.output = int(v)?;
        Ok(())
    }

    fn serialize_f32(self, v: f32) -> Result<Self::Ok, Self::Error> {
        self.output = UbjValue::Float32(v);
        Ok(())
    }

    fn serialize_f64(self, v: f64) -> Result<Self::Ok, Self::Error> {
        self.output = UbjValue::Float32(v as f32);
        Ok(())
    }

    fn serialize_char(self, v: char) -> Result<Self::Ok, Self::Error> {
        self.serialize_str(v.encode_utf8(&mut [0u8; 4]))
    }

    fn serialize_str(self, v: &str) -> Result<Self::Ok, Self::Error> {
        self.output = UbjValue::string(v.as_bytes());
        Ok(())
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Self::Ok, Self::Error> {
        self.output = UbjValue::string(v);
        Ok(())
    }

    fn serialize_none(self) -> Result<Self::Ok, Self::Error> {
        self.serialize_unit()
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Self::Ok, Self::Error> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Self::Ok, Self::Error> {
        self.output = UbjValue::Null;
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Self::Ok, Self::Error> {
        self.serialize_unit()
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Self::Ok, Self::Error> {
        self.serialize_str(variant)
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Self::Ok, Self::Error> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Self::Ok, Self::Error> {
        self.output = tagged(variant, to_ubj(value)?);
        Ok(())
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq, Self::Error> {
        Ok(SeqSerializer {
            serializer: self,
            elements: Vec::with_capacity(len.unwrap_or(0)),
            variant: None,
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple, Self::Error> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleStruct, Self::Error> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleVariant, Self::Error> {
        Ok(SeqSerializer {
            serializer: self,
            elements: Vec::with_capacity(len),
            variant: Some(variant),
        })
    }

    fn serialize_map(self, len: Option<usize>) -> Result<Self::SerializeMap, Self::Error> {
        Ok(MapSerializer {
            serializer: self,
            map: Object::with_capacity(len.unwrap_or(0)),
            current_key: None,
            variant: None,
        })
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeStruct, Self::Error> {
        self.serialize_map(Some(len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeStructVariant, Self::Error> {
        Ok(MapSerializer {
            serializer: self,
            map: Object::with_capacity(len),
            current_key: None,
            variant: Some(variant),
        })
    }
}

pub struct SeqSerializer<'a> {
    serializer: &'a mut Serializer,
    elements: Vec<UbjValue>,
    variant: Option<&'static str>,
}

impl<'a> ser::SerializeSeq for SeqSerializer<'a> {
    type Ok = ();
    type Error = UbjsonError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        self.elements.push(to_ubj(value)?);
        Ok(())
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        let array = UbjValue::Array(self.elements);
        self.serializer.output = match self.variant {
            Some(variant) => tagged(variant, array),
            None => array,
        };
        Ok(())
    }
}

impl<'a> ser::SerializeTuple for SeqSerializer<'a> {
    type Ok = ();
    type Error = UbjsonError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        ser::SerializeSeq::end(self)
    }
}

impl<'a> ser::SerializeTupleStruct for SeqSerializer<'a> {
    type Ok = ();
    type Error = UbjsonError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        ser::SerializeSeq::end(self)
    }
}

impl<'a> ser::SerializeTupleVariant for SeqSerializer<'a> {
    type Ok = ();
    type Error = UbjsonError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        ser::SerializeSeq::end(self)
    }
}

pub struct MapSerializer<'a> {
    serializer: &'a mut Serializer,
    map: Object,
    current_key: Option<Vec<u8>>,
    variant: Option<&'static str>,
}

impl<'a> ser::SerializeMap for MapSerializer<'a> {
    type Ok = ();
    type Error = UbjsonError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), Self::Error> {
        self.current_key = Some(map_key(to_ubj(key)?)?);
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        let key = self
            .current_key
            .take()
            .ok_or_else(|| UbjsonError::Serialization("No key for value".to_string()))?;
        self.map.insert(key, to_ubj(value)?);
        Ok(())
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        let object = UbjValue::Object(self.map);
        self.serializer.output = match self.variant {
            Some(variant) => tagged(variant, object),
            None => object,
        };
        Ok(())
    }
}

impl<'a> ser::SerializeStruct for MapSerializer<'a> {
    type Ok = ();
    type Error = UbjsonError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Self::Error> {
        self.map.insert(key.as_bytes().to_vec(), to_ubj(value)?);
        Ok(())
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        ser::SerializeMap::end(self)
    }
}

impl<'a> ser::SerializeStructVariant for MapSerializer<'a> {
    type Ok = ();
    type Error = UbjsonError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Self::Error> {
        ser::SerializeStruct::serialize_field(self, key, value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        ser::SerializeMap::end(self)
    }
}

impl ser::Error for UbjsonError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        UbjsonError::Serialization(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ubj;
    use serde::Serialize;
    use std::collections::BTreeMap;

    #[derive(Serialize)]
    struct Point {
        x: i32,
        label: String,
        weight: Option<f64>,
    }

    #[derive(Serialize)]
    enum Shape {
        Empty,
        Circle(u16),
        Line(i8, i8),
        Rect { w: u8, h: u8 },
    }

    #[test]
    fn test_struct() {
        let value = to_ubj(&Point { x: -3, label: "p".to_string(), weight: None }).unwrap();
        assert_eq!(value, ubj!({ "x": (-3), "label": "p", "weight": null }));
    }

    #[test]
    fn test_enum_variants() {
        assert_eq!(to_ubj(&Shape::Empty).unwrap(), ubj!("Empty"));
        assert_eq!(to_ubj(&Shape::Circle(300)).unwrap(), ubj!({ "Circle": 300 }));
        assert_eq!(to_ubj(&Shape::Line(1, 2)).unwrap(), ubj!({ "Line": [1, 2] }));
        assert_eq!(to_ubj(&Shape::Rect { w: 4, h: 5 }).unwrap(), ubj!({ "Rect": { "w": 4, "h": 5 } }));
    }

    #[test]
    fn test_integer_keys_and_range() {
        let mut map = BTreeMap::new();
        map.insert(10u32, true);
        map.insert(2u32, false);
        assert_eq!(to_ubj(&map).unwrap(), ubj!({ "2": false, "10": true }));

        assert!(matches!(to_ubj(&(1u64 << 31)), Err(UbjsonError::IntegerOutOfRange(_))));
        assert!(matches!(to_ubj(&i64::MIN), Err(UbjsonError::IntegerOutOfRange(_))));
        assert_eq!(to_ubj(&(i32::MAX as u64)).unwrap(), UbjValue::Int(i32::MAX as i64));
    }

    #[test]
    fn test_unsupported_key() {
        let mut map = BTreeMap::new();
        map.insert(vec![1, 2], 0);
        assert!(matches!(to_ubj(&map), Err(UbjsonError::UnsupportedValueKind(_))));
    }
}
