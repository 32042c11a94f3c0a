//! UBJSON 结构解码模块
//!
//! 在分词器的词法单元流上做递归下降，重建嵌套的 [`UbjValue`]。
//! 错误策略按调用生效：严格模式直接返回错误，宽松模式把首个错误记录在
//! [`Decoded::fault`] 中并尽力返回已解码的部分。

use crate::options::{ContainerRepresentation, DecodeOptions, ErrorPolicy, UnknownTagPolicy};
use crate::tokenizer::{Token, Tokenizer};
use crate::value::{is_index_keyed, Object, UbjValue};
use crate::{UbjsonError, UbjsonResult};
use tracing::{debug, trace, warn};

/// 一次解码调用的结果
///
/// `value` 为 `None` 表示输入为空、顶层遇到关闭标记，或宽松模式下解码失败
#[derive(Debug)]
pub struct Decoded {
    pub value: Option<UbjValue>,
    pub fault: Option<UbjsonError>,
}

impl Decoded {
    pub fn is_clean(&self) -> bool {
        self.fault.is_none()
    }

    /// 转换为 Result：有记录的错误时返回该错误
    pub fn into_result(self) -> UbjsonResult<Option<UbjValue>> {
        match self.fault {
            Some(fault) => Err(fault),
            None => Ok(self.value),
        }
    }
}

/// 使用默认选项（严格模式）解码
///
/// # Brief
/// 解码缓冲区开头的一个值
///
/// # Arguments
/// * `data` - 完整的输入缓冲区
///
/// # Returns
/// 成功返回解码的值（空输入为 `None`），失败返回错误
pub fn decode(data: &[u8]) -> UbjsonResult<Option<UbjValue>> {
    decode_with(data, &DecodeOptions::default())?.into_result()
}

/// 按指定选项解码
///
/// # Brief
/// 严格模式下任何错误都以 `Err` 返回；宽松模式下错误记录在 [`Decoded`] 中，
/// 出错的步骤产生空值，外层容器保留已解码的元素
///
/// # Arguments
/// * `data` - 完整的输入缓冲区
/// * `options` - 解码选项
///
/// # Returns
/// 解码结果
pub fn decode_with(data: &[u8], options: &DecodeOptions) -> UbjsonResult<Decoded> {
    let mut decoder = StructureDecoder::new(data, options);
    decoder.advance()?;
    let value = decoder.decode_value()?;
    debug!(
        "Decoded {} of {} bytes, fault: {}",
        decoder.tokenizer.token_offset(),
        data.len(),
        decoder.fault.is_some()
    );
    Ok(Decoded {
        value,
        fault: decoder.fault,
    })
}

/// 解码缓冲区中连续的多个顶层值
///
/// 总是按严格模式处理错误；顶层出现关闭标记返回 `UnexpectedToken`
pub fn decode_all(data: &[u8], options: &DecodeOptions) -> UbjsonResult<Vec<UbjValue>> {
    let options = options.clone().with_error_policy(ErrorPolicy::Strict);
    let mut decoder = StructureDecoder::new(data, &options);
    decoder.advance()?;
    let mut values = Vec::new();
    while let Some(value) = decoder.decode_value()? {
        values.push(value);
    }
    match decoder.tokenizer.current() {
        Token::EndOfInput => Ok(values),
        other => Err(UbjsonError::UnexpectedToken {
            offset: decoder.tokenizer.token_offset(),
            found: format!("{} at top level", other.describe()),
        }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Array,
    Object,
}

/// 递归下降解码器
///
/// 持有一次解码调用独占的分词器；当前单元总是下一个待处理的单元
struct StructureDecoder<'a> {
    tokenizer: Tokenizer<'a>,
    options: &'a DecodeOptions,
    depth: usize,
    fault: Option<UbjsonError>,
}

impl<'a> StructureDecoder<'a> {
    fn new(data: &'a [u8], options: &'a DecodeOptions) -> Self {
        Self {
            tokenizer: Tokenizer::with_policy(data, options.unknown_tag_policy),
            options,
            depth: 0,
            fault: None,
        }
    }

    /// 严格模式返回错误；宽松模式记录首个错误并停止读取
    fn fail(&mut self, err: UbjsonError) -> UbjsonResult<()> {
        match self.options.error_policy {
            ErrorPolicy::Strict => Err(err),
            ErrorPolicy::Lenient => {
                warn!("Lenient decode recorded fault: {}", err);
                if self.fault.is_none() {
                    self.fault = Some(err);
                }
                self.tokenizer.halt();
                Ok(())
            }
        }
    }

    fn advance(&mut self) -> UbjsonResult<()> {
        if let Err(e) = self.tokenizer.advance().map(|_| ()) {
            self.fail(e)?;
        }
        Ok(())
    }

    /// 解码当前单元开始的值
    ///
    /// # Returns
    /// 数据单元或容器返回其值并前进到其后的单元；
    /// `EndOfInput` 或关闭标记返回 `None` 且不前进
    fn decode_value(&mut self) -> UbjsonResult<Option<UbjValue>> {
        match self.tokenizer.take_current() {
            Token::Data(value) => {
                self.advance()?;
                Ok(Some(value))
            }
            Token::OpenArray => self.decode_container(Shape::Array),
            Token::OpenObject => self.decode_container(Shape::Object),
            other => {
                self.tokenizer.restore(other);
                Ok(None)
            }
        }
    }

    fn decode_container(&mut self, shape: Shape) -> UbjsonResult<Option<UbjValue>> {
        if self.depth >= self.options.max_depth {
            self.fail(UbjsonError::NestingTooDeep(self.options.max_depth))?;
            return Ok(None);
        }
        trace!(
            "Decoding {:?} at offset {}, depth {}",
            shape,
            self.tokenizer.token_offset(),
            self.depth
        );

        self.depth += 1;
        self.advance()?;
        let value = match shape {
            Shape::Array => self.decode_array_items()?,
            Shape::Object => self.decode_object_items()?,
        };
        self.depth -= 1;

        // 越过关闭标记
        self.advance()?;
        Ok(Some(value))
    }

    fn decode_array_items(&mut self) -> UbjsonResult<UbjValue> {
        let mut arr = Vec::new();
        loop {
            match self.tokenizer.current() {
                Token::CloseArray => break,
                Token::EndOfInput => {
                    self.unterminated()?;
                    break;
                }
                _ => {}
            }
            match self.decode_value()? {
                Some(value) => arr.push(value),
                None => {
                    self.missing_value()?;
                    break;
                }
            }
        }
        Ok(UbjValue::Array(arr))
    }

    fn decode_object_items(&mut self) -> UbjsonResult<UbjValue> {
        let mut obj = Object::new();
        loop {
            let key = match self.tokenizer.take_current() {
                Token::CloseObject => {
                    self.tokenizer.restore(Token::CloseObject);
                    break;
                }
                Token::EndOfInput => {
                    self.unterminated()?;
                    break;
                }
                Token::Data(value) => match into_key(value) {
                    Ok(key) => key,
                    Err(value) => {
                        self.unexpected_key(&format!("{} value", value.type_name()))?;
                        break;
                    }
                },
                other => {
                    self.unexpected_key(&other.describe())?;
                    break;
                }
            };

            self.advance()?;
            match self.decode_value()? {
                // 重复键：后者覆盖前者，保留首次出现的位置
                Some(value) => {
                    obj.insert(key, value);
                }
                None => {
                    self.missing_value()?;
                    break;
                }
            }
        }

        if self.options.container_representation == ContainerRepresentation::ArrayPreferring
            && is_index_keyed(&obj)
        {
            return Ok(UbjValue::Array(obj.into_values().collect()));
        }
        Ok(UbjValue::Object(obj))
    }

    /// 容器在关闭标记之前遇到输入结束
    fn unterminated(&mut self) -> UbjsonResult<()> {
        if self.fault.is_some() || self.options.unknown_tag_policy == UnknownTagPolicy::Truncate {
            return Ok(());
        }
        let offset = self.tokenizer.cursor().position();
        self.fail(UbjsonError::UnexpectedEof {
            offset,
            need: 1,
            have: 0,
        })
    }

    /// 需要值的位置上是关闭标记或输入结束
    fn missing_value(&mut self) -> UbjsonResult<()> {
        if matches!(self.tokenizer.current(), Token::EndOfInput) {
            return self.unterminated();
        }
        let err = UbjsonError::UnexpectedToken {
            offset: self.tokenizer.token_offset(),
            found: format!("{} where a value was expected", self.tokenizer.current().describe()),
        };
        self.fail(err)
    }

    fn unexpected_key(&mut self, found: &str) -> UbjsonResult<()> {
        let err = UbjsonError::UnexpectedToken {
            offset: self.tokenizer.token_offset(),
            found: format!("{} where an object key was expected", found),
        };
        self.fail(err)
    }
}

fn into_key(value: UbjValue) -> Result<Vec<u8>, UbjValue> {
    match value {
        UbjValue::Char(c) => Ok(vec![c]),
        UbjValue::Str(bytes) | UbjValue::HighPrecision(bytes) => Ok(bytes),
        other => Err(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ubj;

    fn strict(data: &[u8]) -> UbjsonResult<Option<UbjValue>> {
        decode(data)
    }

    fn lenient(data: &[u8]) -> Decoded {
        decode_with(data, &DecodeOptions::lenient()).unwrap()
    }

    #[test]
    fn test_decode_scalars() {
        assert_eq!(strict(b"Z").unwrap(), Some(UbjValue::Null));
        assert_eq!(strict(&[b'U', 5]).unwrap(), Some(UbjValue::Int(5)));
        assert_eq!(strict(b"").unwrap(), None);
    }

    #[test]
    fn test_decode_containers() {
        assert_eq!(
            strict(b"[U\x01U\x02U\x03]").unwrap(),
            Some(ubj!([1, 2, 3]))
        );
        assert_eq!(strict(b"{CaU\x01}").unwrap(), Some(ubj!({ "a": 1 })));
        assert_eq!(strict(b"[]").unwrap(), Some(UbjValue::Array(Vec::new())));
        assert_eq!(strict(b"{}").unwrap(), Some(UbjValue::Object(Object::new())));
        assert_eq!(
            strict(b"[[Z]{SU\x02abT}]").unwrap(),
            Some(ubj!([[null], { "ab": true }]))
        );
    }

    #[test]
    fn test_object_key_forms() {
        let value = strict(b"{CkZSU\x03keyTHU\x0242F}").unwrap().unwrap();
        let obj = value.as_object().unwrap();
        let keys: Vec<&[u8]> = obj.keys().map(|k| k.as_slice()).collect();
        assert_eq!(keys, vec![b"k".as_slice(), b"key".as_slice(), b"42".as_slice()]);
    }

    #[test]
    fn test_duplicate_keys_last_write_wins() {
        let value = strict(b"{CaU\x01CbU\x02CaU\x03}").unwrap().unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert_eq!(value.get("a"), Some(&UbjValue::Int(3)));
        assert_eq!(obj.get_index(0).map(|(k, _)| k.as_slice()), Some(b"a".as_slice()));
    }

    #[test]
    fn test_array_preferring() {
        let data = b"{C0U\x0aC1U\x0b}";
        let opts = DecodeOptions::default()
            .with_container_representation(ContainerRepresentation::ArrayPreferring);
        let value = decode_with(data, &opts).unwrap().value.unwrap();
        assert_eq!(value, ubj!([10, 11]));

        let keyed = decode(data).unwrap().unwrap();
        assert_eq!(keyed, ubj!({ "0": 10, "1": 11 }));

        let sparse = decode_with(b"{C1U\x0a}", &opts).unwrap().value.unwrap();
        assert!(sparse.as_object().is_some());
    }

    #[test]
    fn test_truncated_strict_and_lenient() {
        assert!(matches!(strict(b"I"), Err(UbjsonError::UnexpectedEof { .. })));

        let result = lenient(b"I");
        assert!(result.value.is_none());
        assert!(matches!(result.fault, Some(UbjsonError::UnexpectedEof { .. })));
    }

    #[test]
    fn test_lenient_keeps_partial_container() {
        let result = lenient(b"[U\x01SU\x09ab");
        assert_eq!(result.value, Some(ubj!([1])));
        assert!(matches!(result.fault, Some(UbjsonError::UnexpectedEof { .. })));
        assert!(!result.is_clean());
    }

    #[test]
    fn test_unterminated_container() {
        assert!(matches!(strict(b"[U\x01"), Err(UbjsonError::UnexpectedEof { offset: 3, .. })));
        assert!(matches!(strict(b"{CaU\x01"), Err(UbjsonError::UnexpectedEof { .. })));
        assert!(matches!(strict(b"{Ca"), Err(UbjsonError::UnexpectedEof { .. })));
    }

    #[test]
    fn test_non_string_key() {
        assert!(matches!(
            strict(b"{U\x01U\x02}"),
            Err(UbjsonError::UnexpectedToken { offset: 1, .. })
        ));
        assert!(matches!(strict(b"{[]Z}"), Err(UbjsonError::UnexpectedToken { .. })));

        let result = lenient(b"{CaTU\x01U\x02}");
        assert_eq!(result.value, Some(ubj!({ "a": true })));
        assert!(matches!(result.fault, Some(UbjsonError::UnexpectedToken { .. })));
    }

    #[test]
    fn test_mismatched_close_marker() {
        assert!(matches!(strict(b"[U\x01}"), Err(UbjsonError::UnexpectedToken { offset: 3, .. })));
        assert!(matches!(strict(b"{Ca]"), Err(UbjsonError::UnexpectedToken { .. })));
        assert!(matches!(strict(b"{Ca}"), Err(UbjsonError::UnexpectedToken { offset: 3, .. })));
        // 顶层的关闭标记是终止条件
        assert_eq!(strict(b"]").unwrap(), None);
    }

    #[test]
    fn test_unknown_tag_policies() {
        assert!(matches!(
            strict(b"[U\x01Lxxxxxxxx]"),
            Err(UbjsonError::UnsupportedTag { offset: 3, marker: b'L' })
        ));

        let opts = DecodeOptions::default().with_unknown_tag_policy(UnknownTagPolicy::Truncate);
        let result = decode_with(b"[U\x01Lxxxxxxxx]", &opts).unwrap();
        assert_eq!(result.value, Some(ubj!([1])));
        assert!(result.is_clean());

        let result = decode_with(b"D", &opts).unwrap();
        assert!(result.value.is_none());
        assert!(result.is_clean());
    }

    #[test]
    fn test_nesting_limit() {
        let mut data = vec![b'['; 10];
        data.extend(vec![b']'; 10]);
        let opts = DecodeOptions::default().with_max_depth(10);
        assert!(decode_with(&data, &opts).unwrap().is_clean());

        let opts = DecodeOptions::default().with_max_depth(9);
        assert!(matches!(
            decode_with(&data, &opts),
            Err(UbjsonError::NestingTooDeep(9))
        ));

        let deep = vec![b'['; 100_000];
        assert!(matches!(decode(&deep), Err(UbjsonError::NestingTooDeep(_))));

        let result = decode_with(&data, &opts.with_error_policy(ErrorPolicy::Lenient)).unwrap();
        assert!(matches!(result.fault, Some(UbjsonError::NestingTooDeep(9))));
        assert!(result.value.is_some());
    }

    #[test]
    fn test_decode_all() {
        let values = decode_all(b"ZU\x05[T]", &DecodeOptions::default()).unwrap();
        assert_eq!(values, vec![UbjValue::Null, UbjValue::Int(5), ubj!([true])]);

        assert!(decode_all(b"", &DecodeOptions::default()).unwrap().is_empty());
        assert!(matches!(
            decode_all(b"Z]", &DecodeOptions::default()),
            Err(UbjsonError::UnexpectedToken { offset: 1, .. })
        ));
        assert!(decode_all(b"ZI", &DecodeOptions::lenient()).is_err());
    }
}
