pub const DEFAULT_MAX_DEPTH: usize = 512;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeMarker {
    NoOp = b'N',
    Null = b'Z',
    False = b'F',
    True = b'T',
    Int8 = b'i',
    UInt8 = b'U',
    Int16 = b'I',
    Int32 = b'l',
    Int64 = b'L',
    Float32 = b'd',
    Float64 = b'D',
    Char = b'C',
    String = b'S',
    HighPrecision = b'H',
    ArrayOpen = b'[',
    ArrayClose = b']',
    ObjectOpen = b'{',
    ObjectClose = b'}',
}

impl TypeMarker {
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            b'N' => Some(Self::NoOp),
            b'Z' => Some(Self::Null),
            b'F' => Some(Self::False),
            b'T' => Some(Self::True),
            b'i' => Some(Self::Int8),
            b'U' => Some(Self::UInt8),
            b'I' => Some(Self::Int16),
            b'l' => Some(Self::Int32),
            b'L' => Some(Self::Int64),
            b'd' => Some(Self::Float32),
            b'D' => Some(Self::Float64),
            b'C' => Some(Self::Char),
            b'S' => Some(Self::String),
            b'H' => Some(Self::HighPrecision),
            b'[' => Some(Self::ArrayOpen),
            b']' => Some(Self::ArrayClose),
            b'{' => Some(Self::ObjectOpen),
            b'}' => Some(Self::ObjectClose),
            _ => None,
        }
    }

    /// 格式定义了但本实现不读写的标记
    pub fn is_unsupported(self) -> bool {
        matches!(self, Self::NoOp | Self::Int64 | Self::Float64)
    }
}
