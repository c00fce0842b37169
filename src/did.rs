//! Data identifier (DID) codecs.
//!
//! The services that read or write DIDs ([crate::uds::read_data_by_identifier],
//! [crate::uds::write_data_by_identifier], [crate::uds::input_output_control],
//! [crate::uds::read_dtc_information] snapshots) need to know how many bytes each DID
//! occupies, and how to turn these bytes into a value. This knowledge is vehicle specific,
//! and is given to the client through [DidConfig] and [IoConfig].

use std::{collections::HashMap, fmt::Debug, sync::Arc};

use crate::{UdsError, UdsResult, min_byte_width, write_be_uint};

/// DID codec result
pub type CodecResult<T> = Result<T, CodecError>;

/// Error produced by a [DidCodec]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Data is not the length the codec expects
    #[error("Expected {expected} bytes, got {got} bytes")]
    WrongLength {
        /// Bytes the codec expects
        expected: usize,
        /// Bytes given
        got: usize,
    },
    /// Value is not of a type the codec can encode
    #[error("Cannot encode {got} as {expected}")]
    WrongType {
        /// Type the codec expects
        expected: &'static str,
        /// Value given
        got: String,
    },
    /// Value does not fit in the encoded type
    #[error("Value {0} is out of range")]
    OutOfRange(String),
    /// Pack format string is invalid
    #[error("Invalid pack format: {0}")]
    InvalidFormat(String),
    /// Text is not ASCII
    #[error("String is not valid ASCII")]
    InvalidText,
}

/// Number of bytes a codec consumes
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CodecLength {
    /// Exact number of bytes
    Fixed(usize),
    /// Everything left in the payload. A DID with such a codec must be the last one of a request
    ReadAllRemaining,
}

/// A decoded DID value
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DidValue {
    /// Boolean
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Unsigned integer
    UInt(u64),
    /// Floating point number
    Float(f64),
    /// Raw bytes
    Bytes(Vec<u8>),
    /// Text
    Text(String),
    /// Several values
    List(Vec<DidValue>),
}

impl DidValue {
    /// Value as an unsigned integer, if it is an integer that fits
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::UInt(v) => Some(*v),
            Self::Int(v) => u64::try_from(*v).ok(),
            Self::Bool(b) => Some(*b as u64),
            _ => None,
        }
    }

    /// Value as a signed integer, if it is an integer that fits
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::UInt(v) => i64::try_from(*v).ok(),
            Self::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    /// Value as a float, if it is numeric
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            Self::UInt(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Value as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Value as raw bytes
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            Self::Text(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Value as text
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Value as a list
    pub fn as_list(&self) -> Option<&[DidValue]> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }
}

macro_rules! did_value_from {
    ($variant:ident, $target:ty, $($t:ty),*) => {
        $(
            impl From<$t> for DidValue {
                fn from(v: $t) -> Self {
                    Self::$variant(v as $target)
                }
            }
        )*
    };
}

did_value_from!(Int, i64, i8, i16, i32, i64);
did_value_from!(UInt, u64, u8, u16, u32, u64);
did_value_from!(Float, f64, f32, f64);

impl From<bool> for DidValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<Vec<u8>> for DidValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<&[u8]> for DidValue {
    fn from(v: &[u8]) -> Self {
        Self::Bytes(v.to_vec())
    }
}

impl From<String> for DidValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for DidValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<Vec<DidValue>> for DidValue {
    fn from(v: Vec<DidValue>) -> Self {
        Self::List(v)
    }
}

/// Converts DID values to and from bytes
pub trait DidCodec: Send + Sync + Debug {
    /// Encodes a value
    fn encode(&self, value: &DidValue) -> CodecResult<Vec<u8>>;
    /// Decodes bytes. `data` is exactly [DidCodec::length] bytes long, unless the
    /// codec reads all remaining data
    fn decode(&self, data: &[u8]) -> CodecResult<DidValue>;
    /// Number of bytes the codec consumes
    fn length(&self) -> CodecLength;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum PackKind {
    Pad,
    Char,
    I8,
    U8,
    Bool,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    Str,
}

impl PackKind {
    fn from_char(c: char) -> Option<Self> {
        Some(match c {
            'x' => Self::Pad,
            'c' => Self::Char,
            'b' => Self::I8,
            'B' => Self::U8,
            '?' => Self::Bool,
            'h' => Self::I16,
            'H' => Self::U16,
            'i' | 'l' => Self::I32,
            'I' | 'L' => Self::U32,
            'q' => Self::I64,
            'Q' => Self::U64,
            'f' => Self::F32,
            'd' => Self::F64,
            's' => Self::Str,
            _ => return None,
        })
    }

    fn size(&self) -> usize {
        match self {
            Self::Pad | Self::Char | Self::I8 | Self::U8 | Self::Bool | Self::Str => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }

    fn int_range(&self) -> Option<(i128, i128)> {
        Some(match self {
            Self::I8 => (i8::MIN as i128, i8::MAX as i128),
            Self::U8 => (0, u8::MAX as i128),
            Self::I16 => (i16::MIN as i128, i16::MAX as i128),
            Self::U16 => (0, u16::MAX as i128),
            Self::I32 => (i32::MIN as i128, i32::MAX as i128),
            Self::U32 => (0, u32::MAX as i128),
            Self::I64 => (i64::MIN as i128, i64::MAX as i128),
            Self::U64 => (0, u64::MAX as i128),
            _ => return None,
        })
    }

    fn signed(&self) -> bool {
        matches!(self, Self::I8 | Self::I16 | Self::I32 | Self::I64)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct PackItem {
    kind: PackKind,
    count: usize,
}

/// Codec described by a pack format string, in the style of C structure packing.
///
/// The first character may select the byte order (`<` little endian, `>` or `!` big endian).
/// Without it, big endian is used. Each following character is a field, optionally preceded
/// by a repeat count:
///
/// | Char | Type | Bytes |
/// |---|---|---|
/// | x | padding, no value | 1 |
/// | c | single byte ([DidValue::Bytes]) | 1 |
/// | b / B | i8 / u8 | 1 |
/// | ? | bool | 1 |
/// | h / H | i16 / u16 | 2 |
/// | i, l / I, L | i32 / u32 | 4 |
/// | q / Q | i64 / u64 | 8 |
/// | f / d | f32 / f64 | 4 / 8 |
/// | s | bytes, the count is the length | 1 |
///
/// A format yielding one value decodes to that value, otherwise to a [DidValue::List]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackCodec {
    format: String,
    little_endian: bool,
    items: Vec<PackItem>,
}

impl PackCodec {
    /// Parses a pack format string
    pub fn new(format: &str) -> CodecResult<Self> {
        let mut chars = format.chars().peekable();
        let mut little_endian = false;
        match chars.peek() {
            Some('<') => {
                little_endian = true;
                chars.next();
            }
            Some('>') | Some('!') => {
                chars.next();
            }
            _ => {}
        }
        let mut items = Vec::new();
        let mut count: Option<usize> = None;
        for c in chars {
            if c.is_whitespace() {
                continue;
            }
            if let Some(d) = c.to_digit(10) {
                count = count
                    .unwrap_or(0)
                    .checked_mul(10)
                    .and_then(|n| n.checked_add(d as usize));
                if count.is_none() {
                    return Err(CodecError::InvalidFormat(format!(
                        "Repeat count too large in '{format}'"
                    )));
                }
                continue;
            }
            let kind = PackKind::from_char(c).ok_or_else(|| {
                CodecError::InvalidFormat(format!("'{c}' is not a valid field in '{format}'"))
            })?;
            items.push(PackItem {
                kind,
                count: count.take().unwrap_or(1),
            });
        }
        if count.is_some() {
            return Err(CodecError::InvalidFormat(format!(
                "Repeat count without a field in '{format}'"
            )));
        }
        let size = items.iter().try_fold(0usize, |acc, i| {
            i.kind.size().checked_mul(i.count).and_then(|n| acc.checked_add(n))
        });
        if size.is_none() {
            return Err(CodecError::InvalidFormat(format!(
                "Packed size of '{format}' does not fit in memory"
            )));
        }
        Ok(Self {
            format: format.to_string(),
            little_endian,
            items,
        })
    }

    /// Format string of this codec
    pub fn format(&self) -> &str {
        &self.format
    }

    /// Size of the packed data in bytes
    pub fn size(&self) -> usize {
        self.items.iter().map(|i| i.kind.size() * i.count).sum()
    }

    fn value_count(&self) -> usize {
        self.items
            .iter()
            .map(|i| match i.kind {
                PackKind::Pad => 0,
                PackKind::Str => 1,
                _ => i.count,
            })
            .sum()
    }

    fn write_int(&self, out: &mut Vec<u8>, value: u64, size: usize) {
        let mut bytes = write_be_uint(value, size);
        if self.little_endian {
            bytes.reverse();
        }
        out.extend_from_slice(&bytes);
    }

    fn read_int(&self, data: &[u8]) -> u64 {
        let it: Box<dyn Iterator<Item = &u8>> = if self.little_endian {
            Box::new(data.iter().rev())
        } else {
            Box::new(data.iter())
        };
        it.fold(0u64, |acc, b| (acc << 8) | *b as u64)
    }

    fn encode_one(&self, kind: PackKind, value: &DidValue, out: &mut Vec<u8>) -> CodecResult<()> {
        match kind {
            PackKind::Bool => {
                let b = match value {
                    DidValue::Bool(b) => *b,
                    v => v.as_i64().map(|i| i != 0).ok_or_else(|| wrong_type("bool", v))?,
                };
                out.push(b as u8);
            }
            PackKind::Char => match value {
                DidValue::Bytes(b) if b.len() == 1 => out.push(b[0]),
                DidValue::UInt(v) if *v <= 0xFF => out.push(*v as u8),
                v => return Err(wrong_type("single byte", v)),
            },
            PackKind::F32 => {
                let f = value.as_f64().ok_or_else(|| wrong_type("float", value))? as f32;
                let mut bytes = f.to_be_bytes().to_vec();
                if self.little_endian {
                    bytes.reverse();
                }
                out.extend_from_slice(&bytes);
            }
            PackKind::F64 => {
                let f = value.as_f64().ok_or_else(|| wrong_type("float", value))?;
                let mut bytes = f.to_be_bytes().to_vec();
                if self.little_endian {
                    bytes.reverse();
                }
                out.extend_from_slice(&bytes);
            }
            k => {
                let (min, max) = k.int_range().ok_or_else(|| wrong_type("integer", value))?;
                let v: i128 = match value {
                    DidValue::Int(i) => *i as i128,
                    DidValue::UInt(u) => *u as i128,
                    DidValue::Bool(b) => *b as i128,
                    v => return Err(wrong_type("integer", v)),
                };
                if v < min || v > max {
                    return Err(CodecError::OutOfRange(v.to_string()));
                }
                self.write_int(out, v as u64, k.size());
            }
        }
        Ok(())
    }

    fn decode_one(&self, kind: PackKind, data: &[u8]) -> DidValue {
        match kind {
            PackKind::Bool => DidValue::Bool(data[0] != 0),
            PackKind::Char => DidValue::Bytes(vec![data[0]]),
            PackKind::F32 => {
                let raw = self.read_int(data) as u32;
                DidValue::Float(f32::from_bits(raw) as f64)
            }
            PackKind::F64 => DidValue::Float(f64::from_bits(self.read_int(data))),
            k => {
                let raw = self.read_int(data);
                if k.signed() {
                    let shift = 64 - k.size() * 8;
                    DidValue::Int(((raw << shift) as i64) >> shift)
                } else {
                    DidValue::UInt(raw)
                }
            }
        }
    }
}

fn wrong_type(expected: &'static str, got: &DidValue) -> CodecError {
    CodecError::WrongType {
        expected,
        got: format!("{got:?}"),
    }
}

impl DidCodec for PackCodec {
    fn encode(&self, value: &DidValue) -> CodecResult<Vec<u8>> {
        let count = self.value_count();
        let single = [value.clone()];
        let values: &[DidValue] = match value {
            DidValue::List(l) if count != 1 => l,
            _ => &single,
        };
        if values.len() != count {
            return Err(CodecError::WrongType {
                expected: "list of values matching the pack format",
                got: format!("{} values", values.len()),
            });
        }
        let mut out = Vec::with_capacity(self.size());
        let mut values = values.iter();
        for item in &self.items {
            match item.kind {
                PackKind::Pad => out.extend(std::iter::repeat_n(0u8, item.count)),
                PackKind::Str => {
                    let v = values.next().ok_or(CodecError::OutOfRange("value count".into()))?;
                    let bytes = v.as_bytes().ok_or_else(|| wrong_type("bytes", v))?;
                    let mut field = bytes.to_vec();
                    field.resize(item.count, 0);
                    out.extend_from_slice(&field);
                }
                k => {
                    for _ in 0..item.count {
                        let v = values.next().ok_or(CodecError::OutOfRange("value count".into()))?;
                        self.encode_one(k, v, &mut out)?;
                    }
                }
            }
        }
        Ok(out)
    }

    fn decode(&self, data: &[u8]) -> CodecResult<DidValue> {
        if data.len() != self.size() {
            return Err(CodecError::WrongLength {
                expected: self.size(),
                got: data.len(),
            });
        }
        let mut values = Vec::with_capacity(self.value_count());
        let mut pos = 0;
        for item in &self.items {
            match item.kind {
                PackKind::Pad => pos += item.count,
                PackKind::Str => {
                    values.push(DidValue::Bytes(data[pos..pos + item.count].to_vec()));
                    pos += item.count;
                }
                k => {
                    for _ in 0..item.count {
                        values.push(self.decode_one(k, &data[pos..pos + k.size()]));
                        pos += k.size();
                    }
                }
            }
        }
        if values.len() == 1 {
            Ok(values.remove(0))
        } else {
            Ok(DidValue::List(values))
        }
    }

    fn length(&self) -> CodecLength {
        CodecLength::Fixed(self.size())
    }
}

/// Fixed length ASCII string codec
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AsciiCodec {
    length: usize,
}

impl AsciiCodec {
    /// Creates a codec for strings of exactly `length` characters
    pub fn new(length: usize) -> Self {
        Self { length }
    }
}

impl DidCodec for AsciiCodec {
    fn encode(&self, value: &DidValue) -> CodecResult<Vec<u8>> {
        let s = value.as_str().ok_or_else(|| wrong_type("string", value))?;
        if !s.is_ascii() {
            return Err(CodecError::InvalidText);
        }
        if s.len() != self.length {
            return Err(CodecError::WrongLength {
                expected: self.length,
                got: s.len(),
            });
        }
        Ok(s.as_bytes().to_vec())
    }

    fn decode(&self, data: &[u8]) -> CodecResult<DidValue> {
        if !data.is_ascii() {
            return Err(CodecError::InvalidText);
        }
        Ok(DidValue::Text(String::from_utf8_lossy(data).into_owned()))
    }

    fn length(&self) -> CodecLength {
        CodecLength::Fixed(self.length)
    }
}

/// Codec passing bytes through untouched
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RawCodec {
    length: CodecLength,
}

impl RawCodec {
    /// Codec for exactly `length` bytes
    pub fn fixed(length: usize) -> Self {
        Self {
            length: CodecLength::Fixed(length),
        }
    }

    /// Codec consuming all remaining bytes of a response
    pub fn read_all() -> Self {
        Self {
            length: CodecLength::ReadAllRemaining,
        }
    }
}

impl DidCodec for RawCodec {
    fn encode(&self, value: &DidValue) -> CodecResult<Vec<u8>> {
        let b = value.as_bytes().ok_or_else(|| wrong_type("bytes", value))?;
        if let CodecLength::Fixed(l) = self.length {
            if b.len() != l {
                return Err(CodecError::WrongLength {
                    expected: l,
                    got: b.len(),
                });
            }
        }
        Ok(b.to_vec())
    }

    fn decode(&self, data: &[u8]) -> CodecResult<DidValue> {
        Ok(DidValue::Bytes(data.to_vec()))
    }

    fn length(&self) -> CodecLength {
        self.length
    }
}

/// Maps data identifiers to their codec.
///
/// A default codec can be set, which is used for every DID without its own codec
#[derive(Debug, Clone, Default)]
pub struct DidConfig {
    codecs: HashMap<u16, Arc<dyn DidCodec>>,
    default: Option<Arc<dyn DidCodec>>,
}

impl DidConfig {
    /// Creates an empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder variant of [DidConfig::insert]
    pub fn with<C: DidCodec + 'static>(mut self, did: u16, codec: C) -> Self {
        self.insert(did, codec);
        self
    }

    /// Builder variant of [DidConfig::set_default]
    pub fn with_default<C: DidCodec + 'static>(mut self, codec: C) -> Self {
        self.set_default(codec);
        self
    }

    /// Sets the codec of a DID
    pub fn insert<C: DidCodec + 'static>(&mut self, did: u16, codec: C) {
        self.codecs.insert(did, Arc::new(codec));
    }

    /// Sets the codec of a DID from a shared codec
    pub fn insert_shared(&mut self, did: u16, codec: Arc<dyn DidCodec>) {
        self.codecs.insert(did, codec);
    }

    /// Sets the codec used for DIDs without their own codec
    pub fn set_default<C: DidCodec + 'static>(&mut self, codec: C) {
        self.default = Some(Arc::new(codec));
    }

    /// Removes the codec of a DID
    pub fn remove(&mut self, did: u16) -> Option<Arc<dyn DidCodec>> {
        self.codecs.remove(&did)
    }

    /// Codec for a DID, falling back to the default codec
    pub fn get(&self, did: u16) -> Option<&Arc<dyn DidCodec>> {
        self.codecs.get(&did).or(self.default.as_ref())
    }

    /// Returns true if a codec (Or the default codec) applies to the DID
    pub fn contains(&self, did: u16) -> bool {
        self.get(did).is_some()
    }

    pub(crate) fn fetch(&self, did: u16) -> UdsResult<&Arc<dyn DidCodec>> {
        self.get(did).ok_or_else(|| {
            UdsError::config(
                Some(did),
                format!(
                    "Actual data identifier configuration contains no definition for data identifier 0x{did:04X}"
                ),
            )
        })
    }
}

/// Mask selection for InputOutputControlByIdentifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IoMasks {
    /// Every bit of the mask is set
    All,
    /// Only the named masks are set
    Select(Vec<String>),
}

impl IoMasks {
    /// Selects masks by name
    pub fn select<S: Into<String>, I: IntoIterator<Item = S>>(names: I) -> Self {
        Self::Select(names.into_iter().map(Into::into).collect())
    }
}

/// IO control configuration of one DID
#[derive(Debug, Clone)]
pub struct IoConfigEntry {
    /// Codec for the control state values
    pub codec: Arc<dyn DidCodec>,
    /// Named mask bits
    pub masks: HashMap<String, u64>,
    /// Mask width in bytes. If None, the smallest width holding the largest mask is used
    pub mask_size: Option<usize>,
}

impl IoConfigEntry {
    /// Creates an entry without masks
    pub fn new<C: DidCodec + 'static>(codec: C) -> Self {
        Self {
            codec: Arc::new(codec),
            masks: HashMap::new(),
            mask_size: None,
        }
    }

    /// Adds a named mask bit
    pub fn with_mask(mut self, name: &str, value: u64) -> Self {
        self.masks.insert(name.to_string(), value);
        self
    }

    /// Sets the mask width in bytes
    pub fn with_mask_size(mut self, size: usize) -> Self {
        self.mask_size = Some(size);
        self
    }

    /// Mask width in bytes
    pub fn mask_width(&self) -> usize {
        match self.mask_size {
            Some(s) => s,
            None => self
                .masks
                .values()
                .max()
                .map(|m| min_byte_width(*m))
                .unwrap_or(0),
        }
    }

    pub(crate) fn encode_masks(&self, did: u16, masks: &IoMasks) -> UdsResult<Vec<u8>> {
        if self.masks.is_empty() && self.mask_size.is_none() {
            return Err(UdsError::config(
                Some(did),
                format!(
                    "Cannot apply masks for data identifier 0x{did:04X} as no mask has been defined for it"
                ),
            ));
        }
        let width = self.mask_width();
        if width > 8 {
            return Err(UdsError::NotImplemented(format!(
                "Masks wider than 8 bytes are not supported (data identifier 0x{did:04X})"
            )));
        }
        let value = match masks {
            IoMasks::All => {
                if width == 8 {
                    u64::MAX
                } else {
                    (1u64 << (width * 8)) - 1
                }
            }
            IoMasks::Select(names) => {
                let mut v = 0u64;
                for name in names {
                    let bit = self.masks.get(name).ok_or_else(|| {
                        UdsError::config(
                            Some(did),
                            format!(
                                "Cannot apply mask \"{name}\" for data identifier 0x{did:04X} as it is not defined in the configuration"
                            ),
                        )
                    })?;
                    v |= bit;
                }
                v
            }
        };
        if width < 8 && value >> (width * 8) != 0 {
            return Err(UdsError::InvalidParameter(format!(
                "Mask value 0x{value:X} does not fit in {width} bytes"
            )));
        }
        Ok(write_be_uint(value, width))
    }
}

/// Maps data identifiers to their InputOutputControlByIdentifier configuration
#[derive(Debug, Clone, Default)]
pub struct IoConfig {
    entries: HashMap<u16, IoConfigEntry>,
}

impl IoConfig {
    /// Creates an empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder variant of [IoConfig::insert]
    pub fn with(mut self, did: u16, entry: IoConfigEntry) -> Self {
        self.insert(did, entry);
        self
    }

    /// Sets the configuration of a DID
    pub fn insert(&mut self, did: u16, entry: IoConfigEntry) {
        self.entries.insert(did, entry);
    }

    /// Configuration of a DID
    pub fn get(&self, did: u16) -> Option<&IoConfigEntry> {
        self.entries.get(&did)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pack_single_value() {
        let c = PackCodec::new(">H").unwrap();
        assert_eq!(c.length(), CodecLength::Fixed(2));
        assert_eq!(c.encode(&DidValue::from(0x1234u16)).unwrap(), vec![0x12, 0x34]);
        assert_eq!(c.decode(&[0x12, 0x34]).unwrap(), DidValue::UInt(0x1234));
        assert!(c.decode(&[0x12]).is_err());
        assert!(c.encode(&DidValue::UInt(0x10000)).is_err());

        let c = PackCodec::new("<h").unwrap();
        assert_eq!(c.encode(&DidValue::Int(-2)).unwrap(), vec![0xFE, 0xFF]);
        assert_eq!(c.decode(&[0xFE, 0xFF]).unwrap(), DidValue::Int(-2));
    }

    #[test]
    fn pack_multiple_values() {
        let c = PackCodec::new("BxH2B").unwrap();
        assert_eq!(c.size(), 6);
        let v = DidValue::List(vec![
            DidValue::UInt(1),
            DidValue::UInt(0x0203),
            DidValue::UInt(4),
            DidValue::UInt(5),
        ]);
        let enc = c.encode(&v).unwrap();
        assert_eq!(enc, vec![0x01, 0x00, 0x02, 0x03, 0x04, 0x05]);
        assert_eq!(c.decode(&enc).unwrap(), v);

        let c = PackCodec::new(">4s?f").unwrap();
        let dec = c.decode(&[b'a', b'b', 0, 0, 1, 0x3F, 0x80, 0x00, 0x00]).unwrap();
        assert_eq!(
            dec,
            DidValue::List(vec![
                DidValue::Bytes(vec![b'a', b'b', 0, 0]),
                DidValue::Bool(true),
                DidValue::Float(1.0),
            ])
        );
    }

    #[test]
    fn pack_bad_format() {
        assert!(PackCodec::new(">Z").is_err());
        assert!(PackCodec::new(">H2").is_err());
        assert!(matches!(
            PackCodec::new(">99999999999999999999999B"),
            Err(CodecError::InvalidFormat(_))
        ));
        assert!(matches!(
            PackCodec::new(">9999999999999999999Q"),
            Err(CodecError::InvalidFormat(_))
        ));
    }

    #[test]
    fn ascii_and_raw() {
        let c = AsciiCodec::new(4);
        assert_eq!(c.encode(&DidValue::from("ABCD")).unwrap(), b"ABCD".to_vec());
        assert!(c.encode(&DidValue::from("ABC")).is_err());
        assert_eq!(c.decode(b"WXYZ").unwrap(), DidValue::from("WXYZ"));
        assert!(c.decode(&[0xFF, 0, 0, 0]).is_err());

        let r = RawCodec::read_all();
        assert_eq!(r.length(), CodecLength::ReadAllRemaining);
        assert_eq!(r.decode(&[1, 2, 3]).unwrap(), DidValue::Bytes(vec![1, 2, 3]));
        assert!(RawCodec::fixed(2).encode(&DidValue::Bytes(vec![1])).is_err());
    }

    #[test]
    fn did_config_default() {
        let cfg = DidConfig::new().with(0x1234, PackCodec::new(">H").unwrap());
        assert!(cfg.contains(0x1234));
        assert!(!cfg.contains(0x5678));
        assert!(matches!(cfg.fetch(0x5678), Err(UdsError::Config { key: Some(0x5678), .. })));

        let cfg = cfg.with_default(RawCodec::fixed(1));
        assert_eq!(cfg.get(0x5678).unwrap().length(), CodecLength::Fixed(1));
        assert_eq!(cfg.get(0x1234).unwrap().length(), CodecLength::Fixed(2));
    }

    #[test]
    fn io_masks() {
        let e = IoConfigEntry::new(RawCodec::fixed(1))
            .with_mask("a", 0x01)
            .with_mask("b", 0x02)
            .with_mask("c", 0x100);
        assert_eq!(e.mask_width(), 2);
        assert_eq!(e.encode_masks(1, &IoMasks::select(["a", "c"])).unwrap(), vec![0x01, 0x01]);
        assert_eq!(e.encode_masks(1, &IoMasks::All).unwrap(), vec![0xFF, 0xFF]);
        assert!(matches!(
            e.encode_masks(1, &IoMasks::select(["d"])),
            Err(UdsError::Config { .. })
        ));

        let e = e.with_mask_size(3);
        assert_eq!(e.encode_masks(1, &IoMasks::select(["b"])).unwrap(), vec![0, 0, 0x02]);

        let none = IoConfigEntry::new(RawCodec::fixed(1));
        assert!(matches!(none.encode_masks(1, &IoMasks::All), Err(UdsError::Config { .. })));
    }
}
