// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Declares the foundational data primitives inside resources containers. */

/// Magic number at the start of every container.
pub const MAGIC_NUMBER: u32 = 0xBEEF_CACE;

/// Version of the header region following the magic number.
///
/// Readers skip header regions of newer versions by length.
pub const HEADER_VERSION: i32 = 1;

/// Reader identifier for containers only holding primitive and legacy values.
pub const LEGACY_READER_TYPE: &str =
    "System.Resources.ResourceReader, mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089";

/// Resource set identifier paired with [LEGACY_READER_TYPE].
pub const LEGACY_RESOURCE_SET_TYPE: &str = "System.Resources.RuntimeResourceSet";

/// Reader identifier for containers with pre-serialized extended values.
pub const EXTENDED_READER_TYPE: &str =
    "System.Resources.Extensions.DeserializingResourceReader, System.Resources.Extensions, Version=4.0.0.0, Culture=neutral, PublicKeyToken=cc7b13ffcd2ddd51";

/// Resource set identifier paired with [EXTENDED_READER_TYPE].
pub const EXTENDED_RESOURCE_SET_TYPE: &str =
    "System.Resources.Extensions.RuntimeResourceSet, System.Resources.Extensions, Version=4.0.0.0, Culture=neutral, PublicKeyToken=cc7b13ffcd2ddd51";

/// The index arrays start on a multiple of this.
pub const INDEX_ALIGNMENT: u64 = 8;

/// Repeating pattern used to pad up to [INDEX_ALIGNMENT].
pub const PADDING_PATTERN: &[u8] = b"PAD";

/// Number of padding bytes needed at `position`.
pub fn padding_length(position: u64) -> usize {
    let misalignment = position % INDEX_ALIGNMENT;

    if misalignment == 0 {
        0
    } else {
        (INDEX_ALIGNMENT - misalignment) as usize
    }
}

/// Container format version.
///
/// The decoding rules for the data section depend on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum FormatVersion {
    /// Values are prefixed by an index into the type table.
    V1 = 1,

    /// Values are prefixed by a [ResourceTypeCode].
    V2 = 2,
}

impl From<FormatVersion> for i32 {
    fn from(v: FormatVersion) -> Self {
        match v {
            FormatVersion::V1 => 1,
            FormatVersion::V2 => 2,
        }
    }
}

impl TryFrom<i32> for FormatVersion {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::V1),
            2 => Ok(Self::V2),
            _ => Err(format!("unsupported resource set version: {}", value)),
        }
    }
}

/// Type tag of a value in a version 2 data section.
///
/// Tags at or above [ResourceTypeCode::StartOfUserTypes] are not represented
/// here: they reference the type table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceTypeCode {
    Null = 0x00,
    String = 0x01,
    Boolean = 0x02,
    Char = 0x03,
    Byte = 0x04,
    SByte = 0x05,
    Int16 = 0x06,
    UInt16 = 0x07,
    Int32 = 0x08,
    UInt32 = 0x09,
    Int64 = 0x0a,
    UInt64 = 0x0b,
    Single = 0x0c,
    Double = 0x0d,
    Decimal = 0x0e,
    DateTime = 0x0f,
    TimeSpan = 0x10,
    ByteArray = 0x20,
    Stream = 0x21,
    StartOfUserTypes = 0x40,
}

impl ResourceTypeCode {
    /// Last primitive type code.
    ///
    /// Values with this tag or lower are cheap to hold in memory.
    pub const LAST_PRIMITIVE: ResourceTypeCode = ResourceTypeCode::TimeSpan;

    /// Whether decoded values of this type may be retained by a cache.
    pub fn is_cacheable(self) -> bool {
        self <= Self::LAST_PRIMITIVE
    }

    /// Human readable name of the type.
    pub fn name(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::String => "string",
            Self::Boolean => "bool",
            Self::Char => "char",
            Self::Byte => "u8",
            Self::SByte => "i8",
            Self::Int16 => "i16",
            Self::UInt16 => "u16",
            Self::Int32 => "i32",
            Self::UInt32 => "u32",
            Self::Int64 => "i64",
            Self::UInt64 => "u64",
            Self::Single => "f32",
            Self::Double => "f64",
            Self::Decimal => "decimal",
            Self::DateTime => "datetime",
            Self::TimeSpan => "timespan",
            Self::ByteArray => "byte array",
            Self::Stream => "stream",
            Self::StartOfUserTypes => "user type",
        }
    }
}

impl From<ResourceTypeCode> for i32 {
    fn from(code: ResourceTypeCode) -> Self {
        code as i32
    }
}

impl TryFrom<i32> for ResourceTypeCode {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Self::Null),
            0x01 => Ok(Self::String),
            0x02 => Ok(Self::Boolean),
            0x03 => Ok(Self::Char),
            0x04 => Ok(Self::Byte),
            0x05 => Ok(Self::SByte),
            0x06 => Ok(Self::Int16),
            0x07 => Ok(Self::UInt16),
            0x08 => Ok(Self::Int32),
            0x09 => Ok(Self::UInt32),
            0x0a => Ok(Self::Int64),
            0x0b => Ok(Self::UInt64),
            0x0c => Ok(Self::Single),
            0x0d => Ok(Self::Double),
            0x0e => Ok(Self::Decimal),
            0x0f => Ok(Self::DateTime),
            0x10 => Ok(Self::TimeSpan),
            0x20 => Ok(Self::ByteArray),
            0x21 => Ok(Self::Stream),
            _ => Err(format!("invalid resource type code: {}", value)),
        }
    }
}

/// How an extended (user type) value is serialized.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SerializationFormat {
    /// Opaque blob produced by an object formatter.
    BinaryFormatter = 0,

    /// Raw bytes handed to a from-bytes converter.
    TypeConverterByteArray = 1,

    /// Invariant string handed to a from-string converter.
    TypeConverterString = 2,

    /// Bytes handed as a stream to a stream constructor.
    ActivatorStream = 3,
}

impl From<SerializationFormat> for i32 {
    fn from(format: SerializationFormat) -> Self {
        match format {
            SerializationFormat::BinaryFormatter => 0,
            SerializationFormat::TypeConverterByteArray => 1,
            SerializationFormat::TypeConverterString => 2,
            SerializationFormat::ActivatorStream => 3,
        }
    }
}

impl TryFrom<i32> for SerializationFormat {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::BinaryFormatter),
            1 => Ok(Self::TypeConverterByteArray),
            2 => Ok(Self::TypeConverterString),
            3 => Ok(Self::ActivatorStream),
            _ => Err(format!("invalid serialization format: {}", value)),
        }
    }
}

/// Primitive types recognized by name in version 1 type tables.
///
/// Also used by writers to fold from-string resources of these types into
/// primitive values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrimitiveTypeName {
    String,
    Boolean,
    Char,
    Byte,
    SByte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Single,
    Double,
    Decimal,
    DateTime,
    TimeSpan,
}

impl PrimitiveTypeName {
    /// Resolve a type identifier, with or without assembly qualification.
    pub fn from_type_name(type_name: &str) -> Option<Self> {
        let short = type_name.split(',').next().unwrap_or_default().trim();

        match short {
            "System.String" => Some(Self::String),
            "System.Boolean" => Some(Self::Boolean),
            "System.Char" => Some(Self::Char),
            "System.Byte" => Some(Self::Byte),
            "System.SByte" => Some(Self::SByte),
            "System.Int16" => Some(Self::Int16),
            "System.UInt16" => Some(Self::UInt16),
            "System.Int32" => Some(Self::Int32),
            "System.UInt32" => Some(Self::UInt32),
            "System.Int64" => Some(Self::Int64),
            "System.UInt64" => Some(Self::UInt64),
            "System.Single" => Some(Self::Single),
            "System.Double" => Some(Self::Double),
            "System.Decimal" => Some(Self::Decimal),
            "System.DateTime" => Some(Self::DateTime),
            "System.TimeSpan" => Some(Self::TimeSpan),
            _ => None,
        }
    }

    /// Assembly qualified identifier written into version 1 type tables.
    pub fn qualified_name(self) -> &'static str {
        match self {
            Self::String => "System.String, mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089",
            Self::Boolean => "System.Boolean, mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089",
            Self::Char => "System.Char, mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089",
            Self::Byte => "System.Byte, mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089",
            Self::SByte => "System.SByte, mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089",
            Self::Int16 => "System.Int16, mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089",
            Self::UInt16 => "System.UInt16, mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089",
            Self::Int32 => "System.Int32, mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089",
            Self::UInt32 => "System.UInt32, mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089",
            Self::Int64 => "System.Int64, mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089",
            Self::UInt64 => "System.UInt64, mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089",
            Self::Single => "System.Single, mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089",
            Self::Double => "System.Double, mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089",
            Self::Decimal => "System.Decimal, mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089",
            Self::DateTime => "System.DateTime, mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089",
            Self::TimeSpan => "System.TimeSpan, mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089",
        }
    }
}
