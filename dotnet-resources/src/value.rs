// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Resource values. */

use {
    crate::{
        error::{ResourcesError, ResourcesResult},
        serialization::{PrimitiveTypeName, ResourceTypeCode},
        types::ObjectValue,
    },
    chrono::{Duration, NaiveDate, NaiveDateTime},
    std::{fmt::Display, io::Cursor, str::FromStr},
};

/// Number of 100 nanosecond ticks per second.
const TICKS_PER_SECOND: i64 = 10_000_000;

/// A decoded resource value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    String(String),
    Boolean(bool),
    /// A single UTF-16 code unit.
    Char(u16),
    Byte(u8),
    SByte(i8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Single(f32),
    Double(f64),
    Decimal(Decimal),
    DateTime(DateTime),
    TimeSpan(TimeSpan),
    ByteArray(Vec<u8>),
    /// Stream content materialized in memory.
    Stream(Cursor<Vec<u8>>),
    /// An instance of an extended type.
    Object(ObjectValue),
}

impl Value {
    /// The type tag this value is written with.
    ///
    /// [Value::Object] maps to [ResourceTypeCode::StartOfUserTypes]; the real
    /// tag depends on the type table.
    pub fn type_code(&self) -> ResourceTypeCode {
        match self {
            Self::Null => ResourceTypeCode::Null,
            Self::String(_) => ResourceTypeCode::String,
            Self::Boolean(_) => ResourceTypeCode::Boolean,
            Self::Char(_) => ResourceTypeCode::Char,
            Self::Byte(_) => ResourceTypeCode::Byte,
            Self::SByte(_) => ResourceTypeCode::SByte,
            Self::Int16(_) => ResourceTypeCode::Int16,
            Self::UInt16(_) => ResourceTypeCode::UInt16,
            Self::Int32(_) => ResourceTypeCode::Int32,
            Self::UInt32(_) => ResourceTypeCode::UInt32,
            Self::Int64(_) => ResourceTypeCode::Int64,
            Self::UInt64(_) => ResourceTypeCode::UInt64,
            Self::Single(_) => ResourceTypeCode::Single,
            Self::Double(_) => ResourceTypeCode::Double,
            Self::Decimal(_) => ResourceTypeCode::Decimal,
            Self::DateTime(_) => ResourceTypeCode::DateTime,
            Self::TimeSpan(_) => ResourceTypeCode::TimeSpan,
            Self::ByteArray(_) => ResourceTypeCode::ByteArray,
            Self::Stream(_) => ResourceTypeCode::Stream,
            Self::Object(_) => ResourceTypeCode::StartOfUserTypes,
        }
    }

    /// Describe the type of this value for messages.
    pub fn type_name(&self) -> String {
        match self {
            Self::Object(o) => o.type_name().to_string(),
            v => v.type_code().name().to_string(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Obtain the string content, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Obtain raw bytes of byte array and stream values.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::ByteArray(data) => Some(data),
            Self::Stream(stream) => Some(stream.get_ref()),
            _ => None,
        }
    }

    /// Obtain the extended type instance, if this is one.
    pub fn as_object(&self) -> Option<&ObjectValue> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }
}

macro_rules! value_from {
    ($source:ty, $variant:ident) => {
        impl From<$source> for Value {
            fn from(v: $source) -> Self {
                Self::$variant(v)
            }
        }
    };
}

value_from!(String, String);
value_from!(bool, Boolean);
value_from!(u8, Byte);
value_from!(i8, SByte);
value_from!(i16, Int16);
value_from!(u16, UInt16);
value_from!(i32, Int32);
value_from!(u32, UInt32);
value_from!(i64, Int64);
value_from!(u64, UInt64);
value_from!(f32, Single);
value_from!(f64, Double);
value_from!(Decimal, Decimal);
value_from!(DateTime, DateTime);
value_from!(TimeSpan, TimeSpan);
value_from!(Vec<u8>, ByteArray);
value_from!(ObjectValue, Object);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Self::ByteArray(v.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Self::Null,
        }
    }
}

/// A 96-bit integer scaled by a power of ten.
///
/// Stored in its wire form: low, middle and high 32 bits of the mantissa,
/// then a flags word holding the scale (bits 16-23) and sign (bit 31).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Decimal {
    lo: u32,
    mid: u32,
    hi: u32,
    flags: u32,
}

impl Decimal {
    const SIGN_MASK: u32 = 0x8000_0000;
    const SCALE_MASK: u32 = 0x00ff_0000;
    const SCALE_SHIFT: u32 = 16;
    pub const MAX_SCALE: u32 = 28;
    pub const MAX_MANTISSA: u128 = (1 << 96) - 1;

    /// Construct from a mantissa, a base 10 scale and a sign.
    pub fn new(mantissa: u128, scale: u32, negative: bool) -> ResourcesResult<Self> {
        if mantissa > Self::MAX_MANTISSA {
            return Err(ResourcesError::InvalidArgument(
                "decimal mantissa exceeds 96 bits".to_string(),
            ));
        }
        if scale > Self::MAX_SCALE {
            return Err(ResourcesError::InvalidArgument(format!(
                "decimal scale {} exceeds {}",
                scale,
                Self::MAX_SCALE
            )));
        }

        let mut flags = scale << Self::SCALE_SHIFT;
        if negative {
            flags |= Self::SIGN_MASK;
        }

        Ok(Self {
            lo: mantissa as u32,
            mid: (mantissa >> 32) as u32,
            hi: (mantissa >> 64) as u32,
            flags,
        })
    }

    /// Construct from the four 32-bit words of the wire form.
    pub fn from_bits(bits: [i32; 4]) -> ResourcesResult<Self> {
        let flags = bits[3] as u32;

        if flags & !(Self::SIGN_MASK | Self::SCALE_MASK) != 0
            || (flags & Self::SCALE_MASK) >> Self::SCALE_SHIFT > Self::MAX_SCALE
        {
            return Err(ResourcesError::format(format!(
                "invalid decimal flags: {:#x}",
                flags
            )));
        }

        Ok(Self {
            lo: bits[0] as u32,
            mid: bits[1] as u32,
            hi: bits[2] as u32,
            flags,
        })
    }

    /// The four 32-bit words of the wire form.
    pub fn to_bits(&self) -> [i32; 4] {
        [
            self.lo as i32,
            self.mid as i32,
            self.hi as i32,
            self.flags as i32,
        ]
    }

    pub fn mantissa(&self) -> u128 {
        (self.hi as u128) << 64 | (self.mid as u128) << 32 | self.lo as u128
    }

    pub fn scale(&self) -> u32 {
        (self.flags & Self::SCALE_MASK) >> Self::SCALE_SHIFT
    }

    pub fn is_negative(&self) -> bool {
        self.flags & Self::SIGN_MASK != 0
    }
}

impl FromStr for Decimal {
    type Err = ResourcesError;

    /// Parse the invariant form: optional sign, digits, optional fraction.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ResourcesError::InvalidArgument(format!("invalid decimal: {}", s));

        let s = s.trim();
        let (negative, digits) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            _ => (false, s),
        };

        let (integer, fraction) = match digits.split_once('.') {
            Some((i, f)) => (i, f),
            None => (digits, ""),
        };

        if integer.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }

        let mut mantissa = 0u128;
        for c in integer.chars().chain(fraction.chars()) {
            let digit = c.to_digit(10).ok_or_else(invalid)?;
            mantissa = mantissa
                .checked_mul(10)
                .and_then(|m| m.checked_add(digit as u128))
                .filter(|m| *m <= Self::MAX_MANTISSA)
                .ok_or_else(invalid)?;
        }

        Self::new(mantissa, fraction.len() as u32, negative)
    }
}

impl Display for Decimal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let digits = self.mantissa().to_string();
        let scale = self.scale() as usize;

        let digits = if digits.len() <= scale {
            format!("{}{}", "0".repeat(scale - digits.len() + 1), digits)
        } else {
            digits
        };

        if self.is_negative() {
            f.write_str("-")?;
        }

        if scale == 0 {
            f.write_str(&digits)
        } else {
            let (integer, fraction) = digits.split_at(digits.len() - scale);
            write!(f, "{}.{}", integer, fraction)
        }
    }
}

/// How a [DateTime] relates to UTC.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DateTimeKind {
    Unspecified,
    Utc,
    Local,
}

/// A point in time as 100 nanosecond ticks since 0001-01-01T00:00:00.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DateTime {
    ticks: i64,
    kind: DateTimeKind,
}

impl DateTime {
    /// Ticks of 9999-12-31T23:59:59.9999999.
    pub const MAX_TICKS: i64 = 3_155_378_975_999_999_999;

    const TICKS_MASK: i64 = 0x3fff_ffff_ffff_ffff;
    const TICKS_CEILING: i64 = 0x4000_0000_0000_0000;
    const KIND_SHIFT: u32 = 62;

    pub fn new(ticks: i64, kind: DateTimeKind) -> ResourcesResult<Self> {
        if !(0..=Self::MAX_TICKS).contains(&ticks) {
            return Err(ResourcesError::InvalidArgument(format!(
                "date time ticks out of range: {}",
                ticks
            )));
        }

        Ok(Self { ticks, kind })
    }

    /// Decode the 64-bit binary form holding ticks and kind.
    ///
    /// Local values hold UTC based ticks; no time zone conversion is applied.
    pub fn from_binary(value: i64) -> ResourcesResult<Self> {
        let mut ticks = value & Self::TICKS_MASK;

        let kind = match (value as u64) >> Self::KIND_SHIFT {
            0 => DateTimeKind::Unspecified,
            1 => DateTimeKind::Utc,
            _ => DateTimeKind::Local,
        };

        if kind == DateTimeKind::Local && ticks > Self::MAX_TICKS {
            ticks = (ticks - Self::TICKS_CEILING).max(0);
        }

        if ticks > Self::MAX_TICKS {
            return Err(ResourcesError::format(format!(
                "date time ticks out of range: {}",
                ticks
            )));
        }

        Ok(Self { ticks, kind })
    }

    /// Encode into the 64-bit binary form.
    pub fn to_binary(&self) -> i64 {
        let kind: i64 = match self.kind {
            DateTimeKind::Unspecified => 0,
            DateTimeKind::Utc => 1,
            DateTimeKind::Local => 2,
        };

        self.ticks | kind << Self::KIND_SHIFT
    }

    pub fn ticks(&self) -> i64 {
        self.ticks
    }

    pub fn kind(&self) -> DateTimeKind {
        self.kind
    }

    fn epoch() -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(1, 1, 1)?.and_hms_opt(0, 0, 0)
    }

    /// Convert to a [NaiveDateTime], dropping the kind.
    pub fn to_naive(&self) -> Option<NaiveDateTime> {
        Self::epoch()?.checked_add_signed(TimeSpan(self.ticks).to_duration())
    }

    /// Convert from a [NaiveDateTime], truncating to tick precision.
    pub fn from_naive(value: NaiveDateTime, kind: DateTimeKind) -> Option<Self> {
        let elapsed = value.signed_duration_since(Self::epoch()?);
        let ticks = TimeSpan::from_duration(elapsed)?.ticks();

        Self::new(ticks, kind).ok()
    }

    /// Convert from a UTC chrono value.
    pub fn from_utc(value: chrono::DateTime<chrono::Utc>) -> Option<Self> {
        Self::from_naive(value.naive_utc(), DateTimeKind::Utc)
    }
}

/// A signed duration in 100 nanosecond ticks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeSpan(pub i64);

impl TimeSpan {
    pub fn ticks(&self) -> i64 {
        self.0
    }

    pub fn to_duration(&self) -> Duration {
        Duration::seconds(self.0 / TICKS_PER_SECOND)
            + Duration::nanoseconds((self.0 % TICKS_PER_SECOND) * 100)
    }

    /// Convert from a chrono duration, truncating to tick precision.
    pub fn from_duration(value: Duration) -> Option<Self> {
        let seconds = value.num_seconds();
        let nanos = (value - Duration::seconds(seconds)).num_nanoseconds()?;

        seconds
            .checked_mul(TICKS_PER_SECOND)?
            .checked_add(nanos / 100)
            .map(Self)
    }
}

impl FromStr for TimeSpan {
    type Err = ResourcesError;

    /// Parse the invariant form `[-][d.]hh:mm:ss[.fffffff]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ResourcesError::InvalidArgument(format!("invalid time span: {}", s));

        let trimmed = s.trim();
        let (negative, body) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        let parts = body.split(':').collect::<Vec<_>>();
        if parts.len() != 3 {
            return Err(invalid());
        }

        let (days, hours) = parts[0].split_once('.').unwrap_or(("0", parts[0]));
        let (seconds, fraction) = parts[2].split_once('.').unwrap_or((parts[2], ""));

        let number = |v: &str, max: i64| -> ResourcesResult<i64> {
            if v.is_empty() || !v.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            v.parse::<i64>()
                .ok()
                .filter(|n| *n <= max)
                .ok_or_else(invalid)
        };

        let days = number(days, 10_675_199)?;
        let hours = number(hours, 23)?;
        let minutes = number(parts[1], 59)?;
        let seconds = number(seconds, 59)?;
        let fraction = if fraction.is_empty() {
            0
        } else if fraction.len() > 7 {
            return Err(invalid());
        } else {
            number(&format!("{:0<7}", fraction), 9_999_999)?
        };

        let ticks = (((days * 24 + hours) * 60 + minutes) * 60 + seconds)
            .checked_mul(TICKS_PER_SECOND)
            .and_then(|ticks| ticks.checked_add(fraction))
            .ok_or_else(invalid)?;

        Ok(Self(if negative { -ticks } else { ticks }))
    }
}

impl FromStr for DateTime {
    type Err = ResourcesError;

    /// Parse an invariant date and time.
    ///
    /// A trailing `Z` marks the value as UTC.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        const DATE_TIME_FORMATS: &[&str] = &[
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%d %H:%M:%S%.f",
            "%m/%d/%Y %H:%M:%S%.f",
        ];
        const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

        let trimmed = s.trim();
        let (text, kind) = match trimmed.strip_suffix('Z') {
            Some(text) => (text, DateTimeKind::Utc),
            None => (trimmed, DateTimeKind::Unspecified),
        };

        DATE_TIME_FORMATS
            .iter()
            .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
            .or_else(|| {
                DATE_FORMATS
                    .iter()
                    .find_map(|f| NaiveDate::parse_from_str(text, f).ok())
                    .and_then(|date| date.and_hms_opt(0, 0, 0))
            })
            .and_then(|naive| Self::from_naive(naive, kind))
            .ok_or_else(|| ResourcesError::InvalidArgument(format!("invalid date time: {}", s)))
    }
}

impl Value {
    /// Parse the invariant string form of a primitive type.
    pub fn parse_primitive(type_name: PrimitiveTypeName, text: &str) -> ResourcesResult<Self> {
        fn parse<T: FromStr>(text: &str, type_name: PrimitiveTypeName) -> ResourcesResult<T> {
            text.trim().parse::<T>().map_err(|_| {
                ResourcesError::InvalidArgument(format!(
                    "cannot convert {:?} to {}",
                    text,
                    type_name.qualified_name()
                ))
            })
        }

        Ok(match type_name {
            PrimitiveTypeName::String => Self::String(text.to_string()),
            PrimitiveTypeName::Boolean => match text.trim().to_ascii_lowercase().as_str() {
                "true" => Self::Boolean(true),
                "false" => Self::Boolean(false),
                _ => {
                    return Err(ResourcesError::InvalidArgument(format!(
                        "invalid boolean: {}",
                        text
                    )))
                }
            },
            PrimitiveTypeName::Char => {
                let mut units = text.encode_utf16();
                match (units.next(), units.next()) {
                    (Some(unit), None) => Self::Char(unit),
                    _ => {
                        return Err(ResourcesError::InvalidArgument(format!(
                            "not a single character: {:?}",
                            text
                        )))
                    }
                }
            }
            PrimitiveTypeName::Byte => Self::Byte(parse(text, type_name)?),
            PrimitiveTypeName::SByte => Self::SByte(parse(text, type_name)?),
            PrimitiveTypeName::Int16 => Self::Int16(parse(text, type_name)?),
            PrimitiveTypeName::UInt16 => Self::UInt16(parse(text, type_name)?),
            PrimitiveTypeName::Int32 => Self::Int32(parse(text, type_name)?),
            PrimitiveTypeName::UInt32 => Self::UInt32(parse(text, type_name)?),
            PrimitiveTypeName::Int64 => Self::Int64(parse(text, type_name)?),
            PrimitiveTypeName::UInt64 => Self::UInt64(parse(text, type_name)?),
            PrimitiveTypeName::Single => Self::Single(parse(text, type_name)?),
            PrimitiveTypeName::Double => Self::Double(parse(text, type_name)?),
            PrimitiveTypeName::Decimal => Self::Decimal(text.trim().parse()?),
            PrimitiveTypeName::DateTime => Self::DateTime(text.trim().parse()?),
            PrimitiveTypeName::TimeSpan => Self::TimeSpan(text.trim().parse()?),
        })
    }

    /// The primitive type name this value has in version 1 type tables.
    ///
    /// `None` for null and for values version 1 containers can't hold.
    pub fn primitive_type_name(&self) -> Option<PrimitiveTypeName> {
        match self {
            Self::String(_) => Some(PrimitiveTypeName::String),
            Self::Byte(_) => Some(PrimitiveTypeName::Byte),
            Self::SByte(_) => Some(PrimitiveTypeName::SByte),
            Self::Int16(_) => Some(PrimitiveTypeName::Int16),
            Self::UInt16(_) => Some(PrimitiveTypeName::UInt16),
            Self::Int32(_) => Some(PrimitiveTypeName::Int32),
            Self::UInt32(_) => Some(PrimitiveTypeName::UInt32),
            Self::Int64(_) => Some(PrimitiveTypeName::Int64),
            Self::UInt64(_) => Some(PrimitiveTypeName::UInt64),
            Self::Single(_) => Some(PrimitiveTypeName::Single),
            Self::Double(_) => Some(PrimitiveTypeName::Double),
            Self::Decimal(_) => Some(PrimitiveTypeName::Decimal),
            Self::DateTime(_) => Some(PrimitiveTypeName::DateTime),
            Self::TimeSpan(_) => Some(PrimitiveTypeName::TimeSpan),
            _ => None,
        }
    }
}
