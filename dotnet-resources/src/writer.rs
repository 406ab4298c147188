// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*!
Writing resources containers.

Resources are collected in memory by a [ResourceWriter] and serialized in a
single pass by [ResourceWriter::generate].
*/

use {
    crate::{
        error::{ResourcesError, ResourcesResult},
        index::{fold_name, hash_name},
        io::{length_to_i32, ReadResourcesExt, WriteResourcesExt},
        serialization::{
            padding_length, FormatVersion, PrimitiveTypeName, ResourceTypeCode,
            SerializationFormat, EXTENDED_READER_TYPE, EXTENDED_RESOURCE_SET_TYPE,
            HEADER_VERSION, LEGACY_READER_TYPE, LEGACY_RESOURCE_SET_TYPE, MAGIC_NUMBER,
            PADDING_PATTERN,
        },
        types::{ObjectFormatter, TypeTableBuilder},
        value::Value,
    },
    byteorder::{LittleEndian, WriteBytesExt},
    log::{debug, trace},
    std::{
        cmp::Ordering,
        collections::{BTreeMap, HashSet},
        fmt::Debug,
        io::{Read, Seek, SeekFrom, Write},
        sync::Arc,
    },
};

/// A seekable byte source.
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

/// Settings controlling container generation.
#[derive(Clone)]
pub struct WriterSettings {
    format_version: FormatVersion,
    object_formatter: Option<Arc<dyn ObjectFormatter>>,
}

impl Default for WriterSettings {
    fn default() -> Self {
        Self {
            format_version: FormatVersion::V2,
            object_formatter: None,
        }
    }
}

impl Debug for WriterSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriterSettings")
            .field("format_version", &self.format_version)
            .field("object_formatter", &self.object_formatter.is_some())
            .finish()
    }
}

impl WriterSettings {
    /// The container format version to emit.
    pub fn format_version(&self) -> FormatVersion {
        self.format_version
    }

    /// Set the container format version to emit.
    ///
    /// Version 1 containers can only hold null, string and numeric values.
    pub fn set_format_version(&mut self, version: FormatVersion) {
        self.format_version = version;
    }

    /// The formatter used to serialize [Value::Object] resources.
    pub fn object_formatter(&self) -> Option<&dyn ObjectFormatter> {
        self.object_formatter.as_deref()
    }

    pub fn set_object_formatter(&mut self, formatter: impl ObjectFormatter + 'static) {
        self.object_formatter = Some(Arc::new(formatter));
    }
}

/// Resource name ordered by UTF-16 code units.
#[derive(Clone, Debug, PartialEq, Eq)]
struct NameKey(String);

impl Ord for NameKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.encode_utf16().cmp(other.0.encode_utf16())
    }
}

impl PartialOrd for NameKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A stream whose content is copied at generation time.
struct StreamSource<'a> {
    stream: Option<Box<dyn ReadSeek + 'a>>,
    close_after_write: bool,
}

impl<'a> StreamSource<'a> {
    fn new(mut stream: Box<dyn ReadSeek + 'a>, close_after_write: bool) -> ResourcesResult<Self> {
        if stream.stream_position().is_err() {
            return Err(ResourcesError::InvalidArgument(
                "stream is not seekable".to_string(),
            ));
        }

        Ok(Self {
            stream: Some(stream),
            close_after_write,
        })
    }

    fn read_content(&mut self) -> ResourcesResult<Vec<u8>> {
        let stream = self.stream.as_mut().ok_or(ResourcesError::WriterSpent)?;

        let length = stream.seek(SeekFrom::End(0))?;
        if length > i32::MAX as u64 {
            return Err(ResourcesError::InvalidArgument(format!(
                "stream length {} exceeds the maximum resource size",
                length
            )));
        }
        stream.seek(SeekFrom::Start(0))?;

        let data = stream.read_vec(length as usize)?;

        if self.close_after_write {
            self.stream = None;
        }

        Ok(data)
    }
}

/// Payload of a resource with an explicit serialization format.
enum Preserialized<'a> {
    Bytes(Vec<u8>),
    Text(String),
    Stream(StreamSource<'a>),
}

enum PendingResource<'a> {
    Value(Value),
    Stream(StreamSource<'a>),
    Preserialized {
        type_name: String,
        format: SerializationFormat,
        payload: Preserialized<'a>,
    },
}

impl<'a> PendingResource<'a> {
    fn requires_extended_reader(&self) -> bool {
        matches!(
            self,
            Self::Preserialized { .. } | Self::Value(Value::Object(_))
        )
    }

    fn supports_version_1(&self) -> bool {
        match self {
            Self::Value(value) => value.is_null() || value.primitive_type_name().is_some(),
            _ => false,
        }
    }
}

fn user_type_code(types: &mut TypeTableBuilder, type_name: &str) -> ResourcesResult<i32> {
    length_to_i32(types.index_of(type_name))?
        .checked_add(ResourceTypeCode::StartOfUserTypes.into())
        .ok_or_else(|| ResourcesError::InvalidArgument("too many types".to_string()))
}

fn write_sized_bytes(dest: &mut impl Write, data: &[u8]) -> ResourcesResult<()> {
    dest.write_i32::<LittleEndian>(length_to_i32(data.len())?)?;
    dest.write_all(data)?;

    Ok(())
}

/// Write the payload of a built-in type.
fn write_primitive(dest: &mut impl Write, value: &Value) -> ResourcesResult<()> {
    match value {
        Value::Null => {}
        Value::String(v) => dest.write_prefixed_string(v)?,
        Value::Boolean(v) => dest.write_u8(*v as u8)?,
        Value::Char(v) => dest.write_u16::<LittleEndian>(*v)?,
        Value::Byte(v) => dest.write_u8(*v)?,
        Value::SByte(v) => dest.write_i8(*v)?,
        Value::Int16(v) => dest.write_i16::<LittleEndian>(*v)?,
        Value::UInt16(v) => dest.write_u16::<LittleEndian>(*v)?,
        Value::Int32(v) => dest.write_i32::<LittleEndian>(*v)?,
        Value::UInt32(v) => dest.write_u32::<LittleEndian>(*v)?,
        Value::Int64(v) => dest.write_i64::<LittleEndian>(*v)?,
        Value::UInt64(v) => dest.write_u64::<LittleEndian>(*v)?,
        Value::Single(v) => dest.write_f32::<LittleEndian>(*v)?,
        Value::Double(v) => dest.write_f64::<LittleEndian>(*v)?,
        Value::Decimal(v) => {
            for bits in v.to_bits() {
                dest.write_i32::<LittleEndian>(bits)?;
            }
        }
        Value::DateTime(v) => dest.write_i64::<LittleEndian>(v.to_binary())?,
        Value::TimeSpan(v) => dest.write_i64::<LittleEndian>(v.ticks())?,
        Value::ByteArray(v) => write_sized_bytes(dest, v)?,
        Value::Stream(v) => write_sized_bytes(dest, v.get_ref())?,
        Value::Object(o) => {
            return Err(ResourcesError::InvalidArgument(format!(
                "{} is not a primitive value",
                o.type_name()
            )))
        }
    }

    Ok(())
}

/// Per container state while serializing resources.
struct EncodeContext<'f> {
    version: FormatVersion,
    formatter: Option<&'f dyn ObjectFormatter>,
    types: TypeTableBuilder,
}

impl<'f> EncodeContext<'f> {
    fn write_value_v1(&mut self, dest: &mut Vec<u8>, value: &Value) -> ResourcesResult<()> {
        let type_name = match value.primitive_type_name() {
            Some(type_name) => type_name,
            None if value.is_null() => {
                dest.write_7bit_encoded_i32(-1)?;
                return Ok(());
            }
            None => {
                return Err(ResourcesError::InvalidArgument(format!(
                    "{} values are not supported in version 1 containers",
                    value.type_name()
                )))
            }
        };

        let index = length_to_i32(self.types.index_of(type_name.qualified_name()))?;
        dest.write_7bit_encoded_i32(index)?;

        match (type_name, value) {
            // Plain ticks without the kind.
            (PrimitiveTypeName::DateTime, Value::DateTime(v)) => {
                dest.write_i64::<LittleEndian>(v.ticks())?
            }
            _ => write_primitive(dest, value)?,
        }

        Ok(())
    }

    fn write_value_v2(&mut self, dest: &mut Vec<u8>, value: &Value) -> ResourcesResult<()> {
        match value {
            Value::Object(object) => {
                let formatter = self.formatter.ok_or_else(|| {
                    ResourcesError::InvalidArgument(format!(
                        "no object formatter available to serialize {}",
                        object.type_name()
                    ))
                })?;
                let data = formatter.serialize(object)?;

                dest.write_7bit_encoded_i32(user_type_code(&mut self.types, object.type_name())?)?;
                dest.write_7bit_encoded_i32(SerializationFormat::BinaryFormatter.into())?;
                dest.write_7bit_encoded_i32(length_to_i32(data.len())?)?;
                dest.write_all(&data)?;
            }
            value => {
                dest.write_7bit_encoded_i32(value.type_code().into())?;
                write_primitive(dest, value)?;
            }
        }

        Ok(())
    }

    fn write_resource(
        &mut self,
        dest: &mut Vec<u8>,
        resource: &mut PendingResource,
    ) -> ResourcesResult<()> {
        match resource {
            PendingResource::Value(value) => match self.version {
                FormatVersion::V1 => self.write_value_v1(dest, value),
                FormatVersion::V2 => self.write_value_v2(dest, value),
            },
            PendingResource::Stream(source) => {
                let data = source.read_content()?;

                dest.write_7bit_encoded_i32(ResourceTypeCode::Stream.into())?;
                write_sized_bytes(dest, &data)
            }
            PendingResource::Preserialized {
                type_name,
                format,
                payload,
            } => {
                dest.write_7bit_encoded_i32(user_type_code(&mut self.types, type_name)?)?;
                dest.write_7bit_encoded_i32((*format).into())?;

                match payload {
                    Preserialized::Text(text) => dest.write_prefixed_string(text)?,
                    Preserialized::Bytes(data) => {
                        dest.write_7bit_encoded_i32(length_to_i32(data.len())?)?;
                        dest.write_all(data)?;
                    }
                    Preserialized::Stream(source) => {
                        let data = source.read_content()?;
                        dest.write_7bit_encoded_i32(length_to_i32(data.len())?)?;
                        dest.write_all(&data)?;
                    }
                }

                Ok(())
            }
        }
    }
}

/// Builds a resources container.
///
/// Names are unique ignoring case. Resources are written ordered by the
/// UTF-16 code units of their names.
pub struct ResourceWriter<'a, W: Write> {
    output: W,
    settings: WriterSettings,
    resources: BTreeMap<NameKey, PendingResource<'a>>,
    folded_names: HashSet<String>,
    spent: bool,
}

impl<'a, W: Write> ResourceWriter<'a, W> {
    /// Construct a writer emitting to `output` with default settings.
    pub fn new(output: W) -> Self {
        Self::with_settings(output, WriterSettings::default())
    }

    pub fn with_settings(output: W, settings: WriterSettings) -> Self {
        Self {
            output,
            settings,
            resources: BTreeMap::new(),
            folded_names: HashSet::new(),
            spent: false,
        }
    }

    pub fn settings(&self) -> &WriterSettings {
        &self.settings
    }

    /// Number of resources added so far.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Whether [Self::generate] has run.
    pub fn is_spent(&self) -> bool {
        self.spent
    }

    fn check_name(&self, name: &str) -> ResourcesResult<String> {
        if self.spent {
            return Err(ResourcesError::WriterSpent);
        }
        if name.is_empty() {
            return Err(ResourcesError::InvalidArgument(
                "resource name is empty".to_string(),
            ));
        }

        let folded = fold_name(name);
        if self.folded_names.contains(&folded) {
            return Err(ResourcesError::DuplicateName(name.to_string()));
        }

        Ok(folded)
    }

    fn insert(
        &mut self,
        name: &str,
        folded: String,
        resource: PendingResource<'a>,
    ) -> ResourcesResult<()> {
        trace!("adding resource {}", name);

        self.folded_names.insert(folded);
        self.resources.insert(NameKey(name.to_string()), resource);

        Ok(())
    }

    /// Add a value.
    pub fn add_resource(&mut self, name: &str, value: impl Into<Value>) -> ResourcesResult<()> {
        let folded = self.check_name(name)?;

        self.insert(name, folded, PendingResource::Value(value.into()))
    }

    /// Add a byte array.
    pub fn add_bytes(&mut self, name: &str, data: impl Into<Vec<u8>>) -> ResourcesResult<()> {
        let folded = self.check_name(name)?;

        self.insert(
            name,
            folded,
            PendingResource::Value(Value::ByteArray(data.into())),
        )
    }

    /// Add the content of a stream.
    ///
    /// The stream is read when generating. With `close_after_write` it is
    /// dropped as soon as its content has been copied. Pass a `&mut` reference
    /// to keep ownership of the stream.
    pub fn add_stream(
        &mut self,
        name: &str,
        stream: impl Read + Seek + 'a,
        close_after_write: bool,
    ) -> ResourcesResult<()> {
        let folded = self.check_name(name)?;
        let source = StreamSource::new(Box::new(stream), close_after_write)?;

        self.insert(name, folded, PendingResource::Stream(source))
    }

    fn add_preserialized(
        &mut self,
        name: &str,
        type_name: &str,
        format: SerializationFormat,
        payload: Preserialized<'a>,
    ) -> ResourcesResult<()> {
        if type_name.is_empty() {
            return Err(ResourcesError::InvalidArgument(
                "type name is empty".to_string(),
            ));
        }
        let folded = self.check_name(name)?;

        self.insert(
            name,
            folded,
            PendingResource::Preserialized {
                type_name: type_name.to_string(),
                format,
                payload,
            },
        )
    }

    /// Add a value of `type_name` stored as its invariant string form.
    ///
    /// Built-in primitive types are converted now and stored as primitive
    /// values.
    pub fn add_resource_from_string(
        &mut self,
        name: &str,
        text: &str,
        type_name: &str,
    ) -> ResourcesResult<()> {
        match PrimitiveTypeName::from_type_name(type_name) {
            Some(primitive) => {
                let folded = self.check_name(name)?;
                let value = Value::parse_primitive(primitive, text)?;

                self.insert(name, folded, PendingResource::Value(value))
            }
            None => self.add_preserialized(
                name,
                type_name,
                SerializationFormat::TypeConverterString,
                Preserialized::Text(text.to_string()),
            ),
        }
    }

    /// Add a value of `type_name` constructed from bytes when read.
    pub fn add_type_converter_resource(
        &mut self,
        name: &str,
        data: impl Into<Vec<u8>>,
        type_name: &str,
    ) -> ResourcesResult<()> {
        self.add_preserialized(
            name,
            type_name,
            SerializationFormat::TypeConverterByteArray,
            Preserialized::Bytes(data.into()),
        )
    }

    /// Add a value of `type_name` constructed from a stream when read.
    pub fn add_activator_resource(
        &mut self,
        name: &str,
        stream: impl Read + Seek + 'a,
        type_name: &str,
        close_after_write: bool,
    ) -> ResourcesResult<()> {
        let source = StreamSource::new(Box::new(stream), close_after_write)?;

        self.add_preserialized(
            name,
            type_name,
            SerializationFormat::ActivatorStream,
            Preserialized::Stream(source),
        )
    }

    /// Add an already serialized object formatter blob of `type_name`.
    pub fn add_binary_formatted_resource(
        &mut self,
        name: &str,
        data: impl Into<Vec<u8>>,
        type_name: &str,
    ) -> ResourcesResult<()> {
        self.add_preserialized(
            name,
            type_name,
            SerializationFormat::BinaryFormatter,
            Preserialized::Bytes(data.into()),
        )
    }

    /// Write the container.
    ///
    /// Can only be called once. Output written before an error is not undone.
    pub fn generate(&mut self) -> ResourcesResult<()> {
        if self.spent {
            return Err(ResourcesError::WriterSpent);
        }

        let version = self.settings.format_version;
        if version == FormatVersion::V1 {
            if let Some((name, _)) = self
                .resources
                .iter()
                .find(|(_, resource)| !resource.supports_version_1())
            {
                return Err(ResourcesError::InvalidArgument(format!(
                    "resource {} cannot be stored in a version 1 container",
                    name.0
                )));
            }
        }

        self.spent = true;

        let extended = self
            .resources
            .values()
            .any(PendingResource::requires_extended_reader);
        let (reader_type, resource_set_type) = if extended {
            (EXTENDED_READER_TYPE, EXTENDED_RESOURCE_SET_TYPE)
        } else {
            (LEGACY_READER_TYPE, LEGACY_RESOURCE_SET_TYPE)
        };

        let mut header = Vec::new();
        header.write_prefixed_string(reader_type)?;
        header.write_prefixed_string(resource_set_type)?;

        let mut container = Vec::new();
        container.write_u32::<LittleEndian>(MAGIC_NUMBER)?;
        container.write_i32::<LittleEndian>(HEADER_VERSION)?;
        container.write_i32::<LittleEndian>(length_to_i32(header.len())?)?;
        container.write_all(&header)?;
        container.write_i32::<LittleEndian>(version.into())?;
        container.write_i32::<LittleEndian>(length_to_i32(self.resources.len())?)?;

        let mut context = EncodeContext {
            version,
            formatter: self.settings.object_formatter.as_deref(),
            types: TypeTableBuilder::default(),
        };
        let mut names = Vec::new();
        let mut data = Vec::new();
        let mut entries = Vec::with_capacity(self.resources.len());

        for (name, resource) in self.resources.iter_mut() {
            entries.push((hash_name(&name.0), length_to_i32(names.len())?));

            names.write_utf16_string(&name.0)?;
            names.write_i32::<LittleEndian>(length_to_i32(data.len())?)?;

            context.write_resource(&mut data, resource)?;
        }

        // Stable, so colliding hashes stay in name order.
        entries.sort_by_key(|(hash, _)| *hash);

        let types = context.types.names();
        container.write_i32::<LittleEndian>(length_to_i32(types.len())?)?;
        for type_name in types {
            container.write_prefixed_string(type_name)?;
        }

        let padding = padding_length(container.len() as u64);
        container.extend(PADDING_PATTERN.iter().cycle().take(padding));

        for (hash, _) in &entries {
            container.write_i32::<LittleEndian>(*hash)?;
        }
        for (_, position) in &entries {
            container.write_i32::<LittleEndian>(*position)?;
        }

        let data_section_offset = container.len() + 4 + names.len();
        container.write_i32::<LittleEndian>(length_to_i32(data_section_offset)?)?;

        self.output.write_all(&container)?;
        self.output.write_all(&names)?;
        self.output.write_all(&data)?;
        self.output.flush()?;

        debug!(
            "generated resources container: {:?}, {} resources, {} types, {} bytes",
            version,
            entries.len(),
            types.len(),
            data_section_offset + data.len()
        );

        Ok(())
    }

    /// Generate the container if that hasn't happened yet and return the
    /// destination.
    pub fn close(mut self) -> ResourcesResult<W> {
        if !self.spent {
            self.generate()?;
        }

        Ok(self.output)
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            reader::ResourceReader,
            testutil::{point_settings, Point, PointFormatter, POINT_TYPE},
            types::ObjectValue,
            value::{DateTime, DateTimeKind, Decimal, TimeSpan},
        },
        byteorder::{ByteOrder, ReadBytesExt},
        std::io::Cursor,
    };

    /// Reads the fields preceding the name section.
    struct Layout {
        reader_type: String,
        version: i32,
        count: i32,
        types: Vec<String>,
        padding: Vec<u8>,
        hashes: Vec<i32>,
        positions: Vec<i32>,
        data_section_offset: i32,
        name_section_offset: usize,
    }

    impl Layout {
        fn parse(data: &[u8]) -> anyhow::Result<Self> {
            let mut cursor = Cursor::new(data);

            assert_eq!(cursor.read_u32::<LittleEndian>()?, MAGIC_NUMBER);
            assert_eq!(cursor.read_i32::<LittleEndian>()?, HEADER_VERSION);
            let header_length = cursor.read_i32::<LittleEndian>()? as u64;
            let header_start = cursor.position();
            let reader_type = cursor.read_prefixed_string()?;
            cursor.read_prefixed_string()?;
            assert_eq!(cursor.position(), header_start + header_length);

            let version = cursor.read_i32::<LittleEndian>()?;
            let count = cursor.read_i32::<LittleEndian>()?;
            let type_count = cursor.read_i32::<LittleEndian>()?;
            let types = (0..type_count)
                .map(|_| cursor.read_prefixed_string())
                .collect::<ResourcesResult<Vec<_>>>()?;

            let padding = cursor.read_vec(padding_length(cursor.position()))?;
            assert_eq!(cursor.position() % 8, 0);

            let mut hashes = vec![0; count as usize];
            cursor.read_i32_into::<LittleEndian>(&mut hashes)?;
            let mut positions = vec![0; count as usize];
            cursor.read_i32_into::<LittleEndian>(&mut positions)?;
            let data_section_offset = cursor.read_i32::<LittleEndian>()?;

            Ok(Self {
                reader_type,
                version,
                count,
                types,
                padding,
                hashes,
                positions,
                data_section_offset,
                name_section_offset: cursor.position() as usize,
            })
        }
    }

    #[test]
    fn empty_container() -> anyhow::Result<()> {
        let data = ResourceWriter::new(Vec::new()).close()?;
        let layout = Layout::parse(&data)?;

        assert_eq!(layout.reader_type, LEGACY_READER_TYPE);
        assert_eq!(layout.version, 2);
        assert_eq!(layout.count, 0);
        assert!(layout.types.is_empty());
        assert_eq!(layout.data_section_offset as usize, data.len());
        assert_eq!(layout.name_section_offset, data.len());

        let reader = ResourceReader::new(Cursor::new(data))?;
        assert_eq!(reader.resource_count()?, 0);

        Ok(())
    }

    #[test]
    fn byte_layout() -> anyhow::Result<()> {
        let mut writer = ResourceWriter::new(Vec::new());
        writer.add_resource("b", 5i32)?;
        writer.add_resource("a", "hi")?;
        let data = writer.close()?;

        let layout = Layout::parse(&data)?;
        assert_eq!(layout.count, 2);
        assert!(b"PADPADP".starts_with(&layout.padding));

        // Hash order: a then b.
        assert_eq!(layout.hashes, vec![hash_name("a"), hash_name("b")]);
        // Name order: a at 0, b after "a" (1 + 2 bytes) and its offset (4).
        assert_eq!(layout.positions, vec![0, 7]);

        let names = &data[layout.name_section_offset..layout.data_section_offset as usize];
        assert_eq!(names, b"\x02a\0\x00\x00\x00\x00\x02b\0\x04\x00\x00\x00");

        let values = &data[layout.data_section_offset as usize..];
        assert_eq!(values, b"\x01\x02hi\x08\x05\x00\x00\x00");

        Ok(())
    }

    #[test]
    fn three_resource_scenario() -> anyhow::Result<()> {
        let mut writer = ResourceWriter::new(Vec::new());
        writer.add_resource("c", 3i32)?;
        writer.add_resource("a", 1i32)?;
        writer.add_resource("b", 2i32)?;
        let data = writer.close()?;

        let layout = Layout::parse(&data)?;
        let mut sorted = layout.hashes.clone();
        sorted.sort_unstable();
        assert_eq!(layout.hashes, sorted);

        let reader = ResourceReader::new(Cursor::new(data))?;
        for (name, expected) in [("a", 1), ("b", 2), ("c", 3)] {
            assert_eq!(reader.get(name)?, Some(Value::Int32(expected)));
        }
        assert_eq!(reader.get("d")?, None);

        Ok(())
    }

    #[test]
    fn colliding_hashes_keep_name_order() -> anyhow::Result<()> {
        let mut writer = ResourceWriter::new(Vec::new());
        writer.add_resource("cb", 1i32)?;
        writer.add_resource("bC", 2i32)?;
        writer.add_resource("a", 3i32)?;
        let data = writer.close()?;

        let layout = Layout::parse(&data)?;
        assert_eq!(layout.hashes[1], layout.hashes[2]);
        // "a" sorts first by name, then "bC" (7 bytes of name entry), then "cb".
        assert_eq!(layout.positions[1], 7);
        assert_eq!(layout.positions[2], 16);

        let reader = ResourceReader::new(Cursor::new(data))?;
        assert_eq!(reader.get("cb")?, Some(Value::Int32(1)));
        assert_eq!(reader.get("bC")?, Some(Value::Int32(2)));
        assert_eq!(reader.get("bc")?, None);

        Ok(())
    }

    #[test]
    fn duplicate_names() -> anyhow::Result<()> {
        let mut writer = ResourceWriter::new(Vec::new());
        writer.add_resource("X", 1i32)?;

        assert!(matches!(
            writer.add_resource("x", 2i32),
            Err(ResourcesError::DuplicateName(n)) if n == "x"
        ));
        assert!(matches!(
            writer.add_bytes("X", Vec::<u8>::new()),
            Err(ResourcesError::DuplicateName(_))
        ));
        assert!(matches!(
            writer.add_resource("", 2i32),
            Err(ResourcesError::InvalidArgument(_))
        ));
        assert_eq!(writer.len(), 1);

        let reader = ResourceReader::new(Cursor::new(writer.close()?))?;
        assert_eq!(reader.get("X")?, Some(Value::Int32(1)));
        assert_eq!(reader.get("x")?, None);

        Ok(())
    }

    #[test]
    fn single_character_case_folding() -> anyhow::Result<()> {
        let mut writer = ResourceWriter::new(Vec::new());
        writer.add_resource("stra\u{df}e", 1i32)?;
        writer.add_resource("STRASSE", 2i32)?;
        writer.add_resource("\u{fb00}", 3i32)?;
        writer.add_resource("FF", 4i32)?;

        assert!(matches!(
            writer.add_resource("STRA\u{df}E", 5i32),
            Err(ResourcesError::DuplicateName(_))
        ));
        assert_eq!(writer.len(), 4);

        let reader = ResourceReader::new(Cursor::new(writer.close()?))?;
        assert_eq!(reader.get("stra\u{df}e")?, Some(Value::Int32(1)));
        assert_eq!(reader.get("STRASSE")?, Some(Value::Int32(2)));
        assert_eq!(reader.get("\u{fb00}")?, Some(Value::Int32(3)));
        assert_eq!(reader.get("FF")?, Some(Value::Int32(4)));

        Ok(())
    }

    #[test]
    fn spent_writer() -> anyhow::Result<()> {
        let mut writer = ResourceWriter::new(Vec::new());
        writer.add_resource("a", 1i32)?;
        writer.generate()?;

        assert!(writer.is_spent());
        assert!(matches!(
            writer.add_resource("b", 2i32),
            Err(ResourcesError::WriterSpent)
        ));
        assert!(matches!(writer.generate(), Err(ResourcesError::WriterSpent)));

        let data = writer.close()?;
        let reader = ResourceReader::new(Cursor::new(data))?;
        assert_eq!(reader.resource_count()?, 1);

        Ok(())
    }

    #[test]
    fn primitive_round_trip() -> anyhow::Result<()> {
        let values = vec![
            ("null", Value::Null),
            ("string", Value::from("text \u{1f600}")),
            ("bool", Value::Boolean(true)),
            ("char", Value::Char(0x263a)),
            ("u8", Value::Byte(255)),
            ("i8", Value::SByte(-128)),
            ("i16", Value::Int16(-2)),
            ("u16", Value::UInt16(65535)),
            ("i32", Value::Int32(i32::MIN)),
            ("u32", Value::UInt32(u32::MAX)),
            ("i64", Value::Int64(i64::MIN)),
            ("u64", Value::UInt64(u64::MAX)),
            ("f32", Value::Single(1.5)),
            ("f64", Value::Double(-0.25)),
            ("decimal", Value::Decimal(Decimal::new(31415, 4, true)?)),
            (
                "datetime",
                Value::DateTime(DateTime::new(630_822_816_000_000_000, DateTimeKind::Local)?),
            ),
            ("timespan", Value::TimeSpan(TimeSpan(-10))),
            ("bytes", Value::ByteArray(vec![0, 1, 2])),
            ("stream", Value::Stream(Cursor::new(vec![3, 4]))),
        ];

        let mut writer = ResourceWriter::new(Vec::new());
        for (name, value) in &values {
            writer.add_resource(name, value.clone())?;
        }
        let reader = ResourceReader::new(Cursor::new(writer.close()?))?;

        for (name, value) in values {
            assert_eq!(reader.get(name)?, Some(value), "{}", name);
        }

        Ok(())
    }

    #[test]
    fn streams() -> anyhow::Result<()> {
        let mut kept = Cursor::new(b"kept".to_vec());
        kept.set_position(2);

        let mut writer = ResourceWriter::new(Vec::new());
        writer.add_stream("kept", &mut kept, false)?;
        writer.add_stream("owned", Cursor::new(b"owned".to_vec()), true)?;
        let data = writer.close()?;

        // The caller still owns the borrowed stream.
        assert_eq!(kept.get_ref(), b"kept");

        let reader = ResourceReader::new(Cursor::new(data))?;
        assert_eq!(
            reader.get("kept")?.unwrap().as_bytes(),
            Some(&b"kept"[..])
        );
        assert_eq!(
            reader.get("owned")?,
            Some(Value::Stream(Cursor::new(b"owned".to_vec())))
        );

        Ok(())
    }

    /// A reader that can't seek.
    struct Unseekable;

    impl Read for Unseekable {
        fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
            Ok(0)
        }
    }

    impl Seek for Unseekable {
        fn seek(&mut self, _: SeekFrom) -> std::io::Result<u64> {
            Err(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "not seekable",
            ))
        }
    }

    /// A stream claiming to be longer than any resource may be.
    struct Oversized;

    impl Read for Oversized {
        fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
            Ok(0)
        }
    }

    impl Seek for Oversized {
        fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
            Ok(match pos {
                SeekFrom::End(_) => 3_000_000_000,
                _ => 0,
            })
        }
    }

    #[test]
    fn oversized_stream() -> anyhow::Result<()> {
        let mut writer = ResourceWriter::new(Vec::new());
        writer.add_stream("huge", Oversized, true)?;

        assert!(matches!(
            writer.generate(),
            Err(ResourcesError::InvalidArgument(m)) if m.contains("3000000000")
        ));

        let mut writer = ResourceWriter::new(Vec::new());
        writer.add_activator_resource("huge", Oversized, POINT_TYPE, false)?;

        assert!(matches!(
            writer.generate(),
            Err(ResourcesError::InvalidArgument(_))
        ));

        Ok(())
    }

    #[test]
    fn unseekable_stream() {
        let mut writer = ResourceWriter::new(Vec::new());

        assert!(matches!(
            writer.add_stream("s", Unseekable, false),
            Err(ResourcesError::InvalidArgument(_))
        ));
        assert!(matches!(
            writer.add_activator_resource("s", Unseekable, POINT_TYPE, false),
            Err(ResourcesError::InvalidArgument(_))
        ));
        assert!(writer.is_empty());
    }

    #[test]
    fn primitive_from_string() -> anyhow::Result<()> {
        let mut writer = ResourceWriter::new(Vec::new());
        writer.add_resource_from_string("s", "plain", "System.String")?;
        writer.add_resource_from_string(
            "i",
            "42",
            PrimitiveTypeName::Int32.qualified_name(),
        )?;
        writer.add_resource_from_string("span", "00:01:00", "System.TimeSpan")?;
        assert!(matches!(
            writer.add_resource_from_string("bad", "x", "System.Int32"),
            Err(ResourcesError::InvalidArgument(_))
        ));
        let data = writer.close()?;

        let layout = Layout::parse(&data)?;
        assert_eq!(layout.reader_type, LEGACY_READER_TYPE);
        assert!(layout.types.is_empty());

        let reader = ResourceReader::new(Cursor::new(data))?;
        assert_eq!(reader.get("s")?, Some(Value::from("plain")));
        assert_eq!(reader.get("i")?, Some(Value::Int32(42)));
        assert_eq!(
            reader.get("span")?,
            Some(Value::TimeSpan(TimeSpan(600_000_000)))
        );

        Ok(())
    }

    #[test]
    fn preserialized_layout() -> anyhow::Result<()> {
        let mut writer = ResourceWriter::new(Vec::new());
        writer.add_resource_from_string("p", "1, 2", POINT_TYPE)?;
        writer.add_type_converter_resource("q", vec![0xaa], "Other.Type")?;
        let data = writer.close()?;

        let layout = Layout::parse(&data)?;
        assert_eq!(layout.reader_type, EXTENDED_READER_TYPE);
        assert_eq!(layout.types, vec![POINT_TYPE.to_string(), "Other.Type".to_string()]);

        let values = &data[layout.data_section_offset as usize..];
        let mut expected: Vec<u8> = vec![0x40, 2, 4];
        expected.extend(b"1, 2");
        expected.extend([0x41, 1, 1, 0xaa]);
        assert_eq!(values, &expected[..]);

        Ok(())
    }

    #[test]
    fn object_values() -> anyhow::Result<()> {
        let point = ObjectValue::new(POINT_TYPE, Point { x: -3, y: 12 });

        let mut writer = ResourceWriter::new(Vec::new());
        writer.add_resource("point", point.clone())?;
        writer.add_resource("text", "t")?;
        assert!(matches!(
            writer.generate(),
            Err(ResourcesError::InvalidArgument(_))
        ));

        let mut settings = WriterSettings::default();
        settings.set_object_formatter(PointFormatter);
        let mut writer = ResourceWriter::with_settings(Vec::new(), settings);
        writer.add_resource("point", point.clone())?;
        writer.add_resource("text", "t")?;
        let data = writer.close()?;

        let layout = Layout::parse(&data)?;
        assert_eq!(layout.reader_type, EXTENDED_READER_TYPE);

        let reader = ResourceReader::with_settings(Cursor::new(data), point_settings())?;
        assert_eq!(reader.get("point")?, Some(Value::Object(point)));
        assert_eq!(reader.get("text")?, Some(Value::from("t")));

        Ok(())
    }

    #[test]
    fn version_1_restrictions() -> anyhow::Result<()> {
        let mut settings = WriterSettings::default();
        settings.set_format_version(FormatVersion::V1);

        let mut writer = ResourceWriter::with_settings(Vec::new(), settings.clone());
        writer.add_resource("flag", true)?;
        assert!(matches!(
            writer.generate(),
            Err(ResourcesError::InvalidArgument(m)) if m.contains("flag")
        ));
        assert!(!writer.is_spent());

        let mut writer = ResourceWriter::with_settings(Vec::new(), settings);
        writer.add_resource("a", "one")?;
        writer.add_resource("b", Value::Null)?;
        writer.add_resource("c", 3i32)?;
        let data = writer.close()?;

        let layout = Layout::parse(&data)?;
        assert_eq!(layout.version, 1);
        assert_eq!(
            layout.types,
            vec![
                PrimitiveTypeName::String.qualified_name().to_string(),
                PrimitiveTypeName::Int32.qualified_name().to_string(),
            ]
        );
        // Type index 1 followed by the value of c.
        assert_eq!(&data[data.len() - 5..data.len() - 4], &[1]);
        assert_eq!(LittleEndian::read_i32(&data[data.len() - 4..]), 3);

        let reader = ResourceReader::new(Cursor::new(data))?;
        assert_eq!(reader.get("a")?, Some(Value::from("one")));
        assert_eq!(reader.get("b")?, Some(Value::Null));
        assert_eq!(reader.get("c")?, Some(Value::Int32(3)));

        Ok(())
    }
}
