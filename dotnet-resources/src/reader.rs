// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Reading resources containers.

A [ResourceReader] parses the header and name index of a container once and
then decodes individual values on demand. The stream, the parsed index and
the value cache live behind a single lock, so a reader can be shared between
threads.
*/

use {
    crate::{
        cache::ResourceCache,
        enumerator::ResourceEnumerator,
        error::{ResourcesError, ResourcesResult},
        index::{hash_name, MappedNameIndex, NameIndex, OwnedNameIndex, SharedBytes},
        io::{encode_utf16le, ReadResourcesExt},
        serialization::{
            padding_length, FormatVersion, PrimitiveTypeName, ResourceTypeCode,
            SerializationFormat, EXTENDED_READER_TYPE, HEADER_VERSION, LEGACY_READER_TYPE,
            MAGIC_NUMBER,
        },
        types::{ObjectFormatter, ObjectValue, ResourceType, TypeRegistry, TypeTable},
        value::{DateTime, DateTimeKind, Decimal, TimeSpan, Value},
    },
    byteorder::{LittleEndian, ReadBytesExt},
    log::{debug, trace, warn},
    std::{
        fmt::Debug,
        fs::File,
        io::{Cursor, Read, Seek, SeekFrom},
        path::Path,
        sync::{Arc, Mutex, PoisonError},
    },
};

/// Settings influencing how a reader decodes values.
#[derive(Clone, Default)]
pub struct ReaderSettings {
    type_registry: TypeRegistry,
    object_formatter: Option<Arc<dyn ObjectFormatter>>,
}

impl Debug for ReaderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderSettings")
            .field("type_registry", &self.type_registry)
            .field("object_formatter", &self.object_formatter.is_some())
            .finish()
    }
}

impl ReaderSettings {
    /// The registry used to resolve extended types.
    pub fn type_registry(&self) -> &TypeRegistry {
        &self.type_registry
    }

    pub fn set_type_registry(&mut self, registry: TypeRegistry) {
        self.type_registry = registry;
    }

    /// Register an extended type with the registry.
    pub fn register_type(&mut self, resource_type: ResourceType) {
        self.type_registry.register(resource_type);
    }

    /// The formatter used to decode opaque object blobs.
    pub fn object_formatter(&self) -> Option<&dyn ObjectFormatter> {
        self.object_formatter.as_deref()
    }

    pub fn set_object_formatter(&mut self, formatter: impl ObjectFormatter + 'static) {
        self.object_formatter = Some(Arc::new(formatter));
    }

    fn require_formatter(&self, type_name: &str) -> ResourcesResult<&dyn ObjectFormatter> {
        self.object_formatter().ok_or_else(|| {
            ResourcesError::TypeResolution(format!(
                "no object formatter available to decode {}",
                type_name
            ))
        })
    }
}

/// Undecoded content of a resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceData {
    /// Type identifier from the type table, or `ResourceTypeCode.<name>` for
    /// built-in types.
    pub type_name: String,

    /// Payload bytes following the type tag.
    pub data: Vec<u8>,
}

type ValueDecoder<R> = fn(&mut ReaderState<R>, &ReaderSettings) -> ResourcesResult<Value>;
type StringDecoder<R> = fn(&mut ReaderState<R>) -> ResourcesResult<Option<String>>;

fn read_count(reader: &mut impl Read, what: &str) -> ResourcesResult<usize> {
    let value = reader.read_i32::<LittleEndian>()?;

    if value < 0 {
        Err(ResourcesError::format(format!("negative {} count: {}", what, value)))
    } else {
        Ok(value as usize)
    }
}

fn read_decimal(reader: &mut impl Read) -> ResourcesResult<Decimal> {
    let mut bits = [0i32; 4];
    reader.read_i32_into::<LittleEndian>(&mut bits)?;

    Decimal::from_bits(bits)
}

fn user_type_index(code: i32) -> Option<usize> {
    code.checked_sub(i32::from(ResourceTypeCode::StartOfUserTypes))
        .filter(|index| *index >= 0)
        .map(|index| index as usize)
}

/// Parsed state of an open container.
pub(crate) struct ReaderState<R> {
    stream: R,
    stream_length: u64,
    version: FormatVersion,
    extended: bool,
    index: Box<dyn NameIndex>,
    types: TypeTable,
    name_section_offset: u64,
    data_section_offset: u64,
    decode_value: ValueDecoder<R>,
    decode_string: StringDecoder<R>,
    sorted_data_offsets: Option<Vec<i32>>,
    pub(crate) cache: ResourceCache,
}

impl<R: Read + Seek> ReaderState<R> {
    fn open(mut stream: R, backing: Option<&SharedBytes>) -> ResourcesResult<Self> {
        let stream_length = stream.seek(SeekFrom::End(0))?;
        stream.seek(SeekFrom::Start(0))?;

        let magic = stream.read_u32::<LittleEndian>()?;
        if magic != MAGIC_NUMBER {
            return Err(ResourcesError::format(format!(
                "bad magic number: {:#010x}",
                magic
            )));
        }

        let header_version = stream.read_i32::<LittleEndian>()?;
        let header_length = stream.read_i32::<LittleEndian>()?;
        if header_length < 0 {
            return Err(ResourcesError::format(format!(
                "negative header length: {}",
                header_length
            )));
        }

        let header_end = stream.stream_position()? + header_length as u64;
        if header_end > stream_length {
            return Err(ResourcesError::Truncated);
        }

        // Identifiers of newer headers are unknown. Such containers are read
        // as legacy ones, so user type values carry no serialization format
        // tag and span the rest of the stream.
        let extended = if header_version > HEADER_VERSION {
            warn!(
                "skipping resources header of unsupported version {} ({} bytes)",
                header_version, header_length
            );
            stream.seek(SeekFrom::Start(header_end))?;

            false
        } else {
            let reader_type = stream.read_prefixed_string()?;
            let resource_set_type = stream.read_prefixed_string()?;

            if stream.stream_position()? > header_end {
                return Err(ResourcesError::format(
                    "reader identifiers extend past the header",
                ));
            }
            stream.seek(SeekFrom::Start(header_end))?;

            trace!("resource set type: {}", resource_set_type);

            match reader_type.as_str() {
                LEGACY_READER_TYPE => false,
                EXTENDED_READER_TYPE => true,
                _ => {
                    return Err(ResourcesError::format(format!(
                        "unsupported resource reader: {}",
                        reader_type
                    )))
                }
            }
        };

        let version = FormatVersion::try_from(stream.read_i32::<LittleEndian>()?)
            .map_err(ResourcesError::Format)?;
        let count = read_count(&mut stream, "resource")?;
        let type_count = read_count(&mut stream, "type")?;

        // Type names are resolved on first use. Only remember where they are.
        let mut type_positions = Vec::new();
        for _ in 0..type_count {
            let position = stream.stream_position()?;
            let length = stream.read_7bit_encoded_i32()?;
            if length < 0 {
                return Err(ResourcesError::format(format!(
                    "negative type name length: {}",
                    length
                )));
            }

            let next = stream.stream_position()? + length as u64;
            if next > stream_length {
                return Err(ResourcesError::Truncated);
            }
            stream.seek(SeekFrom::Start(next))?;

            type_positions.push(position);
        }

        let padding = padding_length(stream.stream_position()?);
        stream.read_vec(padding)?;

        let index_offset = stream.stream_position()?;
        let index_end = index_offset + count as u64 * 8;
        if index_end + 4 > stream_length {
            return Err(ResourcesError::Truncated);
        }

        let index: Box<dyn NameIndex> = match backing {
            Some(data) => {
                stream.seek(SeekFrom::Start(index_end))?;
                Box::new(MappedNameIndex::new(
                    data.clone(),
                    index_offset as usize,
                    count,
                )?)
            }
            None => Box::new(OwnedNameIndex::read_from(&mut stream, count)?),
        };

        let data_section_offset = stream.read_i32::<LittleEndian>()?;
        let name_section_offset = stream.stream_position()?;

        if data_section_offset < 0
            || (data_section_offset as u64) < name_section_offset
            || data_section_offset as u64 > stream_length
        {
            return Err(ResourcesError::format(format!(
                "data section offset {} out of range",
                data_section_offset
            )));
        }
        let data_section_offset = data_section_offset as u64;

        let names_length = data_section_offset - name_section_offset;
        for i in 0..count {
            let position = index.position(i);

            if position < 0 || position as u64 > names_length {
                return Err(ResourcesError::format(format!(
                    "name position {} of entry {} out of range",
                    position, i
                )));
            }
        }

        let (decode_value, decode_string) = match version {
            FormatVersion::V1 => (
                Self::read_value_v1 as ValueDecoder<R>,
                Self::read_string_v1 as StringDecoder<R>,
            ),
            FormatVersion::V2 => (
                Self::read_value_v2 as ValueDecoder<R>,
                Self::read_string_v2 as StringDecoder<R>,
            ),
        };

        debug!(
            "opened resources container: {:?}, {} resources, {} types, extended reader {}, zero-copy index {}",
            version,
            count,
            type_count,
            extended,
            backing.is_some()
        );

        Ok(Self {
            stream,
            stream_length,
            version,
            extended,
            index,
            types: TypeTable::new(type_positions),
            name_section_offset,
            data_section_offset,
            decode_value,
            decode_string,
            sorted_data_offsets: None,
            cache: ResourceCache::default(),
        })
    }

    pub(crate) fn resource_count(&self) -> usize {
        self.index.len()
    }

    fn check_data_offset(&self, data_offset: i32) -> ResourcesResult<u64> {
        if data_offset < 0 || self.data_section_offset + data_offset as u64 >= self.stream_length {
            Err(ResourcesError::format(format!(
                "data offset {} out of range",
                data_offset
            )))
        } else {
            Ok(self.data_section_offset + data_offset as u64)
        }
    }

    /// Absolute offset of the name of entry `index`.
    fn name_start(&self, index: usize) -> u64 {
        // Positions were validated when opening.
        self.name_section_offset + self.index.position(index) as u64
    }

    /// Seek to the name of entry `index` and read its byte length.
    fn seek_to_name(&mut self, index: usize) -> ResourcesResult<usize> {
        self.stream.seek(SeekFrom::Start(self.name_start(index)))?;

        let length = self.stream.read_7bit_encoded_i32()?;
        if length < 0 {
            return Err(ResourcesError::format(format!(
                "negative resource name length: {}",
                length
            )));
        }

        Ok(length as usize)
    }

    /// Whether the next bytes in the stream equal `expected`.
    fn stream_matches(&mut self, expected: &[u8]) -> ResourcesResult<bool> {
        let mut buffer = [0u8; 64];

        for chunk in expected.chunks(buffer.len()) {
            let window = &mut buffer[..chunk.len()];
            self.stream.read_exact(window)?;

            if *window != *chunk {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Find the data offset of a resource by name.
    pub(crate) fn find_data_offset(&mut self, name: &str) -> ResourcesResult<Option<i32>> {
        let target = encode_utf16le(name);

        for i in self.index.hash_range(hash_name(name)) {
            if self.seek_to_name(i)? != target.len() {
                continue;
            }

            if self.stream_matches(&target)? {
                let data_offset = self.stream.read_i32::<LittleEndian>()?;
                self.check_data_offset(data_offset)?;

                trace!("resource {} is entry {} at data offset {}", name, i, data_offset);
                return Ok(Some(data_offset));
            }
        }

        Ok(None)
    }

    /// Decode the name of entry `index`.
    pub(crate) fn name_at(&mut self, index: usize) -> ResourcesResult<String> {
        self.stream.seek(SeekFrom::Start(self.name_start(index)))?;

        self.stream.read_utf16_string()
    }

    /// Obtain the data offset of entry `index`.
    pub(crate) fn data_offset_at(&mut self, index: usize) -> ResourcesResult<i32> {
        let length = self.seek_to_name(index)?;
        self.stream.seek(SeekFrom::Current(length as i64))?;

        let data_offset = self.stream.read_i32::<LittleEndian>()?;
        self.check_data_offset(data_offset)?;

        Ok(data_offset)
    }

    /// Decode the value at `data_offset`.
    pub(crate) fn load_value(
        &mut self,
        data_offset: i32,
        settings: &ReaderSettings,
    ) -> ResourcesResult<Value> {
        let position = self.check_data_offset(data_offset)?;
        self.stream.seek(SeekFrom::Start(position))?;

        (self.decode_value)(self, settings)
    }

    /// Decode the string at `data_offset`.
    pub(crate) fn load_string(&mut self, data_offset: i32) -> ResourcesResult<Option<String>> {
        let position = self.check_data_offset(data_offset)?;
        self.stream.seek(SeekFrom::Start(position))?;

        (self.decode_string)(self)
    }

    /// Resolve a type table entry without moving the stream.
    fn type_name(&mut self, index: usize) -> ResourcesResult<String> {
        let resume = self.stream.stream_position()?;
        let name = self.types.name(index, &mut self.stream)?.to_string();
        self.stream.seek(SeekFrom::Start(resume))?;

        Ok(name)
    }

    pub(crate) fn type_names(&mut self) -> ResourcesResult<Vec<String>> {
        (0..self.types.len()).map(|i| self.type_name(i)).collect()
    }

    /// Read `length` payload bytes, refusing lengths beyond the stream end.
    fn read_payload(&mut self, length: i32) -> ResourcesResult<Vec<u8>> {
        if length < 0 {
            return Err(ResourcesError::format(format!(
                "negative payload length: {}",
                length
            )));
        }

        let remaining = self
            .stream_length
            .saturating_sub(self.stream.stream_position()?);
        if length as u64 > remaining {
            return Err(ResourcesError::format(format!(
                "payload length {} exceeds the {} remaining bytes",
                length, remaining
            )));
        }

        self.stream.read_vec(length as usize)
    }

    fn read_primitive(&mut self, code: ResourceTypeCode) -> ResourcesResult<Value> {
        Ok(match code {
            ResourceTypeCode::Null => Value::Null,
            ResourceTypeCode::String => Value::String(self.stream.read_prefixed_string()?),
            ResourceTypeCode::Boolean => Value::Boolean(self.stream.read_u8()? != 0),
            ResourceTypeCode::Char => Value::Char(self.stream.read_u16::<LittleEndian>()?),
            ResourceTypeCode::Byte => Value::Byte(self.stream.read_u8()?),
            ResourceTypeCode::SByte => Value::SByte(self.stream.read_i8()?),
            ResourceTypeCode::Int16 => Value::Int16(self.stream.read_i16::<LittleEndian>()?),
            ResourceTypeCode::UInt16 => Value::UInt16(self.stream.read_u16::<LittleEndian>()?),
            ResourceTypeCode::Int32 => Value::Int32(self.stream.read_i32::<LittleEndian>()?),
            ResourceTypeCode::UInt32 => Value::UInt32(self.stream.read_u32::<LittleEndian>()?),
            ResourceTypeCode::Int64 => Value::Int64(self.stream.read_i64::<LittleEndian>()?),
            ResourceTypeCode::UInt64 => Value::UInt64(self.stream.read_u64::<LittleEndian>()?),
            ResourceTypeCode::Single => Value::Single(self.stream.read_f32::<LittleEndian>()?),
            ResourceTypeCode::Double => Value::Double(self.stream.read_f64::<LittleEndian>()?),
            ResourceTypeCode::Decimal => Value::Decimal(read_decimal(&mut self.stream)?),
            ResourceTypeCode::DateTime => Value::DateTime(DateTime::from_binary(
                self.stream.read_i64::<LittleEndian>()?,
            )?),
            ResourceTypeCode::TimeSpan => {
                Value::TimeSpan(TimeSpan(self.stream.read_i64::<LittleEndian>()?))
            }
            ResourceTypeCode::ByteArray => {
                let length = self.stream.read_i32::<LittleEndian>()?;
                Value::ByteArray(self.read_payload(length)?)
            }
            ResourceTypeCode::Stream => {
                let length = self.stream.read_i32::<LittleEndian>()?;
                Value::Stream(Cursor::new(self.read_payload(length)?))
            }
            ResourceTypeCode::StartOfUserTypes => {
                return Err(ResourcesError::format("user type tag decoded as primitive"))
            }
        })
    }

    /// Decode an opaque object occupying the remainder of the stream.
    ///
    /// Containers without serialization format tags carry no payload length.
    fn read_trailing_object(
        &mut self,
        resource_type: &ResourceType,
        settings: &ReaderSettings,
    ) -> ResourcesResult<ObjectValue> {
        let formatter = settings.require_formatter(resource_type.name())?;

        let remaining = self
            .stream_length
            .saturating_sub(self.stream.stream_position()?);
        let data = self.stream.read_vec(remaining as usize)?;

        let (value, consumed) =
            formatter.deserialize(&data, resource_type, settings.type_registry())?;
        trace!(
            "object formatter consumed {} of {} trailing bytes",
            consumed,
            data.len()
        );

        Ok(value)
    }

    fn read_user_value(
        &mut self,
        type_index: usize,
        settings: &ReaderSettings,
    ) -> ResourcesResult<Value> {
        let type_name = self.type_name(type_index)?;
        let resource_type = settings.type_registry().resolve(&type_name)?;

        let value = if self.extended {
            let format = SerializationFormat::try_from(self.stream.read_7bit_encoded_i32()?)
                .map_err(ResourcesError::Format)?;
            trace!("decoding {} using {:?}", type_name, format);

            match format {
                SerializationFormat::BinaryFormatter => {
                    let length = self.stream.read_7bit_encoded_i32()?;
                    let data = self.read_payload(length)?;

                    let (value, consumed) = settings.require_formatter(&type_name)?.deserialize(
                        &data,
                        &resource_type,
                        settings.type_registry(),
                    )?;

                    if consumed != data.len() {
                        return Err(ResourcesError::format(format!(
                            "object formatter consumed {} bytes of a {} byte payload",
                            consumed,
                            data.len()
                        )));
                    }

                    value
                }
                SerializationFormat::TypeConverterByteArray => {
                    let length = self.stream.read_7bit_encoded_i32()?;
                    let data = self.read_payload(length)?;

                    resource_type.convert_from_bytes(&data)?
                }
                SerializationFormat::TypeConverterString => {
                    let text = self.stream.read_prefixed_string()?;

                    resource_type.convert_from_string(&text)?
                }
                SerializationFormat::ActivatorStream => {
                    let length = self.stream.read_7bit_encoded_i32()?;
                    let data = self.read_payload(length)?;

                    resource_type.construct_from_stream(data)?
                }
            }
        } else {
            self.read_trailing_object(&resource_type, settings)?
        };

        resource_type.check_instance(&value)?;

        Ok(Value::Object(value))
    }

    fn read_value_v2(&mut self, settings: &ReaderSettings) -> ResourcesResult<Value> {
        let code = self.stream.read_7bit_encoded_i32()?;

        match user_type_index(code) {
            Some(type_index) => self.read_user_value(type_index, settings),
            None => {
                let code = ResourceTypeCode::try_from(code).map_err(ResourcesError::Format)?;
                self.read_primitive(code)
            }
        }
    }

    fn read_string_v2(&mut self) -> ResourcesResult<Option<String>> {
        let code = self.stream.read_7bit_encoded_i32()?;

        if let Some(type_index) = user_type_index(code) {
            return Err(ResourcesError::NotAString(self.type_name(type_index)?));
        }

        match ResourceTypeCode::try_from(code).map_err(ResourcesError::Format)? {
            ResourceTypeCode::String => Ok(Some(self.stream.read_prefixed_string()?)),
            ResourceTypeCode::Null => Ok(None),
            code => Err(ResourcesError::NotAString(code.name().to_string())),
        }
    }

    /// Read a version 1 type index, returning the type name unless null.
    fn read_type_v1(&mut self) -> ResourcesResult<Option<String>> {
        let type_index = self.stream.read_7bit_encoded_i32()?;

        match type_index {
            -1 => Ok(None),
            i if i < 0 => Err(ResourcesError::format(format!(
                "invalid type index: {}",
                type_index
            ))),
            i => Ok(Some(self.type_name(i as usize)?)),
        }
    }

    fn read_value_v1(&mut self, settings: &ReaderSettings) -> ResourcesResult<Value> {
        let type_name = match self.read_type_v1()? {
            Some(name) => name,
            None => return Ok(Value::Null),
        };

        let code = match PrimitiveTypeName::from_type_name(&type_name) {
            Some(PrimitiveTypeName::String) => ResourceTypeCode::String,
            Some(PrimitiveTypeName::Byte) => ResourceTypeCode::Byte,
            Some(PrimitiveTypeName::SByte) => ResourceTypeCode::SByte,
            Some(PrimitiveTypeName::Int16) => ResourceTypeCode::Int16,
            Some(PrimitiveTypeName::UInt16) => ResourceTypeCode::UInt16,
            Some(PrimitiveTypeName::Int32) => ResourceTypeCode::Int32,
            Some(PrimitiveTypeName::UInt32) => ResourceTypeCode::UInt32,
            Some(PrimitiveTypeName::Int64) => ResourceTypeCode::Int64,
            Some(PrimitiveTypeName::UInt64) => ResourceTypeCode::UInt64,
            Some(PrimitiveTypeName::Single) => ResourceTypeCode::Single,
            Some(PrimitiveTypeName::Double) => ResourceTypeCode::Double,
            Some(PrimitiveTypeName::Decimal) => ResourceTypeCode::Decimal,
            Some(PrimitiveTypeName::TimeSpan) => ResourceTypeCode::TimeSpan,
            Some(PrimitiveTypeName::DateTime) => {
                // Plain ticks, not the binary form holding the kind.
                let ticks = self.stream.read_i64::<LittleEndian>()?;

                return DateTime::new(ticks, DateTimeKind::Unspecified)
                    .map(Value::DateTime)
                    .map_err(|_| {
                        ResourcesError::format(format!("date time ticks out of range: {}", ticks))
                    });
            }
            _ => {
                let resource_type = settings.type_registry().resolve(&type_name)?;
                let value = self.read_trailing_object(&resource_type, settings)?;
                resource_type.check_instance(&value)?;

                return Ok(Value::Object(value));
            }
        };

        self.read_primitive(code)
    }

    fn read_string_v1(&mut self) -> ResourcesResult<Option<String>> {
        match self.read_type_v1()? {
            None => Ok(None),
            Some(type_name) => {
                if PrimitiveTypeName::from_type_name(&type_name) == Some(PrimitiveTypeName::String)
                {
                    Ok(Some(self.stream.read_prefixed_string()?))
                } else {
                    Err(ResourcesError::NotAString(type_name))
                }
            }
        }
    }

    /// Absolute offset where the value at `data_offset` ends.
    fn data_end(&mut self, data_offset: i32) -> ResourcesResult<u64> {
        if self.sorted_data_offsets.is_none() {
            let mut offsets = (0..self.index.len())
                .map(|i| self.data_offset_at(i))
                .collect::<ResourcesResult<Vec<_>>>()?;
            offsets.sort_unstable();

            self.sorted_data_offsets = Some(offsets);
        }

        let offsets = self.sorted_data_offsets.as_deref().unwrap_or_default();
        let next = offsets.partition_point(|offset| *offset <= data_offset);

        Ok(offsets
            .get(next)
            .map(|offset| self.data_section_offset + *offset as u64)
            .unwrap_or(self.stream_length))
    }

    pub(crate) fn resource_data(&mut self, data_offset: i32) -> ResourcesResult<ResourceData> {
        let end = self.data_end(data_offset)?;
        let position = self.check_data_offset(data_offset)?;
        self.stream.seek(SeekFrom::Start(position))?;

        let tag = self.stream.read_7bit_encoded_i32()?;

        let type_name = match self.version {
            FormatVersion::V2 => match user_type_index(tag) {
                Some(type_index) => self.type_name(type_index)?,
                None => format!(
                    "ResourceTypeCode.{:?}",
                    ResourceTypeCode::try_from(tag).map_err(ResourcesError::Format)?
                ),
            },
            FormatVersion::V1 => match tag {
                -1 => format!("ResourceTypeCode.{:?}", ResourceTypeCode::Null),
                i if i < 0 => {
                    return Err(ResourcesError::format(format!("invalid type index: {}", i)))
                }
                i => self.type_name(i as usize)?,
            },
        };

        let start = self.stream.stream_position()?;
        let data = self.stream.read_vec(end.saturating_sub(start) as usize)?;

        Ok(ResourceData { type_name, data })
    }
}

/// Reads a resources container.
pub struct ResourceReader<R> {
    state: Mutex<Option<ReaderState<R>>>,
    settings: ReaderSettings,
}

impl<R: Read + Seek> ResourceReader<R> {
    /// Open a container using default settings.
    ///
    /// Extended types can't be decoded without a registry, but all other
    /// values can.
    pub fn new(stream: R) -> ResourcesResult<Self> {
        Self::with_settings(stream, ReaderSettings::default())
    }

    /// Open a container.
    ///
    /// The header and index are parsed and validated up front. Values are
    /// decoded when requested.
    pub fn with_settings(stream: R, settings: ReaderSettings) -> ResourcesResult<Self> {
        Self::open(stream, None, settings)
    }

    fn open(
        stream: R,
        backing: Option<&SharedBytes>,
        settings: ReaderSettings,
    ) -> ResourcesResult<Self> {
        let state = ReaderState::open(stream, backing).map_err(ResourcesError::into_format)?;

        Ok(Self {
            state: Mutex::new(Some(state)),
            settings,
        })
    }

    pub fn settings(&self) -> &ReaderSettings {
        &self.settings
    }

    /// Run a function against the open state while holding the reader lock.
    pub(crate) fn with_state<T>(
        &self,
        f: impl FnOnce(&mut ReaderState<R>, &ReaderSettings) -> ResourcesResult<T>,
    ) -> ResourcesResult<T> {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let state = guard.as_mut().ok_or(ResourcesError::Closed)?;

        f(state, &self.settings).map_err(ResourcesError::into_format)
    }

    /// Number of resources in the container.
    pub fn resource_count(&self) -> ResourcesResult<usize> {
        self.with_state(|state, _| Ok(state.resource_count()))
    }

    pub fn format_version(&self) -> ResourcesResult<FormatVersion> {
        self.with_state(|state, _| Ok(state.version))
    }

    /// Whether the container declares the extended reader identifier.
    pub fn requires_extended_reader(&self) -> ResourcesResult<bool> {
        self.with_state(|state, _| Ok(state.extended))
    }

    /// Resolve every entry of the type table.
    pub fn type_names(&self) -> ResourcesResult<Vec<String>> {
        self.with_state(|state, _| state.type_names())
    }

    /// Find the data section relative offset of a resource.
    pub fn lookup(&self, name: &str) -> ResourcesResult<Option<i32>> {
        self.with_state(|state, _| state.find_data_offset(name))
    }

    /// Decode the value at a data section relative offset.
    pub fn load_value(&self, data_offset: i32) -> ResourcesResult<Value> {
        self.with_state(|state, settings| state.load_value(data_offset, settings))
    }

    /// Decode the string at a data section relative offset.
    ///
    /// Null values yield `None`. Values of any other type are an error.
    pub fn load_string(&self, data_offset: i32) -> ResourcesResult<Option<String>> {
        self.with_state(|state, _| state.load_string(data_offset))
    }

    /// Obtain the undecoded type and payload of a resource.
    pub fn resource_data(&self, name: &str) -> ResourcesResult<Option<ResourceData>> {
        self.with_state(|state, _| match state.find_data_offset(name)? {
            Some(data_offset) => Ok(Some(state.resource_data(data_offset)?)),
            None => Ok(None),
        })
    }

    /// Iterate resources in index order.
    pub fn enumerate(&self) -> ResourceEnumerator<'_, R> {
        ResourceEnumerator::new(self)
    }

    /// Release the stream, index and cache.
    ///
    /// Subsequent operations fail with [ResourcesError::Closed].
    pub fn close(&self) {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if guard.take().is_some() {
            debug!("closed resources reader");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl ResourceReader<Cursor<SharedBytes>> {
    /// Open a container held in memory.
    ///
    /// The name index is read in place instead of being copied.
    pub fn from_bytes(data: impl AsRef<[u8]> + Send + Sync + 'static) -> ResourcesResult<Self> {
        Self::from_bytes_with_settings(data, ReaderSettings::default())
    }

    pub fn from_bytes_with_settings(
        data: impl AsRef<[u8]> + Send + Sync + 'static,
        settings: ReaderSettings,
    ) -> ResourcesResult<Self> {
        let data = SharedBytes::new(data);

        Self::open(Cursor::new(data.clone()), Some(&data), settings)
    }

    /// Open a container file by memory mapping it.
    pub fn open_mmap(path: impl AsRef<Path>) -> ResourcesResult<Self> {
        Self::open_mmap_with_settings(path, ReaderSettings::default())
    }

    pub fn open_mmap_with_settings(
        path: impl AsRef<Path>,
        settings: ReaderSettings,
    ) -> ResourcesResult<Self> {
        let path = path.as_ref();
        let f = File::open(path)?;
        let mapped = unsafe { memmap2::Mmap::map(&f) }?;

        debug!("mapped {} ({} bytes)", path.display(), mapped.len());

        Self::from_bytes_with_settings(mapped, settings)
    }
}
