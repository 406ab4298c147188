// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Extended types.

Values that aren't one of the built-in primitive kinds are identified by a
type name stored in the container's type table. Turning such a value back
into something usable requires host cooperation: the host registers each
type it understands in a [TypeRegistry], together with the conversions the
type supports, and optionally supplies an [ObjectFormatter] for opaque
serialized blobs. Nothing is resolved implicitly.
*/

use {
    crate::{
        error::{ResourcesError, ResourcesResult},
        io::ReadResourcesExt,
    },
    std::{
        any::Any,
        collections::HashMap,
        fmt::{Debug, Formatter},
        io::{Cursor, Read, Seek, SeekFrom},
        sync::Arc,
    },
};

type AnyValue = dyn Any + Send + Sync;

fn eq_any<T: PartialEq + 'static>(a: &AnyValue, b: &AnyValue) -> bool {
    match (a.downcast_ref::<T>(), b.downcast_ref::<T>()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn fmt_any<T: Debug + 'static>(v: &AnyValue, f: &mut Formatter<'_>) -> std::fmt::Result {
    match v.downcast_ref::<T>() {
        Some(v) => v.fmt(f),
        None => f.write_str("?"),
    }
}

/// An instance of an extended type.
///
/// Holds the type name it was created for and a shared, type-erased value.
#[derive(Clone)]
pub struct ObjectValue {
    type_name: String,
    value: Arc<AnyValue>,
    eq: fn(&AnyValue, &AnyValue) -> bool,
    fmt: fn(&AnyValue, &mut Formatter<'_>) -> std::fmt::Result,
}

impl ObjectValue {
    pub fn new<T>(type_name: impl ToString, value: T) -> Self
    where
        T: Any + Send + Sync + PartialEq + Debug,
    {
        Self {
            type_name: type_name.to_string(),
            value: Arc::new(value),
            eq: eq_any::<T>,
            fmt: fmt_any::<T>,
        }
    }

    /// The type name this value claims to be an instance of.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }
}

impl PartialEq for ObjectValue {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name && (self.eq)(&*self.value, &*other.value)
    }
}

impl Debug for ObjectValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectValue({}: ", self.type_name)?;
        (self.fmt)(&*self.value, f)?;
        f.write_str(")")
    }
}

/// Constructs an instance from raw bytes.
pub type BytesConverter = Arc<dyn Fn(&[u8]) -> ResourcesResult<ObjectValue> + Send + Sync>;

/// Constructs an instance from its invariant string form.
pub type StringConverter = Arc<dyn Fn(&str) -> ResourcesResult<ObjectValue> + Send + Sync>;

/// Constructs an instance by reading a stream.
pub type StreamConstructor =
    Arc<dyn Fn(Cursor<Vec<u8>>) -> ResourcesResult<ObjectValue> + Send + Sync>;

/// An extended type known to the host.
#[derive(Clone)]
pub struct ResourceType {
    name: String,
    from_bytes: Option<BytesConverter>,
    from_string: Option<StringConverter>,
    from_stream: Option<StreamConstructor>,
}

impl Debug for ResourceType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceType")
            .field("name", &self.name)
            .field("from_bytes", &self.from_bytes.is_some())
            .field("from_string", &self.from_string.is_some())
            .field("from_stream", &self.from_stream.is_some())
            .finish()
    }
}

impl ResourceType {
    /// Define a type without any conversions.
    ///
    /// Such a type can only be produced by an [ObjectFormatter].
    pub fn new(name: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            from_bytes: None,
            from_string: None,
            from_stream: None,
        }
    }

    pub fn with_bytes_converter(
        mut self,
        f: impl Fn(&[u8]) -> ResourcesResult<ObjectValue> + Send + Sync + 'static,
    ) -> Self {
        self.from_bytes = Some(Arc::new(f));
        self
    }

    pub fn with_string_converter(
        mut self,
        f: impl Fn(&str) -> ResourcesResult<ObjectValue> + Send + Sync + 'static,
    ) -> Self {
        self.from_string = Some(Arc::new(f));
        self
    }

    pub fn with_stream_constructor(
        mut self,
        f: impl Fn(Cursor<Vec<u8>>) -> ResourcesResult<ObjectValue> + Send + Sync + 'static,
    ) -> Self {
        self.from_stream = Some(Arc::new(f));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn missing(&self, what: &str) -> ResourcesError {
        ResourcesError::TypeResolution(format!("{} has no {}", self.name, what))
    }

    /// Construct an instance from bytes.
    pub fn convert_from_bytes(&self, data: &[u8]) -> ResourcesResult<ObjectValue> {
        let f = self
            .from_bytes
            .as_ref()
            .ok_or_else(|| self.missing("bytes converter"))?;
        f(data)
    }

    /// Construct an instance from an invariant string.
    pub fn convert_from_string(&self, data: &str) -> ResourcesResult<ObjectValue> {
        let f = self
            .from_string
            .as_ref()
            .ok_or_else(|| self.missing("string converter"))?;
        f(data)
    }

    /// Construct an instance from a stream over `data`.
    pub fn construct_from_stream(&self, data: Vec<u8>) -> ResourcesResult<ObjectValue> {
        let f = self
            .from_stream
            .as_ref()
            .ok_or_else(|| self.missing("stream constructor"))?;
        f(Cursor::new(data))
    }

    /// Ensure a constructed value is an instance of this type.
    pub fn check_instance(&self, value: &ObjectValue) -> ResourcesResult<()> {
        if value.type_name() == self.name {
            Ok(())
        } else {
            Err(ResourcesError::format(format!(
                "type of deserialized value {} does not match declared type {}",
                value.type_name(),
                self.name
            )))
        }
    }
}

/// Strip assembly qualification from a type identifier.
fn short_type_name(name: &str) -> &str {
    name.split(',').next().unwrap_or_default().trim()
}

/// Maps type identifiers to host-defined [ResourceType]s.
#[derive(Clone, Debug, Default)]
pub struct TypeRegistry {
    types: HashMap<String, Arc<ResourceType>>,
}

impl TypeRegistry {
    /// Register a type.
    ///
    /// The type is reachable by its full name and by its name without
    /// assembly qualification.
    pub fn register(&mut self, resource_type: ResourceType) {
        let resource_type = Arc::new(resource_type);
        let short = short_type_name(resource_type.name()).to_string();

        if short != resource_type.name() {
            self.types.insert(short, resource_type.clone());
        }
        self.types
            .insert(resource_type.name().to_string(), resource_type);
    }

    /// Resolve a type identifier as stored in a type table.
    pub fn resolve(&self, identifier: &str) -> ResourcesResult<Arc<ResourceType>> {
        self.types
            .get(identifier)
            .or_else(|| self.types.get(short_type_name(identifier)))
            .cloned()
            .ok_or_else(|| ResourcesError::TypeResolution(identifier.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Produces and consumes opaque serialized object blobs.
pub trait ObjectFormatter: Send + Sync {
    /// Serialize a value.
    fn serialize(&self, value: &ObjectValue) -> ResourcesResult<Vec<u8>>;

    /// Deserialize a value of the `expected` type from the start of `data`.
    ///
    /// Returns the value and the number of bytes consumed.
    fn deserialize(
        &self,
        data: &[u8],
        expected: &ResourceType,
        registry: &TypeRegistry,
    ) -> ResourcesResult<(ObjectValue, usize)>;
}

/// Type table being read from a container.
///
/// Only entry offsets are known after parsing. Names are read on first use.
#[derive(Debug)]
pub struct TypeTable {
    entries: Vec<(u64, Option<String>)>,
}

impl TypeTable {
    pub fn new(positions: Vec<u64>) -> Self {
        Self {
            entries: positions.into_iter().map(|p| (p, None)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Obtain the name of the type at `index`, reading it if needed.
    ///
    /// Moves the stream cursor.
    pub fn name<R: Read + Seek>(&mut self, index: usize, stream: &mut R) -> ResourcesResult<&str> {
        let count = self.entries.len();
        let (position, name) = self.entries.get_mut(index).ok_or_else(|| {
            ResourcesError::format(format!(
                "type index {} out of range; type table has {} entries",
                index, count
            ))
        })?;

        if name.is_none() {
            stream.seek(SeekFrom::Start(*position))?;
            *name = Some(stream.read_prefixed_string()?);
        }

        Ok(name.as_deref().unwrap_or_default())
    }
}

/// Type table being assembled by a writer.
#[derive(Debug, Default)]
pub struct TypeTableBuilder {
    names: Vec<String>,
    indices: HashMap<String, usize>,
}

impl TypeTableBuilder {
    /// Obtain the index of a type name, appending it on first sight.
    pub fn index_of(&mut self, name: &str) -> usize {
        if let Some(index) = self.indices.get(name) {
            return *index;
        }

        let index = self.names.len();
        self.names.push(name.to_string());
        self.indices.insert(name.to_string(), index);

        index
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}
