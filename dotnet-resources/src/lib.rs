// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! .NET binary resources containers

This crate reads and writes the binary `.resources` container format: a
single seekable stream holding a set of named, typed values.

A container consists of a header naming the reader able to decode it, a type
table, an index of name hashes sorted for binary search, a section of
UTF-16 names and a section of tagged values. Readers parse the header and
index once and decode names and values on demand.

# Reading

[ResourceReader] wraps any [std::io::Read] + [std::io::Seek] stream. Values
are obtained by name via [ResourceReader::get] or by walking every entry with
[ResourceReader::enumerate]. [ResourceReader::from_bytes] and
[ResourceReader::open_mmap] search the index in place instead of copying it.

```no_run
use dotnet_resources::ResourceReader;

let reader = ResourceReader::open_mmap("Strings.resources")?;
if let Some(value) = reader.get_string("Greeting")? {
    println!("{}", value);
}
# Ok::<(), dotnet_resources::ResourcesError>(())
```

# Writing

[ResourceWriter] collects resources and emits them with
[ResourceWriter::generate].

```
use dotnet_resources::ResourceWriter;

let mut writer = ResourceWriter::new(Vec::new());
writer.add_resource("Greeting", "hello")?;
writer.add_resource("Retries", 3i32)?;
writer.add_bytes("Logo", vec![0x89, 0x50, 0x4e, 0x47])?;
let container = writer.close()?;
# Ok::<(), dotnet_resources::ResourcesError>(())
```

# Extended types

Values of types other than the built-in primitives are resolved through a
[TypeRegistry] supplied in [ReaderSettings]. Opaque serialized objects are
handled by an [ObjectFormatter] implementation provided by the caller.
*/

mod cache;
mod enumerator;
mod error;
mod index;
mod io;
mod reader;
mod serialization;
#[cfg(test)]
mod testutil;
mod traits;
mod types;
mod value;
mod writer;

pub use crate::{
    cache::{ResourceCache, ResourceLocator},
    enumerator::{EnumeratorPosition, ResourceEnumerator},
    error::{ResourcesError, ResourcesResult},
    index::{hash_name, MappedNameIndex, NameIndex, OwnedNameIndex, SharedBytes},
    io::{ReadResourcesExt, WriteResourcesExt},
    reader::{ReaderSettings, ResourceData, ResourceReader},
    serialization::{
        FormatVersion, PrimitiveTypeName, ResourceTypeCode, SerializationFormat,
        EXTENDED_READER_TYPE, EXTENDED_RESOURCE_SET_TYPE, HEADER_VERSION, LEGACY_READER_TYPE,
        LEGACY_RESOURCE_SET_TYPE, MAGIC_NUMBER,
    },
    traits::{ResourceEntries, ResourceSetReader, ResourceSetWriter},
    types::{
        BytesConverter, ObjectFormatter, ObjectValue, ResourceType, StreamConstructor,
        StringConverter, TypeRegistry, TypeTable,
    },
    value::{DateTime, DateTimeKind, Decimal, TimeSpan, Value},
    writer::{ReadSeek, ResourceWriter, WriterSettings},
};
