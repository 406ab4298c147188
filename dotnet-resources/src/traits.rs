// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Format agnostic resource set interfaces. */

use {
    crate::{error::ResourcesResult, reader::ResourceReader, value::Value, writer::ResourceWriter},
    std::io::{Read, Seek, Write},
};

/// Iterator over `(name, value)` pairs of a resource set.
pub type ResourceEntries<'a> = Box<dyn Iterator<Item = ResourcesResult<(String, Value)>> + 'a>;

/// Read access to a resource set.
pub trait ResourceSetReader {
    /// Iterate over every resource.
    fn entries(&self) -> ResourceEntries<'_>;

    /// Release the underlying storage.
    fn close(&self);
}

/// Write access to a resource set.
pub trait ResourceSetWriter {
    fn add_resource(&mut self, name: &str, value: Value) -> ResourcesResult<()>;

    fn add_bytes(&mut self, name: &str, data: Vec<u8>) -> ResourcesResult<()>;

    fn add_string(&mut self, name: &str, value: &str) -> ResourcesResult<()> {
        self.add_resource(name, Value::from(value))
    }

    /// Emit the resource set. No further resources can be added afterwards.
    fn generate(&mut self) -> ResourcesResult<()>;
}

impl<R: Read + Seek> ResourceSetReader for ResourceReader<R> {
    fn entries(&self) -> ResourceEntries<'_> {
        Box::new(self.enumerate())
    }

    fn close(&self) {
        ResourceReader::close(self)
    }
}

impl<'a, W: Write> ResourceSetWriter for ResourceWriter<'a, W> {
    fn add_resource(&mut self, name: &str, value: Value) -> ResourcesResult<()> {
        ResourceWriter::add_resource(self, name, value)
    }

    fn add_bytes(&mut self, name: &str, data: Vec<u8>) -> ResourcesResult<()> {
        ResourceWriter::add_bytes(self, name, data)
    }

    fn generate(&mut self) -> ResourcesResult<()> {
        ResourceWriter::generate(self)
    }
}
