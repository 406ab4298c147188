// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Shared test fixtures. */

use {
    crate::{
        error::{ResourcesError, ResourcesResult},
        reader::ReaderSettings,
        types::{ObjectFormatter, ObjectValue, ResourceType, TypeRegistry},
    },
    byteorder::{ByteOrder, LittleEndian},
    std::{
        io::{Read, Seek, SeekFrom},
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
    },
};

pub const POINT_TYPE: &str = "Drawing.Point, Drawing";

/// A user type with a fixed 8 byte binary form.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = vec![0; 8];
        LittleEndian::write_i32(&mut data[0..4], self.x);
        LittleEndian::write_i32(&mut data[4..8], self.y);

        data
    }

    pub fn from_bytes(data: &[u8]) -> ResourcesResult<Self> {
        if data.len() < 8 {
            return Err(ResourcesError::Truncated);
        }

        Ok(Self {
            x: LittleEndian::read_i32(&data[0..4]),
            y: LittleEndian::read_i32(&data[4..8]),
        })
    }

    /// Parse `"x, y"`.
    pub fn parse(s: &str) -> ResourcesResult<Self> {
        let invalid = || ResourcesError::InvalidArgument(format!("invalid point: {}", s));

        let (x, y) = s.split_once(',').ok_or_else(invalid)?;

        Ok(Self {
            x: x.trim().parse().map_err(|_| invalid())?,
            y: y.trim().parse().map_err(|_| invalid())?,
        })
    }
}

/// Object formatter understanding [Point] only.
pub struct PointFormatter;

impl PointFormatter {
    pub fn encode(point: &Point) -> Vec<u8> {
        point.to_bytes()
    }
}

impl ObjectFormatter for PointFormatter {
    fn serialize(&self, value: &ObjectValue) -> ResourcesResult<Vec<u8>> {
        value
            .downcast_ref::<Point>()
            .map(Self::encode)
            .ok_or_else(|| ResourcesError::InvalidArgument(format!("not a point: {:?}", value)))
    }

    fn deserialize(
        &self,
        data: &[u8],
        expected: &ResourceType,
        _registry: &TypeRegistry,
    ) -> ResourcesResult<(ObjectValue, usize)> {
        let point = Point::from_bytes(data)?;

        Ok((ObjectValue::new(expected.name(), point), 8))
    }
}

/// Reader settings able to decode [Point] resources in every encoding.
pub fn point_settings() -> ReaderSettings {
    let mut settings = ReaderSettings::default();

    settings.register_type(
        ResourceType::new(POINT_TYPE)
            .with_bytes_converter(|data| Ok(ObjectValue::new(POINT_TYPE, Point::from_bytes(data)?)))
            .with_string_converter(|s| Ok(ObjectValue::new(POINT_TYPE, Point::parse(s)?)))
            .with_stream_constructor(|stream| {
                Ok(ObjectValue::new(
                    POINT_TYPE,
                    Point::from_bytes(stream.get_ref())?,
                ))
            }),
    );
    settings.set_object_formatter(PointFormatter);

    settings
}

/// Number of seeks performed on a [CountingStream].
#[derive(Clone, Debug)]
pub struct SeekCounter(Arc<AtomicUsize>);

impl SeekCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Stream wrapper counting seeks.
#[derive(Debug)]
pub struct CountingStream<R> {
    inner: R,
    seeks: SeekCounter,
}

impl<R: Read + Seek> CountingStream<R> {
    pub fn new(inner: R) -> (Self, SeekCounter) {
        let seeks = SeekCounter(Arc::new(AtomicUsize::new(0)));

        (
            Self {
                inner,
                seeks: seeks.clone(),
            },
            seeks,
        )
    }
}

impl<R: Read> Read for CountingStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Seek> Seek for CountingStream<R> {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.seeks.0.fetch_add(1, Ordering::SeqCst);
        self.inner.seek(pos)
    }
}
