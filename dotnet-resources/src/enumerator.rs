// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Enumeration of all resources in a container. */

use {
    crate::{
        error::{ResourcesError, ResourcesResult},
        reader::ResourceReader,
        value::Value,
    },
    std::io::{Read, Seek},
};

/// Where an enumerator is positioned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnumeratorPosition {
    /// [ResourceEnumerator::move_next] has not been called yet.
    NotStarted,

    /// Positioned at the entry with this index.
    Valid(usize),

    /// All entries have been visited.
    Done,
}

/// Restartable cursor over the resources of a container.
///
/// Entries are visited in index order, which is sorted by name hash and
/// unrelated to the order resources were added in. Names are decoded as they
/// are visited and values go through the reader's cache.
///
/// Also usable as an [Iterator] of `(name, value)` pairs.
pub struct ResourceEnumerator<'a, R> {
    reader: &'a ResourceReader<R>,
    position: EnumeratorPosition,
}

impl<'a, R: Read + Seek> ResourceEnumerator<'a, R> {
    pub(crate) fn new(reader: &'a ResourceReader<R>) -> Self {
        Self {
            reader,
            position: EnumeratorPosition::NotStarted,
        }
    }

    pub fn position(&self) -> EnumeratorPosition {
        self.position
    }

    /// Advance to the next entry.
    ///
    /// Returns false once all entries have been visited.
    pub fn move_next(&mut self) -> ResourcesResult<bool> {
        let count = self.reader.resource_count()?;

        self.position = match self.position {
            EnumeratorPosition::NotStarted if count > 0 => EnumeratorPosition::Valid(0),
            EnumeratorPosition::Valid(i) if i + 1 < count => EnumeratorPosition::Valid(i + 1),
            _ => EnumeratorPosition::Done,
        };

        Ok(matches!(self.position, EnumeratorPosition::Valid(_)))
    }

    /// Return to the state before the first entry.
    pub fn reset(&mut self) {
        self.position = EnumeratorPosition::NotStarted;
    }

    fn current(&self) -> ResourcesResult<usize> {
        match self.position {
            EnumeratorPosition::NotStarted => Err(ResourcesError::EnumeratorState("not started")),
            EnumeratorPosition::Done => Err(ResourcesError::EnumeratorState("already finished")),
            EnumeratorPosition::Valid(i) => Ok(i),
        }
    }

    /// Name of the current entry.
    pub fn key(&self) -> ResourcesResult<String> {
        let i = self.current()?;

        self.reader.with_state(|state, _| state.name_at(i))
    }

    /// Value of the current entry.
    pub fn value(&self) -> ResourcesResult<Value> {
        Ok(self.entry()?.1)
    }

    /// Name and value of the current entry.
    pub fn entry(&self) -> ResourcesResult<(String, Value)> {
        let i = self.current()?;

        self.reader.with_state(|state, settings| {
            let name = state.name_at(i)?;
            let value = state
                .get_cached(&name, settings, |state| state.data_offset_at(i).map(Some))?
                .ok_or_else(|| {
                    ResourcesError::format(format!("entry {} has no value", i))
                })?;

            Ok((name, value))
        })
    }
}

impl<'a, R: Read + Seek> Iterator for ResourceEnumerator<'a, R> {
    type Item = ResourcesResult<(String, Value)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position == EnumeratorPosition::Done {
            return None;
        }

        match self.move_next().and_then(|valid| {
            if valid {
                self.entry().map(Some)
            } else {
                Ok(None)
            }
        }) {
            Ok(entry) => entry.map(Ok),
            Err(e) => {
                self.position = EnumeratorPosition::Done;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{index::hash_name, testutil::POINT_TYPE, writer::ResourceWriter},
        std::io::Cursor,
    };

    fn reader(names: &[&str]) -> ResourcesResult<ResourceReader<Cursor<Vec<u8>>>> {
        let mut writer = ResourceWriter::new(Vec::new());
        for (i, name) in names.iter().enumerate() {
            writer.add_resource(name, i as i32)?;
        }

        ResourceReader::new(Cursor::new(writer.close()?))
    }

    #[test]
    fn index_order() -> ResourcesResult<()> {
        let reader = reader(&["a", "b", "c"])?;

        // Hashes: a < c < b.
        assert!(hash_name("a") < hash_name("c"));
        assert!(hash_name("c") < hash_name("b"));

        let entries = reader.enumerate().collect::<ResourcesResult<Vec<_>>>()?;
        assert_eq!(
            entries,
            vec![
                ("a".to_string(), Value::Int32(0)),
                ("c".to_string(), Value::Int32(2)),
                ("b".to_string(), Value::Int32(1)),
            ]
        );

        Ok(())
    }

    #[test]
    fn state_discipline() -> ResourcesResult<()> {
        let reader = reader(&["a", "b", "c"])?;
        let mut e = reader.enumerate();

        assert_eq!(e.position(), EnumeratorPosition::NotStarted);
        assert!(matches!(e.key(), Err(ResourcesError::EnumeratorState(_))));
        assert!(matches!(e.value(), Err(ResourcesError::EnumeratorState(_))));

        assert!(e.move_next()?);
        assert_eq!(e.key()?, "a");
        assert_eq!(e.value()?, Value::Int32(0));
        assert!(e.move_next()?);
        assert!(e.move_next()?);
        assert_eq!(e.position(), EnumeratorPosition::Valid(2));
        assert!(!e.move_next()?);
        assert_eq!(e.position(), EnumeratorPosition::Done);
        assert!(matches!(e.entry(), Err(ResourcesError::EnumeratorState(_))));
        assert!(!e.move_next()?);

        e.reset();
        assert_eq!(e.position(), EnumeratorPosition::NotStarted);
        assert!(e.move_next()?);
        assert_eq!(e.entry()?, ("a".to_string(), Value::Int32(0)));

        Ok(())
    }

    #[test]
    fn empty_container() -> ResourcesResult<()> {
        let reader = reader(&[])?;
        let mut e = reader.enumerate();

        assert!(!e.move_next()?);
        assert_eq!(e.position(), EnumeratorPosition::Done);
        assert_eq!(reader.enumerate().count(), 0);

        Ok(())
    }

    #[test]
    fn colliding_names() -> ResourcesResult<()> {
        let reader = reader(&["cb", "bC"])?;

        assert_eq!(reader.get("bC")?, Some(Value::Int32(1)));
        assert_eq!(reader.get("cb")?, Some(Value::Int32(0)));

        let names = reader
            .enumerate()
            .map(|entry| entry.map(|(name, _)| name))
            .collect::<ResourcesResult<Vec<_>>>()?;
        // Equal hashes keep map order, which is ordinal.
        assert_eq!(names, vec!["bC".to_string(), "cb".to_string()]);

        Ok(())
    }

    #[test]
    fn iteration_stops_at_decode_error() -> ResourcesResult<()> {
        let mut writer = ResourceWriter::new(Vec::new());
        writer.add_resource("a", 1i32)?;
        writer.add_type_converter_resource("b", vec![0u8; 8], POINT_TYPE)?;
        writer.add_resource("c", 3i32)?;

        // No registry, so "b" can't be decoded. Index order is a, c, b.
        let reader = ResourceReader::new(Cursor::new(writer.close()?))?;
        let mut entries = reader.enumerate();

        assert_eq!(entries.next().transpose()?, Some(("a".to_string(), Value::Int32(1))));
        assert_eq!(entries.next().transpose()?, Some(("c".to_string(), Value::Int32(3))));
        assert!(matches!(
            entries.next(),
            Some(Err(ResourcesError::TypeResolution(_)))
        ));
        assert_eq!(entries.position(), EnumeratorPosition::Done);
        assert!(entries.next().is_none());

        let mut writer = ResourceWriter::new(Vec::new());
        writer.add_type_converter_resource("a", vec![0u8; 8], POINT_TYPE)?;
        writer.add_resource("b", 2i32)?;
        let reader = ResourceReader::new(Cursor::new(writer.close()?))?;
        let mut entries = reader.enumerate();

        assert!(matches!(entries.next(), Some(Err(_))));
        assert!(entries.next().is_none());

        Ok(())
    }

    #[test]
    fn closed_reader() -> ResourcesResult<()> {
        let reader = reader(&["a"])?;
        let mut e = reader.enumerate();
        assert!(e.move_next()?);

        reader.close();
        assert!(matches!(e.key(), Err(ResourcesError::Closed)));
        assert!(matches!(e.move_next(), Err(ResourcesError::Closed)));

        let mut e = reader.enumerate();
        assert!(matches!(e.next(), Some(Err(ResourcesError::Closed))));
        assert!(e.next().is_none());

        Ok(())
    }
}
