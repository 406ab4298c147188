// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Name keyed access to resources.

Every name looked up through a reader gets a [ResourceLocator] remembering
where its value lives. Values of primitive types are retained with the
locator; everything else is decoded again on every access so large payloads
don't accumulate in memory.
*/

use {
    crate::{
        error::{ResourcesError, ResourcesResult},
        index::fold_name,
        reader::{ReaderSettings, ReaderState, ResourceReader},
        value::Value,
    },
    log::trace,
    std::{
        collections::HashMap,
        io::{Read, Seek},
    },
};

/// Cached location and possibly value of a resource.
#[derive(Clone, Debug, PartialEq)]
pub struct ResourceLocator {
    data_position: i32,
    cached_value: Option<Value>,
}

impl ResourceLocator {
    /// Construct a locator, retaining `value` if its type allows it.
    pub fn new(data_position: i32, value: &Value) -> Self {
        Self {
            data_position,
            cached_value: if value.type_code().is_cacheable() {
                Some(value.clone())
            } else {
                None
            },
        }
    }

    /// Data section relative offset of the value.
    pub fn data_position(&self) -> i32 {
        self.data_position
    }

    pub fn cached_value(&self) -> Option<&Value> {
        self.cached_value.as_ref()
    }
}

/// Resource locators keyed by name.
#[derive(Debug, Default)]
pub struct ResourceCache {
    entries: HashMap<String, ResourceLocator>,

    /// Locators keyed by case folded name. Built on first use.
    ignore_case: Option<HashMap<String, ResourceLocator>>,
}

impl ResourceCache {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ResourceLocator> {
        self.entries.get(name)
    }

    pub fn insert(&mut self, name: &str, locator: ResourceLocator) {
        self.entries.insert(name.to_string(), locator);
    }
}

impl<R: Read + Seek> ReaderState<R> {
    /// Obtain a value through the cache.
    ///
    /// `locate` finds the data offset when the name isn't cached yet.
    pub(crate) fn get_cached(
        &mut self,
        name: &str,
        settings: &ReaderSettings,
        locate: impl FnOnce(&mut Self) -> ResourcesResult<Option<i32>>,
    ) -> ResourcesResult<Option<Value>> {
        let data_position = match self.cache.get(name).cloned() {
            Some(ResourceLocator {
                cached_value: Some(value),
                ..
            }) => {
                trace!("cached value hit for {}", name);
                return Ok(Some(value));
            }
            Some(locator) => locator.data_position,
            None => match locate(self)? {
                Some(position) => position,
                None => return Ok(None),
            },
        };

        let value = self.load_value(data_position, settings)?;
        self.cache
            .insert(name, ResourceLocator::new(data_position, &value));

        Ok(Some(value))
    }

    fn build_ignore_case_table(&mut self) -> ResourcesResult<()> {
        if self.cache.ignore_case.is_some() {
            return Ok(());
        }

        let mut table = HashMap::new();
        for i in 0..self.resource_count() {
            let name = self.name_at(i)?;
            let data_position = self.data_offset_at(i)?;

            table
                .entry(fold_name(&name))
                .or_insert_with(|| ResourceLocator {
                    data_position,
                    cached_value: None,
                });
        }

        trace!("built case insensitive table of {} names", table.len());
        self.cache.ignore_case = Some(table);

        Ok(())
    }
}

impl<R: Read + Seek> ResourceReader<R> {
    /// Obtain the value of a resource by name.
    pub fn get(&self, name: &str) -> ResourcesResult<Option<Value>> {
        self.with_state(|state, settings| {
            state.get_cached(name, settings, |state| state.find_data_offset(name))
        })
    }

    /// Obtain the value of a string resource by name.
    ///
    /// Fails with [ResourcesError::NotAString] if the resource holds another
    /// type.
    pub fn get_string(&self, name: &str) -> ResourcesResult<Option<String>> {
        self.with_state(|state, _| {
            let data_position = match state.cache.get(name).cloned() {
                Some(ResourceLocator {
                    cached_value: Some(value),
                    ..
                }) => {
                    return match value {
                        Value::String(s) => Ok(Some(s)),
                        Value::Null => Ok(None),
                        v => Err(ResourcesError::NotAString(v.type_name())),
                    };
                }
                Some(locator) => locator.data_position,
                None => match state.find_data_offset(name)? {
                    Some(position) => position,
                    None => return Ok(None),
                },
            };

            let value = state.load_string(data_position)?;
            state.cache.insert(
                name,
                ResourceLocator::new(data_position, &Value::from(value.clone())),
            );

            Ok(value)
        })
    }

    /// Obtain the value of a resource, matching names case insensitively.
    ///
    /// An exact match wins. Otherwise the first resource in index order whose
    /// name matches is used.
    pub fn get_ignore_case(&self, name: &str) -> ResourcesResult<Option<Value>> {
        self.with_state(|state, settings| {
            if let Some(value) =
                state.get_cached(name, settings, |state| state.find_data_offset(name))?
            {
                return Ok(Some(value));
            }

            state.build_ignore_case_table()?;

            let key = fold_name(name);
            let locator = match state
                .cache
                .ignore_case
                .as_ref()
                .and_then(|table| table.get(&key))
            {
                Some(locator) => locator.clone(),
                None => return Ok(None),
            };

            if let Some(value) = locator.cached_value {
                return Ok(Some(value));
            }

            let value = state.load_value(locator.data_position, settings)?;
            if let Some(table) = state.cache.ignore_case.as_mut() {
                table.insert(key, ResourceLocator::new(locator.data_position, &value));
            }

            Ok(Some(value))
        })
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{testutil::CountingStream, writer::ResourceWriter},
        std::io::Cursor,
    };

    fn container() -> ResourcesResult<Vec<u8>> {
        let mut writer = ResourceWriter::new(Vec::new());
        writer.add_resource("Number", 17i32)?;
        writer.add_resource("Text", "words")?;
        writer.add_bytes("Blob", vec![9u8; 4])?;
        writer.add_resource("Empty", Value::Null)?;

        writer.close()
    }

    #[test]
    fn locator_caches_primitives_only() {
        assert!(ResourceLocator::new(0, &Value::Int32(1))
            .cached_value()
            .is_some());
        assert!(ResourceLocator::new(0, &Value::from("s"))
            .cached_value()
            .is_some());
        assert!(ResourceLocator::new(0, &Value::ByteArray(vec![]))
            .cached_value()
            .is_none());
        assert!(ResourceLocator::new(0, &Value::Stream(Cursor::new(vec![])))
            .cached_value()
            .is_none());
    }

    #[test]
    fn get_values() -> ResourcesResult<()> {
        let reader = ResourceReader::new(Cursor::new(container()?))?;

        assert_eq!(reader.get("Number")?, Some(Value::Int32(17)));
        assert_eq!(reader.get("Text")?, Some(Value::String("words".into())));
        assert_eq!(reader.get("Blob")?, Some(Value::ByteArray(vec![9; 4])));
        assert_eq!(reader.get("Empty")?, Some(Value::Null));
        assert_eq!(reader.get("number")?, None);
        assert_eq!(reader.get("missing")?, None);

        Ok(())
    }

    #[test]
    fn second_get_does_not_seek() -> ResourcesResult<()> {
        let (stream, seeks) = CountingStream::new(Cursor::new(container()?));
        let reader = ResourceReader::new(stream)?;

        let first = reader.get("Number")?;
        let after_first = seeks.get();
        assert!(after_first > 0);

        assert_eq!(reader.get("Number")?, first);
        assert_eq!(reader.get_string("Text")?, Some("words".to_string()));
        let after_text = seeks.get();
        assert_eq!(reader.get_string("Text")?, Some("words".to_string()));
        assert_eq!(reader.get("Text")?, Some(Value::String("words".into())));
        assert_eq!(seeks.get(), after_text);

        // Byte arrays are decoded on every access.
        reader.get("Blob")?;
        let after_blob = seeks.get();
        assert_eq!(reader.get("Blob")?, Some(Value::ByteArray(vec![9; 4])));
        assert!(seeks.get() > after_blob);

        Ok(())
    }

    #[test]
    fn get_string_type_checks() -> ResourcesResult<()> {
        let reader = ResourceReader::new(Cursor::new(container()?))?;

        assert_eq!(reader.get_string("Empty")?, None);
        assert_eq!(reader.get_string("missing")?, None);
        assert!(matches!(
            reader.get_string("Number"),
            Err(ResourcesError::NotAString(_))
        ));

        // Same failure once the value is cached.
        reader.get("Number")?;
        assert!(matches!(
            reader.get_string("Number"),
            Err(ResourcesError::NotAString(t)) if t == "i32"
        ));

        Ok(())
    }

    #[test]
    fn ignore_case() -> ResourcesResult<()> {
        let reader = ResourceReader::new(Cursor::new(container()?))?;

        assert_eq!(reader.get_ignore_case("number")?, Some(Value::Int32(17)));
        assert_eq!(reader.get_ignore_case("NUMBER")?, Some(Value::Int32(17)));
        assert_eq!(reader.get_ignore_case("Number")?, Some(Value::Int32(17)));
        assert_eq!(reader.get_ignore_case("bLoB")?, Some(Value::ByteArray(vec![9; 4])));
        assert_eq!(reader.get_ignore_case("nope")?, None);

        Ok(())
    }

    #[test]
    fn ignore_case_folds_single_characters() -> ResourcesResult<()> {
        let mut writer = ResourceWriter::new(Vec::new());
        writer.add_resource("stra\u{df}e", 1i32)?;
        let reader = ResourceReader::new(Cursor::new(writer.close()?))?;

        assert_eq!(reader.get_ignore_case("STRASSE")?, None);
        assert_eq!(reader.get_ignore_case("STRA\u{df}E")?, Some(Value::Int32(1)));
        assert_eq!(reader.get_ignore_case("Stra\u{df}e")?, Some(Value::Int32(1)));

        let mut writer = ResourceWriter::new(Vec::new());
        writer.add_resource("stra\u{df}e", 1i32)?;
        writer.add_resource("STRASSE", 2i32)?;
        let reader = ResourceReader::new(Cursor::new(writer.close()?))?;

        assert_eq!(reader.get_ignore_case("strasse")?, Some(Value::Int32(2)));
        assert_eq!(reader.get_ignore_case("STRA\u{df}E")?, Some(Value::Int32(1)));

        Ok(())
    }

    #[test]
    fn closed_reader() -> ResourcesResult<()> {
        let reader = ResourceReader::new(Cursor::new(container()?))?;
        reader.get("Number")?;
        reader.close();

        assert!(matches!(reader.get("Number"), Err(ResourcesError::Closed)));
        assert!(matches!(
            reader.get_string("Text"),
            Err(ResourcesError::Closed)
        ));

        Ok(())
    }
}
