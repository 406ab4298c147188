// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Name hash index.

Resources are located through two parallel arrays: name hashes sorted in
ascending order and the positions of the corresponding names within the
name section. Hashes are not unique, so a lookup yields a range of candidate
entries whose names must be compared.

The arrays are either copied out of the container ([OwnedNameIndex]) or read
in place from memory backing the container ([MappedNameIndex]).
*/

use {
    crate::error::{ResourcesError, ResourcesResult},
    byteorder::{ByteOrder, LittleEndian, ReadBytesExt},
    std::{fmt::Debug, io::Read, ops::Range, sync::Arc},
};

/// Compute the hash of a resource name.
///
/// Operates on UTF-16 code units. Writers sort by this value and readers
/// search by it, so it must never change.
pub fn hash_name(name: &str) -> i32 {
    name.encode_utf16()
        .fold(5381u32, |hash, unit| {
            (hash << 5).wrapping_add(hash) ^ unit as u32
        }) as i32
}

/// Fold a resource name for case insensitive comparison.
///
/// Each character maps to its uppercase form only when that is a single
/// character, so folding never changes the length of a name.
pub(crate) fn fold_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            let mut upper = c.to_uppercase();
            match (upper.next(), upper.next()) {
                (Some(u), None) => u,
                _ => c,
            }
        })
        .collect()
}

/// Cheaply cloneable bytes shared between a reader and its index.
#[derive(Clone)]
pub struct SharedBytes(Arc<dyn AsRef<[u8]> + Send + Sync>);

impl SharedBytes {
    pub fn new(data: impl AsRef<[u8]> + Send + Sync + 'static) -> Self {
        Self(Arc::new(data))
    }
}

impl AsRef<[u8]> for SharedBytes {
    fn as_ref(&self) -> &[u8] {
        AsRef::<[u8]>::as_ref(&*self.0)
    }
}

impl Debug for SharedBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SharedBytes({} bytes)", self.as_ref().len())
    }
}

fn partition_point(len: usize, pred: impl Fn(usize) -> bool) -> usize {
    let (mut low, mut high) = (0, len);

    while low < high {
        let mid = low + (high - low) / 2;
        if pred(mid) {
            low = mid + 1;
        } else {
            high = mid;
        }
    }

    low
}

/// Read access to the hash and position arrays.
pub trait NameIndex: Debug + Send + Sync {
    /// Number of entries.
    fn len(&self) -> usize;

    /// Name hash of entry `index`.
    fn hash(&self, index: usize) -> i32;

    /// Name section relative position of entry `index`.
    fn position(&self, index: usize) -> i32;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Indices of all entries having `hash`.
    fn hash_range(&self, hash: i32) -> Range<usize> {
        let start = partition_point(self.len(), |i| self.hash(i) < hash);
        let end = start + partition_point(self.len() - start, |i| self.hash(start + i) <= hash);

        start..end
    }
}

/// Index arrays copied into memory.
#[derive(Clone, Debug, Default)]
pub struct OwnedNameIndex {
    hashes: Vec<i32>,
    positions: Vec<i32>,
}

impl OwnedNameIndex {
    /// Read `count` hashes followed by `count` positions.
    pub fn read_from(reader: &mut impl Read, count: usize) -> ResourcesResult<Self> {
        let mut read_array = || -> ResourcesResult<Vec<i32>> {
            let mut values = Vec::new();
            for _ in 0..count {
                values.push(reader.read_i32::<LittleEndian>()?);
            }

            Ok(values)
        };

        let hashes = read_array()?;
        let positions = read_array()?;

        Ok(Self { hashes, positions })
    }
}

impl NameIndex for OwnedNameIndex {
    fn len(&self) -> usize {
        self.hashes.len()
    }

    fn hash(&self, index: usize) -> i32 {
        self.hashes[index]
    }

    fn position(&self, index: usize) -> i32 {
        self.positions[index]
    }
}

/// Index arrays read in place from container memory.
#[derive(Clone, Debug)]
pub struct MappedNameIndex {
    data: SharedBytes,
    offset: usize,
    count: usize,
}

impl MappedNameIndex {
    /// Construct over `count` entries whose hash array starts at `offset`.
    pub fn new(data: SharedBytes, offset: usize, count: usize) -> ResourcesResult<Self> {
        let end = count
            .checked_mul(8)
            .and_then(|size| size.checked_add(offset))
            .ok_or_else(|| ResourcesError::format("name index size overflows"))?;

        if end > data.as_ref().len() {
            return Err(ResourcesError::Truncated);
        }

        Ok(Self {
            data,
            offset,
            count,
        })
    }

    fn read(&self, array_offset: usize, index: usize) -> i32 {
        let start = self.offset + array_offset + index * 4;
        LittleEndian::read_i32(&self.data.as_ref()[start..start + 4])
    }
}

impl NameIndex for MappedNameIndex {
    fn len(&self) -> usize {
        self.count
    }

    fn hash(&self, index: usize) -> i32 {
        self.read(0, index)
    }

    fn position(&self, index: usize) -> i32 {
        self.read(self.count * 4, index)
    }
}
