// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Binary primitives shared by readers and writers.

Lengths and type tags use a variable length integer encoding: 7 bits per
byte, least significant group first, high bit set on every byte except the
last. At most 5 bytes are used for a 32-bit value.
*/

use {
    crate::error::{ResourcesError, ResourcesResult},
    byteorder::{ReadBytesExt, WriteBytesExt},
    std::io::{Read, Write},
};

/// Extends [Read] with the container's composite primitives.
pub trait ReadResourcesExt: Read {
    /// Read a 7-bit encoded 32-bit integer.
    fn read_7bit_encoded_i32(&mut self) -> ResourcesResult<i32> {
        let mut result = 0u32;

        for shift in (0..35).step_by(7) {
            let b = self.read_u8()?;

            if shift == 28 && b > 0x0f {
                return Err(ResourcesError::format("7-bit encoded integer is too large"));
            }

            result |= ((b & 0x7f) as u32) << shift;

            if b & 0x80 == 0 {
                return Ok(result as i32);
            }
        }

        Err(ResourcesError::format("7-bit encoded integer is too large"))
    }

    /// Read exactly `length` bytes into a new buffer.
    ///
    /// Memory is allocated as data arrives, so a corrupt length cannot
    /// trigger a huge allocation.
    fn read_vec(&mut self, length: usize) -> ResourcesResult<Vec<u8>> {
        let mut data = Vec::new();
        self.take(length as u64).read_to_end(&mut data)?;

        if data.len() != length {
            return Err(ResourcesError::Truncated);
        }

        Ok(data)
    }

    /// Read a 7-bit length prefixed UTF-8 string.
    fn read_prefixed_string(&mut self) -> ResourcesResult<String> {
        let length = self.read_7bit_encoded_i32()?;
        if length < 0 {
            return Err(ResourcesError::format(format!(
                "negative string length: {}",
                length
            )));
        }

        let data = self.read_vec(length as usize)?;

        String::from_utf8(data)
            .map_err(|_| ResourcesError::format("string is not valid UTF-8"))
    }

    /// Read a 7-bit byte length prefixed UTF-16LE string.
    fn read_utf16_string(&mut self) -> ResourcesResult<String> {
        let length = self.read_7bit_encoded_i32()?;
        if length < 0 || length % 2 != 0 {
            return Err(ResourcesError::format(format!(
                "invalid resource name length: {}",
                length
            )));
        }

        let data = self.read_vec(length as usize)?;

        decode_utf16le(&data)
    }
}

impl<R: Read + ?Sized> ReadResourcesExt for R {}

/// Extends [Write] with the container's composite primitives.
pub trait WriteResourcesExt: Write {
    /// Write a 7-bit encoded 32-bit integer.
    fn write_7bit_encoded_i32(&mut self, value: i32) -> ResourcesResult<()> {
        let mut v = value as u32;

        while v >= 0x80 {
            self.write_u8((v | 0x80) as u8)?;
            v >>= 7;
        }

        self.write_u8(v as u8)?;

        Ok(())
    }

    /// Write a 7-bit length prefixed UTF-8 string.
    fn write_prefixed_string(&mut self, value: &str) -> ResourcesResult<()> {
        self.write_7bit_encoded_i32(length_to_i32(value.len())?)?;
        self.write_all(value.as_bytes())?;

        Ok(())
    }

    /// Write a 7-bit byte length prefixed UTF-16LE string.
    fn write_utf16_string(&mut self, value: &str) -> ResourcesResult<()> {
        let data = encode_utf16le(value);

        self.write_7bit_encoded_i32(length_to_i32(data.len())?)?;
        self.write_all(&data)?;

        Ok(())
    }
}

impl<W: Write + ?Sized> WriteResourcesExt for W {}

/// Convert a length to the container's signed 32-bit representation.
pub fn length_to_i32(length: usize) -> ResourcesResult<i32> {
    i32::try_from(length).map_err(|_| {
        ResourcesError::InvalidArgument(format!(
            "length {} exceeds the maximum container size",
            length
        ))
    })
}

/// Encode a string as UTF-16LE bytes.
pub fn encode_utf16le(value: &str) -> Vec<u8> {
    value
        .encode_utf16()
        .flat_map(|unit| unit.to_le_bytes())
        .collect()
}

/// Decode UTF-16LE bytes into a string.
pub fn decode_utf16le(data: &[u8]) -> ResourcesResult<String> {
    let units = data
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));

    char::decode_utf16(units)
        .collect::<Result<String, _>>()
        .map_err(|_| ResourcesError::format("resource name is not valid UTF-16"))
}
