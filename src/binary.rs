// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Append-only binary writer and its mirror-image reader.

Integers of every width are written as [varint]s.  POD aggregates are written as their
raw bytes, padded to the configured alignment first.  Whatever the [`Writer`] does, the
[`Reader`] undoes in the same order; nothing here is self-describing.

The writer's storage is reused across frames: [`Writer::clear`] rewinds without
releasing memory, and growth is geometric.
*/

pub mod varint;

use bytemuck::Pod;

/// Smallest allocation a growing writer makes.
const MIN_CAPACITY: usize = 64;

#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("unexpected end of stream: wanted {wanted} bytes, {remaining} remaining")]
    UnexpectedEof { wanted: usize, remaining: usize },
    #[error("malformed varint")]
    VarintOverflow,
    #[error("varint value {0} does not fit the target type")]
    OutOfRange(u64),
    #[error("string is not valid UTF-8")]
    InvalidUtf8,
}

#[derive(Debug, Clone)]
pub struct Writer {
    buffer: Vec<u8>,
    alignment: usize,
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}

impl Writer {
    pub fn new() -> Self {
        Writer {
            buffer: Vec::new(),
            alignment: 1,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Writer {
            buffer: Vec::with_capacity(capacity),
            alignment: 1,
        }
    }

    /**
    Pads every POD write to a multiple of `alignment` bytes from the start of the stream.

    A [`Reader`] over the result must be configured with the same alignment.
    */
    pub fn with_alignment(mut self, alignment: usize) -> Self {
        assert!(alignment.is_power_of_two(), "alignment must be a power of two");
        self.alignment = alignment;
        self
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    /// Rewinds to empty, keeping the allocation.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Ensures room for `additional` more bytes, doubling when it has to grow.
    pub fn reserve(&mut self, additional: usize) {
        let needed = self.buffer.len() + additional;
        if needed <= self.buffer.capacity() {
            return;
        }
        let target = needed
            .max(self.buffer.capacity() * 2)
            .max(MIN_CAPACITY);
        self.buffer.reserve_exact(target - self.buffer.len());
    }

    /// Zero-pads until the length is a multiple of `alignment`.
    pub fn align_to(&mut self, alignment: usize) {
        let padding = padding_for(self.buffer.len(), alignment);
        if padding > 0 {
            self.reserve(padding);
            self.buffer.resize(self.buffer.len() + padding, 0);
        }
    }

    /// Appends `len` zeroed bytes and hands them back for the caller to fill.
    pub fn reserve_bytes(&mut self, len: usize) -> &mut [u8] {
        self.reserve(len);
        let start = self.buffer.len();
        self.buffer.resize(start + len, 0);
        &mut self.buffer[start..]
    }

    pub fn write_u8(&mut self, value: u8) {
        self.reserve(1);
        self.buffer.push(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(value as u8);
    }

    pub fn write_varint(&mut self, value: u64) {
        self.reserve(varint::encoded_len(value));
        varint::encode(value, &mut self.buffer);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.write_varint(value as u64);
    }
    pub fn write_u32(&mut self, value: u32) {
        self.write_varint(value as u64);
    }
    pub fn write_u64(&mut self, value: u64) {
        self.write_varint(value);
    }
    pub fn write_usize(&mut self, value: usize) {
        self.write_varint(value as u64);
    }
    pub fn write_i32(&mut self, value: i32) {
        self.write_varint(varint::zigzag(value as i64));
    }
    pub fn write_i64(&mut self, value: i64) {
        self.write_varint(varint::zigzag(value));
    }

    pub fn write_f32(&mut self, value: f32) {
        self.write_raw(&value.to_le_bytes());
    }

    /// Length-prefixed byte span.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.write_usize(bytes.len());
        self.write_raw(bytes);
    }

    pub fn write_str(&mut self, value: &str) {
        self.write_bytes(value.as_bytes());
    }

    /// Bytes with no length prefix and no padding.
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.reserve(bytes.len());
        self.buffer.extend_from_slice(bytes);
    }

    /// A POD aggregate, padded to the configured alignment.
    pub fn write<T: Pod>(&mut self, value: &T) {
        self.align_to(self.alignment);
        self.write_raw(bytemuck::bytes_of(value));
    }

    /// A count-prefixed array of POD values, padded to the configured alignment or the
    /// element alignment, whichever is larger.
    pub fn write_slice<T: Pod>(&mut self, values: &[T]) {
        self.write_usize(values.len());
        self.align_to(self.alignment.max(std::mem::align_of::<T>()));
        self.write_raw(bytemuck::cast_slice(values));
    }
}

#[derive(Debug, Clone)]
pub struct Reader<'a> {
    bytes: &'a [u8],
    position: usize,
    alignment: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Reader {
            bytes,
            position: 0,
            alignment: 1,
        }
    }

    pub fn with_alignment(mut self, alignment: usize) -> Self {
        assert!(alignment.is_power_of_two(), "alignment must be a power of two");
        self.alignment = alignment;
        self
    }

    pub fn position(&self) -> usize {
        self.position
    }
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn align_to(&mut self, alignment: usize) -> Result<(), Error> {
        let padding = padding_for(self.position, alignment);
        self.read_raw(padding).map(|_| ())
    }

    pub fn read_raw(&mut self, len: usize) -> Result<&'a [u8], Error> {
        if len > self.remaining() {
            return Err(Error::UnexpectedEof {
                wanted: len,
                remaining: self.remaining(),
            });
        }
        let out = &self.bytes[self.position..self.position + len];
        self.position += len;
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, Error> {
        Ok(self.read_raw(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool, Error> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_varint(&mut self) -> Result<u64, Error> {
        let rest = &self.bytes[self.position..];
        match varint::decode(rest) {
            Some((value, used)) => {
                self.position += used;
                Ok(value)
            }
            None if rest.len() < varint::MAX_LEN && rest.iter().all(|b| b & 0x80 != 0) => {
                Err(Error::UnexpectedEof {
                    wanted: rest.len() + 1,
                    remaining: rest.len(),
                })
            }
            None => Err(Error::VarintOverflow),
        }
    }

    pub fn read_u16(&mut self) -> Result<u16, Error> {
        let value = self.read_varint()?;
        u16::try_from(value).map_err(|_| Error::OutOfRange(value))
    }
    pub fn read_u32(&mut self) -> Result<u32, Error> {
        let value = self.read_varint()?;
        u32::try_from(value).map_err(|_| Error::OutOfRange(value))
    }
    pub fn read_u64(&mut self) -> Result<u64, Error> {
        self.read_varint()
    }
    pub fn read_usize(&mut self) -> Result<usize, Error> {
        let value = self.read_varint()?;
        usize::try_from(value).map_err(|_| Error::OutOfRange(value))
    }
    pub fn read_i32(&mut self) -> Result<i32, Error> {
        let value = self.read_varint()?;
        i32::try_from(varint::unzigzag(value)).map_err(|_| Error::OutOfRange(value))
    }
    pub fn read_i64(&mut self) -> Result<i64, Error> {
        Ok(varint::unzigzag(self.read_varint()?))
    }

    pub fn read_f32(&mut self) -> Result<f32, Error> {
        let raw = self.read_raw(4)?;
        Ok(f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    pub fn read_bytes(&mut self) -> Result<&'a [u8], Error> {
        let len = self.read_usize()?;
        self.read_raw(len)
    }

    pub fn read_str(&mut self) -> Result<&'a str, Error> {
        let bytes = self.read_bytes()?;
        std::str::from_utf8(bytes).map_err(|_| Error::InvalidUtf8)
    }

    pub fn read<T: Pod>(&mut self) -> Result<T, Error> {
        self.align_to(self.alignment)?;
        let raw = self.read_raw(std::mem::size_of::<T>())?;
        Ok(bytemuck::pod_read_unaligned(raw))
    }

    /**
    Reads an array written by [`Writer::write_slice`].

    Borrows straight out of the stream when the bytes happen to be suitably aligned in
    memory, and copies otherwise.
    */
    pub fn read_slice<T: Pod>(&mut self) -> Result<std::borrow::Cow<'a, [T]>, Error> {
        let count = self.read_usize()?;
        self.align_to(self.alignment.max(std::mem::align_of::<T>()))?;
        let byte_len = count
            .checked_mul(std::mem::size_of::<T>())
            .ok_or(Error::OutOfRange(count as u64))?;
        let raw = self.read_raw(byte_len)?;
        Ok(match bytemuck::try_cast_slice(raw) {
            Ok(borrowed) => std::borrow::Cow::Borrowed(borrowed),
            Err(_) => std::borrow::Cow::Owned(
                raw.chunks_exact(std::mem::size_of::<T>())
                    .map(bytemuck::pod_read_unaligned)
                    .collect(),
            ),
        })
    }
}

const fn padding_for(position: usize, alignment: usize) -> usize {
    let misalignment = position % alignment;
    if misalignment == 0 {
        0
    } else {
        alignment - misalignment
    }
}
