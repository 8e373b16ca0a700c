//! # Byte Codec
//!
//! Little-endian byte writer/reader pair and the per-field codec used by
//! component records, world snapshots and replication messages.
//!
//! ## Design
//!
//! - Every encoded value has a fixed size known at compile time
//! - Layout is explicit and endian-stable, never a memory image
//! - Reads return `None` on truncation instead of panicking

use crate::ecs::Entity;
use crate::math::{Color, Vec2};

/// Growable little-endian byte writer.
#[derive(Debug, Default, Clone)]
pub struct ByteWriter {
    buffer: Vec<u8>,
}

impl ByteWriter {
    /// Creates an empty writer.
    #[must_use]
    pub const fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Creates an empty writer with pre-reserved capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Returns the number of bytes written.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if no bytes have been written.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Returns a slice of the written data.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Consumes the writer, returning the written bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Writes a single byte.
    #[inline]
    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    /// Writes a u16 in little-endian format.
    #[inline]
    pub fn write_u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a u32 in little-endian format.
    #[inline]
    pub fn write_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a u64 in little-endian format.
    #[inline]
    pub fn write_u64(&mut self, value: u64) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a f32 in little-endian format.
    #[inline]
    pub fn write_f32(&mut self, value: f32) {
        self.write_u32(value.to_bits());
    }

    /// Writes raw bytes.
    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }
}

/// Little-endian byte reader over a borrowed buffer.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> ByteReader<'a> {
    /// Creates a new reader from a buffer.
    #[must_use]
    pub const fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, position: 0 }
    }

    /// Returns the number of bytes remaining.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    /// Returns the current read offset.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Reads exactly `len` raw bytes.
    #[inline]
    pub fn read_bytes(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.position.checked_add(len)?;
        let slice = self.buffer.get(self.position..end)?;
        self.position = end;
        Some(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Some(out)
    }

    /// Reads a single byte.
    #[inline]
    pub fn read_u8(&mut self) -> Option<u8> {
        self.read_array::<1>().map(|b| b[0])
    }

    /// Reads a u16 in little-endian format.
    #[inline]
    pub fn read_u16(&mut self) -> Option<u16> {
        self.read_array().map(u16::from_le_bytes)
    }

    /// Reads a u32 in little-endian format.
    #[inline]
    pub fn read_u32(&mut self) -> Option<u32> {
        self.read_array().map(u32::from_le_bytes)
    }

    /// Reads a u64 in little-endian format.
    #[inline]
    pub fn read_u64(&mut self) -> Option<u64> {
        self.read_array().map(u64::from_le_bytes)
    }

    /// Reads a f32 in little-endian format.
    #[inline]
    pub fn read_f32(&mut self) -> Option<f32> {
        self.read_u32().map(f32::from_bits)
    }
}

/// A fixed-size value that can appear in a component's field list.
pub trait FieldCodec: Sized {
    /// Encoded size in bytes.
    const SIZE: usize;

    /// Appends the encoded value.
    fn write(&self, out: &mut ByteWriter);

    /// Reads a value, or `None` if the input is exhausted.
    fn read(input: &mut ByteReader<'_>) -> Option<Self>;
}

macro_rules! impl_scalar_field {
    ($($ty:ty => $write:ident, $read:ident;)*) => {
        $(
            impl FieldCodec for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                #[inline]
                fn write(&self, out: &mut ByteWriter) {
                    out.$write(*self);
                }

                #[inline]
                fn read(input: &mut ByteReader<'_>) -> Option<Self> {
                    input.$read()
                }
            }
        )*
    };
}

impl_scalar_field! {
    u8 => write_u8, read_u8;
    u16 => write_u16, read_u16;
    u32 => write_u32, read_u32;
    u64 => write_u64, read_u64;
    f32 => write_f32, read_f32;
}

impl FieldCodec for i32 {
    const SIZE: usize = 4;

    fn write(&self, out: &mut ByteWriter) {
        out.write_bytes(&self.to_le_bytes());
    }

    fn read(input: &mut ByteReader<'_>) -> Option<Self> {
        input.read_u32().map(|v| Self::from_le_bytes(v.to_le_bytes()))
    }
}

impl FieldCodec for bool {
    const SIZE: usize = 1;

    fn write(&self, out: &mut ByteWriter) {
        out.write_u8(u8::from(*self));
    }

    fn read(input: &mut ByteReader<'_>) -> Option<Self> {
        input.read_u8().map(|b| b != 0)
    }
}

impl FieldCodec for Entity {
    const SIZE: usize = 8;

    fn write(&self, out: &mut ByteWriter) {
        out.write_u64(self.raw());
    }

    fn read(input: &mut ByteReader<'_>) -> Option<Self> {
        input.read_u64().map(Entity::from_raw)
    }
}

impl FieldCodec for Vec2 {
    const SIZE: usize = 8;

    fn write(&self, out: &mut ByteWriter) {
        out.write_f32(self.x);
        out.write_f32(self.y);
    }

    fn read(input: &mut ByteReader<'_>) -> Option<Self> {
        Some(Self::new(input.read_f32()?, input.read_f32()?))
    }
}

impl FieldCodec for Color {
    const SIZE: usize = 16;

    fn write(&self, out: &mut ByteWriter) {
        out.write_f32(self.r);
        out.write_f32(self.g);
        out.write_f32(self.b);
        out.write_f32(self.a);
    }

    fn read(input: &mut ByteReader<'_>) -> Option<Self> {
        Some(Self::new(
            input.read_f32()?,
            input.read_f32()?,
            input.read_f32()?,
            input.read_f32()?,
        ))
    }
}

/// Declares the persistent field list of a component.
///
/// Fields are encoded in the listed order. Fields not listed are runtime
/// state: they are never written and come back as their `Default` value.
/// Decoding is best-effort: once the input runs out, the remaining fields
/// keep their defaults.
///
/// ```rust,ignore
/// #[derive(Default)]
/// struct Health { current: f32, max: f32, regen_timer: f32 }
///
/// component_fields!(Health { current: f32, max: f32 });
/// ```
#[macro_export]
macro_rules! component_fields {
    ($ty:ty { $($field:ident : $fty:ty),* $(,)? }) => {
        impl $crate::ecs::Component for $ty {
            const ENCODED_SIZE: usize = 0 $(+ <$fty as $crate::codec::FieldCodec>::SIZE)*;

            fn encode(&self, out: &mut $crate::codec::ByteWriter) {
                let _ = &out;
                $( <$fty as $crate::codec::FieldCodec>::write(&self.$field, out); )*
            }

            fn decode(input: &mut $crate::codec::ByteReader<'_>) -> Self {
                let _ = &input;
                #[allow(unused_mut)]
                let mut value = <Self as ::core::default::Default>::default();
                $(
                    if let Some(field) = <$fty as $crate::codec::FieldCodec>::read(input) {
                        value.$field = field;
                    }
                )*
                value
            }
        }
    };
}
