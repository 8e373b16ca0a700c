//! # Component Records
//!
//! Components are plain data records with no behavior. Each kind is owned by
//! exactly one system's table.
//!
//! Persistence uses an explicit field list (see [`component_fields!`]): the
//! encoded record has a fixed size and a fixed little-endian layout, with no
//! versioning or field tags. This trades forward/backward compatibility for
//! speed and simplicity.
//!
//! [`component_fields!`]: crate::component_fields

use crate::codec::{ByteReader, ByteWriter};

/// Trait for ECS components.
///
/// Components must be:
/// - `Default`: `add` creates a default-constructed record
/// - `Send`: tables move with the world into the simulation thread
///
/// Implement it with [`component_fields!`](crate::component_fields) rather
/// than by hand.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Default)]
/// struct Health {
///     current: f32,
///     max: f32,
/// }
///
/// component_fields!(Health { current: f32, max: f32 });
/// ```
pub trait Component: Default + Send + 'static {
    /// Size in bytes of an encoded record.
    const ENCODED_SIZE: usize;

    /// Appends the persistent fields of this record.
    fn encode(&self, out: &mut ByteWriter);

    /// Rebuilds a record from encoded fields.
    ///
    /// Best-effort: fields past the end of the input keep their default value.
    fn decode(input: &mut ByteReader<'_>) -> Self;

    /// Encodes this record into a fresh buffer of `ENCODED_SIZE` bytes.
    fn to_bytes(&self) -> Vec<u8> {
        let mut out = ByteWriter::with_capacity(Self::ENCODED_SIZE);
        self.encode(&mut out);
        out.into_bytes()
    }

    /// Decodes a record from a byte blob.
    fn from_bytes(bytes: &[u8]) -> Self {
        Self::decode(&mut ByteReader::new(bytes))
    }
}
