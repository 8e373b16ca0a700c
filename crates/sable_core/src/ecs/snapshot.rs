//! # World Snapshots
//!
//! Saves and restores every persistent entity in one pass.
//!
//! Layout (little-endian):
//!
//! ```text
//! u32 entity_count
//! repeat entity_count:
//!     u64 entity_id
//!     u8  component_count
//!     repeat component_count:
//!         u8  name_len
//!         [u8; name_len] system name (UTF-8)
//!         u32 payload_size
//!         [u8; payload_size] payload
//! ```
//!
//! Systems with internal state (cameras, catalogues) save it in a separate
//! section:
//!
//! ```text
//! u32 system_count
//! repeat system_count:
//!     u8  name_len
//!     [u8; name_len] system name (UTF-8)
//!     u32 state_size
//!     [u8; state_size] state
//! ```

use tracing::{debug, warn};

use super::entity::{Entity, EntityKind};
use super::manager::EntityManager;
use super::registry::SystemRegistry;
use crate::codec::{ByteReader, ByteWriter};
use crate::error::{EcsError, EcsResult};

/// Outcome of restoring a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotReport {
    /// Entities restored.
    pub entities: usize,
    /// Components restored, including size-mismatched ones.
    pub components: usize,
    /// Components whose payload size did not match the live record size.
    pub mismatches: usize,
    /// Components skipped because no system had their name.
    pub unknown_systems: usize,
}

fn truncated(reader: &ByteReader<'_>, context: &'static str) -> EcsError {
    EcsError::Truncated {
        offset: reader.position(),
        context,
    }
}

impl EntityManager {
    /// Serializes every persistent entity and its components.
    ///
    /// Components whose system is not reachable are skipped with a warning.
    #[must_use]
    pub fn serialize(&self, registry: &SystemRegistry) -> Vec<u8> {
        let persistent: Vec<_> = self
            .ledger
            .iter()
            .filter(|(_, record)| record.kind == EntityKind::Persistent)
            .collect();

        let mut out = ByteWriter::with_capacity(4 + persistent.len() * 16);
        out.write_u32(persistent.len() as u32);

        let mut blobs = Vec::new();
        for (entity, record) in persistent {
            blobs.clear();
            for &id in &record.systems {
                let Some(system) = registry.by_id(id) else {
                    warn!(%entity, ?id, "system not reachable, component not saved");
                    continue;
                };
                let Ok(name_len) = u8::try_from(system.name().len()) else {
                    warn!(system = system.name(), "system name too long for snapshot");
                    continue;
                };
                match system.serialize_component(*entity) {
                    Ok(payload) => blobs.push((system.name(), name_len, payload)),
                    Err(err) => warn!(%entity, %err, "component not saved"),
                }
            }
            if blobs.len() > usize::from(u8::MAX) {
                warn!(%entity, count = blobs.len(), "too many components, truncating");
                blobs.truncate(usize::from(u8::MAX));
            }

            out.write_u64(entity.raw());
            out.write_u8(blobs.len() as u8);
            for (name, name_len, payload) in &blobs {
                out.write_u8(*name_len);
                out.write_bytes(name.as_bytes());
                out.write_u32(payload.len() as u32);
                out.write_bytes(payload);
            }
        }

        debug!(bytes = out.len(), "serialized world");
        out.into_bytes()
    }

    /// Restores entities and components from a snapshot.
    ///
    /// Restored entities keep their ids and are persistent. Existing
    /// components are overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::Truncated`] if the input ends early. Size
    /// mismatches and unknown system names are not errors; they are counted
    /// in the report.
    pub fn deserialize(
        &mut self,
        registry: &mut SystemRegistry,
        bytes: &[u8],
    ) -> EcsResult<SnapshotReport> {
        let mut reader = ByteReader::new(bytes);
        let mut report = SnapshotReport::default();

        let count = reader
            .read_u32()
            .ok_or_else(|| truncated(&reader, "entity count"))?;

        for _ in 0..count {
            let raw = reader
                .read_u64()
                .ok_or_else(|| truncated(&reader, "entity id"))?;
            let components = reader
                .read_u8()
                .ok_or_else(|| truncated(&reader, "component count"))?;

            let entity = Entity::from_raw(raw);
            let valid = !entity.is_null();
            if valid {
                self.restore_entity(entity, EntityKind::Persistent);
                report.entities += 1;
            } else {
                warn!("snapshot contains the null entity, skipping its components");
            }

            for _ in 0..components {
                let name_len = reader
                    .read_u8()
                    .ok_or_else(|| truncated(&reader, "system name length"))?;
                let name = reader
                    .read_bytes(usize::from(name_len))
                    .ok_or_else(|| truncated(&reader, "system name"))?;
                let size = reader
                    .read_u32()
                    .ok_or_else(|| truncated(&reader, "payload size"))?;
                let payload = reader
                    .read_bytes(size as usize)
                    .ok_or_else(|| truncated(&reader, "payload"))?;

                if !valid {
                    continue;
                }

                let name = String::from_utf8_lossy(name);
                let Some(system) = registry.find_mut(&name) else {
                    warn!(system = %name, %entity, "unknown system in snapshot, skipping");
                    report.unknown_systems += 1;
                    continue;
                };

                match system.deserialize_component(entity, payload) {
                    Ok(()) => {}
                    Err(EcsError::SizeMismatch {
                        expected, actual, ..
                    }) => {
                        warn!(system = %name, %entity, expected, actual, "component size mismatch");
                        report.mismatches += 1;
                    }
                    Err(err) => return Err(err),
                }
                let id = system.id();
                report.components += 1;
                self.record_component(entity, id)?;
            }
        }

        debug!(?report, "restored world");
        Ok(report)
    }
}

impl SystemRegistry {
    /// Serializes the internal state of every system that has some.
    #[must_use]
    pub fn serialize_states(&self) -> Vec<u8> {
        let mut states = Vec::new();
        for id in self.ids() {
            let Some(system) = self.by_id(id) else {
                warn!(?id, "system not reachable, state not saved");
                continue;
            };
            let Some(state) = system.save_state() else {
                continue;
            };
            let Ok(name_len) = u8::try_from(system.name().len()) else {
                warn!(system = system.name(), "system name too long for snapshot");
                continue;
            };
            states.push((system.name(), name_len, state));
        }

        let mut out = ByteWriter::with_capacity(4 + states.len() * 32);
        out.write_u32(states.len() as u32);
        for (name, name_len, state) in &states {
            out.write_u8(*name_len);
            out.write_bytes(name.as_bytes());
            out.write_u32(state.len() as u32);
            out.write_bytes(state);
        }
        debug!(systems = states.len(), bytes = out.len(), "serialized system states");
        out.into_bytes()
    }

    /// Restores states written by [`serialize_states`](Self::serialize_states).
    ///
    /// Unknown systems are skipped. Returns the number of systems restored.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::Truncated`] if the input ends early, or the error
    /// of a system rejecting its state.
    pub fn deserialize_states(&mut self, bytes: &[u8]) -> EcsResult<usize> {
        let mut reader = ByteReader::new(bytes);
        let count = reader
            .read_u32()
            .ok_or_else(|| truncated(&reader, "system state count"))?;

        let mut restored = 0;
        for _ in 0..count {
            let name_len = reader
                .read_u8()
                .ok_or_else(|| truncated(&reader, "system name length"))?;
            let name = reader
                .read_bytes(usize::from(name_len))
                .ok_or_else(|| truncated(&reader, "system name"))?;
            let size = reader
                .read_u32()
                .ok_or_else(|| truncated(&reader, "state size"))?;
            let state = reader
                .read_bytes(size as usize)
                .ok_or_else(|| truncated(&reader, "system state"))?;

            let name = String::from_utf8_lossy(name);
            let Some(system) = self.find_mut(&name) else {
                warn!(system = %name, "unknown system in state section, skipping");
                continue;
            };
            system.restore_state(state)?;
            restored += 1;
        }
        debug!(restored, "restored system states");
        Ok(restored)
    }
}
