//! # Network System
//!
//! Mirrors locally owned entities to a remote peer and applies the peer's
//! updates to the entities it owns.
//!
//! Each tick, with a connected [`NetworkApi`]:
//!
//! 1. Drain received packets (handshake, create, delete, queued updates)
//! 2. Until the handshake completes, resend the local nonce and stop
//! 3. Apply queued updates to remote entities, system by system
//! 4. Announce new local entities and send due component updates
//!
//! Global ids come from a counter starting at 2. The game master hands out
//! even ids and its peer odd ones, so both sides can allocate without
//! talking to each other.

use std::collections::{BTreeMap, VecDeque};

use rand::Rng;
use sable_core::{
    ComponentTable, Entity, EntityKind, EntityManager, SystemRegistry, TableSystem,
    UpdateContext, World,
};
use tracing::{debug, info, trace, warn};

use crate::api::NetworkApi;
use crate::message::{ComponentSegment, NetworkMessage};

/// First global id handed out.
const FIRST_GUID: u32 = 2;

/// Replication state of an entity. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkComponent {
    /// Seconds between updates per system name; `<= 0` sends once.
    pub system_update_period: BTreeMap<String, f32>,
    accumulators: BTreeMap<String, f32>,
    guid: u32,
    exists_globally: bool,
    owned_locally: bool,
    pending: VecDeque<Vec<ComponentSegment>>,
}

impl Default for NetworkComponent {
    fn default() -> Self {
        Self {
            system_update_period: BTreeMap::new(),
            accumulators: BTreeMap::new(),
            guid: 0,
            exists_globally: false,
            owned_locally: true,
            pending: VecDeque::new(),
        }
    }
}

sable_core::component_fields!(NetworkComponent {});

impl NetworkComponent {
    /// Replicates the component of `system` every `period` seconds.
    pub fn replicate(&mut self, system: &str, period: f32) {
        self.system_update_period.insert(system.to_owned(), period);
    }

    /// Global id, `0` until announced.
    #[must_use]
    pub fn guid(&self) -> u32 {
        self.guid
    }

    /// Returns true once the peer knows about the entity.
    #[must_use]
    pub fn exists_globally(&self) -> bool {
        self.exists_globally
    }

    /// Returns true if this side owns the entity.
    #[must_use]
    pub fn is_owned_locally(&self) -> bool {
        self.owned_locally
    }

    /// Received update messages not applied yet.
    #[must_use]
    pub fn pending_updates(&self) -> usize {
        self.pending.len()
    }

    /// Advances the accumulators and returns the systems due for an update.
    fn due_systems(&mut self, dt: f32) -> Vec<String> {
        let mut due = Vec::new();
        for (system, &period) in &self.system_update_period {
            let accum = self.accumulators.entry(system.clone()).or_insert(0.0);
            if *accum < 0.0 {
                continue;
            }
            *accum += dt;
            if *accum >= period {
                due.push(system.clone());
                *accum = if period <= 0.0 { -1.0 } else { 0.0 };
            }
        }
        due
    }
}

/// Replication counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkStats {
    /// Packets sent.
    pub packets_sent: u64,
    /// Packets received.
    pub packets_received: u64,
    /// Packets that failed to decode.
    pub malformed_packets: u64,
    /// Segments naming a system this side does not have.
    pub unknown_segments: u64,
    /// Remote entities created.
    pub remote_created: u64,
}

/// Replicates entities over a [`NetworkApi`].
pub struct NetworkSystem {
    table: ComponentTable<NetworkComponent>,
    api: Option<Box<dyn NetworkApi>>,
    next_guid: u32,
    nonce: u32,
    handshake_done: bool,
    stats: NetworkStats,
}

impl std::fmt::Debug for NetworkSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkSystem")
            .field("table", &self.table)
            .field("connected", &self.api.as_ref().map(|api| api.is_connected()))
            .field("next_guid", &self.next_guid)
            .field("handshake_done", &self.handshake_done)
            .finish_non_exhaustive()
    }
}

impl Default for NetworkSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkSystem {
    /// Creates a system with a random handshake nonce and no link.
    #[must_use]
    pub fn new() -> Self {
        Self::with_nonce(rand::thread_rng().gen_range(0..65_000))
    }

    /// Creates a system with a fixed handshake nonce.
    #[must_use]
    pub fn with_nonce(nonce: u32) -> Self {
        Self {
            table: ComponentTable::new(Self::NAME),
            api: None,
            next_guid: FIRST_GUID,
            nonce,
            handshake_done: false,
            stats: NetworkStats::default(),
        }
    }

    /// Attaches a link. Replication starts on the next tick.
    pub fn set_api(&mut self, api: Box<dyn NetworkApi>) {
        self.api = Some(api);
        self.handshake_done = false;
    }

    /// Detaches the link.
    pub fn take_api(&mut self) -> Option<Box<dyn NetworkApi>> {
        self.api.take()
    }

    /// Returns true once both peers have seen each other's nonce.
    #[must_use]
    pub fn is_handshake_done(&self) -> bool {
        self.handshake_done
    }

    /// Replication counters.
    #[must_use]
    pub fn stats(&self) -> NetworkStats {
        self.stats
    }

    /// Entity bound to a global id.
    #[must_use]
    pub fn guid_to_entity(&self, guid: u32) -> Option<Entity> {
        let found = self
            .table
            .iter()
            .find(|(_, nc)| nc.guid == guid)
            .map(|(entity, _)| entity);
        if found.is_none() {
            debug!(guid, "no entity bound to guid");
        }
        found
    }

    /// Global id of `entity`, if it is replicated and announced.
    #[must_use]
    pub fn entity_to_guid(&self, entity: Entity) -> Option<u32> {
        self.table.get(entity).ok().map(NetworkComponent::guid)
    }

    /// Entities owned by the peer.
    #[must_use]
    pub fn remote_entities(&self) -> Vec<Entity> {
        self.table
            .iter()
            .filter(|(_, nc)| !nc.owned_locally)
            .map(|(entity, _)| entity)
            .collect()
    }

    /// Deletes every entity owned by the peer. Returns how many were
    /// deleted.
    pub fn delete_all_non_local_entities(world: &mut World) -> usize {
        let remote = world
            .system::<Self>()
            .map(Self::remote_entities)
            .unwrap_or_default();
        let count = remote
            .into_iter()
            .filter(|&entity| world.delete_entity(entity))
            .count();
        info!(count, "removed non local entities");
        count
    }

    fn send(api: &mut dyn NetworkApi, stats: &mut NetworkStats, message: &NetworkMessage) {
        match message.encode() {
            Ok(packet) => {
                api.send_packet(&packet);
                stats.packets_sent += 1;
            }
            Err(err) => warn!(%err, "failed to encode message"),
        }
    }

    /// Handles every received packet.
    fn pull_packets(&mut self, entities: &mut EntityManager, registry: &mut SystemRegistry) {
        let Some(api) = self.api.as_deref_mut() else {
            return;
        };
        while let Some(packet) = api.pull_packet() {
            self.stats.packets_received += 1;
            let message = match NetworkMessage::decode(&packet) {
                Ok(message) => message,
                Err(err) => {
                    warn!(%err, "dropping malformed packet");
                    self.stats.malformed_packets += 1;
                    continue;
                }
            };

            match message {
                NetworkMessage::Handshake { nonce } if nonce == self.nonce => {
                    if !self.handshake_done {
                        info!("handshake done");
                    }
                    self.handshake_done = true;
                }
                NetworkMessage::Handshake { nonce } => {
                    Self::send(api, &mut self.stats, &NetworkMessage::Handshake { nonce });
                }
                NetworkMessage::Create { guid } => {
                    let entity = entities.create_entity(EntityKind::Volatile);
                    match self.table.add(entity) {
                        Ok(nc) => {
                            nc.guid = guid;
                            nc.owned_locally = false;
                            nc.exists_globally = true;
                        }
                        Err(err) => {
                            warn!(%err, "cannot bind remote entity");
                            continue;
                        }
                    }
                    if let Err(err) = entities.record_component(entity, Self::ID) {
                        warn!(%err, "cannot record remote entity");
                    }
                    self.stats.remote_created += 1;
                    debug!(%entity, guid, "created remote entity");
                }
                NetworkMessage::Delete { guid } => {
                    if let Some(entity) = self
                        .table
                        .iter()
                        .find(|(_, nc)| nc.guid == guid)
                        .map(|(entity, _)| entity)
                    {
                        entities.delete_entity(entity, registry);
                        debug!(%entity, guid, "deleted remote entity");
                    } else {
                        warn!(guid, "delete for unknown guid");
                    }
                }
                NetworkMessage::Update { guid, segments } => {
                    match self.table.iter_mut().find(|(_, nc)| nc.guid == guid) {
                        Some((_, nc)) => nc.pending.push_back(segments),
                        None => warn!(guid, "update for unknown guid"),
                    }
                }
            }
        }
    }

    /// Applies queued updates to entities owned by the peer.
    fn apply_updates(&mut self, entities: &mut EntityManager, registry: &mut SystemRegistry) {
        for (entity, nc) in self.table.iter_mut() {
            if nc.owned_locally {
                continue;
            }
            while let Some(segments) = nc.pending.pop_front() {
                for segment in segments {
                    let Some(system) = registry.find_mut(&segment.system) else {
                        warn!(system = %segment.system, %entity, "update for unknown system");
                        self.stats.unknown_segments += 1;
                        continue;
                    };
                    if let Err(err) = system.deserialize_component(entity, &segment.payload) {
                        warn!(%err, "replicated component did not match");
                    }
                    if let Err(err) = entities.record_component(entity, system.id()) {
                        warn!(%err, "cannot record replicated component");
                    }
                    trace!(system = %segment.system, %entity, "applied update");
                }
            }
        }
    }

    /// Announces new local entities and sends due updates.
    fn send_updates(&mut self, dt: f32, registry: &SystemRegistry) {
        let Some(api) = self.api.as_deref_mut() else {
            return;
        };
        let game_master = api.is_game_master();

        for (entity, nc) in self.table.iter_mut() {
            if !nc.owned_locally || nc.system_update_period.is_empty() {
                continue;
            }

            if !nc.exists_globally {
                nc.exists_globally = true;
                nc.guid = self.next_guid;
                self.next_guid += 2;
                if !game_master {
                    nc.guid |= 1;
                }
                debug!(%entity, guid = nc.guid, "announcing entity");
                Self::send(api, &mut self.stats, &NetworkMessage::Create { guid: nc.guid });
            }

            let mut segments = Vec::new();
            for system in nc.due_systems(dt) {
                let Some(source) = registry.named(&system) else {
                    continue;
                };
                match source.serialize_component(entity) {
                    Ok(payload) => segments.push(ComponentSegment { system, payload }),
                    Err(err) => warn!(%err, "cannot replicate component"),
                }
            }
            if !segments.is_empty() {
                let update = NetworkMessage::Update {
                    guid: nc.guid,
                    segments,
                };
                Self::send(api, &mut self.stats, &update);
            }
        }
    }
}

impl TableSystem for NetworkSystem {
    type Component = NetworkComponent;
    const NAME: &'static str = "Network";

    fn table(&self) -> &ComponentTable<NetworkComponent> {
        &self.table
    }

    fn table_mut(&mut self) -> &mut ComponentTable<NetworkComponent> {
        &mut self.table
    }

    fn update(&mut self, dt: f32, ctx: &mut UpdateContext<'_>) {
        if !self.api.as_ref().is_some_and(|api| api.is_connected()) {
            return;
        }

        self.pull_packets(ctx.entities, ctx.registry);

        if !self.handshake_done {
            if let Some(api) = self.api.as_deref_mut() {
                let hello = NetworkMessage::Handshake { nonce: self.nonce };
                Self::send(api, &mut self.stats, &hello);
            }
            return;
        }

        self.apply_updates(ctx.entities, ctx.registry);
        self.send_updates(dt, ctx.registry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_periodic_accumulators() {
        let mut nc = NetworkComponent::default();
        nc.replicate("Transformation", 0.5);
        nc.replicate("Rendering", 0.0);

        assert_eq!(nc.due_systems(0.25), vec!["Rendering".to_owned()]);
        assert_eq!(nc.due_systems(0.25), vec!["Transformation".to_owned()]);
        // A zero period is sent once only
        assert!(nc.due_systems(0.25).is_empty());
        assert_eq!(nc.due_systems(0.25), vec!["Transformation".to_owned()]);
    }

    #[test]
    fn test_negative_period_sends_once() {
        let mut nc = NetworkComponent::default();
        nc.replicate("Rendering", -3.0);
        assert_eq!(nc.due_systems(0.1).len(), 1);
        assert!(nc.due_systems(0.1).is_empty());
        assert!(nc.due_systems(0.1).is_empty());
    }

    #[test]
    fn test_component_is_not_persisted() {
        use sable_core::Component;
        assert_eq!(NetworkComponent::ENCODED_SIZE, 0);
        assert!(NetworkComponent::default().to_bytes().is_empty());
    }
}
