//! Integration tests for the entity manager and world snapshots.

use sable_core::{
    ByteWriter, Color, ComponentTable, EcsError, Entity, EntityKind, SystemId, TableSystem,
    TransformSystem, UpdateContext, Vec2, World,
};

#[derive(Debug, Default, Clone, PartialEq)]
struct Tint {
    color: Color,
    pulses: u32,
}

sable_core::component_fields!(Tint {
    color: Color,
    pulses: u32,
});

#[derive(Debug)]
struct TintSystem {
    table: ComponentTable<Tint>,
}

impl TintSystem {
    fn new() -> Self {
        Self {
            table: ComponentTable::new(Self::NAME),
        }
    }
}

impl TableSystem for TintSystem {
    type Component = Tint;
    const NAME: &'static str = "Tint";

    fn table(&self) -> &ComponentTable<Tint> {
        &self.table
    }

    fn table_mut(&mut self) -> &mut ComponentTable<Tint> {
        &mut self.table
    }

    fn update(&mut self, _dt: f32, _ctx: &mut UpdateContext<'_>) {
        for (_, tint) in self.table.iter_mut() {
            tint.pulses += 1;
        }
    }
}

fn world() -> World {
    let mut world = World::new();
    world.register(TransformSystem::new()).unwrap();
    world.register(TintSystem::new()).unwrap();
    world
}

#[test]
fn test_add_component_yields_default() {
    let mut world = world();
    let e = world.create_entity(EntityKind::Volatile);
    world.add_component::<TintSystem>(e).unwrap();
    assert_eq!(world.component::<TintSystem>(e).unwrap(), &Tint::default());
}

#[test]
fn test_add_component_by_name() {
    let mut world = world();
    let e = world.create_entity(EntityKind::Volatile);
    world.add_component_named(e, "Tint").unwrap();
    assert_eq!(
        world.entities().components_of(e).unwrap(),
        &[SystemId::of("Tint")]
    );
    assert_eq!(
        world.add_component_named(e, "Nope"),
        Err(EcsError::UnknownSystem("Nope".to_owned()))
    );
}

#[test]
fn test_delete_entity_removes_every_component() {
    let mut world = world();
    let e = world.create_entity(EntityKind::Persistent);
    world.add_component::<TransformSystem>(e).unwrap();
    world.add_component::<TintSystem>(e).unwrap();

    assert!(world.delete_entity(e));
    assert!(!world.entities().contains(e));
    assert!(matches!(
        world.component::<TransformSystem>(e),
        Err(EcsError::MissingComponent { .. })
    ));
    assert!(matches!(
        world.component::<TintSystem>(e),
        Err(EcsError::MissingComponent { .. })
    ));
    assert!(!world.delete_entity(e));
}

#[test]
fn test_ids_are_monotonic_and_never_reused() {
    let mut world = world();
    let a = world.create_entity(EntityKind::Volatile);
    let b = world.create_entity(EntityKind::Volatile);
    assert_eq!(a, Entity::from_raw(1));
    assert_eq!(b, Entity::from_raw(2));
    world.delete_entity(b);
    assert_eq!(world.create_entity(EntityKind::Volatile), Entity::from_raw(3));
}

#[test]
fn test_all_entities_in_creation_order() {
    let mut world = world();
    let created: Vec<_> = (0..5)
        .map(|_| world.create_entity(EntityKind::Volatile))
        .collect();
    world.delete_entity(created[2]);
    let listed: Vec<_> = world.entities().all_entities().collect();
    assert_eq!(listed, vec![created[0], created[1], created[3], created[4]]);
}

#[test]
fn test_delete_all_entities() {
    let mut world = world();
    for _ in 0..10 {
        let e = world.create_entity(EntityKind::Persistent);
        world.add_component::<TintSystem>(e).unwrap();
    }
    world.delete_all_entities();
    assert!(world.entities().is_empty());
    assert_eq!(world.system::<TintSystem>().unwrap().table().len(), 0);
}

#[test]
fn test_update_runs_every_system() {
    let mut world = world();
    let e = world.create_entity(EntityKind::Volatile);
    world.add_component::<TintSystem>(e).unwrap();
    world.tick(0.016);
    world.tick(0.016);
    assert_eq!(world.component::<TintSystem>(e).unwrap().pulses, 2);
    assert_eq!(world.ticks(), 2);
    assert!(world.last_update_time("Tint").is_some());
}

#[test]
fn test_snapshot_round_trip() {
    const K: usize = 25;
    let mut source = world();
    let mut expected = Vec::new();
    for i in 0..K {
        let e = source.create_entity(EntityKind::Persistent);
        {
            let tc = source.add_component::<TransformSystem>(e).unwrap();
            tc.position = Vec2::new(i as f32, -(i as f32) * 0.5);
            tc.rotation = 0.1 * i as f32;
            tc.z = 0.01 * i as f32;
        }
        if i % 2 == 0 {
            source.add_component::<TintSystem>(e).unwrap().color =
                Color::new(0.1, 0.2, 0.3, i as f32 / K as f32);
        }
        expected.push(e);
    }
    // Volatile entities are not saved
    let scratch = source.create_entity(EntityKind::Volatile);
    source.add_component::<TransformSystem>(scratch).unwrap();

    let bytes = source.serialize();
    assert_eq!(u32::from_le_bytes(bytes[..4].try_into().unwrap()) as usize, K);

    let mut restored = world();
    let report = restored.deserialize(&bytes).unwrap();
    assert_eq!(report.entities, K);
    assert_eq!(report.components, K + K.div_ceil(2));
    assert_eq!(report.mismatches, 0);
    assert_eq!(report.unknown_systems, 0);

    for &e in &expected {
        let a = source.component::<TransformSystem>(e).unwrap();
        let b = restored.component::<TransformSystem>(e).unwrap();
        assert_eq!(a.position.x.to_bits(), b.position.x.to_bits());
        assert_eq!(a.position.y.to_bits(), b.position.y.to_bits());
        assert_eq!(a.rotation.to_bits(), b.rotation.to_bits());
        assert_eq!(a.z.to_bits(), b.z.to_bits());
        assert_eq!(
            source.component::<TintSystem>(e).ok(),
            restored.component::<TintSystem>(e).ok()
        );
        assert_eq!(restored.entities().kind(e), Some(EntityKind::Persistent));
    }

    // The id counter moved past every restored id
    let fresh = restored.create_entity(EntityKind::Volatile);
    assert!(fresh > *expected.last().unwrap());
}

fn single_component_snapshot(entity: u64, name: &str, payload: &[u8]) -> Vec<u8> {
    let mut out = ByteWriter::new();
    out.write_u32(1);
    out.write_u64(entity);
    out.write_u8(1);
    out.write_u8(name.len() as u8);
    out.write_bytes(name.as_bytes());
    out.write_u32(payload.len() as u32);
    out.write_bytes(payload);
    out.into_bytes()
}

#[test]
fn test_snapshot_size_mismatch_is_counted() {
    let mut world = world();
    // Only the color fits; pulses keep their default
    let mut payload = Vec::new();
    for channel in [1.0f32, 0.5, 0.25, 1.0] {
        payload.extend_from_slice(&channel.to_le_bytes());
    }
    let bytes = single_component_snapshot(7, "Tint", &payload);

    let report = world.deserialize(&bytes).unwrap();
    assert_eq!(report.entities, 1);
    assert_eq!(report.components, 1);
    assert_eq!(report.mismatches, 1);

    let tint = world.component::<TintSystem>(Entity::from_raw(7)).unwrap();
    assert_eq!(tint.color, Color::new(1.0, 0.5, 0.25, 1.0));
    assert_eq!(tint.pulses, 0);
}

#[test]
fn test_snapshot_unknown_system_is_skipped() {
    let mut world = world();
    let bytes = single_component_snapshot(3, "Particle", &[1, 2, 3, 4]);
    let report = world.deserialize(&bytes).unwrap();
    assert_eq!(report.entities, 1);
    assert_eq!(report.components, 0);
    assert_eq!(report.unknown_systems, 1);
    assert!(world.entities().contains(Entity::from_raw(3)));
}

#[test]
fn test_truncated_snapshot_is_an_error() {
    let mut world = world();
    let bytes = single_component_snapshot(3, "Tint", &[0; 20]);
    let err = world.deserialize(&bytes[..bytes.len() - 5]).unwrap_err();
    assert!(matches!(err, EcsError::Truncated { context: "payload", .. }));
}

#[test]
fn test_empty_world_snapshot() {
    let source = world();
    let bytes = source.serialize();
    assert_eq!(bytes, vec![0, 0, 0, 0]);
    let mut restored = world();
    assert_eq!(restored.deserialize(&bytes).unwrap().entities, 0);
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Expiry {
    ticks_left: u32,
}

sable_core::component_fields!(Expiry { ticks_left: u32 });

/// Deletes its own entities once their countdown reaches zero.
#[derive(Debug)]
struct ExpirySystem {
    table: ComponentTable<Expiry>,
}

impl TableSystem for ExpirySystem {
    type Component = Expiry;
    const NAME: &'static str = "Expiry";

    fn table(&self) -> &ComponentTable<Expiry> {
        &self.table
    }

    fn table_mut(&mut self) -> &mut ComponentTable<Expiry> {
        &mut self.table
    }

    fn update(&mut self, _dt: f32, ctx: &mut UpdateContext<'_>) {
        let mut expired = Vec::new();
        for (entity, expiry) in self.table.iter_mut() {
            expiry.ticks_left = expiry.ticks_left.saturating_sub(1);
            if expiry.ticks_left == 0 {
                expired.push(entity);
            }
        }
        for entity in expired {
            ctx.entities.delete_entity(entity, ctx.registry);
        }
    }
}

#[test]
fn test_system_can_delete_its_own_entities() {
    let mut world = world();
    world
        .register(ExpirySystem {
            table: ComponentTable::new(ExpirySystem::NAME),
        })
        .unwrap();
    let doomed = world.create_entity(EntityKind::Persistent);
    world.add_component::<TransformSystem>(doomed).unwrap();
    world.add_component::<TintSystem>(doomed).unwrap();
    world.add_component::<ExpirySystem>(doomed).unwrap().ticks_left = 1;
    let survivor = world.create_entity(EntityKind::Persistent);
    world.add_component::<ExpirySystem>(survivor).unwrap().ticks_left = 3;

    world.tick(0.016);

    assert!(!world.entities().contains(doomed));
    let expiry = world.system::<ExpirySystem>().unwrap().table();
    assert!(!expiry.contains(doomed));
    assert!(expiry.contains(survivor));
    assert!(!world.system::<TintSystem>().unwrap().table().contains(doomed));
    assert!(!world.system::<TransformSystem>().unwrap().table().contains(doomed));

    // A stale row would be written out for an entity the ledger lacks.
    let mut restored = World::new();
    restored
        .register(ExpirySystem {
            table: ComponentTable::new(ExpirySystem::NAME),
        })
        .unwrap();
    let report = restored.deserialize(&world.serialize()).unwrap();
    assert_eq!(report.entities, 1);
    assert_eq!(restored.system::<ExpirySystem>().unwrap().table().len(), 1);
}

/// Unregisters the named systems on its first update.
#[derive(Debug)]
struct JanitorSystem {
    table: ComponentTable<Tint>,
    targets: Vec<&'static str>,
    runs: u32,
}

impl TableSystem for JanitorSystem {
    type Component = Tint;
    const NAME: &'static str = "Janitor";

    fn table(&self) -> &ComponentTable<Tint> {
        &self.table
    }

    fn table_mut(&mut self) -> &mut ComponentTable<Tint> {
        &mut self.table
    }

    fn update(&mut self, _dt: f32, ctx: &mut UpdateContext<'_>) {
        for name in self.targets.drain(..) {
            assert!(ctx.registry.unregister(name).is_some());
        }
        self.runs += 1;
    }
}

#[test]
fn test_system_survives_unregistering_others_mid_tick() {
    let mut world = world();
    world
        .register(JanitorSystem {
            table: ComponentTable::new(JanitorSystem::NAME),
            targets: vec![TintSystem::NAME, ExpirySystem::NAME],
            runs: 0,
        })
        .unwrap();
    world
        .register(ExpirySystem {
            table: ComponentTable::new(ExpirySystem::NAME),
        })
        .unwrap();
    let e = world.create_entity(EntityKind::Persistent);
    world.add_component::<JanitorSystem>(e).unwrap().pulses = 4;

    world.tick(0.016);
    world.tick(0.016);

    let janitor = world.system::<JanitorSystem>().unwrap();
    assert_eq!(janitor.runs, 2);
    assert_eq!(janitor.table().get(e).unwrap().pulses, 4);
    assert_eq!(
        world.registry().names().collect::<Vec<_>>(),
        vec![TransformSystem::NAME, JanitorSystem::NAME]
    );
    assert_eq!(world.ticks(), 2);
}

/// Counts its own updates and keeps the count outside its table.
#[derive(Debug)]
struct ClockSystem {
    table: ComponentTable<Tint>,
    elapsed: u32,
}

impl TableSystem for ClockSystem {
    type Component = Tint;
    const NAME: &'static str = "Clock";

    fn table(&self) -> &ComponentTable<Tint> {
        &self.table
    }

    fn table_mut(&mut self) -> &mut ComponentTable<Tint> {
        &mut self.table
    }

    fn update(&mut self, _dt: f32, _ctx: &mut UpdateContext<'_>) {
        self.elapsed += 1;
    }

    fn save_state(&self) -> Option<Vec<u8>> {
        let mut out = ByteWriter::new();
        out.write_u32(self.elapsed);
        Some(out.into_bytes())
    }

    fn restore_state(&mut self, blob: &[u8]) -> sable_core::EcsResult<()> {
        let mut reader = sable_core::ByteReader::new(blob);
        self.elapsed = reader.read_u32().ok_or(EcsError::Truncated {
            offset: 0,
            context: "clock",
        })?;
        Ok(())
    }
}

fn clock() -> ClockSystem {
    ClockSystem {
        table: ComponentTable::new(ClockSystem::NAME),
        elapsed: 0,
    }
}

#[test]
fn test_system_states_round_trip() {
    let mut source = world();
    source.register(clock()).unwrap();
    for _ in 0..3 {
        source.tick(0.016);
    }
    let states = source.serialize_system_states();

    let mut target = world();
    target.register(clock()).unwrap();
    assert_eq!(target.deserialize_system_states(&states), Ok(1));
    assert_eq!(target.system::<ClockSystem>().unwrap().elapsed, 3);

    // Systems without state are not written; unknown names are skipped
    let mut plain = world();
    assert_eq!(plain.deserialize_system_states(&states), Ok(0));
    assert_eq!(plain.serialize_system_states(), 0u32.to_le_bytes().to_vec());
}

#[test]
fn test_truncated_system_states_are_an_error() {
    let mut source = world();
    source.register(clock()).unwrap();
    let states = source.serialize_system_states();
    let mut target = world();
    target.register(clock()).unwrap();
    assert!(matches!(
        target.deserialize_system_states(&states[..states.len() - 1]),
        Err(EcsError::Truncated { .. })
    ));
}

#[test]
fn test_remove_component_keeps_the_entity() {
    let mut world = world();
    let e = world.create_entity(EntityKind::Persistent);
    world.add_component::<TransformSystem>(e).unwrap();
    world.add_component::<TintSystem>(e).unwrap();

    let (registry, entities) = world.split_mut();
    assert!(entities.remove_component(e, TintSystem::ID, registry));
    assert!(!entities.remove_component(e, TintSystem::ID, registry));
    assert_eq!(entities.components_of(e), Some(&[TransformSystem::ID][..]));

    assert!(world.entities().contains(e));
    assert!(!world.system::<TintSystem>().unwrap().table().contains(e));
}
