//! Integration test: two worlds replicating over a loopback link.

use sable_core::{Entity, EntityKind, TableSystem, TransformSystem, Vec2, World};
use sable_networking::{
    ComponentSegment, LoopbackLink, NetworkApi, NetworkMessage, NetworkSystem,
};

fn peer(link: LoopbackLink, nonce: u32) -> World {
    let mut world = World::new();
    world.register(TransformSystem::new()).unwrap();
    let mut network = NetworkSystem::with_nonce(nonce);
    network.set_api(Box::new(link));
    world.register(network).unwrap();
    world
}

fn tick_both(a: &mut World, b: &mut World, ticks: usize) {
    for _ in 0..ticks {
        a.tick(0.016);
        b.tick(0.016);
    }
}

fn handshake(a: &mut World, b: &mut World) {
    tick_both(a, b, 3);
    assert!(a.system::<NetworkSystem>().unwrap().is_handshake_done());
    assert!(b.system::<NetworkSystem>().unwrap().is_handshake_done());
}

#[test]
fn test_handshake_completes() {
    let (a, b) = LoopbackLink::pair();
    let mut master = peer(a, 11);
    let mut other = peer(b, 22);
    handshake(&mut master, &mut other);
}

#[test]
fn test_owned_entity_is_mirrored() {
    let (a, b) = LoopbackLink::pair();
    let mut master = peer(a, 11);
    let mut other = peer(b, 22);
    handshake(&mut master, &mut other);

    let local = master.create_entity(EntityKind::Persistent);
    master.add_component::<TransformSystem>(local).unwrap().position = Vec2::new(3.0, 4.0);
    master
        .add_component::<NetworkSystem>(local)
        .unwrap()
        .replicate(TransformSystem::NAME, 0.0);

    // Master announces and sends, then the peer applies
    tick_both(&mut master, &mut other, 2);

    let guid = master
        .system::<NetworkSystem>()
        .unwrap()
        .entity_to_guid(local)
        .unwrap();
    assert_eq!(guid, 2);

    let network = other.system::<NetworkSystem>().unwrap();
    let remote = network.guid_to_entity(guid).unwrap();
    assert_eq!(network.remote_entities(), vec![remote]);
    assert_eq!(other.entities().kind(remote), Some(EntityKind::Volatile));

    let tc = other.component::<TransformSystem>(remote).unwrap();
    assert_eq!(tc.position, Vec2::new(3.0, 4.0));

    // Remote entities are not part of snapshots
    assert_eq!(other.serialize(), vec![0, 0, 0, 0]);

    assert_eq!(NetworkSystem::delete_all_non_local_entities(&mut other), 1);
    assert!(!other.entities().contains(remote));
    assert!(other.component::<TransformSystem>(remote).is_err());
}

#[test]
fn test_non_master_uses_odd_guids() {
    let (a, b) = LoopbackLink::pair();
    let mut master = peer(a, 11);
    let mut other = peer(b, 22);
    handshake(&mut master, &mut other);

    let mut owned = Vec::new();
    for _ in 0..2 {
        let e = other.create_entity(EntityKind::Volatile);
        other.add_component::<TransformSystem>(e).unwrap();
        other
            .add_component::<NetworkSystem>(e)
            .unwrap()
            .replicate(TransformSystem::NAME, 1.0);
        owned.push(e);
    }
    tick_both(&mut master, &mut other, 2);

    let network = other.system::<NetworkSystem>().unwrap();
    let guids: Vec<_> = owned
        .iter()
        .map(|&e| network.entity_to_guid(e).unwrap())
        .collect();
    assert_eq!(guids, vec![3, 5]);
    assert_eq!(master.system::<NetworkSystem>().unwrap().remote_entities().len(), 2);
}

#[test]
fn test_unknown_system_segments_are_skipped() {
    let (mut injector, b) = LoopbackLink::pair();
    let mut world = peer(b, 22);

    // Complete the handshake by echoing the peer's nonce
    injector.send_packet(&NetworkMessage::Handshake { nonce: 22 }.encode().unwrap());
    injector.send_packet(&NetworkMessage::Create { guid: 8 }.encode().unwrap());
    let update = NetworkMessage::Update {
        guid: 8,
        segments: vec![
            ComponentSegment {
                system: "Sound".to_owned(),
                payload: vec![1, 2, 3],
            },
            ComponentSegment {
                system: TransformSystem::NAME.to_owned(),
                payload: vec![0; 32],
            },
        ],
    };
    injector.send_packet(&update.encode().unwrap());
    injector.send_packet(&[0xff, 1]);

    world.tick(0.016);

    let network = world.system::<NetworkSystem>().unwrap();
    let stats = network.stats();
    assert_eq!(stats.unknown_segments, 1);
    assert_eq!(stats.malformed_packets, 1);
    assert_eq!(stats.remote_created, 1);

    let remote = network.guid_to_entity(8).unwrap();
    assert!(world.component::<TransformSystem>(remote).is_ok());
    assert_ne!(remote, Entity::NULL);
}

#[test]
fn test_remote_delete() {
    let (mut injector, b) = LoopbackLink::pair();
    let mut world = peer(b, 22);
    injector.send_packet(&NetworkMessage::Handshake { nonce: 22 }.encode().unwrap());
    injector.send_packet(&NetworkMessage::Create { guid: 4 }.encode().unwrap());
    world.tick(0.016);
    assert_eq!(world.entities().len(), 1);

    injector.send_packet(&NetworkMessage::Delete { guid: 4 }.encode().unwrap());
    world.tick(0.016);
    assert!(world.entities().is_empty());
    assert!(world.system::<NetworkSystem>().unwrap().guid_to_entity(4).is_none());
}
