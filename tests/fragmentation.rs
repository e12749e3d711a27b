//! End-to-end tests for splitting packets and rebuilding them at a peer.
//!
//! Fragments travel through the wire codec between sender and receiver, the
//! way the radio transport carries them.

use std::{num::NonZeroUsize, sync::Arc, thread};

use meshfrag::{
    BinaryCodec,
    FragmentManager,
    FragmentOutcome,
    FragmentationConfig,
    MessageType,
    Packet,
    PacketCodec,
    PeerId,
    fragment::{DEFAULT_LINK_MTU, Fragmenter},
    packet::flags,
};
use proptest::prelude::*;
use rstest::rstest;

mod common;
use common::{TestResult, broadcast_packet, default_engine, engine};

/// Position of the flags byte in the envelope header.
const FLAGS_OFFSET: usize = 11;

/// Encode and decode every fragment as the transport would.
fn over_the_air(fragments: Vec<Packet>) -> TestResult<Vec<Packet>> {
    let codec = BinaryCodec::new();
    let mut received = Vec::with_capacity(fragments.len());
    for fragment in fragments {
        let wire = codec.encode(&fragment)?;
        received.push(codec.decode(&wire)?);
    }
    Ok(received)
}

#[rstest]
fn scenario_engine_uses_small_sizes(engine: FragmentManager) {
    assert_eq!(engine.config().threshold, 500);
    assert_eq!(engine.config().max_fragment_size.get(), 150);
}

#[rstest]
fn default_engine_round_trips_large_message(default_engine: FragmentManager) -> TestResult {
    let original = broadcast_packet(4_000);
    let fragments = default_engine.create_fragments(original.clone());
    assert_eq!(fragments.len(), 4_000_usize.div_ceil(469));

    let mut rebuilt = None;
    for fragment in over_the_air(fragments)? {
        rebuilt = default_engine.handle_fragment(&fragment);
    }
    let rebuilt = rebuilt.ok_or("set did not complete")?;
    assert_eq!(rebuilt.ttl(), 0);
    assert_eq!(rebuilt, original.with_ttl(0));
    Ok(())
}

#[rstest]
fn fragment_envelopes_fit_the_link_mtu() -> TestResult {
    let engine = FragmentManager::new(FragmentationConfig::for_link_mtu(DEFAULT_LINK_MTU)?);
    let original = Packet::new(MessageType::NOISE_ENCRYPTED, common::SENDER, vec![3; 3_000])
        .with_recipient(PeerId::new([9; 8]));
    let fragments = engine.create_fragments(original);

    assert!(fragments.len() > 1);
    let codec = BinaryCodec::new();
    for fragment in &fragments[..fragments.len() - 1] {
        assert_eq!(codec.encode(fragment)?.len(), DEFAULT_LINK_MTU);
    }
    for fragment in &fragments {
        assert!(codec.encode(fragment)?.len() <= DEFAULT_LINK_MTU);
    }
    Ok(())
}

#[test]
fn threshold_sized_packet_goes_out_at_the_link_mtu() -> TestResult {
    let engine = FragmentManager::new(FragmentationConfig::for_link_mtu(DEFAULT_LINK_MTU)?);
    let original = broadcast_packet(DEFAULT_LINK_MTU);
    let sent = engine.create_fragments(original.clone());
    assert_eq!(sent, vec![original.clone()]);

    let wire = BinaryCodec::new().encode(&original)?;
    assert_eq!(wire.len(), DEFAULT_LINK_MTU);
    assert_eq!(BinaryCodec::new().decode(&wire)?, original);
    Ok(())
}

#[test]
fn unpadded_codec_splits_on_frame_length() {
    let engine = FragmentManager::with_codec(common::small_config(), BinaryCodec::unpadded());
    assert_eq!(engine.create_fragments(broadcast_packet(500)).len(), 1);

    let original = broadcast_packet(501);
    let fragments = engine.create_fragments(original.clone());
    assert_eq!(fragments.len(), 4);
    let rebuilt = fragments
        .iter()
        .find_map(|fragment| engine.handle_fragment(fragment));
    assert_eq!(rebuilt, Some(original.with_ttl(0)));
}

#[rstest]
fn compressed_sibling_message_reassembles(engine: FragmentManager) -> TestResult {
    let mut state = 0x2545_f491_u32;
    let text: Vec<u8> = (0..2_000)
        .map(|_| {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            b'a' + u8::try_from((state >> 16) % 16).unwrap_or(0)
        })
        .collect();
    let mut field = u16::try_from(text.len())?.to_be_bytes().to_vec();
    field.extend_from_slice(&lz4::block::compress(&text, None, false)?);

    // A sibling peer sends the compressed envelope split into fragments.
    let carrier = broadcast_packet(100);
    let compressed = Packet::new(MessageType::MESSAGE, common::SENDER, field)
        .with_timestamp(carrier.timestamp());
    let mut frame = BinaryCodec::unpadded().encode(&compressed)?;
    frame[FLAGS_OFFSET] |= flags::IS_COMPRESSED;
    let batch = Fragmenter::new(NonZeroUsize::new(150).ok_or("zero chunk")?)
        .fragment_bytes(MessageType::MESSAGE, &frame)?;
    assert!(batch.len() > 1);
    let fragments: Vec<Packet> = batch
        .into_iter()
        .map(|fragment| Packet::fragment_of(&carrier, fragment.to_payload()))
        .collect();

    let rebuilt = over_the_air(fragments)?
        .iter()
        .find_map(|fragment| engine.handle_fragment(fragment))
        .ok_or("set did not complete")?;
    assert_eq!(rebuilt.payload(), text.as_slice());
    assert_eq!(rebuilt.flags() & flags::IS_COMPRESSED, 0);
    assert_eq!(rebuilt.ttl(), 0);
    Ok(())
}

#[rstest]
fn interleaved_sets_reassemble_independently(engine: FragmentManager) -> TestResult {
    let first = broadcast_packet(700);
    let second = broadcast_packet(1_100).with_recipient(PeerId::new([4; 8]));
    let first_fragments = over_the_air(engine.create_fragments(first.clone()))?;
    let second_fragments = over_the_air(engine.create_fragments(second.clone()))?;

    let mut done = Vec::new();
    let longest = first_fragments.len().max(second_fragments.len());
    for i in 0..longest {
        for fragments in [&second_fragments, &first_fragments] {
            if let Some(fragment) = fragments.get(i) {
                done.extend(engine.handle_fragment(fragment));
            }
        }
    }

    assert_eq!(done.len(), 2);
    assert!(done.contains(&first.with_ttl(0)));
    assert!(done.contains(&second.with_ttl(0)));
    assert_eq!(engine.in_flight(), 0);
    Ok(())
}

#[rstest]
fn concurrent_receivers_share_one_engine(engine: FragmentManager) {
    let engine = Arc::new(engine);
    let packets: Vec<Packet> = (0..8).map(|i| broadcast_packet(600 + i * 97)).collect();

    let rebuilt: Vec<Packet> = thread::scope(|scope| {
        let handles: Vec<_> = packets
            .iter()
            .map(|packet| {
                let engine = Arc::clone(&engine);
                let packet = packet.clone();
                scope.spawn(move || {
                    engine
                        .create_fragments(packet)
                        .iter()
                        .rev()
                        .find_map(|fragment| engine.handle_fragment(fragment))
                })
            })
            .collect();
        handles
            .into_iter()
            .filter_map(|handle| handle.join().ok().flatten())
            .collect()
    });

    assert_eq!(rebuilt.len(), packets.len());
    for packet in packets {
        assert!(rebuilt.contains(&packet.with_ttl(0)));
    }
    assert_eq!(engine.in_flight(), 0);
}

#[rstest]
fn replay_after_completion_opens_a_new_set(engine: FragmentManager) {
    let original = broadcast_packet(620);
    let fragments = engine.create_fragments(original);

    let completions = fragments
        .iter()
        .chain(fragments.iter().take(3))
        .map(|fragment| engine.process_fragment(fragment))
        .filter(FragmentOutcome::is_complete)
        .count();

    // The replayed head opens a new set that stays pending.
    assert_eq!(completions, 1);
    assert_eq!(engine.in_flight(), 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn any_delivery_order_rebuilds_the_packet(
        (len, order) in (523_usize..3_000).prop_flat_map(|len| {
            let count = len.div_ceil(150);
            (Just(len), Just((0..count).collect::<Vec<usize>>()).prop_shuffle())
        })
    ) {
        let engine = FragmentManager::new(common::small_config());
        let original = broadcast_packet(len);
        let fragments = engine.create_fragments(original.clone());
        prop_assert_eq!(fragments.len(), order.len());

        let mut rebuilt = None;
        for index in order {
            if let Some(packet) = engine.handle_fragment(&fragments[index]) {
                rebuilt = Some(packet);
            }
        }
        prop_assert_eq!(rebuilt, Some(original.with_ttl(0)));
        prop_assert_eq!(engine.in_flight(), 0);
    }
}
