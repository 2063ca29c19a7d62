//! Integration tests for the gateway
//!
//! These tests drive whole gateways over in-memory links:
//! - Destination classification and its mode priority
//! - Source identity translation through the ID tables
//! - Complete transmissions between modes, in both directions
//! - Stream termination by end marker and by the watchdog
//! - System Fusion gateway tag locking
//! - P25, NXDN and M17 adapters on the input side
//! - The running loop and its commands

use std::net::SocketAddr;

use dv_gateway::network::{
    DStarNetwork, DmrNetwork, FmNetwork, M17Network, NxdnNetwork, P25Network, YsfNetwork,
};
use dv_gateway::{
    Data, Destination, Direction, Endpoint, FmConfig, Gateway, IdLookup, Network, RouteTables,
    TranscoderMode,
};
use dv_protocol::dmr::lc::{self, FullLcKind};
use dv_protocol::dmr::{self, FrameType};
use dv_protocol::{dstar, fm, m17, nxdn, p25, Mode};
use dv_sim::{streams, MemoryLink, VirtualTranscoder};

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use super::*;

    pub fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    /// An endpoint for the gateway and the link the remote side talks on
    pub fn connect(name: &'static str, port: u16) -> (Endpoint, MemoryLink) {
        let (local, remote) = MemoryLink::pair(addr(port), addr(port + 1));
        let endpoint = Endpoint::new(Box::new(local), remote.local_addr(), name, false);
        (endpoint, remote)
    }

    pub fn dmr_ids() -> IdLookup {
        IdLookup::from_text("1234567 N0CALL\n2345678 K1ABC\n")
    }

    /// D-Star from-network, DMR target, TESTBM routed to slot 1 TG 9
    pub fn gateway(dstar: Endpoint, dmr: Endpoint) -> Gateway {
        let mut tables = RouteTables::new();
        tables.add(Destination::dstar("TESTBM"), Destination::Dmr { slot: 1, tg: 9 });
        let data = Data::new(Mode::DStar, vec![Mode::Dmr], tables)
            .with_dmr_lookup(dmr_ids())
            .with_transcoder(Box::new(VirtualTranscoder::new()));

        Gateway::new(
            Network::DStar(DStarNetwork::new(dstar, "N0GW")),
            vec![Network::Dmr(DmrNetwork::new(dmr, 3_100_000, 1))],
            data,
        )
    }

    pub fn dstar_to_dmr() -> (Gateway, MemoryLink, MemoryLink) {
        let (dstar, dstar_remote) = connect("D-Star", 20010);
        let (dmr, dmr_remote) = connect("DMR", 62030);
        (gateway(dstar, dmr), dstar_remote, dmr_remote)
    }

    /// Push every datagram and clock once after each
    pub fn play(gateway: &mut Gateway, remote: &MemoryLink, stream: &[Vec<u8>]) {
        for datagram in stream {
            remote.push(datagram);
            gateway.clock(5);
        }
    }

    pub fn dmr_packets(remote: &MemoryLink) -> Vec<dmr::Packet> {
        remote
            .drain()
            .iter()
            .map(|d| dmr::Packet::parse(d).unwrap())
            .collect()
    }

    /// `from` network feeding a DMR target on slot 1, repeater 3100000
    pub fn to_dmr(from: Network, data: Data, dmr: Endpoint) -> Gateway {
        Gateway::new(from, vec![Network::Dmr(DmrNetwork::new(dmr, 3_100_000, 1))], data)
    }

    pub fn voice_ambe(packets: &[dmr::Packet]) -> Vec<[[u8; 9]; 3]> {
        packets
            .iter()
            .filter(|p| p.is_voice())
            .map(|p| dmr::extract_ambe(&p.burst))
            .collect()
    }

    pub fn dstar_packets(remote: &MemoryLink) -> Vec<dstar::Packet> {
        remote
            .drain()
            .iter()
            .map(|d| dstar::parse(d).unwrap())
            .collect()
    }
}

// ============================================================================
// Classification Tests
// ============================================================================

mod classification_tests {
    use super::*;

    #[test]
    fn first_matching_mode_in_priority_order_wins() {
        let mut tables = RouteTables::new();
        tables.add(Destination::dstar("ALL"), Destination::Ysf { dg_id: 10 });
        tables.add(Destination::dstar("ALL"), Destination::Dmr { slot: 2, tg: 91 });
        let mut data = Data::new(Mode::DStar, vec![Mode::Ysf, Mode::Dmr], tables)
            .with_dmr_lookup(helpers::dmr_ids())
            .with_transcoder(Box::new(VirtualTranscoder::new()));

        assert_eq!(data.set_dstar("N0CALL", "ALL"), Some(Mode::Dmr));
        let route = data.route().unwrap();
        assert_eq!(route.dst, Destination::Dmr { slot: 2, tg: 91 });
        assert!(route.group);
    }

    #[test]
    fn destination_match_ignores_case_and_padding() {
        let mut tables = RouteTables::new();
        tables.add(Destination::dstar("testbm"), Destination::Dmr { slot: 1, tg: 9 });
        let mut data = Data::new(Mode::DStar, vec![Mode::Dmr], tables)
            .with_dmr_lookup(helpers::dmr_ids())
            .with_transcoder(Box::new(VirtualTranscoder::new()));

        assert_eq!(data.set_dstar("N0CALL  B", "TESTBM  "), Some(Mode::Dmr));
        assert_eq!(data.route().unwrap().src_callsign, "N0CALL");
    }

    #[test]
    fn unrouted_destination_is_dropped() {
        let mut tables = RouteTables::new();
        tables.add(Destination::dstar("TESTBM"), Destination::Dmr { slot: 1, tg: 9 });
        let mut data = Data::new(Mode::DStar, vec![Mode::Dmr, Mode::DStar], tables)
            .with_dmr_lookup(helpers::dmr_ids());

        assert_eq!(data.set_dstar("N0CALL", "CQCQCQ"), None);
        assert!(data.route().is_none());
    }

    #[test]
    fn table_for_missing_target_is_skipped() {
        let mut tables = RouteTables::new();
        tables.add(Destination::Dmr { slot: 1, tg: 9 }, Destination::P25 { tg: 9 });
        let mut data = Data::new(Mode::Dmr, vec![Mode::Nxdn], tables)
            .with_transcoder(Box::new(VirtualTranscoder::new()));

        assert_eq!(data.set_dmr(1, 1_234_567, 9, true), None);
    }

    #[test]
    fn conversion_selected_from_both_vocoders() {
        let mut tables = RouteTables::new();
        tables.add(Destination::Ysf { dg_id: 0 }, Destination::P25 { tg: 10_100 });
        let (transcoder, log) = VirtualTranscoder::with_log();
        let mut data = Data::new(Mode::Ysf, vec![Mode::P25], tables)
            .with_dmr_lookup(helpers::dmr_ids())
            .with_transcoder(Box::new(transcoder));

        assert_eq!(data.set_ysf("K1ABC", 0), Some(Mode::P25));
        assert_eq!(data.route().unwrap().src_id, 2_345_678);
        assert_eq!(log.entries(), vec![(TranscoderMode::YsfDn, TranscoderMode::Imbe)]);

        assert!(data.write_audio(&[5; 13]));
        assert_eq!(data.read_audio(), Some(vec![5; 11]));
    }
}

// ============================================================================
// Identity Tests
// ============================================================================

mod identity_tests {
    use super::*;

    #[test]
    fn unknown_callsign_cannot_reach_numeric_mode() {
        let mut tables = RouteTables::new();
        tables.add(Destination::dstar("TESTP25"), Destination::P25 { tg: 10_200 });
        let mut data = Data::new(Mode::DStar, vec![Mode::P25], tables)
            .with_dmr_lookup(helpers::dmr_ids())
            .with_transcoder(Box::new(VirtualTranscoder::new()));

        assert_eq!(data.set_dstar("W9XYZ", "TESTP25"), None);
        assert_eq!(data.set_dstar("K1ABC", "TESTP25"), Some(Mode::P25));
    }

    #[test]
    fn dmr_talker_chains_to_nxdn_id() {
        let mut tables = RouteTables::new();
        tables.add(Destination::Dmr { slot: 2, tg: 65 }, Destination::Nxdn { tg: 65 });
        let mut data = Data::new(Mode::Dmr, vec![Mode::Nxdn], tables)
            .with_dmr_lookup(helpers::dmr_ids())
            .with_nxdn_lookup(IdLookup::from_text("4321 N0CALL\n70000 K1ABC\n"))
            .with_transcoder(Box::new(VirtualTranscoder::new()));

        assert_eq!(data.set_dmr(2, 1_234_567, 65, true), Some(Mode::Nxdn));
        assert_eq!(data.route().unwrap().src_id, 4321);
        data.reset();

        // An NXDN ID must fit in 16 bits
        assert_eq!(data.set_dmr(2, 2_345_678, 65, true), None);
    }

    #[test]
    fn dmr_and_p25_share_ids() {
        let mut tables = RouteTables::new();
        tables.add(Destination::P25 { tg: 10_100 }, Destination::Dmr { slot: 2, tg: 3100 });
        let mut data = Data::new(Mode::P25, vec![Mode::Dmr], tables)
            .with_transcoder(Box::new(VirtualTranscoder::new()));

        // No table entry needed when the numbering is the same
        assert_eq!(data.set_p25(7_777_777, 10_100, true), Some(Mode::Dmr));
        assert_eq!(data.route().unwrap().src_id, 7_777_777);
    }

    #[test]
    fn fm_traffic_uses_configured_identity() {
        let mut tables = RouteTables::new();
        tables.add(Destination::Fm, Destination::Dmr { slot: 2, tg: 9 });
        let fm = FmConfig {
            callsign: "N0FM".into(),
            dmr_id: 3_100_042,
            nxdn_id: 42,
        };
        let mut data = Data::new(Mode::Fm, vec![Mode::Dmr], tables)
            .with_fm(fm)
            .with_transcoder(Box::new(VirtualTranscoder::new()));

        assert_eq!(data.set_fm(), Some(Mode::Dmr));
        let route = data.route().unwrap();
        assert_eq!((route.src_callsign.as_str(), route.src_id), ("N0FM", 3_100_042));
    }
}

// ============================================================================
// End-to-End Tests
// ============================================================================

mod end_to_end_tests {
    use super::*;

    #[test]
    fn dstar_transmission_reaches_dmr() {
        let (mut gateway, dstar_remote, dmr_remote) = helpers::dstar_to_dmr();
        let stream = streams::dstar(0x4242, "N0CALL", "TESTBM", 4);
        helpers::play(&mut gateway, &dstar_remote, &stream);

        let packets = helpers::dmr_packets(&dmr_remote);
        let frames: Vec<FrameType> = packets.iter().map(|p| p.frame).collect();
        assert_eq!(
            frames,
            vec![
                FrameType::DataSync {
                    data_type: dmr::DT_VOICE_LC_HEADER
                },
                FrameType::VoiceSync,
                FrameType::Voice { n: 1 },
                FrameType::DataSync {
                    data_type: dmr::DT_TERMINATOR_WITH_LC
                },
            ]
        );

        let header = &packets[0];
        assert_eq!((header.slot, header.dst, header.src), (1, 9, 1_234_567));
        assert!(header.group);
        assert_eq!(header.repeater_id, 3_100_000);
        let lc = lc::decode_full(&header.burst, FullLcKind::VoiceHeader).unwrap();
        assert_eq!((lc.src, lc.dst, lc.group), (1_234_567, 9, true));

        assert_eq!(
            dmr::extract_ambe(&packets[1].burst),
            [[1; 9], [2; 9], [3; 9]]
        );
        let last = dmr::extract_ambe(&packets[2].burst);
        assert_eq!(last[0], [4; 9]);
        assert_ne!(last[1], [4; 9]);

        // One stream id throughout
        assert!(packets.iter().all(|p| p.stream_id == header.stream_id));
        assert!(gateway.data().route().is_none());
    }

    #[test]
    fn dmr_reply_returns_to_dstar() {
        let (mut gateway, dstar_remote, dmr_remote) = helpers::dstar_to_dmr();
        let stream = streams::dmr(0xCAFE, 1, 2_345_678, 9, true, 2);
        helpers::play(&mut gateway, &dmr_remote, &stream);

        let packets = helpers::dstar_packets(&dstar_remote);
        assert_eq!(packets.len(), 1 + 6 + 1);
        match &packets[0] {
            dstar::Packet::Header { header, .. } => {
                assert_eq!(header.my.trimmed(), "K1ABC");
                assert_eq!(header.your.trimmed(), "TESTBM");
                assert_eq!(header.rpt1.trimmed(), "N0GW");
            }
            other => panic!("expected a header, got {other:?}"),
        }
        match &packets[7] {
            dstar::Packet::Data { end, ambe, .. } => {
                assert!(*end);
                assert_eq!(*ambe, dstar::NULL_AMBE);
            }
            other => panic!("expected the end frame, got {other:?}"),
        }
        assert!(gateway.data().route().is_none());
    }

    #[test]
    fn unknown_dmr_talker_is_not_sent_to_dstar() {
        let (mut gateway, dstar_remote, dmr_remote) = helpers::dstar_to_dmr();
        let stream = streams::dmr(0xCAFE, 1, 999, 9, true, 2);
        helpers::play(&mut gateway, &dmr_remote, &stream);

        assert!(dstar_remote.drain().is_empty());
        assert!(gateway.data().route().is_none());
    }

    #[test]
    fn second_stream_waits_for_the_first() {
        let (mut gateway, dstar_remote, dmr_remote) = helpers::dstar_to_dmr();
        let dstar_stream = streams::dstar(0x0101, "N0CALL", "TESTBM", 4);
        let dmr_stream = streams::dmr(0x0202, 1, 2_345_678, 9, true, 1);

        // D-Star keys up first; the DMR reply arrives mid-stream
        helpers::play(&mut gateway, &dstar_remote, &dstar_stream[..2]);
        helpers::play(&mut gateway, &dmr_remote, &dmr_stream[..2]);
        helpers::play(&mut gateway, &dstar_remote, &dstar_stream[2..]);

        assert!(dstar_remote.drain().is_empty());
        let packets = helpers::dmr_packets(&dmr_remote);
        assert_eq!(packets.len(), 4);
        assert!(packets.iter().all(|p| p.src == 1_234_567));
    }

    #[test]
    fn watchdog_ends_silent_stream() {
        let (mut gateway, dstar_remote, dmr_remote) = helpers::dstar_to_dmr();
        let stream = streams::dstar(0x0303, "N0CALL", "TESTBM", 10);
        // Header and two frames, then the radio vanishes
        helpers::play(&mut gateway, &dstar_remote, &stream[..3]);
        assert!(gateway.data().route().is_some());

        gateway.clock(1000);
        assert!(gateway.data().route().is_some());
        gateway.clock(600);
        assert!(gateway.data().route().is_none());

        let packets = helpers::dmr_packets(&dmr_remote);
        assert_eq!(packets.len(), 3);
        assert_eq!(
            packets[2].frame,
            FrameType::DataSync {
                data_type: dmr::DT_TERMINATOR_WITH_LC
            }
        );
    }

    #[test]
    fn watchdog_ignores_traffic_it_cannot_route() {
        let (mut gateway, dstar_remote, dmr_remote) = helpers::dstar_to_dmr();
        let stream = streams::dstar(0x0606, "N0CALL", "TESTBM", 10);
        helpers::play(&mut gateway, &dstar_remote, &stream[..3]);
        assert!(gateway.data().route().is_some());

        // The D-Star side goes quiet while DMR keeps talking to an unrouted TG
        let busy = streams::dmr(0x0707, 1, 2_345_678, 91, true, 18);
        for (i, datagram) in busy.iter().enumerate() {
            dmr_remote.push(datagram);
            gateway.clock(100);
            if i == 9 {
                assert!(gateway.data().route().is_some());
            }
        }
        assert!(gateway.data().route().is_none());

        assert!(dstar_remote.drain().is_empty());
        let packets = helpers::dmr_packets(&dmr_remote);
        assert_eq!(packets.len(), 3);
        assert_eq!(
            packets[2].frame,
            FrameType::DataSync {
                data_type: dmr::DT_TERMINATOR_WITH_LC
            }
        );
    }

    #[test]
    fn fm_audio_reaches_m17() {
        let mut tables = RouteTables::new();
        tables.add(Destination::Fm, Destination::m17("ALL"));
        let (transcoder, log) = VirtualTranscoder::with_log();
        let data = Data::new(Mode::Fm, vec![Mode::M17], tables)
            .with_fm(FmConfig {
                callsign: "N0FM".into(),
                dmr_id: 0,
                nxdn_id: 0,
            })
            .with_transcoder(Box::new(transcoder));

        let (fm_endpoint, fm_remote) = helpers::connect("FM", 34001);
        let (m17_endpoint, m17_remote) = helpers::connect("M17", 17000);
        let mut gateway = Gateway::new(
            Network::Fm(FmNetwork::new(fm_endpoint)),
            vec![Network::M17(M17Network::new(m17_endpoint, "N0GW"))],
            data,
        );
        helpers::play(&mut gateway, &fm_remote, &streams::fm(4));

        assert_eq!(log.entries(), vec![(TranscoderMode::Pcm, TranscoderMode::Codec2_3200)]);
        let packets: Vec<m17::Packet> = m17_remote
            .drain()
            .iter()
            .map(|d| m17::Packet::parse(d).unwrap())
            .collect();
        assert_eq!(packets.len(), 3);
        assert_eq!(packets[0].lich.src_callsign().as_deref(), Some("N0FM"));
        let pcm = fm::samples_to_pcm(&[100; fm::SAMPLES_PER_FRAME]);
        assert_eq!(packets[0].payload[..8], pcm[..8]);
        assert!(!packets[1].end);
        assert!(packets[2].end);
        assert!(packets.iter().all(|p| p.stream_id == packets[0].stream_id));
    }

    #[test]
    fn datagrams_from_strangers_are_ignored() {
        let (local, dstar_remote) = MemoryLink::pair(helpers::addr(20010), helpers::addr(20011));
        let handle = local.clone();
        let dstar = Endpoint::new(Box::new(local), dstar_remote.local_addr(), "D-Star", false);
        let (dmr, dmr_remote) = helpers::connect("DMR", 62030);
        let mut gateway = helpers::gateway(dstar, dmr);

        let stranger = helpers::addr(9999);
        for datagram in streams::dstar(0x0404, "N0CALL", "TESTBM", 2) {
            handle.inject(&datagram, stranger);
            gateway.clock(5);
        }
        assert!(dmr_remote.drain().is_empty());
        assert!(gateway.data().route().is_none());
    }
}

// ============================================================================
// System Fusion Tag Tests
// ============================================================================

mod ysf_tag_tests {
    use super::*;

    fn passthrough() -> Data {
        Data::new(Mode::Ysf, vec![Mode::Ysf], RouteTables::new()).with_passthrough(true)
    }

    #[test]
    fn first_tag_locks_out_others() {
        let (endpoint, remote) = helpers::connect("System Fusion", 42000);
        let mut network = YsfNetwork::new(endpoint, "N0GW");
        let mut data = passthrough();

        remote.push(&streams::ysf("GW-A", "N0CALL", 0, 1)[0]);
        network.clock(5);
        remote.push(&streams::ysf("GW-B", "K1ABC", 0, 1)[0]);
        network.clock(5);

        assert_eq!(network.tag().map(|t| t.trimmed()).as_deref(), Some("GW-A"));
        assert!(network.read(&mut data));
        assert!(!network.has_data());
        assert_eq!(data.route().unwrap().src_callsign, "N0CALL");
    }

    #[test]
    fn reset_releases_the_lock() {
        let (endpoint, remote) = helpers::connect("System Fusion", 42010);
        let mut network = YsfNetwork::new(endpoint, "N0GW");

        remote.push(&streams::ysf("GW-A", "N0CALL", 0, 1)[0]);
        network.clock(5);
        network.reset();
        assert_eq!(network.tag(), None);
        assert!(!network.has_data());

        remote.push(&streams::ysf("GW-B", "K1ABC", 0, 1)[0]);
        network.clock(5);
        assert_eq!(network.tag().map(|t| t.trimmed()).as_deref(), Some("GW-B"));
        assert!(network.has_data());
    }

    /// System Fusion from-network with DG-ID 10 routed to DMR TG 9
    fn ysf_to_dmr(port: u16) -> (Gateway, MemoryLink, MemoryLink) {
        let mut tables = RouteTables::new();
        tables.add(Destination::Ysf { dg_id: 10 }, Destination::Dmr { slot: 1, tg: 9 });
        let data = Data::new(Mode::Ysf, vec![Mode::Dmr], tables)
            .with_dmr_lookup(helpers::dmr_ids())
            .with_transcoder(Box::new(VirtualTranscoder::new()));
        let (ysf, ysf_remote) = helpers::connect("System Fusion", port);
        let (dmr, dmr_remote) = helpers::connect("DMR", port + 100);
        let gateway = helpers::to_dmr(Network::Ysf(YsfNetwork::new(ysf, "N0GW")), data, dmr);
        (gateway, ysf_remote, dmr_remote)
    }

    fn assert_reached_dmr(dmr_remote: &MemoryLink) {
        let packets = helpers::dmr_packets(dmr_remote);
        assert_eq!(packets.len(), 2 + 10usize.div_ceil(3));
        assert_eq!((packets[0].dst, packets[0].src), (9, 2_345_678));
    }

    #[test]
    fn unrouted_stream_end_releases_the_tag() {
        let (mut gateway, ysf_remote, dmr_remote) = ysf_to_dmr(42030);

        helpers::play(&mut gateway, &ysf_remote, &streams::ysf("GW-A", "N0CALL", 0, 2));
        assert!(gateway.data().route().is_none());
        assert!(dmr_remote.drain().is_empty());

        helpers::play(&mut gateway, &ysf_remote, &streams::ysf("GW-B", "K1ABC", 10, 2));
        assert_reached_dmr(&dmr_remote);
    }

    #[test]
    fn silent_tag_is_released() {
        let (mut gateway, ysf_remote, dmr_remote) = ysf_to_dmr(42040);

        // GW-A vanishes after its header
        helpers::play(&mut gateway, &ysf_remote, &streams::ysf("GW-A", "N0CALL", 0, 2)[..1]);
        let gw_b = streams::ysf("GW-B", "K1ABC", 10, 2);
        helpers::play(&mut gateway, &ysf_remote, &gw_b[..1]);
        assert!(dmr_remote.drain().is_empty());

        gateway.clock(1600);
        helpers::play(&mut gateway, &ysf_remote, &gw_b);
        assert_reached_dmr(&dmr_remote);
    }

    #[test]
    fn whole_transmission_passes_through() {
        let (endpoint, remote) = helpers::connect("System Fusion", 42020);
        let mut network = YsfNetwork::new(endpoint, "N0GW");
        let mut data = passthrough();

        for datagram in streams::ysf("GW-A", "N0CALL", 20, 2) {
            remote.push(&datagram);
            network.clock(5);
            assert!(network.read(&mut data));
        }
        assert_eq!(data.route().unwrap().dst, Destination::Ysf { dg_id: 20 });
        assert_eq!(data.direction(), Direction::FromNetwork);

        let mut blocks = Vec::new();
        while let Some(block) = data.read_audio() {
            blocks.push(block);
        }
        assert_eq!(blocks.len(), 10);
        assert_eq!(blocks[9], vec![10; 13]);
        assert!(data.is_end());
    }
}

// ============================================================================
// Adapter Tests
// ============================================================================

mod adapter_tests {
    use super::*;

    fn p25_gateway(to: Vec<Network>, tables: RouteTables, passthrough: bool) -> (Gateway, MemoryLink) {
        let (p25, p25_remote) = helpers::connect("P25", 41000);
        let data = Data::new(Mode::P25, to.iter().map(Network::mode).collect(), tables)
            .with_passthrough(passthrough)
            .with_transcoder(Box::new(VirtualTranscoder::new()));
        let gateway = Gateway::new(Network::P25(P25Network::new(p25, "N0GW")), to, data);
        (gateway, p25_remote)
    }

    #[test]
    fn p25_call_reaches_dmr() {
        let mut tables = RouteTables::new();
        tables.add(Destination::P25 { tg: 10_100 }, Destination::Dmr { slot: 2, tg: 91 });
        let (dmr, dmr_remote) = helpers::connect("DMR", 62040);
        let to = vec![Network::Dmr(DmrNetwork::new(dmr, 3_100_000, 1))];
        let (mut gateway, p25_remote) = p25_gateway(to, tables, false);

        helpers::play(&mut gateway, &p25_remote, &streams::p25(1_234_567, 10_100, true, 1));

        // Audio starts with the source record, the fifth of the LDU1
        let packets = helpers::dmr_packets(&dmr_remote);
        assert_eq!(packets.len(), 2 + 14usize.div_ceil(3));
        let header = &packets[0];
        assert_eq!((header.slot, header.src, header.dst), (2, 1_234_567, 91));
        assert!(header.group);
        assert_eq!(helpers::voice_ambe(&packets)[0], [[5; 9], [6; 9], [7; 9]]);
        assert_eq!(
            packets.last().unwrap().frame,
            FrameType::DataSync {
                data_type: dmr::DT_TERMINATOR_WITH_LC
            }
        );
        assert!(gateway.data().route().is_none());
    }

    #[test]
    fn p25_passthrough_keeps_data_records() {
        let (target, target_remote) = helpers::connect("P25 target", 41010);
        let to = vec![Network::P25(P25Network::new(target, "N0GW"))];
        let (mut gateway, p25_remote) = p25_gateway(to, RouteTables::new(), true);

        let mut stream = streams::p25(1_234_567, 10_100, true, 1);
        let data_record = vec![0xA1, 0x01, 0x02, 0x03];
        stream.insert(6, data_record.clone());
        helpers::play(&mut gateway, &p25_remote, &stream);

        let out = target_remote.drain();
        assert_eq!(out.len(), 14 + 1 + 1);
        assert_eq!(out[2], data_record);
        assert_eq!(
            p25::Record::parse(&out[3]).unwrap(),
            p25::Record::Voice {
                record: 0x64,
                imbe: [7; p25::IMBE_LEN],
                control: Some(p25::Control::Lcf { group: true }),
            }
        );
        match p25::Record::parse(&out[4]).unwrap() {
            p25::Record::Voice { control, .. } => {
                assert_eq!(control, Some(p25::Control::Destination(10_100)));
            }
            other => panic!("expected a voice record, got {other:?}"),
        }
        match p25::Record::parse(&out[5]).unwrap() {
            p25::Record::Voice { control, .. } => {
                assert_eq!(control, Some(p25::Control::Source(1_234_567)));
            }
            other => panic!("expected a voice record, got {other:?}"),
        }
        assert_eq!(p25::Record::parse(&out[15]).unwrap(), p25::Record::End);
    }

    fn nxdn_to_dmr(port: u16) -> (Gateway, MemoryLink, MemoryLink) {
        let mut tables = RouteTables::new();
        tables.add(Destination::Nxdn { tg: 65 }, Destination::Dmr { slot: 1, tg: 9 });
        let data = Data::new(Mode::Nxdn, vec![Mode::Dmr], tables)
            .with_dmr_lookup(helpers::dmr_ids())
            .with_nxdn_lookup(IdLookup::from_text("4321 N0CALL\n"));
        let (nxdn, nxdn_remote) = helpers::connect("NXDN", port);
        let (dmr, dmr_remote) = helpers::connect("DMR", port + 100);
        let gateway = helpers::to_dmr(Network::Nxdn(NxdnNetwork::new(nxdn, 1)), data, dmr);
        (gateway, nxdn_remote, dmr_remote)
    }

    #[test]
    fn nxdn_call_reaches_dmr() {
        let (mut gateway, nxdn_remote, dmr_remote) = nxdn_to_dmr(41400);
        helpers::play(&mut gateway, &nxdn_remote, &streams::nxdn(4321, 65, true, 4));

        let packets = helpers::dmr_packets(&dmr_remote);
        assert_eq!(packets.len(), 2 + 16usize.div_ceil(3));
        assert_eq!((packets[0].src, packets[0].dst), (1_234_567, 9));
        let voice = helpers::voice_ambe(&packets);
        assert_eq!(voice[0], [[1; 9], [2; 9], [3; 9]]);
        assert_eq!(voice[5][0], [16; 9]);
        assert!(gateway.data().route().is_none());
    }

    #[test]
    fn nxdn_late_entry_waits_for_the_whole_sacch() {
        let (mut gateway, nxdn_remote, dmr_remote) = nxdn_to_dmr(41410);
        let stream = streams::nxdn(4321, 65, true, 6);

        // Header missed; frames 0 to 3 spell out the VCALL
        helpers::play(&mut gateway, &nxdn_remote, &stream[1..4]);
        assert!(gateway.data().route().is_none());
        helpers::play(&mut gateway, &nxdn_remote, &stream[4..]);

        let packets = helpers::dmr_packets(&dmr_remote);
        assert_eq!(packets.len(), 2 + 12usize.div_ceil(3));
        assert_eq!(packets[0].src, 1_234_567);
        assert_eq!(helpers::voice_ambe(&packets)[0], [[13; 9], [14; 9], [15; 9]]);
        assert!(gateway.data().route().is_none());
    }

    #[test]
    fn nxdn_connect_request_is_answered() {
        let (mut gateway, nxdn_remote, dmr_remote) = nxdn_to_dmr(41420);
        let mut request = vec![0u8; nxdn::PACKET_LEN];
        request[..6].copy_from_slice(b"ICOM\x01\x61");
        nxdn_remote.push(&request);
        gateway.clock(5);

        let replies = nxdn_remote.drain();
        assert_eq!(replies.len(), 1);
        assert_eq!(&replies[0][..6], b"ICOM\x01\x60");
        assert!(dmr_remote.drain().is_empty());
        assert!(gateway.data().route().is_none());
    }

    fn m17_to_dmr(port: u16) -> (Gateway, MemoryLink, MemoryLink) {
        let mut tables = RouteTables::new();
        tables.add(Destination::m17("TESTBM"), Destination::Dmr { slot: 1, tg: 9 });
        let data = Data::new(Mode::M17, vec![Mode::Dmr], tables)
            .with_dmr_lookup(helpers::dmr_ids())
            .with_transcoder(Box::new(VirtualTranscoder::new()));
        let (m17, m17_remote) = helpers::connect("M17", port);
        let (dmr, dmr_remote) = helpers::connect("DMR", port + 100);
        let gateway = helpers::to_dmr(Network::M17(M17Network::new(m17, "N0GW")), data, dmr);
        (gateway, m17_remote, dmr_remote)
    }

    #[test]
    fn m17_ignores_a_second_stream() {
        let (mut gateway, m17_remote, dmr_remote) = m17_to_dmr(17010);
        let first = streams::m17(0x1111, "N0CALL", "TESTBM", 3).unwrap();
        let second = streams::m17(0x2222, "K1ABC", "TESTBM", 4).unwrap();

        let interleaved = [
            first[0].clone(),
            second[0].clone(),
            first[1].clone(),
            second[1].clone(),
            first[2].clone(),
        ];
        helpers::play(&mut gateway, &m17_remote, &interleaved);

        let packets = helpers::dmr_packets(&dmr_remote);
        assert_eq!(packets.len(), 2 + 2);
        assert_eq!(packets[0].src, 1_234_567);
        assert_eq!(
            helpers::voice_ambe(&packets),
            vec![[[1; 9], [2; 9], [3; 9]], [[4; 9], [5; 9], [6; 9]]]
        );
        assert!(gateway.data().route().is_none());
    }

    #[test]
    fn m17_late_entry_from_any_packet() {
        let (mut gateway, m17_remote, dmr_remote) = m17_to_dmr(17020);
        let stream = streams::m17(0x3333, "N0CALL", "TESTBM", 3).unwrap();
        helpers::play(&mut gateway, &m17_remote, &stream[1..]);

        let packets = helpers::dmr_packets(&dmr_remote);
        assert_eq!(packets.len(), 2 + 2);
        assert_eq!((packets[0].src, packets[0].dst), (1_234_567, 9));
        assert_eq!(helpers::voice_ambe(&packets)[0], [[3; 9], [4; 9], [5; 9]]);
    }
}

// ============================================================================
// Runtime Tests
// ============================================================================

mod runtime_tests {
    use super::*;
    use std::time::Duration;

    use dv_gateway::GatewayCommand;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn running_gateway_forwards_and_shuts_down() {
        let (gateway, dstar_remote, dmr_remote) = helpers::dstar_to_dmr();
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let task = tokio::spawn(gateway.run(cmd_rx));

        for datagram in streams::dstar(0x7070, "N0CALL", "TESTBM", 4) {
            dstar_remote.push(&datagram);
        }
        cmd_tx.send(GatewayCommand::Reload).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        cmd_tx.send(GatewayCommand::Shutdown).await.unwrap();
        task.await.unwrap();

        let packets = helpers::dmr_packets(&dmr_remote);
        assert_eq!(packets.len(), 4);
        assert_eq!(
            packets[3].frame,
            FrameType::DataSync {
                data_type: dmr::DT_TERMINATOR_WITH_LC
            }
        );
    }

    #[tokio::test]
    async fn dropping_the_sender_stops_the_loop() {
        let (gateway, _dstar_remote, _dmr_remote) = helpers::dstar_to_dmr();
        let (cmd_tx, cmd_rx) = mpsc::channel(1);
        let task = tokio::spawn(gateway.run(cmd_rx));
        drop(cmd_tx);
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("loop should end")
            .unwrap();
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    fn callsign() -> impl Strategy<Value = String> {
        "[A-Z][A-Z0-9]{2,6}"
    }

    proptest! {
        #[test]
        fn reverse_lookup_inverts_forward(cs in callsign(), slot in 1u8..=2, tg in 1u32..16_000_000) {
            let mut tables = RouteTables::new();
            let dstar = Destination::dstar(&cs);
            let dmr = Destination::Dmr { slot, tg };
            tables.add(dstar.clone(), dmr.clone());

            prop_assert_eq!(tables.lookup_forward(Mode::Dmr, &dstar), Some(&dmr));
            prop_assert_eq!(tables.lookup_reverse(Mode::DStar, &dmr), Some(&dstar));
        }

        #[test]
        fn every_frame_reaches_dmr(frames in 1usize..40) {
            let (mut gateway, dstar_remote, dmr_remote) = helpers::dstar_to_dmr();
            helpers::play(&mut gateway, &dstar_remote, &streams::dstar(0x0505, "N0CALL", "TESTBM", frames));

            let packets = helpers::dmr_packets(&dmr_remote);
            prop_assert_eq!(packets.len(), 2 + frames.div_ceil(3));
            let voice = packets.iter().filter(|p| p.is_voice()).count();
            prop_assert_eq!(voice, frames.div_ceil(3));
            prop_assert!(gateway.data().route().is_none());
        }
    }
}
