// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cross-layer decode, checksum and mutation scenarios.

use pktseg::checksum::{self, PseudoHeader};
use pktseg::error::PacketError;
use pktseg::layers::igmp::{IgmpType, Igmpv2, Igmpv2Ref, IGMP_HEADER_LEN};
use pktseg::layers::ip::{Ipv4, Ipv4Ref, Ipv6, Ipv6Ext, Ipv6ExtKind, Ipv6Ref, PROTO_TCP};
use pktseg::layers::lldp::{Lldp, LldpTlv, ManagementAddress};
use pktseg::layers::tcp::{Tcp, TcpOption, TcpOptions, TcpRef};
use pktseg::layers::{parse, LinkType, Raw};
use pktseg::prelude::*;

use std::net::{Ipv4Addr, Ipv6Addr};

/// IPv4 + TCP SYN carrying one MSS option, checksums filled in with the
/// crate's own engine.
fn tcp_syn_capture() -> Vec<u8> {
    let src = Ipv4Addr::new(192, 168, 0, 1);
    let dst = Ipv4Addr::new(192, 168, 0, 2);

    let mut bytes = vec![
        0x45, 0x00, 0x00, 0x2C, // IHL 5, total length 44
        0x00, 0x01, 0x00, 0x00, // id, no flags
        0x40, 0x06, 0x00, 0x00, // ttl 64, TCP, checksum placeholder
    ];
    bytes.extend(src.octets());
    bytes.extend(dst.octets());
    let ip_ck = checksum::checksum(&bytes[..20]);
    bytes[10..12].copy_from_slice(&ip_ck.to_be_bytes());

    let tcp_start = bytes.len();
    bytes.extend_from_slice(&[
        0xC0, 0x00, 0x00, 0x50, // 49152 -> 80
        0x12, 0x34, 0x56, 0x78, // seq
        0x00, 0x00, 0x00, 0x00, // ack
        0x60, 0x02, 0x20, 0x00, // data offset 6, SYN, window
        0x00, 0x00, 0x00, 0x00, // checksum placeholder, urgent
        0x02, 0x04, 0x05, 0xB4, // MSS 1460
    ]);
    let pseudo = PseudoHeader::V4 {
        src,
        dst,
        protocol: PROTO_TCP,
        len: (bytes.len() - tcp_start) as u16,
    };
    let tcp_ck = pseudo.checksum_of(&bytes[tcp_start..]);
    bytes[tcp_start + 16..tcp_start + 18].copy_from_slice(&tcp_ck.to_be_bytes());

    bytes
}

#[test]
fn tcp_syn_two_layer_decode() {
    let bytes = tcp_syn_capture();
    let ipv4 = Ipv4::from_bytes(&bytes).unwrap();

    let tcp = ipv4.get_layer::<Tcp>().expect("TCP layer expected");
    assert!(tcp.flags().syn());
    assert!(!tcp.flags().ack());
    assert_eq!(tcp.sport(), 49152);
    assert_eq!(tcp.dport(), 80);
    assert_eq!(tcp.seq(), 0x12345678);
    assert_eq!(tcp.options().options(), &[TcpOption::Mss(1460)]);

    let ip_view = Ipv4Ref::from_bytes(&bytes).unwrap();
    assert!(ip_view.chksum_valid());
    let tcp_view = TcpRef::from_bytes(ip_view.payload_segment().as_slice()).unwrap();
    assert!(tcp_view.chksum_valid(&ip_view.pseudo_header()));
}

#[test]
fn tcp_syn_round_trips_and_recomputes() {
    let bytes = tcp_syn_capture();
    let mut ipv4 = Ipv4::from_bytes(&bytes).unwrap();
    assert_eq!(ipv4.to_bytes(), bytes);

    // Recomputing both checksums from scratch reproduces the originals.
    ipv4.clear_chksum();
    ipv4.get_layer_mut::<Tcp>().unwrap().clear_chksum();
    assert_eq!(ipv4.to_bytes(), bytes);
}

#[test]
fn igmpv2_membership_report_decode() {
    let bytes = [0x16, 0x64, 0x09, 0x9A, 0xE0, 0x00, 0x00, 0x01];
    let igmp = Igmpv2::from_bytes(&bytes).unwrap();
    assert_eq!(igmp.msg_type(), IgmpType::MembershipReportV2);
    assert_eq!(igmp.max_resp_time_secs(), 10.0);
    assert_eq!(igmp.group(), Ipv4Addr::new(224, 0, 0, 1));
    assert_eq!(igmp.len(), IGMP_HEADER_LEN);
    assert!(Igmpv2Ref::from_bytes(&bytes).unwrap().chksum_valid());
}

#[test]
fn lldp_management_oid_resize() {
    let mut lldp = Lldp::new([0x02; 6], b"ge-0/0/1", 120);
    lldp.push_tlv(LldpTlv::ManagementAddress(
        ManagementAddress::new(1, vec![10, 0, 0, 1], 2, 3).unwrap(),
    ));
    lldp.push_tlv(LldpTlv::SystemName(b"edge".to_vec()));
    let before = lldp.to_bytes();

    lldp.management_address_mut()
        .unwrap()
        .set_oid(b"1.3.6.1.4.1")
        .unwrap();
    let after = lldp.to_bytes();

    assert_eq!(lldp.management_address().unwrap().oid_len(), 11);
    assert_eq!(after.len(), before.len() + 11);
    // Reparsing the mutated buffer yields a structurally identical unit.
    let reparsed = Lldp::from_bytes(&after).unwrap();
    assert_eq!(reparsed.tlvs(), lldp.tlvs());
    assert_eq!(reparsed.system_name().unwrap(), b"edge");
}

#[test]
fn tcp_option_noop_padding_walk() {
    let bytes = [0x01, 0x01, 0x02, 0x04, 0x05, 0xB4, 0x00];
    let options = TcpOptions::from_bytes(&bytes).unwrap();
    assert_eq!(
        options.options(),
        &[
            TcpOption::Noop,
            TcpOption::Noop,
            TcpOption::Mss(1460),
            TcpOption::Eool,
        ]
    );
}

/// IPv6 / Fragment / TCP, the TCP checksum primed from the IPv6 addresses
/// rather than the fragment extension.
fn ipv6_fragment_tcp_capture() -> Vec<u8> {
    let src = Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1);
    let dst = Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 2);

    let tcp = [
        0xC0, 0x00, 0x01, 0xBB, // 49152 -> 443
        0x00, 0x00, 0x00, 0x01, // seq
        0x00, 0x00, 0x00, 0x00, // ack
        0x50, 0x02, 0x10, 0x00, // data offset 5, SYN
        0x00, 0x00, 0x00, 0x00, // checksum placeholder, urgent
    ];

    let mut bytes = vec![
        0x60, 0x00, 0x00, 0x00, // version 6
        0x00, 0x1C, 44, 64, // payload length 28, next header Fragment
    ];
    bytes.extend(src.octets());
    bytes.extend(dst.octets());
    // Fragment: next header TCP, offset 0, last fragment, id 0x77.
    bytes.extend([PROTO_TCP, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x77]);

    let tcp_start = bytes.len();
    bytes.extend(tcp);
    let pseudo = PseudoHeader::V6 {
        src,
        dst,
        next_header: PROTO_TCP,
        len: tcp.len() as u32,
    };
    let tcp_ck = pseudo.checksum_of(&bytes[tcp_start..]);
    bytes[tcp_start + 16..tcp_start + 18].copy_from_slice(&tcp_ck.to_be_bytes());

    bytes
}

#[test]
fn ipv6_next_header_chain_three_layer_decode() {
    let bytes = ipv6_fragment_tcp_capture();
    let ipv6 = Ipv6::from_bytes(&bytes).unwrap();

    let ext = ipv6.get_layer::<Ipv6Ext>().expect("fragment header expected");
    assert_eq!(ext.kind(), Ipv6ExtKind::Fragment);
    assert_eq!(ext.next_header(), PROTO_TCP);
    assert_eq!(ext.identification(), 0x77);

    let tcp = ipv6.get_layer::<Tcp>().expect("TCP layer expected");
    assert_eq!(tcp.dport(), 443);

    // The checksum validates against the IPv6 pseudo-header, not the
    // fragment extension.
    let ip_view = Ipv6Ref::from_bytes(&bytes).unwrap();
    let tcp_bytes = &bytes[40 + 8..];
    let tcp_view = TcpRef::from_bytes(tcp_bytes).unwrap();
    let pseudo = ip_view.pseudo_header_for(PROTO_TCP, tcp_bytes.len() as u32);
    assert!(tcp_view.chksum_valid(&pseudo));
}

#[test]
fn ipv6_chain_checksum_recomputes_through_the_extension() {
    let bytes = ipv6_fragment_tcp_capture();
    let mut ipv6 = Ipv6::from_bytes(&bytes).unwrap();
    assert_eq!(ipv6.to_bytes(), bytes);

    // The extension forwards the IPv6 pseudo-header to the TCP layer, so a
    // from-scratch recompute lands on the wire value.
    ipv6.get_layer_mut::<Tcp>().unwrap().clear_chksum();
    assert_eq!(ipv6.to_bytes(), bytes);
}

#[test]
fn truncation_is_rejected_with_counts() {
    let mut bytes = tcp_syn_capture();
    bytes.truncate(40);
    bytes[2..4].copy_from_slice(&100u16.to_be_bytes());
    match Ipv4::from_bytes(&bytes) {
        Err(PacketError::Truncated { layer, need, have }) => {
            assert_eq!(layer, "Ipv4");
            assert_eq!(need, 100);
            assert_eq!(have, 40);
        }
        other => panic!("expected Truncated, got {:?}", other),
    }
}

#[test]
fn format_walks_the_chain() {
    let bytes = tcp_syn_capture();
    let packet = parse(LinkType::Ipv4, &bytes).unwrap();
    let rendered = packet.format(true, false);
    assert!(rendered.contains("Ipv4"));
    assert!(rendered.contains("Tcp"));
    // Styling is left to external formatters; the flag never introduces
    // escape sequences.
    assert_eq!(packet.format(true, true), rendered);
    assert!(!rendered.contains('\x1b'));
}

#[test]
fn field_mutation_is_isolated() {
    let mut bytes = tcp_syn_capture();
    let original = bytes.clone();
    {
        let mut view = pktseg::layers::ip::Ipv4Mut::from_bytes(&mut bytes).unwrap();
        view.set_ttl(7);
    }
    assert_eq!(bytes[8], 7);
    bytes[8] = original[8];
    assert_eq!(bytes, original);
}

#[test]
fn unknown_dispatch_keys_round_trip() {
    // An unknown transport protocol rides as Raw through a reparse.
    let mut bytes = tcp_syn_capture();
    bytes[9] = 0xFD;
    bytes[10..12].copy_from_slice(&[0, 0]);
    let ck = checksum::checksum(&bytes[..20]);
    bytes[10..12].copy_from_slice(&ck.to_be_bytes());

    let ipv4 = Ipv4::from_bytes(&bytes).unwrap();
    assert!(ipv4.get_layer::<Raw>().is_some());
    assert!(ipv4.get_layer::<Tcp>().is_none());
    assert_eq!(ipv4.to_bytes(), bytes);
}
