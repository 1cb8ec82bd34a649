use super::*;
use crate::arp::{ArpSpoofConfig, ArpSpoofEngine};
use crate::targets::Target;
use crate::testing::{harness, Harness, OWN_MAC};
use netspoof_core::{Engine, Error, Forwarding, MacAddr};
use netspoof_packet::icmpv6::{NdOption, NdOptionType, ALL_NODES};
use netspoof_packet::{EtherType, EthernetFrame, Icmpv6Message, IpProtocol, Ipv6Packet, PseudoHeader};
use std::collections::HashSet;
use std::net::Ipv6Addr;
use std::time::Duration;

const TABLE: &str = "\
fe80::2 dev eth0 lladdr bb:bb:bb:bb:bb:bb REACHABLE
10.0.0.2 dev eth0 lladdr bb:bb:bb:bb:bb:bb REACHABLE
fe80::3 dev eth0 lladdr cc:cc:cc:cc:cc:cc STALE
fe80::4 dev eth0 lladdr dd:dd:dd:dd:dd:dd REACHABLE
";

const VICTIM_MAC: MacAddr = MacAddr([0xbb; 6]);

fn v6(s: &str) -> Ipv6Addr {
    s.parse().unwrap()
}

/// Take an ND frame apart, checking the fields every ND message shares
fn decode(frame: &[u8]) -> (EthernetFrame, Ipv6Packet, Icmpv6Message) {
    let eth = EthernetFrame::from_bytes(frame).unwrap();
    assert_eq!(eth.ethertype, EtherType::IPv6);
    let ip = Ipv6Packet::from_bytes(&eth.payload).unwrap();
    assert_eq!(ip.next_header, IpProtocol::ICMPv6);
    assert_eq!(ip.hop_limit, 255);

    let pseudo = PseudoHeader::V6 {
        source: ip.source,
        destination: ip.destination,
    };
    assert_eq!(pseudo.checksum(58, &ip.payload), 0);

    let icmp = Icmpv6Message::from_bytes(&ip.payload).unwrap();
    (eth, ip, icmp)
}

fn engine(h: &Harness, config: NdpSpoofConfig) -> NdpSpoofEngine {
    NdpSpoofEngine::new(h.ctx.clone(), config)
}

#[test]
fn test_router_advertisement_layout() {
    let frame = router_advertisement_frame(OWN_MAC, v6("fe80::5"), DEFAULT_PREFIX, 64).unwrap();
    let (eth, ip, icmp) = decode(&frame);

    assert_eq!(eth.source, OWN_MAC);
    assert_eq!(eth.destination, MacAddr::ipv6_all_nodes());
    assert_eq!(ip.source, v6("fe80::5"));
    assert_eq!(ip.destination, ALL_NODES);
    assert_eq!(icmp.icmp_type, 134);

    let (prefix, used) = NdOption::from_bytes(&icmp.body[12..]).unwrap();
    assert_eq!(prefix.option_type, NdOptionType::PrefixInformation);
    assert_eq!(prefix.data[0], 64);
    assert_eq!(
        u32::from_be_bytes([prefix.data[2], prefix.data[3], prefix.data[4], prefix.data[5]]),
        PREFIX_VALID_LIFETIME
    );
    assert_eq!(&prefix.data[14..30], &DEFAULT_PREFIX.octets());

    let (source_ll, _) = NdOption::from_bytes(&icmp.body[12 + used..]).unwrap();
    assert_eq!(source_ll.option_type, NdOptionType::SourceLinkLayerAddress);
    assert_eq!(&source_ll.data[..6], OWN_MAC.as_bytes());
}

#[test]
fn test_neighbor_advertisement_layout() {
    let frame =
        neighbor_advertisement_frame(OWN_MAC, DEFAULT_NEIGHBOUR, VICTIM_MAC, v6("fe80::2")).unwrap();
    let (eth, ip, icmp) = decode(&frame);

    assert_eq!(eth.source, OWN_MAC);
    assert_eq!(eth.destination, VICTIM_MAC);
    assert_eq!(ip.source, DEFAULT_NEIGHBOUR);
    assert_eq!(ip.destination, v6("fe80::2"));
    assert_eq!(icmp.icmp_type, 136);

    // solicited and override, not a router
    assert_eq!(icmp.body[0], 0x60);
    assert_eq!(&icmp.body[4..20], &DEFAULT_NEIGHBOUR.octets());
    let (target_ll, _) = NdOption::from_bytes(&icmp.body[20..]).unwrap();
    assert_eq!(target_ll.option_type, NdOptionType::TargetLinkLayerAddress);
    assert_eq!(&target_ll.data[..6], OWN_MAC.as_bytes());
}

#[tokio::test]
async fn test_start_requires_neighbour_or_prefix() {
    let h = harness(TABLE);
    let ndp = engine(
        &h,
        NdpSpoofConfig::new()
            .with_neighbour(None)
            .with_prefix(None, 64),
    );

    let err = ndp.start().await.unwrap_err();
    assert!(err.is_configuration());
    assert!(!ndp.is_running());
    assert!(!h.forwarding.is_forwarding_enabled());
    assert_eq!(h.sink.count(), 0);
}

#[tokio::test]
async fn test_oversized_prefix_length_rejected() {
    let h = harness(TABLE);
    let ndp = engine(
        &h,
        NdpSpoofConfig::new().with_prefix(Some(DEFAULT_PREFIX), 129),
    );

    assert!(matches!(
        ndp.start().await,
        Err(Error::InvalidParameter { .. })
    ));
    assert!(!ndp.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_tick_sends_ra_and_na_per_target() {
    let h = harness(TABLE);
    h.registry.set_alias(MacAddr([0xdd; 6]), "printer");
    let ndp = engine(
        &h,
        NdpSpoofConfig::new().with_targets(vec![
            Target::Ip("fe80::2".parse().unwrap()),
            Target::Mac(MacAddr([0xcc; 6])),
            Target::Alias("printer".to_string()),
        ]),
    );

    ndp.start().await.unwrap();
    assert!(h.forwarding.is_forwarding_enabled());
    tokio::time::sleep(Duration::from_millis(500)).await;
    ndp.stop().await.unwrap();

    let frames = h.sink.frames();
    assert_eq!(frames.len(), 4);

    let (_, ra, _) = decode(&frames[0]);
    assert_eq!(ra.destination, ALL_NODES);

    let victims: HashSet<(Ipv6Addr, MacAddr)> = frames[1..]
        .iter()
        .map(|frame| {
            let (eth, ip, icmp) = decode(frame);
            assert_eq!(icmp.icmp_type, 136);
            assert_eq!(ip.source, DEFAULT_NEIGHBOUR);
            (ip.destination, eth.destination)
        })
        .collect();
    let expected: HashSet<(Ipv6Addr, MacAddr)> = [
        (v6("fe80::2"), VICTIM_MAC),
        (v6("fe80::3"), MacAddr([0xcc; 6])),
        (v6("fe80::4"), MacAddr([0xdd; 6])),
    ]
    .into_iter()
    .collect();
    assert_eq!(victims, expected);
    assert_eq!(ndp.stats().packets_sent, 4);
}

#[tokio::test(start_paused = true)]
async fn test_unresolvable_and_skipped_targets_are_not_fatal() {
    let h = harness(TABLE);
    let ndp = engine(
        &h,
        NdpSpoofConfig::new()
            .with_prefix(None, 64)
            .with_targets(vec![
                // own address
                Target::Ip("fe80::5".parse().unwrap()),
                Target::Ip("fe80::99".parse().unwrap()),
                Target::Ip("10.0.0.2".parse().unwrap()),
                Target::Mac(MacAddr([0xee; 6])),
                Target::Alias("nobody".to_string()),
            ]),
    );

    ndp.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(ndp.is_running());
    ndp.stop().await.unwrap();

    assert_eq!(h.sink.count(), 0);
    assert_eq!(ndp.stats().errors, 0);
}

#[tokio::test(start_paused = true)]
async fn test_prefix_only_sends_ra_each_tick() {
    let h = harness(TABLE);
    let ndp = engine(
        &h,
        NdpSpoofConfig::new()
            .with_neighbour(None)
            .with_targets(vec![Target::Ip("fe80::2".parse().unwrap())]),
    );

    ndp.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(2500)).await;
    ndp.stop().await.unwrap();

    let frames = h.sink.frames();
    assert_eq!(frames.len(), 3);
    for frame in &frames {
        let (_, _, icmp) = decode(frame);
        assert_eq!(icmp.icmp_type, 134);
    }
}

#[tokio::test]
async fn test_ban_mode_never_enables_forwarding() {
    let h = harness(TABLE);
    let ndp = engine(&h, NdpSpoofConfig::new());

    ndp.start_ban().await.unwrap();
    assert!(ndp.config().ban);
    assert!(!h.forwarding.is_forwarding_enabled());

    ndp.stop().await.unwrap();
    assert!(!ndp.config().ban);

    ndp.start().await.unwrap();
    assert!(h.forwarding.is_forwarding_enabled());
    ndp.stop().await.unwrap();
}

#[tokio::test]
async fn test_ban_mode_keeps_running_arp_relay() {
    let h = harness(TABLE);
    let arp = ArpSpoofEngine::new(
        h.ctx.clone(),
        ArpSpoofConfig::new()
            .with_victim("10.0.0.2".parse().unwrap(), None)
            .with_skip_restore(true),
    );
    arp.start().await.unwrap();
    assert!(h.forwarding.is_forwarding_enabled());

    let ndp = engine(&h, NdpSpoofConfig::new().with_ban(true));
    ndp.start().await.unwrap();
    assert!(arp.is_running());
    assert!(h.forwarding.is_forwarding_enabled());

    ndp.stop().await.unwrap();
    assert!(h.forwarding.is_forwarding_enabled());
    arp.stop().await.unwrap();
}

#[tokio::test]
async fn test_double_start_and_configure_while_running() {
    let h = harness(TABLE);
    let ndp = engine(&h, NdpSpoofConfig::new());

    ndp.start().await.unwrap();
    assert!(matches!(ndp.start().await, Err(Error::AlreadyStarted(_))));
    assert!(matches!(ndp.start_ban().await, Err(Error::AlreadyStarted(_))));
    assert!(!ndp.config().ban);
    assert!(matches!(
        ndp.configure(NdpSpoofConfig::new().with_ban(true)),
        Err(Error::AlreadyStarted(_))
    ));

    ndp.stop().await.unwrap();
    ndp.configure(NdpSpoofConfig::new().with_prefix(None, 64))
        .unwrap();
    assert_eq!(ndp.config().prefix, None);
}
