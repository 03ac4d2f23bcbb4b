use log::{debug, log_enabled, trace, Level};
use pnet::packet::{
    ethernet::{EtherType, EtherTypes, EthernetPacket},
    ip::{IpNextHeaderProtocol, IpNextHeaderProtocols},
    ipv4::Ipv4Packet,
    ipv6::Ipv6Packet,
    sll::SLLPacket,
    sll2::SLL2Packet,
    tcp::TcpPacket,
    udp::UdpPacket,
    vlan::VlanPacket,
};
use std::net::IpAddr;

use crate::decoder::Decoder;
use crate::models::interface::InterfaceAddressSet;
use crate::models::packet::{CaptureMetadata, DecodedEvent, Direction, LinkType, PayloadType, Transport};
use crate::utils::error::DecodeError;

/// DLT_RAW as reported by libpcap on most platforms
const DLT_RAW: LinkType = LinkType(12);
/// DLT_RAW on OpenBSD
const DLT_RAW_OPENBSD: LinkType = LinkType(14);

const IPV4_MORE_FRAGMENTS: u8 = 0b001;

const SIP_PREFIXES: &[&[u8]] = &[
    b"SIP/2.0 ",
    b"INVITE ",
    b"ACK ",
    b"BYE ",
    b"CANCEL ",
    b"OPTIONS ",
    b"REGISTER ",
    b"PRACK ",
    b"SUBSCRIBE ",
    b"NOTIFY ",
    b"PUBLISH ",
    b"INFO ",
    b"REFER ",
    b"MESSAGE ",
    b"UPDATE ",
];

/// Network layer found after stripping the link header
enum Network {
    V4(usize),
    V6(usize),
}

/// Transport segment located inside the captured bytes
struct Segment<'a> {
    transport: Transport,
    source_port: u16,
    destination_port: u16,
    payload: &'a [u8],
}

/// Decoder extracting SIP messages carried over UDP or TCP
pub struct SipDecoder {
    /// Addresses of the capture device, used to tag direction
    local_addrs: Option<InterfaceAddressSet>,
}

impl SipDecoder {
    /// Create a new SIP decoder
    pub fn new(local_addrs: Option<InterfaceAddressSet>) -> Self {
        Self { local_addrs }
    }

    /// Locate the network layer for the given link type
    fn network_layer(&self, data: &[u8], link_type: LinkType) -> Result<Option<Network>, DecodeError> {
        let located = match link_type {
            LinkType::ETHERNET => Self::ethernet_payload(data).and_then(|(ethertype, offset)| Self::by_ethertype(ethertype, offset)),
            LinkType::LINUX_SLL => SLLPacket::new(data)
                .and_then(|sll| Self::by_ethertype(sll.get_protocol(), SLLPacket::minimum_packet_size())),
            LinkType::LINUX_SLL2 => SLL2Packet::new(data)
                .and_then(|sll| Self::by_ethertype(sll.get_protocol_type(), SLL2Packet::minimum_packet_size())),
            LinkType::RAW | DLT_RAW | DLT_RAW_OPENBSD => Self::by_version(data, 0),
            LinkType::IPV4 => Some(Network::V4(0)),
            LinkType::IPV6 => Some(Network::V6(0)),
            LinkType::NULL => Self::loopback_payload(data),
            LinkType(other) => return Err(DecodeError::UnsupportedLinkType(other)),
        };
        Ok(located)
    }

    /// Skip the ethernet header and any 802.1Q / QinQ tags
    fn ethernet_payload(data: &[u8]) -> Option<(EtherType, usize)> {
        let eth_packet = EthernetPacket::new(data)?;
        let mut ethertype = eth_packet.get_ethertype();
        let mut offset = EthernetPacket::minimum_packet_size();

        while ethertype == EtherTypes::Vlan || ethertype == EtherTypes::QinQ {
            let vlan = VlanPacket::new(&data[offset..])?;
            trace!("VLAN tag {}", vlan.get_vlan_identifier());
            ethertype = vlan.get_ethertype();
            offset += VlanPacket::minimum_packet_size();
        }

        Some((ethertype, offset))
    }

    /// BSD loopback: 4 byte address family in host byte order
    fn loopback_payload(data: &[u8]) -> Option<Network> {
        let family: [u8; 4] = data.get(..4)?.try_into().ok()?;
        let family = u32::from_ne_bytes(family);
        match family {
            2 => Some(Network::V4(4)),
            24 | 28 | 30 => Some(Network::V6(4)),
            _ => None,
        }
    }

    fn by_ethertype(ethertype: EtherType, offset: usize) -> Option<Network> {
        match ethertype {
            EtherTypes::Ipv4 => Some(Network::V4(offset)),
            EtherTypes::Ipv6 => Some(Network::V6(offset)),
            _ => None,
        }
    }

    fn by_version(data: &[u8], offset: usize) -> Option<Network> {
        match data.get(offset)? >> 4 {
            4 => Some(Network::V4(offset)),
            6 => Some(Network::V6(offset)),
            _ => None,
        }
    }

    /// Parse IPv4, returning addresses and the transport bytes
    fn parse_ipv4(data: &[u8], offset: usize) -> Option<(IpAddr, IpAddr, IpNextHeaderProtocol, &[u8])> {
        let ipv4_packet = Ipv4Packet::new(&data[offset..])?;
        let header_len = ipv4_packet.get_header_length() as usize * 4;
        if ipv4_packet.get_version() != 4 || header_len < Ipv4Packet::minimum_packet_size() {
            return None;
        }

        // Reassembly is not supported; fragments are dropped
        if ipv4_packet.get_flags() & IPV4_MORE_FRAGMENTS != 0 || ipv4_packet.get_fragment_offset() != 0 {
            trace!("Dropping IPv4 fragment id {}", ipv4_packet.get_identification());
            return None;
        }

        let start = offset + header_len;
        let end = (offset + ipv4_packet.get_total_length() as usize).min(data.len());
        let transport = data.get(start..end)?;

        Some((
            IpAddr::V4(ipv4_packet.get_source()),
            IpAddr::V4(ipv4_packet.get_destination()),
            ipv4_packet.get_next_level_protocol(),
            transport,
        ))
    }

    /// Parse IPv6, returning addresses and the transport bytes
    fn parse_ipv6(data: &[u8], offset: usize) -> Option<(IpAddr, IpAddr, IpNextHeaderProtocol, &[u8])> {
        let ipv6_packet = Ipv6Packet::new(&data[offset..])?;
        if ipv6_packet.get_version() != 6 {
            return None;
        }

        let start = offset + Ipv6Packet::minimum_packet_size();
        let end = (start + ipv6_packet.get_payload_length() as usize).min(data.len());
        let transport = data.get(start..end)?;

        Some((
            IpAddr::V6(ipv6_packet.get_source()),
            IpAddr::V6(ipv6_packet.get_destination()),
            ipv6_packet.get_next_header(),
            transport,
        ))
    }

    /// Parse the UDP or TCP header in front of the application payload
    fn parse_transport(protocol: IpNextHeaderProtocol, data: &[u8]) -> Option<Segment<'_>> {
        match protocol {
            IpNextHeaderProtocols::Udp => {
                let udp_packet = UdpPacket::new(data)?;
                let header_len = UdpPacket::minimum_packet_size();
                let end = (udp_packet.get_length() as usize).clamp(header_len, data.len());
                Some(Segment {
                    transport: Transport::Udp,
                    source_port: udp_packet.get_source(),
                    destination_port: udp_packet.get_destination(),
                    payload: &data[header_len..end],
                })
            }
            IpNextHeaderProtocols::Tcp => {
                let tcp_packet = TcpPacket::new(data)?;
                let header_len = tcp_packet.get_data_offset() as usize * 4;
                Some(Segment {
                    transport: Transport::Tcp,
                    source_port: tcp_packet.get_source(),
                    destination_port: tcp_packet.get_destination(),
                    payload: data.get(header_len..)?,
                })
            }
            _ => None,
        }
    }

    /// Whether the payload starts like a SIP request or response
    pub fn is_sip(payload: &[u8]) -> bool {
        SIP_PREFIXES.iter().any(|prefix| payload.starts_with(prefix))
    }

    fn direction(&self, source: &IpAddr, destination: &IpAddr) -> Direction {
        match &self.local_addrs {
            Some(addrs) if addrs.contains_ip(source) => Direction::Outbound,
            Some(addrs) if addrs.contains_ip(destination) => Direction::Inbound,
            _ => Direction::Unknown,
        }
    }
}

impl Decoder for SipDecoder {
    fn process(&mut self, data: &[u8], metadata: &CaptureMetadata) -> Result<Option<DecodedEvent>, DecodeError> {
        if data.len() != metadata.caplen {
            return Err(DecodeError::Corrupted(format!(
                "captured length {} does not match {} bytes of data",
                metadata.caplen,
                data.len()
            )));
        }

        let network = match self.network_layer(data, metadata.link_type)? {
            Some(network) => network,
            None => return Ok(None),
        };

        let parsed = match network {
            Network::V4(offset) => Self::parse_ipv4(data, offset),
            Network::V6(offset) => Self::parse_ipv6(data, offset),
        };
        let (source_ip, destination_ip, protocol, transport) = match parsed {
            Some(parsed) => parsed,
            None => return Ok(None),
        };

        let segment = match Self::parse_transport(protocol, transport) {
            Some(segment) => segment,
            None => return Ok(None),
        };

        if !Self::is_sip(segment.payload) {
            return Ok(None);
        }

        if log_enabled!(Level::Debug) {
            debug!(
                "SIP {:?} {}:{} -> {}:{}, {} bytes",
                segment.transport,
                source_ip,
                segment.source_port,
                destination_ip,
                segment.destination_port,
                segment.payload.len()
            );
        }

        Ok(Some(DecodedEvent {
            timestamp: metadata.timestamp,
            source_ip,
            destination_ip,
            source_port: segment.source_port,
            destination_port: segment.destination_port,
            transport: segment.transport,
            payload_type: PayloadType::Sip,
            direction: self.direction(&source_ip, &destination_ip),
            payload: segment.payload.to_vec(),
        }))
    }
}
