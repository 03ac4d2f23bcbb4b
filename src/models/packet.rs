use serde::{Deserialize, Serialize, Serializer};
use chrono::{DateTime, Utc};
use std::net::IpAddr;

/// Data link type of a capture source, using the pcap LINKTYPE numbering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkType(pub i32);

impl LinkType {
    pub const NULL: LinkType = LinkType(0);
    pub const ETHERNET: LinkType = LinkType(1);
    pub const RAW: LinkType = LinkType(101);
    pub const LINUX_SLL: LinkType = LinkType(113);
    pub const IPV4: LinkType = LinkType(228);
    pub const IPV6: LinkType = LinkType(229);
    pub const LINUX_SLL2: LinkType = LinkType(276);
}

impl From<pcap::Linktype> for LinkType {
    fn from(linktype: pcap::Linktype) -> Self {
        LinkType(linktype.0)
    }
}

impl From<LinkType> for pcap::Linktype {
    fn from(linktype: LinkType) -> Self {
        pcap::Linktype(linktype.0)
    }
}

/// Per-packet side information produced alongside the raw bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureMetadata {
    /// Timestamp when the packet was captured
    pub timestamp: DateTime<Utc>,

    /// Number of bytes actually captured
    pub caplen: usize,

    /// Length of the packet on the wire
    pub len: usize,

    /// Whether the packet was cut at the snapshot length
    pub truncated: bool,

    /// Link layer of the raw bytes
    pub link_type: LinkType,
}

/// A packet read from a capture source
#[derive(Debug, Clone)]
pub struct CapturedPacket {
    /// The raw packet bytes
    pub data: Vec<u8>,

    /// Capture metadata for `data`
    pub metadata: CaptureMetadata,
}

impl CapturedPacket {
    /// Build a packet, deriving the truncation flag from the two lengths
    pub fn new(data: Vec<u8>, len: usize, timestamp: DateTime<Utc>, link_type: LinkType) -> Self {
        let caplen = data.len();
        Self {
            data,
            metadata: CaptureMetadata {
                timestamp,
                caplen,
                len: len.max(caplen),
                truncated: caplen < len,
                link_type,
            },
        }
    }
}

/// Transport protocol carrying the event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Udp,
    Tcp,
}

impl Transport {
    /// IANA protocol number
    pub fn protocol_number(&self) -> u8 {
        match self {
            Transport::Udp => 17,
            Transport::Tcp => 6,
        }
    }
}

/// Application protocol of the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadType {
    Sip,
}

/// Direction relative to the capture device's own addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
    Unknown,
}

/// Structured signaling event extracted from one packet.
///
/// Ownership passes to the publisher once produced; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedEvent {
    /// Capture timestamp of the source packet
    pub timestamp: DateTime<Utc>,

    pub source_ip: IpAddr,
    pub destination_ip: IpAddr,
    pub source_port: u16,
    pub destination_port: u16,

    pub transport: Transport,
    pub payload_type: PayloadType,
    pub direction: Direction,

    /// Application payload
    #[serde(serialize_with = "serialize_payload")]
    pub payload: Vec<u8>,
}

fn serialize_payload<S: Serializer>(payload: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_captured_packet_truncation_flag() {
        let ts = Utc::now();
        let full = CapturedPacket::new(vec![0; 60], 60, ts, LinkType::ETHERNET);
        assert!(!full.metadata.truncated);

        let cut = CapturedPacket::new(vec![0; 64], 1500, ts, LinkType::ETHERNET);
        assert!(cut.metadata.truncated);
        assert_eq!(cut.metadata.caplen, 64);
        assert_eq!(cut.metadata.len, 1500);
    }

    #[test]
    fn test_event_serializes_payload_as_text() {
        let event = DecodedEvent {
            timestamp: Utc::now(),
            source_ip: "10.0.0.1".parse().unwrap(),
            destination_ip: "10.0.0.2".parse().unwrap(),
            source_port: 5060,
            destination_port: 5060,
            transport: Transport::Udp,
            payload_type: PayloadType::Sip,
            direction: Direction::Unknown,
            payload: b"OPTIONS sip:a@b SIP/2.0\r\n".to_vec(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["transport"], "udp");
        assert_eq!(value["payload"], "OPTIONS sip:a@b SIP/2.0\r\n");
    }
}
