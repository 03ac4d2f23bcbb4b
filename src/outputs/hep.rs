//! HEPv3 encapsulation and the UDP network sink.
//!
//! A HEPv3 frame is the `HEP3` magic, a big-endian u16 total length and a
//! sequence of chunks, each `vendor u16 | type u16 | length u16 | value`
//! where the length includes the 6 byte chunk header.

use log::{debug, trace};
use std::net::{IpAddr, SocketAddr, ToSocketAddrs, UdpSocket};

use crate::models::packet::{DecodedEvent, PayloadType};
use crate::outputs::Outputer;
use crate::utils::error::OutputError;

const HEP_MAGIC: &[u8; 4] = b"HEP3";
const GENERIC_VENDOR: u16 = 0;

const CHUNK_IP_FAMILY: u16 = 0x0001;
const CHUNK_IP_PROTOCOL: u16 = 0x0002;
const CHUNK_IPV4_SRC: u16 = 0x0003;
const CHUNK_IPV4_DST: u16 = 0x0004;
const CHUNK_IPV6_SRC: u16 = 0x0005;
const CHUNK_IPV6_DST: u16 = 0x0006;
const CHUNK_SRC_PORT: u16 = 0x0007;
const CHUNK_DST_PORT: u16 = 0x0008;
const CHUNK_TS_SEC: u16 = 0x0009;
const CHUNK_TS_USEC: u16 = 0x000a;
const CHUNK_PROTO_TYPE: u16 = 0x000b;
const CHUNK_CAPTURE_ID: u16 = 0x000c;
const CHUNK_PAYLOAD: u16 = 0x000f;

const AF_INET: u8 = 2;
const AF_INET6: u8 = 10;

fn proto_type(payload_type: PayloadType) -> u8 {
    match payload_type {
        PayloadType::Sip => 1,
    }
}

fn push_chunk(buf: &mut Vec<u8>, chunk_type: u16, value: &[u8]) -> Result<(), OutputError> {
    let len = u16::try_from(value.len() + 6).map_err(|_| OutputError::FrameTooLarge(value.len()))?;
    buf.extend_from_slice(&GENERIC_VENDOR.to_be_bytes());
    buf.extend_from_slice(&chunk_type.to_be_bytes());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(value);
    Ok(())
}

/// Encode an event as one HEPv3 frame
pub fn encode(event: &DecodedEvent, node_id: u32) -> Result<Vec<u8>, OutputError> {
    let mut buf = Vec::with_capacity(event.payload.len() + 128);
    buf.extend_from_slice(HEP_MAGIC);
    buf.extend_from_slice(&[0, 0]);

    match (event.source_ip, event.destination_ip) {
        (IpAddr::V4(src), IpAddr::V4(dst)) => {
            push_chunk(&mut buf, CHUNK_IP_FAMILY, &[AF_INET])?;
            push_chunk(&mut buf, CHUNK_IP_PROTOCOL, &[event.transport.protocol_number()])?;
            push_chunk(&mut buf, CHUNK_IPV4_SRC, &src.octets())?;
            push_chunk(&mut buf, CHUNK_IPV4_DST, &dst.octets())?;
        }
        (src, dst) => {
            push_chunk(&mut buf, CHUNK_IP_FAMILY, &[AF_INET6])?;
            push_chunk(&mut buf, CHUNK_IP_PROTOCOL, &[event.transport.protocol_number()])?;
            push_chunk(&mut buf, CHUNK_IPV6_SRC, &to_ipv6(src).octets())?;
            push_chunk(&mut buf, CHUNK_IPV6_DST, &to_ipv6(dst).octets())?;
        }
    }

    push_chunk(&mut buf, CHUNK_SRC_PORT, &event.source_port.to_be_bytes())?;
    push_chunk(&mut buf, CHUNK_DST_PORT, &event.destination_port.to_be_bytes())?;
    push_chunk(&mut buf, CHUNK_TS_SEC, &(event.timestamp.timestamp() as u32).to_be_bytes())?;
    push_chunk(&mut buf, CHUNK_TS_USEC, &event.timestamp.timestamp_subsec_micros().to_be_bytes())?;
    push_chunk(&mut buf, CHUNK_PROTO_TYPE, &[proto_type(event.payload_type)])?;
    push_chunk(&mut buf, CHUNK_CAPTURE_ID, &node_id.to_be_bytes())?;
    push_chunk(&mut buf, CHUNK_PAYLOAD, &event.payload)?;

    let total = u16::try_from(buf.len()).map_err(|_| OutputError::FrameTooLarge(buf.len()))?;
    buf[4..6].copy_from_slice(&total.to_be_bytes());
    Ok(buf)
}

fn to_ipv6(addr: IpAddr) -> std::net::Ipv6Addr {
    match addr {
        IpAddr::V4(v4) => v4.to_ipv6_mapped(),
        IpAddr::V6(v6) => v6,
    }
}

/// Network sink sending one HEPv3 datagram per event
pub struct HepOutputer {
    target: SocketAddr,
    socket: UdpSocket,
    node_id: u32,
}

impl HepOutputer {
    /// Resolve `address` and connect a UDP socket to it
    pub fn connect(address: &str, node_id: u32) -> Result<Self, OutputError> {
        let target = address
            .to_socket_addrs()
            .map_err(|_| OutputError::InvalidAddress(address.to_string()))?
            .next()
            .ok_or_else(|| OutputError::InvalidAddress(address.to_string()))?;

        let bind_addr: SocketAddr = if target.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(bind_addr)?;
        socket.connect(target)?;
        debug!("HEP socket {} connected to {}", socket.local_addr()?, target);

        Ok(Self { target, socket, node_id })
    }

    /// Collector the sink is bound to
    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

impl Outputer for HepOutputer {
    fn publish(&mut self, event: &DecodedEvent) -> Result<(), OutputError> {
        let frame = encode(event, self.node_id)?;
        self.socket.send(&frame)?;
        trace!("Sent HEP frame of {} bytes to {}", frame.len(), self.target());
        Ok(())
    }

    fn describe(&self) -> String {
        format!("hep://{}", self.target())
    }
}
