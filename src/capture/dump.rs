use log::info;
use pcap::{Capture, PacketHeader, Savefile};
use std::path::{Path, PathBuf};

use crate::models::packet::{CapturedPacket, LinkType};
use crate::utils::error::CaptureError;

/// Copies captured packets into a pcap file
pub struct PacketDumper {
    path: PathBuf,
    savefile: Savefile,
    written: u64,
}

impl PacketDumper {
    /// Create (truncate) the dump file for packets of `link_type`
    pub fn create(path: &Path, link_type: LinkType) -> Result<Self, CaptureError> {
        info!("Dumping packets to {}", path.display());
        let savefile = Capture::dead(link_type.into())?.savefile(path)?;
        Ok(Self { path: path.to_path_buf(), savefile, written: 0 })
    }

    pub fn write(&mut self, packet: &CapturedPacket) {
        let ts = packet.metadata.timestamp;
        let header = PacketHeader {
            ts: libc::timeval {
                tv_sec: ts.timestamp() as libc::time_t,
                tv_usec: ts.timestamp_subsec_micros() as libc::suseconds_t,
            },
            caplen: packet.data.len() as u32,
            len: packet.metadata.len as u32,
        };
        self.savefile.write(&pcap::Packet::new(&header, &packet.data));
        self.written += 1;
    }

    pub fn flush(&mut self) -> Result<(), CaptureError> {
        self.savefile.flush()?;
        Ok(())
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    #[test]
    fn test_dump_keeps_wire_length() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("dump.pcap");

        let mut dumper = PacketDumper::create(&path, LinkType::ETHERNET).expect("create");
        dumper.write(&CapturedPacket::new(vec![0xab; 64], 1500, Utc::now(), LinkType::ETHERNET));
        dumper.flush().expect("flush");
        assert_eq!(dumper.written(), 1);
        assert_eq!(dumper.path(), path.as_path());

        let mut capture = Capture::from_file(&path).expect("open dump");
        let packet = capture.next_packet().expect("packet");
        assert_eq!(packet.data, &[0xab; 64][..]);
        assert_eq!(packet.header.caplen, 64);
        assert_eq!(packet.header.len, 1500);
    }
}
