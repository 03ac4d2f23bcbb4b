use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::net::IpAddr;

/// Snapshot of the addresses bound to the capture device.
///
/// Taken once at startup and never refreshed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceAddressSet {
    /// Device the addresses were read from
    pub device_name: String,

    /// Address strings (IPv4 and IPv6)
    addresses: BTreeSet<String>,
}

impl InterfaceAddressSet {
    /// Create a set from address strings
    pub fn new<I, S>(device_name: impl Into<String>, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            device_name: device_name.into(),
            addresses: addresses.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `addr` is bound to the device
    pub fn contains(&self, addr: &str) -> bool {
        self.addresses.contains(addr)
    }

    /// Whether `ip` is bound to the device
    pub fn contains_ip(&self, ip: &IpAddr) -> bool {
        self.contains(&ip.to_string())
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Iterate the address strings in sorted order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.addresses.iter().map(String::as_str)
    }

    /// Get a formatted string with device name and addresses
    pub fn formatted_display(&self) -> String {
        let addrs: Vec<&str> = self.iter().collect();
        format!("{} ({})", self.device_name, addrs.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_deduplicates() {
        let set = InterfaceAddressSet::new("eth0", ["10.0.0.1", "10.0.0.1", "fe80::1"]);
        assert_eq!(set.len(), 2);
        assert!(set.contains("fe80::1"));
    }

    #[test]
    fn test_contains_ip_uses_canonical_form() {
        let set = InterfaceAddressSet::new("eth0", ["2001:db8::1"]);
        let ip: IpAddr = "2001:0db8:0000::0001".parse().unwrap();
        assert!(set.contains_ip(&ip));
    }

    #[test]
    fn test_formatted_display() {
        let set = InterfaceAddressSet::new("eth0", ["10.0.0.2", "10.0.0.1"]);
        assert_eq!(set.formatted_display(), "eth0 (10.0.0.1, 10.0.0.2)");
    }
}
