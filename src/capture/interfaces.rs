use log::{debug, info};
use std::net::IpAddr;

use crate::models::interface::InterfaceAddressSet;
use crate::utils::error::AddressLookupError;

/// Pseudo-device capturing on every interface
pub const ANY_DEVICE: &str = "any";

/// Resolves the addresses bound to a device
pub trait AddressLookup {
    fn lookup(&self, device: &str) -> Result<InterfaceAddressSet, AddressLookupError>;
}

/// Address lookup backed by the operating system's interface list
pub struct SystemInterfaces;

impl AddressLookup for SystemInterfaces {
    fn lookup(&self, device: &str) -> Result<InterfaceAddressSet, AddressLookupError> {
        let interfaces = pnet_datalink::interfaces();
        debug!("Found {} interfaces on this host", interfaces.len());

        let listing = interfaces
            .into_iter()
            .map(|iface| (iface.name, iface.ips.iter().map(|net| net.ip()).collect::<Vec<_>>()));

        let addrs = addresses_for(device, listing)?;
        info!("Interface addresses ({}): {}", addrs.len(), addrs.formatted_display());
        Ok(addrs)
    }
}

/// Collect the addresses of `device` from an interface listing.
///
/// `any` collects the addresses of every interface.
pub fn addresses_for<I>(device: &str, interfaces: I) -> Result<InterfaceAddressSet, AddressLookupError>
where
    I: IntoIterator<Item = (String, Vec<IpAddr>)>,
{
    let mut found = false;
    let mut addresses = Vec::new();

    for (name, ips) in interfaces {
        if device == ANY_DEVICE || name == device {
            found = true;
            addresses.extend(ips.iter().map(IpAddr::to_string));
        }
    }

    if !found {
        return Err(AddressLookupError::NoSuchInterface(device.to_string()));
    }

    let set = InterfaceAddressSet::new(device, addresses);
    if set.is_empty() {
        return Err(AddressLookupError::NoAddresses(device.to_string()));
    }
    Ok(set)
}
