// SPDX-License-Identifier: GPL-3.0-only

//! `network_data.json` synthesis
//!
//! Maps the interfaces found on the host and the node's network configuration
//! onto OpenStack network metadata. Links are keyed by MAC address, which is
//! what cloud-init matches on at first boot.

use std::collections::HashSet;
use std::net::Ipv4Addr;

use diskimage_types::{
    BOND_LINK_ID, Link, LinkType, Network, NetworkConfig, NetworkInterface, NetworkMetadata,
    NetworkType, Route, Service,
};
use tracing::{debug, info};

use crate::error::{ConfigDriveError, Result};

/// Build the network document for `network` on a host with `interfaces`.
pub fn synthesize(
    interfaces: &[NetworkInterface],
    network: &NetworkConfig,
) -> Result<NetworkMetadata> {
    validate(network)?;

    let metadata = if network.bond.is_empty() {
        single(interfaces, network)?
    } else {
        bonded(interfaces, network)?
    };

    let errors = metadata.reference_errors();
    if !errors.is_empty() {
        return Err(ConfigDriveError::InconsistentMetadata(errors));
    }
    Ok(metadata)
}

fn check_ipv4(field: &'static str, value: &str) -> Result<()> {
    value
        .parse::<Ipv4Addr>()
        .map(|_| ())
        .map_err(|_| ConfigDriveError::InvalidAddress {
            field,
            value: value.to_string(),
        })
}

fn validate(network: &NetworkConfig) -> Result<()> {
    check_ipv4("address", &network.address)?;
    check_ipv4("netmask", &network.netmask)?;
    if !network.gateway.is_empty() {
        check_ipv4("gateway", &network.gateway)?;
    }
    for dns in &network.dns {
        check_ipv4("dns", dns)?;
    }
    Ok(())
}

fn routes(network: &NetworkConfig) -> Vec<Route> {
    if network.gateway.is_empty() {
        Vec::new()
    } else {
        vec![Route::default_via(&network.gateway)]
    }
}

fn services(network: &NetworkConfig) -> Vec<Service> {
    network.dns.iter().map(Service::dns).collect()
}

fn static_network(id: String, link: &str, network: &NetworkConfig) -> Network {
    Network {
        id,
        link: link.to_string(),
        network_type: NetworkType::Static,
        ip_address: network.address.clone(),
        netmask: network.netmask.clone(),
        routes: routes(network),
    }
}

fn phy_link(interface: &NetworkInterface, network: &NetworkConfig) -> Link {
    Link {
        id: interface.mac_address.clone(),
        link_type: LinkType::Phy,
        mac_address: Some(interface.mac_address.clone()),
        mtu: network.mtu,
        ..Default::default()
    }
}

fn bonded(interfaces: &[NetworkInterface], network: &NetworkConfig) -> Result<NetworkMetadata> {
    let bond = &network.bond;

    let mut members: Vec<&NetworkInterface> = if bond.bond_all {
        interfaces.iter().filter(|i| i.has_carrier).collect()
    } else {
        bond.links
            .iter()
            .map(|wanted| -> Result<&NetworkInterface> {
                let interface = interfaces
                    .iter()
                    .find(|i| i.is_named(wanted))
                    .ok_or_else(|| ConfigDriveError::MissingInterface(wanted.clone()))?;
                if !interface.has_carrier {
                    return Err(ConfigDriveError::NoCarrierOn(interface.name.clone()));
                }
                Ok(interface)
            })
            .collect::<Result<_>>()?
    };
    // The same NIC may be listed by name and by MAC.
    let mut seen = HashSet::new();
    members.retain(|interface| {
        let first = seen.insert(interface.mac_address.clone());
        if !first {
            debug!("{} listed twice in bond, ignoring repeat", interface.name);
        }
        first
    });
    if members.is_empty() {
        return Err(ConfigDriveError::EmptyBond);
    }

    let mut links: Vec<Link> = members
        .iter()
        .map(|interface| Link {
            bond_master: Some(BOND_LINK_ID.to_string()),
            ..phy_link(interface, network)
        })
        .collect();
    let member_ids = links.iter().map(|link| link.id.clone()).collect();
    links.push(Link {
        id: BOND_LINK_ID.to_string(),
        link_type: LinkType::Bond,
        bond_links: member_ids,
        bond_mode: Some(bond.mode.clone()).filter(|mode| !mode.is_empty()),
        bond_hash_policy: Some(bond.hash_policy.clone()).filter(|policy| !policy.is_empty()),
        bond_miimon: Some(bond.miimon).filter(|miimon| *miimon > 0),
        ..Default::default()
    });

    info!("bonding {} interface(s) into {}", members.len(), BOND_LINK_ID);
    Ok(NetworkMetadata {
        links,
        networks: vec![static_network(
            format!("ipv4-{BOND_LINK_ID}"),
            BOND_LINK_ID,
            network,
        )],
        services: services(network),
    })
}

/// Interface carrying the node address when not bonding.
fn boot_interface<'a>(
    interfaces: &'a [NetworkInterface],
    network: &NetworkConfig,
) -> Result<&'a NetworkInterface> {
    if let Some(wanted) = network.boot_interface.as_deref() {
        let interface = interfaces
            .iter()
            .find(|i| i.is_named(wanted))
            .ok_or_else(|| ConfigDriveError::MissingInterface(wanted.to_string()))?;
        if !interface.has_carrier {
            return Err(ConfigDriveError::NoCarrierOn(interface.name.clone()));
        }
        return Ok(interface);
    }

    let with_carrier: Vec<&NetworkInterface> =
        interfaces.iter().filter(|i| i.has_carrier).collect();
    match with_carrier.as_slice() {
        [] => Err(ConfigDriveError::NoCarrier),
        [only] => Ok(*only),
        several => Err(ConfigDriveError::AmbiguousBootInterface(
            several.iter().map(|i| i.name.clone()).collect(),
        )),
    }
}

fn single(interfaces: &[NetworkInterface], network: &NetworkConfig) -> Result<NetworkMetadata> {
    let interface = boot_interface(interfaces, network)?;
    debug!("boot interface is {} ({})", interface.name, interface.mac_address);

    let link = phy_link(interface, network);
    let networks = vec![static_network(
        format!("ipv4-{}", link.id),
        &link.id,
        network,
    )];
    Ok(NetworkMetadata {
        links: vec![link],
        networks,
        services: services(network),
    })
}
