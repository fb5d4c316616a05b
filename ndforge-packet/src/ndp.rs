//! Neighbor Discovery packet helpers
//!
//! Each helper takes the (possibly forged) addresses for one message kind,
//! fills in the RFC 4861 defaults for anything left unset and returns a
//! [`Packet`] ready for [`Packet::finalize`]. No check is made that the
//! addresses belong to the sending host.

use crate::builder::Packet;
use crate::ethernet::EthernetHeader;
use crate::icmpv6::{NaFlags, NdMessage, NdOption, PrefixInformation, RouterAdvertisementFields};
use crate::ipv6::Ipv6Header;
use ndforge_core::{solicited_node, Error, MacAddr, Result, ALL_NODES};
use std::net::Ipv6Addr;

/// Inputs for a Neighbor Solicitation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborSolicitationParams {
    pub src_mac: MacAddr,
    /// Defaults to the multicast MAC of the destination group
    pub dst_mac: Option<MacAddr>,
    /// `::` for a duplicate address detection probe
    pub src_ip: Ipv6Addr,
    /// Defaults to the solicited-node group of the target
    pub dst_ip: Option<Ipv6Addr>,
    pub target_ip: Ipv6Addr,
    /// Attach a Source Link-Layer Address option carrying `src_mac`
    pub source_link_layer: bool,
}

impl NeighborSolicitationParams {
    pub fn new(src_mac: MacAddr, src_ip: Ipv6Addr, target_ip: Ipv6Addr) -> Self {
        Self {
            src_mac,
            dst_mac: None,
            src_ip,
            dst_ip: None,
            target_ip,
            source_link_layer: !src_ip.is_unspecified(),
        }
    }
}

/// Inputs for a Neighbor Advertisement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborAdvertisementParams {
    pub src_mac: MacAddr,
    /// Defaults to the multicast MAC of the destination group
    pub dst_mac: Option<MacAddr>,
    pub src_ip: Ipv6Addr,
    /// Defaults to all-nodes (an unsolicited advertisement)
    pub dst_ip: Option<Ipv6Addr>,
    /// Address being advertised; defaults to `src_ip`
    pub target_ip: Option<Ipv6Addr>,
    /// Link-layer address claimed for the target; defaults to `src_mac`
    pub target_mac: Option<MacAddr>,
    pub flags: NaFlags,
}

impl NeighborAdvertisementParams {
    /// Unsolicited advertisement with the override flag set
    pub fn new(src_mac: MacAddr, src_ip: Ipv6Addr) -> Self {
        Self {
            src_mac,
            dst_mac: None,
            src_ip,
            dst_ip: None,
            target_ip: None,
            target_mac: None,
            flags: NaFlags {
                override_flag: true,
                ..Default::default()
            },
        }
    }
}

/// Inputs for a Router Advertisement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterAdvertisementParams {
    pub src_mac: MacAddr,
    pub dst_mac: Option<MacAddr>,
    /// Router address; should be link-local for receivers to accept it
    pub src_ip: Ipv6Addr,
    /// Defaults to all-nodes
    pub dst_ip: Option<Ipv6Addr>,
    pub fields: RouterAdvertisementFields,
    pub prefix: Option<PrefixInformation>,
    pub mtu: Option<u32>,
    /// Attach a Source Link-Layer Address option carrying `src_mac`
    pub source_link_layer: bool,
}

impl RouterAdvertisementParams {
    pub fn new(src_mac: MacAddr, src_ip: Ipv6Addr) -> Self {
        Self {
            src_mac,
            dst_mac: None,
            src_ip,
            dst_ip: None,
            fields: RouterAdvertisementFields::default(),
            prefix: None,
            mtu: None,
            source_link_layer: true,
        }
    }
}

/// Destination MAC: the explicit one, else the group MAC of a multicast
/// destination. A unicast destination needs an explicit MAC.
fn destination_mac(dst_mac: Option<MacAddr>, dst_ip: Ipv6Addr) -> Result<MacAddr> {
    match dst_mac {
        Some(mac) => Ok(mac),
        None if dst_ip.is_multicast() => Ok(MacAddr::ipv6_multicast(dst_ip)),
        None => Err(Error::encoding(format!(
            "destination {} is unicast, a destination link-layer address is required",
            dst_ip
        ))),
    }
}

/// Ethernet / IPv6 / ICMPv6 type 135
pub fn build_neighbor_solicitation(params: &NeighborSolicitationParams) -> Result<Packet> {
    let dst_ip = params.dst_ip.unwrap_or_else(|| solicited_node(params.target_ip));
    let dst_mac = destination_mac(params.dst_mac, dst_ip)?;

    let mut options = Vec::new();
    if params.source_link_layer {
        options.push(NdOption::SourceLinkLayerAddress(params.src_mac));
    }

    Ok(Packet::new()
        .ethernet(EthernetHeader::new(dst_mac, params.src_mac))
        .ipv6(Ipv6Header::new(params.src_ip, dst_ip))
        .icmpv6(NdMessage::NeighborSolicitation {
            target: params.target_ip,
            options,
        }))
}

/// Ethernet / IPv6 / ICMPv6 type 136 with a Target Link-Layer Address option
pub fn build_neighbor_advertisement(params: &NeighborAdvertisementParams) -> Result<Packet> {
    let dst_ip = params.dst_ip.unwrap_or(ALL_NODES);
    let dst_mac = destination_mac(params.dst_mac, dst_ip)?;
    let target_ip = params.target_ip.unwrap_or(params.src_ip);
    let target_mac = params.target_mac.unwrap_or(params.src_mac);

    Ok(Packet::new()
        .ethernet(EthernetHeader::new(dst_mac, params.src_mac))
        .ipv6(Ipv6Header::new(params.src_ip, dst_ip))
        .icmpv6(NdMessage::NeighborAdvertisement {
            flags: params.flags,
            target: target_ip,
            options: vec![NdOption::TargetLinkLayerAddress(target_mac)],
        }))
}

/// Ethernet / IPv6 / ICMPv6 type 134 with optional Prefix Information, MTU
/// and Source Link-Layer Address options, in that order
pub fn build_router_advertisement(params: &RouterAdvertisementParams) -> Result<Packet> {
    let dst_ip = params.dst_ip.unwrap_or(ALL_NODES);
    let dst_mac = destination_mac(params.dst_mac, dst_ip)?;

    if let Some(prefix) = &params.prefix {
        if prefix.prefix_len > 128 {
            return Err(Error::encoding(format!(
                "prefix length {} is longer than 128",
                prefix.prefix_len
            )));
        }
    }

    let mut options = Vec::new();
    if let Some(prefix) = params.prefix {
        options.push(NdOption::PrefixInformation(prefix));
    }
    if let Some(mtu) = params.mtu {
        options.push(NdOption::Mtu(mtu));
    }
    if params.source_link_layer {
        options.push(NdOption::SourceLinkLayerAddress(params.src_mac));
    }

    Ok(Packet::new()
        .ethernet(EthernetHeader::new(dst_mac, params.src_mac))
        .ipv6(Ipv6Header::new(params.src_ip, dst_ip))
        .icmpv6(NdMessage::RouterAdvertisement {
            fields: params.fields,
            options,
        }))
}
