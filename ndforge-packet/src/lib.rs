//! IPv6 Neighbor Discovery frame construction for ndforge
//!
//! This crate builds complete Ethernet frames carrying ICMPv6 Neighbor
//! Discovery messages (RFC 4861) with arbitrary, possibly forged, addresses.
//! It includes support for:
//!
//! - **Ethernet II headers** with the IPv6 EtherType
//! - **IPv6 fixed headers** with the hop limit ND requires
//! - **Neighbor Solicitation, Neighbor Advertisement and Router
//!   Advertisement** messages with their link-layer, prefix and MTU options
//! - **Pseudo-header checksums** computed once the frame is laid out
//!
//! # Architecture
//!
//! - [`builder`] - Layer stack and the two-pass [`Packet::finalize`]
//! - [`ethernet`] - Ethernet II header
//! - [`ipv6`] - IPv6 fixed header
//! - [`icmpv6`] - ND messages and options
//! - [`ndp`] - Helpers that fill in RFC 4861 defaults per message kind
//! - [`checksum`] - Internet checksum utilities
//!
//! # Quick Start
//!
//! ## Spoofing a neighbor advertisement
//!
//! ```rust
//! use ndforge_core::MacAddr;
//! use ndforge_packet::{build_neighbor_advertisement, NeighborAdvertisementParams};
//!
//! let claimed = MacAddr([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
//! let victim = "fe80::1".parse().unwrap();
//!
//! let frame = build_neighbor_advertisement(&NeighborAdvertisementParams::new(claimed, victim))
//!     .unwrap()
//!     .finalize()
//!     .unwrap();
//!
//! assert_eq!(frame.len(), 86);
//! ```
//!
//! ## Assembling layers by hand
//!
//! ```rust
//! use ndforge_core::{solicited_node, MacAddr};
//! use ndforge_packet::{build, EthernetHeader, Ipv6Header, Layer, NdMessage};
//!
//! let mac = MacAddr([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
//! let target = "fe80::42".parse().unwrap();
//! let group = solicited_node(target);
//!
//! // Duplicate address detection probe: unspecified source, no options
//! let frame = build(vec![
//!     Layer::Ethernet(EthernetHeader::new(MacAddr::ipv6_multicast(group), mac)),
//!     Layer::Ipv6(Ipv6Header::new(std::net::Ipv6Addr::UNSPECIFIED, group)),
//!     Layer::Icmpv6(NdMessage::NeighborSolicitation { target, options: vec![] }),
//! ])
//! .unwrap();
//!
//! assert_eq!(frame.len(), 14 + 40 + 24);
//! ```

pub mod builder;
pub mod checksum;
pub mod ethernet;
pub mod icmpv6;
pub mod ipv6;
pub mod ndp;

// Re-export commonly used types
pub use builder::{build, Frame, Layer, LayerKind, LayerSpan, Packet};
pub use checksum::{internet_checksum, ipv6_checksum, validate_checksum, verify_icmpv6};
pub use ethernet::{EtherType, EthernetHeader};
pub use icmpv6::{
    NaFlags, NdMessage, NdMessageType, NdOption, NdOptionType, PrefixInformation,
    RouterAdvertisementFields, MAX_OPTION_LEN,
};
pub use ipv6::{Ipv6Header, ND_HOP_LIMIT, NO_NEXT_HEADER};
pub use ndp::{
    build_neighbor_advertisement, build_neighbor_solicitation, build_router_advertisement,
    NeighborAdvertisementParams, NeighborSolicitationParams, RouterAdvertisementParams,
};
