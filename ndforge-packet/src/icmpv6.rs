//! ICMPv6 Neighbor Discovery messages and options (RFC 4861)

use bytes::{BufMut, BytesMut};
use ndforge_core::{Error, MacAddr, Result};
use std::net::Ipv6Addr;

/// ICMPv6 ND message types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NdMessageType {
    RouterAdvertisement = 134,
    NeighborSolicitation = 135,
    NeighborAdvertisement = 136,
}

/// ND option types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NdOptionType {
    SourceLinkLayerAddress = 1,
    TargetLinkLayerAddress = 2,
    PrefixInformation = 3,
    Mtu = 5,
}

/// Longest option the one-octet length field can describe
pub const MAX_OPTION_LEN: usize = 255 * 8;

/// Prefix Information option contents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefixInformation {
    pub prefix: Ipv6Addr,
    pub prefix_len: u8,
    /// L flag
    pub on_link: bool,
    /// A flag (SLAAC)
    pub autonomous: bool,
    pub valid_lifetime: u32,
    pub preferred_lifetime: u32,
}

/// Neighbor Discovery option
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NdOption {
    SourceLinkLayerAddress(MacAddr),
    TargetLinkLayerAddress(MacAddr),
    PrefixInformation(PrefixInformation),
    Mtu(u32),
    /// Any other option, given as type and body (without type/length octets)
    Other { kind: u8, data: Vec<u8> },
}

impl NdOption {
    pub fn kind(&self) -> u8 {
        match self {
            NdOption::SourceLinkLayerAddress(_) => NdOptionType::SourceLinkLayerAddress as u8,
            NdOption::TargetLinkLayerAddress(_) => NdOptionType::TargetLinkLayerAddress as u8,
            NdOption::PrefixInformation(_) => NdOptionType::PrefixInformation as u8,
            NdOption::Mtu(_) => NdOptionType::Mtu as u8,
            NdOption::Other { kind, .. } => *kind,
        }
    }

    fn body_len(&self) -> usize {
        match self {
            NdOption::SourceLinkLayerAddress(_) | NdOption::TargetLinkLayerAddress(_) => 6,
            NdOption::PrefixInformation(_) => 30,
            NdOption::Mtu(_) => 6,
            NdOption::Other { data, .. } => data.len(),
        }
    }

    /// Encoded size: type + length + body, padded to 8 octets
    pub fn len(&self) -> usize {
        (2 + self.body_len()).div_ceil(8) * 8
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    fn validate(&self) -> Result<()> {
        if self.len() > MAX_OPTION_LEN {
            return Err(Error::encoding(format!(
                "option type {} is {} bytes, the length field allows at most {}",
                self.kind(),
                self.len(),
                MAX_OPTION_LEN
            )));
        }
        Ok(())
    }

    fn write(&self, buf: &mut BytesMut) {
        let start = buf.len();
        buf.put_u8(self.kind());
        buf.put_u8((self.len() / 8) as u8);

        match self {
            NdOption::SourceLinkLayerAddress(mac) | NdOption::TargetLinkLayerAddress(mac) => {
                buf.put_slice(mac.as_bytes());
            }
            NdOption::PrefixInformation(info) => {
                buf.put_u8(info.prefix_len);
                let mut flags = 0u8;
                if info.on_link {
                    flags |= 0x80;
                }
                if info.autonomous {
                    flags |= 0x40;
                }
                buf.put_u8(flags);
                buf.put_u32(info.valid_lifetime);
                buf.put_u32(info.preferred_lifetime);
                buf.put_u32(0); // Reserved2
                buf.put_slice(&info.prefix.octets());
            }
            NdOption::Mtu(mtu) => {
                buf.put_u16(0);
                buf.put_u32(*mtu);
            }
            NdOption::Other { data, .. } => buf.put_slice(data),
        }

        let padding = self.len() - (buf.len() - start);
        buf.put_bytes(0, padding);
    }
}

/// Neighbor Advertisement flag bits (first word of the message body)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NaFlags {
    pub router_flag: bool,
    pub solicited_flag: bool,
    pub override_flag: bool,
}

impl NaFlags {
    pub const ROUTER: u32 = 0x8000_0000;
    pub const SOLICITED: u32 = 0x4000_0000;
    pub const OVERRIDE: u32 = 0x2000_0000;

    pub fn bits(self) -> u32 {
        let mut bits = 0;
        if self.router_flag {
            bits |= Self::ROUTER;
        }
        if self.solicited_flag {
            bits |= Self::SOLICITED;
        }
        if self.override_flag {
            bits |= Self::OVERRIDE;
        }
        bits
    }
}

/// Router Advertisement header fields (everything after the checksum up to
/// the options)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterAdvertisementFields {
    pub cur_hop_limit: u8,
    /// M flag
    pub managed: bool,
    /// O flag
    pub other_config: bool,
    /// Seconds; 0 means "not a default router"
    pub router_lifetime: u16,
    pub reachable_time: u32,
    pub retrans_timer: u32,
}

impl Default for RouterAdvertisementFields {
    fn default() -> Self {
        Self {
            cur_hop_limit: 64,
            managed: false,
            other_config: false,
            router_lifetime: 1800,
            reachable_time: 0,
            retrans_timer: 0,
        }
    }
}

/// An ICMPv6 Neighbor Discovery message with its options
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NdMessage {
    NeighborSolicitation {
        target: Ipv6Addr,
        options: Vec<NdOption>,
    },
    NeighborAdvertisement {
        flags: NaFlags,
        target: Ipv6Addr,
        options: Vec<NdOption>,
    },
    RouterAdvertisement {
        fields: RouterAdvertisementFields,
        options: Vec<NdOption>,
    },
}

impl NdMessage {
    /// type + code + checksum
    pub const HEADER_LEN: usize = 4;

    /// Offset of the checksum within the message
    pub(crate) const CHECKSUM_OFFSET: usize = 2;

    pub fn message_type(&self) -> NdMessageType {
        match self {
            NdMessage::NeighborSolicitation { .. } => NdMessageType::NeighborSolicitation,
            NdMessage::NeighborAdvertisement { .. } => NdMessageType::NeighborAdvertisement,
            NdMessage::RouterAdvertisement { .. } => NdMessageType::RouterAdvertisement,
        }
    }

    pub fn options(&self) -> &[NdOption] {
        match self {
            NdMessage::NeighborSolicitation { options, .. }
            | NdMessage::NeighborAdvertisement { options, .. }
            | NdMessage::RouterAdvertisement { options, .. } => options,
        }
    }

    pub fn options_mut(&mut self) -> &mut Vec<NdOption> {
        match self {
            NdMessage::NeighborSolicitation { options, .. }
            | NdMessage::NeighborAdvertisement { options, .. }
            | NdMessage::RouterAdvertisement { options, .. } => options,
        }
    }

    fn body_len(&self) -> usize {
        match self {
            // reserved/flags word + target
            NdMessage::NeighborSolicitation { .. } | NdMessage::NeighborAdvertisement { .. } => 20,
            NdMessage::RouterAdvertisement { .. } => 12,
        }
    }

    /// Encoded size including options
    pub fn len(&self) -> usize {
        Self::HEADER_LEN
            + self.body_len()
            + self.options().iter().map(NdOption::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Check the options fit their length fields and the message fits an
    /// IPv6 payload.
    pub fn validate(&self) -> Result<()> {
        for option in self.options() {
            option.validate()?;
        }
        if self.len() > u16::MAX as usize {
            return Err(Error::encoding(format!(
                "{:?} with {} options is {} bytes, larger than an IPv6 payload",
                self.message_type(),
                self.options().len(),
                self.len()
            )));
        }
        Ok(())
    }

    /// Write the message with a zero checksum
    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_u8(self.message_type() as u8);
        buf.put_u8(0); // code
        buf.put_u16(0); // checksum, filled in by the builder

        match self {
            NdMessage::NeighborSolicitation { target, .. } => {
                buf.put_u32(0);
                buf.put_slice(&target.octets());
            }
            NdMessage::NeighborAdvertisement { flags, target, .. } => {
                buf.put_u32(flags.bits());
                buf.put_slice(&target.octets());
            }
            NdMessage::RouterAdvertisement { fields, .. } => {
                buf.put_u8(fields.cur_hop_limit);
                let mut flags = 0u8;
                if fields.managed {
                    flags |= 0x80;
                }
                if fields.other_config {
                    flags |= 0x40;
                }
                buf.put_u8(flags);
                buf.put_u16(fields.router_lifetime);
                buf.put_u32(fields.reachable_time);
                buf.put_u32(fields.retrans_timer);
            }
        }

        for option in self.options() {
            option.write(buf);
        }
    }
}
