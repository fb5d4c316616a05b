//! Ethernet II header construction and parsing

use bytes::{BufMut, BytesMut};
use ndforge_core::{ethertypes, MacAddr};
use std::fmt;

/// EtherType values the builder knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EtherType {
    /// IPv6 (0x86DD)
    IPv6,
    /// Custom EtherType
    Custom(u16),
}

impl EtherType {
    /// Convert EtherType to u16 value
    pub fn to_u16(self) -> u16 {
        match self {
            EtherType::IPv6 => ethertypes::IPV6,
            EtherType::Custom(val) => val,
        }
    }

    /// Create EtherType from u16 value
    pub fn from_u16(value: u16) -> Self {
        match value {
            ethertypes::IPV6 => EtherType::IPv6,
            val => EtherType::Custom(val),
        }
    }
}

impl fmt::Display for EtherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EtherType::IPv6 => write!(f, "IPv6"),
            EtherType::Custom(val) => write!(f, "0x{:04X}", val),
        }
    }
}

/// Ethernet II header (no FCS, no padding)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthernetHeader {
    /// Destination MAC address
    pub destination: MacAddr,
    /// Source MAC address
    pub source: MacAddr,
    /// EtherType; rewritten by the builder when an inner layer follows
    pub ethertype: EtherType,
}

impl EthernetHeader {
    /// Ethernet header size (dst + src + type)
    pub const LEN: usize = 14;

    pub fn new(destination: MacAddr, source: MacAddr) -> Self {
        Self {
            destination,
            source,
            ethertype: EtherType::IPv6,
        }
    }

    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_slice(self.destination.as_bytes());
        buf.put_slice(self.source.as_bytes());
        buf.put_u16(self.ethertype.to_u16());
    }

    /// Parse the header at the start of `data`
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::LEN {
            return None;
        }

        let mut destination = [0u8; 6];
        destination.copy_from_slice(&data[0..6]);
        let mut source = [0u8; 6];
        source.copy_from_slice(&data[6..12]);

        Some(Self {
            destination: MacAddr(destination),
            source: MacAddr(source),
            ethertype: EtherType::from_u16(u16::from_be_bytes([data[12], data[13]])),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ethertype_conversion() {
        assert_eq!(EtherType::IPv6.to_u16(), 0x86DD);
        assert_eq!(EtherType::from_u16(0x86DD), EtherType::IPv6);
        assert_eq!(EtherType::from_u16(0x0800), EtherType::Custom(0x0800));
        assert_eq!(EtherType::Custom(0x0800).to_string(), "0x0800");
    }

    #[test]
    fn test_header_write_and_parse() {
        let src = MacAddr([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
        let dst = MacAddr([0x33, 0x33, 0x00, 0x00, 0x00, 0x01]);

        let mut buf = BytesMut::new();
        EthernetHeader::new(dst, src).write(&mut buf);

        assert_eq!(buf.len(), EthernetHeader::LEN);
        assert_eq!(&buf[0..6], dst.as_bytes());
        assert_eq!(&buf[6..12], src.as_bytes());
        assert_eq!(&buf[12..14], &[0x86, 0xDD]);

        let parsed = EthernetHeader::from_bytes(&buf).unwrap();
        assert_eq!(parsed, EthernetHeader::new(dst, src));
        assert!(EthernetHeader::from_bytes(&buf[..13]).is_none());
    }
}
