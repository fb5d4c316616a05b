//! IPv6 fixed header construction and parsing

use bytes::{BufMut, BytesMut};
use ndforge_core::IPPROTO_ICMPV6;
use std::net::Ipv6Addr;

/// Next-header value meaning nothing follows (RFC 8200)
pub const NO_NEXT_HEADER: u8 = 59;

/// Hop limit Neighbor Discovery receivers require (RFC 4861 s7.1.1)
pub const ND_HOP_LIMIT: u8 = 255;

/// IPv6 fixed header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv6Header {
    pub source: Ipv6Addr,
    pub destination: Ipv6Addr,
    pub traffic_class: u8,
    /// 20-bit flow label
    pub flow_label: u32,
    /// Rewritten by the builder from the layer that follows
    pub next_header: u8,
    pub hop_limit: u8,
}

impl Ipv6Header {
    /// Fixed header size
    pub const LEN: usize = 40;

    /// Offset of the payload-length field within the header
    pub(crate) const PAYLOAD_LENGTH_OFFSET: usize = 4;

    pub fn new(source: Ipv6Addr, destination: Ipv6Addr) -> Self {
        Self {
            source,
            destination,
            traffic_class: 0,
            flow_label: 0,
            next_header: IPPROTO_ICMPV6,
            hop_limit: ND_HOP_LIMIT,
        }
    }

    pub fn with_hop_limit(mut self, hop_limit: u8) -> Self {
        self.hop_limit = hop_limit;
        self
    }

    /// Write the header with a zero payload length
    pub(crate) fn write(&self, buf: &mut BytesMut) {
        let first_word = (6u32 << 28)
            | ((self.traffic_class as u32) << 20)
            | (self.flow_label & 0x000F_FFFF);
        buf.put_u32(first_word);
        buf.put_u16(0);
        buf.put_u8(self.next_header);
        buf.put_u8(self.hop_limit);
        buf.put_slice(&self.source.octets());
        buf.put_slice(&self.destination.octets());
    }

    /// Parse the header at the start of `data`, returning it together with
    /// its payload-length field.
    pub fn from_bytes(data: &[u8]) -> Option<(Self, u16)> {
        if data.len() < Self::LEN || data[0] >> 4 != 6 {
            return None;
        }

        let first_word = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
        let mut source = [0u8; 16];
        source.copy_from_slice(&data[8..24]);
        let mut destination = [0u8; 16];
        destination.copy_from_slice(&data[24..40]);

        let header = Self {
            source: Ipv6Addr::from(source),
            destination: Ipv6Addr::from(destination),
            traffic_class: ((first_word >> 20) & 0xFF) as u8,
            flow_label: first_word & 0x000F_FFFF,
            next_header: data[6],
            hop_limit: data[7],
        };
        Some((header, u16::from_be_bytes([data[4], data[5]])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let src: Ipv6Addr = "fe80::1".parse().unwrap();
        let dst: Ipv6Addr = "ff02::1".parse().unwrap();
        let mut header = Ipv6Header::new(src, dst);
        header.traffic_class = 0xAB;
        header.flow_label = 0x12345;

        let mut buf = BytesMut::new();
        header.write(&mut buf);

        assert_eq!(buf.len(), Ipv6Header::LEN);
        assert_eq!(&buf[0..4], &[0x6A, 0xB1, 0x23, 0x45]);
        assert_eq!(&buf[4..6], &[0, 0]);
        assert_eq!(buf[6], 58);
        assert_eq!(buf[7], 255);
        assert_eq!(&buf[8..24], &src.octets());
        assert_eq!(&buf[24..40], &dst.octets());

        let (parsed, payload_len) = Ipv6Header::from_bytes(&buf).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(payload_len, 0);
    }

    #[test]
    fn test_rejects_non_ipv6() {
        let mut buf = vec![0u8; 40];
        buf[0] = 0x45;
        assert!(Ipv6Header::from_bytes(&buf).is_none());
        assert!(Ipv6Header::from_bytes(&[0x60; 39]).is_none());
    }
}
