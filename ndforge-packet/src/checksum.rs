//! Checksum calculations for ICMPv6
//!
//! The Internet Checksum (RFC 1071) and the IPv6 upper-layer variant that
//! prefixes the pseudo-header from RFC 8200 s8.1.

use ndforge_core::IPPROTO_ICMPV6;
use std::net::Ipv6Addr;

/// Calculates the Internet Checksum as defined in RFC 1071.
///
/// The data is summed as big-endian 16-bit words (an odd trailing byte is
/// padded with zero), the carries are folded back in and the one's
/// complement of the result is returned.
///
/// # Examples
///
/// ```
/// use ndforge_packet::checksum::internet_checksum;
///
/// let data = vec![0x86, 0x00, 0x00, 0x00];
/// let checksum = internet_checksum(&data);
/// assert_eq!(checksum, !0x8600);
/// ```
pub fn internet_checksum(data: &[u8]) -> u16 {
    !checksum_accumulate(data) as u16
}

/// Folded 16-bit one's complement sum of `data`, before the final complement.
pub fn checksum_accumulate(data: &[u8]) -> u32 {
    let mut sum: u32 = 0;

    let mut chunks = data.chunks_exact(2);
    for chunk in &mut chunks {
        let word = u16::from_be_bytes([chunk[0], chunk[1]]);
        sum += word as u32;
    }

    if let Some(&byte) = chunks.remainder().first() {
        sum += (byte as u32) << 8;
    }

    fold(sum)
}

fn fold(mut sum: u32) -> u32 {
    while (sum >> 16) != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    sum
}

/// Checksum of an IPv6 upper-layer message including the pseudo-header:
/// source address, destination address, 32-bit upper-layer length and
/// next-header value.
///
/// `data` is the complete upper-layer message with its checksum field
/// zeroed.
///
/// # Examples
///
/// ```
/// use std::net::Ipv6Addr;
/// use ndforge_packet::checksum::{ipv6_checksum, verify_icmpv6};
///
/// let src: Ipv6Addr = "fe80::1".parse().unwrap();
/// let dst: Ipv6Addr = "ff02::1".parse().unwrap();
/// let mut msg = vec![136, 0, 0, 0, 0x20, 0, 0, 0];
/// msg.extend_from_slice(&src.octets());
///
/// let checksum = ipv6_checksum(&src, &dst, 58, &msg);
/// msg[2..4].copy_from_slice(&checksum.to_be_bytes());
/// assert!(verify_icmpv6(&src, &dst, &msg));
/// ```
pub fn ipv6_checksum(src: &Ipv6Addr, dst: &Ipv6Addr, next_header: u8, data: &[u8]) -> u16 {
    let len = data.len() as u32;
    let sum = checksum_accumulate(&src.octets())
        + checksum_accumulate(&dst.octets())
        + (len >> 16)
        + (len & 0xFFFF)
        + next_header as u32
        + checksum_accumulate(data);

    !fold(sum) as u16
}

/// Validates an Internet checksum.
///
/// Summing data that already carries a correct checksum yields 0 (or
/// 0xFFFF, its one's complement twin).
pub fn validate_checksum(data: &[u8]) -> bool {
    let result = internet_checksum(data);
    result == 0 || result == 0xFFFF
}

/// Recompute the ICMPv6 checksum over a finished message, checksum field
/// included, and report whether it is consistent.
pub fn verify_icmpv6(src: &Ipv6Addr, dst: &Ipv6Addr, message: &[u8]) -> bool {
    let result = ipv6_checksum(src, dst, IPPROTO_ICMPV6, message);
    result == 0 || result == 0xFFFF
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internet_checksum_empty() {
        let data = vec![];
        let checksum = internet_checksum(&data);
        assert_eq!(checksum, 0xFFFF);
    }

    #[test]
    fn test_internet_checksum_rfc1071_example() {
        // RFC 1071 s3: words 0001 f203 f4f5 f6f7 sum to ddf2 after folding
        let data = vec![0x00, 0x01, 0xf2, 0x03, 0xf4, 0xf5, 0xf6, 0xf7];
        assert_eq!(checksum_accumulate(&data), 0xddf2);
        assert_eq!(internet_checksum(&data), !0xddf2);
    }

    #[test]
    fn test_internet_checksum_odd_length() {
        let data = vec![0x00, 0x01, 0x02];
        assert_eq!(checksum_accumulate(&data), 0x0201);
    }

    #[test]
    fn test_checksum_complement_identity() {
        let data = vec![0x12, 0x34, 0x56, 0x78];
        let checksum = internet_checksum(&data);

        let mut data_with_checksum = data;
        data_with_checksum.extend_from_slice(&checksum.to_be_bytes());

        assert!(validate_checksum(&data_with_checksum));
    }

    #[test]
    fn test_ipv6_checksum_matches_concatenated_pseudo_header() {
        let src: Ipv6Addr = "fe80::200:ff:fe00:1".parse().unwrap();
        let dst: Ipv6Addr = "ff02::1:ff00:2".parse().unwrap();
        let data: Vec<u8> = (0u8..31).collect();

        let mut pseudo = Vec::new();
        pseudo.extend_from_slice(&src.octets());
        pseudo.extend_from_slice(&dst.octets());
        pseudo.extend_from_slice(&(data.len() as u32).to_be_bytes());
        pseudo.extend_from_slice(&[0, 0, 0, 58]);
        pseudo.extend_from_slice(&data);

        assert_eq!(ipv6_checksum(&src, &dst, 58, &data), internet_checksum(&pseudo));
    }

    #[test]
    fn test_verify_icmpv6_detects_corruption() {
        let src: Ipv6Addr = "fe80::1".parse().unwrap();
        let dst: Ipv6Addr = "fe80::2".parse().unwrap();
        let mut msg = vec![135, 0, 0, 0, 0, 0, 0, 0];
        msg.extend_from_slice(&dst.octets());

        let checksum = ipv6_checksum(&src, &dst, 58, &msg);
        msg[2..4].copy_from_slice(&checksum.to_be_bytes());
        assert!(verify_icmpv6(&src, &dst, &msg));

        msg[10] ^= 0x01;
        assert!(!verify_icmpv6(&src, &dst, &msg));
        msg[10] ^= 0x01;

        // bound to the addresses as well as the payload
        let other: Ipv6Addr = "fe80::3".parse().unwrap();
        assert!(!verify_icmpv6(&other, &dst, &msg));
    }
}
