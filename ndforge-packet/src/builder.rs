//! Two-pass frame builder
//!
//! A [`Packet`] is an ordered, still mutable list of [`Layer`]s. Calling
//! [`Packet::finalize`] turns it into an immutable [`Frame`]:
//!
//! 1. Structural fields (EtherType, next header) are resolved from layer
//!    order and every layer is validated.
//! 2. Length pass: each layer is serialized once with its length-dependent
//!    fields zeroed, recording where it landed.
//! 3. Backfill pass: the IPv6 payload length is written from the recorded
//!    spans, then the ICMPv6 checksum is computed over the pseudo-header and
//!    the finished message and stored.

use crate::checksum::ipv6_checksum;
use crate::ethernet::{EtherType, EthernetHeader};
use crate::icmpv6::{NdMessage, NdOption};
use crate::ipv6::{Ipv6Header, NO_NEXT_HEADER};
use bytes::{Bytes, BytesMut};
use ndforge_core::{Error, Result, IPPROTO_ICMPV6};
use std::net::Ipv6Addr;
use tracing::trace;

/// One protocol layer of a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layer {
    Ethernet(EthernetHeader),
    Ipv6(Ipv6Header),
    Icmpv6(NdMessage),
}

/// Layer discriminant, used in spans
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    Ethernet,
    Ipv6,
    Icmpv6,
}

impl Layer {
    pub fn kind(&self) -> LayerKind {
        match self {
            Layer::Ethernet(_) => LayerKind::Ethernet,
            Layer::Ipv6(_) => LayerKind::Ipv6,
            Layer::Icmpv6(_) => LayerKind::Icmpv6,
        }
    }

    /// Serialized size; depends only on the layer's own fields
    pub fn len(&self) -> usize {
        match self {
            Layer::Ethernet(_) => EthernetHeader::LEN,
            Layer::Ipv6(_) => Ipv6Header::LEN,
            Layer::Icmpv6(message) => message.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// First pass: write the layer with payload length and checksum zeroed
    pub fn serialize(&self, buf: &mut BytesMut) {
        match self {
            Layer::Ethernet(header) => header.write(buf),
            Layer::Ipv6(header) => header.write(buf),
            Layer::Icmpv6(message) => message.write(buf),
        }
    }
}

/// Where a layer ended up in the finished frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerSpan {
    pub kind: LayerKind,
    pub offset: usize,
    pub len: usize,
}

/// Ordered layers, outer to inner, that have not been serialized yet
///
/// # Examples
///
/// ```
/// use ndforge_core::MacAddr;
/// use ndforge_packet::{EthernetHeader, Ipv6Header, NaFlags, NdMessage, NdOption, Packet};
///
/// let mac = MacAddr([0x02, 0, 0, 0, 0, 0x01]);
/// let target = "fe80::1".parse().unwrap();
///
/// let frame = Packet::new()
///     .ethernet(EthernetHeader::new(MacAddr([0x33, 0x33, 0, 0, 0, 1]), mac))
///     .ipv6(Ipv6Header::new(target, "ff02::1".parse().unwrap()))
///     .icmpv6(NdMessage::NeighborAdvertisement {
///         flags: NaFlags { override_flag: true, ..Default::default() },
///         target,
///         options: vec![NdOption::TargetLinkLayerAddress(mac)],
///     })
///     .finalize()
///     .unwrap();
///
/// assert_eq!(frame.len(), 14 + 40 + 32);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Packet {
    layers: Vec<Layer>,
}

impl Packet {
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    pub fn from_layers(layers: Vec<Layer>) -> Self {
        Self { layers }
    }

    /// Append a layer
    pub fn push(&mut self, layer: Layer) {
        self.layers.push(layer);
    }

    /// Add an Ethernet layer
    pub fn ethernet(mut self, header: EthernetHeader) -> Self {
        self.layers.push(Layer::Ethernet(header));
        self
    }

    /// Add an IPv6 layer
    pub fn ipv6(mut self, header: Ipv6Header) -> Self {
        self.layers.push(Layer::Ipv6(header));
        self
    }

    /// Add an ICMPv6 Neighbor Discovery layer
    pub fn icmpv6(mut self, message: NdMessage) -> Self {
        self.layers.push(Layer::Icmpv6(message));
        self
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut Vec<Layer> {
        &mut self.layers
    }

    /// The ND message, if the packet carries one
    pub fn message(&self) -> Option<&NdMessage> {
        self.layers.iter().find_map(|layer| match layer {
            Layer::Icmpv6(message) => Some(message),
            _ => None,
        })
    }

    /// Sum of the layers' serialized sizes
    pub fn len(&self) -> usize {
        self.layers.iter().map(Layer::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Resolve, serialize and checksum every layer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] when the layer order is not
    /// Ethernet[/IPv6[/ICMPv6]], when an option does not fit its length
    /// field, or when the options are not allowed together.
    pub fn finalize(mut self) -> Result<Frame> {
        self.resolve()?;

        // Length pass
        let mut buf = BytesMut::with_capacity(self.len());
        let mut spans = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            let offset = buf.len();
            layer.serialize(&mut buf);
            debug_assert_eq!(buf.len() - offset, layer.len());
            spans.push(LayerSpan {
                kind: layer.kind(),
                offset,
                len: layer.len(),
            });
        }

        // Backfill pass
        let total = buf.len();
        let mut addresses: Option<(Ipv6Addr, Ipv6Addr)> = None;
        for (layer, span) in self.layers.iter().zip(&spans) {
            match layer {
                Layer::Ethernet(_) => {}
                Layer::Ipv6(header) => {
                    let payload_len = (total - span.offset - span.len) as u16;
                    let at = span.offset + Ipv6Header::PAYLOAD_LENGTH_OFFSET;
                    buf[at..at + 2].copy_from_slice(&payload_len.to_be_bytes());
                    addresses = Some((header.source, header.destination));
                }
                Layer::Icmpv6(_) => {
                    let (src, dst) = addresses
                        .ok_or_else(|| Error::encoding("ICMPv6 layer without an IPv6 layer"))?;
                    let message = &buf[span.offset..span.offset + span.len];
                    let checksum = ipv6_checksum(&src, &dst, IPPROTO_ICMPV6, message);
                    let at = span.offset + NdMessage::CHECKSUM_OFFSET;
                    buf[at..at + 2].copy_from_slice(&checksum.to_be_bytes());
                }
            }
        }

        trace!(len = total, layers = spans.len(), "Frame finalized");

        Ok(Frame {
            bytes: buf.freeze(),
            spans,
        })
    }

    /// Validate layer order and contents, and fill in the fields that
    /// follow from it.
    fn resolve(&mut self) -> Result<()> {
        let kinds: Vec<LayerKind> = self.layers.iter().map(Layer::kind).collect();
        match kinds.as_slice() {
            [LayerKind::Ethernet]
            | [LayerKind::Ethernet, LayerKind::Ipv6]
            | [LayerKind::Ethernet, LayerKind::Ipv6, LayerKind::Icmpv6] => {}
            [] => return Err(Error::encoding("packet has no layers")),
            other => {
                return Err(Error::encoding(format!(
                    "unsupported layer order {:?}, expected Ethernet/IPv6/ICMPv6",
                    other
                )))
            }
        }

        let has_upper = kinds.len() == 3;
        let mut source = None;
        for layer in &mut self.layers {
            match layer {
                Layer::Ethernet(header) => {
                    if kinds.len() > 1 {
                        header.ethertype = EtherType::IPv6;
                    }
                }
                Layer::Ipv6(header) => {
                    header.next_header = if has_upper {
                        IPPROTO_ICMPV6
                    } else {
                        NO_NEXT_HEADER
                    };
                    source = Some(header.source);
                }
                Layer::Icmpv6(message) => {
                    message.validate()?;
                    check_option_combination(message, source)?;
                }
            }
        }
        Ok(())
    }
}

/// RFC 4861 s7.2.2: a solicitation from the unspecified address must not
/// carry a Source Link-Layer Address option.
fn check_option_combination(message: &NdMessage, source: Option<Ipv6Addr>) -> Result<()> {
    if let NdMessage::NeighborSolicitation { options, .. } = message {
        let unspecified = source.is_some_and(|s| s.is_unspecified());
        let has_slla = options
            .iter()
            .any(|o| matches!(o, NdOption::SourceLinkLayerAddress(_)));
        if unspecified && has_slla {
            return Err(Error::encoding(
                "a solicitation from :: must not carry a source link-layer address option",
            ));
        }
    }
    Ok(())
}

/// Build a frame from layers in one call
pub fn build(layers: Vec<Layer>) -> Result<Frame> {
    Packet::from_layers(layers).finalize()
}

/// A finished, immutable frame ready for transmit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Bytes,
    spans: Vec<LayerSpan>,
}

impl Frame {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn spans(&self) -> &[LayerSpan] {
        &self.spans
    }

    /// Bytes of the first layer of `kind`
    pub fn layer(&self, kind: LayerKind) -> Option<&[u8]> {
        self.spans
            .iter()
            .find(|s| s.kind == kind)
            .map(|s| &self.bytes[s.offset..s.offset + s.len])
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::verify_icmpv6;
    use crate::icmpv6::NaFlags;
    use ndforge_core::{ErrorCode, MacAddr};

    const SRC_MAC: MacAddr = MacAddr([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
    const DST_MAC: MacAddr = MacAddr([0x33, 0x33, 0x00, 0x00, 0x00, 0x01]);

    fn addr(s: &str) -> Ipv6Addr {
        s.parse().unwrap()
    }

    fn advert(options: Vec<NdOption>) -> NdMessage {
        NdMessage::NeighborAdvertisement {
            flags: NaFlags {
                override_flag: true,
                ..Default::default()
            },
            target: addr("fe80::1"),
            options,
        }
    }

    fn full_packet() -> Packet {
        Packet::new()
            .ethernet(EthernetHeader::new(DST_MAC, SRC_MAC))
            .ipv6(Ipv6Header::new(addr("fe80::1"), addr("ff02::1")))
            .icmpv6(advert(vec![NdOption::TargetLinkLayerAddress(SRC_MAC)]))
    }

    #[test]
    fn test_frame_length_is_sum_of_layers() {
        let packet = full_packet();
        let declared: Vec<usize> = packet.layers().iter().map(Layer::len).collect();
        let frame = packet.finalize().unwrap();

        assert_eq!(declared, vec![14, 40, 32]);
        assert_eq!(frame.len(), declared.iter().sum::<usize>());
        let spans: Vec<usize> = frame.spans().iter().map(|s| s.len).collect();
        assert_eq!(spans, declared);
    }

    #[test]
    fn test_backfilled_fields() {
        let frame = full_packet().finalize().unwrap();
        let bytes = frame.as_bytes();

        // payload length covers only the ICMPv6 message
        assert_eq!(&bytes[18..20], &32u16.to_be_bytes());
        assert_eq!(bytes[20], 58);

        let icmp = frame.layer(LayerKind::Icmpv6).unwrap();
        assert_ne!(&icmp[2..4], &[0, 0]);
        assert!(verify_icmpv6(&addr("fe80::1"), &addr("ff02::1"), icmp));
    }

    #[test]
    fn test_checksum_across_flag_and_option_combinations() {
        for bits in 0..8u8 {
            for with_option in [false, true] {
                let flags = NaFlags {
                    router_flag: bits & 1 != 0,
                    solicited_flag: bits & 2 != 0,
                    override_flag: bits & 4 != 0,
                };
                let options = if with_option {
                    vec![NdOption::TargetLinkLayerAddress(SRC_MAC)]
                } else {
                    vec![]
                };
                let src = addr("2001:db8::a");
                let dst = addr("2001:db8::b");
                let frame = build(vec![
                    Layer::Ethernet(EthernetHeader::new(DST_MAC, SRC_MAC)),
                    Layer::Ipv6(Ipv6Header::new(src, dst)),
                    Layer::Icmpv6(NdMessage::NeighborAdvertisement {
                        flags,
                        target: src,
                        options,
                    }),
                ])
                .unwrap();

                let icmp = frame.layer(LayerKind::Icmpv6).unwrap();
                assert!(verify_icmpv6(&src, &dst, icmp), "flags {:03b}", bits);
            }
        }
    }

    #[test]
    fn test_structural_fields_are_resolved() {
        let mut eth = EthernetHeader::new(DST_MAC, SRC_MAC);
        eth.ethertype = EtherType::Custom(0x0800);
        let mut ip = Ipv6Header::new(addr("fe80::1"), addr("ff02::1"));
        ip.next_header = 17;

        let frame = build(vec![
            Layer::Ethernet(eth),
            Layer::Ipv6(ip),
            Layer::Icmpv6(advert(vec![])),
        ])
        .unwrap();
        assert_eq!(&frame.as_bytes()[12..14], &[0x86, 0xDD]);
        assert_eq!(frame.as_bytes()[20], 58);

        let bare = build(vec![Layer::Ethernet(eth), Layer::Ipv6(ip)]).unwrap();
        assert_eq!(bare.as_bytes()[20], NO_NEXT_HEADER);
        assert_eq!(&bare.as_bytes()[18..20], &[0, 0]);
    }

    #[test]
    fn test_invalid_layer_orders() {
        let eth = Layer::Ethernet(EthernetHeader::new(DST_MAC, SRC_MAC));
        let ip = Layer::Ipv6(Ipv6Header::new(addr("fe80::1"), addr("ff02::1")));
        let icmp = Layer::Icmpv6(advert(vec![]));

        for layers in [
            vec![],
            vec![ip.clone(), eth.clone()],
            vec![eth.clone(), icmp.clone()],
            vec![eth.clone(), ip.clone(), icmp.clone(), icmp.clone()],
            vec![eth.clone(), eth.clone()],
        ] {
            let err = build(layers).unwrap_err();
            assert_eq!(err.code(), ErrorCode::Encoding);
        }
    }

    #[test]
    fn test_unspecified_source_with_slla_rejected() {
        let solicit = |options| NdMessage::NeighborSolicitation {
            target: addr("fe80::1"),
            options,
        };

        let dad = Packet::new()
            .ethernet(EthernetHeader::new(DST_MAC, SRC_MAC))
            .ipv6(Ipv6Header::new(Ipv6Addr::UNSPECIFIED, addr("ff02::1:ff00:1")));

        assert!(dad.clone().icmpv6(solicit(vec![])).finalize().is_ok());
        let err = dad
            .icmpv6(solicit(vec![NdOption::SourceLinkLayerAddress(SRC_MAC)]))
            .finalize()
            .unwrap_err();
        assert!(matches!(err, Error::Encoding(_)));
    }

    #[test]
    fn test_packet_stays_mutable_until_finalize() {
        let mut packet = full_packet();
        if let Some(Layer::Icmpv6(message)) = packet.layers_mut().last_mut() {
            message.options_mut().clear();
        }
        assert_eq!(packet.len(), 14 + 40 + 24);
        assert_eq!(packet.message().unwrap().options().len(), 0);

        let frame = packet.finalize().unwrap();
        assert_eq!(frame.len(), 78);
        assert_eq!(frame.as_ref().len(), 78);
    }
}
