//! CLI argument parsing
//!
//! Every value is converted to its typed form here (`MacAddr`, `Ipv6Addr`,
//! `Duration`) so nothing past this module handles raw strings.

use clap::{Args, Parser, Subcommand};
use ndforge_attack::{FailurePolicy, FrameTemplate, MessageTemplate, SpoofTarget};
use ndforge_core::MacAddr;
use ndforge_packet::{NaFlags, PrefixInformation, RouterAdvertisementFields};
use std::net::Ipv6Addr;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "ndforge")]
#[command(version, about = "IPv6 Neighbor Discovery spoofing tool", long_about = None)]
pub struct Cli {
    /// Verbose output (-v, -vv, -vvv for increasing verbosity)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Stop every worker after this many seconds (0 = no limit)
    #[arg(short = 'd', long, value_name = "SECONDS", default_value = "0")]
    pub duration: u64,

    /// Consecutive transmit failures before a worker gives up (0 = never)
    #[arg(long, value_name = "N", default_value = "0")]
    pub max_failures: u32,

    /// Build frames and record them in memory instead of sending them
    #[arg(long)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every sending subcommand
#[derive(Args, Debug, Clone)]
pub struct SendOptions {
    /// Interface to send on; repeat for several interfaces
    #[arg(short = 'i', long = "interface", value_name = "IFACE", required = true)]
    pub interfaces: Vec<String>,

    /// Source MAC address (default: the interface's)
    #[arg(short = 's', long, value_name = "MAC")]
    pub src_mac: Option<MacAddr>,

    /// Destination MAC address (default: derived from a multicast destination)
    #[arg(short = 'd', long, value_name = "MAC")]
    pub dst_mac: Option<MacAddr>,

    /// Source IPv6 address (default: the interface's link-local address)
    #[arg(short = 'S', long, value_name = "IPV6")]
    pub src_ip: Option<Ipv6Addr>,

    /// Destination IPv6 address
    #[arg(short = 'D', long, value_name = "IPV6")]
    pub dst_ip: Option<Ipv6Addr>,

    /// Frames per worker (0 = until stopped)
    #[arg(short = 'r', long, value_name = "COUNT", default_value = "1")]
    pub repeat: u64,

    /// Delay between frames in seconds, fractions allowed
    #[arg(short = 'z', long, value_name = "SECONDS", default_value = "1", value_parser = parse_interval)]
    pub interval: Duration,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send Neighbor Advertisements
    #[command(alias = "neighbor-advert")]
    Na {
        #[command(flatten)]
        send: SendOptions,

        /// Address to advertise; repeat for several (default: source IP)
        #[arg(short = 'T', long = "target-ip", value_name = "IPV6")]
        target_ips: Vec<Ipv6Addr>,

        /// Link-layer address to claim for the target (default: source MAC)
        #[arg(short = 't', long, value_name = "MAC")]
        target_mac: Option<MacAddr>,

        /// Set the router flag
        #[arg(long)]
        router: bool,

        /// Set the solicited flag
        #[arg(long)]
        solicited: bool,

        /// Clear the override flag
        #[arg(long)]
        no_override: bool,
    },

    /// Send Neighbor Solicitations
    #[command(alias = "neighbor-solicit")]
    Ns {
        #[command(flatten)]
        send: SendOptions,

        /// Address to solicit; repeat for several
        #[arg(short = 'T', long = "target-ip", value_name = "IPV6", required = true)]
        target_ips: Vec<Ipv6Addr>,

        /// Leave out the source link-layer address option
        #[arg(long)]
        no_slla: bool,
    },

    /// Send Router Advertisements
    #[command(alias = "router-advert")]
    Ra {
        #[command(flatten)]
        send: SendOptions,

        /// Router address the advertisement comes from (overrides --src-ip)
        #[arg(short = 'R', long, value_name = "IPV6")]
        router_ip: Option<Ipv6Addr>,

        /// Prefix to announce
        #[arg(short = 'p', long, value_name = "IPV6")]
        prefix: Option<Ipv6Addr>,

        /// Prefix length
        #[arg(long, default_value = "64", value_parser = clap::value_parser!(u8).range(0..=128))]
        prefix_len: u8,

        /// Router lifetime in seconds (0 withdraws the default route)
        #[arg(long, default_value = "1800")]
        router_lifetime: u16,

        /// Prefix valid lifetime in seconds
        #[arg(long, default_value = "2592000")]
        valid_lifetime: u32,

        /// Prefix preferred lifetime in seconds
        #[arg(long, default_value = "604800")]
        preferred_lifetime: u32,

        /// Link MTU to announce
        #[arg(long)]
        mtu: Option<u32>,

        /// Set the managed address configuration flag
        #[arg(long)]
        managed: bool,

        /// Set the other configuration flag
        #[arg(long)]
        other_config: bool,
    },

    /// List available network interfaces
    Interfaces,
}

fn parse_interval(value: &str) -> Result<Duration, String> {
    let secs: f64 = value
        .parse()
        .map_err(|_| format!("'{}' is not a number of seconds", value))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(format!("interval must be a non-negative number, got {}", value));
    }
    Ok(Duration::from_secs_f64(secs))
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn run_duration(&self) -> Option<Duration> {
        (self.duration > 0).then(|| Duration::from_secs(self.duration))
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy {
            max_consecutive_failures: (self.max_failures > 0).then_some(self.max_failures),
        }
    }
}

impl SendOptions {
    fn template(&self, message: MessageTemplate) -> FrameTemplate {
        FrameTemplate {
            src_mac: self.src_mac,
            dst_mac: self.dst_mac,
            src_ip: self.src_ip,
            dst_ip: self.dst_ip,
            message,
        }
    }

    /// One target per interface for each template
    fn targets(&self, templates: Vec<FrameTemplate>) -> Vec<SpoofTarget> {
        let mut targets = Vec::with_capacity(self.interfaces.len() * templates.len());
        for interface in &self.interfaces {
            for template in &templates {
                targets.push(SpoofTarget {
                    interface: interface.clone(),
                    template: template.clone(),
                    repeat: (self.repeat > 0).then_some(self.repeat),
                    interval: self.interval,
                });
            }
        }
        targets
    }
}

impl Commands {
    /// Expand the command into one target per interface and address
    pub fn spoof_targets(&self) -> Vec<SpoofTarget> {
        match self {
            Commands::Na {
                send,
                target_ips,
                target_mac,
                router,
                solicited,
                no_override,
            } => {
                let flags = NaFlags {
                    router_flag: *router,
                    solicited_flag: *solicited,
                    override_flag: !*no_override,
                };
                let advert = |target_ip| {
                    send.template(MessageTemplate::NeighborAdvertisement {
                        target_ip,
                        target_mac: *target_mac,
                        flags,
                    })
                };
                let templates = if target_ips.is_empty() {
                    vec![advert(None)]
                } else {
                    target_ips.iter().map(|ip| advert(Some(*ip))).collect()
                };
                send.targets(templates)
            }
            Commands::Ns {
                send,
                target_ips,
                no_slla,
            } => {
                let templates = target_ips
                    .iter()
                    .map(|ip| {
                        send.template(MessageTemplate::NeighborSolicitation {
                            target_ip: *ip,
                            source_link_layer: !*no_slla,
                        })
                    })
                    .collect();
                send.targets(templates)
            }
            Commands::Ra {
                send,
                router_ip,
                prefix,
                prefix_len,
                router_lifetime,
                valid_lifetime,
                preferred_lifetime,
                mtu,
                managed,
                other_config,
            } => {
                let fields = RouterAdvertisementFields {
                    managed: *managed,
                    other_config: *other_config,
                    router_lifetime: *router_lifetime,
                    ..Default::default()
                };
                let prefix = prefix.map(|prefix| PrefixInformation {
                    prefix,
                    prefix_len: *prefix_len,
                    on_link: true,
                    autonomous: true,
                    valid_lifetime: *valid_lifetime,
                    preferred_lifetime: *preferred_lifetime,
                });
                let mut template = send.template(MessageTemplate::RouterAdvertisement {
                    fields,
                    prefix,
                    mtu: *mtu,
                });
                if router_ip.is_some() {
                    template.src_ip = *router_ip;
                }
                send.targets(vec![template])
            }
            Commands::Interfaces => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("ndforge").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_na_defaults() {
        let cli = parse(&["na", "-i", "eth0"]);
        assert!(cli.run_duration().is_none());
        assert_eq!(cli.failure_policy(), FailurePolicy::default());

        let targets = cli.command.spoof_targets();
        assert_eq!(targets.len(), 1);
        let target = &targets[0];
        assert_eq!(target.interface, "eth0");
        assert_eq!(target.repeat, Some(1));
        assert_eq!(target.interval, Duration::from_secs(1));
        assert_eq!(target.template.src_mac, None);
        assert_eq!(
            target.template.message,
            MessageTemplate::NeighborAdvertisement {
                target_ip: None,
                target_mac: None,
                flags: NaFlags {
                    router_flag: false,
                    solicited_flag: false,
                    override_flag: true,
                },
            }
        );
    }

    #[test]
    fn test_every_interface_target_pair_is_a_worker() {
        let cli = parse(&[
            "-d", "30", "--max-failures", "5", "neighbor-advert", "-i", "eth0", "-i", "eth1",
            "-T", "fe80::1", "-T", "fe80::2", "-s", "02:00:00:00:00:01", "-r", "0", "-z",
            "0.25", "--no-override", "--router",
        ]);
        assert_eq!(cli.run_duration(), Some(Duration::from_secs(30)));
        assert_eq!(cli.failure_policy(), FailurePolicy::give_up_after(5));

        let targets = cli.command.spoof_targets();
        assert_eq!(targets.len(), 4);
        let pairs: Vec<String> = targets.iter().map(|t| t.to_string()).collect();
        assert_eq!(
            pairs,
            vec![
                "neighbor-advert on eth0 for fe80::1",
                "neighbor-advert on eth0 for fe80::2",
                "neighbor-advert on eth1 for fe80::1",
                "neighbor-advert on eth1 for fe80::2",
            ]
        );
        for target in &targets {
            assert_eq!(target.repeat, None);
            assert_eq!(target.interval, Duration::from_millis(250));
            assert_eq!(
                target.template.src_mac,
                Some(MacAddr([0x02, 0, 0, 0, 0, 0x01]))
            );
            match &target.template.message {
                MessageTemplate::NeighborAdvertisement { flags, .. } => {
                    assert!(flags.router_flag);
                    assert!(!flags.override_flag);
                }
                other => panic!("unexpected template {:?}", other),
            }
        }
    }

    #[test]
    fn test_ns_requires_target() {
        assert!(Cli::try_parse_from(["ndforge", "ns", "-i", "eth0"]).is_err());

        let cli = parse(&["ns", "-i", "eth0", "-T", "fe80::9", "-S", "::", "--no-slla"]);
        let targets = cli.command.spoof_targets();
        assert_eq!(targets[0].template.src_ip, Some(Ipv6Addr::UNSPECIFIED));
        assert_eq!(
            targets[0].template.message,
            MessageTemplate::NeighborSolicitation {
                target_ip: "fe80::9".parse().unwrap(),
                source_link_layer: false,
            }
        );
    }

    #[test]
    fn test_ra_options() {
        let cli = parse(&[
            "ra", "-i", "eth0", "-S", "fe80::aa", "-R", "fe80::1", "-p", "2001:db8::",
            "--prefix-len", "48", "--router-lifetime", "0", "--mtu", "1280",
        ]);
        let targets = cli.command.spoof_targets();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].template.src_ip, Some("fe80::1".parse().unwrap()));

        match &targets[0].template.message {
            MessageTemplate::RouterAdvertisement {
                fields,
                prefix,
                mtu,
            } => {
                assert_eq!(fields.router_lifetime, 0);
                assert_eq!(fields.cur_hop_limit, 64);
                let prefix = prefix.unwrap();
                assert_eq!(prefix.prefix_len, 48);
                assert_eq!(prefix.valid_lifetime, 2_592_000);
                assert_eq!(*mtu, Some(1280));
            }
            other => panic!("unexpected template {:?}", other),
        }
    }

    #[test]
    fn test_rejects_bad_values() {
        for args in [
            vec!["ndforge", "na", "-i", "eth0", "-s", "02:00:00:00:00"],
            vec!["ndforge", "na", "-i", "eth0", "-T", "10.0.0.1"],
            vec!["ndforge", "na", "-i", "eth0", "-z", "-1"],
            vec!["ndforge", "ra", "-i", "eth0", "--prefix-len", "129"],
            vec!["ndforge", "na"],
        ] {
            assert!(Cli::try_parse_from(args.clone()).is_err(), "{:?}", args);
        }
    }

    #[test]
    fn test_interfaces_command() {
        let cli = parse(&["-v", "interfaces"]);
        assert_eq!(cli.verbose, 1);
        assert!(matches!(cli.command, Commands::Interfaces));
        assert!(cli.command.spoof_targets().is_empty());
    }
}
