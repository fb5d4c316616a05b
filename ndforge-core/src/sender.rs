//! Raw link-layer senders
//!
//! A [`Sender`] owns one link bound to one interface and writes complete
//! Ethernet frames to it. The link is behind a [`FrameLink`] so the same
//! sender can drive an `AF_PACKET` socket or an in-memory recorder.

use crate::{Error, Interface, MacAddr, Result};
use parking_lot::Mutex;
use socket2::{Domain, Socket, Type};
use std::io;
use std::os::fd::AsRawFd;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Something a finished frame can be written to
pub trait FrameLink: Send {
    /// Write one frame, returning how many bytes the link accepted
    fn send(&mut self, frame: &[u8]) -> io::Result<usize>;
}

/// `AF_PACKET`/`SOCK_RAW` socket bound to a single interface index
pub struct RawSocketLink {
    socket: Socket,
}

impl RawSocketLink {
    /// Open a raw packet socket and bind it to `interface`
    pub fn open(interface: &Interface) -> Result<Self> {
        // Protocol 0: transmit only, the kernel never queues inbound frames here.
        let socket = Socket::new(Domain::PACKET, Type::RAW, None)
            .map_err(|e| Error::from_open_error(&interface.name, e))?;

        let mut addr: libc::sockaddr_ll = unsafe { std::mem::zeroed() };
        addr.sll_family = libc::AF_PACKET as u16;
        addr.sll_ifindex = interface.index as i32;

        let ret = unsafe {
            libc::bind(
                socket.as_raw_fd(),
                &addr as *const libc::sockaddr_ll as *const libc::sockaddr,
                std::mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            )
        };
        if ret < 0 {
            return Err(Error::from_open_error(
                &interface.name,
                io::Error::last_os_error(),
            ));
        }

        debug!(
            interface = %interface.name,
            index = interface.index,
            "Bound AF_PACKET socket to interface"
        );

        Ok(Self { socket })
    }
}

impl FrameLink for RawSocketLink {
    fn send(&mut self, frame: &[u8]) -> io::Result<usize> {
        self.socket.send(frame)
    }
}

/// Link that keeps every frame in memory instead of putting it on the wire
#[derive(Clone, Default)]
pub struct MemoryLink {
    frames: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MemoryLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies of every frame written so far, in order
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.frames.lock().clone()
    }

    /// Number of frames written so far
    pub fn count(&self) -> usize {
        self.frames.lock().len()
    }
}

impl FrameLink for MemoryLink {
    fn send(&mut self, frame: &[u8]) -> io::Result<usize> {
        self.frames.lock().push(frame.to_vec());
        Ok(frame.len())
    }
}

/// One link bound to one interface.
///
/// Every transmit holds the link lock for the duration of the write, so
/// frames from concurrent callers never interleave.
pub struct Sender {
    interface: Interface,
    link: Mutex<Option<Box<dyn FrameLink>>>,
}

impl Sender {
    /// Resolve `name` and open a raw socket on it
    pub fn open(name: &str) -> Result<Self> {
        let interface = Interface::by_name(name)?;
        let link = RawSocketLink::open(&interface)?;

        info!(
            interface = %interface.name,
            index = interface.index,
            mac = %interface.mac_address,
            mtu = interface.mtu,
            "Opened raw sender"
        );

        Ok(Self::with_link(interface, Box::new(link)))
    }

    /// Sender for `name` that records frames in memory.
    ///
    /// Interface details are taken from the system when `name` exists so
    /// address defaults still resolve the same way as a real run.
    pub fn dry_run(name: &str) -> (Self, MemoryLink) {
        let interface = Interface::by_name(name).unwrap_or_else(|_| {
            warn!(interface = %name, "Interface not present, dry run uses a blank one");
            Interface::new(name.to_string(), 0, MacAddr::zero())
        });
        let link = MemoryLink::new();
        (Self::with_link(interface, Box::new(link.clone())), link)
    }

    /// Wrap an already opened link
    pub fn with_link(interface: Interface, link: Box<dyn FrameLink>) -> Self {
        Self {
            interface,
            link: Mutex::new(Some(link)),
        }
    }

    /// Interface this sender is bound to
    pub fn interface(&self) -> &Interface {
        &self.interface
    }

    pub fn name(&self) -> &str {
        &self.interface.name
    }

    /// Hardware address of the bound interface
    pub fn mac(&self) -> MacAddr {
        self.interface.mac_address
    }

    /// Write one complete frame.
    ///
    /// A write that the link only partially accepts is reported as a
    /// [`Error::Transmit`]; nothing is retried.
    pub fn transmit<F: AsRef<[u8]>>(&self, frame: F) -> Result<usize> {
        let frame = frame.as_ref();
        let max = self.interface.max_frame_len();
        if frame.len() > max {
            return Err(Error::FrameTooLarge {
                interface: self.interface.name.clone(),
                len: frame.len(),
                max,
            });
        }

        let mut guard = self.link.lock();
        let link = guard
            .as_mut()
            .ok_or_else(|| Error::transmit(self.interface.name.as_str(), "sender is closed"))?;

        match link.send(frame) {
            Ok(n) if n == frame.len() => {
                debug!(interface = %self.interface.name, len = n, "Frame transmitted");
                Ok(n)
            }
            Ok(n) => Err(Error::transmit(
                self.interface.name.as_str(),
                format!("short write: {} of {} bytes", n, frame.len()),
            )),
            Err(e) => Err(Error::transmit(self.interface.name.as_str(), e.to_string())),
        }
    }

    /// Release the link. Safe to call more than once.
    pub fn close(&self) {
        if self.link.lock().take().is_some() {
            info!(interface = %self.interface.name, "Closed sender");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.link.lock().is_none()
    }
}

impl std::fmt::Debug for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sender")
            .field("interface", &self.interface.name)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorCode;

    struct ShortLink;

    impl FrameLink for ShortLink {
        fn send(&mut self, frame: &[u8]) -> io::Result<usize> {
            Ok(frame.len() / 2)
        }
    }

    struct FailingLink;

    impl FrameLink for FailingLink {
        fn send(&mut self, _frame: &[u8]) -> io::Result<usize> {
            Err(io::Error::from_raw_os_error(libc::ENOBUFS))
        }
    }

    fn test_interface() -> Interface {
        Interface::new("test0".to_string(), 7, MacAddr([0x02, 0, 0, 0, 0, 0x01]))
    }

    #[test]
    fn test_transmit_records_frame() {
        let link = MemoryLink::new();
        let sender = Sender::with_link(test_interface(), Box::new(link.clone()));

        assert_eq!(sender.transmit(vec![0xAAu8; 86]).unwrap(), 86);
        assert_eq!(sender.transmit([1u8, 2, 3]).unwrap(), 3);
        assert_eq!(link.count(), 2);
        assert_eq!(link.frames()[1], vec![1, 2, 3]);
    }

    #[test]
    fn test_short_write_is_failure() {
        let sender = Sender::with_link(test_interface(), Box::new(ShortLink));
        let err = sender.transmit(vec![0u8; 86]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Transmit);
        assert!(err.to_string().contains("short write: 43 of 86"));
    }

    #[test]
    fn test_send_error_is_transmit_error() {
        let sender = Sender::with_link(test_interface(), Box::new(FailingLink));
        let err = sender.transmit(vec![0u8; 86]).unwrap_err();
        assert!(matches!(err, Error::Transmit { ref interface, .. } if interface == "test0"));
    }

    #[test]
    fn test_frame_larger_than_mtu() {
        let link = MemoryLink::new();
        let sender = Sender::with_link(test_interface(), Box::new(link.clone()));

        assert!(sender.transmit(vec![0u8; 1514]).is_ok());
        let err = sender.transmit(vec![0u8; 1515]).unwrap_err();
        assert!(matches!(err, Error::FrameTooLarge { len: 1515, max: 1514, .. }));
        assert_eq!(err.code(), ErrorCode::Transmit);
        assert_eq!(link.count(), 1);
    }

    #[test]
    fn test_close_is_idempotent() {
        let sender = Sender::with_link(test_interface(), Box::new(MemoryLink::new()));
        assert!(!sender.is_closed());

        sender.close();
        sender.close();
        assert!(sender.is_closed());

        let err = sender.transmit([0u8; 60]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Transmit);
    }

    #[test]
    fn test_open_missing_interface() {
        let err = Sender::open("ndforge-nope0").unwrap_err();
        assert_eq!(err.code(), ErrorCode::Interface);
    }

    #[test]
    fn test_dry_run_sender() {
        let (sender, link) = Sender::dry_run("ndforge-nope0");
        assert_eq!(sender.name(), "ndforge-nope0");
        assert_eq!(sender.mac(), MacAddr::zero());
        sender.transmit([0u8; 78]).unwrap();
        assert_eq!(link.count(), 1);
    }
}
