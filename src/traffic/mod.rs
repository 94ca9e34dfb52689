//! Packet injection and capture on the rig's tap interfaces
//!
//! The engine talks to the wire through the [`Wire`] trait so that runs can
//! use real taps ([`PcapWire`]) and tests can use a scripted stand-in.

pub mod packet;
pub mod pcap_wire;
pub mod summary;

use std::collections::BTreeMap;
use std::time::Duration;

use crate::common::Result;

pub use packet::PacketSpec;
pub use pcap_wire::PcapWire;

/// Frames captured per interface, in arrival order
pub type Captured = BTreeMap<String, Vec<Vec<u8>>>;

/// Access to the tap interfaces wired to the switch ports
///
/// Both calls block; the engine runs them on the blocking pool.
pub trait Wire: Send + Sync {
    /// Open capture handles on the given interfaces
    ///
    /// Frames are buffered from the moment this returns, so injection may
    /// start right after.
    fn listen(&self, ifaces: &[String]) -> Result<Box<dyn Listener>>;

    /// Send `count` copies of a frame out of an interface
    fn inject(&self, iface: &str, frame: &[u8], count: u32) -> Result<()>;
}

/// An open capture over one or more interfaces
pub trait Listener: Send {
    /// Collect frames until the window elapses
    fn collect(self: Box<Self>, window: Duration) -> Result<Captured>;
}
