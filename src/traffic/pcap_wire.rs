//! [`Wire`] implementation over libpcap
//!
//! Requires capture privileges (root or CAP_NET_RAW) on the tap interfaces.

use std::time::{Duration, Instant};

use pcap::{Active, Capture};

use crate::common::config::TrafficConfig;
use crate::common::{Error, Result};

use super::{Captured, Listener, Wire};

/// Read timeout per handle, so one quiet tap does not starve the others
const READ_TIMEOUT_MS: i32 = 100;

pub struct PcapWire {
    snaplen: i32,
}

impl PcapWire {
    pub fn new(config: &TrafficConfig) -> Self {
        #[cfg(unix)]
        {
            // SAFETY: geteuid has no preconditions
            if unsafe { libc::geteuid() } != 0 {
                tracing::warn!("Not running as root; tap capture and injection will likely fail");
            }
        }
        Self {
            snaplen: config.snaplen,
        }
    }

    fn open(&self, iface: &str) -> std::result::Result<Capture<Active>, pcap::Error> {
        Capture::from_device(iface)?
            .promisc(true)
            .snaplen(self.snaplen)
            .timeout(READ_TIMEOUT_MS)
            .immediate_mode(true)
            .open()
    }
}

impl Wire for PcapWire {
    fn listen(&self, ifaces: &[String]) -> Result<Box<dyn Listener>> {
        let mut handles = Vec::with_capacity(ifaces.len());
        for iface in ifaces {
            let cap = self.open(iface).map_err(|e| Error::capture(iface, e))?;
            handles.push((iface.clone(), cap));
        }
        tracing::debug!("Listening on {:?}", ifaces);
        Ok(Box::new(PcapListener { handles }))
    }

    fn inject(&self, iface: &str, frame: &[u8], count: u32) -> Result<()> {
        let mut cap = self.open(iface).map_err(|e| Error::inject(iface, e))?;
        for _ in 0..count {
            cap.sendpacket(frame).map_err(|e| Error::inject(iface, e))?;
        }
        tracing::debug!("Sent {} frame(s) of {} bytes on {}", count, frame.len(), iface);
        Ok(())
    }
}

struct PcapListener {
    handles: Vec<(String, Capture<Active>)>,
}

impl Listener for PcapListener {
    fn collect(mut self: Box<Self>, window: Duration) -> Result<Captured> {
        let mut captured = Captured::new();
        for (iface, _) in &self.handles {
            captured.insert(iface.clone(), Vec::new());
        }
        if self.handles.is_empty() {
            return Ok(captured);
        }

        let deadline = Instant::now() + window;
        while Instant::now() < deadline {
            for (iface, cap) in self.handles.iter_mut() {
                match cap.next_packet() {
                    Ok(packet) => {
                        if let Some(frames) = captured.get_mut(iface.as_str()) {
                            frames.push(packet.data.to_vec());
                        }
                    }
                    Err(pcap::Error::TimeoutExpired) => {}
                    Err(e) => return Err(Error::capture(iface, e)),
                }
            }
        }

        for (iface, frames) in &captured {
            tracing::debug!("Captured {} frame(s) on {}", frames.len(), iface);
        }
        Ok(captured)
    }
}
