//! Declarative test packets
//!
//! A test case describes its ingress packet as plain data. [`PacketSpec::build`]
//! turns it into an Ethernet frame. Unset IPv4 fields take the same defaults
//! as a bare `IP()` layer: loopback addresses, ttl 64, id 1, protocol 0.

use etherparse::{ether_type, Ethernet2Header, Ipv4Header, SingleVlanHeader};
use serde::{Deserialize, Serialize};

use crate::common::{Error, Result};

/// An Ethernet frame with optional 802.1Q tag, IPv4 header and payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketSpec {
    /// Source MAC, `aa:bb:cc:dd:ee:ff`
    pub src: String,
    /// Destination MAC
    pub dst: String,
    #[serde(default)]
    pub vlan: Option<VlanSpec>,
    #[serde(default)]
    pub ipv4: Option<Ipv4Spec>,
    /// `0x`-prefixed hex, or literal text
    #[serde(default)]
    pub payload: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlanSpec {
    pub id: u16,
    #[serde(default)]
    pub pcp: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ipv4Spec {
    #[serde(default = "default_ip")]
    pub src: String,
    #[serde(default = "default_ip")]
    pub dst: String,
    #[serde(default = "default_ttl")]
    pub ttl: u8,
    #[serde(default)]
    pub protocol: u8,
    #[serde(default = "default_id")]
    pub id: u16,
}

impl Default for Ipv4Spec {
    fn default() -> Self {
        Self {
            src: default_ip(),
            dst: default_ip(),
            ttl: default_ttl(),
            protocol: 0,
            id: default_id(),
        }
    }
}

fn default_ip() -> String {
    "127.0.0.1".to_string()
}
fn default_ttl() -> u8 {
    64
}
fn default_id() -> u16 {
    1
}

impl PacketSpec {
    /// Serialize to wire bytes
    pub fn build(&self) -> Result<Vec<u8>> {
        let payload = self.payload_bytes()?;
        let mut frame = Vec::with_capacity(64 + payload.len());

        let next_after_eth = if self.vlan.is_some() {
            ether_type::VLAN_TAGGED_FRAME
        } else {
            self.l3_ether_type()
        };

        Ethernet2Header {
            source: parse_mac(&self.src)?,
            destination: parse_mac(&self.dst)?,
            ether_type: next_after_eth,
        }
        .write(&mut frame)
        .map_err(packet_err)?;

        if let Some(vlan) = &self.vlan {
            if vlan.id > 0x0fff || vlan.pcp > 7 {
                return Err(Error::InvalidPacket(format!(
                    "vlan id {} / pcp {} out of range",
                    vlan.id, vlan.pcp
                )));
            }
            SingleVlanHeader {
                priority_code_point: vlan.pcp,
                drop_eligible_indicator: false,
                vlan_identifier: vlan.id,
                ether_type: self.l3_ether_type(),
            }
            .write(&mut frame)
            .map_err(packet_err)?;
        }

        if let Some(ip) = &self.ipv4 {
            let payload_len = u16::try_from(payload.len())
                .map_err(|_| Error::InvalidPacket("payload too large".to_string()))?;
            let mut header = Ipv4Header::new(
                payload_len,
                ip.ttl,
                ip.protocol,
                parse_ipv4(&ip.src)?,
                parse_ipv4(&ip.dst)?,
            );
            header.identification = ip.id;
            header.header_checksum = header.calc_header_checksum().map_err(packet_err)?;
            header.write(&mut frame).map_err(packet_err)?;
        }

        frame.extend_from_slice(&payload);
        Ok(frame)
    }

    fn l3_ether_type(&self) -> u16 {
        if self.ipv4.is_some() {
            ether_type::IPV4
        } else {
            // default type of a bare Ether layer
            0x9000
        }
    }

    fn payload_bytes(&self) -> Result<Vec<u8>> {
        match self.payload.as_deref() {
            None => Ok(Vec::new()),
            Some(text) => match text.strip_prefix("0x") {
                Some(hex) => decode_hex(hex),
                None => Ok(text.as_bytes().to_vec()),
            },
        }
    }
}

fn packet_err<E: std::fmt::Display>(e: E) -> Error {
    Error::InvalidPacket(e.to_string())
}

/// Parse `aa:bb:cc:dd:ee:ff`
pub fn parse_mac(text: &str) -> Result<[u8; 6]> {
    let mut mac = [0u8; 6];
    let mut parts = text.trim().split(':');
    for byte in mac.iter_mut() {
        let part = parts
            .next()
            .ok_or_else(|| Error::InvalidPacket(format!("bad MAC '{}'", text)))?;
        *byte = u8::from_str_radix(part, 16)
            .map_err(|_| Error::InvalidPacket(format!("bad MAC '{}'", text)))?;
    }
    if parts.next().is_some() {
        return Err(Error::InvalidPacket(format!("bad MAC '{}'", text)));
    }
    Ok(mac)
}

fn parse_ipv4(text: &str) -> Result<[u8; 4]> {
    text.trim()
        .parse::<std::net::Ipv4Addr>()
        .map(|a| a.octets())
        .map_err(|_| Error::InvalidPacket(format!("bad IPv4 address '{}'", text)))
}

fn decode_hex(hex: &str) -> Result<Vec<u8>> {
    let hex: String = hex.chars().filter(|c| !c.is_whitespace()).collect();
    if hex.len() % 2 != 0 {
        return Err(Error::InvalidPacket("odd-length hex payload".to_string()));
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|_| Error::InvalidPacket(format!("bad hex payload '{}'", hex)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged_ip() -> PacketSpec {
        PacketSpec {
            src: "00:00:11:00:11:00".to_string(),
            dst: "00:00:11:00:11:23".to_string(),
            vlan: Some(VlanSpec { id: 75, pcp: 0 }),
            ipv4: Some(Ipv4Spec::default()),
            payload: None,
        }
    }

    #[test]
    fn test_build_tagged_ip() {
        let frame = tagged_ip().build().unwrap();
        assert_eq!(frame.len(), 14 + 4 + 20);
        assert_eq!(&frame[0..6], &[0x00, 0x00, 0x11, 0x00, 0x11, 0x23]);
        assert_eq!(&frame[12..14], &[0x81, 0x00]);
        // vlan 75
        assert_eq!(&frame[14..16], &[0x00, 0x4b]);
        assert_eq!(&frame[16..18], &[0x08, 0x00]);
        // ihl/version, id 1, ttl 64, checksum
        assert_eq!(frame[18], 0x45);
        assert_eq!(&frame[22..24], &[0x00, 0x01]);
        assert_eq!(frame[26], 64);
        assert_eq!(&frame[28..30], &[0x7c, 0xe7]);
    }

    #[test]
    fn test_payload_forms() {
        let mut spec = tagged_ip();
        spec.vlan = None;
        spec.payload = Some("0xdead beef".to_string());
        let frame = spec.build().unwrap();
        assert_eq!(&frame[frame.len() - 4..], &[0xde, 0xad, 0xbe, 0xef]);

        spec.payload = Some("hi".to_string());
        let frame = spec.build().unwrap();
        assert_eq!(&frame[frame.len() - 2..], b"hi");
    }

    #[test]
    fn test_yaml_defaults() {
        let spec: PacketSpec = serde_yaml::from_str(
            "src: '00:00:11:00:11:00'\ndst: '00:00:11:00:11:23'\nvlan: {id: 75}\nipv4: {}\n",
        )
        .unwrap();
        assert_eq!(spec, tagged_ip());
    }

    #[test]
    fn test_bad_inputs() {
        assert!(parse_mac("00:11:22:33:44").is_err());
        assert!(parse_mac("00:11:22:33:44:55:66").is_err());
        assert!(parse_mac("zz:11:22:33:44:55").is_err());

        let mut spec = tagged_ip();
        spec.vlan = Some(VlanSpec { id: 5000, pcp: 0 });
        assert!(matches!(spec.build(), Err(Error::InvalidPacket(_))));
    }
}
