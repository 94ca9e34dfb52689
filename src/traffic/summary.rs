//! Text rendering of captured frames
//!
//! Expected strings in test cases were recorded from the layered packet
//! representation (`<Ether  dst=... |<IP  ... |>>`), so captured frames are
//! rendered in that same shape before comparison. Whitespace is ignored by
//! the comparison, field order and names are not.

use std::fmt::Write;

use etherparse::{ether_type, Ethernet2Header, Ipv4Header, SingleVlanHeader};

/// Render `'<iface>':[<frame>, <frame>]`
pub fn render_tap(iface: &str, frames: &[Vec<u8>]) -> String {
    let rendered: Vec<String> = frames.iter().map(|f| render_frame(f)).collect();
    format!("'{}':[{}]", iface, rendered.join(", "))
}

/// Render one Ethernet frame layer by layer
pub fn render_frame(frame: &[u8]) -> String {
    let mut out = String::new();
    let mut depth = 0;

    let rest = match Ethernet2Header::from_slice(frame) {
        Ok((eth, rest)) => {
            let _ = write!(
                out,
                "<Ether  dst={} src={} type={} |",
                mac(&eth.destination),
                mac(&eth.source),
                ether_name(eth.ether_type)
            );
            depth += 1;
            render_after_ether(&mut out, &mut depth, eth.ether_type, rest)
        }
        Err(_) => frame,
    };

    if !rest.is_empty() {
        let _ = write!(out, "<Raw  load={} |", bytes_repr(rest));
        depth += 1;
    }

    for _ in 0..depth {
        out.push('>');
    }
    out
}

fn render_after_ether<'a>(out: &mut String, depth: &mut usize, ty: u16, rest: &'a [u8]) -> &'a [u8] {
    match ty {
        ether_type::VLAN_TAGGED_FRAME => match SingleVlanHeader::from_slice(rest) {
            Ok((vlan, rest)) => {
                let _ = write!(
                    out,
                    "<Dot1Q  prio={} id={} vlan={} type={} |",
                    vlan.priority_code_point,
                    u8::from(vlan.drop_eligible_indicator),
                    vlan.vlan_identifier,
                    ether_name(vlan.ether_type)
                );
                *depth += 1;
                render_after_ether(out, depth, vlan.ether_type, rest)
            }
            Err(_) => rest,
        },
        ether_type::IPV4 => match Ipv4Header::from_slice(rest) {
            Ok((ip, rest)) => {
                let _ = write!(
                    out,
                    "<IP  version=4 ihl={} tos={:#x} len={} id={} flags={} frag={} ttl={} proto={} chksum={:#06x} src={} dst={} |",
                    ip.ihl(),
                    (ip.differentiated_services_code_point << 2) | ip.explicit_congestion_notification,
                    ip.header_len() + usize::from(ip.payload_len),
                    ip.identification,
                    ip_flags(ip.dont_fragment, ip.more_fragments),
                    ip.fragments_offset,
                    ip.time_to_live,
                    proto_name(ip.protocol),
                    ip.header_checksum,
                    std::net::Ipv4Addr::from(ip.source),
                    std::net::Ipv4Addr::from(ip.destination),
                );
                *depth += 1;

                let payload_len = usize::from(ip.payload_len).min(rest.len());
                let (payload, padding) = rest.split_at(payload_len);
                if !payload.is_empty() {
                    let _ = write!(out, "<Raw  load={} |", bytes_repr(payload));
                    *depth += 1;
                }
                if !padding.is_empty() {
                    let _ = write!(out, "<Padding  load={} |", bytes_repr(padding));
                    *depth += 1;
                }
                &[]
            }
            Err(_) => rest,
        },
        _ => rest,
    }
}

fn mac(bytes: &[u8; 6]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(":")
}

fn ether_name(ty: u16) -> String {
    match ty {
        ether_type::IPV4 => "IPv4".to_string(),
        ether_type::IPV6 => "IPv6".to_string(),
        ether_type::ARP => "ARP".to_string(),
        ether_type::VLAN_TAGGED_FRAME => "VLAN".to_string(),
        0x9000 => "LOOP".to_string(),
        other => format!("{:#06x}", other),
    }
}

fn ip_flags(df: bool, mf: bool) -> &'static str {
    match (df, mf) {
        (false, false) => "",
        (true, false) => "DF",
        (false, true) => "MF",
        (true, true) => "MF+DF",
    }
}

fn proto_name(proto: u8) -> String {
    match proto {
        0 => "hopopt".to_string(),
        1 => "icmp".to_string(),
        2 => "igmp".to_string(),
        6 => "tcp".to_string(),
        17 => "udp".to_string(),
        47 => "gre".to_string(),
        other => other.to_string(),
    }
}

/// Byte-string literal form, printable ASCII kept and the rest hex-escaped
fn bytes_repr(bytes: &[u8]) -> String {
    let mut out = String::from("b'");
    for &b in bytes {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'\'' => out.push_str("\\'"),
            b'\t' => out.push_str("\\t"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            0x20..=0x7e => out.push(b as char),
            _ => {
                let _ = write!(out, "\\x{:02x}", b);
            }
        }
    }
    out.push('\'');
    out
}
