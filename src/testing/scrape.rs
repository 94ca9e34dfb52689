//! Value extraction from vendor CLI output
//!
//! The CLI prints values in ad hoc layouts. Each helper here knows one of
//! them and returns `None` when the output does not have that shape.

use crate::common::squash_whitespace;

/// Smallest object id of a router interface
pub const RIF_OID_MIN: u64 = 1_688_849_860_263_936;

pub fn is_digits(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}

/// Every all-digit whitespace token
pub fn digit_tokens(output: &str) -> impl Iterator<Item = &str> {
    output.split_whitespace().filter(|t| is_digits(t))
}

/// All-digit tokens that are router interface object ids
pub fn rif_ids(output: &str) -> impl Iterator<Item = &str> {
    digit_tokens(output).filter(|t| t.parse::<u64>().map(|v| v >= RIF_OID_MIN).unwrap_or(false))
}

/// Value after the first `=` with whitespace removed (`maxPorts = 54`)
pub fn value_after_eq(output: &str) -> Option<String> {
    let squashed = squash_whitespace(output);
    let value = squashed.split('=').nth(1)?;
    let digits: String = value.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        Some(digits)
    }
}

/// Last `count` whitespace tokens
pub fn last_tokens(output: &str, count: usize) -> Vec<String> {
    let tokens: Vec<&str> = output.split_whitespace().collect();
    let start = tokens.len().saturating_sub(count);
    tokens[start..].iter().map(|s| s.to_string()).collect()
}

/// ACL packet count: the first digit token after a token `1`, ignoring the id
pub fn acl_packet_count(output: &str, id: &str) -> Option<u64> {
    let mut seen_one = false;
    for token in digit_tokens(output).filter(|t| *t != id) {
        if seen_one {
            return token.parse().ok();
        }
        if token == "1" {
            seen_one = true;
        }
    }
    None
}

/// Router interface statistic: the last token, if it is a number other than the id
pub fn rif_stat(output: &str, id: &str) -> Option<u64> {
    let last = output.split_whitespace().last()?;
    if is_digits(last) && last != id {
        last.parse().ok()
    } else {
        None
    }
}

/// Learned MAC count from `... numMacs:<n> macs:[...]`
pub fn mac_count(output: &str) -> Option<u64> {
    let fields: Vec<&str> = output.split(':').collect();
    if fields.len() < 2 {
        return None;
    }
    let field = fields[fields.len() - 2];
    let keep = field.chars().count().checked_sub(4)?;
    let value: String = field.chars().take(keep).collect();
    value.trim().parse().ok()
}

/// CPU receive counter from packet driver statistics
pub fn rx_counter(output: &str) -> Option<u64> {
    const KEY: &str = "RxCounters=";
    let squashed = squash_whitespace(output);
    let start = squashed.find(KEY)? + KEY.len();
    let digits: String = squashed[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_after_eq() {
        assert_eq!(
            value_after_eq("port_get_max_num 0\r\nmaxPorts = 54\r\n").as_deref(),
            Some("54")
        );
        assert_eq!(value_after_eq("port_get_first\nport=28").as_deref(), Some("28"));
        assert_eq!(value_after_eq("no value here"), None);
    }

    #[test]
    fn test_last_tokens() {
        let out = "sai_get_switch_attribute 9288674231451648 SAI_SWITCH_ATTR_PORT_LIST 3\n\
                   count = 3 : 281474976710657 281474976710658 281474976710659";
        assert_eq!(
            last_tokens(out, 3),
            vec!["281474976710657", "281474976710658", "281474976710659"]
        );
        assert_eq!(last_tokens("a", 5), vec!["a"]);
    }

    #[test]
    fn test_acl_packet_count() {
        let id = "9007199254740993";
        let out = format!(
            "sai_get_acl_counter_attribute {id} SAI_ACL_COUNTER_ATTR_PACKETS 1\n\
             packets = 42\n"
        );
        assert_eq!(acl_packet_count(&out, id), Some(42));
        let out = format!("{id} 1 42");
        assert_eq!(acl_packet_count(&out, id), Some(42));
        assert_eq!(acl_packet_count("no numbers", id), None);
    }

    #[test]
    fn test_rif_ids_and_stat() {
        let out = "rc 0 oid 1688849860263937 vrf 3";
        assert_eq!(rif_ids(out).collect::<Vec<_>>(), vec!["1688849860263937"]);

        assert_eq!(rif_stat("sai_get_router_interface_stats 1688849860263937 1\nvalue 17", "1688849860263937"), Some(17));
        assert_eq!(rif_stat("stats 1688849860263937", "1688849860263937"), None);
        assert_eq!(rif_stat("", "1"), None);
    }

    #[test]
    fn test_mac_count() {
        assert_eq!(mac_count("VendorGetMacTbl 28 0 \"/\"*6\nrc:0 numMacs:0 macs:[]"), Some(0));
        assert_eq!(mac_count("rc:0 numMacs:3 macs:[a]"), Some(3));
        assert_eq!(mac_count("nothing"), None);
    }

    #[test]
    fn test_rx_counter() {
        assert_eq!(rx_counter("Rx Counters = 12 , Tx Counters = 3"), Some(12));
        assert_eq!(rx_counter("RxCounters=7,TxCounters=0"), Some(7));
        assert_eq!(rx_counter("TxCounters=7"), None);
    }
}
