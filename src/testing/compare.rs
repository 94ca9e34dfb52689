//! Output comparison
//!
//! Terminal output is noisy: colour codes, line wrapping, padding NULs.
//! Both sides are reduced to their non-whitespace characters and the
//! expected text must appear somewhere in the output.

use crate::common::{squash_whitespace, strip_ansi};

/// Whether `expected` occurs in `output`, ignoring whitespace and ANSI codes
pub fn output_contains(output: &str, expected: &str) -> bool {
    let seen = squash_whitespace(&strip_ansi(output));
    let seen = seen.trim_end_matches('\0');
    let wanted = squash_whitespace(expected);
    seen.contains(&wanted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spacing_is_ignored() {
        let output = "int VendorGetPortsInVlan(uint16_t,uint16_t*,uint16_t*) 75\r\n\
                      rc:0 numPorts:0 ports:[0, 0, 0, 0, 0] vlanId:75\r\n";
        assert!(output_contains(
            output,
            "intVendorGetPortsInVlan(uint16_t,uint16_t*,uint16_t*)75rc:0numPorts:0ports:[0,0,0,0,0]vlanId:75"
        ));
    }

    #[test]
    fn test_colour_codes_are_ignored() {
        assert!(output_contains("\x1b[96mrc:\x1b[0m 0\0\0", "rc: 0"));
    }

    #[test]
    fn test_mismatch() {
        assert!(!output_contains("rc:0 stpState:2", "stpState:3"));
        assert!(output_contains("anything", ""));
    }
}
