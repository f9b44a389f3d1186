//! Mitigation-rule emitters
//!
//! Convert the final blocklist into text artifacts that mitigation
//! infrastructure can consume: BGP FlowSpec routes and Cisco-style ACL
//! entries, one rule per blocked source IP.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::types::BlockedIp;

/// BGP FlowSpec (RFC 8955-style) discard routes, one per blocked source.
pub fn write_flowspec_rules(path: &Path, blocklist: &[BlockedIp]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    writeln!(file, "# BGP FlowSpec rules: discard traffic from blocked sources")?;
    writeln!(file, "# Generated from {} blocklist entries", blocklist.len())?;
    for entry in blocklist {
        writeln!(file, "route {{")?;
        writeln!(file, "    match {{ source {}/32; }}", entry.ip)?;
        writeln!(file, "    then {{ discard; }}")?;
        writeln!(file, "}}")?;
    }
    Ok(())
}

/// Cisco-style extended ACL denying blocked sources, with the usual terminal
/// permit.
pub fn write_acl_rules(path: &Path, blocklist: &[BlockedIp]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    writeln!(file, "! ACL rules: deny traffic from blocked sources")?;
    writeln!(file, "ip access-list extended DDOS-MITIGATION")?;
    for entry in blocklist {
        writeln!(file, " deny ip host {} any", entry.ip)?;
    }
    writeln!(file, " permit ip any any")?;
    Ok(())
}
