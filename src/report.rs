//! Peer listing written to stdout.
//!
//! One line per peer, ordered by peer identifier:
//!
//! ```text
//! <id>\t<hostname>\t<addr> <addr> ...
//! ```
//!
//! Addresses keep the order the daemon reported them in. No peers, no output.

use crate::tags::{matches, TagSet};
use crate::types::{PeerInfo, StatusSnapshot};
use std::io::{self, Write};

/// Peers of `snapshot` that pass `filter`, sorted by identifier.
pub fn select_peers<'a>(snapshot: &'a StatusSnapshot, filter: &TagSet) -> Vec<&'a PeerInfo> {
    let mut selected: Vec<&PeerInfo> = snapshot
        .peers
        .values()
        .filter(|peer| matches(&peer.tags, filter))
        .collect();
    selected.sort_by(|a, b| a.id.cmp(&b.id));
    selected
}

pub fn write_peers<W: Write>(out: &mut W, peers: &[&PeerInfo]) -> io::Result<()> {
    for peer in peers {
        let addresses: Vec<String> = peer.addresses.iter().map(ToString::to_string).collect();
        writeln!(out, "{}\t{}\t{}", peer.id, peer.hostname, addresses.join(" "))?;
    }
    out.flush()
}
