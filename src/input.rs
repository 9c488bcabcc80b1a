use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    net::Ipv4Addr,
    path::Path,
};

use log::debug;

use crate::error::Result;

/// Reads target addresses, one per line, keeping their order.
///
/// Lines starting with `#` are comments. Blank lines and lines that are not an
/// IPv4 address are skipped.
pub fn parse_targets<R: BufRead>(reader: R) -> io::Result<Vec<Ipv4Addr>> {
    let mut targets = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match line.parse::<Ipv4Addr>() {
            Ok(address) => targets.push(address),
            Err(_) => debug!("skipping line {}: {:?} is not an IPv4 address", number + 1, line),
        }
    }
    Ok(targets)
}

pub fn load_targets(path: impl AsRef<Path>) -> Result<Vec<Ipv4Addr>> {
    let file = File::open(path)?;
    Ok(parse_targets(BufReader::new(file))?)
}
