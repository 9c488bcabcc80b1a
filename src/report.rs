use std::{
    collections::HashMap,
    io::{self, BufRead, Write},
    net::Ipv4Addr,
};

use pnet::util::MacAddr;

use crate::target::{ObservedOwner, Resolution, Target};

/// Final state of one target at the end of a batch.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct TargetReport {
    pub address: Ipv4Addr,
    pub interface: String,
    pub owners: Vec<ObservedOwner>,
}

impl TargetReport {
    pub fn resolution(&self) -> Resolution {
        Resolution::of(&self.owners)
    }

    pub fn is_conflict(&self) -> bool {
        self.resolution() == Resolution::Conflict
    }
}

impl From<&Target> for TargetReport {
    fn from(target: &Target) -> Self {
        Self {
            address: target.address(),
            interface: target.interface().to_string(),
            owners: target.owners().to_vec(),
        }
    }
}

/// Snapshot handed to the reporter after every batch.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct BatchReport {
    /// Number of completed passes over the whole target list before this batch.
    pub cycle: u64,
    /// Position of this batch within the pass, starting at zero.
    pub batch_index: usize,
    pub targets: Vec<TargetReport>,
}

impl BatchReport {
    pub fn conflicts(&self) -> impl Iterator<Item = &TargetReport> {
        self.targets.iter().filter(|target| target.is_conflict())
    }
}

/// Consumer of batch results, e.g. a terminal view or a line printer.
pub trait Reporter {
    fn report(&mut self, batch: &BatchReport);
}

impl<F> Reporter for F
where
    F: FnMut(&BatchReport),
{
    fn report(&mut self, batch: &BatchReport) {
        self(batch)
    }
}

/// Maps a hardware address to the organization its OUI is registered to.
pub trait VendorLookup {
    fn organization(&self, mac: MacAddr) -> Option<&str>;
}

fn oui(mac: MacAddr) -> u32 {
    (u32::from(mac.0) << 16) | (u32::from(mac.1) << 8) | u32::from(mac.2)
}

/// OUI registry loaded from text, one `AABBCC Organization name` entry per line.
///
/// The prefix may also be written `AA-BB-CC` or `AA:BB:CC`. Blank lines, `#`
/// comments and lines without a valid prefix are skipped.
#[derive(Clone, Default, Debug)]
pub struct OuiTable {
    organizations: HashMap<u32, String>,
}

impl OuiTable {
    pub fn from_reader<R: BufRead>(reader: R) -> io::Result<Self> {
        let mut organizations = HashMap::new();
        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((prefix, organization)) = line.split_once(char::is_whitespace) else {
                continue;
            };
            let prefix: String = prefix.chars().filter(|c| !matches!(c, '-' | ':')).collect();
            if prefix.len() != 6 {
                continue;
            }
            if let Ok(prefix) = u32::from_str_radix(&prefix, 16) {
                organizations.insert(prefix, organization.trim().to_string());
            }
        }
        Ok(Self { organizations })
    }

    pub fn len(&self) -> usize {
        self.organizations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.organizations.is_empty()
    }
}

impl VendorLookup for OuiTable {
    fn organization(&self, mac: MacAddr) -> Option<&str> {
        self.organizations.get(&oui(mac)).map(String::as_str)
    }
}

/// Writes one line per target: the address followed by every owner seen.
///
/// Local owners print as `Own!`; remote owners as their hardware address, with
/// `[organization]` appended when a lookup is configured.
pub struct LineReporter<W> {
    out: W,
    lookup: Option<Box<dyn VendorLookup + Send>>,
}

impl<W: Write> LineReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out, lookup: None }
    }

    pub fn with_lookup(mut self, lookup: impl VendorLookup + Send + 'static) -> Self {
        self.lookup = Some(Box::new(lookup));
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_target(&mut self, target: &TargetReport) -> io::Result<()> {
        write!(self.out, "{}", target.address)?;
        for owner in &target.owners {
            match owner.hardware_address {
                _ if owner.is_local_own => write!(self.out, " Own!")?,
                Some(mac) => {
                    write!(self.out, " {}", mac)?;
                    if let Some(lookup) = &self.lookup {
                        write!(self.out, " [{}]", lookup.organization(mac).unwrap_or(""))?;
                    }
                }
                None => write!(self.out, " ?")?,
            }
        }
        writeln!(self.out)
    }
}

impl<W: Write> Reporter for LineReporter<W> {
    fn report(&mut self, batch: &BatchReport) {
        for target in &batch.targets {
            if let Err(err) = self.write_target(target) {
                log::warn!("failed to write report line for {}: {}", target.address, err);
                return;
            }
        }
        if let Err(err) = self.out.flush() {
            log::warn!("failed to flush report: {}", err);
        }
    }
}
