//! Watches a list of IPv4 addresses on directly attached Ethernet segments and
//! reports, batch by batch, which hardware addresses answer ARP for each of them.
//! More than one answer for the same address is a conflict.
//!
//! ## Example
//! Following example scans every host of an interface's subnet and prints the
//! addresses claimed by more than one hardware address.
//! To run this example locally, make sure to specify the network interface (e.g., `eth0` or `wlan0`) as a parameter.
//! ```rust,no_run
#![doc = include_str!("../demos/subnet_scan.rs")]
//! ```
//! For a continuous watch over a fixed list of addresses, see the `arpman` binary.

pub mod codec;
pub mod error;
pub mod input;
pub mod interface;
pub mod monitor;
pub mod prober;
pub mod report;
pub mod target;
pub mod transport;

pub(crate) mod constants;
pub(crate) mod sniffer;

pub use error::{Error, Result};
pub use monitor::Monitor;
pub use prober::{ProberConfig, ProberConfigBuilder, RunMode};
pub use report::{BatchReport, LineReporter, OuiTable, Reporter, TargetReport, VendorLookup};
pub use target::{ObservedOwner, Resolution, Target};
