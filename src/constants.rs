use std::time::Duration;

pub(crate) const MAC_ADDR_LEN: u8 = 6;
pub(crate) const IP_V4_LEN: u8 = 4;

pub(crate) const ETH_HEADER_LEN: usize = 14;
pub(crate) const ARP_PACK_LEN: usize = 28;
pub(crate) const ETH_PACK_LEN: usize = ETH_HEADER_LEN + ARP_PACK_LEN;

/// Large enough for a jumbo frame; replies are far smaller.
pub(crate) const CAPTURE_BUF_LEN: usize = 9100;

/// Pause after a failed capture read so a persistent error does not spin the loop.
pub(crate) const READ_RETRY_DELAY: Duration = Duration::from_millis(100);

pub(crate) const OBSERVATION_QUEUE_LEN: usize = 10;
