use std::{collections::HashMap, net::Ipv4Addr};

use afpacket::tokio::RawPacketStream;
use log::info;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    constants::OBSERVATION_QUEUE_LEN,
    error::Result,
    interface::{local_interfaces, resolve, LocalInterface},
    prober::{Prober, ProberConfig},
    report::Reporter,
    sniffer::{BackgroundTaskSpawner, Sniffer},
    target::Target,
    transport::{self, Binding},
};

/// The assembled engine: one capture loop per interface in use, feeding a
/// single prober.
///
/// # Example
/// ```no_run
/// use arpman::{LineReporter, Monitor, ProberConfigBuilder};
/// use std::net::Ipv4Addr;
/// use tokio_util::sync::CancellationToken;
///
/// tokio_test::block_on(async {
///     let config = ProberConfigBuilder::new().build().unwrap();
///     let mut monitor = Monitor::new(&[Ipv4Addr::new(192, 168, 1, 1)], config).unwrap();
///     let mut reporter = LineReporter::new(std::io::stdout());
///     monitor.run(&mut reporter, &CancellationToken::new()).await.unwrap();
/// })
/// ```
#[derive(Debug)]
pub struct Monitor {
    prober: Prober<RawPacketStream>,
    _task_spawner: BackgroundTaskSpawner,
}

impl Monitor {
    /// Resolves every address against the host's interfaces, opens the
    /// interfaces involved and starts capturing on them.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// Returns [`crate::Error::NoInterfaceFound`] if an address is not on any
    /// local subnet, or [`crate::Error::BindError`] if an interface cannot be opened.
    pub fn new(addresses: &[Ipv4Addr], config: ProberConfig) -> Result<Self> {
        Self::with_interfaces(addresses, config, &local_interfaces())
    }

    /// Like [`Monitor::new`], resolving against the given interfaces instead of
    /// the host's.
    pub fn with_interfaces(
        addresses: &[Ipv4Addr],
        config: ProberConfig,
        interfaces: &[LocalInterface],
    ) -> Result<Self> {
        let mut targets = Vec::with_capacity(addresses.len());
        let mut selected: Vec<&LocalInterface> = Vec::new();
        for &address in addresses {
            let interface = resolve(address, interfaces)?;
            if !selected.iter().any(|used| used.name == interface.name) {
                selected.push(interface);
            }
            targets.push(Target::new(address, interface.name.clone()));
        }

        let (queue, observations) = mpsc::channel(OBSERVATION_QUEUE_LEN);
        let mut task_spawner = BackgroundTaskSpawner::new();
        let mut bindings = HashMap::with_capacity(selected.len());
        for interface in selected {
            let stream = transport::open(&interface.name)?;
            info!(
                "probing from {} ({:?}, {})",
                interface.name,
                interface.mac,
                interface.source_ipv4()
            );
            task_spawner.spawn(Sniffer::new(
                interface.name.clone(),
                stream.clone(),
                queue.clone(),
            ));
            bindings.insert(interface.name.clone(), Binding::new(interface.clone(), stream));
        }

        Ok(Self {
            prober: Prober::new(config, targets, bindings, observations)?,
            _task_spawner: task_spawner,
        })
    }

    pub fn targets(&self) -> &[Target] {
        self.prober.targets()
    }

    /// See [`Prober::run`].
    pub async fn run<R>(&mut self, reporter: &mut R, token: &CancellationToken) -> Result<()>
    where
        R: Reporter + ?Sized,
    {
        self.prober.run(reporter, token).await
    }
}
