use std::{collections::HashMap, net::Ipv4Addr, ops::Range, time::Duration};

use log::{debug, warn};
use tokio::{
    io::AsyncWrite,
    sync::mpsc,
    time::{self, Instant},
};
use tokio_util::sync::CancellationToken;

use crate::{
    codec::request_frame,
    error::{Error, Result},
    report::{BatchReport, Reporter, TargetReport},
    target::{Observation, ObservedOwner, Target},
    transport::Binding,
};

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum RunMode {
    /// Probe every target once, then stop.
    #[default]
    Once,
    /// Start over from the first batch after the last one, until cancelled.
    Continuous,
}

#[derive(Debug, Clone)]
pub struct ProberConfig {
    /// Length of the collection window that follows each batch of requests.
    pub timeout: Duration,
    pub batch_size: usize,
    pub mode: RunMode,
}

#[derive(Debug, Clone)]
pub struct ProberConfigBuilder {
    timeout: Option<Duration>,
    batch_size: Option<usize>,
    mode: Option<RunMode>,
}

impl Default for ProberConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProberConfigBuilder {
    pub fn new() -> Self {
        Self {
            timeout: Some(Duration::from_secs(1)),
            batch_size: Some(1),
            mode: Some(RunMode::Once),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// # Errors
    /// Returns [`Error::InvalidConfig`] for a batch size of zero.
    pub fn build(self) -> Result<ProberConfig> {
        let batch_size = self.batch_size.unwrap_or(1);
        if batch_size == 0 {
            return Err(Error::InvalidConfig("batch size must be at least 1".into()));
        }
        Ok(ProberConfig {
            timeout: self.timeout.unwrap_or(Duration::from_secs(1)),
            batch_size,
            mode: self.mode.unwrap_or_default(),
        })
    }
}

/// Sends requests batch by batch and attributes the replies published by the
/// sniffers to the targets of the batch in flight.
///
/// Only one batch is in flight at a time. The prober is the only writer of
/// target state; sniffers reach it exclusively through the observation queue.
#[derive(Debug)]
pub struct Prober<S> {
    config: ProberConfig,
    targets: Vec<Target>,
    bindings: HashMap<String, Binding<S>>,
    observations: mpsc::Receiver<Observation>,
    cycle: u64,
}

impl<S> Prober<S>
where
    S: AsyncWrite + Unpin,
{
    /// # Errors
    /// Returns [`Error::InvalidConfig`] when a target's interface has no binding.
    pub fn new(
        config: ProberConfig,
        targets: Vec<Target>,
        bindings: HashMap<String, Binding<S>>,
        observations: mpsc::Receiver<Observation>,
    ) -> Result<Self> {
        if let Some(target) = targets
            .iter()
            .find(|target| !bindings.contains_key(target.interface()))
        {
            return Err(Error::InvalidConfig(format!(
                "{} is assigned to interface {:?}, which is not open",
                target.address(),
                target.interface()
            )));
        }
        Ok(Self {
            config,
            targets,
            bindings,
            observations,
            cycle: 0,
        })
    }

    pub fn config(&self) -> &ProberConfig {
        &self.config
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn batch_count(&self) -> usize {
        self.targets.len().div_ceil(self.config.batch_size)
    }

    /// Probes all batches, handing each finished batch to `reporter`.
    ///
    /// Returns `Ok(())` after one pass in [`RunMode::Once`], or once `token` is
    /// cancelled. Cancellation is checked before every batch and also ends a
    /// collection window early; an interrupted batch is not reported.
    ///
    /// # Errors
    /// Returns [`Error::CaptureClosed`] when every sniffer has stopped.
    pub async fn run<R>(&mut self, reporter: &mut R, token: &CancellationToken) -> Result<()>
    where
        R: Reporter + ?Sized,
    {
        loop {
            for batch_index in 0..self.batch_count() {
                if token.is_cancelled() {
                    return Ok(());
                }
                match self.probe_batch(batch_index, token).await? {
                    Some(report) => reporter.report(&report),
                    None => return Ok(()),
                }
            }
            self.cycle += 1;
            if self.config.mode == RunMode::Once || self.targets.is_empty() {
                return Ok(());
            }
        }
    }

    async fn probe_batch(
        &mut self,
        batch_index: usize,
        token: &CancellationToken,
    ) -> Result<Option<BatchReport>> {
        let range = self.batch_range(batch_index);
        self.discard_stale();
        self.send_requests(range.clone()).await;
        if !self.collect(range.clone(), token).await? {
            return Ok(None);
        }
        Ok(Some(BatchReport {
            cycle: self.cycle,
            batch_index,
            targets: self.targets[range].iter().map(TargetReport::from).collect(),
        }))
    }

    fn batch_range(&self, batch_index: usize) -> Range<usize> {
        let start = batch_index * self.config.batch_size;
        start..(start + self.config.batch_size).min(self.targets.len())
    }

    /// Drops replies that arrived after the previous window closed.
    fn discard_stale(&mut self) {
        while let Ok(observation) = self.observations.try_recv() {
            debug!(
                "discarding late reply: {} is at {:?}",
                observation.address, observation.owner.hardware_address
            );
        }
    }

    async fn send_requests(&mut self, range: Range<usize>) {
        let bindings = &self.bindings;
        let mut requests = Vec::new();
        for target in &mut self.targets[range] {
            target.reset();
            let Some(binding) = bindings.get(target.interface()) else {
                continue;
            };
            let interface = binding.interface();
            if interface.owns(target.address()) {
                target.record(ObservedOwner::local(interface.mac));
                continue;
            }
            requests.push(send_request(binding, target.address()));
        }
        for result in futures::future::join_all(requests).await {
            if let Err(err) = result {
                warn!("{}", err);
            }
        }
    }

    /// Drains the queue until the window closes. Returns `false` if cancelled.
    async fn collect(&mut self, range: Range<usize>, token: &CancellationToken) -> Result<bool> {
        let deadline = Instant::now() + self.config.timeout;
        loop {
            let received = tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(false),
                _ = time::sleep_until(deadline) => return Ok(true),
                received = self.observations.recv() => received,
            };
            let observation = received.ok_or(Error::CaptureClosed)?;
            self.attribute(range.clone(), observation);
        }
    }

    fn attribute(&mut self, range: Range<usize>, observation: Observation) {
        let mut matched = false;
        for target in self.targets[range]
            .iter_mut()
            .filter(|target| target.address() == observation.address)
        {
            target.record(observation.owner);
            matched = true;
        }
        if !matched {
            debug!(
                "ignoring reply for {}, not in the current batch",
                observation.address
            );
        }
    }
}

async fn send_request<S>(binding: &Binding<S>, target: Ipv4Addr) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    let interface = binding.interface();
    let sender_mac = interface.mac.ok_or_else(|| Error::SendError {
        interface: interface.name.clone(),
        reason: format!("no hardware address to probe {} from", target),
    })?;
    let frame = request_frame(sender_mac, interface.source_ipv4_for(target), target)?;
    binding.send(&frame).await
}

#[cfg(test)]
mod tests {
    use std::{
        io,
        pin::Pin,
        sync::{Arc, Mutex},
        task::{Context, Poll},
    };

    use pnet::{
        packet::{arp::ArpOperations, ethernet::EtherTypes},
        util::MacAddr,
    };

    use super::*;
    use crate::{
        codec::{ArpHeader, EthernetHeader},
        interface::LocalInterface,
        target::Resolution,
    };

    const LOCAL_MAC: MacAddr = MacAddr(0x02, 0x00, 0x00, 0x00, 0x00, 0x0a);
    const ROUTER: MacAddr = MacAddr(0x00, 0x1a, 0x2b, 0x3c, 0x4d, 0x5e);
    const ROGUE: MacAddr = MacAddr(0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff);
    const LOCAL_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 10);

    /// Records every frame written; optionally rejects the first `failures` writes.
    #[derive(Clone, Default)]
    struct Recorder {
        frames: Arc<Mutex<Vec<Vec<u8>>>>,
        failures: Arc<Mutex<usize>>,
    }

    impl Recorder {
        fn failing(failures: usize) -> Self {
            let recorder = Self::default();
            *recorder.failures.lock().unwrap() = failures;
            recorder
        }

        fn frames(&self) -> Vec<Vec<u8>> {
            self.frames.lock().unwrap().clone()
        }
    }

    impl AsyncWrite for Recorder {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Poll::Ready(Err(io::Error::new(io::ErrorKind::Other, "link down")));
            }
            self.frames.lock().unwrap().push(buf.to_vec());
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn eth0() -> LocalInterface {
        LocalInterface {
            name: "eth0".into(),
            index: 2,
            mac: Some(LOCAL_MAC),
            up: true,
            networks: vec!["192.168.1.10/24".parse().unwrap()],
        }
    }

    fn host(last: u8) -> Ipv4Addr {
        Ipv4Addr::new(192, 168, 1, last)
    }

    fn prober(
        config: ProberConfig,
        addresses: &[Ipv4Addr],
        recorder: &Recorder,
    ) -> (Prober<Recorder>, mpsc::Sender<Observation>) {
        let (tx, rx) = mpsc::channel(10);
        let targets = addresses
            .iter()
            .map(|address| Target::new(*address, "eth0"))
            .collect();
        let bindings = HashMap::from([("eth0".to_string(), Binding::new(eth0(), recorder.clone()))]);
        (Prober::new(config, targets, bindings, rx).unwrap(), tx)
    }

    fn reply_later(tx: &mpsc::Sender<Observation>, after: Duration, address: Ipv4Addr, mac: MacAddr) {
        let tx = tx.clone();
        tokio::spawn(async move {
            time::sleep(after).await;
            let _ = tx
                .send(Observation {
                    address,
                    owner: ObservedOwner::remote(mac),
                })
                .await;
        });
    }

    async fn run_collecting(prober: &mut Prober<Recorder>) -> Result<Vec<BatchReport>> {
        let mut reports = Vec::new();
        let mut reporter = |batch: &BatchReport| reports.push(batch.clone());
        prober.run(&mut reporter, &CancellationToken::new()).await?;
        Ok(reports)
    }

    fn default_config() -> ProberConfig {
        ProberConfigBuilder::new().build().unwrap()
    }

    #[test]
    fn test_config_builder() {
        let config = default_config();
        assert_eq!(config.timeout, Duration::from_secs(1));
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.mode, RunMode::Once);

        assert!(matches!(
            ProberConfigBuilder::new().with_batch_size(0).build(),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_unbound_interface_rejected() {
        let (_tx, rx) = mpsc::channel(1);
        let bindings: HashMap<String, Binding<Recorder>> = HashMap::new();
        let result = Prober::new(
            default_config(),
            vec![Target::new(host(1), "eth1")],
            bindings,
            rx,
        );
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_reply_resolves() {
        let recorder = Recorder::default();
        let (mut prober, tx) = prober(default_config(), &[host(1)], &recorder);
        reply_later(&tx, Duration::from_millis(100), host(1), ROUTER);

        let reports = run_collecting(&mut prober).await.unwrap();
        assert_eq!(reports.len(), 1);
        let target = &reports[0].targets[0];
        assert_eq!(target.address, host(1));
        assert_eq!(target.interface, "eth0");
        assert_eq!(target.owners.len(), 1);
        assert_eq!(target.owners[0].hardware_address, Some(ROUTER));
        assert!(!target.owners[0].is_local_own);
        assert_eq!(target.resolution(), Resolution::Resolved);

        let frames = recorder.frames();
        assert_eq!(frames.len(), 1);
        let ethernet = EthernetHeader::decode(&frames[0]).unwrap();
        assert_eq!(ethernet.destination, MacAddr::broadcast());
        assert_eq!(ethernet.source, LOCAL_MAC);
        assert_eq!(ethernet.ether_type, EtherTypes::Arp);
        let arp = ArpHeader::decode(&frames[0][EthernetHeader::LEN..]).unwrap();
        assert_eq!(arp.operation, ArpOperations::Request);
        assert_eq!(arp.sender_hw_addr, LOCAL_MAC);
        assert_eq!(arp.sender_proto_addr, LOCAL_IP);
        assert_eq!(arp.target_hw_addr, MacAddr::zero());
        assert_eq!(arp.target_proto_addr, host(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_claimants_conflict() {
        let recorder = Recorder::default();
        let (mut prober, tx) = prober(default_config(), &[host(1)], &recorder);
        reply_later(&tx, Duration::from_millis(100), host(1), ROUTER);
        reply_later(&tx, Duration::from_millis(300), host(1), ROGUE);

        let reports = run_collecting(&mut prober).await.unwrap();
        let target = &reports[0].targets[0];
        assert_eq!(target.owners.len(), 2);
        assert!(target.is_conflict());
        assert_eq!(prober.targets()[0].resolution(), Resolution::Conflict);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_spans_two_interfaces() {
        const ETH1_MAC: MacAddr = MacAddr(0x02, 0x00, 0x00, 0x00, 0x01, 0x0a);
        let eth1_gateway = Ipv4Addr::new(10, 0, 0, 1);
        let eth1_own = Ipv4Addr::new(10, 0, 0, 10);
        let eth1 = LocalInterface {
            name: "eth1".into(),
            index: 3,
            mac: Some(ETH1_MAC),
            up: true,
            networks: vec!["10.0.0.10/24".parse().unwrap()],
        };

        let eth0_recorder = Recorder::default();
        let eth1_recorder = Recorder::default();
        let bindings = HashMap::from([
            ("eth0".to_string(), Binding::new(eth0(), eth0_recorder.clone())),
            ("eth1".to_string(), Binding::new(eth1, eth1_recorder.clone())),
        ]);
        let targets = vec![
            Target::new(host(1), "eth0"),
            Target::new(eth1_gateway, "eth1"),
            Target::new(eth1_own, "eth1"),
        ];
        let config = ProberConfigBuilder::new().with_batch_size(3).build().unwrap();
        let (tx, rx) = mpsc::channel(10);
        let mut prober = Prober::new(config, targets, bindings, rx).unwrap();

        // one queue handle per sniffer
        let eth0_queue = tx.clone();
        let eth1_queue = tx;
        reply_later(&eth0_queue, Duration::from_millis(100), host(1), ROUTER);
        reply_later(&eth1_queue, Duration::from_millis(150), eth1_gateway, ROUTER);
        reply_later(&eth1_queue, Duration::from_millis(200), eth1_gateway, ROGUE);

        let reports = run_collecting(&mut prober).await.unwrap();
        assert_eq!(reports.len(), 1);
        let owners: Vec<_> = reports[0]
            .targets
            .iter()
            .map(|target| target.owners.len())
            .collect();
        assert_eq!(owners, vec![1, 2, 1]);
        assert!(!reports[0].targets[0].is_conflict());
        assert!(reports[0].targets[1].is_conflict());
        assert!(reports[0].targets[2].owners[0].is_local_own);
        assert_eq!(reports[0].targets[2].owners[0].hardware_address, Some(ETH1_MAC));

        let eth0_frames = eth0_recorder.frames();
        assert_eq!(eth0_frames.len(), 1);
        let arp = ArpHeader::decode(&eth0_frames[0][EthernetHeader::LEN..]).unwrap();
        assert_eq!(arp.sender_hw_addr, LOCAL_MAC);
        assert_eq!(arp.sender_proto_addr, LOCAL_IP);
        assert_eq!(arp.target_proto_addr, host(1));

        let eth1_frames = eth1_recorder.frames();
        assert_eq!(eth1_frames.len(), 1);
        assert_eq!(EthernetHeader::decode(&eth1_frames[0]).unwrap().source, ETH1_MAC);
        let arp = ArpHeader::decode(&eth1_frames[0][EthernetHeader::LEN..]).unwrap();
        assert_eq!(arp.sender_hw_addr, ETH1_MAC);
        assert_eq!(arp.sender_proto_addr, eth1_own);
        assert_eq!(arp.target_proto_addr, eth1_gateway);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_uses_address_of_containing_subnet() {
        let secondary = Ipv4Addr::new(172, 16, 0, 10);
        let mut interface = eth0();
        interface.networks.push("172.16.0.10/16".parse().unwrap());
        let recorder = Recorder::default();
        let bindings = HashMap::from([("eth0".to_string(), Binding::new(interface, recorder.clone()))]);
        let targets = vec![
            Target::new(host(1), "eth0"),
            Target::new(Ipv4Addr::new(172, 16, 5, 5), "eth0"),
        ];
        let config = ProberConfigBuilder::new().with_batch_size(2).build().unwrap();
        let (_tx, rx) = mpsc::channel(10);
        let mut prober = Prober::new(config, targets, bindings, rx).unwrap();

        run_collecting(&mut prober).await.unwrap();
        let senders: Vec<_> = recorder
            .frames()
            .iter()
            .map(|frame| ArpHeader::decode(&frame[EthernetHeader::LEN..]).unwrap())
            .map(|arp| (arp.target_proto_addr, arp.sender_proto_addr))
            .collect();
        assert_eq!(
            senders,
            vec![(host(1), LOCAL_IP), (Ipv4Addr::new(172, 16, 5, 5), secondary)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_reply_waits_full_window() {
        let recorder = Recorder::default();
        let config = ProberConfigBuilder::new()
            .with_timeout(Duration::from_millis(750))
            .build()
            .unwrap();
        let (mut prober, _tx) = prober(config, &[host(1)], &recorder);

        let start = Instant::now();
        let reports = run_collecting(&mut prober).await.unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(750), "{:?}", elapsed);
        assert!(elapsed < Duration::from_millis(800), "{:?}", elapsed);
        assert!(reports[0].targets[0].owners.is_empty());
        assert_eq!(reports[0].targets[0].resolution(), Resolution::Absent);
    }

    #[tokio::test(start_paused = true)]
    async fn test_own_address_needs_no_request() {
        let recorder = Recorder::default();
        let (mut prober, _tx) = prober(default_config(), &[LOCAL_IP], &recorder);

        let reports = run_collecting(&mut prober).await.unwrap();
        let owners = &reports[0].targets[0].owners;
        assert_eq!(owners.len(), 1);
        assert!(owners[0].is_local_own);
        assert_eq!(owners[0].hardware_address, Some(LOCAL_MAC));
        assert!(recorder.frames().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_reply_is_not_attributed() {
        let recorder = Recorder::default();
        let (mut prober, tx) = prober(default_config(), &[host(1), host(2)], &recorder);
        // lands in the second batch's window
        reply_later(&tx, Duration::from_millis(1500), host(1), ROUTER);

        let reports = run_collecting(&mut prober).await.unwrap();
        assert_eq!(reports.len(), 2);
        assert!(reports[0].targets[0].owners.is_empty());
        assert!(reports[1].targets[0].owners.is_empty());
        assert!(prober.targets().iter().all(|target| target.owners().is_empty()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_reply_before_batch_is_discarded() {
        let recorder = Recorder::default();
        let (mut prober, tx) = prober(default_config(), &[host(1)], &recorder);
        tx.send(Observation {
            address: host(1),
            owner: ObservedOwner::remote(ROGUE),
        })
        .await
        .unwrap();

        let reports = run_collecting(&mut prober).await.unwrap();
        assert!(reports[0].targets[0].owners.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_failure_does_not_abort_batch() {
        let recorder = Recorder::failing(1);
        let config = ProberConfigBuilder::new().with_batch_size(2).build().unwrap();
        let (mut prober, tx) = prober(config, &[host(1), host(2)], &recorder);
        reply_later(&tx, Duration::from_millis(100), host(2), ROUTER);

        let reports = run_collecting(&mut prober).await.unwrap();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].targets[0].owners.is_empty());
        assert_eq!(reports[0].targets[1].owners.len(), 1);
        assert_eq!(recorder.frames().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_mac_counts_as_send_failure() {
        let (_tx, rx) = mpsc::channel(1);
        let recorder = Recorder::default();
        let interface = LocalInterface { mac: None, ..eth0() };
        let bindings = HashMap::from([("eth0".to_string(), Binding::new(interface, recorder.clone()))]);
        let mut prober = Prober::new(
            default_config(),
            vec![Target::new(host(1), "eth0")],
            bindings,
            rx,
        )
        .unwrap();

        let reports = run_collecting(&mut prober).await.unwrap();
        assert!(reports[0].targets[0].owners.is_empty());
        assert!(recorder.frames().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_batches_keep_order() {
        let recorder = Recorder::default();
        let config = ProberConfigBuilder::new()
            .with_batch_size(2)
            .with_timeout(Duration::from_millis(200))
            .build()
            .unwrap();
        let addresses = [host(1), host(2), host(3), host(4), host(5)];
        let (mut prober, _tx) = prober(config, &addresses, &recorder);
        assert_eq!(prober.batch_count(), 3);

        let reports = run_collecting(&mut prober).await.unwrap();
        let batches: Vec<(usize, Vec<Ipv4Addr>)> = reports
            .iter()
            .map(|report| {
                (
                    report.batch_index,
                    report.targets.iter().map(|target| target.address).collect(),
                )
            })
            .collect();
        assert_eq!(
            batches,
            vec![
                (0, vec![host(1), host(2)]),
                (1, vec![host(3), host(4)]),
                (2, vec![host(5)]),
            ]
        );
        let probed: Vec<Ipv4Addr> = recorder
            .frames()
            .iter()
            .map(|frame| {
                ArpHeader::decode(&frame[EthernetHeader::LEN..])
                    .unwrap()
                    .target_proto_addr
            })
            .collect();
        assert_eq!(probed, addresses.to_vec());
    }

    #[tokio::test(start_paused = true)]
    async fn test_continuous_mode_cycles_until_cancelled() {
        let recorder = Recorder::default();
        let config = ProberConfigBuilder::new()
            .with_mode(RunMode::Continuous)
            .build()
            .unwrap();
        let (mut prober, _tx) = prober(config, &[host(1), host(2)], &recorder);
        let token = CancellationToken::new();

        let mut seen = Vec::new();
        let mut reporter = |batch: &BatchReport| {
            seen.push((batch.cycle, batch.batch_index));
            if seen.len() == 5 {
                token.cancel();
            }
        };
        prober.run(&mut reporter, &token).await.unwrap();
        assert_eq!(seen, vec![(0, 0), (0, 1), (1, 0), (1, 1), (2, 0)]);
        assert_eq!(recorder.frames().len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_ends_window_early() {
        let recorder = Recorder::default();
        let (mut prober, _tx) = prober(default_config(), &[host(1)], &recorder);
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(400)).await;
            canceller.cancel();
        });

        let start = Instant::now();
        let mut reports = Vec::new();
        let mut reporter = |batch: &BatchReport| reports.push(batch.clone());
        prober.run(&mut reporter, &token).await.unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(400), "{:?}", elapsed);
        assert!(elapsed < Duration::from_secs(1), "{:?}", elapsed);
        assert!(reports.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_queue_stops_run() {
        let recorder = Recorder::default();
        let (mut prober, tx) = prober(default_config(), &[host(1)], &recorder);
        drop(tx);

        assert!(matches!(
            run_collecting(&mut prober).await,
            Err(Error::CaptureClosed)
        ));
    }
}
