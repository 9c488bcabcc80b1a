use arpman::{interface::LocalInterface, BatchReport, Monitor, ProberConfigBuilder};
use clap::Parser;
use std::io::Write;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Scan a whole subnet once and list duplicate address claims
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Network interface whose first IPv4 subnet is scanned
    #[arg(short, long)]
    iface: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();
    let interface = arpman::interface::local_interfaces()
        .into_iter()
        .find(|iface| iface.name == args.iface)
        .ok_or_else(|| format!("interface {} not found", args.iface))
        .unwrap();
    let net = interface
        .networks
        .first()
        .copied()
        .ok_or("interface has no IPv4 address")
        .unwrap();
    let hosts: Vec<_> = net.hosts().collect();

    let config = ProberConfigBuilder::new()
        .with_batch_size(64)
        .with_timeout(Duration::from_millis(500))
        .build()
        .unwrap();
    let interfaces: [LocalInterface; 1] = [interface];
    let mut monitor = Monitor::with_interfaces(&hosts, config, &interfaces).unwrap();

    let mut found = 0;
    let mut conflicts = Vec::new();
    let mut reporter = |batch: &BatchReport| {
        for target in &batch.targets {
            if !target.owners.is_empty() {
                found += 1;
            }
        }
        conflicts.extend(batch.conflicts().cloned());
    };
    monitor
        .run(&mut reporter, &CancellationToken::new())
        .await
        .unwrap();

    {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "Found {} hosts", found).unwrap();
        for conflict in conflicts {
            writeln!(stdout, "{} is claimed by {:?}", conflict.address, conflict.owners).unwrap();
        }
    }
}
