use std::{fs::File, io::BufReader, path::PathBuf, time::Duration};

use anyhow::Context;
use arpman::{input::load_targets, LineReporter, Monitor, OuiTable, ProberConfigBuilder, RunMode};
use clap::Parser;
use tokio_util::sync::CancellationToken;

/// Probe the addresses listed in a file with ARP and print who answers for each
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Collection window after each batch of requests, e.g. `500ms`, `1s` or `2`
    #[arg(short, long, default_value = "1s", value_parser = parse_timeout)]
    timeout: Duration,

    /// Number of addresses probed within one collection window
    #[arg(short = 'b', long = "burst", default_value_t = 1)]
    batch_size: usize,

    /// Start over after the last address instead of exiting
    #[arg(short, long)]
    watch: bool,

    /// OUI registry (`AABBCC Organization` per line) used to print vendor names
    #[arg(short, long)]
    lookup: Option<PathBuf>,

    /// File with one IPv4 address per line; `#` starts a comment line
    configfile: PathBuf,
}

fn parse_timeout(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    let invalid = || format!("invalid duration {:?}", value);
    if let Some(millis) = value.strip_suffix("ms") {
        return millis
            .parse()
            .map(Duration::from_millis)
            .map_err(|_| invalid());
    }
    let secs: f64 = value
        .strip_suffix('s')
        .unwrap_or(value)
        .parse()
        .map_err(|_| invalid())?;
    Duration::try_from_secs_f64(secs).map_err(|_| invalid())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let addresses = load_targets(&args.configfile)
        .with_context(|| format!("failed to read {}", args.configfile.display()))?;
    let mode = if args.watch {
        RunMode::Continuous
    } else {
        RunMode::Once
    };
    let config = ProberConfigBuilder::new()
        .with_timeout(args.timeout)
        .with_batch_size(args.batch_size)
        .with_mode(mode)
        .build()?;

    let mut reporter = LineReporter::new(std::io::stdout());
    if let Some(path) = &args.lookup {
        let file =
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        let table = OuiTable::from_reader(BufReader::new(file))
            .with_context(|| format!("failed to read {}", path.display()))?;
        log::info!("loaded {} OUI entries", table.len());
        reporter = reporter.with_lookup(table);
    }

    let mut monitor = Monitor::new(&addresses, config).context("failed to start probing")?;

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            canceller.cancel();
        }
    });

    monitor.run(&mut reporter, &token).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timeout() {
        assert_eq!(parse_timeout("1s"), Ok(Duration::from_secs(1)));
        assert_eq!(parse_timeout("500ms"), Ok(Duration::from_millis(500)));
        assert_eq!(parse_timeout("2"), Ok(Duration::from_secs(2)));
        assert_eq!(parse_timeout("1.5s"), Ok(Duration::from_millis(1500)));
        assert!(parse_timeout("soon").is_err());
        assert!(parse_timeout("-1s").is_err());
        assert!(parse_timeout("10m").is_err());
    }

    #[test]
    fn test_args() {
        let args = Args::try_parse_from(["arpman", "-t", "250ms", "-b", "4", "-w", "targets.conf"])
            .unwrap();
        assert_eq!(args.timeout, Duration::from_millis(250));
        assert_eq!(args.batch_size, 4);
        assert!(args.watch);
        assert!(args.lookup.is_none());
        assert_eq!(args.configfile, PathBuf::from("targets.conf"));
    }
}
