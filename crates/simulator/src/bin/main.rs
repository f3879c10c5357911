use clap::{Parser, ValueEnum};
use rainsim_simulator::{Simulator, SimulatorConfig};
use rainsim_types::ProtocolVariant;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Protocol {
    /// Scalar-GST variant.
    Gr,
    /// Vector-GST variant.
    Grv,
}

impl From<Protocol> for ProtocolVariant {
    fn from(protocol: Protocol) -> Self {
        match protocol {
            Protocol::Gr => ProtocolVariant::Scalar,
            Protocol::Grv => ProtocolVariant::Vector,
        }
    }
}

/// Simulate a geo-replicated causally-consistent key-value store.
#[derive(Parser, Debug)]
#[command(name = "rainsim")]
struct Args {
    /// Protocol variant to simulate.
    #[arg(long, value_enum, default_value = "gr")]
    protocol: Protocol,

    /// Number of replicas (datacenters).
    #[arg(long, default_value_t = 2)]
    replicas: u32,

    /// Partitions per replica.
    #[arg(long, default_value_t = 4)]
    partitions: u32,

    /// Clients per replica.
    #[arg(long, default_value_t = 4)]
    clients: u32,

    /// Milliseconds between consecutive requests of one client.
    #[arg(long, default_value_t = 10)]
    request_interval_ms: u64,

    /// Simulated run length in milliseconds.
    #[arg(long, default_value_t = 5000)]
    duration_ms: u64,

    /// Warmup excluded from statistics, in milliseconds.
    #[arg(long, default_value_t = 500)]
    warmup_ms: u64,

    /// Random seed (clock-skew draws).
    #[arg(long, default_value_t = 12345)]
    seed: u64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = SimulatorConfig::new(args.replicas, args.partitions, args.protocol.into())
        .with_clients_per_replica(args.clients)
        .with_request_interval(Duration::from_millis(args.request_interval_ms))
        .with_duration(Duration::from_millis(args.duration_ms))
        .with_warmup(Duration::from_millis(args.warmup_ms))
        .with_seed(args.seed);

    let report = Simulator::new(config).run()?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
