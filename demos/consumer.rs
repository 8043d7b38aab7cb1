// Serve channels for a producer process and count what arrives.
//
//   cargo run --example consumer -- [backend] [workers]
//
// Prints the IPC directory; start `producer` with it.
use evpipe::Dispatch::{full_offer, BackendRegistry};
use evpipe::{Session, TransportConfig};
use std::env;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();
    let backend_name = args.get(1).map(String::as_str).unwrap_or("simple-count");
    let workers: usize = args
        .get(2)
        .map(|s| s.parse().expect("Invalid worker count"))
        .unwrap_or(1);

    let config = TransportConfig::from_env()
        .expect("Invalid EVPIPE_* environment")
        .with_workers(workers);
    let registry = BackendRegistry::default();
    let backend = match registry.create(backend_name) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("{} (available: {})", e, registry.available().join(", "));
            std::process::exit(1);
        }
    };

    let session = Session::new(config).expect("Invalid configuration");
    let serving = session
        .serve(&full_offer(), backend)
        .expect("Failed to create channels");

    // the producer needs exactly this line
    println!("{}", serving.dir().expect("served channels have a directory").display());

    let start = std::time::Instant::now();
    let summary = serving.wait().expect("Consumer failed");
    let totals = summary.totals();
    println!(
        "Consumer: {} events in {} buffers from {} workers in {:.2?}",
        totals.dispatched,
        summary.buffers(),
        summary.workers.len(),
        start.elapsed()
    );
}
