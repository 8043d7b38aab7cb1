// Attach to a running `consumer` and stream synthetic events into it.
//
//   cargo run --example producer -- <ipc_dir> <num_events> [worker]
use evpipe::Dispatch::{EventWriter, SyntheticSource};
use evpipe::TransportConfig;
use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <ipc_dir> <num_events> [worker]", args[0]);
        std::process::exit(1);
    }
    let dir = PathBuf::from(&args[1]);
    let num_events: u64 = args[2].parse().expect("Invalid number of events");
    let worker: usize = args.get(3).map(|s| s.parse().expect("Invalid worker")).unwrap_or(0);

    let config = TransportConfig::from_env().expect("Invalid EVPIPE_* environment");
    let mut writer = EventWriter::attach(&dir, config.base_name(), worker, config.liveness_timeout())
        .expect("Failed to attach to consumer");
    info!(dir = %dir.display(), worker, "attached");

    let keep_running = Arc::new(AtomicBool::new(true));
    let keep_running_for_handler = Arc::clone(&keep_running);

    // Ctrl+C stops early but still ends the stream cleanly
    ctrlc::set_handler(move || {
        keep_running_for_handler.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");

    let source = SyntheticSource::new(num_events).with_seed(worker as u64);
    let start = std::time::Instant::now();
    for (i, event) in source.events().enumerate() {
        if !keep_running.load(Ordering::Relaxed) {
            break;
        }
        writer.timestamp(i as u64);
        event.write_to(&mut writer).expect("Failed to write event");
    }
    writer.finish().expect("Failed to finish stream");

    println!(
        "Producer: sent {} events in {} buffers in {:.2?}",
        writer.events_written(),
        writer.channel().flushed(),
        start.elapsed()
    );
}
