//! Sample printer – renders heightmaps from the output bus to stdout.

use colored::Colorize;
use heightscan_middleware::HeightmapReceiver;
use heightscan_types::HeightmapSample;
use tracing::warn;

/// One-line human-readable summary of a sample.
pub fn format_summary(sample: &HeightmapSample) -> String {
    let valid = sample.heightmap.iter().filter(|&&h| h > 0).count();
    let peak = sample.heightmap.iter().copied().max().unwrap_or(0);
    format!(
        "frame {:>6}  {}x{}  columns with height {}/{}  peak {}",
        sample.frame_number,
        sample.width,
        sample.height,
        valid,
        sample.heightmap.len(),
        peak
    )
}

/// Whether the sample with `frame_number` should be printed.
pub fn should_print(frame_number: u64, every: u64) -> bool {
    frame_number % every.max(1) == 0
}

/// Print every `every`-th sample until the bus closes.
pub async fn print_samples(mut rx: HeightmapReceiver, every: u64, emit_json: bool) {
    while let Some(sample) = rx.recv().await {
        if !should_print(sample.frame_number, every) {
            continue;
        }
        if emit_json {
            match serde_json::to_string(&sample) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!(error = %e, "failed to serialise heightmap"),
            }
        } else {
            println!("  {}", format_summary(&sample).dimmed());
        }
    }
    if rx.dropped() > 0 {
        warn!(dropped = rx.dropped(), "printer fell behind the scan");
    }
}
