use anyhow::Result;
use clap::Parser;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;
use log::{info, warn, error, debug, trace};

use hcc_common::{SimulationConfig, Snapshot};
use hcc_simulation::{load_site_table, HccSimulation};

/// Runs a hepatocellular carcinoma growth simulation on a hexagonal liver lattice.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the TOML run configuration.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

fn main() -> Result<()> {
    // Initialize the logger
    env_logger::init();
    let args = Args::parse();

    info!("Starting HCC lattice simulation...");

    // --- Load Configuration and Geometry ---
    let config = SimulationConfig::load(&args.config)?;
    let site_records = load_site_table(&config.lattice.site_table)?;

    // --- Initialize Simulation ---
    let mut sim = HccSimulation::new(config, &site_records)?;
    debug!("Simulation Parameters: {:#?}", sim.params());

    let total_steps = sim.config().timing.total_steps;
    let record_interval_steps = sim.config().timing.record_interval_steps.max(1);
    info!("Recording snapshot every {} steps.", record_interval_steps);

    info!("Starting simulation loop for {} steps...", total_steps);
    let start_time = Instant::now();
    let mut previous_print_time = start_time;

    // --- Initial Snapshot (step = 0) ---
    if let Err(e) = sim.record_snapshot() {
        error!("Error recording initial snapshot: {}", e);
        anyhow::bail!("Failed to record initial snapshot.");
    }

    for step in 0..total_steps {
        let step_start_time = Instant::now();
        let report = match sim.step() {
            Ok(report) => report,
            Err(e) => {
                error!("Error during simulation step {}: {}", step + 1, e);
                anyhow::bail!("Simulation step failed.");
            }
        };
        let step_duration = step_start_time.elapsed();

        let current_time = Instant::now();
        let print_interval_secs = 5.0;
        let should_print_status = current_time.duration_since(previous_print_time).as_secs_f64() >= print_interval_secs;
        let is_record_step = (step + 1) % record_interval_steps == 0;
        let is_last_step = step == total_steps - 1;

        if should_print_status || is_record_step || is_last_step {
            info!(
                "Step [{}/{}] | Cancer cells: {} | Grown: {} | Cleared: {} | Killed: {} | Step Time: {:6.2} ms | Elapsed: {:.2} s",
                step + 1,
                total_steps,
                sim.cancer_cell_count(),
                report.transition.cancer_cells_grown,
                report.transition.hepatocytes_cleared,
                report.predation.map_or(0, |p| p.killed),
                step_duration.as_secs_f64() * 1000.0,
                start_time.elapsed().as_secs_f64()
            );
            previous_print_time = current_time;

            if is_record_step || is_last_step {
                if let Err(e) = sim.record_snapshot() {
                    error!("Error recording snapshot at step {}: {}", step + 1, e);
                    anyhow::bail!("Failed to record snapshot.");
                }
            }
        } else {
            trace!(
                "Step [{}/{}] completed in {:.2} ms",
                step + 1,
                total_steps,
                step_duration.as_secs_f64() * 1000.0
            );
        }
    }

    info!("Simulation finished in {:.3} seconds.", start_time.elapsed().as_secs_f64());

    // --- Save Recorded Data ---
    let output = sim.config().output.clone();
    if output.save_stats {
        let snapshots = sim.get_recorded_snapshots();
        match output.format.as_deref().unwrap_or("json") {
            "json" => write_json(&output.base_filename, snapshots),
            "bincode" => {
                let filename = format!("{}_snapshots.bin", output.base_filename);
                match File::create(&filename) {
                    Ok(file) => match bincode::serialize_into(file, snapshots) {
                        Ok(_) => info!("All snapshots saved to {} (binary format)", filename),
                        Err(e) => error!("Error serializing snapshots to bincode: {}", e),
                    },
                    Err(e) => error!("Error creating snapshot file '{}': {}", filename, e),
                }
            }
            "messagepack" => {
                let filename = format!("{}_snapshots.msgpack", output.base_filename);
                match &mut File::create(&filename) {
                    Ok(file) => match rmp_serde::encode::write(file, snapshots) {
                        Ok(_) => info!("All snapshots saved to {} (MessagePack format)", filename),
                        Err(e) => error!("Error serializing snapshots to MessagePack: {}", e),
                    },
                    Err(e) => error!("Error creating snapshot file '{}': {}", filename, e),
                }
            }
            other => {
                warn!("Unknown output format: {}. Using JSON instead.", other);
                write_json(&output.base_filename, snapshots);
            }
        }
    } else {
        info!("Skipping saving snapshots as per config (save_stats is false).");
    }

    if output.save_positions {
        save_final_positions(&sim, &output.base_filename)?;
    } else {
        info!("Skipping saving final positions as per config.");
    }

    info!("Simulation Complete.");
    Ok(())
}

fn write_json(base_filename: &str, snapshots: &[Snapshot]) {
    let filename = format!("{}_snapshots.json", base_filename);
    match File::create(&filename) {
        Ok(mut file) => match serde_json::to_string(snapshots) {
            Ok(json_string) => {
                if let Err(e) = file.write_all(json_string.as_bytes()) {
                    error!("Error writing snapshot JSON to file '{}': {}", filename, e);
                } else {
                    info!("All snapshots saved to {}", filename);
                }
            }
            Err(e) => error!("Error serializing snapshots to JSON: {}", e),
        },
        Err(e) => error!("Error creating snapshot file '{}': {}", filename, e),
    }
}

/// Writes final cancer-cell positions with nodule labels, and the nodule size table.
fn save_final_positions(sim: &HccSimulation, base_filename: &str) -> Result<()> {
    let filename = format!("{}_final_positions.csv", base_filename);
    let mut writer = csv::Writer::from_path(&filename)?;
    writer.write_record(["site_id", "cell_id", "x", "y", "nodule"])?;
    for (label, (x, y)) in sim.final_cancer_positions() {
        writer.write_record(&[
            label.site_id.to_string(),
            label.cell_id.to_string(),
            format!("{:.4}", x),
            format!("{:.4}", y),
            label.nodule.to_string(),
        ])?;
    }
    writer.flush()?;
    info!("Final positions saved to {}", filename);

    let filename = format!("{}_nodule_sizes.csv", base_filename);
    let mut writer = csv::Writer::from_path(&filename)?;
    writer.write_record(["nodule", "size"])?;
    let nodules = sim.analyze_nodules();
    for (nodule, size) in nodules.sizes.iter().enumerate() {
        writer.write_record(&[nodule.to_string(), size.to_string()])?;
    }
    writer.flush()?;
    info!("Nodule sizes saved to {}", filename);
    // (size, count) pairs, smallest nodules first
    info!("Final nodule size histogram: {:?}", nodules.size_histogram());
    Ok(())
}
