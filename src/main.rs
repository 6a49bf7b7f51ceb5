//! Barrido CLI: drive a kernel launch sweep and print its results
//!
//! Runs the full experiment matrix (3 patterns × the requested block
//! sizes) on the chosen launcher and prints markdown tables, or the full
//! JSON record for external plotting/reporting consumers. Failed cells
//! are always reported distinctly from measured ones.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use barrido::{run_sweep, CpuLauncher, KernelLauncher, SweepConfig};

/// Which launcher executes the kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LauncherChoice {
    /// Deterministic software-simulated grid walk (no hardware needed)
    Cpu,
    /// First available OpenCL device (requires the `opencl` feature)
    Opencl,
}

/// Kernel launch sweep harness for branch-divergence and block-size
/// benchmarking
#[derive(Parser)]
#[command(name = "barrido")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Elements per input pattern
    #[arg(long, default_value = "1048576")]
    elements: usize,

    /// Threshold as a fraction of the value range
    #[arg(long, default_value = "0.5")]
    threshold: f32,

    /// Comma-separated thread-block sizes to sweep
    #[arg(long, value_delimiter = ',', default_value = "32,64,128,256,512,1024")]
    block_sizes: Vec<u32>,

    /// Timed runs per cell
    #[arg(long, default_value = "10")]
    runs: usize,

    /// Discarded warm-up launches per cell
    #[arg(long, default_value = "1")]
    warmup: usize,

    /// Per-launch watchdog timeout in seconds (0 disables)
    #[arg(long, default_value = "30")]
    timeout_secs: u64,

    /// Launcher backend
    #[arg(long, value_enum, default_value = "cpu")]
    launcher: LauncherChoice,

    /// Emit the full result record as JSON instead of tables
    #[arg(long)]
    json: bool,
}

fn build_launcher(choice: LauncherChoice) -> barrido::Result<Arc<dyn KernelLauncher>> {
    match choice {
        LauncherChoice::Cpu => Ok(Arc::new(CpuLauncher::new())),
        #[cfg(feature = "opencl")]
        LauncherChoice::Opencl => Ok(Arc::new(barrido::OpenClLauncher::new()?)),
        #[cfg(not(feature = "opencl"))]
        LauncherChoice::Opencl => Err(barrido::BarridoError::Device {
            reason: "this binary was built without the `opencl` feature".to_string(),
        }),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = SweepConfig::new()
        .with_total_elements(cli.elements)
        .with_threshold_fraction(cli.threshold)
        .with_block_sizes(cli.block_sizes)
        .with_runs(cli.runs)
        .with_warmup_launches(cli.warmup)
        .with_launch_timeout(Duration::from_secs(cli.timeout_secs));

    let launcher = build_launcher(cli.launcher)?;
    let results = run_sweep(&launcher, &config)?;

    if cli.json {
        println!("{}", results.to_json()?);
    } else {
        println!("{}", results.to_markdown_table());
        if !results.is_complete() {
            let total = results.sample_count() + results.failures.len();
            eprintln!(
                "{} of {total} cells failed; failed cells are listed in the table above",
                results.failures.len()
            );
        }
    }
    Ok(())
}
