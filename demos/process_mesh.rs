//! Process a mesh end to end: inspect, reduce or remesh, relink materials
//! and deliver the result.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use meshpress_pipeline::{process, ProcessOptions, RequestedOperation};
use meshpress_tools::RetopoMode;

/// Reduce a mesh's polygon count and repair its topology.
#[derive(Parser)]
#[command(name = "process_mesh")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input mesh (OBJ)
    input: PathBuf,

    /// Target face count
    #[arg(short, long)]
    target: usize,

    /// Processing path: auto, simplify or remesh
    #[arg(short, long, default_value = "auto")]
    operation: RequestedOperation,

    /// Retopology preset: balanced, fine, coarse or fix_holes
    #[arg(short, long, default_value = "balanced")]
    mode: RetopoMode,

    /// Keep texture seams intact while decimating
    #[arg(long)]
    preserve_uv: bool,

    /// Let boundary vertices move freely
    #[arg(long)]
    free_boundaries: bool,

    /// Convert the result to binary glTF
    #[arg(long)]
    glb: bool,

    /// Write a JSON processing report beside the output
    #[arg(long)]
    report: bool,

    /// Output directory (defaults to the input's directory)
    #[arg(short = 'd', long)]
    output_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut options = ProcessOptions::new(args.target)
        .operation(args.operation)
        .mode(args.mode)
        .preserve_boundaries(!args.free_boundaries)
        .preserve_uv(args.preserve_uv)
        .deliver_glb(args.glb)
        .write_report(args.report);
    if let Some(dir) = args.output_dir {
        options = options.output_dir(dir);
    }

    let outcome = process(&args.input, &options)?;
    println!(
        "{} -> {} ({} faces -> {}, {})",
        args.input.display(),
        outcome.output_path.display(),
        outcome.original.face_count,
        outcome.final_report.face_count,
        outcome.strategy
    );
    Ok(())
}
