//! Inspect a mesh and print its quality report with processing
//! recommendations.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use meshpress_pipeline::analyze;

/// Report mesh quality and suggested processing parameters.
#[derive(Parser)]
#[command(name = "analyze_mesh")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input mesh (OBJ)
    input: PathBuf,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let report = analyze(&args.input)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let quality = &report.quality;
    println!("vertices:      {}", quality.vertex_count);
    println!("faces:         {}", quality.face_count);
    println!("edges:         {}", quality.edge_count);
    println!("watertight:    {}", quality.is_watertight);
    println!("components:    {}", quality.component_count);
    println!("surface area:  {:.4}", quality.surface_area);
    println!("bbox diagonal: {:.4}", quality.bbox_diagonal);
    for issue in &quality.issues {
        println!("issue:   {issue}");
    }
    for warning in &quality.warnings {
        println!("warning: {warning}");
    }

    let recs = &report.recommendations;
    println!();
    println!("complexity:          {}", recs.complexity);
    println!("suggested operation: {}", recs.operation);
    println!("suggested target:    {} faces", recs.target_faces);
    println!(
        "reduction presets:   {} / {} / {} (aggressive / moderate / conservative)",
        recs.aggressive_target, recs.moderate_target, recs.conservative_target
    );
    Ok(())
}
