//! Re-attach a reference mesh's materials to a rewritten mesh.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use meshpress_io::relink_materials;

/// Carry material and texture references over to a rewritten mesh.
#[derive(Parser)]
#[command(name = "relink_materials")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The rewritten mesh to fix up (OBJ)
    new_mesh: PathBuf,

    /// The original mesh whose materials to carry over (OBJ)
    reference: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let outcome = relink_materials(&args.new_mesh, &args.reference)?;

    match &outcome.material_file {
        Some(material) => println!("linked {material}"),
        None => println!("no material library to link"),
    }
    for texture in &outcome.textures_copied {
        println!("copied  {texture}");
    }
    for texture in &outcome.textures_already_present {
        println!("present {texture}");
    }
    for texture in &outcome.textures_missing {
        println!("missing {texture}");
    }
    Ok(())
}
