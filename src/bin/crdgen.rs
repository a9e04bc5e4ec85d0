//! # CRD Generator
//!
//! Generates Kubernetes CustomResourceDefinition (CRD) YAML from Rust type definitions.
//!
//! This binary uses the `kube` crate's `CustomResourceExt` trait to generate
//! the CRD YAML for the `NopResource` managed resource.
//!
//! ## Usage
//!
//! ```bash
//! # Print CRD YAML
//! cargo run --bin crdgen
//!
//! # Write it to a file
//! cargo run --bin crdgen -- --output config/crd/nopresource.yaml
//!
//! # Generate and apply directly
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use anyhow::Context;
use clap::Parser;
use kube::core::CustomResourceExt;
use managed_resource_controller::crd::NopResource;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "crdgen", about = "Print the NopResource CustomResourceDefinition")]
struct Cli {
    /// Write the CRD to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let yaml = serde_yaml::to_string(&NopResource::crd()).context("Failed to serialize CRD")?;

    match cli.output {
        Some(path) => std::fs::write(&path, yaml)
            .with_context(|| format!("Failed to write CRD to {}", path.display()))?,
        None => print!("{yaml}"),
    }
    Ok(())
}
