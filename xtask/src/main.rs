use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::Command;

/// Package holding the kernel-side probes; its binary is embedded by `jbmon`
const EBPF_PACKAGE: &str = "jbmon-ebpf";
const EBPF_BINARY: &str = "jbmon";

#[derive(Parser)]
struct Args {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Parser)]
enum Cmd {
    /// Compile the probes for the BPF target
    BuildEbpf {
        #[arg(long, default_value = "bpfel-unknown-none")]
        target: String,
        /// Accepted for compatibility; the probes are always built in release
        #[arg(long)]
        release: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Cmd::BuildEbpf { target, release: _ } => build_ebpf(&target)?,
    }

    Ok(())
}

fn build_ebpf(target: &str) -> Result<()> {
    // Debug builds pull in formatting code the BPF linker rejects; release
    // uses LTO to strip it
    let status = Command::new("cargo")
        .args(["+nightly", "build", "--package", EBPF_PACKAGE, "--target", target])
        .args(["-Z", "build-std=core", "--release"])
        .status()
        .context("Failed to run cargo for the eBPF build")?;

    if !status.success() {
        anyhow::bail!("Failed to build eBPF program ({status})");
    }

    let artifact: PathBuf = ["target", target, "release", EBPF_BINARY].iter().collect();
    if !artifact.exists() {
        anyhow::bail!("Build succeeded but {} is missing", artifact.display());
    }

    println!("✓ eBPF probes built");
    println!("  Artifact: {}", artifact.display());

    Ok(())
}
