//! zoofetch CLI tool
//!
//! Command-line interface for fetching filtered subsets of zoo image datasets
//! and exporting them to CSV or JSON Lines.

#[cfg(feature = "cli")]
use zoofetch::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    panic!("CLI feature not enabled. Please rebuild with --features cli");
}
