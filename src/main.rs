//! Distiller - Main Entry Point
//!
//! Reads the files named on the command line and prints the run result as
//! JSON.

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use distiller::{Analyzer, DistillerConfig};

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "distiller=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = DistillerConfig::from_env();

    let paths: Vec<String> = std::env::args().skip(1).collect();
    info!(
        files = paths.len(),
        max_nesting_depth = config.max_nesting_depth,
        "Starting distiller v{}",
        env!("CARGO_PKG_VERSION")
    );

    let mut analyzer = Analyzer::new(config);
    for path in &paths {
        analyzer
            .add_file(path)
            .with_context(|| format!("failed to analyze {}", path))?;
    }

    let result = analyzer.finish();
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}
