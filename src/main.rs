use anyhow::Result;
use parc::config::Config;
use parc::pipeline;
use std::path::PathBuf;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = Config::from_file(&path)?;
    config.log_summary();

    let prepared = pipeline::run(&config)?;
    log::info!(
        "Prepared {} training, {} validation and {} test case(s)",
        prepared.splits.train.len(),
        prepared.splits.validation.len(),
        prepared.splits.test.len()
    );
    Ok(())
}
