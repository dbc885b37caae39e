mod utils;

pub mod alerts;
pub mod api;
pub mod cli;
pub mod models;
pub mod sensing;
pub mod session;
pub mod settings;

use clap::Parser;

pub use utils::Clock;

pub fn run() -> anyhow::Result<()> {
    utils::logging::init_logging();

    let cli = cli::Cli::parse();
    let settings = settings::SettingsStore::new(settings::SettingsStore::default_path())?;

    log::info!("fallwatch starting up...");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(cli::dispatch(cli, settings))
}
