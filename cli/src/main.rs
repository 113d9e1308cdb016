use addman_catalog::esoui_client::EsouiClient;
use addman_core::addon_manager::AddonManager;
use clap::Parser;
use cli_user_input_delegate::CliUserInputDelegate;
use env_logger::Env;
use log::error;
use prog_args::{Command, ProgArgs};
use stats::{AddonStats, UpdateReport};

mod cli_user_input_delegate;
mod prog_args;
mod stats;

type Manager = AddonManager<EsouiClient, CliUserInputDelegate>;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let p_args = ProgArgs::parse();
    let mut manager = AddonManager::new(
        &p_args.state_dir_path,
        EsouiClient::new()?,
        CliUserInputDelegate::new(),
    )?;

    let res = run(&mut manager, &p_args);

    // Choices made and add-ons installed before a failure are still worth keeping.
    if let Err(e) = manager.save() {
        error!("Unable to save state: {}", e);
        res?;
        return Err(e.into());
    }

    res
}

fn run(manager: &mut Manager, p_args: &ProgArgs) -> anyhow::Result<()> {
    let addon_dir = manager.ensure_addon_dir(p_args.addon_dir.as_deref())?;

    match &p_args.command {
        Command::Update(update_args) => {
            let summary = manager.update(update_args.catalog.refresh, &update_args.addons)?;
            print!("{}", UpdateReport(&summary));
        },
        Command::Status(status_args) => {
            let statuses = manager.status(status_args.catalog.refresh)?;
            print!("{}", AddonStats::new(&addon_dir, &statuses));
        },
    }

    Ok(())
}
