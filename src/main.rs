use clap::Parser;
use clawsvegas::{
    arcade_client::{
        HttpArcadeApi,
        LobbyApi,
    },
    autopilot::{
        Autopilot,
        AutopilotSettings,
    },
    bet::RandomSeeds,
    cli::{
        AutoArgs,
        Cli,
        Command,
    },
    config::Config,
    error::ArcadeError,
    report,
    session::GaslessTable,
    signer::LocalSigner,
    wallets::{
        CreateOutcome,
        WalletRecord,
        WalletStore,
        resolve_home_dir,
    },
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use rand::{
    SeedableRng,
    rngs::StdRng,
};
use std::{
    fs,
    path::Path,
    process::ExitCode,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

const LOG_FILE: &str = "clawsvegas.log";

fn init_tracing(log_dir: Option<&Path>, verbose: bool) -> Result<Option<WorkerGuard>> {
    let default_level = if log_dir.is_some() || verbose {
        "info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .wrap_err_with(|| format!("Failed to create log dir {}", dir.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(rolling::never(dir, LOG_FILE));
            fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .try_init()
                .map_err(|e| eyre!("Failed to install log subscriber: {e}"))?;
            Ok(Some(guard))
        }
        None => {
            fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init()
                .map_err(|e| eyre!("Failed to install log subscriber: {e}"))?;
            Ok(None)
        }
    }
}

async fn handle_interupt() {
    match tokio::signal::ctrl_c().await {
        Ok(_) => tracing::info!("Received interrupt, stopping"),
        Err(_) => tracing::warn!("Received interrupt error, stopping anyway"),
    }
}

fn connect(config: &Config, record: &WalletRecord) -> Result<HttpArcadeApi<LocalSigner>> {
    let signer = record.signer()?;
    if signer.is_none() {
        tracing::warn!(address = %record.address, "wallet record has no private key, signing disabled");
    }
    HttpArcadeApi::new(config, Some(record.address()?), signer)
}

fn finish(result: std::result::Result<(), ArcadeError>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "command failed");
            eprintln!("{}", report::render_failure(&err));
            ExitCode::FAILURE
        }
    }
}

fn generate(store: &WalletStore, name: Option<String>) -> Result<ExitCode> {
    let signer = LocalSigner::random();
    let record = WalletRecord::from_signer(&signer, name);
    match store.create(record)? {
        CreateOutcome::Created(record) => {
            println!("\n  Base wallet generated!");
            println!("  Address: {}", record.address);
            println!("\n{}", "=".repeat(60));
            println!("  WALLET SAVED TO {}", store.path().display());
            println!("  Keep your private key safe!");
            println!("{}", "=".repeat(60));
            println!(
                "\n  Next: clawsvegas enter {}",
                record.agent_name.as_deref().unwrap_or("YourName")
            );
            Ok(ExitCode::SUCCESS)
        }
        CreateOutcome::AlreadyExists(existing) => {
            println!("\n  Wallet already exists!");
            println!("  Base:   {}", existing.address);
            println!(
                "\n  To regenerate, delete {} first.",
                store.path().display()
            );
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn auto(config: &Config, record: &WalletRecord, args: AutoArgs) -> Result<ExitCode> {
    let api = connect(config, record)?;
    if api.signer().is_none() {
        return Ok(finish(Err(ArcadeError::CapabilityUnavailable(
            "typed-data signing",
        ))));
    }
    let wallet = record.address()?;
    let table = GaslessTable::new(&api, api.signer(), config.policy(), wallet);
    let settings = AutopilotSettings::new(&config.autonomous, args.mode(), config.policy());
    let autopilot = Autopilot::new(&api, table, settings, record.agent_name_or_default());
    let mut rng = StdRng::from_os_rng();

    println!("\n  Starting autonomous mode...");
    println!("  Press Ctrl+C to stop.\n");
    tokio::select! {
        summary = autopilot.run(&mut rng, &RandomSeeds, args.max_loops) => {
            println!(
                "  Done after {} loops: {} bets, {} won, {} failed actions",
                summary.loops, summary.bets_placed, summary.bets_won, summary.failures
            );
        }
        _ = handle_interupt() => {}
    }

    println!("\n  Leaving arcade...");
    Ok(finish(autopilot.leave().await))
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let home = resolve_home_dir(cli.home.as_deref())?;
    let config = Config::load(cli.config.as_deref(), &home)?.with_api_base(cli.api_base);
    config.validate()?;
    tracing::info!(home = %home.display(), api = %config.api_url(), "configuration loaded");

    let store = WalletStore::in_home(&home);
    let load_wallet = || store.load_required();

    let code = match cli.command {
        Command::Generate { name } => generate(&store, name)?,
        Command::Address => {
            let record = load_wallet()?;
            println!("{}", record.address);
            ExitCode::SUCCESS
        }
        Command::Balance => {
            let record = load_wallet()?;
            let api = connect(&config, &record)?;
            println!("\n  Wallet Balance:");
            println!("  Address: {}", record.address);
            finish(
                api.balance()
                    .await
                    .and_then(|envelope| envelope.into_result())
                    .map(|balance| {
                        println!("{}", report::render_balance(balance.balance, &config.currency))
                    }),
            )
        }
        Command::Enter { name } => {
            let record = load_wallet()?;
            let name = name.unwrap_or_else(|| record.agent_name_or_default().to_string());
            let api = connect(&config, &record)?;
            println!("\n  Entering arcade as \"{name}\"...");
            finish(
                api.enter(&name)
                    .await
                    .and_then(|envelope| envelope.into_ack())
                    .map(|()| println!("  Entered!")),
            )
        }
        Command::Leave => {
            let record = load_wallet()?;
            let api = connect(&config, &record)?;
            println!("\n  Leaving arcade...");
            finish(
                api.leave()
                    .await
                    .and_then(|envelope| envelope.into_ack())
                    .map(|()| println!("  Left the arcade.")),
            )
        }
        Command::Chat { message } => {
            let message = message.join(" ");
            if message.trim().is_empty() {
                return Err(eyre!("Chat message may not be empty"));
            }
            let record = load_wallet()?;
            let api = connect(&config, &record)?;
            println!("\n  Sending: \"{message}\"");
            finish(
                api.chat(&message)
                    .await
                    .and_then(|envelope| envelope.into_ack())
                    .map(|()| println!("  Message sent!")),
            )
        }
        Command::Move { x, y } => {
            let record = load_wallet()?;
            let api = connect(&config, &record)?;
            println!("\n  Moving to ({x}, {y})...");
            finish(
                api.move_to(x, y)
                    .await
                    .and_then(|envelope| envelope.into_ack())
                    .map(|()| println!("  Moved!")),
            )
        }
        Command::Agents => {
            let record = load_wallet()?;
            let api = connect(&config, &record)?;
            finish(
                api.agents()
                    .await
                    .and_then(|envelope| envelope.into_result())
                    .map(|list| println!("\n{}", report::render_agents(&list.agents))),
            )
        }
        Command::Play { amount, choice } => {
            let record = load_wallet()?;
            let api = connect(&config, &record)?;
            let table =
                GaslessTable::new(&api, api.signer(), config.policy(), record.address()?);
            println!("\n  Flipping {amount} {} on {choice}...", config.currency);
            let bet = table.play(&amount, &choice, &RandomSeeds).await;
            finish(bet.result.map(|outcome| {
                println!("\n{}", report::render_outcome(&outcome, &config.currency))
            }))
        }
        Command::Auto(args) => auto(&config, &load_wallet()?, args).await?,
    };
    Ok(code)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_dir.as_deref(), cli.tracing)?;
    tracing::info!("starting clawsvegas client");
    run(cli).await
}
