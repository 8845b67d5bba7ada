use std::{path::PathBuf, sync::Arc};

use anyhow::{Result, bail};
use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ticker_sync::{
    admin,
    config::AppConfig,
    credentials::Credentials,
    refresh::{
        Refresher,
        scheduler::{Intervals, RefreshLoop, resolve_credentials},
    },
    source::{QuoteSource, SourceError, SourceMode},
    tracked::{SqliteStore, TrackedSymbolStore, last_known_prices},
    tz, view,
};

#[derive(Parser)]
#[command(name = "ticker-sync", version, about = "Stock ticker dashboard backend")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,

    /// TOML config file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Cmd {
    /// Create or migrate the database and seed default symbols
    Init,
    /// Run the background refresh loop until ctrl-c
    Run,
    /// Refresh all tracked symbols once
    Refresh,
    /// Show tracked symbols
    List,
    /// Start tracking a symbol
    Add { symbol: String },
    /// Stop tracking a symbol
    Remove { symbol: String },
    /// Show news for tracked symbols and major indexes
    News,
    /// Show market index tiles
    Indexes,
    /// Manage Alpaca API credentials
    Credentials(CredentialsCmd),
    /// Ask the running loop to switch data source
    Mode {
        #[arg(value_enum)]
        mode: ModeArg,
    },
}

#[derive(Args)]
struct CredentialsCmd {
    #[command(subcommand)]
    sub: CredentialsSub,
}

#[derive(Subcommand)]
enum CredentialsSub {
    /// Validate and store a key pair
    Set {
        #[arg(long)]
        api_key: String,
        #[arg(long)]
        secret_key: String,
    },
    /// Show the active key (masked)
    Show,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Simulated,
    Live,
}

impl From<ModeArg> for SourceMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Simulated => SourceMode::Simulated,
            ModeArg::Live => SourceMode::Live,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "ticker_sync={0},market_data_ingestor={0}",
                    cli.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = AppConfig::load(cli.config.as_deref())?;
    let store = Arc::new(SqliteStore::open(cfg.database_url.clone()).await?);
    tracing::debug!(database = %cfg.database_url, "store ready");

    match cli.cmd {
        Cmd::Init => {
            let added = admin::seed_defaults(store.as_ref(), &cfg.default_symbols).await?;
            println!("Database ready at {} ({added} symbols seeded)", cfg.database_url);
        }
        Cmd::Run => run(cfg, store).await?,
        Cmd::Refresh => {
            let source = Arc::new(build_source(&cfg, store.as_ref()).await?);
            let outcome = Refresher::new(store, source).manual_refresh().await;
            println!("{}", outcome.message);
            if !outcome.success {
                bail!("refresh failed");
            }
        }
        Cmd::List => {
            let source = build_source(&cfg, store.as_ref()).await?;
            let board = view::dashboard(store.as_ref(), &source, Utc::now()).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&board.stocks)?);
            } else {
                print_stocks(&board.stocks);
            }
        }
        Cmd::Add { symbol } => {
            let source = build_source(&cfg, store.as_ref()).await?;
            let added = admin::add_symbol(store.as_ref(), &source, &symbol).await?;
            println!("Stock {} added successfully", added.symbol);
        }
        Cmd::Remove { symbol } => {
            let removed = admin::remove_symbol(store.as_ref(), &symbol).await?;
            println!("Stock {removed} removed successfully");
        }
        Cmd::News => {
            let source = build_source(&cfg, store.as_ref()).await?;
            let grouped = view::news_by_symbol(store.as_ref(), &source).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&grouped)?);
            } else if grouped.is_empty() {
                println!("No news");
            } else {
                for (symbol, articles) in &grouped {
                    println!("== {symbol}");
                    for a in articles {
                        println!(
                            "  [{}] {} ({})",
                            tz::format_market_time(a.updated_at),
                            a.headline,
                            a.url
                        );
                    }
                }
            }
        }
        Cmd::Indexes => {
            let source = build_source(&cfg, store.as_ref()).await?;
            let board = view::dashboard(store.as_ref(), &source, Utc::now()).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&board.indexes)?);
            } else {
                for i in &board.indexes {
                    println!(
                        "{:<14} {:>10.2} {:>+9.2} ({:>+6.2}%)  {}",
                        i.name, i.current_price, i.price_change, i.price_change_percent, i.friendly_time
                    );
                }
            }
        }
        Cmd::Credentials(CredentialsCmd { sub }) => match sub {
            CredentialsSub::Set {
                api_key,
                secret_key,
            } => {
                let creds = Credentials::new(api_key.trim(), secret_key.trim());
                let account =
                    admin::save_credentials(store.as_ref(), &cfg.alpaca_config(), creds).await?;
                println!("API credentials updated successfully (account {})", account.account_number);
            }
            CredentialsSub::Show => match store.active_credentials().await? {
                Some(stored) => println!(
                    "{} (updated {})",
                    stored.credentials.masked_key(),
                    tz::format_market_time(stored.updated_at)
                ),
                None => println!("No stored credentials"),
            },
        },
        Cmd::Mode { mode } => {
            let mode = SourceMode::from(mode);
            admin::request_mode(store.as_ref(), mode).await?;
            if mode == SourceMode::Live
                && resolve_credentials(cfg.env_credentials.as_ref(), store.as_ref())
                    .await
                    .is_none()
            {
                warn!("no credentials available; the running loop will stay in its current mode");
            }
            println!("Simulation mode {}", match mode {
                SourceMode::Simulated => "enabled",
                SourceMode::Live => "disabled",
            });
        }
    }

    Ok(())
}

/// Facade for one-shot commands: the requested mode if any, else the configured one.
async fn build_source(cfg: &AppConfig, store: &dyn TrackedSymbolStore) -> Result<QuoteSource> {
    let mode = store.desired_mode().await?.unwrap_or(cfg.initial_mode());
    match mode {
        SourceMode::Live => {
            let creds = resolve_credentials(cfg.env_credentials.as_ref(), store).await;
            Ok(QuoteSource::new(mode, creds.as_ref(), cfg.alpaca_config())?)
        }
        SourceMode::Simulated => resumed_simulation(cfg, store).await,
    }
}

/// Simulator that picks up the walk where the stored prices left it.
async fn resumed_simulation(cfg: &AppConfig, store: &dyn TrackedSymbolStore) -> Result<QuoteSource> {
    let last = last_known_prices(store).await?;
    Ok(QuoteSource::resumed(
        SourceMode::Simulated,
        None,
        cfg.alpaca_config(),
        &last,
    )?)
}

async fn run(cfg: AppConfig, store: Arc<SqliteStore>) -> Result<()> {
    let source = match build_source(&cfg, store.as_ref()).await {
        Ok(source) => source,
        Err(e) if e.downcast_ref::<SourceError>().is_some() => {
            error!(error = %e, "live source unavailable, starting in simulated mode");
            resumed_simulation(&cfg, store.as_ref()).await?
        }
        Err(e) => return Err(e),
    };

    if source.mode() == SourceMode::Simulated {
        admin::seed_defaults(store.as_ref(), &cfg.default_symbols).await?;
    }

    let intervals = Intervals {
        live: cfg.base_interval(SourceMode::Live),
        simulated: cfg.base_interval(SourceMode::Simulated),
    };
    let store: Arc<dyn TrackedSymbolStore> = store;
    let refresher = Refresher::new(store, Arc::new(source));
    let refresh_loop = RefreshLoop::new(
        refresher,
        intervals,
        cfg.retry_ceiling(),
        cfg.env_credentials.clone(),
    );

    refresh_loop
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await;

    info!("shutdown complete");
    Ok(())
}

fn print_stocks(stocks: &[view::StockView]) {
    if stocks.is_empty() {
        println!("No tracked symbols");
        return;
    }
    for s in stocks {
        let name = s.name.as_deref().unwrap_or("");
        match (s.current_price, s.price_change, s.price_change_percent) {
            (Some(price), Some(change), Some(pct)) => println!(
                "{:<6} {:<28} {:>10.2} {:>+9.2} ({:>+6.2}%)  {}{}",
                s.symbol,
                name,
                price,
                change,
                pct,
                s.friendly_time,
                if s.has_news { "  [news]" } else { "" }
            ),
            _ => println!("{:<6} {:<28} {:>10}  {}", s.symbol, name, "-", s.friendly_time),
        }
    }
}
