use std::io::{self, BufRead, IsTerminal};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use op_stock_client::app::commands::{parse_command, parse_stock, HELP};
use op_stock_client::app::{App, AppSettings, UserAction, HISTORY_ERROR_MESSAGE};
use op_stock_client::config::{AppConfig, LoggingConfig};
use op_stock_client::engine::{group_offers, FilterState, QueryDescriptor};
use op_stock_client::gateway::{HttpGateway, StockApi};
use op_stock_client::models::ProductId;
use op_stock_client::ui::{Theme, ThemeStore, TerminalView, View};

#[derive(Parser, Debug)]
#[command(name = "op-stock", version, about = "Browse the OP stock monitor and drive its scans")]
struct Cli {
    /// Backend base URL, overrides the configured one
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Disable ANSI colours
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List offers grouped by product
    Products {
        #[command(flatten)]
        filter: FilterArgs,
        /// Ask the backend for pre-grouped results
        #[arg(long)]
        grouped: bool,
        #[arg(long)]
        json: bool,
    },
    /// List server-grouped products (site and sort are not applied)
    Groups {
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long)]
        json: bool,
    },
    /// Show dashboard statistics
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// List monitored sites
    Sites,
    /// List known set codes
    Sets,
    /// Show the price history of one offer
    History {
        id: ProductId,
        #[arg(long)]
        json: bool,
    },
    /// Trigger a scan and wait for it to finish
    Scan,
    /// Interactive mode: read commands from stdin
    Watch {
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long)]
        grouped: bool,
    },
    /// Show or change the colour theme
    Theme {
        #[command(subcommand)]
        action: Option<ThemeAction>,
    },
    /// Check that the backend is reachable
    Health,
}

#[derive(Subcommand, Debug)]
enum ThemeAction {
    Show,
    Toggle,
    Set { theme: Theme },
}

#[derive(Args, Debug, Default)]
struct FilterArgs {
    #[arg(long)]
    site: Option<String>,
    #[arg(long)]
    set: Option<String>,
    #[arg(long, value_parser = ["any", "in", "out"])]
    stock: Option<String>,
    #[arg(long, value_parser = ["price_asc", "price_desc", "name", "recent"])]
    sort: Option<String>,
    #[arg(long)]
    search: Option<String>,
}

impl FilterArgs {
    fn into_filter(self) -> Result<FilterState> {
        let stock = match self.stock {
            Some(raw) => parse_stock(&raw)
                .ok_or_else(|| anyhow!("Unknown stock filter: {}", raw))?
                .as_param()
                .to_string(),
            None => String::new(),
        };
        Ok(FilterState {
            site: self.site.unwrap_or_default(),
            set: self.set.unwrap_or_default(),
            stock,
            sort: self.sort.unwrap_or_default(),
            search: self.search.unwrap_or_default(),
        })
    }
}

fn init_tracing(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("warn")
            .add_directive(format!("op_stock_client={}", config.level).parse()?)
            .add_directive(format!("op_stock={}", config.level).parse()?),
    };

    match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "op-stock.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::stderr)
                .init();
            Ok(None)
        }
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::from_env().context("Failed to load configuration")?;
    if let Some(base_url) = &cli.base_url {
        config.api.base_url = base_url.clone();
        config.validate().context("Invalid --base-url")?;
    }
    Ok(config)
}

fn theme_store(config: &AppConfig) -> Option<ThemeStore> {
    config.theme_path().map(ThemeStore::new)
}

/// Stdin is read on a plain thread: a pending tokio stdin read would keep
/// the runtime from shutting down.
fn spawn_stdin_reader(tx: mpsc::Sender<UserAction>) {
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!("Failed to read stdin: {}", e);
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match parse_command(&line) {
                Some(action) => {
                    if tx.blocking_send(action).is_err() {
                        return;
                    }
                }
                None => println!("{}", HELP),
            }
        }
        let _ = tx.blocking_send(UserAction::Quit);
    });
}

fn spawn_ctrl_c(tx: mpsc::Sender<UserAction>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, shutting down...");
            let _ = tx.send(UserAction::Quit).await;
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let _guard = init_tracing(&config.logging)?;

    let theme = theme_store(&config)
        .map(|store| store.load())
        .unwrap_or_default();
    let gateway = HttpGateway::new(&config.api)?;
    info!("Using backend {}", gateway.base_url());
    let api: Arc<dyn StockApi> = Arc::new(gateway);
    let color = config.ui.color && !cli.no_color && io::stdout().is_terminal();
    let terminal_view = || TerminalView::new(io::stdout(), theme, color);

    match cli.command {
        Command::Products { filter, grouped, json } => {
            let query = QueryDescriptor::from_filter(&filter.into_filter()?);
            let groups = if grouped || config.ui.grouped {
                api.list_offer_groups(&query).await?
            } else {
                group_offers(api.list_offers(&query).await?)
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&groups)?);
            } else {
                terminal_view().render_groups(&groups);
            }
        }
        Command::Groups { filter, json } => {
            let query = QueryDescriptor::from_filter(&filter.into_filter()?);
            let groups = api.list_offer_groups(&query).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&groups)?);
            } else {
                terminal_view().render_groups(&groups);
            }
        }
        Command::Stats { json } => {
            let stats = api.get_stats().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                terminal_view().render_stats(&stats);
            }
        }
        Command::Sites => {
            let sites = api.list_sites().await?;
            terminal_view().render_sites(&sites);
        }
        Command::Sets => {
            let sets = api.list_sets().await?;
            terminal_view().render_sets(&sets);
        }
        Command::History { id, json } => {
            let history = api
                .get_history(id)
                .await
                .map_err(|e| anyhow!(e.user_message(HISTORY_ERROR_MESSAGE)))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&history)?);
            } else {
                terminal_view().render_history(&history);
            }
        }
        Command::Scan => {
            let mut settings = AppSettings::from_config(&config);
            settings.exit_after_scan = true;
            let (tx, rx) = mpsc::channel(16);
            tx.send(UserAction::TriggerScan).await?;
            spawn_ctrl_c(tx.clone());

            let view = terminal_view();
            let app = App::new(Arc::clone(&api), view, settings);
            let app = match theme_store(&config) {
                Some(store) => app.with_theme_store(store),
                None => app,
            };
            app.run(rx).await;
        }
        Command::Watch { filter, grouped } => {
            let mut settings = AppSettings::from_config(&config);
            settings.grouped |= grouped;
            let (tx, rx) = mpsc::channel(64);
            spawn_stdin_reader(tx.clone());
            spawn_ctrl_c(tx);
            println!("{}", HELP);

            let view = terminal_view();
            let app = App::new(Arc::clone(&api), view, settings)
                .with_filter(filter.into_filter()?);
            let app = match theme_store(&config) {
                Some(store) => app.with_theme_store(store),
                None => app,
            };
            app.run(rx).await;
        }
        Command::Theme { action } => {
            let store = theme_store(&config)
                .ok_or_else(|| anyhow!("No configuration directory for the theme preference"))?;
            let current = store.load();
            let next = match action {
                None | Some(ThemeAction::Show) => None,
                Some(ThemeAction::Toggle) => Some(current.toggled()),
                Some(ThemeAction::Set { theme }) => Some(theme),
            };
            match next {
                Some(theme) => {
                    store.save(theme)?;
                    println!("Theme set to {}", theme);
                }
                None => println!("{}", current),
            }
        }
        Command::Health => {
            let health = api.health().await?;
            match health.version {
                Some(version) => println!("{} ({})", health.status, version),
                None => println!("{}", health.status),
            }
        }
    }

    Ok(())
}
