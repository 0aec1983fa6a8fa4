mod app;
mod client;
mod config;
mod error;
mod model;
mod page;
mod render;
mod tui;
mod ui;

use anyhow::{Context, Result};
use app::App;
use clap::Parser;
use client::PredictionClient;
use config::ClientConfig;
use error::ClientError;
use model::ModelKind;
use page::{PopularPage, PredictionPage};
use render::{GridContent, ResultsView};
use std::io::{self, Write};
use std::sync::Mutex;
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const LOG_FILE: &str = "stockify-tui.log";

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Stockify TUI: terminal client for the Stockify stock prediction service",
    after_help = "EXAMPLES:
    # Interactive terminal UI
    cargo run --release

    # One-shot 10-day LSTM forecast printed to stdout
    cargo run --release -- --predict --ticker AAPL --model lstm --days 10

    # List popular stocks
    cargo run --release -- --popular

    # Point at a local service
    STOCKIFY_API_URL=http://127.0.0.1:5000 cargo run --release -- --health"
)]
struct Args {
    /// Prediction service base URL (overrides STOCKIFY_API_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// Timeout for /predict in seconds, 0 disables it (default: 60)
    #[arg(long)]
    predict_timeout_secs: Option<u64>,

    /// Timeout for /popular and /health in seconds, 0 disables it (default: 30)
    #[arg(long)]
    list_timeout_secs: Option<u64>,

    /// Ticker to pre-fill (or to predict with --predict)
    #[arg(long)]
    ticker: Option<String>,

    /// Pre-fill the ticker from a link such as "index.html?ticker=AAPL"
    #[arg(long)]
    open: Option<String>,

    /// Prediction model
    #[arg(long, value_enum)]
    model: Option<ModelKind>,

    /// Prediction horizon in days (1-30)
    #[arg(long)]
    days: Option<i64>,

    /// Run one prediction and print the results instead of starting the UI
    #[arg(long)]
    predict: bool,

    /// Print the popular stocks list and exit
    #[arg(long)]
    popular: bool,

    /// Check the service's /health endpoint and exit
    #[arg(long)]
    health: bool,
}

impl Args {
    fn interactive(&self) -> bool {
        !(self.predict || self.popular || self.health)
    }

    fn client_config(&self) -> Result<ClientConfig> {
        let mut config = match &self.api_url {
            Some(url) => ClientConfig::new(url)?,
            None => ClientConfig::from_env()?,
        };
        if let Some(secs) = self.predict_timeout_secs {
            config = config.with_predict_timeout(config::timeout_from_secs(secs));
        }
        if let Some(secs) = self.list_timeout_secs {
            config = config.with_list_timeout(config::timeout_from_secs(secs));
        }
        Ok(config)
    }

    fn prefill(&self, page: &mut PredictionPage) {
        if let Some(link) = &self.open {
            if !page.form.prefill_from_link(link) {
                error!("No ticker found in {}", link);
            }
        }
        if let Some(ticker) = &self.ticker {
            page.form.ticker = model::normalize_ticker(ticker);
        }
        if let Some(model) = self.model {
            page.form.model = model;
        }
        if let Some(days) = self.days {
            page.form.days = days.to_string();
        }
    }
}

fn init_logging(interactive: bool) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("stockify_tui=info"));

    if interactive {
        // The terminal belongs to the UI; logs go to a file.
        let file = std::fs::File::create(LOG_FILE)
            .with_context(|| format!("cannot create log file {}", LOG_FILE))?;
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.interactive())?;

    let client = PredictionClient::new(args.client_config()?)?;

    if args.health {
        let status = client.health().await?;
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    if args.popular {
        let mut page = PopularPage::default();
        page.load(&client).await;
        print_popular(&page);
        return Ok(());
    }

    if args.predict {
        let mut page = PredictionPage::default();
        args.prefill(&mut page);
        page.submit(&client).await;
        if let Some(banner) = page.banners.visible(Instant::now()) {
            anyhow::bail!("{}", banner.message);
        }
        if let Err(err) = print_results(&mut io::stdout().lock(), &page.results) {
            error!("Error displaying results: {}", err);
            anyhow::bail!("{}", err.user_message());
        }
        return Ok(());
    }

    let mut terminal = tui::init()?;
    let mut app = App::new(client);
    args.prefill(&mut app.predict);
    let res = app.run(&mut terminal).await;

    tui::restore()?;

    if let Err(e) = res {
        error!("Error: {:?}", e);
    }
    info!("Exited");

    Ok(())
}

/// Writes the rendered view as plain text. A failed write is a render error.
fn print_results(out: &mut impl Write, results: &ResultsView) -> Result<(), ClientError> {
    write_results(out, results)
        .map_err(|e| ClientError::Render(format!("cannot write results: {}", e)))
}

fn write_results(out: &mut impl Write, results: &ResultsView) -> io::Result<()> {
    writeln!(out, "Current price: {}", results.price)?;
    writeln!(out)?;
    match results.placeholder {
        Some(placeholder) => writeln!(out, "{}", placeholder)?,
        None => {
            for p in &results.predictions {
                writeln!(out, "{:<8}{}", p.label(), p.value)?;
            }
        }
    }
    writeln!(out)?;
    writeln!(out, "Model:    {}", results.metrics.model)?;
    writeln!(out, "R2 score: {}", results.metrics.r2_score)?;
    writeln!(out, "MSE:      {}", results.metrics.mse)?;
    for chart in &results.charts {
        if chart.visible && !chart.verified {
            writeln!(out, "{}: image data could not be checked", chart.title)?;
        } else if chart.visible {
            writeln!(out, "{}: PNG, {} bytes", chart.title, chart.byte_len)?;
        } else {
            writeln!(out, "{}: no chart data", chart.title)?;
        }
    }
    out.flush()
}

fn print_popular(page: &PopularPage) {
    match &page.grid.content {
        GridContent::Cards(cards) => {
            for card in cards {
                println!("{:<8}{:<40}{}", card.ticker, card.name, card.target);
            }
        }
        GridContent::Message { text, detail } => {
            println!("{}", text);
            if let Some(detail) = detail {
                println!("{}", detail);
            }
        }
        GridContent::Loading => {}
    }
}
