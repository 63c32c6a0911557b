use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use portfolio_frontier::AssetSeries;
use portfolio_frontier::EngineConfig;
use portfolio_frontier::Frontier;
use portfolio_frontier::MAX_ASSETS;
use portfolio_frontier::MIN_ASSETS;
use portfolio_frontier::Portfolio;
use portfolio_frontier::PortfolioEngine;
use portfolio_frontier::PortfolioError;
use portfolio_frontier::api::EngineRequest;
use portfolio_frontier::api::EngineResponse;
use portfolio_frontier::api::ErrorResponse;
use portfolio_frontier::api::FrontierRequest;
use portfolio_frontier::api::FrontierResponse;
use portfolio_frontier::api::PricePoint;
use portfolio_frontier::api::SeriesInput;
use portfolio_frontier::api::TwoAssetRequest;
use portfolio_frontier::api::TwoAssetResponse;
use portfolio_frontier::engine::format_rates;
use portfolio_frontier::series::check_asset_count;
use portfolio_frontier::series::load_csv_file;
use prettytable::Table;
use prettytable::row;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "portfolio-frontier")]
#[command(about = "Two-asset allocation and Monte Carlo efficient frontiers from price CSVs", long_about = None)]
struct Cli {
  /// JSON engine configuration; missing fields keep their defaults
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Output format
  #[arg(short, long, global = true, value_enum, default_value = "json")]
  format: Format,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
  Json,
  Table,
}

#[derive(Subcommand)]
enum Commands {
  /// Optimal allocation between two price series
  TwoAsset {
    /// First price CSV
    #[arg(long)]
    file1: PathBuf,

    /// Second price CSV
    #[arg(long)]
    file2: PathBuf,

    /// Label of the first series (default: file stem)
    #[arg(long)]
    sector1: Option<String>,

    /// Label of the second series (default: file stem)
    #[arg(long)]
    sector2: Option<String>,

    /// Return-vs-risk preference in [0, 1]
    #[arg(short, long, default_value = "0.5")]
    risk_factor: f64,
  },

  /// Sampled efficient frontier for two to six price series
  Frontier {
    /// Price CSV, repeated once per asset
    #[arg(long = "file", required = true)]
    files: Vec<PathBuf>,

    /// Return-vs-risk preference of the tradeoff portfolio in [0, 1]
    #[arg(short, long, default_value = "0.5")]
    alpha: f64,

    /// Override the configured sample count
    #[arg(short, long)]
    samples: Option<usize>,

    /// Override the configured seed
    #[arg(long)]
    seed: Option<u64>,
  },

  /// Answer a JSON request (`type`: `two_asset` | `frontier`)
  Request {
    /// Request file; stdin when omitted
    #[arg(short, long)]
    input: Option<PathBuf>,
  },
}

fn points(series: &AssetSeries) -> Vec<PricePoint> {
  series
    .timestamps()
    .iter()
    .zip(series.prices())
    .map(|(ts, &p)| PricePoint::new(ts.format("%Y-%m-%dT%H:%M:%S").to_string(), p))
    .collect()
}

fn build_request(command: Commands, config: &mut EngineConfig) -> anyhow::Result<EngineRequest> {
  let request = match command {
    Commands::TwoAsset {
      file1,
      file2,
      sector1,
      sector2,
      risk_factor,
    } => {
      let a = load_csv_file(&file1)?;
      let b = load_csv_file(&file2)?;
      EngineRequest::TwoAsset(TwoAssetRequest {
        sector1: sector1.unwrap_or_else(|| a.label().to_string()),
        sector2: sector2.unwrap_or_else(|| b.label().to_string()),
        series1: points(&a),
        series2: points(&b),
        risk_factor,
      })
    }
    Commands::Frontier {
      files,
      alpha,
      samples,
      seed,
    } => {
      if let Some(samples) = samples {
        config.frontier.samples = samples;
      }
      if let Some(seed) = seed {
        config.frontier.seed = seed;
      }
      check_asset_count(files.len(), MIN_ASSETS, MAX_ASSETS)?;
      let files = files
        .iter()
        .map(|path| {
          let s = load_csv_file(path)?;
          Ok(SeriesInput {
            label: s.label().to_string(),
            series: points(&s),
          })
        })
        .collect::<portfolio_frontier::Result<Vec<_>>>()?;
      EngineRequest::Frontier(FrontierRequest { files, alpha })
    }
    Commands::Request { input: Some(input) } => {
      let file = File::open(&input).with_context(|| format!("opening {}", input.display()))?;
      serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing request {}", input.display()))?
    }
    Commands::Request { input: None } => {
      serde_json::from_reader(std::io::stdin().lock()).context("parsing request from stdin")?
    }
  };
  Ok(request)
}

fn portfolio_row(table: &mut Table, name: &str, p: &Portfolio) {
  let (ret, vol) = format_rates(p.expected_return(), p.volatility());
  let weights = p
    .weights_pct()
    .iter()
    .map(|w| format!("{w:.2}"))
    .collect::<Vec<_>>()
    .join(" / ");
  table.add_row(row![name, ret, vol, weights]);
}

fn print_two_asset(resp: &TwoAssetResponse) {
  let mut table = Table::new();
  table.add_row(row!["Portfolio", "Return %", "Volatility %", "Weights %"]);
  portfolio_row(&mut table, "optimal", &resp.portfolio);
  table.printstd();

  let mut preds = Table::new();
  preds.add_row(row!["Step", "sector1 MA", "sector2 MA"]);
  for (i, (a, b)) in resp
    .predictions
    .sector1
    .iter()
    .zip(&resp.predictions.sector2)
    .enumerate()
  {
    preds.add_row(row![i + 1, a, b]);
  }
  preds.printstd();
}

fn print_frontier(resp: &FrontierResponse) {
  let mut table = Table::new();
  table.add_row(row!["Portfolio", "Return %", "Volatility %", "Weights %"]);
  portfolio_row(&mut table, "minimum volatility", &resp.minimum_volatility_portfolio);
  portfolio_row(&mut table, "maximum return", &resp.maximum_return_portfolio);
  portfolio_row(&mut table, "tradeoff", &resp.tradeoff_portfolio);
  table.printstd();

  let envelope = Frontier::from_candidates(resp.efficient_frontier.clone()).efficient_subset();
  let mut upper = Table::new();
  upper.add_row(row!["Upper envelope", "Return %", "Volatility %", "Weights %"]);
  for (i, p) in envelope.iter().enumerate() {
    portfolio_row(&mut upper, &format!("#{}", i + 1), &p.portfolio);
  }
  upper.printstd();
  println!(
    "{} frontier points, {} on the upper envelope",
    resp.efficient_frontier.len(),
    envelope.len()
  );
}

fn run(cli: Cli) -> anyhow::Result<()> {
  let mut config = match &cli.config {
    Some(path) => EngineConfig::from_json_file(path)
      .with_context(|| format!("loading config {}", path.display()))?,
    None => EngineConfig::default(),
  };
  let request = build_request(cli.command, &mut config)?;
  let response = PortfolioEngine::new(config).handle(&request)?;

  match (cli.format, &response) {
    (Format::Json, _) => println!("{}", serde_json::to_string_pretty(&response)?),
    (Format::Table, EngineResponse::TwoAsset(r)) => print_two_asset(r),
    (Format::Table, EngineResponse::Frontier(r)) => print_frontier(r),
  }
  Ok(())
}

fn main() -> ExitCode {
  tracing_subscriber::registry()
    .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "portfolio_frontier=info".into()),
    )
    .init();

  match run(Cli::parse()) {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => match err.downcast_ref::<PortfolioError>() {
      Some(domain) => {
        let payload = ErrorResponse::from(domain);
        match serde_json::to_string(&payload) {
          Ok(json) => println!("{json}"),
          Err(_) => eprintln!("{domain}"),
        }
        ExitCode::from(2)
      }
      None => {
        eprintln!("error: {err:#}");
        ExitCode::FAILURE
      }
    },
  }
}
