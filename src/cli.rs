//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_journal_adapter::CsvJournalAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::domain::backtest::{run_backtest, BacktestConfig, BacktestReport, SignalSource};
use crate::domain::config_validation::{
    parse_date, read_strategy_params, required_number, required_string, validate_backtest_config,
    validate_strategy_config,
};
use crate::domain::error::TradesimError;
use crate::domain::instrument::{default_stop_distance, InstrumentClass};
use crate::domain::simulator::SimulationConfig;
use crate::domain::strategy::{Strategy, StrategyType};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;
use crate::ports::trade_store_port::TradeStorePort;

#[derive(Parser, Debug)]
#[command(name = "tradesim", about = "Risk-sized signal backtester")]
pub struct Cli {
    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Read signals from a CSV file instead of the configured strategy
        #[arg(long)]
        signals: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Journal directory, overrides [journal] path
        #[arg(long)]
        journal: Option<PathBuf>,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        timeframe: Option<String>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a backtest and strategy configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List symbols with data for a timeframe
    ListSymbols {
        #[arg(long)]
        timeframe: String,
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the data range for a symbol
    Info {
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        timeframe: Option<String>,
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the instrument class and default stop for a symbol
    PipSize { symbol: String },
}

/// Install the global subscriber. `RUST_LOG` wins over `level`. Output goes
/// to stderr so stdout stays clean for data.
pub fn init_logging(level: &str) -> Result<(), String> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| format!("failed to init logging: {e}"))
}

pub fn run(cli: Cli) -> ExitCode {
    if let Err(e) = init_logging(&cli.log_level) {
        eprintln!("warning: {e}");
    }

    let result = match cli.command {
        Command::Backtest {
            config,
            signals,
            output,
            journal,
            symbol,
            timeframe,
            dry_run,
        } => {
            let options = BacktestOptions {
                signals,
                output,
                journal,
                symbol,
                timeframe,
            };
            if dry_run {
                run_dry_run(&config, &options)
            } else {
                run_backtest_command(&config, &options)
            }
        }
        Command::Validate { config } => run_validate(&config),
        Command::ListSymbols { timeframe, config } => run_list_symbols(&timeframe, &config),
        Command::Info {
            symbol,
            timeframe,
            config,
        } => run_info(symbol.as_deref(), timeframe.as_deref(), &config),
        Command::PipSize { symbol } => {
            run_pip_size(&symbol);
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Command-line overrides for a backtest run.
#[derive(Debug, Clone, Default)]
pub struct BacktestOptions {
    pub signals: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub journal: Option<PathBuf>,
    pub symbol: Option<String>,
    pub timeframe: Option<String>,
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, TradesimError> {
    FileConfigAdapter::from_file(path).map_err(|e| TradesimError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// `[data] path` as a CSV data source.
pub fn data_adapter(config: &dyn ConfigPort) -> Result<CsvAdapter, TradesimError> {
    let path = required_string(config, "data", "path")?;
    Ok(CsvAdapter::new(PathBuf::from(path)))
}

pub fn build_backtest_config(
    config: &dyn ConfigPort,
    symbol_override: Option<&str>,
    timeframe_override: Option<&str>,
) -> Result<BacktestConfig, TradesimError> {
    let symbol = match symbol_override {
        Some(s) => s.trim().to_uppercase(),
        None => required_string(config, "backtest", "symbol")?.to_uppercase(),
    };
    let timeframe = match timeframe_override {
        Some(t) => t.trim().to_string(),
        None => required_string(config, "backtest", "timeframe")?,
    };

    let mut simulation = SimulationConfig::new(
        required_number(config, "backtest", "initial_balance")?,
        required_number(config, "backtest", "risk_per_trade")?,
        required_number(config, "backtest", "risk_reward_ratio")?,
    );
    if config.get_string("backtest", "max_candles").is_some() {
        let limit = config.get_int("backtest", "max_candles", 0);
        let limit = usize::try_from(limit).ok().filter(|l| *l >= 1).ok_or_else(|| {
            TradesimError::ConfigInvalid {
                section: "backtest".into(),
                key: "max_candles".into(),
                reason: "max_candles must be a whole number of at least 1".into(),
            }
        })?;
        simulation = simulation.with_max_candles(limit);
    }

    Ok(BacktestConfig {
        symbol,
        timeframe,
        start_date: parse_date(config, "start_date")?,
        end_date: parse_date(config, "end_date")?,
        simulation,
    })
}

pub fn build_strategy(config: &dyn ConfigPort) -> Result<Strategy, TradesimError> {
    let strategy_type: StrategyType = required_string(config, "strategy", "type")?.parse()?;
    let name = config
        .get_string("strategy", "name")
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| strategy_type.name().to_string());
    let parameters = read_strategy_params(config)?;
    strategy_type.validate(&parameters)?;

    Ok(Strategy {
        name: name.trim().to_string(),
        strategy_type,
        parameters,
    })
}

/// Backtest name for a signal file: the configured strategy name, or the
/// file stem.
fn signal_file_name(config: &dyn ConfigPort, path: &Path) -> String {
    config
        .get_string("strategy", "name")
        .filter(|n| !n.trim().is_empty())
        .or_else(|| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "signals".to_string())
}

/// Simulate, write the report, and optionally store the run.
pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    bt_config: &BacktestConfig,
    source: SignalSource<'_>,
    report_port: &dyn ReportPort,
    output_path: &Path,
    store: Option<&dyn TradeStorePort>,
) -> Result<BacktestReport, TradesimError> {
    eprintln!(
        "Running backtest: {} {} from {} to {}",
        bt_config.symbol, bt_config.timeframe, bt_config.start_date, bt_config.end_date
    );

    let report = run_backtest(data_port, bt_config, source)?;
    print_summary(&report);

    report_port.write(&report, output_path)?;
    eprintln!("\nReport written to: {}", output_path.display());

    if let Some(store) = store {
        let stored = store.save_backtest(&report)?;
        eprintln!(
            "Saved to journal as #{} ({} trades)",
            stored.id, stored.trade_count
        );
    }

    Ok(report)
}

pub fn print_summary(report: &BacktestReport) {
    let metrics = &report.output.metrics;
    let final_balance = report
        .output
        .equity_curve
        .last()
        .copied()
        .unwrap_or(report.initial_balance);

    eprintln!("\n=== {} ===", report.name);
    eprintln!("Bars:             {}", report.bar_count);
    eprintln!("Signals:          {}", report.signal_count);
    eprintln!("Total Trades:     {}", metrics.nr_trades);
    eprintln!("Win Rate:         {:.2}%", metrics.winrate);
    eprintln!("Total Profit:     {:.2}", metrics.total_profit);
    match metrics.profit_factor {
        Some(pf) => eprintln!("Profit Factor:    {:.2}", pf),
        None => eprintln!("Profit Factor:    n/a (no losing trades)"),
    }
    eprintln!("Expectancy:       {:.2}", metrics.expectancy);
    eprintln!("Max Drawdown:     {:.2}", metrics.drawdown_max);
    eprintln!("Final Balance:    {:.2}", final_balance);
}

fn run_backtest_command(config_path: &Path, options: &BacktestOptions) -> Result<(), TradesimError> {
    eprintln!("Loading config from {}", config_path.display());
    let config = load_config(config_path)?;
    validate_backtest_config(&config)?;

    let bt_config = build_backtest_config(
        &config,
        options.symbol.as_deref(),
        options.timeframe.as_deref(),
    )?;
    let data_port = data_adapter(&config)?;

    let output = options
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from("report.json"));
    let journal = match &options.journal {
        Some(dir) => Some(CsvJournalAdapter::new(dir.clone())),
        None => CsvJournalAdapter::from_config(&config),
    };
    let store = journal.as_ref().map(|j| j as &dyn TradeStorePort);

    match &options.signals {
        Some(path) => {
            eprintln!("Loading signals from {}", path.display());
            let signals = CsvAdapter::load_signals(path)?;
            let source = SignalSource::Provided {
                name: signal_file_name(&config, path),
                signals,
            };
            run_backtest_pipeline(&data_port, &bt_config, source, &JsonReportAdapter, &output, store)?;
        }
        None => {
            validate_strategy_config(&config)?;
            let strategy = build_strategy(&config)?;
            eprintln!("Loading strategy: {} ({})", strategy.name, strategy.strategy_type);
            run_backtest_pipeline(
                &data_port,
                &bt_config,
                SignalSource::Strategy(&strategy),
                &JsonReportAdapter,
                &output,
                store,
            )?;
        }
    }
    Ok(())
}

pub fn run_dry_run(config_path: &Path, options: &BacktestOptions) -> Result<(), TradesimError> {
    eprintln!("Loading config from {}", config_path.display());
    let config = load_config(config_path)?;
    validate_backtest_config(&config)?;
    let bt_config = build_backtest_config(
        &config,
        options.symbol.as_deref(),
        options.timeframe.as_deref(),
    )?;
    eprintln!("Config validated successfully");

    eprintln!("\nBacktest:");
    eprintln!("  symbol:            {}", bt_config.symbol);
    eprintln!("  timeframe:         {}", bt_config.timeframe);
    eprintln!(
        "  period:            {} to {}",
        bt_config.start_date, bt_config.end_date
    );
    eprintln!("  initial balance:   {}", bt_config.simulation.initial_balance);
    eprintln!("  risk per trade:    {}%", bt_config.simulation.risk_per_trade);
    eprintln!("  risk/reward:       {}", bt_config.simulation.risk_reward_ratio);
    if let Some(limit) = bt_config.simulation.max_candles {
        eprintln!("  max candles:       {}", limit);
    }
    eprintln!(
        "  default stop:      {} ({})",
        default_stop_distance(&bt_config.symbol),
        InstrumentClass::classify(&bt_config.symbol)
    );

    match &options.signals {
        Some(path) => {
            let signals = CsvAdapter::load_signals(path)?;
            eprintln!("\nSignals: {} from {}", signals.len(), path.display());
        }
        None => {
            validate_strategy_config(&config)?;
            let strategy = build_strategy(&config)?;
            eprintln!("\nStrategy: {} ({})", strategy.name, strategy.strategy_type);
            for (key, default) in strategy.strategy_type.defaults() {
                let value = strategy.parameters.get(key).unwrap_or(*default);
                eprintln!("  {}: {}", key, value);
            }
        }
    }

    eprintln!("\nDry run complete: configuration is valid");
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), TradesimError> {
    eprintln!("Validating config: {}", config_path.display());
    let config = load_config(config_path)?;

    validate_backtest_config(&config)?;
    eprintln!("  [backtest] ok");
    validate_strategy_config(&config)?;
    let strategy = build_strategy(&config)?;
    eprintln!("  [strategy] ok: {} ({})", strategy.name, strategy.strategy_type);

    eprintln!("\nConfiguration is valid.");
    Ok(())
}

fn run_list_symbols(timeframe: &str, config_path: &Path) -> Result<(), TradesimError> {
    let config = load_config(config_path)?;
    let adapter = data_adapter(&config)?;

    let symbols = adapter.list_symbols(timeframe)?;
    if symbols.is_empty() {
        eprintln!("No symbols found for timeframe {}", timeframe);
    }
    for symbol in &symbols {
        println!("{}", symbol);
    }
    Ok(())
}

fn run_info(
    symbol: Option<&str>,
    timeframe: Option<&str>,
    config_path: &Path,
) -> Result<(), TradesimError> {
    let config = load_config(config_path)?;
    let adapter = data_adapter(&config)?;

    let symbol = match symbol {
        Some(s) => s.trim().to_uppercase(),
        None => required_string(&config, "backtest", "symbol")?.to_uppercase(),
    };
    let timeframe = match timeframe {
        Some(t) => t.trim().to_string(),
        None => required_string(&config, "backtest", "timeframe")?,
    };

    match adapter.get_data_range(&symbol, &timeframe)? {
        Some((first, last, count)) => {
            println!("{} {}: {} bars, {} to {}", symbol, timeframe, count, first, last)
        }
        None => eprintln!("{} {}: no data found", symbol, timeframe),
    }
    Ok(())
}

fn run_pip_size(symbol: &str) {
    let class = InstrumentClass::classify(symbol);
    println!(
        "{}: {}, pip size {}, default stop {}",
        symbol.to_uppercase(),
        class,
        class.pip_size(),
        default_stop_distance(symbol)
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    const FULL: &str = "[backtest]\nsymbol = eurusd\ntimeframe = H1\nstart_date = 2024-01-01\nend_date = 2024-06-30\ninitial_balance = 10000\nrisk_per_trade = 1.5\nrisk_reward_ratio = 2\n\n[strategy]\nname = Golden Cross\ntype = sma_cross\nfast = 5\nslow = 20\n";

    #[test]
    fn cli_parses_backtest_command() {
        let cli = Cli::try_parse_from([
            "tradesim",
            "backtest",
            "-c",
            "bt.ini",
            "--signals",
            "sig.csv",
            "--symbol",
            "XAUUSD",
            "--dry-run",
        ])
        .unwrap();
        assert_eq!(cli.log_level, "warn");
        match cli.command {
            Command::Backtest {
                config,
                signals,
                symbol,
                dry_run,
                output,
                ..
            } => {
                assert_eq!(config, PathBuf::from("bt.ini"));
                assert_eq!(signals, Some(PathBuf::from("sig.csv")));
                assert_eq!(symbol.as_deref(), Some("XAUUSD"));
                assert!(dry_run);
                assert!(output.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn cli_accepts_global_log_level() {
        let cli = Cli::try_parse_from(["tradesim", "pip-size", "USDJPY", "--log-level", "debug"])
            .unwrap();
        assert_eq!(cli.log_level, "debug");
        assert!(matches!(cli.command, Command::PipSize { symbol } if symbol == "USDJPY"));
    }

    #[test]
    fn backtest_config_from_ini() {
        let bt = build_backtest_config(&config(FULL), None, None).unwrap();
        assert_eq!(bt.symbol, "EURUSD");
        assert_eq!(bt.timeframe, "H1");
        assert_eq!(bt.simulation, SimulationConfig::new(10_000.0, 1.5, 2.0));
        assert_eq!(bt.start_date.to_string(), "2024-01-01");
    }

    #[test]
    fn overrides_replace_symbol_and_timeframe() {
        let bt = build_backtest_config(&config(FULL), Some("xauusd"), Some("M15")).unwrap();
        assert_eq!(bt.symbol, "XAUUSD");
        assert_eq!(bt.timeframe, "M15");
    }

    #[test]
    fn max_candles_is_carried() {
        let ini = FULL.replace("risk_reward_ratio = 2\n", "risk_reward_ratio = 2\nmax_candles = 100\n");
        let bt = build_backtest_config(&config(&ini), None, None).unwrap();
        assert_eq!(bt.simulation.max_candles, Some(100));
    }

    #[test]
    fn strategy_from_ini() {
        let strategy = build_strategy(&config(FULL)).unwrap();
        assert_eq!(strategy.name, "Golden Cross");
        assert_eq!(strategy.strategy_type, StrategyType::SmaCross);
        assert_eq!(strategy.parameters.get("fast"), Some(5.0));
        assert_eq!(strategy.parameters.get("slow"), Some(20.0));
    }

    #[test]
    fn strategy_name_defaults_to_type() {
        let strategy = build_strategy(&config("[strategy]\ntype = breakout\n")).unwrap();
        assert_eq!(strategy.name, "breakout");
    }

    #[test]
    fn missing_data_path_is_config_error() {
        let err = data_adapter(&config(FULL)).err().unwrap();
        assert!(matches!(err, TradesimError::ConfigMissing { section, .. } if section == "data"));
    }
}
