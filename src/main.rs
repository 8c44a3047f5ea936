use clap::Parser;
use serde_json::json;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;
use unit_runner::config::{Config, ConfigLoader, LogFormat, LoggingConfig};
use unit_runner::{DeviceLocator, RunError, Runner, SerialConnector, SessionDriver};

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Runs the on-device unit tests over a serial link and reports pass/fail.",
    long_about = "Waits for the device prompt, sends the unit test command, captures the report and exits 0 only if no test failed, leaks stayed within the threshold and the device reported Passed."
)]
struct Args {
    /// Device name (e.g. the name shown on the device) or a serial port path.
    device: String,

    /// Configuration file. Defaults to the standard search locations.
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Leaked bytes tolerated before the run fails.
    #[arg(long, value_name = "BYTES")]
    leak_threshold: Option<u64>,

    /// Seconds the whole test run may take.
    #[arg(long, value_name = "SECS")]
    report_timeout: Option<u64>,

    /// Operating baud rate.
    #[arg(long)]
    baud: Option<u32>,

    /// Print the parsed report and verdict as JSON after the summary.
    #[arg(long)]
    json: bool,
}

fn load_config(args: &Args) -> Result<Config, RunError> {
    let mut config = match &args.config {
        Some(path) => ConfigLoader::load_from(path)?.into_config(),
        None => match ConfigLoader::load() {
            Ok(loader) => loader.into_config(),
            Err(e) => {
                eprintln!("Warning: Failed to load config, using defaults: {}", e);
                ConfigLoader::with_defaults().into_config()
            }
        },
    };

    if let Some(threshold) = args.leak_threshold {
        config.policy.leak_threshold = threshold;
    }
    if let Some(secs) = args.report_timeout {
        config.device.report_timeout_ms = secs.saturating_mul(1000);
    }
    if let Some(baud) = args.baud {
        config.device.baud_rate = baud;
    }
    config.validate()?;
    Ok(config)
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);

    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Compact => builder.compact().init(),
    }
}

fn print_json(out: &mut dyn Write, outcome: &Result<unit_runner::RunOutcome, RunError>) {
    let value = match outcome {
        Ok(outcome) => json!(outcome),
        Err(RunError::PolicyFail { result, violations }) => json!({
            "verdict": "fail",
            "result": result,
            "violations": violations,
        }),
        Err(e) => json!({ "verdict": "fail", "error": e.to_string() }),
    };
    if let Err(e) = writeln!(out, "{value}") {
        error!(%e, "failed to write JSON summary");
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(e.exit_code());
        }
    };
    init_tracing(&config.logging);
    debug!(?config, "configuration loaded");

    let runner = Runner::new(
        DeviceLocator::default(),
        SessionDriver::new(SerialConnector, config.device.session_config()),
        config.policy.leak_threshold,
    );

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let outcome = runner.run(&args.device, &mut out);

    if args.json {
        print_json(&mut out, &outcome);
    }

    match outcome {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            // The policy summary has already been printed with the transcript.
            if !matches!(e, RunError::PolicyFail { .. }) {
                eprintln!("{e}");
            }
            ExitCode::from(e.exit_code())
        }
    }
}
