use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::exit;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use voltlog::acquisition::{DEFAULT_BAUD_RATE, DEFAULT_PORT};
use voltlog::sample::DEFAULT_FAULT_THRESHOLD;
use voltlog::{
    export_session, logging, spawn_watcher, stop_signal, Acquisition, AcquisitionConfig,
    AcquisitionError, Session,
};

/// Rows shown after a successful export.
const PREVIEW_ROWS: usize = 5;

#[derive(Parser, Debug)]
#[command(
    name = "voltlog",
    about = "Collect six-channel voltage readings from a serial board and save them as CSV"
)]
struct Args {
    /// Serial port (e.g., COM5 or /dev/ttyACM0). Prompted for when omitted.
    #[arg(short, long)]
    port: Option<String>,
    /// Baud rate configured in the board firmware
    #[arg(short, long, default_value_t = DEFAULT_BAUD_RATE)]
    baud: u32,
    /// Readings below this voltage are flagged as faults
    #[arg(short, long, default_value_t = DEFAULT_FAULT_THRESHOLD)]
    threshold: f64,
    /// Directory for the exported table
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,
    /// Wait after opening the port before collecting, in milliseconds
    #[arg(long, default_value_t = 2000)]
    settle_ms: u64,
    /// Sleep between polls, in milliseconds
    #[arg(long, default_value_t = 10)]
    poll_ms: u64,
    /// Log level (error, warn, info, debug, trace). Overrides VOLTLOG_LOG/RUST_LOG.
    #[arg(long)]
    log_level: Option<String>,
    /// List available serial ports and exit
    #[arg(long)]
    list_ports: bool,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    logging::init_logging(args.log_level.as_deref());

    if args.list_ports {
        print_ports();
        return Ok(());
    }

    // Until collection starts Ctrl-C just ends the program; afterwards it stops
    // the session so the collected data is still saved.
    let (handle, mut token) = stop_signal();
    let collecting = Arc::new(AtomicBool::new(false));
    {
        let handle = handle.clone();
        let collecting = Arc::clone(&collecting);
        ctrlc::set_handler(move || {
            if collecting.load(Ordering::SeqCst) {
                eprintln!("\nInterrupted, stopping data collection...");
                handle.signal();
            } else {
                eprintln!("\nData collection interrupted by user.");
                exit(130);
            }
        })
        .context("failed to install Ctrl-C handler")?;
    }

    let port = match args.port {
        Some(port) => port,
        None => prompt_port(&mut io::stdin().lock(), &mut io::stdout(), DEFAULT_PORT)
            .context("failed to read port from stdin")?,
    };

    let config = AcquisitionConfig {
        port,
        baud_rate: args.baud,
        fault_threshold: args.threshold,
        settle_delay: Duration::from_millis(args.settle_ms),
        poll_interval: Duration::from_millis(args.poll_ms),
        output_dir: args.output_dir,
        ..AcquisitionConfig::default()
    };

    println!("Trying to connect to the board on {}...", config.port);
    let acquisition = match Acquisition::connect(config.clone()) {
        Ok(acquisition) => acquisition,
        Err(e) => {
            print_transport_help(&e, &config.port);
            return Err(e).context("could not connect to the board");
        }
    };
    println!("Connection established! Waiting for the board to initialize...");

    spawn_watcher(BufReader::new(io::stdin()), handle)
        .context("failed to start the stop watcher")?;
    println!("Press Enter to stop data collection...");
    collecting.store(true, Ordering::SeqCst);

    let session = match acquisition.run(&mut token) {
        Ok(session) => session,
        Err(e) => {
            print_transport_help(&e, &config.port);
            return Err(e).context("data collection failed");
        }
    };

    match export_session(&session, &config.output_dir) {
        Ok(report) => {
            println!("Data saved to {}", report.path.display());
            println!();
            println!("{}", report.summary);
            println!();
            print_preview(&session);
            Ok(())
        }
        Err(AcquisitionError::EmptySession) => {
            println!("No data was collected. Check the communication with the board.");
            Ok(())
        }
        Err(e) => Err(e).context("failed to save data"),
    }
}

/// Ask for the port, returning `default` on an empty answer.
fn prompt_port<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    default: &str,
) -> io::Result<String> {
    write!(output, "Enter the board's serial port (default: {default}): ")?;
    output.flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    let answer = answer.trim();
    Ok(if answer.is_empty() {
        default.to_string()
    } else {
        answer.to_string()
    })
}

fn print_transport_help(err: &AcquisitionError, port: &str) {
    if !err.is_transport() {
        return;
    }
    eprintln!("Error talking to the board: {err}");
    eprintln!("Check that:");
    eprintln!(" - the board is connected to this computer");
    eprintln!(" - the port is correct (currently using {port})");
    eprintln!(" - no other program is using the serial port");
    print_ports();
}

fn print_ports() {
    match serialport::available_ports() {
        Ok(ports) if ports.is_empty() => println!("No serial ports found."),
        Ok(ports) => {
            println!("Available serial ports:");
            for p in ports {
                println!("  {}", p.port_name);
            }
        }
        Err(e) => eprintln!("Could not list serial ports: {e}"),
    }
}

fn print_preview(session: &Session) {
    println!("Collected {} data points", session.len());
    println!("First {} rows:", PREVIEW_ROWS.min(session.len()));
    for sample in session.samples().iter().take(PREVIEW_ROWS) {
        let cells: Vec<String> = sample
            .readings
            .iter()
            .map(|r| r.map_or_else(|| "-".to_string(), |v| format!("{v:.3}")))
            .collect();
        println!(
            "  {} | {} | fault={}",
            sample.timestamp.format("%H:%M:%S%.3f"),
            cells.join(" "),
            u8::from(sample.fault)
        );
    }
}
