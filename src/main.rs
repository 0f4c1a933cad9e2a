//! D-LOGG Reader CLI
//!
//! A command-line interface (CLI) application for reading UVR1611 heating
//! controllers through a D-LOGG USB data logger.
//!
//! This tool allows users to:
//! - Display the device mode reported by the data logger.
//! - Read the current values of all inputs, outputs and heat registers.
//! - Run in a continuous daemon mode to poll the controller and either print
//!   the values to the console or hand them to a script as environment variables.
//!
//! The CLI leverages the `dlogg_lib` crate for protocol definitions and client operations.

use anyhow::{Context, Result};
use clap::Parser;
use dlogg_lib::{client::DLogg, serial::SerialHandle};
use flexi_logger::writers::{SyslogConnection, SyslogFacility, SyslogLineHeader, SyslogWriter};
use flexi_logger::{Logger, LoggerHandle};
use log::*;
use std::path::Path;
use std::{panic, time::Duration};

mod commandline;
mod config;
mod export;

fn logging_init(loglevel: LevelFilter, syslog: bool) -> LoggerHandle {
    let logger = Logger::try_with_env_or_str(loglevel.as_str()).expect("Cannot init logging");
    let logger = if syslog {
        let writer = SyslogWriter::builder(
            SyslogConnection::syslog_call(),
            SyslogLineHeader::Rfc3164,
            SyslogFacility::SystemDaemons,
        )
        .custom_process_name(Some("dlogg-reader"))
        // the logger's level specification does the filtering
        .max_log_level(LevelFilter::Trace)
        .build()
        .expect("Cannot connect to syslog");
        logger.log_to_writer(writer)
    } else {
        logger
    };
    let log_handle = logger.start().expect("Cannot start logging");

    panic::set_hook(Box::new(|panic_info| {
        let (filename, line, column) = panic_info
            .location()
            .map(|loc| (loc.file(), loc.line(), loc.column()))
            .unwrap_or(("<unknown_file>", 0, 0));

        let cause_str = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            *s
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.as_str()
        } else {
            "<unknown_panic_cause>"
        };

        error!(
            target: "panic",
            "Thread '{}' panicked at '{}': {}:{} - Cause: {}",
            std::thread::current().name().unwrap_or("<unnamed>"),
            filename,
            line,
            column,
            cause_str
        );
    }));
    log_handle
}

/// Opens the D-LOGG and performs the mode handshake.
fn connect(device: &str) -> Result<DLogg<SerialHandle>> {
    info!("Connecting to D-LOGG on {device}...");
    let dlogg =
        DLogg::open(device).with_context(|| format!("Cannot connect to D-LOGG on {device}"))?;
    info!("Connection established. Device mode 0x{:02X}", dlogg.mode());
    Ok(dlogg)
}

/// Closes the connection, a failed restore of the line settings is only logged.
fn disconnect(dlogg: DLogg<SerialHandle>) {
    if let Err(err) = dlogg.close() {
        warn!("Cannot restore serial line settings: {err}");
    }
}

fn handle_read(dlogg: &mut DLogg<SerialHandle>) -> Result<()> {
    info!("Executing: Read current data");
    match dlogg.poll() {
        Ok(state) => print!("{state}"),
        Err(err) if err.is_no_new_data() => println!("No new data currently available."),
        Err(err) => return Err(err).context("Cannot read current data"),
    }
    Ok(())
}

fn handle_daemon(
    dlogg: &mut DLogg<SerialHandle>,
    poll_interval: Duration,
    count: Option<u64>,
    output: &commandline::DaemonOutput,
) -> Result<()> {
    let script = match output {
        commandline::DaemonOutput::Console => None,
        commandline::DaemonOutput::Script { config_file } => {
            Some(config::ScriptConfig::load(Path::new(config_file))?)
        }
    };

    let mut polls = 0;
    while count.map_or(true, |count| polls < count) {
        if polls > 0 {
            std::thread::sleep(poll_interval);
        }
        polls += 1;

        debug!("Daemon: Reading current data...");
        let state = match dlogg.poll() {
            Ok(state) => state,
            Err(err) if err.is_no_new_data() => {
                debug!("Daemon: No new data, skipping");
                continue;
            }
            Err(err) => return Err(err).context("Cannot read current data"),
        };

        match &script {
            None => println!("{state}"),
            Some(script) => {
                let status = export::run_script(script, &state)?;
                if !status.success() {
                    warn!("{:?} exited with {status}", script.command);
                }
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = commandline::CliArgs::parse();

    // 1. Initialize logging as early as possible
    let _log_handle = logging_init(args.verbose.log_level_filter(), args.syslog);
    info!(
        "D-LOGG reader started. Log level: {}",
        args.verbose.log_level_filter()
    );

    // 2. Connect and negotiate the device mode
    let mut dlogg = connect(&args.device)?;

    // 3. Execute the command
    let result = match &args.command {
        commandline::CliCommands::Mode => {
            info!("Executing: Query device mode");
            println!("Device mode: 0x{:02X}", dlogg.mode());
            Ok(())
        }
        commandline::CliCommands::Read => handle_read(&mut dlogg),
        commandline::CliCommands::Daemon {
            poll_interval,
            count,
            output,
        } => {
            info!("Starting daemon mode: output={output:?}, interval={poll_interval:?}");
            handle_daemon(&mut dlogg, *poll_interval, *count, output)
        }
    };

    disconnect(dlogg);
    result
}
