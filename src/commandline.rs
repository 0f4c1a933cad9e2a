use crate::config::ScriptConfig;
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use std::time::Duration;

fn default_device_name() -> String {
    String::from("/dev/ttyUSB0") // Common default for USB-to-serial adapters on Linux.
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum DaemonOutput {
    /// Continuously read the controller and print all values to the standard output (console).
    Console,
    /// Continuously read the controller and run a script with all values exported
    /// as environment variables.
    #[clap(verbatim_doc_comment)]
    Script {
        /// The YAML configuration file describing the script to run.
        #[arg(long, default_value_t = ScriptConfig::DEFAULT_CONFIG_FILE.to_string())]
        config_file: String,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum CliCommands {
    /// Run in daemon mode: continuously poll the controller at a specified interval.
    /// Polls without new data are skipped silently.
    #[clap(verbatim_doc_comment)]
    Daemon {
        /// Interval between two polls (e.g., "3s", "1m")
        #[arg(value_parser = humantime::parse_duration, short, long, default_value = "3s", verbatim_doc_comment)]
        poll_interval: Duration,

        /// Stop after this many polls. Runs forever if omitted.
        #[arg(short, long)]
        count: Option<u64>,

        /// Specifies the output.
        #[command(subcommand)]
        output: DaemonOutput,
    },

    /// Read and display the current values of all inputs, outputs and heat registers.
    Read,

    /// Display the device mode reported by the D-LOGG.
    Mode,
}

const fn about_text() -> &'static str {
    "D-LOGG reader - Read UVR1611 heating controllers through a D-LOGG USB data logger."
}

#[derive(Parser, Debug)]
#[command(name="dlogg-reader", author, version, about=about_text(), long_about = None, propagate_version = true)]
pub struct CliArgs {
    /// Configure verbosity of logging output.
    /// -v for info, -vv for debug, -vvv for trace. Default is warnings only.
    #[command(flatten)]
    pub verbose: Verbosity<WarnLevel>,

    /// Serial device of the D-LOGG USB adapter.
    #[arg(global = true, short, long, default_value_t = default_device_name())]
    pub device: String,

    /// Send log output to the system log (facility daemon) instead of stderr.
    #[arg(global = true, long)]
    pub syslog: bool,

    #[command(subcommand)]
    pub command: CliCommands,
}
