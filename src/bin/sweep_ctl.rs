//! Thin CLI wrapper over the public `Device` API.
//!
//! ```text
//! sweep-ctl <port> get (motor_speed|sample_rate)
//! sweep-ctl <port> set (motor_speed|sample_rate) <value>
//! ```

use clap::{Parser, Subcommand};
use sweep_lidar::Device;

#[derive(Parser)]
#[command(name = "sweep-ctl")]
struct Cli {
    /// Serial device path, e.g. /dev/ttyUSB0
    port: String,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Read a configuration value.
    Get {
        #[command(subcommand)]
        field: GetField,
    },
    /// Write a configuration value.
    Set {
        #[command(subcommand)]
        field: SetField,
    },
}

#[derive(Subcommand)]
enum GetField {
    MotorSpeed,
    SampleRate,
}

#[derive(Subcommand)]
enum SetField {
    MotorSpeed { value: u8 },
    SampleRate { value: u32 },
}

fn main() {
    #[cfg(feature = "log")]
    env_logger::init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(output) => {
            println!("{}", output);
            std::process::exit(0);
        }
        Err(e) => {
            eprintln!("sweep-ctl: {}", e);
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<String, sweep_lidar::SweepError> {
    let mut device = Device::open_default(&cli.port)?;

    match cli.action {
        Action::Get { field } => match field {
            GetField::MotorSpeed => Ok(device.get_motor_speed()?.to_string()),
            GetField::SampleRate => Ok(device.get_sample_rate()?.to_string()),
        },
        Action::Set { field } => match field {
            SetField::MotorSpeed { value } => {
                device.set_motor_speed(value)?;
                Ok(value.to_string())
            }
            SetField::SampleRate { value } => {
                device.set_sample_rate(value)?;
                Ok(value.to_string())
            }
        },
    }
}
