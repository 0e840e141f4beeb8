//! Push configuration lines, stop on the first rejected one, then save.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example config_set -- --host 192.168.1.1 --user admin --password secret \
//!     "interface Loopback99" "description managed by netexpect"
//! cargo run --example config_set -- --host 192.168.1.1 --password secret --file changes.cfg
//! ```

use std::env;
use std::path::PathBuf;

use netexpect::error::DriverError;
use netexpect::{ConfigSetOptions, ConnectionBuilder, Error};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if args.commands.is_empty() && args.file.is_none() {
        eprintln!("Error: give configuration lines or --file");
        std::process::exit(1);
    }

    let mut conn = ConnectionBuilder::new(&args.host)
        .username(&args.user)
        .password(&args.password)
        .device_type(&args.device_type)
        .connect()
        .await?;

    let opts = ConfigSetOptions::default().error_pattern(r"% Invalid|% Incomplete|% Ambiguous");
    let result = match &args.file {
        Some(path) => conn.send_config_from_file(path, &opts).await,
        None => conn.send_config_set(&args.commands, &opts).await,
    };

    match result {
        Ok(output) => {
            println!("{output}");
            let saved = conn.save_config().await?;
            println!("Saved: {}", saved.trim());
        }
        Err(Error::Driver(DriverError::ConfigInvalid { command, output })) => {
            eprintln!("Device rejected {command:?}:\n{output}");
            // still in config mode at this point
            conn.exit_config_mode().await?;
        }
        Err(e) => return Err(e.into()),
    }

    conn.disconnect().await?;
    Ok(())
}

struct Args {
    host: String,
    user: String,
    password: String,
    device_type: String,
    file: Option<PathBuf>,
    commands: Vec<String>,
}

impl Args {
    fn parse() -> Self {
        let mut args = Self {
            host: "localhost".to_string(),
            user: env::var("USER").unwrap_or_else(|_| "admin".to_string()),
            password: String::new(),
            device_type: "cisco_ios".to_string(),
            file: None,
            commands: Vec::new(),
        };

        let mut argv = env::args().skip(1);
        while let Some(arg) = argv.next() {
            let mut value = || argv.next().unwrap_or_default();
            match arg.as_str() {
                "--host" | "-h" => args.host = value(),
                "--user" | "-u" => args.user = value(),
                "--password" | "-P" => args.password = value(),
                "--device-type" | "-d" => args.device_type = value(),
                "--file" | "-f" => args.file = Some(PathBuf::from(value())),
                _ => args.commands.push(arg),
            }
        }
        args
    }
}
