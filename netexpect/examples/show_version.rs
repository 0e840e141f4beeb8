//! Connect to a device, run a few show commands, and disconnect.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example show_version -- --host 192.168.1.1 --user admin --password secret
//! cargo run --example show_version -- --host 192.168.1.1 --device-type cisco_ios_telnet --password secret
//! ```

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use netexpect::{ConnectionBuilder, SendCommandOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut builder = ConnectionBuilder::new(&args.host)
        .username(&args.user)
        .device_type(&args.device_type)
        .timeout(Duration::from_secs(args.timeout));
    if let Some(port) = args.port {
        builder = builder.port(port);
    }
    if let Some(password) = &args.password {
        builder = builder.password(password);
    }
    if let Some(key) = &args.key {
        builder = builder.private_key(key);
    }
    if let Some(secret) = &args.secret {
        builder = builder.secret(secret);
    }

    println!("Connecting to {} as {}...", args.host, args.device_type);
    let mut conn = builder.connect().await?;
    println!("Connected, prompt is {:?} ({:?} mode)", conn.prompt(), conn.mode());

    let response = conn.send_command("show version").await?;
    println!("{}", "-".repeat(50));
    println!("{}", response.result);
    println!("{}", "-".repeat(50));
    println!("Completed in {:?}", response.elapsed);

    // keep the raw output, echo and prompt included
    let raw = conn.send_command_with("show clock", &SendCommandOptions::default().raw()).await?;
    println!("Raw: {:?}", raw.raw_result);

    let timed = conn.send_command_timing("show users").await?;
    if !timed.is_success() {
        eprintln!("Command failed: {:?}", timed.failure_message);
    } else {
        println!("{}", timed.result);
    }

    conn.disconnect().await?;
    println!("Done!");
    Ok(())
}

struct Args {
    host: String,
    port: Option<u16>,
    user: String,
    password: Option<String>,
    secret: Option<String>,
    key: Option<PathBuf>,
    device_type: String,
    timeout: u64,
}

impl Args {
    fn parse() -> Self {
        let mut args = Self {
            host: "localhost".to_string(),
            port: None,
            user: env::var("USER").unwrap_or_else(|_| "admin".to_string()),
            password: None,
            secret: None,
            key: None,
            device_type: "cisco_ios".to_string(),
            timeout: 30,
        };

        let mut argv = env::args().skip(1);
        while let Some(flag) = argv.next() {
            let mut value = || argv.next().unwrap_or_default();
            match flag.as_str() {
                "--host" | "-h" => args.host = value(),
                "--port" | "-p" => args.port = value().parse().ok(),
                "--user" | "-u" => args.user = value(),
                "--password" | "-P" => args.password = Some(value()),
                "--secret" | "-s" => args.secret = Some(value()),
                "--key" | "-k" => args.key = Some(PathBuf::from(value())),
                "--device-type" | "-d" => args.device_type = value(),
                "--timeout" | "-t" => args.timeout = value().parse().unwrap_or(30),
                other => eprintln!("Unknown argument: {other}"),
            }
        }
        args
    }
}
