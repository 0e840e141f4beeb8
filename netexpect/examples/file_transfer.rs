//! Copy a file to a device's flash and verify it by MD5.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example file_transfer -- --host 192.168.1.1 --user admin --password secret \
//!     --source ./startup.cfg --dest startup.cfg --file-system flash:
//! ```

use std::env;

use netexpect::transfer::TransferMethod;
use netexpect::{ConnectionBuilder, FileTransfer, FileTransferJob};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut conn = ConnectionBuilder::new(&args.host)
        .username(&args.user)
        .password(&args.password)
        .device_type(&args.device_type)
        .connect()
        .await?;

    let mut job = FileTransferJob::put(&args.source, &args.dest).overwrite(args.overwrite);
    if let Some(fs) = &args.file_system {
        job = job.with_file_system(fs);
    }
    if args.inline {
        job = job.with_method(TransferMethod::InlineTcl);
    }

    let mut transfer = FileTransfer::new(&mut conn, job)?;
    println!("Destination: {}", transfer.remote_path());
    println!("Free space: {} bytes", transfer.remote_space_available().await?);

    let outcome = transfer.run().await?;
    if outcome.exists && !outcome.transferred {
        println!("File already present with matching hash, nothing to do");
    } else {
        println!("Transferred, verified: {}", outcome.verified);
    }

    conn.disconnect().await?;
    Ok(())
}

struct Args {
    host: String,
    user: String,
    password: String,
    device_type: String,
    source: String,
    dest: String,
    file_system: Option<String>,
    overwrite: bool,
    inline: bool,
}

impl Args {
    fn parse() -> Self {
        let mut args = Self {
            host: "localhost".to_string(),
            user: env::var("USER").unwrap_or_else(|_| "admin".to_string()),
            password: String::new(),
            device_type: "cisco_ios".to_string(),
            source: String::new(),
            dest: String::new(),
            file_system: None,
            overwrite: false,
            inline: false,
        };

        let mut argv = env::args().skip(1);
        while let Some(flag) = argv.next() {
            let mut value = || argv.next().unwrap_or_default();
            match flag.as_str() {
                "--host" | "-h" => args.host = value(),
                "--user" | "-u" => args.user = value(),
                "--password" | "-P" => args.password = value(),
                "--device-type" | "-d" => args.device_type = value(),
                "--source" => args.source = value(),
                "--dest" => args.dest = value(),
                "--file-system" => args.file_system = Some(value()),
                "--overwrite" => args.overwrite = true,
                "--inline-tcl" => args.inline = true,
                other => eprintln!("Unknown argument: {other}"),
            }
        }
        if args.dest.is_empty() {
            args.dest = args.source.rsplit('/').next().unwrap_or_default().to_string();
        }
        args
    }
}
