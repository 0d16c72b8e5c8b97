//! Basic example: list server capabilities and fetch the running config
//!
//! # Prerequisites
//!
//! - NETCONF server reachable over SSH (port 830)
//! - Valid credentials (username/password or SSH key)
//!
//! # Usage
//!
//! ```bash
//! cargo run --example get_config -- --host 192.0.2.1 --user admin --password secret
//! cargo run --example get_config -- --host 192.0.2.1 --user admin --key ~/.ssh/id_ed25519 \
//!     --select '/if:interfaces' --ns 'if=urn:ietf:params:xml:ns:yang:ietf-interfaces'
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use ferroconf::render::render_reply_to_string;
use ferroconf::rpc::{Datastore, Filter, Operation};
use ferroconf::{BindingSet, ClientBuilder, Request};

#[derive(Parser)]
struct Args {
    #[arg(long, default_value = "localhost")]
    host: String,

    #[arg(long, default_value_t = 830)]
    port: u16,

    #[arg(long)]
    user: String,

    #[arg(long)]
    password: Option<String>,

    #[arg(long)]
    key: Option<PathBuf>,

    /// Datastore to read
    #[arg(long, default_value = "running")]
    source: Datastore,

    /// XPath filter sent to the server
    #[arg(long)]
    select: Option<String>,

    /// Namespace bindings used by --select
    #[arg(long)]
    ns: Option<String>,

    #[arg(long, default_value_t = 30)]
    timeout: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (set RUST_LOG=debug for verbose output)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut builder = ClientBuilder::new(&args.host)
        .port(args.port)
        .username(&args.user)
        .timeout(Duration::from_secs(args.timeout));

    if let Some(password) = &args.password {
        builder = builder.password(password);
    } else if let Some(key_path) = &args.key {
        builder = builder.private_key(key_path);
    } else {
        eprintln!("Error: Must provide either --password or --key");
        std::process::exit(1);
    }

    let mut client = builder.build()?;

    println!("Connecting to {}:{}...", args.host, args.port);
    client.open().await?;

    if let Some(capabilities) = client.capabilities() {
        println!("Server capabilities:");
        for capability in capabilities.iter() {
            println!("  {}", capability);
        }
    }

    let namespaces = match args.ns.as_deref() {
        Some(ns) => BindingSet::parse(ns)?,
        None => BindingSet::new(),
    };
    let filter = args
        .select
        .map(|select| Filter::new(select).with_namespaces(namespaces.clone()));

    let request = Request::Typed(Operation::GetConfig {
        source: args.source,
        filter,
    });

    let result = client.execute(request).await;
    client.close().await?;

    let reply = result?;
    print!("{}", render_reply_to_string(&reply, None, &namespaces)?);
    Ok(())
}
