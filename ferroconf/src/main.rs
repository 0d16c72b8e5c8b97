//! ferroconf - send one NETCONF RPC and print the reply
//!
//! # Usage
//!
//! ```bash
//! ferroconf -s 192.0.2.1 -u admin -p secret get-config running
//! ferroconf -s 192.0.2.1 -u admin -p secret -f '//if:name' \
//!     -n 'if=urn:ietf:params:xml:ns:yang:ietf-interfaces' get
//! ferroconf -s 192.0.2.1 -u admin -k ~/.ssh/id_ed25519 -i request.xml -o reply.xml
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use log::{debug, warn};
use tokio_util::sync::CancellationToken;

use ferroconf::render::{self, Sink};
use ferroconf::transport::NETCONF_PORT;
use ferroconf::{BindingSet, ClientBuilder, ErrorKind, RequestBuilder, RpcInput};

#[derive(Parser, Debug)]
#[command(name = "ferroconf")]
#[command(about = "Send a NETCONF RPC over SSH and print the reply", long_about = None)]
#[command(version)]
struct Cli {
    /// Server hostname or address
    #[arg(short = 's', long = "server")]
    server: String,

    /// Server port; 0 or an unparsable value selects 830
    #[arg(short = 't', long = "tcp", default_value_t = NETCONF_PORT.to_string())]
    port: String,

    /// Username
    #[arg(short = 'u', long = "user")]
    user: String,

    /// Password
    #[arg(short = 'p', long = "pass", conflicts_with = "key")]
    password: Option<String>,

    /// Private key file
    #[arg(short = 'k', long = "key")]
    key: Option<PathBuf>,

    /// Treat the operation as inline XML
    #[arg(short = 'x', long = "xml", conflicts_with = "input")]
    xml: bool,

    /// Treat the operation as a path to an XML file
    #[arg(short = 'i', long = "input")]
    input: bool,

    /// XPath expression applied to the reply
    #[arg(short = 'f', long = "filter")]
    filter: Option<String>,

    /// Namespace bindings for the filter, as "prefix=uri prefix=uri"
    #[arg(short = 'n', long = "namespaces")]
    namespaces: Option<String>,

    /// Write output to this file instead of stdout
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short = 'd', long = "debug")]
    debug: bool,

    /// Seconds to wait for the reply
    #[arg(long = "timeout", default_value_t = 100)]
    timeout: u64,

    /// Operation followed by its parameters
    #[arg(required = true, num_args = 1.., trailing_var_arg = true)]
    rpc: Vec<String>,
}

impl Cli {
    fn port(&self) -> u16 {
        match self.port.trim().parse::<u16>() {
            Ok(0) | Err(_) => {
                warn!("invalid port '{}', using {}", self.port, NETCONF_PORT);
                NETCONF_PORT
            }
            Ok(port) => port,
        }
    }

    fn input(&self) -> RpcInput {
        let operation = self.rpc[0].clone();
        if self.input {
            RpcInput::File(PathBuf::from(operation))
        } else if self.xml {
            RpcInput::Xml(operation)
        } else {
            RpcInput::Command(operation)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(exit_code(e.kind()))
        }
    }
}

async fn run(cli: Cli) -> ferroconf::error::Result<()> {
    let bindings = match cli.namespaces.as_deref() {
        Some(text) => BindingSet::parse(text)?,
        None => BindingSet::new(),
    };

    // Build before connecting so bad input never opens a session
    let request = RequestBuilder::new(cli.input())
        .args(cli.rpc[1..].iter().cloned())
        .namespaces(bindings.clone())
        .build()?;

    let mut builder = ClientBuilder::new(&cli.server)
        .port(cli.port())
        .username(&cli.user)
        .reply_timeout(Duration::from_secs(cli.timeout));

    if let Some(ref password) = cli.password {
        builder = builder.password(password);
    } else if let Some(ref key) = cli.key {
        builder = builder.private_key(key);
    } else {
        warn!("no password or key given, trying authentication method 'none'");
    }

    let mut client = builder.build()?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupted");
            on_interrupt.cancel();
        }
    });

    let reply = client.run(request, cancel).await?;

    match (&cli.output, cli.filter.as_deref()) {
        (Some(path), None) => render::write_document(reply.document(), path),
        (output, filter) => {
            let text = render::render_reply_to_string(&reply, filter, &bindings)?;
            Sink::from_path(output.clone()).write(&text)
        }
    }
}

/// sysexits(3)-style status for each failure kind.
fn exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::InvalidArgument => 64,
        ErrorKind::Format | ErrorKind::MalformedInput | ErrorKind::Query => 65,
        ErrorKind::Transport => 69,
        ErrorKind::SendFailed | ErrorKind::Io => 74,
        ErrorKind::ReplyTimeout => 75,
        ErrorKind::Cancelled => 130,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_port_fallback() {
        for (arg, expected) in [("830", 830), ("2022", 2022), ("0", 830), ("abc", 830)] {
            let cli = Cli::parse_from(["ferroconf", "-s", "h", "-u", "u", "-t", arg, "get"]);
            assert_eq!(cli.port(), expected, "{}", arg);
        }
    }

    #[test]
    fn test_operation_and_params() {
        let cli = Cli::parse_from([
            "ferroconf", "-s", "h", "-u", "u", "get-config", "candidate", "/sys:system",
        ]);
        assert_eq!(cli.input(), RpcInput::Command("get-config".to_string()));
        assert_eq!(cli.rpc[1..], ["candidate", "/sys:system"]);
    }

    #[test]
    fn test_input_modes() {
        let cli = Cli::parse_from(["ferroconf", "-s", "h", "-u", "u", "-i", "req.xml"]);
        assert_eq!(cli.input(), RpcInput::File(PathBuf::from("req.xml")));

        let cli = Cli::parse_from(["ferroconf", "-s", "h", "-u", "u", "-x", "<get/>"]);
        assert_eq!(cli.input(), RpcInput::Xml("<get/>".to_string()));

        assert!(Cli::try_parse_from(["ferroconf", "-s", "h", "-u", "u", "-x", "-i", "a"]).is_err());
    }

    #[test]
    fn test_operation_required() {
        assert!(Cli::try_parse_from(["ferroconf", "-s", "h", "-u", "u"]).is_err());
    }

    #[test]
    fn test_exit_codes_distinct_from_success() {
        for kind in [
            ErrorKind::Format,
            ErrorKind::InvalidArgument,
            ErrorKind::MalformedInput,
            ErrorKind::SendFailed,
            ErrorKind::ReplyTimeout,
            ErrorKind::Query,
            ErrorKind::Transport,
            ErrorKind::Cancelled,
            ErrorKind::Io,
        ] {
            assert_ne!(exit_code(kind), 0);
        }
    }

    #[tokio::test]
    async fn test_missing_input_file_fails_before_connecting() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.xml");
        let cli = Cli::parse_from([
            "ferroconf",
            "-s",
            "192.0.2.1",
            "-u",
            "u",
            "-o",
            output.to_str().unwrap(),
            "-i",
            "/nonexistent/ferroconf/request.xml",
        ]);

        let err = run(cli).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
        assert!(!output.exists());
    }
}
