use clap::{ArgAction, Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;

use webhook_gate::logging::{init_logging, LoggingConfig};
use webhook_gate::settings::{WebhookConfig, SECRET_ENV_VAR};
use webhook_gate::signing::{build_canonical_string, sign, SigningSecret};
use webhook_gate::webhooks::serve;

#[derive(Parser, Debug)]
#[command(name = "webhook-gate")]
#[command(version)]
#[command(about = "Verify Contentful webhook signatures in front of a webhook receiver")]
struct Cli {
    /// Suppress all output except warnings and errors
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(long, short, action = ArgAction::Count, global = true, conflicts_with = "quiet")]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the webhook gate (default behavior if no command given)
    Serve {
        /// Path to a TOML configuration file
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Port to listen on (overrides configuration)
        #[arg(long, short)]
        port: Option<u16>,

        /// Address to bind to (overrides configuration)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Print the signature for a request, using CONTENTFUL_SIGNING_SECRET
    Sign {
        /// HTTP method
        #[arg(long, default_value = "POST")]
        method: String,

        /// Request path
        #[arg(long, default_value = "/")]
        path: String,

        /// Comma-separated list of signed header names
        #[arg(long, default_value = "")]
        signed_headers: String,

        /// Header as "Name: value" (repeatable)
        #[arg(long = "header", short = 'H', value_name = "HEADER")]
        headers: Vec<String>,

        /// Request body
        #[arg(long, conflicts_with = "body_file")]
        body: Option<String>,

        /// Read the request body from a file
        #[arg(long)]
        body_file: Option<PathBuf>,

        /// Also print the canonical string to stderr
        #[arg(long)]
        show_canonical: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(LoggingConfig::from_flags(cli.verbose, cli.quiet));

    match cli.command {
        None => run_server(None, None, None).await,
        Some(Commands::Serve { config, port, bind }) => run_server(config, port, bind).await,
        Some(Commands::Sign {
            method,
            path,
            signed_headers,
            headers,
            body,
            body_file,
            show_canonical,
        }) => {
            let body = match (body, body_file) {
                (Some(body), _) => body.into_bytes(),
                (None, Some(file)) => std::fs::read(&file)
                    .map_err(|e| format!("failed to read {}: {}", file.display(), e))?,
                (None, None) => Vec::new(),
            };
            run_sign(&method, &path, &signed_headers, &headers, &body, show_canonical)
        }
    }
}

async fn run_server(
    config_path: Option<PathBuf>,
    port: Option<u16>,
    bind: Option<String>,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let mut config = match WebhookConfig::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Refusing to start: {}", e);
            eprintln!("error: {}", e);
            return Ok(ExitCode::FAILURE);
        }
    };

    if let Some(port) = port {
        config = config.with_port(port);
    }
    if let Some(bind) = bind {
        config = config.with_bind_address(bind);
    }

    serve(config).await?;
    Ok(ExitCode::SUCCESS)
}

fn run_sign(
    method: &str,
    path: &str,
    signed_headers: &str,
    raw_headers: &[String],
    body: &[u8],
    show_canonical: bool,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let secret = match std::env::var(SECRET_ENV_VAR) {
        Ok(secret) if !secret.is_empty() => SigningSecret::from(secret),
        _ => {
            eprintln!("error: {} is not set", SECRET_ENV_VAR);
            return Ok(ExitCode::FAILURE);
        }
    };

    let mut headers = HashMap::new();
    for raw in raw_headers {
        let Some((name, value)) = raw.split_once(':') else {
            eprintln!("error: header must look like \"Name: value\", got {:?}", raw);
            return Ok(ExitCode::FAILURE);
        };
        // Later occurrences of a name win, whatever their case
        headers.insert(name.trim().to_ascii_lowercase(), value.to_string());
    }

    let canonical = build_canonical_string(method, path, signed_headers, &headers, body);
    if show_canonical {
        eprintln!("{}", canonical);
    }

    println!("{}", sign(&secret, &canonical));
    Ok(ExitCode::SUCCESS)
}
