use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use locus_core::{Locator, ResourceProvider};
use locus_kubehub::KubeProvider;
use locus_resolve::{EndpointResolver, Resolution, ResolverConfig};
use locus_store::SnapshotBuilder;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "locusctl", version, about = "Resolve workload locators to endpoints")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse a locator and print its parts
    Parse {
        /// Locator, e.g. "kubernetes:apps/v1/deployment/my-ns/my-app?port-name=http"
        locator: String,
    },
    /// Resolve a locator against the current cluster or offline manifests
    Resolve {
        /// Locator, e.g. "kubernetes:apps/v1/deployment/my-ns/my-app"
        locator: String,
        /// Manifest files (JSON/YAML) to resolve against instead of the live cluster
        #[arg(long = "snapshot", env = "LOCUS_SNAPSHOT", value_delimiter = ',')]
        snapshots: Vec<PathBuf>,
        /// Namespace for snapshot manifests that omit one
        #[arg(long = "default-namespace", default_value = "default")]
        default_namespace: String,
    },
}

fn init_tracing() {
    let env = std::env::var("LOCUS_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("LOCUS_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid LOCUS_METRICS_ADDR; expected host:port");
        }
    }
}

async fn provider_for(snapshots: &[PathBuf], default_namespace: &str) -> Result<Arc<dyn ResourceProvider>> {
    if snapshots.is_empty() {
        return Ok(Arc::new(KubeProvider::try_default().await?));
    }
    let mut builder = SnapshotBuilder::new().with_default_namespace(default_namespace);
    for path in snapshots {
        builder.apply_path(path)?;
    }
    let snap = builder.freeze();
    info!(objects = snap.len(), files = snapshots.len(), "resolving against snapshot");
    Ok(Arc::new(snap))
}

fn print_locator(l: &Locator, output: Output) -> Result<()> {
    match output {
        Output::Human => {
            println!("scheme      {}", l.scheme());
            println!("apiVersion  {}", l.api_version());
            println!("kind        {}", l.kind());
            println!("namespace   {}", l.namespace());
            println!("name        {}", l.name());
            for (k, v) in l.query_params() {
                println!("param       {}={}", k, v);
            }
        }
        Output::Json => println!("{}", serde_json::to_string_pretty(l)?),
    }
    Ok(())
}

fn print_resolution(res: &Resolution, output: Output) -> Result<()> {
    match output {
        Output::Human => match res {
            Resolution::Resolved(r) => println!("{}", r.endpoint),
            Resolution::Unresolved(reason) => eprintln!("unresolved: {}", reason),
        },
        Output::Json => println!("{}", serde_json::to_string_pretty(res)?),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();

    match cli.command {
        Commands::Parse { locator } => {
            let l = Locator::parse(&locator)?;
            print_locator(&l, cli.output)?;
        }
        Commands::Resolve { locator, snapshots, default_namespace } => {
            let l = Locator::parse(&locator)?;
            info!(locator = %l, "resolve invoked");
            let provider = provider_for(&snapshots, &default_namespace).await?;
            let resolver = EndpointResolver::with_config(provider, ResolverConfig::from_env());
            let res = resolver.resolve_detailed(&l).await?;
            print_resolution(&res, cli.output)?;
            if let Resolution::Unresolved(_) = res {
                std::process::exit(2);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_accepts_multiple_snapshots() {
        let cli = Cli::try_parse_from([
            "locusctl",
            "-o",
            "json",
            "resolve",
            "kubernetes:apps/v1/deployment/ns/app",
            "--snapshot",
            "a.yaml,b.json",
        ])
        .expect("parse");
        assert_eq!(cli.output, Output::Json);
        let Commands::Resolve { snapshots, default_namespace, .. } = cli.command else { panic!("expected resolve") };
        assert_eq!(snapshots, vec![PathBuf::from("a.yaml"), PathBuf::from("b.json")]);
        assert_eq!(default_namespace, "default");
    }

    #[test]
    fn parse_subcommand_takes_locator() {
        let cli = Cli::try_parse_from(["locusctl", "parse", "kubernetes:v1/pod/ns/p"]).expect("parse");
        assert!(matches!(cli.command, Commands::Parse { .. }));
    }
}
