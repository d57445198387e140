use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

use commands::Overrides;

#[derive(Parser)]
#[command(
    name = "fleetctl",
    about = "Static pod fleet — scale functions up and down on one node",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Path to fleet.toml. Defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Override [manifests] dir.
    #[arg(long, global = true)]
    manifest_dir: Option<PathBuf>,
    /// Override [naming] node_name.
    #[arg(long, global = true)]
    node_name: Option<String>,
    /// Override [readiness] namespace.
    #[arg(short, long, global = true)]
    namespace: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create N instances of a function, all or nothing.
    ///
    /// Each instance is written as a static pod manifest and polled until
    /// running. If any instance fails, every manifest of the function is
    /// removed again.
    ScaleUp {
        #[arg(long)]
        name: String,
        #[arg(long)]
        image: String,
        #[arg(long, default_value = "latest")]
        tag: String,
        /// Container port (default: [invoke] port).
        #[arg(long)]
        port: Option<u16>,
        #[arg(short, long, default_value_t = 1)]
        revisions: u32,
        /// Readiness deadline for the whole request, e.g. "90s".
        #[arg(long)]
        timeout: Option<String>,
        /// Create the namespace first if it does not exist.
        #[arg(long)]
        create_namespace: bool,
        /// Cancel pending instances as soon as one fails.
        #[arg(long)]
        fail_fast: bool,
        /// Call every new instance once after it is running.
        #[arg(long)]
        invoke: bool,
    },
    /// Remove every manifest of a function. Safe to repeat.
    ScaleDown {
        #[arg(long)]
        name: String,
    },
    /// Call a running instance over HTTP.
    Invoke {
        /// Instance name, `<function>-<id>` as shown by `status`.
        #[arg(long)]
        pod: String,
        #[arg(long)]
        port: Option<u16>,
        /// Number of sequential calls.
        #[arg(long, default_value_t = 1)]
        count: u32,
    },
    /// List the manifests of a function and the phase of each pod.
    Status {
        #[arg(long)]
        name: String,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,fleet=debug".into()),
        )
        .init();

    let cli = Cli::parse();
    let overrides = Overrides {
        manifest_dir: cli.manifest_dir,
        node_name: cli.node_name,
        namespace: cli.namespace,
    };
    let config = commands::load_config(cli.config.as_deref(), overrides)?;

    match cli.command {
        Commands::ScaleUp {
            name,
            image,
            tag,
            port,
            revisions,
            timeout,
            create_namespace,
            fail_fast,
            invoke,
        } => {
            let args = commands::scale::ScaleUpArgs {
                name,
                image,
                tag,
                port,
                revisions,
                timeout,
                create_namespace,
                fail_fast,
                invoke,
            };
            commands::scale::scale_up(config, args).await
        }
        Commands::ScaleDown { name } => commands::scale::scale_down(&config, &name),
        Commands::Invoke { pod, port, count } => {
            commands::invoke::invoke(&config, &pod, port, count).await
        }
        Commands::Status { name, format } => commands::status::status(&config, &name, &format).await,
    }
}
