use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use snapview::provider::{ResticCommand, ResticConfig};
use snapview::render::Templates;
use snapview::AppState;
use snapview_tracing::LogFormat;
use tracing::{info, Level};

/// Browse the snapshots of a restic repository over HTTP.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// The repository to browse.
    #[arg(long, short = 'r', env = "RESTIC_REPOSITORY")]
    repo: String,

    /// File to read the repository password from.
    #[arg(long, env = "RESTIC_PASSWORD_FILE")]
    password_file: Option<PathBuf>,

    /// Shell command to obtain the repository password from.
    #[arg(long, env = "RESTIC_PASSWORD_COMMAND")]
    password_command: Option<String>,

    #[arg(long, env, default_value = "restic")]
    restic_binary: PathBuf,

    #[arg(long, env = "RESTIC_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    #[arg(long)]
    no_cache: bool,

    /// Don't lock the repository, needed for read-only repositories.
    #[arg(long)]
    no_lock: bool,

    /// Extended restic options (key=value), can be given multiple times.
    #[arg(long = "option", short = 'o')]
    options: Vec<String>,

    /// Seconds a single restic invocation may take.
    #[arg(long, env, default_value_t = 120)]
    command_timeout: u64,

    /// Directory with `*.html` templates replacing the builtin ones.
    #[arg(long, env)]
    templates_dir: Option<PathBuf>,

    #[arg(long)]
    log_level: Option<Level>,

    /// Whether to log in JSON
    #[arg(long)]
    json: bool,

    /// The address to listen on.
    #[clap(flatten)]
    listen_args: tokio_listener::ListenerAddressLFlag,

    #[cfg(feature = "otlp")]
    /// Whether to configure OTLP. Set --otlp=false to disable.
    #[arg(long, default_missing_value = "true", default_value = "true", num_args(0..=1), require_equals(true), action(clap::ArgAction::Set))]
    otlp: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    let tracing_handle = {
        #[allow(unused_mut)]
        let mut builder = snapview_tracing::TracingBuilder::default()
            .level(cli.log_level.unwrap_or(Level::INFO))
            .format(if cli.json {
                LogFormat::Json
            } else {
                LogFormat::Compact
            });
        #[cfg(feature = "otlp")]
        {
            if cli.otlp {
                builder = builder.enable_otlp("snapview");
            }
        }
        builder.build()?
    };

    let templates = match &cli.templates_dir {
        Some(dir) => Templates::with_overrides(dir)?,
        None => Templates::builtin()?,
    };

    let provider = ResticCommand::new(ResticConfig {
        binary: cli.restic_binary,
        repository: cli.repo,
        password_file: cli.password_file,
        password_command: cli.password_command,
        cache_dir: cli.cache_dir,
        no_cache: cli.no_cache,
        no_lock: cli.no_lock,
        options: cli.options,
        timeout: Duration::from_secs(cli.command_timeout),
    });

    let state = AppState::new(Arc::new(provider), Arc::new(templates));

    let app = snapview::gen_router().with_state(state);

    let listen_address = &cli.listen_args.listen_address.unwrap_or_else(|| {
        "[::]:6723"
            .parse()
            .expect("invalid fallback listen address")
    });

    let listener = tokio_listener::Listener::bind(
        listen_address,
        &Default::default(),
        &cli.listen_args.listener_options,
    )
    .await?;

    info!(listen_address=%listen_address, "starting daemon");

    tokio_listener::axum07::serve(
        listener,
        app.into_make_service_with_connect_info::<tokio_listener::SomeSocketAddrClonable>(),
    )
    .await?;

    tracing_handle.shutdown().await?;

    Ok(())
}
