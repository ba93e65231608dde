use anyhow::{Context, Result, bail};
use axum::{Router, extract::State, routing::get};
use ccf_resolver::atlas::AtlasService;
use ccf_resolver::config::Config;
use ccf_resolver::pipeline::{self, ResolveJob};
use ccf_resolver::{AppState, AtlasResolution, LocalAtlasService, Point3D, RoundingMode, app};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Map reference-space coordinates to atlas regions
#[derive(Parser, Debug)]
#[command(name = "ccf-resolver", version, about)]
struct Cli {
    /// Directory holding installed atlases
    #[arg(long, global = true)]
    atlas_dir: Option<PathBuf>,

    /// Maximum number of atlas volumes kept in memory
    #[arg(long, global = true)]
    max_cached_atlases: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve every row of a cell table and write a dated region table
    Resolve(ResolveArgs),
    /// Look up a single coordinate in one atlas
    Lookup(LookupArgs),
    /// List installed atlases
    Atlases,
    /// Serve the lookup API over HTTP
    Serve(ServeArgs),
}

/// Coordinate scaling options shared by `resolve` and `lookup`
#[derive(Args, Debug)]
struct ScaleArgs {
    /// Rounding applied when scaling to voxel indices (half-even, half-up)
    #[arg(long)]
    rounding: Option<RoundingMode>,

    /// Report the ancestor at this ontology depth instead of the leaf region
    #[arg(long)]
    hierarchy_level: Option<usize>,
}

#[derive(Args, Debug)]
struct ResolveArgs {
    /// Input CSV with one row per cell
    input: PathBuf,

    /// Atlas to resolve against, e.g. allen_mouse_10um (repeatable)
    #[arg(short, long = "atlas", required = true)]
    atlases: Vec<AtlasResolution>,

    /// Directory for the output table
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output file name prefix
    #[arg(long)]
    prefix: Option<String>,

    /// Voxel size (um) the input coordinates are expressed in (default 10)
    #[arg(long, conflicts_with = "microns")]
    source_resolution: Option<f64>,

    /// Input coordinates are in microns
    #[arg(long)]
    microns: bool,

    /// Run date stamped into the output name (defaults to today)
    #[arg(long)]
    date: Option<NaiveDate>,

    #[arg(long)]
    ap_column: Option<String>,
    #[arg(long)]
    dv_column: Option<String>,
    #[arg(long)]
    ml_column: Option<String>,

    /// Column copied through to the output next to the row index
    #[arg(long)]
    id_column: Option<String>,

    #[command(flatten)]
    scale: ScaleArgs,
}

#[derive(Args, Debug)]
struct LookupArgs {
    /// Atlas to query, e.g. kim_mouse_25um
    #[arg(short, long)]
    atlas: AtlasResolution,

    #[arg(allow_negative_numbers = true)]
    ap: f64,
    #[arg(allow_negative_numbers = true)]
    dv: f64,
    #[arg(allow_negative_numbers = true)]
    ml: f64,

    /// Coordinates are in microns rather than atlas voxels
    #[arg(long)]
    microns: bool,

    #[command(flatten)]
    scale: ScaleArgs,
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[arg(long)]
    host: Option<String>,
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ccf_resolver=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(dir) = cli.atlas_dir {
        config.atlas.atlas_dir = dir;
    }
    if let Some(max) = cli.max_cached_atlases {
        config.atlas.max_cached_atlases = max;
    }

    match cli.command {
        Command::Resolve(args) => run_resolve(config, args).await,
        Command::Lookup(args) => run_lookup(config, args).await,
        Command::Atlases => run_atlases(config).await,
        Command::Serve(args) => run_serve(config, args).await,
    }
}

fn atlas_service(config: &Config) -> Result<LocalAtlasService> {
    LocalAtlasService::new(&config.atlas).with_context(|| {
        format!(
            "Failed to open atlas directory {:?}",
            config.atlas.atlas_dir
        )
    })
}

fn apply_scale(config: &mut Config, scale: &ScaleArgs) {
    if let Some(rounding) = scale.rounding {
        config.resolver.rounding = rounding;
    }
    if let Some(level) = scale.hierarchy_level {
        config.resolver.hierarchy_level = Some(level);
    }
}

async fn run_resolve(mut config: Config, args: ResolveArgs) -> Result<()> {
    apply_scale(&mut config, &args.scale);
    if args.microns {
        config.resolver.source_resolution_um = 1.0;
    } else if let Some(um) = args.source_resolution {
        config.resolver.source_resolution_um = um;
    }
    if let Some(dir) = args.output_dir {
        config.output.output_dir = dir;
    }
    if let Some(prefix) = args.prefix {
        config.output.prefix = prefix;
    }
    if let Some(ap) = args.ap_column {
        config.columns.ap = ap;
    }
    if let Some(dv) = args.dv_column {
        config.columns.dv = dv;
    }
    if let Some(ml) = args.ml_column {
        config.columns.ml = ml;
    }
    if args.id_column.is_some() {
        config.columns.id = args.id_column;
    }

    let service = atlas_service(&config)?;
    let job = ResolveJob {
        input: args.input,
        atlases: args.atlases,
        columns: config.columns,
        output: config.output,
        resolver: config.resolver,
        date: args.date.unwrap_or_else(|| Local::now().date_naive()),
    };

    let report = pipeline::run(&job, &service)
        .await
        .with_context(|| format!("Failed to resolve {:?}", job.input))?;

    println!("{}", report.output.display());
    if report.rows_skipped > 0 {
        eprintln!("{} malformed rows skipped", report.rows_skipped);
    }
    Ok(())
}

async fn run_lookup(mut config: Config, args: LookupArgs) -> Result<()> {
    apply_scale(&mut config, &args.scale);

    let point = Point3D::new(args.ap, args.dv, args.ml);
    if !point.is_finite() {
        bail!("Coordinates must be finite numbers");
    }

    let service = atlas_service(&config)?;
    let volume = service
        .load(&args.atlas)
        .await
        .with_context(|| format!("Failed to load atlas {}", args.atlas))?;

    let region = volume.structure_from_coords(
        &point,
        args.microns,
        config.resolver.rounding,
        config.resolver.hierarchy_level,
    );
    println!("{}", serde_json::to_string_pretty(&region)?);
    Ok(())
}

async fn run_atlases(config: Config) -> Result<()> {
    let service = atlas_service(&config)?;
    let atlases = service.list_atlases().await?;

    if atlases.is_empty() {
        eprintln!("No atlases installed in {:?}", config.atlas.atlas_dir);
    }
    for item in atlases {
        match item.version {
            Some(version) => println!("{}\tv{}\t{}", item.id, version, item.path.display()),
            None => println!("{}\t-\t{}", item.id, item.path.display()),
        }
    }
    Ok(())
}

async fn run_serve(mut config: Config, args: ServeArgs) -> Result<()> {
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    // Must be installed before any metric is recorded
    let prometheus = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    let service = atlas_service(&config)?;
    info!(
        "Serving atlases from {:?} (cache size {})",
        config.atlas.atlas_dir, config.atlas.max_cached_atlases
    );

    let state = AppState::new(Arc::new(service), config.resolver.clone());
    let app = app(state).merge(metrics_routes(prometheus));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid listen address")?;
    info!("CCF resolver listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Endpoint exposing metrics in Prometheus format
async fn prometheus_metrics(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}

fn metrics_routes(handle: PrometheusHandle) -> Router {
    Router::new()
        .route("/metrics/prometheus", get(prometheus_metrics))
        .with_state(handle)
}
