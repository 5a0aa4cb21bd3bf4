use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use skein_action::RouteId;
use skein_config::{EngineConfig, load_routes};
use skein_engine::{Engine, EngineSettings, WorkerBlueprint, seed_actions};
use skein_events::TracingListener;
use skein_fetch::{DEFAULT_USER_AGENT, HttpFetcher, RenderServiceFetcher, StrategyFetcher};
use skein_route::{RouteRegistry, SelectorRoute};
use skein_store::{ActionFilter, ActionStore, SqliteStore};

/// Skein - a priority-scheduled web crawl orchestrator
#[derive(Parser)]
#[command(name = "skein")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.skein)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  /// Route definitions file (JSON)
  #[arg(long, global = true, default_value = "routes.json")]
  routes: PathBuf,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Run the worker pool until interrupted
  Run {
    /// Engine configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of generic workers
    #[arg(long)]
    workers: Option<usize>,

    /// Render every page dynamically
    #[arg(long)]
    force_dynamic: bool,

    /// Rendering service endpoint for dynamic pages
    #[arg(long)]
    render_endpoint: Option<String>,

    /// Failed executions before an action is given up (0 = never)
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Log every engine event
    #[arg(long, short)]
    verbose: bool,
  },

  /// Insert seed actions for a route
  Seed {
    #[arg(long)]
    provider: String,

    #[arg(long)]
    route: String,

    /// Query for a seed action (repeatable)
    #[arg(long = "query", required = true)]
    queries: Vec<String>,

    /// Priority (default: the route's)
    #[arg(long)]
    priority: Option<i64>,
  },

  /// Show queue counts
  Status,
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".skein"),
  };

  match cli.command {
    Some(Commands::Run {
      config,
      workers,
      force_dynamic,
      render_endpoint,
      max_attempts,
      verbose,
    }) => {
      let mut config = match config {
        Some(path) => EngineConfig::load(&path)
          .with_context(|| format!("failed to load config: {}", path.display()))?,
        None => EngineConfig::default(),
      }
      .with_env();

      if let Some(workers) = workers {
        config.workers = workers;
      }
      if let Some(endpoint) = render_endpoint {
        config.fetch.render_endpoint = Some(endpoint);
      }
      if let Some(max_attempts) = max_attempts {
        config.max_attempts = max_attempts;
      }
      config.force_dynamic |= force_dynamic;
      config.verbose |= verbose;
      config.validate().context("invalid configuration")?;

      init_tracing(config.verbose);
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(async { run(config, &cli.routes, &data_dir).await })
    }
    Some(Commands::Seed {
      provider,
      route,
      queries,
      priority,
    }) => {
      init_tracing(false);
      let rt = tokio::runtime::Runtime::new()?;
      let route = RouteId::new(provider, route);
      rt.block_on(async { seed(&cli.routes, &data_dir, &route, queries, priority).await })
    }
    Some(Commands::Status) => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(async { status(&data_dir).await })
    }
    None => {
      println!("skein - use --help to see available commands");
      Ok(())
    }
  }
}

fn init_tracing(verbose: bool) {
  let level = if verbose {
    tracing::Level::DEBUG
  } else {
    tracing::Level::INFO
  };

  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
    .with_target(false)
    .init();
}

async fn open_store(data_dir: &Path) -> Result<Arc<SqliteStore>> {
  tokio::fs::create_dir_all(data_dir)
    .await
    .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

  let db_path = data_dir.join("skein.db");
  let url = format!("sqlite://{}", db_path.display());
  let store = SqliteStore::connect(&url)
    .await
    .with_context(|| format!("failed to open store: {}", db_path.display()))?;
  Ok(Arc::new(store))
}

fn load_registry(routes_file: &Path) -> Result<RouteRegistry> {
  let defs = load_routes(routes_file)
    .with_context(|| format!("failed to load routes: {}", routes_file.display()))?;

  let mut builder = RouteRegistry::builder();
  for def in defs {
    let name = format!("{}:{}", def.provider, def.name);
    let route = SelectorRoute::compile(def).with_context(|| format!("invalid route {}", name))?;
    builder = builder.register(route)?;
  }
  Ok(builder.build())
}

fn build_fetcher(config: &EngineConfig) -> Result<StrategyFetcher> {
  let fetch = &config.fetch;
  let user_agent = fetch.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT);

  let http = HttpFetcher::new(fetch.timeout(), user_agent).context("failed to build http client")?;
  let mut fetcher = StrategyFetcher::new(Arc::new(http)).force_dynamic(config.force_dynamic);

  if let Some(endpoint) = &fetch.render_endpoint {
    let renderer = RenderServiceFetcher::new(endpoint, fetch.timeout(), user_agent)
      .context("failed to configure rendering service")?;
    fetcher = fetcher.with_renderer(Arc::new(renderer));
  }

  Ok(fetcher)
}

async fn run(config: EngineConfig, routes_file: &Path, data_dir: &Path) -> Result<()> {
  let routes = load_registry(routes_file)?;
  info!(routes = routes.len(), "loaded routes");

  let store = open_store(data_dir).await?;
  let fetcher = build_fetcher(&config)?;

  let mut builder =
    Engine::builder(routes, store, Arc::new(fetcher)).settings(EngineSettings::from(&config));
  for blueprint in &config.blueprints {
    builder = builder.blueprint(WorkerBlueprint::from_config(&config, blueprint));
  }
  if config.verbose {
    builder = builder.listener(Arc::new(TracingListener));
  }
  let engine = builder.build();

  engine.start().await;
  tokio::signal::ctrl_c()
    .await
    .context("failed to listen for ctrl-c")?;
  info!("interrupt received, waiting for in-flight actions");
  engine.stop().await;

  Ok(())
}

async fn seed(
  routes_file: &Path,
  data_dir: &Path,
  route: &RouteId,
  queries: Vec<String>,
  priority: Option<i64>,
) -> Result<()> {
  let routes = load_registry(routes_file)?;
  let store = open_store(data_dir).await?;

  let seeded = seed_actions(store.as_ref(), &routes, route, queries, priority)
    .await
    .context("failed to seed actions")?;

  for action in seeded {
    println!("{}", serde_json::to_string(&action)?);
  }
  Ok(())
}

async fn status(data_dir: &Path) -> Result<()> {
  let store = open_store(data_dir).await?;

  let all = ActionFilter {
    include_failed: true,
    ..ActionFilter::default()
  };
  let finished = ActionFilter {
    finished: Some(true),
    ..all.clone()
  };

  let total = store.count(&all).await?;
  let finished = store.count(&finished).await?;
  let pending = store.count(&ActionFilter::unfinished()).await?;
  let failed = total.saturating_sub(finished + pending);

  println!(
    "{}",
    serde_json::to_string_pretty(&serde_json::json!({
      "total": total,
      "pending": pending,
      "finished": finished,
      "failed": failed,
    }))?
  );
  Ok(())
}
