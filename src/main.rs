use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use recoboard::cache::CacheSource;
use recoboard::config::{Config, LoggingConfig};
use recoboard::reco::{ItemCollection, Media, NewRecommendation, RecoClient, RecoId, UserId};

#[derive(Parser, Debug)]
#[command(name = "recoboard")]
#[command(about = "Browse and vote on shared manga and anime recommendations")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/recoboard/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// GraphQL endpoint, overriding the config file
  #[arg(short, long, global = true)]
  endpoint: Option<String>,

  /// User whose view to show and act as
  #[arg(short, long, global = true)]
  user: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List every recommendation
  List,
  /// Toggle your upvote on a recommendation
  Upvote { id: String },
  /// Recommend something new
  Create {
    #[arg(short, long)]
    name: String,
    #[arg(short, long)]
    link: Option<String>,
    #[arg(short, long, default_value = "other")]
    media: Media,
  },
  /// Delete a recommendation
  Delete { id: String },
}

fn init_logging(logging: &LoggingConfig) -> Result<WorkerGuard> {
  let filter = EnvFilter::try_from_default_env()
    .or_else(|_| EnvFilter::try_new(&logging.level))
    .map_err(|e| eyre!("Invalid log filter {}: {}", logging.level, e))?;

  let (writer, guard) = match &logging.file {
    Some(path) => {
      let dir = path.parent().filter(|d| !d.as_os_str().is_empty());
      let name = path
        .file_name()
        .ok_or_else(|| eyre!("Invalid log file: {}", path.display()))?;
      let appender = tracing_appender::rolling::never(dir.unwrap_or(Path::new(".")), name);
      tracing_appender::non_blocking(appender)
    }
    None => tracing_appender::non_blocking(std::io::stderr()),
  };

  Registry::default()
    .with(fmt::Layer::default().compact().with_writer(writer))
    .with(filter)
    .try_init()
    .map_err(|e| eyre!("Failed to install log subscriber: {}", e))?;

  Ok(guard)
}

fn print_items(items: &ItemCollection, source: Option<CacheSource>) {
  if source == Some(CacheSource::Offline) {
    println!("(offline, showing cached list)");
  }
  if items.is_empty() {
    println!("No recommendations yet.");
    return;
  }

  for item in items {
    let mark = if item.is_upvoted_by { "*" } else { " " };
    let link = item.link.as_deref().unwrap_or("");
    println!(
      "{mark}{:>4}  {:<12} {:<6} {}  {}  (by {})",
      item.upvote_count,
      item.id.as_str(),
      item.media.to_string(),
      item.name,
      link,
      item.created_by
    );
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?.with_overrides(args.endpoint);

  let _guard = init_logging(&config.logging)?;

  let user = args
    .user
    .or_else(|| config.default_user.clone())
    .map(UserId::new)
    .ok_or_else(|| eyre!("No user given. Pass --user or set default_user in the config file."))?;

  let client = RecoClient::from_config(&config)?;
  let listed = client.get_items(&user).await?;

  match args.command {
    Command::List => {
      print_items(&listed.data, Some(listed.source));
      return Ok(());
    }
    Command::Upvote { id } => {
      let item = listed
        .data
        .get(&id)
        .cloned()
        .ok_or_else(|| eyre!("No recommendation with id {}", id))?;
      let confirmed = client.toggle_upvote(&user, &item)?.wait().await?;
      let verb = if confirmed.is_upvoted_by { "Upvoted" } else { "Removed upvote from" };
      println!("{verb} {} ({} votes)", confirmed.name, confirmed.upvote_count);
    }
    Command::Create { name, link, media } => {
      let fields = NewRecommendation { name, link, media };
      let created = client.create_item(&user, fields)?.wait().await?;
      println!("Created {} as {}", created.name, created.id);
    }
    Command::Delete { id } => {
      let deleted = client.delete_item(&user, &RecoId::new(id))?.wait().await?;
      println!("Deleted {deleted}");
    }
  }

  print_items(&client.cached_items(&user)?, None);
  Ok(())
}
