//! # Rusty-Board CLI
//!
//! Assembles the hybrid data layer from configuration and exposes the board
//! and user-management operations as subcommands.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use auth_adapters::SimpleAuthProvider;
use clap::{Parser, Subcommand};
use configs::{AppConfig, LoggingSection, RemoteBackend};
use domains::{AuthUser, DocumentStore, KeyValueStore, NewPost, Post, PostId, Role, UserProfile};
use services::{
    BoardSettings, HybridBoardManager, InitSequencer, LocalCache, ProfileService, RetryPolicy,
    Session, DEFAULT_RECENT_LIMIT,
};
use storage_adapters::{FileKeyValueStore, MemoryDocumentStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rusty-board", version, about = "PM community boards over a hybrid remote/local store")]
struct Cli {
    /// TOML configuration file; environment variables override it
    #[arg(long, short, env = "RUSTY_BOARD_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the board catalog
    Boards,
    /// Posts of one board, newest first
    List { board: String },
    /// Newest posts across every board
    Recent {
        #[arg(long, default_value_t = DEFAULT_RECENT_LIMIT)]
        limit: usize,
    },
    /// Add a post
    Post {
        board: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        author: Option<String>,
        /// Check the write against this role first
        #[arg(long, value_parser = parse_role)]
        as_role: Option<Role>,
    },
    /// Delete a post
    Delete {
        board: String,
        post_id: String,
        /// The id was assigned by the remote store; otherwise it must be numeric
        #[arg(long)]
        remote: bool,
        #[arg(long, value_parser = parse_role)]
        as_role: Role,
    },
    /// List user profiles, acting as the profile with `as_uid`
    Users {
        #[arg(long)]
        as_uid: String,
    },
    /// Change a user's role, acting as the profile with `as_uid`
    Role {
        uid: String,
        #[arg(value_parser = parse_role)]
        role: Role,
        #[arg(long)]
        as_uid: String,
    },
}

fn parse_role(raw: &str) -> Result<Role, String> {
    Ok(Role::parse(raw))
}

fn parse_post_id(raw: &str, remote: bool) -> anyhow::Result<PostId> {
    if remote {
        return Ok(PostId::Remote(raw.to_string()));
    }
    raw.parse::<i64>()
        .map(PostId::Local)
        .with_context(|| format!("local post ids are numeric; pass --remote for `{raw}`"))
}

fn init_tracing(logging: &LoggingSection) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[cfg(feature = "db-postgres")]
async fn postgres_store(config: &AppConfig) -> Option<Arc<dyn DocumentStore>> {
    use secrecy::ExposeSecret;
    use storage_adapters::PgDocumentStore;

    let url = config.remote.database_url.as_ref()?;
    match PgDocumentStore::connect(url.expose_secret(), config.init.probe_timeout()).await {
        Ok(store) => Some(Arc::new(store)),
        Err(err) => {
            warn!(error = %err, "postgres unavailable, continuing with the local cache");
            None
        }
    }
}

#[cfg(not(feature = "db-postgres"))]
async fn postgres_store(_config: &AppConfig) -> Option<Arc<dyn DocumentStore>> {
    warn!("built without the db-postgres feature, continuing with the local cache");
    None
}

async fn remote_store(config: &AppConfig) -> Option<Arc<dyn DocumentStore>> {
    match config.remote.backend {
        RemoteBackend::None => None,
        RemoteBackend::Memory => Some(Arc::new(MemoryDocumentStore::new())),
        RemoteBackend::Postgres => postgres_store(config).await,
    }
}

struct App {
    manager: HybridBoardManager,
    /// Present only with a remote backend; profiles live in its users collection
    profiles: Option<ProfileService>,
}

impl App {
    fn profiles(&self) -> anyhow::Result<&ProfileService> {
        self.profiles
            .as_ref()
            .context("user management needs a remote backend (remote.backend)")
    }
}

async fn build_app(config: &AppConfig) -> App {
    let mut kv = FileKeyValueStore::new(&config.cache.dir);
    if let Some(quota) = config.cache.quota_bytes {
        kv = kv.with_quota(quota);
    }
    let kv: Arc<dyn KeyValueStore> = Arc::new(kv);
    let cache = LocalCache::new(kv, config.cache.snapshot_key.clone());

    // No persisted sessions: identity resolves to "signed out" immediately.
    let auth = Arc::new(SimpleAuthProvider::new());
    auth.mark_ready();

    let settings = BoardSettings {
        posts_collection: config.remote.posts_collection.clone(),
        ready_timeout: config.init.ready_timeout(),
        probe_timeout: config.init.probe_timeout(),
    };
    let policy = RetryPolicy {
        max_attempts: config.retry.max_attempts,
        base_delay: config.retry.base_delay(),
    };

    let mut manager = HybridBoardManager::new(settings, policy, cache)
        .with_sequencer(Arc::new(InitSequencer::new(auth)));
    let remote = remote_store(config).await;
    if let Some(store) = &remote {
        manager = manager.with_remote(Arc::clone(store));
    }
    let profiles = remote.map(|store| {
        ProfileService::new(
            store,
            manager.executor(),
            config.remote.users_collection.clone(),
            config.auth.supervisor_email.clone(),
        )
    });
    App { manager, profiles }
}

/// Resolves `uid` the way a sign-in would, including the supervisor backfill.
async fn acting_profile(profiles: &ProfileService, uid: &str) -> anyhow::Result<UserProfile> {
    let stored = profiles
        .get_profile(uid)
        .await
        .with_context(|| format!("no profile for {uid}"))?;
    let user = AuthUser {
        uid: stored.uid,
        email: stored.email,
    };
    match profiles.resolve_session(Some(&user)).await {
        Session::Ready(profile) => Ok(profile),
        _ => anyhow::bail!("no profile for {uid}"),
    }
}

fn print_users(users: &[UserProfile]) {
    for user in users {
        println!("{:<11} {:<28} {} ({})", user.role, user.email, user.display_name(), user.uid);
    }
}

fn print_posts(posts: &[Post]) {
    if posts.is_empty() {
        println!("(no posts)");
        return;
    }
    for post in posts {
        println!(
            "{}  {:<12} [{}] {} ({})",
            post.created_at.format("%Y-%m-%d %H:%M"),
            post.board_id,
            post.id,
            post.title,
            post.author
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    init_tracing(&config.logging);

    let app = build_app(&config).await;
    let manager = &app.manager;
    let mode = manager.initialize().await;
    info!(%mode, backend = ?config.remote.backend, "rusty-board ready");

    match cli.command {
        Command::Boards => {
            for board in manager.boards() {
                println!("{:<16} {}", board.id, board.name);
            }
        }
        Command::List { board } => {
            println!("# {}", manager.get_board_name(&board));
            print_posts(&manager.get_posts(&board).await);
        }
        Command::Recent { limit } => print_posts(&manager.get_recent_posts(limit).await),
        Command::Post {
            board,
            title,
            content,
            source,
            author,
            as_role,
        } => {
            let mut new_post = NewPost::new(title, content);
            new_post.source = source;
            new_post.author = author;
            let post = match as_role {
                Some(role) => manager.add_post_as(role, &board, new_post).await?,
                None => manager.add_post(&board, new_post).await?,
            };
            println!("created {} on {}", post.id, post.board_id);
        }
        Command::Delete {
            board,
            post_id,
            remote,
            as_role,
        } => {
            let id = parse_post_id(&post_id, remote)?;
            manager.delete_post(as_role, &id, &board).await?;
            println!("deleted {id} from {board}");
        }
        Command::Users { as_uid } => {
            let profiles = app.profiles()?;
            let actor = acting_profile(profiles, &as_uid).await?;
            print_users(&profiles.list_users(&actor).await?);
        }
        Command::Role { uid, role, as_uid } => {
            let profiles = app.profiles()?;
            let actor = acting_profile(profiles, &as_uid).await?;
            let updated = profiles.change_role(&actor, &uid, role).await?;
            println!("{} is now {}", updated.email, updated.role);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn roles_parse_leniently() {
        let cli = Cli::try_parse_from([
            "rusty-board",
            "delete",
            "news",
            "42",
            "--as-role",
            "Admin",
        ])
        .unwrap();
        match cli.command {
            Command::Delete {
                as_role,
                post_id,
                remote,
                ..
            } => {
                assert_eq!(as_role, Role::Admin);
                assert_eq!(parse_post_id(&post_id, remote).unwrap(), PostId::Local(42));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn post_ids_are_never_guessed() {
        assert_eq!(
            parse_post_id("1734652800000", true).unwrap(),
            PostId::Remote("1734652800000".to_string())
        );
        assert_eq!(parse_post_id("17", false).unwrap(), PostId::Local(17));
        assert!(parse_post_id("abc123", false).is_err());
    }

    #[test]
    fn role_command_parses() {
        let cli =
            Cli::try_parse_from(["rusty-board", "role", "u-2", "core", "--as-uid", "u-1"]).unwrap();
        match cli.command {
            Command::Role { uid, role, as_uid } => {
                assert_eq!(uid, "u-2");
                assert_eq!(role, Role::Core);
                assert_eq!(as_uid, "u-1");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    fn config_in(dir: &std::path::Path, remote: &str) -> AppConfig {
        AppConfig::from_toml_str(&format!(
            "[cache]\ndir = {:?}\n\n[remote]\n{remote}\n\n[auth]\nsupervisor_email = \"owner@example.com\"\n",
            dir.display().to_string()
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn profiles_follow_the_configured_supervisor() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path(), "backend = \"memory\"\nusers_collection = \"members\"");
        let app = build_app(&config).await;
        app.manager.initialize().await;
        let profiles = app.profiles().unwrap();

        let owner = AuthUser {
            uid: "u-1".to_string(),
            email: "Owner@Example.com".to_string(),
        };
        let kim = AuthUser {
            uid: "u-2".to_string(),
            email: "kim@example.com".to_string(),
        };
        let created = profiles
            .create_profile(&owner, Default::default())
            .await
            .unwrap();
        assert_eq!(created.role, Role::Supervisor);
        profiles.create_profile(&kim, Default::default()).await.unwrap();

        let actor = acting_profile(profiles, "u-1").await.unwrap();
        let updated = profiles.change_role(&actor, "u-2", Role::Admin).await.unwrap();
        assert_eq!(updated.role, Role::Admin);
        assert_eq!(profiles.list_users(&actor).await.unwrap().len(), 2);
        assert!(acting_profile(profiles, "missing").await.is_err());
    }

    #[tokio::test]
    async fn user_management_needs_a_remote_backend() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path(), "backend = \"none\"");
        let app = build_app(&config).await;
        assert!(app.profiles().is_err());
    }
}
