mod config;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{HttpStoryService, MutationCoordinator, StoryAction};
use shared::{
    domain::{ListKind, StoryId, Username},
    protocol::NewStory,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{load_settings, Settings};

#[derive(Parser, Debug)]
#[command(name = "storyboard", about = "Browse, submit and favorite stories")]
struct Args {
    #[arg(long, global = true)]
    server_url: Option<String>,
    #[arg(long, global = true)]
    username: Option<String>,
    #[arg(long, global = true)]
    password: Option<String>,
    #[arg(long, global = true)]
    token: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Every story, newest first.
    List,
    /// Stories submitted by the signed-in user.
    Mine,
    Favorites,
    Submit {
        #[arg(long)]
        title: String,
        #[arg(long)]
        author: String,
        #[arg(long)]
        url: String,
    },
    Delete {
        story_id: String,
    },
    /// Toggle the favorite mark on a story.
    Favorite {
        story_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let settings = load_settings()?.with_overrides(
        args.server_url.clone(),
        args.username.clone(),
        args.token.clone(),
    );
    let service = HttpStoryService::new(&settings.server_url)
        .with_context(|| format!("invalid server url '{}'", settings.server_url))?;
    info!(server_url = %service.base_url(), "storyboard: using story service");

    let coordinator = MutationCoordinator::new(Arc::new(service));
    coordinator.start().await.context("failed to load stories")?;
    sign_in(&coordinator, &settings, args.password.as_deref()).await?;

    let view = run_command(&coordinator, args.command).await?;
    println!("{}", coordinator.render(view).await);
    Ok(())
}

async fn sign_in(
    coordinator: &MutationCoordinator,
    settings: &Settings,
    password: Option<&str>,
) -> Result<()> {
    let Some(username) = settings.username.as_deref() else {
        return Ok(());
    };
    if let Some(password) = password {
        coordinator
            .login(username, password)
            .await
            .with_context(|| format!("login failed for '{username}'"))?;
    } else if let Some(token) = settings.token.clone() {
        coordinator
            .restore(Username::new(username), token)
            .await
            .with_context(|| format!("stored token for '{username}' was rejected"))?;
    }
    Ok(())
}

async fn run_command(coordinator: &MutationCoordinator, command: Command) -> Result<ListKind> {
    let needs_user = !matches!(command, Command::List);
    if needs_user && coordinator.session().user().await.is_none() {
        bail!("this command needs --username with --password or --token");
    }

    let view = match command {
        Command::List => ListKind::AllStories,
        Command::Mine => {
            coordinator.show_own_stories().await?;
            ListKind::OwnStories
        }
        Command::Favorites => {
            coordinator.show_favorites().await?;
            ListKind::Favorites
        }
        Command::Submit { title, author, url } => {
            let outcome = coordinator
                .dispatch(StoryAction::Submit(NewStory::new(title, author, url)))
                .await?;
            info!(?outcome, "storyboard: story submitted");
            ListKind::AllStories
        }
        Command::Delete { story_id } => {
            let outcome = coordinator
                .dispatch(StoryAction::Delete(StoryId::new(story_id)))
                .await?;
            info!(?outcome, "storyboard: story deleted");
            ListKind::OwnStories
        }
        Command::Favorite { story_id } => {
            let outcome = coordinator
                .dispatch(StoryAction::ToggleFavorite(StoryId::new(story_id)))
                .await?;
            info!(?outcome, "storyboard: favorite toggled");
            ListKind::AllStories
        }
    };
    Ok(view)
}
