use std::{future::Future, io, sync::Arc};

use activation::{spawn_scene_watcher, ActivationController, SceneTracker};
use anyhow::{anyhow, Context, Result};
use chat::{spawn_intake, ChatLogin, ChatTransport, TwitchChat, TwitchChatOptions, VALIDATE_URL};
use clap::Parser;
use scene_client::{ObsClient, ObsConnectOptions, SceneTransport};
use tokio::task::JoinHandle;
use tracing::{info, warn};

mod cli;
mod config;
mod logging;
mod shutdown;
mod triggers;

use cli::Args;
use config::{load_settings, Settings};
use shutdown::or_shutdown;
use triggers::build_router;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present so clap can pick up env vars.
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    logging::init_tracing(args.quiet, args.no_color);

    let settings = load_settings(&args)?;
    let mut shutdown = Box::pin(tokio::signal::ctrl_c());
    let mut running = Running::default();
    let outcome = run(&settings, &mut shutdown, &mut running).await;
    running.release().await;
    outcome
}

/// Everything started so far, released in reverse order on the way out.
#[derive(Default)]
struct Running {
    obs: Option<Arc<ObsClient>>,
    watcher: Option<JoinHandle<()>>,
    chat: Option<Arc<TwitchChat>>,
    intake: Option<JoinHandle<()>>,
}

impl Running {
    async fn release(self) {
        if let Some(intake) = self.intake {
            intake.abort();
        }
        if let Some(chat) = self.chat {
            chat.stop().await;
        }
        if let Some(watcher) = self.watcher {
            watcher.abort();
        }
        if let Some(obs) = self.obs {
            obs.close();
        }
    }
}

async fn run<S>(settings: &Settings, shutdown: &mut S, running: &mut Running) -> Result<()>
where
    S: Future<Output = io::Result<()>> + Unpin,
{
    let mut obs_options = ObsConnectOptions::new(&settings.obs_url, settings.obs_password.clone());
    obs_options.request_timeout = settings.obs_request_timeout;
    let connect = async {
        ObsClient::connect_with_retry(obs_options, settings.retry)
            .await
            .with_context(|| format!("failed to connect to OBS at {}", settings.obs_url))
    };
    let Some(obs) = or_shutdown(connect, shutdown).await? else {
        return Ok(());
    };
    let obs = Arc::new(obs);
    running.obs = Some(obs.clone());

    let scene = SceneTracker::new();
    let scene_events = obs.subscribe_events();
    let refresh = async {
        scene
            .refresh(obs.as_ref())
            .await
            .context("failed to read the current program scene")
    };
    if or_shutdown(refresh, shutdown).await?.is_none() {
        return Ok(());
    }
    running.watcher = Some(spawn_scene_watcher(scene.clone(), obs.clone(), scene_events));

    let controller = Arc::new(ActivationController::new(
        obs.clone(),
        scene,
        settings.managed_objects.clone(),
    ));
    let router = Arc::new(build_router(&settings.triggers, &controller)?);

    let login = match &settings.twitch_oauth_token {
        Some(token) => {
            let http = reqwest::Client::new();
            let validate = async {
                let app_id = settings.twitch_app_id.as_deref();
                ChatLogin::from_token(&http, VALIDATE_URL, token, app_id)
                    .await
                    .context("twitch token validation failed")
            };
            let Some(login) = or_shutdown(validate, shutdown).await? else {
                return Ok(());
            };
            login
        }
        None => {
            warn!("bridge: no oauth token configured; reading chat anonymously");
            ChatLogin::anonymous()
        }
    };
    let chat = Arc::new(TwitchChat::new(TwitchChatOptions::new(login)));
    running.chat = Some(chat.clone());
    let intake = running.intake.insert(spawn_intake(
        router.clone(),
        chat.clone(),
        settings.twitch_channel.clone(),
    ));

    let start = async { chat.start().await.context("failed to log in to Twitch chat") };
    if or_shutdown(start, shutdown).await?.is_none() {
        return Ok(());
    }
    info!(
        channel = %settings.twitch_channel,
        objects = settings.managed_objects.len(),
        triggers = router.len(),
        "bridge: running; press Ctrl-C to stop"
    );

    let lost = async move {
        let _ = intake.await;
        Err::<(), _>(anyhow!("chat connection lost"))
    };
    or_shutdown(lost, shutdown).await.map(|_| ())
}
