use dotenvy::dotenv;
use std::sync::Arc;
use std::time::Duration;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};
use unigif::bot::handlers::{self, Command};
use unigif::config::{Settings, JANITOR_INTERVAL_SECS, STALE_AFTER_SECS};
use unigif::pipeline::temp::{self, TempPool};
use unigif::pipeline::Pipeline;

#[tokio::main]
async fn main() {
    // Load .env file
    dotenv().ok();

    init_logging();

    info!("Starting UniGif relay bot...");

    // Load settings
    let settings = init_settings();

    // Open the staging pool and its janitor
    let pool = init_temp_pool(&settings).await;
    let janitor_shutdown = CancellationToken::new();
    tokio::spawn(temp::run_janitor(
        pool.clone(),
        Duration::from_secs(JANITOR_INTERVAL_SECS),
        Duration::from_secs(STALE_AFTER_SECS),
        janitor_shutdown.clone(),
    ));

    // Initialize the pipeline
    let pipeline = Arc::new(Pipeline::new(pool, settings.ffmpeg_path.clone()));

    // Initialize Bot
    let bot = Bot::new(settings.telegram_token.clone());

    // Setup handlers
    let handler = setup_handler();

    info!("Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![settings, pipeline])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    janitor_shutdown.cancel();
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_settings() -> Arc<Settings> {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            Arc::new(s)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

async fn init_temp_pool(settings: &Settings) -> TempPool {
    match TempPool::new(settings.temp_dir.as_str()).await {
        Ok(pool) => {
            info!(dir = %pool.dir().display(), "Temp pool ready.");
            pool
        }
        Err(e) => {
            error!("Failed to create temp directory: {}", e);
            std::process::exit(1);
        }
    }
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry().branch(
        Update::filter_message()
            .branch(
                dptree::entry()
                    .filter_command::<Command>()
                    .endpoint(handle_command),
            )
            .branch(
                Update::filter_message()
                    .filter(|msg: Message| msg.photo().is_some())
                    .endpoint(handle_photo),
            )
            .branch(
                Update::filter_message()
                    .filter(|msg: Message| msg.video().is_some())
                    .endpoint(handle_video),
            )
            .branch(
                Update::filter_message()
                    .filter(|msg: Message| {
                        msg.text().is_some_and(|t| t.trim().starts_with("http"))
                    })
                    .endpoint(handle_link),
            ),
    )
}

async fn handle_command(bot: Bot, msg: Message, cmd: Command) -> Result<(), teloxide::RequestError> {
    let res = match cmd {
        Command::Start | Command::Help => handlers::start(bot, msg).await,
    };
    if let Err(e) = res {
        error!("Command error: {}", e);
    }
    respond(())
}

async fn handle_photo(
    bot: Bot,
    msg: Message,
    pipeline: Arc<Pipeline>,
    settings: Arc<Settings>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::handle_photo(bot, msg, pipeline, settings).await {
        error!("Photo handler error: {}", e);
    }
    respond(())
}

async fn handle_video(
    bot: Bot,
    msg: Message,
    pipeline: Arc<Pipeline>,
    settings: Arc<Settings>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::handle_video(bot, msg, pipeline, settings).await {
        error!("Video handler error: {}", e);
    }
    respond(())
}

async fn handle_link(
    bot: Bot,
    msg: Message,
    pipeline: Arc<Pipeline>,
    settings: Arc<Settings>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::handle_link(bot, msg, pipeline, settings).await {
        error!("Link handler error: {}", e);
    }
    respond(())
}
