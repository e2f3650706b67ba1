use std::error::Error;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use quiz_core::model::{QuizMode, ScreenSize, SessionId, StartRequest};
use services::{ApiConfig, HttpQuizClient, StatsApi};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use url::Url;

mod play;
mod render;

/// Terminal client for the cephalometric quiz.
#[derive(Parser, Debug)]
#[command(name = "quiz", version, about, long_about = None)]
struct Cli {
    /// Quiz service base URL (defaults to QUIZ_SERVICE_URL or localhost)
    #[arg(long)]
    quiz_url: Option<Url>,

    /// Stats service base URL (defaults to STATS_SERVICE_URL or localhost)
    #[arg(long)]
    stats_url: Option<Url>,

    /// Bearer token sent with every request
    #[arg(long, env = "QUIZ_ACCESS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Log filter, e.g. `info` or `services=debug`
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    log: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a session and answer questions interactively
    Play {
        /// classic, educational or time_limited
        #[arg(long, default_value_t = QuizMode::Classic)]
        mode: QuizMode,

        /// Code handed out for a supervised test
        #[arg(long)]
        test_code: Option<String>,

        #[arg(long, default_value_t = 1920)]
        screen_width: u32,

        #[arg(long, default_value_t = 1080)]
        screen_height: u32,
    },

    /// Print the results of a finished session
    Results {
        session_id: String,
    },
}

impl Cli {
    fn api_config(&self) -> Result<ApiConfig, Box<dyn Error>> {
        let mut config = ApiConfig::from_env()?;
        if let Some(url) = &self.quiz_url {
            config.quiz_base_url = url.clone();
        }
        if let Some(url) = &self.stats_url {
            config.stats_base_url = url.clone();
        }
        if self.token.is_some() {
            config = config.with_access_token(self.token.clone());
        }
        Ok(config)
    }
}

fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

async fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing(&cli.log);

    let config = cli.api_config()?;
    info!(quiz = %config.quiz_base_url, stats = %config.stats_base_url, "using quiz services");
    let client = Arc::new(HttpQuizClient::new(config));

    match cli.command {
        Command::Play {
            mode,
            test_code,
            screen_width,
            screen_height,
        } => {
            let request = StartRequest::new(mode, ScreenSize::new(screen_width, screen_height))
                .with_test_code(test_code.as_deref());
            play::run(client, request).await
        }
        Command::Results { session_id } => {
            let results = client.quiz_results(&SessionId::new(session_id)).await?;
            print!("{}", render::results(&results));
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err}");
        std::process::exit(2);
    }
}
