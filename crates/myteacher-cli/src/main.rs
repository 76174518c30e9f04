//! myteacher CLI — voice translator server and client.
//!
//! ```text
//! myteacher serve [--config myteacher.toml] [--port 2040] [--mute] [--no-mic]
//! myteacher translate --page hindi-to-english "आप कैसे हैं?"
//! myteacher words "Hello, world!"
//! myteacher screen / select <page> / back / page [--server http://127.0.0.1:2040]
//! myteacher say "text" / listen / click <index> [--server ...]
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use myteacher_lib::config::AppConfig;
use myteacher_lib::myteacher_core::text_prep::{clean_word, split_words};
use myteacher_lib::myteacher_core::types::Page;
use myteacher_lib::navigator::BrowserLauncher;
use myteacher_lib::page::Services;
use myteacher_lib::session::Session;
use myteacher_lib::speech::{Silent, SpeechRecognizer, SpeechSynthesizer, Unsupported};
use myteacher_lib::stt::WhisperRecognizer;
use myteacher_lib::translate::{GtxTranslator, Translator};
use myteacher_lib::tts::SpeechEngine;

const DEFAULT_SERVER: &str = "http://127.0.0.1:2040";

/// myteacher — Hindi/English/Sanskrit voice translation practice
#[derive(Parser)]
#[command(name = "myteacher", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the practice server
    Serve {
        /// TOML config file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Listen host
        #[arg(long)]
        host: Option<String>,
        /// Listen port
        #[arg(long)]
        port: Option<u16>,
        /// Kokoro TTS server URL
        #[arg(long)]
        kokoro_url: Option<String>,
        /// Whisper STT server URL
        #[arg(long)]
        whisper_url: Option<String>,
        /// Log utterances instead of playing them
        #[arg(long)]
        mute: bool,
        /// Run without a microphone
        #[arg(long)]
        no_mic: bool,
    },
    /// Translate text with a page's language pair and print it
    Translate {
        /// Page whose languages to use
        #[arg(long, default_value = "hindi-to-english")]
        page: Page,
        /// Text to translate
        text: String,
    },
    /// Show the clickable words of a paragraph and their cleaned forms
    Words {
        paragraph: String,
    },
    /// Show the current screen
    Screen {
        #[arg(long, default_value = DEFAULT_SERVER)]
        server: String,
    },
    /// Open a practice page
    Select {
        page: Page,
        #[arg(long, default_value = DEFAULT_SERVER)]
        server: String,
    },
    /// Return to the home screen
    Back {
        #[arg(long, default_value = DEFAULT_SERVER)]
        server: String,
    },
    /// Show the visible page's state
    Page {
        #[arg(long, default_value = DEFAULT_SERVER)]
        server: String,
    },
    /// Translate text on the visible audio page (or set the word page's paragraph)
    Say {
        text: String,
        #[arg(long, default_value = DEFAULT_SERVER)]
        server: String,
    },
    /// Listen on the visible page (dictate on the word page)
    Listen {
        #[arg(long, default_value = DEFAULT_SERVER)]
        server: String,
    },
    /// Translate a word on the word page by index
    Click {
        index: usize,
        /// Read the word aloud in English instead of translating
        #[arg(long)]
        english: bool,
        #[arg(long, default_value = DEFAULT_SERVER)]
        server: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "myteacher=info,myteacher_lib=info".into()),
        )
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Command::Serve {
            config,
            host,
            port,
            kokoro_url,
            whisper_url,
            mute,
            no_mic,
        } => {
            let mut config = match config {
                Some(path) => AppConfig::load(&path).map_err(|e| e.to_string())?,
                None => AppConfig::default(),
            };
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(url) = kokoro_url {
                config.kokoro_url = url;
            }
            if let Some(url) = whisper_url {
                config.whisper_url = url;
            }
            config.mute |= mute;
            config.no_mic |= no_mic;
            config.validate().map_err(|e| e.to_string())?;

            serve(config).await
        }

        Command::Translate { page, text } => {
            let translator = GtxTranslator::default();
            let translated = translator
                .translate(&text, page.config().pair)
                .await
                .map_err(|e| e.to_string())?;
            println!("{translated}");
            Ok(())
        }

        Command::Words { paragraph } => {
            for (i, word) in split_words(&paragraph).iter().enumerate() {
                println!("{i}\t{word}\t{}", clean_word(word));
            }
            Ok(())
        }

        Command::Screen { server } => get(&server, "screen").await,
        Command::Select { page, server } => post(&server, &format!("select/{page}"), None).await,
        Command::Back { server } => post(&server, "back", None).await,
        Command::Page { server } => get(&server, "page").await,

        Command::Say { text, server } => {
            let body = serde_json::json!({ "text": text });
            let endpoint = if visible_page(&server).await? == Some(Page::WordTranslator) {
                "page/paragraph"
            } else {
                "page/translate"
            };
            post(&server, endpoint, Some(body)).await
        }

        Command::Listen { server } => {
            let endpoint = if visible_page(&server).await? == Some(Page::WordTranslator) {
                "page/dictate"
            } else {
                "page/listen"
            };
            post(&server, endpoint, None).await
        }

        Command::Click {
            index,
            english,
            server,
        } => {
            let action = if english { "speak" } else { "translate" };
            post(&server, &format!("page/words/{index}/{action}"), None).await
        }
    }
}

async fn serve(config: AppConfig) -> Result<(), String> {
    let recognizer: Arc<dyn SpeechRecognizer> = if config.no_mic {
        Arc::new(Unsupported)
    } else {
        Arc::new(WhisperRecognizer::new(
            &config.whisper_url,
            config.whisper_model.clone(),
        ))
    };
    let synth: Arc<dyn SpeechSynthesizer> = if config.mute {
        Arc::new(Silent)
    } else {
        Arc::new(SpeechEngine::new(&config))
    };
    let services = Services {
        translator: Arc::new(GtxTranslator::new(config.translate_endpoint.clone())),
        recognizer,
        synth,
    };

    let session = Arc::new(Session::new(
        services,
        Arc::new(BrowserLauncher),
        config.ad_url.clone(),
    ));
    let app = myteacher_lib::server::router(session);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| format!("failed to bind {addr}: {e}"))?;
    info!("myteacher listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await
        .map_err(|e| format!("server error: {e}"))
}

// ─── Client helpers ────────────────────────────────────────────────────────

async fn visible_page(server: &str) -> Result<Option<Page>, String> {
    let screen = fetch_json(reqwest::Client::new().get(format!("{server}/screen"))).await?;
    if screen["screen"] != "showing" {
        return Ok(None);
    }
    Ok(screen["page"].as_str().and_then(|p| p.parse().ok()))
}

async fn get(server: &str, endpoint: &str) -> Result<(), String> {
    let value = fetch_json(reqwest::Client::new().get(format!("{server}/{endpoint}"))).await?;
    print_json(&value)
}

async fn post(server: &str, endpoint: &str, body: Option<serde_json::Value>) -> Result<(), String> {
    let mut req = reqwest::Client::new().post(format!("{server}/{endpoint}"));
    if let Some(body) = body {
        req = req.json(&body);
    }
    let value = fetch_json(req).await?;
    print_json(&value)
}

async fn fetch_json(req: reqwest::RequestBuilder) -> Result<serde_json::Value, String> {
    let resp = req.send().await.map_err(|e| format!("request failed: {e}"))?;
    resp.json()
        .await
        .map_err(|e| format!("invalid response: {e}"))
}

fn print_json(value: &serde_json::Value) -> Result<(), String> {
    let pretty = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    println!("{pretty}");
    Ok(())
}
