use dotenvy::dotenv;
use mazza_bot::answer::{AnsweringService, GeminiAnswerer, UnavailableAnswerer};
use mazza_bot::bot::{run_bot, TelegramTransport};
use mazza_bot::catalog::Catalog;
use mazza_bot::config::Settings;
use mazza_bot::directory::{InMemoryDirectory, R2Directory, UserDirectory};
use mazza_bot::engine::{Collaborators, Engine, EngineConfig};
use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use teloxide::Bot;
use tracing::{error, info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Regex patterns for redacting sensitive data
struct RedactionPatterns {
    token1: Regex,
    token2: Regex,
    token3: Regex,
    gemini_key: Regex,
    r2_1: Regex,
    r2_2: Regex,
    r2_3: Regex,
    r2_4: Regex,
}

impl RedactionPatterns {
    /// Initialize all regex patterns
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            token1: Regex::new(r"(https?://[^/]+/bot)([0-9]+:[A-Za-z0-9_-]+)(/['\s]*)")?,
            token2: Regex::new(r"([0-9]{8,10}:[A-Za-z0-9_-]{35})")?,
            token3: Regex::new(r"(bot[0-9]{8,10}:)[A-Za-z0-9_-]+")?,
            gemini_key: Regex::new(r"([?&]key=)[A-Za-z0-9_-]+")?,
            r2_1: Regex::new(r"R2_ACCESS_KEY_ID=[^\s&]+")?,
            r2_2: Regex::new(r"R2_SECRET_ACCESS_KEY=[^\s&]+")?,
            r2_3: Regex::new(r"'aws_access_key_id': '[^']*'")?,
            r2_4: Regex::new(r"'aws_secret_access_key': '[^']*'")?,
        })
    }

    fn redact(&self, input: &str) -> String {
        let replacements: [(&Regex, &str); 8] = [
            (&self.token1, "$1[TELEGRAM_TOKEN]$3"),
            (&self.token2, "[TELEGRAM_TOKEN]"),
            (&self.token3, "$1[TELEGRAM_TOKEN]"),
            (&self.gemini_key, "$1[GEMINI_KEY]"),
            (&self.r2_1, "R2_ACCESS_KEY_ID=[MASKED]"),
            (&self.r2_2, "R2_SECRET_ACCESS_KEY=[MASKED]"),
            (&self.r2_3, "'aws_access_key_id': '[MASKED]'"),
            (&self.r2_4, "'aws_secret_access_key': '[MASKED]'"),
        ];

        replacements
            .iter()
            .fold(input.to_string(), |output, (pattern, replacement)| {
                pattern.replace_all(&output, *replacement).to_string()
            })
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> RedactingWriter<W> {
    const fn new(inner: W, patterns: Arc<RedactionPatterns>) -> Self {
        Self { inner, patterns }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.patterns.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // Report the original length even though the redacted text may differ
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<F> RedactingMakeWriter<F> {
    const fn new(make_inner: F, patterns: Arc<RedactionPatterns>) -> Self {
        Self {
            make_inner,
            patterns,
        }
    }
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new((self.make_inner)(), self.patterns.clone())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Compiled before logging so nothing is written unredacted
    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);

    init_logging(patterns);

    info!("Starting Mazza Food bot...");

    let settings = init_settings();
    if settings.owner_id.is_none() {
        warn!("OWNER_ID is not set; broadcast, reply relay and owner notices are disabled.");
    }
    if !settings.payments_enabled() {
        warn!("PAYMENT_PROVIDER_TOKEN is not set; checkout will apologize instead of invoicing.");
    }

    let directory = init_directory(&settings).await;
    let answerer = init_answerer(&settings);

    let bot = Bot::new(settings.telegram_token.clone());
    let transport = Arc::new(TelegramTransport::new(
        bot.clone(),
        settings.payment_provider_token.clone(),
    ));

    let engine = Arc::new(Engine::new(
        EngineConfig::from_settings(&settings),
        Collaborators {
            transport,
            directory,
            answerer,
            catalog: Arc::new(Catalog::builtin()),
        },
    ));

    run_bot(bot, engine).await
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter::new(io::stderr, patterns);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Settings {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            s
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

async fn init_directory(settings: &Settings) -> Arc<dyn UserDirectory> {
    if !settings.r2_configured() {
        warn!("R2 credentials are incomplete; users are kept in memory only.");
        return Arc::new(InMemoryDirectory::new());
    }

    match R2Directory::new(settings).await {
        Ok(directory) => {
            info!("R2 user directory initialized.");
            if directory.check_connection().await.is_err() {
                error!("R2 user directory connection check returned error.");
            }
            Arc::new(directory)
        }
        Err(e) => {
            error!("Failed to initialize R2 user directory: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_answerer(settings: &Settings) -> Arc<dyn AnsweringService> {
    match settings
        .gemini_api_key
        .as_deref()
        .filter(|key| !key.trim().is_empty())
    {
        Some(key) => {
            info!(model = %settings.gemini_model, "Gemini answering service initialized.");
            Arc::new(GeminiAnswerer::new(
                key.to_string(),
                settings.gemini_model.clone(),
            ))
        }
        None => {
            warn!("GEMINI_API_KEY is not set; AI chat mode will apologize.");
            Arc::new(UnavailableAnswerer)
        }
    }
}
