//! promptbake - Main CLI Entry Point

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use promptbake::{
    cli::{Args, Commands, Config, HistoryCommand, Verbosity},
    events::{EventBus, GenerationEvent},
    export::strip_markup,
    generation::{find_template, FinishReason, PromptTemplate, SessionOutcome, StreamingGenerationSession},
    identity::{IdentityProvider, StaticIdentity},
    store::{FavoriteStore, FileStore, HistoryStore, RecordId},
    streaming::ChatCompletionsClient,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

type InputLines = Lines<BufReader<Stdin>>;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(args.config.clone()).context("Failed to load configuration")?;
    init_tracing(args.verbosity(), &config);

    match &args.command {
        Commands::Generate {
            template,
            inputs,
            model,
            once,
        } => {
            generate(&args, &config, template, inputs.clone(), model.clone(), *once).await?;
        }
        Commands::History { command } => match command {
            HistoryCommand::List { limit } => list_history(&config, *limit).await?,
            HistoryCommand::Show { id, plain } => show_record(&config, *id, *plain).await?,
        },
        Commands::Favorite { id } => add_favorite(&config, *id).await?,
        Commands::Favorites => list_favorites(&config).await?,
        Commands::Templates => list_templates(&config),
        Commands::Models => list_models(&config).await?,
        Commands::Config { init } => show_config(&args, &config, *init)?,
    }

    Ok(())
}

fn init_tracing(verbosity: Verbosity, config: &Config) {
    let fallback = verbosity
        .log_filter()
        .map(str::to_string)
        .unwrap_or_else(|| config.logging.filter.clone());

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

fn configured_identity(config: &Config) -> StaticIdentity {
    let owner_id = if config.identity.owner_id.trim().is_empty() {
        std::env::var("USER").unwrap_or_else(|_| "local".to_string())
    } else {
        config.identity.owner_id.clone()
    };
    let email = if config.identity.email.trim().is_empty() {
        owner_id.clone()
    } else {
        config.identity.email.clone()
    };
    StaticIdentity::new(owner_id, email)
}

fn open_store(config: &Config) -> Result<Arc<FileStore>> {
    let store = FileStore::new(config.history_dir(), config.storage.max_records)
        .with_context(|| format!("Failed to open history at {:?}", config.history_dir()))?;
    Ok(Arc::new(store))
}

fn client(config: &Config) -> Result<ChatCompletionsClient> {
    let api_key = config.api_key();
    if api_key.is_none() {
        tracing::warn!(
            "{} is not set; requests are sent without credentials",
            config.api.api_key_env
        );
    }
    Ok(ChatCompletionsClient::with_config(
        &config.api.base_url,
        api_key,
        config.api.format,
        config.connect_timeout(),
    )?)
}

async fn read_line(lines: &mut InputLines, prompt: &str) -> Result<Option<String>> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(prompt.as_bytes()).await?;
    stdout.flush().await?;

    tokio::select! {
        line = lines.next_line() => Ok(line?),
        _ = tokio::signal::ctrl_c() => Ok(None),
    }
}

/// Ask for the fields not given on the command line
async fn collect_inputs(
    template: &PromptTemplate,
    mut inputs: Vec<String>,
    lines: &mut InputLines,
) -> Result<Vec<String>> {
    if inputs.len() > template.fields.len() {
        bail!(
            "Template '{}' takes {} inputs, got {}",
            template.name,
            template.fields.len(),
            inputs.len()
        );
    }

    for field in &template.fields[inputs.len()..] {
        let prompt = format!("{} ", format!("{}:", field.label).bold());
        match read_line(lines, &prompt).await? {
            Some(value) => inputs.push(value),
            None => bail!("Input aborted"),
        }
    }
    Ok(inputs)
}

/// Terminal view of a running session
struct Renderer {
    verbosity: Verbosity,
    spinner: Option<ProgressBar>,
    printed: usize,
}

impl Renderer {
    fn new(verbosity: Verbosity) -> Self {
        Self {
            verbosity,
            spinner: None,
            printed: 0,
        }
    }

    fn clear_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }

    fn handle(&mut self, event: GenerationEvent) {
        let show = self.verbosity.show_progress();
        match event {
            GenerationEvent::Started { .. } => {
                self.printed = 0;
                if show {
                    let spinner = ProgressBar::new_spinner();
                    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
                        spinner.set_style(style);
                    }
                    spinner.set_message("Generating... (Ctrl-C to stop)");
                    spinner.enable_steady_tick(Duration::from_millis(100));
                    self.spinner = Some(spinner);
                }
            }
            GenerationEvent::TextUpdated { text, .. } => {
                self.clear_spinner();
                // the buffer only grows, so the old length is a char boundary
                if let Some(delta) = text.get(self.printed..) {
                    print!("{}", delta);
                    let _ = std::io::Write::flush(&mut std::io::stdout());
                }
                self.printed = text.len();
            }
            GenerationEvent::Finished { reason, chars, .. } => {
                self.clear_spinner();
                println!();
                if show {
                    let line = format!("[{} chars]", chars);
                    match reason {
                        FinishReason::Completed => println!("{}", line.dimmed()),
                        FinishReason::Cancelled => println!("{} {}", "Stopped".yellow(), line.dimmed()),
                        FinishReason::TransportError => println!("{} {}", "Interrupted".red(), line.dimmed()),
                    }
                }
            }
            GenerationEvent::SaveStarted { .. } => {}
            GenerationEvent::Saved { record_id, .. } => {
                if show {
                    println!("{} {}", "Saved as".green(), record_id.to_string().bold());
                }
            }
            GenerationEvent::SaveFailed { error, .. } => {
                eprintln!("{} {}", "Not saved:".red(), error);
            }
            GenerationEvent::SaveSkipped { .. } => {
                if show {
                    println!("{}", "Nothing to save".dimmed());
                }
            }
        }
    }
}

/// Drive one run while rendering its events; Ctrl-C stops the run
async fn run_once(
    surface: &mut StreamingGenerationSession,
    events: &mut tokio::sync::mpsc::Receiver<GenerationEvent>,
    renderer: &mut Renderer,
) -> Result<SessionOutcome> {
    let stop = surface.stop_handle();
    let run = surface.run();
    tokio::pin!(run);

    let outcome = loop {
        tokio::select! {
            outcome = &mut run => break outcome?,
            Some(event) = events.recv() => renderer.handle(event),
            _ = tokio::signal::ctrl_c() => stop.cancel(),
        }
    };

    while let Ok(event) = events.try_recv() {
        renderer.handle(event);
    }
    Ok(outcome)
}

async fn generate(
    args: &Args,
    config: &Config,
    template_name: &str,
    inputs: Vec<String>,
    model: Option<String>,
    once: bool,
) -> Result<()> {
    let templates = config.templates();
    let template = find_template(&templates, template_name)
        .cloned()
        .ok_or_else(|| anyhow!("Unknown template '{}'. See `promptbake templates`.", template_name))?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let inputs = collect_inputs(&template, inputs, &mut lines).await?;

    let store = open_store(config)?;
    let identity = Arc::new(configured_identity(config));
    let (bus, mut events) = EventBus::with_capacity(config.session.event_capacity);

    let mut surface = StreamingGenerationSession::new(
        Arc::new(client(config)?),
        store.clone(),
        identity,
        template,
    )
    .with_model(model.unwrap_or_else(|| config.api.model.clone()))
    .with_policy(config.session_policy())
    .with_events(bus);
    surface.set_inputs(inputs)?;

    let mut renderer = Renderer::new(args.verbosity());
    let outcome = run_once(&mut surface, &mut events, &mut renderer).await?;
    if let Some(error) = &outcome.error {
        eprintln!("{} {}", "Error:".red().bold(), error);
    }
    if once {
        return Ok(());
    }

    loop {
        let prompt = format!(
            "\n{}ontinue  {}lain copy  {}avorite  {}uit > ",
            "[c]".cyan(),
            "[p]".cyan(),
            "[f]".cyan(),
            "[q]".cyan()
        );
        let Some(choice) = read_line(&mut lines, &prompt).await? else {
            break;
        };

        match choice.trim() {
            "c" | "continue" => {
                let outcome = run_once(&mut surface, &mut events, &mut renderer).await?;
                if let Some(error) = &outcome.error {
                    eprintln!("{} {}", "Error:".red().bold(), error);
                }
            }
            "p" | "plain" => match surface.plain_text() {
                Some(text) => println!("{}", text),
                None => println!("{}", "Nothing generated yet".dimmed()),
            },
            "f" | "favorite" => match surface.favorite_last(store.as_ref()).await {
                Ok(id) => println!("{} {}", "Added to favorites:".green(), id),
                Err(e) => eprintln!("{} {}", "Could not favorite:".red(), e),
            },
            "q" | "quit" | "" => break,
            other => println!("Unknown choice '{}'", other),
        }
    }

    Ok(())
}

fn preview(text: &str, width: usize) -> String {
    let plain = strip_markup(text);
    let flat: String = plain.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > width {
        format!("{}...", flat.chars().take(width).collect::<String>())
    } else {
        flat
    }
}

async fn list_history(config: &Config, limit: usize) -> Result<()> {
    let store = open_store(config)?;
    let owner = configured_identity(config).current().await?;
    let records = store.list(&owner.owner_id).await?;

    if records.is_empty() {
        println!("No saved generations yet.");
        return Ok(());
    }

    for record in records.iter().take(limit) {
        println!(
            "{:>10}  {}  {}  {}",
            record.id.to_string().bold(),
            record.created_at.format("%Y-%m-%d %H:%M").to_string().dimmed(),
            record.kind.cyan(),
            preview(&record.result, 60)
        );
    }
    Ok(())
}

async fn show_record(config: &Config, id: RecordId, plain: bool) -> Result<()> {
    let store = open_store(config)?;
    let record = store
        .get(id)
        .await?
        .ok_or_else(|| anyhow!("Record {} not found", id))?;

    if plain {
        println!("{}", strip_markup(&record.result));
    } else {
        println!("{}", record.result);
    }
    Ok(())
}

async fn add_favorite(config: &Config, id: RecordId) -> Result<()> {
    let store = open_store(config)?;
    let owner = configured_identity(config).current().await?;
    store.add_favorite(id, &owner.email).await?;
    println!("{} {}", "Added to favorites:".green(), id);
    Ok(())
}

async fn list_favorites(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let owner = configured_identity(config).current().await?;
    let favorites = store.favorites(&owner.email).await?;

    if favorites.is_empty() {
        println!("No favorites yet.");
        return Ok(());
    }

    for favorite in favorites {
        let summary = match store.get(favorite.record_id).await? {
            Some(record) => format!("{}  {}", record.kind.cyan(), preview(&record.result, 60)),
            None => "(record removed)".dimmed().to_string(),
        };
        println!("{:>10}  {}", favorite.record_id.to_string().bold(), summary);
    }
    Ok(())
}

fn list_templates(config: &Config) {
    for template in config.templates() {
        println!("{}  {}", template.name.bold(), template.title.dimmed());
        for (i, field) in template.fields.iter().enumerate() {
            println!("    -i #{} {}", i + 1, field.label);
        }
    }
}

async fn list_models(config: &Config) -> Result<()> {
    let models = client(config)?
        .list_models()
        .await
        .with_context(|| format!("Could not list models at {}", config.api.base_url))?;

    if models.is_empty() {
        println!("The endpoint offers no models.");
    } else {
        println!("Available models:");
        for model in models {
            let marker = if model == config.api.model { " (default)" } else { "" };
            println!("  • {}{}", model, marker.green());
        }
    }
    Ok(())
}

fn show_config(args: &Args, config: &Config, init: bool) -> Result<()> {
    let path = args
        .config
        .clone()
        .or_else(Config::default_path)
        .ok_or_else(|| anyhow!("Could not determine home directory"))?;

    if init {
        if path.exists() {
            bail!("{:?} already exists", path);
        }
        Config::default().save(&path)?;
        println!("Wrote default configuration to {:?}", path);
        return Ok(());
    }

    println!("{} {:?}", "Config file:".bold(), path);
    println!(
        "{} {}",
        "API key:".bold(),
        if config.api_key().is_some() {
            format!("set (${})", config.api.api_key_env).green()
        } else {
            format!("missing (${})", config.api.api_key_env).yellow()
        }
    );
    println!();
    print!(
        "{}",
        toml::to_string_pretty(config).context("Failed to render configuration")?
    );
    Ok(())
}
