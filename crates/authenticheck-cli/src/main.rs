use std::io::{self, BufRead, ErrorKind, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use authenticheck_contracts::chat::{ChatMessage, Role, ASSISTANT_NAME};
use authenticheck_contracts::events::{emit_optional, EventKind, EventPayload, EventWriter};
use authenticheck_contracts::history::{FileKeyValueStore, HistoryStore};
use authenticheck_contracts::metrics::{ModelMetric, METRICS_TITLE, MODEL_METRICS};
use authenticheck_contracts::models::ModelSelector;
use authenticheck_contracts::verification::{
    format_confidence, VerificationResult, SHARE_TITLE,
};
use authenticheck_engine::{
    build_chat_model, build_verification_model, ChatModel, ConversationSession, EngineConfig,
    ImageSelection, InputMode, SubmitOutcome, TurnProgress, VerificationForm, VerificationState,
    Verifier,
};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "authenticheck",
    version,
    about = "Verify products from a photo or barcode and chat with Luci"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// History file. Defaults to the platform data directory.
    #[arg(long, global = true)]
    history: Option<PathBuf>,
    /// Append-only JSONL event log.
    #[arg(long, global = true)]
    events: Option<PathBuf>,
    #[arg(long, global = true)]
    verify_model: Option<String>,
    #[arg(long, global = true)]
    chat_model: Option<String>,
    /// Use the offline providers.
    #[arg(long, global = true)]
    dryrun: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    Verify(VerifyArgs),
    History(HistoryArgs),
    Chat,
    /// Published model performance figures.
    Metrics(MetricsArgs),
}

#[derive(Debug, Parser)]
struct VerifyArgs {
    #[arg(long, conflicts_with = "barcode", required_unless_present = "barcode")]
    image: Option<PathBuf>,
    #[arg(long, requires = "image")]
    mime: Option<String>,
    #[arg(long)]
    barcode: Option<String>,
    #[arg(long)]
    share: bool,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Parser)]
struct HistoryArgs {
    #[arg(long)]
    clear: bool,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Parser)]
struct MetricsArgs {
    #[arg(long)]
    json: bool,
}

const HISTORY_FILE_NAME: &str = "history.json";
const LOG_ENV: &str = "AUTHENTICHECK_LOG";

fn main() {
    init_tracing();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("authenticheck error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config = engine_config(&cli.global);
    let events = cli.global.events.clone().map(EventWriter::with_fresh_session);
    match cli.command {
        Command::Verify(args) => run_verify(&cli.global, &config, events, args),
        Command::History(args) => run_history(&cli.global, events, args),
        Command::Chat => {
            run_chat(&config, events)?;
            Ok(0)
        }
        Command::Metrics(args) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&MODEL_METRICS)?);
            } else {
                print!("{}", render_metrics(&MODEL_METRICS));
            }
            Ok(0)
        }
    }
}

fn engine_config(global: &GlobalArgs) -> EngineConfig {
    let mut config = EngineConfig::from_env();
    if global.verify_model.is_some() {
        config.verify_model = global.verify_model.clone();
    }
    if global.chat_model.is_some() {
        config.chat_model = global.chat_model.clone();
    }
    config.dryrun = global.dryrun;
    config
}

fn history_path(global: &GlobalArgs) -> Result<PathBuf> {
    if let Some(path) = global.history.clone() {
        return Ok(path);
    }
    let Some(base) = dirs::data_local_dir() else {
        bail!("no platform data directory; pass --history");
    };
    Ok(base.join("authenticheck").join(HISTORY_FILE_NAME))
}

fn verifier(
    global: &GlobalArgs,
    config: &EngineConfig,
    events: Option<EventWriter>,
) -> Result<Verifier> {
    let (model, selection) = build_verification_model(config, &ModelSelector::new(None))
        .context("verification model unavailable")?;
    tracing::info!(model = %selection.model.name, "verification model selected");
    let backend = FileKeyValueStore::new(history_path(global)?);
    let verifier = Verifier::with_backend(model, backend);
    Ok(match events {
        Some(events) => verifier.with_events(events),
        None => verifier,
    })
}

fn form_from_args(args: &VerifyArgs) -> VerificationForm {
    let mut form = VerificationForm::default();
    if let Some(path) = args.image.clone() {
        let mut selection = ImageSelection::new(path);
        selection.mime_type = args.mime.clone();
        form.select_image(selection);
    }
    if let Some(barcode) = args.barcode.as_deref() {
        form.set_barcode(barcode);
        form.set_mode(InputMode::Barcode);
    }
    form
}

fn run_verify(
    global: &GlobalArgs,
    config: &EngineConfig,
    events: Option<EventWriter>,
    args: VerifyArgs,
) -> Result<i32> {
    let form = form_from_args(&args);
    let Some(submission) = form.submission() else {
        bail!("nothing to verify: pass --image PATH or a non-empty --barcode");
    };
    let verifier = verifier(global, config, events)?;

    match verifier.submit(submission) {
        SubmitOutcome::Completed(VerificationState::Succeeded(result)) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print!("{}", render_result(&result));
            }
            if args.share {
                println!();
                println!("{SHARE_TITLE}");
                println!("{}", result.share_text());
            }
            Ok(0)
        }
        SubmitOutcome::Completed(VerificationState::Failed(message)) => {
            if args.json {
                println!("{}", json!({ "error": message }));
            } else {
                eprintln!("{message}");
            }
            Ok(1)
        }
        other => bail!("verification did not complete ({other:?})"),
    }
}

fn render_result(result: &VerificationResult) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{} ({}% confidence)\n",
        result.status,
        format_confidence(result.confidence)
    ));
    out.push_str(&format!("{} {}\n", result.brand, result.model));
    out.push_str(&format!(
        "{} of {} checks passed\n",
        result.passed_count(),
        result.reasons.len()
    ));
    for reason in &result.reasons {
        let mark = if reason.passed { "pass" } else { "fail" };
        out.push_str(&format!("  [{mark}] {}: {}\n", reason.title, reason.details));
    }
    out
}

fn render_metrics(metrics: &[ModelMetric]) -> String {
    let mut out = format!("{METRICS_TITLE}\n");
    for metric in metrics {
        out.push_str(&format!(
            "  {}: {}\n    {}\n",
            metric.name, metric.value, metric.description
        ));
    }
    out
}

fn run_history(global: &GlobalArgs, events: Option<EventWriter>, args: HistoryArgs) -> Result<i32> {
    let path = history_path(global)?;
    let mut store = HistoryStore::load(FileKeyValueStore::new(&path));

    if args.clear {
        let cleared = store.len();
        store.clear();
        if let Some(err) = store.last_error() {
            bail!("failed clearing history at {}: {err}", path.display());
        }
        let mut payload = EventPayload::new();
        payload.insert("entries".to_string(), Value::from(cleared as u64));
        emit_optional(events.as_ref(), EventKind::HistoryCleared, payload);
        println!("Cleared {cleared} entries.");
        return Ok(0);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(store.entries())?);
        return Ok(0);
    }
    if store.is_empty() {
        println!("No verifications yet.");
        return Ok(0);
    }
    for (index, entry) in store.entries().iter().enumerate() {
        println!(
            "{:>3}. {} {} - {} ({}%)",
            index + 1,
            entry.brand,
            entry.model,
            entry.status,
            format_confidence(entry.confidence)
        );
    }
    Ok(0)
}

fn run_chat(config: &EngineConfig, events: Option<EventWriter>) -> Result<()> {
    let (model, selection) = build_chat_model(config, &ModelSelector::new(None))
        .context("chat model unavailable")?;
    tracing::info!(model = %selection.model.name, "chat model selected");

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut session = open_session(&model, events.clone())?;
    let mut line = String::new();

    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match input.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let message = line.trim_end_matches(['\n', '\r']);
        match message.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/reset" => {
                session.close();
                session = open_session(&model, events.clone())?;
                continue;
            }
            _ => {}
        }

        print!("{ASSISTANT_NAME}: ");
        io::stdout().flush()?;
        let mut shown = 0usize;
        let outcome = session.send(message, |progress, current| {
            if let TurnProgress::Chunk { chunk, .. } = progress {
                print!("{chunk}");
                shown += chunk.len();
                let _ = io::stdout().flush();
            } else if let TurnProgress::Failed { .. } = progress {
                if shown > 0 {
                    println!();
                }
                print!("{}", current.text());
            }
        });
        println!();
        if let Err(err) = outcome {
            println!("{err}");
        }
    }

    session.close();
    Ok(())
}

fn open_session(
    model: &Arc<dyn ChatModel>,
    events: Option<EventWriter>,
) -> Result<ConversationSession> {
    let session = ConversationSession::open(Arc::clone(model), events);
    for message in session.transcript() {
        print_message(message);
    }
    io::stdout().flush()?;
    Ok(session)
}

fn print_message(message: &ChatMessage) {
    match message.role {
        Role::Model => println!("{ASSISTANT_NAME}: {}", message.text()),
        Role::User => println!("you: {}", message.text()),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use authenticheck_contracts::verification::{ProductStatus, Reason, VerificationResult};
    use authenticheck_engine::{InputMode, Submission};
    use clap::Parser;

    use authenticheck_contracts::metrics::MODEL_METRICS;

    use super::{form_from_args, history_path, render_metrics, render_result, Cli, Command};

    #[test]
    fn verify_requires_exactly_one_input() {
        assert!(Cli::try_parse_from(["authenticheck", "verify"]).is_err());
        assert!(Cli::try_parse_from([
            "authenticheck",
            "verify",
            "--image",
            "a.png",
            "--barcode",
            "123"
        ])
        .is_err());
        assert!(Cli::try_parse_from(["authenticheck", "verify", "--barcode", "123"]).is_ok());
    }

    #[test]
    fn barcode_args_build_trimmed_submission() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from([
            "authenticheck",
            "--dryrun",
            "verify",
            "--barcode",
            " 036000291452 ",
        ])?;
        assert!(cli.global.dryrun);
        let Command::Verify(args) = cli.command else {
            anyhow::bail!("expected verify command");
        };
        let form = form_from_args(&args);
        assert_eq!(form.mode, InputMode::Barcode);
        assert_eq!(
            form.submission(),
            Some(Submission::Barcode("036000291452".to_string()))
        );
        Ok(())
    }

    #[test]
    fn image_args_carry_declared_mime() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from([
            "authenticheck",
            "verify",
            "--image",
            "bag.heic",
            "--mime",
            "image/heic",
        ])?;
        let Command::Verify(args) = cli.command else {
            anyhow::bail!("expected verify command");
        };
        let Some(Submission::Image(selection)) = form_from_args(&args).submission() else {
            anyhow::bail!("expected image submission");
        };
        assert_eq!(selection.path, PathBuf::from("bag.heic"));
        assert_eq!(selection.mime_type.as_deref(), Some("image/heic"));
        Ok(())
    }

    #[test]
    fn explicit_history_flag_wins() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from([
            "authenticheck",
            "history",
            "--history",
            "/tmp/h.json",
        ])?;
        assert_eq!(history_path(&cli.global)?, PathBuf::from("/tmp/h.json"));
        Ok(())
    }

    #[test]
    fn rendered_result_lists_reasons() {
        let result = VerificationResult {
            status: ProductStatus::Counterfeit,
            confidence: 72.5,
            brand: "Acme".to_string(),
            model: "Widget X".to_string(),
            reasons: vec![Reason {
                title: "OCR & Text Analysis".to_string(),
                details: "Misspelled label.".to_string(),
                passed: false,
            }],
            image_url: String::new(),
        };
        assert_eq!(
            render_result(&result),
            "Counterfeit (72.5% confidence)\nAcme Widget X\n0 of 1 checks passed\n  [fail] OCR & Text Analysis: Misspelled label.\n"
        );
    }

    #[test]
    fn metrics_listing_includes_every_figure() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from(["authenticheck", "metrics", "--json"])?;
        assert!(matches!(cli.command, Command::Metrics(ref args) if args.json));

        let text = render_metrics(&MODEL_METRICS);
        assert!(text.starts_with("Our Model's Performance\n"));
        assert!(text.contains("  Accuracy: 99.2%\n"));
        assert!(text.contains("  F1-Score: 0.975\n"));
        Ok(())
    }
}
