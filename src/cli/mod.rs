//! # Command line
//!
//! Every command opens the session from the data directory, works on the
//! saved draft, and writes it back.
//!
//! ## Commands
//! - `httpstudio import 'curl ...'` (or `-` to read stdin), then auto presets
//! - `httpstudio apply`, `show`, `export`, `send`, `reset`
//! - `httpstudio presets list|add|rm|toggle|apply|export|import|clear`
//! - `httpstudio history list|rm|clear|load|star`

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::PathBuf;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::history::{format_timestamp, Collection};
use crate::http::HttpExecutor;
use crate::presets::{ApplyOutcome, Preset, PresetTarget, PromptReply, ValuePrompt};
use crate::session::Session;

#[derive(Debug, Parser)]
#[command(name = "httpstudio", version, about = "Author HTTP requests from cURL commands, presets and history")]
pub struct Cli {
    /// Data directory (default: $HTTPSTUDIO_DATA_DIR or ./.httpstudio)
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Replace the draft with a pasted cURL command
    Import(ImportArgs),
    /// Run the stored presets against the draft
    Apply(ApplyArgs),
    /// Print the draft as JSON
    Show,
    /// Print the draft as a cURL command
    Export,
    /// Send the draft and record it in history
    Send(SendArgs),
    /// Clear the draft
    Reset,
    #[command(subcommand)]
    Presets(PresetsCommand),
    #[command(subcommand)]
    History(HistoryCommand),
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// cURL command text, or `-` to read it from stdin
    pub curl: String,

    /// Skip the auto presets
    #[arg(long)]
    pub no_auto: bool,

    /// Accept stored values instead of prompting
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// Accept stored values instead of prompting
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Only run presets marked auto
    #[arg(long)]
    pub auto_only: bool,
}

#[derive(Debug, Args)]
pub struct SendArgs {
    /// Write the full response body to PATH
    #[arg(long, value_name = "PATH")]
    pub save_body: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum TargetArg {
    Query,
    Headers,
    #[value(name = "body_kv", alias = "body-kv")]
    BodyKv,
}

impl From<TargetArg> for PresetTarget {
    fn from(value: TargetArg) -> Self {
        match value {
            TargetArg::Query => PresetTarget::Query,
            TargetArg::Headers => PresetTarget::Headers,
            TargetArg::BodyKv => PresetTarget::BodyKv,
        }
    }
}

#[derive(Debug, Args)]
pub struct PresetArgs {
    pub name: String,

    /// Key name, or a dotted path with `--jsonpath`
    #[arg(value_name = "MATCH")]
    pub match_key: String,

    #[arg(default_value = "")]
    pub value: String,

    /// Set a value inside a JSON body instead of a key/value row
    #[arg(long)]
    pub jsonpath: bool,

    #[arg(long, value_enum, default_value = "query")]
    pub target: TargetArg,

    /// Only apply when the URL host contains this
    #[arg(long, default_value = "")]
    pub host: String,

    /// Only apply when the URL path contains this
    #[arg(long, default_value = "")]
    pub path: String,

    /// Ask for the value each time, seeded with VALUE
    #[arg(long)]
    pub prompt: bool,

    /// Run right after an import
    #[arg(long)]
    pub auto: bool,

    #[arg(long)]
    pub disabled: bool,
}

impl From<PresetArgs> for Preset {
    fn from(args: PresetArgs) -> Self {
        let mut preset = if args.jsonpath {
            Preset::json_path(args.name, args.match_key, args.value)
        } else {
            Preset::kv(args.name, args.target.into(), args.match_key, args.value)
        };
        preset = preset.with_scope(args.host, args.path);
        preset.prompt = args.prompt;
        preset.auto = args.auto;
        preset.enabled = !args.disabled;
        preset
    }
}

#[derive(Debug, Subcommand)]
pub enum PresetsCommand {
    List,
    /// Add a preset, or replace the one with the same name
    Add(PresetArgs),
    Rm {
        name: String,
    },
    Toggle {
        name: String,
    },
    /// Run one preset against the draft, even if it is not marked auto
    Apply {
        name: String,
        /// Accept the stored value instead of prompting
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Print all presets as a JSON array
    Export,
    /// Replace all presets with a JSON array read from FILE (`-` for stdin)
    Import {
        file: String,
    },
    Clear,
}

#[derive(Debug, Subcommand)]
pub enum HistoryCommand {
    /// History and favorites, newest first
    List {
        #[arg(long, short = 'q', default_value = "")]
        query: String,
    },
    Rm {
        ts: String,
        /// Remove from favorites instead of history
        #[arg(long)]
        favorite: bool,
    },
    /// Clear history (favorites are kept)
    Clear,
    /// Load a snapshot into the draft
    Load {
        ts: String,
    },
    /// Save the draft to favorites
    Star,
}

/// Reads preset values from stdin. An empty line keeps the stored value and
/// end of input declines the preset.
pub struct StdinPrompt {
    assume_yes: bool,
}

impl StdinPrompt {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

impl ValuePrompt for StdinPrompt {
    fn prompt(&mut self, preset: &Preset, default: &str) -> PromptReply {
        if self.assume_yes {
            return PromptReply::Value(default.to_string());
        }

        eprint!("{} ({}) [{default}]: ", preset.name, preset.match_key);
        let _ = io::stderr().flush();

        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => PromptReply::Canceled,
            Ok(_) => {
                let line = line.trim_end_matches(['\r', '\n']);
                if line.is_empty() {
                    PromptReply::Value(default.to_string())
                } else {
                    PromptReply::Value(line.to_string())
                }
            }
        }
    }
}

fn read_input(source: &str) -> Result<String> {
    if source == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .map_err(|e| Error::Input(format!("Failed to read stdin: {e}")))?;
        return Ok(text);
    }
    Ok(source.to_string())
}

/// Prompt for an import. When the command came from stdin there is nothing
/// left to answer prompts with, so stored values are used.
fn import_prompt(source: &str, yes: bool) -> StdinPrompt {
    let from_stdin = source == "-";
    if from_stdin && !yes {
        eprintln!("note: stdin held the cURL command; prompted presets use their stored values");
    }
    StdinPrompt::new(yes || from_stdin)
}

fn read_file(path: &str) -> Result<String> {
    if path == "-" {
        return read_input(path);
    }
    fs::read_to_string(path).map_err(|e| Error::Input(format!("Failed to read `{path}`: {e}")))
}

fn parse_timestamp(ts: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts.trim())
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| Error::Input(format!("`{ts}` is not an RFC 3339 timestamp: {e}")))
}

fn report_outcome(outcome: &ApplyOutcome) {
    if outcome.is_no_match() {
        println!("No preset matched this URL.");
        return;
    }
    let mut line = format!("Applied presets: {} hit(s)", outcome.hits);
    if outcome.canceled > 0 {
        line.push_str(&format!(", {} declined", outcome.canceled));
    }
    if outcome.skipped > 0 {
        line.push_str(&format!(", {} skipped", outcome.skipped));
    }
    println!("{line}");
}

pub async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.data_dir)?;
    let mut session = Session::open(config)?;

    match cli.command {
        Command::Import(args) => {
            let text = read_input(&args.curl)?;
            let mut prompt = import_prompt(&args.curl, args.yes);
            let outcome = session.import_curl(&text, &mut prompt, !args.no_auto)?;
            let document = session.document();
            println!("Imported {} {}", document.method, document.url);
            if let Some(outcome) = outcome {
                report_outcome(&outcome);
            }
        }
        Command::Apply(args) => {
            let mut prompt = StdinPrompt::new(args.yes);
            let outcome = session.apply_presets(&mut prompt, args.auto_only)?;
            report_outcome(&outcome);
        }
        Command::Show => {
            println!("{}", serde_json::to_string_pretty(session.document())?);
        }
        Command::Export => {
            println!("{}", session.export_curl());
        }
        Command::Send(args) => {
            let executor = HttpExecutor::new(session.config().preview_max_bytes);
            let summary = session.send(&executor).await?;

            println!("{} ({} ms, {} bytes)", summary.status_line(), summary.elapsed_ms, summary.body_len);
            if summary.final_url != session.document().url_with_query() {
                println!("Final URL: {}", summary.final_url);
            }
            println!("{}\n", summary.headers_text);
            println!("{}", summary.body_text);
            if summary.truncated {
                eprintln!("(preview truncated)");
            }

            if let (Some(path), Some(id)) = (args.save_body, summary.download_id.as_deref()) {
                let download = session
                    .downloads()
                    .get(id)
                    .ok_or_else(|| Error::Storage("Response body is no longer available".into()))?;
                fs::write(&path, &download.bytes)
                    .map_err(|e| Error::Storage(format!("Failed to write `{}`: {e}", path.display())))?;
                eprintln!("Saved {} bytes to {}", download.bytes.len(), path.display());
            }
        }
        Command::Reset => {
            session.reset()?;
            println!("Draft cleared.");
        }
        Command::Presets(command) => run_presets(&mut session, command)?,
        Command::History(command) => run_history(&mut session, command)?,
    }

    Ok(())
}

fn run_presets(session: &mut Session, command: PresetsCommand) -> Result<()> {
    match command {
        PresetsCommand::List => {
            let list = session.presets().list()?;
            if list.is_empty() {
                println!("No presets.");
            }
            for preset in list {
                println!("{}", preset.summary());
            }
        }
        PresetsCommand::Add(args) => {
            let preset = Preset::from(args);
            let name = preset.name.trim().to_string();
            session.presets().upsert(preset)?;
            println!("Saved preset `{name}`.");
        }
        PresetsCommand::Rm { name } => {
            if !session.presets().delete(&name)? {
                return Err(Error::Input(format!("no preset named `{name}`")));
            }
            println!("Removed preset `{name}`.");
        }
        PresetsCommand::Toggle { name } => match session.presets().toggle(&name)? {
            Some(enabled) => println!("Preset `{name}` {}.", if enabled { "enabled" } else { "disabled" }),
            None => return Err(Error::Input(format!("no preset named `{name}`"))),
        },
        PresetsCommand::Apply { name, yes } => match session.apply_preset(&name, &mut StdinPrompt::new(yes))? {
            Some(outcome) => report_outcome(&outcome),
            None => return Err(Error::Input(format!("no preset named `{name}`"))),
        },
        PresetsCommand::Export => println!("{}", session.presets().export_json()?),
        PresetsCommand::Import { file } => {
            let count = session.presets().import_json(&read_file(&file)?)?;
            println!("Imported {count} preset(s).");
        }
        PresetsCommand::Clear => {
            session.presets().clear()?;
            println!("Presets cleared.");
        }
    }
    Ok(())
}

fn run_history(session: &mut Session, command: HistoryCommand) -> Result<()> {
    match command {
        HistoryCommand::List { query } => {
            let hits = session.snapshots().search(&query)?;
            if hits.is_empty() {
                println!("No snapshots.");
            }
            for hit in hits {
                let marker = if hit.is_favorite() { "*" } else { " " };
                println!("{marker} {}", hit.snapshot.summary());
            }
        }
        HistoryCommand::Rm { ts, favorite } => {
            let collection = if favorite { Collection::Favorites } else { Collection::History };
            if !session.snapshots().remove(collection, &parse_timestamp(&ts)?)? {
                return Err(Error::Input(format!("no {collection} entry at {ts}")));
            }
            println!("Removed {ts} from {collection}.");
        }
        HistoryCommand::Clear => {
            session.snapshots().clear(Collection::History)?;
            println!("History cleared.");
        }
        HistoryCommand::Load { ts } => match session.load_snapshot(&parse_timestamp(&ts)?)? {
            Some(collection) => println!("Loaded {ts} from {collection}."),
            None => return Err(Error::Input(format!("no snapshot at {ts}"))),
        },
        HistoryCommand::Star => {
            let snapshot = session.save_snapshot(Collection::Favorites)?;
            println!("Saved to favorites at {}.", format_timestamp(&snapshot.ts));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_preset_add() {
        let cli = Cli::try_parse_from([
            "httpstudio",
            "--data-dir",
            "/tmp/x",
            "presets",
            "add",
            "tok",
            "X-Token",
            "abc",
            "--target",
            "headers",
            "--host",
            "api.example",
            "--auto",
        ])
        .unwrap();
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/x")));

        let Command::Presets(PresetsCommand::Add(args)) = cli.command else {
            panic!("expected presets add");
        };
        let preset = Preset::from(args);
        assert_eq!(
            preset,
            Preset::kv("tok", PresetTarget::Headers, "X-Token", "abc")
                .with_scope("api.example", "")
                .with_auto()
        );
    }

    #[test]
    fn parses_jsonpath_and_body_kv_targets() {
        let cli = Cli::try_parse_from(["httpstudio", "presets", "add", "p", "a.b[0]", "--jsonpath"]).unwrap();
        let Command::Presets(PresetsCommand::Add(args)) = cli.command else {
            panic!("expected presets add");
        };
        assert_eq!(Preset::from(args), Preset::json_path("p", "a.b[0]", ""));

        let cli = Cli::try_parse_from(["httpstudio", "presets", "add", "p", "k", "v", "--target", "body_kv"]).unwrap();
        let Command::Presets(PresetsCommand::Add(args)) = cli.command else {
            panic!("expected presets add");
        };
        assert_eq!(Preset::from(args).target, PresetTarget::BodyKv);
    }

    #[test]
    fn parses_import_flags() {
        let cli = Cli::try_parse_from(["httpstudio", "import", "--no-auto", "-y", "-"]).unwrap();
        let Command::Import(args) = cli.command else {
            panic!("expected import");
        };
        assert_eq!(args.curl, "-");
        assert!(args.no_auto);
        assert!(args.yes);
    }

    #[test]
    fn timestamps_must_be_rfc3339() {
        let ts = parse_timestamp("2024-05-01T10:00:00.123Z").unwrap();
        assert_eq!(format_timestamp(&ts), "2024-05-01T10:00:00.123Z");
        assert!(matches!(parse_timestamp("yesterday"), Err(Error::Input(_))));
    }

    #[test]
    fn assume_yes_prompt_keeps_defaults() {
        let preset = Preset::kv("p", PresetTarget::Query, "k", "v").with_prompt();
        let mut prompt = StdinPrompt::new(true);
        assert_eq!(prompt.prompt(&preset, "v"), PromptReply::Value("v".into()));
    }

    #[test]
    fn parses_single_preset_apply() {
        let cli = Cli::try_parse_from(["httpstudio", "presets", "apply", "tok", "-y"]).unwrap();
        let Command::Presets(PresetsCommand::Apply { name, yes }) = cli.command else {
            panic!("expected presets apply");
        };
        assert_eq!(name, "tok");
        assert!(yes);
    }

    #[test]
    fn stdin_import_keeps_stored_values() {
        let preset = Preset::kv("p", PresetTarget::Query, "k", "v").with_prompt();
        let mut prompt = import_prompt("-", false);
        assert_eq!(prompt.prompt(&preset, "v"), PromptReply::Value("v".into()));
        assert!(import_prompt("-", false).assume_yes);
        assert!(!import_prompt("curl https://x.test", false).assume_yes);
        assert!(import_prompt("curl https://x.test", true).assume_yes);
    }
}
