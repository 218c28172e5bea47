//! CLI for wardkit.
//!
//! Pipeline: load document -> register class defaults -> resolve ward -> view/get/set/try.

mod sink;

use clap::{Args, Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use wardkit_core::{Obj, Value};
use wardkit_ward::{register_class_defaults, ward_args, ClassRegistry, TryOutcome, View, WardOptions};

/// Member naming the class of a document object.
const CLASS_TAG: &str = "$class";

#[derive(Parser, Debug)]
#[command(name = "wardkit", version, about = "Restricted views over JSON documents")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct Input {
    /// JSON document to ward.
    #[arg(long, env = "WARDKIT_DOC")]
    doc: PathBuf,

    /// Ward options: an options object or a positional argument array.
    #[arg(long, env = "WARDKIT_CONFIG")]
    config: Option<PathBuf>,

    /// Class defaults: JSON map of class name -> options object.
    #[arg(long, env = "WARDKIT_DEFAULTS")]
    defaults: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the document as seen through the ward.
    View {
        #[command(flatten)]
        input: Input,
    },
    /// Read keys through the ward; hidden or missing keys print null.
    Get {
        #[command(flatten)]
        input: Input,

        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Assign `KEY=JSON` through the ward and print the raw document.
    Set {
        #[command(flatten)]
        input: Input,

        #[arg(required = true, value_parser = parse_assignment)]
        assignments: Vec<(String, serde_json::Value)>,
    },
    /// Run a try call: a JSON argument array or a single batch object.
    Try {
        #[command(flatten)]
        input: Input,

        #[arg(long, env = "WARDKIT_REQUEST")]
        request: String,

        /// Write one `{"key", "result"}` row per key instead of pretty JSON.
        #[arg(long, default_value_t = false)]
        ndjson: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::View { input } => {
            let (_, view) = open(&input)?;
            println!("{}", serde_json::to_string_pretty(&view.snapshot()?)?);
        }
        Commands::Get { input, keys } => {
            let (_, view) = open(&input)?;
            let mut out = serde_json::Map::new();
            for key in keys {
                let value = match view.get(&key)? {
                    Some(field) => field.to_json()?,
                    None => serde_json::Value::Null,
                };
                out.insert(key, value);
            }
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Commands::Set { input, assignments } => {
            let (root, view) = open(&input)?;
            for (key, json) in assignments {
                view.set(key.as_str(), Value::from_json(&json))?;
                tracing::info!(key = %key, "assigned");
            }
            println!("{}", serde_json::to_string_pretty(&root.to_json())?);
        }
        Commands::Try {
            input,
            request,
            ndjson,
        } => {
            let (_, view) = open(&input)?;
            let args = match serde_json::from_str(&request)? {
                serde_json::Value::Array(args) => args,
                other => vec![other],
            };

            match view.try_dynamic(&args)? {
                TryOutcome::Batch(results) if ndjson => {
                    let mut s = sink::NdjsonSink::stdout();
                    s.write_results(&results)?;
                    let n = s.finish()?;
                    tracing::info!(rows = n, "ndjson: wrote try results");
                }
                TryOutcome::Single(result) if ndjson => {
                    let mut s = sink::NdjsonSink::stdout();
                    s.write_row(&result)?;
                    s.finish()?;
                }
                outcome => println!("{}", serde_json::to_string_pretty(&outcome)?),
            }
        }
    }

    Ok(())
}

/// Loads the document, registers class defaults and wards the root.
fn open(input: &Input) -> Result<(Obj, View), Box<dyn std::error::Error>> {
    if let Some(path) = &input.defaults {
        let defaults: BTreeMap<String, WardOptions> = serde_json::from_value(read_json(path)?)?;
        for (class, options) in defaults {
            register_class_defaults(class.as_str(), options)?;
        }
    }

    let doc = read_json(&input.doc)?;
    let root = Obj::from_json_tagged(&doc, CLASS_TAG)
        .ok_or_else(|| format!("{}: document must be a JSON object", input.doc.display()))?;

    let args = match &input.config {
        None => Vec::new(),
        Some(path) => match read_json(path)? {
            serde_json::Value::Array(args) => args,
            other => vec![other],
        },
    };
    let view = ward_args(&root, &args, &ClassRegistry::global())?;

    tracing::debug!(
        doc = %input.doc.display(),
        warded = view.is_ward(),
        "opened document"
    );

    Ok((root, view))
}

fn read_json(path: &Path) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("{}: {e}", path.display()))?;
    Ok(serde_json::from_str(&text)?)
}

/// `KEY=JSON`; a value that is not valid JSON is taken as a string.
fn parse_assignment(raw: &str) -> Result<(String, serde_json::Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=JSON, got `{raw}`"))?;
    if key.is_empty() {
        return Err(format!("empty key in `{raw}`"));
    }
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn assignment_parsing() {
        assert_eq!(
            parse_assignment("count=3").unwrap(),
            ("count".to_string(), serde_json::json!(3))
        );
        assert_eq!(
            parse_assignment("label=bag").unwrap(),
            ("label".to_string(), serde_json::json!("bag"))
        );
        assert_eq!(
            parse_assignment("a=b=c").unwrap(),
            ("a".to_string(), serde_json::json!("b=c"))
        );
        assert!(parse_assignment("novalue").is_err());
        assert!(parse_assignment("=1").is_err());
    }
}
