//! CLI: decode | describe | infer
use std::io::Read;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rayon::prelude::*;

use crate::config::ContentConfig;
use crate::decoder::{JsonDecoder, StructuralDecoder};
use crate::descriptor::{DescriptorSet, FieldDescriptor};
use crate::inference::Inference;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// decode JSON documents against configured field descriptors, or infer descriptors from samples
#[derive(Parser, Debug)]
#[command(name = "content-keymap", version, about, long_about = None)]
pub struct CommandLineInterface {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// decode every input and print the re-encoded document
    Decode(DecodeOut),
    /// print the descriptor table of a route
    Describe(DescribeOut),
    /// infer a configuration document from sample inputs
    Infer(InferOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// treat input as newline-delimited JSON (NDJSON)
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// One or more inputs. May be literal paths or quoted glob patterns or '-' for stdin
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(Args, Debug, Clone)]
struct RouteSettings {
    /// Swagger-style configuration document
    #[arg(long)]
    config: PathBuf,

    /// route including the base path (e.g. /api/v1/sensor)
    #[arg(long)]
    route: String,

    /// HTTP method of the route
    #[arg(long, default_value = "post")]
    method: String,
}

#[derive(clap::Parser, Debug)]
struct DecodeOut {
    #[command(flatten)]
    route_settings: RouteSettings,

    #[command(flatten)]
    input_settings: InputSettings,

    /// slash-delimited object path to start decoding from (e.g. data/payload)
    #[arg(long, default_value = "")]
    base_key: String,

    /// offset in hours that date fields must carry
    #[arg(long, default_value_t = crate::decoder::json::DEFAULT_TIME_ZONE_HOURS, allow_hyphen_values = true)]
    time_zone: i32,

    /// pretty-print the re-encoded documents
    #[arg(long)]
    pretty: bool,
}

#[derive(clap::Parser, Debug)]
struct DescribeOut {
    #[command(flatten)]
    route_settings: RouteSettings,
}

#[derive(clap::Parser, Debug)]
struct InferOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// route the inferred Body schema is filed under
    #[arg(long, default_value = "/")]
    route: String,

    /// HTTP method the inferred Body schema is filed under
    #[arg(long, default_value = "post")]
    method: String,

    /// add observed ranges, small integer enums, and string patterns
    #[arg(long)]
    strict: bool,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

/// One input document and where it came from.
#[derive(Debug)]
struct Document {
    label: String,
    text: String,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn load_documents(&self) -> anyhow::Result<Vec<Document>> {
        let mut documents = Vec::new();
        for source_path in resolve_file_path_patterns(&self.input)? {
            let label = source_path.to_string_lossy().to_string();
            let source = if label == "-" {
                let mut buffer = String::new();
                std::io::stdin().read_to_string(&mut buffer).context("failed to read stdin")?;
                buffer
            } else {
                std::fs::read_to_string(&source_path)
                    .with_context(|| format!("failed to read source file {label}"))?
            };
            if self.ndjson {
                let lines = source.lines().enumerate().filter(|(_, line)| !line.trim().is_empty());
                for (number, line) in lines {
                    documents.push(Document { label: format!("{label}:{}", number + 1), text: line.to_owned() });
                }
            } else {
                documents.push(Document { label, text: source });
            }
        }
        tracing::debug!(documents = documents.len(), "inputs loaded");
        Ok(documents)
    }
}

impl RouteSettings {
    fn load_descriptors(&self) -> anyhow::Result<Vec<FieldDescriptor>> {
        let config = ContentConfig::from_path(&self.config)?;
        let fields = config
            .format(&self.route, &self.method)
            .with_context(|| format!("in {}", self.config.display()))?;
        Ok(fields)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }
    /// Run the selected subcommand; the returned code is the process exit status.
    pub fn run(&self) -> anyhow::Result<u8> {
        match &self.cmd {
            Command::Decode(target) => target.run(),
            Command::Describe(target) => target.run(),
            Command::Infer(target) => target.run(),
        }
    }
}

impl DecodeOut {
    fn run(&self) -> anyhow::Result<u8> {
        let fields = DescriptorSet::new(self.route_settings.load_descriptors()?)?;
        let decoder = JsonDecoder::new().with_time_zone(self.time_zone).pretty(self.pretty);
        let documents = self.input_settings.load_documents()?;

        // descriptor table is shared read-only across workers
        let outcomes: Vec<(&str, Result<String, String>)> = documents
            .par_iter()
            .map(|document| {
                let outcome = match decoder.decode_at(&document.text, &fields, &self.base_key) {
                    Ok(content) => decoder.encode(&content).map_err(|error| error.to_string()),
                    Err(error) => Err(format!("{} ({error})", error.key())),
                };
                (document.label.as_str(), outcome)
            })
            .collect();

        let mut failed = 0usize;
        for (label, outcome) in &outcomes {
            match outcome {
                Ok(text) => {
                    eprintln!("{} {label}", "ok".green().bold());
                    println!("{text}");
                }
                Err(message) => {
                    failed += 1;
                    eprintln!("{} {label}: {message}", "error".red().bold());
                }
            }
        }
        tracing::info!(total = outcomes.len(), failed, "decode complete");
        Ok(u8::from(failed > 0))
    }
}

impl DescribeOut {
    fn run(&self) -> anyhow::Result<u8> {
        let fields = self.route_settings.load_descriptors()?;
        DescriptorSet::new(fields.clone())?;
        for field in &fields {
            println!("{}", describe_line(field));
        }
        Ok(0)
    }
}

impl InferOut {
    fn run(&self) -> anyhow::Result<u8> {
        let mut inf = Inference::new();
        for document in self.input_settings.load_documents()? {
            let value = serde_json::from_str::<serde_json::Value>(&document.text)
                .with_context(|| format!("failed to parse JSON source file ({})", document.label))?;
            inf.observe_value(&value);
        }
        let u = inf.solve();
        let fields = crate::inference::describe(&u, self.strict)?;
        // the emitted document must load back into a usable table
        DescriptorSet::new(fields.clone())?;

        let document = crate::inference::emit_document(&self.route, &self.method, &fields);
        let schema_src = serde_json::to_string_pretty(&document)?;
        if let Some(out) = self.out.as_ref() {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(out, &schema_src).with_context(|| format!("failed to write {}", out.display()))?;
            tracing::info!(out = %out.display(), fields = fields.len(), "schema written");
        } else {
            println!("{schema_src}");
        }
        Ok(0)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn describe_line(field: &FieldDescriptor) -> String {
    let mut flags = Vec::new();
    if field.omit {
        flags.push("omit".to_owned());
    }
    if field.nullable {
        flags.push("nullable".to_owned());
    }
    if field.allow_empty {
        flags.push("empty".to_owned());
    }
    if field.error_continue {
        flags.push("continue".to_owned());
    }
    if let Some(range) = field.range {
        flags.push(format!("range={}..={}", range.min, range.max));
    }
    if !field.enumeration.is_empty() {
        flags.push(format!("enum={:?}", field.enumeration));
    }
    if let Some(pattern) = &field.pattern {
        flags.push(format!("pattern=/{pattern}/"));
    }
    if field.date_format.is_some() {
        flags.push("date".to_owned());
    }
    if let Some(default) = &field.default {
        flags.push(format!("default={default:?}"));
    }
    let indent = "  ".repeat(field.depth);
    format!("{indent}{} {} {}", field.key.bold(), field.kind.to_string().cyan(), flags.join(" ").dimmed())
}

fn resolve_file_path_patterns<I>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                // an explicit glob that matched nothing is an error
                anyhow::bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
