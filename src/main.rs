//! Purpose: `sparsetab` CLI entry point and command dispatch.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: stdout carries only JSON (records or summaries); diagnostics go to stderr.
//! Invariants: Errors are emitted as a JSON envelope on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
#![allow(clippy::result_large_err)]
use std::error::Error as StdError;
use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum, ValueHint};
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;
use url::Url;

use sparsetab::api::{
    DrainOutcome, Error, ErrorKind, ErrorPolicy, IngestConfig, IngestOutcome, StorageObject,
    Table, TableOptions, drain_to, for_url, load, load_reader, to_exit_code,
};
use sparsetab::uri::path_to_url;

#[derive(Parser)]
#[command(
    name = "sparsetab",
    version,
    about = "Accumulate sparse JSON records and drain them compactly",
    long_about = None,
    after_help = r#"EXAMPLES
  $ sparsetab pack events.jsonl --output file:///tmp/packed.jsonl
  $ cat events.jsonl | sparsetab pack - --dense
  $ sparsetab ls file:///tmp
  $ sparsetab rm /tmp/packed.jsonl

Inputs and outputs are URLs (file://, http://, https://) or local paths.
Records are JSON objects, one per line. Empty strings, zeros and nulls are dropped on output."#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(
        short,
        long,
        action = clap::ArgAction::Count,
        global = true,
        help = "Raise log verbosity on stderr (-v debug, -vv trace); RUST_LOG overrides"
    )]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, PartialEq, ValueEnum)]
enum ErrorPolicyCli {
    Stop,
    Skip,
}

impl From<ErrorPolicyCli> for ErrorPolicy {
    fn from(policy: ErrorPolicyCli) -> Self {
        match policy {
            ErrorPolicyCli::Stop => ErrorPolicy::Stop,
            ErrorPolicyCli::Skip => ErrorPolicy::Skip,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(
        about = "Load JSONL records into a table and drain them",
        long_about = r#"Load one or more JSONL inputs into a single table, then drain it.

Without --output the drained records are written to stdout as JSONL.
With --output they are uploaded there and a JSON summary is printed."#
    )]
    Pack {
        #[arg(required = true, help = "Input URLs or paths; `-` reads stdin", value_hint = ValueHint::AnyPath)]
        inputs: Vec<String>,
        #[arg(long, short, help = "Output URL or path for the drained JSONL", value_hint = ValueHint::AnyPath)]
        output: Option<String>,
        #[arg(long, help = "Store records densely instead of compacting absent runs")]
        dense: bool,
        #[arg(long, default_value = "stop", value_enum, help = "Bad record policy: stop|skip")]
        errors: ErrorPolicyCli,
        #[arg(long, default_value_t = 1024 * 1024, help = "Reject input records larger than this many bytes")]
        max_record_bytes: usize,
    },
    #[command(about = "List storage objects under a URL or path")]
    Ls {
        #[arg(help = "URL or path", value_hint = ValueHint::AnyPath)]
        url: String,
    },
    #[command(about = "Delete storage objects")]
    Rm {
        #[arg(required = true, help = "URLs or paths", value_hint = ValueHint::AnyPath)]
        urls: Vec<String>,
    },
}

fn main() {
    let exit_code = match run() {
        Ok(()) => 0,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<(), Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if !err.use_stderr() => {
            err.print().map_err(|io_err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to write help")
                    .with_source(io_err)
            })?;
            return Ok(());
        }
        Err(err) => {
            let message = err.kind().as_str().unwrap_or("invalid arguments");
            return Err(Error::new(ErrorKind::Usage)
                .with_message(message)
                .with_hint(err.render().to_string().trim().to_string()));
        }
    };

    init_tracing(cli.verbose);

    match cli.command {
        Command::Pack {
            inputs,
            output,
            dense,
            errors,
            max_record_bytes,
        } => {
            let options = TableOptions::new().with_compacted(!dense);
            let config = IngestConfig::new()
                .with_errors(errors.into())
                .with_max_record_bytes(max_record_bytes);
            pack(&inputs, output.as_deref(), options, config)
        }
        Command::Ls { url } => {
            let url = resolve_url(&url)?;
            let service = for_url(&url)?;
            for object in service.list(&url)? {
                emit_json(&object_json(&object))?;
            }
            Ok(())
        }
        Command::Rm { urls } => {
            for url in urls {
                let url = resolve_url(&url)?;
                let service = for_url(&url)?;
                let object = service.object(&url)?;
                service.delete(&object)?;
                emit_json(&json!({ "deleted": url }))?;
            }
            Ok(())
        }
    }
}

fn pack(
    inputs: &[String],
    output: Option<&str>,
    options: TableOptions,
    config: IngestConfig,
) -> Result<(), Error> {
    let table = Table::new(options);
    let mut loaded = IngestOutcome::default();
    for input in inputs {
        let outcome = if input == "-" {
            load_reader(&table, io::stdin().lock(), config, |_| {})?
        } else {
            load(&table, &resolve_url(input)?, config, |_| {})?
        };
        loaded.ok += outcome.ok;
        loaded.failed += outcome.failed;
        loaded.records_total += outcome.records_total;
    }

    let fields = table
        .fields()
        .iter()
        .map(|field| field.name().to_string())
        .collect::<Vec<_>>();
    let values = table.size();

    let Some(output) = output else {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        table.range(|mapping| {
            write_json_line(&mut out, &Value::Object(mapping))?;
            Ok::<_, Error>(true)
        })?;
        return Ok(());
    };

    let output = resolve_url(output)?;
    let service = for_url(&output)?;
    let DrainOutcome { records, bytes } = drain_to(&table, &*service, &output)?;
    emit_json(&json!({
        "output": output,
        "loaded": loaded.ok,
        "records": records,
        "bytes": bytes,
        "failed": loaded.failed,
        "values": values,
        "fields": fields,
    }))
}

/// Accept URLs as-is and turn bare paths into absolute `file` URLs.
fn resolve_url(input: &str) -> Result<String, Error> {
    if let Ok(url) = Url::parse(input) {
        // Single-letter schemes are Windows drive letters, not URLs.
        if url.scheme().len() > 1 {
            return Ok(input.to_string());
        }
    }
    let path = std::path::absolute(PathBuf::from(input)).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("cannot resolve path")
            .with_path(input)
            .with_source(err)
    })?;
    path_to_url(path)
}

fn object_json(object: &StorageObject) -> Value {
    let mut map = Map::new();
    map.insert("url".to_string(), json!(object.url()));
    map.insert("name".to_string(), json!(object.name()));
    map.insert("kind".to_string(), json!(object.kind()));
    map.insert("size".to_string(), json!(object.size()));
    if let Some(modified) = object.modified_rfc3339() {
        map.insert("modified".to_string(), json!(modified));
    }
    Value::Object(map)
}

fn write_json_line(out: &mut impl Write, value: &Value) -> Result<(), Error> {
    serde_json::to_writer(&mut *out, value).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to write output")
            .with_source(err)
    })?;
    out.write_all(b"\n").map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to write output")
            .with_source(err)
    })
}

fn emit_json(value: &Value) -> Result<(), Error> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_json_line(&mut out, value)
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert(
        "message".to_string(),
        json!(err.message().unwrap_or("error")),
    );
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(url) = err.url() {
        inner.insert("url".to_string(), json!(url));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    let mut causes = Vec::new();
    let mut source = StdError::source(err);
    while let Some(cause) = source {
        causes.push(json!(cause.to_string()));
        source = cause.source();
    }
    if !causes.is_empty() {
        inner.insert("causes".to_string(), Value::Array(causes));
    }
    json!({ "error": Value::Object(inner) })
}

fn emit_error(err: &Error) {
    let json = serde_json::to_string(&error_json(err)).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // A subscriber installed earlier in the process stays in place.
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init()
        .ok();
}
