//! Purpose: `scheme-codec` CLI entry point.
//! Role: Binary crate root; re-frames and validates YAML/JSON document streams on stdio.
//! Invariants: Documents go to stdout; errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
//! Invariants: Works on untyped documents; no registry is involved.
use std::error::Error as StdError;
use std::io::{self, Write};

use clap::{Parser, Subcommand, ValueEnum, error::ErrorKind as ClapErrorKind};
use serde_json::{Map, Value, json};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use scheme_codec::api::{
    CodecCatalog, ContentType, DEFAULT_MAX_FRAME_BYTES, Error, ErrorKind, FrameLimits,
    FrameReader, FrameWriter, StreamFrameReader, StreamFrameWriter, to_exit_code,
};

#[derive(Parser, Debug)]
#[command(
    name = "scheme-codec",
    version,
    about = "Re-frame and validate multi-document YAML/JSON streams",
    arg_required_else_help = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        default_value_t = DEFAULT_MAX_FRAME_BYTES,
        help = "Largest accepted document in bytes"
    )]
    max_frame_bytes: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read documents from stdin and write them to stdout in another format.
    Reframe {
        #[arg(long, value_enum)]
        from: Format,
        #[arg(long, value_enum)]
        to: Format,
        #[arg(long, help = "Emit compact output (JSON only; YAML has one layout)")]
        compact: bool,
        #[arg(long, help = "Reject duplicate keys")]
        strict: bool,
    },
    /// Parse every document on stdin and report how many were read.
    Check {
        #[arg(long = "in", value_enum)]
        input: Format,
        #[arg(long, help = "Reject duplicate keys")]
        strict: bool,
    },
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Format {
    Yaml,
    Json,
}

impl From<Format> for ContentType {
    fn from(format: Format) -> Self {
        match format {
            Format::Yaml => ContentType::Yaml,
            Format::Json => ContentType::Json,
        }
    }
}

fn main() {
    init_tracing();
    let exit_code = match run() {
        Ok(code) => code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn run() -> Result<i32, Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let code = if err.kind() == ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand {
                    2
                } else {
                    0
                };
                return Ok(code);
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint("Try `scheme-codec --help`."));
            }
        },
    };

    let limits = FrameLimits {
        max_frame_bytes: cli.max_frame_bytes,
    };
    let catalog = CodecCatalog::default();
    let stdin = io::stdin().lock();

    match cli.command {
        Command::Reframe {
            from,
            to,
            compact,
            strict,
        } => {
            let mut reader = StreamFrameReader::from_reader(from.into(), stdin).with_limits(limits);
            let mut writer = StreamFrameWriter::new(to.into(), io::stdout().lock());
            let decode = catalog.serializer_for(from.into())?.compact.clone();
            let encode = catalog.serializer_for(to.into())?.select(!compact);
            while let Some(frame) = reader.read_frame()? {
                let value = decode.decode_value(&frame, strict)?;
                writer.write_frame(&encode.encode_value(&value)?)?;
            }
            debug!(documents = writer.frames_written(), "reframe complete");
            Ok(0)
        }
        Command::Check { input, strict } => {
            let mut reader = StreamFrameReader::from_reader(input.into(), stdin).with_limits(limits);
            let decode = catalog.serializer_for(input.into())?.compact.clone();
            let mut documents = 0u64;
            while let Some(frame) = reader.read_frame()? {
                decode
                    .decode_value(&frame, strict)
                    .map_err(|err| err.with_index(documents as usize))?;
                documents += 1;
            }
            emit_json(&json!({ "documents": documents }))?;
            Ok(0)
        }
    }
}

fn emit_json(value: &Value) -> Result<(), Error> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, value)
        .map_err(io::Error::from)
        .and_then(|()| stdout.write_all(b"\n"))
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to write output")
                .with_source(err)
        })
}

fn emit_error(err: &Error) {
    let json = serde_json::to_string(&error_json(err)).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Io\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = StdError::source(err);
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert(
        "message".to_string(),
        json!(err.message().map_or_else(|| err.to_string(), str::to_string)),
    );
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(index) = err.index() {
        inner.insert("index".to_string(), json!(index));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}
