//! Command-line interface for mongowire
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading and validation
//! - The codec and framing subcommands (oid, inspect, encode, decode, frame)
//! - Sending a single query to a server

pub mod completion;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::bson::{Document, ObjectId, decode_document_prefix, encode_document};
use crate::config::{Config, LogLevel};
use crate::error::{CodecError, Result, WireError};
use crate::transport::TcpTransport;
use crate::wire::{
    Framed, InsertFlags, QueryOptions, WireClient, WireMessage, build_insert_message, build_query_message,
};

pub use output::{DocumentPrinter, describe_frame};

/// BSON codec and MongoDB wire protocol toolkit
#[derive(Parser, Debug)]
#[command(
    name = "mongowire",
    version,
    about = "BSON codec and MongoDB wire protocol toolkit",
    long_about = "Encode and decode BSON, generate ObjectIds, frame legacy wire-protocol
messages and send simple queries to a MongoDB server."
)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    pub config_file: Option<PathBuf>,

    /// Server to connect to
    #[arg(long, value_name = "HOST", global = true)]
    pub host: Option<String>,

    /// Port to connect to
    #[arg(long, value_name = "PORT", global = true)]
    pub port: Option<u16>,

    /// Disable colored output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Quiet mode (errors only)
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Verbose mode (detailed logging)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Very verbose mode (trace logging)
    #[arg(long = "vv", global = true)]
    pub very_verbose: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Subcommands for mongowire
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate ObjectIds
    Oid {
        /// Number of ids to generate
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },

    /// Show the fields of an ObjectId
    Inspect {
        /// 24-character hex id
        #[arg(value_name = "ID")]
        id: String,
    },

    /// Encode Extended JSON documents as BSON
    Encode {
        /// Input file (stdin when omitted)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,

        /// Write raw bytes instead of hex
        #[arg(long)]
        raw: bool,
    },

    /// Decode BSON documents to JSON
    Decode {
        /// Input file (stdin when omitted)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,

        /// Input is hex text rather than raw bytes
        #[arg(long)]
        hex: bool,
    },

    /// Frame a request and print it
    Frame {
        /// Request kind
        #[arg(value_enum)]
        kind: FrameKind,

        /// Target namespace (database.collection)
        #[arg(long, value_name = "NS")]
        ns: String,

        /// Extended JSON input (stdin when omitted)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,

        /// Request id to put in the header
        #[arg(long, default_value_t = 1)]
        request_id: i32,
    },

    /// Send a query and print the first batch
    Query {
        /// Target namespace (database.collection)
        #[arg(long, value_name = "NS")]
        ns: String,

        /// Extended JSON filter
        #[arg(value_name = "FILTER")]
        filter: Option<String>,

        /// Documents to return; negative closes the cursor after one batch
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        limit: i32,
    },

    /// Show version information
    Version,

    /// Generate shell completion script
    Completion {
        /// Shell type (bash, zsh, fish)
        #[arg(value_name = "SHELL")]
        shell: String,
    },

    /// Show configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Validate configuration file
        #[arg(long)]
        validate: bool,
    },
}

/// Request kinds the `frame` subcommand can build
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Insert,
    Query,
}

/// CLI interface handler
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Loaded configuration
    config: Config,
}

impl CliInterface {
    /// Create a new CLI interface
    ///
    /// # Returns
    /// * `Result<Self>` - New CLI interface or error
    pub fn new() -> Result<Self> {
        let args = CliArgs::parse();
        let config = Self::load_config(&args)?;

        Ok(Self { args, config })
    }

    /// Load configuration from file and merge with arguments
    ///
    /// # Arguments
    /// * `args` - Command-line arguments
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    fn load_config(args: &CliArgs) -> Result<Config> {
        let config_path = args.config_file.as_deref();
        let mut config = Config::load_from_file(config_path)?;

        if let Err(e) = config.validate() {
            eprintln!("Warning: Configuration validation failed: {}", e);
            eprintln!("Using default configuration instead.");
            config = Config::default();
        }

        Self::apply_args_to_config(&mut config, args);

        Ok(config)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn args(&self) -> &CliArgs {
        &self.args
    }

    /// Apply CLI arguments to configuration
    ///
    /// Overrides configuration values with CLI arguments where provided
    fn apply_args_to_config(config: &mut Config, args: &CliArgs) {
        config.logging.level = if args.very_verbose {
            LogLevel::Trace
        } else if args.verbose {
            LogLevel::Debug
        } else if args.quiet {
            LogLevel::Error
        } else {
            config.logging.level
        };

        if let Some(host) = &args.host {
            config.transport.host = host.clone();
        }
        if let Some(port) = args.port {
            config.transport.port = port;
        }
    }

    fn printer(&self, pretty: bool) -> DocumentPrinter {
        DocumentPrinter::new(!self.args.no_color, pretty)
    }

    /// Handle subcommands
    ///
    /// # Returns
    /// * `Result<bool>` - True if subcommand was handled, false to continue
    pub async fn handle_subcommand(&self) -> Result<bool> {
        match &self.args.command {
            Some(Commands::Oid { count }) => {
                for _ in 0..*count {
                    println!("{}", ObjectId::new());
                }
                Ok(true)
            }
            Some(Commands::Inspect { id }) => {
                println!("{}", inspect_object_id(id)?);
                Ok(true)
            }
            Some(Commands::Encode { file, raw }) => {
                self.encode(file.as_deref(), *raw)?;
                Ok(true)
            }
            Some(Commands::Decode { file, hex }) => {
                self.decode(file.as_deref(), *hex)?;
                Ok(true)
            }
            Some(Commands::Frame {
                kind,
                ns,
                file,
                request_id,
            }) => {
                let input = read_input(file.as_deref())?;
                let message = frame_request(*kind, ns, &String::from_utf8_lossy(&input), *request_id)?;
                print!("{}", describe_frame(&message));
                Ok(true)
            }
            Some(Commands::Query { ns, filter, limit }) => {
                self.run_query(ns, filter.as_deref(), *limit).await?;
                Ok(true)
            }
            Some(Commands::Version) => {
                self.show_version();
                Ok(true)
            }
            Some(Commands::Completion { shell }) => {
                completion::generate_completion(shell)?;
                Ok(true)
            }
            Some(Commands::Config { show, validate }) => {
                self.handle_config_command(*show, *validate)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn encode(&self, file: Option<&Path>, raw: bool) -> Result<()> {
        let input = read_input(file)?;
        let documents = parse_documents(&String::from_utf8_lossy(&input))?;

        let mut stdout = io::stdout().lock();
        for doc in &documents {
            let bytes = encode_document(doc)?;
            if raw {
                stdout.write_all(&bytes)?;
            } else {
                writeln!(stdout, "{}", hex::encode(&bytes))?;
            }
        }
        stdout.flush()?;
        Ok(())
    }

    fn decode(&self, file: Option<&Path>, hex_input: bool) -> Result<()> {
        let input = read_input(file)?;
        let bytes = if hex_input { decode_hex(&input)? } else { input };

        let printer = self.printer(true);
        for doc in split_documents(&bytes)? {
            println!("{}", printer.format_document(&doc));
        }
        Ok(())
    }

    /// Connect, send one `OP_QUERY` and print the documents of the reply
    async fn run_query(&self, ns: &str, filter: Option<&str>, limit: i32) -> Result<()> {
        let query = match filter {
            Some(text) => parse_single_document(text)?,
            None => Document::new(),
        };
        let options = QueryOptions {
            number_to_return: limit,
            ..Default::default()
        };

        let transport = TcpTransport::connect(&self.config.transport).await?;
        let mut client = WireClient::new(transport);
        let reply = client.query(ns, &query, &options).await?;
        debug!(cursor_id = reply.cursor_id, returned = reply.number_returned(), "query answered");

        let printer = self.printer(true);
        for doc in &reply.documents {
            println!("{}", printer.format_document(doc));
        }
        if !reply.is_exhausted() && !self.args.quiet {
            eprintln!("cursor {} still open", reply.cursor_id);
        }
        Ok(())
    }

    /// Show version information
    fn show_version(&self) {
        println!("mongowire version {}", env!("CARGO_PKG_VERSION"));
        println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
    }

    /// Handle config subcommand
    ///
    /// # Arguments
    /// * `show` - Whether to show configuration
    /// * `validate` - Whether to validate configuration
    fn handle_config_command(&self, show: bool, validate: bool) -> Result<()> {
        if validate {
            self.validate_config_file();
        }

        if show {
            self.show_config()?;
        }

        Ok(())
    }

    /// Validate configuration file
    fn validate_config_file(&self) {
        let path = self.get_config_path();
        println!("Validating configuration file: {}", path.display());

        if !path.exists() {
            println!("Configuration file does not exist, defaults apply");
            return;
        }

        match Config::load_from_file(Some(path.as_path())) {
            Ok(config) => match config.validate() {
                Ok(_) => println!("Configuration is valid"),
                Err(e) => println!("Configuration validation failed: {}", e),
            },
            Err(e) => println!("Failed to load configuration: {}", e),
        }
    }

    /// Show effective configuration
    fn show_config(&self) -> Result<()> {
        let path = self.get_config_path();
        println!("Configuration file: {}", path.display());
        println!();
        println!("{}", self.config.to_toml()?);
        Ok(())
    }

    /// Get configuration file path (from args or default)
    fn get_config_path(&self) -> PathBuf {
        self.args
            .config_file
            .clone()
            .unwrap_or_else(Config::default_path)
    }
}

/* ========================= Subcommand helpers ========================= */

/// Read a file, or all of stdin when no file is given
fn read_input(file: Option<&Path>) -> Result<Vec<u8>> {
    match file {
        Some(path) => Ok(fs::read(path)?),
        None => {
            let mut buf = Vec::new();
            io::stdin().read_to_end(&mut buf)?;
            Ok(buf)
        }
    }
}

fn invalid_input(reason: impl Into<String>) -> WireError {
    WireError::Generic(format!("invalid input: {}", reason.into()))
}

/// Parse Extended JSON holding one document or an array of documents
fn parse_documents(text: &str) -> Result<Vec<Document>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let value: serde_json::Value = serde_json::from_str(text).map_err(|e| invalid_input(e.to_string()))?;
    match value {
        serde_json::Value::Array(items) => items.into_iter().map(Document::from_extended_json).collect(),
        other => Ok(vec![Document::from_extended_json(other)?]),
    }
}

fn parse_single_document(text: &str) -> Result<Document> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(|e| invalid_input(e.to_string()))?;
    Document::from_extended_json(value)
}

fn decode_hex(input: &[u8]) -> Result<Vec<u8>> {
    let digits: Vec<u8> = input.iter().copied().filter(|b| !b.is_ascii_whitespace()).collect();
    hex::decode(digits).map_err(|e| invalid_input(format!("hex: {e}")))
}

/// Split a byte stream of back-to-back documents
fn split_documents(mut bytes: &[u8]) -> Result<Vec<Document>> {
    let mut documents = Vec::new();
    while !bytes.is_empty() {
        let (doc, used) = decode_document_prefix(bytes)?;
        documents.push(doc);
        bytes = &bytes[used..];
    }
    Ok(documents)
}

/// Build the request the `frame` subcommand prints
///
/// # Arguments
/// * `kind` - Insert frames every input document; query uses the first
///   document as the filter
/// * `ns` - Target namespace
/// * `text` - Extended JSON input
/// * `request_id` - Header request id
fn frame_request(kind: FrameKind, ns: &str, text: &str, request_id: i32) -> Result<WireMessage<Framed>> {
    let documents = parse_documents(text)?;
    match kind {
        FrameKind::Insert => build_insert_message(request_id, ns, &documents, InsertFlags::NONE),
        FrameKind::Query => {
            let query = documents.into_iter().next().unwrap_or_default();
            build_query_message(request_id, ns, &query, &QueryOptions::default())
        }
    }
}

/// Describe the fields packed into an ObjectId
fn inspect_object_id(text: &str) -> Result<String> {
    let id: ObjectId = text.parse().map_err(|_| CodecError::MalformedIdentifier(text.to_string()))?;
    Ok(format!(
        "id:        {}\ntimestamp: {}\nmachine:   {:06x}\nprocess:   {}\ncounter:   {}",
        id,
        id.timestamp().to_rfc3339(),
        id.machine_id(),
        id.process_id(),
        id.counter()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bson::Bson;
    use crate::bson_doc;
    use crate::error::ProtocolError;
    use crate::wire::{OpCode, parse_request};

    fn cli_with(argv: &[&str]) -> CliInterface {
        let args = CliArgs::try_parse_from(argv).unwrap();
        let mut config = Config::default();
        CliInterface::apply_args_to_config(&mut config, &args);
        CliInterface { args, config }
    }

    #[test]
    fn test_cli_args_parsing() {
        let args = CliArgs::try_parse_from(["mongowire"]).unwrap();
        assert!(args.command.is_none());
        assert!(args.config_file.is_none());
    }

    #[test]
    fn test_cli_args_with_flags() {
        let args = CliArgs::try_parse_from(["mongowire", "--no-color", "--quiet", "oid", "-n", "3"]).unwrap();
        assert!(args.no_color);
        assert!(args.quiet);
        assert!(matches!(args.command, Some(Commands::Oid { count: 3 })));
    }

    #[test]
    fn test_frame_args() {
        let args = CliArgs::try_parse_from(["mongowire", "frame", "query", "--ns", "db.c", "q.json"]).unwrap();
        match args.command {
            Some(Commands::Frame { kind, ns, file, request_id }) => {
                assert_eq!(kind, FrameKind::Query);
                assert_eq!(ns, "db.c");
                assert_eq!(file, Some(PathBuf::from("q.json")));
                assert_eq!(request_id, 1);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(CliArgs::try_parse_from(["mongowire", "frame", "upsert", "--ns", "db.c"]).is_err());
    }

    #[test]
    fn test_query_limit_accepts_negative() {
        let args = CliArgs::try_parse_from(["mongowire", "query", "--ns", "db.c", "--limit", "-1"]).unwrap();
        assert!(matches!(args.command, Some(Commands::Query { limit: -1, .. })));
    }

    #[test]
    fn test_args_override_config() {
        let cli = cli_with(&["mongowire", "--host", "10.0.0.5", "--port", "27018", "-v"]);
        assert_eq!(cli.config().transport.address(), "10.0.0.5:27018");
        assert_eq!(cli.config().logging.level, LogLevel::Debug);

        let cli = cli_with(&["mongowire", "-q"]);
        assert_eq!(cli.config().logging.level, LogLevel::Error);
        assert_eq!(cli.config().transport.port, 27017);
    }

    #[test]
    fn test_parse_documents_accepts_object_or_array() {
        let one = parse_documents(r#"{"Name": "DBTest", "n": {"$numberLong": "42"}}"#).unwrap();
        assert_eq!(one, vec![bson_doc! { "Name" => "DBTest", "n" => Bson::Int64(42) }]);

        // a small $numberLong stays a 64-bit integer on the wire
        let long = parse_documents(r#"{"n": {"$numberLong": "42"}}"#).unwrap();
        let bytes = encode_document(&long[0]).unwrap();
        assert_eq!(bytes[4], 0x12);
        assert_eq!(bytes.len(), 4 + 1 + 2 + 8 + 1);

        let many = parse_documents(r#"[{"a": 1}, {"b": 2}]"#).unwrap();
        assert_eq!(many.len(), 2);

        assert!(parse_documents("  \n").unwrap().is_empty());
        assert!(parse_documents("[1, 2]").is_err());
        assert!(parse_documents("{not json").is_err());
    }

    #[test]
    fn test_decode_hex_ignores_whitespace() {
        let bytes = encode_document(&bson_doc! { "a" => 1 }).unwrap();
        let mut text = hex::encode(&bytes).into_bytes();
        text.extend_from_slice(b"\n");
        assert_eq!(decode_hex(&text).unwrap(), bytes);
        assert!(decode_hex(b"zz").is_err());
    }

    #[test]
    fn test_split_back_to_back_documents() {
        let first = bson_doc! { "a" => 1 };
        let second = bson_doc! { "b" => Bson::Null };
        let mut bytes = encode_document(&first).unwrap();
        bytes.extend(encode_document(&second).unwrap());

        assert_eq!(split_documents(&bytes).unwrap(), vec![first, second]);
        assert!(split_documents(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn test_frame_request_insert() {
        let message = frame_request(FrameKind::Insert, "benchmark.dbinfo", r#"[{"a": 1}, {"a": 2}]"#, 9).unwrap();
        assert_eq!(message.op_code(), OpCode::Insert);
        let (header, op) = parse_request(message.as_bytes()).unwrap();
        assert_eq!(header.request_id, 9);
        assert_eq!(op.namespace().map(|ns| ns.as_str()), Some("benchmark.dbinfo"));
    }

    #[test]
    fn test_frame_request_query_defaults_to_empty_filter() {
        let message = frame_request(FrameKind::Query, "db.c", "", 1).unwrap();
        assert_eq!(message.op_code(), OpCode::Query);
        assert!(frame_request(FrameKind::Insert, "db.c", "", 1).is_err());

        let err = frame_request(FrameKind::Query, "nodot", "{}", 1).unwrap_err();
        assert!(matches!(err.as_protocol(), Some(ProtocolError::InvalidNamespace(_))));
    }

    #[test]
    fn test_inspect_object_id() {
        let text = inspect_object_id("4d0a86f3b6c5a3000a000001").unwrap();
        assert!(text.contains("2010-12-16T"));
        assert!(text.contains("machine:   b6c5a3"));
        assert!(text.contains("process:   10"));
        assert!(text.contains("counter:   1"));
        assert!(inspect_object_id("xyz").is_err());
    }
}
