use std::fs::{self, File};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use prost::Message;
use prost_reflect::{DescriptorPool, Kind, MessageDescriptor};
use prost_types::FileDescriptorSet;

use pbconv::arrow::ArrowColumnSink;
use pbconv::wire::StreamSource;
use pbconv::{default_column_type, Column, RowReader};

/// Check if an error is a broken pipe (EPIPE).
/// This happens when piping to commands like `head` that close early.
fn is_broken_pipe<E: std::error::Error + ?Sized>(err: &E) -> bool {
    let err_str = err.to_string().to_lowercase();
    if err_str.contains("broken pipe") {
        return true;
    }
    let mut source = err.source();
    while let Some(e) = source {
        if e.to_string().to_lowercase().contains("broken pipe") {
            return true;
        }
        source = e.source();
    }
    false
}

/// Decode length-delimited protobuf streams into Arrow columns
#[derive(Parser, Debug)]
#[command(name = "pbconv", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Decode a stream file and print the resulting table
    Decode(DecodeArgs),
}

#[derive(Parser, Debug)]
struct DecodeArgs {
    /// Input stream of length-delimited protobuf messages
    input: PathBuf,

    /// Serialized FileDescriptorSet (protoc --descriptor_set_out)
    #[arg(long)]
    descriptors: PathBuf,

    /// Fully-qualified root message type
    #[arg(long = "message-type")]
    message_type: String,

    /// Projected columns, dotted paths for nested fields
    /// (default: every top-level scalar field)
    #[arg(long, value_delimiter = ',')]
    columns: Vec<String>,

    /// Stop after this many rows
    #[arg(long)]
    limit: Option<usize>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Decode(args) => decode(args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if is_broken_pipe(e.as_ref()) {
                return ExitCode::SUCCESS;
            }
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn decode(args: DecodeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let descriptor_bytes = fs::read(&args.descriptors)?;
    let fds = FileDescriptorSet::decode(descriptor_bytes.as_slice())?;
    let pool = DescriptorPool::from_file_descriptor_set(fds)?;
    let message = pool
        .get_message_by_name(&args.message_type)
        .ok_or_else(|| format!("message type not found: {}", args.message_type))?;

    let columns = if args.columns.is_empty() {
        default_columns(&message)
    } else {
        resolve_columns(&message, &args.columns)?
    };

    let source = StreamSource::new(File::open(&args.input)?);
    let mut reader = RowReader::new(source, &message, &columns)?;
    let mut sink = ArrowColumnSink::new(&columns)?;

    let mut rows = 0usize;
    while reader.read_row(&mut sink)? {
        rows += 1;
        if args.limit.is_some_and(|limit| rows >= limit) {
            break;
        }
    }

    let batch = sink.finish_batch()?;
    arrow::util::pretty::print_batches(&[batch])?;
    Ok(())
}

/// Every top-level scalar field of the message, in declaration order.
fn default_columns(message: &MessageDescriptor) -> Vec<Column> {
    message
        .fields()
        .filter_map(|f| default_column_type(&f).map(|ty| Column::new(f.name(), ty)))
        .collect()
}

/// Resolve explicit column names, defaulting each column's type from the
/// descriptor field it lands on.
fn resolve_columns(
    message: &MessageDescriptor,
    names: &[String],
) -> Result<Vec<Column>, Box<dyn std::error::Error>> {
    let mut columns = Vec::new();
    for name in names {
        let mut current = message.clone();
        let segments: Vec<&str> = name.split('.').collect();
        let mut field = None;
        for (depth, segment) in segments.iter().enumerate() {
            let f = current
                .get_field_by_name(segment)
                .ok_or_else(|| format!("column '{name}' does not match any field"))?;
            if depth + 1 < segments.len() {
                match f.kind() {
                    Kind::Message(inner) => current = inner,
                    _ => return Err(format!("column '{name}': '{segment}' is not a message").into()),
                }
            }
            field = Some(f);
        }
        let field = field.ok_or_else(|| format!("column '{name}' is empty"))?;
        let ty = default_column_type(&field)
            .ok_or_else(|| format!("column '{name}' names a message, not a scalar field"))?;
        columns.push(Column::new(name.clone(), ty));
    }
    Ok(columns)
}
