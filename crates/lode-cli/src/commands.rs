use anyhow::Context;
use bytes::Bytes;
use colored::Colorize;
use futures::TryStreamExt;
use lode_gate::{GateConfig, ValidatingDataAccessor, ValidatorChain};
use lode_store::{DataAccessor, FileDataAccessor};
use lode_stream::{channel, GuardedStream};
use lode_types::{RepresentationMetadata, ResourceIdentifier};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

use crate::cli::*;

const READ_CHUNK: usize = 64 * 1024;

type Accessor = ValidatingDataAccessor<FileDataAccessor, ValidatorChain>;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let accessor = open(&cli)?;
    match cli.command {
        Command::Put(args) => cmd_put(&accessor, args).await,
        Command::Get(args) => cmd_get(&accessor, args).await,
        Command::Meta(args) => cmd_meta(&accessor, args, &cli.format).await,
        Command::Ls(args) => cmd_ls(&accessor, args, &cli.format).await,
        Command::Mkdir(args) => cmd_mkdir(&accessor, args).await,
        Command::Rm(args) => cmd_rm(&accessor, args).await,
    }
}

fn open(cli: &Cli) -> anyhow::Result<Accessor> {
    let config = match &cli.config {
        Some(path) => GateConfig::load(path)
            .with_context(|| format!("loading gate configuration {}", path.display()))?,
        None => GateConfig::default(),
    };
    let store = FileDataAccessor::new(&cli.root)
        .with_context(|| format!("opening store at {}", cli.root.display()))?;
    let chain = config.build_chain();
    tracing::info!(root = %cli.root.display(), validators = ?chain.names(), "store opened");
    Ok(ValidatingDataAccessor::new(store, chain))
}

/// Stream `reader` into a guarded stream from a background task.
///
/// A read error aborts the stream, so the write it feeds fails without
/// storing anything.
fn stream_reader<R>(reader: R) -> GuardedStream
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (mut tx, rx) = channel(8);
    tokio::spawn(async move {
        let mut reader = reader;
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => return tx.finish(),
                Ok(n) => {
                    if tx.send(Bytes::copy_from_slice(&buf[..n])).await.is_err() {
                        return;
                    }
                }
                Err(err) => return tx.abort(err.into()),
            }
        }
    });
    rx
}

async fn cmd_put(accessor: &Accessor, args: PutArgs) -> anyhow::Result<()> {
    let data = match &args.file {
        Some(path) => stream_reader(
            tokio::fs::File::open(path)
                .await
                .with_context(|| format!("opening {}", path.display()))?,
        ),
        None => stream_reader(tokio::io::stdin()),
    };
    let metadata = RepresentationMetadata::new(args.id.clone()).with_content_type(args.content_type);
    accessor.write_document(&args.id, data, metadata).await?;

    let stored = accessor.get_metadata(&args.id).await?;
    println!(
        "{} Stored {} ({} bytes)",
        "✓".green().bold(),
        args.id.path().bold(),
        stored.content_length().unwrap_or_default()
    );
    Ok(())
}

async fn cmd_get(accessor: &Accessor, args: GetArgs) -> anyhow::Result<()> {
    let mut data = accessor.get_data(&args.id).await?;
    let mut stdout = tokio::io::stdout();
    while let Some(chunk) = data.try_next().await? {
        stdout.write_all(&chunk).await?;
    }
    stdout.flush().await?;
    Ok(())
}

async fn cmd_meta(accessor: &Accessor, args: MetaArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let metadata = accessor.get_metadata(&args.id).await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&metadata)?),
        OutputFormat::Text => {
            println!("{}", metadata.identifier().path().yellow().bold());
            for (predicate, values) in metadata.properties() {
                for value in values {
                    println!("  {} {}", predicate.dimmed(), value);
                }
            }
        }
    }
    Ok(())
}

async fn cmd_ls(accessor: &Accessor, args: LsArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let children: Vec<RepresentationMetadata> =
        accessor.get_children(&args.id).try_collect().await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&children)?),
        OutputFormat::Text => {
            if children.is_empty() {
                println!("{} is empty.", args.id.path());
            }
            for child in &children {
                print_child(child);
            }
        }
    }
    Ok(())
}

fn print_child(child: &RepresentationMetadata) {
    let name = display_name(child.identifier());
    if child.is_container() {
        println!("{}", name.blue().bold());
    } else {
        let size = child
            .content_length()
            .map(|len| len.to_string())
            .unwrap_or_else(|| "-".into());
        let content_type = child.content_type().unwrap_or("-");
        println!("{:>10}  {:<28} {}", size, content_type.dimmed(), name);
    }
}

fn display_name(identifier: &ResourceIdentifier) -> String {
    if identifier.is_container() {
        format!("{}/", identifier.name())
    } else {
        identifier.name().to_string()
    }
}

async fn cmd_mkdir(accessor: &Accessor, args: MkdirArgs) -> anyhow::Result<()> {
    let metadata = RepresentationMetadata::container(args.id.clone());
    accessor.write_container(&args.id, metadata).await?;
    println!("{} Created {}", "✓".green().bold(), args.id.path().bold());
    Ok(())
}

async fn cmd_rm(accessor: &Accessor, args: RmArgs) -> anyhow::Result<()> {
    accessor.delete_resource(&args.id).await?;
    println!("{} Deleted {}", "✓".green().bold(), args.id.path().bold());
    Ok(())
}
