use std::time::Duration;

use anyhow::{Context, Result};
use chunked_engine::ChunkedStorage;
use chunked_store::{FsChunkedStorageProvider, FsRecordStore, RecordChunkedStorageProvider};
use chunked_types::ObjectMetadata;
use colored::Colorize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cli::*;
use crate::config::CliConfig;

type Storage = ChunkedStorage<FsChunkedStorageProvider>;

pub async fn run_command(cli: Cli) -> Result<()> {
    let config = CliConfig::load(cli.config.as_deref())?;
    let root = config.root(cli.root);
    debug!(root = %root.display(), "opening store");
    let store = FsRecordStore::open(root.clone())
        .await
        .with_context(|| format!("opening store {}", root.display()))?;
    let storage = ChunkedStorage::new(RecordChunkedStorageProvider::new(store))
        .with_writer_config(config.writer_config())
        .with_reader_config(config.reader_config());

    let format = cli.format;
    match cli.command {
        Command::Put(args) => cmd_put(&storage, args, format, cancel_on_ctrl_c()).await,
        Command::Get(args) => cmd_get(&storage, args, format, cancel_on_ctrl_c()).await,
        Command::Info(args) => cmd_info(&storage, args, format).await,
        Command::Rm(args) => cmd_rm(&storage, args, format).await,
        Command::Keys(args) => cmd_keys(&storage, args, format).await,
    }
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });
    token
}

/// What put, get and rm print once they succeed: a one-line summary, or the
/// object's metadata in JSON mode.
fn outcome(format: OutputFormat, meta: &ObjectMetadata, summary: String) -> Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(meta)?,
        OutputFormat::Text => format!("{} {summary}", "✓".green().bold()),
    })
}

async fn cmd_put(
    storage: &Storage,
    args: PutArgs,
    format: OutputFormat,
    cancel: CancellationToken,
) -> Result<()> {
    let input: Box<dyn AsyncRead + Unpin + Send> = match file_arg(&args.input) {
        Some(path) => Box::new(
            tokio::fs::File::open(path)
                .await
                .with_context(|| format!("opening {}", path.display()))?,
        ),
        None => Box::new(tokio::io::stdin()),
    };

    let mut writer = storage
        .new_writer(&args.name, input)
        .with_cancellation(cancel);
    if let Some(size) = args.chunk_size {
        writer = writer.with_chunk_size(size);
    }
    if let Some(level) = args.concurrency {
        writer = writer.with_concurrency_level(level);
    }
    if let Some(secs) = args.ttl {
        writer = writer.with_ttl(Duration::from_secs(secs));
    }
    if let Some(attributes) = args.attributes {
        writer = writer.with_attributes(attributes);
    }

    let meta = writer
        .call()
        .await
        .with_context(|| format!("writing {}", args.name))?;
    let summary = format!(
        "Stored {} ({} bytes in {} chunks)",
        meta.name.yellow(),
        meta.object_size,
        meta.chunk_count
    );
    println!("{}", outcome(format, &meta, summary)?);
    Ok(())
}

async fn cmd_get(
    storage: &Storage,
    args: GetArgs,
    format: OutputFormat,
    cancel: CancellationToken,
) -> Result<()> {
    let Some(path) = file_arg(&args.output) else {
        read_into(storage, &args, tokio::io::stdout(), cancel).await?;
        return Ok(());
    };

    let file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("creating {}", path.display()))?;
    let meta = match read_into(storage, &args, file, cancel).await {
        Ok(meta) => meta,
        Err(e) => {
            // A failed read leaves an unusable prefix behind.
            let _ = tokio::fs::remove_file(path).await;
            return Err(e);
        }
    };
    let summary = format!(
        "Wrote {} bytes of {} to {}",
        meta.object_size,
        meta.name.yellow(),
        path.display()
    );
    println!("{}", outcome(format, &meta, summary)?);
    Ok(())
}

async fn read_into<W>(
    storage: &Storage,
    args: &GetArgs,
    output: W,
    cancel: CancellationToken,
) -> Result<ObjectMetadata>
where
    W: AsyncWrite + Unpin + Send,
{
    let mut reader = storage
        .new_reader(&args.name, output)
        .with_cancellation(cancel);
    if let Some(size) = args.batch_size {
        reader = reader.with_batch_size(size);
    }
    if let Some(level) = args.concurrency {
        reader = reader.with_concurrency_level(level);
    }
    reader
        .call()
        .await
        .with_context(|| format!("reading {}", args.name))
}

async fn cmd_info(storage: &Storage, args: InfoArgs, format: OutputFormat) -> Result<()> {
    let meta = storage
        .new_info_reader(&args.name)
        .call()
        .await
        .with_context(|| format!("loading {}", args.name))?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&meta)?),
        OutputFormat::Text => print_metadata(&meta),
    }
    Ok(())
}

fn print_metadata(meta: &ObjectMetadata) {
    println!("{} {}", "Object".bold(), meta.name.yellow());
    println!("  Size:       {} bytes", meta.object_size);
    println!("  Chunk size: {} bytes", meta.chunk_size);
    println!("  Chunks:     {}", meta.chunk_count);
    if let Some(ttl) = meta.ttl {
        println!("  TTL:        {}s", ttl.as_secs());
    }
    if let Some(attributes) = &meta.attributes {
        println!("  Attributes: {}", attributes.cyan());
    }
}

async fn cmd_rm(storage: &Storage, args: RmArgs, format: OutputFormat) -> Result<()> {
    let meta = storage
        .new_deleter(&args.name)
        .call()
        .await
        .with_context(|| format!("deleting {}", args.name))?;
    let summary = format!("Deleted {} ({} chunks)", meta.name.yellow(), meta.chunk_count);
    println!("{}", outcome(format, &meta, summary)?);
    Ok(())
}

async fn cmd_keys(storage: &Storage, args: KeysArgs, format: OutputFormat) -> Result<()> {
    let meta = storage
        .new_info_reader(&args.name)
        .call()
        .await
        .with_context(|| format!("loading {}", args.name))?;
    let keys: Vec<String> = meta.chunk_keys().collect();
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&keys)?),
        OutputFormat::Text => {
            for key in &keys {
                println!("{key}");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(root: &std::path::Path, args: &[&str]) -> Cli {
        let mut argv = vec!["chunked", "--root", root.to_str().unwrap()];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[tokio::test]
    async fn put_get_rm_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("store");
        let input = dir.path().join("in.txt");
        let output = dir.path().join("out.txt");
        let data = b"abcdefghijklmnopqrstuvwxyz_".repeat(100);
        std::fs::write(&input, &data).unwrap();

        run_command(cli(
            &store,
            &["put", "MyObject", input.to_str().unwrap(), "--chunk-size", "100"],
        ))
        .await
        .unwrap();
        run_command(cli(
            &store,
            &["get", "MyObject", output.to_str().unwrap(), "--batch-size", "11", "--concurrency", "3"],
        ))
        .await
        .unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), data);

        run_command(cli(&store, &["info", "MyObject", "--format", "json"]))
            .await
            .unwrap();
        run_command(cli(&store, &["keys", "MyObject"])).await.unwrap();
        run_command(cli(&store, &["rm", "MyObject"])).await.unwrap();
        assert!(run_command(cli(&store, &["info", "MyObject"])).await.is_err());
    }

    #[test]
    fn outcome_follows_output_format() {
        let meta = ObjectMetadata::new("MyObject", 2700, 100, 27);

        let json = outcome(OutputFormat::Json, &meta, "ignored".into()).unwrap();
        let parsed: ObjectMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, meta);
        assert!(!json.contains("ignored"));

        let text = outcome(OutputFormat::Text, &meta, "Deleted MyObject".into()).unwrap();
        assert!(text.ends_with("Deleted MyObject"));
    }

    #[tokio::test]
    async fn json_format_applies_to_every_command() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("store");
        let input = dir.path().join("in.bin");
        let output = dir.path().join("out.bin");
        std::fs::write(&input, [1u8; 250]).unwrap();

        for args in [
            vec!["--format", "json", "put", "obj", input.to_str().unwrap()],
            vec!["--format", "json", "get", "obj", output.to_str().unwrap()],
            vec!["--format", "json", "rm", "obj"],
        ] {
            let cli = cli(&store, &args);
            assert_eq!(cli.format, OutputFormat::Json);
            run_command(cli).await.unwrap();
        }
        assert_eq!(std::fs::read(&output).unwrap(), vec![1u8; 250]);
    }

    #[tokio::test]
    async fn failed_get_removes_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("store");
        let output = dir.path().join("out.bin");

        let err = run_command(cli(&store, &["get", "ghost", output.to_str().unwrap()]))
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("object not found"));
        assert!(!output.exists());
    }
}
