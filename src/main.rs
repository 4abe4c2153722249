//! CLI entry point for the ipums-extract tool.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use ipums_extract::{
    DownloadOptions, Extract, ExtractRef, IpumsApiClient, define_extract_from_ddi,
    define_extract_from_file, read_ipums_ddi, save_extract_as_json,
};
use serde_json::Value;
use tracing::{debug, info};

mod cli;
mod config;

use cli::{Args, Command};
use config::{LoadedConfig, Overrides};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, command = args.command.name(), "CLI arguments parsed");

    let loaded = config::load_default_file_config()?;
    if let Some(path) = loaded.path.as_deref().filter(|_| loaded.config.is_some()) {
        debug!(path = %path.display(), "loaded config file");
    }

    if let Command::FromDdi { codebook, output } = &args.command {
        return from_ddi(codebook, output.as_deref());
    }

    let overrides = Overrides {
        api_key: args.api_key.clone(),
        base_url: args.base_url.clone(),
    };
    let client_config =
        config::resolve_client_config(&overrides, &loaded, |name| std::env::var(name).ok())?;
    let client = IpumsApiClient::new(&client_config).context("Failed to create API client")?;
    run(args.command, &client, &loaded).await
}

async fn run(command: Command, client: &IpumsApiClient, loaded: &LoadedConfig) -> Result<()> {
    let default_dir = || {
        loaded
            .config
            .as_ref()
            .and_then(|cfg| cfg.download_dir.clone())
            .unwrap_or_else(|| PathBuf::from("."))
    };

    match command {
        Command::Submit {
            definition,
            wait,
            download_dir,
        } => {
            let extracts = define_extract_from_file(&definition)
                .with_context(|| format!("Failed to read '{}'", definition.display()))?;
            for extract in extracts {
                let submitted = client.submit_extract(&extract).await?;
                let target = ExtractRef::new(
                    submitted.collection(),
                    submitted.extract_id().unwrap_or_default(),
                );
                println!("{} {}: {}", target.collection, target.extract_id, submitted.status());

                if !wait && download_dir.is_none() {
                    continue;
                }
                let completed = client.wait_for_extract(&submitted).await?;
                println!("{} {}: {}", target.collection, target.extract_id, completed.status());
                if let Some(dir) = &download_dir {
                    download(client, &target, dir, &DownloadOptions::default()).await?;
                }
            }
        }
        Command::Status {
            collection,
            extract_id,
        } => {
            let lookup = client
                .extract_status(&ExtractRef::new(collection.as_str(), extract_id))
                .await?;
            println!("{collection} {extract_id}: {lookup}");
        }
        Command::Wait {
            collection,
            extract_id,
            timeout_secs,
        } => {
            let extract = client
                .get_extract(&ExtractRef::new(collection.as_str(), extract_id))
                .await?;
            let completed = match timeout_secs {
                Some(secs) => {
                    let policy = client
                        .wait_policy()
                        .clone()
                        .with_timeout(Duration::from_secs(secs));
                    client.wait_for_extract_with(&extract, &policy).await?
                }
                None => client.wait_for_extract(&extract).await?,
            };
            println!("{collection} {extract_id}: {}", completed.status());
        }
        Command::Download {
            collection,
            extract_id,
            dir,
            stata,
            spss,
            sas,
            r,
        } => {
            let options = DownloadOptions {
                stata,
                spss,
                sas,
                r,
            };
            let dir = dir.unwrap_or_else(default_dir);
            download(client, &ExtractRef::new(collection, extract_id), &dir, &options).await?;
        }
        Command::History { collection, limit } => {
            let limit = usize::try_from(limit).context("--limit out of range")?;
            let history = client.retrieve_previous_extracts(&collection, limit).await?;
            for extract in history.values().flatten() {
                print_summary(extract);
            }
        }
        Command::Purged {
            collection,
            extract_id,
        } => {
            let purged = client
                .extract_was_purged(&ExtractRef::new(collection.as_str(), extract_id))
                .await?;
            println!("{collection} {extract_id}: {}", if purged { "purged" } else { "available" });
        }
        Command::Resubmit {
            collection,
            extract_id,
        } => {
            let resubmitted = client
                .resubmit_purged_extract(&ExtractRef::new(collection.as_str(), extract_id))
                .await?;
            println!(
                "{collection} {extract_id} resubmitted as {}: {}",
                resubmitted.extract_id().unwrap_or_default(),
                resubmitted.status()
            );
        }
        Command::FromDdi { codebook, output } => from_ddi(&codebook, output.as_deref())?,
    }
    Ok(())
}

async fn download(
    client: &IpumsApiClient,
    target: &ExtractRef,
    dir: &Path,
    options: &DownloadOptions,
) -> Result<()> {
    let paths = client.download_extract(target, dir, options).await?;
    info!(%target, files = paths.len(), dir = %dir.display(), "download complete");
    for path in paths {
        println!("{}", path.display());
    }
    Ok(())
}

fn from_ddi(codebook: &Path, output: Option<&Path>) -> Result<()> {
    let parsed = read_ipums_ddi(codebook)
        .with_context(|| format!("Failed to read codebook '{}'", codebook.display()))?;
    let extract = define_extract_from_ddi(&parsed)?;
    match output {
        Some(path) => {
            save_extract_as_json(&extract, path)?;
            info!(path = %path.display(), variables = extract.variables().len(), "wrote extract definition");
        }
        None => {
            let rendered = serde_json::to_string_pretty(&Value::Object(extract.build()))?;
            println!("{rendered}");
        }
    }
    Ok(())
}

fn print_summary(extract: &Extract) {
    println!(
        "{}\t{}\t{}\t{} samples\t{} variables",
        extract.extract_id().unwrap_or_default(),
        extract.status(),
        extract.description().unwrap_or("-"),
        extract.samples().len(),
        extract.variables().len()
    );
}
