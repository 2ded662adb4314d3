use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use rum_symbols::config::{StagingConfig, TransferConfig};
use rum_symbols::services::staging::{Stager, cleanup_staging};
use rum_symbols::services::transfer::{
    FileUpload, ProgressInfo, TransferClient, UploadRequest, classify_and_log_error,
    create_uploader,
};
use std::path::PathBuf;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about = "Upload debug symbols for crash symbolication", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// iOS dSYM symbol files
    Ios {
        #[command(subcommand)]
        command: IosCommands,
    },

    /// Android ProGuard/R8 mapping files
    Android {
        #[command(subcommand)]
        command: AndroidCommands,
    },
}

#[derive(Subcommand, Debug)]
enum IosCommands {
    /// Zip and upload dSYMs from a dSYMs/ directory, a .dSYM bundle or a .dSYM.zip
    Upload {
        /// Path to the dSYMs directory, .dSYM bundle or .dSYM.zip file
        #[arg(short, long)]
        path: PathBuf,

        /// Upload endpoint
        #[arg(short, long)]
        url: String,

        /// Ingest token
        #[arg(short, long)]
        token: String,

        /// Form field the archive is sent under
        #[arg(long, default_value = "file")]
        field_name: String,

        /// Extra form fields as key=value
        #[arg(long = "param", value_parser = parse_key_value)]
        params: Vec<(String, String)>,

        /// Simulate the upload instead of sending anything
        #[arg(long, default_value_t = false)]
        mock: bool,
    },
}

#[derive(Subcommand, Debug)]
enum AndroidCommands {
    /// Upload a mapping file as the raw request body
    Upload {
        /// Mapping file (.txt or .gz)
        #[arg(short, long)]
        file: PathBuf,

        #[arg(short, long)]
        url: String,

        #[arg(short, long)]
        token: String,
    },

    /// List mapping identifiers already known to the service
    Metadata {
        #[arg(short, long)]
        url: String,

        #[arg(short, long)]
        token: String,
    },
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))
}

fn log_progress(info: ProgressInfo) {
    debug!(
        "{:.1}% ({} / {} bytes)",
        info.progress, info.loaded, info.total
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rum_symbols=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let transfer_config = TransferConfig::from_env();
    let client = TransferClient::new(&transfer_config)?;

    match args.command {
        Commands::Ios {
            command:
                IosCommands::Upload {
                    path,
                    url,
                    token,
                    field_name,
                    params,
                    mock,
                },
        } => {
            let stager = Stager::from_config(&StagingConfig::from_env());
            let staged = stager.prepare_artifacts(&path)?;
            let uploader = create_uploader(
                if mock { "mock" } else { "multipart" },
                client,
                &transfer_config,
            );

            let mut failed = 0usize;
            for zip_file in &staged.zip_files {
                let mut request = UploadRequest::new(&url, FileUpload::new(zip_file, &field_name))
                    .with_token(&token)
                    .with_progress(log_progress);
                request.parameters.extend(params.iter().cloned());

                info!("⬆️  Uploading {} ({})", zip_file.display(), uploader.name());
                match uploader.upload(&request).await {
                    Ok(()) => info!("✅ Uploaded {}", zip_file.display()),
                    Err(e) => {
                        failed += 1;
                        classify_and_log_error(
                            &e,
                            &format!("Unable to upload {}", zip_file.display()),
                            &url,
                        );
                    }
                }
            }

            cleanup_staging(&staged.upload_path);

            if failed > 0 {
                return Err(anyhow!(
                    "{} of {} dSYM upload(s) failed",
                    failed,
                    staged.zip_files.len()
                ));
            }
            info!("🎉 Uploaded {} dSYM archive(s)", staged.zip_files.len());
        }

        Commands::Android {
            command: AndroidCommands::Upload { file, url, token },
        } => {
            let request = UploadRequest::new(&url, FileUpload::new(&file, "file"))
                .with_token(&token)
                .with_progress(log_progress);

            if let Err(e) = client.upload_stream(&request).await {
                classify_and_log_error(
                    &e,
                    &format!("Unable to upload {}", file.display()),
                    &url,
                );
                return Err(e).context("mapping file upload failed");
            }
            info!("✅ Uploaded {}", file.display());
        }

        Commands::Android {
            command: AndroidCommands::Metadata { url, token },
        } => {
            match client.fetch_metadata(&url, &token).await {
                Ok(ids) => {
                    for id in ids {
                        println!("{}", id);
                    }
                }
                Err(e) => {
                    error!("❌ {}", e);
                    return Err(e.into());
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("appVersion=1.2=3").unwrap(),
            ("appVersion".to_string(), "1.2=3".to_string())
        );
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "rum-symbols",
            "ios",
            "upload",
            "--path",
            "build/dSYMs",
            "--url",
            "https://ingest.example.com/v1/dsyms",
            "--token",
            "abc",
            "--param",
            "appVersion=1.0",
            "--mock",
        ])
        .unwrap();

        match args.command {
            Commands::Ios {
                command: IosCommands::Upload { params, mock, field_name, .. },
            } => {
                assert!(mock);
                assert_eq!(field_name, "file");
                assert_eq!(params, vec![("appVersion".to_string(), "1.0".to_string())]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_android_subcommands() {
        let args = Args::try_parse_from([
            "rum-symbols", "android", "metadata", "--url", "https://ingest.example.com/v1/proguard", "--token", "abc",
        ])
        .unwrap();
        assert!(matches!(
            args.command,
            Commands::Android { command: AndroidCommands::Metadata { .. } }
        ));

        let args = Args::try_parse_from([
            "rum-symbols", "android", "upload", "--file", "mapping.txt", "--url", "https://ingest.example.com", "--token", "abc",
        ])
        .unwrap();
        match args.command {
            Commands::Android {
                command: AndroidCommands::Upload { file, .. },
            } => assert_eq!(file, PathBuf::from("mapping.txt")),
            other => panic!("unexpected command {:?}", other),
        }

        assert!(Args::try_parse_from(["rum-symbols", "upload-dsyms"]).is_err());
    }
}
