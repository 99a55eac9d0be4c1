//! sealbox: command-line tool for identity keys, signed messages and the
//! zero-knowledge vault.
//!
//! Results are printed to stdout as JSON. Logs go to stderr (or a daily
//! rolling file when `LOG_FILE` is set) so they never mix with output.

mod app;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sealbox_core::config::ENV_DATA_DIR;
use sealbox_core::{defaults, SealboxConfig};
use sealbox_crypto::EncryptionAlgorithm;

use crate::app::App;

#[derive(Parser)]
#[command(name = "sealbox")]
#[command(author, version, about = "End-to-end encrypted messages and file vault")]
#[command(propagate_version = true)]
struct Cli {
    /// Data directory (keys.db, master.key, remote/)
    #[arg(long, global = true, env = ENV_DATA_DIR)]
    data_dir: Option<PathBuf>,

    /// Identity to act as (default: the oldest)
    #[arg(long, global = true)]
    identity: Option<i64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new identity key pair
    Keygen {
        /// Label for the identity
        #[arg(short, long, default_value = defaults::IDENTITY_LABEL)]
        label: String,

        /// Encryption algorithm (rsa-oaep or ecdh)
        #[arg(short, long, default_value = "rsa-oaep")]
        algorithm: EncryptionAlgorithm,
    },

    /// List identities
    Keys,

    /// Irreversibly delete an identity
    DeleteKey { id: i64 },

    /// Print the public key bundle of an identity
    Export {
        /// Emit the untagged v1 bundle
        #[arg(long)]
        legacy: bool,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import a contact from a public key bundle
    Import {
        /// Bundle file
        file: PathBuf,

        /// Label for the contact (default: file stem)
        #[arg(short, long)]
        label: Option<String>,

        /// Where the bundle came from
        #[arg(short, long, default_value = "file")]
        source: String,
    },

    /// List contacts
    Contacts,

    /// Delete a contact
    DeleteContact { id: i64 },

    /// Encrypt a file for a contact
    Encrypt {
        /// Contact id
        #[arg(long)]
        to: i64,

        #[arg(short, long)]
        input: PathBuf,

        /// Write the transport string here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Do not sign the message
        #[arg(long)]
        unsigned: bool,
    },

    /// Decrypt a message and check its signature
    Decrypt {
        #[arg(short, long)]
        input: PathBuf,

        /// Write the plaintext here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Fail unless the signature verifies
        #[arg(long)]
        require_signature: bool,
    },

    /// Vault operations
    #[command(subcommand)]
    Vault(VaultCommands),
}

#[derive(Subcommand)]
enum VaultCommands {
    /// Create the vault for the current identity
    Init,

    /// List a folder (default: root)
    Ls { folder: Option<String> },

    /// Upload a file
    Put {
        file: PathBuf,

        /// Destination folder GUID (default: root)
        #[arg(short, long)]
        folder: Option<String>,

        /// Name in the vault (default: file name)
        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long)]
        mime: Option<String>,
    },

    /// Download a file
    Get {
        guid: String,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Create a folder
    Mkdir {
        name: String,

        /// Parent folder GUID (default: root)
        #[arg(short, long)]
        folder: Option<String>,
    },

    /// Delete a file or an empty folder
    Rm { guid: String },

    /// Rename a file or folder
    Mv { guid: String, name: String },

    /// Check the folder graph against the index
    Audit,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let _guard = init_tracing();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Install the global subscriber.
///
/// `LOG_FORMAT=json` switches to JSON lines, `LOG_FILE=<path>` writes to a
/// daily rolling file and `LOG_ANSI=false` disables colors. The returned
/// guard must live until exit so buffered file logs are flushed.
fn init_tracing() -> tracing_appender::non_blocking::WorkerGuard {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| defaults::LOG_FILTER.into());

    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let ansi = std::env::var("LOG_ANSI")
        .map(|v| v != "false" && v != "0")
        .unwrap_or(true);

    let (writer, guard) = match std::env::var("LOG_FILE").ok().filter(|v| !v.is_empty()) {
        Some(path) => {
            let path = PathBuf::from(path);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| defaults::LOG_FILE_PREFIX.to_string());
            tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, file_name))
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    if json_format {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(ansi)
                    .with_writer(writer),
            )
            .init();
    }
    guard
}

fn load_config(data_dir: Option<&Path>) -> Result<SealboxConfig> {
    let config = match data_dir {
        Some(dir) => {
            let dir = dir.to_string_lossy().into_owned();
            SealboxConfig::from_lookup(|key| {
                if key == ENV_DATA_DIR {
                    Some(dir.clone())
                } else {
                    std::env::var(key).ok()
                }
            })?
        }
        None => SealboxConfig::from_env()?,
    };
    Ok(config)
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.data_dir.as_deref())?;
    let app = App::open(config).await?;
    let identity = cli.identity;

    match cli.command {
        Commands::Keygen { label, algorithm } => print_json(&app.keygen(&label, algorithm).await?),
        Commands::Keys => print_json(&app.keys().await?),
        Commands::DeleteKey { id } => print_json(&app.remove_identity(id).await?),
        Commands::Export { legacy, output } => {
            let bundle = app.export(identity, legacy).await?;
            match output {
                Some(path) => write_file(&path, bundle.as_bytes()).await,
                None => {
                    println!("{}", bundle);
                    Ok(())
                }
            }
        }
        Commands::Import {
            file,
            label,
            source,
        } => {
            let bundle = read_text(&file).await?;
            let label = match label {
                Some(label) => label,
                None => file
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "contact".to_string()),
            };
            print_json(&app.import(&bundle, &label, &source).await?)
        }
        Commands::Contacts => print_json(&app.contacts().await?),
        Commands::DeleteContact { id } => print_json(&app.remove_contact(id).await?),
        Commands::Encrypt {
            to,
            input,
            output,
            unsigned,
        } => {
            let plaintext = read_bytes(&input).await?;
            let transport = app.encrypt(identity, to, &plaintext, unsigned).await?;
            match output {
                Some(path) => write_file(&path, transport.as_bytes()).await,
                None => {
                    println!("{}", transport);
                    Ok(())
                }
            }
        }
        Commands::Decrypt {
            input,
            output,
            require_signature,
        } => {
            let transport = read_text(&input).await?;
            let (plaintext, report) = app.decrypt(identity, &transport).await?;
            if require_signature && report["signature"]["status"] != "verified" {
                anyhow::bail!("Signature not verified: {}", report["signature"]);
            }
            match output {
                Some(path) => {
                    write_file(&path, &plaintext).await?;
                    print_json(&report)
                }
                None => {
                    eprintln!("{}", report);
                    use std::io::Write;
                    std::io::stdout()
                        .write_all(&plaintext)
                        .context("writing plaintext to stdout")
                }
            }
        }
        Commands::Vault(command) => run_vault(&app, identity, command).await,
    }
}

async fn run_vault(app: &App, identity: Option<i64>, command: VaultCommands) -> Result<()> {
    match command {
        VaultCommands::Init => print_json(&app.vault_init(identity).await?),
        VaultCommands::Ls { folder } => {
            print_json(&app.vault_ls(identity, folder.as_deref()).await?)
        }
        VaultCommands::Put {
            file,
            folder,
            name,
            mime,
        } => print_json(
            &app.vault_put(
                identity,
                &file,
                folder.as_deref(),
                name.as_deref(),
                mime.as_deref(),
            )
            .await?,
        ),
        VaultCommands::Get { guid, output } => {
            let contents = app.vault_get(identity, &guid).await?;
            write_file(&output, &contents).await?;
            print_json(&serde_json::json!({
                "guid": guid,
                "output": output.display().to_string(),
                "size": contents.len(),
            }))
        }
        VaultCommands::Mkdir { name, folder } => {
            print_json(&app.vault_mkdir(identity, &name, folder.as_deref()).await?)
        }
        VaultCommands::Rm { guid } => print_json(&app.vault_rm(identity, &guid).await?),
        VaultCommands::Mv { guid, name } => print_json(&app.vault_mv(identity, &guid, &name).await?),
        VaultCommands::Audit => print_json(&app.vault_audit(identity).await?),
    }
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))
}

async fn read_text(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))
}

async fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    tokio::fs::write(path, contents)
        .await
        .with_context(|| format!("writing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_vault_put() {
        let cli = Cli::try_parse_from([
            "sealbox", "--data-dir", "/tmp/x", "vault", "put", "a.txt", "--folder", "0a1b2c3d",
        ])
        .unwrap();
        assert_eq!(cli.data_dir.as_deref(), Some(Path::new("/tmp/x")));
        match cli.command {
            Commands::Vault(VaultCommands::Put { file, folder, .. }) => {
                assert_eq!(file, PathBuf::from("a.txt"));
                assert_eq!(folder.as_deref(), Some("0a1b2c3d"));
            }
            _ => panic!("expected vault put"),
        }
    }

    #[test]
    fn test_parse_keygen_algorithm() {
        let cli = Cli::try_parse_from(["sealbox", "keygen", "--algorithm", "ecdh"]).unwrap();
        match cli.command {
            Commands::Keygen { label, algorithm } => {
                assert_eq!(label, defaults::IDENTITY_LABEL);
                assert_eq!(algorithm, EncryptionAlgorithm::Ecdh);
            }
            _ => panic!("expected keygen"),
        }
        assert!(Cli::try_parse_from(["sealbox", "keygen", "--algorithm", "dsa"]).is_err());
    }

    #[test]
    fn test_data_dir_flag_overrides_config() {
        let config = load_config(Some(Path::new("/tmp/sealbox-flag"))).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/sealbox-flag"));
        assert!(config.database_url.contains("/tmp/sealbox-flag"));
    }
}
