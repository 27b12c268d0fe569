use askdoc::Result;
use askdoc::commands::{ask, chat, delete, ingest, list, show_config};
use askdoc::config::{Config, default_base_dir};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "askdoc")]
#[command(about = "Chat with your documents: ingest PDFs and ask questions about them")]
#[command(version)]
struct Cli {
    /// Override the base directory holding config and document data
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a PDF and index it for question answering
    Ingest {
        /// Path to the PDF file
        file: PathBuf,
    },
    /// Ask a single question about an ingested document
    Ask {
        /// Document ID returned by ingest
        document_id: String,
        /// The question to answer
        question: String,
        /// Client identifier used for rate limiting
        #[arg(long, default_value = "local")]
        client: String,
    },
    /// Start an interactive question session for a document
    Chat {
        /// Document ID returned by ingest
        document_id: String,
        /// Client identifier used for rate limiting
        #[arg(long, default_value = "local")]
        client: String,
    },
    /// List ingested documents
    List,
    /// Delete an ingested document and its index
    Delete {
        /// Document ID to delete
        document_id: String,
    },
    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let base_dir = match cli.base_dir {
        Some(dir) => dir,
        None => default_base_dir()?,
    };
    let config = Config::load(&base_dir)?;

    match cli.command {
        Commands::Ingest { file } => {
            ingest(config, file).await?;
        }
        Commands::Ask {
            document_id,
            question,
            client,
        } => {
            ask(config, document_id, question, client).await?;
        }
        Commands::Chat {
            document_id,
            client,
        } => {
            chat(config, document_id, client).await?;
        }
        Commands::List => {
            list(config).await?;
        }
        Commands::Delete { document_id } => {
            delete(config, document_id).await?;
        }
        Commands::Config => {
            show_config(&config)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn cli_parsing() {
        let cli = Cli::try_parse_from(["askdoc", "list"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            matches!(parsed.command, Commands::List);
        }
    }

    #[test]
    fn ingest_command_with_file() {
        let cli = Cli::try_parse_from(["askdoc", "ingest", "report.pdf"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Ingest { file } = parsed.command {
                assert_eq!(file, PathBuf::from("report.pdf"));
            }
        }
    }

    #[test]
    fn ask_command_defaults_client() {
        let cli = Cli::try_parse_from(["askdoc", "ask", "doc-1", "What is this about?"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Ask {
                document_id,
                question,
                client,
            } = parsed.command
            {
                assert_eq!(document_id, "doc-1");
                assert_eq!(question, "What is this about?");
                assert_eq!(client, "local");
            }
        }
    }

    #[test]
    fn ask_command_with_client_override() {
        let cli = Cli::try_parse_from([
            "askdoc",
            "ask",
            "doc-1",
            "What is this about?",
            "--client",
            "session-42",
        ]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Ask { client, .. } = parsed.command {
                assert_eq!(client, "session-42");
            }
        }
    }

    #[test]
    fn base_dir_is_global() {
        let cli = Cli::try_parse_from(["askdoc", "--base-dir", "/tmp/askdoc", "list"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert_eq!(parsed.base_dir, Some(PathBuf::from("/tmp/askdoc")));
        }
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["askdoc", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["askdoc", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }
}
