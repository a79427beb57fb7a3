use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mythos_shared::{AspectRatio, ImageProvider, ImageQuality};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "mythos", version, about = "Mythological creation gallery and batch generator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate creations from a file of prompt lines.
    #[command(subcommand)]
    Batch(BatchCommand),

    /// List saved creations, newest first.
    List,

    /// Rename a creation.
    Rename { id: Uuid, name: String },

    /// Set or clear the "translated" flag of a creation.
    Translated {
        id: Uuid,
        #[arg(action = clap::ArgAction::Set)]
        value: bool,
    },

    /// Delete a creation with its images and text output.
    Delete { id: Uuid },

    /// Write a ZIP export of everything.
    Export {
        /// File or directory (defaults to the current directory).
        path: Option<PathBuf>,
    },

    /// Import a ZIP export or a legacy JSON export.
    Import {
        path: PathBuf,
        /// Wipe existing data first instead of merging.
        #[arg(long)]
        replace: bool,
    },

    /// Delete every creation, image and output.
    ClearAll {
        #[arg(long)]
        yes: bool,
    },

    /// Row counts per table.
    Stats,
}

#[derive(Debug, Subcommand)]
pub enum BatchCommand {
    /// Start a new batch; replaces any saved one.
    Run {
        file: PathBuf,
        /// Culture for lines without a `culture;` prefix.
        #[arg(long)]
        culture: Option<String>,
        #[arg(long)]
        style: Option<String>,
        #[arg(long)]
        aspect: Option<AspectRatio>,
        #[arg(long)]
        quality: Option<ImageQuality>,
        #[arg(long)]
        provider: Option<ImageProvider>,
        #[arg(long)]
        negative_prompt: Option<String>,
    },

    /// Continue the saved batch (pending tasks only).
    Resume,

    /// Re-run every pending or failed task.
    RetryAll,

    /// Re-run one failed task (1-based).
    Retry { task: usize },

    /// Replace a failed task's text, then re-run it.
    Edit { task: usize, text: String },

    /// Let the AI rewrite a failed prompt, then re-run it.
    Repair { task: usize },

    /// Remove a successful task from the list.
    Prune { task: usize },

    /// Show the saved batch.
    Status,

    /// Forget the saved batch.
    Clear,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_batch_run_options() {
        let cli = Cli::try_parse_from([
            "mythos", "batch", "run", "gods.txt", "--culture", "Nórdica", "--aspect", "16:9",
            "--quality", "ultra", "--provider", "diffusion",
        ])
        .unwrap();
        match cli.command {
            Command::Batch(BatchCommand::Run {
                file,
                culture,
                aspect,
                quality,
                provider,
                ..
            }) => {
                assert_eq!(file, PathBuf::from("gods.txt"));
                assert_eq!(culture.as_deref(), Some("Nórdica"));
                assert_eq!(aspect, Some(AspectRatio::Landscape));
                assert_eq!(quality, Some(ImageQuality::Ultra));
                assert_eq!(provider, Some(ImageProvider::Diffusion));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parses_translated_flag_and_import_mode() {
        let id = Uuid::new_v4().to_string();
        let cli = Cli::try_parse_from(["mythos", "translated", &id, "false"]).unwrap();
        assert!(matches!(cli.command, Command::Translated { value: false, .. }));

        let cli = Cli::try_parse_from(["mythos", "import", "backup.zip", "--replace"]).unwrap();
        assert!(matches!(cli.command, Command::Import { replace: true, .. }));

        assert!(Cli::try_parse_from(["mythos", "batch", "run", "x", "--quality", "max"]).is_err());
    }
}
