use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use pmfs_core::ImportMode;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Product, project and requirement store")]
pub struct Cli {
    /// Store root directory (overrides the config file and PMFS_BASEDIR)
    #[clap(long, global = true)]
    pub root: Option<PathBuf>,

    /// More log output; repeat for trace
    #[clap(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[clap(short, long, global = true)]
    pub quiet: bool,

    #[clap(subcommand)]
    pub command: Command,
}

/// Selects one project.
#[derive(Args, Debug, Clone, Copy)]
pub struct ProjectRef {
    /// Product ID
    #[clap(long)]
    pub product: u32,

    /// Project ID
    #[clap(long)]
    pub project: u32,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the store directory layout
    Init,

    /// Manage products
    #[clap(subcommand)]
    Product(ProductCommand),

    /// Manage projects
    #[clap(subcommand)]
    Project(ProjectCommand),

    /// Manage requirements within a project
    #[clap(subcommand)]
    Req(ReqCommand),

    /// Import a JSON or YAML batch into a project
    Import {
        #[clap(flatten)]
        target: ProjectRef,

        /// Batch file (.json, .yaml or .yml)
        file: PathBuf,

        /// replace | sync
        #[clap(long, default_value_t = ImportMode::SyncById)]
        mode: ImportMode,

        /// Skip the confirmation prompt for replace imports
        #[clap(long, short = 'y')]
        yes: bool,
    },

    /// Export a project as JSON, YAML or Markdown (chosen by extension)
    Export {
        #[clap(flatten)]
        target: ProjectRef,

        /// Output file
        output: PathBuf,
    },

    /// Analyze active requirements with a role question and quality gates
    Analyze {
        #[clap(flatten)]
        target: ProjectRef,

        /// Prompt role
        #[clap(long, default_value = "product_manager")]
        role: String,

        /// Question ID within the role
        #[clap(long, default_value = "1")]
        question: String,

        /// Gate IDs to evaluate
        #[clap(long = "gate")]
        gates: Vec<String>,
    },

    /// List prompt roles and quality gates
    Prompts,

    /// Suggest requirements related to an existing one
    Suggest {
        #[clap(flatten)]
        target: ProjectRef,

        /// Requirement ID
        id: u32,
    },

    /// Generate design aspects and requirement templates
    #[clap(subcommand)]
    Aspects(AspectsCommand),

    /// Ingest every file in the project's input directory
    Ingest {
        #[clap(flatten)]
        target: ProjectRef,

        /// Directory to ingest instead of the project's input directory
        #[clap(long)]
        dir: Option<PathBuf>,

        /// Extract requirements from text attachments with the model
        #[clap(long)]
        extract: bool,
    },

    /// Ask a role question about an attachment
    Analyse {
        #[clap(flatten)]
        target: ProjectRef,

        /// Attachment ID
        attachment: u32,

        /// Prompt role
        #[clap(long, default_value = "product_manager")]
        role: String,

        /// Question ID within the role
        #[clap(long, default_value = "1")]
        question: String,
    },

    /// Summarize an attachment into an intelligence record
    Intel {
        #[clap(flatten)]
        target: ProjectRef,

        /// Attachment ID
        attachment: u32,
    },
}

#[derive(Subcommand, Debug)]
pub enum ProductCommand {
    /// Add a new product
    Add {
        /// Name of the product
        name: String,
    },

    /// List all products
    List,

    /// Rename a product
    Rename {
        /// Product ID
        id: u32,

        /// New name
        name: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ProjectCommand {
    /// Add a project to a product
    Add {
        /// Product ID
        #[clap(long)]
        product: u32,

        /// Name of the project
        name: String,

        /// Project scope
        #[clap(long)]
        scope: Option<String>,
    },

    /// List the projects of a product
    List {
        /// Product ID
        #[clap(long)]
        product: u32,
    },

    /// Show project details
    Show {
        #[clap(flatten)]
        target: ProjectRef,
    },

    /// Delete a project and its files
    Delete {
        #[clap(flatten)]
        target: ProjectRef,

        /// Skip confirmation prompt
        #[clap(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum ReqCommand {
    /// Add a requirement
    Add {
        #[clap(flatten)]
        target: ProjectRef,

        /// Name of the requirement
        #[clap(long)]
        name: Option<String>,

        /// Description of the requirement
        #[clap(long)]
        description: Option<String>,

        /// Category
        #[clap(long)]
        category: Option<String>,

        /// Comma-separated tags
        #[clap(long)]
        tags: Option<String>,

        /// Add as a proposal rather than an active requirement
        #[clap(long)]
        proposed: bool,

        /// Use interactive mode (prompts)
        #[clap(long)]
        interactive: bool,
    },

    /// List requirements
    List {
        #[clap(flatten)]
        target: ProjectRef,

        /// Include deleted requirements
        #[clap(long)]
        all: bool,

        /// Only proposed requirements
        #[clap(long)]
        proposed: bool,
    },

    /// Show requirement details
    Show {
        #[clap(flatten)]
        target: ProjectRef,

        /// Requirement ID
        id: u32,
    },

    /// Accept a proposed requirement
    Activate {
        #[clap(flatten)]
        target: ProjectRef,

        /// Requirement ID
        id: u32,
    },

    /// Accept every proposed requirement
    ActivateAll {
        #[clap(flatten)]
        target: ProjectRef,
    },

    /// Soft-delete a requirement
    Delete {
        #[clap(flatten)]
        target: ProjectRef,

        /// Requirement ID
        id: u32,
    },

    /// Undo a soft delete
    Restore {
        #[clap(flatten)]
        target: ProjectRef,

        /// Requirement ID
        id: u32,
    },

    /// Remove duplicate and deleted requirements
    Dedupe {
        #[clap(flatten)]
        target: ProjectRef,

        /// Leave proposed requirements out of matching
        #[clap(long)]
        ignore_proposed: bool,

        /// Skip confirmation prompt
        #[clap(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum AspectsCommand {
    /// Ask for design aspects of every live requirement
    Generate {
        #[clap(flatten)]
        target: ProjectRef,
    },

    /// Turn unprocessed design aspects into proposed requirements
    Templates {
        #[clap(flatten)]
        target: ProjectRef,

        /// Prompt role
        #[clap(long, default_value = "solution_architect")]
        role: String,

        /// Question ID within the role
        #[clap(long, default_value = "1")]
        question: String,
    },
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
    fn test_import_mode_parses() {
        let cli = Cli::try_parse_from([
            "pmfs", "import", "--product", "1", "--project", "2", "batch.yaml", "--mode",
            "replace",
        ])
        .unwrap();
        match cli.command {
            Command::Import { target, mode, yes, .. } => {
                assert_eq!((target.product, target.project), (1, 2));
                assert_eq!(mode, ImportMode::Replace);
                assert!(!yes);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_analyse_attachment_defaults() {
        let cli = Cli::try_parse_from([
            "pmfs", "analyse", "--product", "1", "--project", "2", "3", "--role", "qa_lead",
        ])
        .unwrap();
        match cli.command {
            Command::Analyse {
                attachment,
                role,
                question,
                ..
            } => {
                assert_eq!(attachment, 3);
                assert_eq!(role, "qa_lead");
                assert_eq!(question, "1");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["pmfs", "product", "list", "-vv", "--root", "/tmp/x"])
            .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.root, Some(PathBuf::from("/tmp/x")));
    }
}
