use std::path::PathBuf;

use clap::{ArgGroup, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Debug, Parser)]
#[command(
    name = "cryptag-scope",
    about = "Search CrypTag notes, passwords and files by tag"
)]
pub struct Cli {
    /// Override the XDG cache directory
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Backend location and token, as <baseURL>#<authToken>
    #[arg(long, global = true)]
    pub server_info: Option<String>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Search rows whose tags include every query word
    Search(SearchArgs),
    /// Show the preview widgets for one row
    Preview(PreviewArgs),
    /// List the departments searches can be narrowed to
    Departments {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List cached tag pairs
    Tags(TagsArgs),
    /// Store a new row in a local backend
    Add(AddArgs),
    /// Show or change the stored backend configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Start MCP server for AI agent integration
    Mcp,
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Config --

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Show the resolved backend configuration
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Persist server info as <baseURL>#<authToken>
    Set {
        /// Server info
        server_info: String,
    },
}

// -- Search --

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// Tags to search for
    pub query: Vec<String>,

    /// Department: Notes, Passwords or Files (default: all)
    #[arg(short = 'd', long, default_value = "")]
    pub department: String,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

impl SearchArgs {
    pub fn query_text(&self) -> String {
        self.query.join(" ")
    }
}

// -- Preview --

#[derive(Debug, Parser)]
pub struct PreviewArgs {
    /// Value of the row's id: tag
    pub row_id: String,

    /// Department the row belongs to
    #[arg(short = 'd', long, default_value = "")]
    pub department: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Tags --

#[derive(Debug, Parser)]
pub struct TagsArgs {
    /// Fetch tag pairs from the backend before listing
    #[arg(long)]
    pub refresh: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Add --

#[derive(Debug, Parser)]
#[command(group(ArgGroup::new("payload").args(["content", "file"])))]
pub struct AddArgs {
    /// Plaintext tag (repeatable)
    #[arg(short, long = "tag", required = true)]
    pub tags: Vec<String>,

    /// Row content
    #[arg(short, long)]
    pub content: Option<String>,

    /// Read row content from a file
    #[arg(short, long)]
    pub file: Option<PathBuf>,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "cryptag-scope",
            &mut std::io::stdout(),
        );
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn parse_search_defaults() {
        let cli = Cli::parse_from(["cryptag-scope", "search", "bank", "work"]);
        assert_eq!(cli.verbose, 0);
        assert!(!cli.quiet);
        match cli.command {
            Command::Search(args) => {
                assert_eq!(args.query_text(), "bank work");
                assert_eq!(args.department, "");
                assert!(!args.json);
            }
            _ => panic!("expected search command"),
        }
    }

    #[test]
    fn parse_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "cryptag-scope",
            "search",
            "-d",
            "Passwords",
            "--server-info",
            "/srv/data#tok",
            "-vv",
        ]);
        assert_eq!(cli.server_info.as_deref(), Some("/srv/data#tok"));
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Search(args) => {
                assert!(args.query.is_empty());
                assert_eq!(args.department, "Passwords");
            }
            _ => panic!("expected search command"),
        }
    }

    #[test]
    fn add_requires_a_tag_and_one_payload() {
        assert!(Cli::try_parse_from(["cryptag-scope", "add"]).is_err());
        assert!(
            Cli::try_parse_from([
                "cryptag-scope",
                "add",
                "-t",
                "x",
                "--content",
                "a",
                "--file",
                "b",
            ])
            .is_err()
        );

        let cli = Cli::parse_from([
            "cryptag-scope",
            "add",
            "-t",
            "type:note",
            "--tag",
            "work",
            "-c",
            "hello",
        ]);
        match cli.command {
            Command::Add(args) => {
                assert_eq!(args.tags, ["type:note", "work"]);
                assert_eq!(args.content.as_deref(), Some("hello"));
            }
            _ => panic!("expected add command"),
        }
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        assert!(
            Cli::try_parse_from(["cryptag-scope", "-q", "-v", "mcp"]).is_err()
        );
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }
}
