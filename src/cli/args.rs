//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::{net::IpAddr, path::PathBuf};

/// Static mirror generator for Ghost blogs
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Print per-file details
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory holding the static mirror [default: ./static]
    #[arg(short, long, global = true, value_hint = clap::ValueHint::DirPath)]
    pub dir: Option<PathBuf>,

    /// Config file path, searched upward from the current directory
    #[arg(short = 'C', long, global = true, default_value = "phantom.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Create the mirror directory as a git repository for GitHub Pages
    Setup {
        /// URL of the GitHub Pages repository (prompted when omitted)
        #[arg(long, value_name = "URL")]
        gh_repo: Option<String>,
    },

    /// Mirror the blog and turn it into a static site
    #[command(visible_alias = "g")]
    Generate {
        /// Address of the running blog [default: http://localhost:2368]
        #[arg(long, value_name = "URL")]
        domain: Option<String>,

        /// Public address the mirror is served from
        #[arg(long, value_name = "URL")]
        public: Option<String>,

        /// wget recursion depth, 0 is infinite [default: 0]
        #[arg(long)]
        level: Option<u32>,
    },

    /// Serve the mirror locally
    #[command(visible_alias = "p")]
    Preview {
        /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
        #[arg(short, long)]
        interface: Option<IpAddr>,

        /// Port number to listen on [default: 9000]
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Commit the mirror and push it
    Deploy {
        /// Author and committer date, "YYYY-MM-DD HH:MM:SS"
        #[arg(long)]
        date: Option<String>,
    },

    /// Write a CNAME file for a custom domain
    AddDomain {
        /// Domain name, e.g. blog.example.com
        #[arg(value_name = "DOMAIN")]
        domain: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_generate() {
        let cli = Cli::try_parse_from([
            "phantom",
            "generate",
            "--public",
            "https://blog.example.com",
            "--dir",
            "out",
            "--level",
            "2",
        ])
        .unwrap();

        assert_eq!(cli.dir, Some(PathBuf::from("out")));
        assert_eq!(cli.config, PathBuf::from("phantom.toml"));
        let Commands::Generate {
            domain,
            public,
            level,
        } = cli.command
        else {
            panic!("expected generate");
        };
        assert_eq!(domain, None);
        assert_eq!(public.as_deref(), Some("https://blog.example.com"));
        assert_eq!(level, Some(2));
    }

    #[test]
    fn test_parse_add_domain() {
        let cli = Cli::try_parse_from(["phantom", "add-domain", "blog.example.com"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::AddDomain { ref domain } if domain == "blog.example.com"
        ));
    }
}
