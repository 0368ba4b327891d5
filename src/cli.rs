use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing::level_filters::LevelFilter;

use crate::config::{ServeConfig, ServeMode};

#[derive(Parser, Debug)]
#[command(name = "packserve")]
#[command(version)]
#[command(about = "Serve static assets from a zip / tar.gz / tar.bz2 archive, from memory", long_about = None)]
#[command(after_help = "Examples:\n  \
  packserve site.zip                     serve site.zip on 127.0.0.1:8080\n  \
  packserve -l 0.0.0.0:80 site.tar.gz    listen on all interfaces\n  \
  packserve --debug site.zip             serve ./site/ from disk instead")]
pub struct Cli {
    /// Archive to serve (.zip, .tar.gz or .tar.bz2)
    #[arg(value_name = "ARCHIVE")]
    pub archive: PathBuf,

    /// Address to listen on
    #[arg(short = 'l', long, value_name = "ADDR", default_value = "127.0.0.1:8080")]
    pub listen: SocketAddr,

    /// Serve the unpacked directory next to the archive instead of the archive
    #[arg(long)]
    pub debug: bool,

    /// Exit instead of falling back to the directory when the archive can't be loaded
    #[arg(long)]
    pub strict: bool,

    /// More log output (-vv for trace)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Less log output (-qq for errors only)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

impl Cli {
    pub fn serve_config(&self) -> ServeConfig {
        let mode = if self.debug {
            ServeMode::Directory
        } else {
            ServeMode::Archive
        };
        ServeConfig::new(mode, self.archive.clone())
    }

    pub fn log_level(&self) -> LevelFilter {
        match self.verbose as i16 - self.quiet as i16 {
            i16::MIN..=-2 => LevelFilter::ERROR,
            -1 => LevelFilter::WARN,
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::parse_from(["packserve", "site.zip"]);
        assert_eq!(cli.listen, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(
            cli.serve_config(),
            ServeConfig::new(ServeMode::Archive, "site.zip")
        );
        assert_eq!(cli.log_level(), LevelFilter::INFO);
    }

    #[test]
    fn debug_selects_directory_mode() {
        let cli = Cli::parse_from(["packserve", "--debug", "-l", "0.0.0.0:9000", "site.tar.gz"]);
        assert_eq!(cli.serve_config().mode, ServeMode::Directory);
        assert_eq!(cli.listen.port(), 9000);
    }

    #[test]
    fn verbosity() {
        assert_eq!(Cli::parse_from(["packserve", "-vv", "a.zip"]).log_level(), LevelFilter::TRACE);
        assert_eq!(Cli::parse_from(["packserve", "-q", "a.zip"]).log_level(), LevelFilter::WARN);
        assert_eq!(Cli::parse_from(["packserve", "-qqq", "a.zip"]).log_level(), LevelFilter::ERROR);
    }
}
