use clap::Parser;
use std::path::PathBuf;

use crate::config::Settings;

/// Pour-over brewing assistant: pour schedule and a guided brew timer
#[derive(Parser, Debug)]
#[command(name = "pour_it", version = env!("CARGO_PKG_VERSION"), long_about = None)]
pub struct Cli {
    /// Coffee weight in grams
    #[arg(short, long, allow_hyphen_values = true)]
    pub coffee: Option<String>,

    /// Water to coffee ratio, e.g. 16 for 1:16
    #[arg(short, long, allow_hyphen_values = true)]
    pub ratio: Option<String>,

    /// Configuration file (default: ./pour_it.toml if present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Take commands over a local WebSocket instead of stdin
    #[arg(long)]
    pub daemon: bool,

    /// WebSocket address for --daemon
    #[arg(long)]
    pub bind: Option<String>,

    /// Disable desktop notifications
    #[arg(long)]
    pub no_notify: bool,

    /// Debug logging on stderr
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Command line flags win over file and environment.
    pub fn apply_to(&self, mut settings: Settings) -> Settings {
        if let Some(ref v) = self.coffee {
            settings.coffee_weight = v.clone();
        }
        if let Some(ref v) = self.ratio {
            settings.ratio = v.clone();
        }
        if let Some(ref v) = self.bind {
            settings.bind_addr = v.clone();
        }
        if self.no_notify {
            settings.notifications = false;
        }
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_settings() {
        let cli = Cli::try_parse_from(["pour_it", "-c", "18", "--ratio", "15", "--no-notify"])
            .unwrap();
        let settings = cli.apply_to(Settings::default());

        assert_eq!(settings.coffee_weight, "18");
        assert_eq!(settings.ratio, "15");
        assert!(!settings.notifications);
        assert!(!cli.daemon);
    }

    #[test]
    fn test_negative_ratio_is_a_value() {
        let cli = Cli::try_parse_from(["pour_it", "--ratio", "-1"]).unwrap();
        assert_eq!(cli.ratio.as_deref(), Some("-1"));
    }

    #[test]
    fn test_daemon_with_bind() {
        let cli = Cli::try_parse_from(["pour_it", "--daemon", "--bind", "127.0.0.1:9999"]).unwrap();
        let settings = cli.apply_to(Settings::default());
        assert!(cli.daemon);
        assert_eq!(settings.bind_addr, "127.0.0.1:9999");
        assert_eq!(settings.coffee_weight, "20");
    }
}
