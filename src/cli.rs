use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "icolor")]
#[command(author, version, about = "Telegram bot with payment-driven subscriptions", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the bot and the HTTP server (default)
    Run,

    /// Grant subscription days to a user, as a paid notification would
    Grant {
        /// Telegram user id
        user_id: i64,

        /// Days to add (defaults to SUB_DAYS)
        #[arg(short, long)]
        days: Option<i64>,
    },

    /// Show a user's subscription status
    Status {
        /// Telegram user id
        user_id: i64,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_means_run() {
        let cli = Cli::try_parse_from(["icolor"]).unwrap();
        assert_eq!(cli.command, None);
    }

    #[test]
    fn test_grant_arguments() {
        let cli = Cli::try_parse_from(["icolor", "grant", "123456789", "--days", "7"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Grant {
                user_id: 123456789,
                days: Some(7)
            })
        );
    }

    #[test]
    fn test_status_requires_user_id() {
        assert!(Cli::try_parse_from(["icolor", "status"]).is_err());
    }
}
