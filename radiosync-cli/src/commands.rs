//! Line commands read from stdin.

use radiosync_api::VoteDirection;
use std::str::FromStr;
use thiserror::Error;

/// Provider used by `s <query>` when none is named
pub const DEFAULT_SEARCH_PROVIDER: &str = "youtube";

pub const HELP: &str = "\
commands:
  p                     toggle play/pause
  n                     show now playing and the queue
  s [@provider] <query> search (provider defaults to youtube)
  d <external_id>       download and enqueue
  + <external_id>       upvote
  - <external_id>       downvote
  c <external_id>       claim
  q                     quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Toggle,
    NowPlaying,
    Search { provider: String, query: String },
    Download { external_id: String },
    Vote {
        external_id: String,
        direction: VoteDirection,
    },
    Claim { external_id: String },
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command `{0}`, type `h` for help")]
    Unknown(String),

    #[error("`{command}` needs {what}")]
    MissingArgument {
        command: &'static str,
        what: &'static str,
    },
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (head, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(head, rest)| (head, rest.trim()));

        match head {
            "p" => Ok(Self::Toggle),
            "n" => Ok(Self::NowPlaying),
            "h" | "?" => Ok(Self::Help),
            "q" => Ok(Self::Quit),
            "s" => parse_search(rest),
            "d" => Ok(Self::Download {
                external_id: required(rest, "d")?,
            }),
            "+" => Ok(Self::Vote {
                external_id: required(rest, "+")?,
                direction: VoteDirection::Up,
            }),
            "-" => Ok(Self::Vote {
                external_id: required(rest, "-")?,
                direction: VoteDirection::Down,
            }),
            "c" => Ok(Self::Claim {
                external_id: required(rest, "c")?,
            }),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

fn required(rest: &str, command: &'static str) -> Result<String, CommandError> {
    if rest.is_empty() {
        return Err(CommandError::MissingArgument {
            command,
            what: "an external id",
        });
    }
    Ok(rest.to_string())
}

fn parse_search(rest: &str) -> Result<Command, CommandError> {
    let (provider, query) = match rest.strip_prefix('@') {
        Some(tagged) => tagged
            .split_once(char::is_whitespace)
            .map_or((tagged, ""), |(provider, query)| (provider, query.trim())),
        None => (DEFAULT_SEARCH_PROVIDER, rest),
    };

    if query.is_empty() {
        return Err(CommandError::MissingArgument {
            command: "s",
            what: "a query",
        });
    }

    Ok(Command::Search {
        provider: provider.to_string(),
        query: query.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_commands() {
        assert_eq!("p".parse(), Ok(Command::Toggle));
        assert_eq!("  q  ".parse(), Ok(Command::Quit));
        assert_eq!("n".parse(), Ok(Command::NowPlaying));
        assert_eq!("?".parse(), Ok(Command::Help));
    }

    #[test]
    fn test_search_defaults_to_youtube() {
        assert_eq!(
            "s lofi hip hop".parse(),
            Ok(Command::Search {
                provider: "youtube".into(),
                query: "lofi hip hop".into(),
            })
        );
    }

    #[test]
    fn test_search_with_provider() {
        assert_eq!(
            "s @soundcloud  ambient".parse(),
            Ok(Command::Search {
                provider: "soundcloud".into(),
                query: "ambient".into(),
            })
        );
        assert!(matches!(
            "s @soundcloud".parse::<Command>(),
            Err(CommandError::MissingArgument { command: "s", .. })
        ));
    }

    #[test]
    fn test_song_commands() {
        assert_eq!(
            "+ youtube:abc".parse(),
            Ok(Command::Vote {
                external_id: "youtube:abc".into(),
                direction: VoteDirection::Up,
            })
        );
        assert_eq!(
            "- youtube:abc".parse(),
            Ok(Command::Vote {
                external_id: "youtube:abc".into(),
                direction: VoteDirection::Down,
            })
        );
        assert_eq!(
            "d youtube:abc".parse(),
            Ok(Command::Download {
                external_id: "youtube:abc".into(),
            })
        );
        assert_eq!(
            "c youtube:abc".parse(),
            Ok(Command::Claim {
                external_id: "youtube:abc".into(),
            })
        );
        assert!("d".parse::<Command>().is_err());
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            "x".parse::<Command>(),
            Err(CommandError::Unknown("x".into()))
        );
    }
}
