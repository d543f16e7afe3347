//! Parsing of the lines typed at the prompt.

use std::str::FromStr;

use capworld_core::{SpeedLevel, SpeedParseError};
use thiserror::Error;

pub const HELP_TEXT: &str = "\
Commands:
  help              show this list
  speed <0-5|xN>    change clock speed (0 pauses); `x3` alone works too
  pause             stop the clock
  time              show the current date and speed
  balance [amount]  show or set the cash balance
  quit              leave the game";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Empty,
    Help,
    Speed(SpeedLevel),
    Pause,
    Time,
    Balance(Option<i64>),
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command `{0}`; type `help` for a list")]
    Unknown(String),
    #[error(transparent)]
    Speed(#[from] SpeedParseError),
    #[error("invalid amount `{0}`")]
    Amount(String),
    #[error("`{0}` takes no arguments")]
    UnexpectedArgument(String),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Ok(Command::Empty);
        };
        let rest: Vec<&str> = words.collect();
        let verb = head.to_ascii_lowercase();

        let no_args = |command: Command| {
            if rest.is_empty() {
                Ok(command)
            } else {
                Err(CommandError::UnexpectedArgument(verb.clone()))
            }
        };

        match verb.as_str() {
            "help" | "?" => no_args(Command::Help),
            "pause" => no_args(Command::Pause),
            "time" | "date" => no_args(Command::Time),
            "quit" | "exit" | "q" => no_args(Command::Quit),
            "speed" => Ok(Command::Speed(rest.join(" ").parse()?)),
            "balance" => match rest.as_slice() {
                [] => Ok(Command::Balance(None)),
                [amount] => parse_amount(amount).map(|value| Command::Balance(Some(value))),
                _ => Err(CommandError::Amount(rest.join(" "))),
            },
            _ => match head.parse::<SpeedLevel>() {
                Ok(level) if rest.is_empty() => Ok(Command::Speed(level)),
                _ => Err(CommandError::Unknown(head.to_string())),
            },
        }
    }
}

fn parse_amount(raw: &str) -> Result<i64, CommandError> {
    let cleaned: String = raw.chars().filter(|ch| !matches!(ch, ',' | '_')).collect();
    cleaned
        .parse()
        .map_err(|_| CommandError::Amount(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_commands() {
        assert_eq!("".parse(), Ok(Command::Empty));
        assert_eq!("   ".parse(), Ok(Command::Empty));
        assert_eq!("HELP".parse(), Ok(Command::Help));
        assert_eq!("speed x4".parse(), Ok(Command::Speed(SpeedLevel::X4)));
        assert_eq!("speed 0".parse(), Ok(Command::Speed(SpeedLevel::Paused)));
        assert_eq!("x2".parse(), Ok(Command::Speed(SpeedLevel::X2)));
        assert_eq!("5".parse(), Ok(Command::Speed(SpeedLevel::X5)));
        assert_eq!("pause".parse(), Ok(Command::Pause));
        assert_eq!("date".parse(), Ok(Command::Time));
        assert_eq!("balance".parse(), Ok(Command::Balance(None)));
        assert_eq!(
            "balance 1,250,000".parse(),
            Ok(Command::Balance(Some(1_250_000)))
        );
        assert_eq!("balance -40".parse(), Ok(Command::Balance(Some(-40))));
        assert_eq!("exit".parse(), Ok(Command::Quit));
    }

    #[test]
    fn reports_bad_input() {
        assert_eq!(
            "speed".parse::<Command>(),
            Err(CommandError::Speed(SpeedParseError::Empty))
        );
        assert_eq!(
            "speed 9".parse::<Command>(),
            Err(CommandError::Speed(SpeedParseError::OutOfRange(9)))
        );
        assert_eq!(
            "buy factory".parse::<Command>(),
            Err(CommandError::Unknown("buy".to_string()))
        );
        assert_eq!(
            "balance lots".parse::<Command>(),
            Err(CommandError::Amount("lots".to_string()))
        );
        assert_eq!(
            "quit now".parse::<Command>(),
            Err(CommandError::UnexpectedArgument("quit".to_string()))
        );
        assert_eq!(
            "x9".parse::<Command>(),
            Err(CommandError::Unknown("x9".to_string()))
        );
    }
}
