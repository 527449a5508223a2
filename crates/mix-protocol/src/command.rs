//! Controller command parsing
//!
//! The first token of a line selects the command. Data tokens are typed here
//! but kept individually optional: a token that fails to parse does not sink
//! the whole line, the dispatcher decides what a bad token means.

use crate::error::ParseError;
use crate::line::is_valid_line;

/// Token separator within a line
pub const TOKEN_SEPARATOR: char = '|';

/// A parsed controller command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerCommand {
    /// Raw ADC readings, one per slider: `Sliders|4095|0|2048`
    Sliders(Vec<Option<i64>>),
    /// Requested mute states, one per button: `MuteButtons|true|false`
    MuteButtons(Vec<Option<bool>>),
    /// Switch to the output device at this index: `SwitchOutput|1`
    ///
    /// `None` when the index is missing or not an integer.
    SwitchOutput(Option<i32>),
    /// Query the current output device: `GetCurrentOutputDevice`
    GetCurrentOutputDevice,
    /// Unrecognized command token
    Unknown(String),
}

impl ControllerCommand {
    /// Parse a single line (terminator optional, whitespace trimmed)
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ParseError::EmptyLine);
        }
        if !is_valid_line(line) {
            return Err(ParseError::InvalidLine(line.to_string()));
        }

        let mut tokens = line.split(TOKEN_SEPARATOR);
        // Grammar guarantees at least one token
        let command = tokens.next().unwrap_or_default();
        let data: Vec<&str> = tokens.collect();

        Ok(match command {
            "Sliders" => Self::Sliders(data.iter().map(|t| t.parse::<i64>().ok()).collect()),
            "MuteButtons" => Self::MuteButtons(data.iter().map(|t| parse_bool(t)).collect()),
            "SwitchOutput" => Self::SwitchOutput(data.first().and_then(|t| t.parse::<i32>().ok())),
            "GetCurrentOutputDevice" => Self::GetCurrentOutputDevice,
            other => Self::Unknown(other.to_string()),
        })
    }

    /// Command token as it appears on the wire
    pub fn name(&self) -> &str {
        match self {
            Self::Sliders(_) => "Sliders",
            Self::MuteButtons(_) => "MuteButtons",
            Self::SwitchOutput(_) => "SwitchOutput",
            Self::GetCurrentOutputDevice => "GetCurrentOutputDevice",
            Self::Unknown(name) => name,
        }
    }
}

/// Parse a boolean token
///
/// Accepts `1 t T TRUE true True` and `0 f F FALSE false False`.
pub fn parse_bool(token: &str) -> Option<bool> {
    match token {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sliders() {
        let cmd = ControllerCommand::parse("Sliders|4095|2048|abc").unwrap();
        assert_eq!(
            cmd,
            ControllerCommand::Sliders(vec![Some(4095), Some(2048), None])
        );
    }

    #[test]
    fn test_parse_sliders_out_of_range_kept() {
        let cmd = ControllerCommand::parse("Sliders|5000").unwrap();
        assert_eq!(cmd, ControllerCommand::Sliders(vec![Some(5000)]));
    }

    #[test]
    fn test_parse_mute_buttons() {
        let cmd = ControllerCommand::parse("MuteButtons|true|0|maybe|T").unwrap();
        assert_eq!(
            cmd,
            ControllerCommand::MuteButtons(vec![Some(true), Some(false), None, Some(true)])
        );
    }

    #[test]
    fn test_parse_switch_output() {
        assert_eq!(
            ControllerCommand::parse("SwitchOutput|1").unwrap(),
            ControllerCommand::SwitchOutput(Some(1))
        );
        assert_eq!(
            ControllerCommand::parse("SwitchOutput|one").unwrap(),
            ControllerCommand::SwitchOutput(None)
        );
        assert_eq!(
            ControllerCommand::parse("SwitchOutput").unwrap(),
            ControllerCommand::SwitchOutput(None)
        );
    }

    #[test]
    fn test_parse_query_and_unknown() {
        assert_eq!(
            ControllerCommand::parse("GetCurrentOutputDevice\r\n").unwrap(),
            ControllerCommand::GetCurrentOutputDevice
        );
        assert_eq!(
            ControllerCommand::parse("Reboot|now").unwrap(),
            ControllerCommand::Unknown("Reboot".into())
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(ControllerCommand::parse("   "), Err(ParseError::EmptyLine));
        assert!(matches!(
            ControllerCommand::parse("Sliders|12 34"),
            Err(ParseError::InvalidLine(_))
        ));
    }

    #[test]
    fn test_name_round_trips_token() {
        let cmd = ControllerCommand::parse("MuteButtons|true").unwrap();
        assert_eq!(cmd.name(), "MuteButtons");
    }
}
