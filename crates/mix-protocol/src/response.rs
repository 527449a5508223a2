//! Host-to-controller responses

use std::fmt;

/// A reply written back to the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerResponse {
    /// Acknowledge a `Sliders` line
    Ok,
    /// The request could not be served
    Error,
    /// Actual mute state per button: `MuteState|true|false`
    MuteState(Vec<bool>),
    /// Actual output device index: `OutputDevice|1`
    OutputDevice(i32),
}

impl ControllerResponse {
    /// Encode to wire bytes, trailing newline included
    pub fn encode(&self) -> Vec<u8> {
        let mut out = self.to_string().into_bytes();
        out.push(b'\n');
        out
    }
}

impl fmt::Display for ControllerResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Error => write!(f, "ERROR"),
            Self::MuteState(states) => {
                write!(f, "MuteState")?;
                for muted in states {
                    write!(f, "|{}", muted)?;
                }
                Ok(())
            }
            Self::OutputDevice(index) => write!(f, "OutputDevice|{}", index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_simple() {
        assert_eq!(ControllerResponse::Ok.encode(), b"OK\n");
        assert_eq!(ControllerResponse::Error.encode(), b"ERROR\n");
    }

    #[test]
    fn test_encode_mute_state() {
        let resp = ControllerResponse::MuteState(vec![true, false, true]);
        assert_eq!(resp.encode(), b"MuteState|true|false|true\n");
    }

    #[test]
    fn test_encode_output_device() {
        assert_eq!(
            ControllerResponse::OutputDevice(1).encode(),
            b"OutputDevice|1\n"
        );
        assert_eq!(
            ControllerResponse::OutputDevice(-1).to_string(),
            "OutputDevice|-1"
        );
    }
}
