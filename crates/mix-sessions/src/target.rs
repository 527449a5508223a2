//! Configured targets
//!
//! A target is lower-cased before use. Targets starting with
//! [`SPECIAL_TARGET_PREFIX`] are resolved at event time instead of naming a
//! session directly.

use std::sync::LazyLock;

use mix_config::Mapping;
use regex::Regex;

/// Marks a target that is resolved dynamically
pub const SPECIAL_TARGET_PREFIX: &str = "mix.";

/// Master output volume
pub const MASTER_SESSION_NAME: &str = "master";
/// System sounds
pub const SYSTEM_SESSION_NAME: &str = "system";
/// Microphone input level
pub const INPUT_SESSION_NAME: &str = "mic";

/// Friendly device names, e.g. `headphones (realtek audio)`
static DEVICE_SESSION_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.+ \(.+\)$").expect("device key pattern is a valid regex"));

/// Dynamically resolved targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialTarget {
    /// Processes owning the foreground window (`mix.current`)
    CurrentWindow,
    /// Sessions no slider is mapped to (`mix.unmapped`)
    AllUnmapped,
}

/// A parsed target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A session key
    Literal(String),
    Special(SpecialTarget),
    /// Carries the special prefix but names no known transform; resolves to nothing
    UnknownSpecial(String),
}

impl Target {
    pub fn parse(raw: &str) -> Self {
        let target = raw.to_lowercase();

        match target.strip_prefix(SPECIAL_TARGET_PREFIX) {
            Some("current") => Self::Special(SpecialTarget::CurrentWindow),
            Some("unmapped") => Self::Special(SpecialTarget::AllUnmapped),
            Some(other) => Self::UnknownSpecial(other.to_string()),
            None => Self::Literal(target),
        }
    }

    /// Whether resolution depends on runtime state
    pub fn is_special(&self) -> bool {
        !matches!(self, Self::Literal(_))
    }
}

/// Whether a session key counts as mapped
///
/// Master, system and mic sessions, and device sessions, always count as
/// mapped. Otherwise the key must equal a literal slider target; special
/// targets are ignored since they have no fixed key.
pub fn is_session_mapped(key: &str, slider_mapping: &Mapping<usize>) -> bool {
    if [MASTER_SESSION_NAME, SYSTEM_SESSION_NAME, INPUT_SESSION_NAME].contains(&key) {
        return true;
    }

    if DEVICE_SESSION_KEY.is_match(key) {
        return true;
    }

    slider_mapping
        .iter()
        .flat_map(|(_, targets)| targets)
        .any(|raw| matches!(Target::parse(raw), Target::Literal(target) if target == key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_literal_lowercases() {
        assert_eq!(
            Target::parse("Chrome.EXE"),
            Target::Literal("chrome.exe".to_string())
        );
    }

    #[test]
    fn test_parse_special() {
        assert_eq!(
            Target::parse("mix.current"),
            Target::Special(SpecialTarget::CurrentWindow)
        );
        assert_eq!(
            Target::parse("MIX.Unmapped"),
            Target::Special(SpecialTarget::AllUnmapped)
        );
        assert_eq!(
            Target::parse("mix.everything"),
            Target::UnknownSpecial("everything".to_string())
        );
        assert!(Target::parse("mix.everything").is_special());
    }

    #[test]
    fn test_reserved_and_device_keys_are_mapped() {
        let empty = Mapping::new();
        assert!(is_session_mapped("master", &empty));
        assert!(is_session_mapped("system", &empty));
        assert!(is_session_mapped("mic", &empty));
        assert!(is_session_mapped("speakers (realtek audio)", &empty));
        assert!(!is_session_mapped("spotify.exe", &empty));
    }

    #[test]
    fn test_literal_slider_targets_are_mapped() {
        let mapping: Mapping<usize> = [
            (0, vec!["Spotify.exe", "mix.unmapped"]),
            (1, vec!["discord.exe"]),
        ]
        .into_iter()
        .collect();

        assert!(is_session_mapped("spotify.exe", &mapping));
        assert!(is_session_mapped("discord.exe", &mapping));
        assert!(!is_session_mapped("steam.exe", &mapping));
        // The special target has no key of its own
        assert!(!is_session_mapped("unmapped", &mapping));
    }

    proptest! {
        #[test]
        fn literal_resolution_is_stable(raw in "[A-Za-z0-9_ .()-]{1,24}") {
            prop_assume!(!raw.to_lowercase().starts_with(SPECIAL_TARGET_PREFIX));
            let first = Target::parse(&raw);
            prop_assert_eq!(&first, &Target::parse(&raw));
            prop_assert_eq!(first, Target::Literal(raw.to_lowercase()));
        }
    }
}
