// Global hotkey bindings, parsed from strings like "Win+Shift+B".

use std::fmt;
use std::str::FromStr;

use crate::error::BlackoutError;

/// Modifier set. Bit values match the Win32 `MOD_*` flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers(u32);

impl Modifiers {
    pub const ALT: Self = Self(0x0001);
    pub const CONTROL: Self = Self(0x0002);
    pub const SHIFT: Self = Self(0x0004);
    pub const WIN: Self = Self(0x0008);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for Modifiers {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Letter(char),
    Digit(u8),
    Function(u8),
}

impl Key {
    /// Win32 virtual-key code.
    pub fn virtual_key(self) -> u32 {
        match self {
            Key::Letter(c) => c as u32,
            Key::Digit(d) => 0x30 + u32::from(d),
            Key::Function(n) => 0x70 + u32::from(n) - 1,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Letter(c) => write!(f, "{c}"),
            Key::Digit(d) => write!(f, "{d}"),
            Key::Function(n) => write!(f, "F{n}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hotkey {
    pub modifiers: Modifiers,
    pub key: Key,
}

impl Default for Hotkey {
    /// Win+Shift+B
    fn default() -> Self {
        Self {
            modifiers: Modifiers::WIN | Modifiers::SHIFT,
            key: Key::Letter('B'),
        }
    }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Modifiers::CONTROL, "Ctrl"),
            (Modifiers::ALT, "Alt"),
            (Modifiers::WIN, "Win"),
            (Modifiers::SHIFT, "Shift"),
        ];
        for (flag, name) in names {
            if self.modifiers.contains(flag) {
                write!(f, "{name}+")?;
            }
        }
        write!(f, "{}", self.key)
    }
}

fn parse_key(token: &str) -> Option<Key> {
    let upper = token.to_ascii_uppercase();
    let mut chars = upper.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_uppercase() => Some(Key::Letter(c)),
        (Some(c), None) if c.is_ascii_digit() => Some(Key::Digit(c as u8 - b'0')),
        (Some('F'), Some(_)) => match upper[1..].parse::<u8>() {
            Ok(n @ 1..=24) => Some(Key::Function(n)),
            _ => None,
        },
        _ => None,
    }
}

impl FromStr for Hotkey {
    type Err = BlackoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BlackoutError::InvalidHotkey(s.to_string());
        let mut tokens: Vec<&str> = s.split('+').map(str::trim).collect();
        let key = tokens.pop().and_then(parse_key).ok_or_else(invalid)?;

        let mut modifiers = Modifiers::default();
        for token in tokens {
            let flag = match token.to_ascii_lowercase().as_str() {
                "ctrl" | "control" => Modifiers::CONTROL,
                "alt" => Modifiers::ALT,
                "shift" => Modifiers::SHIFT,
                "win" | "super" => Modifiers::WIN,
                _ => return Err(invalid()),
            };
            modifiers = modifiers | flag;
        }
        // A bare key would swallow normal typing system-wide.
        if modifiers.is_empty() {
            return Err(invalid());
        }
        Ok(Self { modifiers, key })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_win_shift_b() {
        let hotkey = Hotkey::default();
        assert_eq!(hotkey.to_string(), "Win+Shift+B");
        assert_eq!(hotkey.modifiers.bits(), 0x000C);
        assert_eq!(hotkey.key.virtual_key(), 0x42);
    }

    #[test]
    fn parses_case_insensitively() {
        let hotkey: Hotkey = "ctrl + alt + f12".parse().unwrap();
        assert_eq!(hotkey.modifiers, Modifiers::CONTROL | Modifiers::ALT);
        assert_eq!(hotkey.key, Key::Function(12));
        assert_eq!(hotkey.key.virtual_key(), 0x7B);
        assert_eq!(hotkey.to_string(), "Ctrl+Alt+F12");
    }

    #[test]
    fn digits_map_to_number_row() {
        let hotkey: Hotkey = "Super+Shift+7".parse().unwrap();
        assert_eq!(hotkey.key.virtual_key(), 0x37);
        assert_eq!(hotkey.to_string(), "Win+Shift+7");
    }

    #[test]
    fn rejects_unknown_tokens() {
        for bad in ["", "B", "Ctrl+", "Ctrl+Banana", "Hyper+B", "Ctrl+F25", "Ctrl+F0"] {
            assert!(bad.parse::<Hotkey>().is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn display_round_trips() {
        let hotkey: Hotkey = "Shift+Ctrl+Win+Alt+Q".parse().unwrap();
        assert_eq!(hotkey.to_string().parse::<Hotkey>().unwrap(), hotkey);
    }
}
