//! Hotkey string parsing and formatting.
//!
//! Grammar: a `+`-separated, case-insensitive list of zero or more modifiers
//! (`Ctrl`, `Alt`, `Shift`, `Win`) followed by exactly one key token.
//! Whitespace around tokens is ignored. `format(parse(s)) == s` for canonical
//! strings (modifiers ordered Ctrl, Alt, Shift, Win).

use crate::error::{AppError, AppResult};

// HOT_KEY_MODIFIERS bits, kept as raw values so parsing stays
// platform-independent and testable off Windows.
pub const MOD_ALT: u32 = 0x0001;
pub const MOD_CONTROL: u32 = 0x0002;
pub const MOD_SHIFT: u32 = 0x0004;
pub const MOD_WIN: u32 = 0x0008;

/// Virtual key code for PrintScreen.
pub const VK_SNAPSHOT: u32 = 0x2C;

/// One parsed modifier+key combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyCombo {
    pub modifiers: u32,
    pub key: u32,
}

impl KeyCombo {
    /// True for a bare PrintScreen binding, which some desktops pre-claim.
    pub fn is_bare_printscreen(&self) -> bool {
        self.modifiers == 0 && self.key == VK_SNAPSHOT
    }

    /// The automatic fallback for a bare PrintScreen registration.
    pub fn with_alt(&self) -> Self {
        Self {
            modifiers: self.modifiers | MOD_ALT,
            key: self.key,
        }
    }
}

/// Parse a hotkey string like `"Ctrl+Shift+PrintScreen"`.
pub fn parse(input: &str) -> AppResult<KeyCombo> {
    let parts: Vec<&str> = input
        .split('+')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();

    let (key_token, modifier_tokens) = match parts.split_last() {
        Some(split) => split,
        None => return Err(AppError::HotkeyParse(input.to_string())),
    };

    let mut modifiers = 0u32;
    for token in modifier_tokens {
        modifiers |= match token.to_ascii_lowercase().as_str() {
            "ctrl" | "control" => MOD_CONTROL,
            "alt" => MOD_ALT,
            "shift" => MOD_SHIFT,
            "win" => MOD_WIN,
            _ => return Err(AppError::HotkeyParse(input.to_string())),
        };
    }

    let key = key_code(&key_token.to_ascii_lowercase())
        .ok_or_else(|| AppError::HotkeyParse(input.to_string()))?;

    Ok(KeyCombo { modifiers, key })
}

/// Format a combo into its canonical string.
pub fn format(combo: KeyCombo) -> String {
    let mut parts: Vec<&str> = Vec::new();
    if combo.modifiers & MOD_CONTROL != 0 {
        parts.push("Ctrl");
    }
    if combo.modifiers & MOD_ALT != 0 {
        parts.push("Alt");
    }
    if combo.modifiers & MOD_SHIFT != 0 {
        parts.push("Shift");
    }
    if combo.modifiers & MOD_WIN != 0 {
        parts.push("Win");
    }
    parts.push(key_name(combo.key));
    parts.join("+")
}

fn key_code(key: &str) -> Option<u32> {
    let code = match key {
        "a" => 0x41, "b" => 0x42, "c" => 0x43, "d" => 0x44, "e" => 0x45,
        "f" => 0x46, "g" => 0x47, "h" => 0x48, "i" => 0x49, "j" => 0x4A,
        "k" => 0x4B, "l" => 0x4C, "m" => 0x4D, "n" => 0x4E, "o" => 0x4F,
        "p" => 0x50, "q" => 0x51, "r" => 0x52, "s" => 0x53, "t" => 0x54,
        "u" => 0x55, "v" => 0x56, "w" => 0x57, "x" => 0x58, "y" => 0x59, "z" => 0x5A,
        "0" => 0x30, "1" => 0x31, "2" => 0x32, "3" => 0x33, "4" => 0x34,
        "5" => 0x35, "6" => 0x36, "7" => 0x37, "8" => 0x38, "9" => 0x39,
        "f1" => 0x70, "f2" => 0x71, "f3" => 0x72, "f4" => 0x73, "f5" => 0x74,
        "f6" => 0x75, "f7" => 0x76, "f8" => 0x77, "f9" => 0x78, "f10" => 0x79,
        "f11" => 0x7A, "f12" => 0x7B,
        "space" => 0x20, "enter" | "return" => 0x0D, "escape" | "esc" => 0x1B,
        "tab" => 0x09, "backspace" => 0x08, "delete" => 0x2E, "insert" => 0x2D,
        "home" => 0x24, "end" => 0x23, "pageup" => 0x21, "pagedown" => 0x22,
        "up" => 0x26, "down" => 0x28, "left" => 0x25, "right" => 0x27,
        "printscreen" | "prtsc" | "prtscn" | "printscrn" => VK_SNAPSHOT,
        _ => 0,
    };
    if code != 0 {
        Some(code)
    } else {
        None
    }
}

fn key_name(code: u32) -> &'static str {
    match code {
        0x41 => "A", 0x42 => "B", 0x43 => "C", 0x44 => "D", 0x45 => "E",
        0x46 => "F", 0x47 => "G", 0x48 => "H", 0x49 => "I", 0x4A => "J",
        0x4B => "K", 0x4C => "L", 0x4D => "M", 0x4E => "N", 0x4F => "O",
        0x50 => "P", 0x51 => "Q", 0x52 => "R", 0x53 => "S", 0x54 => "T",
        0x55 => "U", 0x56 => "V", 0x57 => "W", 0x58 => "X", 0x59 => "Y", 0x5A => "Z",
        0x30 => "0", 0x31 => "1", 0x32 => "2", 0x33 => "3", 0x34 => "4",
        0x35 => "5", 0x36 => "6", 0x37 => "7", 0x38 => "8", 0x39 => "9",
        0x70 => "F1", 0x71 => "F2", 0x72 => "F3", 0x73 => "F4", 0x74 => "F5",
        0x75 => "F6", 0x76 => "F7", 0x77 => "F8", 0x78 => "F9", 0x79 => "F10",
        0x7A => "F11", 0x7B => "F12",
        0x20 => "Space", 0x0D => "Enter", 0x1B => "Escape",
        0x09 => "Tab", 0x08 => "Backspace", 0x2E => "Delete", 0x2D => "Insert",
        0x24 => "Home", 0x23 => "End", 0x21 => "PageUp", 0x22 => "PageDown",
        0x26 => "Up", 0x28 => "Down", 0x25 => "Left", 0x27 => "Right",
        0x2C => "PrintScreen",
        _ => "?",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_key() {
        let combo = parse("PrintScreen").unwrap();
        assert_eq!(combo.modifiers, 0);
        assert_eq!(combo.key, VK_SNAPSHOT);
    }

    #[test]
    fn test_parse_with_modifiers() {
        let combo = parse("Ctrl+Shift+PrintScreen").unwrap();
        assert_eq!(combo.modifiers, MOD_CONTROL | MOD_SHIFT);
        assert_eq!(combo.key, VK_SNAPSHOT);
    }

    #[test]
    fn test_parse_is_case_and_space_insensitive() {
        let canonical = parse("Ctrl+PrintScreen").unwrap();
        assert_eq!(parse("ctrl + printscreen").unwrap(), canonical);
        assert_eq!(parse("CONTROL+PRINTSCREEN").unwrap(), canonical);
        assert_eq!(parse("  Ctrl  +  PrintScreen  ").unwrap(), canonical);
    }

    #[test]
    fn test_short_aliases() {
        assert_eq!(parse("PrtSc").unwrap(), parse("PrintScreen").unwrap());
        assert_eq!(parse("prtscn").unwrap(), parse("PrintScreen").unwrap());
        assert_eq!(parse("Esc").unwrap(), parse("Escape").unwrap());
        assert_eq!(parse("Return").unwrap(), parse("Enter").unwrap());
    }

    #[test]
    fn test_format_round_trip() {
        // format(parse(s)) == s for canonical strings.
        for s in [
            "PrintScreen",
            "Ctrl+PrintScreen",
            "Ctrl+Shift+PrintScreen",
            "Ctrl+Alt+Shift+Win+F5",
            "Alt+Space",
            "Win+Z",
            "Shift+9",
            "PageDown",
        ] {
            assert_eq!(format(parse(s).unwrap()), s, "round trip failed for {}", s);
        }
    }

    #[test]
    fn test_format_orders_modifiers_canonically() {
        // Input order does not matter; output is Ctrl, Alt, Shift, Win.
        assert_eq!(format(parse("shift+ctrl+alt+F2").unwrap()), "Ctrl+Alt+Shift+F2");
    }

    #[test]
    fn test_parse_failures() {
        assert!(parse("").is_err());
        assert!(parse("+").is_err());
        assert!(parse("Ctrl+").is_err());
        assert!(parse("Ctrl+Banana").is_err());
        assert!(parse("Hyper+P").is_err());
        // A modifier alone is not a binding.
        assert!(parse("Ctrl").is_err());
    }

    #[test]
    fn test_printscreen_fallback_combo() {
        let combo = parse("PrintScreen").unwrap();
        assert!(combo.is_bare_printscreen());
        assert_eq!(format(combo.with_alt()), "Alt+PrintScreen");
        assert!(!parse("Ctrl+PrintScreen").unwrap().is_bare_printscreen());
    }
}
