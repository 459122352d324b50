//! Inbound commands for toggle devices.
//!
//! Home automation frontends are not consistent about switch payloads, so
//! the usual spellings are all accepted.

/// A decoded switch command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchCommand {
    On,
    Off,
}

impl SwitchCommand {
    /// Decode a command payload.  Surrounding whitespace is ignored and the
    /// match is case-insensitive.  Returns `None` for anything else.
    pub fn parse(payload: &[u8]) -> Option<Self> {
        let text = core::str::from_utf8(payload).ok()?.trim();
        const ON: [&str; 3] = ["on", "1", "true"];
        const OFF: [&str; 3] = ["off", "0", "false"];
        if ON.iter().any(|s| text.eq_ignore_ascii_case(s)) {
            Some(Self::On)
        } else if OFF.iter().any(|s| text.eq_ignore_ascii_case(s)) {
            Some(Self::Off)
        } else {
            None
        }
    }

    pub fn as_bool(self) -> bool {
        matches!(self, Self::On)
    }
}
