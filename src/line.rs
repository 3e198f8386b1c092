//! Serial line protocol for the companion receiver/transmitter modules.
//!
//! The decoding receiver reports signals as newline- or carriage-return-
//! terminated ASCII lines in one of three formats: `LC:<8hex>`, `RX:<8hex>`,
//! or a bare `<8hex>`. The companion transmitter accepts `TX:<6hex><2hex>`.

use crate::signal::{ADDRESS_HEX_LEN, KEY_HEX_LEN};

/// Hard cap on an unterminated line; anything longer resets the pending
/// buffer to bound memory.
pub const MAX_LINE_LEN: usize = 64;

/// Parse one trimmed line into `(address, key)`.
///
/// Formats are tried in order:
/// 1. `LC:` followed by at least 8 characters: take characters 3..11.
/// 2. `RX:` followed by at least 8 characters: same extraction.
/// 3. No prefix: if the first 8 characters are all hex digits, use them.
///
/// The prefixed rules do *not* re-validate hex-ness of the inner substring
/// (`LC:62E7E8ZZ` matches); only the bare rule checks the character class.
/// That permissiveness is intentional and matched by `decode32`'s
/// non-hex-maps-to-zero behavior. `None` means "not a signal line", which
/// callers drop without raising an error.
pub fn parse_line(line: &str) -> Option<(String, String)> {
    let data = line.trim();
    let chars: Vec<char> = data.chars().collect();

    for prefix in ["LC:", "RX:"] {
        if data.starts_with(prefix) && chars.len() >= 3 + ADDRESS_HEX_LEN + KEY_HEX_LEN {
            return Some(split_code(&chars[3..3 + ADDRESS_HEX_LEN + KEY_HEX_LEN]));
        }
    }

    if chars.len() >= ADDRESS_HEX_LEN + KEY_HEX_LEN {
        let code = &chars[..ADDRESS_HEX_LEN + KEY_HEX_LEN];
        if code.iter().all(|c| c.is_ascii_hexdigit()) {
            return Some(split_code(code));
        }
    }

    None
}

fn split_code(code: &[char]) -> (String, String) {
    let address: String = code[..ADDRESS_HEX_LEN].iter().collect();
    let key: String = code[ADDRESS_HEX_LEN..].iter().collect();
    (address.to_uppercase(), key.to_uppercase())
}

/// Format the outbound transmit command for the companion transmitter.
///
/// Returns `None` (logged) when the address/key are not exactly 6/2
/// characters; the module would reject the frame anyway.
pub fn format_tx_command(address: &str, key: &str) -> Option<String> {
    if address.len() != ADDRESS_HEX_LEN || key.len() != KEY_HEX_LEN {
        tracing::warn!(address, key, "refusing to format malformed TX command");
        return None;
    }
    Some(format!("TX:{}{}", address, key))
}

/// Assembles a byte stream into lines.
///
/// `\n` and `\r` both terminate; empty lines are swallowed. Past
/// [`MAX_LINE_LEN`] pending bytes the buffer is discarded (overflow is
/// non-fatal: log and resynchronize on the next terminator).
#[derive(Debug, Default)]
pub struct LineAssembler {
    buf: Vec<u8>,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte; returns a completed line when a terminator arrives.
    pub fn push(&mut self, byte: u8) -> Option<String> {
        if byte == b'\n' || byte == b'\r' {
            if self.buf.is_empty() {
                return None;
            }
            let line = String::from_utf8_lossy(&self.buf).into_owned();
            self.buf.clear();
            return Some(line);
        }

        self.buf.push(byte);
        if self.buf.len() > MAX_LINE_LEN {
            tracing::warn!(len = self.buf.len(), "serial line overflow, resetting buffer");
            self.buf.clear();
        }
        None
    }

    /// Drop any partially assembled line.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}
