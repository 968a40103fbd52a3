//! Session codes derived from the time of day
//!
//! A session code is four uppercase letters. The millisecond-of-day is scaled
//! onto the `26^4` codes available, so consecutive codes are issued roughly
//! every 189ms and the sequence wraps at midnight UTC.

use super::{PacerError, epoch_millis};
use std::fmt;
use std::time::SystemTime;

const CODE_LEN: usize = 4;
const ALPHABET_LEN: u64 = 26;
const CODE_SPACE: u64 = ALPHABET_LEN * ALPHABET_LEN * ALPHABET_LEN * ALPHABET_LEN;
const MILLIS_PER_DAY: u64 = 86_400_000;

/// A 4-letter routing label such as `"KQZB"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionCode([u8; CODE_LEN]);

impl SessionCode {
    /// Parse a user-supplied code, accepting lowercase input
    ///
    /// # Errors
    ///
    /// Returns [`PacerError::InvalidSessionCode`] unless `s` is exactly four ASCII letters.
    pub fn parse(s: &str) -> Result<Self, PacerError> {
        let bytes = s.as_bytes();
        if bytes.len() != CODE_LEN || !bytes.iter().all(u8::is_ascii_alphabetic) {
            return Err(PacerError::InvalidSessionCode(s.to_string()));
        }

        let mut code = [0u8; CODE_LEN];
        for (dst, src) in code.iter_mut().zip(bytes) {
            *dst = src.to_ascii_uppercase();
        }
        Ok(SessionCode(code))
    }

    pub fn as_str(&self) -> &str {
        // Only ever constructed from ASCII uppercase letters
        std::str::from_utf8(&self.0).unwrap_or("AAAA")
    }

    fn from_slot(mut slot: u64) -> Self {
        let mut code = [b'A'; CODE_LEN];
        for digit in code.iter_mut().rev() {
            *digit = b'A' + (slot % ALPHABET_LEN) as u8;
            slot /= ALPHABET_LEN;
        }
        SessionCode(code)
    }
}

impl fmt::Display for SessionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SessionCode {
    type Err = PacerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SessionCode::parse(s)
    }
}

/// Derive the session code for a point in time
///
/// Deterministic for a given timestamp. Not collision free.
///
/// # Example
///
/// ```
/// use pacekeeper::session_code;
/// use std::time::UNIX_EPOCH;
///
/// assert_eq!(session_code(UNIX_EPOCH).unwrap().as_str(), "AAAA");
/// ```
pub fn session_code(at: SystemTime) -> Result<SessionCode, PacerError> {
    let ms_of_day = epoch_millis(at)? % MILLIS_PER_DAY;
    Ok(SessionCode::from_slot(ms_of_day * CODE_SPACE / MILLIS_PER_DAY))
}
