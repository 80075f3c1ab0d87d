//! Run identifiers
//!
//! Every pipeline run is tagged with a nanoid-based id so reports of the
//! same scenario written to different directories can be told apart.

use std::fmt;

use chrono::Utc;
use nanoid::nanoid;
use serde::{Deserialize, Serialize};

/// Alphanumeric only, so `-` stays a field separator
const ALPHABET: [char; 36] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k',
    'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];

/// `RUN-<utc start, yyyymmddThhmmss>-<8 random chars>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl RunId {
    pub fn new() -> Self {
        let started = Utc::now().format("%Y%m%dT%H%M%S");
        Self(format!("RUN-{started}-{}", nanoid!(8, &ALPHABET)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
