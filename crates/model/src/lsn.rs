use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A PostgreSQL Log Sequence Number: a byte offset into the write-ahead log.
///
/// The wire and textual representation is `XXXXXXXX/XXXXXXXX` (two hex
/// halves); internally it is a single `u64` so it orders and arithmetics
/// naturally (P1, P2 in the replication invariants depend on `Lsn: Ord`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Lsn(pub u64);

impl Lsn {
    pub const ZERO: Lsn = Lsn(0);

    pub fn from_u64(v: u64) -> Self {
        Lsn(v)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Lsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}/{:X}", self.0 >> 32, self.0 & 0xFFFF_FFFF)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid LSN literal: {0}")]
pub struct ParseLsnError(String);

impl FromStr for Lsn {
    type Err = ParseLsnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hi, lo) = s
            .split_once('/')
            .ok_or_else(|| ParseLsnError(s.to_string()))?;
        let hi = u32::from_str_radix(hi, 16).map_err(|_| ParseLsnError(s.to_string()))?;
        let lo = u32::from_str_radix(lo, 16).map_err(|_| ParseLsnError(s.to_string()))?;
        Ok(Lsn(((hi as u64) << 32) | lo as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display_and_parse() {
        let lsn = Lsn(0x16_9ABC_DEF0);
        let text = lsn.to_string();
        assert_eq!(text.parse::<Lsn>().unwrap(), lsn);
    }

    #[test]
    fn orders_by_numeric_value() {
        assert!(Lsn(10) < Lsn(11));
        assert!("0/A".parse::<Lsn>().unwrap() < "0/B".parse::<Lsn>().unwrap());
    }

    #[test]
    fn rejects_malformed_literal() {
        assert!("not-an-lsn".parse::<Lsn>().is_err());
    }
}
