use crate::error::InstrumentError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A concrete timeframe expressed in minutes, parsed from Bybit-style interval names
/// (`1m, 3m, 5m, 15m, 30m, 1h, 2h, 4h, 12h, D, W, M`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Timeframe(u32);

impl Timeframe {
    pub const M1: Timeframe = Timeframe(1);

    /// Minutes this timeframe spans.
    pub fn minutes(self) -> u32 {
        self.0
    }

    /// Construct directly from a minute count; `minutes` must be one of the supported Bybit
    /// widths (1, 3, 5, 15, 30, 60, 120, 240, 720, 1440).
    pub fn from_minutes(minutes: u32) -> Result<Self, InstrumentError> {
        const SUPPORTED: [u32; 10] = [1, 3, 5, 15, 30, 60, 120, 240, 720, 1_440];
        if SUPPORTED.contains(&minutes) {
            Ok(Timeframe(minutes))
        } else {
            Err(InstrumentError::UnknownTimeframe(format!("{minutes}m")))
        }
    }

    /// Parse a Bybit-style interval string (`1m, 3m, ..., D, W, M`). `W`/`M` are expressed in
    /// minutes of 7 and 30 days respectively for bar-stepping purposes.
    pub fn parse(raw: &str) -> Result<Self, InstrumentError> {
        let minutes = match raw {
            "1m" => 1,
            "3m" => 3,
            "5m" => 5,
            "15m" => 15,
            "30m" => 30,
            "1h" | "60m" => 60,
            "2h" | "120m" => 120,
            "4h" | "240m" => 240,
            "12h" | "720m" => 720,
            "D" | "1d" => 1_440,
            "W" | "1w" => 1_440 * 7,
            "M" | "1M" => 1_440 * 30,
            other => return Err(InstrumentError::UnknownTimeframe(other.to_string())),
        };
        Ok(Timeframe(minutes))
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}m", self.0)
    }
}

impl<'de> Deserialize<'de> for Timeframe {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Timeframe::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// The three timeframe slots a Play's engine advances: `low_tf`, `med_tf`, `high_tf`. `exec`
/// names one of these roles; it is never a concrete interval itself (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TfRole {
    LowTf,
    MedTf,
    HighTf,
}

impl TfRole {
    pub fn all() -> [TfRole; 3] {
        [TfRole::LowTf, TfRole::MedTf, TfRole::HighTf]
    }

    pub fn parse(raw: &str) -> Result<Self, InstrumentError> {
        match raw {
            "low_tf" => Ok(TfRole::LowTf),
            "med_tf" => Ok(TfRole::MedTf),
            "high_tf" => Ok(TfRole::HighTf),
            other => Err(InstrumentError::UnknownTfRole(other.to_string())),
        }
    }
}

impl fmt::Display for TfRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TfRole::LowTf => "low_tf",
            TfRole::MedTf => "med_tf",
            TfRole::HighTf => "high_tf",
        };
        write!(f, "{name}")
    }
}

/// A Play's timeframe mapping: a concrete [`Timeframe`] bound to each of the three roles, plus
/// the `exec` pointer naming which role drives bar stepping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct TimeframeMap {
    pub low_tf: Timeframe,
    pub med_tf: Timeframe,
    pub high_tf: Timeframe,
    pub exec: TfRole,
}

impl TimeframeMap {
    /// Resolve a role to its configured [`Timeframe`].
    pub fn resolve(&self, role: TfRole) -> Timeframe {
        match role {
            TfRole::LowTf => self.low_tf,
            TfRole::MedTf => self.med_tf,
            TfRole::HighTf => self.high_tf,
        }
    }

    /// The concrete timeframe the engine steps bars on.
    pub fn exec_timeframe(&self) -> Timeframe {
        self.resolve(self.exec)
    }

    /// Validate the role ordering `low_tf <= med_tf <= high_tf` and that `exec` is the `low_tf`
    /// role (the engine only ever steps bars on the finest configured role).
    pub fn validate(&self) -> Result<(), InstrumentError> {
        if self.low_tf > self.med_tf || self.med_tf > self.high_tf {
            return Err(InstrumentError::InvalidCandle(
                "timeframe roles must satisfy low_tf <= med_tf <= high_tf".into(),
            ));
        }
        if self.exec != TfRole::LowTf {
            return Err(InstrumentError::InvalidCandle(
                "exec must point at low_tf: the engine steps bars on the finest role".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bybit_names() {
        assert_eq!(Timeframe::parse("1m").unwrap().minutes(), 1);
        assert_eq!(Timeframe::parse("D").unwrap().minutes(), 1_440);
        assert_eq!(Timeframe::parse("4h").unwrap().minutes(), 240);
        assert!(Timeframe::parse("7m").is_err());
    }

    #[test]
    fn tf_role_round_trips_through_display_and_parse() {
        for role in TfRole::all() {
            assert_eq!(TfRole::parse(&role.to_string()).unwrap(), role);
        }
    }
}
