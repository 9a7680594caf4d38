//! Error types for the parcel-ascent crate.
use std::fmt;

/// Error type for the crate.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum AscentError {
    /// A profile failed validation, e.g. too short or heights not strictly increasing.
    InvalidProfile(&'static str),
    /// A line of an on-disk profile could not be parsed.
    MalformedProfileRow(usize),
    /// Bad or invalid configuration input.
    InvalidConfiguration(&'static str),
    /// A required configuration key was missing from the key-value map.
    MissingConfigurationKey(&'static str),
    /// A dynamic or pseudoadiabatic scheme identifier was not recognized. This is fatal, no
    /// default scheme is ever substituted.
    UnknownScheme(&'static str),
    /// A parcel state index that should have been finalized was not yet computed.
    IncompleteState,
    /// The wet-bulb temperature left the domain of every empirical pseudoadiabat band.
    WetBulbOutOfRange,
}

/// Shorthand for results.
pub type Result<T> = std::result::Result<T, AscentError>;

impl fmt::Display for AscentError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use crate::AscentError::*;

        match self {
            InvalidProfile(msg) => write!(f, "invalid sounding profile: {}", msg),
            MalformedProfileRow(row) => write!(f, "malformed sounding profile at data row {}", row),
            InvalidConfiguration(msg) => write!(f, "invalid run configuration: {}", msg),
            MissingConfigurationKey(key) => write!(f, "missing configuration key: {}", key),
            UnknownScheme(which) => write!(f, "unrecognized scheme identifier for {}", which),
            IncompleteState => write!(f, "parcel state not yet computed at requested step"),
            WetBulbOutOfRange => write!(
                f,
                "wet-bulb temperature outside the domain of the pseudoadiabatic closure"
            ),
        }
    }
}

impl std::error::Error for AscentError {}
