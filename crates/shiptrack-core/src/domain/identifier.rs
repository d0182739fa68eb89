use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

const MIN_IDENTIFIER_LEN: usize = 3;
const MAX_IDENTIFIER_LEN: usize = 50;

/// Kind of tracking number a caller supplies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierType {
    Container,
    Booking,
    Bol,
    Vessel,
}

impl IdentifierType {
    pub const ALL: [Self; 4] = [Self::Container, Self::Booking, Self::Bol, Self::Vessel];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Container => "container",
            Self::Booking => "booking",
            Self::Bol => "bol",
            Self::Vessel => "vessel",
        }
    }

    /// Best-effort type detection for callers that omit the type.
    ///
    /// ISO 6346 container numbers (four letters, seven digits) map to
    /// `Container`, IMO numbers to `Vessel`, and everything else to `Booking`.
    pub fn detect(identifier: &TrackingNumber) -> Self {
        let value = identifier.as_str();
        if is_container_number(value) {
            return Self::Container;
        }

        let imo_digits = value.strip_prefix("IMO").unwrap_or(value);
        if imo_digits.len() == 7 && imo_digits.bytes().all(|b| b.is_ascii_digit()) {
            return Self::Vessel;
        }

        Self::Booking
    }
}

impl Display for IdentifierType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdentifierType {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "container" => Ok(Self::Container),
            "booking" => Ok(Self::Booking),
            "bol" | "bl" | "bill_of_lading" | "bill-of-lading" => Ok(Self::Bol),
            "vessel" => Ok(Self::Vessel),
            other => Err(ValidationError::InvalidIdentifierType {
                value: other.to_owned(),
            }),
        }
    }
}

/// Validated, normalized tracking identifier (container, booking, BoL or vessel number).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TrackingNumber(String);

impl TrackingNumber {
    /// Parse and normalize an identifier to uppercase.
    ///
    /// Accepts 3 to 50 ASCII alphanumerics, `-` or `_` after trimming.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyIdentifier);
        }

        let normalized = trimmed.to_ascii_uppercase();
        let len = normalized.chars().count();
        if len < MIN_IDENTIFIER_LEN {
            return Err(ValidationError::IdentifierTooShort {
                len,
                min: MIN_IDENTIFIER_LEN,
            });
        }
        if len > MAX_IDENTIFIER_LEN {
            return Err(ValidationError::IdentifierTooLong {
                len,
                max: MAX_IDENTIFIER_LEN,
            });
        }

        for (index, ch) in normalized.chars().enumerate() {
            let valid = ch.is_ascii_alphanumeric() || ch == '-' || ch == '_';
            if !valid {
                return Err(ValidationError::IdentifierInvalidChar { ch, index });
            }
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TrackingNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for TrackingNumber {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for TrackingNumber {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<TrackingNumber> for String {
    fn from(value: TrackingNumber) -> Self {
        value.0
    }
}

fn is_container_number(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 11
        && bytes[..4].iter().all(u8::is_ascii_uppercase)
        && bytes[4..].iter().all(u8::is_ascii_digit)
}
