//! Prefixed sortable entity identifiers
//!
//! Every entity ID is the printable string `<prefix>_<26 base32 chars>`:
//! a domain prefix, an underscore, and a ULID body (time-prefixed random
//! base32, sortable by creation instant). The prefix is mandatory in the
//! printable form and checked on inbound parsing; equality and ordering are
//! carried by the body.
//!
//! Used by both the engine and any client-facing crate for unified ID
//! generation.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ulid::Ulid;

/// Domain prefixes for entity identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdPrefix {
    /// `shp` — shipment root
    Shipment,
    /// `smv` — shipment move
    ShipmentMove,
    /// `stp` — stop
    Stop,
    /// `a` — assignment
    Assignment,
    /// `ac` — additional charge
    AdditionalCharge,
    /// `sc` — shipment comment
    ShipmentComment,
    /// `cg` — shipment commodity
    ShipmentCommodity,
    /// `sh` — shipment hold
    ShipmentHold,
    /// `hr` — hold reason
    HoldReason,
    /// `cust` — customer
    Customer,
    /// `loc` — location
    Location,
    /// `wrk` — worker (driver)
    Worker,
    /// `trk` — tractor
    Tractor,
    /// `trl` — trailer
    Trailer,
    /// `ft` — formula template
    FormulaTemplate,
    /// `acc` — accessorial charge catalog entry
    AccessorialCharge,
}

impl IdPrefix {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Shipment => "shp",
            Self::ShipmentMove => "smv",
            Self::Stop => "stp",
            Self::Assignment => "a",
            Self::AdditionalCharge => "ac",
            Self::ShipmentComment => "sc",
            Self::ShipmentCommodity => "cg",
            Self::ShipmentHold => "sh",
            Self::HoldReason => "hr",
            Self::Customer => "cust",
            Self::Location => "loc",
            Self::Worker => "wrk",
            Self::Tractor => "trk",
            Self::Trailer => "trl",
            Self::FormulaTemplate => "ft",
            Self::AccessorialCharge => "acc",
        }
    }

    /// Reverse lookup used by the strict parser.
    pub fn from_str_strict(s: &str) -> Option<Self> {
        Some(match s {
            "shp" => Self::Shipment,
            "smv" => Self::ShipmentMove,
            "stp" => Self::Stop,
            "a" => Self::Assignment,
            "ac" => Self::AdditionalCharge,
            "sc" => Self::ShipmentComment,
            "cg" => Self::ShipmentCommodity,
            "sh" => Self::ShipmentHold,
            "hr" => Self::HoldReason,
            "cust" => Self::Customer,
            "loc" => Self::Location,
            "wrk" => Self::Worker,
            "trk" => Self::Tractor,
            "trl" => Self::Trailer,
            "ft" => Self::FormulaTemplate,
            "acc" => Self::AccessorialCharge,
            _ => return None,
        })
    }
}

impl std::fmt::Display for IdPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured parse failure for inbound identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("identifier is empty")]
    Empty,
    #[error("identifier '{0}' has no prefix separator")]
    MissingSeparator(String),
    #[error("identifier '{0}' has unknown prefix '{1}'")]
    UnknownPrefix(String, String),
    #[error("identifier '{id}' has prefix '{found}', expected '{expected}'")]
    WrongPrefix {
        id: String,
        expected: &'static str,
        found: String,
    },
    #[error("identifier '{0}' has a malformed body (want 26 base32 chars)")]
    InvalidBody(String),
}

/// A parsed identifier: prefix plus sortable body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParsedId {
    pub prefix: IdPrefix,
    pub body: Ulid,
}

impl ParsedId {
    /// Millisecond timestamp component of the body.
    pub fn timestamp_ms(&self) -> u64 {
        self.body.timestamp_ms()
    }
}

impl std::fmt::Display for ParsedId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.prefix, self.body)
    }
}

/// Generate a fresh printable identifier for the given domain.
pub fn generate(prefix: IdPrefix) -> String {
    format!("{}_{}", prefix.as_str(), Ulid::new())
}

/// The sentinel empty value. Never valid on the wire.
pub fn nil() -> String {
    String::new()
}

/// Whether a stored id is the nil sentinel.
pub fn is_nil(id: &str) -> bool {
    id.is_empty()
}

/// Strict parse of `<prefix>_<ulid>`.
///
/// Rejects unknown prefixes, missing separators, and malformed bodies
/// (wrong length or characters outside the base32 alphabet). Parsing is
/// case-insensitive on the body.
pub fn parse(id: &str) -> Result<ParsedId, IdError> {
    if id.is_empty() {
        return Err(IdError::Empty);
    }
    let (prefix_str, body_str) = id
        .rsplit_once('_')
        .ok_or_else(|| IdError::MissingSeparator(id.to_string()))?;
    let prefix = IdPrefix::from_str_strict(prefix_str)
        .ok_or_else(|| IdError::UnknownPrefix(id.to_string(), prefix_str.to_string()))?;
    if body_str.len() != ulid::ULID_LEN {
        return Err(IdError::InvalidBody(id.to_string()));
    }
    let body = Ulid::from_string(body_str).map_err(|_| IdError::InvalidBody(id.to_string()))?;
    Ok(ParsedId { prefix, body })
}

/// Parse and require a specific domain prefix.
pub fn parse_expecting(id: &str, expected: IdPrefix) -> Result<ParsedId, IdError> {
    let parsed = parse(id)?;
    if parsed.prefix != expected {
        return Err(IdError::WrongPrefix {
            id: id.to_string(),
            expected: expected.as_str(),
            found: parsed.prefix.as_str().to_string(),
        });
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_round_trip() {
        let id = generate(IdPrefix::Shipment);
        assert!(id.starts_with("shp_"));
        let parsed = parse(&id).unwrap();
        assert_eq!(parsed.prefix, IdPrefix::Shipment);
        assert_eq!(parsed.to_string(), id);
    }

    #[test]
    fn generated_ids_sort_by_time() {
        let a = generate(IdPrefix::Stop);
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = generate(IdPrefix::Stop);
        assert!(parse(&a).unwrap().timestamp_ms() <= parse(&b).unwrap().timestamp_ms());
    }

    #[test]
    fn parse_is_case_insensitive_on_body() {
        let id = generate(IdPrefix::Customer);
        let lowered = id.to_lowercase();
        assert_eq!(parse(&lowered).unwrap().prefix, IdPrefix::Customer);
    }

    #[test]
    fn parse_rejects_malformed() {
        assert_eq!(parse(""), Err(IdError::Empty));
        assert!(matches!(parse("shp01HX"), Err(IdError::MissingSeparator(_))));
        assert!(matches!(
            parse("zzz_01ARZ3NDEKTSV4RRFFQ69G5FAV"),
            Err(IdError::UnknownPrefix(_, _))
        ));
        // body too short
        assert!(matches!(parse("shp_01HX"), Err(IdError::InvalidBody(_))));
        // 'u' is outside the Crockford alphabet
        assert!(matches!(
            parse("shp_u1ARZ3NDEKTSV4RRFFQ69G5FAV"),
            Err(IdError::InvalidBody(_))
        ));
    }

    #[test]
    fn parse_expecting_checks_domain() {
        let id = generate(IdPrefix::ShipmentMove);
        assert!(parse_expecting(&id, IdPrefix::ShipmentMove).is_ok());
        let err = parse_expecting(&id, IdPrefix::Shipment).unwrap_err();
        assert!(matches!(err, IdError::WrongPrefix { expected: "shp", .. }));
    }

    #[test]
    fn nil_is_empty_and_invalid() {
        assert!(is_nil(&nil()));
        assert!(parse(&nil()).is_err());
    }
}
