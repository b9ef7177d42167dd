//! CDC message envelope

use serde::Deserialize;
use serde_json::Value;

/// Row-level operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum CdcOp {
    #[serde(rename = "c")]
    Create,
    #[serde(rename = "u")]
    Update,
    #[serde(rename = "d")]
    Delete,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CdcSourceInfo {
    pub table: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CdcPayload {
    pub before: Option<Value>,
    pub after: Option<Value>,
    pub source: CdcSourceInfo,
    pub op: CdcOp,
}

/// The JSON envelope as read off the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct CdcEnvelope {
    pub payload: CdcPayload,
}

impl CdcEnvelope {
    /// Strict parse; any shape mismatch is a decode error the consumer
    /// logs and skips.
    pub fn parse(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn table(&self) -> &str {
        &self.payload.source.table
    }

    /// For `shipments` updates: the (before, after) status pair when the
    /// status column actually changed.
    pub fn shipment_status_change(&self) -> Option<(String, String)> {
        if self.table() != "shipments" || self.payload.op != CdcOp::Update {
            return None;
        }
        let before = self.payload.before.as_ref()?.get("status")?.as_str()?;
        let after = self.payload.after.as_ref()?.get("status")?.as_str()?;
        if before == after {
            return None;
        }
        Some((before.to_string(), after.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(table: &str, op: &str, before: &str, after: &str) -> Vec<u8> {
        format!(
            r#"{{"payload":{{"before":{{"id":"shp_1","status":"{before}"}},
                 "after":{{"id":"shp_1","status":"{after}"}},
                 "source":{{"table":"{table}"}},"op":"{op}"}}}}"#
        )
        .into_bytes()
    }

    #[test]
    fn status_change_detected() {
        let env = CdcEnvelope::parse(&envelope("shipments", "u", "new", "in_transit")).unwrap();
        assert_eq!(
            env.shipment_status_change(),
            Some(("new".to_string(), "in_transit".to_string()))
        );
    }

    #[test]
    fn unchanged_status_is_ignored() {
        let env = CdcEnvelope::parse(&envelope("shipments", "u", "new", "new")).unwrap();
        assert_eq!(env.shipment_status_change(), None);
    }

    #[test]
    fn creates_and_deletes_are_ignored() {
        let env = CdcEnvelope::parse(&envelope("shipments", "c", "new", "in_transit")).unwrap();
        assert_eq!(env.shipment_status_change(), None);
        let env = CdcEnvelope::parse(&envelope("shipments", "d", "new", "in_transit")).unwrap();
        assert_eq!(env.shipment_status_change(), None);
    }

    #[test]
    fn other_tables_are_ignored() {
        let env = CdcEnvelope::parse(&envelope("workers", "u", "new", "in_transit")).unwrap();
        assert_eq!(env.shipment_status_change(), None);
    }

    #[test]
    fn malformed_json_is_a_decode_error() {
        assert!(CdcEnvelope::parse(b"{not json").is_err());
        assert!(CdcEnvelope::parse(br#"{"payload":{"op":"u"}}"#).is_err());
    }
}
