//! Persisted representation of the local cart.
//!
//! The cart is stored as a JSON array of
//! `{"productId", "quantity", "size", "color"?}` objects. Lines linked to the
//! remote cart also carry `"serverLineId"`; older payloads without it load
//! as unlinked lines.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use cartwheel_core::{CartLine, LineIdentity, ProductId, ServerLineId, VariantKey};

use crate::gateway::wire::lenient;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedLine {
    #[serde(deserialize_with = "lenient::product_id")]
    product_id: ProductId,
    quantity: u32,
    #[serde(deserialize_with = "lenient::text")]
    size: String,
    #[serde(
        default,
        deserialize_with = "lenient::optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    server_line_id: Option<ServerLineId>,
}

impl From<&CartLine> for PersistedLine {
    fn from(line: &CartLine) -> Self {
        let identity = line.identity();
        Self {
            product_id: identity.product_id().clone(),
            quantity: line.quantity(),
            size: identity.size().to_owned(),
            color: identity.color().map(ToOwned::to_owned),
            server_line_id: line.server_line_id(),
        }
    }
}

/// Serialize the cart for storage.
pub fn encode(lines: &[CartLine]) -> Result<String, serde_json::Error> {
    let persisted: Vec<PersistedLine> = lines.iter().map(PersistedLine::from).collect();
    serde_json::to_string(&persisted)
}

/// Parse a stored cart.
///
/// Zero-quantity entries are dropped and entries sharing an identity are
/// folded into the first occurrence, so the returned lines always satisfy the
/// identity-uniqueness invariant.
pub fn decode(raw: &str) -> Result<Vec<CartLine>, serde_json::Error> {
    let persisted: Vec<PersistedLine> = serde_json::from_str(raw)?;

    let mut lines: Vec<CartLine> = Vec::with_capacity(persisted.len());
    let mut index: HashMap<LineIdentity, usize> = HashMap::new();

    for entry in persisted {
        if entry.quantity == 0 {
            warn!(product_id = %entry.product_id, "Dropping zero-quantity line from stored cart");
            continue;
        }

        let identity = LineIdentity::new(
            entry.product_id,
            VariantKey::new(entry.color.as_deref(), &entry.size),
        );

        if let Some(&pos) = index.get(&identity) {
            warn!(%identity, "Folding duplicate line in stored cart");
            if let Some(existing) = lines.get_mut(pos) {
                existing.add_quantity(entry.quantity);
                if existing.server_line_id().is_none() {
                    existing.set_server_line_id(entry.server_line_id);
                }
            }
            continue;
        }

        index.insert(identity.clone(), lines.len());
        lines.push(CartLine::new(identity, entry.quantity).with_server_line_id(entry.server_line_id));
    }

    Ok(lines)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_omits_absent_fields() {
        let line = CartLine::new(
            LineIdentity::new(ProductId::parse("7").unwrap(), VariantKey::new(None, "M")),
            2,
        );
        let json = encode(&[line]).unwrap();
        assert_eq!(json, r#"[{"productId":"7","quantity":2,"size":"M"}]"#);
    }

    #[test]
    fn test_encode_includes_server_line_id_when_linked() {
        let line = CartLine::new(
            LineIdentity::new(ProductId::parse("7").unwrap(), VariantKey::new(Some("red"), "M")),
            1,
        )
        .with_server_line_id(Some(ServerLineId::new(10)));
        let json = encode(&[line]).unwrap();
        assert_eq!(
            json,
            r#"[{"productId":"7","quantity":1,"size":"M","color":"red","serverLineId":10}]"#
        );
    }

    #[test]
    fn test_decode_accepts_numeric_ids_and_colors() {
        let lines = decode(r#"[{"productId":12,"quantity":3,"size":"L","color":4}]"#).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].identity().product_id().as_str(), "12");
        assert_eq!(lines[0].identity().color(), Some("4"));
        assert_eq!(lines[0].quantity(), 3);
        assert_eq!(lines[0].server_line_id(), None);
    }

    #[test]
    fn test_decode_folds_duplicates_and_drops_zero() {
        let raw = r#"[
            {"productId":"A","quantity":1,"size":"M","color":"1"},
            {"productId":"B","quantity":0,"size":"S"},
            {"productId":"A","quantity":4,"size":"M","color":"1"}
        ]"#;
        let lines = decode(raw).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity(), 5);
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(decode("not json").is_err());
        assert!(decode(r#"[{"productId":"A"}]"#).is_err());
        assert!(decode(r#"{"productId":"A","quantity":1,"size":"M"}"#).is_err());
    }
}
