//! Wire types for the REST cart API and their conversions to core types.

use serde::{Deserialize, Serialize};

use cartwheel_core::{
    LineIdentity, ProductId, RemoteLine, ResolvedLine, ServerLineId, UnresolvedLine, VariantId,
    VariantKey, VariantRef,
};

/// Deserializers that accept either JSON strings or numbers for opaque ids
/// and attribute values. The API (and carts persisted by older clients) use
/// both.
pub mod lenient {
    use serde::{Deserialize, Deserializer, de::Error as _};

    use cartwheel_core::ProductId;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TextOrNumber {
        Text(String),
        Number(serde_json::Number),
    }

    impl TextOrNumber {
        fn into_string(self) -> String {
            match self {
                Self::Text(s) => s,
                Self::Number(n) => n.to_string(),
            }
        }
    }

    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        TextOrNumber::deserialize(d).map(TextOrNumber::into_string)
    }

    pub fn optional_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Option::<TextOrNumber>::deserialize(d).map(|v| v.map(TextOrNumber::into_string))
    }

    pub fn product_id<'de, D: Deserializer<'de>>(d: D) -> Result<ProductId, D::Error> {
        let raw = text(d)?;
        ProductId::parse(&raw).map_err(D::Error::custom)
    }
}

/// Variant attributes as embedded in a line or returned by `variants/{id}/`.
#[derive(Debug, Deserialize)]
pub struct VariantAttributes {
    #[serde(deserialize_with = "lenient::product_id")]
    pub product: ProductId,
    #[serde(default, deserialize_with = "lenient::optional_text")]
    pub color: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub size: String,
}

impl From<VariantAttributes> for LineIdentity {
    fn from(attrs: VariantAttributes) -> Self {
        Self::new(
            attrs.product,
            VariantKey::new(attrs.color.as_deref(), &attrs.size),
        )
    }
}

/// The `variant` field of a line: embedded attributes or a bare id.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum VariantField {
    Embedded(VariantAttributes),
    Ref(VariantId),
}

/// A cart line as returned by the API.
#[derive(Debug, Deserialize)]
pub struct LineResponse {
    pub id: ServerLineId,
    pub variant: VariantField,
    pub quantity: u32,
}

impl From<LineResponse> for RemoteLine {
    fn from(line: LineResponse) -> Self {
        match line.variant {
            VariantField::Embedded(attrs) => Self::Resolved(ResolvedLine {
                server_line_id: line.id,
                identity: attrs.into(),
                quantity: line.quantity,
            }),
            VariantField::Ref(variant) => Self::Unresolved(UnresolvedLine {
                server_line_id: line.id,
                variant,
                quantity: line.quantity,
            }),
        }
    }
}

/// Body of `POST cart/`.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum CreateLineRequest<'a> {
    ByAttributes {
        product: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        color: Option<&'a str>,
        size: &'a str,
        quantity: u32,
    },
    ByVariant {
        variant: VariantId,
        quantity: u32,
    },
}

impl<'a> CreateLineRequest<'a> {
    pub fn new(variant: &'a VariantRef, quantity: u32) -> Self {
        match variant {
            VariantRef::Id(id) => Self::ByVariant {
                variant: *id,
                quantity,
            },
            VariantRef::Attributes(identity) => Self::ByAttributes {
                product: identity.product_id().as_str(),
                color: identity.color(),
                size: identity.size(),
                quantity,
            },
        }
    }
}

/// Body of `PATCH cart/{id}/`.
#[derive(Debug, Serialize)]
pub struct UpdateQuantityRequest {
    pub quantity: u32,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_line_with_embedded_variant_is_resolved() {
        let raw = r#"{"id":10,"variant":{"product":5,"color":"red","size":"M"},"quantity":2}"#;
        let line: RemoteLine = serde_json::from_str::<LineResponse>(raw).unwrap().into();

        let RemoteLine::Resolved(line) = line else {
            panic!("expected resolved line");
        };
        assert_eq!(line.server_line_id, ServerLineId::new(10));
        assert_eq!(line.identity.product_id().as_str(), "5");
        assert_eq!(line.identity.color(), Some("red"));
        assert_eq!(line.identity.size(), "M");
        assert_eq!(line.quantity, 2);
    }

    #[test]
    fn test_line_with_variant_id_is_unresolved() {
        let raw = r#"{"id":11,"variant":77,"quantity":1}"#;
        let line: RemoteLine = serde_json::from_str::<LineResponse>(raw).unwrap().into();

        assert_eq!(
            line,
            RemoteLine::Unresolved(UnresolvedLine {
                server_line_id: ServerLineId::new(11),
                variant: VariantId::new(77),
                quantity: 1,
            })
        );
    }

    #[test]
    fn test_line_list_mixed_shapes() {
        let raw = r#"[
            {"id":1,"variant":{"product":"A","size":"S"},"quantity":1},
            {"id":2,"variant":9,"quantity":4}
        ]"#;
        let lines: Vec<LineResponse> = serde_json::from_str(raw).unwrap();
        let lines: Vec<RemoteLine> = lines.into_iter().map(Into::into).collect();
        assert!(matches!(lines[0], RemoteLine::Resolved(_)));
        assert!(matches!(lines[1], RemoteLine::Unresolved(_)));
    }

    #[test]
    fn test_negative_quantity_is_rejected() {
        let raw = r#"{"id":1,"variant":9,"quantity":-1}"#;
        assert!(serde_json::from_str::<LineResponse>(raw).is_err());
    }

    #[test]
    fn test_create_request_by_attributes() {
        let identity = LineIdentity::new(
            ProductId::parse("A").unwrap(),
            VariantKey::new(None, "M"),
        );
        let variant = VariantRef::Attributes(identity);
        let body = serde_json::to_string(&CreateLineRequest::new(&variant, 3)).unwrap();
        assert_eq!(body, r#"{"product":"A","size":"M","quantity":3}"#);
    }

    #[test]
    fn test_create_request_by_variant() {
        let variant = VariantRef::Id(VariantId::new(9));
        let body = serde_json::to_string(&CreateLineRequest::new(&variant, 1)).unwrap();
        assert_eq!(body, r#"{"variant":9,"quantity":1}"#);
    }
}
