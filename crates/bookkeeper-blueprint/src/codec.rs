//! Blueprint payload codec.
//!
//! A blueprint's `data` field is a tagged union:
//!
//! ```text
//!   ┌──────────┬─────────────────────────┐
//!   │ kind: u8 │ payload (kind-specific) │
//!   └──────────┴─────────────────────────┘
//! ```
//!
//! The core only ever decodes the tag; payload bodies are decoded by the
//! typed helpers below. An empty buffer or an unknown tag is a `DataKind`
//! error, never a panic.

use bookkeeper_types::{BlueprintKind, BookkeeperError, Order, Result, constants};

/// Prefix `payload` with the tag for `kind`.
#[must_use]
pub fn pack(kind: BlueprintKind, payload: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(payload.len() + 1);
    data.push(kind.tag());
    data.extend_from_slice(payload);
    data
}

/// Split `data` into its kind and payload.
///
/// # Errors
/// - `DataKind { tag: None }` on empty data
/// - `DataKind { tag: Some(t) }` on an unknown tag
/// - `Serialization` if the data exceeds the maximum blueprint size
pub fn unpack(data: &[u8]) -> Result<(BlueprintKind, &[u8])> {
    if data.len() > constants::MAX_BLUEPRINT_DATA_LEN {
        return Err(BookkeeperError::Serialization(format!(
            "blueprint data is {} bytes, limit {}",
            data.len(),
            constants::MAX_BLUEPRINT_DATA_LEN
        )));
    }
    let (&tag, payload) = data
        .split_first()
        .ok_or(BookkeeperError::DataKind { tag: None })?;
    let kind = BlueprintKind::try_from(tag)?;
    Ok((kind, payload))
}

/// Encode an order as blueprint data (`ORDER` tag + JSON body).
///
/// # Errors
/// `Serialization` if the order cannot be encoded or is too large.
pub fn encode_order(order: &Order) -> Result<Vec<u8>> {
    let body = serde_json::to_vec(order)?;
    let data = pack(BlueprintKind::Order, &body);
    if data.len() > constants::MAX_BLUEPRINT_DATA_LEN {
        return Err(BookkeeperError::Serialization(format!(
            "encoded order is {} bytes, limit {}",
            data.len(),
            constants::MAX_BLUEPRINT_DATA_LEN
        )));
    }
    Ok(data)
}

/// Decode blueprint data that must carry an order.
///
/// # Errors
/// `DataKind` if the tag is not `ORDER`, `Serialization` on a malformed body.
pub fn decode_order(data: &[u8]) -> Result<Order> {
    let (kind, payload) = unpack(data)?;
    match kind {
        BlueprintKind::Order => Ok(serde_json::from_slice(payload)?),
    }
}

#[cfg(test)]
mod tests {
    use bookkeeper_types::{Address, PluginReference};

    use super::*;

    fn make_order() -> Order {
        let plugin = |label: &str| PluginReference::new(Address::derive(label), Vec::new());
        Order::dummy_offer(
            plugin("account"),
            plugin("oracle:loan"),
            plugin("oracle:coll"),
            plugin("assessor"),
            plugin("liquidator"),
            Address::derive("factory"),
        )
    }

    #[test]
    fn pack_unpack_roundtrip() {
        let payload = b"hello";
        let data = pack(BlueprintKind::Order, payload);
        assert_eq!(data[0], constants::ORDER_TAG);
        let (kind, body) = unpack(&data).unwrap();
        assert_eq!(kind, BlueprintKind::Order);
        assert_eq!(body, payload);
    }

    #[test]
    fn empty_payload_roundtrips() {
        let data = pack(BlueprintKind::Order, &[]);
        let (kind, body) = unpack(&data).unwrap();
        assert_eq!(kind, BlueprintKind::Order);
        assert!(body.is_empty());
    }

    #[test]
    fn empty_data_rejected() {
        let err = unpack(&[]).unwrap_err();
        assert!(matches!(err, BookkeeperError::DataKind { tag: None }));
    }

    #[test]
    fn unknown_tag_rejected() {
        let err = unpack(&[0x02, 1, 2, 3]).unwrap_err();
        assert!(matches!(err, BookkeeperError::DataKind { tag: Some(0x02) }));
    }

    #[test]
    fn oversized_data_rejected() {
        let data = vec![constants::ORDER_TAG; constants::MAX_BLUEPRINT_DATA_LEN + 1];
        let err = unpack(&data).unwrap_err();
        assert!(matches!(err, BookkeeperError::Serialization(_)));
    }

    #[test]
    fn order_roundtrip() {
        let order = make_order();
        let data = encode_order(&order).unwrap();
        assert_eq!(decode_order(&data).unwrap(), order);
    }

    #[test]
    fn malformed_order_body_is_serialization_error() {
        let data = pack(BlueprintKind::Order, b"{\"not\": \"an order\"}");
        let err = decode_order(&data).unwrap_err();
        assert!(matches!(err, BookkeeperError::Serialization(_)));
    }
}
