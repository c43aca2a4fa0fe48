//! Conversion between characteristic values and the `ay` wire type.

use zvariant::{OwnedValue, Value};

use crate::bus::{body_signature, unwrap_variant};

/// Byte array type signature.
pub const BYTES: &str = "ay";

/// Returns the bytes of an `ay` value.
///
/// # Panics
///
/// If the value is not a byte array. The peer schema is trusted, so a type
/// mismatch is an environment fault.
#[must_use]
pub fn decode(v: &Value<'_>) -> Vec<u8> {
    let v = unwrap_variant(v);
    let sig = v.value_signature();
    assert_eq!(sig.as_str(), BYTES, "expected byte array, got {sig:?}");
    let Value::Array(ref a) = *v else {
        unreachable!()
    };
    (a.get().iter())
        .map(|b| match *b {
            Value::U8(b) => b,
            ref other => unreachable!("non-byte array element {other:?}"),
        })
        .collect()
}

/// Returns the bytes of a single `ay` reply argument.
///
/// # Panics
///
/// If the reply signature is not `(ay)`.
#[must_use]
pub fn decode_reply(r: &[OwnedValue]) -> Vec<u8> {
    let sig = body_signature(r);
    assert_eq!(sig, "(ay)", "unexpected reply signature {sig:?}");
    decode(&r[0])
}

/// Encodes bytes as an `ay` value.
#[must_use]
pub fn encode(b: &[u8]) -> Value<'static> {
    Value::from(b.to_vec())
}
