//! HMAC-SHA256 canonical pre-images and signatures.
//!
//! Each venue rejects requests unless the pre-image is reproduced
//! byte-for-byte, so the builders here concatenate exactly and nothing else.

use crate::credentials::ApiCredentials;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Bybit `recv_window` attached to every signed request.
pub const BYBIT_RECV_WINDOW: &str = "10000";

fn hmac_sha256(secret: &str, message: &str) -> Vec<u8> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(message.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

/// Lowercase hex HMAC-SHA256 (Bybit).
pub fn hmac_sha256_hex(secret: &str, message: &str) -> String {
    hex::encode(hmac_sha256(secret, message))
}

/// Base64 HMAC-SHA256 over the raw digest bytes (Bitget).
pub fn hmac_sha256_base64(secret: &str, message: &str) -> String {
    BASE64.encode(hmac_sha256(secret, message))
}

/// Bybit REST pre-image: `ts || api_key || recv_window || body`.
pub fn bybit_preimage(timestamp_ms: &str, api_key: &str, recv_window: &str, body: &str) -> String {
    let mut s = String::with_capacity(
        timestamp_ms.len() + api_key.len() + recv_window.len() + body.len(),
    );
    s.push_str(timestamp_ms);
    s.push_str(api_key);
    s.push_str(recv_window);
    s.push_str(body);
    s
}

/// Bitget REST pre-image: `ts || method || path || body`.
pub fn bitget_preimage(timestamp_ms: &str, method: &str, path: &str, body: &str) -> String {
    let mut s =
        String::with_capacity(timestamp_ms.len() + method.len() + path.len() + body.len());
    s.push_str(timestamp_ms);
    s.push_str(method);
    s.push_str(path);
    s.push_str(body);
    s
}

/// Bybit private-channel auth frame. The signed string is
/// `"GET/realtime" || expires_ms`.
pub fn bybit_ws_auth_payload(creds: &ApiCredentials, expires_ms: u64) -> String {
    let signature = hmac_sha256_hex(
        creds.expose_secret(),
        &format!("GET/realtime{expires_ms}"),
    );
    serde_json::json!({
        "op": "auth",
        "args": [creds.api_key(), expires_ms, signature],
    })
    .to_string()
}

/// Bitget private-channel login frame. The signed string is
/// `ts || "GET/user/verify"`; the websocket login takes hex, unlike the
/// base64 REST signature.
pub fn bitget_ws_login_payload(creds: &ApiCredentials, timestamp_ms: u64) -> String {
    let signature = hmac_sha256_hex(
        creds.expose_secret(),
        &format!("{timestamp_ms}GET/user/verify"),
    );
    serde_json::json!({
        "op": "login",
        "args": [{
            "apiKey": creds.api_key(),
            "passphrase": creds.expose_passphrase().unwrap_or_default(),
            "timestamp": timestamp_ms.to_string(),
            "sign": signature,
        }],
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bybit_preimage_layout() {
        let preimage = bybit_preimage("1700000000000", "K", BYBIT_RECV_WINDOW, "{\"a\":1}");
        assert_eq!(preimage, "1700000000000K10000{\"a\":1}");
    }

    #[test]
    fn test_bybit_signature_is_lowercase_hex() {
        let preimage = bybit_preimage("1700000000000", "K", BYBIT_RECV_WINDOW, "{\"a\":1}");
        let sig = hmac_sha256_hex("S", &preimage);

        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

        let mut mac = HmacSha256::new_from_slice(b"S").unwrap();
        mac.update(preimage.as_bytes());
        assert_eq!(sig, hex::encode(mac.finalize().into_bytes()));
    }

    #[test]
    fn test_hmac_known_vector() {
        // RFC 4231 test case 2: key "Jefe", data "what do ya want for nothing?".
        let sig = hmac_sha256_hex("Jefe", "what do ya want for nothing?");
        assert_eq!(
            sig,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_bitget_preimage_layout() {
        let preimage = bitget_preimage(
            "1700000000000",
            "POST",
            "/api/v2/mix/order/place-order",
            "{}",
        );
        assert_eq!(preimage, "1700000000000POST/api/v2/mix/order/place-order{}");
    }

    #[test]
    fn test_bitget_signature_is_base64() {
        let sig = hmac_sha256_base64("secret", "message");
        // 32-byte digest -> 44 base64 chars with padding.
        assert_eq!(sig.len(), 44);
        assert!(sig.ends_with('='));
    }

    #[test]
    fn test_bybit_ws_auth_payload_shape() {
        let creds = ApiCredentials::new("key".into(), "secret".into());
        let payload = bybit_ws_auth_payload(&creds, 1700000000000);
        let v: serde_json::Value = serde_json::from_str(&payload).unwrap();

        assert_eq!(v["op"], "auth");
        assert_eq!(v["args"][0], "key");
        assert_eq!(v["args"][1], 1700000000000u64);
        let expected = hmac_sha256_hex("secret", "GET/realtime1700000000000");
        assert_eq!(v["args"][2], expected.as_str());
    }

    #[test]
    fn test_bitget_ws_login_payload_shape() {
        let creds = ApiCredentials::with_passphrase("key".into(), "secret".into(), "pass".into());
        let payload = bitget_ws_login_payload(&creds, 1700000000000);
        let v: serde_json::Value = serde_json::from_str(&payload).unwrap();

        assert_eq!(v["op"], "login");
        let arg = &v["args"][0];
        assert_eq!(arg["apiKey"], "key");
        assert_eq!(arg["passphrase"], "pass");
        assert_eq!(arg["timestamp"], "1700000000000");
        let expected = hmac_sha256_hex("secret", "1700000000000GET/user/verify");
        assert_eq!(arg["sign"], expected.as_str());
    }
}
