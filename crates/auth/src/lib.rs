//! Credentials and request signing for the authenticated venue paths.

mod credentials;
mod error;
mod sign;

pub use credentials::ApiCredentials;
pub use error::AuthError;
pub use sign::{
    bitget_preimage, bitget_ws_login_payload, bybit_preimage, bybit_ws_auth_payload,
    hmac_sha256_base64, hmac_sha256_hex, BYBIT_RECV_WINDOW,
};
