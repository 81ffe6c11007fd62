// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HMAC-SHA256 signatures over raw webhook bodies.
//!
//! GitHub signs every delivery with the app's webhook secret and sends the
//! result as `X-Hub-Signature-256: sha256=<hex>`. These helpers work on the
//! bare hex digest; the prefix is handled by [`sign_header`] and
//! [`verify_header`].

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Prefix GitHub puts in front of the hex digest.
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Hex-encoded HMAC-SHA256 of `payload` under `secret`.
pub fn compute_hmac_sha256(secret: &[u8], payload: &[u8]) -> String {
	let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
	mac.update(payload);
	hex::encode(mac.finalize().into_bytes())
}

/// Constant-time check of a hex digest. Malformed hex never verifies.
pub fn verify_hmac_sha256(secret: &[u8], payload: &[u8], signature_hex: &str) -> bool {
	let Ok(expected) = hex::decode(signature_hex) else {
		return false;
	};

	let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
		return false;
	};

	mac.update(payload);
	mac.verify_slice(&expected).is_ok()
}

/// Header value (`sha256=<hex>`) for a payload.
pub fn sign_header(secret: &[u8], payload: &[u8]) -> String {
	format!("{SIGNATURE_PREFIX}{}", compute_hmac_sha256(secret, payload))
}

/// Verify a full `X-Hub-Signature-256` header value.
pub fn verify_header(secret: &[u8], payload: &[u8], header: &str) -> bool {
	match header.strip_prefix(SIGNATURE_PREFIX) {
		Some(hex_digest) => verify_hmac_sha256(secret, payload, hex_digest),
		None => false,
	}
}
