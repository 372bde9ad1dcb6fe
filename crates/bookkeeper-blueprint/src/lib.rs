//! # bookkeeper-blueprint
//!
//! Signed blueprints: the off-ledger half of a loan.
//!
//! ## Components
//!
//! 1. **codec**: tags and untags blueprint payloads, decodes orders
//! 2. **hash**: canonical, domain-separated blueprint digests
//! 3. **BlueprintAuthority**: signature, window, and nonce verification
//! 4. **NonceTracker**: monotonic per-publisher nonces
//! 5. **BlueprintSigner**: publisher-side construction and signing
//!
//! ## Flow
//!
//! ```text
//! Order → codec::encode_order → Blueprint → BlueprintSigner::sign → SignedBlueprint
//!       → BlueprintAuthority::verify → (match succeeds) → consume_nonce
//! ```

pub mod authority;
pub mod codec;
pub mod hash;
pub mod nonce;
pub mod signer;

pub use authority::BlueprintAuthority;
pub use nonce::NonceTracker;
pub use signer::BlueprintSigner;
