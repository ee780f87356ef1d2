use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use tracing::debug;

use crate::auth::SignatureVerifier;
use crate::codec::compact::pack_flags;
use crate::message::Message;
use crate::utils::error::SigningError;

/// Bytes covered by the origin signature.
///
/// Format: `id:kind:created_at:origin_priority:lat:lon:accuracy:flags:people:battery:note`.
/// Coordinates use fixed decimals so a JSON round trip cannot change them.
/// The relayed `priority` is left out; only the origin's own claim is signed.
pub fn canonical_bytes(message: &Message) -> Vec<u8> {
    let battery = message
        .battery_percent
        .map(|b| b.to_string())
        .unwrap_or_default();
    let note = message.note.as_deref().map(|n| format!("+{n}")).unwrap_or_default();

    format!(
        "{}:{}:{}:{}:{:.6}:{:.6}:{:.2}:{}:{}:{}:{}",
        message.id,
        message.kind.tag(),
        message.created_at_ms,
        message.origin_priority.ordinal(),
        message.location.latitude,
        message.location.longitude,
        message.location.accuracy_meters,
        pack_flags(&message.flags),
        message.people_count,
        battery,
        note,
    )
    .into_bytes()
}

/// Decode a base64 Ed25519 public key.
pub fn parse_public_key(key_b64: &str) -> Result<VerifyingKey, SigningError> {
    let bytes: [u8; 32] = decode_fixed(key_b64)
        .map_err(|e| SigningError::InvalidKey(format!("public key: {e}")))?;
    VerifyingKey::from_bytes(&bytes)
        .map_err(|e| SigningError::InvalidKey(format!("not an Ed25519 public key: {e}")))
}

fn decode_fixed<const N: usize>(value: &str) -> Result<[u8; N], String> {
    let bytes = BASE64
        .decode(value.trim())
        .map_err(|e| format!("invalid base64: {e}"))?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| format!("expected {N} bytes, got {len}"))
}

/// Holds this node's private key and signs the messages it originates.
pub struct MessageSigner {
    signing_key: SigningKey,
}

impl MessageSigner {
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Build a signer from a base64 encoded 32-byte seed.
    pub fn from_base64_seed(seed_b64: &str) -> Result<Self, SigningError> {
        let seed: [u8; 32] =
            decode_fixed(seed_b64).map_err(|e| SigningError::InvalidKey(format!("seed: {e}")))?;
        Ok(Self {
            signing_key: SigningKey::from_bytes(&seed),
        })
    }

    pub fn seed_base64(&self) -> String {
        BASE64.encode(self.signing_key.to_bytes())
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    pub fn public_key_base64(&self) -> String {
        BASE64.encode(self.verifying_key().as_bytes())
    }

    /// Overwrite `message.signature` with a signature over its canonical bytes.
    pub fn sign(&self, message: &mut Message) {
        let signature = self.signing_key.sign(&canonical_bytes(message));
        message.signature = BASE64.encode(signature.to_bytes());
    }
}

impl std::fmt::Debug for MessageSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageSigner")
            .field("public_key", &self.public_key_base64())
            .finish()
    }
}

/// Accepts messages signed by any key in a trusted set.
#[derive(Debug, Clone, Default)]
pub struct Ed25519Verifier {
    trusted: Vec<VerifyingKey>,
}

impl Ed25519Verifier {
    pub fn new(trusted: Vec<VerifyingKey>) -> Self {
        Self { trusted }
    }

    /// Parse base64 public keys. Any malformed key fails the whole set.
    pub fn from_base64_keys<S: AsRef<str>>(keys: &[S]) -> Result<Self, SigningError> {
        let trusted = keys
            .iter()
            .map(|k| parse_public_key(k.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(trusted))
    }

    pub fn trust(&mut self, key: VerifyingKey) {
        if !self.trusted.contains(&key) {
            self.trusted.push(key);
        }
    }

    pub fn trusted_count(&self) -> usize {
        self.trusted.len()
    }

    fn signature_of(message: &Message) -> Result<Signature, SigningError> {
        let bytes: [u8; 64] =
            decode_fixed(&message.signature).map_err(SigningError::InvalidSignature)?;
        Ok(Signature::from_bytes(&bytes))
    }
}

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, message: &Message) -> bool {
        let signature = match Self::signature_of(message) {
            Ok(signature) => signature,
            Err(e) => {
                debug!("message {}: {}", message.id, e);
                return false;
            }
        };
        let canonical = canonical_bytes(message);
        self.trusted
            .iter()
            .any(|key| key.verify(&canonical, &signature).is_ok())
    }
}
