use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose, Engine as _};
use sha2::{Digest, Sha256};
use thiserror::Error;
use zeroize::Zeroize;

const NONCE_LEN: usize = 12;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SealError {
    #[error("sealed value is not valid base64")]
    Encoding,
    #[error("sealed value is too short")]
    Truncated,
    #[error("encryption failed")]
    Encrypt,
    #[error("sealed value failed authentication")]
    Decrypt,
    #[error("sealed value is not utf-8")]
    Utf8,
}

/// Encrypts upstream tokens before they are embedded in the session cookie.
/// JWT claims are only signed, so without this the bearer tokens would be
/// readable by anyone holding the cookie.
pub struct TokenSealer {
    cipher: Aes256Gcm,
}

impl TokenSealer {
    pub fn new(master_secret: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"shelf-token-seal:");
        hasher.update(master_secret.as_bytes());
        let mut key = hasher.finalize();

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));

        // Wipe the derived key once the cipher owns its schedule.
        key.zeroize();

        Self { cipher }
    }

    pub fn seal(&self, plain_text: &str) -> Result<String, SealError> {
        // Fresh nonce per value so equal tokens never produce equal cookies.
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plain_text.as_bytes())
            .map_err(|_| SealError::Encrypt)?;

        let mut combined = nonce_bytes.to_vec();
        combined.extend(ciphertext);

        Ok(general_purpose::URL_SAFE_NO_PAD.encode(combined))
    }

    pub fn unseal(&self, sealed: &str) -> Result<String, SealError> {
        let mut combined = general_purpose::URL_SAFE_NO_PAD
            .decode(sealed)
            .map_err(|_| SealError::Encoding)?;

        if combined.len() < NONCE_LEN {
            return Err(SealError::Truncated);
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plain_bytes = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| SealError::Decrypt);

        combined.zeroize();

        String::from_utf8(plain_bytes?).map_err(|_| SealError::Utf8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sealed_token_round_trips_and_hides_plaintext() {
        let sealer = TokenSealer::new("unit-test-secret");
        let sealed = sealer.seal("access-token-abc").unwrap();
        assert!(!sealed.contains("access-token-abc"));
        assert_eq!(sealer.unseal(&sealed).unwrap(), "access-token-abc");
    }

    #[test]
    fn same_token_seals_differently_each_time() {
        let sealer = TokenSealer::new("unit-test-secret");
        assert_ne!(sealer.seal("t").unwrap(), sealer.seal("t").unwrap());
    }

    #[test]
    fn other_secret_cannot_unseal() {
        let sealed = TokenSealer::new("secret-a").seal("token").unwrap();
        assert_eq!(TokenSealer::new("secret-b").unseal(&sealed), Err(SealError::Decrypt));
    }

    #[test]
    fn garbage_is_rejected() {
        let sealer = TokenSealer::new("s");
        assert_eq!(sealer.unseal("***"), Err(SealError::Encoding));
        assert_eq!(sealer.unseal("AAAA"), Err(SealError::Truncated));
    }
}
