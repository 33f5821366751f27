//! Secret generation

use anyhow::{Result, bail};
use rand::RngCore;
use rand::rngs::OsRng;
use stepkit::Secret;

pub trait SecretGenerator {
    /// `byte_length` random bytes, hex encoded
    fn random_hex(&self, byte_length: usize) -> Result<Secret>;
}

/// Operating system CSPRNG
pub struct OsSecretGenerator;

impl SecretGenerator for OsSecretGenerator {
    fn random_hex(&self, byte_length: usize) -> Result<Secret> {
        if byte_length == 0 {
            bail!("secret length must be positive");
        }
        let mut bytes = vec![0u8; byte_length];
        OsRng.try_fill_bytes(&mut bytes)?;
        Ok(Secret::new(hex::encode(bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_and_alphabet() {
        let secret = OsSecretGenerator.random_hex(16).unwrap();
        assert_eq!(secret.len(), 32);
        assert!(secret.expose().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_fresh_each_call() {
        let a = OsSecretGenerator.random_hex(16).unwrap();
        let b = OsSecretGenerator.random_hex(16).unwrap();
        assert_ne!(a.expose(), b.expose());
    }

    #[test]
    fn test_zero_length_rejected() {
        assert!(OsSecretGenerator.random_hex(0).is_err());
    }
}
