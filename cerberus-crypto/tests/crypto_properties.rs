//! Property-based tests for field encryption.

use cerberus_crypto::{CipherKey, FieldCipher};
use proptest::prelude::*;

proptest! {
    /// Decrypting an encrypted value returns the original string.
    #[test]
    fn encryption_roundtrip(plaintext in ".{0,500}") {
        let cipher = FieldCipher::new(CipherKey::generate());
        let encrypted = cipher.encrypt(&plaintext).unwrap();
        prop_assert_eq!(cipher.decrypt(&encrypted).unwrap(), plaintext);
    }

    /// Ciphertext never leaks a non-trivial plaintext verbatim.
    #[test]
    fn ciphertext_hides_plaintext(plaintext in "[a-z]{8,64}") {
        let cipher = FieldCipher::new(CipherKey::generate());
        let encrypted = cipher.encrypt(&plaintext).unwrap();
        prop_assert!(!encrypted.contains(&plaintext));
    }
}
