//! Scoped PDU encryption: DES-CBC (RFC 3414 §8) and AES-CFB (RFC 3826).
//!
//! The salt sent in msgPrivacyParameters must never repeat for a key, so
//! every session draws salts from one [`SaltCounter`] seeded from the OS
//! random source.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::auth::{localize_key, password_to_key};
use crate::error::AuthErrorKind;
use crate::profile::{AuthProtocol, PrivProtocol};

/// Length of msgPrivacyParameters for every supported cipher.
pub const PRIV_PARAMS_LEN: usize = 8;

fn random_nonzero_u64() -> u64 {
    let mut buf = [0u8; 8];
    loop {
        if getrandom::fill(&mut buf).is_err() {
            // no OS entropy; the clock still keeps sessions apart
            let nanos = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(1);
            buf = nanos.to_ne_bytes();
        }
        let value = u64::from_ne_bytes(buf);
        if value != 0 {
            return value;
        }
    }
}

/// Monotonic salt source shared by every encryption of a session.
#[derive(Debug)]
pub struct SaltCounter(AtomicU64);

impl SaltCounter {
    pub fn new() -> Self {
        Self(AtomicU64::new(random_nonzero_u64()))
    }

    pub fn from_value(value: u64) -> Self {
        Self(AtomicU64::new(value))
    }

    /// Next salt; zero is skipped on wraparound.
    pub fn next(&self) -> u64 {
        match self.0.fetch_add(1, Ordering::SeqCst) {
            0 => self.0.fetch_add(1, Ordering::SeqCst),
            value => value,
        }
    }
}

impl Default for SaltCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// A privacy key localized to one engine.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivKey {
    key: Vec<u8>,
    #[zeroize(skip)]
    protocol: PrivProtocol,
}

impl PrivKey {
    /// Localize `password` with the authentication protocol's hash.
    pub fn from_password(
        auth_protocol: AuthProtocol,
        protocol: PrivProtocol,
        password: &[u8],
        engine_id: &[u8],
    ) -> Self {
        if auth_protocol.digest_len() < protocol.key_len() {
            tracing::warn!(target: "snmp_poller::v3", { ?auth_protocol, priv_protocol = ?protocol }, "authentication hash is too short for the privacy key");
        }
        let mut master = password_to_key(auth_protocol, password);
        let key = localize_key(auth_protocol, &master, engine_id);
        master.zeroize();
        Self { key, protocol }
    }

    pub fn from_bytes(protocol: PrivProtocol, key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            protocol,
        }
    }

    pub fn protocol(&self) -> PrivProtocol {
        self.protocol
    }

    fn key_material(&self) -> Option<&[u8]> {
        self.key.get(..self.protocol.key_len())
    }

    /// Encrypt a scoped PDU. Returns the ciphertext and the privacy
    /// parameters to send with it.
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        engine_boots: u32,
        engine_time: u32,
        salt: &SaltCounter,
    ) -> Result<(Bytes, Bytes), AuthErrorKind> {
        let key = self.key_material().ok_or(AuthErrorKind::EncryptionFailed)?;
        let salt = salt.next();
        match self.protocol {
            PrivProtocol::Des => encrypt_des(key, plaintext, engine_boots, salt),
            PrivProtocol::Aes | PrivProtocol::Aes192 | PrivProtocol::Aes256 => {
                let salt = salt.to_be_bytes();
                let iv = aes_iv(engine_boots, engine_time, &salt);
                let mut buffer = plaintext.to_vec();
                aes_cfb(key, &iv, &mut buffer, Direction::Encrypt)?;
                Ok((Bytes::from(buffer), Bytes::copy_from_slice(&salt)))
            }
        }
    }

    /// Decrypt a scoped PDU using the sender's engine clock and privacy
    /// parameters.
    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        engine_boots: u32,
        engine_time: u32,
        priv_params: &[u8],
    ) -> Result<Bytes, AuthErrorKind> {
        if priv_params.len() != PRIV_PARAMS_LEN {
            return Err(AuthErrorKind::DecryptionFailed);
        }
        let key = self.key_material().ok_or(AuthErrorKind::DecryptionFailed)?;
        match self.protocol {
            PrivProtocol::Des => decrypt_des(key, ciphertext, priv_params),
            PrivProtocol::Aes | PrivProtocol::Aes192 | PrivProtocol::Aes256 => {
                let iv = aes_iv(engine_boots, engine_time, priv_params);
                let mut buffer = ciphertext.to_vec();
                aes_cfb(key, &iv, &mut buffer, Direction::Decrypt)?;
                Ok(Bytes::from(buffer))
            }
        }
    }
}

impl std::fmt::Debug for PrivKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivKey")
            .field("protocol", &self.protocol)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// DES IV: the pre-IV (key bytes 8..16) XOR the salt.
fn des_iv(key: &[u8], salt: &[u8]) -> [u8; 8] {
    let mut iv = [0u8; 8];
    for (i, byte) in iv.iter_mut().enumerate() {
        *byte = key[8 + i] ^ salt[i];
    }
    iv
}

fn encrypt_des(
    key: &[u8],
    plaintext: &[u8],
    engine_boots: u32,
    counter: u64,
) -> Result<(Bytes, Bytes), AuthErrorKind> {
    use cbc::cipher::block_padding::NoPadding;
    use cbc::cipher::{BlockEncryptMut, KeyIvInit};

    // salt = engineBoots || low 32 bits of the counter
    let mut salt = [0u8; PRIV_PARAMS_LEN];
    salt[..4].copy_from_slice(&engine_boots.to_be_bytes());
    salt[4..].copy_from_slice(&(counter as u32).to_be_bytes());
    let iv = des_iv(key, &salt);

    // zero padding to the block size; the BER length inside marks the end
    let mut buffer = plaintext.to_vec();
    buffer.resize(plaintext.len().div_ceil(8).max(1) * 8, 0);
    let len = buffer.len();

    let cipher = cbc::Encryptor::<des::Des>::new_from_slices(&key[..8], &iv)
        .map_err(|_| AuthErrorKind::EncryptionFailed)?;
    let ciphertext = cipher
        .encrypt_padded_mut::<NoPadding>(&mut buffer, len)
        .map_err(|_| AuthErrorKind::EncryptionFailed)?;
    Ok((Bytes::copy_from_slice(ciphertext), Bytes::copy_from_slice(&salt)))
}

fn decrypt_des(key: &[u8], ciphertext: &[u8], salt: &[u8]) -> Result<Bytes, AuthErrorKind> {
    use cbc::cipher::block_padding::NoPadding;
    use cbc::cipher::{BlockDecryptMut, KeyIvInit};

    if ciphertext.is_empty() || !ciphertext.len().is_multiple_of(8) {
        return Err(AuthErrorKind::DecryptionFailed);
    }
    let iv = des_iv(key, salt);
    let cipher = cbc::Decryptor::<des::Des>::new_from_slices(&key[..8], &iv)
        .map_err(|_| AuthErrorKind::DecryptionFailed)?;
    let mut buffer = ciphertext.to_vec();
    let plaintext = cipher
        .decrypt_padded_mut::<NoPadding>(&mut buffer)
        .map_err(|_| AuthErrorKind::DecryptionFailed)?;
    Ok(Bytes::copy_from_slice(plaintext))
}

/// AES IV: engineBoots || engineTime || salt, concatenated.
fn aes_iv(engine_boots: u32, engine_time: u32, salt: &[u8]) -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv[..4].copy_from_slice(&engine_boots.to_be_bytes());
    iv[4..8].copy_from_slice(&engine_time.to_be_bytes());
    iv[8..].copy_from_slice(salt);
    iv
}

#[derive(Clone, Copy)]
enum Direction {
    Encrypt,
    Decrypt,
}

fn aes_cfb(key: &[u8], iv: &[u8; 16], buffer: &mut [u8], direction: Direction) -> Result<(), AuthErrorKind> {
    use aes::{Aes128, Aes192, Aes256};
    use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};

    let failed = match direction {
        Direction::Encrypt => AuthErrorKind::EncryptionFailed,
        Direction::Decrypt => AuthErrorKind::DecryptionFailed,
    };

    macro_rules! run {
        ($cipher:ty) => {
            match direction {
                Direction::Encrypt => cfb_mode::Encryptor::<$cipher>::new_from_slices(key, iv)
                    .map_err(|_| failed)?
                    .encrypt(buffer),
                Direction::Decrypt => cfb_mode::Decryptor::<$cipher>::new_from_slices(key, iv)
                    .map_err(|_| failed)?
                    .decrypt(buffer),
            }
        };
    }

    match key.len() {
        16 => run!(Aes128),
        24 => run!(Aes192),
        32 => run!(Aes256),
        _ => return Err(failed),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENGINE: &[u8] = b"\x80\x00\x1f\x88\x04test-engine";

    fn key(auth: AuthProtocol, protocol: PrivProtocol) -> PrivKey {
        PrivKey::from_password(auth, protocol, b"privpass1", ENGINE)
    }

    #[test]
    fn every_cipher_decrypts_what_it_encrypted() {
        let plaintext = b"\x30\x0b\x04\x00\x04\x00\xa0\x05scoped pdu bytes";
        let salt = SaltCounter::from_value(7);
        for (auth, protocol) in [
            (AuthProtocol::Md5, PrivProtocol::Des),
            (AuthProtocol::Sha, PrivProtocol::Aes),
            (AuthProtocol::Sha256, PrivProtocol::Aes192),
            (AuthProtocol::Sha256, PrivProtocol::Aes256),
        ] {
            let key = key(auth, protocol);
            let (ciphertext, params) = key.encrypt(plaintext, 3, 1200, &salt).unwrap();
            assert_eq!(params.len(), PRIV_PARAMS_LEN);
            assert_ne!(&ciphertext[..plaintext.len().min(ciphertext.len())], &plaintext[..]);

            let decrypted = key.decrypt(&ciphertext, 3, 1200, &params).unwrap();
            assert_eq!(&decrypted[..plaintext.len()], &plaintext[..], "{protocol:?}");
        }
    }

    #[test]
    fn des_salt_carries_engine_boots() {
        let key = key(AuthProtocol::Md5, PrivProtocol::Des);
        let (ciphertext, params) = key
            .encrypt(b"12345678", 0x0102_0304, 0, &SaltCounter::from_value(9))
            .unwrap();
        assert_eq!(&params[..], &[1, 2, 3, 4, 0, 0, 0, 9]);
        assert_eq!(ciphertext.len(), 8);
    }

    #[test]
    fn aes_with_wrong_engine_time_does_not_decrypt() {
        let key = key(AuthProtocol::Sha, PrivProtocol::Aes);
        let (ciphertext, params) = key
            .encrypt(b"scoped pdu", 1, 100, &SaltCounter::from_value(1))
            .unwrap();
        let garbled = key.decrypt(&ciphertext, 1, 101, &params).unwrap();
        assert_ne!(&garbled[..], b"scoped pdu");
    }

    #[test]
    fn bad_priv_params_and_block_lengths_are_refused() {
        let des = key(AuthProtocol::Md5, PrivProtocol::Des);
        assert_eq!(des.decrypt(&[0; 16], 0, 0, &[0; 4]), Err(AuthErrorKind::DecryptionFailed));
        assert_eq!(des.decrypt(&[0; 12], 0, 0, &[0; 8]), Err(AuthErrorKind::DecryptionFailed));
    }

    #[test]
    fn short_key_material_is_refused() {
        // SHA-1 yields 20 bytes; AES-256 needs 32
        let key = key(AuthProtocol::Sha, PrivProtocol::Aes256);
        let err = key.encrypt(b"data", 0, 0, &SaltCounter::from_value(1)).unwrap_err();
        assert_eq!(err, AuthErrorKind::EncryptionFailed);
    }

    #[test]
    fn salt_counter_skips_zero() {
        let salt = SaltCounter::from_value(u64::MAX);
        assert_eq!(salt.next(), u64::MAX);
        assert_eq!(salt.next(), 1);
        assert_ne!(SaltCounter::new().next(), 0);
    }
}
