//! Key derivation and HMAC message authentication (RFC 3414, RFC 7860).

use digest::{Digest, KeyInit, Mac, OutputSizeUser};
use hmac::Hmac;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::profile::AuthProtocol;

/// Bytes hashed when expanding a password into a master key.
const EXPANSION_SIZE: usize = 1_048_576;

/// An authentication key localized to one engine.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct LocalizedKey {
    key: Vec<u8>,
    #[zeroize(skip)]
    protocol: AuthProtocol,
}

impl LocalizedKey {
    /// Ku from the password, then Kul = H(Ku || engineID || Ku).
    pub fn from_password(protocol: AuthProtocol, password: &[u8], engine_id: &[u8]) -> Self {
        let mut master = password_to_key(protocol, password);
        let key = localize_key(protocol, &master, engine_id);
        master.zeroize();
        Self { key, protocol }
    }

    pub fn from_bytes(protocol: AuthProtocol, key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            protocol,
        }
    }

    pub fn protocol(&self) -> AuthProtocol {
        self.protocol
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }

    pub fn mac_len(&self) -> usize {
        self.protocol.mac_len()
    }

    /// Truncated HMAC of `data`.
    pub fn compute_hmac(&self, data: &[u8]) -> Vec<u8> {
        macro_rules! truncated_hmac {
            ($digest:ty) => {{
                let mut mac = <Hmac<$digest> as KeyInit>::new_from_slice(&self.key)
                    .expect("HMAC can take key of any size");
                Mac::update(&mut mac, data);
                mac.finalize().into_bytes()[..self.mac_len()].to_vec()
            }};
        }

        match self.protocol {
            AuthProtocol::Md5 => truncated_hmac!(md5::Md5),
            AuthProtocol::Sha => truncated_hmac!(sha1::Sha1),
            AuthProtocol::Sha224 => truncated_hmac!(sha2::Sha224),
            AuthProtocol::Sha256 => truncated_hmac!(sha2::Sha256),
            AuthProtocol::Sha384 => truncated_hmac!(sha2::Sha384),
            AuthProtocol::Sha512 => truncated_hmac!(sha2::Sha512),
        }
    }

    /// Constant-time check of `expected` against the HMAC of `data`.
    pub fn verify_hmac(&self, data: &[u8], expected: &[u8]) -> bool {
        let computed = self.compute_hmac(data);
        if computed.len() != expected.len() {
            return false;
        }
        computed
            .iter()
            .zip(expected)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl std::fmt::Debug for LocalizedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalizedKey")
            .field("protocol", &self.protocol)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Master key Ku (RFC 3414 A.2): hash of the password repeated to 1MB.
pub(crate) fn password_to_key(protocol: AuthProtocol, password: &[u8]) -> Vec<u8> {
    match protocol {
        AuthProtocol::Md5 => expand_password::<md5::Md5>(password),
        AuthProtocol::Sha => expand_password::<sha1::Sha1>(password),
        AuthProtocol::Sha224 => expand_password::<sha2::Sha224>(password),
        AuthProtocol::Sha256 => expand_password::<sha2::Sha256>(password),
        AuthProtocol::Sha384 => expand_password::<sha2::Sha384>(password),
        AuthProtocol::Sha512 => expand_password::<sha2::Sha512>(password),
    }
}

fn expand_password<D: Digest>(password: &[u8]) -> Vec<u8> {
    if password.is_empty() {
        return vec![0u8; <D as OutputSizeUser>::output_size()];
    }

    let mut hasher = D::new();
    let mut chunk = [0u8; 64];
    let mut index = 0;
    for _ in 0..EXPANSION_SIZE / chunk.len() {
        for byte in &mut chunk {
            *byte = password[index];
            index = (index + 1) % password.len();
        }
        hasher.update(chunk);
    }
    chunk.zeroize();
    hasher.finalize().to_vec()
}

pub(crate) fn localize_key(protocol: AuthProtocol, master: &[u8], engine_id: &[u8]) -> Vec<u8> {
    match protocol {
        AuthProtocol::Md5 => localize::<md5::Md5>(master, engine_id),
        AuthProtocol::Sha => localize::<sha1::Sha1>(master, engine_id),
        AuthProtocol::Sha224 => localize::<sha2::Sha224>(master, engine_id),
        AuthProtocol::Sha256 => localize::<sha2::Sha256>(master, engine_id),
        AuthProtocol::Sha384 => localize::<sha2::Sha384>(master, engine_id),
        AuthProtocol::Sha512 => localize::<sha2::Sha512>(master, engine_id),
    }
}

fn localize<D: Digest>(master: &[u8], engine_id: &[u8]) -> Vec<u8> {
    let mut hasher = D::new();
    hasher.update(master);
    hasher.update(engine_id);
    hasher.update(master);
    hasher.finalize().to_vec()
}

/// Sign an encoded message whose auth params at `offset..offset + len`
/// are still zero.
pub fn authenticate_message(key: &LocalizedKey, message: &mut [u8], offset: usize, len: usize) {
    let mac = key.compute_hmac(message);
    message[offset..offset + len].copy_from_slice(&mac);
}

/// Check the MAC at `offset..offset + len` against the rest of `message`.
pub fn verify_message(key: &LocalizedKey, message: &[u8], offset: usize, len: usize) -> bool {
    let received = &message[offset..offset + len];
    let mut zeroed = message.to_vec();
    zeroed[offset..offset + len].fill(0);
    key.verify_hmac(&zeroed, received)
}
