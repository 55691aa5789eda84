//! SNMPv3 User-based Security Model (RFC 3414, RFC 3826, RFC 7860).
//!
//! - [`auth`]: password-to-key derivation, key localization and HMAC
//! - [`privacy`]: DES-CBC and AES-CFB encryption of the scoped PDU
//! - [`usm`]: the USM security parameters carried in every v3 message
//! - [`engine`]: discovered engine state and the per-peer cache
//!
//! [`Session`](crate::Session) drives all of this for requests whose
//! target carries a [`UsmProfile`](crate::UsmProfile).

pub mod auth;
pub mod engine;
pub mod privacy;
pub mod usm;

pub use auth::{LocalizedKey, authenticate_message, verify_message};
pub use engine::{EngineCache, EngineState, MAX_ENGINE_TIME, TIME_WINDOW};
pub use privacy::{PrivKey, SaltCounter};
pub use usm::{UsmSecurityParams, find_auth_params};

use std::net::SocketAddr;

use bytes::Bytes;

use crate::ber::Decoder;
use crate::error::{AuthErrorKind, Error, Result};
use crate::message::{MsgFlags, MsgGlobalData, ScopedPdu, ScopedPduData, V3Message};
use crate::oid::Oid;
use crate::pdu::Pdu;
use crate::profile::{AuthProtocol, PrivProtocol, SecurityLevel, UsmProfile};

impl AuthProtocol {
    /// Digest output length, which is also the localized key length.
    pub fn digest_len(self) -> usize {
        match self {
            Self::Md5 => 16,
            Self::Sha => 20,
            Self::Sha224 => 28,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    /// Truncated HMAC length placed in msgAuthenticationParameters.
    pub fn mac_len(self) -> usize {
        match self {
            Self::Md5 | Self::Sha => 12,
            Self::Sha224 => 16,
            Self::Sha256 => 24,
            Self::Sha384 => 32,
            Self::Sha512 => 48,
        }
    }
}

impl PrivProtocol {
    /// Bytes of localized key material the cipher consumes.
    ///
    /// DES takes 16: an 8-byte key followed by the pre-IV.
    pub fn key_len(self) -> usize {
        match self {
            Self::Des | Self::Aes => 16,
            Self::Aes192 => 24,
            Self::Aes256 => 32,
        }
    }
}

/// usmStats counters an agent reports when it refuses a message.
pub mod report_oids {
    use crate::oid;
    use crate::oid::Oid;

    pub fn unsupported_sec_levels() -> Oid {
        oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 1, 0)
    }

    pub fn not_in_time_windows() -> Oid {
        oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 2, 0)
    }

    pub fn unknown_user_names() -> Oid {
        oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 3, 0)
    }

    pub fn unknown_engine_ids() -> Oid {
        oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 4, 0)
    }

    pub fn wrong_digests() -> Oid {
        oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 5, 0)
    }

    pub fn decryption_errors() -> Oid {
        oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 6, 0)
    }
}

/// The usmStats counter named by a Report PDU, if it is one we know.
pub fn report_kind(pdu: &Pdu) -> Option<AuthErrorKind> {
    let table: [(fn() -> Oid, AuthErrorKind); 6] = [
        (report_oids::unsupported_sec_levels, AuthErrorKind::UnsupportedSecurityLevel),
        (report_oids::not_in_time_windows, AuthErrorKind::NotInTimeWindow),
        (report_oids::unknown_user_names, AuthErrorKind::UnknownUserName),
        (report_oids::unknown_engine_ids, AuthErrorKind::UnknownEngineId),
        (report_oids::wrong_digests, AuthErrorKind::WrongDigest),
        (report_oids::decryption_errors, AuthErrorKind::DecryptionError),
    ];
    let vb = pdu.varbinds.first()?;
    table
        .into_iter()
        .find(|(oid, _)| vb.oid == oid())
        .map(|(_, kind)| kind)
}

/// Keys localized to one engine for one user.
#[derive(Clone, Debug)]
pub struct UsmKeys {
    pub auth: Option<LocalizedKey>,
    pub privacy: Option<PrivKey>,
}

impl UsmKeys {
    /// Derive the keys `usm` needs for `engine_id`.
    ///
    /// The privacy key is localized with the authentication protocol's
    /// hash, as RFC 3414 and RFC 3826 require.
    pub fn derive(usm: &UsmProfile, engine_id: &[u8]) -> Self {
        let level = usm.security_level;
        let auth_protocol = usm.auth_protocol.filter(|_| level.requires_auth());
        let auth = auth_protocol
            .map(|protocol| LocalizedKey::from_password(protocol, usm.auth_pass.as_bytes(), engine_id));
        let privacy = match (auth_protocol, usm.priv_protocol) {
            (Some(auth_protocol), Some(priv_protocol)) if level.requires_privacy() => Some(
                PrivKey::from_password(auth_protocol, priv_protocol, usm.priv_pass.as_bytes(), engine_id),
            ),
            _ => None,
        };
        tracing::trace!(target: "snmp_poller::v3", { snmp.engine_id_len = engine_id.len(), has_auth = auth.is_some(), has_priv = privacy.is_some() }, "derived localized keys");
        Self { auth, privacy }
    }

    /// Keys for a noAuthNoPriv user.
    pub fn none() -> Self {
        Self {
            auth: None,
            privacy: None,
        }
    }

    pub fn security_level(&self) -> SecurityLevel {
        match (&self.auth, &self.privacy) {
            (Some(_), Some(_)) => SecurityLevel::AuthPriv,
            (Some(_), None) => SecurityLevel::AuthNoPriv,
            (None, _) => SecurityLevel::NoAuthNoPriv,
        }
    }
}

/// Encode `scoped` as a v3 message secured with `keys`.
///
/// `usm` supplies the engine id, clock and user name; the auth and priv
/// params are filled in here. Errors name `peer`.
pub fn seal(
    peer: SocketAddr,
    global_data: MsgGlobalData,
    mut usm: UsmSecurityParams,
    scoped: &ScopedPdu,
    keys: &UsmKeys,
    salt: &SaltCounter,
) -> Result<Bytes> {
    let data = match &keys.privacy {
        Some(privacy) if keys.auth.is_some() => {
            let (ciphertext, priv_params) = privacy
                .encrypt(&scoped.encode(), usm.engine_boots, usm.engine_time, salt)
                .map_err(|kind| Error::auth(peer, kind))?;
            usm.priv_params = priv_params;
            ScopedPduData::Encrypted(ciphertext)
        }
        _ => ScopedPduData::Plaintext(scoped.clone()),
    };
    if let Some(auth) = &keys.auth {
        usm = usm.with_auth_placeholder(auth.mac_len());
    }

    let message = V3Message {
        global_data: MsgGlobalData {
            flags: MsgFlags::new(keys.security_level(), global_data.flags.reportable),
            ..global_data
        },
        security_params: usm.encode(),
        data,
    };
    let encoded = message.encode();
    let Some(auth) = &keys.auth else {
        return Ok(encoded);
    };

    let mut signed = encoded.to_vec();
    let (offset, len) = find_auth_params(&signed)?;
    authenticate_message(auth, &mut signed, offset, len);
    Ok(Bytes::from(signed))
}

/// Check the HMAC of a received message and decrypt its scoped PDU.
///
/// `raw` is the datagram `message` and `usm` were decoded from. Security
/// the flags claim but `keys` cannot provide is an
/// [`AuthErrorKind::UnsupportedSecurityLevel`].
pub fn unseal(
    peer: SocketAddr,
    raw: &[u8],
    message: V3Message,
    usm: &UsmSecurityParams,
    keys: &UsmKeys,
) -> Result<ScopedPdu> {
    if message.flags().security_level.requires_auth() {
        let auth = keys
            .auth
            .as_ref()
            .ok_or_else(|| Error::auth(peer, AuthErrorKind::UnsupportedSecurityLevel))?;
        if usm.auth_params.len() != auth.mac_len() {
            return Err(Error::auth(
                peer,
                AuthErrorKind::WrongMacLength {
                    expected: auth.mac_len(),
                    actual: usm.auth_params.len(),
                },
            ));
        }
        let (offset, len) = find_auth_params(raw)?;
        if !verify_message(auth, raw, offset, len) {
            tracing::debug!(target: "snmp_poller::v3", { snmp.source = %peer }, "HMAC verification failed");
            return Err(Error::auth(peer, AuthErrorKind::HmacMismatch));
        }
    }

    match message.data {
        ScopedPduData::Plaintext(scoped) => Ok(scoped),
        ScopedPduData::Encrypted(ciphertext) => {
            let privacy = keys
                .privacy
                .as_ref()
                .ok_or_else(|| Error::auth(peer, AuthErrorKind::UnsupportedSecurityLevel))?;
            let plaintext = privacy
                .decrypt(&ciphertext, usm.engine_boots, usm.engine_time, &usm.priv_params)
                .map_err(|kind| Error::auth(peer, kind))?;
            // A wrong key yields noise rather than a cipher error.
            ScopedPdu::decode(&mut Decoder::with_target(plaintext, peer))
                .map_err(|_| Error::auth(peer, AuthErrorKind::DecryptionFailed))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;
    use crate::value::Value;
    use crate::varbind::VarBind;

    #[test]
    fn mac_is_shorter_than_digest() {
        for protocol in [
            AuthProtocol::Md5,
            AuthProtocol::Sha,
            AuthProtocol::Sha224,
            AuthProtocol::Sha256,
            AuthProtocol::Sha384,
            AuthProtocol::Sha512,
        ] {
            assert!(protocol.mac_len() < protocol.digest_len(), "{protocol:?}");
        }
    }

    #[test]
    fn report_varbind_names_the_failure() {
        let mut pdu = Pdu::get_request(&[]);
        assert_eq!(report_kind(&pdu), None);

        pdu.varbinds = vec![VarBind::new(report_oids::wrong_digests(), Value::Counter32(3))];
        assert_eq!(report_kind(&pdu), Some(AuthErrorKind::WrongDigest));

        pdu.varbinds = vec![VarBind::new(oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 9, 0), Value::Counter32(1))];
        assert_eq!(report_kind(&pdu), None);
    }

    fn peer() -> SocketAddr {
        "192.0.2.1:161".parse().unwrap()
    }

    fn sealed(keys: &UsmKeys) -> (Bytes, ScopedPdu) {
        let mut pdu = Pdu::get_request(&[oid!(1, 3, 6, 1, 2, 1, 1, 5, 0)]);
        pdu.request_id = 31;
        let scoped = ScopedPdu::new(&b"engine"[..], &b""[..], pdu);
        let usm = UsmSecurityParams::new(&b"engine"[..], 3, 700, &b"admin"[..]);
        let global = MsgGlobalData::new(31, MsgFlags::new(SecurityLevel::NoAuthNoPriv, true));
        let data = seal(peer(), global, usm, &scoped, keys, &SaltCounter::from_value(5)).unwrap();
        (data, scoped)
    }

    fn open(data: &Bytes, keys: &UsmKeys) -> Result<ScopedPdu> {
        let message = V3Message::decode_from_peer(data.clone(), peer())?;
        let usm = message.usm_params(peer())?;
        unseal(peer(), data, message, &usm, keys)
    }

    fn auth_priv_keys(auth_pass: &str) -> UsmKeys {
        let usm = UsmProfile::new("admin")
            .with_auth(AuthProtocol::Sha, auth_pass)
            .with_privacy(PrivProtocol::Aes, "privpass1");
        UsmKeys::derive(&usm, b"engine")
    }

    #[test]
    fn sealed_auth_priv_message_opens_with_same_keys() {
        let keys = auth_priv_keys("authpass1");
        let (data, scoped) = sealed(&keys);

        let message = V3Message::decode(data.clone()).unwrap();
        assert_eq!(message.flags().security_level, SecurityLevel::AuthPriv);
        assert!(message.flags().reportable);
        assert!(message.scoped_pdu().is_none());

        assert_eq!(open(&data, &keys).unwrap(), scoped);
    }

    #[test]
    fn tampered_message_fails_hmac() {
        let keys = auth_priv_keys("authpass1");
        let (data, _) = sealed(&keys);
        let mut tampered = data.to_vec();
        let last = tampered.len() - 1;
        tampered[last] ^= 0x01;

        let err = open(&Bytes::from(tampered), &keys).unwrap_err();
        assert!(matches!(*err, Error::Auth { kind: AuthErrorKind::HmacMismatch, .. }));

        let err = open(&data, &auth_priv_keys("otherpass")).unwrap_err();
        assert!(matches!(*err, Error::Auth { kind: AuthErrorKind::HmacMismatch, .. }));
    }

    #[test]
    fn authenticated_message_needs_an_auth_key() {
        let (data, _) = sealed(&auth_priv_keys("authpass1"));
        let err = open(&data, &UsmKeys::none()).unwrap_err();
        assert!(matches!(
            *err,
            Error::Auth { kind: AuthErrorKind::UnsupportedSecurityLevel, .. }
        ));
    }

    #[test]
    fn no_auth_message_is_plaintext() {
        let (data, scoped) = sealed(&UsmKeys::none());
        let message = V3Message::decode(data.clone()).unwrap();
        assert_eq!(message.flags().to_byte(), 0x04);
        assert_eq!(message.scoped_pdu(), Some(&scoped));
        assert_eq!(open(&data, &UsmKeys::none()).unwrap(), scoped);
    }

    #[test]
    fn no_auth_profile_derives_no_keys() {
        let keys = UsmKeys::derive(&UsmProfile::new("public-user"), b"engine");
        assert!(keys.auth.is_none());
        assert!(keys.privacy.is_none());
    }

    #[test]
    fn auth_priv_profile_derives_both_keys() {
        let usm = UsmProfile::new("admin")
            .with_auth(AuthProtocol::Sha256, "authpass1")
            .with_privacy(PrivProtocol::Aes, "privpass1");
        let keys = UsmKeys::derive(&usm, b"engine");
        assert_eq!(keys.auth.as_ref().map(|k| k.as_bytes().len()), Some(32));
        assert_eq!(keys.privacy.as_ref().map(|k| k.protocol()), Some(PrivProtocol::Aes));
    }
}
