//! OpenPGP decryption with sequoia
//!
//! Only public-key encrypted messages are accepted. The payload may be
//! compressed once and must be a literal data packet; signed messages are
//! rejected rather than silently unwrapped. Integrity protection is enforced
//! by the streaming decryptor, and every failure is returned to the caller.

use std::error::Error as StdError;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use sequoia_openpgp as openpgp;
use openpgp::cert::{Cert, CertParser};
use openpgp::crypto::SessionKey;
use openpgp::packet::{PKESK, SKESK};
use openpgp::parse::stream::{
    DecryptionHelper, DecryptorBuilder, MessageLayer, MessageStructure, VerificationHelper,
};
use openpgp::parse::Parse;
use openpgp::policy::{Policy, StandardPolicy};
use openpgp::types::SymmetricAlgorithm;
use openpgp::{Fingerprint, KeyHandle};

use crate::artifact::Artifact;
use crate::error::DecryptError;

/// Reasons the decryption helper refuses a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
enum Rejection {
    #[error("no matching key")]
    NoMatchingKey,
    #[error("unexpected content")]
    UnexpectedContent,
    #[error("message is not encrypted")]
    NotEncrypted,
}

impl From<Rejection> for DecryptError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::NoMatchingKey => DecryptError::NoMatchingKey,
            Rejection::UnexpectedContent => DecryptError::UnexpectedContent,
            Rejection::NotEncrypted => {
                DecryptError::MalformedEnvelope(Rejection::NotEncrypted.to_string())
            }
        }
    }
}

/// Decrypts messages addressed to any of a fixed set of secret keys
pub struct PgpDecryptor {
    certs: Vec<Cert>,
    policy: StandardPolicy<'static>,
}

impl PgpDecryptor {
    /// Loads every certificate in the file (armored or binary)
    ///
    /// # Errors
    /// `DecryptError::KeyBundle` if the file cannot be read or parsed, or if
    /// none of its certificates carries secret key material
    pub fn from_key_file(path: &Path) -> Result<Self, DecryptError> {
        let key_bundle_err = |message: String| DecryptError::KeyBundle {
            path: path.to_path_buf(),
            message,
        };

        let file = File::open(path).map_err(|e| key_bundle_err(e.to_string()))?;
        let certs = CertParser::from_reader(file)
            .map_err(|e| key_bundle_err(format!("{:#}", e)))?
            .collect::<openpgp::Result<Vec<Cert>>>()
            .map_err(|e| key_bundle_err(format!("{:#}", e)))?;

        if !certs.iter().any(|cert| cert.is_tsk()) {
            return Err(key_bundle_err("no secret keys found".to_string()));
        }

        Ok(PgpDecryptor::from_certs(certs))
    }

    pub fn from_certs(certs: Vec<Cert>) -> Self {
        PgpDecryptor {
            certs,
            policy: StandardPolicy::new(),
        }
    }

    /// Decrypts `artifact` into a new temporary artifact
    ///
    /// # Errors
    /// - `NoMatchingKey` if no session key can be unlocked with the bundle
    /// - `UnexpectedContent` for signed or otherwise non-literal payloads
    /// - `IntegrityCheckFailed` if the MDC does not verify
    /// - `MalformedEnvelope` if the input is not an encrypted OpenPGP message
    pub fn decrypt(&self, artifact: Artifact) -> Result<Artifact, DecryptError> {
        let helper = KeyringHelper {
            certs: &self.certs,
            policy: &self.policy,
        };

        let input = artifact.reader()?;
        let mut decryptor = DecryptorBuilder::from_reader(input)
            .map_err(classify)?
            .with_policy(&self.policy, None, helper)
            .map_err(classify)?;

        let mut plaintext = Artifact::create("message", ".txt")?;
        io::copy(&mut decryptor, plaintext.writer()).map_err(classify_io)?;
        plaintext.writer().flush()?;

        Ok(plaintext)
    }
}

struct KeyringHelper<'a> {
    certs: &'a [Cert],
    policy: &'a dyn Policy,
}

impl VerificationHelper for KeyringHelper<'_> {
    fn get_certs(&mut self, _ids: &[KeyHandle]) -> openpgp::Result<Vec<Cert>> {
        Ok(Vec::new())
    }

    fn check(&mut self, structure: MessageStructure) -> openpgp::Result<()> {
        let mut encrypted = false;
        let mut compression_layers = 0;

        for layer in structure.into_iter() {
            match layer {
                MessageLayer::Encryption { .. } => encrypted = true,
                MessageLayer::Compression { .. } => compression_layers += 1,
                _ => return Err(Rejection::UnexpectedContent.into()),
            }
        }

        if !encrypted {
            return Err(Rejection::NotEncrypted.into());
        }
        if compression_layers > 1 {
            return Err(Rejection::UnexpectedContent.into());
        }
        Ok(())
    }
}

impl DecryptionHelper for KeyringHelper<'_> {
    fn decrypt<D>(
        &mut self,
        pkesks: &[PKESK],
        _skesks: &[SKESK],
        sym_algo: Option<SymmetricAlgorithm>,
        mut decrypt: D,
    ) -> openpgp::Result<Option<Fingerprint>>
    where
        D: FnMut(SymmetricAlgorithm, &SessionKey) -> bool,
    {
        // First session that one of our keys unlocks wins, in message order
        for pkesk in pkesks {
            let recipient = pkesk.recipient();
            for cert in self.certs {
                let keys = cert
                    .keys()
                    .unencrypted_secret()
                    .with_policy(self.policy, None)
                    .for_transport_encryption()
                    .for_storage_encryption();

                for ka in keys {
                    if !recipient.is_wildcard() && ka.key().keyid() != *recipient {
                        continue;
                    }
                    let mut keypair = match ka.key().clone().into_keypair() {
                        Ok(keypair) => keypair,
                        Err(_) => continue,
                    };
                    if let Some((algo, session_key)) = pkesk.decrypt(&mut keypair, sym_algo) {
                        if decrypt(algo, &session_key) {
                            return Ok(Some(cert.fingerprint()));
                        }
                    }
                }
            }
        }

        Err(Rejection::NoMatchingKey.into())
    }
}

/// Maps an error from the sequoia decryptor onto our taxonomy
fn classify(err: anyhow::Error) -> DecryptError {
    for cause in err.chain() {
        if let Some(known) = classify_cause(cause) {
            return known;
        }
    }
    DecryptError::MalformedEnvelope(format!("{:#}", err))
}

/// Same as `classify` for errors surfacing while streaming the plaintext
fn classify_io(err: io::Error) -> DecryptError {
    if let Some(inner) = err.get_ref() {
        let mut cause: Option<&(dyn StdError + 'static)> = Some(inner);
        while let Some(current) = cause {
            if let Some(known) = classify_cause(current) {
                return known;
            }
            cause = current.source();
        }
        if err.kind() != io::ErrorKind::Other {
            return DecryptError::Io(err);
        }
        return DecryptError::MalformedEnvelope(inner.to_string());
    }
    DecryptError::Io(err)
}

fn classify_cause(cause: &(dyn StdError + 'static)) -> Option<DecryptError> {
    if let Some(rejection) = cause.downcast_ref::<Rejection>() {
        return Some((*rejection).into());
    }
    match cause.downcast_ref::<openpgp::Error>() {
        Some(openpgp::Error::ManipulatedMessage) => Some(DecryptError::IntegrityCheckFailed),
        _ => None,
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use openpgp::serialize::SerializeInto;
    use openpgp::types::CompressionAlgorithm;

    const PLAINTEXT: &[u8] = b"account,amount\n1001,42.00\n1002,13.37\n";

    #[test]
    fn test_decrypt_round_trip() {
        let cert = generate_cert("fetch@example.org");
        let decryptor = PgpDecryptor::from_certs(vec![cert.clone()]);

        let encrypted = Artifact::from_bytes(&encrypt(&cert, PLAINTEXT, None, None)).unwrap();
        let encrypted_path = encrypted.path().to_path_buf();

        let plaintext = decryptor.decrypt(encrypted).unwrap();
        assert_eq!(plaintext.read_to_vec().unwrap(), PLAINTEXT);
        assert!(!encrypted_path.exists(), "encrypted input should be released");
    }

    #[test]
    fn test_decrypt_compressed_message() {
        let cert = generate_cert("fetch@example.org");
        let decryptor = PgpDecryptor::from_certs(vec![cert.clone()]);

        for algo in [
            CompressionAlgorithm::Zip,
            CompressionAlgorithm::Zlib,
            CompressionAlgorithm::BZip2,
        ] {
            let encrypted = Artifact::from_bytes(&encrypt(&cert, PLAINTEXT, Some(algo), None)).unwrap();
            let plaintext = decryptor.decrypt(encrypted).unwrap();
            assert_eq!(plaintext.read_to_vec().unwrap(), PLAINTEXT, "{:?}", algo);
        }
    }

    #[test]
    fn test_decrypt_picks_matching_cert_from_bundle() {
        let other = generate_cert("other@example.org");
        let ours = generate_cert("fetch@example.org");
        let decryptor = PgpDecryptor::from_certs(vec![other, ours.clone()]);

        let encrypted = Artifact::from_bytes(&encrypt(&ours, PLAINTEXT, None, None)).unwrap();
        let plaintext = decryptor.decrypt(encrypted).unwrap();
        assert_eq!(plaintext.read_to_vec().unwrap(), PLAINTEXT);
    }

    #[test]
    fn test_decrypt_without_matching_key() {
        let sender_target = generate_cert("someone-else@example.org");
        let ours = generate_cert("fetch@example.org");
        let decryptor = PgpDecryptor::from_certs(vec![ours]);

        let encrypted = Artifact::from_bytes(&encrypt(&sender_target, PLAINTEXT, None, None)).unwrap();
        let err = decryptor.decrypt(encrypted).unwrap_err();
        assert!(matches!(err, DecryptError::NoMatchingKey), "got {:?}", err);
        assert_eq!(err.to_string(), "no matching key");
    }

    #[test]
    fn test_decrypt_rejects_signed_message() {
        let cert = generate_cert("fetch@example.org");
        let decryptor = PgpDecryptor::from_certs(vec![cert.clone()]);

        let encrypted = Artifact::from_bytes(&encrypt(&cert, PLAINTEXT, None, Some(&cert))).unwrap();
        let err = decryptor.decrypt(encrypted).unwrap_err();
        assert!(matches!(err, DecryptError::UnexpectedContent), "got {:?}", err);
    }

    #[test]
    fn test_decrypt_rejects_modified_mdc() {
        let cert = generate_cert("fetch@example.org");
        let decryptor = PgpDecryptor::from_certs(vec![cert.clone()]);

        let mut ciphertext = encrypt(&cert, PLAINTEXT, None, None);
        flip_mdc_byte(&mut ciphertext);

        let err = decryptor
            .decrypt(Artifact::from_bytes(&ciphertext).unwrap())
            .unwrap_err();
        assert!(matches!(err, DecryptError::IntegrityCheckFailed), "got {:?}", err);
        assert_eq!(err.to_string(), "integrity check failed");
    }

    #[test]
    fn test_decrypt_rejects_unencrypted_message() {
        let cert = generate_cert("fetch@example.org");
        let decryptor = PgpDecryptor::from_certs(vec![cert]);

        let err = decryptor
            .decrypt(Artifact::from_bytes(&plain_literal(PLAINTEXT)).unwrap())
            .unwrap_err();
        assert!(matches!(err, DecryptError::MalformedEnvelope(_)), "got {:?}", err);
    }

    #[test]
    fn test_decrypt_rejects_garbage() {
        let cert = generate_cert("fetch@example.org");
        let decryptor = PgpDecryptor::from_certs(vec![cert]);

        let err = decryptor
            .decrypt(Artifact::from_bytes(b"this is not an openpgp message").unwrap())
            .unwrap_err();
        assert!(matches!(err, DecryptError::MalformedEnvelope(_)), "got {:?}", err);
    }

    #[test]
    fn test_from_key_file_armored_secret_keys() {
        let cert = generate_cert("fetch@example.org");
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("secring.asc");
        std::fs::write(&key_path, cert.as_tsk().armored().to_vec().unwrap()).unwrap();

        let decryptor = PgpDecryptor::from_key_file(&key_path).unwrap();
        let encrypted = Artifact::from_bytes(&encrypt(&cert, PLAINTEXT, None, None)).unwrap();
        assert_eq!(decryptor.decrypt(encrypted).unwrap().read_to_vec().unwrap(), PLAINTEXT);
    }

    #[test]
    fn test_from_key_file_rejects_public_keys_only() {
        let cert = generate_cert("fetch@example.org").strip_secret_key_material();
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("pubring.asc");
        std::fs::write(&key_path, cert.armored().to_vec().unwrap()).unwrap();

        let result = PgpDecryptor::from_key_file(&key_path);
        assert!(matches!(result, Err(DecryptError::KeyBundle { .. })));
    }

    #[test]
    fn test_from_key_file_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("secring.asc");
        std::fs::write(&key_path, b"not a key").unwrap();

        let result = PgpDecryptor::from_key_file(&key_path);
        assert!(matches!(result, Err(DecryptError::KeyBundle { .. })));
    }
}
