//! Turning downloaded payloads into plaintext
//!
//! The variant is chosen once at startup: with a configured key bundle every
//! file is treated as an OpenPGP message, without one files pass through
//! untouched.

pub mod pgp;

pub use pgp::PgpDecryptor;

use crate::artifact::Artifact;
use crate::error::DecryptError;
use std::path::Path;

pub enum Decryptor {
    /// Returns its input unchanged
    Identity,
    /// Decrypts OpenPGP messages with a fixed set of secret keys
    Pgp(PgpDecryptor),
}

impl Decryptor {
    /// Selects the variant from the optional key bundle path
    ///
    /// # Errors
    /// `DecryptError::KeyBundle` if a path is given but holds no usable keys
    pub fn from_key_path(path: Option<&Path>) -> Result<Self, DecryptError> {
        match path {
            Some(path) => Ok(Decryptor::Pgp(PgpDecryptor::from_key_file(path)?)),
            None => Ok(Decryptor::Identity),
        }
    }

    /// Converts a downloaded artifact into its plaintext artifact
    ///
    /// The identity variant hands back the very same artifact. The PGP
    /// variant consumes its input, so the encrypted copy is deleted as soon
    /// as the plaintext exists (or as soon as decryption fails).
    pub fn decrypt(&self, artifact: Artifact) -> Result<Artifact, DecryptError> {
        match self {
            Decryptor::Identity => Ok(artifact),
            Decryptor::Pgp(pgp) => pgp.decrypt(artifact),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Decryptor::Identity => "identity",
            Decryptor::Pgp(_) => "openpgp",
        }
    }
}
