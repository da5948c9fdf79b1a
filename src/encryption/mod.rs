//! Key material, algorithm-tagged strings, and password handling.

pub mod base85;

use std::fmt;
use std::str::FromStr;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use uuid::Uuid;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::errors::{ClientError, Result};

pub const CURVE25519: &str = "CURVE25519";
pub const ED25519: &str = "ED25519";
pub const XSALSA20: &str = "XSALSA20";

const KEY_LEN: usize = 32;
const LOGIN_HASH_MEMORY_KIB: u32 = 65_536;
const LOGIN_HASH_PASSES: u32 = 2;

/// A string of the form `PREFIX:DATA`, where DATA is base85 text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlgoString {
    pub prefix: String,
    pub data: String,
}

impl AlgoString {
    pub fn new(prefix: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            data: data.into(),
        }
    }

    pub fn from_bytes(prefix: impl Into<String>, raw: &[u8]) -> Self {
        Self::new(prefix, base85::encode(raw))
    }

    pub fn parse(value: &str) -> Result<Self> {
        let (prefix, data) = value
            .split_once(':')
            .ok_or_else(|| ClientError::BadData(format!("`{value}` is not an algorithm string")))?;
        if prefix.is_empty() || data.is_empty() {
            return Err(ClientError::BadData(format!(
                "`{value}` is not an algorithm string"
            )));
        }
        Ok(Self::new(prefix, data))
    }

    pub fn raw_data(&self) -> Result<Vec<u8>> {
        base85::decode(&self.data)
    }

    pub fn is_valid(&self) -> bool {
        !self.prefix.is_empty() && !self.data.is_empty()
    }

    pub fn make_empty(&mut self) {
        self.prefix.clear();
        self.data.clear();
    }

    fn key_bytes(&self, expected_prefix: &str) -> Result<[u8; KEY_LEN]> {
        if !self.is_valid() {
            return Err(ClientError::BadParameterValue("empty key string".into()));
        }
        if self.prefix != expected_prefix {
            return Err(ClientError::UnsupportedEncryptionType(self.prefix.clone()));
        }
        let raw = self.raw_data()?;
        raw.as_slice()
            .try_into()
            .map_err(|_| ClientError::BadData(format!("{} key must be {KEY_LEN} bytes", self.prefix)))
    }
}

impl FromStr for AlgoString {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for AlgoString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.prefix.is_empty() && self.data.is_empty() {
            return Ok(());
        }
        write!(f, "{}:{}", self.prefix, self.data)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    Asymmetric,
    Signing,
    Symmetric,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Asymmetric => "asymmetric",
            KeyType::Signing => "signing",
            KeyType::Symmetric => "symmetric",
        }
    }
}

/// A CURVE25519 encryption key pair.
#[derive(Clone)]
pub struct KeyPair {
    id: String,
    category: String,
    secret: StaticSecret,
    public: PublicKey,
}

impl KeyPair {
    pub fn generate(category: impl Into<String>) -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Self {
            id: Uuid::new_v4().to_string(),
            category: category.into(),
            secret,
            public,
        }
    }

    /// Rebuilds a pair from its private half. The public half is derived.
    pub fn from_private(category: impl Into<String>, private: &AlgoString) -> Result<Self> {
        let secret = StaticSecret::from(private.key_bytes(CURVE25519)?);
        let public = PublicKey::from(&secret);
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            category: category.into(),
            secret,
            public,
        })
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn key_type(&self) -> KeyType {
        KeyType::Asymmetric
    }

    pub fn encryption_type(&self) -> &'static str {
        CURVE25519
    }

    pub fn public_key(&self) -> AlgoString {
        AlgoString::from_bytes(CURVE25519, self.public.as_bytes())
    }

    pub fn private_key(&self) -> AlgoString {
        AlgoString::from_bytes(CURVE25519, &self.secret.to_bytes())
    }

    pub fn public85(&self) -> String {
        base85::encode(self.public.as_bytes())
    }

    pub fn private85(&self) -> String {
        base85::encode(&self.secret.to_bytes())
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("id", &self.id)
            .field("category", &self.category)
            .field("public", &self.public85())
            .finish_non_exhaustive()
    }
}

/// An ED25519 signing key pair.
#[derive(Clone)]
pub struct SigningPair {
    id: String,
    category: String,
    signing: SigningKey,
}

impl SigningPair {
    pub fn generate(category: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            category: category.into(),
            signing: SigningKey::generate(&mut OsRng),
        }
    }

    pub fn from_private(category: impl Into<String>, private: &AlgoString) -> Result<Self> {
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            category: category.into(),
            signing: SigningKey::from_bytes(&private.key_bytes(ED25519)?),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn key_type(&self) -> KeyType {
        KeyType::Signing
    }

    pub fn verify_key(&self) -> AlgoString {
        AlgoString::from_bytes(ED25519, self.signing.verifying_key().as_bytes())
    }

    pub fn signing_key(&self) -> AlgoString {
        AlgoString::from_bytes(ED25519, &self.signing.to_bytes())
    }

    /// Signs `data`, returning `ED25519:<signature>`.
    pub fn sign(&self, data: &[u8]) -> AlgoString {
        AlgoString::from_bytes(ED25519, &self.signing.sign(data).to_bytes())
    }
}

impl fmt::Debug for SigningPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningPair")
            .field("id", &self.id)
            .field("category", &self.category)
            .field("verify", &self.verify_key().to_string())
            .finish_non_exhaustive()
    }
}

/// Checks an ED25519 signature over `data`.
pub fn verify_signature(verify_key: &AlgoString, data: &[u8], signature: &AlgoString) -> Result<()> {
    let key = VerifyingKey::from_bytes(&verify_key.key_bytes(ED25519)?)
        .map_err(|err| ClientError::Crypto(err.to_string()))?;
    if signature.prefix != ED25519 {
        return Err(ClientError::UnsupportedEncryptionType(signature.prefix.clone()));
    }
    let raw = signature.raw_data()?;
    let signature =
        Signature::from_slice(&raw).map_err(|err| ClientError::BadData(err.to_string()))?;
    key.verify(data, &signature)
        .map_err(|_| ClientError::InvalidKeycard("signature verification failed".into()))
}

/// A random symmetric key.
#[derive(Clone)]
pub struct SecretKey {
    id: String,
    category: String,
    key: [u8; KEY_LEN],
}

impl SecretKey {
    pub fn generate(category: impl Into<String>) -> Self {
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        Self {
            id: Uuid::new_v4().to_string(),
            category: category.into(),
            key,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn key_type(&self) -> KeyType {
        KeyType::Symmetric
    }

    pub fn encryption_type(&self) -> &'static str {
        XSALSA20
    }

    pub fn key85(&self) -> String {
        base85::encode(&self.key)
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey")
            .field("id", &self.id)
            .field("category", &self.category)
            .finish_non_exhaustive()
    }
}

/// Maps a server-side folder to a local path and the key protecting it.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FolderMapping {
    pub fid: String,
    pub address: String,
    pub keyid: String,
    pub path: String,
    pub permissions: String,
}

impl FolderMapping {
    pub fn new(
        address: impl Into<String>,
        keyid: impl Into<String>,
        path: impl Into<String>,
        permissions: impl Into<String>,
    ) -> Self {
        let mut mapping = Self {
            fid: String::new(),
            address: address.into(),
            keyid: keyid.into(),
            path: path.into(),
            permissions: permissions.into(),
        };
        mapping.make_id();
        mapping
    }

    pub fn make_id(&mut self) {
        self.fid = Uuid::new_v4().to_string();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PasswordStrength {
    VeryWeak = 1,
    Weak,
    Medium,
    Strong,
    VeryStrong,
}

impl PasswordStrength {
    fn from_score(score: u8) -> Option<Self> {
        match score {
            1 => Some(Self::VeryWeak),
            2 => Some(Self::Weak),
            3 => Some(Self::Medium),
            4 => Some(Self::Strong),
            5 => Some(Self::VeryStrong),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::VeryWeak => "very weak",
            Self::Weak => "weak",
            Self::Medium => "medium",
            Self::Strong => "strong",
            Self::VeryStrong => "very strong",
        }
    }
}

impl fmt::Display for PasswordStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn is_password_symbol(ch: char) -> bool {
    "~`!@#$%^&*()_={}/<>,.:;|'[]\"\\-+?".contains(ch)
}

/// Scores a passphrase. Short passphrases need more character classes.
pub fn check_password_complexity(text: &str) -> Result<PasswordStrength> {
    let length = text.chars().count();
    if length < 8 {
        return Err(ClientError::BadParameterValue(
            "Passphrase must be at least 8 characters.".into(),
        ));
    }

    let checks = [
        !text.is_ascii(),
        text.chars().any(|ch| ch.is_ascii_digit()),
        text.chars().any(|ch| ch.is_ascii_uppercase()),
        text.chars().any(|ch| ch.is_ascii_lowercase()),
        text.chars().any(is_password_symbol),
    ];
    let score = checks.iter().filter(|passed| **passed).count() as u8;

    match PasswordStrength::from_score(score) {
        Some(strength) if !((length < 12 && score < 3) || score < 2) => Ok(strength),
        Some(strength) => Err(ClientError::WeakPassphrase {
            strength: strength.label().to_string(),
        }),
        None => Err(ClientError::WeakPassphrase {
            strength: "error".to_string(),
        }),
    }
}

/// A locally stored argon2id password hash.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Password {
    hash: String,
    strength: Option<PasswordStrength>,
}

impl Password {
    /// Checks complexity and hashes `text` with a fresh salt.
    pub fn set(text: &str) -> Result<Self> {
        let strength = check_password_complexity(text)?;
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(text.as_bytes(), &salt)
            .map_err(|err| ClientError::Crypto(err.to_string()))?
            .to_string();
        Ok(Self {
            hash,
            strength: Some(strength),
        })
    }

    /// Wraps a hash loaded from storage.
    pub fn assign(hash: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            strength: None,
        }
    }

    pub fn check(&self, text: &str) -> bool {
        match PasswordHash::new(&self.hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(text.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn strength(&self) -> Option<PasswordStrength> {
        self.strength
    }
}

/// Derives the credential sent to the server for `wid`. The workspace ID is
/// the salt, so the server sees the same value on every login.
pub fn derive_login_hash(password: &str, wid: &str) -> Result<String> {
    if password.is_empty() {
        return Err(ClientError::BadParameterValue("password may not be empty".into()));
    }
    let params = Params::new(LOGIN_HASH_MEMORY_KIB, LOGIN_HASH_PASSES, 1, Some(KEY_LEN))
        .map_err(|err| ClientError::Crypto(err.to_string()))?;
    let mut output = [0u8; KEY_LEN];
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password_into(password.as_bytes(), wid.as_bytes(), &mut output)
        .map_err(|err| ClientError::Crypto(err.to_string()))?;
    Ok(base85::encode(&output))
}
