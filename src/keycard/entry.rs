use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use blake2::Blake2b512;
use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};
use sha3::Sha3_256;

use crate::encryption::{self, AlgoString, KeyPair, SigningPair, ED25519};
use crate::errors::{ClientError, Result};

pub const HASH_ALGORITHMS: [&str; 4] = ["BLAKE3-256", "BLAKE2", "SHA-256", "SHA3-256"];

const MAX_EXPIRATION_DAYS: i64 = 1095;
const EXPIRES_FORMAT: &str = "%Y%m%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Signature,
    Hash,
}

/// One position in an entry's signature block. `level` is the
/// `make_bytestring` level that first includes the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureSlot {
    pub name: &'static str,
    pub level: usize,
    pub optional: bool,
    pub kind: SlotKind,
}

const fn slot(name: &'static str, level: usize, optional: bool, kind: SlotKind) -> SignatureSlot {
    SignatureSlot {
        name,
        level,
        optional,
        kind,
    }
}

const ORG_SLOTS: [SignatureSlot; 3] = [
    slot("Custody", 1, true, SlotKind::Signature),
    slot("Organization", 2, false, SlotKind::Signature),
    slot("Hashes", 3, false, SlotKind::Hash),
];

const USER_SLOTS: [SignatureSlot; 4] = [
    slot("Custody", 1, true, SlotKind::Signature),
    slot("Organization", 2, false, SlotKind::Signature),
    slot("Hashes", 3, false, SlotKind::Hash),
    slot("User", 4, false, SlotKind::Signature),
];

const ORG_FIELDS: [&str; 11] = [
    "Index",
    "Name",
    "Contact-Admin",
    "Contact-Abuse",
    "Contact-Support",
    "Language",
    "Primary-Verification-Key",
    "Secondary-Verification-Key",
    "Encryption-Key",
    "Time-To-Live",
    "Expires",
];

const ORG_REQUIRED: [&str; 7] = [
    "Index",
    "Name",
    "Contact-Admin",
    "Primary-Verification-Key",
    "Encryption-Key",
    "Time-To-Live",
    "Expires",
];

const USER_FIELDS: [&str; 11] = [
    "Index",
    "Name",
    "Workspace-ID",
    "User-ID",
    "Domain",
    "Contact-Request-Verification-Key",
    "Contact-Request-Encryption-Key",
    "Public-Encryption-Key",
    "Alternate-Encryption-Key",
    "Time-To-Live",
    "Expires",
];

const USER_REQUIRED: [&str; 8] = [
    "Index",
    "Workspace-ID",
    "Domain",
    "Contact-Request-Verification-Key",
    "Contact-Request-Encryption-Key",
    "Public-Encryption-Key",
    "Time-To-Live",
    "Expires",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    Organization,
    User,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Organization => "Organization",
            EntryType::User => "User",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "Organization" => Ok(EntryType::Organization),
            "User" => Ok(EntryType::User),
            other => Err(ClientError::UnsupportedKeycardType(other.to_string())),
        }
    }

    pub fn field_names(&self) -> &'static [&'static str] {
        match self {
            EntryType::Organization => &ORG_FIELDS,
            EntryType::User => &USER_FIELDS,
        }
    }

    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            EntryType::Organization => &ORG_REQUIRED,
            EntryType::User => &USER_REQUIRED,
        }
    }

    pub fn signature_slots(&self) -> &'static [SignatureSlot] {
        match self {
            EntryType::Organization => &ORG_SLOTS,
            EntryType::User => &USER_SLOTS,
        }
    }

    fn default_ttl(&self) -> &'static str {
        match self {
            EntryType::Organization => "30",
            EntryType::User => "7",
        }
    }

    fn default_expiration_days(&self) -> i64 {
        match self {
            EntryType::Organization => 365,
            EntryType::User => 90,
        }
    }

    /// Field holding the key that signs the next entry's custody signature.
    fn custody_key_field(&self) -> &'static str {
        match self {
            EntryType::Organization => "Primary-Verification-Key",
            EntryType::User => "Contact-Request-Verification-Key",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keys generated while chaining an entry. Private halves never touch the
/// entry itself.
#[derive(Debug, Clone)]
pub enum ChainedKeys {
    Organization {
        signing: SigningPair,
        encryption: KeyPair,
    },
    User {
        signing: SigningPair,
        contact_request_signing: SigningPair,
        contact_request_encryption: KeyPair,
        public_encryption: Option<KeyPair>,
        alternate_encryption: Option<KeyPair>,
    },
}

#[derive(Debug, Clone)]
pub struct ChainResult {
    pub entry: Entry,
    pub keys: ChainedKeys,
}

/// A single keycard entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    entry_type: EntryType,
    fields: HashMap<String, String>,
    signatures: HashMap<String, String>,
    prev_hash: String,
    hash: String,
}

impl Entry {
    /// Creates an entry with the type's default index, TTL and expiration.
    pub fn new(entry_type: EntryType) -> Self {
        let mut entry = Self::blank(entry_type);
        entry.fields.insert("Index".into(), "1".into());
        entry
            .fields
            .insert("Time-To-Live".into(), entry_type.default_ttl().into());
        entry.set_expiration(None);
        entry
    }

    /// Creates an entry with no fields at all, for loading stored data.
    pub(crate) fn blank(entry_type: EntryType) -> Self {
        Self {
            entry_type,
            fields: HashMap::new(),
            signatures: HashMap::new(),
            prev_hash: String::new(),
            hash: String::new(),
        }
    }

    pub fn entry_type(&self) -> EntryType {
        self.entry_type
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn prev_hash(&self) -> &str {
        &self.prev_hash
    }

    /// Sets the previous entry's hash. Invalidates the current hash.
    pub fn set_prev_hash(&mut self, value: impl Into<String>) {
        self.prev_hash = value.into();
        self.hash.clear();
    }

    pub fn index(&self) -> Result<u64> {
        self.field("Index")
            .and_then(|value| value.parse().ok())
            .ok_or_else(|| ClientError::BadData("invalid entry index".into()))
    }

    /// Assigns a field. Any edit invalidates every signature and the hash.
    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
        self.signatures.clear();
        self.hash.clear();
    }

    pub fn remove_field(&mut self, name: &str) {
        self.fields.remove(name);
        self.signatures.clear();
        self.hash.clear();
    }

    /// Assigns several fields at once. `<Name>-Signature` keys set signatures.
    /// Unknown fields are kept but never serialized.
    pub fn set_fields<I, K, V>(&mut self, fields: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        self.signatures.clear();
        self.hash.clear();

        for (key, value) in fields {
            let key = key.as_ref();
            if let Some(name) = key.strip_suffix("-Signature") {
                let name = self.signature_name(name)?;
                self.signatures.insert(name.to_string(), value.into());
            } else {
                self.fields.insert(key.to_string(), value.into());
            }
        }
        Ok(())
    }

    /// Loads fields, signatures and hashes from CRLF-delimited text.
    pub fn set(&mut self, data: &[u8]) -> Result<()> {
        let text = std::str::from_utf8(data)
            .map_err(|_| ClientError::BadData("entry data is not UTF-8".into()))?;

        for line in text.split("\r\n") {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (key, value) = line
                .split_once(':')
                .ok_or_else(|| ClientError::BadData(format!("bad line `{line}`")))?;

            match key {
                "Type" => {
                    if value != self.entry_type.as_str() {
                        return Err(ClientError::BadData(format!(
                            "can't use {value} data on a {} entry",
                            self.entry_type
                        )));
                    }
                }
                "Hash" => self.hash = value.to_string(),
                "Previous-Hash" => self.prev_hash = value.to_string(),
                _ => {
                    if let Some(name) = key.strip_suffix("-Signature") {
                        let name = self.signature_name(name)?;
                        self.signatures.insert(name.to_string(), value.to_string());
                    } else {
                        self.fields.insert(key.to_string(), value.to_string());
                    }
                }
            }
        }
        Ok(())
    }

    /// Sets `Expires` to `days` from today (UTC). `None` uses the type's
    /// default; anything past three years is capped.
    pub fn set_expiration(&mut self, days: Option<i64>) {
        let days = days
            .unwrap_or_else(|| self.entry_type.default_expiration_days())
            .clamp(0, MAX_EXPIRATION_DAYS);
        let expires = Utc::now() + Duration::days(days);
        self.fields
            .insert("Expires".into(), expires.format(EXPIRES_FORMAT).to_string());
    }

    /// Serializes the entry with the first `level` signature slots. Levels
    /// past the last slot include everything.
    pub fn make_bytestring(&self, level: usize) -> Vec<u8> {
        let mut lines: Vec<String> = Vec::new();
        lines.push(format!("Type:{}", self.entry_type));

        for name in self.entry_type.field_names() {
            if let Some(value) = self.fields.get(*name).filter(|v| !v.is_empty()) {
                lines.push(format!("{name}:{value}"));
            }
        }

        let slots = self.entry_type.signature_slots();
        for info in slots.iter().take(level.min(slots.len())) {
            match info.kind {
                SlotKind::Hash => {
                    if !self.prev_hash.is_empty() {
                        lines.push(format!("Previous-Hash:{}", self.prev_hash));
                    }
                    if !self.hash.is_empty() {
                        lines.push(format!("Hash:{}", self.hash));
                    }
                }
                SlotKind::Signature => {
                    if let Some(sig) = self.signatures.get(info.name).filter(|v| !v.is_empty()) {
                        lines.push(format!("{}-Signature:{sig}", info.name));
                    }
                }
            }
        }

        let mut out = lines.join("\r\n");
        out.push_str("\r\n");
        out.into_bytes()
    }

    /// Full serialization, every slot included.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.make_bytestring(usize::MAX)
    }

    pub fn is_compliant(&self) -> Result<()> {
        for field in self.entry_type.required_fields() {
            if self.field(field).map_or(true, str::is_empty) {
                return Err(ClientError::RequiredFieldMissing(field.to_string()));
            }
        }

        for info in self.entry_type.signature_slots() {
            if info.kind == SlotKind::Hash {
                if self.hash.is_empty() {
                    return Err(ClientError::SignatureMissing("Hash".into()));
                }
                continue;
            }
            let missing = match self.signatures.get(info.name) {
                Some(sig) => sig.is_empty(),
                None => !info.optional,
            };
            if missing {
                return Err(ClientError::SignatureMissing(format!(
                    "{}-Signature",
                    info.name
                )));
            }
        }
        Ok(())
    }

    pub fn get_signature(&self, name: &str) -> Result<AlgoString> {
        let value = self
            .signatures
            .get(name)
            .ok_or_else(|| ClientError::ResourceNotFound(name.to_string()))?;
        if value.is_empty() {
            return Err(ClientError::SignatureMissing(name.to_string()));
        }
        AlgoString::parse(value)
    }

    /// Signs the entry in slot `name`. This slot and every later one are
    /// cleared first, since they cover the data being signed.
    pub fn sign(&mut self, signing_key: &AlgoString, name: &str) -> Result<()> {
        let index = self.signature_slot_index(name)?;
        let pair = SigningPair::from_private("keycard", signing_key)?;

        for info in &self.entry_type.signature_slots()[index..] {
            match info.kind {
                SlotKind::Hash => self.hash.clear(),
                SlotKind::Signature => {
                    self.signatures.remove(info.name);
                }
            }
        }

        let signature = pair.sign(&self.make_bytestring(index + 1));
        self.signatures.insert(name.to_string(), signature.to_string());
        Ok(())
    }

    /// Hashes everything up to and including the previous hash.
    pub fn generate_hash(&mut self, algorithm: &str) -> Result<String> {
        if !HASH_ALGORITHMS.contains(&algorithm) {
            return Err(ClientError::UnsupportedHashType(algorithm.to_string()));
        }
        let level = self
            .entry_type
            .signature_slots()
            .iter()
            .find(|info| info.kind == SlotKind::Hash)
            .map(|info| info.level)
            .ok_or_else(|| ClientError::FeatureNotAvailable("entry has no hash slot".into()))?;

        self.hash.clear();
        self.hash = hash_data(algorithm, &self.make_bytestring(level))?.to_string();
        Ok(self.hash.clone())
    }

    pub fn verify_signature(&self, verify_key: &AlgoString, name: &str) -> Result<()> {
        if !verify_key.is_valid() {
            return Err(ClientError::BadParameterValue("bad verify key".into()));
        }
        let index = self.signature_slot_index(name)?;
        if verify_key.prefix != ED25519 {
            return Err(ClientError::UnsupportedEncryptionType(
                verify_key.prefix.clone(),
            ));
        }

        let signature = match self.signatures.get(name) {
            Some(sig) if !sig.is_empty() => AlgoString::parse(sig)?,
            _ => {
                return Err(ClientError::NotCompliant(format!(
                    "empty signature {name}"
                )))
            }
        };
        encryption::verify_signature(verify_key, &self.make_bytestring(index), &signature)
    }

    /// Creates the next entry in the chain with fresh keys and a custody
    /// signature made with `custody_key`.
    pub fn chain(&self, custody_key: &AlgoString, rotate_optional: bool) -> Result<ChainResult> {
        if custody_key.prefix != ED25519 {
            return Err(ClientError::BadParameterValue(format!(
                "wrong key type {}",
                custody_key.prefix
            )));
        }
        self.is_compliant()?;

        let mut entry = Entry {
            entry_type: self.entry_type,
            fields: self.fields.clone(),
            signatures: HashMap::new(),
            prev_hash: self.hash.clone(),
            hash: String::new(),
        };
        entry
            .fields
            .insert("Index".into(), (self.index()? + 1).to_string());

        let keys = match self.entry_type {
            EntryType::Organization => {
                let signing = SigningPair::generate("orgsigning");
                let encryption = KeyPair::generate("orgencryption");
                if rotate_optional {
                    let previous = self.field("Primary-Verification-Key").unwrap_or_default();
                    entry
                        .fields
                        .insert("Secondary-Verification-Key".into(), previous.to_string());
                } else {
                    entry.fields.remove("Secondary-Verification-Key");
                }
                entry.fields.insert(
                    "Primary-Verification-Key".into(),
                    signing.verify_key().to_string(),
                );
                entry
                    .fields
                    .insert("Encryption-Key".into(), encryption.public_key().to_string());
                ChainedKeys::Organization {
                    signing,
                    encryption,
                }
            }
            EntryType::User => {
                let signing = SigningPair::generate("signing");
                let contact_request_signing = SigningPair::generate("crsigning");
                let contact_request_encryption = KeyPair::generate("crencryption");
                entry.fields.insert(
                    "Contact-Request-Verification-Key".into(),
                    contact_request_signing.verify_key().to_string(),
                );
                entry.fields.insert(
                    "Contact-Request-Encryption-Key".into(),
                    contact_request_encryption.public_key().to_string(),
                );

                let (public_encryption, alternate_encryption) = if rotate_optional {
                    let public = KeyPair::generate("encryption");
                    let alternate = KeyPair::generate("altencryption");
                    entry
                        .fields
                        .insert("Public-Encryption-Key".into(), public.public_key().to_string());
                    entry.fields.insert(
                        "Alternate-Encryption-Key".into(),
                        alternate.public_key().to_string(),
                    );
                    (Some(public), Some(alternate))
                } else {
                    (None, None)
                };

                ChainedKeys::User {
                    signing,
                    contact_request_signing,
                    contact_request_encryption,
                    public_encryption,
                    alternate_encryption,
                }
            }
        };

        entry.sign(custody_key, "Custody")?;
        Ok(ChainResult { entry, keys })
    }

    /// Checks that this entry directly follows `previous` and carries a
    /// custody signature from the previous entry's key.
    pub fn verify_chain(&self, previous: &Entry) -> Result<()> {
        if previous.entry_type != self.entry_type {
            return Err(ClientError::BadParameterValue("entry type mismatch".into()));
        }
        if self.signatures.get("Custody").map_or(true, String::is_empty) {
            return Err(ClientError::ResourceNotFound(
                "custody signature missing".into(),
            ));
        }
        let key_field = self.entry_type.custody_key_field();
        let key = previous
            .field(key_field)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ClientError::ResourceNotFound("signing key missing".into()))?;

        let prev_index = previous
            .index()
            .map_err(|_| ClientError::BadData("previous entry has a bad index".into()))?;
        let index = self
            .index()
            .map_err(|_| ClientError::BadData("current entry has a bad index".into()))?;
        if index != prev_index + 1 {
            return Err(ClientError::InvalidKeycard(
                "entry index compliance failure".into(),
            ));
        }

        self.verify_signature(&AlgoString::parse(key)?, "Custody")
    }

    /// Writes the entry with CRLF line endings.
    pub fn save(&self, path: &Path, clobber: bool) -> Result<()> {
        if path.as_os_str().is_empty() {
            return Err(ClientError::BadParameterValue("path may not be empty".into()));
        }
        if path.exists() && !clobber {
            return Err(ClientError::ResourceExists(path.display().to_string()));
        }
        fs::write(path, self.to_bytes())?;
        Ok(())
    }

    fn signature_slot_index(&self, name: &str) -> Result<usize> {
        self.entry_type
            .signature_slots()
            .iter()
            .position(|info| info.kind == SlotKind::Signature && info.name == name)
            .ok_or_else(|| ClientError::BadParameterValue(format!("bad signature type {name}")))
    }

    fn signature_name(&self, name: &str) -> Result<&'static str> {
        self.entry_type
            .signature_slots()
            .iter()
            .find(|info| info.kind == SlotKind::Signature && info.name == name)
            .map(|info| info.name)
            .ok_or_else(|| ClientError::BadData(format!("bad signature line {name}")))
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.to_bytes()))
    }
}

/// Digests `data` with one of [`HASH_ALGORITHMS`]. BLAKE3-256 is read as a
/// 256-byte extended output.
pub fn hash_data(algorithm: &str, data: &[u8]) -> Result<AlgoString> {
    let digest: Vec<u8> = match algorithm {
        "BLAKE3-256" => {
            let mut out = [0u8; 256];
            blake3::Hasher::new()
                .update(data)
                .finalize_xof()
                .fill(&mut out);
            out.to_vec()
        }
        "BLAKE2" => Blake2b512::digest(data).to_vec(),
        "SHA-256" => Sha256::digest(data).to_vec(),
        "SHA3-256" => Sha3_256::digest(data).to_vec(),
        other => return Err(ClientError::UnsupportedHashType(other.to_string())),
    };
    Ok(AlgoString::from_bytes(algorithm, &digest))
}
