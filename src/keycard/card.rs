use std::fs;
use std::path::Path;

use tracing::debug;

use crate::encryption::AlgoString;
use crate::errors::{ClientError, Result};

use super::entry::{ChainResult, ChainedKeys, Entry, EntryType};

const BEGIN_ENTRY: &str = "----- BEGIN ENTRY -----";
const END_ENTRY: &str = "----- END ENTRY -----";
const CHAIN_HASH_ALGORITHM: &str = "BLAKE3-256";

/// A chain of entries of a single type, oldest first.
#[derive(Debug, Clone)]
pub struct Keycard {
    entry_type: EntryType,
    entries: Vec<Entry>,
}

impl Keycard {
    pub fn new(entry_type: EntryType) -> Self {
        Self {
            entry_type,
            entries: Vec::new(),
        }
    }

    pub fn entry_type(&self) -> EntryType {
        self.entry_type
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn current(&self) -> Option<&Entry> {
        self.entries.last()
    }

    /// Appends a root or externally built entry.
    pub fn push(&mut self, entry: Entry) -> Result<()> {
        if entry.entry_type() != self.entry_type {
            return Err(ClientError::BadParameterValue(format!(
                "can't add a {} entry to a {} keycard",
                entry.entry_type(),
                self.entry_type
            )));
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Appends a new entry with rotated keys. Organization entries come back
    /// complete. User entries only carry the custody signature until the
    /// organization signs them.
    pub fn chain(&mut self, custody_key: &AlgoString, rotate_optional: bool) -> Result<ChainResult> {
        let last = self
            .entries
            .last()
            .ok_or_else(|| ClientError::ResourceNotFound("missing root entry".into()))?;

        let mut result = last.chain(custody_key, rotate_optional)?;
        if let ChainedKeys::Organization { signing, .. } = &result.keys {
            result
                .entry
                .sign(&signing.signing_key(), "Organization")?;
            result.entry.generate_hash(CHAIN_HASH_ALGORITHM)?;
        }

        debug!(
            entry_type = %self.entry_type,
            index = result.entry.field("Index").unwrap_or_default(),
            "keycard entry chained"
        );
        self.entries.push(result.entry.clone());
        Ok(result)
    }

    pub fn load(path: &Path) -> Result<Self> {
        if path.as_os_str().is_empty() {
            return Err(ClientError::BadParameterValue("path may not be empty".into()));
        }
        if !path.exists() {
            return Err(ClientError::ResourceNotFound(path.display().to_string()));
        }

        let text = fs::read_to_string(path)?;
        let mut card_type: Option<EntryType> = None;
        let mut accumulator: Vec<&str> = Vec::new();
        let mut entries = Vec::new();

        for (line_index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            match line {
                BEGIN_ENTRY => accumulator.clear(),
                END_ENTRY => {
                    let entry_type = card_type.ok_or_else(|| {
                        ClientError::UnsupportedKeycardType(format!(
                            "entry {} has no type",
                            entries.len() + 1
                        ))
                    })?;
                    let mut entry = Entry::blank(entry_type);
                    let data = accumulator.join("\r\n");
                    entry.set(data.as_bytes()).map_err(|err| {
                        ClientError::BadData(format!("keycard entry {}: {err}", entries.len() + 1))
                    })?;
                    entries.push(entry);
                    accumulator.clear();
                }
                _ => {
                    let (key, value) = line.split_once(':').ok_or_else(|| {
                        ClientError::BadData(format!("invalid line {}", line_index + 1))
                    })?;
                    if key == "Type" {
                        let parsed = EntryType::parse(value)?;
                        match card_type {
                            Some(existing) if existing != parsed => {
                                return Err(ClientError::BadData(
                                    "entry type does not match keycard".into(),
                                ))
                            }
                            _ => card_type = Some(parsed),
                        }
                    }
                    accumulator.push(line);
                }
            }
        }

        let entry_type = card_type.ok_or_else(|| {
            ClientError::ResourceNotFound("keycard contains no entries".into())
        })?;
        Ok(Self {
            entry_type,
            entries,
        })
    }

    /// Writes every entry framed by BEGIN/END markers with CRLF line endings.
    pub fn save(&self, path: &Path, clobber: bool) -> Result<()> {
        if path.as_os_str().is_empty() {
            return Err(ClientError::BadParameterValue("path may not be empty".into()));
        }
        if path.exists() && !clobber {
            return Err(ClientError::ResourceExists(path.display().to_string()));
        }

        let mut out = Vec::new();
        for entry in &self.entries {
            out.extend_from_slice(BEGIN_ENTRY.as_bytes());
            out.extend_from_slice(b"\r\n");
            out.extend_from_slice(&entry.to_bytes());
            out.extend_from_slice(END_ENTRY.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        fs::write(path, out)?;
        Ok(())
    }

    /// Verifies the custody chain across all entries.
    pub fn verify(&self) -> Result<()> {
        if self.entries.is_empty() {
            return Err(ClientError::ResourceNotFound(
                "keycard contains no entries".into(),
            ));
        }
        for pair in self.entries.windows(2) {
            pair[1].verify_chain(&pair[0])?;
        }
        Ok(())
    }
}
