//! Per-migration metadata exchanged between the two coordinators.
//!
//! The orchestration layer carries [`MigrationMetadata`] from one host to the
//! other, usually as JSON. The wire form is a flat object:
//!
//! ```json
//! {
//!   "public_key": "ssh-rsa AAAA...",
//!   "dest_sys_name": "HV5",
//!   "dest_ip": "10.0.0.5",
//!   "dest_user_id": "neo",
//!   "dest_proc_compat": "default,POWER7,POWER8",
//!   "vscsi_lpm_mappings": "...",
//!   "vfc_lpm_mappings": {"fabric_a": ["c05076079cff0e56"]}
//! }
//! ```
//!
//! Keys other than `public_key` and `dest_*` belong to volume participants.
//! Their values may be any JSON and are opaque to the coordinators.

use std::collections::BTreeMap;

use livemig_hypervisor::DestinationIdentity;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

const PUBLIC_KEY: &str = "public_key";
const DEST_PREFIX: &str = "dest_";

/// Errors raised while building or decoding metadata.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// JSON encoding or decoding failed.
    #[error("invalid metadata JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A participant tried to write a coordinator-owned key.
    #[error("metadata key '{0}' is reserved")]
    ReservedKey(String),
}

/// Processor compatibility modes supported by a destination host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcCompatModes(Vec<String>);

impl ProcCompatModes {
    /// Parses a comma-separated list. Tokens are trimmed and empty tokens
    /// dropped; a list with no tokens does not parse.
    #[must_use]
    pub fn parse(list: &str) -> Option<Self> {
        let modes: Vec<String> = list
            .split(',')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .collect();
        if modes.is_empty() {
            None
        } else {
            Some(Self(modes))
        }
    }

    /// Builds the set from a host's reported modes.
    #[must_use]
    pub fn from_modes<I, S>(modes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(modes.into_iter().map(Into::into).collect())
    }

    /// Returns true if `mode` is one of the supported modes.
    #[must_use]
    pub fn contains(&self, mode: &str) -> bool {
        self.0.iter().any(|m| m == mode)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl std::fmt::Display for ProcCompatModes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join(","))
    }
}

/// Destination identity and compatibility data.
///
/// Read-only once built: there are no setters, and [`MigrationMetadata`]
/// only accepts it at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationData {
    #[serde(rename = "dest_sys_name")]
    sys_name: String,
    #[serde(rename = "dest_ip")]
    ip: String,
    #[serde(rename = "dest_user_id", default)]
    user_id: Option<String>,
    #[serde(rename = "dest_proc_compat", default)]
    proc_compat: Option<String>,
}

impl DestinationData {
    /// Creates destination data. `proc_compat` is the raw comma-separated
    /// list as advertised by the destination.
    #[must_use]
    pub fn new(
        sys_name: impl Into<String>,
        ip: impl Into<String>,
        user_id: Option<String>,
        proc_compat: Option<String>,
    ) -> Self {
        Self {
            sys_name: sys_name.into(),
            ip: ip.into(),
            user_id,
            proc_compat,
        }
    }

    #[must_use]
    pub fn sys_name(&self) -> &str {
        &self.sys_name
    }

    #[must_use]
    pub fn ip(&self) -> &str {
        &self.ip
    }

    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Raw `dest_proc_compat` value.
    #[must_use]
    pub fn proc_compat(&self) -> Option<&str> {
        self.proc_compat.as_deref()
    }

    /// Parsed `dest_proc_compat`, `None` if absent or unparseable.
    #[must_use]
    pub fn proc_compat_modes(&self) -> Option<ProcCompatModes> {
        self.proc_compat.as_deref().and_then(ProcCompatModes::parse)
    }

    /// Target for the hypervisor's migrate job.
    #[must_use]
    pub fn identity(&self) -> DestinationIdentity {
        DestinationIdentity {
            sys_name: self.sys_name.clone(),
            ip: self.ip.clone(),
            user_id: self.user_id.clone(),
        }
    }
}

/// Metadata for one migration attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationMetadata {
    #[serde(default)]
    public_key: Option<String>,
    #[serde(flatten)]
    destination: Option<DestinationData>,
    #[serde(flatten)]
    volume_keys: BTreeMap<String, Value>,
}

impl MigrationMetadata {
    /// Creates empty metadata.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates metadata carrying the destination's data.
    #[must_use]
    pub fn with_destination(destination: DestinationData) -> Self {
        Self {
            destination: Some(destination),
            ..Self::default()
        }
    }

    /// Creates the source-side migrate data with the transfer's public key.
    #[must_use]
    pub fn with_public_key(public_key: Option<String>) -> Self {
        Self {
            public_key,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn public_key(&self) -> Option<&str> {
        self.public_key.as_deref()
    }

    #[must_use]
    pub fn destination(&self) -> Option<&DestinationData> {
        self.destination.as_ref()
    }

    /// Reads a participant-owned key.
    #[must_use]
    pub fn volume_key(&self, key: &str) -> Option<&Value> {
        self.volume_keys.get(key)
    }

    /// Reads a participant-owned key holding a string.
    #[must_use]
    pub fn volume_str(&self, key: &str) -> Option<&str> {
        self.volume_keys.get(key).and_then(Value::as_str)
    }

    /// Writes a participant-owned key, returning the previous value.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::ReservedKey`] for `public_key` and `dest_*`.
    pub fn set_volume_key(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Option<Value>, MetadataError> {
        let key = key.into();
        if key == PUBLIC_KEY || key.starts_with(DEST_PREFIX) {
            return Err(MetadataError::ReservedKey(key));
        }
        Ok(self.volume_keys.insert(key, value.into()))
    }

    /// Iterates participant-owned keys in key order.
    pub fn volume_keys(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.volume_keys.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Encodes the wire form.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn to_json(&self) -> Result<String, MetadataError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decodes the wire form.
    ///
    /// # Errors
    ///
    /// Returns an error if `json` is not a valid metadata object.
    pub fn from_json(json: &str) -> Result<Self, MetadataError> {
        Ok(serde_json::from_str(json)?)
    }
}
