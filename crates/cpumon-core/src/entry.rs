//! Named signal entries and their JSON renderings.
//!
//! An entry pairs a signal name with a kind that selects how values and
//! schema type tags are written into the request body.

use std::fmt::Write as _;

use chrono::{DateTime, TimeZone, Utc};

use crate::value::Value;

/// Selects the value and type-tag rendering for an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Boolean,
    Signed,
    Double,
    Str,
    Datetime,
    /// The synthetic record identity: renders a timestamp's whole-second
    /// component as a zero-padded decimal string, with a `string` type tag.
    Identity,
}

impl EntryKind {
    /// Schema type tag for this kind.
    pub fn type_tag(&self) -> &'static str {
        match self {
            EntryKind::Boolean => "boolean",
            EntryKind::Signed => "integer",
            EntryKind::Double => "double",
            EntryKind::Str | EntryKind::Identity => "string",
            EntryKind::Datetime => "datetime",
        }
    }
}

/// A named, typed description of one signal.
#[derive(Debug, Clone)]
pub struct Entry {
    name: String,
    kind: EntryKind,
}

impl Entry {
    pub fn new(name: impl Into<String>, kind: EntryKind) -> Self {
        Self { name: name.into(), kind }
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, EntryKind::Boolean)
    }

    pub fn signed(name: impl Into<String>) -> Self {
        Self::new(name, EntryKind::Signed)
    }

    pub fn double(name: impl Into<String>) -> Self {
        Self::new(name, EntryKind::Double)
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, EntryKind::Str)
    }

    pub fn datetime(name: impl Into<String>) -> Self {
        Self::new(name, EntryKind::Datetime)
    }

    pub fn identity(name: impl Into<String>) -> Self {
        Self::new(name, EntryKind::Identity)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    /// Appends `"name": <value>` to the output, rendered per this entry's kind.
    pub fn format_value(&self, value: &Value, out: &mut String) {
        // Writing into a String cannot fail.
        let _ = match self.kind {
            EntryKind::Boolean => {
                write!(out, "\"{}\": {}", self.name, value.truth())
            }
            EntryKind::Signed => {
                write!(out, "\"{}\": {}", self.name, value.signed())
            }
            EntryKind::Double => {
                // Fixed six fractional digits, matching the ingestion
                // endpoint's established number format.
                write!(out, "\"{}\": {:.6}", self.name, value.double())
            }
            EntryKind::Str => {
                write!(out, "\"{}\": \"{}\"", self.name, value.text())
            }
            EntryKind::Datetime => {
                let stamp = value.stamp();
                let datetime: DateTime<Utc> = Utc
                    .timestamp_opt(stamp.secs, stamp.nanos)
                    .single()
                    .unwrap_or_default();
                write!(
                    out,
                    "\"{}\": \"{}\"",
                    self.name,
                    datetime.format("%Y-%m-%dT%H:%M:%S%.3fZ")
                )
            }
            EntryKind::Identity => {
                write!(out, "\"{}\": \"{:011}\"", self.name, value.stamp().secs)
            }
        };
    }

    /// Appends `"name": "<type tag>"` to the output.
    pub fn format_type(&self, out: &mut String) {
        let _ = write!(out, "\"{}\": \"{}\"", self.name, self.kind.type_tag());
    }
}
