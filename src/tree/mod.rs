//! Hierarchical key/value tree used as the unit of configuration.
//!
//! A tree is an ordered collection of uniquely named children, each either a
//! scalar option or a nested section. The textual form is:
//!
//! ```text
//! DIRAC
//! {
//!   Setup = Production
//!   Configuration
//!   {
//!     Servers = dips://cs1:9135/Configuration/Server, dips://cs2:9135/Configuration/Server
//!   }
//! }
//! ```
mod parser;

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use indexmap::map::Entry as MapEntry;
use indexmap::IndexMap;

use crate::CodecError;
use crate::Result;
use crate::StorageError;

const INDENT: &str = "  ";

/// Characters that would be read back as structure by the parser
const RESERVED: [char; 4] = ['=', '{', '}', '/'];

/// Whether `name` can label a section or an option and survive a
/// serialize/parse round trip.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.trim() == name
        && !name.starts_with('#')
        && !name.contains(|c: char| c == '\n' || c == '\r' || RESERVED.contains(&c))
}

/// Whether `value` fits on a single line. Surrounding blanks are trimmed
/// when stored.
pub fn is_valid_value(value: &str) -> bool {
    !value.contains(|c: char| c == '\n' || c == '\r')
}

/// One child of a [`ConfigTree`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Value(String),
    Section(ConfigTree),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigTree {
    children: IndexMap<String, Entry>,
}

impl ConfigTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the textual tree format.
    pub fn parse(text: &str) -> Result<Self> {
        parser::parse(text)
    }

    pub fn load_from_buffer(buf: &[u8]) -> Result<Self> {
        let text = String::from_utf8(buf.to_vec()).map_err(CodecError::Utf8)?;
        Self::parse(&text)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let buf = fs::read(path).map_err(|e| StorageError::PathError {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::load_from_buffer(&buf)
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn get(
        &self,
        name: &str,
    ) -> Option<&Entry> {
        self.children.get(name)
    }

    pub fn section(
        &self,
        name: &str,
    ) -> Option<&ConfigTree> {
        match self.children.get(name) {
            Some(Entry::Section(section)) => Some(section),
            _ => None,
        }
    }

    pub fn section_mut(
        &mut self,
        name: &str,
    ) -> Option<&mut ConfigTree> {
        match self.children.get_mut(name) {
            Some(Entry::Section(section)) => Some(section),
            _ => None,
        }
    }

    pub fn option(
        &self,
        name: &str,
    ) -> Option<&str> {
        match self.children.get(name) {
            Some(Entry::Value(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn list_sections(&self) -> Vec<String> {
        self.children
            .iter()
            .filter(|(_, entry)| matches!(entry, Entry::Section(_)))
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn list_options(&self) -> Vec<String> {
        self.children
            .iter()
            .filter(|(_, entry)| matches!(entry, Entry::Value(_)))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Returns the child section `name`, creating it when absent.
    ///
    /// Returns `None` when `name` is already taken by an option or is not a
    /// valid name.
    pub fn create_new_section(
        &mut self,
        name: &str,
    ) -> Option<&mut ConfigTree> {
        if !is_valid_name(name) {
            return None;
        }
        let entry = self
            .children
            .entry(name.to_string())
            .or_insert_with(|| Entry::Section(ConfigTree::new()));
        match entry {
            Entry::Section(section) => Some(section),
            Entry::Value(_) => None,
        }
    }

    /// Sets option `name`, replacing whatever child held that name.
    ///
    /// Leaves the tree untouched and returns `false` when the name or the
    /// value could not be written back as text.
    pub fn set_option(
        &mut self,
        name: &str,
        value: impl Into<String>,
    ) -> bool {
        let value = value.into();
        if !is_valid_name(name) || !is_valid_value(&value) {
            return false;
        }
        self.children
            .insert(name.to_string(), Entry::Value(value.trim().to_string()));
        true
    }

    /// Appends `value` to option `name` as a comma separated item.
    pub fn append_option(
        &mut self,
        name: &str,
        value: &str,
    ) -> bool {
        if !is_valid_value(value) {
            return false;
        }
        match self.children.get_mut(name) {
            Some(Entry::Value(current)) if !current.is_empty() => {
                let value = value.trim();
                if !value.is_empty() {
                    current.push_str(", ");
                    current.push_str(value);
                }
                true
            }
            _ => self.set_option(name, value),
        }
    }

    pub fn insert_section(
        &mut self,
        name: &str,
        section: ConfigTree,
    ) -> bool {
        if !is_valid_name(name) {
            return false;
        }
        self.children.insert(name.to_string(), Entry::Section(section));
        true
    }

    /// Removes child `name`, returning it.
    pub fn delete(
        &mut self,
        name: &str,
    ) -> Option<Entry> {
        self.children.shift_remove(name)
    }

    /// Returns a new tree holding the union of `self` and `other`.
    ///
    /// Sections present on both sides merge recursively; for any other clash
    /// the child from `other` wins.
    pub fn merge_with(
        &self,
        other: &ConfigTree,
    ) -> ConfigTree {
        let mut merged = self.clone();
        merged.merge_in_place(other);
        merged
    }

    pub(crate) fn merge_in_place(
        &mut self,
        other: &ConfigTree,
    ) {
        for (name, theirs) in &other.children {
            match self.children.entry(name.clone()) {
                MapEntry::Occupied(mut slot) => match (slot.get_mut(), theirs) {
                    (Entry::Section(ours), Entry::Section(theirs)) => ours.merge_in_place(theirs),
                    (ours, theirs) => *ours = theirs.clone(),
                },
                MapEntry::Vacant(slot) => {
                    slot.insert(theirs.clone());
                }
            }
        }
    }

    fn write_indented(
        &self,
        f: &mut fmt::Formatter<'_>,
        depth: usize,
    ) -> fmt::Result {
        let pad = INDENT.repeat(depth);
        for (name, entry) in &self.children {
            match entry {
                Entry::Value(value) if value.is_empty() => writeln!(f, "{pad}{name} =")?,
                Entry::Value(value) => writeln!(f, "{pad}{name} = {value}")?,
                Entry::Section(section) => {
                    writeln!(f, "{pad}{name}")?;
                    writeln!(f, "{pad}{{")?;
                    section.write_indented(f, depth + 1)?;
                    writeln!(f, "{pad}}}")?;
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for ConfigTree {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        self.write_indented(f, 0)
    }
}

impl FromStr for ConfigTree {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
