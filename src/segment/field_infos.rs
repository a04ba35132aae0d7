//! Per-segment field table (`.fnm`)
//!
//! Maps field names to dense ordinals and records whether each field is
//! indexed. Ordinals are assigned in first-seen order and are what the
//! term dictionary, stored fields and norms files refer to.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{NautexError, Result};
use crate::store::{Directory, IndexInput, IndexOutput};

use super::segment_file;

const INDEXED: u8 = 0x01;

/// One field's entry in the table
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldInfo {
    pub name: String,
    pub ord: u32,
    pub indexed: bool,
}

impl FieldInfo {
    fn flags(&self) -> u8 {
        if self.indexed {
            INDEXED
        } else {
            0
        }
    }
}

/// The full table: ordinal-indexed entries plus a name lookup
#[derive(Clone, Debug, Default)]
pub struct FieldInfos {
    by_ord: Vec<FieldInfo>,
    by_name: HashMap<String, u32>,
}

impl FieldInfos {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a field, merging with an existing entry of the same name
    /// (a field indexed anywhere in the segment stays indexed)
    pub fn add(&mut self, name: &str, indexed: bool) -> u32 {
        if let Some(&ord) = self.by_name.get(name) {
            self.by_ord[ord as usize].indexed |= indexed;
            return ord;
        }
        let ord = self.by_ord.len() as u32;
        self.by_ord.push(FieldInfo {
            name: name.to_string(),
            ord,
            indexed,
        });
        self.by_name.insert(name.to_string(), ord);
        ord
    }

    pub fn ord(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).copied()
    }

    pub fn by_ord(&self, ord: u32) -> Option<&FieldInfo> {
        self.by_ord.get(ord as usize)
    }

    pub fn by_name(&self, name: &str) -> Option<&FieldInfo> {
        self.ord(name).and_then(|o| self.by_ord(o))
    }

    pub fn len(&self) -> usize {
        self.by_ord.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_ord.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldInfo> {
        self.by_ord.iter()
    }

    /// Write the `.fnm` file for `segment`
    pub fn write(&self, dir: &dyn Directory, segment: &str) -> Result<()> {
        let mut out = dir.create_output(&segment_file(segment, "fnm"))?;
        out.write_vint(self.by_ord.len() as u32)?;
        for info in &self.by_ord {
            out.write_string(&info.name)?;
            out.write_byte(info.flags())?;
        }
        out.finish()
    }

    /// Read the `.fnm` file for `segment`
    pub fn read(dir: &dyn Directory, segment: &str) -> Result<Arc<FieldInfos>> {
        let mut input = dir.open_input(&segment_file(segment, "fnm"))?;
        let count = input.read_vint()?;
        let mut infos = FieldInfos::new();
        for ord in 0..count {
            let name = input.read_string()?;
            let bits = input.read_byte()?;
            if infos.by_name.contains_key(&name) {
                return Err(NautexError::corrupt(format!(
                    "duplicate field '{name}' in field table"
                )));
            }
            infos.by_ord.push(FieldInfo {
                name: name.clone(),
                ord,
                indexed: bits & INDEXED != 0,
            });
            infos.by_name.insert(name, ord);
        }
        Ok(Arc::new(infos))
    }
}
