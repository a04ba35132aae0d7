//! Stored fields (`.fdx` / `.fdt`)
//!
//! `.fdx` holds one big-endian u64 per document pointing into `.fdt`,
//! which holds the stored field records. Retrieval is two seeks.

use std::sync::Arc;

use crate::document::{Document, Field, FieldValue};
use crate::error::{NautexError, Result};
use crate::store::{Directory, IndexInput, IndexOutput};

use super::field_infos::FieldInfos;
use super::segment_file;

const TOKENIZED: u8 = 0x01;
const BINARY: u8 = 0x02;

/// Writes stored fields doc by doc, in local id order
pub struct StoredFieldsWriter {
    fdt: Box<dyn IndexOutput>,
    fdx: Box<dyn IndexOutput>,
}

impl StoredFieldsWriter {
    pub fn new(dir: &dyn Directory, segment: &str) -> Result<Self> {
        Ok(Self {
            fdt: dir.create_output(&segment_file(segment, "fdt"))?,
            fdx: dir.create_output(&segment_file(segment, "fdx"))?,
        })
    }

    pub fn add_document(&mut self, doc: &Document, field_infos: &FieldInfos) -> Result<()> {
        self.fdx.write_u64(self.fdt.tell())?;

        let stored: Vec<&Field> = doc.fields().iter().filter(|f| f.stored).collect();
        self.fdt.write_vint(stored.len() as u32)?;
        for field in stored {
            let ord = field_infos.ord(&field.name).ok_or_else(|| {
                NautexError::invalid_argument(format!("unregistered field: {}", field.name))
            })?;
            self.fdt.write_vint(ord)?;

            let mut bits = 0;
            if field.tokenized {
                bits |= TOKENIZED;
            }
            if field.is_binary() {
                bits |= BINARY;
            }
            self.fdt.write_byte(bits)?;

            match &field.value {
                FieldValue::Text(text) => self.fdt.write_string(text)?,
                FieldValue::Binary(bytes) => {
                    self.fdt.write_vint(bytes.len() as u32)?;
                    self.fdt.write_bytes(bytes)?;
                }
            }
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        self.fdt.finish()?;
        self.fdx.finish()
    }
}

/// Random-access reader over the stored fields of one segment
pub struct StoredFieldsReader {
    fdt: Box<dyn IndexInput>,
    fdx: Box<dyn IndexInput>,
    field_infos: Arc<FieldInfos>,
    max_doc: u32,
}

impl StoredFieldsReader {
    pub fn open(
        dir: &dyn Directory,
        segment: &str,
        field_infos: Arc<FieldInfos>,
        max_doc: u32,
    ) -> Result<Self> {
        let fdx = dir.open_input(&segment_file(segment, "fdx"))?;
        if fdx.len() != max_doc as u64 * 8 {
            return Err(NautexError::corrupt(format!(
                "stored field index sized for {} docs, segment has {max_doc}",
                fdx.len() / 8
            )));
        }
        Ok(Self {
            fdt: dir.open_input(&segment_file(segment, "fdt"))?,
            fdx,
            field_infos,
            max_doc,
        })
    }

    /// Reconstruct the stored portion of document `n`
    pub fn document(&self, n: u32) -> Result<Document> {
        if n >= self.max_doc {
            return Err(NautexError::invalid_argument(format!(
                "document {n} out of range (max {})",
                self.max_doc
            )));
        }

        let mut fdx = self.fdx.clone_input()?;
        fdx.seek(n as u64 * 8)?;
        let offset = fdx.read_u64()?;

        let mut fdt = self.fdt.clone_input()?;
        fdt.seek(offset)?;

        let field_count = fdt.read_vint()?;
        let mut doc = Document::new();
        for _ in 0..field_count {
            let ord = fdt.read_vint()?;
            let info = self.field_infos.by_ord(ord).ok_or_else(|| {
                NautexError::corrupt(format!("stored field references unknown ordinal {ord}"))
            })?;
            let bits = fdt.read_byte()?;

            let (value, tokenized) = if bits & BINARY != 0 {
                let len = fdt.read_vint()? as usize;
                let mut bytes = vec![0u8; len];
                fdt.read_bytes(&mut bytes)?;
                (FieldValue::Binary(bytes), false)
            } else {
                (FieldValue::Text(fdt.read_string()?), bits & TOKENIZED != 0)
            };

            doc.add(Field {
                name: info.name.clone(),
                value,
                stored: true,
                indexed: info.indexed,
                tokenized,
                boost: 1.0,
            });
        }
        Ok(doc)
    }
}
