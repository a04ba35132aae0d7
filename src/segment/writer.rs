//! Flush path: one [`DocumentBuffer`] becomes one on-disk segment
//!
//! Writes the field table, stored fields, term dictionary, postings and
//! norms. Any failure unlinks the files written so far; the directory is
//! left as it was.

use tracing::info;

use crate::config::IndexConfig;
use crate::error::Result;
use crate::store::Directory;

use super::buffer::DocumentBuffer;
use super::infos::SegmentInfo;
use super::postings::PostingsWriter;
use super::stored::StoredFieldsWriter;
use super::term_dict::TermDictWriter;
use super::{norms, norms_file, segment_file};

/// Writer for a single new segment
pub struct SegmentWriter<'a> {
    dir: &'a dyn Directory,
    name: String,
    config: &'a IndexConfig,
}

impl<'a> SegmentWriter<'a> {
    pub fn new(dir: &'a dyn Directory, name: impl Into<String>, config: &'a IndexConfig) -> Self {
        Self {
            dir,
            name: name.into(),
            config,
        }
    }

    /// Write the buffer out as segment files and describe the result
    pub fn write(&self, buffer: &DocumentBuffer) -> Result<SegmentInfo> {
        match self.write_inner(buffer) {
            Ok(info) => {
                info!(
                    segment = %info.name,
                    docs = info.doc_count,
                    "flushed segment"
                );
                Ok(info)
            }
            Err(e) => {
                self.cleanup(buffer);
                Err(e)
            }
        }
    }

    fn write_inner(&self, buffer: &DocumentBuffer) -> Result<SegmentInfo> {
        let field_infos = buffer.field_infos();
        field_infos.write(self.dir, &self.name)?;

        let mut stored = StoredFieldsWriter::new(self.dir, &self.name)?;
        for doc in buffer.stored_docs() {
            stored.add_document(doc, field_infos)?;
        }
        stored.finish()?;

        let mut dict = TermDictWriter::new(
            self.dir,
            &self.name,
            self.config.term_index_interval,
            self.config.skip_interval,
        )?;
        let mut postings = PostingsWriter::new(self.dir, &self.name, self.config.skip_interval)?;

        // dictionary order: field ordinal, then term text
        for field in field_infos.iter() {
            if !field.indexed {
                continue;
            }
            let Some(by_term) = buffer.field_postings(&field.name) else {
                continue;
            };
            for (text, list) in by_term {
                postings.start_term();
                for (doc, positions) in &list.entries {
                    postings.add_posting(*doc, positions)?;
                }
                let info = postings.end_term()?;
                dict.add(field.ord, text, &info)?;
            }
        }
        postings.finish()?;
        dict.finish()?;

        for field in field_infos.iter() {
            if field.indexed {
                norms::write_norms(
                    self.dir,
                    &self.name,
                    field.ord,
                    &buffer.field_norms(&field.name),
                )?;
            }
        }

        Ok(SegmentInfo::new(self.name.clone(), buffer.doc_count()))
    }

    fn cleanup(&self, buffer: &DocumentBuffer) {
        for ext in ["fnm", "fdt", "fdx", "tis", "tii", "frq", "prx"] {
            let _ = self.dir.delete_file(&segment_file(&self.name, ext));
        }
        for ord in 0..buffer.field_infos().len() as u32 {
            let _ = self.dir.delete_file(&norms_file(&self.name, ord));
        }
    }
}
