//! Wildcard query: `*` matches any run of characters, `?` exactly one

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{NautexError, Result};
use crate::search::Snapshot;
use crate::segment::Term;

use super::{field_terms, MultiTermQuery, Occur, Query, TermQuery, MAX_CLAUSE_COUNT};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WildcardQuery {
    /// `term.text` is the pattern
    pub term: Term,
    pub boost: f32,
}

impl WildcardQuery {
    pub fn new(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            term: Term::new(field, pattern),
            boost: 1.0,
        }
    }

    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    pub(crate) fn rewrite(&self, snapshot: &Snapshot) -> Result<Query> {
        let pattern = &self.term.text;
        if !pattern.contains(['*', '?']) {
            return Ok(Query::Term(
                TermQuery::for_term(self.term.clone()).with_boost(self.boost),
            ));
        }

        // everything before the first wildcard narrows the dictionary scan
        let prefix: String = pattern
            .chars()
            .take_while(|c| *c != '*' && *c != '?')
            .collect();
        let regex = compile(pattern)?;

        let mut cursor = field_terms(snapshot, &self.term.field, &prefix);
        let mut expanded = MultiTermQuery::new().with_boost(self.boost);
        while let Some((term, _)) = cursor.next()? {
            if term.field != self.term.field || !term.text.starts_with(prefix.as_str()) {
                break;
            }
            if regex.is_match(&term.text) {
                if expanded.len() >= MAX_CLAUSE_COUNT {
                    return Err(NautexError::invalid_argument(format!(
                        "wildcard '{}' expands past {MAX_CLAUSE_COUNT} terms",
                        self.term
                    )));
                }
                expanded = expanded.add(term, Occur::Should);
            }
        }
        Ok(Query::MultiTerm(expanded))
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    let mut re = String::with_capacity(pattern.len() + 8);
    re.push('^');
    for c in pattern.chars() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re)
        .map_err(|e| NautexError::query_parse(format!("bad wildcard pattern '{pattern}': {e}")))
}
