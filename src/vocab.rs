//! Symbol tables for graphemes and phonemes.
//!
//! A vocabulary file is a JSON array of symbols in id order, e.g.
//! `["<unk>", "<pad>", "<s>", "</s>", "a", "b", ...]`. Id 0 is the unknown
//! symbol; the reserved pad/bos/eos ids come from [`TokenIds`].

use std::collections::HashMap;
use std::path::Path;

use crate::config::TokenIds;
use crate::{Error, Result};

/// Id of the unknown symbol.
pub const UNK_ID: u32 = 0;

#[derive(Debug, Clone)]
pub struct Vocab {
    symbols: Vec<String>,
    ids: HashMap<String, u32>,
}

impl Vocab {
    pub fn new(symbols: Vec<String>) -> Result<Self> {
        if symbols.is_empty() {
            return Err(Error::Vocab("vocabulary is empty".into()));
        }
        let mut ids = HashMap::with_capacity(symbols.len());
        for (id, symbol) in symbols.iter().enumerate() {
            if ids.insert(symbol.clone(), id as u32).is_some() {
                return Err(Error::Vocab(format!("duplicate symbol {symbol:?}")));
            }
        }
        Ok(Self { symbols, ids })
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let symbols: Vec<String> = serde_json::from_str(&text)?;
        Self::new(symbols)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Fail unless the table has exactly `expected` symbols.
    pub fn check_size(&self, expected: usize, what: &str) -> Result<()> {
        if self.len() != expected {
            return Err(Error::Vocab(format!(
                "{what} vocabulary has {} symbols, model expects {expected}",
                self.len()
            )));
        }
        Ok(())
    }

    pub fn id(&self, symbol: &str) -> u32 {
        self.ids.get(symbol).copied().unwrap_or(UNK_ID)
    }

    pub fn symbol(&self, id: u32) -> Option<&str> {
        self.symbols.get(id as usize).map(String::as_str)
    }

    /// One id per character of `word`.
    pub fn encode_chars(&self, word: &str) -> Vec<u32> {
        let mut buf = [0u8; 4];
        word.chars()
            .map(|ch| self.id(ch.encode_utf8(&mut buf)))
            .collect()
    }

    /// Symbols for `ids` up to the first EOS, skipping pad and bos.
    pub fn decode(&self, ids: &[u32], tokens: &TokenIds) -> Vec<&str> {
        ids.iter()
            .take_while(|&&id| id != tokens.eos_id)
            .filter(|&&id| id != tokens.pad_id && id != tokens.bos_id)
            .filter_map(|&id| self.symbol(id))
            .collect()
    }
}
