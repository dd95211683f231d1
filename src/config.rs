//! Configuration for the G2P model and beam search.
//!
//! Loaded from JSON; every field except the two vocabulary sizes has a
//! default matching the published g2p-seq2seq hyperparameters.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Reserved token ids shared by the phoneme vocabulary and the beam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenIds {
    #[serde(default = "default_pad_id")]
    pub pad_id: u32,
    #[serde(default = "default_bos_id")]
    pub bos_id: u32,
    #[serde(default = "default_eos_id")]
    pub eos_id: u32,
}

impl Default for TokenIds {
    fn default() -> Self {
        Self {
            pad_id: default_pad_id(),
            bos_id: default_bos_id(),
            eos_id: default_eos_id(),
        }
    }
}

/// Model + search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct G2pConfig {
    /// Number of parallel hypotheses kept by the beam.
    #[serde(default = "default_beam_size")]
    pub beam_size: usize,

    /// Maximum number of decoder steps per generation call.
    #[serde(default = "default_max_len")]
    pub max_len: usize,

    /// Embedding width (encoder and decoder).
    #[serde(default = "default_d_embed")]
    pub d_embed: usize,

    /// LSTM hidden/cell width (encoder and decoder).
    #[serde(default = "default_d_hidden")]
    pub d_hidden: usize,

    /// Use dot attention over the encoder outputs.
    #[serde(default = "default_attention")]
    pub attention: bool,

    /// Grapheme vocabulary size.
    pub g_size: usize,

    /// Phoneme vocabulary size.
    pub p_size: usize,

    /// Run on the first CUDA device when one is available.
    #[serde(default)]
    pub cuda: bool,

    #[serde(default)]
    pub tokens: TokenIds,
}

impl G2pConfig {
    /// Config with default hyperparameters for the given vocabulary sizes.
    pub fn new(g_size: usize, p_size: usize) -> Self {
        Self {
            beam_size: default_beam_size(),
            max_len: default_max_len(),
            d_embed: default_d_embed(),
            d_hidden: default_d_hidden(),
            attention: default_attention(),
            g_size,
            p_size,
            cuda: false,
            tokens: TokenIds::default(),
        }
    }

    /// Read and validate a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that could never produce a valid search.
    pub fn validate(&self) -> Result<()> {
        if self.beam_size < 1 {
            return Err(Error::Config("beam_size must be >= 1".into()));
        }
        if self.max_len < 1 {
            return Err(Error::Config("max_len must be >= 1".into()));
        }
        if self.d_embed == 0 || self.d_hidden == 0 {
            return Err(Error::Config(format!(
                "d_embed and d_hidden must be non-zero, got {} and {}",
                self.d_embed, self.d_hidden
            )));
        }
        if self.g_size == 0 || self.p_size == 0 {
            return Err(Error::Config(format!(
                "vocabulary sizes must be non-zero, got g_size={} p_size={}",
                self.g_size, self.p_size
            )));
        }
        let TokenIds {
            pad_id,
            bos_id,
            eos_id,
        } = self.tokens;
        for (name, id) in [("pad_id", pad_id), ("bos_id", bos_id), ("eos_id", eos_id)] {
            if id as usize >= self.p_size {
                return Err(Error::Config(format!(
                    "{name}={id} is outside the phoneme vocabulary (p_size={})",
                    self.p_size
                )));
            }
        }
        // The first expansion only sees row 0, so it yields at most p_size candidates.
        if self.beam_size > self.p_size {
            return Err(Error::Config(format!(
                "beam_size={} exceeds p_size={}",
                self.beam_size, self.p_size
            )));
        }
        Ok(())
    }
}

fn default_pad_id() -> u32 {
    1
}
fn default_bos_id() -> u32 {
    2
}
fn default_eos_id() -> u32 {
    3
}
fn default_beam_size() -> usize {
    3
}
fn default_max_len() -> usize {
    20
}
fn default_d_embed() -> usize {
    500
}
fn default_d_hidden() -> usize {
    500
}
fn default_attention() -> bool {
    true
}
