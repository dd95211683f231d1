//! Ordered beam of candidate phoneme sequences.
//!
//! The beam keeps `size` hypothesis slots. Each call to [`Beam::advance`]
//! takes one decoder step worth of log-probabilities (`[size, vocab]`),
//! expands every slot by every word, and prunes back to the best `size`
//! extensions in a single ranking pass.
//!
//! ```text
//! step t-1 slots      candidates (size × vocab)        step t slots
//!   k=0 ──┬── w=0 .. w=V-1 ──┐
//!   k=1 ──┼── w=0 .. w=V-1 ──┼── flatten, top-size ──→ (origin, word) per slot
//!   ...   ┘                  ┘
//! ```
//!
//! For a flattened candidate index `i`, the originating slot is `i / V` and
//! the emitted word is `i % V`. Origins are recorded as backpointers so the
//! caller can regather recurrent state and the best path can be rebuilt.
//!
//! The beam only ever sees token ids and scores; recurrent state belongs to
//! the generation driver.

use std::cmp::Ordering;

use candle_core::{DType, Tensor};

use crate::config::TokenIds;
use crate::{Error, Result};

/// Beam search state for one generation call.
#[derive(Debug, Clone)]
pub struct Beam {
    size: usize,
    tokens: TokenIds,
    /// Cumulative log-probability per slot, sorted descending after each step.
    scores: Vec<f32>,
    /// `backpointers[t][k]`: slot at step `t` that slot `k` at step `t + 1` extends.
    backpointers: Vec<Vec<u32>>,
    /// `outputs[t][k]`: token emitted by slot `k` at step `t`. `outputs[0]` is the seed.
    outputs: Vec<Vec<u32>>,
    done: bool,
}

impl Beam {
    /// Create a beam seeded with `[bos, pad, pad, ...]`.
    ///
    /// Only slot 0 is a live hypothesis before the first [`advance`](Self::advance).
    pub fn new(size: usize, tokens: TokenIds) -> Result<Self> {
        if size < 1 {
            return Err(Error::Config("beam size must be >= 1".into()));
        }
        let mut seed = vec![tokens.pad_id; size];
        seed[0] = tokens.bos_id;
        Ok(Self {
            size,
            tokens,
            scores: vec![0.0; size],
            backpointers: Vec::new(),
            outputs: vec![seed],
            done: false,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Cumulative scores of the current slots, best first.
    pub fn scores(&self) -> &[f32] {
        &self.scores
    }

    /// Number of completed `advance` calls.
    pub fn num_steps(&self) -> usize {
        self.backpointers.len()
    }

    /// Tokens to feed into the next decoder step, one per slot.
    pub fn current_state(&self) -> &[u32] {
        // `outputs` always holds at least the seed entry.
        &self.outputs[self.outputs.len() - 1]
    }

    /// Slot reindexing map produced by the last step, or `None` before the first step.
    pub fn current_origin(&self) -> Option<&[u32]> {
        self.backpointers.last().map(Vec::as_slice)
    }

    /// Advance the beam with a `[size, vocab]` matrix of log-probabilities.
    ///
    /// Returns `true` once the top-ranked slot emits EOS.
    pub fn advance(&mut self, log_probs: &Tensor) -> Result<bool> {
        let (rows, vocab) = log_probs.dims2()?;
        if rows != self.size {
            return Err(Error::Shape(format!(
                "beam of size {} got log-probs for {rows} slots",
                self.size
            )));
        }
        let log_probs = log_probs.to_dtype(DType::F32)?.to_vec2::<f32>()?;
        self.advance_rows(&log_probs, vocab)
    }

    fn advance_rows(&mut self, log_probs: &[Vec<f32>], vocab: usize) -> Result<bool> {
        if self.done {
            return Err(Error::Shape("advance called on a finished beam".into()));
        }
        if vocab == 0 {
            return Err(Error::Shape("empty vocabulary".into()));
        }

        // Before the first step only the BOS slot is real; padding rows are ignored.
        let candidates: Vec<f32> = if self.backpointers.is_empty() {
            log_probs[0].clone()
        } else {
            log_probs
                .iter()
                .zip(&self.scores)
                .flat_map(|(row, &score)| row.iter().map(move |&lp| lp + score))
                .collect()
        };
        if candidates.len() < self.size {
            return Err(Error::Shape(format!(
                "only {} candidates for a beam of size {}",
                candidates.len(),
                self.size
            )));
        }
        if let Some(flat) = candidates.iter().position(|s| s.is_nan()) {
            return Err(Error::Shape(format!(
                "NaN log-probability for slot {} word {}",
                flat / vocab,
                flat % vocab
            )));
        }

        let best = top_k(&candidates, self.size);

        let mut origins = Vec::with_capacity(self.size);
        let mut words = Vec::with_capacity(self.size);
        let mut scores = Vec::with_capacity(self.size);
        for &flat in &best {
            origins.push((flat / vocab) as u32);
            words.push((flat % vocab) as u32);
            scores.push(candidates[flat]);
        }

        self.done = words[0] == self.tokens.eos_id;
        tracing::trace!(
            step = self.backpointers.len(),
            top_word = words[0],
            top_score = scores[0],
            "beam advanced"
        );

        self.scores = scores;
        self.backpointers.push(origins);
        self.outputs.push(words);
        Ok(self.done)
    }

    /// Rebuild the token sequence ending at slot `k` of the last step.
    ///
    /// The seed token is not included.
    pub fn best_hypothesis(&self, k: usize) -> Result<Vec<u32>> {
        if self.backpointers.is_empty() {
            return Err(Error::Shape(
                "best_hypothesis called before the first step".into(),
            ));
        }
        if k >= self.size {
            return Err(Error::Shape(format!(
                "slot {k} out of range for beam of size {}",
                self.size
            )));
        }

        let mut hyp = Vec::with_capacity(self.backpointers.len());
        let mut k = k;
        for step in (0..self.backpointers.len()).rev() {
            hyp.push(self.outputs[step + 1][k]);
            k = self.backpointers[step][k] as usize;
        }
        hyp.reverse();
        Ok(hyp)
    }
}

/// Indices of the `k` largest values, descending; ties go to the lower index.
fn top_k(values: &[f32], k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    let by_score = |a: &usize, b: &usize| -> Ordering {
        values[*b].total_cmp(&values[*a]).then(a.cmp(b))
    };
    if k < order.len() {
        order.select_nth_unstable_by(k, by_score);
        order.truncate(k);
    }
    order.sort_unstable_by(by_score);
    order
}
