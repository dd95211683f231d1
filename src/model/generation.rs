//! Beam-search generation loop.
//!
//! Drives a [`DecoderStep`] with a [`Beam`] for at most `max_len` steps:
//!
//! 1. feed `beam.current_state()` through the decoder
//! 2. `beam.advance(log_probs)`; stop as soon as the top slot emits EOS
//! 3. regather hidden/cell rows with `beam.current_origin()` so each slot
//!    carries the state of the hypothesis it now extends
//!
//! When `max_len` runs out first, the best partial hypothesis is returned.

use candle_core::Tensor;

use super::cell::LstmState;
use super::decoder::DecoderStep;
use crate::beam::Beam;
use crate::config::TokenIds;
use crate::{Error, Result};

/// Search parameters for one generation call.
#[derive(Debug, Clone, Copy)]
pub struct SearchParams {
    pub beam_size: usize,
    pub max_len: usize,
    pub tokens: TokenIds,
}

impl From<&crate::config::G2pConfig> for SearchParams {
    fn from(cfg: &crate::config::G2pConfig) -> Self {
        Self {
            beam_size: cfg.beam_size,
            max_len: cfg.max_len,
            tokens: cfg.tokens,
        }
    }
}

/// Result of a beam search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutput {
    /// Best hypothesis, BOS excluded. Ends with EOS when `finished`.
    pub tokens: Vec<u32>,
    /// Cumulative log-probability of `tokens`.
    pub score: f32,
    /// Decoder steps taken.
    pub steps: usize,
    /// Whether EOS reached the top of the beam before `max_len`.
    pub finished: bool,
}

/// Run beam search from a batch-1 decoder state.
///
/// - `init`: final encoder state, `[1, H]` each
/// - `context`: encoder outputs `[1, S, H]`, or `None` without attention
pub fn beam_search<M: DecoderStep>(
    decoder: &M,
    init: &LstmState,
    context: Option<&Tensor>,
    params: &SearchParams,
) -> Result<SearchOutput> {
    if params.max_len < 1 {
        return Err(Error::Config("max_len must be >= 1".into()));
    }
    let init_batch = init.batch_size()?;
    if init_batch != 1 {
        return Err(Error::Shape(format!(
            "generation needs batch size 1, got {init_batch}"
        )));
    }

    let mut beam = Beam::new(params.beam_size, params.tokens)?;
    let size = beam.size();
    let device = init.h.device().clone();
    let vocab_size = decoder.vocab_size();

    let mut state = init.expand(size)?;
    let context = match context {
        Some(ctx) => {
            let (ctx_batch, src_len, d_hidden) = ctx.dims3()?;
            if ctx_batch != 1 {
                return Err(Error::Shape(format!(
                    "generation needs context batch size 1, got {ctx_batch}"
                )));
            }
            Some(ctx.broadcast_as((size, src_len, d_hidden))?.contiguous()?)
        }
        None => None,
    };

    for _ in 0..params.max_len {
        let tokens = Tensor::new(beam.current_state(), &device)?;
        let (log_probs, next) = decoder.step(&tokens, &state, context.as_ref())?;
        let (_, width) = log_probs.dims2()?;
        if width != vocab_size {
            return Err(Error::Shape(format!(
                "decoder produced {width} log-probs per slot, vocabulary has {vocab_size}"
            )));
        }
        if beam.advance(&log_probs)? {
            break;
        }
        let Some(origin) = beam.current_origin() else {
            return Err(Error::Shape("beam advanced without a backpointer".into()));
        };
        let origin = Tensor::new(origin, &device)?;
        state = next.index_select(&origin)?;
    }

    let output = SearchOutput {
        tokens: beam.best_hypothesis(0)?,
        score: beam.scores()[0],
        steps: beam.num_steps(),
        finished: beam.is_done(),
    };
    tracing::debug!(
        steps = output.steps,
        score = output.score,
        finished = output.finished,
        "beam search complete"
    );
    Ok(output)
}
