//! Attention decoder: one autoregressive step per call.

use candle_core::{D, Module, Tensor};
use candle_nn::{self as nn, VarBuilder};

use super::attention::DotAttention;
use super::cell::{EmbeddedCell, LstmState};
use crate::Result;

/// A single decoder step over all hypothesis slots at once.
///
/// - `tokens`: `[B]` token ids (u32), one per slot
/// - `state`: `[B, H]` hidden and cell state
/// - `context`: `[B, S, H]` encoder outputs, if attention is enabled
///
/// Returns `[B, vocab]` log-probabilities and the advanced state.
pub trait DecoderStep {
    fn vocab_size(&self) -> usize;

    fn step(
        &self,
        tokens: &Tensor,
        state: &LstmState,
        context: Option<&Tensor>,
    ) -> Result<(Tensor, LstmState)>;
}

/// Embedding + LSTM + dot attention + vocabulary projection.
#[derive(Debug, Clone)]
pub struct Decoder {
    cell: EmbeddedCell,
    attn: DotAttention,
    linear: nn::Linear,
    vocab_size: usize,
}

impl Decoder {
    pub fn new(vocab_size: usize, d_embed: usize, d_hidden: usize, vb: VarBuilder) -> Result<Self> {
        let cell = EmbeddedCell::new(vocab_size, d_embed, d_hidden, vb.clone())?;
        let attn = DotAttention::new(d_hidden, vb.pp("attn"))?;
        let linear = nn::linear(d_hidden, vocab_size, vb.pp("linear"))?;
        Ok(Self {
            cell,
            attn,
            linear,
            vocab_size,
        })
    }
}

impl DecoderStep for Decoder {
    fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    fn step(
        &self,
        tokens: &Tensor,
        state: &LstmState,
        context: Option<&Tensor>,
    ) -> Result<(Tensor, LstmState)> {
        let state = self.cell.step_tokens(tokens, state)?;
        let attended = self.attn.forward(&state.h, context)?;
        let logits = self.linear.forward(&attended)?;
        let log_probs = nn::ops::log_softmax(&logits, D::Minus1)?;
        Ok((log_probs, state))
    }
}
