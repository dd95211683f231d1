//! Grapheme encoder: an embedded LSTM run left to right over the input.

use candle_core::Tensor;
use candle_nn::VarBuilder;

use super::cell::{EmbeddedCell, LstmState};
use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct Encoder {
    cell: EmbeddedCell,
}

impl Encoder {
    pub fn new(vocab_size: usize, d_embed: usize, d_hidden: usize, vb: VarBuilder) -> Result<Self> {
        let cell = EmbeddedCell::new(vocab_size, d_embed, d_hidden, vb)?;
        Ok(Self { cell })
    }

    /// Encode a `[len, batch]` tensor of grapheme ids.
    ///
    /// Returns the per-step hidden states `[len, batch, H]` and the final state.
    pub fn forward(&self, input: &Tensor) -> Result<(Tensor, LstmState)> {
        let (len, batch) = input.dims2()?;
        if len == 0 {
            return Err(Error::Shape("cannot encode an empty sequence".into()));
        }

        let mut state = LstmState::zeros(batch, self.cell.hidden_size(), input.device())?;
        let mut outputs = Vec::with_capacity(len);
        for t in 0..len {
            let ids = input.get(t)?;
            state = self.cell.step_tokens(&ids, &state)?;
            outputs.push(state.h.clone());
        }
        Ok((Tensor::stack(&outputs, 0)?, state))
    }
}
