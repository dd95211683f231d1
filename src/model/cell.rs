//! Recurrent cell shared by the encoder and decoder.
//!
//! [`LstmCell`] follows the PyTorch `nn.LSTMCell` parameter layout so that
//! exported state dicts load without renaming:
//!
//! ```text
//! gates = x·W_ihᵀ + b_ih + h·W_hhᵀ + b_hh      [B, 4H]  (i | f | g | o)
//! c'    = σ(f) ⊙ c + σ(i) ⊙ tanh(g)
//! h'    = σ(o) ⊙ tanh(c')
//! ```

use candle_core::{D, DType, Device, Module, Result, Tensor};
use candle_nn::{self as nn, VarBuilder};

/// Hidden and cell state, `[batch, d_hidden]` each.
#[derive(Debug, Clone)]
pub struct LstmState {
    pub h: Tensor,
    pub c: Tensor,
}

impl LstmState {
    pub fn new(h: Tensor, c: Tensor) -> Self {
        Self { h, c }
    }

    pub fn zeros(batch: usize, d_hidden: usize, device: &Device) -> Result<Self> {
        let h = Tensor::zeros((batch, d_hidden), DType::F32, device)?;
        let c = h.clone();
        Ok(Self { h, c })
    }

    pub fn batch_size(&self) -> Result<usize> {
        self.h.dim(0)
    }

    /// Replicate a batch-1 state into `batch` identical rows.
    pub fn expand(&self, batch: usize) -> Result<Self> {
        let (_, d_hidden) = self.h.dims2()?;
        Ok(Self {
            h: self.h.broadcast_as((batch, d_hidden))?.contiguous()?,
            c: self.c.broadcast_as((batch, d_hidden))?.contiguous()?,
        })
    }

    /// Gather rows along the batch dimension (`indices` is a u32 vector).
    pub fn index_select(&self, indices: &Tensor) -> Result<Self> {
        Ok(Self {
            h: self.h.index_select(indices, 0)?,
            c: self.c.index_select(indices, 0)?,
        })
    }
}

/// One step of a recurrent network over a `[batch, features]` input.
pub trait RecurrentCell {
    fn hidden_size(&self) -> usize;

    fn step(&self, input: &Tensor, state: &LstmState) -> Result<LstmState>;
}

/// LSTM cell with PyTorch weight naming (`weight_ih`, `weight_hh`, `bias_ih`, `bias_hh`).
#[derive(Debug, Clone)]
pub struct LstmCell {
    ih: nn::Linear,
    hh: nn::Linear,
    hidden_size: usize,
}

impl LstmCell {
    pub fn new(in_dim: usize, hidden_size: usize, vb: VarBuilder) -> Result<Self> {
        let gates = 4 * hidden_size;
        let w_ih = vb.get((gates, in_dim), "weight_ih")?;
        let w_hh = vb.get((gates, hidden_size), "weight_hh")?;
        let b_ih = vb.get(gates, "bias_ih")?;
        let b_hh = vb.get(gates, "bias_hh")?;
        Ok(Self {
            ih: nn::Linear::new(w_ih, Some(b_ih)),
            hh: nn::Linear::new(w_hh, Some(b_hh)),
            hidden_size,
        })
    }
}

impl RecurrentCell for LstmCell {
    fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    fn step(&self, input: &Tensor, state: &LstmState) -> Result<LstmState> {
        let gates = (self.ih.forward(input)? + self.hh.forward(&state.h)?)?;
        let chunks = gates.chunk(4, D::Minus1)?;
        let in_gate = nn::ops::sigmoid(&chunks[0])?;
        let forget_gate = nn::ops::sigmoid(&chunks[1])?;
        let cell_gate = chunks[2].tanh()?;
        let out_gate = nn::ops::sigmoid(&chunks[3])?;

        let c = ((forget_gate * &state.c)? + (in_gate * cell_gate)?)?;
        let h = (out_gate * c.tanh()?)?;
        Ok(LstmState { h, c })
    }
}

/// Token embedding feeding an LSTM cell. Encoder and decoder both use this.
#[derive(Debug, Clone)]
pub struct EmbeddedCell {
    embedding: nn::Embedding,
    lstm: LstmCell,
}

impl EmbeddedCell {
    /// Loads `embedding.weight` and `lstm.*` under `vb`.
    pub fn new(vocab_size: usize, d_embed: usize, d_hidden: usize, vb: VarBuilder) -> Result<Self> {
        let embedding = nn::embedding(vocab_size, d_embed, vb.pp("embedding"))?;
        let lstm = LstmCell::new(d_embed, d_hidden, vb.pp("lstm"))?;
        Ok(Self { embedding, lstm })
    }

    pub fn hidden_size(&self) -> usize {
        self.lstm.hidden_size()
    }

    /// Embed `[batch]` token ids and advance the cell once.
    pub fn step_tokens(&self, ids: &Tensor, state: &LstmState) -> Result<LstmState> {
        let e = self.embedding.forward(ids)?;
        self.lstm.step(&e, state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_weights_halve_cell_state() {
        let dev = Device::Cpu;
        let vb = VarBuilder::zeros(DType::F32, &dev);
        let cell = LstmCell::new(3, 4, vb.pp("lstm")).unwrap();
        let x = Tensor::randn(0f32, 1.0, (2, 3), &dev).unwrap();
        let state = LstmState::new(
            Tensor::zeros((2, 4), DType::F32, &dev).unwrap(),
            Tensor::ones((2, 4), DType::F32, &dev).unwrap(),
        );
        // All gates are σ(0) = 0.5 and g = tanh(0) = 0.
        let next = cell.step(&x, &state).unwrap();
        let c: Vec<Vec<f32>> = next.c.to_vec2().unwrap();
        let h: Vec<Vec<f32>> = next.h.to_vec2().unwrap();
        let expected_h = 0.5 * 0.5f32.tanh();
        for row in 0..2 {
            for col in 0..4 {
                assert!((c[row][col] - 0.5).abs() < 1e-6);
                assert!((h[row][col] - expected_h).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_gate_order_is_input_forget_cell_output() {
        let dev = Device::Cpu;
        let tensors = std::collections::HashMap::from([
            ("weight_ih".to_string(), Tensor::zeros((4, 1), DType::F32, &dev).unwrap()),
            ("weight_hh".to_string(), Tensor::zeros((4, 1), DType::F32, &dev).unwrap()),
            ("bias_ih".to_string(), Tensor::new(&[1f32, -1.0, 0.5, 2.0], &dev).unwrap()),
            ("bias_hh".to_string(), Tensor::zeros(4, DType::F32, &dev).unwrap()),
        ]);
        let vb = VarBuilder::from_tensors(tensors, DType::F32, &dev);
        let cell = LstmCell::new(1, 1, vb).unwrap();

        let x = Tensor::zeros((1, 1), DType::F32, &dev).unwrap();
        let state = LstmState::new(
            Tensor::zeros((1, 1), DType::F32, &dev).unwrap(),
            Tensor::new(&[[2f32]], &dev).unwrap(),
        );
        let next = cell.step(&x, &state).unwrap();

        let sigmoid = |v: f32| 1.0 / (1.0 + (-v).exp());
        let expected_c = sigmoid(-1.0) * 2.0 + sigmoid(1.0) * 0.5f32.tanh();
        let expected_h = sigmoid(2.0) * expected_c.tanh();
        let c = next.c.to_vec2::<f32>().unwrap()[0][0];
        let h = next.h.to_vec2::<f32>().unwrap()[0][0];
        assert!((c - expected_c).abs() < 1e-5, "c' = {c}, expected {expected_c}");
        assert!((h - expected_h).abs() < 1e-5, "h' = {h}, expected {expected_h}");
    }

    #[test]
    fn test_embedded_cell_shape() {
        let dev = Device::Cpu;
        let vb = VarBuilder::zeros(DType::F32, &dev);
        let cell = EmbeddedCell::new(10, 6, 8, vb.pp("encoder")).unwrap();
        let ids = Tensor::new(&[1u32, 4, 9], &dev).unwrap();
        let state = LstmState::zeros(3, 8, &dev).unwrap();
        let next = cell.step_tokens(&ids, &state).unwrap();
        assert_eq!(next.h.dims(), &[3, 8]);
        assert_eq!(next.c.dims(), &[3, 8]);
        assert_eq!(cell.hidden_size(), 8);
    }

    #[test]
    fn test_expand_and_index_select() {
        let dev = Device::Cpu;
        let h = Tensor::new(&[[1f32, 2.0]], &dev).unwrap();
        let c = Tensor::new(&[[3f32, 4.0]], &dev).unwrap();
        let state = LstmState::new(h, c).expand(3).unwrap();
        assert_eq!(state.batch_size().unwrap(), 3);
        assert_eq!(
            state.h.to_vec2::<f32>().unwrap(),
            vec![vec![1.0, 2.0]; 3]
        );

        let h = Tensor::new(&[[0f32], [10.0], [20.0]], &dev).unwrap();
        let state = LstmState::new(h.clone(), h);
        let idx = Tensor::new(&[2u32, 2, 0], &dev).unwrap();
        let gathered = state.index_select(&idx).unwrap();
        assert_eq!(
            gathered.h.to_vec2::<f32>().unwrap(),
            vec![vec![20.0], vec![20.0], vec![0.0]]
        );
        assert_eq!(gathered.c.to_vec2::<f32>().unwrap(), gathered.h.to_vec2::<f32>().unwrap());
    }
}
