//! Dot-product global attention (Luong et al., 2015).
//!
//! ```text
//! a   = softmax_over_src(context · q)        [B, S]
//! ctx = aᵀ · context                          [B, D]
//! out = tanh(W · [q ; ctx])                   [B, D]
//! ```

use candle_core::{Module, Tensor};
use candle_nn::{self as nn, VarBuilder};

use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct DotAttention {
    linear: nn::Linear,
}

impl DotAttention {
    /// Loads `linear.weight` (`[dim, 2·dim]`, no bias).
    pub fn new(dim: usize, vb: VarBuilder) -> Result<Self> {
        let linear = nn::linear_no_bias(dim * 2, dim, vb.pp("linear"))?;
        Ok(Self { linear })
    }

    /// Attend over `context` with `query`.
    ///
    /// - `query`: `[B, D]` decoder hidden state
    /// - `context`: `[B, S, D]` encoder outputs, or `None` to pass the query through
    ///
    /// Returns `[B, D]`.
    pub fn forward(&self, query: &Tensor, context: Option<&Tensor>) -> Result<Tensor> {
        let Some(context) = context else {
            return Ok(query.clone());
        };
        let (batch, dim) = query.dims2()?;
        let (ctx_batch, _src_len, ctx_dim) = context.dims3()?;
        if batch != ctx_batch {
            return Err(Error::Shape(format!(
                "attention query batch {batch} != context batch {ctx_batch}"
            )));
        }
        if dim != ctx_dim {
            return Err(Error::Shape(format!(
                "attention query width {dim} != context width {ctx_dim}"
            )));
        }

        // [B, S, D] x [B, D, 1] -> [B, S]
        let scores = context.matmul(&query.unsqueeze(2)?)?.squeeze(2)?;
        // Normalize over source positions.
        let weights = nn::ops::softmax(&scores, 1)?;
        // [B, 1, S] x [B, S, D] -> [B, D]
        let weighted = weights.unsqueeze(1)?.matmul(context)?.squeeze(1)?;

        let fused = Tensor::cat(&[query, &weighted], 1)?;
        Ok(self.linear.forward(&fused)?.tanh()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};

    #[test]
    fn test_no_context_returns_query() {
        let dev = Device::Cpu;
        let attn = DotAttention::new(4, VarBuilder::zeros(DType::F32, &dev)).unwrap();
        let q = Tensor::randn(0f32, 1.0, (2, 4), &dev).unwrap();
        let out = attn.forward(&q, None).unwrap();
        assert_eq!(out.to_vec2::<f32>().unwrap(), q.to_vec2::<f32>().unwrap());
    }

    #[test]
    fn test_attention_shape() {
        let dev = Device::Cpu;
        let attn = DotAttention::new(8, VarBuilder::zeros(DType::F32, &dev)).unwrap();
        let q = Tensor::randn(0f32, 1.0, (3, 8), &dev).unwrap();
        let ctx = Tensor::randn(0f32, 1.0, (3, 5, 8), &dev).unwrap();
        let out = attn.forward(&q, Some(&ctx)).unwrap();
        assert_eq!(out.dims(), &[3, 8]);
    }

    #[test]
    fn test_weights_pick_matching_position() {
        let dev = Device::Cpu;
        // W = [0 | I]: output is tanh(weighted context).
        let mut w = vec![0f32; 2 * 4];
        w[2] = 1.0; // row 0, col 2
        w[7] = 1.0; // row 1, col 3
        let linear = nn::Linear::new(Tensor::from_vec(w, (2, 4), &dev).unwrap(), None);
        let attn = DotAttention { linear };

        let q = Tensor::new(&[[20f32, 0.0]], &dev).unwrap();
        let ctx = Tensor::new(&[[[0f32, 1.0], [1.0, 0.0]]], &dev).unwrap();
        let out: Vec<Vec<f32>> = attn.forward(&q, Some(&ctx)).unwrap().to_vec2().unwrap();
        // Softmax concentrates on position 1, so the weighted context is ~[1, 0].
        assert!((out[0][0] - 1f32.tanh()).abs() < 1e-4);
        assert!(out[0][1].abs() < 1e-4);
    }

    #[test]
    fn test_shape_mismatch_is_error() {
        let dev = Device::Cpu;
        let attn = DotAttention::new(4, VarBuilder::zeros(DType::F32, &dev)).unwrap();
        let q = Tensor::zeros((2, 4), DType::F32, &dev).unwrap();
        let ctx = Tensor::zeros((3, 5, 4), DType::F32, &dev).unwrap();
        assert!(matches!(attn.forward(&q, Some(&ctx)), Err(Error::Shape(_))));
        let ctx = Tensor::zeros((2, 5, 6), DType::F32, &dev).unwrap();
        assert!(matches!(attn.forward(&q, Some(&ctx)), Err(Error::Shape(_))));
    }
}
