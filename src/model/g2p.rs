//! Full grapheme-to-phoneme model: encoder, attention decoder, beam search.

use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;

use super::decoder::Decoder;
use super::encoder::Encoder;
use super::generation::{SearchOutput, SearchParams, beam_search};
use crate::config::G2pConfig;
use crate::{Error, Result};

/// Seq2seq G2P model.
///
/// Weight names follow the PyTorch module tree: `encoder.{embedding,lstm}.*`,
/// `decoder.{embedding,lstm,attn.linear,linear}.*`.
#[derive(Debug, Clone)]
pub struct G2p {
    encoder: Encoder,
    decoder: Decoder,
    config: G2pConfig,
    device: Device,
}

impl G2p {
    /// Build the model from a var builder. The config is validated first.
    pub fn new(config: &G2pConfig, vb: VarBuilder) -> Result<Self> {
        config.validate()?;
        let device = vb.device().clone();
        let encoder = Encoder::new(
            config.g_size,
            config.d_embed,
            config.d_hidden,
            vb.pp("encoder"),
        )?;
        let decoder = Decoder::new(
            config.p_size,
            config.d_embed,
            config.d_hidden,
            vb.pp("decoder"),
        )?;
        Ok(Self {
            encoder,
            decoder,
            config: config.clone(),
            device,
        })
    }

    /// Load weights from a safetensors file onto the device chosen by `config.cuda`.
    pub fn load(config: &G2pConfig, weights_path: &Path) -> Result<Self> {
        config.validate()?;
        let device = if config.cuda {
            Device::cuda_if_available(0)?
        } else {
            Device::Cpu
        };
        tracing::info!("Loading G2P weights from {:?} on {:?}", weights_path, device);
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)
                .map_err(|e| Error::WeightLoad(format!("{}: {e}", weights_path.display())))?
        };
        let model =
            Self::new(config, vb).map_err(|e| Error::WeightLoad(format!("model init: {e}")))?;
        tracing::info!(
            g_size = config.g_size,
            p_size = config.p_size,
            d_hidden = config.d_hidden,
            attention = config.attention,
            "G2P model loaded"
        );
        Ok(model)
    }

    /// Beam-search the phoneme sequence for a `[len, 1]` grapheme tensor.
    pub fn search(&self, graphemes: &Tensor) -> Result<SearchOutput> {
        let (_len, batch) = graphemes.dims2()?;
        if batch != 1 {
            return Err(Error::Shape(format!(
                "generation needs batch size 1, got {batch}"
            )));
        }

        let (outputs, state) = self.encoder.forward(graphemes)?;
        // [len, 1, H] -> [1, len, H]
        let context = if self.config.attention {
            Some(outputs.transpose(0, 1)?.contiguous()?)
        } else {
            None
        };
        beam_search(
            &self.decoder,
            &state,
            context.as_ref(),
            &SearchParams::from(&self.config),
        )
    }

    /// Phoneme ids for a `[len, 1]` grapheme tensor (BOS excluded, EOS kept when reached).
    pub fn generate(&self, graphemes: &Tensor) -> Result<Vec<u32>> {
        Ok(self.search(graphemes)?.tokens)
    }

    /// Same as [`generate`](Self::generate), from a slice of grapheme ids.
    pub fn generate_ids(&self, graphemes: &[u32]) -> Result<Vec<u32>> {
        if let Some(&bad) = graphemes.iter().find(|&&id| id as usize >= self.config.g_size) {
            return Err(Error::Shape(format!(
                "grapheme id {bad} outside vocabulary of {}",
                self.config.g_size
            )));
        }
        let input = Tensor::from_slice(graphemes, (graphemes.len(), 1), &self.device)?;
        self.generate(&input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> G2pConfig {
        G2pConfig {
            beam_size: 3,
            max_len: 6,
            d_embed: 4,
            d_hidden: 8,
            ..G2pConfig::new(10, 7)
        }
    }

    #[test]
    fn test_generate_with_zero_weights_exhausts_max_len() {
        let dev = Device::Cpu;
        let model = G2p::new(&small_config(), VarBuilder::zeros(DType::F32, &dev)).unwrap();
        // Uniform log-probs: every tie resolves to slot 0, word 0; EOS never leads.
        let out = model.search(&Tensor::new(&[[4u32], [5], [6]], &dev).unwrap()).unwrap();
        assert!(!out.finished);
        assert_eq!(out.steps, 6);
        assert_eq!(out.tokens, vec![0; 6]);
    }

    #[test]
    fn test_generate_without_attention() {
        let dev = Device::Cpu;
        let cfg = G2pConfig {
            attention: false,
            ..small_config()
        };
        let model = G2p::new(&cfg, VarBuilder::zeros(DType::F32, &dev)).unwrap();
        let phonemes = model.generate_ids(&[4, 5]).unwrap();
        assert_eq!(phonemes.len(), 6);
    }

    #[test]
    fn test_batch_must_be_one() {
        let dev = Device::Cpu;
        let model = G2p::new(&small_config(), VarBuilder::zeros(DType::F32, &dev)).unwrap();
        let input = Tensor::new(&[[4u32, 5], [6, 7]], &dev).unwrap();
        assert!(matches!(model.search(&input), Err(Error::Shape(_))));
    }

    #[test]
    fn test_out_of_vocab_grapheme() {
        let dev = Device::Cpu;
        let model = G2p::new(&small_config(), VarBuilder::zeros(DType::F32, &dev)).unwrap();
        assert!(matches!(model.generate_ids(&[4, 10]), Err(Error::Shape(_))));
    }

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let dev = Device::Cpu;
        let cfg = G2pConfig {
            beam_size: 0,
            ..small_config()
        };
        assert!(matches!(
            G2p::new(&cfg, VarBuilder::zeros(DType::F32, &dev)),
            Err(Error::Config(_))
        ));
    }
}
