//! G2P CLI — convert words to phoneme sequences.
//!
//! Loads a JSON config, safetensors weights and the two symbol tables, then
//! prints one line per input word:
//!
//! ```text
//! cat	K AE T
//! ```
//!
//! Exit code 0 on success, non-zero on error.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use g2p_rs::{config::G2pConfig, model::G2p, vocab::Vocab};

#[derive(Parser, Debug)]
#[command(
    name = "g2p",
    about = "Grapheme-to-phoneme conversion with beam search",
    long_about = "Convert words to phoneme sequences using an attention LSTM \
                  seq2seq model. One tab-separated line is printed per word."
)]
struct Args {
    /// Model config (JSON).
    #[arg(long)]
    config: PathBuf,

    /// Model weights (safetensors).
    #[arg(long, short = 'w')]
    weights: PathBuf,

    /// Grapheme symbol table (JSON array).
    #[arg(long)]
    graphemes: PathBuf,

    /// Phoneme symbol table (JSON array).
    #[arg(long)]
    phonemes: PathBuf,

    /// Override the beam width from the config.
    #[arg(long, short = 'b')]
    beam_size: Option<usize>,

    /// Override the maximum output length from the config.
    #[arg(long)]
    max_len: Option<usize>,

    /// Force CPU even when the config asks for CUDA.
    #[arg(long)]
    cpu: bool,

    /// Words to convert.
    #[arg(required = true)]
    words: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config: G2pConfig = G2pConfig::from_json_file(&args.config)
        .with_context(|| format!("failed to read config {}", args.config.display()))?;
    if let Some(beam_size) = args.beam_size {
        config.beam_size = beam_size;
    }
    if let Some(max_len) = args.max_len {
        config.max_len = max_len;
    }
    if args.cpu {
        config.cuda = false;
    }
    config.validate()?;

    let graphemes = Vocab::from_json_file(&args.graphemes)
        .with_context(|| format!("failed to read {}", args.graphemes.display()))?;
    let phonemes = Vocab::from_json_file(&args.phonemes)
        .with_context(|| format!("failed to read {}", args.phonemes.display()))?;
    graphemes.check_size(config.g_size, "grapheme")?;
    phonemes.check_size(config.p_size, "phoneme")?;

    let model = G2p::load(&config, &args.weights)
        .map_err(|e| anyhow::anyhow!("failed to load model: {e}"))?;

    for word in &args.words {
        let ids = graphemes.encode_chars(word);
        if ids.is_empty() {
            anyhow::bail!("cannot convert an empty word");
        }
        let output = model
            .generate_ids(&ids)
            .map_err(|e| anyhow::anyhow!("generation failed for {word:?}: {e}"))?;
        let symbols = phonemes.decode(&output, &config.tokens);
        println!("{word}\t{}", symbols.join(" "));
    }

    Ok(())
}
