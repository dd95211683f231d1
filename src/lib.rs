//! Grapheme-to-phoneme conversion in pure Rust.
//!
//! A candle-based implementation of an attention LSTM sequence-to-sequence
//! G2P model with beam-search decoding. Loads safetensors weights exported
//! from the PyTorch model directly.
//!
//! ## Architecture
//!
//! ```text
//! graphemes → embedding → LSTM encoder ──→ context [1, S, H]
//!                              │ final (h, c)       │
//!                              ↓                    ↓
//!        beam tokens → embedding → LSTM → dot attention → linear → log_softmax
//!              ↑                                                     │
//!              └──────────── Beam::advance (top-k, backpointers) ────┘
//! ```
//!
//! ## Modules
//!
//! - [`beam`] — beam state machine: score accumulation, pruning, path rebuild
//! - [`model`] — encoder, attention, decoder step, generation loop
//! - [`config`] — model and search configuration
//! - [`vocab`] — grapheme/phoneme symbol tables

pub mod beam;
pub mod config;
pub mod model;
pub mod vocab;

mod error;

pub use error::{Error, Result};
