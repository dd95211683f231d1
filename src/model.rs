//! Model components for the G2P seq2seq network.
//!
//! ## Components
//!
//! - [`cell`] — LSTM cell and the embedded cell shared by encoder and decoder
//! - [`encoder`] — grapheme encoder producing the attention context
//! - [`attention`] — dot-product global attention
//! - [`decoder`] — one-step attention decoder ([`decoder::DecoderStep`])
//! - [`generation`] — beam-search generation loop
//! - [`g2p`] — the full model

pub mod attention;
pub mod cell;
pub mod decoder;
pub mod encoder;
pub mod g2p;
pub mod generation;

pub use g2p::G2p;
