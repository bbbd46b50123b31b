//! Colored coins on top of a Bitcoin-like chain.
//!
//! Colors are tracked per output by running a coloring kernel over the
//! transactions that move them. The index of computed color values is built
//! incrementally and on demand (see [`ColorData`]), and payments in colored
//! assets go through a staged construction pipeline ([`TxPipeline`]).

mod backend;
pub mod coins;
pub mod color;
mod colordata;
pub mod config;
pub mod constants;
pub mod error;
pub mod keys;
mod pipeline;
pub mod scanner;
pub mod store;
pub mod txspec;

pub use bitcoin;

pub use backend::*;
pub use colordata::ColorData;
pub use config::ChromaConfig;
pub use error::{Error, Result};
pub use pipeline::{SharedSigner, TxPipeline};
