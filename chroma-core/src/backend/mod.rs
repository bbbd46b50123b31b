mod chain;
mod serialized;
mod structs;

pub use chain::{resolve_input_values, ChainClient, SpendIndex};
pub use serialized::SerializedChain;
pub use structs::*;
