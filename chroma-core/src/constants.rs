/// Size estimate charged per input when sizing the fee of a transfer.
pub const TX_SIZE_PER_INPUT: u64 = 250;

/// Size estimate of a whole issuance transaction.
pub const GENESIS_TX_SIZE_ESTIMATE: u64 = 300;

pub const DEFAULT_FEE_RATE_SAT_VB: u64 = 1;
pub const DEFAULT_MIN_CONFIRMATIONS: u32 = 1;
pub const DEFAULT_REORG_DEPTH: u32 = 6;
