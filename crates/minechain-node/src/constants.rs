pub(crate) const DEFAULT_MINER: &str = "Miner0";
pub(crate) const DEFAULT_SEED_TRANSACTIONS: usize = 50;
