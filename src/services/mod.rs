pub mod retry;
pub mod storage;
pub mod synth;
pub mod vault;
pub mod worker;
