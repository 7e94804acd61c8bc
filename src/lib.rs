pub mod engine;
pub mod ledger;
pub mod odds;
pub mod projection;
pub mod result_gen;
pub mod round;
pub mod seed;
pub mod state;
pub mod teams;
