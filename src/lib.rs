pub mod arcade_client;
pub mod autopilot;
pub mod bet;
pub mod cli;
pub mod config;
pub mod error;
pub mod permit;
pub mod report;
pub mod session;
pub mod signer;
pub mod wallets;

pub mod test_helpers;
