// Money movement between profiles
pub mod engine;

pub use engine::{
    DepositReceipt, PaymentOutcome, PaymentReceipt, SettlementEngine, DEPOSIT_CAP_RATIO,
};
