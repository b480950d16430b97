pub mod cors;
pub mod profile;
pub mod rate_limit;

pub use cors::create_cors_layer;
pub use profile::resolve_profile;
pub use rate_limit::{settlement_rate_limit, SettlementRateLimit};
