pub mod aggregator;
pub mod appliance;
pub mod intervals;
pub mod tiers;
pub mod units;
pub mod validator;
