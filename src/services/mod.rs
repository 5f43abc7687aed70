pub mod attendance_ledger;
pub mod confirmation_gate;
pub mod geofence;
pub mod reconciliation;
pub mod redemption_service;
pub mod subscription_gate;
pub mod token_issuer;
pub mod token_store;
pub mod token_verifier;
pub mod user_token;
