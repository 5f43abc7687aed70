pub mod jwt;
pub mod signing;
