//! Network-facing lookups: DNS resolution and IP geolocation.

pub mod dns;
pub mod geo;
