// Adapters layer: concrete implementations of the domain ports.

#[cfg(feature = "cdp")]
pub mod cdp;
pub mod status;
