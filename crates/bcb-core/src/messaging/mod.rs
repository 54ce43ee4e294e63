//! Cross-messenger event model and outbound port.

pub mod port;
pub mod types;
