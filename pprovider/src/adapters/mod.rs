#[cfg(feature = "provider-remote")]
pub mod remote;
