pub mod mock;

#[cfg(any(feature = "provider-openai", feature = "provider-anthropic"))]
pub mod sse;

#[cfg(feature = "provider-openai")]
pub mod openai;

#[cfg(feature = "provider-anthropic")]
pub mod anthropic;
