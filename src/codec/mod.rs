//! The `codec` module squeezes a `Message` into a single SMS-class text and
//! back, and splits oversized free text into numbered parts.
//!
//! Both directions are pure and share no state, so they can be called from
//! any thread.

pub mod base32;
pub mod compact;
pub mod split;

pub use compact::{CHANNEL_LIMIT, PREFIX, decode, encode, is_compact_payload};
pub use split::split_long_message;

#[cfg(test)]
mod tests;
