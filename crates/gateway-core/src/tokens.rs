//! Rough token estimation for upstreams that report no usage

/// Estimate tokens as one per four characters, rounded up.
pub fn estimate_tokens(text: &str) -> u32 {
    let chars = text.chars().count() as u32;
    chars.div_ceil(4)
}
