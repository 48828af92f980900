//! Typing effect for answers that have already arrived in full.
//!
//! Only the rendering is progressive; the stored turn always holds the
//! complete answer.

use std::io::Write;
use std::time::Duration;

use crate::constants::REVEAL_CURSOR;

/// Step through `text` one character at a time.
///
/// Each item is `(chunk, shown)`: the character just revealed and the prefix
/// revealed so far.
pub fn steps(text: &str) -> impl Iterator<Item = (&str, &str)> + '_ {
    text.char_indices().map(move |(start, ch)| {
        let end = start + ch.len_utf8();
        (&text[start..end], &text[..end])
    })
}

/// Play the reveal on a terminal. The cursor is erased before each new
/// character so line breaks don't leave it behind.
pub async fn play_to<W: Write>(out: &mut W, text: &str, delay: Duration) -> std::io::Result<()> {
    write!(out, "{}", REVEAL_CURSOR)?;
    out.flush()?;
    for (chunk, _) in steps(text) {
        write!(out, "\x08 \x08{}{}", chunk, REVEAL_CURSOR)?;
        out.flush()?;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
    writeln!(out, "\x08 \x08")?;
    out.flush()
}
