use tokio::io::AsyncRead;
use tokio_util::codec::{FramedRead, LinesCodec};

/// One logical unit read from a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unit {
    /// A `/<word>` token was found; holds the word.
    Command(String),

    /// Anything else, relayed verbatim.
    Message(String),
}

/// Frame `reader` into newline-delimited lines.
///
/// A trailing `\r` is stripped from every line and lines have no length cap.
/// A line that is split across several reads is reassembled, and several lines
/// arriving in a single read are yielded one by one.
pub fn lines<Reader>(reader: Reader) -> FramedRead<Reader, LinesCodec>
where
    Reader: AsyncRead,
{
    FramedRead::new(reader, LinesCodec::new())
}

/// Classify a `line` as a command or a plain message.
///
/// The first `/` that is immediately followed by one or more word characters
/// (ASCII alphanumerics or `_`) makes the line a command, wherever it occurs.
pub fn parse(line: &str) -> Unit {
    match command_word(line) {
        Some(word) => Unit::Command(word.to_string()),
        None => Unit::Message(line.to_string()),
    }
}

fn command_word(line: &str) -> Option<&str> {
    line.match_indices('/').find_map(|(slash, _)| {
        let rest = &line[slash + 1..];
        let end = rest
            .find(|c: char| !is_word_char(c))
            .unwrap_or(rest.len());
        (end > 0).then(|| &rest[..end])
    })
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Clean up a display name typed by a client.
///
/// Returns `None` if nothing is left after trimming surrounding whitespace.
pub fn display_name(raw: &str) -> Option<String> {
    let name = raw.trim();
    (!name.is_empty()).then(|| name.to_string())
}
