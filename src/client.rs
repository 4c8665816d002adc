use anyhow::Context;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};

use crate::style::style_line;

/// Typed locally to leave the chat.
pub const EXIT_COMMAND: &str = "/exit";

/// Why the client stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// The user typed [`EXIT_COMMAND`] or closed the input.
    Requested,

    /// The server closed the connection.
    ConnectionLost,
}

/// Relay lines between the user and the server.
///
/// Every line from `input` is sent to the server, except [`EXIT_COMMAND`].
/// Every line from the server is styled and written to `output`, followed by
/// a `> ` prompt.
///
/// # Termination
/// Returns [`Exit::Requested`] on `/exit` or end of `input`, and
/// [`Exit::ConnectionLost`] when the server closes the connection or a read
/// from it fails.
pub async fn run<Reader, Writer, Input, Output>(
    server_reader: Reader,
    server_writer: Writer,
    input: Input,
    mut output: Output,
) -> anyhow::Result<Exit>
where
    Reader: AsyncRead + Unpin,
    Writer: AsyncWrite + Unpin,
    Input: AsyncRead + Unpin,
    Output: AsyncWrite + Unpin,
{
    let mut from_server = FramedRead::new(server_reader, LinesCodec::new());
    let mut to_server = FramedWrite::new(server_writer, LinesCodec::new());
    let mut input = FramedRead::new(input, LinesCodec::new());

    output.write_all(b"> ").await?;
    output.flush().await?;

    let exit = loop {
        tokio::select! {
            message = from_server.next() => {
                let Some(Ok(message)) = message else {
                    break Exit::ConnectionLost;
                };
                output
                    .write_all(format!("\r{}\n> ", style_line(&message)).as_bytes())
                    .await
                    .context("Failed to write to output")?;
                output.flush().await?;
            },
            line = input.next() => {
                let Some(line) = line else {
                    break Exit::Requested;
                };
                let line = line.context("Failed to read input")?;
                if line.trim() == EXIT_COMMAND {
                    break Exit::Requested;
                }
                to_server.send(line).await.context("Failed to send to server")?;
            }
        }
    };
    Ok(exit)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;
    use tokio_test::io::Builder as Mock;

    #[tokio::test]
    async fn forwards_input_until_exit() {
        tokio::time::pause();
        let server_reader = Mock::new().wait(Duration::from_secs(10)).build();
        let server_writer = Mock::new().write(b"hello\n").build();
        let input = Mock::new().read(b"hello\n").read(b"/exit\n").build();
        let mut output = Vec::new();

        let exit = run(server_reader, server_writer, input, &mut output)
            .await
            .unwrap();

        assert_eq!(exit, Exit::Requested);
        assert_eq!(output, b"> ");
    }

    #[tokio::test]
    async fn prints_server_lines_until_connection_lost() {
        tokio::time::pause();
        let server_reader = Mock::new()
            .read(b"You have logged in.\n")
            .read(b"[MSG][alice]: hi\n")
            .build();
        let server_writer = Mock::new().build();
        let input = Mock::new().wait(Duration::from_secs(10)).build();
        let mut output = Vec::new();

        let exit = run(server_reader, server_writer, input, &mut output)
            .await
            .unwrap();

        assert_eq!(exit, Exit::ConnectionLost);
        let printed = String::from_utf8(output).unwrap();
        assert!(printed.contains("\rYou have logged in.\n> "), "{printed:?}");
        assert!(printed.contains("alice"), "{printed:?}");
        assert!(printed.ends_with("]: hi\n> "), "{printed:?}");
    }
}
