//! Capture sources
//!
//! A capture source yields raw PCM bytes from one already-selected device.
//! Device enumeration happens before the pipeline starts, so a source is just
//! a reader: standard input (`arecord ... | audiocast`) or the stdout of a
//! capture command spawned by us.

use std::future::Future;
use std::io;
use std::process::Stdio;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};

/// Producer of raw audio frames
pub trait CaptureSource: Send + 'static {
    /// Read the next frame of raw audio
    ///
    /// Returns `Ok(None)` when capture has ended.
    fn read_frame(&mut self) -> impl Future<Output = io::Result<Option<Bytes>>> + Send;

    /// Stop capturing and release the device
    fn stop(&mut self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

/// Capture from any async reader
#[derive(Debug)]
pub struct ReaderCapture<R> {
    reader: R,
    frame_size: usize,
}

impl<R> ReaderCapture<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    /// Read frames of at most `frame_size` bytes from `reader`
    pub fn new(reader: R, frame_size: usize) -> Self {
        Self {
            reader,
            frame_size: frame_size.max(1),
        }
    }
}

impl ReaderCapture<tokio::io::Stdin> {
    /// Capture raw PCM piped into standard input
    ///
    /// Reads run on a blocking thread that cannot be interrupted, so runtime
    /// shutdown waits for the read in flight. [`CommandCapture`] stops promptly.
    pub fn stdin(frame_size: usize) -> Self {
        Self::new(tokio::io::stdin(), frame_size)
    }
}

impl<R> CaptureSource for ReaderCapture<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    async fn read_frame(&mut self) -> io::Result<Option<Bytes>> {
        let mut buf = BytesMut::zeroed(self.frame_size);
        let n = self.reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some(buf.freeze()))
    }
}

/// Capture from the stdout of a spawned command
///
/// The command line is split on whitespace and run without a shell, e.g.
/// `arecord -q -D hw:1 -f S16_LE -r 44100 -c 2 -t raw`.
#[derive(Debug)]
pub struct CommandCapture {
    child: Child,
    inner: ReaderCapture<ChildStdout>,
}

impl CommandCapture {
    /// Spawn the capture command
    pub fn spawn(command_line: &str, frame_size: usize) -> io::Result<Self> {
        let mut parts = command_line.split_whitespace();
        let program = parts.next().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "empty capture command")
        })?;

        let mut child = Command::new(program)
            .args(parts)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child.stdout.take().ok_or_else(|| {
            io::Error::new(io::ErrorKind::BrokenPipe, "capture command has no stdout")
        })?;

        if let Some(stderr) = child.stderr.take() {
            let program = program.to_string();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(program = %program, "{}", line);
                }
            });
        }

        tracing::info!(command = %command_line, pid = ?child.id(), "Capture command started");

        Ok(Self {
            child,
            inner: ReaderCapture::new(stdout, frame_size),
        })
    }
}

impl CaptureSource for CommandCapture {
    async fn read_frame(&mut self) -> io::Result<Option<Bytes>> {
        self.inner.read_frame().await
    }

    async fn stop(&mut self) {
        if let Err(e) = self.child.kill().await {
            tracing::debug!(error = %e, "Capture command already exited");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reader_capture_frames() {
        let mut capture = ReaderCapture::new(&b"abcdefghij"[..], 4);

        assert_eq!(capture.read_frame().await.unwrap().unwrap(), &b"abcd"[..]);
        assert_eq!(capture.read_frame().await.unwrap().unwrap(), &b"efgh"[..]);
        assert_eq!(capture.read_frame().await.unwrap().unwrap(), &b"ij"[..]);
        assert!(capture.read_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reader_capture_error() {
        let reader = tokio_test::io::Builder::new()
            .read(b"pcm")
            .read_error(io::Error::new(io::ErrorKind::Other, "device unplugged"))
            .build();
        let mut capture = ReaderCapture::new(reader, 16);

        assert_eq!(capture.read_frame().await.unwrap().unwrap(), &b"pcm"[..]);
        assert!(capture.read_frame().await.is_err());
    }

    #[tokio::test]
    async fn test_empty_command_rejected() {
        let err = CommandCapture::spawn("   ", 1024).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
