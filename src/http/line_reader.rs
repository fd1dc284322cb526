use memchr::memchr;
use tokio::io::{AsyncRead, AsyncReadExt};

const BUFFER_SIZE: usize = 8192;

/// Buffered CRLF line reader for HTTP request heads. Bytes read past the
/// final consumed line stay available through `unparsed_data` so the start
/// of a request body can be replayed upstream.
pub struct LineReader {
    buf: Box<[u8]>,
    start_offset: usize,
    end_offset: usize,
}

impl LineReader {
    pub fn new() -> Self {
        Self {
            buf: vec![0u8; BUFFER_SIZE].into_boxed_slice(),
            start_offset: 0,
            end_offset: 0,
        }
    }

    /// Reads one CRLF-terminated line, without the terminator. A bare LF is
    /// rejected rather than repaired.
    pub async fn read_line<T>(&mut self, stream: &mut T) -> std::io::Result<String>
    where
        T: AsyncRead + Unpin,
    {
        loop {
            if let Some(pos) = memchr(b'\n', &self.buf[self.start_offset..self.end_offset]) {
                let newline_offset = self.start_offset + pos;
                if newline_offset == self.start_offset || self.buf[newline_offset - 1] != b'\r' {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        "line is not terminated by CRLF",
                    ));
                }
                let line = std::str::from_utf8(&self.buf[self.start_offset..newline_offset - 1])
                    .map_err(|e| {
                        std::io::Error::new(
                            std::io::ErrorKind::InvalidData,
                            format!("failed to decode utf8: {}", e),
                        )
                    })?
                    .to_string();
                self.start_offset = newline_offset + 1;
                return Ok(line);
            }
            self.fill(stream).await?;
        }
    }

    pub fn unparsed_data(&self) -> &[u8] {
        &self.buf[self.start_offset..self.end_offset]
    }

    async fn fill<T>(&mut self, stream: &mut T) -> std::io::Result<()>
    where
        T: AsyncRead + Unpin,
    {
        if self.end_offset == self.buf.len() {
            if self.start_offset == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::ConnectionAborted,
                    "buffer is full, line is too long",
                ));
            }
            self.buf.copy_within(self.start_offset..self.end_offset, 0);
            self.end_offset -= self.start_offset;
            self.start_offset = 0;
        }

        let len = stream.read(&mut self.buf[self.end_offset..]).await?;
        if len == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionAborted,
                "EOF while reading request head",
            ));
        }
        self.end_offset += len;
        Ok(())
    }
}
