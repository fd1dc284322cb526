mod line_reader;

use tokio::io::AsyncRead;

use line_reader::LineReader;

const MAX_HEADER_LINES: usize = 100;
const MAX_LINE_LENGTH: usize = 4096;

/// The head of an HTTP/1.x request: the request line, the raw header lines
/// in arrival order, and the Host header value if one was present.
///
/// Header lines are kept verbatim so the head can be replayed upstream
/// byte-for-byte after the trust decision.
pub struct RequestHead {
    request_line: String,
    header_lines: Vec<String>,
    host: Option<String>,
    reader: LineReader,
}

impl RequestHead {
    pub async fn read_from<T>(stream: &mut T) -> std::io::Result<Self>
    where
        T: AsyncRead + Unpin,
    {
        let mut reader = LineReader::new();

        let request_line = reader.read_line(stream).await?;
        if request_line.is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "empty request line",
            ));
        }
        if request_line.len() > MAX_LINE_LENGTH {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "request line is too long",
            ));
        }

        let mut header_lines = vec![];
        let mut host: Option<String> = None;
        loop {
            let line = reader.read_line(stream).await?;
            if line.is_empty() {
                break;
            }
            if line.len() > MAX_LINE_LENGTH {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "request header line is too long",
                ));
            }
            if header_lines.len() >= MAX_HEADER_LINES {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "too many request headers",
                ));
            }

            let (name, value) = line.split_once(':').ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("invalid request header line: {}", line),
                )
            })?;
            // RFC 7230 forbids whitespace between the field name and the
            // colon; "Host : x" must not be read as a Host header.
            if name.contains(' ') || name.contains('\t') {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("whitespace in request header name: {}", line),
                ));
            }
            if name.eq_ignore_ascii_case("host") {
                // Two Host headers make the request ambiguous; refuse to
                // pick one.
                if host.is_some() {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        "duplicate Host header",
                    ));
                }
                host = Some(value.trim().to_string());
            }
            header_lines.push(line);
        }

        Ok(Self {
            request_line,
            header_lines,
            host,
            reader,
        })
    }

    pub fn request_line(&self) -> &str {
        self.request_line.as_str()
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Body bytes that were buffered while reading the head.
    pub fn unparsed_data(&self) -> &[u8] {
        self.reader.unparsed_data()
    }

    /// Reassembles the head exactly as it should be sent upstream.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(
            self.request_line.len()
                + self
                    .header_lines
                    .iter()
                    .map(|line| line.len() + 2)
                    .sum::<usize>()
                + 4,
        );
        bytes.extend_from_slice(self.request_line.as_bytes());
        bytes.extend_from_slice(b"\r\n");
        for line in self.header_lines.iter() {
            bytes.extend_from_slice(line.as_bytes());
            bytes.extend_from_slice(b"\r\n");
        }
        bytes.extend_from_slice(b"\r\n");
        bytes
    }
}
