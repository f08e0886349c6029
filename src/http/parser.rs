use tokio::io::{AsyncRead, AsyncReadExt};

use crate::http::error::ParseError;
use crate::http::request::Request;

/// Starting capacity of the read buffer. Deliberately tiny so that the
/// growth path runs on practically every request.
pub const INITIAL_BUFFER_SIZE: usize = 8;

/// Flat byte arena with a logical end cursor.
///
/// `buf[..filled]` holds bytes read from the socket that the parser has not
/// consumed yet. Consumed bytes are dropped from the front by [`compact`],
/// so nothing is ever scanned twice.
///
/// [`compact`]: ReadBuffer::compact
#[derive(Debug)]
pub struct ReadBuffer {
    buf: Vec<u8>,
    filled: usize,
}

impl Default for ReadBuffer {
    fn default() -> Self {
        Self::with_capacity(INITIAL_BUFFER_SIZE)
    }
}

impl ReadBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity.max(1)],
            filled: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Unconsumed bytes.
    pub fn filled(&self) -> &[u8] {
        &self.buf[..self.filled]
    }

    /// Doubles the capacity until at least `additional` free bytes are
    /// available after the cursor. Live bytes are preserved.
    pub fn ensure_capacity(&mut self, additional: usize) {
        let mut capacity = self.buf.len();
        while capacity - self.filled < additional {
            capacity *= 2;
        }
        if capacity != self.buf.len() {
            let mut grown = vec![0; capacity];
            grown[..self.filled].copy_from_slice(&self.buf[..self.filled]);
            self.buf = grown;
        }
    }

    /// Free space after the cursor, for the next read.
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.buf[self.filled..]
    }

    /// Marks `n` bytes written into [`spare_mut`](ReadBuffer::spare_mut) as filled.
    pub fn advance(&mut self, n: usize) {
        debug_assert!(self.filled + n <= self.buf.len());
        self.filled += n;
    }

    /// Drops `consumed` bytes from the front, shifting the rest down.
    pub fn compact(&mut self, consumed: usize) {
        if consumed == 0 {
            return;
        }
        self.buf.copy_within(consumed..self.filled, 0);
        self.filled -= consumed;
    }
}

/// Reads from `reader` until one full request has been parsed.
///
/// Blocks the calling task across as many reads as it takes. A stream that
/// ends before the request is complete yields [`ParseError::IncompleteRequest`].
pub async fn parse_from_stream<R>(reader: &mut R) -> Result<Request, ParseError>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = ReadBuffer::default();
    let mut request = Request::new();

    while !request.is_done() {
        buffer.ensure_capacity(1);

        let n = reader.read(buffer.spare_mut()).await?;
        if n == 0 {
            return Err(ParseError::IncompleteRequest {
                state: request.state,
            });
        }
        buffer.advance(n);

        let consumed = request.feed(buffer.filled())?;
        buffer.compact(consumed);
    }

    tracing::trace!(
        leftover = buffer.filled().len(),
        "request parsed"
    );

    Ok(request)
}
