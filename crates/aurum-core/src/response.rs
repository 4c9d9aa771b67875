//! Streaming extractor for the flat price object returned by the API
//!
//! The body looks like `{"gold":1000.00,"silver":25.00}`. The parser is fed
//! the body bytes after the HTTP headers; anything before the first `{` is
//! ignored. It is deliberately not a JSON parser. Nested
//! objects, arrays, string values and escapes give unspecified (but
//! memory-safe) results.

use embedded_io_async::Read;
use heapless::Vec;
use log::{debug, warn};

/// Marker for a price that is unknown or failed to parse.
pub const PRICE_UNKNOWN: f64 = -1.0;

/// Maximum stored key length in bytes
pub const KEY_CAPACITY: usize = 16;
/// Maximum stored raw value length in bytes
pub const VALUE_CAPACITY: usize = 24;

const GOLD_KEY: &[u8] = b"gold";
const SILVER_KEY: &[u8] = b"silver";

/// The two prices the appliance can show.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceReading {
    pub gold: f64,
    pub silver: f64,
}

impl PriceReading {
    /// Both prices at [`PRICE_UNKNOWN`].
    pub const UNKNOWN: Self = Self {
        gold: PRICE_UNKNOWN,
        silver: PRICE_UNKNOWN,
    };
}

impl Default for PriceReading {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Skipping everything up to the opening brace
    AwaitObject,
    /// Inside the object, between tokens
    Between,
    /// Capturing a key up to its closing quote
    InKey,
    /// Capturing raw value bytes up to `,` or `}`
    InValue,
    /// Closing brace seen
    Done,
}

/// Outcome of feeding one byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Done,
}

/// Character-driven state machine over bounded key/value accumulators.
#[derive(Debug)]
pub struct ResponseParser {
    state: State,
    key: Vec<u8, KEY_CAPACITY>,
    value: Vec<u8, VALUE_CAPACITY>,
    reading: PriceReading,
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseParser {
    pub const fn new() -> Self {
        Self {
            state: State::AwaitObject,
            key: Vec::new(),
            value: Vec::new(),
            reading: PriceReading::UNKNOWN,
        }
    }

    /// Prices settled so far. Fields not (yet) seen stay at [`PRICE_UNKNOWN`].
    pub fn reading(&self) -> PriceReading {
        self.reading
    }

    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// Advance the state machine by one byte.
    pub fn feed(&mut self, byte: u8) -> Step {
        match self.state {
            State::AwaitObject => {
                if byte == b'{' {
                    self.state = State::Between;
                }
            }
            State::Between => match byte {
                b'"' => {
                    self.key.clear();
                    self.state = State::InKey;
                }
                b':' => {
                    self.value.clear();
                    self.state = State::InValue;
                }
                b'}' => self.state = State::Done,
                _ => {}
            },
            State::InKey => {
                if byte == b'"' {
                    self.state = State::Between;
                } else {
                    // Overflow is truncation
                    let _ = self.key.push(byte);
                }
            }
            State::InValue => match byte {
                b',' => {
                    self.commit();
                    self.state = State::Between;
                }
                b'}' => {
                    self.commit();
                    self.state = State::Done;
                }
                _ => {
                    let _ = self.value.push(byte);
                }
            },
            State::Done => {}
        }

        if self.state == State::Done {
            Step::Done
        } else {
            Step::Continue
        }
    }

    /// Store the value just captured if its key is one we track.
    fn commit(&mut self) {
        let slot = match self.key.as_slice() {
            GOLD_KEY => &mut self.reading.gold,
            SILVER_KEY => &mut self.reading.silver,
            _ => return,
        };

        match parse_number(&self.value) {
            Some(number) => *slot = number,
            None => debug!("Unparseable price value ({} bytes)", self.value.len()),
        }
    }
}

fn parse_number(raw: &[u8]) -> Option<f64> {
    core::str::from_utf8(raw).ok()?.trim().parse().ok()
}

/// Drive a [`ResponseParser`] over `reader` until the object closes or the stream ends.
///
/// Blocks for as long as the reader does; there is no timeout. A read error
/// ends the parse like end-of-stream. Reads are one byte at a time, so
/// nothing after the closing brace is ever taken off the stream.
pub async fn parse_response<R: Read>(reader: &mut R) -> PriceReading {
    let mut parser = ResponseParser::new();
    let mut byte = [0u8; 1];

    loop {
        match reader.read(&mut byte).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("Response stream error: {:?}", e);
                break;
            }
        }

        if parser.feed(byte[0]) == Step::Done {
            break;
        }
    }

    if !parser.is_done() {
        debug!("Response ended before the object closed");
    }

    parser.reading()
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embassy_futures::block_on;

    struct ChunkedReader<'a> {
        data: &'a [u8],
        chunk: usize,
        reads: usize,
    }

    impl<'a> ChunkedReader<'a> {
        fn new(data: &'a [u8], chunk: usize) -> Self {
            Self {
                data,
                chunk,
                reads: 0,
            }
        }
    }

    impl embedded_io_async::ErrorType for ChunkedReader<'_> {
        type Error = Infallible;
    }

    impl Read for ChunkedReader<'_> {
        async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
            self.reads += 1;
            let n = self.chunk.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    fn parse(input: &[u8]) -> PriceReading {
        block_on(parse_response(&mut ChunkedReader::new(input, 4)))
    }

    #[test]
    fn test_parses_both_prices() {
        let reading = parse(br#"{"gold":1000.00,"silver":25.00}"#);
        assert_eq!(reading.gold, 1000.0);
        assert_eq!(reading.silver, 25.0);
    }

    #[test]
    fn test_missing_field_stays_unknown() {
        let reading = parse(br#"{"gold":1000.00}"#);
        assert_eq!(reading.gold, 1000.0);
        assert_eq!(reading.silver, PRICE_UNKNOWN);
    }

    #[test]
    fn test_truncated_value_is_not_committed() {
        let reading = parse(br#"{"gold":10"#);
        assert_eq!(reading, PriceReading::UNKNOWN);
    }

    #[test]
    fn test_empty_stream() {
        assert_eq!(parse(b""), PriceReading::UNKNOWN);
        assert_eq!(parse(b"HTTP/1.1 500 Internal Server Error\r\n\r\n"), PriceReading::UNKNOWN);
    }

    #[test]
    fn test_headers_before_body_are_skipped() {
        let reading = parse(
            b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nConnection: close\r\n\r\n\
              {\"silver\":24.5,\"gold\":2031.75}",
        );
        assert_eq!(reading.gold, 2031.75);
        assert_eq!(reading.silver, 24.5);
    }

    #[test]
    fn test_unknown_keys_are_skipped() {
        let reading = parse(br#"{"ts":1700000000,"gold":1.5,"platinum":900,"silver":2.25}"#);
        assert_eq!(reading.gold, 1.5);
        assert_eq!(reading.silver, 2.25);
    }

    #[test]
    fn test_whitespace_around_values() {
        let reading = parse(b"{ \"gold\" : 12.5 ,\n \"silver\": 0.75 }");
        assert_eq!(reading.gold, 12.5);
        assert_eq!(reading.silver, 0.75);
    }

    #[test]
    fn test_unparseable_value_keeps_sentinel() {
        let reading = parse(br#"{"gold":"n/a","silver":3}"#);
        assert_eq!(reading.gold, PRICE_UNKNOWN);
        assert_eq!(reading.silver, 3.0);
    }

    #[test]
    fn test_overlong_value_truncates_without_failing() {
        let reading = parse(br#"{"gold":1111111111111111111111111111111111,"silver":7}"#);
        // 24 ones survive the truncation
        assert_eq!(reading.gold, 111_111_111_111_111_111_111_111.0);
        assert_eq!(reading.silver, 7.0);
    }

    #[test]
    fn test_overlong_key_does_not_match() {
        let reading = parse(br#"{"goldgoldgoldgoldgold":5,"silver":6}"#);
        assert_eq!(reading.gold, PRICE_UNKNOWN);
        assert_eq!(reading.silver, 6.0);
    }

    #[test]
    fn test_stops_reading_after_closing_brace() {
        let input = br#"{"gold":1,"silver":2}trailing bytes that are never touched"#;
        let mut reader = ChunkedReader::new(input, 1);
        let reading = block_on(parse_response(&mut reader));

        assert_eq!(reading.gold, 1.0);
        assert_eq!(reading.silver, 2.0);
        assert_eq!(reader.reads, br#"{"gold":1,"silver":2}"#.len());
    }

    #[test]
    fn test_trailing_bytes_stay_on_stream() {
        let input = br#"{"gold":3,"silver":4}{"gold":9}"#;
        let mut reader = ChunkedReader::new(input, 64);
        let reading = block_on(parse_response(&mut reader));

        assert_eq!(reading.gold, 3.0);
        assert_eq!(reader.data, br#"{"gold":9}"#);
    }

    #[test]
    fn test_parsing_is_repeatable() {
        let input = br#"{"gold":1000.00,"silver":25.00}"#;
        assert_eq!(parse(input), parse(input));
    }

    #[test]
    fn test_feed_reports_done() {
        let mut parser = ResponseParser::new();
        for &b in br#"{"silver":1"# {
            assert_eq!(parser.feed(b), Step::Continue);
        }
        assert_eq!(parser.feed(b'}'), Step::Done);
        assert!(parser.is_done());
        // Further input is inert
        assert_eq!(parser.feed(b'{'), Step::Done);
        assert_eq!(parser.reading().silver, 1.0);
    }
}
