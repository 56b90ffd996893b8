//! Text grammar for detection results (server → client payloads).
//!
//! ```text
//! "start" SP ( SP label SP confidence SP x1 SP y1 SP x2 SP y2 )* SP "stop" SP
//! ```
//!
//! An empty detection set encodes as `"start  stop "`.  Whitespace around the
//! markers carries no meaning; the decoder works on whitespace-separated
//! tokens.
//!
//! # Decoder state machine
//!
//! ```text
//! Seeking ──"start"──▶ InBody ──"stop"──▶ Done
//!    │                   │  └─ token count % 6 != 0 ──▶ Malformed
//!    └── other tokens    └── other tokens collected
//! ```
//!
//! A body whose token count is not a multiple of six is rejected as a whole;
//! so is any record whose fields fail to parse.  The decoder never returns a
//! partial detection set.

use std::fmt::Write as _;
use std::str::FromStr;

use thiserror::Error;

use crate::domain::detection::{BoundingBox, Detection};

/// Token opening the detection body.
pub const START_MARKER: &str = "start";
/// Token closing the detection body.
pub const STOP_MARKER: &str = "stop";
/// Tokens per detection record: `label confidence x1 y1 x2 y2`.
pub const FIELDS_PER_DETECTION: usize = 6;

const FIELD_NAMES: [&str; FIELDS_PER_DETECTION] = ["label", "confidence", "x1", "y1", "x2", "y2"];

/// Errors raised while decoding a result payload.
#[derive(Debug, Error, PartialEq)]
pub enum GrammarError {
    /// No `start` token was found.
    #[error("result payload has no `start` marker")]
    MissingStart,

    /// `start` was found but no `stop` token follows it.
    #[error("result payload has no `stop` marker after `start`")]
    MissingStop,

    /// The body token count is not a multiple of six.
    #[error("malformed detection record: {tokens} body tokens is not a multiple of 6")]
    RaggedRecord { tokens: usize },

    /// A field failed to parse as its expected numeric type.
    #[error("detection {index}: invalid {field} `{token}`")]
    InvalidField {
        index: usize,
        field: &'static str,
        token: String,
    },
}

// ── Encoding ──────────────────────────────────────────────────────────────────

/// Encodes a detection set into the result text grammar.
///
/// Confidence is written with Rust's shortest round-trip float formatting,
/// which always uses `.` as the decimal separator.
///
/// # Examples
///
/// ```rust
/// use framelink_core::{encode_detections, BoundingBox, Detection};
///
/// assert_eq!(encode_detections(&[]), "start  stop ");
///
/// let one = Detection::new(0, 0.87, BoundingBox::new(10, 20, 50, 60));
/// assert_eq!(encode_detections(&[one]), "start  0 0.87 10 20 50 60 stop ");
/// ```
pub fn encode_detections(detections: &[Detection]) -> String {
    let mut out = String::with_capacity(12 + detections.len() * 32);
    out.push_str(START_MARKER);
    out.push(' ');
    for d in detections {
        // Writing into a String cannot fail.
        let _ = write!(
            out,
            " {} {} {} {} {} {}",
            d.label, d.confidence, d.bbox.x1, d.bbox.y1, d.bbox.x2, d.bbox.y2
        );
    }
    out.push(' ');
    out.push_str(STOP_MARKER);
    out.push(' ');
    out
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// Decoder state; see the module docs for the transition diagram.
#[derive(Debug, PartialEq)]
enum ParseState<'a> {
    Seeking,
    InBody(Vec<&'a str>),
    Done(Vec<&'a str>),
    Malformed(GrammarError),
}

impl<'a> ParseState<'a> {
    fn step(self, token: &'a str) -> Self {
        match self {
            ParseState::Seeking if token == START_MARKER => ParseState::InBody(Vec::new()),
            ParseState::Seeking => ParseState::Seeking,
            ParseState::InBody(body) if token == STOP_MARKER => {
                if body.len() % FIELDS_PER_DETECTION != 0 {
                    ParseState::Malformed(GrammarError::RaggedRecord { tokens: body.len() })
                } else {
                    ParseState::Done(body)
                }
            }
            ParseState::InBody(mut body) => {
                body.push(token);
                ParseState::InBody(body)
            }
            terminal => terminal,
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, ParseState::Done(_) | ParseState::Malformed(_))
    }

    fn finish(self) -> Result<Vec<&'a str>, GrammarError> {
        match self {
            ParseState::Seeking => Err(GrammarError::MissingStart),
            ParseState::InBody(_) => Err(GrammarError::MissingStop),
            ParseState::Done(body) => Ok(body),
            ParseState::Malformed(err) => Err(err),
        }
    }
}

/// Decodes a result string into a detection set.
///
/// # Errors
///
/// Returns a [`GrammarError`] if either marker is missing, the body is not a
/// whole number of six-token records, or any field fails to parse.
pub fn decode_detections(text: &str) -> Result<Vec<Detection>, GrammarError> {
    let mut state = ParseState::Seeking;
    for token in text.split_whitespace() {
        state = state.step(token);
        if state.is_terminal() {
            break;
        }
    }
    let body = state.finish()?;

    body.chunks_exact(FIELDS_PER_DETECTION)
        .enumerate()
        .map(|(index, record)| parse_record(index, record))
        .collect()
}

/// Decodes raw payload bytes, replacing invalid UTF-8 sequences first.
///
/// # Errors
///
/// See [`decode_detections`].
pub fn decode_result_payload(payload: &[u8]) -> Result<Vec<Detection>, GrammarError> {
    decode_detections(&String::from_utf8_lossy(payload))
}

fn parse_record(index: usize, record: &[&str]) -> Result<Detection, GrammarError> {
    let label = parse_field(index, 0, record[0])?;
    let confidence = parse_field(index, 1, record[1])?;
    let x1 = parse_field(index, 2, record[2])?;
    let y1 = parse_field(index, 3, record[3])?;
    let x2 = parse_field(index, 4, record[4])?;
    let y2 = parse_field(index, 5, record[5])?;
    Ok(Detection::new(label, confidence, BoundingBox::new(x1, y1, x2, y2)))
}

fn parse_field<T: FromStr>(index: usize, position: usize, token: &str) -> Result<T, GrammarError> {
    token.parse().map_err(|_| GrammarError::InvalidField {
        index,
        field: FIELD_NAMES[position],
        token: token.to_string(),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn det(label: u32, confidence: f32, x1: i32, y1: i32, x2: i32, y2: i32) -> Detection {
        Detection::new(label, confidence, BoundingBox::new(x1, y1, x2, y2))
    }

    #[test]
    fn test_empty_set_encodes_markers_only() {
        assert_eq!(encode_detections(&[]), "start  stop ");
    }

    #[test]
    fn test_single_detection_encodes_one_six_token_group() {
        // Arrange
        let encoded = encode_detections(&[det(0, 0.87, 10, 20, 50, 60)]);

        // Act
        let tokens: Vec<&str> = encoded.split_whitespace().collect();

        // Assert
        assert_eq!(tokens, ["start", "0", "0.87", "10", "20", "50", "60", "stop"]);
    }

    #[test]
    fn test_round_trip_preserves_order_and_values() {
        let original = vec![
            det(3, 0.5, 0, 0, 10, 10),
            det(0, 0.123_456_7, -5, 7, 1280, 720),
            det(17, 1.0, 100, 200, 101, 201),
        ];

        let decoded = decode_detections(&encode_detections(&original)).unwrap();

        assert_eq!(decoded.len(), original.len());
        for (a, b) in original.iter().zip(&decoded) {
            assert_eq!(a.label, b.label);
            assert_eq!(a.bbox, b.bbox);
            assert!((a.confidence - b.confidence).abs() < 1e-6);
        }
    }

    #[test]
    fn test_empty_body_decodes_to_empty_set() {
        assert_eq!(decode_detections("start  stop "), Ok(Vec::new()));
    }

    #[test]
    fn test_surrounding_whitespace_is_not_significant() {
        let decoded = decode_detections("\n  start\t1 0.9 1 2 3 4\r\nstop").unwrap();
        assert_eq!(decoded, vec![det(1, 0.9, 1, 2, 3, 4)]);
    }

    #[test]
    fn test_missing_start_is_rejected() {
        assert_eq!(decode_detections("1 0.9 1 2 3 4 stop"), Err(GrammarError::MissingStart));
        assert_eq!(decode_detections(""), Err(GrammarError::MissingStart));
    }

    #[test]
    fn test_missing_stop_is_rejected() {
        assert_eq!(decode_detections("start 1 0.9 1 2 3 4"), Err(GrammarError::MissingStop));
    }

    #[test]
    fn test_stop_before_start_does_not_close_the_body() {
        assert_eq!(decode_detections("stop start 1 0.9"), Err(GrammarError::MissingStop));
    }

    #[test]
    fn test_ragged_body_is_rejected_not_truncated() {
        let result = decode_detections("start 1 0.9 1 2 3 4 5 stop");
        assert_eq!(result, Err(GrammarError::RaggedRecord { tokens: 7 }));
    }

    #[test]
    fn test_bad_integer_aborts_whole_message() {
        let result = decode_detections("start 1 0.9 1 2 3 4 2 0.5 1 x 3 4 stop");
        assert_eq!(
            result,
            Err(GrammarError::InvalidField {
                index: 1,
                field: "y1",
                token: "x".to_string()
            })
        );
    }

    #[test]
    fn test_bad_confidence_is_invalid_field() {
        let result = decode_detections("start 1 high 1 2 3 4 stop");
        assert!(matches!(
            result,
            Err(GrammarError::InvalidField { field: "confidence", .. })
        ));
    }

    #[test]
    fn test_negative_label_is_invalid_field() {
        let result = decode_detections("start -1 0.5 1 2 3 4 stop");
        assert!(matches!(result, Err(GrammarError::InvalidField { field: "label", .. })));
    }

    #[test]
    fn test_tokens_after_stop_are_ignored() {
        let decoded = decode_detections("start 2 0.25 1 1 9 9 stop trailing garbage").unwrap();
        assert_eq!(decoded, vec![det(2, 0.25, 1, 1, 9, 9)]);
    }

    #[test]
    fn test_invalid_utf8_is_decoded_permissively() {
        let mut payload = b"\xff start 4 0.5 1 2 3 4 stop \xfe".to_vec();
        payload.push(0xC3);

        let decoded = decode_result_payload(&payload).unwrap();

        assert_eq!(decoded, vec![det(4, 0.5, 1, 2, 3, 4)]);
    }

    #[test]
    fn test_state_machine_transitions() {
        let state = ParseState::Seeking.step("noise");
        assert_eq!(state, ParseState::Seeking);

        let state = state.step("start").step("1");
        assert_eq!(state, ParseState::InBody(vec!["1"]));

        let state = state.step("stop");
        assert!(matches!(state, ParseState::Malformed(GrammarError::RaggedRecord { tokens: 1 })));
        assert!(state.is_terminal());
    }
}
