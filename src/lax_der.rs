//! Lax decoding of DER-encoded ECDSA signatures.
//!
//! Signatures on record were not always produced by conformant encoders. This
//! decoder accepts a superset of strict DER:
//!
//! - long-form length fields, including zero-valued leading length bytes,
//! - integers with any number of leading zero bytes, or with no sign byte,
//! - a sequence length that disagrees with its contents,
//! - trailing bytes after the second integer.
//!
//! It still rejects wrong tags, zero-length or all-zero integers, integers
//! with more than 32 significant bytes and every field that would run past
//! the end of the input.
//!
//! No range check against the curve order is done here, see
//! [`crate::signature`] for that.
//!
//! # Usage
//! ```
//! use secp256k1_lax::{get_context, lax_der::parse_lax_der};
//!
//! let ctx = get_context();
//! // SEQUENCE { INTEGER 1, INTEGER 2 }
//! let values = parse_lax_der(ctx, &[0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02]).unwrap();
//! assert_eq!(values.r()[31], 1);
//! assert_eq!(values.s()[31], 2);
//!
//! // Extra padding and trailing garbage are tolerated.
//! let padded = [0x30, 0x08, 0x02, 0x02, 0x00, 0x01, 0x02, 0x02, 0x00, 0x02, 0xff];
//! assert_eq!(parse_lax_der(ctx, &padded).unwrap(), values);
//! ```
use thiserror::Error;

use crate::context::Secp256k1Context;
use crate::signature::{SignatureValues, SCALAR_LEN};

/// DER tag of a constructed SEQUENCE.
pub const SEQUENCE_TAG: u8 = 0x30;
/// DER tag of an INTEGER.
pub const INTEGER_TAG: u8 = 0x02;
/// Largest number of significant long-form length bytes accepted.
///
/// Zero-valued length bytes in front of them are skipped and not counted.
pub const MAX_LENGTH_BYTES: usize = 3;

const LONG_FORM: u8 = 0x80;

/// Which of the two signature integers a field belongs to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Component {
    R,
    S,
}

/// The field being read when decoding stopped.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Field {
    SequenceTag,
    SequenceLength,
    IntegerTag(Component),
    IntegerLength(Component),
    IntegerContent(Component),
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SequenceTag => write!(f, "sequence tag"),
            Self::SequenceLength => write!(f, "sequence length"),
            Self::IntegerTag(c) => write!(f, "{c:?} tag"),
            Self::IntegerLength(c) => write!(f, "{c:?} length"),
            Self::IntegerContent(c) => write!(f, "{c:?} value"),
        }
    }
}

/// Errors returned by the lax decoder.
///
/// Callers that only need an accept/reject answer can treat every variant
/// the same way.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LaxDerError {
    /// The input ended inside the named field.
    #[error("input truncated in {0}")]
    Truncated(Field),
    /// A tag byte other than the expected one.
    #[error("unexpected tag 0x{found:02x} for {field}")]
    UnexpectedTag { field: Field, found: u8 },
    /// A long-form length with more than [`MAX_LENGTH_BYTES`] significant bytes.
    #[error("length of {0} does not fit the accepted width")]
    LengthOverflow(Field),
    /// An integer with a zero length field.
    #[error("{0:?} has zero length")]
    EmptyInteger(Component),
    /// An integer whose content is only zero bytes.
    #[error("{0:?} is zero")]
    ZeroInteger(Component),
    /// An integer with more than 32 significant bytes.
    #[error("{0:?} has more than 32 significant bytes")]
    OversizedInteger(Component),
}

/// Tolerance limits of the decoder. Fixed; it lives on the context so that
/// every decode reads the same values.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LaxDerPolicy {
    pub max_length_bytes: usize,
}

impl Default for LaxDerPolicy {
    fn default() -> Self {
        Self {
            max_length_bytes: MAX_LENGTH_BYTES,
        }
    }
}

/// Non-canonical features the decoder tolerated for one input.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Deviations {
    /// A length used long form where short form was possible, or had
    /// zero-valued leading length bytes.
    pub non_minimal_length: bool,
    /// An integer had leading zero bytes not needed as a sign byte.
    pub excess_padding: bool,
    /// An integer had its high bit set without a sign byte.
    pub negative_integer: bool,
    /// The sequence length did not match the encoded integers.
    pub sequence_length_mismatch: bool,
    /// Bytes followed the second integer.
    pub trailing_bytes: bool,
}

impl Deviations {
    /// True when nothing had to be tolerated.
    pub fn is_canonical(&self) -> bool {
        *self == Self::default()
    }
}

/// The result of a lax decode: the values plus what was tolerated.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LaxDerSignature {
    values: SignatureValues,
    deviations: Deviations,
    consumed: usize,
}

impl LaxDerSignature {
    pub fn values(&self) -> &SignatureValues {
        &self.values
    }

    pub fn deviations(&self) -> &Deviations {
        &self.deviations
    }

    /// Number of input bytes up to the end of the second integer.
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    pub fn into_values(self) -> SignatureValues {
        self.values
    }
}

/// Decodes `input` into `(r, s)`, each left-padded to 32 bytes.
pub fn parse_lax_der(
    ctx: &Secp256k1Context,
    input: &[u8],
) -> Result<SignatureValues, LaxDerError> {
    decode_lax_der(ctx, input).map(LaxDerSignature::into_values)
}

/// Decodes `input` like [`parse_lax_der`] and also reports the tolerated
/// deviations from strict DER.
pub fn decode_lax_der(
    ctx: &Secp256k1Context,
    input: &[u8],
) -> Result<LaxDerSignature, LaxDerError> {
    let decoded = Decoder::new(ctx.lax_der_policy(), input).run();
    match &decoded {
        Ok(sig) if !sig.deviations.is_canonical() => {
            tracing::debug!(deviations = ?sig.deviations, "accepted non-canonical DER signature");
        }
        Ok(_) => {}
        Err(err) => tracing::trace!(%err, len = input.len(), "rejected DER signature"),
    }
    decoded
}

/// A view of one INTEGER's content inside the input.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct ParsedInteger {
    offset: usize,
    len: usize,
    leading_zero: bool,
    long_form_length: bool,
}

/// A decoded length field.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct Length {
    value: usize,
    non_minimal: bool,
}

/// Which integer comes next. `S` carries the already parsed `r`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Pending {
    R,
    S(ParsedInteger),
}

impl Pending {
    fn component(self) -> Component {
        match self {
            Self::R => Component::R,
            Self::S(_) => Component::S,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum State {
    OuterTag,
    OuterLength,
    IntegerTag(Pending),
    IntegerLength(Pending),
    Done(ParsedInteger, ParsedInteger),
}

struct Decoder<'a> {
    policy: &'a LaxDerPolicy,
    input: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn new(policy: &'a LaxDerPolicy, input: &'a [u8]) -> Self {
        Self {
            policy,
            input,
            pos: 0,
        }
    }

    fn remaining(&self) -> usize {
        self.input.len().saturating_sub(self.pos)
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn next_byte(&mut self, field: Field) -> Result<u8, LaxDerError> {
        let byte = self.peek().ok_or(LaxDerError::Truncated(field))?;
        self.pos += 1;
        Ok(byte)
    }

    fn expect_tag(&mut self, field: Field, tag: u8) -> Result<(), LaxDerError> {
        let found = self.next_byte(field)?;
        if found != tag {
            return Err(LaxDerError::UnexpectedTag { field, found });
        }
        Ok(())
    }

    fn read_length(&mut self, field: Field) -> Result<Length, LaxDerError> {
        let first = self.next_byte(field)?;
        if first & LONG_FORM == 0 {
            return Ok(Length {
                value: usize::from(first),
                non_minimal: false,
            });
        }

        let mut count = usize::from(first & !LONG_FORM);
        if count > self.remaining() {
            return Err(LaxDerError::Truncated(field));
        }
        let mut skipped_zero = false;
        while count > 0 && self.peek() == Some(0) {
            self.pos += 1;
            count -= 1;
            skipped_zero = true;
        }
        if count > self.policy.max_length_bytes {
            return Err(LaxDerError::LengthOverflow(field));
        }

        let mut value = 0usize;
        for _ in 0..count {
            value = (value << 8) | usize::from(self.next_byte(field)?);
        }
        Ok(Length {
            value,
            non_minimal: skipped_zero || value < usize::from(LONG_FORM),
        })
    }

    fn read_integer(&mut self, component: Component) -> Result<ParsedInteger, LaxDerError> {
        let length = self.read_length(Field::IntegerLength(component))?;
        if length.value == 0 {
            return Err(LaxDerError::EmptyInteger(component));
        }
        if length.value > self.remaining() {
            return Err(LaxDerError::Truncated(Field::IntegerContent(component)));
        }
        let parsed = ParsedInteger {
            offset: self.pos,
            len: length.value,
            leading_zero: self.peek() == Some(0),
            long_form_length: length.non_minimal,
        };
        self.pos += length.value;
        Ok(parsed)
    }

    fn content(&self, int: &ParsedInteger) -> &'a [u8] {
        self.input
            .get(int.offset..int.offset + int.len)
            .unwrap_or_default()
    }

    /// Right-aligns the significant bytes of `int` into 32 bytes.
    fn normalize(
        &self,
        component: Component,
        int: &ParsedInteger,
    ) -> Result<[u8; SCALAR_LEN], LaxDerError> {
        let content = self.content(int);
        let zeros = content.iter().take_while(|b| **b == 0).count();
        let significant = content.get(zeros..).unwrap_or_default();
        if significant.is_empty() {
            return Err(LaxDerError::ZeroInteger(component));
        }
        let mut out = [0u8; SCALAR_LEN];
        let start = SCALAR_LEN
            .checked_sub(significant.len())
            .ok_or(LaxDerError::OversizedInteger(component))?;
        out.get_mut(start..)
            .ok_or(LaxDerError::OversizedInteger(component))?
            .copy_from_slice(significant);
        Ok(out)
    }

    fn integer_deviations(&self, int: &ParsedInteger, deviations: &mut Deviations) {
        let content = self.content(int);
        let first = content.first().copied().unwrap_or_default();
        let second = content.get(1).copied();
        deviations.non_minimal_length |= int.long_form_length;
        if int.leading_zero && matches!(second, Some(b) if b & 0x80 == 0) {
            deviations.excess_padding = true;
        }
        if !int.leading_zero && first & 0x80 != 0 {
            deviations.negative_integer = true;
        }
    }

    fn run(mut self) -> Result<LaxDerSignature, LaxDerError> {
        let mut state = State::OuterTag;
        let mut deviations = Deviations::default();
        let mut sequence = Length {
            value: 0,
            non_minimal: false,
        };
        let mut content_start = 0;

        let (r, s) = loop {
            state = match state {
                State::OuterTag => {
                    self.expect_tag(Field::SequenceTag, SEQUENCE_TAG)?;
                    State::OuterLength
                }
                State::OuterLength => {
                    sequence = self.read_length(Field::SequenceLength)?;
                    if sequence.value > self.remaining() {
                        return Err(LaxDerError::Truncated(Field::SequenceLength));
                    }
                    content_start = self.pos;
                    State::IntegerTag(Pending::R)
                }
                State::IntegerTag(pending) => {
                    self.expect_tag(Field::IntegerTag(pending.component()), INTEGER_TAG)?;
                    State::IntegerLength(pending)
                }
                State::IntegerLength(Pending::R) => {
                    State::IntegerTag(Pending::S(self.read_integer(Component::R)?))
                }
                State::IntegerLength(Pending::S(r)) => {
                    State::Done(r, self.read_integer(Component::S)?)
                }
                State::Done(r, s) => break (r, s),
            };
        };

        deviations.non_minimal_length |= sequence.non_minimal;
        self.integer_deviations(&r, &mut deviations);
        self.integer_deviations(&s, &mut deviations);
        deviations.sequence_length_mismatch = sequence.value != self.pos - content_start;
        deviations.trailing_bytes = self.pos < self.input.len();

        let values = SignatureValues::new(
            self.normalize(Component::R, &r)?,
            self.normalize(Component::S, &s)?,
        );
        Ok(LaxDerSignature {
            values,
            deviations,
            consumed: self.pos,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::get_context;

    fn parse(input: &[u8]) -> Result<SignatureValues, LaxDerError> {
        parse_lax_der(get_context(), input)
    }

    fn scalar(tail: &[u8]) -> [u8; SCALAR_LEN] {
        let mut out = [0u8; SCALAR_LEN];
        out[SCALAR_LEN - tail.len()..].copy_from_slice(tail);
        out
    }

    #[test]
    fn minimal_sequence() {
        let values = parse(&[0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02]).unwrap();
        assert_eq!(values.r(), &scalar(&[1]));
        assert_eq!(values.s(), &scalar(&[2]));
    }

    #[test]
    fn zero_integer_is_rejected() {
        assert_eq!(
            parse(&[0x30, 0x06, 0x02, 0x01, 0x00, 0x02, 0x01, 0x02]),
            Err(LaxDerError::ZeroInteger(Component::R))
        );
        assert_eq!(
            parse(&[0x30, 0x07, 0x02, 0x01, 0x01, 0x02, 0x02, 0x00, 0x00]),
            Err(LaxDerError::ZeroInteger(Component::S))
        );
    }

    #[test]
    fn empty_integer_is_rejected() {
        assert_eq!(
            parse(&[0x30, 0x05, 0x02, 0x00, 0x02, 0x01, 0x02]),
            Err(LaxDerError::EmptyInteger(Component::R))
        );
        assert_eq!(
            parse(&[0x30, 0x05, 0x02, 0x01, 0x01, 0x02, 0x00]),
            Err(LaxDerError::EmptyInteger(Component::S))
        );
        // indefinite marker decodes as a zero length
        assert_eq!(
            parse(&[0x30, 0x05, 0x02, 0x80, 0x02, 0x01, 0x02]),
            Err(LaxDerError::EmptyInteger(Component::R))
        );
    }

    #[test]
    fn wrong_tags() {
        assert_eq!(
            parse(&[0x31, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02]),
            Err(LaxDerError::UnexpectedTag {
                field: Field::SequenceTag,
                found: 0x31
            })
        );
        assert_eq!(
            parse(&[0x30, 0x06, 0x03, 0x01, 0x01, 0x02, 0x01, 0x02]),
            Err(LaxDerError::UnexpectedTag {
                field: Field::IntegerTag(Component::R),
                found: 0x03
            })
        );
        assert_eq!(
            parse(&[0x30, 0x06, 0x02, 0x01, 0x01, 0x04, 0x01, 0x02]),
            Err(LaxDerError::UnexpectedTag {
                field: Field::IntegerTag(Component::S),
                found: 0x04
            })
        );
    }

    #[test]
    fn empty_and_tiny_inputs() {
        assert_eq!(parse(&[]), Err(LaxDerError::Truncated(Field::SequenceTag)));
        assert_eq!(
            parse(&[0x30]),
            Err(LaxDerError::Truncated(Field::SequenceLength))
        );
        assert_eq!(
            parse(&[0x30, 0x00]),
            Err(LaxDerError::Truncated(Field::IntegerTag(Component::R)))
        );
    }

    #[test]
    fn every_truncation_fails() {
        let sig = [0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02];
        for len in 0..sig.len() {
            assert!(parse(&sig[..len]).is_err(), "prefix of length {len} decoded");
        }
    }

    #[test]
    fn declared_lengths_past_the_end() {
        assert_eq!(
            parse(&[0x30, 0x07, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02]),
            Err(LaxDerError::Truncated(Field::SequenceLength))
        );
        assert_eq!(
            parse(&[0x30, 0x00, 0x02, 0x05, 0x01, 0x02, 0x01, 0x02]),
            Err(LaxDerError::Truncated(Field::IntegerContent(Component::R)))
        );
        assert_eq!(
            parse(&[0x30, 0x00, 0x02, 0x01, 0x01, 0x02, 0x02, 0x02]),
            Err(LaxDerError::Truncated(Field::IntegerContent(Component::S)))
        );
        // long form announcing more length bytes than are left
        assert_eq!(
            parse(&[0x30, 0x84, 0x00, 0x00]),
            Err(LaxDerError::Truncated(Field::SequenceLength))
        );
    }

    #[test]
    fn long_form_lengths() {
        let expected = parse(&[0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02]).unwrap();
        let sig = [
            0x30, 0x81, 0x0a, 0x02, 0x82, 0x00, 0x01, 0x01, 0x02, 0x84, 0x00, 0x00, 0x00, 0x01,
            0x02,
        ];
        let decoded = decode_lax_der(get_context(), &sig).unwrap();
        assert_eq!(decoded.values(), &expected);
        assert!(decoded.deviations().non_minimal_length);
        assert_eq!(decoded.consumed(), sig.len());
    }

    #[test]
    fn zero_length_bytes_do_not_count_towards_the_limit() {
        let sig = [
            0x30, 0x0c, 0x02, 0x86, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x01, 0x02, 0x01, 0x02,
        ];
        let values = parse(&sig).unwrap();
        assert_eq!(values.r(), &scalar(&[1]));
    }

    #[test]
    fn length_overflow() {
        // four significant length bytes
        assert_eq!(
            parse(&[0x30, 0x06, 0x02, 0x84, 0x01, 0x00, 0x00, 0x00, 0x01]),
            Err(LaxDerError::LengthOverflow(Field::IntegerLength(Component::R)))
        );
        assert_eq!(
            parse(&[0x30, 0x84, 0x01, 0x00, 0x00, 0x00]),
            Err(LaxDerError::LengthOverflow(Field::SequenceLength))
        );
        // three significant bytes are accepted and then checked against the input
        assert_eq!(
            parse(&[0x30, 0x83, 0x01, 0x00, 0x00, 0x02]),
            Err(LaxDerError::Truncated(Field::SequenceLength))
        );
    }

    #[test]
    fn leading_zero_padding() {
        let expected = parse(&[0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02]).unwrap();
        let sig = [
            0x30, 0x0a, 0x02, 0x04, 0x00, 0x00, 0x00, 0x01, 0x02, 0x02, 0x00, 0x02,
        ];
        let decoded = decode_lax_der(get_context(), &sig).unwrap();
        assert_eq!(decoded.values(), &expected);
        assert!(decoded.deviations().excess_padding);
        assert!(!decoded.deviations().non_minimal_length);
    }

    #[test]
    fn sign_byte_and_negative_integers() {
        let padded = [0x30, 0x07, 0x02, 0x02, 0x00, 0x80, 0x02, 0x01, 0x02];
        let decoded = decode_lax_der(get_context(), &padded).unwrap();
        assert!(decoded.deviations().is_canonical());
        assert_eq!(decoded.values().r(), &scalar(&[0x80]));

        let negative = [0x30, 0x06, 0x02, 0x01, 0x80, 0x02, 0x01, 0x02];
        let decoded = decode_lax_der(get_context(), &negative).unwrap();
        assert!(decoded.deviations().negative_integer);
        assert_eq!(decoded.values().r(), &scalar(&[0x80]));
    }

    #[test]
    fn trailing_bytes_and_length_mismatch() {
        let sig = [0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02, 0xde, 0xad];
        let decoded = decode_lax_der(get_context(), &sig).unwrap();
        assert!(decoded.deviations().trailing_bytes);
        assert!(!decoded.deviations().sequence_length_mismatch);
        assert_eq!(decoded.consumed(), 8);

        // the sequence may claim fewer bytes than the integers use
        let short = [0x30, 0x02, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02];
        let decoded = decode_lax_der(get_context(), &short).unwrap();
        assert!(decoded.deviations().sequence_length_mismatch);
        assert_eq!(decoded.values().s(), &scalar(&[2]));
    }

    #[test]
    fn thirty_two_significant_bytes() {
        let mut sig = vec![0x30, 0x26, 0x02, 0x21, 0x00];
        sig.extend_from_slice(&[0xff; 32]);
        sig.extend_from_slice(&[0x02, 0x01, 0x01]);
        let values = parse(&sig).unwrap();
        assert_eq!(values.r(), &[0xff; 32]);
    }

    #[test]
    fn oversized_integer() {
        let mut sig = vec![0x30, 0x26, 0x02, 0x21, 0x01];
        sig.extend_from_slice(&[0x00; 32]);
        sig.extend_from_slice(&[0x02, 0x01, 0x01]);
        assert_eq!(
            parse(&sig),
            Err(LaxDerError::OversizedInteger(Component::R))
        );

        let mut sig = vec![0x30, 0x26, 0x02, 0x01, 0x01, 0x02, 0x21];
        sig.extend_from_slice(&[0x7f; 33]);
        assert_eq!(
            parse(&sig),
            Err(LaxDerError::OversizedInteger(Component::S))
        );
    }

    #[test]
    fn many_leading_zeros_before_a_full_width_value() {
        let mut sig = vec![0x30, 0x81, 0x35, 0x02, 0x30];
        sig.extend_from_slice(&[0x00; 16]);
        sig.extend_from_slice(&[0xab; 32]);
        sig.extend_from_slice(&[0x02, 0x01, 0x01]);
        let values = parse(&sig).unwrap();
        assert_eq!(values.r(), &[0xab; 32]);
    }

    #[test]
    fn errors_display() {
        assert_eq!(
            LaxDerError::Truncated(Field::IntegerContent(Component::S)).to_string(),
            "input truncated in S value"
        );
        assert_eq!(
            LaxDerError::UnexpectedTag {
                field: Field::SequenceTag,
                found: 0x31
            }
            .to_string(),
            "unexpected tag 0x31 for sequence tag"
        );
    }
}
