use crate::error::{Error, Result};

use nom::{
    bytes::complete::{tag, take_while_m_n},
    character::complete::char,
    combinator::{eof, recognize},
    sequence::tuple,
    IResult,
};
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Name reported when a body carries input beyond the last field.
pub const TRAILING: &str = "end of body";

/// Textual shape of one field on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldFormat {
    /// Exactly `n` ASCII digits.
    Digits(usize),
    /// Exactly `int` digits, a `.`, then exactly `frac` digits.
    Decimal(usize, usize),
}

impl FieldFormat {
    fn parse<'a>(&self, input: &'a str) -> IResult<&'a str, &'a str> {
        match *self {
            FieldFormat::Digits(n) => digits(n)(input),
            FieldFormat::Decimal(int, frac) => {
                recognize(tuple((digits(int), char('.'), digits(frac))))(input)
            }
        }
    }
}

fn digits<'a>(n: usize) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    take_while_m_n(n, n, |c: char| c.is_ascii_digit())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Float,
    Integer,
    Text,
}

impl FieldKind {
    fn name(&self) -> &'static str {
        match self {
            FieldKind::Float => "float",
            FieldKind::Integer => "integer",
            FieldKind::Text => "text",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub format: FieldFormat,
    pub kind: FieldKind,
}

impl Field {
    pub const fn new(name: &'static str, format: FieldFormat, kind: FieldKind) -> Self {
        Self { name, format, kind }
    }

    const fn float(name: &'static str, int: usize, frac: usize) -> Self {
        Self::new(name, FieldFormat::Decimal(int, frac), FieldKind::Float)
    }

    const fn integer(name: &'static str, width: usize) -> Self {
        Self::new(name, FieldFormat::Digits(width), FieldKind::Integer)
    }

    const fn text(name: &'static str, width: usize) -> Self {
        Self::new(name, FieldFormat::Digits(width), FieldKind::Text)
    }

    fn convert(&self, text: &str) -> Result<Value> {
        let value = match self.kind {
            FieldKind::Float => text.parse().map(Value::Float).ok(),
            FieldKind::Integer => text.parse().map(Value::Integer).ok(),
            FieldKind::Text => Some(Value::Text(text.to_string())),
        };

        value.ok_or_else(|| Error::FieldTypeError {
            field: self.name,
            value: text.to_string(),
            kind: self.kind.name(),
        })
    }
}

/// Ordered, space-separated field layout of a response body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Grammar {
    pub fields: &'static [Field],
}

// QPIGS {{{
pub static STATUS: Grammar = Grammar {
    fields: &[
        Field::float("grid_voltage", 3, 1),                // V
        Field::float("grid_frequency", 2, 1),              // Hz
        Field::float("ac_output_voltage", 3, 1),           // V
        Field::float("ac_output_frequency", 2, 1),         // Hz
        Field::integer("ac_output_apparent_power", 4),     // VA
        Field::integer("ac_output_active_power", 4),       // W
        Field::integer("ac_output_load", 3),               // %
        Field::integer("bus_voltage", 3),                  // V
        Field::float("battery_voltage", 2, 2),             // V
        Field::integer("battery_charging_current", 3),     // A
        Field::integer("battery_percent", 3),              // %
        Field::integer("heat_sink_temperature", 4),        // C
        Field::float("pv_current", 2, 1),                  // A
        Field::float("pv_voltage", 3, 1),                  // V
        Field::float("scc_voltage", 2, 2),                 // V
        Field::integer("battery_discharge_current", 5),    // A
        Field::text("smth_1", 8),
        Field::integer("smth_2", 2),
        Field::integer("smth_3", 2),
        Field::integer("pv_power", 5),                     // W
        Field::integer("smth_4", 3),
    ],
}; // }}}

impl Grammar {
    /// Decodes `body` into one value per field.
    ///
    /// The whole body is matched structurally before any field is typed, so a structural problem
    /// is always reported as `GrammarMismatch` even if an earlier field would fail to convert.
    pub fn decode(&self, body: &str) -> Result<DecodedResponse> {
        let texts = self.split(body)?;

        let fields = self
            .fields
            .iter()
            .zip(texts)
            .map(|(field, text)| Ok((field.name, field.convert(text)?)))
            .collect::<Result<Vec<_>>>()?;

        Ok(DecodedResponse { fields })
    }

    fn split<'a>(&self, body: &'a str) -> Result<Vec<&'a str>> {
        let offset = |rest: &str| body.len() - rest.len();
        let mut rest = body;
        let mut texts = Vec::with_capacity(self.fields.len());

        for (i, field) in self.fields.iter().enumerate() {
            let mismatch = |rest: &str| Error::GrammarMismatch {
                field: field.name,
                offset: offset(rest),
            };

            if i > 0 {
                rest = separator(rest).map_err(|_| mismatch(rest))?.0;
            }

            let (after, text) = field.format.parse(rest).map_err(|_| mismatch(rest))?;

            // a field may only end at a separator or at the end of the body
            if boundary(after).is_err() {
                return Err(mismatch(rest));
            }

            texts.push(text);
            rest = after;
        }

        if eof::<_, nom::error::Error<&str>>(rest).is_err() {
            return Err(Error::GrammarMismatch {
                field: TRAILING,
                offset: offset(rest),
            });
        }

        Ok(texts)
    }
}

fn separator(input: &str) -> IResult<&str, &str> {
    tag(" ")(input)
}

fn boundary(input: &str) -> IResult<&str, &str> {
    nom::combinator::peek(nom::branch::alt((separator, eof)))(input)
}

/// A typed field value.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum Value {
    Float(f64),
    Integer(i64),
    Text(String),
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // Debug keeps the decimal point on whole numbers (230.0, not 230)
            Value::Float(v) => write!(f, "{:?}", v),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "{}", v),
        }
    }
}

/// Every field of a grammar, typed, in wire order.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedResponse {
    fields: Vec<(&'static str, Value)>,
}

impl DecodedResponse {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.fields.iter().map(|(name, value)| (*name, value))
    }
}

impl Serialize for DecodedResponse {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// One `name value` line per field.
impl std::fmt::Display for DecodedResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (name, value) in &self.fields {
            writeln!(f, "{} {}", name, value)?;
        }
        Ok(())
    }
}
