use std::{
    collections::BTreeMap,
    fmt,
    ops::{Deref, DerefMut},
};

/// The universal RPC value exchanged with the peer.
///
/// Every request parameter and every response is a `Value` tree. The
/// variants map 1:1 onto the wire type codes; see the crate documentation
/// for the encoding of each.
///
/// `Value` has plain copy semantics - cloning a value clones the whole
/// tree. Aliasing, where wanted, is the caller's business (wrap the value
/// in an [`std::sync::Arc`]); reference cycles are not part of the protocol
/// and cannot be expressed.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// No value.
    ///
    /// Encoded as an empty string by default for compatibility with peers
    /// that predate the dedicated void type code (see
    /// [`Encoder::encode_void`](crate::Encoder::encode_void)).
    #[default]
    Void,

    /// A signed 32-bit integer.
    Int32(i32),

    /// A signed 64-bit integer.
    Int64(i64),

    /// A boolean, one byte on the wire.
    Bool(bool),

    /// A floating point number.
    ///
    /// The wire format is the protocol's mantissa/exponent encoding, which
    /// quantises to roughly 9 significant decimal digits - not IEEE-754.
    Float(f64),

    /// A length-prefixed UTF-8 string.
    String(String),

    /// A string carrying base64 encoded data, tagged distinctly on the
    /// wire.
    Base64(String),

    /// An opaque byte blob.
    Binary(Vec<u8>),

    /// An ordered sequence of values.
    Array(Vec<Value>),

    /// A string-keyed mapping with deterministic iteration order.
    Struct(StructValue),
}

/// The payload of a [`Value::Struct`]: named members plus the error
/// marker.
///
/// Member iteration order is the key order, so two structs built by
/// inserting the same members in different orders compare (and encode)
/// identically. Only structs can represent protocol faults, which is why
/// the error flag lives here rather than on [`Value`] itself.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StructValue {
    members: BTreeMap<String, Value>,
    error: bool,
}

impl StructValue {
    /// Construct an empty struct.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if this struct is marked as a protocol fault.
    pub fn is_error(&self) -> bool {
        self.error
    }

    /// Mark (or unmark) this struct as a protocol fault.
    pub fn set_error(&mut self, error: bool) {
        self.error = error;
    }
}

impl Deref for StructValue {
    type Target = BTreeMap<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.members
    }
}

impl DerefMut for StructValue {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.members
    }
}

impl FromIterator<(String, Value)> for StructValue {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            members: iter.into_iter().collect(),
            error: false,
        }
    }
}

impl Value {
    /// Construct an error value: a struct flagged as a fault, carrying
    /// `faultCode` and `faultString` members.
    pub fn error(fault_code: i32, fault_string: impl Into<String>) -> Self {
        let mut s = StructValue::new();
        s.insert("faultCode".to_owned(), Value::Int32(fault_code));
        s.insert("faultString".to_owned(), Value::String(fault_string.into()));
        s.set_error(true);
        Value::Struct(s)
    }

    /// Returns true if this value is an error-flagged struct.
    pub fn is_error(&self) -> bool {
        match self {
            Value::Struct(s) => s.is_error(),
            _ => false,
        }
    }

    /// The `faultCode` member of an error struct, if present.
    pub fn fault_code(&self) -> Option<i32> {
        match self {
            Value::Struct(s) => s.get("faultCode").map(Value::as_i32),
            _ => None,
        }
    }

    /// The `faultString` member of an error struct, if present.
    pub fn fault_string(&self) -> Option<&str> {
        match self {
            Value::Struct(s) => match s.get("faultString") {
                Some(Value::String(v)) => Some(v),
                _ => None,
            },
            _ => None,
        }
    }

    /// A 32-bit integer view of this value.
    ///
    /// Numeric variants coerce (floats round to the nearest integer); all
    /// other variants yield 0.
    pub fn as_i32(&self) -> i32 {
        match self {
            Value::Int32(v) => *v,
            Value::Int64(v) => *v as i32,
            Value::Float(v) => v.round() as i32,
            Value::Bool(v) => *v as i32,
            _ => 0,
        }
    }

    /// A 64-bit integer view of this value, coercing as [`Value::as_i32`]
    /// does.
    pub fn as_i64(&self) -> i64 {
        match self {
            Value::Int32(v) => i64::from(*v),
            Value::Int64(v) => *v,
            Value::Float(v) => v.round() as i64,
            Value::Bool(v) => *v as i64,
            _ => 0,
        }
    }

    /// A floating point view of this value: integers widen, everything
    /// non-numeric yields 0.0.
    pub fn as_f64(&self) -> f64 {
        match self {
            Value::Int32(v) => f64::from(*v),
            Value::Int64(v) => *v as f64,
            Value::Float(v) => *v,
            Value::Bool(v) => f64::from(u8::from(*v)),
            _ => 0.0,
        }
    }

    /// The boolean payload, or false for every other variant.
    pub fn as_bool(&self) -> bool {
        match self {
            Value::Bool(v) => *v,
            _ => false,
        }
    }

    /// The string payload of a string or base64 value, or `""` for every
    /// other variant.
    pub fn as_str(&self) -> &str {
        match self {
            Value::String(v) | Value::Base64(v) => v,
            _ => "",
        }
    }

    /// The name of this value's wire type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Void => "void",
            Value::Int32(_) => "integer",
            Value::Int64(_) => "integer64",
            Value::Bool(_) => "boolean",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Base64(_) => "base64",
            Value::Binary(_) => "binary",
            Value::Array(_) => "array",
            Value::Struct(_) => "struct",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => write!(f, "(void)"),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{:?}", v),
            Value::Base64(v) => write!(f, "(base64) {:?}", v),
            Value::Binary(v) => {
                write!(f, "(binary, {} bytes)", v.len())
            }
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Struct(s) => {
                if s.is_error() {
                    f.write_str("(error) ")?;
                }
                f.write_str("{")?;
                for (i, (name, member)) in s.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", name, member)?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Binary(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl From<StructValue> for Value {
    fn from(v: StructValue) -> Self {
        Value::Struct(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_value_shape() {
        let v = Value::error(-32601, "Requested method not found.");

        assert!(v.is_error());
        assert_eq!(v.fault_code(), Some(-32601));
        assert_eq!(v.fault_string(), Some("Requested method not found."));
    }

    #[test]
    fn test_plain_struct_is_not_error() {
        let mut s = StructValue::new();
        s.insert("faultCode".to_owned(), Value::Int32(-1));
        s.insert("faultString".to_owned(), Value::String("x".to_owned()));

        // Shape alone does not make a fault - the flag does.
        assert!(!Value::Struct(s).is_error());
    }

    #[test]
    fn test_numeric_coercions() {
        assert_eq!(Value::Int32(42).as_i64(), 42);
        assert_eq!(Value::Int32(42).as_f64(), 42.0);
        assert_eq!(Value::Int64(1 << 40).as_i32(), 0); // truncates
        assert_eq!(Value::Float(2.5).as_i32(), 3); // rounds to nearest
        assert_eq!(Value::Float(-2.5).as_i64(), -3);
        assert_eq!(Value::Bool(true).as_i32(), 1);
        assert_eq!(Value::String("7".to_owned()).as_i32(), 0);
    }

    #[test]
    fn test_string_views() {
        assert_eq!(Value::String("abc".to_owned()).as_str(), "abc");
        assert_eq!(Value::Base64("YWJj".to_owned()).as_str(), "YWJj");
        assert_eq!(Value::Int32(1).as_str(), "");
    }

    #[test]
    fn test_struct_key_order_is_deterministic() {
        let a: StructValue = [
            ("b".to_owned(), Value::Int32(2)),
            ("a".to_owned(), Value::Int32(1)),
        ]
        .into_iter()
        .collect();
        let b: StructValue = [
            ("a".to_owned(), Value::Int32(1)),
            ("b".to_owned(), Value::Int32(2)),
        ]
        .into_iter()
        .collect();

        assert_eq!(a, b);
        assert_eq!(
            a.keys().collect::<Vec<_>>(),
            b.keys().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_display() {
        let v = Value::Array(vec![
            Value::Int32(7),
            Value::String("x".to_owned()),
            Value::error(-1, "undefined"),
        ]);

        assert_eq!(
            v.to_string(),
            r#"[7, "x", (error) {faultCode: -1, faultString: "undefined"}]"#
        );
    }
}
