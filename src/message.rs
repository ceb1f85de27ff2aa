//! Encoding and decoding of complete RPC messages.
//!
//! A request is the 4-byte `Bin` prefix (3 magic bytes plus a flags byte),
//! an optional name/value header block, a big-endian payload length word
//! and the payload: a length-prefixed method name, a parameter count, and
//! the parameters. A response payload is a single parameter. Each
//! parameter is tagged with a 32-bit type code.

use crate::{
    codec::{self, Reader},
    value::{StructValue, Value},
};

const TYPE_VOID: i32 = 0x00;
const TYPE_INTEGER: i32 = 0x01;
const TYPE_BOOLEAN: i32 = 0x02;
const TYPE_STRING: i32 = 0x03;
const TYPE_FLOAT: i32 = 0x04;
const TYPE_BASE64: i32 = 0x11;
const TYPE_BINARY: i32 = 0xD0;
const TYPE_INTEGER64: i32 = 0xD1;
const TYPE_ARRAY: i32 = 0x100;
const TYPE_STRUCT: i32 = 0x101;

/// Flags byte: this frame is a response.
pub(crate) const FLAG_RESPONSE: u8 = 0x01;
/// Flags byte: a header block precedes the payload.
pub(crate) const FLAG_HEADER: u8 = 0x40;
/// Flags byte: this frame is an error response.
pub(crate) const FLAG_ERROR_RESPONSE: u8 = 0xFF;

/// Request parameter lists declaring more than this many entries decode to
/// an empty list instead of allocating attacker-controlled amounts of
/// memory. Nested containers are bounded by the frame size caps.
const MAX_REQUEST_PARAMETERS: i32 = 100;

/// Containers nested deeper than this decode as void: the recursion depth
/// must not be attacker-controlled.
const MAX_DEPTH: u32 = 64;

/// The optional name/value block prepended to a request.
///
/// Only the `authorization` name is defined; unknown names are parsed and
/// discarded. Names are matched case-insensitively.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    authorization: Option<String>,
}

impl Header {
    /// An empty header.
    pub fn new() -> Self {
        Self::default()
    }

    /// A header carrying an `authorization` value.
    pub fn with_authorization(value: impl Into<String>) -> Self {
        Self {
            authorization: Some(value.into()),
        }
    }

    /// The `authorization` value, if one was set or received.
    pub fn authorization(&self) -> Option<&str> {
        self.authorization.as_deref()
    }

    /// Serialise the header block: a length word counting the pair-count
    /// word and the pairs, then the count, then the pairs.
    fn serialise_into(&self, buf: &mut Vec<u8>) {
        let mut block = Vec::new();
        let mut count = 0i32;
        if let Some(v) = &self.authorization {
            count += 1;
            codec::put_str(&mut block, "authorization");
            codec::put_str(&mut block, v);
        }

        codec::put_i32(buf, block.len() as i32 + 4);
        codec::put_i32(buf, count);
        buf.extend_from_slice(&block);
    }
}

/// Serialises requests and responses into framed byte vectors.
///
/// The two options mirror the quirks of the wire format: integers may be
/// forced onto the 64-bit type code, and [`Value::Void`] historically
/// encodes as an empty string rather than the dedicated void code.
#[derive(Debug, Clone, Default)]
pub struct Encoder {
    force_integer64: bool,
    encode_void: bool,
}

impl Encoder {
    /// An encoder with the default wire behaviour.
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode every integer as the 8-byte 0xD1 form, regardless of the
    /// value's own width.
    pub fn force_integer64(mut self, force: bool) -> Self {
        self.force_integer64 = force;
        self
    }

    /// Encode [`Value::Void`] as the dedicated 0x00 type code instead of
    /// an empty string.
    pub fn encode_void(mut self, encode: bool) -> Self {
        self.encode_void = encode;
        self
    }

    /// Serialise a request invoking `method` with `parameters`.
    pub fn encode_request(
        &self,
        method: &str,
        parameters: &[Value],
        header: Option<&Header>,
    ) -> Vec<u8> {
        let mut buf = vec![b'B', b'i', b'n', 0x00];
        if let Some(header) = header {
            buf[3] |= FLAG_HEADER;
            header.serialise_into(&mut buf);
        }

        let mut payload = Vec::new();
        codec::put_str(&mut payload, method);
        codec::put_i32(&mut payload, parameters.len() as i32);
        for parameter in parameters {
            self.encode_value(&mut payload, parameter);
        }

        codec::put_i32(&mut buf, payload.len() as i32);
        buf.extend_from_slice(&payload);
        buf
    }

    /// Serialise a response carrying `value`. Error values are flagged
    /// `0xFF` in the prefix.
    pub fn encode_response(&self, value: &Value) -> Vec<u8> {
        let mut buf = vec![b'B', b'i', b'n', FLAG_RESPONSE];
        if value.is_error() {
            buf[3] = FLAG_ERROR_RESPONSE;
        }

        let mut payload = Vec::new();
        self.encode_value(&mut payload, value);

        codec::put_i32(&mut buf, payload.len() as i32);
        buf.extend_from_slice(&payload);
        buf
    }

    fn encode_value(&self, buf: &mut Vec<u8>, value: &Value) {
        match value {
            Value::Void => {
                if self.encode_void {
                    codec::put_i32(buf, TYPE_VOID);
                } else {
                    codec::put_i32(buf, TYPE_STRING);
                    codec::put_str(buf, "");
                }
            }
            Value::Int32(v) => {
                if self.force_integer64 {
                    codec::put_i32(buf, TYPE_INTEGER64);
                    codec::put_i64(buf, i64::from(*v));
                } else {
                    codec::put_i32(buf, TYPE_INTEGER);
                    codec::put_i32(buf, *v);
                }
            }
            Value::Int64(v) => {
                codec::put_i32(buf, TYPE_INTEGER64);
                codec::put_i64(buf, *v);
            }
            Value::Bool(v) => {
                codec::put_i32(buf, TYPE_BOOLEAN);
                codec::put_bool(buf, *v);
            }
            Value::Float(v) => {
                codec::put_i32(buf, TYPE_FLOAT);
                codec::put_f64(buf, *v);
            }
            Value::String(v) => {
                codec::put_i32(buf, TYPE_STRING);
                codec::put_str(buf, v);
            }
            Value::Base64(v) => {
                codec::put_i32(buf, TYPE_BASE64);
                codec::put_str(buf, v);
            }
            Value::Binary(v) => {
                codec::put_i32(buf, TYPE_BINARY);
                codec::put_bytes(buf, v);
            }
            Value::Array(items) => {
                codec::put_i32(buf, TYPE_ARRAY);
                codec::put_i32(buf, items.len() as i32);
                for item in items {
                    self.encode_value(buf, item);
                }
            }
            Value::Struct(members) => {
                codec::put_i32(buf, TYPE_STRUCT);
                codec::put_i32(buf, members.len() as i32);
                for (name, member) in members.iter() {
                    codec::put_str(buf, name);
                    self.encode_value(buf, member);
                }
            }
        }
    }
}

/// Decode a request frame into its method name and parameter list.
///
/// A parameter count above 100 yields an empty list; see the module
/// documentation for the rationale.
pub fn decode_request(packet: &[u8]) -> (String, Vec<Value>) {
    let mut header_size = 0;
    if packet.len() > 3 && packet[3] & FLAG_HEADER != 0 {
        header_size = Reader::at(packet, 4).get_i32().max(0) as usize + 4;
    }

    let mut r = Reader::at(packet, 8 + header_size);
    let method = r.get_str();
    let count = r.get_i32();
    if !(0..=MAX_REQUEST_PARAMETERS).contains(&count) {
        return (method, Vec::new());
    }

    let mut parameters = Vec::with_capacity(count as usize);
    for _ in 0..count {
        parameters.push(decode_value(&mut r, 0));
    }
    (method, parameters)
}

/// Decode a response frame into its single payload value.
///
/// Frames flagged `0xFF` decode to an error-marked struct, with
/// `faultCode = -1` and `faultString = "undefined"` injected if the peer
/// omitted them.
pub fn decode_response(packet: &[u8]) -> Value {
    let mut r = Reader::at(packet, 8);
    let mut value = decode_value(&mut r, 0);
    if packet.len() < 4 {
        return value;
    }

    if packet[3] == FLAG_ERROR_RESPONSE {
        let mut s = match value {
            Value::Struct(s) => s,
            // A malformed error response without a struct payload still
            // surfaces as a fault rather than a bare value.
            _ => StructValue::new(),
        };
        s.entry("faultCode".to_owned())
            .or_insert(Value::Int32(-1));
        s.entry("faultString".to_owned())
            .or_insert_with(|| Value::String("undefined".to_owned()));
        s.set_error(true);
        value = Value::Struct(s);
    }
    value
}

/// Decode the header block of a request frame. Frames without the header
/// flag yield an empty [`Header`].
pub fn decode_header(packet: &[u8]) -> Header {
    let mut header = Header::new();
    if packet.len() < 12 || packet[3] & FLAG_HEADER == 0 {
        return header;
    }

    let mut r = Reader::at(packet, 4);
    let header_size = r.get_i32();
    if header_size < 4 {
        return header;
    }

    let count = r.get_i32();
    for _ in 0..count {
        let name = r.get_str();
        let value = r.get_str();
        if name.eq_ignore_ascii_case("authorization") {
            header.authorization = Some(value);
        }
    }
    header
}

fn decode_value(r: &mut Reader<'_>, depth: u32) -> Value {
    if depth > MAX_DEPTH {
        return Value::Void;
    }
    match r.get_i32() {
        TYPE_INTEGER => Value::Int32(r.get_i32()),
        TYPE_INTEGER64 => Value::Int64(r.get_i64()),
        TYPE_BOOLEAN => Value::Bool(r.get_bool()),
        TYPE_FLOAT => Value::Float(r.get_f64()),
        TYPE_STRING => Value::String(r.get_str()),
        TYPE_BASE64 => Value::Base64(r.get_str()),
        TYPE_BINARY => Value::Binary(r.get_bytes()),
        TYPE_ARRAY => {
            let count = r.get_i32().max(0);
            let mut items = Vec::new();
            for _ in 0..count {
                // A declared count cannot manufacture elements out of an
                // exhausted buffer.
                if r.remaining() == 0 {
                    break;
                }
                items.push(decode_value(r, depth + 1));
            }
            Value::Array(items)
        }
        TYPE_STRUCT => {
            let count = r.get_i32().max(0);
            let mut members = StructValue::new();
            for _ in 0..count {
                if r.remaining() == 0 {
                    break;
                }
                let name = r.get_str();
                let member = decode_value(r, depth + 1);
                members.insert(name, member);
            }
            // A two-member struct holding exactly the fault pair is an
            // error result even without the 0xFF prefix.
            if members.len() == 2
                && members.contains_key("faultCode")
                && members.contains_key("faultString")
            {
                members.set_error(true);
            }
            Value::Struct(members)
        }
        _ => Value::Void,
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_encode_request() {
        let got = Encoder::new().encode_request("ping", &[Value::Int32(7)], None);

        assert_eq!(
            got,
            hex!(
                "42696e00"  // "Bin", plain request
                "00000014"  // payload length
                "00000004 70696e67"  // method "ping"
                "00000001"  // parameter count
                "00000001 00000007"  // i32 7
            )
        );
    }

    #[test]
    fn test_encode_response() {
        let got = Encoder::new().encode_response(&Value::Int32(7));

        assert_eq!(got, hex!("42696e01 00000008 00000001 00000007"));
    }

    #[test]
    fn test_encode_error_response_sets_error_flags() {
        let got = Encoder::new().encode_response(&Value::error(-1, "undefined"));

        assert_eq!(got[3], 0xFF);
        let decoded = decode_response(&got);
        assert!(decoded.is_error());
        assert_eq!(decoded.fault_code(), Some(-1));
        assert_eq!(decoded.fault_string(), Some("undefined"));
    }

    #[test]
    fn test_decode_request() {
        let packet = Encoder::new().encode_request(
            "echo",
            &[
                Value::Int64(42),
                Value::Int32(5),
                Value::Array(vec![Value::Bool(true), Value::String("x".to_owned())]),
            ],
            None,
        );

        let (method, parameters) = decode_request(&packet);
        assert_eq!(method, "echo");
        assert_eq!(
            parameters,
            vec![
                Value::Int64(42),
                Value::Int32(5),
                Value::Array(vec![Value::Bool(true), Value::String("x".to_owned())]),
            ]
        );
    }

    #[test]
    fn test_request_header_round_trip() {
        let header = Header::with_authorization("Basic dXNlcjpwYXNz");
        let packet =
            Encoder::new().encode_request("ping", &[Value::Int32(1)], Some(&header));

        assert_eq!(packet[3], 0x40);
        assert_eq!(decode_header(&packet), header);

        // The payload decodes identically with or without the header.
        let (method, parameters) = decode_request(&packet);
        assert_eq!(method, "ping");
        assert_eq!(parameters, vec![Value::Int32(1)]);
    }

    #[test]
    fn test_header_names_are_case_insensitive() {
        let mut packet = vec![b'B', b'i', b'n', 0x40];
        let mut block = Vec::new();
        crate::codec::put_i32(&mut block, 1);
        crate::codec::put_str(&mut block, "AUTHORIZATION");
        crate::codec::put_str(&mut block, "token");
        crate::codec::put_i32(&mut packet, block.len() as i32);
        packet.extend_from_slice(&block);
        crate::codec::put_i32(&mut packet, 0);

        assert_eq!(decode_header(&packet).authorization(), Some("token"));
    }

    #[test]
    fn test_empty_header_still_sets_flag() {
        let packet = Encoder::new().encode_request("ping", &[], Some(&Header::new()));

        assert_eq!(packet[3], 0x40);
        assert_eq!(decode_header(&packet), Header::new());
        assert_eq!(decode_request(&packet).0, "ping");
    }

    #[test]
    fn test_request_parameter_flood_yields_empty_list() {
        let parameters: Vec<Value> = (0..101).map(Value::Int32).collect();
        let packet = Encoder::new().encode_request("flood", &parameters, None);

        let (method, decoded) = decode_request(&packet);
        assert_eq!(method, "flood");
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_negative_parameter_count_yields_empty_list() {
        let mut packet = vec![b'B', b'i', b'n', 0x00];
        let mut payload = Vec::new();
        crate::codec::put_str(&mut payload, "x");
        crate::codec::put_i32(&mut payload, -1);
        crate::codec::put_i32(&mut packet, payload.len() as i32);
        packet.extend_from_slice(&payload);

        assert!(decode_request(&packet).1.is_empty());
    }

    #[test]
    fn test_void_encodes_as_empty_string_by_default() {
        let packet = Encoder::new().encode_response(&Value::Void);
        assert_eq!(packet, hex!("42696e01 00000008 00000003 00000000"));

        // The default form decodes as an empty string, not void.
        assert_eq!(decode_response(&packet), Value::String(String::new()));

        let packet = Encoder::new().encode_void(true).encode_response(&Value::Void);
        assert_eq!(packet, hex!("42696e01 00000004 00000000"));
        assert_eq!(decode_response(&packet), Value::Void);
    }

    #[test]
    fn test_force_integer64() {
        let packet = Encoder::new()
            .force_integer64(true)
            .encode_response(&Value::Int32(7));

        assert_eq!(packet, hex!("42696e01 0000000c 000000d1 0000000000000007"));
        assert_eq!(decode_response(&packet), Value::Int64(7));
    }

    #[test]
    fn test_fault_shaped_struct_classified_on_decode() {
        let value = Value::error(-32601, "Requested method not found.");
        let packet = Encoder::new().encode_response(&value);

        // Survives the round trip including the error marking.
        assert_eq!(decode_response(&packet), value);
    }

    #[test]
    fn test_error_response_without_struct_payload() {
        let mut packet = Encoder::new().encode_response(&Value::Int32(1));
        packet[3] = 0xFF;

        let decoded = decode_response(&packet);
        assert!(decoded.is_error());
        assert_eq!(decoded.fault_code(), Some(-1));
        assert_eq!(decoded.fault_string(), Some("undefined"));
    }

    fn value_strategy() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            any::<i32>().prop_map(Value::Int32),
            any::<i64>().prop_map(Value::Int64),
            any::<bool>().prop_map(Value::Bool),
            "[a-z0-9 ]{0,12}".prop_map(Value::String),
            "[A-Za-z0-9+/]{0,12}".prop_map(Value::Base64),
            prop::collection::vec(any::<u8>(), 0..32).prop_map(Value::Binary),
        ];
        leaf.prop_recursive(3, 24, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,8}", inner, 0..6)
                    .prop_map(|m| Value::Struct(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn prop_response_round_trip(value in value_strategy()) {
            let packet = Encoder::new().encode_response(&value);

            prop_assert_eq!(decode_response(&packet), value);
        }

        #[test]
        fn prop_request_round_trip(
            method in "[a-zA-Z][a-zA-Z0-9]{0,16}",
            parameters in prop::collection::vec(value_strategy(), 0..5),
        ) {
            let packet = Encoder::new().encode_request(&method, &parameters, None);

            let (got_method, got_parameters) = decode_request(&packet);
            prop_assert_eq!(got_method, method);
            prop_assert_eq!(got_parameters, parameters);
        }
    }
}
