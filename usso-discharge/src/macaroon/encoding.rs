//! Macaroon wire formats
//!
//! Binary V1 is the libmacaroons packet format still emitted by Ubuntu SSO
//! for discharge macaroons. Binary V2 and the V2 JSON object are the
//! current formats. Decoding detects the format, callers never choose.

use super::{Caveat, Macaroon, MacaroonError, Signature, SIGNATURE_LEN};
use base64::{
    engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE_NO_PAD},
    Engine as _,
};
use serde::{de, ser, Deserialize, Deserializer, Serialize, Serializer};

/// Binary macaroon format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// libmacaroons packet format
    V1,
    /// Compact field format introduced with macaroon v2
    V2,
}

const V2_VERSION: u8 = 2;

// V2 field types
const FIELD_EOS: u64 = 0;
const FIELD_LOCATION: u64 = 1;
const FIELD_IDENTIFIER: u64 = 2;
const FIELD_VID: u64 = 4;
const FIELD_SIGNATURE: u64 = 6;

// V1 packet header is four hex digits
const V1_HEADER_LEN: usize = 4;
const V1_MAX_PACKET: usize = 0xffff;

impl Macaroon {
    /// Encode into the given binary format
    pub fn to_binary(&self, format: Format) -> Result<Vec<u8>, MacaroonError> {
        match format {
            Format::V1 => self.to_binary_v1(),
            Format::V2 => Ok(self.to_binary_v2()),
        }
    }

    /// Decode a binary macaroon of any supported version
    pub fn from_binary(data: &[u8]) -> Result<Self, MacaroonError> {
        match data.first() {
            None => Err(MacaroonError::Decode("empty macaroon data".to_string())),
            Some(&V2_VERSION) => Self::from_binary_v2(data),
            Some(b) if b.is_ascii_hexdigit() => Self::from_binary_v1(data),
            Some(b) => Err(MacaroonError::Decode(format!(
                "unknown macaroon version byte {:#04x}",
                b
            ))),
        }
    }

    /// Encode as URL-safe unpadded base64 of the given binary format
    pub fn to_base64(&self, format: Format) -> Result<String, MacaroonError> {
        Ok(URL_SAFE_NO_PAD.encode(self.to_binary(format)?))
    }

    /// Decode base64 binary of any version, in any base64 alphabet
    pub fn from_base64(data: &str) -> Result<Self, MacaroonError> {
        Self::from_binary(&decode_base64(data)?)
    }

    fn to_binary_v1(&self) -> Result<Vec<u8>, MacaroonError> {
        let mut out = Vec::new();
        write_packet(
            &mut out,
            "location",
            self.location.as_deref().unwrap_or("").as_bytes(),
        )?;
        write_packet(&mut out, "identifier", &self.id)?;
        for caveat in &self.caveats {
            write_packet(&mut out, "cid", &caveat.id)?;
            if let Some(vid) = &caveat.verification_id {
                write_packet(&mut out, "vid", vid)?;
            }
            if let Some(location) = &caveat.location {
                write_packet(&mut out, "cl", location.as_bytes())?;
            }
        }
        write_packet(&mut out, "signature", &self.signature)?;
        Ok(out)
    }

    fn from_binary_v1(data: &[u8]) -> Result<Self, MacaroonError> {
        let mut packets = PacketReader { data, pos: 0 };

        let location = packets.expect("location")?;
        let location = String::from_utf8(location.to_vec())
            .map_err(|_| MacaroonError::Decode("location is not valid UTF-8".to_string()))?;
        let id = packets.expect("identifier")?.to_vec();

        let mut caveats: Vec<Caveat> = Vec::new();
        let signature = loop {
            let (key, value) = packets
                .next()?
                .ok_or_else(|| MacaroonError::Decode("missing signature packet".to_string()))?;
            match key {
                b"cid" => caveats.push(Caveat {
                    id: value.to_vec(),
                    verification_id: None,
                    location: None,
                }),
                b"vid" => {
                    let caveat = caveats.last_mut().ok_or_else(|| {
                        MacaroonError::Decode("vid packet before cid".to_string())
                    })?;
                    caveat.verification_id = Some(value.to_vec());
                }
                b"cl" => {
                    let caveat = caveats.last_mut().ok_or_else(|| {
                        MacaroonError::Decode("cl packet before cid".to_string())
                    })?;
                    caveat.location = Some(String::from_utf8(value.to_vec()).map_err(|_| {
                        MacaroonError::Decode("caveat location is not valid UTF-8".to_string())
                    })?);
                }
                b"signature" => break signature_from(value)?,
                other => {
                    return Err(MacaroonError::Decode(format!(
                        "unexpected packet {:?}",
                        String::from_utf8_lossy(other)
                    )))
                }
            }
        };

        if packets.pos != data.len() {
            return Err(MacaroonError::Decode(
                "trailing data after signature".to_string(),
            ));
        }
        Ok(Self::from_parts(Some(location), id, caveats, signature))
    }

    fn to_binary_v2(&self) -> Vec<u8> {
        let mut out = vec![V2_VERSION];
        if let Some(location) = &self.location {
            write_field(&mut out, FIELD_LOCATION, location.as_bytes());
        }
        write_field(&mut out, FIELD_IDENTIFIER, &self.id);
        write_varint(&mut out, FIELD_EOS);
        for caveat in &self.caveats {
            if let Some(location) = &caveat.location {
                write_field(&mut out, FIELD_LOCATION, location.as_bytes());
            }
            write_field(&mut out, FIELD_IDENTIFIER, &caveat.id);
            if let Some(vid) = &caveat.verification_id {
                write_field(&mut out, FIELD_VID, vid);
            }
            write_varint(&mut out, FIELD_EOS);
        }
        write_varint(&mut out, FIELD_EOS);
        write_field(&mut out, FIELD_SIGNATURE, &self.signature);
        out
    }

    fn from_binary_v2(data: &[u8]) -> Result<Self, MacaroonError> {
        let mut reader = FieldReader { data, pos: 1 };

        let header = reader.section()?;
        let mut fields = header.into_iter();
        let (location, id) = match (fields.next(), fields.next(), fields.next()) {
            (Some((FIELD_LOCATION, loc)), Some((FIELD_IDENTIFIER, id)), None) => {
                (Some(utf8(loc)?), id.to_vec())
            }
            (Some((FIELD_IDENTIFIER, id)), None, None) => (None, id.to_vec()),
            _ => {
                return Err(MacaroonError::Decode(
                    "invalid macaroon header section".to_string(),
                ))
            }
        };

        let mut caveats = Vec::new();
        while reader.peek()? != FIELD_EOS as u8 {
            caveats.push(caveat_from_section(reader.section()?)?);
        }
        reader.pos += 1;

        let (kind, signature) = reader
            .field()?
            .ok_or_else(|| MacaroonError::Decode("missing signature".to_string()))?;
        if kind != FIELD_SIGNATURE {
            return Err(MacaroonError::Decode(format!(
                "expected signature field, got field type {}",
                kind
            )));
        }
        let signature = signature_from(signature)?;

        if reader.pos != data.len() {
            return Err(MacaroonError::Decode(
                "trailing data after signature".to_string(),
            ));
        }
        Ok(Self::from_parts(location, id, caveats, signature))
    }
}

fn caveat_from_section(fields: Vec<(u64, &[u8])>) -> Result<Caveat, MacaroonError> {
    let mut caveat = Caveat {
        id: Vec::new(),
        verification_id: None,
        location: None,
    };
    let mut seen_id = false;
    let mut last = FIELD_EOS;
    for (kind, value) in fields {
        if kind <= last {
            return Err(MacaroonError::Decode(
                "caveat fields out of order".to_string(),
            ));
        }
        last = kind;
        match kind {
            FIELD_LOCATION => caveat.location = Some(utf8(value)?),
            FIELD_IDENTIFIER => {
                caveat.id = value.to_vec();
                seen_id = true;
            }
            FIELD_VID => caveat.verification_id = Some(value.to_vec()),
            other => {
                return Err(MacaroonError::Decode(format!(
                    "unexpected caveat field type {}",
                    other
                )))
            }
        }
    }
    if !seen_id {
        return Err(MacaroonError::Decode("caveat has no identifier".to_string()));
    }
    Ok(caveat)
}

fn signature_from(value: &[u8]) -> Result<Signature, MacaroonError> {
    value.try_into().map_err(|_| {
        MacaroonError::Decode(format!(
            "signature has length {}, want {}",
            value.len(),
            SIGNATURE_LEN
        ))
    })
}

fn utf8(value: &[u8]) -> Result<String, MacaroonError> {
    String::from_utf8(value.to_vec())
        .map_err(|_| MacaroonError::Decode("location is not valid UTF-8".to_string()))
}

pub(crate) fn decode_base64(data: &str) -> Result<Vec<u8>, MacaroonError> {
    let trimmed = data.trim().trim_end_matches('=');
    let decoded = if trimmed.contains(['-', '_']) {
        URL_SAFE_NO_PAD.decode(trimmed)
    } else {
        STANDARD_NO_PAD.decode(trimmed)
    };
    decoded.map_err(|e| MacaroonError::Decode(format!("invalid base64: {}", e)))
}

fn write_packet(out: &mut Vec<u8>, key: &str, value: &[u8]) -> Result<(), MacaroonError> {
    let len = V1_HEADER_LEN + key.len() + 1 + value.len() + 1;
    if len > V1_MAX_PACKET {
        return Err(MacaroonError::Encode(format!(
            "{} packet too large for V1 format",
            key
        )));
    }
    out.extend_from_slice(format!("{:04x}", len).as_bytes());
    out.extend_from_slice(key.as_bytes());
    out.push(b' ');
    out.extend_from_slice(value);
    out.push(b'\n');
    Ok(())
}

struct PacketReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PacketReader<'a> {
    fn next(&mut self) -> Result<Option<(&'a [u8], &'a [u8])>, MacaroonError> {
        if self.pos == self.data.len() {
            return Ok(None);
        }
        let header = self
            .data
            .get(self.pos..self.pos + V1_HEADER_LEN)
            .ok_or_else(|| MacaroonError::Decode("truncated packet header".to_string()))?;
        let len = std::str::from_utf8(header)
            .ok()
            .and_then(|h| usize::from_str_radix(h, 16).ok())
            .ok_or_else(|| MacaroonError::Decode("invalid packet header".to_string()))?;
        if len <= V1_HEADER_LEN + 1 {
            return Err(MacaroonError::Decode(format!("packet too short: {}", len)));
        }

        let packet = self
            .data
            .get(self.pos + V1_HEADER_LEN..self.pos + len)
            .ok_or_else(|| MacaroonError::Decode("packet exceeds macaroon data".to_string()))?;
        let (body, newline) = packet.split_at(packet.len() - 1);
        if newline != b"\n" {
            return Err(MacaroonError::Decode(
                "packet not terminated by newline".to_string(),
            ));
        }
        let space = body
            .iter()
            .position(|&b| b == b' ')
            .ok_or_else(|| MacaroonError::Decode("packet has no key".to_string()))?;

        self.pos += len;
        Ok(Some((&body[..space], &body[space + 1..])))
    }

    fn expect(&mut self, key: &str) -> Result<&'a [u8], MacaroonError> {
        match self.next()? {
            Some((k, value)) if k == key.as_bytes() => Ok(value),
            Some((k, _)) => Err(MacaroonError::Decode(format!(
                "expected {} packet, got {:?}",
                key,
                String::from_utf8_lossy(k)
            ))),
            None => Err(MacaroonError::Decode(format!("missing {} packet", key))),
        }
    }
}

fn write_field(out: &mut Vec<u8>, kind: u64, value: &[u8]) {
    write_varint(out, kind);
    write_varint(out, value.len() as u64);
    out.extend_from_slice(value);
}

fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

struct FieldReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    fn peek(&self) -> Result<u8, MacaroonError> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or_else(|| MacaroonError::Decode("unexpected end of data".to_string()))
    }

    fn varint(&mut self) -> Result<u64, MacaroonError> {
        let mut value = 0u64;
        for shift in (0..64).step_by(7) {
            let byte = self.peek()?;
            self.pos += 1;
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(MacaroonError::Decode("varint overflow".to_string()))
    }

    /// Reads one field, `None` at end of section
    fn field(&mut self) -> Result<Option<(u64, &'a [u8])>, MacaroonError> {
        let kind = self.varint()?;
        if kind == FIELD_EOS {
            return Ok(None);
        }
        let len = usize::try_from(self.varint()?)
            .map_err(|_| MacaroonError::Decode("field length overflow".to_string()))?;
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| MacaroonError::Decode("field exceeds macaroon data".to_string()))?;
        let value = &self.data[self.pos..end];
        self.pos = end;
        Ok(Some((kind, value)))
    }

    fn section(&mut self) -> Result<Vec<(u64, &'a [u8])>, MacaroonError> {
        let mut fields = Vec::new();
        while let Some(field) = self.field()? {
            fields.push(field);
        }
        Ok(fields)
    }
}

#[derive(Serialize, Deserialize)]
struct JsonCaveat {
    #[serde(rename = "i", default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(rename = "i64", default, skip_serializing_if = "Option::is_none")]
    id64: Option<String>,
    #[serde(rename = "v", default, skip_serializing_if = "Option::is_none")]
    vid: Option<String>,
    #[serde(rename = "v64", default, skip_serializing_if = "Option::is_none")]
    vid64: Option<String>,
    #[serde(rename = "l", default, skip_serializing_if = "Option::is_none")]
    location: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct JsonMacaroon {
    #[serde(rename = "c", default, skip_serializing_if = "Vec::is_empty")]
    caveats: Vec<JsonCaveat>,
    #[serde(rename = "l", default, skip_serializing_if = "Option::is_none")]
    location: Option<String>,
    #[serde(rename = "i", default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(rename = "i64", default, skip_serializing_if = "Option::is_none")]
    id64: Option<String>,
    #[serde(rename = "s", default, skip_serializing_if = "Option::is_none")]
    signature: Option<String>,
    #[serde(rename = "s64", default, skip_serializing_if = "Option::is_none")]
    signature64: Option<String>,
}

/// Legacy V1 JSON object, still seen in older bootstrap responses
#[derive(Deserialize)]
struct JsonMacaroonV1 {
    #[serde(default)]
    caveats: Vec<JsonCaveatV1>,
    #[serde(default)]
    location: String,
    identifier: String,
    /// Hex encoded
    signature: String,
}

#[derive(Deserialize)]
struct JsonCaveatV1 {
    cid: String,
    #[serde(default)]
    vid: String,
    #[serde(default)]
    cl: String,
}

/// Text values go in the plain field, anything else in its `64` twin
fn split_field(value: &[u8]) -> (Option<String>, Option<String>) {
    match std::str::from_utf8(value) {
        Ok(text) => (Some(text.to_string()), None),
        Err(_) => (None, Some(URL_SAFE_NO_PAD.encode(value))),
    }
}

fn join_field(
    name: &str,
    text: Option<String>,
    encoded: Option<String>,
) -> Result<Option<Vec<u8>>, MacaroonError> {
    match (text, encoded) {
        (Some(text), None) => Ok(Some(text.into_bytes())),
        (None, Some(encoded)) => decode_base64(&encoded).map(Some),
        (Some(_), Some(_)) => Err(MacaroonError::Decode(format!(
            "both {} and {}64 fields present",
            name, name
        ))),
        (None, None) => Ok(None),
    }
}

fn require(name: &str, value: Option<Vec<u8>>) -> Result<Vec<u8>, MacaroonError> {
    value.ok_or_else(|| MacaroonError::Decode(format!("missing {} field", name)))
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

impl From<&Macaroon> for JsonMacaroon {
    fn from(m: &Macaroon) -> Self {
        let (id, id64) = split_field(&m.id);
        Self {
            caveats: m
                .caveats
                .iter()
                .map(|c| {
                    let (id, id64) = split_field(&c.id);
                    let (vid, vid64) = match &c.verification_id {
                        Some(vid) => split_field(vid),
                        None => (None, None),
                    };
                    JsonCaveat {
                        id,
                        id64,
                        vid,
                        vid64,
                        location: c.location.clone(),
                    }
                })
                .collect(),
            location: m.location.clone(),
            id,
            id64,
            signature: None,
            signature64: Some(URL_SAFE_NO_PAD.encode(m.signature)),
        }
    }
}

impl TryFrom<JsonMacaroon> for Macaroon {
    type Error = MacaroonError;

    fn try_from(json: JsonMacaroon) -> Result<Self, Self::Error> {
        let caveats = json
            .caveats
            .into_iter()
            .map(|c| {
                Ok(Caveat {
                    id: require("i", join_field("i", c.id, c.id64)?)?,
                    verification_id: join_field("v", c.vid, c.vid64)?,
                    location: c.location,
                })
            })
            .collect::<Result<Vec<_>, MacaroonError>>()?;
        let signature = require("s", join_field("s", json.signature, json.signature64)?)?;
        Ok(Macaroon::from_parts(
            json.location,
            require("i", join_field("i", json.id, json.id64)?)?,
            caveats,
            signature_from(&signature)?,
        ))
    }
}

impl TryFrom<JsonMacaroonV1> for Macaroon {
    type Error = MacaroonError;

    fn try_from(json: JsonMacaroonV1) -> Result<Self, Self::Error> {
        let caveats = json
            .caveats
            .into_iter()
            .map(|c| {
                Ok(Caveat {
                    id: c.cid.into_bytes(),
                    verification_id: non_empty(c.vid)
                        .map(|vid| decode_base64(&vid))
                        .transpose()?,
                    location: non_empty(c.cl),
                })
            })
            .collect::<Result<Vec<_>, MacaroonError>>()?;
        let signature = hex::decode(&json.signature)
            .map_err(|e| MacaroonError::Decode(format!("invalid signature hex: {}", e)))?;
        Ok(Macaroon::from_parts(
            non_empty(json.location),
            json.identifier.into_bytes(),
            caveats,
            signature_from(&signature)?,
        ))
    }
}

/// Decode any JSON rendition: a base64 string of binary V1/V2, the V2
/// object or the legacy V1 object.
fn from_json_value(value: serde_json::Value) -> Result<Macaroon, MacaroonError> {
    use serde_json::Value;

    let legacy = value.get("identifier").is_some();
    match value {
        Value::String(encoded) => Macaroon::from_base64(&encoded),
        Value::Object(_) if legacy => serde_json::from_value::<JsonMacaroonV1>(value)
            .map_err(|e| MacaroonError::Decode(format!("invalid V1 JSON macaroon: {}", e)))?
            .try_into(),
        Value::Object(_) => serde_json::from_value::<JsonMacaroon>(value)
            .map_err(|e| MacaroonError::Decode(format!("invalid V2 JSON macaroon: {}", e)))?
            .try_into(),
        other => Err(MacaroonError::Decode(format!(
            "expected macaroon object or base64 string, got {}",
            other
        ))),
    }
}

impl Serialize for Macaroon {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        JsonMacaroon::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Macaroon {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        from_json_value(value).map_err(de::Error::custom)
    }
}

/// Discharge macaroon as returned by Ubuntu SSO
///
/// Serialized as a base64 string of the V1 binary encoding. Deserializes
/// from any encoding [`Macaroon`] accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DischargeMacaroon(pub Macaroon);

impl DischargeMacaroon {
    /// Unwrap the macaroon
    pub fn into_inner(self) -> Macaroon {
        self.0
    }
}

impl Serialize for DischargeMacaroon {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let binary = self.0.to_binary(Format::V1).map_err(ser::Error::custom)?;
        serializer.serialize_str(&STANDARD.encode(binary))
    }
}

impl<'de> Deserialize<'de> for DischargeMacaroon {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Macaroon::deserialize(deserializer).map(Self)
    }
}
