// Copyright (c) 2024 The mqtt-broker contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

// MQTT 5 properties: a length-prefixed sequence of (identifier, value) pairs whose value shape
// is fixed per identifier. Represented as an ordered `Vec<Property>` rather than a map because
// the wire format allows `UserProperty` and `SubscriptionIdentifier` to repeat and requires
// `UserProperty` order to be preserved across a decode/encode round trip; every other property
// is a protocol error if it appears twice (checked by `decode_properties`).
//
// MQTT 3.1.1 packets carry no properties block at all; callers gate `decode_properties` /
// `encode_properties` on `ProtocolLevel::has_properties()`.

use crate::byte_array::{self, ByteArray};
use crate::error::{DecodeError, EncodeError};
use crate::qos::QoS;
use crate::var_int::{decode_var_int, encode_var_int, var_int_bytes};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyId {
    PayloadFormatIndicator = 0x01,
    MessageExpiryInterval = 0x02,
    ContentType = 0x03,
    ResponseTopic = 0x08,
    CorrelationData = 0x09,
    SubscriptionIdentifier = 0x0b,
    SessionExpiryInterval = 0x11,
    AssignedClientIdentifier = 0x12,
    ServerKeepAlive = 0x13,
    AuthenticationMethod = 0x15,
    AuthenticationData = 0x16,
    RequestProblemInformation = 0x17,
    WillDelayInterval = 0x18,
    RequestResponseInformation = 0x19,
    ResponseInformation = 0x1a,
    ServerReference = 0x1c,
    ReasonString = 0x1f,
    ReceiveMaximum = 0x21,
    TopicAliasMaximum = 0x22,
    TopicAlias = 0x23,
    MaximumQoS = 0x24,
    RetainAvailable = 0x25,
    UserProperty = 0x26,
    MaximumPacketSize = 0x27,
    WildcardSubscriptionAvailable = 0x28,
    SubscriptionIdentifierAvailable = 0x29,
    SharedSubscriptionAvailable = 0x2a,
}

impl TryFrom<usize> for PropertyId {
    type Error = DecodeError;

    fn try_from(v: usize) -> Result<Self, Self::Error> {
        match v {
            0x01 => Ok(Self::PayloadFormatIndicator),
            0x02 => Ok(Self::MessageExpiryInterval),
            0x03 => Ok(Self::ContentType),
            0x08 => Ok(Self::ResponseTopic),
            0x09 => Ok(Self::CorrelationData),
            0x0b => Ok(Self::SubscriptionIdentifier),
            0x11 => Ok(Self::SessionExpiryInterval),
            0x12 => Ok(Self::AssignedClientIdentifier),
            0x13 => Ok(Self::ServerKeepAlive),
            0x15 => Ok(Self::AuthenticationMethod),
            0x16 => Ok(Self::AuthenticationData),
            0x17 => Ok(Self::RequestProblemInformation),
            0x18 => Ok(Self::WillDelayInterval),
            0x19 => Ok(Self::RequestResponseInformation),
            0x1a => Ok(Self::ResponseInformation),
            0x1c => Ok(Self::ServerReference),
            0x1f => Ok(Self::ReasonString),
            0x21 => Ok(Self::ReceiveMaximum),
            0x22 => Ok(Self::TopicAliasMaximum),
            0x23 => Ok(Self::TopicAlias),
            0x24 => Ok(Self::MaximumQoS),
            0x25 => Ok(Self::RetainAvailable),
            0x26 => Ok(Self::UserProperty),
            0x27 => Ok(Self::MaximumPacketSize),
            0x28 => Ok(Self::WildcardSubscriptionAvailable),
            0x29 => Ok(Self::SubscriptionIdentifierAvailable),
            0x2a => Ok(Self::SharedSubscriptionAvailable),
            _ => Err(DecodeError::InvalidPropertyType),
        }
    }
}

/// One decoded MQTT 5 property. Variant payload types mirror the wire encoding directly
/// (`bool` for the "Byte" 0/1 properties, `u32`/`u16` for fixed-width integers, `usize` for the
/// one property encoded as a Variable Byte Integer, `String`/`Vec<u8>` for the length-prefixed
/// kinds, and a tuple for the repeatable name/value user property).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Property {
    PayloadFormatIndicator(bool),
    MessageExpiryInterval(u32),
    ContentType(String),
    ResponseTopic(String),
    CorrelationData(Vec<u8>),
    SubscriptionIdentifier(usize),
    SessionExpiryInterval(u32),
    AssignedClientIdentifier(String),
    ServerKeepAlive(u16),
    AuthenticationMethod(String),
    AuthenticationData(Vec<u8>),
    RequestProblemInformation(bool),
    WillDelayInterval(u32),
    RequestResponseInformation(bool),
    ResponseInformation(String),
    ServerReference(String),
    ReasonString(String),
    ReceiveMaximum(u16),
    TopicAliasMaximum(u16),
    TopicAlias(u16),
    MaximumQoS(QoS),
    RetainAvailable(bool),
    UserProperty(String, String),
    MaximumPacketSize(u32),
    WildcardSubscriptionAvailable(bool),
    SubscriptionIdentifierAvailable(bool),
    SharedSubscriptionAvailable(bool),
}

impl Property {
    #[must_use]
    pub const fn id(&self) -> PropertyId {
        match self {
            Self::PayloadFormatIndicator(_) => PropertyId::PayloadFormatIndicator,
            Self::MessageExpiryInterval(_) => PropertyId::MessageExpiryInterval,
            Self::ContentType(_) => PropertyId::ContentType,
            Self::ResponseTopic(_) => PropertyId::ResponseTopic,
            Self::CorrelationData(_) => PropertyId::CorrelationData,
            Self::SubscriptionIdentifier(_) => PropertyId::SubscriptionIdentifier,
            Self::SessionExpiryInterval(_) => PropertyId::SessionExpiryInterval,
            Self::AssignedClientIdentifier(_) => PropertyId::AssignedClientIdentifier,
            Self::ServerKeepAlive(_) => PropertyId::ServerKeepAlive,
            Self::AuthenticationMethod(_) => PropertyId::AuthenticationMethod,
            Self::AuthenticationData(_) => PropertyId::AuthenticationData,
            Self::RequestProblemInformation(_) => PropertyId::RequestProblemInformation,
            Self::WillDelayInterval(_) => PropertyId::WillDelayInterval,
            Self::RequestResponseInformation(_) => PropertyId::RequestResponseInformation,
            Self::ResponseInformation(_) => PropertyId::ResponseInformation,
            Self::ServerReference(_) => PropertyId::ServerReference,
            Self::ReasonString(_) => PropertyId::ReasonString,
            Self::ReceiveMaximum(_) => PropertyId::ReceiveMaximum,
            Self::TopicAliasMaximum(_) => PropertyId::TopicAliasMaximum,
            Self::TopicAlias(_) => PropertyId::TopicAlias,
            Self::MaximumQoS(_) => PropertyId::MaximumQoS,
            Self::RetainAvailable(_) => PropertyId::RetainAvailable,
            Self::UserProperty(..) => PropertyId::UserProperty,
            Self::MaximumPacketSize(_) => PropertyId::MaximumPacketSize,
            Self::WildcardSubscriptionAvailable(_) => PropertyId::WildcardSubscriptionAvailable,
            Self::SubscriptionIdentifierAvailable(_) => {
                PropertyId::SubscriptionIdentifierAvailable
            }
            Self::SharedSubscriptionAvailable(_) => PropertyId::SharedSubscriptionAvailable,
        }
    }

    /// User-property may repeat in any packet. Subscription Identifier may only repeat in a
    /// PUBLISH, where the broker stacks one value per matched subscription (MQTT 5 §3.3.2.3.8);
    /// a client-sent SUBSCRIBE carrying more than one is a protocol error (MQTT 5 §3.8.2.1.2), so
    /// `allow_repeated_subscription_id` must be `false` for every packet type except PUBLISH.
    #[must_use]
    pub const fn allows_repeat(id: PropertyId, allow_repeated_subscription_id: bool) -> bool {
        match id {
            PropertyId::UserProperty => true,
            PropertyId::SubscriptionIdentifier => allow_repeated_subscription_id,
            _ => false,
        }
    }

    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let id = PropertyId::try_from(decode_var_int(ba)?)?;
        Ok(match id {
            PropertyId::PayloadFormatIndicator => Self::PayloadFormatIndicator(decode_bool(ba)?),
            PropertyId::MessageExpiryInterval => Self::MessageExpiryInterval(ba.read_u32()?),
            PropertyId::ContentType => Self::ContentType(ba.read_string()?),
            PropertyId::ResponseTopic => Self::ResponseTopic(ba.read_string()?),
            PropertyId::CorrelationData => Self::CorrelationData(ba.read_binary()?),
            PropertyId::SubscriptionIdentifier => {
                let value = decode_var_int(ba)?;
                if value == 0 {
                    return Err(DecodeError::InvalidPropertyType);
                }
                Self::SubscriptionIdentifier(value)
            }
            PropertyId::SessionExpiryInterval => Self::SessionExpiryInterval(ba.read_u32()?),
            PropertyId::AssignedClientIdentifier => {
                Self::AssignedClientIdentifier(ba.read_string()?)
            }
            PropertyId::ServerKeepAlive => Self::ServerKeepAlive(ba.read_u16()?),
            PropertyId::AuthenticationMethod => Self::AuthenticationMethod(ba.read_string()?),
            PropertyId::AuthenticationData => Self::AuthenticationData(ba.read_binary()?),
            PropertyId::RequestProblemInformation => {
                Self::RequestProblemInformation(decode_bool(ba)?)
            }
            PropertyId::WillDelayInterval => Self::WillDelayInterval(ba.read_u32()?),
            PropertyId::RequestResponseInformation => {
                Self::RequestResponseInformation(decode_bool(ba)?)
            }
            PropertyId::ResponseInformation => Self::ResponseInformation(ba.read_string()?),
            PropertyId::ServerReference => Self::ServerReference(ba.read_string()?),
            PropertyId::ReasonString => Self::ReasonString(ba.read_string()?),
            PropertyId::ReceiveMaximum => Self::ReceiveMaximum(ba.read_u16()?),
            PropertyId::TopicAliasMaximum => Self::TopicAliasMaximum(ba.read_u16()?),
            PropertyId::TopicAlias => Self::TopicAlias(ba.read_u16()?),
            PropertyId::MaximumQoS => {
                Self::MaximumQoS(QoS::try_from(ba.read_u8()?).map_err(|_| DecodeError::InvalidQoS)?)
            }
            PropertyId::RetainAvailable => Self::RetainAvailable(decode_bool(ba)?),
            PropertyId::UserProperty => {
                let key = ba.read_string()?;
                let value = ba.read_string()?;
                Self::UserProperty(key, value)
            }
            PropertyId::MaximumPacketSize => Self::MaximumPacketSize(ba.read_u32()?),
            PropertyId::WildcardSubscriptionAvailable => {
                Self::WildcardSubscriptionAvailable(decode_bool(ba)?)
            }
            PropertyId::SubscriptionIdentifierAvailable => {
                Self::SubscriptionIdentifierAvailable(decode_bool(ba)?)
            }
            PropertyId::SharedSubscriptionAvailable => {
                Self::SharedSubscriptionAvailable(decode_bool(ba)?)
            }
        })
    }

    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let start = buf.len();
        encode_var_int(self.id() as usize, buf)?;
        match self {
            Self::PayloadFormatIndicator(v)
            | Self::RequestProblemInformation(v)
            | Self::RequestResponseInformation(v)
            | Self::RetainAvailable(v)
            | Self::WildcardSubscriptionAvailable(v)
            | Self::SubscriptionIdentifierAvailable(v)
            | Self::SharedSubscriptionAvailable(v) => buf.push(u8::from(*v)),
            Self::MessageExpiryInterval(v)
            | Self::SessionExpiryInterval(v)
            | Self::WillDelayInterval(v)
            | Self::MaximumPacketSize(v) => buf.extend_from_slice(&v.to_be_bytes()),
            Self::ContentType(v)
            | Self::ResponseTopic(v)
            | Self::AssignedClientIdentifier(v)
            | Self::AuthenticationMethod(v)
            | Self::ResponseInformation(v)
            | Self::ServerReference(v)
            | Self::ReasonString(v) => byte_array::write_string(v, buf),
            Self::CorrelationData(v) | Self::AuthenticationData(v) => {
                byte_array::write_binary(v, buf);
            }
            Self::SubscriptionIdentifier(v) => {
                encode_var_int(*v, buf)?;
            }
            Self::ServerKeepAlive(v) | Self::ReceiveMaximum(v) | Self::TopicAliasMaximum(v)
            | Self::TopicAlias(v) => buf.extend_from_slice(&v.to_be_bytes()),
            Self::MaximumQoS(qos) => buf.push(u8::from(*qos)),
            Self::UserProperty(key, value) => {
                byte_array::write_string(key, buf);
                byte_array::write_string(value, buf);
            }
        }
        Ok(buf.len() - start)
    }

    fn bytes(&self) -> usize {
        let id_bytes = var_int_bytes(self.id() as usize);
        id_bytes
            + match self {
                Self::PayloadFormatIndicator(_)
                | Self::RequestProblemInformation(_)
                | Self::RequestResponseInformation(_)
                | Self::RetainAvailable(_)
                | Self::WildcardSubscriptionAvailable(_)
                | Self::SubscriptionIdentifierAvailable(_)
                | Self::SharedSubscriptionAvailable(_)
                | Self::MaximumQoS(_) => 1,
                Self::MessageExpiryInterval(_)
                | Self::SessionExpiryInterval(_)
                | Self::WillDelayInterval(_)
                | Self::MaximumPacketSize(_) => 4,
                Self::ServerKeepAlive(_)
                | Self::ReceiveMaximum(_)
                | Self::TopicAliasMaximum(_)
                | Self::TopicAlias(_) => 2,
                Self::ContentType(v)
                | Self::ResponseTopic(v)
                | Self::AssignedClientIdentifier(v)
                | Self::AuthenticationMethod(v)
                | Self::ResponseInformation(v)
                | Self::ServerReference(v)
                | Self::ReasonString(v) => byte_array::string_bytes(v),
                Self::CorrelationData(v) | Self::AuthenticationData(v) => {
                    byte_array::binary_bytes(v)
                }
                Self::SubscriptionIdentifier(v) => var_int_bytes(*v),
                Self::UserProperty(key, value) => {
                    byte_array::string_bytes(key) + byte_array::string_bytes(value)
                }
            }
    }
}

fn decode_bool(ba: &mut ByteArray) -> Result<bool, DecodeError> {
    match ba.read_u8()? {
        0x00 => Ok(false),
        0x01 => Ok(true),
        _ => Err(DecodeError::InvalidBoolData),
    }
}

/// Decode a properties block: a variable-byte length prefix followed by that many bytes of
/// (identifier, value) pairs. Rejects a property id appearing twice unless
/// [`Property::allows_repeat`] permits it. `allow_repeated_subscription_id` should be `true`
/// only when decoding a PUBLISH; every other packet type must pass `false`.
///
/// # Errors
///
/// Returns `DecodeError::DuplicateProperty` on a disallowed repeat, or whatever error the
/// individual property decode produced.
pub fn decode_properties(
    ba: &mut ByteArray,
    allow_repeated_subscription_id: bool,
) -> Result<Vec<Property>, DecodeError> {
    let len = decode_var_int(ba)?;
    let slice = ba.read_bytes(len)?;
    let mut inner = ByteArray::new(slice);
    let mut properties = Vec::new();
    let mut seen = Vec::new();
    while inner.remaining() > 0 {
        let property = Property::decode(&mut inner)?;
        let id = property.id();
        if !Property::allows_repeat(id, allow_repeated_subscription_id) && seen.contains(&(id as u8))
        {
            return Err(DecodeError::DuplicateProperty);
        }
        seen.push(id as u8);
        properties.push(property);
    }
    Ok(properties)
}

/// Encode a properties block: the total byte length of `properties` as a variable byte
/// integer, followed by each property in order.
///
/// # Errors
///
/// Returns `EncodeError::TooLarge` if the encoded length does not fit in a variable byte
/// integer.
pub fn encode_properties(properties: &[Property], buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
    let start = buf.len();
    let body_len = properties_bytes(properties);
    encode_var_int(body_len, buf)?;
    for property in properties {
        property.encode(buf)?;
    }
    Ok(buf.len() - start)
}

/// Byte length a properties block will occupy on the wire, including its own length prefix.
#[must_use]
pub fn properties_bytes(properties: &[Property]) -> usize {
    properties.iter().map(Property::bytes).sum()
}

/// Byte length of `encode_properties`'s full output (length prefix plus body).
#[must_use]
pub fn properties_wire_bytes(properties: &[Property]) -> usize {
    let body_len = properties_bytes(properties);
    var_int_bytes(body_len) + body_len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_mixed_properties() {
        let properties = vec![
            Property::SessionExpiryInterval(30),
            Property::UserProperty("a".into(), "1".into()),
            Property::UserProperty("b".into(), "2".into()),
            Property::ReceiveMaximum(20),
        ];
        let mut buf = Vec::new();
        encode_properties(&properties, &mut buf).unwrap();
        assert_eq!(buf.len(), properties_wire_bytes(&properties));

        let mut ba = ByteArray::new(&buf);
        let decoded = decode_properties(&mut ba, false).unwrap();
        assert_eq!(decoded, properties);
    }

    #[test]
    fn rejects_duplicate_non_repeatable_property() {
        let mut buf = Vec::new();
        let properties = vec![
            Property::SessionExpiryInterval(1),
            Property::SessionExpiryInterval(2),
        ];
        encode_properties(&properties, &mut buf).unwrap();
        let mut ba = ByteArray::new(&buf);
        assert_eq!(
            decode_properties(&mut ba, false),
            Err(DecodeError::DuplicateProperty)
        );
    }

    #[test]
    fn allows_duplicate_user_property_always() {
        let mut buf = Vec::new();
        let properties = vec![
            Property::UserProperty("k".into(), "v1".into()),
            Property::UserProperty("k".into(), "v2".into()),
        ];
        encode_properties(&properties, &mut buf).unwrap();
        let mut ba = ByteArray::new(&buf);
        assert_eq!(decode_properties(&mut ba, false).unwrap(), properties);
    }

    #[test]
    fn rejects_duplicate_subscription_identifier_when_not_publish() {
        let mut buf = Vec::new();
        let properties = vec![
            Property::SubscriptionIdentifier(1),
            Property::SubscriptionIdentifier(2),
        ];
        encode_properties(&properties, &mut buf).unwrap();
        let mut ba = ByteArray::new(&buf);
        assert_eq!(
            decode_properties(&mut ba, false),
            Err(DecodeError::DuplicateProperty)
        );
    }

    #[test]
    fn allows_duplicate_subscription_identifier_for_publish() {
        let mut buf = Vec::new();
        let properties = vec![
            Property::SubscriptionIdentifier(1),
            Property::SubscriptionIdentifier(2),
        ];
        encode_properties(&properties, &mut buf).unwrap();
        let mut ba = ByteArray::new(&buf);
        assert_eq!(decode_properties(&mut ba, true).unwrap(), properties);
    }

    #[test]
    fn empty_properties_block_is_a_single_zero_byte() {
        let mut buf = Vec::new();
        encode_properties(&[], &mut buf).unwrap();
        assert_eq!(buf, vec![0x00]);
    }
}
