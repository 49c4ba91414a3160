use crate::constants::{ADDRESS_LENGTH, REQUEST_ID_LENGTH};
use derive_more::{AsRef, From, Into};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{
    de, Deserialize as SerdeDeserialize, Deserializer, Serialize as SerdeSerialize, Serializer,
};
use thiserror::Error;

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
/// The closed set of field types a guest can declare for a key. The type
/// observed on the first access of a key is locked in for the life of the
/// owning object.
pub enum FieldType {
    Bytes       = 0,
    BytesArray  = 1,
    Int         = 2,
    IntArray    = 3,
    Map         = 4,
    MapArray    = 5,
    String      = 6,
    StringArray = 7,
}

impl FieldType {
    /// Element type of an array type tag. Array tags are one above their
    /// element tag, so `BytesArray -> Bytes` and so on.
    pub fn element(self) -> Option<FieldType> {
        match self {
            FieldType::BytesArray | FieldType::IntArray | FieldType::StringArray => {
                FieldType::try_from(i32::from(self) - 1).ok()
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A scalar value held by an in-memory host object.
pub enum Value {
    Bytes(Vec<u8>),
    Int(i64),
    String(String),
}

impl Value {
    /// The zero value of a scalar field type. Array and map tags have no zero
    /// value; they fall back to `Int(0)` but are rejected by the type checks
    /// before this is ever reachable.
    pub(crate) fn zero(field_type: FieldType) -> Value {
        match field_type {
            FieldType::Bytes => Value::Bytes(Vec::new()),
            FieldType::String => Value::String(String::new()),
            _ => Value::Int(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A canonical key name: either UTF-8 text or an opaque byte string. Which
/// form a key arrived in is remembered so the persistent store sees the exact
/// original bytes.
pub enum Key {
    Text(String),
    Raw(Vec<u8>),
}

impl Key {
    pub fn bytes(&self) -> &[u8] {
        match self {
            Key::Text(text) => text.as_bytes(),
            Key::Raw(bytes) => bytes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, From, Into, AsRef)]
/// Address of a contract or account on the chain.
pub struct Address(pub [u8; ADDRESS_LENGTH]);

#[derive(Debug, Clone, Copy, PartialEq, Eq, From, Into, AsRef)]
/// Identifier of the request currently being processed. Seeds the
/// deterministic pseudo-random generator of the utility object.
pub struct RequestId(pub [u8; REQUEST_ID_LENGTH]);

fn serialize_base58<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&bs58::encode(bytes).into_string())
}

fn deserialize_base58<'de, D: Deserializer<'de>, const N: usize>(
    deserializer: D,
) -> Result<[u8; N], D::Error> {
    let text = String::deserialize(deserializer)?;
    let bytes = bs58::decode(&text).into_vec().map_err(de::Error::custom)?;
    bytes.try_into().map_err(|_| de::Error::custom("unexpected length"))
}

impl SerdeSerialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_base58(&self.0, serializer)
    }
}

impl<'de> SerdeDeserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserialize_base58(deserializer).map(Address)
    }
}

impl SerdeSerialize for RequestId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_base58(&self.0, serializer)
    }
}

impl<'de> SerdeDeserialize<'de> for RequestId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserialize_base58(deserializer).map(RequestId)
    }
}

/// Chain context of the executing contract, fixed for the duration of one
/// entry-point invocation.
#[derive(Debug, Clone, SerdeSerialize, SerdeDeserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractContext {
    /// Address of the executing contract.
    pub address:     Address,
    /// Address of the contract owner.
    pub owner:       Address,
    /// Human-readable description of the contract.
    pub description: String,
    /// Id of the request being processed.
    pub request_id:  RequestId,
}

/// Construction-time options of a host instance.
#[derive(Debug, Clone, Copy, Default, SerdeDeserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HostOptions {
    /// Rewrite raw byte-string keys into their base58 text form before
    /// interning, so call sites using either form of the same logical key
    /// converge to one key id.
    pub encode_raw_keys: bool,
}

#[derive(Debug, Error)]
/// Failures of module loading and entry-point invocation. Faults inside the
/// object protocol never surface here; those latch on the host instead.
pub enum RunnerError {
    #[error("module is empty")]
    EmptyModule,
    #[error("no module has been loaded")]
    ModuleNotLoaded,
}
