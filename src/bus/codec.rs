//! Pluggable value codecs.
//!
//! Message types crossing a mailbox boundary can be required to have a
//! registered codec, so a deployment is known serializable up front
//! rather than failing at send time. The registry is keyed by `TypeId`
//! and the default codec is JSON via serde.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, PoisonError, RwLock};

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A codec for one concrete value type, object-safe for registry storage.
pub trait ValueCodec: Send + Sync {
    fn type_name(&self) -> &'static str;
    fn encode(&self, value: &(dyn Any + Send)) -> Result<Vec<u8>, CodecError>;
    fn decode(&self, bytes: &[u8]) -> Result<Box<dyn Any + Send>, CodecError>;
}

/// JSON codec for any serde-capable type.
pub struct JsonCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ValueCodec for JsonCodec<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn encode(&self, value: &(dyn Any + Send)) -> Result<Vec<u8>, CodecError> {
        let value = value
            .downcast_ref::<T>()
            .ok_or_else(|| CodecError::WrongType {
                type_name: std::any::type_name::<T>(),
            })?;
        serde_json::to_vec(value).map_err(|source| CodecError::Serde {
            type_name: std::any::type_name::<T>(),
            source: Arc::new(source),
        })
    }

    fn decode(&self, bytes: &[u8]) -> Result<Box<dyn Any + Send>, CodecError> {
        let value: T = serde_json::from_slice(bytes).map_err(|source| CodecError::Serde {
            type_name: std::any::type_name::<T>(),
            source: Arc::new(source),
        })?;
        Ok(Box::new(value))
    }
}

/// Registry of codecs keyed by message type.
#[derive(Default)]
pub struct CodecRegistry {
    codecs: RwLock<HashMap<TypeId, Arc<dyn ValueCodec>>>,
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let codecs = self.codecs.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("CodecRegistry")
            .field("registered", &codecs.len())
            .finish()
    }
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the JSON codec for `T`, replacing any previous codec.
    pub fn register_json<T>(&self)
    where
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        self.register::<T>(Arc::new(JsonCodec::<T>::new()));
    }

    /// Register a custom codec for `T`.
    pub fn register<T: 'static>(&self, codec: Arc<dyn ValueCodec>) {
        let mut codecs = self.codecs.write().unwrap_or_else(PoisonError::into_inner);
        codecs.insert(TypeId::of::<T>(), codec);
    }

    pub fn contains<T: 'static>(&self) -> bool {
        let codecs = self.codecs.read().unwrap_or_else(PoisonError::into_inner);
        codecs.contains_key(&TypeId::of::<T>())
    }

    /// Encode a value with its registered codec.
    pub fn encode<T: Send + 'static>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        self.lookup::<T>()?.encode(value)
    }

    /// Decode a value with its registered codec.
    pub fn decode<T: Send + 'static>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        let decoded = self.lookup::<T>()?.decode(bytes)?;
        decoded
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| CodecError::WrongType {
                type_name: std::any::type_name::<T>(),
            })
    }

    fn lookup<T: 'static>(&self) -> Result<Arc<dyn ValueCodec>, CodecError> {
        let codecs = self.codecs.read().unwrap_or_else(PoisonError::into_inner);
        codecs
            .get(&TypeId::of::<T>())
            .cloned()
            .ok_or_else(|| CodecError::NotRegistered {
                type_name: std::any::type_name::<T>(),
            })
    }
}

/// A codec lookup or conversion failure.
#[derive(Debug, Clone)]
pub enum CodecError {
    NotRegistered { type_name: &'static str },
    WrongType { type_name: &'static str },
    Serde {
        type_name: &'static str,
        source: Arc<serde_json::Error>,
    },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotRegistered { type_name } => {
                write!(f, "no codec registered for {}", type_name)
            }
            Self::WrongType { type_name } => {
                write!(f, "value is not a {}", type_name)
            }
            Self::Serde { type_name, source } => {
                write!(f, "codec failed for {}: {}", type_name, source)
            }
        }
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Serde { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}
