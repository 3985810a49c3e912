//! Actor-style deployment and addressing.
//!
//! A [`MessageBus`] registers handler functions under process-unique
//! string addresses. Each deployed instance owns a mailbox and processes
//! its requests strictly one at a time; multiple instances behind one
//! address run concurrently and receive requests round-robin. Handlers
//! are reached with [`ask`](MessageBus::ask) (request/reply as a cold
//! [`Effect`]) or [`tell`](MessageBus::tell) (fire-and-forget).
//!
//! ```rust
//! use millrace::{DeployOptions, Effect, MessageBus};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let bus = MessageBus::new();
//! bus.deploy(
//!     "inc",
//!     |n: i64| Effect::<_, String>::succeed(n + 1),
//!     DeployOptions::new().timeout(Duration::from_millis(1000)),
//! )
//! .unwrap();
//!
//! let inc = bus.ask::<i64, i64, String>("inc");
//! assert_eq!(inc.call(41).run().await, Ok(42));
//! # });
//! ```

mod codec;
mod error;
mod options;

pub use codec::{CodecError, CodecRegistry, JsonCodec, ValueCodec};
pub use error::{DeliveryError, DeployError, TellError};
pub use options::DeployOptions;

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use crate::effect::Effect;

/// One request travelling to an instance, with an optional reply slot.
struct Call<I, O, E> {
    input: I,
    reply: Option<oneshot::Sender<Result<O, E>>>,
}

/// Type-erased access to a deployment's mailboxes for one-way sends.
trait Postbox: Send + Sync {
    fn deliver(&self, index: usize, input: Box<dyn Any + Send>) -> Result<(), TellFailure>;
    fn instance_count(&self) -> usize;
}

enum TellFailure {
    Full,
    Closed,
    Incompatible,
}

struct TypedPostbox<I, O, E> {
    senders: Vec<mpsc::Sender<Call<I, O, E>>>,
}

impl<I, O, E> Postbox for TypedPostbox<I, O, E>
where
    I: Send + 'static,
    O: Send + 'static,
    E: Send + 'static,
{
    fn deliver(&self, index: usize, input: Box<dyn Any + Send>) -> Result<(), TellFailure> {
        let input = input.downcast::<I>().map_err(|_| TellFailure::Incompatible)?;
        if self.senders.is_empty() {
            return Err(TellFailure::Closed);
        }
        let sender = &self.senders[index % self.senders.len()];
        sender
            .try_send(Call {
                input: *input,
                reply: None,
            })
            .map_err(|error| match error {
                mpsc::error::TrySendError::Full(_) => TellFailure::Full,
                mpsc::error::TrySendError::Closed(_) => TellFailure::Closed,
            })
    }

    fn instance_count(&self) -> usize {
        self.senders.len()
    }
}

/// A live deployment: typed senders behind erasure, plus dispatch state.
struct Deployment {
    // Vec<mpsc::Sender<Call<I, O, E>>> for the deployed triple.
    senders: Box<dyn Any + Send + Sync>,
    postbox: Arc<dyn Postbox>,
    next: AtomicUsize,
    timeout: Duration,
    instance_ids: Vec<String>,
}

/// Proof of a deployment, needed to undeploy it.
#[derive(Debug, Clone)]
pub struct DeploymentHandle {
    address: String,
    instance_ids: Vec<String>,
}

impl DeploymentHandle {
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn instance_ids(&self) -> &[String] {
        &self.instance_ids
    }
}

struct BusInner {
    registry: RwLock<HashMap<String, Arc<Deployment>>>,
    codecs: CodecRegistry,
}

/// The in-process message bus.
///
/// Cheap to clone; all clones share one registry.
#[derive(Clone, Default)]
pub struct MessageBus {
    inner: Arc<BusInner>,
}

impl Default for BusInner {
    fn default() -> Self {
        Self {
            registry: RwLock::new(HashMap::new()),
            codecs: CodecRegistry::new(),
        }
    }
}

impl fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self
            .inner
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("MessageBus")
            .field("deployments", &registry.len())
            .finish()
    }
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the JSON codec for a message type.
    ///
    /// Deployments created with
    /// [`require_codec`](DeployOptions::require_codec) are rejected
    /// unless both their input and output types are registered here.
    pub fn register_codec<T>(&self)
    where
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        self.inner.codecs.register_json::<T>();
    }

    /// The bus's codec registry.
    pub fn codecs(&self) -> &CodecRegistry {
        &self.inner.codecs
    }

    /// Register a handler under an address.
    ///
    /// Spawns one mailbox task per instance. With
    /// [`worker`](DeployOptions::worker) each instance gets a dedicated
    /// thread running its own single-threaded runtime; otherwise
    /// instances run on the ambient tokio runtime.
    pub fn deploy<I, O, E, H>(
        &self,
        address: impl Into<String>,
        handler: H,
        options: DeployOptions,
    ) -> Result<DeploymentHandle, DeployError>
    where
        I: Send + 'static,
        O: Send + 'static,
        E: Send + 'static,
        H: Fn(I) -> Effect<O, E> + Send + Sync + 'static,
    {
        let address = address.into();
        if options.codec_required() {
            if !self.inner.codecs.contains::<I>() {
                return Err(DeployError::MissingCodec {
                    address,
                    type_name: std::any::type_name::<I>(),
                });
            }
            if !self.inner.codecs.contains::<O>() {
                return Err(DeployError::MissingCodec {
                    address,
                    type_name: std::any::type_name::<O>(),
                });
            }
        }
        {
            let registry = self
                .inner
                .registry
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            if registry.contains_key(&address) {
                return Err(DeployError::AddressInUse { address });
            }
        }

        let handler = Arc::new(handler);
        let mut senders = Vec::with_capacity(options.instance_count());
        let mut instance_ids = Vec::with_capacity(options.instance_count());
        for index in 0..options.instance_count() {
            let (sender, mailbox) = mpsc::channel(options.mailbox_capacity_value());
            let id = format!("{address}/{index}");
            let serve = instance_loop(id.clone(), Arc::clone(&handler), mailbox);
            if options.is_worker() {
                std::thread::Builder::new()
                    .name(id.clone())
                    .spawn(move || {
                        match tokio::runtime::Builder::new_current_thread()
                            .enable_all()
                            .build()
                        {
                            Ok(runtime) => runtime.block_on(serve),
                            Err(error) => {
                                tracing::error!(%error, "worker runtime failed to start")
                            }
                        }
                    })
                    .map_err(|source| DeployError::WorkerSpawn {
                        address: address.clone(),
                        source,
                    })?;
            } else {
                tokio::spawn(serve);
            }
            senders.push(sender);
            instance_ids.push(id);
        }

        let deployment = Arc::new(Deployment {
            senders: Box::new(senders.clone()),
            postbox: Arc::new(TypedPostbox { senders }),
            next: AtomicUsize::new(0),
            timeout: options.timeout_value(),
            instance_ids: instance_ids.clone(),
        });

        let mut registry = self
            .inner
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if registry.contains_key(&address) {
            // Lost a deploy race. Dropping our senders drains the
            // just-spawned instances.
            return Err(DeployError::AddressInUse { address });
        }
        registry.insert(address.clone(), deployment);
        tracing::debug!(
            address = %address,
            instances = instance_ids.len(),
            "handler deployed"
        );
        Ok(DeploymentHandle {
            address,
            instance_ids,
        })
    }

    /// A callable for request/reply against an address.
    ///
    /// The address is resolved at each execution, not at creation, so an
    /// asker built before the deploy works once the handler is up.
    pub fn ask<I, O, E>(&self, address: impl Into<String>) -> Asker<I, O, E> {
        Asker {
            inner: Arc::clone(&self.inner),
            address: address.into(),
            timeout: None,
            _marker: PhantomData,
        }
    }

    /// Send one message without awaiting a reply.
    ///
    /// Returns as soon as the message is enqueued. A bounded mailbox
    /// that is full rejects the send with [`TellError::MailboxFull`]
    /// rather than blocking.
    pub fn tell<I: Send + 'static>(&self, address: &str, input: I) -> Result<(), TellError> {
        let registry = self
            .inner
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let deployment = registry.get(address).ok_or_else(|| TellError::NoHandler {
            address: address.to_string(),
        })?;
        let index = deployment.next.fetch_add(1, Ordering::Relaxed);
        deployment
            .postbox
            .deliver(index, Box::new(input))
            .map_err(|failure| tell_error(failure, address))
    }

    /// Broadcast one message to every instance behind an address.
    ///
    /// Delivery to all instances is attempted even if some mailboxes
    /// reject; the first failure in instance order is reported.
    pub fn publish<I>(&self, address: &str, input: I) -> Result<(), TellError>
    where
        I: Clone + Send + 'static,
    {
        let registry = self
            .inner
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let deployment = registry.get(address).ok_or_else(|| TellError::NoHandler {
            address: address.to_string(),
        })?;
        let mut first_failure = None;
        for index in 0..deployment.postbox.instance_count() {
            if let Err(failure) = deployment.postbox.deliver(index, Box::new(input.clone())) {
                first_failure.get_or_insert(tell_error(failure, address));
            }
        }
        match first_failure {
            None => Ok(()),
            Some(error) => Err(error),
        }
    }

    /// Remove a deployment.
    ///
    /// No new requests resolve once this returns. Messages already
    /// queued or in flight drain naturally; their replies are still
    /// delivered. Returns false if the address was not deployed.
    pub fn undeploy(&self, handle: &DeploymentHandle) -> bool {
        let mut registry = self
            .inner
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let removed = registry.remove(&handle.address).is_some();
        if removed {
            tracing::debug!(address = %handle.address, "handler undeployed");
        }
        removed
    }
}

fn tell_error(failure: TellFailure, address: &str) -> TellError {
    match failure {
        TellFailure::Full => TellError::MailboxFull {
            address: address.to_string(),
        },
        TellFailure::Closed => TellError::NoHandler {
            address: address.to_string(),
        },
        TellFailure::Incompatible => TellError::IncompatibleInput {
            address: address.to_string(),
        },
    }
}

/// Serial mailbox consumer for one instance.
async fn instance_loop<I, O, E, H>(id: String, handler: Arc<H>, mut mailbox: mpsc::Receiver<Call<I, O, E>>)
where
    I: Send + 'static,
    O: Send + 'static,
    E: Send + 'static,
    H: Fn(I) -> Effect<O, E> + Send + Sync + 'static,
{
    tracing::trace!(instance = %id, "instance started");
    while let Some(call) = mailbox.recv().await {
        let outcome = handler(call.input).run().await;
        match call.reply {
            Some(reply) => {
                if reply.send(outcome).is_err() {
                    tracing::trace!(instance = %id, "caller gone before reply");
                }
            }
            None => {
                if outcome.is_err() {
                    tracing::warn!(instance = %id, "one-way handler reported failure");
                }
            }
        }
    }
    tracing::trace!(instance = %id, "instance drained and stopped");
}

/// A reusable request/reply callable bound to one address.
///
/// Created by [`MessageBus::ask`]. Each [`call`](Asker::call) yields a
/// cold effect; every execution of that effect sends a fresh request.
pub struct Asker<I, O, E> {
    inner: Arc<BusInner>,
    address: String,
    timeout: Option<Duration>,
    _marker: PhantomData<fn(I) -> (O, E)>,
}

impl<I, O, E> Clone for Asker<I, O, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            address: self.address.clone(),
            timeout: self.timeout,
            _marker: PhantomData,
        }
    }
}

impl<I, O, E> fmt::Debug for Asker<I, O, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Asker")
            .field("address", &self.address)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl<I, O, E> Asker<I, O, E>
where
    I: Clone + Send + Sync + 'static,
    O: Send + 'static,
    E: Send + 'static,
{
    /// Override the deployment's default reply deadline for this asker.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the effect for one request.
    ///
    /// Each execution resolves the address, round-robins an instance,
    /// sends the request and awaits the reply under the deadline.
    /// Exactly one instance handles each request.
    pub fn call(&self, input: I) -> Effect<O, DeliveryError<E>> {
        let inner = Arc::clone(&self.inner);
        let address = self.address.clone();
        let timeout_override = self.timeout;
        Effect::new(move || {
            let inner = Arc::clone(&inner);
            let address = address.clone();
            let input = input.clone();
            async move {
                let (sender, deadline) = resolve::<I, O, E>(&inner, &address, timeout_override)?;
                let (reply_sender, reply) = oneshot::channel();
                tracing::trace!(address = %address, "dispatching request");
                let exchange = async {
                    sender
                        .send(Call {
                            input,
                            reply: Some(reply_sender),
                        })
                        .await
                        .map_err(|_| DeliveryError::NoHandler {
                            address: address.clone(),
                        })?;
                    match reply.await {
                        Ok(Ok(value)) => Ok(value),
                        Ok(Err(error)) => Err(DeliveryError::Handler(error)),
                        // Instance dropped mid-flight, e.g. undeployed.
                        Err(_) => Err(DeliveryError::NoHandler {
                            address: address.clone(),
                        }),
                    }
                };
                match tokio::time::timeout(deadline, exchange).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(DeliveryError::Timeout { duration: deadline }),
                }
            }
        })
    }
}

fn resolve<I, O, E>(
    inner: &BusInner,
    address: &str,
    timeout_override: Option<Duration>,
) -> Result<(mpsc::Sender<Call<I, O, E>>, Duration), DeliveryError<E>>
where
    I: Send + 'static,
    O: Send + 'static,
    E: Send + 'static,
{
    let registry = inner.registry.read().unwrap_or_else(PoisonError::into_inner);
    let deployment = registry
        .get(address)
        .ok_or_else(|| DeliveryError::NoHandler {
            address: address.to_string(),
        })?;
    let senders = deployment
        .senders
        .downcast_ref::<Vec<mpsc::Sender<Call<I, O, E>>>>()
        .filter(|senders| !senders.is_empty())
        .ok_or_else(|| DeliveryError::NoHandler {
            address: address.to_string(),
        })?;
    let index = deployment.next.fetch_add(1, Ordering::Relaxed) % senders.len();
    Ok((
        senders[index].clone(),
        timeout_override.unwrap_or(deployment.timeout),
    ))
}
