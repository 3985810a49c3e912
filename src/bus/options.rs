//! Deployment configuration.

use std::time::Duration;

const DEFAULT_MAILBOX_CAPACITY: usize = 64;
const DEFAULT_ASK_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for a single [`deploy`](crate::MessageBus::deploy).
///
/// ```rust
/// use millrace::DeployOptions;
/// use std::time::Duration;
///
/// let options = DeployOptions::new()
///     .instances(4)
///     .timeout(Duration::from_millis(1000))
///     .worker();
/// assert_eq!(options.instance_count(), 4);
/// ```
#[derive(Debug, Clone)]
pub struct DeployOptions {
    instances: usize,
    worker: bool,
    mailbox_capacity: usize,
    timeout: Duration,
    require_codec: bool,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            instances: 1,
            worker: false,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            timeout: DEFAULT_ASK_TIMEOUT,
            require_codec: false,
        }
    }
}

impl DeployOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of identical instances behind the address.
    ///
    /// Requests are distributed round-robin across them. Values below 1
    /// are treated as 1.
    pub fn instances(mut self, instances: usize) -> Self {
        self.instances = instances.max(1);
        self
    }

    /// Run each instance on a dedicated thread instead of the shared
    /// event loop. Use for handlers that block or compute heavily.
    pub fn worker(mut self) -> Self {
        self.worker = true;
        self
    }

    /// Bound each instance's mailbox to this many queued messages.
    pub fn mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity.max(1);
        self
    }

    /// Default reply deadline for asks to this address.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reject the deploy unless codecs are registered for the handler's
    /// input and output types.
    pub fn require_codec(mut self) -> Self {
        self.require_codec = true;
        self
    }

    pub fn instance_count(&self) -> usize {
        self.instances
    }

    pub fn is_worker(&self) -> bool {
        self.worker
    }

    pub fn mailbox_capacity_value(&self) -> usize {
        self.mailbox_capacity
    }

    pub fn timeout_value(&self) -> Duration {
        self.timeout
    }

    pub fn codec_required(&self) -> bool {
        self.require_codec
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = DeployOptions::default();
        assert_eq!(options.instance_count(), 1);
        assert!(!options.is_worker());
        assert_eq!(options.mailbox_capacity_value(), 64);
        assert_eq!(options.timeout_value(), Duration::from_secs(30));
        assert!(!options.codec_required());
    }

    #[test]
    fn test_zero_instances_clamped_to_one() {
        let options = DeployOptions::new().instances(0);
        assert_eq!(options.instance_count(), 1);
    }
}
