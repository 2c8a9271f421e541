use async_trait::async_trait;
use domains::errors::PublishError;


/// Defines the shared behaviour for all queue publishers.
///
/// A publisher is bound to one (connection target, queue name) pair for
/// its whole life and owns the single outbound channel to it. It must be
/// safe to call `send` from many tasks at once.
#[async_trait]
pub trait Publisher: std::fmt::Debug + Send + Sync {

    /// Where the queue lives, for example a broker URL or a directory
    fn target(&self) -> &str;

    /// The name of the queue messages are sent to
    fn queue_name(&self) -> &str;

    /// Send one message. Failures are either transient (the same message
    /// could be sent later) or fatal (it never will be).
    async fn send(&self, message_body: &str) -> Result<(), PublishError>;

    /// Release the outbound channel. Sending after a close opens a new one.
    async fn close(&self) {}

}
