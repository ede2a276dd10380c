//! Southbound control channel

use async_trait::async_trait;
use sdn_common::{ControlCommand, SdnResult};

/// Delivers controller commands to switches
#[async_trait]
pub trait ControlChannel: Send + Sync {
    /// Send one command; the reply, if any, comes back as an event
    async fn send(&self, command: ControlCommand) -> SdnResult<()>;
}
