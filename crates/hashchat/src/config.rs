//! Configuration for the chat pipeline.

use hashchat_policy::AssetGate;
use hashchat_session::SessionConfig;

/// Pipeline configuration.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Session establishment parameters (domain, delegation TTL).
    pub session: SessionConfig,

    /// Optional profile-token gate applied to direct-message channels:
    /// when set, DM key release requires owning the member's profile
    /// token instead of matching the bare wallet address.
    pub profile_gate: Option<AssetGate>,
}
