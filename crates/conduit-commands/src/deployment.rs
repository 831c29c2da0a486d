//! Abstraction over whatever deployment descriptor backs `/info` — the
//! original queried CloudFormation; any orchestrator can satisfy this trait.

use conduit_core::error::Result;

#[derive(Debug, Clone)]
pub struct DeploymentDescriptor {
    pub stack_name: String,
    pub status: String,
    pub last_updated: String,
}

pub trait DeploymentInfoProvider: Send + Sync {
    fn describe(&self) -> Result<DeploymentDescriptor>;
}

/// Fallback used when no orchestrator integration is configured — reports a
/// static descriptor rather than failing the command outright.
pub struct StaticDeploymentInfo {
    pub descriptor: DeploymentDescriptor,
}

impl DeploymentInfoProvider for StaticDeploymentInfo {
    fn describe(&self) -> Result<DeploymentDescriptor> {
        Ok(self.descriptor.clone())
    }
}
