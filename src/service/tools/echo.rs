//! A tool that returns its input.

use async_trait::async_trait;
use tracing::instrument;

use crate::base::types::Res;

use super::GenericTool;

/// Echoes its input back to the model. Handy for smoke-testing tool dispatch.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoTool;

#[async_trait]
impl GenericTool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Returns the given text unchanged."
    }

    #[instrument(name = "EchoTool::call", skip_all)]
    async fn call(&self, input: &str) -> Res<String> {
        Ok(input.to_string())
    }
}

// Tests.
