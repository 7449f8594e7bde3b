//! Shared controller context

use std::sync::Arc;

use kube::Client;

use kalypso_github::GitRemoteFactory;

/// State shared by every reconciler.
pub struct Context {
    /// Kubernetes API client
    pub client: Client,

    /// Builds GitHub adapters for GitOpsRepo specs; swapped for an
    /// in-memory remote in tests
    pub github: Arc<dyn GitRemoteFactory>,
}

impl Context {
    pub fn new(client: Client, github: Arc<dyn GitRemoteFactory>) -> Self {
        Self { client, github }
    }
}
