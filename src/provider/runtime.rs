//! Per-exit runtime record.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::proxy::SharedHandler;

/// State tracked for one provisioned (or provisioning) exit container.
///
/// `handler` is `None` while the container is still being brought up; such
/// provisional entries exist so a failed provisioning knows what to roll back.
pub struct ExitRuntime {
    pub handler: Option<SharedHandler>,
    pub container_id: String,
    pub container_name: String,
    pub log_cancel: CancellationToken,
    pub log_task: Option<JoinHandle<()>>,
}

impl ExitRuntime {
    pub fn new(container_id: String, container_name: String) -> Self {
        Self {
            handler: None,
            container_id,
            container_name,
            log_cancel: CancellationToken::new(),
            log_task: None,
        }
    }

    /// Stop following container logs. Idempotent.
    pub fn cancel_logs(&mut self) {
        self.log_cancel.cancel();
        if let Some(task) = self.log_task.take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for ExitRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExitRuntime")
            .field("container_id", &self.container_id)
            .field("container_name", &self.container_name)
            .field("ready", &self.handler.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_logs_is_idempotent() {
        let mut runtime = ExitRuntime::new("abc".into(), "gluetun-kr".into());
        let token = runtime.log_cancel.clone();
        runtime.log_task = Some(tokio::spawn(async move { token.cancelled().await }));

        runtime.cancel_logs();
        runtime.cancel_logs();

        assert!(runtime.log_cancel.is_cancelled());
        assert!(runtime.log_task.is_none());
    }
}
