//! Parallel proof generation on blocking worker threads.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::debug;

use seatbind_types::IdentityCommitment;

use crate::encoder::EncodedIdentifiers;
use crate::error::{CircuitError, CircuitResult};
use crate::identity;
use crate::proof::{Proof, ProvingBackend};
use crate::session::{self, SessionCertificate, SessionPublic};

/// Runs independent attestations and transitions concurrently.
///
/// Workers share only the backend; results come back in input order.
#[derive(Clone)]
pub struct ProverPool {
    backend: Arc<dyn ProvingBackend>,
    permits: Arc<Semaphore>,
}

impl ProverPool {
    /// Creates a pool running at most `workers` proofs at a time.
    pub fn new(backend: Arc<dyn ProvingBackend>, workers: usize) -> Self {
        Self {
            backend,
            permits: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    pub fn backend(&self) -> &Arc<dyn ProvingBackend> {
        &self.backend
    }

    /// Attests every identity in `inputs`.
    pub async fn attest_many(
        &self,
        inputs: Vec<EncodedIdentifiers>,
    ) -> Vec<CircuitResult<(IdentityCommitment, Proof)>> {
        debug!("Attesting {} identities", inputs.len());
        let mut handles = Vec::with_capacity(inputs.len());
        for ids in inputs {
            let backend = Arc::clone(&self.backend);
            handles.push(self.spawn(move || identity::attest(backend.as_ref(), &ids)).await);
        }
        collect(handles).await
    }

    /// Proves every `(public, identifiers)` transition in `inputs`.
    pub async fn transition_many(
        &self,
        inputs: Vec<(SessionPublic, EncodedIdentifiers)>,
    ) -> Vec<CircuitResult<(SessionCertificate, Proof)>> {
        debug!("Proving {} session transitions", inputs.len());
        let mut handles = Vec::with_capacity(inputs.len());
        for (public, ids) in inputs {
            let backend = Arc::clone(&self.backend);
            handles.push(
                self.spawn(move || session::transition(backend.as_ref(), public, &ids))
                    .await,
            );
        }
        collect(handles).await
    }

    /// Waits for a permit, then starts `job` on the blocking pool.
    async fn spawn<T, F>(&self, job: F) -> CircuitResult<JoinHandle<CircuitResult<T>>>
    where
        T: Send + 'static,
        F: FnOnce() -> CircuitResult<T> + Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| CircuitError::Worker(e.to_string()))?;
        Ok(tokio::task::spawn_blocking(move || {
            let result = job();
            drop(permit);
            result
        }))
    }
}

async fn collect<T>(handles: Vec<CircuitResult<JoinHandle<CircuitResult<T>>>>) -> Vec<CircuitResult<T>> {
    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        let result = match handle {
            Ok(handle) => handle
                .await
                .unwrap_or_else(|e| Err(CircuitError::Worker(e.to_string()))),
            Err(e) => Err(e),
        };
        results.push(result);
    }
    results
}
