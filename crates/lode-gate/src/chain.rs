use std::time::Instant;

use async_trait::async_trait;
use lode_store::AccessResult;
use lode_stream::GuardedStream;

use crate::validator::{DataValidator, ValidationRequest};

/// A pipeline of validators applied in order.
///
/// Each validator receives the stream produced by the previous one, so
/// transforms compose. The chain is **fail-fast**: the first rejection (or
/// stream error) is returned and later validators never run. An empty chain
/// passes the body through.
#[derive(Default)]
pub struct ValidatorChain {
    validators: Vec<Box<dyn DataValidator>>,
    permissive: bool,
}

impl ValidatorChain {
    /// An empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// A chain that skips every validator and accepts all writes.
    pub fn permissive() -> Self {
        Self {
            validators: Vec::new(),
            permissive: true,
        }
    }

    /// Append a validator to the end of the chain.
    pub fn add(&mut self, validator: Box<dyn DataValidator>) {
        self.validators.push(validator);
    }

    /// Builder form of [`Self::add`].
    pub fn with(mut self, validator: impl DataValidator + 'static) -> Self {
        self.add(Box::new(validator));
        self
    }

    /// Number of validators in the chain.
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub fn is_permissive(&self) -> bool {
        self.permissive
    }

    /// Names of the validators in evaluation order.
    pub fn names(&self) -> Vec<&str> {
        self.validators.iter().map(|v| v.name()).collect()
    }
}

#[async_trait]
impl DataValidator for ValidatorChain {
    fn name(&self) -> &str {
        "chain"
    }

    async fn handle(&self, request: ValidationRequest<'_>) -> AccessResult<GuardedStream> {
        if self.permissive {
            return Ok(request.data);
        }

        let identifier = request.identifier;
        let metadata = request.metadata;
        let mut data = request.data;

        for validator in &self.validators {
            let started = Instant::now();
            let result = validator
                .handle(ValidationRequest::new(identifier, data, metadata))
                .await;
            let elapsed = started.elapsed();

            match result {
                Ok(output) => {
                    tracing::debug!(
                        identifier = %identifier,
                        validator = validator.name(),
                        elapsed_us = elapsed.as_micros() as u64,
                        "validator passed"
                    );
                    data = output;
                }
                Err(err) => {
                    tracing::warn!(
                        identifier = %identifier,
                        validator = validator.name(),
                        error = %err,
                        "write rejected"
                    );
                    return Err(err);
                }
            }
        }

        Ok(data)
    }
}

impl std::fmt::Debug for ValidatorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatorChain")
            .field("validators", &self.names())
            .field("permissive", &self.permissive)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::validators::{MaxSizeValidator, NoopValidator, TransformValidator};
    use lode_types::{RepresentationMetadata, ResourceIdentifier};

    /// Counts how often it is invoked and passes the body through.
    struct Counting(Arc<AtomicUsize>);

    #[async_trait]
    impl DataValidator for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        async fn handle(&self, request: ValidationRequest<'_>) -> AccessResult<GuardedStream> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(request.data)
        }
    }

    async fn run(chain: &ValidatorChain, body: &'static str) -> AccessResult<String> {
        let id = ResourceIdentifier::new("/doc.txt");
        let meta = RepresentationMetadata::new(id.clone());
        let out = chain
            .handle(ValidationRequest::new(&id, GuardedStream::from(body), &meta))
            .await?;
        Ok(out.read_to_string().await?)
    }

    #[tokio::test]
    async fn empty_chain_passes_through() {
        let chain = ValidatorChain::new();
        assert!(chain.is_empty());
        assert_eq!(run(&chain, "body").await.unwrap(), "body");
    }

    #[tokio::test]
    async fn outputs_feed_the_next_validator() {
        // The size check sees the transformed body.
        let chain = ValidatorChain::new()
            .with(TransformValidator::new("double", |b: bytes::Bytes| {
                [&b[..], &b[..]].concat().into()
            }))
            .with(TransformValidator::uppercase())
            .with(MaxSizeValidator::new(6));
        assert_eq!(chain.names(), vec!["double", "uppercase", "max-size"]);
        assert_eq!(run(&chain, "abc").await.unwrap(), "ABCABC");
        assert!(run(&chain, "abcd").await.unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn fail_fast_skips_later_validators() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = ValidatorChain::new()
            .with(MaxSizeValidator::new(2))
            .with(Counting(calls.clone()));
        assert!(run(&chain, "too long").await.unwrap_err().is_validation());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert_eq!(run(&chain, "ok").await.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn permissive_chain_skips_everything() {
        let mut chain = ValidatorChain::permissive();
        chain.add(Box::new(MaxSizeValidator::new(0)));
        chain.add(Box::new(NoopValidator));
        assert!(chain.is_permissive());
        assert_eq!(chain.len(), 2);
        assert_eq!(run(&chain, "anything").await.unwrap(), "anything");
    }
}
