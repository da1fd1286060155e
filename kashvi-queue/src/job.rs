use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::value::RawValue;

/// A unit of background work.
///
/// `NAME` is the stable identifier recorded in envelopes and the dead-letter
/// table. Pick a short snake_case string and keep it unchanged for as long as
/// jobs of this type may still sit in a queue.
///
/// ```
/// use kashvi_queue::Job;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct WelcomeEmail {
///     user_id: u64,
/// }
///
/// #[async_trait::async_trait]
/// impl Job for WelcomeEmail {
///     const NAME: &'static str = "welcome_email";
///
///     async fn handle(&self) -> anyhow::Result<()> {
///         tracing::info!(user_id = self.user_id, "sending welcome email");
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Job: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Stable type identifier used for registry lookup on dequeue.
    const NAME: &'static str;

    /// Execute the job. Returning an error triggers the retry policy.
    async fn handle(&self) -> anyhow::Result<()>;
}

/// Object-safe view of a decoded job.
#[async_trait]
pub(crate) trait AnyJob: Send + Sync {
    async fn run(&self) -> anyhow::Result<()>;
}

#[async_trait]
impl<J: Job> AnyJob for J {
    async fn run(&self) -> anyhow::Result<()> {
        self.handle().await
    }
}

pub(crate) type JobFactory =
    Arc<dyn Fn(&RawValue) -> Result<Box<dyn AnyJob>, serde_json::Error> + Send + Sync>;

/// Maps type names to decode factories.
#[derive(Default)]
pub(crate) struct JobRegistry {
    factories: HashMap<String, JobFactory>,
}

impl JobRegistry {
    /// Registering a name that already exists replaces the previous factory.
    pub fn register<J: Job>(&mut self) {
        let factory: JobFactory =
            Arc::new(|payload: &RawValue| -> Result<Box<dyn AnyJob>, serde_json::Error> {
                let job: J = serde_json::from_str(payload.get())?;
                Ok(Box::new(job) as Box<dyn AnyJob>)
            });
        self.factories.insert(J::NAME.to_string(), factory);
    }

    pub fn factory(&self, type_name: &str) -> Option<JobFactory> {
        self.factories.get(type_name).cloned()
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Ping;

    #[async_trait]
    impl Job for Ping {
        const NAME: &'static str = "ping";

        async fn handle(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn registry_decodes_and_runs() {
        let mut registry = JobRegistry::default();
        registry.register::<Ping>();
        assert!(registry.contains("ping"));
        assert_eq!(registry.type_names(), vec!["ping".to_string()]);

        let payload = serde_json::value::to_raw_value(&Ping).unwrap();
        let job = registry.factory("ping").unwrap()(&payload).unwrap();
        job.run().await.unwrap();
    }

    #[test]
    fn unknown_type_has_no_factory() {
        let registry = JobRegistry::default();
        assert!(registry.factory("ghost").is_none());
    }
}
