use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::{Job, QueueError, QueueResult};

/// Wire shape of a queued job: the registered type name plus the job's
/// serialized fields, kept as raw JSON so the bytes round-trip exactly.
#[derive(Serialize, Deserialize)]
pub(crate) struct Envelope {
    #[serde(rename = "type")]
    pub type_name: String,
    pub payload: Box<RawValue>,
}

impl Envelope {
    pub fn encode<J: Job>(job: &J) -> QueueResult<Vec<u8>> {
        let payload = serde_json::value::to_raw_value(job).map_err(|source| {
            QueueError::Serialize {
                job_type: J::NAME,
                source,
            }
        })?;
        let envelope = Envelope {
            type_name: J::NAME.to_string(),
            payload,
        };
        serde_json::to_vec(&envelope).map_err(|source| QueueError::Serialize {
            job_type: J::NAME,
            source,
        })
    }

    pub fn decode(raw: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct ResizeImage {
        path: String,
        width: u32,
    }

    #[async_trait]
    impl Job for ResizeImage {
        const NAME: &'static str = "resize_image";

        async fn handle(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn envelope_round_trips_payload() {
        let job = ResizeImage {
            path: "covers/1.png".to_string(),
            width: 640,
        };

        let raw = Envelope::encode(&job).unwrap();
        let envelope = Envelope::decode(&raw).unwrap();

        assert_eq!(envelope.type_name, "resize_image");
        let decoded: ResizeImage = serde_json::from_str(envelope.payload.get()).unwrap();
        assert_eq!(decoded, job);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(Envelope::decode(b"not json").is_err());
    }
}
