use crate::{
    models::{ApiError, ListingRequest},
    pipeline::Pipeline,
    security::AuthContext,
};
use serde::Serialize;
use std::{collections::HashMap, sync::Arc};
use tokio::{
    sync::{Mutex, mpsc},
    task::JoinHandle,
};
use tracing::info;
use uuid::Uuid;

/// Background worker for long-running draft builds. The identification chain
/// can take tens of seconds with the browser phase enabled, so callers that
/// cannot hold a request open enqueue here and poll.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<Job>,
    statuses: Arc<Mutex<HashMap<Uuid, JobState>>>,
}

#[derive(Clone)]
struct Job {
    id: Uuid,
    request: ListingRequest,
    context: AuthContext,
}

#[derive(Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Completed {
        result: crate::models::ListingDraftResponse,
    },
    Failed {
        error: String,
        stage: Option<String>,
    },
}

#[derive(Clone, Serialize)]
pub struct JobInfo {
    pub id: String,
    #[serde(flatten)]
    pub state: JobState,
}

impl JobQueue {
    pub fn spawn(pipeline: Pipeline) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Job>(queue_capacity_from_env());
        let statuses = Arc::new(Mutex::new(HashMap::new()));
        let statuses_bg = statuses.clone();

        let handle = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                {
                    let mut guard = statuses_bg.lock().await;
                    guard.insert(job.id, JobState::Running);
                }
                info!(
                    target = "partscout.jobs",
                    job_id = %job.id,
                    seller = %job.context.seller_id,
                    "listing_job_started"
                );

                let result = pipeline.run(job.request).await;
                let mut guard = statuses_bg.lock().await;
                match result {
                    Ok(resp) => {
                        guard.insert(job.id, JobState::Completed { result: resp });
                    }
                    Err(err) => {
                        guard.insert(
                            job.id,
                            JobState::Failed {
                                error: err.detail().to_string(),
                                stage: Some(err.stage().to_string()),
                            },
                        );
                    }
                }
            }
        });

        (Self { tx, statuses }, handle)
    }

    pub async fn enqueue_listing(
        &self,
        request: ListingRequest,
        context: AuthContext,
    ) -> Result<Uuid, ApiError> {
        let id = Uuid::new_v4();
        {
            let mut guard = self.statuses.lock().await;
            guard.insert(id, JobState::Queued);
        }
        let job = Job {
            id,
            request,
            context,
        };
        self.tx.send(job).await.map_err(|_| ApiError {
            error: "queue_send_failed".into(),
            detail: Some("worker not available".into()),
        })?;
        Ok(id)
    }

    pub async fn get(&self, id: Uuid) -> Option<JobInfo> {
        let guard = self.statuses.lock().await;
        guard.get(&id).cloned().map(|state| JobInfo {
            id: id.to_string(),
            state,
        })
    }
}

fn queue_capacity_from_env() -> usize {
    std::env::var("QUEUE_CAPACITY")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ImagesSource, MarketplaceId};

    fn sample_request() -> ListingRequest {
        ListingRequest {
            images_source: ImagesSource::Single("https://example.com/part.jpg".to_string()),
            vin: None,
            condition: None,
            marketplace: MarketplaceId::EbayUs,
            force_fallback: false,
            dry_run: true,
        }
    }

    #[tokio::test]
    async fn job_runs_to_completion_in_demo_mode() {
        let (queue, _handle) = JobQueue::spawn(Pipeline::demo());
        let context = AuthContext {
            seller_id: "demo-seller".into(),
            api_key_id: "key-01".into(),
        };
        let id = queue
            .enqueue_listing(sample_request(), context)
            .await
            .expect("enqueue");

        // Poll until the worker finishes; demo runs are fast and offline.
        for _ in 0..100 {
            if let Some(info) = queue.get(id).await {
                match info.state {
                    JobState::Completed { result } => {
                        assert!(result.draft_id.starts_with("PREVIEW-"));
                        return;
                    }
                    JobState::Failed { error, .. } => panic!("job failed: {error}"),
                    JobState::Queued | JobState::Running => {}
                }
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }
        panic!("job did not finish in time");
    }

    #[tokio::test]
    async fn unknown_job_id_is_none() {
        let (queue, _handle) = JobQueue::spawn(Pipeline::demo());
        assert!(queue.get(Uuid::new_v4()).await.is_none());
    }
}
