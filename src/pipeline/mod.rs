mod stages;

pub use stages::{AnalyzeStage, EnrichStage, ScrapeStage};

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use crate::error::Result;

/// One pipeline stage. Stages recover from per-item failures internally;
/// an error from `run` means the stage as a whole failed.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;
    async fn run(&self) -> Result<()>;
}

/// Run stages strictly in order, aborting on the first failure.
///
/// Deep-scraping and analysis both read what the base scrape wrote, so a
/// failed stage makes the rest of the run meaningless. There is no
/// checkpointing: each stage's read filter (missing long_desc, missing
/// analysis) makes a rerun pick up exactly where the last one stopped.
pub async fn run_sequence(stages: &[Box<dyn Stage>]) -> Result<()> {
    for stage in stages {
        tracing::info!("Starting stage '{}'", stage.name());
        stage
            .run()
            .await
            .map_err(|e| e.in_stage(stage.name()))?;
        tracing::info!("Stage '{}' finished", stage.name());
    }
    Ok(())
}

/// Fixed delay between items within a stage, to stay under the source
/// site's and the model API's rate limits. The first tick is free so a
/// single-item batch pays no delay.
pub struct Throttle {
    delay: Duration,
    primed: bool,
}

impl Throttle {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            primed: false,
        }
    }

    pub async fn tick(&mut self) {
        if self.primed {
            sleep(self.delay).await;
        } else {
            self.primed = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::sync::{Arc, Mutex};

    struct RecordingStage {
        name: &'static str,
        fail: bool,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl Stage for RecordingStage {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn run(&self) -> Result<()> {
            self.log.lock().unwrap().push(self.name);
            if self.fail {
                Err(AppError::Config("boom".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn stage(
        name: &'static str,
        fail: bool,
        log: &Arc<Mutex<Vec<&'static str>>>,
    ) -> Box<dyn Stage> {
        Box::new(RecordingStage {
            name,
            fail,
            log: Arc::clone(log),
        })
    }

    #[tokio::test]
    async fn runs_all_stages_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let stages = vec![
            stage("scrape", false, &log),
            stage("deep-scrape", false, &log),
            stage("analyze", false, &log),
        ];

        run_sequence(&stages).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["scrape", "deep-scrape", "analyze"]);
    }

    #[tokio::test]
    async fn failing_stage_aborts_the_rest() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let stages = vec![
            stage("scrape", true, &log),
            stage("deep-scrape", false, &log),
            stage("analyze", false, &log),
        ];

        let err = run_sequence(&stages).await.unwrap_err();
        assert_eq!(*log.lock().unwrap(), vec!["scrape"]);
        assert!(err.to_string().contains("scrape"));
    }

    #[tokio::test]
    async fn failure_names_the_failing_stage() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let stages = vec![stage("scrape", false, &log), stage("analyze", true, &log)];

        let err = run_sequence(&stages).await.unwrap_err();
        match err {
            AppError::Stage { stage, .. } => assert_eq!(stage, "analyze"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn throttle_first_tick_is_immediate_then_delays() {
        let mut throttle = Throttle::new(Duration::from_millis(50));

        let started = std::time::Instant::now();
        throttle.tick().await;
        assert!(started.elapsed() < Duration::from_millis(40));

        let started = std::time::Instant::now();
        throttle.tick().await;
        assert!(started.elapsed() >= Duration::from_millis(50));
    }
}
