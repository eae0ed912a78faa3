// src/scheduler/service.rs
// Cron-driven ingestion scheduler (C10, spec.md §4.10).
//
// Grounded on original_source/src/data_manager/scheduler.py's
// poll-loop/mutex/hot-reload design, transposed onto tokio: the
// `threading.Lock`-guarded job list becomes a `tokio::sync::Mutex<Vec<Job>>`
// and the single-callback-at-a-time guarantee becomes a
// `tokio::sync::Mutex<()>` held for the duration of each run. Cron
// expressions are parsed with the `cron` crate (as in
// `examples/other_examples/manifests/lawyered0-cLawyer/Cargo.toml`) rather
// than `croniter`.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use cron::Schedule;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{CoreError, CoreResult};

use super::models::{CollectorFn, IngestionStatus, Job, JobState, SourceStatus};

type ScheduleLoader =
    Arc<dyn Fn() -> Pin<Box<dyn Future<Output = anyhow::Result<HashMap<String, String>>> + Send>> + Send + Sync>;
type JobFactory = Arc<dyn Fn(&str) -> CollectorFn + Send + Sync>;

pub struct Scheduler {
    jobs: Mutex<Vec<Job>>,
    run_lock: Mutex<()>,
    poll_interval: Duration,
    config_poll_interval: Duration,
    status_path: Option<PathBuf>,
    reload: Mutex<Option<(ScheduleLoader, JobFactory)>>,
    config_hash: Mutex<Option<String>>,
}

impl Scheduler {
    pub fn new(poll_interval: Duration, config_poll_interval: Duration, status_path: Option<PathBuf>) -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
            run_lock: Mutex::new(()),
            poll_interval,
            config_poll_interval,
            status_path,
            reload: Mutex::new(None),
            config_hash: Mutex::new(None),
        }
    }

    pub async fn add_job(&self, name: &str, cron_expr: &str, callback: CollectorFn) -> CoreResult<()> {
        let schedule = parse_cron(cron_expr)?;
        let next_run = next_after(&schedule, Utc::now());
        let mut jobs = self.jobs.lock().await;
        jobs.push(Job {
            name: name.to_string(),
            cron_expr: cron_expr.to_string(),
            schedule,
            callback,
            next_run,
            last_run: None,
            state: JobState::Idle,
        });
        info!(job = name, cron = cron_expr, %next_run, "scheduled job");
        Ok(())
    }

    pub async fn remove_job(&self, name: &str) -> bool {
        let mut jobs = self.jobs.lock().await;
        let before = jobs.len();
        jobs.retain(|j| j.name != name);
        jobs.len() < before
    }

    pub async fn update_job(&self, name: &str, cron_expr: &str) -> CoreResult<bool> {
        let schedule = parse_cron(cron_expr)?;
        let mut jobs = self.jobs.lock().await;
        let Some(job) = jobs.iter_mut().find(|j| j.name == name) else {
            return Ok(false);
        };
        if job.cron_expr != cron_expr {
            job.cron_expr = cron_expr.to_string();
            job.schedule = schedule;
            job.next_run = next_after(&job.schedule, Utc::now());
            info!(job = name, cron = cron_expr, next_run = %job.next_run, "updated job schedule");
        }
        Ok(true)
    }

    /// Installs a database-backed loader of `{name: cron_expr}` plus a
    /// factory producing each job's callback. Initializes the change-
    /// detection hash from the current config (spec.md §4.10).
    pub async fn set_config_loader(&self, loader: ScheduleLoader, job_factory: JobFactory) {
        let hash = match loader().await {
            Ok(schedules) => Some(hash_schedules(&schedules)),
            Err(err) => {
                warn!(error = %err, "failed to initialize schedule config hash");
                None
            }
        };
        *self.config_hash.lock().await = hash;
        *self.reload.lock().await = Some((loader, job_factory));
    }

    /// Forces an immediate reconciliation against the loader's current
    /// output (spec.md §4.10).
    pub async fn reload_schedules(&self) -> CoreResult<HashMap<String, String>> {
        let guard = self.reload.lock().await;
        let Some((loader, factory)) = guard.as_ref() else {
            warn!("reload_schedules called with no config loader installed");
            return Ok(HashMap::new());
        };

        let schedules = loader()
            .await
            .map_err(|err| CoreError::Configuration(err.to_string()))?;
        self.reconcile(&schedules, factory).await?;
        *self.config_hash.lock().await = Some(hash_schedules(&schedules));
        Ok(schedules)
    }

    async fn check_for_config_changes(&self) {
        let guard = self.reload.lock().await;
        let Some((loader, factory)) = guard.as_ref() else {
            return;
        };

        let schedules = match loader().await {
            Ok(s) => s,
            Err(err) => {
                warn!(error = %err, "failed to check for schedule config changes");
                return;
            }
        };

        let new_hash = hash_schedules(&schedules);
        let mut current_hash = self.config_hash.lock().await;
        if current_hash.as_deref() != Some(new_hash.as_str()) {
            info!("schedule configuration changed, reloading jobs");
            if let Err(err) = self.reconcile(&schedules, factory).await {
                warn!(error = %err, "failed to reconcile schedules");
                return;
            }
            *current_hash = Some(new_hash);
        }
    }

    async fn reconcile(&self, schedules: &HashMap<String, String>, factory: &JobFactory) -> CoreResult<()> {
        let mut jobs = self.jobs.lock().await;

        jobs.retain(|job| {
            let keep = schedules.get(&job.name).is_some_and(|cron| !cron.is_empty());
            if !keep {
                info!(job = %job.name, "removed scheduled job");
            }
            keep
        });

        for (name, cron_expr) in schedules {
            if cron_expr.is_empty() {
                continue;
            }

            if let Some(job) = jobs.iter_mut().find(|j| &j.name == name) {
                if &job.cron_expr != cron_expr {
                    match parse_cron(cron_expr) {
                        Ok(schedule) => {
                            job.cron_expr = cron_expr.clone();
                            job.next_run = next_after(&schedule, Utc::now());
                            job.schedule = schedule;
                            info!(job = name, cron = cron_expr, "updated job schedule");
                        }
                        Err(err) => warn!(job = name, error = %err, "invalid cron expression, keeping previous schedule"),
                    }
                }
                continue;
            }

            match parse_cron(cron_expr) {
                Ok(schedule) => {
                    let callback = factory(name);
                    let next_run = next_after(&schedule, Utc::now());
                    jobs.push(Job {
                        name: name.clone(),
                        cron_expr: cron_expr.clone(),
                        schedule,
                        callback,
                        next_run,
                        last_run: None,
                        state: JobState::Idle,
                    });
                    info!(job = name, cron = cron_expr, "added scheduled job");
                }
                Err(err) => warn!(job = name, error = %err, "failed to create job, skipping"),
            }
        }

        Ok(())
    }

    /// Runs forever, ticking at `poll_interval` and running due jobs one
    /// at a time under `run_lock` (spec.md §4.10/§5). Intended to be
    /// spawned as its own task; never returns under normal operation.
    pub async fn run(self: Arc<Self>) {
        let mut last_config_check = Utc::now();
        loop {
            if self.reload.lock().await.is_some() {
                let elapsed = Utc::now().signed_duration_since(last_config_check);
                if elapsed.to_std().unwrap_or_default() >= self.config_poll_interval {
                    self.check_for_config_changes().await;
                    last_config_check = Utc::now();
                }
            }

            self.run_due_jobs().await;
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn run_due_jobs(&self) {
        let now = Utc::now();
        let due: Vec<(String, CollectorFn, Option<chrono::DateTime<Utc>>)> = {
            let jobs = self.jobs.lock().await;
            jobs.iter()
                .filter(|j| j.next_run <= now)
                .map(|j| (j.name.clone(), Arc::clone(&j.callback), j.last_run))
                .collect()
        };

        for (name, callback, last_run) in due {
            self.run_job(&name, callback, last_run).await;
        }

        self.write_status().await;
    }

    async fn run_job(&self, name: &str, callback: CollectorFn, last_run: Option<chrono::DateTime<Utc>>) {
        let _guard = self.run_lock.lock().await;

        {
            let mut jobs = self.jobs.lock().await;
            if let Some(job) = jobs.iter_mut().find(|j| j.name == name) {
                job.state = JobState::Running;
            }
        }

        info!(job = name, "running scheduled job");
        let outcome = callback(last_run).await;
        let succeeded = outcome.is_ok();
        if let Err(err) = outcome {
            warn!(job = name, error = %err, "scheduled job failed");
        }

        let now = Utc::now();
        let mut jobs = self.jobs.lock().await;
        if let Some(job) = jobs.iter_mut().find(|j| j.name == name) {
            job.state = JobState::Idle;
            // last_run only advances on clean completion; a failed run must
            // not look like it observed data through `now`.
            if succeeded {
                job.last_run = Some(now);
            }
            job.next_run = next_after(&job.schedule, now);
        }
    }

    async fn write_status(&self) {
        let Some(path) = &self.status_path else {
            return;
        };

        let status: IngestionStatus = {
            let jobs = self.jobs.lock().await;
            jobs.iter()
                .map(|j| {
                    (
                        j.name.clone(),
                        SourceStatus {
                            schedule: j.cron_expr.clone(),
                            state: j.state,
                            last_run: j.last_run,
                        },
                    )
                })
                .collect()
        };

        if let Err(err) = write_status_atomic(path, &status) {
            warn!(error = %err, path = %path.display(), "failed to write ingestion status file");
        }
    }
}

fn parse_cron(cron_expr: &str) -> CoreResult<Schedule> {
    Schedule::from_str(cron_expr)
        .map_err(|err| CoreError::config_validation("cron_expression", err.to_string()))
}

fn next_after(schedule: &Schedule, after: chrono::DateTime<Utc>) -> chrono::DateTime<Utc> {
    schedule.after(&after).next().unwrap_or(after)
}

fn hash_schedules(schedules: &HashMap<String, String>) -> String {
    let mut keys: Vec<&String> = schedules.keys().collect();
    keys.sort();
    let mut hasher = Sha256::new();
    for key in keys {
        hasher.update(key.as_bytes());
        hasher.update(b"=");
        hasher.update(schedules[key].as_bytes());
        hasher.update(b";");
    }
    hex::encode(hasher.finalize())
}

fn write_status_atomic(path: &PathBuf, status: &IngestionStatus) -> anyhow::Result<()> {
    let json = serde_json::to_vec_pretty(status)?;
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_under_key_reordering() {
        let mut a = HashMap::new();
        a.insert("docs".to_string(), "0 * * * *".to_string());
        a.insert("tickets".to_string(), "*/5 * * * *".to_string());

        let mut b = HashMap::new();
        b.insert("tickets".to_string(), "*/5 * * * *".to_string());
        b.insert("docs".to_string(), "0 * * * *".to_string());

        assert_eq!(hash_schedules(&a), hash_schedules(&b));
    }

    #[test]
    fn hash_changes_when_a_cron_expression_changes() {
        let mut a = HashMap::new();
        a.insert("docs".to_string(), "0 * * * *".to_string());
        let mut b = a.clone();
        b.insert("docs".to_string(), "0 0 * * *".to_string());

        assert_ne!(hash_schedules(&a), hash_schedules(&b));
    }

    #[test]
    fn parses_standard_five_field_cron_expressions() {
        // the `cron` crate expects a leading seconds field
        assert!(parse_cron("0 0 * * * *").is_ok());
        assert!(parse_cron("not a cron expression").is_err());
    }

    #[test]
    fn next_after_advances_past_the_given_instant() {
        let schedule = parse_cron("0 * * * * *").unwrap();
        let now = Utc::now();
        let next = next_after(&schedule, now);
        assert!(next > now);
    }

    fn noop_callback() -> CollectorFn {
        Arc::new(|_| Box::pin(async { Ok(()) }))
    }

    #[tokio::test]
    async fn reconciling_an_unchanged_schedule_set_preserves_job_identity_and_next_run() {
        let scheduler = Scheduler::new(Duration::from_secs(1), Duration::from_secs(60), None);
        let mut schedules = HashMap::new();
        schedules.insert("docs".to_string(), "0 * * * * *".to_string());
        let factory: JobFactory = Arc::new(|_| noop_callback());

        scheduler.reconcile(&schedules, &factory).await.unwrap();
        let next_run_before = scheduler.jobs.lock().await[0].next_run;

        // Same schedule set, rebuilt fresh: reconcile must not touch
        // unchanged jobs.
        scheduler.reconcile(&schedules.clone(), &factory).await.unwrap();
        let jobs_after = scheduler.jobs.lock().await;
        assert_eq!(jobs_after.len(), 1);
        assert_eq!(jobs_after[0].name, "docs");
        assert_eq!(jobs_after[0].next_run, next_run_before);
    }

    #[tokio::test]
    async fn reconcile_adds_and_removes_jobs_to_match_the_new_schedule_set() {
        let scheduler = Scheduler::new(Duration::from_secs(1), Duration::from_secs(60), None);
        let factory: JobFactory = Arc::new(|_| noop_callback());

        let mut schedules = HashMap::new();
        schedules.insert("docs".to_string(), "0 * * * * *".to_string());
        scheduler.reconcile(&schedules, &factory).await.unwrap();

        schedules.remove("docs");
        schedules.insert("tickets".to_string(), "*/5 * * * * *".to_string());
        scheduler.reconcile(&schedules, &factory).await.unwrap();

        let jobs = scheduler.jobs.lock().await;
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].name, "tickets");
    }
}
