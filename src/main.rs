//! Insight runner: drives the engine from newline-delimited JSON on stdin
//! against in-memory stores, one JSON result per line on stdout.
//!
//! ```text
//! {"cmd":"set_enabled","user_id":1,"enabled":true}
//! {"cmd":"add_keyword","user_id":1,"keyword":"coffee"}
//! {"cmd":"log","user_id":1,"content":"Had coffee today, feeling great"}
//! {"cmd":"feedback","user_id":1,"insight_id":1,"vote":"DISLIKE","reason":"too sharp"}
//! {"cmd":"remove_keyword","user_id":1,"keyword":"coffee"}
//! {"cmd":"sweep"}
//! ```
//!
//! The keyword sweep also runs in the background on its configured interval.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use diary_insights::config::InsightConfig;
use diary_insights::engine::{InsightEngine, LogOutcome, MemoryBackend};
use diary_insights::feedback::FeedbackSubmission;
use diary_insights::generate::{InsightGenerator, ThreadRandom};
use diary_insights::model::UserId;
use diary_insights::notify::EmitterMux;
use diary_insights::pipeline::PipelineOutcome;
use diary_insights::telemetry::{ensure_metrics_described, init_tracing};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Debug, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
enum Command {
    Log {
        user_id: UserId,
        content: String,
        #[serde(default)]
        at: Option<DateTime<Utc>>,
    },
    AddKeyword {
        user_id: UserId,
        keyword: String,
    },
    RemoveKeyword {
        user_id: UserId,
        keyword: String,
    },
    SetEnabled {
        user_id: UserId,
        enabled: bool,
    },
    Feedback(FeedbackSubmission),
    Signals {
        user_id: UserId,
    },
    Sweep,
}

struct Runner {
    engine: InsightEngine,
    backend: MemoryBackend,
}

impl Runner {
    async fn execute(&self, cmd: Command) -> anyhow::Result<Value> {
        let now = Utc::now();
        match cmd {
            Command::Log { user_id, content, at } => {
                let log = self.backend.logs.append(user_id, content, at.unwrap_or(now))?;
                let outcome = self.engine.on_log_created(&log, now).await?;
                Ok(render_log_outcome(log.id, &outcome))
            }
            Command::AddKeyword { user_id, keyword } => {
                let added = self.backend.gate.add_keyword(user_id, &keyword)?;
                let change = self.engine.keyword_added(user_id, &keyword, now).await?;
                Ok(json!({ "added": added, "signal": change }))
            }
            Command::RemoveKeyword { user_id, keyword } => {
                let removed = self.backend.gate.remove_keyword(user_id, &keyword)?;
                let change = self.engine.keyword_removed(user_id, &keyword, now).await?;
                Ok(json!({ "removed": removed, "signal": change }))
            }
            Command::SetEnabled { user_id, enabled } => {
                self.backend.gate.set_enabled(user_id, enabled)?;
                Ok(json!({ "enabled": enabled }))
            }
            Command::Feedback(sub) => {
                let profile = self.engine.submit_feedback(sub, now).await?;
                Ok(json!({ "profile": profile }))
            }
            Command::Signals { user_id } => {
                let active = self.engine.active_signals(user_id).await?;
                let drops = self.engine.water_drops(user_id).await?;
                Ok(json!({ "active": active, "water_drops": drops }))
            }
            Command::Sweep => {
                let report = self.engine.sweep(now).await?;
                Ok(json!({ "sweep": report }))
            }
        }
    }
}

fn render_log_outcome(log_id: i64, outcome: &LogOutcome) -> Value {
    let candy: Vec<Value> = outcome
        .signals
        .iter()
        .map(|s| json!({ "keyword": s.keyword_key, "candy": s.candy_count }))
        .collect();
    let insight = match &outcome.pipeline {
        PipelineOutcome::Created(i) => json!({ "status": "created", "insight": i }),
        PipelineOutcome::Skipped(r) => json!({ "status": "skipped", "reason": r.code() }),
        PipelineOutcome::NotGenerated(e) => {
            json!({ "status": "not_generated", "cause": e.cause() })
        }
    };
    json!({ "log_id": log_id, "insight": insight, "candy": candy })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();
    ensure_metrics_described();

    let cfg = InsightConfig::load()?;
    let generator = Arc::new(InsightGenerator::from_config(&cfg, Arc::new(ThreadRandom))?);
    tracing::info!(strategy = generator.strategy_name(), "insight runner starting");

    let backend = MemoryBackend::new(cfg.trigger.offset());
    let engine = InsightEngine::new(cfg, backend.stores(), generator, EmitterMux::from_env());
    let sweeper = engine.spawn_scheduler();
    let runner = Runner { engine, backend };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let reply = match serde_json::from_str::<Command>(line) {
            Ok(cmd) => runner
                .execute(cmd)
                .await
                .unwrap_or_else(|e| json!({ "error": format!("{e:#}") })),
            Err(e) => json!({ "error": format!("bad command: {e}") }),
        };
        stdout.write_all(format!("{reply}\n").as_bytes()).await?;
        stdout.flush().await?;
    }

    sweeper.abort();
    Ok(())
}
