use std::io::{self, BufRead, Write};
use std::time::Instant;

use anyhow::Result;
use serde::Deserialize;
use serde_json::{json, Value};

use psych_dashboard::config::{open_store, DashboardConfig};
use psych_dashboard::logging::{log_session_start, log_session_summary, tick_aggregator};
use psych_dashboard::selection::{Interaction, PanelKind};
use psych_dashboard::store::ArtifactStore;
use psych_dashboard::{PanelId, PanelRegistry, RefreshOutcome};

#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
enum SessionCommand {
    AddPanel { kind: PanelKind },
    Options,
    Refresh { panel: PanelId, interaction: Interaction },
}

fn outcome_json(panel: PanelId, seq: u64, outcome: RefreshOutcome) -> Result<Value> {
    Ok(match outcome {
        RefreshOutcome::Updated { plot, decision } => json!({
            "status": "updated",
            "panel": panel,
            "seq": seq,
            "decision": decision,
            "plot": serde_json::to_value(plot)?,
        }),
        RefreshOutcome::NoUpdate { reason, retained } => json!({
            "status": "no_update",
            "panel": panel,
            "seq": seq,
            "reason": reason,
            "has_plot": retained.is_some(),
        }),
        RefreshOutcome::Failed { error, retained } => json!({
            "status": "failed",
            "panel": panel,
            "seq": seq,
            "error_kind": error.kind(),
            "error": error.to_string(),
            "has_plot": retained.is_some(),
        }),
    })
}

fn run_command<S: ArtifactStore>(
    registry: &mut PanelRegistry<S>,
    cfg: &DashboardConfig,
    cmd: SessionCommand,
) -> Result<Value> {
    match cmd {
        SessionCommand::AddPanel { kind } => {
            let id = registry.add_panel(kind);
            Ok(json!({ "status": "ok", "panel": id, "kind": kind }))
        }
        SessionCommand::Options => Ok(json!({
            "status": "ok",
            "options": registry.variable_options()?,
            "pvalue_default": cfg.default_pvalue,
            "pvalue_step": cfg.pvalue_step,
        })),
        SessionCommand::Refresh { panel, interaction } => {
            let outcome = registry.dispatch(panel, &interaction)?;
            outcome_json(panel, interaction.seq, outcome)
        }
    }
}

fn main() -> Result<()> {
    let cfg = DashboardConfig::from_env();
    let store = open_store(&cfg)?;
    let mut registry = PanelRegistry::new(store, cfg.symmetry_tolerance);
    log_session_start(&format!("{:?}", cfg.store_backend).to_lowercase(), cfg.symmetry_tolerance);

    let started = Instant::now();
    let mut commands = 0u64;
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        commands += 1;
        let response = match serde_json::from_str::<SessionCommand>(&line) {
            Ok(cmd) => run_command(&mut registry, &cfg, cmd)
                .unwrap_or_else(|err| json!({ "status": "error", "error": err.to_string() })),
            Err(err) => json!({ "status": "error", "error": format!("bad command json: {}", err) }),
        };
        writeln!(out, "{}", response)?;
        out.flush()?;
        tick_aggregator();
    }

    log_session_summary(started.elapsed().as_secs(), commands, registry.len());
    Ok(())
}
