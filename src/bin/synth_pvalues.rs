use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

use psych_dashboard::config::{open_store, DashboardConfig};
use psych_dashboard::matrix::{LabeledMatrix, PValueMatrix};
use psych_dashboard::store::{fingerprint, ArtifactName, ArtifactStore};

fn main() -> Result<()> {
    let cfg = DashboardConfig::from_env();
    let seed = std::env::var("SEED")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(42u64);
    let n = std::env::var("VARIABLES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8usize);

    let mut rng = StdRng::seed_from_u64(seed);
    let labels: Vec<String> = (0..n).map(|i| format!("VAR_{:02}", i)).collect();
    let mut cells = vec![Some(1.0); n * n];
    for i in 0..n {
        for j in (i + 1)..n {
            // Cubing skews the draw toward small, "significant" p-values.
            let p = rng.gen::<f64>().powi(3);
            cells[i * n + j] = Some(p);
            cells[j * n + i] = Some(p);
        }
    }

    let matrix = PValueMatrix::new(
        LabeledMatrix::new(labels.clone(), labels, cells)?,
        cfg.symmetry_tolerance,
    )?;
    let table = matrix.to_table()?;
    let mut store = open_store(&cfg)?;
    store.save(&ArtifactName::pvalues(), &table)?;

    println!(
        "{}",
        json!({
            "artifact": ArtifactName::pvalues().as_str(),
            "variables": n,
            "seed": seed,
            "fingerprint": fingerprint(&table)?,
        })
    );
    Ok(())
}
