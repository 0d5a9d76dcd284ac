//! Dynamically added Manhattan panels sharing one artifact store.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::controller::{ManhattanController, RefreshOutcome};
use crate::error::{DashError, Result};
use crate::logging::log_panel_added;
use crate::matrix::PValueMatrix;
use crate::selection::{Interaction, PanelKind};
use crate::store::{ArtifactName, ArtifactStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PanelId(pub u32);

impl fmt::Display for PanelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Dropdown entry for the base-variable selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariableOption {
    pub label: String,
    pub value: String,
}

pub struct PanelRegistry<S: ArtifactStore> {
    store: S,
    panels: BTreeMap<PanelId, ManhattanController>,
    next_id: u32,
    tolerance: f64,
}

impl<S: ArtifactStore> PanelRegistry<S> {
    pub fn new(store: S, tolerance: f64) -> Self {
        Self {
            store,
            panels: BTreeMap::new(),
            next_id: 0,
            tolerance,
        }
    }

    pub fn add_panel(&mut self, kind: PanelKind) -> PanelId {
        let id = PanelId(self.next_id);
        self.next_id += 1;
        self.panels.insert(id, ManhattanController::new(id, kind, self.tolerance));
        log_panel_added(id.0, kind.as_str());
        id
    }

    pub fn panel_ids(&self) -> Vec<PanelId> {
        self.panels.keys().copied().collect()
    }

    pub fn panel(&self, id: PanelId) -> Option<&ManhattanController> {
        self.panels.get(&id)
    }

    pub fn len(&self) -> usize {
        self.panels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }

    pub fn dispatch(&mut self, id: PanelId, interaction: &Interaction) -> Result<RefreshOutcome> {
        let panel = self.panels.get_mut(&id).ok_or(DashError::UnknownPanel(id))?;
        Ok(panel.handle(&mut self.store, interaction))
    }

    /// Publish a freshly computed p-value matrix (the upstream data-load
    /// event). Panels pick it up on their next recompute.
    pub fn load_pvalues(&mut self, pvalues: &PValueMatrix) -> Result<()> {
        self.store.save(&ArtifactName::pvalues(), &pvalues.to_table()?)
    }

    /// Variables offered in the base selector: p-value columns with at least
    /// one finite off-diagonal value.
    pub fn variable_options(&self) -> Result<Vec<VariableOption>> {
        let Some(table) = self.store.load(&ArtifactName::pvalues())? else {
            return Ok(Vec::new());
        };
        let pvalues = PValueMatrix::from_table(&table, self.tolerance)?;
        let m = pvalues.matrix();
        let options = pvalues
            .labels()
            .iter()
            .enumerate()
            .filter(|(c, _)| {
                (0..m.rows().len()).any(|r| r != *c && m.get(r, *c).is_some_and(f64::is_finite))
            })
            .map(|(_, label)| VariableOption {
                label: label.clone(),
                value: label.clone(),
            })
            .collect();
        Ok(options)
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::{BaseSelection, ManhattanSelection, Trigger};
    use crate::store::MemoryStore;

    fn registry() -> PanelRegistry<MemoryStore> {
        let mut reg = PanelRegistry::new(MemoryStore::new(), 1e-9);
        let m = PValueMatrix::from_rows(
            &["A", "B", "C"],
            &[1.0, 0.04, f64::NAN, 0.04, 1.0, f64::NAN, f64::NAN, f64::NAN, 1.0],
            1e-9,
        )
        .unwrap();
        reg.load_pvalues(&m).unwrap();
        reg
    }

    #[test]
    fn test_panel_ids_are_sequential() {
        let mut reg = registry();
        assert!(reg.is_empty());
        let a = reg.add_panel(PanelKind::AllVariables);
        let b = reg.add_panel(PanelKind::ByVariable);
        assert_eq!((a, b), (PanelId(0), PanelId(1)));
        assert_eq!(reg.panel_ids(), vec![a, b]);
        assert_eq!(reg.panel(b).unwrap().kind(), PanelKind::ByVariable);
    }

    #[test]
    fn test_unknown_panel() {
        let mut reg = registry();
        let interaction = Interaction {
            seq: 1,
            trigger: Trigger::BaseVariable,
            selection: ManhattanSelection::default(),
        };
        let err = reg.dispatch(PanelId(7), &interaction).unwrap_err();
        assert!(matches!(err, DashError::UnknownPanel(PanelId(7))));
    }

    #[test]
    fn test_options_skip_all_missing_columns() {
        let reg = registry();
        let values: Vec<String> = reg
            .variable_options()
            .unwrap()
            .into_iter()
            .map(|o| o.value)
            .collect();
        assert_eq!(values, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn test_options_without_data() {
        let reg = PanelRegistry::new(MemoryStore::new(), 1e-9);
        assert!(reg.variable_options().unwrap().is_empty());
    }

    #[test]
    fn test_panels_keep_separate_artifacts() {
        let mut reg = registry();
        let a = reg.add_panel(PanelKind::ByVariable);
        let b = reg.add_panel(PanelKind::ByVariable);
        let pick = |seq, base: &str| Interaction {
            seq,
            trigger: Trigger::BaseVariable,
            selection: ManhattanSelection {
                base: BaseSelection::One(base.to_string()),
                pvalue: Some(0.05),
                log_scale: false,
            },
        };
        reg.dispatch(a, &pick(1, "A")).unwrap();
        reg.dispatch(b, &pick(1, "B")).unwrap();
        let logs_a = reg.store().load(&ArtifactName::logs(a)).unwrap().unwrap();
        let logs_b = reg.store().load(&ArtifactName::logs(b)).unwrap().unwrap();
        assert_eq!(logs_a.rows[0].index, vec!["A".to_string()]);
        assert_eq!(logs_b.rows[0].index, vec!["B".to_string()]);
    }

    #[test]
    fn test_load_pvalues_then_toggle_uses_new_data() {
        use crate::controller::CacheDecision;

        let mut reg = registry();
        let panel = reg.add_panel(PanelKind::ByVariable);
        let at = |seq, trigger| Interaction {
            seq,
            trigger,
            selection: ManhattanSelection {
                base: BaseSelection::One("A".to_string()),
                pvalue: Some(0.05),
                log_scale: true,
            },
        };
        reg.dispatch(panel, &at(1, Trigger::BaseVariable)).unwrap();

        let m = PValueMatrix::from_rows(&["A", "B"], &[1.0, 0.001, 0.001, 1.0], 1e-9).unwrap();
        reg.load_pvalues(&m).unwrap();
        match reg.dispatch(panel, &at(2, Trigger::LogScale)).unwrap() {
            RefreshOutcome::Updated { plot, decision } => {
                assert_eq!(decision, CacheDecision::Recompute);
                assert_eq!(plot.points.len(), 1);
                assert!((plot.points[0].y - 3.0).abs() < 1e-9);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
