//! Typed per-interaction input from the presentation layer.

use serde::{Deserialize, Serialize};

/// Dropdown value: unset, one variable, or a list of variables.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BaseSelection {
    #[default]
    Unset,
    One(String),
    Many(Vec<String>),
}

impl BaseSelection {
    /// Selected names with duplicates removed, first occurrence kept.
    /// `None` when nothing is selected.
    pub fn names(&self) -> Option<Vec<String>> {
        let raw: &[String] = match self {
            BaseSelection::Unset => return None,
            BaseSelection::One(name) => std::slice::from_ref(name),
            BaseSelection::Many(names) => names,
        };
        let mut out: Vec<String> = Vec::with_capacity(raw.len());
        for name in raw {
            if !out.contains(name) {
                out.push(name.clone());
            }
        }
        (!out.is_empty()).then_some(out)
    }
}

/// Which input fired this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    BaseVariable,
    DataReloaded,
    LogScale,
    #[serde(rename = "pvalue")]
    PValue,
}

impl Trigger {
    /// Display-only changes keep the cached transform.
    pub fn reuses_cache(self) -> bool {
        matches!(self, Trigger::LogScale | Trigger::PValue)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Trigger::BaseVariable => "base_variable",
            Trigger::DataReloaded => "data_reloaded",
            Trigger::LogScale => "log_scale",
            Trigger::PValue => "pvalue",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ManhattanSelection {
    #[serde(default)]
    pub base: BaseSelection,
    #[serde(default)]
    pub pvalue: Option<f64>,
    #[serde(default)]
    pub log_scale: bool,
}

/// One UI event. `seq` must increase across a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub seq: u64,
    pub trigger: Trigger,
    #[serde(flatten)]
    pub selection: ManhattanSelection,
}

/// The log-scale checklist is on when its value is exactly `["LOG"]`.
pub fn log_scale_from_checklist(values: &[String]) -> bool {
    values.len() == 1 && values[0] == "LOG"
}

/// Rows the transform should be restricted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaseRequest {
    AllColumns,
    Variables(Vec<String>),
}

impl BaseRequest {
    pub fn resolve(&self, labels: &[String]) -> Vec<String> {
        match self {
            BaseRequest::AllColumns => labels.to_vec(),
            BaseRequest::Variables(names) => names.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelKind {
    /// Every column against every column; unset selection means all.
    AllVariables,
    /// Chosen base variable(s); unset selection is rejected.
    ByVariable,
}

impl PanelKind {
    pub fn request(self, selection: &BaseSelection) -> Option<BaseRequest> {
        match (self, selection.names()) {
            (_, Some(names)) => Some(BaseRequest::Variables(names)),
            (PanelKind::AllVariables, None) => Some(BaseRequest::AllColumns),
            (PanelKind::ByVariable, None) => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PanelKind::AllVariables => "all_variables",
            PanelKind::ByVariable => "by_variable",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_dedup_and_empty() {
        assert_eq!(BaseSelection::Unset.names(), None);
        assert_eq!(BaseSelection::Many(vec![]).names(), None);
        assert_eq!(BaseSelection::One("A".into()).names(), Some(vec!["A".to_string()]));
        assert_eq!(
            BaseSelection::Many(vec!["B".into(), "A".into(), "B".into()]).names(),
            Some(vec!["B".to_string(), "A".to_string()])
        );
    }

    #[test]
    fn test_reuse_triggers() {
        assert!(Trigger::LogScale.reuses_cache());
        assert!(Trigger::PValue.reuses_cache());
        assert!(!Trigger::BaseVariable.reuses_cache());
        assert!(!Trigger::DataReloaded.reuses_cache());
    }

    #[test]
    fn test_panel_kind_requests() {
        assert_eq!(PanelKind::ByVariable.request(&BaseSelection::Unset), None);
        assert_eq!(
            PanelKind::AllVariables.request(&BaseSelection::Many(vec![])),
            Some(BaseRequest::AllColumns)
        );
        assert_eq!(
            PanelKind::ByVariable.request(&BaseSelection::One("A".into())),
            Some(BaseRequest::Variables(vec!["A".to_string()]))
        );
    }

    #[test]
    fn test_checklist_flag() {
        assert!(log_scale_from_checklist(&["LOG".to_string()]));
        assert!(!log_scale_from_checklist(&[]));
        assert!(!log_scale_from_checklist(&["LOG".to_string(), "X".to_string()]));
    }

    #[test]
    fn test_interaction_json_shapes() {
        let one: Interaction = serde_json::from_str(
            r#"{"seq":1,"trigger":"base_variable","base":"A","pvalue":0.05}"#,
        )
        .unwrap();
        assert_eq!(one.selection.base, BaseSelection::One("A".into()));
        assert!(!one.selection.log_scale);

        let many: Interaction = serde_json::from_str(
            r#"{"seq":2,"trigger":"log_scale","base":["A","B"],"pvalue":0.01,"log_scale":true}"#,
        )
        .unwrap();
        assert_eq!(many.trigger, Trigger::LogScale);
        assert_eq!(many.selection.base, BaseSelection::Many(vec!["A".into(), "B".into()]));

        let unset: Interaction =
            serde_json::from_str(r#"{"seq":3,"trigger":"pvalue","base":null}"#).unwrap();
        assert_eq!(unset.selection.base, BaseSelection::Unset);
        assert_eq!(unset.selection.pvalue, None);
    }

    #[test]
    fn test_trigger_wire_names_match_as_str() {
        for trigger in [Trigger::BaseVariable, Trigger::DataReloaded, Trigger::LogScale, Trigger::PValue] {
            let json = serde_json::to_string(&trigger).unwrap();
            assert_eq!(json, format!("\"{}\"", trigger.as_str()));
            let back: Trigger = serde_json::from_str(&json).unwrap();
            assert_eq!(back, trigger);
        }
    }
}
