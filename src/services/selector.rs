use crate::domain::{SelectionRequest, ServiceChooser, ServiceMap};
use crate::error::{MicroError, Result};
use tracing::warn;

pub const SELECT_PROMPT: &str = "Select a service";

/// Resolves what the operator asked for against the eligible services
#[derive(Debug)]
pub struct ServiceSelector<'a> {
    chooser: &'a dyn ServiceChooser,
}

impl<'a> ServiceSelector<'a> {
    pub fn new(chooser: &'a dyn ServiceChooser) -> Self {
        Self { chooser }
    }

    /// Returns the targeted services, keeping `eligible`'s order.
    ///
    /// An unknown explicit name is not fatal: it is reported and the operator
    /// gets to pick from the eligible services instead.
    pub fn select(&self, request: &SelectionRequest, eligible: &ServiceMap) -> Result<ServiceMap> {
        let name = match request {
            SelectionRequest::All => return Ok(eligible.clone()),
            SelectionRequest::Single(name) if eligible.contains_key(name) => name.clone(),
            SelectionRequest::Single(name) => {
                warn!("Service with name '{name}' is not configured in docker-compose.yml yet.");
                self.ask(eligible)?
            }
            SelectionRequest::Interactive => self.ask(eligible)?,
        };

        let (name, service) = eligible
            .get_key_value(&name)
            .ok_or_else(|| MicroError::InvalidSelection(name.clone()))?;

        Ok(ServiceMap::from([(name.clone(), service.clone())]))
    }

    fn ask(&self, eligible: &ServiceMap) -> Result<String> {
        let options: Vec<String> = eligible.keys().cloned().collect();
        if options.is_empty() {
            return Err(MicroError::InvalidSelection(String::new()));
        }
        self.chooser.choose(SELECT_PROMPT, &options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EligibleService, ServiceEntry};
    use crate::test_support::{ScriptedChooser, capture_logs};
    use std::path::PathBuf;

    fn eligible(names: &[&str]) -> ServiceMap {
        names
            .iter()
            .map(|name| {
                (
                    name.to_string(),
                    EligibleService {
                        entry: ServiceEntry::new(
                            *name,
                            Some("prooph/php:7.2".into()),
                            PathBuf::from("/p/service").join(name),
                        ),
                        tool_version_tag: "7.2".into(),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn all_returns_everything_in_order() {
        let chooser = ScriptedChooser::answering("unused");
        let services = eligible(&["c", "a", "b"]);

        let selected = ServiceSelector::new(&chooser)
            .select(&SelectionRequest::All, &services)
            .unwrap();

        assert_eq!(selected.keys().collect::<Vec<_>>(), vec!["c", "a", "b"]);
        assert!(chooser.offered().is_empty());
    }

    #[test]
    fn known_name_selects_single_service() {
        let chooser = ScriptedChooser::answering("unused");
        let services = eligible(&["a", "b"]);

        let selected = ServiceSelector::new(&chooser)
            .select(&SelectionRequest::Single("b".into()), &services)
            .unwrap();

        assert_eq!(selected.len(), 1);
        assert_eq!(selected["b"], services["b"]);
        assert!(chooser.offered().is_empty());
    }

    #[test]
    fn unknown_name_warns_and_falls_back_to_prompt() {
        let chooser = ScriptedChooser::answering("a");
        let services = eligible(&["a", "d"]);

        let (selected, logs) = capture_logs(|| {
            ServiceSelector::new(&chooser)
                .select(&SelectionRequest::Single("unknown-service".into()), &services)
        });

        assert_eq!(selected.unwrap().keys().collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(chooser.offered(), vec![vec!["a".to_string(), "d".to_string()]]);
        assert!(logs.contains("WARN"));
        assert!(logs.contains(
            "Service with name 'unknown-service' is not configured in docker-compose.yml yet."
        ));
    }

    #[test]
    fn blank_name_is_warned_about_like_any_unknown_name() {
        let chooser = ScriptedChooser::answering("d");
        let services = eligible(&["a", "d"]);
        let request = SelectionRequest::from_cli(Some("  ".into()), false);

        let (selected, logs) =
            capture_logs(|| ServiceSelector::new(&chooser).select(&request, &services));

        assert_eq!(selected.unwrap().keys().collect::<Vec<_>>(), vec!["d"]);
        assert!(logs.contains("Service with name '  ' is not configured"));
    }

    #[test]
    fn known_name_logs_no_warning() {
        let chooser = ScriptedChooser::answering("unused");
        let services = eligible(&["a"]);

        let (_, logs) = capture_logs(|| {
            ServiceSelector::new(&chooser).select(&SelectionRequest::Single("a".into()), &services)
        });

        assert!(!logs.contains("WARN"));
    }

    #[test]
    fn interactive_uses_chooser() {
        let chooser = ScriptedChooser::answering("d");
        let services = eligible(&["a", "d"]);

        let selected = ServiceSelector::new(&chooser)
            .select(&SelectionRequest::Interactive, &services)
            .unwrap();

        assert_eq!(selected.keys().collect::<Vec<_>>(), vec!["d"]);
    }

    #[test]
    fn choice_outside_eligible_set_is_rejected() {
        let chooser = ScriptedChooser::answering("ghost");
        let services = eligible(&["a"]);

        let err = ServiceSelector::new(&chooser)
            .select(&SelectionRequest::Interactive, &services)
            .unwrap_err();

        assert!(matches!(err, MicroError::InvalidSelection(ref name) if name == "ghost"));
    }

    #[test]
    fn prompt_failure_is_fatal() {
        let chooser = ScriptedChooser::failing();
        let services = eligible(&["a"]);

        let err = ServiceSelector::new(&chooser)
            .select(&SelectionRequest::Interactive, &services)
            .unwrap_err();

        assert!(matches!(err, MicroError::Prompt(_)));
    }
}
