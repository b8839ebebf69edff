//! Teams and team resolution.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::destination::DestinationRegistry;
use crate::error::ConfigError;
use crate::event::AlertEvent;

/// A named group that owns a list of destinations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    /// Team name.
    pub name: String,
    /// Destination names, in send order.
    #[serde(default)]
    pub destinations: Vec<String>,
}

impl Team {
    /// Creates a team with no destinations.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            destinations: Vec::new(),
        }
    }

    /// Adds a destination by name.
    #[must_use]
    pub fn with_destination(mut self, name: impl Into<String>) -> Self {
        self.destinations.push(name.into());
        self
    }
}

/// The `teams` configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamsConfig {
    /// Teams in priority order.
    #[serde(default)]
    pub teams: Vec<Team>,
}

/// Picks the team responsible for an event.
///
/// The current policy does not look at the event: with no teams configured
/// nothing is resolved, otherwise the first team always wins.
#[derive(Debug, Clone, Default)]
pub struct TeamResolver {
    teams: Vec<Team>,
}

impl TeamResolver {
    /// Creates a resolver over the given teams.
    #[must_use]
    pub fn new(teams: Vec<Team>) -> Self {
        Self { teams }
    }

    /// Returns the configured teams.
    #[must_use]
    pub fn teams(&self) -> &[Team] {
        &self.teams
    }

    /// Resolves the team for an event.
    pub fn resolve(&self, event: &AlertEvent) -> Option<&Team> {
        let Some(team) = self.teams.first() else {
            debug!(receiver = %event.receiver, "no teams configured");
            return None;
        };

        info!(
            team = %team.name,
            destinations = ?team.destinations,
            receiver = %event.receiver,
            "resolved team for alert"
        );
        Some(team)
    }

    /// Checks that every destination a team references is registered.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownTeamDestination`] for the first unknown reference.
    pub fn validate_team_destinations(
        &self,
        registry: &DestinationRegistry,
    ) -> Result<(), ConfigError> {
        for team in &self.teams {
            if let Some(missing) = team.destinations.iter().find(|d| !registry.contains(d)) {
                return Err(ConfigError::UnknownTeamDestination {
                    team: team.name.clone(),
                    destination: missing.clone(),
                });
            }
        }
        Ok(())
    }
}

impl From<TeamsConfig> for TeamResolver {
    fn from(config: TeamsConfig) -> Self {
        Self::new(config.teams)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::testing::RecordingDestination;
    use crate::event::{Alert, LabelSet};
    use std::sync::Arc;

    fn event(alert: Alert) -> AlertEvent {
        AlertEvent {
            receiver: "x".to_string(),
            status: "firing".to_string(),
            external_url: None,
            group_key: String::new(),
            version: String::new(),
            truncated_alerts: 0,
            common_labels: LabelSet::new(),
            common_annotations: LabelSet::new(),
            group_labels: LabelSet::new(),
            alerts: vec![alert],
        }
    }

    mod resolve_tests {
        use super::*;

        #[test]
        fn no_teams_resolves_nothing() {
            let resolver = TeamResolver::default();
            assert!(resolver.resolve(&event(Alert::firing("A"))).is_none());
        }

        #[test]
        fn first_team_always_wins() {
            let resolver = TeamResolver::new(vec![
                Team::new("platform").with_destination("ops"),
                Team::new("payments").with_destination("payments-alerts"),
            ]);

            let a = resolver.resolve(&event(Alert::firing("A")));
            let b = resolver.resolve(&event(
                Alert::firing("B").with_label("team", "payments"),
            ));
            assert_eq!(a.map(|t| t.name.as_str()), Some("platform"));
            assert_eq!(b.map(|t| t.name.as_str()), Some("platform"));
        }
    }

    mod validate_tests {
        use super::*;

        fn registry(names: &[&str]) -> DestinationRegistry {
            let registry = DestinationRegistry::new();
            for name in names {
                registry.register(*name, Arc::new(RecordingDestination::new(*name)));
            }
            registry
        }

        #[test]
        fn known_destinations_pass() {
            let resolver = TeamResolver::new(vec![
                Team::new("platform").with_destination("ops").with_destination("sre"),
            ]);
            assert!(resolver
                .validate_team_destinations(&registry(&["ops", "sre"]))
                .is_ok());
        }

        #[test]
        fn unknown_destination_names_team() {
            let resolver = TeamResolver::new(vec![
                Team::new("platform").with_destination("ops"),
                Team::new("payments").with_destination("pager"),
            ]);
            let err = resolver
                .validate_team_destinations(&registry(&["ops"]))
                .unwrap_err();
            assert_eq!(
                err,
                ConfigError::UnknownTeamDestination {
                    team: "payments".to_string(),
                    destination: "pager".to_string(),
                }
            );
        }

        #[test]
        fn teams_without_destinations_pass() {
            let resolver = TeamResolver::new(vec![Team::new("platform")]);
            assert!(resolver.validate_team_destinations(&registry(&[])).is_ok());
        }
    }

    #[test]
    fn teams_config_deserializes() {
        let config: TeamsConfig = serde_json::from_str(
            r#"{"teams":[{"name":"platform","destinations":["ops","sre"]},{"name":"empty"}]}"#,
        )
        .unwrap();
        let resolver = TeamResolver::from(config);
        assert_eq!(resolver.teams().len(), 2);
        assert_eq!(resolver.teams()[0].destinations, vec!["ops", "sre"]);
        assert!(resolver.teams()[1].destinations.is_empty());
    }
}
