//! Assembles the pipeline from configuration files.

use std::sync::Arc;

use beacon_alerts::{
    AlertDispatcher, AlertPipeline, DestinationFactory, DestinationRegistry, IssueConverter,
    LabelEnricher, PrometheusMetrics, TeamResolver,
};
use tracing::info;

use crate::config::{load_destinations, load_enrichment, load_teams, ServerConfig};
use crate::error::ServerResult;
use crate::state::AppState;

/// Loads every configuration file and builds the server state.
///
/// Order: destinations, registry, teams, then the check that every team
/// references a registered destination. Any failure aborts startup.
///
/// # Errors
///
/// Returns the first configuration error encountered.
pub fn build_state(config: &ServerConfig, factory: &DestinationFactory) -> ServerResult<AppState> {
    let declarations = load_destinations(&config.destinations_config)?;
    let registry = Arc::new(DestinationRegistry::new());
    let count = registry.load_from_config(&declarations, factory)?;
    info!(
        path = %config.destinations_config.display(),
        destinations = count,
        "loaded destinations"
    );

    let resolver = TeamResolver::from(load_teams(&config.teams_config)?);
    resolver.validate_team_destinations(&registry)?;
    info!(
        path = %config.teams_config.display(),
        teams = resolver.teams().len(),
        "loaded teams"
    );

    let enrichment = load_enrichment(config.enrichment_config.as_deref())?;
    let metrics = Arc::new(PrometheusMetrics::new());

    let dispatcher = AlertDispatcher::new(registry.clone()).with_metrics(metrics.clone());
    let converter = IssueConverter::new().with_enricher(LabelEnricher::new(enrichment));
    let pipeline =
        AlertPipeline::new(converter, resolver, dispatcher).with_metrics(metrics.clone());

    Ok(AppState::new(pipeline, registry, metrics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServerError;
    use beacon_alerts::ConfigError;
    use clap::Parser;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn config(destinations: &NamedTempFile, teams: &NamedTempFile) -> ServerConfig {
        ServerConfig::parse_from([
            "beacon",
            "--destinations-config",
            destinations.path().to_str().unwrap(),
            "--teams-config",
            teams.path().to_str().unwrap(),
        ])
    }

    const DESTINATIONS: &str = r##"
destinations:
  slack:
    - name: ops
      api_key: xoxb-1
      slack_channel: "#ops"
"##;

    #[test]
    fn builds_state() {
        let destinations = file(DESTINATIONS);
        let teams = file("teams:\n  - name: platform\n    destinations: [ops]\n");

        let state = build_state(&config(&destinations, &teams), &DestinationFactory::new()).unwrap();

        assert_eq!(state.registry().names(), vec!["ops".to_string()]);
        assert_eq!(state.team_count(), 1);
    }

    #[test]
    fn team_with_unknown_destination_aborts() {
        let destinations = file(DESTINATIONS);
        let teams = file("teams:\n  - name: platform\n    destinations: [ops, pager]\n");

        let err = build_state(&config(&destinations, &teams), &DestinationFactory::new()).unwrap_err();

        assert!(matches!(
            err,
            ServerError::Alerts(ConfigError::UnknownTeamDestination { ref destination, .. })
                if destination == "pager"
        ));
    }

    #[test]
    fn invalid_destination_aborts() {
        let destinations = file(
            "destinations:\n  slack:\n    - name: ops\n      api_key: \"\"\n      slack_channel: \"#ops\"\n",
        );
        let teams = file("teams: []\n");

        let err = build_state(&config(&destinations, &teams), &DestinationFactory::new()).unwrap_err();

        assert_eq!(
            err.to_string(),
            "failed to create slack destination 'ops': slack destination 'ops' must have api_key"
        );
    }
}
