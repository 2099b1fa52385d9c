//! Builds [`RoutingConfig`] snapshots from the key/value settings source.
//!
//! Parsing is deliberately forgiving about *where* it stops: a defect marks
//! the snapshot invalid but the remaining keys are still parsed, so every
//! problem ends up in the log in a single pass.
use crate::{
    config::models::{RoutingConfig, RoutingMode},
    ports::settings::Settings,
};

/// Key naming the new service endpoint URL.
pub const KEY_NEW_SERVICE: &str = "Routing.NewService";
/// Key naming the mode applied to GET requests.
pub const KEY_GET_MODE: &str = "Routing.GET";
/// Key holding the comma-separated `Name|Mode` pairs for POST requests.
pub const KEY_POST_MODES: &str = "Routing.POST";

/// Read the three routing keys and build a snapshot.
///
/// The snapshot always comes back, possibly with `is_valid == false`; an
/// invalid snapshot routes every request to the legacy handler.
pub fn load_routing_config(settings: &dyn Settings) -> RoutingConfig {
    let mut config = RoutingConfig {
        is_valid: true,
        ..RoutingConfig::default()
    };

    config.new_service_url = settings
        .get(KEY_NEW_SERVICE)
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty());

    match settings.get(KEY_GET_MODE) {
        Some(token) if !token.trim().is_empty() => match RoutingMode::parse(&token) {
            Some(mode) => config.get_mode = mode,
            None => {
                tracing::error!(key = KEY_GET_MODE, token, "unrecognized routing mode");
                config.is_valid = false;
            }
        },
        _ => {}
    }

    if let Some(list) = settings.get(KEY_POST_MODES) {
        parse_post_modes(&list, &mut config);
    }

    if config.routes_to_new_service() && config.new_service_url.is_none() {
        tracing::error!(
            key = KEY_NEW_SERVICE,
            "new service URL is required when any rule routes away from the legacy handler"
        );
        config.is_valid = false;
    }

    if let Some(url) = &config.new_service_url
        && let Err(e) = validate_url(url)
    {
        tracing::error!(key = KEY_NEW_SERVICE, url, error = %e, "invalid new service URL");
        config.is_valid = false;
    }

    config
}

/// Parse the `Name1 | Mode1, Name2 | Mode2, ...` list. Later duplicates of a
/// name override earlier ones.
fn parse_post_modes(list: &str, config: &mut RoutingConfig) {
    if list.trim().is_empty() {
        return;
    }

    for pair in list.split(',') {
        let parts: Vec<&str> = pair.split('|').map(str::trim).collect();
        let [name, token] = parts.as_slice() else {
            tracing::error!(key = KEY_POST_MODES, pair, "malformed Name|Mode pair");
            config.is_valid = false;
            continue;
        };
        if name.is_empty() || token.is_empty() {
            tracing::error!(key = KEY_POST_MODES, pair, "malformed Name|Mode pair");
            config.is_valid = false;
            continue;
        }

        match RoutingMode::parse(token) {
            Some(mode) => {
                config.post_modes.insert(name.to_ascii_lowercase(), mode);
            }
            None => {
                tracing::error!(key = KEY_POST_MODES, pair, token, "unrecognized routing mode");
                config.is_valid = false;
            }
        }
    }
}

fn validate_url(url_str: &str) -> Result<(), String> {
    let url = url::Url::parse(url_str).map_err(|e| e.to_string())?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(format!(
            "URL scheme must be 'http' or 'https', got '{}'",
            url.scheme()
        ));
    }
    if url.host().is_none() {
        return Err("URL must have a valid host".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::settings::MemorySettings;

    fn settings(pairs: &[(&str, &str)]) -> MemorySettings {
        MemorySettings::from_pairs(pairs)
    }

    #[test]
    fn absent_keys_default_to_route_old() {
        let config = load_routing_config(&settings(&[]));
        assert!(config.is_valid);
        assert_eq!(config.get_mode, RoutingMode::RouteOld);
        assert!(config.post_modes.is_empty());
        assert!(config.new_service_url.is_none());
    }

    #[test]
    fn blank_values_default_to_route_old() {
        let config = load_routing_config(&settings(&[
            ("Routing.GET", "  "),
            ("Routing.POST", ""),
            ("Routing.NewService", ""),
        ]));
        assert!(config.is_valid);
        assert_eq!(config.get_mode, RoutingMode::RouteOld);
        assert!(config.post_modes.is_empty());
        assert!(config.new_service_url.is_none());
    }

    #[test]
    fn full_config_parses() {
        let config = load_routing_config(&settings(&[
            ("Routing.NewService", "http://new-service/dct"),
            ("Routing.GET", "rn"),
            ("Routing.POST", "GetQuote | RP, SubmitOrder|RN , Ping | ro"),
        ]));
        assert!(config.is_valid);
        assert_eq!(config.get_mode, RoutingMode::RouteNew);
        assert_eq!(config.post_mode("getquote"), Some(RoutingMode::RunParallel));
        assert_eq!(config.post_mode("SubmitOrder"), Some(RoutingMode::RouteNew));
        assert_eq!(config.post_mode("PING"), Some(RoutingMode::RouteOld));
        assert_eq!(
            config.new_service_url.as_deref(),
            Some("http://new-service/dct")
        );
    }

    #[test]
    fn unrecognized_get_mode_invalidates_but_keeps_parsing() {
        let config = load_routing_config(&settings(&[
            ("Routing.NewService", "http://new-service/dct"),
            ("Routing.GET", "bogus"),
            ("Routing.POST", "GetQuote|RP"),
        ]));
        assert!(!config.is_valid);
        // The POST rules were still parsed.
        assert_eq!(config.post_mode("GetQuote"), Some(RoutingMode::RunParallel));
    }

    #[test]
    fn malformed_post_pair_is_dropped_and_invalidates() {
        let config = load_routing_config(&settings(&[
            ("Routing.NewService", "http://new-service/dct"),
            ("Routing.POST", "GetQuote|RP, justaname, A|B|C"),
        ]));
        assert!(!config.is_valid);
        assert_eq!(config.post_mode("GetQuote"), Some(RoutingMode::RunParallel));
        assert_eq!(config.post_modes.len(), 1);
    }

    #[test]
    fn unrecognized_post_mode_invalidates() {
        let config = load_routing_config(&settings(&[
            ("Routing.NewService", "http://new-service/dct"),
            ("Routing.POST", "GetQuote|RX"),
        ]));
        assert!(!config.is_valid);
        assert!(config.post_modes.is_empty());
    }

    #[test]
    fn duplicate_names_last_write_wins() {
        let config = load_routing_config(&settings(&[
            ("Routing.NewService", "http://new-service/dct"),
            ("Routing.POST", "GetQuote|RP, getquote|RN"),
        ]));
        assert!(config.is_valid);
        assert_eq!(config.post_mode("GetQuote"), Some(RoutingMode::RouteNew));
    }

    #[test]
    fn missing_url_with_non_default_mode_invalidates() {
        let config = load_routing_config(&settings(&[("Routing.GET", "RN")]));
        assert!(!config.is_valid);

        let config = load_routing_config(&settings(&[("Routing.POST", "GetQuote|RP")]));
        assert!(!config.is_valid);
    }

    #[test]
    fn missing_url_is_fine_when_everything_routes_old() {
        let config = load_routing_config(&settings(&[
            ("Routing.GET", "RO"),
            ("Routing.POST", "Ping|RO"),
        ]));
        assert!(config.is_valid);
    }

    #[test]
    fn malformed_url_invalidates() {
        let config = load_routing_config(&settings(&[
            ("Routing.NewService", "not a url"),
            ("Routing.GET", "RN"),
        ]));
        assert!(!config.is_valid);

        let config = load_routing_config(&settings(&[
            ("Routing.NewService", "ftp://new-service/dct"),
            ("Routing.GET", "RN"),
        ]));
        assert!(!config.is_valid);
    }
}
