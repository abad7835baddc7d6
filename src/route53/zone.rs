use tracing::debug;

use super::{remote::ZoneLookup, Config, Error};

/// Validates a zone name and returns it fully qualified, e.g. `example.com.`.
pub fn normalize_zone(zone: &str) -> Result<String, Error> {
    let trimmed = zone.trim().trim_end_matches('.');
    if trimmed.is_empty() || trimmed.contains("..") || trimmed.chars().any(char::is_whitespace) {
        return Err(Error::InvalidDomainName(zone.to_owned()));
    }
    Ok(format!("{}.", trimmed))
}

/// Resolves the hosted zone ID of a zone, without the `/hostedzone/` prefix.
///
/// A configured zone ID is used as is. Otherwise the zone with the exact same name is looked up; if several zones
/// share the name, a public zone wins over private ones and the first private zone is used if there is no public one.
pub fn resolve_zone_id<L: ZoneLookup + ?Sized>(
    lookup: &L,
    config: &Config,
    zone: &str,
) -> Result<String, Error> {
    if let Some(id) = config.hosted_zone_id() {
        return Ok(id.to_owned());
    }

    let zone = normalize_zone(zone)?;
    let candidates: Vec<_> = lookup
        .find_zones_by_name(&zone)?
        .into_iter()
        .filter(|candidate| {
            candidate
                .name
                .trim_end_matches('.')
                .eq_ignore_ascii_case(zone.trim_end_matches('.'))
        })
        .collect();

    let chosen = candidates
        .iter()
        .find(|candidate| !candidate.private)
        .or_else(|| candidates.first())
        .ok_or_else(|| Error::ZoneNotFound(zone.clone()))?;

    debug!(
        "Resolved zone {} to hosted zone {} ({} candidates)",
        zone,
        chosen.id,
        candidates.len()
    );

    Ok(chosen.id.trim_start_matches("/hostedzone/").to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route53::remote::HostedZone;

    struct Zones(Vec<HostedZone>);

    impl ZoneLookup for Zones {
        fn find_zones_by_name(&self, _name: &str) -> Result<Vec<HostedZone>, Error> {
            Ok(self.0.clone())
        }
    }

    fn zone(id: &str, name: &str, private: bool) -> HostedZone {
        HostedZone {
            id: format!("/hostedzone/{}", id),
            name: name.to_owned(),
            private,
        }
    }

    #[test]
    fn test_normalize_zone() {
        assert_eq!(normalize_zone("example.com").unwrap(), "example.com.");
        assert_eq!(normalize_zone("example.com.").unwrap(), "example.com.");
        assert!(matches!(normalize_zone(""), Err(Error::InvalidDomainName(_))));
        assert!(matches!(normalize_zone("."), Err(Error::InvalidDomainName(_))));
        assert!(matches!(normalize_zone("a..b"), Err(Error::InvalidDomainName(_))));
    }

    #[test]
    fn test_resolve_exact_match() {
        let lookup = Zones(vec![
            zone("ZSUB", "sub.example.com.", false),
            zone("ZMAIN", "example.com.", false),
            zone("ZNEXT", "example.net.", false),
        ]);
        let id = resolve_zone_id(&lookup, &Config::default(), "example.com").unwrap();
        assert_eq!(id, "ZMAIN");
    }

    #[test]
    fn test_resolve_prefers_public_zone() {
        let lookup = Zones(vec![
            zone("ZPRIVATE", "example.com.", true),
            zone("ZPUBLIC", "example.com.", false),
        ]);
        let id = resolve_zone_id(&lookup, &Config::default(), "example.com.").unwrap();
        assert_eq!(id, "ZPUBLIC");
    }

    #[test]
    fn test_resolve_falls_back_to_first_private_zone() {
        let lookup = Zones(vec![
            zone("ZFIRST", "example.com.", true),
            zone("ZSECOND", "example.com.", true),
        ]);
        let id = resolve_zone_id(&lookup, &Config::default(), "example.com.").unwrap();
        assert_eq!(id, "ZFIRST");
    }

    #[test]
    fn test_resolve_not_found() {
        let lookup = Zones(vec![zone("ZOTHER", "example.org.", false)]);
        let err = resolve_zone_id(&lookup, &Config::default(), "example.com.").unwrap_err();
        assert!(matches!(err, Error::ZoneNotFound(name) if name == "example.com."));
    }

    #[test]
    fn test_resolve_configured_zone_id() {
        let lookup = Zones(Vec::new());
        let config = Config {
            hosted_zone_id: Some("/hostedzone/ZFIXED".to_owned()),
            ..Config::default()
        };
        assert_eq!(resolve_zone_id(&lookup, &config, "example.com.").unwrap(), "ZFIXED");
    }
}
