// ── Filter predicates for connections and rules ──
//
// Each category is an alternation of comma-separated substrings matched
// case-insensitively. A record passes when every supplied category has at
// least one hit. Categories left empty impose no constraint.

use clashmon_api::{Connection, Rule};

/// One category's alternation of lowercase substrings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermFilter {
    terms: Vec<String>,
}

impl TermFilter {
    /// Parse `"a.com, b.com"`. Blank input (or only commas) yields `None`.
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        let terms: Vec<String> = raw?
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .collect();
        (!terms.is_empty()).then_some(Self { terms })
    }

    pub fn matches(&self, field: &str) -> bool {
        let field = field.to_lowercase();
        self.terms.iter().any(|t| field.contains(t.as_str()))
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }
}

fn passes(filter: Option<&TermFilter>, field: &str) -> bool {
    filter.is_none_or(|f| f.matches(field))
}

#[derive(Debug, Clone, Default)]
pub struct ConnectionFilter {
    pub host: Option<TermFilter>,
    pub source: Option<TermFilter>,
    pub destination: Option<TermFilter>,
}

impl ConnectionFilter {
    pub fn new(host: Option<&str>, source: Option<&str>, destination: Option<&str>) -> Self {
        Self {
            host: TermFilter::parse(host),
            source: TermFilter::parse(source),
            destination: TermFilter::parse(destination),
        }
    }

    /// No category supplied: every connection matches.
    pub fn is_unfiltered(&self) -> bool {
        self.host.is_none() && self.source.is_none() && self.destination.is_none()
    }

    pub fn matches(&self, conn: &Connection) -> bool {
        let meta = &conn.metadata;
        passes(self.host.as_ref(), &meta.host)
            && passes(self.source.as_ref(), &meta.source_ip)
            && passes(self.destination.as_ref(), &meta.destination_ip)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RuleFilter {
    pub rule_type: Option<TermFilter>,
    pub payload: Option<TermFilter>,
    pub proxy: Option<TermFilter>,
}

impl RuleFilter {
    pub fn new(rule_type: Option<&str>, payload: Option<&str>, proxy: Option<&str>) -> Self {
        Self {
            rule_type: TermFilter::parse(rule_type),
            payload: TermFilter::parse(payload),
            proxy: TermFilter::parse(proxy),
        }
    }

    pub fn matches(&self, rule: &Rule) -> bool {
        passes(self.rule_type.as_ref(), &rule.rule_type)
            && passes(self.payload.as_ref(), &rule.payload)
            && passes(self.proxy.as_ref(), &rule.proxy)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clashmon_api::ConnectionMetadata;

    use super::*;

    fn conn(host: &str, src: &str, dst: &str) -> Connection {
        Connection {
            id: host.to_owned(),
            metadata: ConnectionMetadata {
                host: host.to_owned(),
                source_ip: src.to_owned(),
                destination_ip: dst.to_owned(),
                ..ConnectionMetadata::default()
            },
            ..Connection::default()
        }
    }

    fn rule(rule_type: &str, payload: &str, proxy: &str) -> Rule {
        Rule {
            rule_type: rule_type.to_owned(),
            payload: payload.to_owned(),
            proxy: proxy.to_owned(),
            ..Rule::default()
        }
    }

    #[test]
    fn parse_trims_and_lowercases() {
        let f = TermFilter::parse(Some(" A.com , ,B.COM ")).unwrap();
        assert_eq!(f.terms(), ["a.com", "b.com"]);
        assert!(TermFilter::parse(Some(" , ")).is_none());
        assert!(TermFilter::parse(None).is_none());
    }

    #[test]
    fn host_filter_selects_matching_connection() {
        let conns = [conn("a.com", "", ""), conn("b.com", "", "")];
        let filter = ConnectionFilter::new(Some("a"), None, None);
        let matched: Vec<_> = conns.iter().filter(|c| filter.matches(c)).collect();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].metadata.host, "a.com");
    }

    #[test]
    fn no_filter_matches_everything() {
        let conns = [conn("a.com", "", ""), conn("b.com", "", "")];
        let filter = ConnectionFilter::new(None, None, None);
        assert!(filter.is_unfiltered());
        assert!(conns.iter().all(|c| filter.matches(c)));
    }

    #[test]
    fn categories_are_conjunctive_terms_are_alternatives() {
        let c = conn("Video.Example.com", "192.168.1.20", "93.184.216.34");
        assert!(ConnectionFilter::new(Some("nomatch,EXAMPLE"), Some("192.168.1."), None).matches(&c));
        assert!(!ConnectionFilter::new(Some("example"), Some("10.0."), None).matches(&c));
        assert!(ConnectionFilter::new(None, None, Some("93.184")).matches(&c));
    }

    #[test]
    fn rule_filter() {
        let rules = [
            rule("DomainSuffix", "google.com", "Proxy"),
            rule("GeoIP", "CN", "DIRECT"),
            rule("Match", "", "Proxy"),
        ];
        let by_proxy = RuleFilter::new(None, None, Some("proxy"));
        assert_eq!(rules.iter().filter(|r| by_proxy.matches(r)).count(), 2);

        let by_type_and_payload = RuleFilter::new(Some("domain,geoip"), Some("cn"), None);
        let hits: Vec<_> = rules.iter().filter(|r| by_type_and_payload.matches(r)).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].rule_type, "GeoIP");
    }
}
