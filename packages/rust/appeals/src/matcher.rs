//! Tiered appeal matching.
//!
//! Tier one searches for the Board case number verbatim and accepts a
//! single unambiguous hit. Otherwise tier two searches by party names plus
//! the domain phrase and ranks candidates by weighted name overlap and
//! filing-date proximity; the best candidate must clear the configured
//! confidence threshold.

use std::time::Duration;

use chrono::NaiveDate;
use strsim::jaro_winkler;
use tracing::{debug, info, instrument};

use ttabkit_shared::{
    AppealRecord, CaseRecord, CourtListenerConfig, MatchingConfig, Result, RetryPolicy,
    with_retry,
};

use crate::client::{CourtListenerClient, SearchHit};

/// Tokens dropped before comparing names.
const CORPORATE_SUFFIXES: &[&str] = &[
    "inc",
    "incorporated",
    "corp",
    "corporation",
    "co",
    "company",
    "llc",
    "llp",
    "lp",
    "ltd",
    "limited",
    "plc",
    "gmbh",
    "ag",
    "sa",
    "the",
];

/// Party names used in one tier-two query.
const MAX_QUERY_NAMES: usize = 4;

/// Appellate filings within this many days of the Board filing score fully.
const NEAR_DAYS: i64 = 3 * 365;
/// Filings up to this many days out score half.
const FAR_DAYS: i64 = 5 * 365;

/// Which search produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    CaseNumber,
    PartyNames,
}

impl MatchTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CaseNumber => "case_number",
            Self::PartyNames => "party_names",
        }
    }
}

/// Result of one lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    /// The record already carried an identified appeal; nothing was queried.
    AlreadyMatched,
    Matched {
        appeal: AppealRecord,
        tier: MatchTier,
        score: f64,
    },
    NoMatch,
}

pub struct AppealMatcher {
    client: CourtListenerClient,
    matching: MatchingConfig,
    retry: RetryPolicy,
}

impl AppealMatcher {
    pub fn new(
        client: CourtListenerClient,
        courtlistener: &CourtListenerConfig,
        matching: MatchingConfig,
    ) -> Self {
        Self {
            client,
            matching,
            retry: RetryPolicy::new(
                courtlistener.max_attempts,
                Duration::from_millis(courtlistener.retry_backoff_ms),
            ),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Look up the appeal for `record` without modifying it.
    #[instrument(skip_all, fields(case = %record.case_number()))]
    pub async fn match_case(&self, record: &CaseRecord) -> Result<MatchOutcome> {
        if !record.needs_appeal_lookup() {
            debug!("appeal already attached, skipping lookup");
            return Ok(MatchOutcome::AlreadyMatched);
        }

        let mut pool: Vec<(MatchTier, SearchHit)> = Vec::new();
        if !record.case_number().is_empty() {
            let exact = self
                .search(&format!("\"{}\"", record.case_number()))
                .await?;
            if exact.len() == 1 {
                let appeal = exact[0].to_appeal();
                info!(appeal = %appeal.case_number, "matched on case number");
                return Ok(MatchOutcome::Matched {
                    appeal,
                    tier: MatchTier::CaseNumber,
                    score: 1.0,
                });
            }
            pool.extend(exact.into_iter().map(|hit| (MatchTier::CaseNumber, hit)));
        }

        let Some(query) = party_query(record, &self.matching.domain_term) else {
            debug!(candidates = pool.len(), "no party names to search with");
            return Ok(self.best_of(record, &pool));
        };
        let named = self.search(&query).await?;
        for hit in named.into_iter().take(self.matching.max_candidates) {
            if !pool.iter().any(|(_, p)| p.source_id == hit.source_id) {
                pool.push((MatchTier::PartyNames, hit));
            }
        }
        Ok(self.best_of(record, &pool))
    }

    /// Look up and attach. Returns the outcome either way.
    pub async fn enrich(&self, record: &mut CaseRecord) -> Result<MatchOutcome> {
        let outcome = self.match_case(record).await?;
        if let MatchOutcome::Matched { appeal, .. } = &outcome {
            record.attach_appeal(appeal.clone());
        }
        Ok(outcome)
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        with_retry(self.retry, "courtlistener", || self.client.search(query)).await
    }

    fn best_of(&self, record: &CaseRecord, pool: &[(MatchTier, SearchHit)]) -> MatchOutcome {
        let best = pool
            .iter()
            .map(|(tier, hit)| (score_candidate(record, hit, &self.matching), *tier, hit))
            .max_by(|a, b| a.0.total_cmp(&b.0));

        match best {
            Some((score, tier, hit)) if score >= self.matching.confidence_threshold => {
                info!(appeal = %hit.case_name, score, tier = tier.as_str(), "matched by ranking");
                MatchOutcome::Matched {
                    appeal: hit.to_appeal(),
                    tier,
                    score,
                }
            }
            Some((score, _, hit)) => {
                debug!(best = %hit.case_name, score, "best candidate below threshold");
                MatchOutcome::NoMatch
            }
            None => MatchOutcome::NoMatch,
        }
    }
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Weighted name overlap plus date proximity, in `[0, 1]` for weights summing to one.
pub fn score_candidate(record: &CaseRecord, hit: &SearchHit, matching: &MatchingConfig) -> f64 {
    let names: Vec<&str> = record.parties().iter().map(|p| p.name.as_str()).collect();
    let reference = record.filing_date().or(record.decision_date());
    matching.name_weight * name_overlap(&names, &hit.case_name)
        + matching.date_weight * date_proximity(reference, hit.date_filed)
}

/// Mean best similarity of each party name against the sides of a caption.
/// When every token of one name appears as a whole token of the other the
/// pair counts as a full match; otherwise Jaro-Winkler decides.
pub fn name_overlap(parties: &[&str], caption: &str) -> f64 {
    let sides: Vec<Vec<String>> = caption_sides(caption)
        .into_iter()
        .map(name_tokens)
        .filter(|s| !s.is_empty())
        .collect();
    let parties: Vec<Vec<String>> = parties
        .iter()
        .map(|p| name_tokens(p))
        .filter(|p| !p.is_empty())
        .collect();
    if sides.is_empty() || parties.is_empty() {
        return 0.0;
    }

    let total: f64 = parties
        .iter()
        .map(|party| {
            sides
                .iter()
                .map(|side| token_similarity(party, side))
                .fold(0.0, f64::max)
        })
        .sum();
    total / parties.len() as f64
}

fn token_similarity(party: &[String], side: &[String]) -> f64 {
    let within = |small: &[String], large: &[String]| small.iter().all(|t| large.contains(t));
    if within(party, side) || within(side, party) {
        1.0
    } else {
        jaro_winkler(&party.join(" "), &side.join(" "))
    }
}

fn date_proximity(board_filing: Option<NaiveDate>, appeal_filed: Option<NaiveDate>) -> f64 {
    let (Some(from), Some(to)) = (board_filing, appeal_filed) else {
        return 0.0;
    };
    match (to - from).num_days() {
        d if d < 0 => 0.0,
        d if d <= NEAR_DAYS => 1.0,
        d if d <= FAR_DAYS => 0.5,
        _ => 0.0,
    }
}

fn caption_sides(caption: &str) -> Vec<&str> {
    let lower = caption.to_ascii_lowercase();
    for sep in [" v. ", " vs. ", " v "] {
        if let Some(at) = lower.find(sep) {
            return vec![&caption[..at], &caption[at + sep.len()..]];
        }
    }
    vec![caption]
}

/// Lowercase alphanumeric tokens with corporate suffixes removed.
fn name_tokens(name: &str) -> Vec<String> {
    name.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty() && !CORPORATE_SUFFIXES.contains(t))
        .map(str::to_string)
        .collect()
}

/// `("name one" OR "name two") AND "domain term"`, or `None` without usable names.
fn party_query(record: &CaseRecord, domain_term: &str) -> Option<String> {
    let mut names: Vec<String> = Vec::new();
    for party in record.parties() {
        let cleaned = party
            .name
            .split(|c: char| !c.is_alphanumeric() && c != '&' && c != '\'')
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if cleaned.len() > 2 && !names.contains(&cleaned) {
            names.push(cleaned);
        }
        if names.len() == MAX_QUERY_NAMES {
            break;
        }
    }
    if names.is_empty() {
        return None;
    }
    let quoted: Vec<String> = names.iter().map(|n| format!("\"{n}\"")).collect();
    Some(format!("({}) AND \"{domain_term}\"", quoted.join(" OR ")))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use ttabkit_shared::{Party, PartyRole, RateLimiter, TtabError};
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn opposition() -> CaseRecord {
        CaseRecord::builder("91123456")
            .filing_date(NaiveDate::from_ymd_opt(2023, 1, 15))
            .party(Party::new(PartyRole::Plaintiff, "Acme Inc."))
            .party(Party::new(PartyRole::Defendant, "Globex Corp."))
            .build()
    }

    fn matcher(server: &MockServer) -> AppealMatcher {
        let cl = CourtListenerConfig {
            base_url: format!("{}/", server.uri()),
            ..CourtListenerConfig::default()
        };
        let client = CourtListenerClient::new(
            &cl,
            "tok".into(),
            Arc::new(RateLimiter::new(Duration::from_millis(1))),
        )
        .expect("client");
        AppealMatcher::new(client, &cl, MatchingConfig::default())
            .with_retry_policy(RetryPolicy::new(2, Duration::from_millis(1)))
    }

    fn results(hits: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({ "results": hits }))
    }

    const NAME_QUERY: &str =
        "(\"Acme Inc\" OR \"Globex Corp\") AND \"Trademark Trial and Appeal Board\"";

    #[test]
    fn tokens_drop_suffixes() {
        assert_eq!(name_tokens("Acme, Inc."), ["acme"]);
        assert_eq!(name_tokens("The Globex Corporation"), ["globex"]);
        assert_eq!(name_tokens("Roe & Partners LLP"), ["roe", "partners"]);
    }

    #[test]
    fn overlap_uses_caption_sides() {
        assert_eq!(
            name_overlap(&["Acme Inc.", "Globex Corp."], "Acme, Inc. v. Globex Corporation"),
            1.0
        );
        assert_eq!(name_overlap(&["Pied Piper Inc."], "In re Pied Piper, Inc."), 1.0);
        assert!(name_overlap(&["Acme Inc.", "Globex Corp."], "Zenith Radio v. Hazeltine") < 0.7);
        assert_eq!(name_overlap(&[], "Acme v. Globex"), 0.0);
    }

    #[test]
    fn short_name_inside_another_word_is_not_a_match() {
        let overlap = name_overlap(&["Art Co."], "In re Smart Technologies");
        assert!(overlap < 0.7, "overlap {overlap}");

        let record = CaseRecord::builder("91123456")
            .party(Party::new(PartyRole::Plaintiff, "Art Co."))
            .build();
        let hit = SearchHit {
            case_name: "In re Smart Technologies".into(),
            docket_number: None,
            citation: None,
            date_filed: None,
            source_id: "9".into(),
            url: None,
            summary: String::new(),
        };
        let matching = MatchingConfig::default();
        assert!(score_candidate(&record, &hit, &matching) < matching.confidence_threshold);
    }

    #[test]
    fn date_proximity_bands() {
        let base = NaiveDate::from_ymd_opt(2023, 1, 15);
        let days = |n: i64| base.map(|d| d + chrono::Duration::days(n));
        assert_eq!(date_proximity(base, days(400)), 1.0);
        assert_eq!(date_proximity(base, days(1500)), 0.5);
        assert_eq!(date_proximity(base, days(4000)), 0.0);
        assert_eq!(date_proximity(base, days(-10)), 0.0);
        assert_eq!(date_proximity(None, days(10)), 0.0);
    }

    #[test]
    fn query_quotes_cleaned_names() {
        let query = party_query(&opposition(), "Trademark Trial and Appeal Board");
        assert_eq!(query.as_deref(), Some(NAME_QUERY));
        assert_eq!(
            party_query(&CaseRecord::builder("91000000").build(), "x"),
            None
        );
    }

    #[tokio::test]
    async fn single_exact_hit_is_accepted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("q", "\"91123456\""))
            .respond_with(results(serde_json::json!([
                { "caseName": "Unrelated Caption", "docketNumber": "2024-1001", "cluster_id": 1 }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = matcher(&server).match_case(&opposition()).await.expect("match");
        match outcome {
            MatchOutcome::Matched { appeal, tier, .. } => {
                assert_eq!(tier, MatchTier::CaseNumber);
                assert_eq!(appeal.case_number, "2024-1001");
            }
            other => panic!("expected match, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn name_search_below_threshold_is_no_match() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("q", "\"91123456\""))
            .respond_with(results(serde_json::json!([])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("q", NAME_QUERY))
            .respond_with(results(serde_json::json!([
                { "caseName": "Zenith Radio Corp. v. Hazeltine Research", "dateFiled": "2010-05-01", "cluster_id": 7 }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let mut record = opposition();
        let outcome = matcher(&server).enrich(&mut record).await.expect("match");
        assert_eq!(outcome, MatchOutcome::NoMatch);
        assert!(record.appeal().is_none());
    }

    #[tokio::test]
    async fn name_search_picks_best_candidate() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("q", "\"91123456\""))
            .respond_with(results(serde_json::json!([])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("q", NAME_QUERY))
            .respond_with(results(serde_json::json!([
                { "caseName": "Acme Widgets v. Initech", "dateFiled": "2012-01-01", "cluster_id": 5 },
                { "caseName": "Acme, Inc. v. Globex Corporation", "docketNumber": "2025-1500",
                  "dateFiled": "2025-06-01", "cluster_id": 6, "snippet": "AFFIRMED" }
            ])))
            .mount(&server)
            .await;

        let mut record = opposition();
        let outcome = matcher(&server).enrich(&mut record).await.expect("match");
        let MatchOutcome::Matched { tier, score, .. } = outcome else {
            panic!("expected match");
        };
        assert_eq!(tier, MatchTier::PartyNames);
        assert!(score >= 0.99);
        let appeal = record.appeal().expect("attached");
        assert_eq!(appeal.case_number, "2025-1500");
        assert_eq!(appeal.source_id, "6");
    }

    #[tokio::test]
    async fn ambiguous_exact_hits_keep_their_tier() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("q", "\"91123456\""))
            .respond_with(results(serde_json::json!([
                { "caseName": "Acme, Inc. v. Globex Corporation", "docketNumber": "2024-2001",
                  "dateFiled": "2024-03-01", "cluster_id": 11 },
                { "caseName": "Zenith Radio v. Hazeltine", "cluster_id": 12 }
            ])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("q", NAME_QUERY))
            .respond_with(results(serde_json::json!([
                { "caseName": "Acme Widgets v. Initech", "dateFiled": "2012-01-01", "cluster_id": 5 }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = matcher(&server).match_case(&opposition()).await.expect("match");
        let MatchOutcome::Matched { appeal, tier, .. } = outcome else {
            panic!("expected match");
        };
        assert_eq!(tier, MatchTier::CaseNumber);
        assert_eq!(appeal.case_number, "2024-2001");
    }

    #[tokio::test]
    async fn attached_appeal_skips_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(results(serde_json::json!([])))
            .expect(0)
            .mount(&server)
            .await;

        let mut record = opposition();
        record.attach_appeal(AppealRecord {
            case_number: "2025-1500".into(),
            case_name: "Acme v. Globex".into(),
            citation: None,
            docket_number: None,
            filing_date: None,
            decision_date: None,
            outcome: Default::default(),
            source_id: "6".into(),
            url: None,
        });
        let outcome = matcher(&server).enrich(&mut record).await.expect("lookup");
        assert_eq!(outcome, MatchOutcome::AlreadyMatched);
    }

    #[tokio::test]
    async fn transient_failure_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("q", "\"91123456\""))
            .respond_with(results(serde_json::json!([
                { "caseName": "Acme v. Globex", "cluster_id": 3 }
            ])))
            .mount(&server)
            .await;

        let outcome = matcher(&server).match_case(&opposition()).await.expect("match");
        assert!(matches!(outcome, MatchOutcome::Matched { tier: MatchTier::CaseNumber, .. }));
    }

    #[tokio::test]
    async fn rejected_token_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let err = matcher(&server).match_case(&opposition()).await.unwrap_err();
        assert!(matches!(err, TtabError::Auth { .. }));
    }
}
