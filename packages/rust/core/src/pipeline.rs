//! End-to-end workflows: acquire → extract (→ match) → sink, plus the
//! deferred `enrich` pass over stored cases.
//!
//! Downloads run strictly one after another behind the fetcher's limiter.
//! Each finished archive is handed to an [`UnpackSet`] right away, and the
//! acquisition stage ends only after every unpack has been joined.

use chrono::NaiveDate;
use tracing::{debug, error, info, instrument, warn};

use ttabkit_acquire::{FetchOutcome, Fetcher, ListingClient, LocalState, UnpackSet, Window};
use ttabkit_appeals::{AppealMatcher, MatchOutcome};
use ttabkit_parser::{CaseExtractor, Classifier, DocumentSet, ProceedingEntry};
use ttabkit_shared::{Dataset, Result, RetryPolicy, TtabError, with_retry};
use ttabkit_storage::Storage;

use crate::progress::ProgressReporter;
use crate::sink::CaseSink;
use crate::stats::RunStats;

// ---------------------------------------------------------------------------
// Plans
// ---------------------------------------------------------------------------

/// What to download and with which collaborators.
pub struct AcquirePlan<'a> {
    pub listing: &'a ListingClient,
    pub fetcher: &'a Fetcher,
    pub dataset: Dataset,
    pub window: Window,
    /// Reference day for [`Window::RecentDays`].
    pub today: NaiveDate,
    /// Whole-descriptor retry for transient failures.
    pub retry: RetryPolicy,
}

/// How to turn documents into records.
pub struct ExtractPlan<'a> {
    pub classifier: &'a Classifier,
    pub extractor: CaseExtractor,
    /// Inline appeal matching, when enabled.
    pub matcher: Option<&'a AppealMatcher>,
    /// Store whose recorded appeal links are carried onto re-extracted
    /// records, so they are not looked up again.
    pub known: Option<&'a Storage>,
    /// Stop after this many records reach the sink.
    pub limit: Option<u64>,
}

/// Log the counts so far, then hand the fatal error back.
fn abort(stats: &RunStats, e: TtabError) -> TtabError {
    error!(error = %e, summary = %stats.summary(), "run aborted");
    e
}

// ---------------------------------------------------------------------------
// Acquire
// ---------------------------------------------------------------------------

/// List the dataset, fetch every descriptor in the window, and unpack.
#[instrument(skip_all, fields(product = plan.dataset.product_id()))]
pub async fn acquire(plan: &AcquirePlan<'_>, progress: &dyn ProgressReporter) -> Result<RunStats> {
    let mut stats = RunStats::default();

    progress.phase("Listing available files");
    let listed = with_retry(plan.retry, "listing", || plan.listing.list(plan.dataset))
        .await
        .map_err(|e| abort(&stats, e))?;
    let selected = plan.window.select(listed, plan.today);
    stats.listed = selected.len() as u64;
    info!(files = selected.len(), window = ?plan.window, "files selected");

    progress.phase("Downloading archives");
    let mut unpacks = UnpackSet::new();
    let total = selected.len();
    let mut fatal = None;

    for (i, descriptor) in selected.iter().enumerate() {
        let outcome = with_retry(plan.retry, &descriptor.name, || {
            plan.fetcher.ensure_local(descriptor)
        })
        .await;

        match outcome {
            Ok(FetchOutcome::Downloaded { path, bytes, .. }) => {
                stats.fetched += 1;
                debug!(file = %descriptor.name, bytes, "queued for unpacking");
                unpacks.spawn(path);
            }
            Ok(FetchOutcome::AlreadyPresent(LocalState::Unpacked(_))) => {
                stats.skipped_duplicate += 1;
            }
            Ok(FetchOutcome::AlreadyPresent(LocalState::Packed(path))) => {
                stats.skipped_duplicate += 1;
                unpacks.spawn(path);
            }
            Err(e) if e.is_fatal() => {
                fatal = Some(e);
                break;
            }
            Err(e) => {
                stats.fetch_failed += 1;
                warn!(file = %descriptor.name, error = %e, "download failed, skipping");
            }
        }
        progress.file_acquired(&descriptor.name, i + 1, total);
    }

    progress.phase("Waiting for unpack tasks");
    for (archive, result) in unpacks.join_all().await {
        match result {
            Ok(report) => {
                stats.unpacked += 1;
                debug!(archive = %archive.display(), xml_files = report.xml_files, "unpacked");
            }
            Err(_) => stats.unpack_failed += 1,
        }
    }

    if let Some(e) = fatal {
        return Err(abort(&stats, e));
    }

    info!(summary = %stats.summary(), "acquisition complete");
    progress.done(&stats);
    Ok(stats)
}

// ---------------------------------------------------------------------------
// Extract
// ---------------------------------------------------------------------------

/// Walk `documents`, keep opinions, extract, optionally match, and stream
/// every keyable record into `sink`.
#[instrument(skip_all, fields(documents = documents.len(), limit = ?plan.limit))]
pub async fn extract<S: CaseSink>(
    documents: &DocumentSet,
    plan: &ExtractPlan<'_>,
    mut sink: S,
    progress: &dyn ProgressReporter,
) -> Result<RunStats> {
    let mut stats = RunStats::default();
    progress.phase("Extracting opinions");

    let total = documents.len();
    'documents: for (i, document) in documents.iter().enumerate() {
        let name = document.name();
        progress.document(&name, i + 1, total);

        let entries = match document.entries() {
            Ok(entries) => entries,
            Err(e) => {
                stats.document_errors += 1;
                warn!(document = %name, error = %e, "cannot open document, skipping");
                continue;
            }
        };
        stats.documents += 1;

        for element in entries {
            let element = match element {
                Ok(element) => element,
                Err(e) => {
                    stats.malformed += 1;
                    warn!(document = %name, error = %e, "malformed document, skipping rest");
                    continue;
                }
            };
            stats.entries += 1;

            let entry = ProceedingEntry::new(element);
            let verdict = plan.classifier.classify(&entry);
            if !verdict.is_opinion() {
                stats.non_opinions += 1;
                continue;
            }

            let extraction = plan.extractor.extract(&entry, Some(&name));
            for issue in &extraction.issues {
                stats.record_issue(issue.kind());
            }
            if !extraction.is_keyable() {
                stats.unkeyable += 1;
                warn!(document = %name, "opinion without a case number, skipping");
                continue;
            }

            let mut record = extraction.record;
            if let Some(store) = plan.known {
                match store.get_case(record.case_number()).await {
                    Ok(Some(stored)) => {
                        if let Some(appeal) = stored.appeal() {
                            record.attach_appeal(appeal.clone());
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        finish_quietly(sink).await;
                        return Err(abort(&stats, e));
                    }
                }
            }
            if let Some(matcher) = plan.matcher {
                match matcher.enrich(&mut record).await {
                    Ok(outcome) => count_match(&mut stats, &outcome),
                    Err(e) if e.is_fatal() => {
                        finish_quietly(sink).await;
                        return Err(abort(&stats, e));
                    }
                    Err(e) => {
                        stats.match_errors += 1;
                        warn!(case = %record.case_number(), error = %e, "appeal lookup failed");
                    }
                }
            }

            if let Err(e) = sink.accept(&record).await {
                return Err(abort(&stats, e));
            }
            stats.opinions_extracted += 1;
            progress.record(record.case_number(), stats.opinions_extracted);

            if plan.limit.is_some_and(|cap| stats.opinions_extracted >= cap) {
                stats.limit_reached = true;
                info!(limit = ?plan.limit, "record limit reached, stopping");
                break 'documents;
            }
        }
    }

    sink.finish().await.map_err(|e| abort(&stats, e))?;
    info!(summary = %stats.summary(), "extraction complete");
    progress.done(&stats);
    Ok(stats)
}

/// Close the sink on the way out of a failed run, keeping the original error.
async fn finish_quietly<S: CaseSink>(sink: S) {
    if let Err(e) = sink.finish().await {
        warn!(error = %e, "output could not be finalized");
    }
}

fn count_match(stats: &mut RunStats, outcome: &MatchOutcome) {
    match outcome {
        MatchOutcome::Matched { .. } => stats.matched += 1,
        MatchOutcome::NoMatch => stats.unmatched += 1,
        MatchOutcome::AlreadyMatched => stats.already_matched += 1,
    }
}

// ---------------------------------------------------------------------------
// Enrich
// ---------------------------------------------------------------------------

/// Match stored cases that have no appeal yet and record the links.
#[instrument(skip_all, fields(limit = ?limit))]
pub async fn enrich(
    storage: &Storage,
    matcher: &AppealMatcher,
    limit: Option<u32>,
    progress: &dyn ProgressReporter,
) -> Result<RunStats> {
    let mut stats = RunStats::default();
    progress.phase("Loading unmatched cases");
    let pending = storage.list_cases_without_appeal(limit).await?;
    info!(cases = pending.len(), "matching stored cases");

    progress.phase("Matching appeals");
    for (i, record) in pending.iter().enumerate() {
        match matcher.match_case(record).await {
            Ok(MatchOutcome::Matched { appeal, tier, score }) => {
                storage
                    .attach_appeal(record.case_number(), &appeal)
                    .await
                    .map_err(|e| abort(&stats, e))?;
                stats.matched += 1;
                info!(
                    case = %record.case_number(),
                    appeal = %appeal.case_number,
                    tier = tier.as_str(),
                    score,
                    "appeal linked"
                );
            }
            Ok(outcome) => count_match(&mut stats, &outcome),
            Err(e) if e.is_fatal() => return Err(abort(&stats, e)),
            Err(e) => {
                stats.match_errors += 1;
                warn!(case = %record.case_number(), error = %e, "appeal lookup failed");
            }
        }
        progress.record(record.case_number(), i as u64 + 1);
    }

    info!(summary = %stats.summary(), "enrichment complete");
    progress.done(&stats);
    Ok(stats)
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// Acquire, then extract everything under the fetcher's data directory.
pub async fn run<S: CaseSink>(
    acquire_plan: &AcquirePlan<'_>,
    extract_plan: &ExtractPlan<'_>,
    sink: S,
    progress: &dyn ProgressReporter,
) -> Result<RunStats> {
    let mut stats = acquire(acquire_plan, progress).await?;

    let documents = DocumentSet::scan(acquire_plan.fetcher.data_dir())?;
    let extracted = match extract(&documents, extract_plan, sink, progress).await {
        Ok(extracted) => extracted,
        Err(e) => return Err(abort(&stats, e)),
    };
    stats.merge(extracted);

    info!(summary = %stats.summary(), "run complete");
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::progress::SilentProgress;
    use crate::sink::Tee;
    use ttabkit_appeals::CourtListenerClient;
    use ttabkit_export::{CsvExporter, read_rows};
    use ttabkit_shared::{
        AppealRecord, CaseRecord, CourtListenerConfig, MatchingConfig, PartyRole, ProceedingType,
        RateLimiter, UsptoConfig,
    };
    use uuid::Uuid;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ttabkit_{tag}_{}", Uuid::now_v7()));
        std::fs::create_dir_all(&dir).expect("mkdir");
        dir
    }

    fn fixture(name: &str) -> String {
        let path = format!("../../../fixtures/xml/{name}");
        std::fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing fixture: {path}"))
    }

    fn sample_documents() -> (PathBuf, DocumentSet) {
        let dir = temp_dir("extract");
        std::fs::create_dir_all(dir.join("tt250302")).expect("mkdir");
        std::fs::write(dir.join("tt250302/tt250302.xml"), fixture("daily_sample.xml"))
            .expect("write fixture");
        std::fs::write(dir.join("tt250303.xml"), "<ttab-proceedings><proceeding-entry><number>9")
            .expect("write broken");
        let set = DocumentSet::scan(&dir).expect("scan");
        (dir, set)
    }

    fn plan<'a>(classifier: &'a Classifier, limit: Option<u64>) -> ExtractPlan<'a> {
        ExtractPlan {
            classifier,
            extractor: CaseExtractor::new(),
            matcher: None,
            known: None,
            limit,
        }
    }

    #[tokio::test]
    async fn extract_keeps_only_opinions() {
        let (_dir, documents) = sample_documents();
        let classifier = Classifier::default();
        let mut records: Vec<CaseRecord> = Vec::new();

        let stats = extract(&documents, &plan(&classifier, None), &mut records, &SilentProgress)
            .await
            .expect("extract");

        let numbers: Vec<&str> = records.iter().map(|r| r.case_number()).collect();
        assert_eq!(numbers, ["91123456", "92000001", "70555555"]);
        assert_eq!(stats.documents, 2);
        assert_eq!(stats.entries, 5);
        assert_eq!(stats.non_opinions, 2);
        assert_eq!(stats.opinions_extracted, 3);
        assert_eq!(stats.malformed, 1);
        assert_eq!(stats.data_issues.get("invalid_date"), Some(&1));
        assert_eq!(stats.data_issues.get("unknown_role_code"), Some(&1));

        let acme = &records[0];
        assert_eq!(acme.proceeding_type(), ProceedingType::Opposition);
        let plaintiffs: Vec<&str> = acme.plaintiffs().map(|p| p.name.as_str()).collect();
        let defendants: Vec<&str> = acme.defendants().map(|p| p.name.as_str()).collect();
        assert_eq!(plaintiffs, ["Acme Inc."]);
        assert_eq!(defendants, ["Globex Corp."]);
        assert_eq!(acme.prevailing_party(), Some(PartyRole::Plaintiff));
        assert_eq!(acme.source_file(), Some("tt250302.xml"));
    }

    #[tokio::test]
    async fn limit_stops_early_and_finishes_output() {
        let (dir, documents) = sample_documents();
        let classifier = Classifier::default();
        let csv_path = dir.join("out/opinions.csv");
        let exporter = CsvExporter::create(&csv_path).expect("exporter");
        let mut records: Vec<CaseRecord> = Vec::new();

        let stats = extract(
            &documents,
            &plan(&classifier, Some(2)),
            Tee(exporter, &mut records),
            &SilentProgress,
        )
        .await
        .expect("extract");

        assert!(stats.limit_reached);
        assert_eq!(stats.opinions_extracted, 2);
        assert_eq!(records.len(), 2);
        let rows = read_rows(&csv_path).expect("csv written");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].case_number, "92000001");
    }

    #[tokio::test]
    async fn extract_into_store_is_idempotent() {
        let (dir, documents) = sample_documents();
        let classifier = Classifier::default();
        let storage = Storage::open(&dir.join("ttabkit.db")).await.expect("db");

        for _ in 0..2 {
            extract(&documents, &plan(&classifier, None), &storage, &SilentProgress)
                .await
                .expect("extract");
        }
        assert_eq!(storage.count_cases().await.expect("count"), 3);
    }

    fn appeal_matcher(server: &MockServer) -> AppealMatcher {
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
    }

    #[tokio::test]
    async fn inline_matching_counts_outcomes() {
        let (_dir, documents) = sample_documents();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "results": [] })),
            )
            .mount(&server)
            .await;

        let matcher = appeal_matcher(&server);
        let classifier = Classifier::default();
        let plan = ExtractPlan {
            matcher: Some(&matcher),
            ..plan(&classifier, None)
        };

        let mut records: Vec<CaseRecord> = Vec::new();
        let stats = extract(&documents, &plan, &mut records, &SilentProgress)
            .await
            .expect("extract");
        assert_eq!(stats.unmatched, 3);
        assert_eq!(stats.matched, 0);
        assert!(records.iter().all(|r| r.appeal().is_none()));
    }

    /// Accepts everything, then fails to finalize.
    struct UnflushableSink(Arc<AtomicBool>);

    impl CaseSink for UnflushableSink {
        async fn accept(&mut self, _record: &CaseRecord) -> Result<()> {
            Ok(())
        }

        async fn finish(self) -> Result<()> {
            self.0.store(true, Ordering::SeqCst);
            Err(TtabError::validation("output volume is full"))
        }
    }

    #[tokio::test]
    async fn fatal_match_error_survives_a_failing_finish() {
        let (_dir, documents) = sample_documents();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let matcher = appeal_matcher(&server);
        let classifier = Classifier::default();
        let plan = ExtractPlan {
            matcher: Some(&matcher),
            ..plan(&classifier, None)
        };
        let finished = Arc::new(AtomicBool::new(false));
        let err = extract(
            &documents,
            &plan,
            UnflushableSink(finished.clone()),
            &SilentProgress,
        )
        .await
        .unwrap_err();

        assert!(err.is_fatal(), "{err:?}");
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn rerun_keeps_stored_appeals_without_querying() {
        let (dir, documents) = sample_documents();
        let storage = Storage::open(&dir.join("ttabkit.db")).await.expect("db");
        let classifier = Classifier::default();
        extract(&documents, &plan(&classifier, None), &storage, &SilentProgress)
            .await
            .expect("first pass");
        for case_number in ["91123456", "92000001", "70555555"] {
            let appeal = AppealRecord {
                case_number: format!("2025-{}", &case_number[4..]),
                case_name: "Linked appeal".into(),
                citation: None,
                docket_number: None,
                filing_date: None,
                decision_date: None,
                outcome: Default::default(),
                source_id: case_number.into(),
                url: None,
            };
            assert!(storage.attach_appeal(case_number, &appeal).await.expect("link"));
        }

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "results": [] })),
            )
            .expect(0)
            .mount(&server)
            .await;
        let matcher = appeal_matcher(&server);
        let rerun = ExtractPlan {
            matcher: Some(&matcher),
            known: Some(&storage),
            ..plan(&classifier, None)
        };
        let mut records: Vec<CaseRecord> = Vec::new();
        let stats = extract(&documents, &rerun, Tee(&storage, &mut records), &SilentProgress)
            .await
            .expect("rerun");

        assert_eq!(stats.already_matched, 3);
        assert_eq!(stats.matched + stats.unmatched, 0);
        assert!(records.iter().all(|r| r.appeal().is_some()));
        let stored = storage.get_case("91123456").await.expect("get").expect("stored");
        assert_eq!(stored.appeal().map(|a| a.case_number.as_str()), Some("2025-3456"));
        assert_eq!(storage.list_cases_without_appeal(None).await.expect("list").len(), 0);
    }

    // -- acquisition --------------------------------------------------------

    fn zip_bytes(files: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        for (name, body) in files {
            writer
                .start_file(*name, zip::write::SimpleFileOptions::default())
                .expect("start file");
            writer.write_all(body.as_bytes()).expect("write");
        }
        writer.finish().expect("finish").into_inner()
    }

    fn listing_body(server: &MockServer, names: &[&str]) -> serde_json::Value {
        let files: Vec<serde_json::Value> = names
            .iter()
            .map(|name| {
                serde_json::json!({
                    "fileName": name,
                    "fileSize": 10,
                    "fileDataFromDate": "2025-01-02",
                    "fileDownloadURI": format!("{}/files/{name}", server.uri()),
                })
            })
            .collect();
        serde_json::json!({
            "bulkDataProductBag": [{ "productFileBag": { "fileDataBag": files } }]
        })
    }

    fn clients(server: &MockServer, data_dir: &Path) -> (ListingClient, Fetcher) {
        let config = UsptoConfig {
            api_base_url: server.uri(),
            ..UsptoConfig::default()
        };
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(1)));
        (
            ListingClient::new(&config, "key".into()).expect("listing"),
            Fetcher::new(&config, data_dir, "key".into(), limiter).expect("fetcher"),
        )
    }

    fn acquire_plan<'a>(listing: &'a ListingClient, fetcher: &'a Fetcher) -> AcquirePlan<'a> {
        AcquirePlan {
            listing,
            fetcher,
            dataset: Dataset::Daily,
            window: Window::All,
            today: NaiveDate::from_ymd_opt(2025, 1, 10).expect("date"),
            retry: RetryPolicy::new(2, Duration::from_millis(1)),
        }
    }

    #[tokio::test]
    async fn acquire_downloads_missing_and_skips_present() {
        let server = MockServer::start().await;
        let data_dir = temp_dir("acquire");
        std::fs::create_dir_all(data_dir.join("ttab2025-01-01")).expect("mkdir");
        std::fs::write(data_dir.join("ttab2025-01-01/old.xml"), "<r/>").expect("write");

        Mock::given(method("GET"))
            .and(path("/TTABTDXF"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing_body(
                &server,
                &["ttab2025-01-01.zip", "ttab2025-01-02.zip", "ttab2025-01-03.zip"],
            )))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files/ttab2025-01-01.zip"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files/ttab2025-01-02.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(zip_bytes(&[(
                "tt250102.xml",
                &fixture("daily_sample.xml"),
            )])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files/ttab2025-01-03.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"not a zip".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let (listing, fetcher) = clients(&server, &data_dir);
        let stats = acquire(&acquire_plan(&listing, &fetcher), &SilentProgress)
            .await
            .expect("acquire");

        assert_eq!(stats.listed, 3);
        assert_eq!(stats.fetched, 2);
        assert_eq!(stats.skipped_duplicate, 1);
        assert_eq!(stats.unpacked, 1);
        assert_eq!(stats.unpack_failed, 1);
        assert!(data_dir.join("ttab2025-01-02/tt250102.xml").is_file());
        assert!(!data_dir.join("ttab2025-01-02.zip").exists());
    }

    #[tokio::test]
    async fn rejected_key_aborts_acquisition() {
        let server = MockServer::start().await;
        let data_dir = temp_dir("acquire_auth");
        Mock::given(method("GET"))
            .and(path("/TTABTDXF"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let (listing, fetcher) = clients(&server, &data_dir);
        let err = acquire(&acquire_plan(&listing, &fetcher), &SilentProgress)
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn run_extracts_what_was_acquired() {
        let server = MockServer::start().await;
        let data_dir = temp_dir("run");
        Mock::given(method("GET"))
            .and(path("/TTABTDXF"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(listing_body(&server, &["ttab2025-01-02.zip"])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files/ttab2025-01-02.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(zip_bytes(&[(
                "tt250102.xml",
                &fixture("daily_sample.xml"),
            )])))
            .expect(1)
            .mount(&server)
            .await;

        let (listing, fetcher) = clients(&server, &data_dir);
        let classifier = Classifier::default();
        let mut records: Vec<CaseRecord> = Vec::new();
        let stats = run(
            &acquire_plan(&listing, &fetcher),
            &plan(&classifier, None),
            &mut records,
            &SilentProgress,
        )
        .await
        .expect("run");

        assert_eq!(stats.fetched, 1);
        assert_eq!(stats.opinions_extracted, 3);
        assert_eq!(records.len(), 3);
    }
}
