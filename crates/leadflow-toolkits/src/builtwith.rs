//! BuiltWith client: technology stack lookups, trends, and competitor
//! analysis.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use leadflow_core::{Settings, Toolkit, ToolkitError};

use crate::limiter::RateLimiter;

const SERVICE: &str = "builtwith";
const DEFAULT_BASE_URL: &str = "https://api.builtwith.com";

/// BuiltWith asks for at most one request per second.
const REQUEST_INTERVAL: Duration = Duration::from_secs(1);

/// Stack comparisons are capped to keep the request volume sane.
const MAX_COMPARE_DOMAINS: usize = 10;

/// Categories that identify a company's marketing-relevant stack.
const KEY_CATEGORIES: &[&str] = &["Analytics", "CMS", "E-commerce", "Marketing"];

/// One detected technology on a domain.
#[derive(Debug, Clone)]
pub struct Technology {
    pub name: String,
    pub category: Option<String>,
    pub first_detected: Option<String>,
    pub last_detected: Option<String>,
}

/// Full technology profile of a domain.
#[derive(Debug, Clone)]
pub struct TechProfile {
    pub domain: String,
    pub technologies: Vec<Technology>,
    /// Technology count per category.
    pub categories: HashMap<String, usize>,
    pub total_technologies: usize,
    pub profile_date: Option<String>,
}

/// A company found to be using a technology.
#[derive(Debug, Clone)]
pub struct TechnologyUser {
    pub domain: Option<String>,
    pub country: Option<String>,
    pub first_detected: Option<String>,
    pub last_detected: Option<String>,
    pub vertical: Option<String>,
}

/// One point in a technology adoption trend.
#[derive(Debug, Clone)]
pub struct TrendPoint {
    pub date: Option<String>,
    pub count: u64,
    pub percentage: Option<f64>,
}

/// Adoption trend for a technology.
#[derive(Debug, Clone)]
pub struct TechnologyTrends {
    pub technology: String,
    pub trends: Vec<TrendPoint>,
    pub period_months: u32,
    pub latest_count: u64,
}

/// Market share snapshot for a technology.
#[derive(Debug, Clone)]
pub struct MarketShare {
    pub technology: String,
    pub market_share: f64,
    pub total_sites: u64,
    pub rank: Option<u64>,
    pub vertical: Option<String>,
    pub last_updated: Option<String>,
}

/// Side-by-side comparison of several domains' stacks.
#[derive(Debug, Clone)]
pub struct StackComparison {
    pub domains: Vec<String>,
    /// For each technology, which compared domains use it.
    pub technology_matrix: HashMap<String, HashMap<String, bool>>,
    /// Technologies every compared domain uses.
    pub common_technologies: Vec<String>,
    /// Technologies only one domain uses, keyed by that domain.
    pub unique_technologies: HashMap<String, Vec<String>>,
    pub category_comparison: HashMap<String, HashMap<String, usize>>,
}

/// A competitor and its overlap with the reference domain.
#[derive(Debug, Clone)]
pub struct CompetitorProfile {
    pub domain: String,
    pub shared_technologies: Vec<String>,
    pub total_technologies: usize,
    pub technology_categories: HashMap<String, usize>,
    pub technologies: Vec<Technology>,
}

/// Competitor landscape derived from a reference domain's key technologies.
#[derive(Debug, Clone)]
pub struct CompetitorAnalysis {
    pub reference_domain: String,
    pub reference_technologies: usize,
    pub competitors: Vec<CompetitorProfile>,
    pub analysis_based_on: Vec<String>,
}

/// BuiltWith API client.
pub struct BuiltWithClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    limiter: RateLimiter,
}

impl BuiltWithClient {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: settings.marketing_apis.builtwith_api_key.clone(),
            limiter: RateLimiter::interval(REQUEST_INTERVAL),
        }
    }

    /// Point the client at a different base URL. Test seam.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn get<R: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<R, ToolkitError> {
        let key = self
            .api_key
            .clone()
            .ok_or(ToolkitError::MissingApiKey { service: SERVICE })?;
        self.limiter.wait().await;

        let started = Instant::now();
        let response = self
            .http
            .get(format!("{}/{}", self.base_url, endpoint))
            .query(&[("KEY", key.as_str())])
            .query(params)
            .send()
            .await
            .map_err(|e| ToolkitError::RequestFailed {
                service: SERVICE,
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        info!(
            service = SERVICE,
            endpoint,
            status = status.as_u16(),
            duration_ms = started.elapsed().as_millis() as u64,
            "api call"
        );
        if !status.is_success() {
            return Err(ToolkitError::UnexpectedStatus {
                service: SERVICE,
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }
        response
            .json()
            .await
            .map_err(|e| ToolkitError::DecodeFailed {
                service: SERVICE,
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })
    }

    /// Full technology stack for a domain.
    pub async fn domain_technologies(&self, domain: &str) -> Result<TechProfile, ToolkitError> {
        let response: LookupResponse = self.get("v20/api.json", &[("LOOKUP", domain)]).await?;

        let Some(first) = response.results.into_iter().next() else {
            return Err(ToolkitError::NotFound {
                service: SERVICE,
                resource: domain.to_string(),
            });
        };

        let mut technologies = Vec::new();
        let mut categories: HashMap<String, usize> = HashMap::new();

        if let Some(result) = first.result {
            for path in result.paths {
                for group in path.technologies {
                    let category = group.name.clone();
                    for tech in group.categories {
                        let Some(name) = tech.name else { continue };
                        technologies.push(Technology {
                            name,
                            category: category.clone(),
                            first_detected: value_text(tech.first_detected),
                            last_detected: value_text(tech.last_detected),
                        });
                        if let Some(category) = &category {
                            *categories.entry(category.clone()).or_default() += 1;
                        }
                    }
                }
            }
        }

        Ok(TechProfile {
            domain: domain.to_string(),
            total_technologies: technologies.len(),
            technologies,
            categories,
            profile_date: value_text(first.first_indexed),
        })
    }

    /// Companies using a technology, optionally filtered by country.
    pub async fn companies_using_technology(
        &self,
        technology: &str,
        country: Option<&str>,
        limit: usize,
    ) -> Result<Vec<TechnologyUser>, ToolkitError> {
        let mut params = vec![("TECH", technology), ("SINCE", "")];
        if let Some(country) = country {
            params.push(("COUNTRY", country));
        }

        let response: TechListResponse = self.get("v20/api.json", &params).await?;
        Ok(response
            .results
            .into_iter()
            .take(limit)
            .map(|raw| TechnologyUser {
                domain: raw.domain,
                country: raw.country,
                first_detected: value_text(raw.first_indexed),
                last_detected: value_text(raw.last_indexed),
                vertical: raw.vertical,
            })
            .collect())
    }

    /// Adoption trend for a technology over the past `months` months.
    pub async fn technology_trends(
        &self,
        technology: &str,
        months: u32,
    ) -> Result<TechnologyTrends, ToolkitError> {
        let months_param = months.to_string();
        let response: TrendResponse = self
            .get(
                "trends1/api.json",
                &[("TECH", technology), ("MONTHS", &months_param)],
            )
            .await?;

        let trends: Vec<TrendPoint> = response
            .results
            .into_iter()
            .map(|raw| TrendPoint {
                date: value_text(raw.date),
                count: raw.count.unwrap_or(0),
                percentage: raw.percent,
            })
            .collect();

        Ok(TechnologyTrends {
            technology: technology.to_string(),
            latest_count: trends.last().map(|t| t.count).unwrap_or(0),
            trends,
            period_months: months,
        })
    }

    /// Market share for a technology, optionally within an industry vertical.
    pub async fn market_share(
        &self,
        technology: &str,
        vertical: Option<&str>,
    ) -> Result<MarketShare, ToolkitError> {
        let mut params = vec![("TECH", technology)];
        if let Some(vertical) = vertical {
            params.push(("VERTICAL", vertical));
        }

        let response: MarketResponse = self.get("market1/api.json", &params).await?;
        let Some(first) = response.results.into_iter().next() else {
            return Err(ToolkitError::NotFound {
                service: SERVICE,
                resource: technology.to_string(),
            });
        };

        Ok(MarketShare {
            technology: technology.to_string(),
            market_share: first.percent.unwrap_or(0.0),
            total_sites: first.count.unwrap_or(0),
            rank: first.rank,
            vertical: vertical.map(str::to_string),
            last_updated: value_text(first.date),
        })
    }

    /// Compare stacks across up to ten domains. Domains that cannot be
    /// profiled are skipped.
    pub async fn compare_technology_stacks(
        &self,
        domains: &[String],
    ) -> Result<StackComparison, ToolkitError> {
        let mut profiles: Vec<TechProfile> = Vec::new();
        let mut all_technologies: HashSet<String> = HashSet::new();

        for domain in domains.iter().take(MAX_COMPARE_DOMAINS) {
            match self.domain_technologies(domain).await {
                Ok(profile) => {
                    for tech in &profile.technologies {
                        all_technologies.insert(tech.name.clone());
                    }
                    profiles.push(profile);
                }
                Err(e) => warn!(domain = %domain, error = %e, "skipping domain in comparison"),
            }
        }

        let mut comparison = StackComparison {
            domains: profiles.iter().map(|p| p.domain.clone()).collect(),
            technology_matrix: HashMap::new(),
            common_technologies: Vec::new(),
            unique_technologies: HashMap::new(),
            category_comparison: HashMap::new(),
        };

        for tech in all_technologies {
            let mut row = HashMap::new();
            let mut users: Vec<&str> = Vec::new();
            for profile in &profiles {
                let has_tech = profile.technologies.iter().any(|t| t.name == tech);
                row.insert(profile.domain.clone(), has_tech);
                if has_tech {
                    users.push(&profile.domain);
                }
            }

            if users.len() == profiles.len() && !profiles.is_empty() {
                comparison.common_technologies.push(tech.clone());
            } else if let [only] = users.as_slice() {
                comparison
                    .unique_technologies
                    .entry(only.to_string())
                    .or_default()
                    .push(tech.clone());
            }
            comparison.technology_matrix.insert(tech, row);
        }

        for profile in profiles {
            comparison
                .category_comparison
                .insert(profile.domain, profile.categories);
        }
        Ok(comparison)
    }

    /// Competitors inferred from shared marketing-stack technologies.
    ///
    /// Takes the reference domain's top technologies in the key categories,
    /// finds other companies using them, and ranks those by overlap.
    pub async fn competitor_technologies(
        &self,
        reference_domain: &str,
        limit: usize,
    ) -> Result<CompetitorAnalysis, ToolkitError> {
        let reference = self.domain_technologies(reference_domain).await?;

        let key_technologies: Vec<String> = reference
            .technologies
            .iter()
            .filter(|tech| {
                tech.category
                    .as_deref()
                    .is_some_and(|c| KEY_CATEGORIES.contains(&c))
            })
            .map(|tech| tech.name.clone())
            .take(3)
            .collect();

        let mut shared: HashMap<String, Vec<String>> = HashMap::new();
        for tech in &key_technologies {
            let users = self
                .companies_using_technology(tech, None, limit * 2)
                .await?;
            for user in users {
                let Some(domain) = user.domain else { continue };
                if domain == reference_domain {
                    continue;
                }
                shared.entry(domain).or_default().push(tech.clone());
            }
        }

        let mut ranked: Vec<(String, Vec<String>)> = shared.into_iter().collect();
        ranked.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(limit);

        let mut competitors = Vec::new();
        for (domain, shared_technologies) in ranked {
            match self.domain_technologies(&domain).await {
                Ok(profile) => competitors.push(CompetitorProfile {
                    domain,
                    shared_technologies,
                    total_technologies: profile.total_technologies,
                    technology_categories: profile.categories,
                    technologies: profile.technologies,
                }),
                Err(e) => warn!(domain = %domain, error = %e, "skipping competitor profile"),
            }
        }

        Ok(CompetitorAnalysis {
            reference_domain: reference_domain.to_string(),
            reference_technologies: reference.total_technologies,
            competitors,
            analysis_based_on: key_technologies,
        })
    }
}

impl Toolkit for BuiltWithClient {
    fn name(&self) -> &str {
        SERVICE
    }

    fn description(&self) -> &str {
        "Technology stack analysis and competitor research from BuiltWith"
    }

    fn operations(&self) -> Vec<&'static str> {
        vec![
            "domain_technologies",
            "companies_using_technology",
            "technology_trends",
            "market_share",
            "compare_technology_stacks",
            "competitor_technologies",
        ]
    }
}

/// BuiltWith mixes strings and numbers in timestamp fields.
fn value_text(value: Option<serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(rename = "Results", default)]
    results: Vec<LookupResult>,
}

#[derive(Debug, Deserialize)]
struct LookupResult {
    #[serde(rename = "Result")]
    result: Option<RawResult>,
    #[serde(rename = "FirstIndexed")]
    first_indexed: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawResult {
    #[serde(rename = "Paths", default)]
    paths: Vec<RawPath>,
}

#[derive(Debug, Deserialize)]
struct RawPath {
    #[serde(rename = "Technologies", default)]
    technologies: Vec<RawTechnologyGroup>,
}

#[derive(Debug, Deserialize)]
struct RawTechnologyGroup {
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "Categories", default)]
    categories: Vec<RawTechnologyEntry>,
}

#[derive(Debug, Deserialize)]
struct RawTechnologyEntry {
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "FirstDetected")]
    first_detected: Option<serde_json::Value>,
    #[serde(rename = "LastDetected")]
    last_detected: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct TechListResponse {
    #[serde(rename = "Results", default)]
    results: Vec<RawTechnologyUser>,
}

#[derive(Debug, Deserialize)]
struct RawTechnologyUser {
    #[serde(rename = "Domain")]
    domain: Option<String>,
    #[serde(rename = "Country")]
    country: Option<String>,
    #[serde(rename = "FirstIndexed")]
    first_indexed: Option<serde_json::Value>,
    #[serde(rename = "LastIndexed")]
    last_indexed: Option<serde_json::Value>,
    #[serde(rename = "Vertical")]
    vertical: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TrendResponse {
    #[serde(rename = "Results", default)]
    results: Vec<RawTrendPoint>,
}

#[derive(Debug, Deserialize)]
struct RawTrendPoint {
    #[serde(rename = "Date")]
    date: Option<serde_json::Value>,
    #[serde(rename = "Count")]
    count: Option<u64>,
    #[serde(rename = "Percent")]
    percent: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct MarketResponse {
    #[serde(rename = "Results", default)]
    results: Vec<RawMarketEntry>,
}

#[derive(Debug, Deserialize)]
struct RawMarketEntry {
    #[serde(rename = "Percent")]
    percent: Option<f64>,
    #[serde(rename = "Count")]
    count: Option<u64>,
    #[serde(rename = "Rank")]
    rank: Option<u64>,
    #[serde(rename = "Date")]
    date: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base_url: &str) -> BuiltWithClient {
        let mut settings = Settings::default();
        settings.marketing_apis.builtwith_api_key = Some("bw-key".to_string());
        let mut client = BuiltWithClient::from_settings(&settings).with_base_url(base_url);
        // Keep the tests fast.
        client.limiter = RateLimiter::interval(Duration::from_millis(0));
        client
    }

    fn lookup_body(techs: &[(&str, &str)], first_indexed: u64) -> serde_json::Value {
        let groups: Vec<serde_json::Value> = techs
            .iter()
            .map(|(category, name)| {
                serde_json::json!({
                    "Name": category,
                    "Categories": [{"Name": name, "FirstDetected": 1600000000000u64}]
                })
            })
            .collect();
        serde_json::json!({
            "Results": [{
                "Result": {"Paths": [{"Technologies": groups}]},
                "FirstIndexed": first_indexed
            }]
        })
    }

    #[tokio::test]
    async fn missing_api_key_fails_before_any_request() {
        let client = BuiltWithClient::from_settings(&Settings::default());
        let err = client.domain_technologies("example.com").await.unwrap_err();
        assert!(matches!(
            err,
            ToolkitError::MissingApiKey { service: "builtwith" }
        ));
    }

    #[tokio::test]
    async fn domain_profile_counts_categories() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v20/api.json"))
            .and(query_param("KEY", "bw-key"))
            .and(query_param("LOOKUP", "example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(lookup_body(
                &[
                    ("Analytics", "Google Analytics"),
                    ("Analytics", "Mixpanel"),
                    ("CMS", "WordPress"),
                ],
                1500000000000,
            )))
            .mount(&server)
            .await;

        let profile = client(&server.uri())
            .domain_technologies("example.com")
            .await
            .unwrap();

        assert_eq!(profile.total_technologies, 3);
        assert_eq!(profile.categories.get("Analytics"), Some(&2));
        assert_eq!(profile.categories.get("CMS"), Some(&1));
        assert_eq!(profile.profile_date.as_deref(), Some("1500000000000"));
    }

    #[tokio::test]
    async fn unknown_domain_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v20/api.json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"Results": []})),
            )
            .mount(&server)
            .await;

        let err = client(&server.uri())
            .domain_technologies("unknown.example")
            .await
            .unwrap_err();
        assert!(matches!(err, ToolkitError::NotFound { .. }));
    }

    #[tokio::test]
    async fn trends_report_latest_count() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/trends1/api.json"))
            .and(query_param("TECH", "React"))
            .and(query_param("MONTHS", "6"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Results": [
                    {"Date": "2026-01", "Count": 100, "Percent": 1.0},
                    {"Date": "2026-06", "Count": 140, "Percent": 1.4}
                ]
            })))
            .mount(&server)
            .await;

        let trends = client(&server.uri())
            .technology_trends("React", 6)
            .await
            .unwrap();
        assert_eq!(trends.trends.len(), 2);
        assert_eq!(trends.latest_count, 140);
        assert_eq!(trends.period_months, 6);
    }

    #[tokio::test]
    async fn stack_comparison_finds_common_and_unique() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v20/api.json"))
            .and(query_param("LOOKUP", "a.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(lookup_body(
                &[("Analytics", "Google Analytics"), ("CMS", "WordPress")],
                1,
            )))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v20/api.json"))
            .and(query_param("LOOKUP", "b.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(lookup_body(
                &[("Analytics", "Google Analytics"), ("CMS", "Drupal")],
                1,
            )))
            .mount(&server)
            .await;

        let comparison = client(&server.uri())
            .compare_technology_stacks(&["a.com".to_string(), "b.com".to_string()])
            .await
            .unwrap();

        assert_eq!(comparison.domains.len(), 2);
        assert_eq!(
            comparison.common_technologies,
            vec!["Google Analytics".to_string()]
        );
        assert_eq!(
            comparison.unique_technologies.get("a.com"),
            Some(&vec!["WordPress".to_string()])
        );
        assert_eq!(
            comparison.unique_technologies.get("b.com"),
            Some(&vec!["Drupal".to_string()])
        );
    }

    #[tokio::test]
    async fn competitors_rank_by_shared_technologies() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v20/api.json"))
            .and(query_param("LOOKUP", "ref.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(lookup_body(
                &[
                    ("Analytics", "Google Analytics"),
                    ("Marketing", "HubSpot"),
                    ("Hosting", "AWS"),
                ],
                1,
            )))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v20/api.json"))
            .and(query_param("TECH", "Google Analytics"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Results": [
                    {"Domain": "rival.io"},
                    {"Domain": "other.io"},
                    {"Domain": "ref.com"}
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v20/api.json"))
            .and(query_param("TECH", "HubSpot"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Results": [{"Domain": "rival.io"}]
            })))
            .mount(&server)
            .await;
        for domain in ["rival.io", "other.io"] {
            Mock::given(method("GET"))
                .and(path("/v20/api.json"))
                .and(query_param("LOOKUP", domain))
                .respond_with(ResponseTemplate::new(200).set_body_json(lookup_body(
                    &[("Analytics", "Google Analytics")],
                    1,
                )))
                .mount(&server)
                .await;
        }

        let analysis = client(&server.uri())
            .competitor_technologies("ref.com", 5)
            .await
            .unwrap();

        assert_eq!(
            analysis.analysis_based_on,
            vec!["Google Analytics".to_string(), "HubSpot".to_string()]
        );
        assert_eq!(analysis.competitors.len(), 2);
        assert_eq!(analysis.competitors[0].domain, "rival.io");
        assert_eq!(analysis.competitors[0].shared_technologies.len(), 2);
    }
}
