//! Apollo.io client: lead search, contact and company enrichment.

use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;

use leadflow_core::{Settings, Toolkit, ToolkitError};

use crate::limiter::RateLimiter;

const SERVICE: &str = "apollo";
const DEFAULT_BASE_URL: &str = "https://api.apollo.io/v1";

/// Apollo caps page sizes at 100.
const MAX_PER_PAGE: u32 = 100;

/// A contact as returned by Apollo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub title: Option<String>,
    pub company_name: Option<String>,
    pub linkedin_url: Option<String>,
    pub phone: Option<String>,
}

/// A company as returned by Apollo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub id: Option<String>,
    pub name: Option<String>,
    pub domain: Option<String>,
    pub industry: Option<String>,
    pub size: Option<String>,
    pub location: Option<String>,
    pub revenue: Option<String>,
    pub technologies: Vec<String>,
}

/// Filters for the people search endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct PeopleSearch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub organization_names: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub person_titles: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub organization_industry_tag_ids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub person_locations: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub person_seniority: Vec<String>,
    pub page: u32,
    pub per_page: u32,
}

impl Default for PeopleSearch {
    fn default() -> Self {
        Self {
            q: None,
            organization_names: Vec::new(),
            person_titles: Vec::new(),
            organization_industry_tag_ids: Vec::new(),
            person_locations: Vec::new(),
            person_seniority: Vec::new(),
            page: 1,
            per_page: 25,
        }
    }
}

impl PeopleSearch {
    pub fn query(mut self, q: impl Into<String>) -> Self {
        self.q = Some(q.into());
        self
    }

    pub fn companies(mut self, names: Vec<String>) -> Self {
        self.organization_names = names;
        self
    }

    pub fn titles(mut self, titles: Vec<String>) -> Self {
        self.person_titles = titles;
        self
    }

    pub fn industries(mut self, industries: Vec<String>) -> Self {
        self.organization_industry_tag_ids = industries;
        self
    }

    pub fn locations(mut self, locations: Vec<String>) -> Self {
        self.person_locations = locations;
        self
    }

    pub fn seniority(mut self, levels: Vec<String>) -> Self {
        self.person_seniority = levels;
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page;
        self
    }
}

/// Filters for the organization search endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct OrganizationSearch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub organization_industry_tag_ids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub organization_locations: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub organization_num_employees_ranges: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub organization_revenue_ranges: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub technology_names: Vec<String>,
    pub page: u32,
    pub per_page: u32,
}

impl Default for OrganizationSearch {
    fn default() -> Self {
        Self {
            q: None,
            organization_industry_tag_ids: Vec::new(),
            organization_locations: Vec::new(),
            organization_num_employees_ranges: Vec::new(),
            organization_revenue_ranges: Vec::new(),
            technology_names: Vec::new(),
            page: 1,
            per_page: 25,
        }
    }
}

impl OrganizationSearch {
    pub fn query(mut self, q: impl Into<String>) -> Self {
        self.q = Some(q.into());
        self
    }

    pub fn industries(mut self, industries: Vec<String>) -> Self {
        self.organization_industry_tag_ids = industries;
        self
    }

    pub fn locations(mut self, locations: Vec<String>) -> Self {
        self.organization_locations = locations;
        self
    }

    pub fn size_ranges(mut self, ranges: Vec<String>) -> Self {
        self.organization_num_employees_ranges = ranges;
        self
    }

    pub fn revenue_ranges(mut self, ranges: Vec<String>) -> Self {
        self.organization_revenue_ranges = ranges;
        self
    }

    pub fn technologies(mut self, technologies: Vec<String>) -> Self {
        self.technology_names = technologies;
        self
    }

    pub fn per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page;
        self
    }
}

/// One page of people search results.
#[derive(Debug, Clone)]
pub struct PeoplePage {
    pub contacts: Vec<Contact>,
    pub total_entries: u64,
    pub page: u32,
    pub per_page: u32,
    pub num_pages: u64,
}

/// One page of organization search results.
#[derive(Debug, Clone)]
pub struct CompanyPage {
    pub companies: Vec<Company>,
    pub total_entries: u64,
    pub page: u32,
    pub per_page: u32,
    pub num_pages: u64,
}

/// Companies resembling a reference company.
#[derive(Debug, Clone)]
pub struct SimilarCompanies {
    pub reference: Company,
    pub companies: Vec<Company>,
    pub total_found: usize,
}

/// Apollo.io API client.
pub struct ApolloClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    limiter: RateLimiter,
}

impl ApolloClient {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: settings.marketing_apis.apollo_api_key.clone(),
            limiter: RateLimiter::per_minute(settings.marketing_apis.apollo_rate_limit),
        }
    }

    /// Point the client at a different base URL. Test seam.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn key(&self) -> Result<String, ToolkitError> {
        self.api_key
            .clone()
            .ok_or(ToolkitError::MissingApiKey { service: SERVICE })
    }

    async fn decode<R: DeserializeOwned>(
        endpoint: &str,
        started: Instant,
        response: reqwest::Response,
    ) -> Result<R, ToolkitError> {
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

    async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<R, ToolkitError> {
        let key = self.key()?;
        self.limiter.wait().await;

        let started = Instant::now();
        let response = self
            .http
            .post(format!("{}/{}", self.base_url, endpoint))
            .header("X-Api-Key", key)
            .header("Cache-Control", "no-cache")
            .json(body)
            .send()
            .await
            .map_err(|e| ToolkitError::RequestFailed {
                service: SERVICE,
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;
        Self::decode(endpoint, started, response).await
    }

    async fn get<R: DeserializeOwned>(&self, endpoint: &str) -> Result<R, ToolkitError> {
        let key = self.key()?;
        self.limiter.wait().await;

        let started = Instant::now();
        let response = self
            .http
            .get(format!("{}/{}", self.base_url, endpoint))
            .header("X-Api-Key", key)
            .header("Cache-Control", "no-cache")
            .send()
            .await
            .map_err(|e| ToolkitError::RequestFailed {
                service: SERVICE,
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;
        Self::decode(endpoint, started, response).await
    }

    /// Search for contacts.
    pub async fn search_people(&self, search: &PeopleSearch) -> Result<PeoplePage, ToolkitError> {
        let mut body = search.clone();
        body.per_page = body.per_page.min(MAX_PER_PAGE);

        let response: PeopleSearchResponse = self.post("mixed_people/search", &body).await?;
        Ok(PeoplePage {
            contacts: response.people.into_iter().map(Contact::from).collect(),
            total_entries: response.total_entries,
            page: response.page.unwrap_or(body.page),
            per_page: response.per_page.unwrap_or(body.per_page),
            num_pages: response.num_pages,
        })
    }

    /// Search for companies.
    pub async fn search_organizations(
        &self,
        search: &OrganizationSearch,
    ) -> Result<CompanyPage, ToolkitError> {
        let mut body = search.clone();
        body.per_page = body.per_page.min(MAX_PER_PAGE);

        let response: OrganizationSearchResponse =
            self.post("mixed_companies/search", &body).await?;
        Ok(CompanyPage {
            companies: response
                .organizations
                .into_iter()
                .map(Company::from)
                .collect(),
            total_entries: response.total_entries,
            page: response.page.unwrap_or(body.page),
            per_page: response.per_page.unwrap_or(body.per_page),
            num_pages: response.num_pages,
        })
    }

    /// Enrich a contact by email. `None` when Apollo has no match.
    pub async fn enrich_contact(&self, email: &str) -> Result<Option<Contact>, ToolkitError> {
        let body = serde_json::json!({ "email": email });
        let response: PersonEnvelope = self.post("people/match", &body).await?;
        Ok(response.person.map(Contact::from))
    }

    /// Enrich a company by domain. `None` when Apollo has no match.
    pub async fn enrich_company(&self, domain: &str) -> Result<Option<Company>, ToolkitError> {
        let body = serde_json::json!({ "domain": domain });
        let response: OrganizationEnvelope = self.post("organizations/enrich", &body).await?;
        Ok(response.organization.map(Company::from))
    }

    /// Full details for a known contact id.
    pub async fn contact_details(&self, contact_id: &str) -> Result<Option<Contact>, ToolkitError> {
        let response: PersonEnvelope = self.get(&format!("people/{contact_id}")).await?;
        Ok(response.person.map(Contact::from))
    }

    /// Find companies resembling the one at `domain`: same industry and size,
    /// overlapping technology stack (first three technologies).
    pub async fn find_similar_companies(
        &self,
        domain: &str,
        limit: usize,
    ) -> Result<SimilarCompanies, ToolkitError> {
        let reference =
            self.enrich_company(domain)
                .await?
                .ok_or_else(|| ToolkitError::NotFound {
                    service: SERVICE,
                    resource: domain.to_string(),
                })?;

        let mut search = OrganizationSearch::default().per_page(limit as u32);
        if let Some(industry) = &reference.industry {
            search = search.industries(vec![industry.clone()]);
        }
        if let Some(size) = &reference.size {
            search = search.size_ranges(vec![size.clone()]);
        }
        if !reference.technologies.is_empty() {
            search = search.technologies(reference.technologies.iter().take(3).cloned().collect());
        }

        let page = self.search_organizations(&search).await?;
        let mut companies: Vec<Company> = page
            .companies
            .into_iter()
            .filter(|company| company.domain.as_deref() != Some(domain))
            .collect();
        let total_found = companies.len();
        companies.truncate(limit);

        Ok(SimilarCompanies {
            reference,
            companies,
            total_found,
        })
    }
}

impl Toolkit for ApolloClient {
    fn name(&self) -> &str {
        SERVICE
    }

    fn description(&self) -> &str {
        "Lead enrichment, contact search, and company data from Apollo.io"
    }

    fn operations(&self) -> Vec<&'static str> {
        vec![
            "search_people",
            "search_organizations",
            "enrich_contact",
            "enrich_company",
            "contact_details",
            "find_similar_companies",
        ]
    }
}

#[derive(Debug, Deserialize)]
struct PeopleSearchResponse {
    #[serde(default)]
    people: Vec<RawPerson>,
    #[serde(default)]
    total_entries: u64,
    page: Option<u32>,
    per_page: Option<u32>,
    #[serde(default)]
    num_pages: u64,
}

#[derive(Debug, Deserialize)]
struct OrganizationSearchResponse {
    #[serde(default)]
    organizations: Vec<RawOrganization>,
    #[serde(default)]
    total_entries: u64,
    page: Option<u32>,
    per_page: Option<u32>,
    #[serde(default)]
    num_pages: u64,
}

#[derive(Debug, Deserialize)]
struct PersonEnvelope {
    person: Option<RawPerson>,
}

#[derive(Debug, Deserialize)]
struct OrganizationEnvelope {
    organization: Option<RawOrganization>,
}

#[derive(Debug, Deserialize)]
struct RawPerson {
    id: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    name: Option<String>,
    email: Option<String>,
    title: Option<String>,
    linkedin_url: Option<String>,
    phone: Option<String>,
    organization: Option<RawPersonOrganization>,
}

#[derive(Debug, Deserialize)]
struct RawPersonOrganization {
    name: Option<String>,
}

impl From<RawPerson> for Contact {
    fn from(raw: RawPerson) -> Self {
        Contact {
            id: raw.id,
            first_name: raw.first_name,
            last_name: raw.last_name,
            name: raw.name,
            email: raw.email,
            title: raw.title,
            company_name: raw.organization.and_then(|org| org.name),
            linkedin_url: raw.linkedin_url,
            phone: raw.phone,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawOrganization {
    id: Option<String>,
    name: Option<String>,
    primary_domain: Option<String>,
    primary_industry: Option<RawIndustry>,
    city: Option<String>,
    employee_count: Option<serde_json::Value>,
    estimated_annual_revenue: Option<serde_json::Value>,
    #[serde(default)]
    technologies: Vec<RawTechnology>,
}

#[derive(Debug, Deserialize)]
struct RawIndustry {
    industry: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTechnology {
    name: Option<String>,
}

/// Apollo returns numeric fields as either strings or numbers.
fn value_text(value: Option<serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl From<RawOrganization> for Company {
    fn from(raw: RawOrganization) -> Self {
        Company {
            id: raw.id,
            name: raw.name,
            domain: raw.primary_domain,
            industry: raw.primary_industry.and_then(|i| i.industry),
            size: value_text(raw.employee_count),
            location: raw.city,
            revenue: value_text(raw.estimated_annual_revenue),
            technologies: raw
                .technologies
                .into_iter()
                .filter_map(|tech| tech.name)
                .collect(),
        }
    }
}
