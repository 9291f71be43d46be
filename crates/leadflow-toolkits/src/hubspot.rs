//! HubSpot CRM client: contacts, companies, deals, and analytics.

use std::collections::HashMap;
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;

use leadflow_core::{Settings, Toolkit, ToolkitError};

use crate::limiter::RateLimiter;

const SERVICE: &str = "hubspot";
const DEFAULT_BASE_URL: &str = "https://api.hubapi.com";

/// HubSpot caps search page sizes at 100.
const MAX_LIMIT: u32 = 100;

const CONTACT_PROPERTIES: &[&str] = &[
    "email",
    "firstname",
    "lastname",
    "company",
    "jobtitle",
    "phone",
    "website",
    "lifecyclestage",
    "lead_status",
];

const COMPANY_PROPERTIES: &[&str] = &[
    "name",
    "domain",
    "industry",
    "city",
    "state",
    "country",
    "numberofemployees",
    "annualrevenue",
];

/// A CRM contact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubSpotContact {
    pub id: Option<String>,
    pub email: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub company: Option<String>,
    pub jobtitle: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub lifecyclestage: Option<String>,
    pub lead_status: Option<String>,
}

/// A CRM company.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubSpotCompany {
    pub id: Option<String>,
    pub name: Option<String>,
    pub domain: Option<String>,
    pub industry: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub numberofemployees: Option<i64>,
    pub annualrevenue: Option<f64>,
}

/// A CRM deal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubSpotDeal {
    pub id: Option<String>,
    pub dealname: Option<String>,
    pub amount: Option<f64>,
    pub dealstage: Option<String>,
    pub pipeline: Option<String>,
    pub closedate: Option<String>,
}

/// Fields for a new contact. Email is the only required property.
#[derive(Debug, Clone, Default)]
pub struct NewContact {
    pub email: String,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub company: Option<String>,
    pub jobtitle: Option<String>,
    pub phone: Option<String>,
    pub additional_properties: HashMap<String, String>,
}

impl NewContact {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            ..Self::default()
        }
    }

    fn into_properties(self) -> HashMap<String, String> {
        let mut properties = self.additional_properties;
        properties.insert("email".to_string(), self.email);
        if let Some(v) = self.firstname {
            properties.insert("firstname".to_string(), v);
        }
        if let Some(v) = self.lastname {
            properties.insert("lastname".to_string(), v);
        }
        if let Some(v) = self.company {
            properties.insert("company".to_string(), v);
        }
        if let Some(v) = self.jobtitle {
            properties.insert("jobtitle".to_string(), v);
        }
        if let Some(v) = self.phone {
            properties.insert("phone".to_string(), v);
        }
        properties
    }
}

/// Fields for a new deal, with optional contact/company associations.
#[derive(Debug, Clone, Default)]
pub struct NewDeal {
    pub dealname: String,
    pub amount: f64,
    pub dealstage: String,
    pub contact_id: Option<String>,
    pub company_id: Option<String>,
    pub closedate: Option<String>,
    pub additional_properties: HashMap<String, String>,
}

/// One deal pipeline with its ordered stages.
#[derive(Debug, Clone)]
pub struct DealPipeline {
    pub id: Option<String>,
    pub label: Option<String>,
    pub stages: Vec<PipelineStage>,
}

#[derive(Debug, Clone)]
pub struct PipelineStage {
    pub id: Option<String>,
    pub label: Option<String>,
    pub display_order: Option<i64>,
    pub probability: Option<String>,
}

/// Aggregated contact metrics over the most recent contacts.
#[derive(Debug, Clone)]
pub struct ContactAnalytics {
    pub total_contacts: usize,
    pub lifecycle_stages: HashMap<String, usize>,
    pub lead_statuses: HashMap<String, usize>,
}

/// HubSpot CRM API client.
pub struct HubSpotClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    limiter: RateLimiter,
}

impl HubSpotClient {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: settings.marketing_apis.hubspot_api_key.clone(),
            limiter: RateLimiter::per_minute(settings.marketing_apis.hubspot_rate_limit),
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

    async fn request<B: Serialize, R: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        endpoint: &str,
        body: Option<&B>,
    ) -> Result<R, ToolkitError> {
        let key = self.key()?;
        self.limiter.wait().await;

        let mut request = self
            .http
            .request(method, format!("{}/{}", self.base_url, endpoint))
            .bearer_auth(key);
        if let Some(body) = body {
            request = request.json(body);
        }

        let started = Instant::now();
        let response = request
            .send()
            .await
            .map_err(|e| ToolkitError::RequestFailed {
                service: SERVICE,
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;
        Self::decode(endpoint, started, response).await
    }

    /// Search contacts by email (exact), company (token match), or a general
    /// query matched against email.
    pub async fn search_contacts(
        &self,
        query: Option<&str>,
        email: Option<&str>,
        company: Option<&str>,
        limit: u32,
    ) -> Result<Vec<HubSpotContact>, ToolkitError> {
        let mut filters = Vec::new();
        if let Some(email) = email {
            filters.push(SearchFilter::eq("email", email));
        }
        if let Some(company) = company {
            filters.push(SearchFilter::contains_token("company", company));
        }
        if let Some(query) = query {
            filters.push(SearchFilter::contains_token("email", query));
        }

        let body = SearchRequest {
            limit: limit.min(MAX_LIMIT),
            properties: CONTACT_PROPERTIES.iter().map(|p| p.to_string()).collect(),
            filter_groups: if filters.is_empty() {
                None
            } else {
                Some(vec![FilterGroup { filters }])
            },
            sorts: None,
        };

        let response: SearchResponse = self
            .request(
                reqwest::Method::POST,
                "crm/v3/objects/contacts/search",
                Some(&body),
            )
            .await?;
        Ok(response
            .results
            .into_iter()
            .map(contact_from_record)
            .collect())
    }

    /// Create a contact. Returns it as stored, including the assigned id.
    pub async fn create_contact(
        &self,
        contact: NewContact,
    ) -> Result<HubSpotContact, ToolkitError> {
        let body = serde_json::json!({ "properties": contact.into_properties() });
        let record: ObjectRecord = self
            .request(reqwest::Method::POST, "crm/v3/objects/contacts", Some(&body))
            .await?;
        Ok(contact_from_record(record))
    }

    /// Update properties on an existing contact.
    pub async fn update_contact(
        &self,
        contact_id: &str,
        properties: HashMap<String, String>,
    ) -> Result<HubSpotContact, ToolkitError> {
        let body = serde_json::json!({ "properties": properties });
        let record: ObjectRecord = self
            .request(
                reqwest::Method::PATCH,
                &format!("crm/v3/objects/contacts/{contact_id}"),
                Some(&body),
            )
            .await?;
        Ok(contact_from_record(record))
    }

    /// Create a deal, associating it with a contact and/or company.
    pub async fn create_deal(&self, deal: NewDeal) -> Result<HubSpotDeal, ToolkitError> {
        let mut properties = deal.additional_properties.clone();
        properties.insert("dealname".to_string(), deal.dealname.clone());
        properties.insert("amount".to_string(), deal.amount.to_string());
        properties.insert("dealstage".to_string(), deal.dealstage.clone());
        if let Some(closedate) = &deal.closedate {
            properties.insert("closedate".to_string(), closedate.clone());
        }

        let mut body = serde_json::json!({ "properties": properties });
        let mut associations = Vec::new();
        if let Some(contact_id) = &deal.contact_id {
            associations.push(association(contact_id, 3));
        }
        if let Some(company_id) = &deal.company_id {
            associations.push(association(company_id, 5));
        }
        if !associations.is_empty() {
            body["associations"] = serde_json::Value::Array(associations);
        }

        let record: ObjectRecord = self
            .request(reqwest::Method::POST, "crm/v3/objects/deals", Some(&body))
            .await?;
        Ok(deal_from_record(record))
    }

    /// All deal pipelines with their stages.
    pub async fn deal_pipelines(&self) -> Result<Vec<DealPipeline>, ToolkitError> {
        let response: PipelinesResponse = self
            .request::<(), _>(reqwest::Method::GET, "crm/v3/pipelines/deals", None)
            .await?;
        Ok(response
            .results
            .into_iter()
            .map(|pipeline| DealPipeline {
                id: pipeline.id,
                label: pipeline.label,
                stages: pipeline
                    .stages
                    .into_iter()
                    .map(|stage| PipelineStage {
                        id: stage.id,
                        label: stage.label,
                        display_order: stage.display_order,
                        probability: stage.metadata.and_then(|m| m.probability),
                    })
                    .collect(),
            })
            .collect())
    }

    /// Search companies by domain (exact), industry (token match), or a
    /// general query matched against the company name.
    pub async fn search_companies(
        &self,
        query: Option<&str>,
        domain: Option<&str>,
        industry: Option<&str>,
        limit: u32,
    ) -> Result<Vec<HubSpotCompany>, ToolkitError> {
        let mut filters = Vec::new();
        if let Some(domain) = domain {
            filters.push(SearchFilter::eq("domain", domain));
        }
        if let Some(industry) = industry {
            filters.push(SearchFilter::contains_token("industry", industry));
        }
        if let Some(query) = query {
            filters.push(SearchFilter::contains_token("name", query));
        }

        let body = SearchRequest {
            limit: limit.min(MAX_LIMIT),
            properties: COMPANY_PROPERTIES.iter().map(|p| p.to_string()).collect(),
            filter_groups: if filters.is_empty() {
                None
            } else {
                Some(vec![FilterGroup { filters }])
            },
            sorts: None,
        };

        let response: SearchResponse = self
            .request(
                reqwest::Method::POST,
                "crm/v3/objects/companies/search",
                Some(&body),
            )
            .await?;
        Ok(response
            .results
            .into_iter()
            .map(company_from_record)
            .collect())
    }

    /// Lifecycle-stage and lead-status counts over the 100 most recently
    /// created contacts.
    pub async fn contact_analytics(&self) -> Result<ContactAnalytics, ToolkitError> {
        let body = SearchRequest {
            limit: MAX_LIMIT,
            properties: vec![
                "email".to_string(),
                "lifecyclestage".to_string(),
                "lead_status".to_string(),
                "createdate".to_string(),
            ],
            filter_groups: None,
            sorts: Some(vec![SearchSort {
                property_name: "createdate".to_string(),
                direction: "DESCENDING".to_string(),
            }]),
        };

        let response: SearchResponse = self
            .request(
                reqwest::Method::POST,
                "crm/v3/objects/contacts/search",
                Some(&body),
            )
            .await?;

        let mut lifecycle_stages: HashMap<String, usize> = HashMap::new();
        let mut lead_statuses: HashMap<String, usize> = HashMap::new();
        for record in &response.results {
            let stage = record
                .properties
                .get("lifecyclestage")
                .and_then(|v| v.as_deref())
                .unwrap_or("Unknown");
            *lifecycle_stages.entry(stage.to_string()).or_default() += 1;

            let status = record
                .properties
                .get("lead_status")
                .and_then(|v| v.as_deref())
                .unwrap_or("Unknown");
            *lead_statuses.entry(status.to_string()).or_default() += 1;
        }

        Ok(ContactAnalytics {
            total_contacts: response.results.len(),
            lifecycle_stages,
            lead_statuses,
        })
    }
}

impl Toolkit for HubSpotClient {
    fn name(&self) -> &str {
        SERVICE
    }

    fn description(&self) -> &str {
        "CRM contacts, companies, deals, and analytics from HubSpot"
    }

    fn operations(&self) -> Vec<&'static str> {
        vec![
            "search_contacts",
            "create_contact",
            "update_contact",
            "create_deal",
            "deal_pipelines",
            "search_companies",
            "contact_analytics",
        ]
    }
}

fn association(id: &str, type_id: u32) -> serde_json::Value {
    serde_json::json!({
        "to": { "id": id },
        "types": [{
            "associationCategory": "HUBSPOT_DEFINED",
            "associationTypeId": type_id
        }]
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest {
    limit: u32,
    properties: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter_groups: Option<Vec<FilterGroup>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sorts: Option<Vec<SearchSort>>,
}

#[derive(Debug, Serialize)]
struct FilterGroup {
    filters: Vec<SearchFilter>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchFilter {
    property_name: String,
    operator: &'static str,
    value: String,
}

impl SearchFilter {
    fn eq(property: &str, value: &str) -> Self {
        Self {
            property_name: property.to_string(),
            operator: "EQ",
            value: value.to_string(),
        }
    }

    fn contains_token(property: &str, value: &str) -> Self {
        Self {
            property_name: property.to_string(),
            operator: "CONTAINS_TOKEN",
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchSort {
    property_name: String,
    direction: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<ObjectRecord>,
}

/// Generic CRM object: id plus a bag of string properties. HubSpot returns
/// every property value as a string or null.
#[derive(Debug, Deserialize)]
struct ObjectRecord {
    id: Option<String>,
    #[serde(default)]
    properties: HashMap<String, Option<String>>,
}

impl ObjectRecord {
    fn take(&mut self, property: &str) -> Option<String> {
        self.properties.remove(property).flatten()
    }
}

fn contact_from_record(mut record: ObjectRecord) -> HubSpotContact {
    HubSpotContact {
        email: record.take("email"),
        firstname: record.take("firstname"),
        lastname: record.take("lastname"),
        company: record.take("company"),
        jobtitle: record.take("jobtitle"),
        phone: record.take("phone"),
        website: record.take("website"),
        lifecyclestage: record.take("lifecyclestage"),
        lead_status: record.take("lead_status"),
        id: record.id,
    }
}

fn company_from_record(mut record: ObjectRecord) -> HubSpotCompany {
    HubSpotCompany {
        name: record.take("name"),
        domain: record.take("domain"),
        industry: record.take("industry"),
        city: record.take("city"),
        state: record.take("state"),
        country: record.take("country"),
        numberofemployees: record
            .take("numberofemployees")
            .and_then(|v| v.parse().ok()),
        annualrevenue: record.take("annualrevenue").and_then(|v| v.parse().ok()),
        id: record.id,
    }
}

fn deal_from_record(mut record: ObjectRecord) -> HubSpotDeal {
    HubSpotDeal {
        dealname: record.take("dealname"),
        amount: record.take("amount").and_then(|v| v.parse().ok()),
        dealstage: record.take("dealstage"),
        pipeline: record.take("pipeline"),
        closedate: record.take("closedate"),
        id: record.id,
    }
}

#[derive(Debug, Deserialize)]
struct PipelinesResponse {
    #[serde(default)]
    results: Vec<RawPipeline>,
}

#[derive(Debug, Deserialize)]
struct RawPipeline {
    id: Option<String>,
    label: Option<String>,
    #[serde(default)]
    stages: Vec<RawStage>,
}

#[derive(Debug, Deserialize)]
struct RawStage {
    id: Option<String>,
    label: Option<String>,
    #[serde(rename = "displayOrder")]
    display_order: Option<i64>,
    metadata: Option<RawStageMetadata>,
}

#[derive(Debug, Deserialize)]
struct RawStageMetadata {
    probability: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base_url: &str) -> HubSpotClient {
        let mut settings = Settings::default();
        settings.marketing_apis.hubspot_api_key = Some("test-token".to_string());
        settings.marketing_apis.hubspot_rate_limit = 60_000;
        HubSpotClient::from_settings(&settings).with_base_url(base_url)
    }

    #[tokio::test]
    async fn missing_api_key_fails_before_any_request() {
        let client = HubSpotClient::from_settings(&Settings::default());
        let err = client.deal_pipelines().await.unwrap_err();
        assert!(matches!(err, ToolkitError::MissingApiKey { service: "hubspot" }));
    }

    #[tokio::test]
    async fn contact_search_builds_filter_groups() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/crm/v3/objects/contacts/search"))
            .and(header("Authorization", "Bearer test-token"))
            .and(body_partial_json(serde_json::json!({
                "filterGroups": [{
                    "filters": [
                        {"propertyName": "email", "operator": "EQ", "value": "ada@example.com"},
                        {"propertyName": "company", "operator": "CONTAINS_TOKEN", "value": "Example"}
                    ]
                }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [{
                    "id": "101",
                    "properties": {
                        "email": "ada@example.com",
                        "firstname": "Ada",
                        "lifecyclestage": "lead",
                        "lead_status": null
                    }
                }],
                "total": 1
            })))
            .expect(1)
            .mount(&server)
            .await;

        let contacts = client(&server.uri())
            .search_contacts(None, Some("ada@example.com"), Some("Example"), 10)
            .await
            .unwrap();

        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].id.as_deref(), Some("101"));
        assert_eq!(contacts[0].firstname.as_deref(), Some("Ada"));
        assert!(contacts[0].lead_status.is_none());
    }

    #[tokio::test]
    async fn create_deal_attaches_associations() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/crm/v3/objects/deals"))
            .and(body_partial_json(serde_json::json!({
                "properties": {"dealname": "Pilot", "amount": "5000", "dealstage": "appointmentscheduled"},
                "associations": [
                    {"to": {"id": "c-1"}, "types": [{"associationCategory": "HUBSPOT_DEFINED", "associationTypeId": 3}]},
                    {"to": {"id": "co-9"}, "types": [{"associationCategory": "HUBSPOT_DEFINED", "associationTypeId": 5}]}
                ]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "d-7",
                "properties": {"dealname": "Pilot", "amount": "5000", "dealstage": "appointmentscheduled"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let deal = client(&server.uri())
            .create_deal(NewDeal {
                dealname: "Pilot".to_string(),
                amount: 5000.0,
                dealstage: "appointmentscheduled".to_string(),
                contact_id: Some("c-1".to_string()),
                company_id: Some("co-9".to_string()),
                ..NewDeal::default()
            })
            .await
            .unwrap();

        assert_eq!(deal.id.as_deref(), Some("d-7"));
        assert_eq!(deal.amount, Some(5000.0));
    }

    #[tokio::test]
    async fn pipelines_expose_stage_order_and_probability() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/crm/v3/pipelines/deals"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [{
                    "id": "default",
                    "label": "Sales Pipeline",
                    "stages": [
                        {"id": "s1", "label": "Qualified", "displayOrder": 0,
                         "metadata": {"probability": "0.2"}},
                        {"id": "s2", "label": "Closed Won", "displayOrder": 1,
                         "metadata": {"probability": "1.0"}}
                    ]
                }]
            })))
            .mount(&server)
            .await;

        let pipelines = client(&server.uri()).deal_pipelines().await.unwrap();
        assert_eq!(pipelines.len(), 1);
        assert_eq!(pipelines[0].stages.len(), 2);
        assert_eq!(pipelines[0].stages[1].probability.as_deref(), Some("1.0"));
    }

    #[tokio::test]
    async fn analytics_aggregate_stage_and_status_counts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/crm/v3/objects/contacts/search"))
            .and(body_partial_json(serde_json::json!({
                "sorts": [{"propertyName": "createdate", "direction": "DESCENDING"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    {"id": "1", "properties": {"lifecyclestage": "lead", "lead_status": "NEW"}},
                    {"id": "2", "properties": {"lifecyclestage": "lead", "lead_status": "OPEN"}},
                    {"id": "3", "properties": {"lifecyclestage": "customer"}}
                ]
            })))
            .mount(&server)
            .await;

        let analytics = client(&server.uri()).contact_analytics().await.unwrap();
        assert_eq!(analytics.total_contacts, 3);
        assert_eq!(analytics.lifecycle_stages.get("lead"), Some(&2));
        assert_eq!(analytics.lifecycle_stages.get("customer"), Some(&1));
        assert_eq!(analytics.lead_statuses.get("Unknown"), Some(&1));
    }
}
