//! # Leadflow Toolkits
//!
//! Typed clients for the third-party marketing APIs:
//!
//! - [`ApolloClient`] - lead and company search plus enrichment (Apollo.io)
//! - [`HubSpotClient`] - CRM contacts, deals, and analytics (HubSpot)
//! - [`BuiltWithClient`] - technology stack analysis (BuiltWith)
//!
//! All clients pace their requests through a [`RateLimiter`], surface
//! failures as `ToolkitError`, and log every call with service, endpoint,
//! status, and duration.

pub mod apollo;
pub mod builtwith;
pub mod hubspot;
pub mod limiter;

pub use apollo::{
    ApolloClient, Company, CompanyPage, Contact, OrganizationSearch, PeoplePage, PeopleSearch,
    SimilarCompanies,
};
pub use builtwith::{
    BuiltWithClient, CompetitorAnalysis, CompetitorProfile, MarketShare, StackComparison,
    TechProfile, Technology, TechnologyTrends, TechnologyUser, TrendPoint,
};
pub use hubspot::{
    ContactAnalytics, DealPipeline, HubSpotClient, HubSpotCompany, HubSpotContact, HubSpotDeal,
    NewContact, NewDeal, PipelineStage,
};
pub use limiter::RateLimiter;
