//! Core domain types for the data product catalog graph.
//!
//! A [`DataProduct`] is materialized as one root node plus a subgraph per
//! relation field. Every field belongs to exactly one storage category,
//! and each category has its own reconciliation rules on update:
//! - scalars live as properties on the root node
//! - string lists point at shared reference nodes, upserted by value
//! - single dicts own exactly one attribute node
//! - dict lists own one attribute node per item

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CatalogError;

// ── Identifiers ───────────────────────────────────────────────────

/// Identifier assigned to a data product's root node at creation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct EntityId(pub Uuid);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntityId {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ── Attribute Values ──────────────────────────────────────────────

/// A property value on an attribute node.
///
/// Deliberately closed: anything richer than a list of strings has to be
/// flattened by the caller before it reaches the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    StringList(Vec<String>),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Boolean(b) => write!(f, "{b}"),
            AttrValue::Integer(i) => write!(f, "{i}"),
            AttrValue::Float(x) => write!(f, "{x}"),
            AttrValue::String(s) => f.write_str(s),
            AttrValue::StringList(items) => write!(f, "[{}]", items.join(", ")),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::String(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::String(s)
    }
}

impl From<i64> for AttrValue {
    fn from(i: i64) -> Self {
        AttrValue::Integer(i)
    }
}

impl From<f64> for AttrValue {
    fn from(x: f64) -> Self {
        AttrValue::Float(x)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        AttrValue::Boolean(b)
    }
}

impl From<Vec<String>> for AttrValue {
    fn from(items: Vec<String>) -> Self {
        AttrValue::StringList(items)
    }
}

/// Key/value payload of an attribute node, ordered by key.
pub type Attributes = BTreeMap<String, AttrValue>;

/// Build an [`Attributes`] map from `(key, value)` pairs.
pub fn attributes<I, K, V>(pairs: I) -> Attributes
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<AttrValue>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

// ── Node Labels ───────────────────────────────────────────────────

/// Every node label the catalog writes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeLabel {
    DataProduct,
    Pipeline,
    ChangeLog,
    Tag,
    BusinessTerm,
    Glossary,
    KnownIssue,
    Documentation,
    Faq,
    Query,
    Table,
    PiiField,
    UpstreamSource,
    DownstreamTarget,
    Owner,
    Manager,
    Metrics,
    DataQuality,
    Classification,
    UsageStats,
    Team,
    AccessControl,
    Database,
    Schema,
    Steward,
    Consumer,
    Policy,
    Job,
    FieldLineage,
}

impl NodeLabel {
    /// The label as written to the graph.
    pub const fn as_str(self) -> &'static str {
        match self {
            NodeLabel::DataProduct => "DataProduct",
            NodeLabel::Pipeline => "Pipeline",
            NodeLabel::ChangeLog => "ChangeLog",
            NodeLabel::Tag => "Tag",
            NodeLabel::BusinessTerm => "BusinessTerm",
            NodeLabel::Glossary => "Glossary",
            NodeLabel::KnownIssue => "KnownIssue",
            NodeLabel::Documentation => "Documentation",
            NodeLabel::Faq => "FAQ",
            NodeLabel::Query => "Query",
            NodeLabel::Table => "Table",
            NodeLabel::PiiField => "PIIField",
            NodeLabel::UpstreamSource => "UpstreamSource",
            NodeLabel::DownstreamTarget => "DownstreamTarget",
            NodeLabel::Owner => "Owner",
            NodeLabel::Manager => "Manager",
            NodeLabel::Metrics => "Metrics",
            NodeLabel::DataQuality => "DataQuality",
            NodeLabel::Classification => "Classification",
            NodeLabel::UsageStats => "UsageStats",
            NodeLabel::Team => "Team",
            NodeLabel::AccessControl => "AccessControl",
            NodeLabel::Database => "Database",
            NodeLabel::Schema => "Schema",
            NodeLabel::Steward => "Steward",
            NodeLabel::Consumer => "Consumer",
            NodeLabel::Policy => "Policy",
            NodeLabel::Job => "Job",
            NodeLabel::FieldLineage => "FieldLineage",
        }
    }
}

impl fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Edge Kinds ────────────────────────────────────────────────────

/// Every relationship type the catalog writes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeKind {
    HasTag,
    HasTerm,
    GlossaryLink,
    HasIssue,
    HasDoc,
    HasFaq,
    HasQuery,
    UsesTable,
    HasPii,
    HasUpstream,
    HasDownstream,
    OwnedBy,
    ManagedBy,
    HasMetric,
    HasQuality,
    ClassifiedAs,
    HasUsage,
    PartOfTeam,
    HasAccessCtrl,
    StoredIn,
    HasSchema,
    StewardedBy,
    ConsumedBy,
    HasPolicy,
    HasPipeline,
    HasJob,
    HasFieldLineage,
    Triggers,
    Produces,
    FeedsInto,
    HasChangeLog,
}

impl EdgeKind {
    /// The Cypher relationship type.
    pub const fn as_cypher(self) -> &'static str {
        match self {
            EdgeKind::HasTag => "HAS_TAG",
            EdgeKind::HasTerm => "HAS_TERM",
            EdgeKind::GlossaryLink => "GLOSSARY_LINK",
            EdgeKind::HasIssue => "HAS_ISSUE",
            EdgeKind::HasDoc => "HAS_DOC",
            EdgeKind::HasFaq => "HAS_FAQ",
            EdgeKind::HasQuery => "HAS_QUERY",
            EdgeKind::UsesTable => "USES_TABLE",
            EdgeKind::HasPii => "HAS_PII",
            EdgeKind::HasUpstream => "HAS_UPSTREAM",
            EdgeKind::HasDownstream => "HAS_DOWNSTREAM",
            EdgeKind::OwnedBy => "OWNED_BY",
            EdgeKind::ManagedBy => "MANAGED_BY",
            EdgeKind::HasMetric => "HAS_METRIC",
            EdgeKind::HasQuality => "HAS_QUALITY",
            EdgeKind::ClassifiedAs => "CLASSIFIED_AS",
            EdgeKind::HasUsage => "HAS_USAGE",
            EdgeKind::PartOfTeam => "PART_OF_TEAM",
            EdgeKind::HasAccessCtrl => "HAS_ACCESS_CTRL",
            EdgeKind::StoredIn => "STORED_IN",
            EdgeKind::HasSchema => "HAS_SCHEMA",
            EdgeKind::StewardedBy => "STEWARDED_BY",
            EdgeKind::ConsumedBy => "CONSUMED_BY",
            EdgeKind::HasPolicy => "HAS_POLICY",
            EdgeKind::HasPipeline => "HAS_PIPELINE",
            EdgeKind::HasJob => "HAS_JOB",
            EdgeKind::HasFieldLineage => "HAS_FIELD_LINEAGE",
            EdgeKind::Triggers => "TRIGGERS",
            EdgeKind::Produces => "PRODUCES",
            EdgeKind::FeedsInto => "FEEDS_INTO",
            EdgeKind::HasChangeLog => "HAS_CHANGE_LOG",
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_cypher())
    }
}

// ── Field Catalogue ───────────────────────────────────────────────

/// Scalar fields, stored as properties on the root node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarField {
    Name,
    ProductType,
    Description,
    ShortDescription,
    Source,
    Destination,
    Domain,
    Subdomain,
    Environment,
    Schedule,
}

impl ScalarField {
    pub const ALL: [ScalarField; 10] = [
        ScalarField::Name,
        ScalarField::ProductType,
        ScalarField::Description,
        ScalarField::ShortDescription,
        ScalarField::Source,
        ScalarField::Destination,
        ScalarField::Domain,
        ScalarField::Subdomain,
        ScalarField::Environment,
        ScalarField::Schedule,
    ];

    /// Property key on the root node.
    pub const fn key(self) -> &'static str {
        match self {
            ScalarField::Name => "name",
            ScalarField::ProductType => "type",
            ScalarField::Description => "description",
            ScalarField::ShortDescription => "short_description",
            ScalarField::Source => "source",
            ScalarField::Destination => "destination",
            ScalarField::Domain => "domain",
            ScalarField::Subdomain => "subdomain",
            ScalarField::Environment => "environment",
            ScalarField::Schedule => "schedule",
        }
    }
}

/// String-list fields, materialized as shared reference nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListField {
    Tags,
    BusinessTerms,
    GlossaryLinks,
    KnownIssues,
    DocumentationLinks,
    Faqs,
    SampleQueries,
    Tables,
    PiiFields,
    UpstreamSources,
    DownstreamTargets,
}

impl ListField {
    pub const ALL: [ListField; 11] = [
        ListField::Tags,
        ListField::BusinessTerms,
        ListField::GlossaryLinks,
        ListField::KnownIssues,
        ListField::DocumentationLinks,
        ListField::Faqs,
        ListField::SampleQueries,
        ListField::Tables,
        ListField::PiiFields,
        ListField::UpstreamSources,
        ListField::DownstreamTargets,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            ListField::Tags => "tags",
            ListField::BusinessTerms => "business_terms",
            ListField::GlossaryLinks => "glossary_links",
            ListField::KnownIssues => "known_issues",
            ListField::DocumentationLinks => "documentation_links",
            ListField::Faqs => "faqs",
            ListField::SampleQueries => "sample_queries",
            ListField::Tables => "tables",
            ListField::PiiFields => "pii_fields",
            ListField::UpstreamSources => "upstream_sources",
            ListField::DownstreamTargets => "downstream_targets",
        }
    }

    pub const fn label(self) -> NodeLabel {
        match self {
            ListField::Tags => NodeLabel::Tag,
            ListField::BusinessTerms => NodeLabel::BusinessTerm,
            ListField::GlossaryLinks => NodeLabel::Glossary,
            ListField::KnownIssues => NodeLabel::KnownIssue,
            ListField::DocumentationLinks => NodeLabel::Documentation,
            ListField::Faqs => NodeLabel::Faq,
            ListField::SampleQueries => NodeLabel::Query,
            ListField::Tables => NodeLabel::Table,
            ListField::PiiFields => NodeLabel::PiiField,
            ListField::UpstreamSources => NodeLabel::UpstreamSource,
            ListField::DownstreamTargets => NodeLabel::DownstreamTarget,
        }
    }

    pub const fn edge(self) -> EdgeKind {
        match self {
            ListField::Tags => EdgeKind::HasTag,
            ListField::BusinessTerms => EdgeKind::HasTerm,
            ListField::GlossaryLinks => EdgeKind::GlossaryLink,
            ListField::KnownIssues => EdgeKind::HasIssue,
            ListField::DocumentationLinks => EdgeKind::HasDoc,
            ListField::Faqs => EdgeKind::HasFaq,
            ListField::SampleQueries => EdgeKind::HasQuery,
            ListField::Tables => EdgeKind::UsesTable,
            ListField::PiiFields => EdgeKind::HasPii,
            ListField::UpstreamSources => EdgeKind::HasUpstream,
            ListField::DownstreamTargets => EdgeKind::HasDownstream,
        }
    }
}

/// Single-dict fields: at most one attribute node per entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DictField {
    Owner,
    Manager,
    Metrics,
    DataQuality,
    DataClassification,
    UsageStats,
    Team,
    AccessControls,
    Database,
    Schema,
}

impl DictField {
    pub const ALL: [DictField; 10] = [
        DictField::Owner,
        DictField::Manager,
        DictField::Metrics,
        DictField::DataQuality,
        DictField::DataClassification,
        DictField::UsageStats,
        DictField::Team,
        DictField::AccessControls,
        DictField::Database,
        DictField::Schema,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            DictField::Owner => "owner",
            DictField::Manager => "manager",
            DictField::Metrics => "metrics",
            DictField::DataQuality => "data_quality",
            DictField::DataClassification => "data_classification",
            DictField::UsageStats => "usage_stats",
            DictField::Team => "team",
            DictField::AccessControls => "access_controls",
            DictField::Database => "database",
            DictField::Schema => "schema",
        }
    }

    pub const fn label(self) -> NodeLabel {
        match self {
            DictField::Owner => NodeLabel::Owner,
            DictField::Manager => NodeLabel::Manager,
            DictField::Metrics => NodeLabel::Metrics,
            DictField::DataQuality => NodeLabel::DataQuality,
            DictField::DataClassification => NodeLabel::Classification,
            DictField::UsageStats => NodeLabel::UsageStats,
            DictField::Team => NodeLabel::Team,
            DictField::AccessControls => NodeLabel::AccessControl,
            DictField::Database => NodeLabel::Database,
            DictField::Schema => NodeLabel::Schema,
        }
    }

    pub const fn edge(self) -> EdgeKind {
        match self {
            DictField::Owner => EdgeKind::OwnedBy,
            DictField::Manager => EdgeKind::ManagedBy,
            DictField::Metrics => EdgeKind::HasMetric,
            DictField::DataQuality => EdgeKind::HasQuality,
            DictField::DataClassification => EdgeKind::ClassifiedAs,
            DictField::UsageStats => EdgeKind::HasUsage,
            DictField::Team => EdgeKind::PartOfTeam,
            DictField::AccessControls => EdgeKind::HasAccessCtrl,
            DictField::Database => EdgeKind::StoredIn,
            DictField::Schema => EdgeKind::HasSchema,
        }
    }
}

/// Dict-list fields: one attribute node per item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DictListField {
    Stewards,
    Consumers,
    Policies,
    Pipelines,
    Jobs,
    FieldLineage,
}

impl DictListField {
    pub const ALL: [DictListField; 6] = [
        DictListField::Stewards,
        DictListField::Consumers,
        DictListField::Policies,
        DictListField::Pipelines,
        DictListField::Jobs,
        DictListField::FieldLineage,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            DictListField::Stewards => "stewards",
            DictListField::Consumers => "consumers",
            DictListField::Policies => "policies",
            DictListField::Pipelines => "pipelines",
            DictListField::Jobs => "jobs",
            DictListField::FieldLineage => "field_lineage",
        }
    }

    pub const fn label(self) -> NodeLabel {
        match self {
            DictListField::Stewards => NodeLabel::Steward,
            DictListField::Consumers => NodeLabel::Consumer,
            DictListField::Policies => NodeLabel::Policy,
            DictListField::Pipelines => NodeLabel::Pipeline,
            DictListField::Jobs => NodeLabel::Job,
            DictListField::FieldLineage => NodeLabel::FieldLineage,
        }
    }

    pub const fn edge(self) -> EdgeKind {
        match self {
            DictListField::Stewards => EdgeKind::StewardedBy,
            DictListField::Consumers => EdgeKind::ConsumedBy,
            DictListField::Policies => EdgeKind::HasPolicy,
            DictListField::Pipelines => EdgeKind::HasPipeline,
            DictListField::Jobs => EdgeKind::HasJob,
            DictListField::FieldLineage => EdgeKind::HasFieldLineage,
        }
    }
}

// ── Data Product ──────────────────────────────────────────────────

/// A data product as presented by a caller.
///
/// `None` means the field is absent: create skips it and update leaves the
/// stored relation untouched. `Some` with an empty collection means
/// "replace with nothing".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataProduct {
    pub id: Option<EntityId>,

    // Scalars
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub product_type: Option<String>,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub source: Option<String>,
    pub destination: Option<String>,
    pub domain: Option<String>,
    pub subdomain: Option<String>,
    pub environment: Option<String>,
    pub schedule: Option<String>,

    // Discovery and documentation
    pub tags: Option<Vec<String>>,
    pub business_terms: Option<Vec<String>>,
    pub glossary_links: Option<Vec<String>>,
    pub known_issues: Option<Vec<String>>,
    pub documentation_links: Option<Vec<String>>,
    pub faqs: Option<Vec<String>>,
    pub sample_queries: Option<Vec<String>>,
    pub tables: Option<Vec<String>>,
    pub pii_fields: Option<Vec<String>>,
    pub upstream_sources: Option<Vec<String>>,
    pub downstream_targets: Option<Vec<String>>,

    // Ownership, quality, and infrastructure
    pub owner: Option<Attributes>,
    pub manager: Option<Attributes>,
    pub metrics: Option<Attributes>,
    pub data_quality: Option<Attributes>,
    pub data_classification: Option<Attributes>,
    pub usage_stats: Option<Attributes>,
    pub team: Option<Attributes>,
    pub access_controls: Option<Attributes>,
    pub database: Option<Attributes>,
    pub schema: Option<Attributes>,

    // People, policy, and lineage
    pub stewards: Option<Vec<Attributes>>,
    pub consumers: Option<Vec<Attributes>>,
    pub policies: Option<Vec<Attributes>>,
    pub pipelines: Option<Vec<Attributes>>,
    pub jobs: Option<Vec<Attributes>>,
    pub field_lineage: Option<Vec<Attributes>>,
}

impl DataProduct {
    /// A data product with only a name set.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// A scalar counts as present only when it is set and non-empty.
    pub fn scalar(&self, field: ScalarField) -> Option<&str> {
        let value = match field {
            ScalarField::Name => &self.name,
            ScalarField::ProductType => &self.product_type,
            ScalarField::Description => &self.description,
            ScalarField::ShortDescription => &self.short_description,
            ScalarField::Source => &self.source,
            ScalarField::Destination => &self.destination,
            ScalarField::Domain => &self.domain,
            ScalarField::Subdomain => &self.subdomain,
            ScalarField::Environment => &self.environment,
            ScalarField::Schedule => &self.schedule,
        };
        value.as_deref().filter(|v| !v.is_empty())
    }

    /// All present scalar fields keyed by their property name.
    pub fn scalar_properties(&self) -> Attributes {
        ScalarField::ALL
            .iter()
            .filter_map(|f| self.scalar(*f).map(|v| (f.key().to_string(), AttrValue::from(v))))
            .collect()
    }

    pub fn string_list(&self, field: ListField) -> Option<&[String]> {
        let value = match field {
            ListField::Tags => &self.tags,
            ListField::BusinessTerms => &self.business_terms,
            ListField::GlossaryLinks => &self.glossary_links,
            ListField::KnownIssues => &self.known_issues,
            ListField::DocumentationLinks => &self.documentation_links,
            ListField::Faqs => &self.faqs,
            ListField::SampleQueries => &self.sample_queries,
            ListField::Tables => &self.tables,
            ListField::PiiFields => &self.pii_fields,
            ListField::UpstreamSources => &self.upstream_sources,
            ListField::DownstreamTargets => &self.downstream_targets,
        };
        value.as_deref()
    }

    pub fn dict(&self, field: DictField) -> Option<&Attributes> {
        let value = match field {
            DictField::Owner => &self.owner,
            DictField::Manager => &self.manager,
            DictField::Metrics => &self.metrics,
            DictField::DataQuality => &self.data_quality,
            DictField::DataClassification => &self.data_classification,
            DictField::UsageStats => &self.usage_stats,
            DictField::Team => &self.team,
            DictField::AccessControls => &self.access_controls,
            DictField::Database => &self.database,
            DictField::Schema => &self.schema,
        };
        value.as_ref()
    }

    pub fn dict_list(&self, field: DictListField) -> Option<&[Attributes]> {
        let value = match field {
            DictListField::Stewards => &self.stewards,
            DictListField::Consumers => &self.consumers,
            DictListField::Policies => &self.policies,
            DictListField::Pipelines => &self.pipelines,
            DictListField::Jobs => &self.jobs,
            DictListField::FieldLineage => &self.field_lineage,
        };
        value.as_deref()
    }
}
