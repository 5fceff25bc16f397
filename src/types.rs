use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

macro_rules! resource_types {
    ($($name:ident),+ $(,)?) => {
        /// Resource types the viewer knows how to address.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum ResourceType {
            $($name),+
        }

        impl ResourceType {
            pub const ALL: &'static [ResourceType] = &[$(ResourceType::$name),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(ResourceType::$name => stringify!($name)),+
                }
            }
        }

        impl FromStr for ResourceType {
            type Err = UnknownResourceType;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $(stringify!($name) => Ok(ResourceType::$name),)+
                    other => Err(UnknownResourceType(other.to_string())),
                }
            }
        }
    };
}

resource_types! {
    Patient,
    Practitioner,
    Organization,
    Observation,
    Condition,
    Medication,
    MedicationRequest,
    Encounter,
    AllergyIntolerance,
    Procedure,
    Immunization,
    DiagnosticReport,
    CarePlan,
    Goal,
    ServiceRequest,
    Device,
    DocumentReference,
    FamilyMemberHistory,
    Location,
    RelatedPerson,
    Schedule,
    Slot,
    Appointment,
    AppointmentResponse,
    Coverage,
    CoverageEligibilityRequest,
    CoverageEligibilityResponse,
    Claim,
    ClaimResponse,
    ExplanationOfBenefit,
    MedicationDispense,
    MedicationStatement,
    ImagingStudy,
    Communication,
    CommunicationRequest,
    Consent,
    DetectedIssue,
    Group,
    List,
    Questionnaire,
    QuestionnaireResponse,
    RiskAssessment,
    HealthcareService,
    PractitionerRole,
    Bundle,
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown resource type {0:?}")]
pub struct UnknownResourceType(pub String);

/// A search parameter value: `name=value` or `name=a&name=b`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SearchValue {
    One(String),
    Many(Vec<String>),
}

impl From<&str> for SearchValue {
    fn from(value: &str) -> Self {
        SearchValue::One(value.to_string())
    }
}

impl From<String> for SearchValue {
    fn from(value: String) -> Self {
        SearchValue::One(value)
    }
}

impl From<Vec<String>> for SearchValue {
    fn from(values: Vec<String>) -> Self {
        SearchValue::Many(values)
    }
}

/// Search parameters in the order the caller gave them. Serialized as a
/// JSON object, which is also the shape the frontend sends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchParams(Vec<(String, SearchValue)>);

impl SearchParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<SearchValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Sets `name`, replacing an earlier value in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<SearchValue>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sets the parameter a free-text search box maps to: `name` for people
    /// and organizations, `code` for observations, `_id` for the rest.
    /// A blank term leaves the parameters unchanged.
    pub fn with_term(mut self, resource_type: ResourceType, term: &str) -> Self {
        let term = term.trim();
        if term.is_empty() {
            return self;
        }
        let name = match resource_type {
            ResourceType::Patient | ResourceType::Practitioner | ResourceType::Organization => {
                "name"
            }
            ResourceType::Observation => "code",
            _ => "_id",
        };
        self.insert(name, term);
        self
    }

    /// Flattens into query pairs; multi-valued parameters repeat their name.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(self.0.len());
        for (name, value) in &self.0 {
            match value {
                SearchValue::One(v) => pairs.push((name.clone(), v.clone())),
                SearchValue::Many(vs) => {
                    pairs.extend(vs.iter().map(|v| (name.clone(), v.clone())));
                }
            }
        }
        pairs
    }
}

impl Serialize for SearchParams {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(name, value)| (name, value)))
    }
}

impl<'de> Deserialize<'de> for SearchParams {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // `Map` keeps document order with `preserve_order`.
        let raw = Map::<String, Value>::deserialize(deserializer)?;
        let mut params = SearchParams::new();
        for (name, value) in raw {
            let value = SearchValue::deserialize(value).map_err(<D::Error as de::Error>::custom)?;
            params.insert(name, value);
        }
        Ok(params)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_selected: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeableConcept {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub coding: Vec<Coding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// One diagnostic entry of an `OperationOutcome`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<CodeableConcept>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expression: Vec<String>,
}

impl Issue {
    /// Human readable text: diagnostics first, then the details concept.
    pub fn text(&self) -> Option<&str> {
        self.diagnostics
            .as_deref()
            .or_else(|| self.details.as_ref().and_then(|d| d.text.as_deref()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OperationOutcome {
    #[serde(default)]
    pub issue: Vec<Issue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleLink {
    #[serde(default)]
    pub relation: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BundleEntrySearch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleEntryRequest {
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<BundleEntrySearch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<BundleEntryRequest>,
    /// Fields the viewer does not model (`response`, `link`, ...), kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Paged collection returned by searches and batch/transaction posts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    #[serde(default = "bundle_resource_type")]
    pub resource_type: String,
    #[serde(rename = "type", default)]
    pub bundle_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub link: Vec<BundleLink>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entry: Vec<BundleEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn bundle_resource_type() -> String {
    ResourceType::Bundle.as_str().to_string()
}

impl Bundle {
    pub fn new(bundle_type: impl Into<String>) -> Self {
        Self {
            resource_type: bundle_resource_type(),
            bundle_type: bundle_type.into(),
            total: None,
            link: Vec::new(),
            entry: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Resources carried by the entries, skipping entries without one.
    pub fn resources(&self) -> impl Iterator<Item = &Value> {
        self.entry.iter().filter_map(|e| e.resource.as_ref())
    }

    pub fn link(&self, relation: &str) -> Option<&str> {
        self.link
            .iter()
            .find(|l| l.relation == relation)
            .map(|l| l.url.as_str())
    }
}
