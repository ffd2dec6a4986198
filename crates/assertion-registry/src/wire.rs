//! JSON bodies of the registry's member API.

use serde::{Deserialize, Serialize};

use assertion_entity::assertion::{Assertion, FuzzyDate};
use assertion_entity::notification::{ItemType, NotificationPermission};

use crate::error::RegistryError;

const GRID_SOURCE: &str = "GRID";

/// Prefixes that members paste in front of GRID identifiers. Longest first.
const GRID_PREFIXES: [&str; 4] = [
    "https://www.grid.ac/institutes/",
    "https://www.grid.ac/",
    "https://grid.ac/institutes/",
    "https://grid.ac/",
];

/// Reduce a GRID URL to the bare identifier (`grid.4991.5`).
pub fn strip_grid_url(identifier: &str) -> &str {
    GRID_PREFIXES
        .iter()
        .find_map(|prefix| identifier.strip_prefix(prefix))
        .unwrap_or(identifier)
}

/// A `{"value": ..}` wrapper.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Value {
    /// Wrapped string.
    pub value: String,
}

impl Value {
    fn of(value: &str) -> Self {
        Self {
            value: value.to_string(),
        }
    }
}

/// Fuzzy date with wrapped parts.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct WireDate {
    pub year: Value,
    pub month: Option<Value>,
    pub day: Option<Value>,
}

impl From<&FuzzyDate> for WireDate {
    fn from(date: &FuzzyDate) -> Self {
        Self {
            year: Value::of(&date.year),
            month: date.month.as_deref().map(Value::of),
            day: date.day.as_deref().map(Value::of),
        }
    }
}

/// Organization address.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Address {
    pub city: String,
    pub region: Option<String>,
    pub country: String,
}

/// Organization identifier in an external registry such as GRID or ROR.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct DisambiguatedOrganization {
    pub disambiguated_organization_identifier: String,
    pub disambiguation_source: String,
}

/// The affiliated organization.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct Organization {
    pub name: String,
    pub address: Address,
    pub disambiguated_organization: Option<DisambiguatedOrganization>,
}

/// One self-relationship external identifier.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct WireExternalId {
    pub external_id_type: String,
    pub external_id_value: String,
    pub external_id_url: Option<Value>,
    pub external_id_relationship: String,
}

/// External identifier list.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct ExternalIds {
    pub external_id: Vec<WireExternalId>,
}

/// Affiliation summary body for `POST`/`PUT /{orcid}/{section}`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct Affiliation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put_code: Option<u64>,
    pub department_name: Option<String>,
    pub role_title: Option<String>,
    pub start_date: Option<WireDate>,
    pub end_date: Option<WireDate>,
    pub organization: Organization,
    pub url: Option<Value>,
    pub external_ids: Option<ExternalIds>,
}

impl Affiliation {
    /// Body for a create: no put-code.
    pub fn for_create(assertion: &Assertion) -> Self {
        Self::from_assertion(assertion, None)
    }

    /// Body for an update: the put-code must be numeric.
    pub fn for_update(assertion: &Assertion) -> Result<Self, RegistryError> {
        let put_code = assertion
            .put_code()
            .ok_or_else(|| RegistryError::Decode(format!("assertion {} has no put-code", assertion.id)))?;
        let put_code = put_code
            .parse::<u64>()
            .map_err(|_| RegistryError::Decode(format!("put-code '{put_code}' is not numeric")))?;
        Ok(Self::from_assertion(assertion, Some(put_code)))
    }

    fn from_assertion(assertion: &Assertion, put_code: Option<u64>) -> Self {
        let org = &assertion.organization;
        let disambiguated_organization = match (&org.disambiguated_org_id, &org.disambiguation_source) {
            (Some(id), Some(source)) if !id.trim().is_empty() => {
                let id = if source.eq_ignore_ascii_case(GRID_SOURCE) {
                    strip_grid_url(id.trim())
                } else {
                    id.trim()
                };
                Some(DisambiguatedOrganization {
                    disambiguated_organization_identifier: id.to_string(),
                    disambiguation_source: source.to_uppercase(),
                })
            }
            _ => None,
        };

        let external_ids = assertion.external_id.as_ref().map(|ext| ExternalIds {
            external_id: vec![WireExternalId {
                external_id_type: ext.id_type.clone(),
                external_id_value: ext.value.clone(),
                external_id_url: ext.url.as_deref().map(Value::of),
                external_id_relationship: "self".to_string(),
            }],
        });

        Self {
            put_code,
            department_name: assertion.department_name.clone(),
            role_title: assertion.role_title.clone(),
            start_date: assertion.start_date.as_ref().map(WireDate::from),
            end_date: assertion.end_date.as_ref().map(WireDate::from),
            organization: Organization {
                name: org.name.clone(),
                address: Address {
                    city: org.city.clone(),
                    region: org.region.clone(),
                    country: org.country.clone(),
                },
                disambiguated_organization,
            },
            url: assertion.url.as_deref().map(Value::of),
            external_ids,
        }
    }
}

/// Landing page the notification links to.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthorizationUrl {
    pub uri: String,
}

/// One affiliation the member asks to write.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct Item {
    pub item_type: ItemType,
    pub item_name: String,
}

/// Notification item list.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Items {
    pub item: Vec<Item>,
}

/// Body for `POST /{orcid}/notification-permission`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct PermissionNotification {
    pub notification_type: String,
    pub authorization_url: AuthorizationUrl,
    pub notification_subject: String,
    pub notification_intro: String,
    pub items: Items,
}

impl From<&NotificationPermission> for PermissionNotification {
    fn from(notification: &NotificationPermission) -> Self {
        Self {
            notification_type: "permission".to_string(),
            authorization_url: AuthorizationUrl {
                uri: notification.authorization_url.clone(),
            },
            notification_subject: notification.subject.clone(),
            notification_intro: notification.intro.clone(),
            items: Items {
                item: notification
                    .items
                    .iter()
                    .map(|i| Item {
                        item_type: i.item_type,
                        item_name: i.item_name.clone(),
                    })
                    .collect(),
            },
        }
    }
}

/// OAuth token endpoint response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    /// Bearer token.
    pub access_token: String,
}

/// Response of `GET /search/?q=email:..`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SearchResponse {
    /// Number of matching records.
    #[serde(default)]
    pub num_found: u64,
    /// Matching records; `null` when there are none.
    #[serde(default)]
    pub result: Option<Vec<SearchResult>>,
}

impl SearchResponse {
    /// Registry id of the match, when exactly one record matched.
    pub fn single_orcid(self) -> Option<String> {
        match self.result?.as_slice() {
            [only] => Some(only.orcid_identifier.path.clone()),
            _ => None,
        }
    }
}

/// One search hit.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SearchResult {
    /// Identifier of the matching record.
    pub orcid_identifier: OrcidIdentifier,
}

/// Registry id in its `path` form (`0000-0002-1825-0097`).
#[derive(Debug, Deserialize)]
pub struct OrcidIdentifier {
    /// Bare registry id.
    pub path: String,
}

/// Put-code of a created item: the last segment of the `Location` header.
pub fn put_code_from_location(location: &str) -> Option<&str> {
    location
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit()))
}
