//! Static registry of Fitbit endpoints exposed to reporting layers.
//!
//! Each [`Endpoint`] describes where a resource lives (a path template), a
//! dot-path key that is always present in a successful response, and the
//! fields a reporting grid can pick out of it. The registry is built once at
//! startup; there is no runtime discovery.

pub mod paths;

use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub use paths::{
    activity_time_series_path, daily_activity_summary_path, is_known_period, ActivityDate,
    BADGES_PATH, DEFAULT_PERIOD, PROFILE_PATH, TIME_SERIES_PERIODS,
};

/// How a reporting layer should treat a field's value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Float,
    Text,
    /// Nested structure passed through untouched
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Field {
    /// Dot path into the response, e.g. `summary.steps`
    pub path: &'static str,
    pub title: &'static str,
    pub kind: FieldKind,
}

const fn field(path: &'static str, title: &'static str, kind: FieldKind) -> Field {
    Field { path, title, kind }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    /// Path below the API base URL; `{name}` placeholders are filled by
    /// [`Endpoint::render_path`]
    pub path_template: &'static str,
    /// Dot path that every successful response contains
    pub response_key: &'static str,
    pub fields: &'static [Field],
    /// Values for placeholders the caller leaves out
    pub defaults: &'static [(&'static str, &'static str)],
}

impl Endpoint {
    /// Fills `{name}` placeholders from `params`, then `defaults`. Unknown
    /// placeholders are left verbatim.
    pub fn render_path(&self, params: &[(String, String)]) -> String {
        let mut rendered = String::with_capacity(self.path_template.len());
        let mut rest = self.path_template;

        while let Some(open) = rest.find('{') {
            let Some(close) = rest[open..].find('}').map(|i| open + i) else {
                break;
            };
            rendered.push_str(&rest[..open]);
            let name = &rest[open + 1..close];

            let value = params
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
                .or_else(|| {
                    self.defaults
                        .iter()
                        .find(|(k, _)| *k == name)
                        .map(|(_, v)| *v)
                });
            match value {
                Some(value) => rendered.push_str(value),
                None => rendered.push_str(&rest[open..=close]),
            }
            rest = &rest[close + 1..];
        }
        rendered.push_str(rest);
        rendered
    }

    /// True if `response` contains this endpoint's response key.
    pub fn matches(&self, response: &Value) -> bool {
        lookup_path(response, self.response_key).is_some_and(|v| !v.is_null())
    }

    /// Projects `response` onto this endpoint's fields.
    pub fn project(&self, response: &Value) -> Map<String, Value> {
        filter_by_paths(response, self.fields.iter().map(|f| f.path))
    }
}

/// Walks a dot path through objects (and arrays, by numeric segment).
pub fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Collects the value at each path, keyed by the path. Paths missing from
/// `value` map to `null` so every row has the same columns.
pub fn filter_by_paths<'p>(
    value: &Value,
    paths: impl IntoIterator<Item = &'p str>,
) -> Map<String, Value> {
    paths
        .into_iter()
        .map(|path| {
            let found = lookup_path(value, path).cloned().unwrap_or(Value::Null);
            (path.to_string(), found)
        })
        .collect()
}

const PROFILE_FIELDS: &[Field] = &[
    field("user.encodedId", "Fitbit user id", FieldKind::Text),
    field("user.displayName", "Display name", FieldKind::Text),
    field("user.averageDailySteps", "Average daily steps", FieldKind::Integer),
    field("user.weight", "Weight", FieldKind::Float),
    field("user.height", "Height", FieldKind::Float),
    field("user.memberSince", "Member since", FieldKind::Text),
    field("user.topBadges", "Top badges", FieldKind::Json),
    field("user.avatar", "Avatar", FieldKind::Text),
    field("user.avatar150", "Avatar (150px)", FieldKind::Text),
];

const BADGE_FIELDS: &[Field] = &[field("badges", "Badges", FieldKind::Json)];

const DAILY_ACTIVITY_SUMMARY_FIELDS: &[Field] = &[
    field("goals.activeMinutes", "Goals - Active minutes", FieldKind::Integer),
    field("goals.caloriesOut", "Goals - Calories out", FieldKind::Integer),
    field("goals.distance", "Goals - Distance", FieldKind::Float),
    field("goals.steps", "Goals - Steps", FieldKind::Integer),
    field("summary.activeScore", "Active score", FieldKind::Integer),
    field("summary.activityCalories", "Activity calories", FieldKind::Integer),
    field("summary.caloriesBMR", "Calories BMR", FieldKind::Integer),
    field("summary.caloriesOut", "Calories out", FieldKind::Integer),
    field("summary.distances", "Distances", FieldKind::Json),
    field("summary.fairlyActiveMinutes", "Fairly active minutes", FieldKind::Integer),
    field("summary.lightlyActiveMinutes", "Lightly active minutes", FieldKind::Integer),
    field("summary.marginalCalories", "Marginal calories", FieldKind::Integer),
    field("summary.sedentaryMinutes", "Sedentary minutes", FieldKind::Integer),
    field("summary.steps", "Steps", FieldKind::Integer),
    field("summary.veryActiveMinutes", "Very active minutes", FieldKind::Integer),
];

pub const PROFILE: Endpoint = Endpoint {
    id: "profile",
    name: "Fitbit profile",
    description: "The user's profile: display name, body metrics, and avatar.",
    path_template: PROFILE_PATH,
    response_key: "user.displayName",
    fields: PROFILE_FIELDS,
    defaults: &[],
};

pub const BADGES: Endpoint = Endpoint {
    id: "badges",
    name: "Fitbit badges",
    description: "Badges the user has earned.",
    path_template: BADGES_PATH,
    response_key: "badges",
    fields: BADGE_FIELDS,
    defaults: &[],
};

pub const DAILY_ACTIVITY_SUMMARY: Endpoint = Endpoint {
    id: "daily_activity_summary",
    name: "Fitbit daily activity summary",
    description: "Summary of the user's activities and goals for a given day.",
    path_template: "/user/-/activities/date/{date}.json",
    response_key: "summary.steps",
    fields: DAILY_ACTIVITY_SUMMARY_FIELDS,
    defaults: &[("date", "today")],
};

/// Endpoints by id.
#[derive(Clone, Debug, Default)]
pub struct EndpointRegistry {
    endpoints: BTreeMap<&'static str, Endpoint>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in profile, badges and daily summary endpoints.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(PROFILE);
        registry.register(BADGES);
        registry.register(DAILY_ACTIVITY_SUMMARY);
        registry
    }

    /// Adds an endpoint, replacing any with the same id.
    pub fn register(&mut self, endpoint: Endpoint) {
        self.endpoints.insert(endpoint.id, endpoint);
    }

    pub fn get(&self, id: &str) -> Option<&Endpoint> {
        self.endpoints.get(id)
    }

    /// Endpoints ordered by id.
    pub fn iter(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.values()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}
