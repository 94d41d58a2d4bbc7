//! Target schemas and the record remapper
//!
//! A [`TargetSchema`] is an allow-list of fields. [`remap`] copies exactly the
//! declared fields from a source record, applying each field's [`Presence`]
//! rule and recursing into nested mappings sub-field by sub-field.
//!
//! Every historical migration script is one named schema value: see
//! [`legacy_v1`] and [`users_v2`].

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::error::RemapError;

/// A stored document: field name to JSON value
pub type Record = serde_json::Map<String, Value>;

/// Name of the schema used when seeding test accounts
pub const LEGACY_V1: &str = "legacy-v1";

/// Name of the schema used when migrating users to the new collection
pub const USERS_V2: &str = "users-v2";

/// How a declared field is treated when it is absent from the source
#[derive(Debug, Clone, PartialEq)]
pub enum Presence {
    /// Must exist in the source; copied as-is, even when null or empty
    Required,
    /// Copied only when present and not empty-equivalent
    Optional,
    /// Copied as-is when present, even when null or empty; written when the key is missing
    Default(Value),
}

/// One declared field of a target schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFieldSpec", into = "RawFieldSpec")]
pub struct FieldSpec {
    pub name: String,
    pub presence: Presence,
    /// Sub-fields; non-empty means the field is a nested mapping
    pub fields: Vec<FieldSpec>,
}

impl FieldSpec {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            presence: Presence::Required,
            fields: Vec::new(),
        }
    }

    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            presence: Presence::Optional,
            fields: Vec::new(),
        }
    }

    pub fn with_default(name: impl Into<String>, default: Value) -> Self {
        Self {
            name: name.into(),
            presence: Presence::Default(default),
            fields: Vec::new(),
        }
    }

    /// Turn this field into a nested mapping with the given sub-fields
    pub fn nested(mut self, fields: Vec<FieldSpec>) -> Self {
        self.fields = fields;
        self
    }

    pub fn is_nested(&self) -> bool {
        !self.fields.is_empty()
    }
}

/// Serialized form of a [`FieldSpec`]
///
/// `default` must tell an explicit `default: null` apart from no default at all,
/// so it is deserialized through [`deserialize_present`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawFieldSpec {
    name: String,
    #[serde(default)]
    required: bool,
    #[serde(default, deserialize_with = "deserialize_present", skip_serializing_if = "Option::is_none")]
    default: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    fields: Vec<FieldSpec>,
}

fn deserialize_present<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl TryFrom<RawFieldSpec> for FieldSpec {
    type Error = String;

    fn try_from(raw: RawFieldSpec) -> std::result::Result<Self, Self::Error> {
        let presence = match (raw.required, raw.default) {
            (true, Some(_)) => return Err(format!("field '{}' cannot be both required and defaulted", raw.name)),
            (true, None) => Presence::Required,
            (false, Some(value)) => Presence::Default(value),
            (false, None) => Presence::Optional,
        };
        if matches!(presence, Presence::Default(_)) && !raw.fields.is_empty() {
            return Err(format!("nested field '{}' cannot declare a default", raw.name));
        }
        Ok(Self {
            name: raw.name,
            presence,
            fields: raw.fields,
        })
    }
}

impl From<FieldSpec> for RawFieldSpec {
    fn from(spec: FieldSpec) -> Self {
        let (required, default) = match spec.presence {
            Presence::Required => (true, None),
            Presence::Optional => (false, None),
            Presence::Default(value) => (false, Some(value)),
        };
        Self {
            name: spec.name,
            required,
            default,
            fields: spec.fields,
        }
    }
}

/// An ordered allow-list of fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub fields: Vec<FieldSpec>,
}

impl TargetSchema {
    pub fn new(name: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            fields,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Load a schema from a YAML file in the format printed by `ca schema show`
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).context(format!("Failed to read schema file {}", path.display()))?;
        let schema: Self = serde_yaml::from_str(&content).context("Failed to parse schema file")?;
        schema.validate()?;
        debug!(name = %schema.name, "TargetSchema::load: loaded schema");
        Ok(schema)
    }

    /// Reject schemas that declare the same field twice at one level
    pub fn validate(&self) -> Result<()> {
        fn check(fields: &[FieldSpec], prefix: &str) -> Result<()> {
            let mut seen = HashSet::new();
            for spec in fields {
                let path = join_path(prefix, &spec.name);
                if spec.name.is_empty() {
                    return Err(eyre::eyre!("Empty field name under '{}'", prefix));
                }
                if !seen.insert(spec.name.as_str()) {
                    return Err(eyre::eyre!("Field '{}' is declared more than once", path));
                }
                check(&spec.fields, &path)?;
            }
            Ok(())
        }
        check(&self.fields, "")
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Missing, null and the empty string all count as absent for optional fields
pub fn is_empty_equivalent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// The human-meaningful key used in diagnostics: the email, else the position in the batch
pub fn natural_key(record: &Record, index: usize) -> String {
    match record.get("email").and_then(Value::as_str) {
        Some(email) if !email.is_empty() => email.to_string(),
        _ => format!("#{}", index),
    }
}

/// Apply `schema` to `source`, producing a sparse destination record
///
/// `source` is never mutated. Fields not declared in the schema are dropped.
pub fn remap(source: &Record, schema: &TargetSchema, natural_key: &str) -> Result<Record, RemapError> {
    debug!(schema = %schema.name, %natural_key, "remap: called");
    remap_fields(source, &schema.fields, "", natural_key)
}

fn remap_fields(source: &Record, specs: &[FieldSpec], prefix: &str, natural_key: &str) -> Result<Record, RemapError> {
    let mut out = Record::new();

    for spec in specs {
        let value = source.get(&spec.name);

        if spec.is_nested() {
            let path = join_path(prefix, &spec.name);
            if let Some(nested) = remap_nested(spec, value, &path, natural_key)? {
                out.insert(spec.name.clone(), Value::Object(nested));
            }
            continue;
        }

        match (&spec.presence, value) {
            (Presence::Required, Some(v)) => {
                out.insert(spec.name.clone(), v.clone());
            }
            (Presence::Required, None) => {
                return Err(RemapError::MissingRequiredField {
                    field: join_path(prefix, &spec.name),
                    natural_key: natural_key.to_string(),
                });
            }
            (Presence::Optional, Some(v)) if !is_empty_equivalent(v) => {
                out.insert(spec.name.clone(), v.clone());
            }
            (Presence::Optional, _) => {}
            // A present value wins even when null or empty; only a missing key takes the default
            (Presence::Default(_), Some(v)) => {
                out.insert(spec.name.clone(), v.clone());
            }
            (Presence::Default(default), None) => {
                out.insert(spec.name.clone(), default.clone());
            }
        }
    }

    Ok(out)
}

fn remap_nested(
    spec: &FieldSpec,
    value: Option<&Value>,
    path: &str,
    natural_key: &str,
) -> Result<Option<Record>, RemapError> {
    let required = spec.presence == Presence::Required;

    let value = match value {
        Some(v) if required || !is_empty_equivalent(v) => v,
        _ if required => {
            return Err(RemapError::MissingRequiredField {
                field: path.to_string(),
                natural_key: natural_key.to_string(),
            });
        }
        _ => return Ok(None),
    };

    let Some(inner) = value.as_object() else {
        return Err(RemapError::NotAMapping {
            field: path.to_string(),
            natural_key: natural_key.to_string(),
        });
    };

    let nested = remap_fields(inner, &spec.fields, path, natural_key)?;
    if nested.is_empty() && !required {
        return Ok(None);
    }
    Ok(Some(nested))
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

fn address_fields() -> Vec<FieldSpec> {
    ["fullAddress", "street", "city", "province", "country", "postalCode"]
        .into_iter()
        .map(FieldSpec::required)
        .collect()
}

fn care_preference_names() -> [&'static str; 4] {
    ["lookingForSelf", "careType", "tasks", "availability"]
}

/// Shape written when seeding test accounts, including the client-computed `age`
pub fn legacy_v1() -> TargetSchema {
    let mut fields: Vec<FieldSpec> = ["firstName", "lastName", "dob", "age"]
        .into_iter()
        .map(FieldSpec::required)
        .collect();
    fields.push(FieldSpec::required("address").nested(address_fields()));
    fields.extend(["phone", "email", "isPsw"].into_iter().map(FieldSpec::required));
    fields.push(FieldSpec::with_default("profilePhotoUrl", Value::String(String::new())));
    fields.push(FieldSpec::with_default("rate", Value::Null));
    fields.extend(
        ["idVerified", "emailVerified", "phoneVerified", "hasProfilePhoto"]
            .into_iter()
            .map(FieldSpec::required),
    );
    fields.push(
        FieldSpec::required("carePreferences").nested(
            care_preference_names()
                .into_iter()
                .map(FieldSpec::required)
                .collect(),
        ),
    );
    fields.extend(
        ["bio", "onboardingComplete", "stripeAccountId"]
            .into_iter()
            .map(FieldSpec::required),
    );

    TargetSchema::new(LEGACY_V1, fields).with_description("Original test-account shape, with client-computed age")
}

/// Current user shape: sparse optional fields, no `age`
pub fn users_v2() -> TargetSchema {
    let mut fields: Vec<FieldSpec> = ["firstName", "lastName", "dob"]
        .into_iter()
        .map(FieldSpec::required)
        .collect();
    fields.push(FieldSpec::required("address").nested(address_fields()));
    fields.extend(
        ["phone", "email", "isPsw", "onboardingComplete"]
            .into_iter()
            .map(FieldSpec::required),
    );
    fields.extend(
        [
            "gender",
            "profilePhotoUrl",
            "rate",
            "idVerified",
            "emailVerified",
            "phoneVerified",
            "hasProfilePhoto",
        ]
        .into_iter()
        .map(FieldSpec::optional),
    );
    fields.push(
        FieldSpec::optional("carePreferences").nested(
            care_preference_names()
                .into_iter()
                .map(FieldSpec::optional)
                .collect(),
        ),
    );
    fields.extend(["bio", "stripeAccountId"].into_iter().map(FieldSpec::optional));

    TargetSchema::new(USERS_V2, fields).with_description("User document shape; age is not part of it")
}

/// Names of the built-in schemas
pub fn builtin_names() -> &'static [&'static str] {
    &[LEGACY_V1, USERS_V2]
}

/// Look up a built-in schema by name
pub fn builtin(name: &str) -> Option<TargetSchema> {
    match name {
        LEGACY_V1 => Some(legacy_v1()),
        USERS_V2 => Some(users_v2()),
        _ => None,
    }
}

/// Pick the schema for a run: an explicit file wins over a built-in name
pub fn resolve(name: &str, file: Option<&Path>) -> Result<TargetSchema> {
    if let Some(path) = file {
        return TargetSchema::load(path);
    }
    builtin(name).ok_or_else(|| {
        eyre::eyre!(
            "Unknown schema '{}'. Built-in schemas: {}",
            name,
            builtin_names().join(", ")
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().expect("test record must be an object")
    }

    fn full_user() -> Record {
        record(json!({
            "firstName": "Ann",
            "lastName": "Lee",
            "dob": "01/02/1990",
            "age": 34,
            "gender": "",
            "address": {
                "fullAddress": "1 Rd, Toronto, ON, Canada, M1M 1M1",
                "street": "1 Rd",
                "city": "Toronto",
                "province": "ON",
                "country": "Canada",
                "postalCode": "M1M 1M1",
                "unit": "4B"
            },
            "phone": "555-0100",
            "email": "ann@x.com",
            "isPsw": true,
            "rate": null,
            "idVerified": false,
            "emailVerified": true,
            "phoneVerified": false,
            "hasProfilePhoto": false,
            "carePreferences": {
                "lookingForSelf": true,
                "careType": ["Option 1"],
                "tasks": ["Option 2", "Option 5"],
                "availability": null
            },
            "bio": "Hello",
            "onboardingComplete": true,
            "stripeAccountId": ""
        }))
    }

    fn scenario_schema() -> TargetSchema {
        TargetSchema::new(
            "scenario",
            vec![
                FieldSpec::required("email"),
                FieldSpec::required("firstName"),
                FieldSpec::optional("address")
                    .nested(vec![FieldSpec::optional("street"), FieldSpec::optional("city")]),
            ],
        )
    }

    #[test]
    fn test_scenario_a_sparse_nested_copy() {
        let source = record(json!({"email": "a@x.com", "firstName": "Ann", "address": {"street": "1 Rd"}}));

        let dest = remap(&source, &scenario_schema(), "a@x.com").unwrap();

        assert_eq!(
            Value::Object(dest),
            json!({"email": "a@x.com", "firstName": "Ann", "address": {"street": "1 Rd"}})
        );
    }

    #[test]
    fn test_scenario_b_missing_required_email() {
        let source = record(json!({"firstName": "Ann"}));
        let key = natural_key(&source, 7);
        assert_eq!(key, "#7");

        let err = remap(&source, &scenario_schema(), &key).unwrap_err();

        assert_eq!(
            err,
            RemapError::MissingRequiredField {
                field: "email".to_string(),
                natural_key: "#7".to_string(),
            }
        );
    }

    #[test]
    fn test_source_is_not_mutated() {
        let source = full_user();
        let before = source.clone();
        let _ = remap(&source, &users_v2(), "ann@x.com").unwrap();
        assert_eq!(source, before);
    }

    #[test]
    fn test_users_v2_drops_age_and_undeclared_fields() {
        let dest = remap(&full_user(), &users_v2(), "ann@x.com").unwrap();

        assert!(!dest.contains_key("age"));
        assert!(!dest["address"].as_object().unwrap().contains_key("unit"));
        // empty and null optionals are omitted, false is kept
        assert!(!dest.contains_key("gender"));
        assert!(!dest.contains_key("rate"));
        assert!(!dest.contains_key("stripeAccountId"));
        assert_eq!(dest["idVerified"], json!(false));
        assert_eq!(
            dest["carePreferences"],
            json!({"lookingForSelf": true, "careType": ["Option 1"], "tasks": ["Option 2", "Option 5"]})
        );
    }

    #[test]
    fn test_legacy_v1_keeps_age_and_writes_defaults() {
        let mut source = full_user();
        source.remove("profilePhotoUrl");
        source.remove("rate");

        let dest = remap(&source, &legacy_v1(), "ann@x.com").unwrap();

        assert_eq!(dest["age"], json!(34));
        assert_eq!(dest["profilePhotoUrl"], json!(""));
        assert_eq!(dest["rate"], Value::Null);
        // required fields are copied even when null or empty
        assert_eq!(dest["stripeAccountId"], json!(""));
        assert_eq!(dest["carePreferences"]["availability"], Value::Null);
    }

    #[test]
    fn test_default_not_used_when_value_present() {
        let schema = TargetSchema::new("d", vec![FieldSpec::with_default("rate", json!(0))]);
        let dest = remap(&record(json!({"rate": 25})), &schema, "k").unwrap();
        assert_eq!(dest["rate"], json!(25));
    }

    #[test]
    fn test_default_field_keeps_present_null_and_empty() {
        let mut source = full_user();
        source.insert("profilePhotoUrl".to_string(), Value::Null);
        source.insert("rate".to_string(), json!(""));

        let dest = remap(&source, &legacy_v1(), "ann@x.com").unwrap();

        assert_eq!(dest["profilePhotoUrl"], Value::Null);
        assert_eq!(dest["rate"], json!(""));
    }

    #[test]
    fn test_required_nested_sub_field_reports_dotted_path() {
        let mut source = full_user();
        source["address"].as_object_mut().unwrap().remove("city");

        let err = remap(&source, &users_v2(), "ann@x.com").unwrap_err();

        assert_eq!(err.field(), "address.city");
    }

    #[test]
    fn test_required_container_absent_is_error_even_without_required_sub_fields() {
        let schema = TargetSchema::new(
            "r",
            vec![FieldSpec::required("carePreferences").nested(vec![FieldSpec::optional("tasks")])],
        );

        let err = remap(&Record::new(), &schema, "k").unwrap_err();
        assert_eq!(err.field(), "carePreferences");

        // present but with nothing to copy: kept as an empty mapping
        let dest = remap(&record(json!({"carePreferences": {}})), &schema, "k").unwrap();
        assert_eq!(dest["carePreferences"], json!({}));
    }

    #[test]
    fn test_optional_container_with_nothing_to_copy_is_omitted() {
        let source = record(json!({"email": "a@x.com", "firstName": "Ann", "address": {"zip": "x"}}));
        let dest = remap(&source, &scenario_schema(), "a@x.com").unwrap();
        assert!(!dest.contains_key("address"));
    }

    #[test]
    fn test_container_that_is_not_a_mapping() {
        let source = record(json!({"email": "a@x.com", "firstName": "Ann", "address": "1 Rd"}));

        let err = remap(&source, &scenario_schema(), "a@x.com").unwrap_err();

        assert!(matches!(err, RemapError::NotAMapping { ref field, .. } if field == "address"));
    }

    #[test]
    fn test_destination_follows_schema_order() {
        let source = record(json!({"b": 2, "a": 1}));
        let schema = TargetSchema::new("o", vec![FieldSpec::required("a"), FieldSpec::required("b")]);

        let dest = remap(&source, &schema, "k").unwrap();

        let keys: Vec<&String> = dest.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_yaml_round_trip_keeps_null_default() {
        let yaml = legacy_v1().to_yaml().unwrap();
        assert!(yaml.contains("default: null"));

        let parsed: TargetSchema = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, legacy_v1());
    }

    #[test]
    fn test_yaml_rejects_required_with_default() {
        let yaml = "name: bad\nfields:\n  - name: rate\n    required: true\n    default: 0\n";
        let result: std::result::Result<TargetSchema, _> = serde_yaml::from_str(yaml);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_fields() {
        let schema = TargetSchema::new(
            "dup",
            vec![
                FieldSpec::required("address").nested(vec![FieldSpec::optional("city"), FieldSpec::optional("city")]),
            ],
        );

        let err = schema.validate().unwrap_err();
        assert!(err.to_string().contains("address.city"));
    }

    #[test]
    fn test_resolve_builtin_and_unknown() {
        assert_eq!(resolve(USERS_V2, None).unwrap().name, USERS_V2);

        let err = resolve("users-v9", None).unwrap_err();
        assert!(err.to_string().contains("legacy-v1"));
    }

    #[test]
    fn test_load_schema_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("schema.yml");
        fs::write(
            &path,
            "name: slim\nfields:\n  - name: email\n    required: true\n  - name: bio\n",
        )
        .unwrap();

        let schema = resolve(USERS_V2, Some(&path)).unwrap();

        assert_eq!(schema.name, "slim");
        assert_eq!(schema.fields[1], FieldSpec::optional("bio"));
    }
}
