//! Declarative validation for API request payloads.
//!
//! Per-entity constraints are data, not code: each entity carries a schema
//! (a slice of [`FieldSpec`]s) that a generic evaluator applies to the raw
//! JSON document before it is deserialized into a typed request. The
//! evaluator returns a map of field path to violations, which feeds directly
//! into `ApiError::validation`.
//!
//! Normalization (trim / lowercase) is part of the schema as well and is
//! applied in place before validation, so stored values are always in
//! canonical form.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;

lazy_static! {
    /// RFC-5322-flavored email pattern.
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"[a-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-z0-9!#$%&'*+/=?^_`{|}~-]+)*@(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z0-9](?:[a-z0-9-]*[a-z0-9])?"
    ).unwrap();

    /// Shape of a store-assigned document id as it appears in by-id routes.
    static ref DOCUMENT_ID_REGEX: Regex = Regex::new(r"^[0-9a-z]{8,24}$").unwrap();
}

/// No upper bound on a length rule.
pub const NO_MAX: usize = usize::MAX;

/// A single field constraint.
#[derive(Debug)]
pub enum Rule {
    /// Value must be present, non-null, and (for strings) non-empty.
    Required,
    /// String length in characters, inclusive on both ends.
    Length { min: usize, max: usize },
    /// Numeric minimum, inclusive.
    Min(f64),
    /// Must match the email pattern.
    Email,
    /// Must be one of the listed string values.
    OneOf(&'static [&'static str]),
    /// Must be an array with at least `min` elements, each validated
    /// against `schema`.
    Items {
        min: usize,
        schema: &'static [FieldSpec],
    },
}

/// Constraints and normalization for one field of an entity.
/// `field` is a dotted path into the document (e.g. `product.price`).
#[derive(Debug)]
pub struct FieldSpec {
    pub field: &'static str,
    pub trim: bool,
    pub lowercase: bool,
    pub rules: &'static [Rule],
}

impl FieldSpec {
    const fn plain(field: &'static str, rules: &'static [Rule]) -> Self {
        Self {
            field,
            trim: false,
            lowercase: false,
            rules,
        }
    }

    const fn trimmed(field: &'static str, rules: &'static [Rule]) -> Self {
        Self {
            field,
            trim: true,
            lowercase: false,
            rules,
        }
    }

    const fn folded(field: &'static str, rules: &'static [Rule]) -> Self {
        Self {
            field,
            trim: true,
            lowercase: true,
            rules,
        }
    }
}

// -------------------------------------------------------------------------
// Entity schemas
// -------------------------------------------------------------------------

/// Registration payload: name, email, password. Role is not validated here;
/// the controller forces it to customer regardless of input.
pub const REGISTER_SCHEMA: &[FieldSpec] = &[
    FieldSpec::trimmed("name", &[Rule::Required, Rule::Length { min: 1, max: 50 }]),
    FieldSpec::folded("email", &[Rule::Required, Rule::Email]),
    FieldSpec::plain(
        "password",
        &[Rule::Required, Rule::Length { min: 10, max: NO_MAX }],
    ),
];

/// User update payload: only the role may change.
pub const USER_UPDATE_SCHEMA: &[FieldSpec] = &[FieldSpec::folded(
    "role",
    &[Rule::Required, Rule::OneOf(&["admin", "customer"])],
)];

pub const PRODUCT_SCHEMA: &[FieldSpec] = &[
    FieldSpec::trimmed("name", &[Rule::Required, Rule::Length { min: 1, max: 50 }]),
    FieldSpec::trimmed("description", &[]),
    FieldSpec::plain("price", &[Rule::Required, Rule::Min(0.0)]),
    FieldSpec::folded("image", &[]),
];

/// Update uses the same constraints as creation: name and price are always
/// overwritten and therefore always required in the payload.
pub const PRODUCT_UPDATE_SCHEMA: &[FieldSpec] = PRODUCT_SCHEMA;

const ORDER_ITEM_SCHEMA: &[FieldSpec] = &[
    FieldSpec::plain("product.id", &[Rule::Required]),
    FieldSpec::trimmed(
        "product.name",
        &[Rule::Required, Rule::Length { min: 1, max: 50 }],
    ),
    FieldSpec::trimmed("product.description", &[]),
    FieldSpec::plain("product.price", &[Rule::Required, Rule::Min(0.0)]),
    FieldSpec::plain("quantity", &[Rule::Required, Rule::Min(1.0)]),
];

/// Order payload: a non-empty items array of product snapshots. The
/// customer id is never taken from the payload.
pub const ORDER_SCHEMA: &[FieldSpec] = &[FieldSpec::plain(
    "items",
    &[
        Rule::Required,
        Rule::Items {
            min: 1,
            schema: ORDER_ITEM_SCHEMA,
        },
    ],
)];

// -------------------------------------------------------------------------
// Evaluation
// -------------------------------------------------------------------------

/// Does `id` look like a store-assigned document id?
pub fn is_document_id(id: &str) -> bool {
    DOCUMENT_ID_REGEX.is_match(id)
}

/// Normalize and validate a raw document, then deserialize it into the
/// typed request. The usual entry point for controllers.
pub fn parse_validated<T: serde::de::DeserializeOwned>(
    mut doc: Value,
    schema: &[FieldSpec],
) -> Result<T, super::error::ApiError> {
    normalize(&mut doc, schema);
    let errors = validate(&doc, schema);
    if !errors.is_empty() {
        return Err(super::error::ApiError::validation(errors));
    }
    serde_json::from_value(doc)
        .map_err(|_| super::error::ApiError::bad_request("Invalid request body"))
}

fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = doc;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

fn lookup_mut<'a>(doc: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    let mut current = doc;
    for segment in path.split('.') {
        current = current.get_mut(segment)?;
    }
    Some(current)
}

/// Apply the schema's trim/lowercase normalization to `doc` in place,
/// recursing into array fields with nested schemas.
pub fn normalize(doc: &mut Value, schema: &[FieldSpec]) {
    for spec in schema {
        if let Some(value) = lookup_mut(doc, spec.field) {
            if let Value::String(s) = value {
                let mut normalized = if spec.trim { s.trim().to_string() } else { s.clone() };
                if spec.lowercase {
                    normalized = normalized.to_lowercase();
                }
                *value = Value::String(normalized);
            } else if let Value::Array(elements) = value {
                for rule in spec.rules {
                    if let Rule::Items { schema, .. } = rule {
                        for element in elements.iter_mut() {
                            normalize(element, schema);
                        }
                    }
                }
            }
        }
    }
}

/// Validate `doc` against `schema`, returning field path → violations.
/// An empty map means the document passed.
pub fn validate(doc: &Value, schema: &[FieldSpec]) -> HashMap<String, Vec<String>> {
    let mut errors: HashMap<String, Vec<String>> = HashMap::new();
    validate_into(doc, schema, "", &mut errors);
    errors
}

fn validate_into(
    doc: &Value,
    schema: &[FieldSpec],
    prefix: &str,
    errors: &mut HashMap<String, Vec<String>>,
) {
    for spec in schema {
        let path = if prefix.is_empty() {
            spec.field.to_string()
        } else {
            format!("{prefix}.{}", spec.field)
        };
        let value = lookup(doc, spec.field);

        let present = match value {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        };

        if !present {
            if spec.rules.iter().any(|r| matches!(r, Rule::Required)) {
                errors.entry(path).or_default().push("is required".to_string());
            }
            continue;
        }
        let value = value.unwrap_or(&Value::Null);

        for rule in spec.rules {
            match rule {
                Rule::Required => {}
                Rule::Length { min, max } => match value.as_str() {
                    Some(s) => {
                        let len = s.chars().count();
                        if len < *min {
                            errors
                                .entry(path.clone())
                                .or_default()
                                .push(format!("must be at least {min} characters"));
                        } else if len > *max {
                            errors
                                .entry(path.clone())
                                .or_default()
                                .push(format!("must be at most {max} characters"));
                        }
                    }
                    None => {
                        errors
                            .entry(path.clone())
                            .or_default()
                            .push("must be a string".to_string());
                    }
                },
                Rule::Min(min) => match value.as_f64() {
                    Some(n) => {
                        if n < *min {
                            errors
                                .entry(path.clone())
                                .or_default()
                                .push(format!("must be at least {min}"));
                        }
                    }
                    None => {
                        errors
                            .entry(path.clone())
                            .or_default()
                            .push("must be a number".to_string());
                    }
                },
                Rule::Email => match value.as_str() {
                    Some(s) if EMAIL_REGEX.is_match(s) => {}
                    _ => {
                        errors
                            .entry(path.clone())
                            .or_default()
                            .push("is not a valid email address".to_string());
                    }
                },
                Rule::OneOf(allowed) => match value.as_str() {
                    Some(s) if allowed.contains(&s) => {}
                    _ => {
                        errors
                            .entry(path.clone())
                            .or_default()
                            .push(format!("must be one of: {}", allowed.join(", ")));
                    }
                },
                Rule::Items { min, schema } => match value.as_array() {
                    Some(elements) => {
                        if elements.len() < *min {
                            errors
                                .entry(path.clone())
                                .or_default()
                                .push(format!("must contain at least {min} item(s)"));
                        }
                        for (index, element) in elements.iter().enumerate() {
                            let element_prefix = format!("{path}.{index}");
                            validate_into(element, schema, &element_prefix, errors);
                        }
                    }
                    None => {
                        errors
                            .entry(path.clone())
                            .or_default()
                            .push("must be an array".to_string());
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn register_accepts_valid_payload() {
        let doc = json!({
            "name": "Ada Lovelace",
            "email": "ada@example.com",
            "password": "correct horse battery"
        });
        assert!(validate(&doc, REGISTER_SCHEMA).is_empty());
    }

    #[test]
    fn register_rejects_missing_fields() {
        let doc = json!({});
        let errors = validate(&doc, REGISTER_SCHEMA);
        assert!(errors.contains_key("name"));
        assert!(errors.contains_key("email"));
        assert!(errors.contains_key("password"));
    }

    #[test]
    fn register_rejects_short_password() {
        let doc = json!({
            "name": "Ada",
            "email": "ada@example.com",
            "password": "short"
        });
        let errors = validate(&doc, REGISTER_SCHEMA);
        assert_eq!(
            errors.get("password").unwrap(),
            &vec!["must be at least 10 characters".to_string()]
        );
    }

    #[test]
    fn register_rejects_bad_email() {
        let doc = json!({
            "name": "Ada",
            "email": "not-an-email",
            "password": "long enough secret"
        });
        let errors = validate(&doc, REGISTER_SCHEMA);
        assert!(errors.contains_key("email"));
    }

    #[test]
    fn product_name_boundary_is_fifty_characters() {
        let at_limit = json!({ "name": "a".repeat(50), "price": 9.99 });
        assert!(validate(&at_limit, PRODUCT_SCHEMA).is_empty());

        let over_limit = json!({ "name": "a".repeat(51), "price": 9.99 });
        let errors = validate(&over_limit, PRODUCT_SCHEMA);
        assert!(errors.contains_key("name"));
    }

    #[test]
    fn product_requires_nonnegative_price() {
        let missing = json!({ "name": "Widget" });
        assert!(validate(&missing, PRODUCT_SCHEMA).contains_key("price"));

        let negative = json!({ "name": "Widget", "price": -1.0 });
        assert!(validate(&negative, PRODUCT_SCHEMA).contains_key("price"));

        let free = json!({ "name": "Widget", "price": 0 });
        assert!(validate(&free, PRODUCT_SCHEMA).is_empty());
    }

    #[test]
    fn product_price_must_be_numeric() {
        let doc = json!({ "name": "Widget", "price": "cheap" });
        let errors = validate(&doc, PRODUCT_SCHEMA);
        assert_eq!(
            errors.get("price").unwrap(),
            &vec!["must be a number".to_string()]
        );
    }

    #[test]
    fn role_update_allows_known_roles_only() {
        let ok = json!({ "role": "admin" });
        assert!(validate(&ok, USER_UPDATE_SCHEMA).is_empty());

        let bad = json!({ "role": "superuser" });
        assert!(validate(&bad, USER_UPDATE_SCHEMA).contains_key("role"));
    }

    #[test]
    fn order_rejects_empty_items() {
        let doc = json!({ "items": [] });
        let errors = validate(&doc, ORDER_SCHEMA);
        assert_eq!(
            errors.get("items").unwrap(),
            &vec!["must contain at least 1 item(s)".to_string()]
        );
    }

    #[test]
    fn order_validates_nested_item_fields() {
        let doc = json!({
            "items": [
                {
                    "product": { "id": "0123456789abcdef01234567", "name": "Widget", "price": 4.5 },
                    "quantity": 2
                },
                {
                    "product": { "name": "", "price": -2 },
                    "quantity": 0
                }
            ]
        });
        let errors = validate(&doc, ORDER_SCHEMA);
        assert!(errors.contains_key("items.1.product.id"));
        assert!(errors.contains_key("items.1.product.name"));
        assert!(errors.contains_key("items.1.product.price"));
        assert!(errors.contains_key("items.1.quantity"));
        assert!(!errors.keys().any(|k| k.starts_with("items.0")));
    }

    #[test]
    fn normalize_trims_and_folds() {
        let mut doc = json!({
            "name": "  Widget  ",
            "description": " padded ",
            "price": 1.0,
            "image": "  HTTPS://CDN.Example.com/W.PNG "
        });
        normalize(&mut doc, PRODUCT_SCHEMA);
        assert_eq!(doc["name"], "Widget");
        assert_eq!(doc["description"], "padded");
        assert_eq!(doc["image"], "https://cdn.example.com/w.png");
    }

    #[test]
    fn normalize_recurses_into_items() {
        let mut doc = json!({
            "items": [{
                "product": { "id": "x", "name": "  Widget ", "price": 1.0 },
                "quantity": 1
            }]
        });
        normalize(&mut doc, ORDER_SCHEMA);
        assert_eq!(doc["items"][0]["product"]["name"], "Widget");
    }

    #[test]
    fn whitespace_only_name_fails_required() {
        let mut doc = json!({ "name": "   ", "price": 1.0 });
        normalize(&mut doc, PRODUCT_SCHEMA);
        let errors = validate(&doc, PRODUCT_SCHEMA);
        assert_eq!(
            errors.get("name").unwrap(),
            &vec!["is required".to_string()]
        );
    }

    #[test]
    fn document_id_shape() {
        assert!(is_document_id("0123456789abcdef01234567"));
        assert!(is_document_id("abcd1234"));
        assert!(!is_document_id("abc1234")); // too short
        assert!(!is_document_id("0123456789abcdef012345678")); // too long
        assert!(!is_document_id("ABCD1234"));
        assert!(!is_document_id("abcd-1234"));
    }
}
