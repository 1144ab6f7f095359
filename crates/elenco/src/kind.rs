//! Per-resource behaviour, composed into sets and views.
//!
//! A [`ResourceKind`] says which fields a resource has, how they validate,
//! what their defaults are and how the set orders them. [`Schema`] is the
//! data-driven implementation used by the built-in kinds; anything needing a
//! different hook can implement the trait directly.

use serde_json::{json, Value};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};

use crate::error::ValidationErrors;
use crate::resource::{is_blank_value, Attributes, Resource};

/// Reserved attribute names. Supplied from outside, never interpreted here.
pub type ReservedKeys = BTreeSet<String>;

/// How a field is edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldInput {
    Text,
    TextArea,
    Checkbox,
    Number,
    List,
}

impl FieldInput {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldInput::Text => "text",
            FieldInput::TextArea => "textarea",
            FieldInput::Checkbox => "checkbox",
            FieldInput::Number => "number",
            FieldInput::List => "list",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub label: String,
    pub input: FieldInput,
    pub required: bool,
    /// Counts as user content for emptiness checks.
    pub content: bool,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, label: impl Into<String>, input: FieldInput) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            input,
            required: false,
            content: false,
        }
    }

    pub fn text(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, label, FieldInput::Text)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn content(mut self) -> Self {
        self.content = true;
        self
    }
}

/// Ordering of a set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Comparator {
    #[default]
    Insertion,
    Ascending(String),
    Descending(String),
}

impl Comparator {
    /// Compare two resources. Missing or null values always sort last.
    pub fn compare(&self, a: &Resource, b: &Resource) -> Ordering {
        let (field, descending) = match self {
            Comparator::Insertion => return Ordering::Equal,
            Comparator::Ascending(field) => (field.as_str(), false),
            Comparator::Descending(field) => (field.as_str(), true),
        };
        let left = a.value(field).filter(|v| !v.is_null());
        let right = b.value(field).filter(|v| !v.is_null());
        match (left, right) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(l), Some(r)) => {
                let ord = compare_values(l, r);
                if descending {
                    ord.reverse()
                } else {
                    ord
                }
            }
        }
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x
            .to_lowercase()
            .cmp(&y.to_lowercase())
            .then_with(|| x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

pub trait ResourceKind: Send + Sync {
    /// Machine name, e.g. `certificate`.
    fn name(&self) -> &str;

    /// Human name, e.g. `Certificate`.
    fn title(&self) -> &str {
        self.name()
    }

    /// Path segment of the collection endpoint.
    fn path(&self) -> &str;

    fn fields(&self) -> &[FieldSpec];

    fn label_field(&self) -> &str {
        "name"
    }

    fn defaults(&self) -> Attributes {
        Attributes::new()
    }

    fn comparator(&self) -> Comparator {
        Comparator::Insertion
    }

    /// Local, synchronous validation of effective attributes.
    fn validate(&self, attributes: &Attributes, reserved: &ReservedKeys) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_required(self.fields(), attributes, &mut errors);
        check_reserved(attributes, reserved, &mut errors);
        errors.into_result()
    }

    /// A resource with nothing but blank content fields.
    fn is_blank(&self, resource: &Resource) -> bool {
        resource.is_blank(
            self.fields()
                .iter()
                .filter(|f| f.content)
                .map(|f| f.name.as_str()),
        )
    }
}

pub fn check_required(fields: &[FieldSpec], attributes: &Attributes, errors: &mut ValidationErrors) {
    for field in fields.iter().filter(|f| f.required) {
        let blank = attributes
            .get(&field.name)
            .map(is_blank_value)
            .unwrap_or(true);
        if blank {
            errors.add(&field.name, format!("{} is required.", field.label));
        }
    }
}

pub fn check_reserved(attributes: &Attributes, reserved: &ReservedKeys, errors: &mut ValidationErrors) {
    for key in attributes.keys().filter(|k| reserved.contains(k.as_str())) {
        errors.add(key, format!("\"{key}\" is a reserved name and cannot be used."));
    }
}

/// Extra validation hook for a [`Schema`].
pub type Check = fn(&Attributes, &mut ValidationErrors);

/// Data-driven [`ResourceKind`].
#[derive(Debug, Clone)]
pub struct Schema {
    name: String,
    title: String,
    path: String,
    label_field: String,
    fields: Vec<FieldSpec>,
    defaults: Attributes,
    comparator: Comparator,
    checks: Vec<Check>,
}

impl Schema {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            title: name.clone(),
            name,
            path: path.into(),
            label_field: "name".to_string(),
            fields: Vec::new(),
            defaults: Attributes::new(),
            comparator: Comparator::Insertion,
            checks: Vec::new(),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn label_field(mut self, field: impl Into<String>) -> Self {
        self.label_field = field.into();
        self
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn default_value(mut self, field: impl Into<String>, value: Value) -> Self {
        self.defaults.insert(field.into(), value);
        self
    }

    pub fn comparator(mut self, comparator: Comparator) -> Self {
        self.comparator = comparator;
        self
    }

    pub fn check(mut self, check: Check) -> Self {
        self.checks.push(check);
        self
    }
}

impl ResourceKind for Schema {
    fn name(&self) -> &str {
        &self.name
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    fn label_field(&self) -> &str {
        &self.label_field
    }

    fn defaults(&self) -> Attributes {
        self.defaults.clone()
    }

    fn comparator(&self) -> Comparator {
        self.comparator.clone()
    }

    fn validate(&self, attributes: &Attributes, reserved: &ReservedKeys) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_required(&self.fields, attributes, &mut errors);
        check_reserved(attributes, reserved, &mut errors);
        for check in &self.checks {
            check(attributes, &mut errors);
        }
        errors.into_result()
    }
}

/// Course certificates.
pub fn certificate() -> Schema {
    Schema::new("certificate", "certificates")
        .title("Certificate")
        .field(FieldSpec::text("name", "Certificate name").required().content())
        .field(FieldSpec::new("description", "Description", FieldInput::TextArea).content())
        .field(FieldSpec::text("course_title", "Course title override").content())
        .field(FieldSpec::new("signatories", "Signatories", FieldInput::List))
        .field(FieldSpec::new("is_active", "Active", FieldInput::Checkbox))
        .default_value("is_active", json!(false))
        .default_value("version", json!(1))
        .default_value("signatories", json!([]))
        .check(check_signatories)
}

fn check_signatories(attributes: &Attributes, errors: &mut ValidationErrors) {
    let Some(Value::Array(signatories)) = attributes.get("signatories") else {
        return;
    };
    let unnamed = signatories
        .iter()
        .any(|s| s.get("name").map(is_blank_value).unwrap_or(true));
    if unnamed {
        errors.add("signatories", "Every signatory needs a name.");
    }
}

/// Experiment and content group configurations.
pub fn group_configuration() -> Schema {
    Schema::new("group_configuration", "group_configurations")
        .title("Group Configuration")
        .field(FieldSpec::text("name", "Group configuration name").required().content())
        .field(FieldSpec::new("description", "Description", FieldInput::TextArea).content())
        .field(FieldSpec::new("groups", "Groups", FieldInput::List))
        .default_value("scheme", json!("random"))
        .default_value("version", json!(3))
        .default_value("groups", json!([]))
        .comparator(Comparator::Ascending("name".to_string()))
        .check(check_groups)
}

fn check_groups(attributes: &Attributes, errors: &mut ValidationErrors) {
    let groups = match attributes.get("groups") {
        Some(Value::Array(groups)) => groups,
        _ => {
            errors.add("groups", "There must be at least one group.");
            return;
        }
    };
    if groups.is_empty() {
        errors.add("groups", "There must be at least one group.");
        return;
    }
    let mut seen = HashSet::new();
    for group in groups {
        let name = group.get("name").and_then(Value::as_str).unwrap_or("").trim();
        if name.is_empty() {
            errors.add("groups", "All groups must have a name.");
            return;
        }
        if !seen.insert(name.to_lowercase()) {
            errors.add("groups", "All groups must have a unique name.");
            return;
        }
    }
}

/// PDF textbooks.
pub fn textbook() -> Schema {
    Schema::new("textbook", "textbooks")
        .title("Textbook")
        .label_field("tab_title")
        .field(FieldSpec::text("tab_title", "Textbook name").required().content())
        .field(FieldSpec::new("chapters", "Chapters", FieldInput::List).content())
        .default_value("chapters", json!([]))
        .check(check_chapters)
}

fn check_chapters(attributes: &Attributes, errors: &mut ValidationErrors) {
    let chapters = match attributes.get("chapters") {
        Some(Value::Array(chapters)) if !chapters.is_empty() => chapters,
        _ => {
            errors.add("chapters", "Please add at least one chapter.");
            return;
        }
    };
    for chapter in chapters {
        if chapter.get("title").map(is_blank_value).unwrap_or(true) {
            errors.add("chapters", "All chapters must have a name.");
            return;
        }
        if chapter.get("url").map(is_blank_value).unwrap_or(true) {
            errors.add("chapters", "All chapters must have an asset.");
            return;
        }
    }
}

/// Look up a built-in kind by name. Accepts `-` or `_` separators.
pub fn builtin(name: &str) -> Option<Schema> {
    match name.replace('-', "_").as_str() {
        "certificate" | "certificates" => Some(certificate()),
        "group_configuration" | "group_configurations" => Some(group_configuration()),
        "textbook" | "textbooks" => Some(textbook()),
        _ => None,
    }
}
