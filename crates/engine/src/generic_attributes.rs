//! Untyped attributes every container carries besides its datatype fields
//!
//! These describe the stored entity in the application (its subject, user
//! tags, visibility) rather than its content. They live in the root side
//! table next to the scalar fields.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use neostore_core::{Error, Gid, Result, Value};

const INVALID: &str = "invalid";
const IS_NAN: &str = "is_nan";
const SUBJECT: &str = "subject";
const STATE: &str = "state";
const TYPE: &str = "type";
const USER_TAGS: [&str; 5] = [
    "user_tag_1",
    "user_tag_2",
    "user_tag_3",
    "user_tag_4",
    "user_tag_5",
];
const VISIBLE: &str = "visible";
const CREATE_DATE: &str = "create_date";
const OPERATION_TAG: &str = "operation_tag";
const PARENT_BURST: &str = "parent_burst";

/// Side-table keys owned by [`GenericAttributes`]
pub fn generic_keys() -> impl Iterator<Item = &'static str> {
    [INVALID, IS_NAN, SUBJECT, STATE, TYPE]
        .into_iter()
        .chain(USER_TAGS)
        .chain([VISIBLE, CREATE_DATE, OPERATION_TAG, PARENT_BURST])
}

/// Application-level attributes of a stored entity
#[derive(Debug, Clone, PartialEq)]
pub struct GenericAttributes {
    /// Marked invalid by a user
    pub invalid: bool,
    /// Data contains NaN values
    pub is_nan: bool,
    /// Subject the data belongs to
    pub subject: String,
    /// Free-form state label
    pub state: Option<String>,
    /// Free-form type label
    pub type_label: String,
    /// Five user tags, empty when unset
    pub user_tags: [String; 5],
    /// Shown in listings
    pub visible: bool,
    /// Creation time
    pub create_date: Option<DateTime<Utc>>,
    /// Tag of the producing operation
    pub operation_tag: Option<String>,
    /// Simulation burst that produced the data
    pub parent_burst: Option<Gid>,
}

impl Default for GenericAttributes {
    fn default() -> Self {
        GenericAttributes {
            invalid: false,
            is_nan: false,
            subject: String::new(),
            state: None,
            type_label: String::new(),
            user_tags: Default::default(),
            visible: true,
            create_date: None,
            operation_tag: None,
            parent_burst: None,
        }
    }
}

impl GenericAttributes {
    /// Side-table entries; unset optional attributes map to `Null`
    pub fn to_entries(&self) -> BTreeMap<String, Value> {
        let mut map = BTreeMap::new();
        map.insert(INVALID.to_string(), Value::Bool(self.invalid));
        map.insert(IS_NAN.to_string(), Value::Bool(self.is_nan));
        map.insert(SUBJECT.to_string(), Value::from(self.subject.as_str()));
        map.insert(STATE.to_string(), optional_string(&self.state));
        map.insert(TYPE.to_string(), Value::from(self.type_label.as_str()));
        for (key, tag) in USER_TAGS.iter().zip(&self.user_tags) {
            map.insert(key.to_string(), Value::from(tag.as_str()));
        }
        map.insert(VISIBLE.to_string(), Value::Bool(self.visible));
        map.insert(
            CREATE_DATE.to_string(),
            self.create_date
                .map(|d| Value::String(d.to_rfc3339()))
                .unwrap_or(Value::Null),
        );
        map.insert(OPERATION_TAG.to_string(), optional_string(&self.operation_tag));
        map.insert(
            PARENT_BURST.to_string(),
            self.parent_burst
                .map(|g| Value::String(g.urn()))
                .unwrap_or(Value::Null),
        );
        map
    }

    /// Read back from a side table; missing keys take their defaults
    ///
    /// # Errors
    /// `TypeMismatch` when a present key holds a value of the wrong type.
    pub fn from_entries(map: &BTreeMap<String, Value>) -> Result<Self> {
        let mut ga = GenericAttributes::default();
        if let Some(v) = read_bool(map, INVALID)? {
            ga.invalid = v;
        }
        if let Some(v) = read_bool(map, IS_NAN)? {
            ga.is_nan = v;
        }
        if let Some(v) = read_string(map, SUBJECT)? {
            ga.subject = v;
        }
        ga.state = read_string(map, STATE)?;
        if let Some(v) = read_string(map, TYPE)? {
            ga.type_label = v;
        }
        for (slot, key) in ga.user_tags.iter_mut().zip(USER_TAGS) {
            if let Some(v) = read_string(map, key)? {
                *slot = v;
            }
        }
        if let Some(v) = read_bool(map, VISIBLE)? {
            ga.visible = v;
        }
        ga.create_date = match read_string(map, CREATE_DATE)? {
            Some(text) => Some(
                DateTime::parse_from_rfc3339(&text)
                    .map_err(|e| Error::type_mismatch(CREATE_DATE, e.to_string()))?
                    .with_timezone(&Utc),
            ),
            None => None,
        };
        ga.operation_tag = read_string(map, OPERATION_TAG)?;
        ga.parent_burst = match read_string(map, PARENT_BURST)? {
            Some(text) => Some(Gid::parse(&text).ok_or_else(|| {
                Error::type_mismatch(PARENT_BURST, format!("'{}' is not a gid", text))
            })?),
            None => None,
        };
        Ok(ga)
    }

    /// Take every attribute that `other` sets away from its default
    pub fn fill_from(&mut self, other: &GenericAttributes) {
        self.invalid = other.invalid;
        self.is_nan = other.is_nan;
        if !other.subject.is_empty() {
            self.subject = other.subject.clone();
        }
        if other.state.is_some() {
            self.state = other.state.clone();
        }
        if !other.type_label.is_empty() {
            self.type_label = other.type_label.clone();
        }
        for (mine, theirs) in self.user_tags.iter_mut().zip(&other.user_tags) {
            if !theirs.is_empty() {
                *mine = theirs.clone();
            }
        }
        self.visible = other.visible;
        if other.create_date.is_some() {
            self.create_date = other.create_date;
        }
        if other.operation_tag.is_some() {
            self.operation_tag = other.operation_tag.clone();
        }
        if other.parent_burst.is_some() {
            self.parent_burst = other.parent_burst;
        }
    }
}

fn optional_string(value: &Option<String>) -> Value {
    value
        .as_deref()
        .map(Value::from)
        .unwrap_or(Value::Null)
}

fn read_bool(map: &BTreeMap<String, Value>, key: &str) -> Result<Option<bool>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_bool()
            .map(Some)
            .ok_or_else(|| Error::type_mismatch(key, format!("expected Bool, got {}", v.type_name()))),
    }
}

fn read_string(map: &BTreeMap<String, Value>, key: &str) -> Result<Option<String>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(v) => Err(Error::type_mismatch(
            key,
            format!("expected String, got {}", v.type_name()),
        )),
    }
}
