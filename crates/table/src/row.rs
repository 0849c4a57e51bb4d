use std::collections::BTreeMap;
use std::fmt;
use strata_sats::buffer::DecodeError;
use strata_sats::{codec, key, Value, ValueTypeError};
use strata_schema::{Schema, Tag};

static NULL: Value = Value::Null;

/// A row of a table: a mapping from column tag to value.
///
/// Null values are not stored, so a row without a value for some column
/// reads as null there, and setting a column to null removes it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Row {
    values: BTreeMap<Tag, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `self` with `tag` set to `value`.
    pub fn with(mut self, tag: impl Into<Tag>, value: impl Into<Value>) -> Self {
        self.set(tag, value);
        self
    }

    pub fn set(&mut self, tag: impl Into<Tag>, value: impl Into<Value>) {
        let tag = tag.into();
        match value.into() {
            Value::Null => {
                self.values.remove(&tag);
            }
            value => {
                self.values.insert(tag, value);
            }
        }
    }

    pub fn remove(&mut self, tag: Tag) -> Value {
        self.values.remove(&tag).unwrap_or(Value::Null)
    }

    /// Returns the value of `tag`, which is null when unset.
    pub fn value(&self, tag: Tag) -> &Value {
        self.values.get(&tag).unwrap_or(&NULL)
    }

    /// Reads `tag` as a `T`, failing if it holds a value of another kind or is null.
    ///
    /// ```
    /// # use strata_table::Row;
    /// let row = Row::new().with(1u64, 7i64).with(2u64, "seven");
    /// assert_eq!(row.get::<i64>(1u64.into()), Ok(7));
    /// assert_eq!(row.get::<&str>(2u64.into()), Ok("seven"));
    /// assert!(row.get::<bool>(2u64.into()).is_err());
    /// ```
    pub fn get<'a, T>(&'a self, tag: Tag) -> Result<T, ValueTypeError>
    where
        T: TryFrom<&'a Value, Error = ValueTypeError>,
    {
        T::try_from(self.value(tag))
    }

    /// Like [`Row::get`], but reads null as `None`.
    pub fn get_opt<'a, T>(&'a self, tag: Tag) -> Result<Option<T>, ValueTypeError>
    where
        T: TryFrom<&'a Value, Error = ValueTypeError>,
    {
        self.values.get(&tag).map(T::try_from).transpose()
    }

    pub fn is_null(&self, tag: Tag) -> bool {
        !self.values.contains_key(&tag)
    }

    /// Iterates the non-null values in tag order.
    pub fn iter(&self) -> impl Iterator<Item = (Tag, &Value)> + '_ {
        self.values.iter().map(|(t, v)| (*t, v))
    }

    /// Returns the values of `tags`, in order.
    pub fn project(&self, tags: &[Tag]) -> Vec<Value> {
        tags.iter().map(|&t| self.value(t).clone()).collect()
    }

    /// Encodes the primary key of this row under `schema`.
    pub(crate) fn key(&self, schema: &Schema) -> Box<[u8]> {
        key::encode_key(&self.project(schema.pk_tags()))
    }

    /// Encodes the stored body of this row: its non-null, non-key values in tag order.
    /// Values of tags that are not columns of `schema` are left out.
    pub(crate) fn body(&self, schema: &Schema) -> Vec<u8> {
        let body: BTreeMap<Tag, &Value> = self
            .values
            .iter()
            .filter(|(t, _)| schema.columns().contains_tag(**t) && !schema.pk_tags().contains(*t))
            .map(|(t, v)| (*t, v))
            .collect();
        codec::to_vec(&body)
    }

    /// Decodes a row from a stored key and body.
    pub(crate) fn decode(schema: &Schema, key: &[u8], body: &[u8]) -> Result<Self, DecodeError> {
        let pk_values = key::decode_key(key)?;
        if pk_values.len() != schema.pk_tags().len() {
            return Err(DecodeError::ShortKey {
                expected: schema.pk_tags().len(),
                found: pk_values.len(),
            });
        }
        let mut row = Row {
            values: codec::from_slice(body)?,
        };
        for (&tag, value) in schema.pk_tags().iter().zip(pk_values) {
            row.set(tag, value);
        }
        Ok(row)
    }
}

impl<T: Into<Tag>, V: Into<Value>> FromIterator<(T, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (T, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (t, v) in iter {
            row.set(t, v);
        }
        row
    }
}

/// Displays values as a bracketed, comma separated list, as error messages show keys.
pub(crate) struct DisplayValues<'a>(pub &'a [Value]);

impl fmt::Display for DisplayValues<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{v}")?;
        }
        f.write_str("]")
    }
}
