use crate::error::SchemaError;
use crate::Result;
use strata_primitives::Tag;
use strata_sats::{TypeInfo, Value};

/// A column of a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Column {
    /// The column's identity, stable across renames and reorderings.
    pub tag: Tag,
    pub name: Box<str>,
    pub ty: TypeInfo,
    pub is_part_of_pk: bool,
    pub nullable: bool,
    /// The value stored for rows that don't specify this column,
    /// already converted to `ty`.
    pub default: Option<Value>,
    pub comment: Box<str>,
}

impl Column {
    /// Returns a nullable, non-key column with no default and no comment.
    pub fn new(tag: impl Into<Tag>, name: impl Into<Box<str>>, ty: TypeInfo) -> Self {
        Self {
            tag: tag.into(),
            name: name.into(),
            ty,
            is_part_of_pk: false,
            nullable: true,
            default: None,
            comment: "".into(),
        }
    }

    /// Returns a non-nullable primary key column.
    pub fn primary_key(tag: impl Into<Tag>, name: impl Into<Box<str>>, ty: TypeInfo) -> Self {
        Self {
            is_part_of_pk: true,
            nullable: false,
            ..Self::new(tag, name, ty)
        }
    }

    pub fn not_null(self) -> Self {
        Self { nullable: false, ..self }
    }

    pub fn with_default(self, default: impl Into<Value>) -> Self {
        Self {
            default: Some(default.into()),
            ..self
        }
    }

    pub fn with_comment(self, comment: impl Into<Box<str>>) -> Self {
        Self {
            comment: comment.into(),
            ..self
        }
    }

    /// The value a row gets for this column when it doesn't specify one.
    pub fn default_value(&self) -> Value {
        self.default.clone().unwrap_or(Value::Null)
    }
}

/// Where to place a column that is added or modified.
/// `None` in its place keeps a modified column where it is and appends an added one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnOrder {
    First,
    After(Box<str>),
}

/// The columns of a schema, in declaration order.
///
/// No two columns share a tag or, ignoring case, a name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ColumnCollection {
    cols: Vec<Column>,
}

impl ColumnCollection {
    pub fn new(cols: Vec<Column>) -> Result<Self> {
        let mut coll = Self::default();
        for col in cols {
            coll.check_insertable(&col)?;
            coll.cols.push(col);
        }
        Ok(coll)
    }

    fn check_insertable(&self, col: &Column) -> Result<()> {
        if let Some(existing) = self.get_by_tag(col.tag) {
            return Err(if existing.name.eq_ignore_ascii_case(&col.name) {
                SchemaError::DuplicateColumnName { name: col.name.clone() }
            } else {
                SchemaError::DuplicateTag { tag: col.tag }
            });
        }
        if self.get_by_name_insensitive(&col.name).is_some() {
            return Err(SchemaError::DuplicateColumnName { name: col.name.clone() });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.cols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cols.is_empty()
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Column> + '_ {
        self.cols.iter()
    }

    pub fn tags(&self) -> impl Iterator<Item = Tag> + '_ {
        self.cols.iter().map(|c| c.tag)
    }

    pub fn get_by_tag(&self, tag: Tag) -> Option<&Column> {
        self.cols.iter().find(|c| c.tag == tag)
    }

    pub fn contains_tag(&self, tag: Tag) -> bool {
        self.get_by_tag(tag).is_some()
    }

    /// Looks up a column by its exact name.
    pub fn get_by_name(&self, name: &str) -> Option<&Column> {
        self.cols.iter().find(|c| &*c.name == name)
    }

    /// Looks up a column by name, ignoring ASCII case as SQL identifiers do.
    pub fn get_by_name_insensitive(&self, name: &str) -> Option<&Column> {
        self.cols.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Returns the position of `tag` in declaration order.
    pub fn position(&self, tag: Tag) -> Option<usize> {
        self.cols.iter().position(|c| c.tag == tag)
    }

    fn insertion_index(&self, order: Option<&ColumnOrder>) -> Result<usize> {
        match order {
            None => Ok(self.cols.len()),
            Some(ColumnOrder::First) => Ok(0),
            Some(ColumnOrder::After(name)) => self
                .cols
                .iter()
                .position(|c| c.name.eq_ignore_ascii_case(name))
                .map(|i| i + 1)
                .ok_or_else(|| SchemaError::InvalidOrderTarget { column: name.clone() }),
        }
    }

    /// Inserts `col` at the position described by `order`.
    pub fn insert(&mut self, col: Column, order: Option<&ColumnOrder>) -> Result<()> {
        if let Some(existing) = self.get_by_tag(col.tag) {
            return Err(SchemaError::TagCollision {
                column: col.name.clone(),
                tag: col.tag,
                existing: existing.name.clone(),
            });
        }
        self.check_insertable(&col)?;
        let at = self.insertion_index(order)?;
        self.cols.insert(at, col);
        Ok(())
    }

    /// Removes and returns the column with `tag`.
    pub fn remove(&mut self, tag: Tag) -> Result<Column> {
        let at = self.position(tag).ok_or(SchemaError::UnknownTag { tag })?;
        Ok(self.cols.remove(at))
    }

    /// Replaces the column with tag `col.tag` by `col`, moving it if `order` is given.
    pub fn replace(&mut self, col: Column, order: Option<&ColumnOrder>) -> Result<Column> {
        let at = self.position(col.tag).ok_or(SchemaError::UnknownTag { tag: col.tag })?;
        let clash = self
            .get_by_name_insensitive(&col.name)
            .is_some_and(|other| other.tag != col.tag);
        if clash {
            return Err(SchemaError::DuplicateColumnName { name: col.name.clone() });
        }
        if order.is_none() {
            return Ok(std::mem::replace(&mut self.cols[at], col));
        }
        let old = self.cols.remove(at);
        let result = self.insertion_index(order);
        match result {
            Ok(to) => {
                self.cols.insert(to, col);
                Ok(old)
            }
            Err(e) => {
                // Put the original back so a failed move leaves no trace.
                self.cols.insert(at, old);
                Err(e)
            }
        }
    }
}

impl<'a> IntoIterator for &'a ColumnCollection {
    type Item = &'a Column;
    type IntoIter = std::slice::Iter<'a, Column>;

    fn into_iter(self) -> Self::IntoIter {
        self.cols.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn coll() -> ColumnCollection {
        ColumnCollection::new(vec![
            Column::primary_key(1u64, "id", TypeInfo::Int),
            Column::new(2u64, "name", TypeInfo::Text),
        ])
        .unwrap()
    }

    fn names(coll: &ColumnCollection) -> Vec<&str> {
        coll.iter().map(|c| &*c.name).collect()
    }

    #[test]
    fn names_are_case_insensitive() {
        let coll = coll();
        assert_eq!(coll.get_by_name_insensitive("NAME").unwrap().tag, Tag(2));
        assert!(coll.get_by_name("NAME").is_none());
        let err = ColumnCollection::new(vec![
            Column::new(1u64, "a", TypeInfo::Int),
            Column::new(2u64, "A", TypeInfo::Int),
        ])
        .unwrap_err();
        assert_eq!(err, SchemaError::DuplicateColumnName { name: "A".into() });
    }

    #[test]
    fn insert_respects_order() {
        let mut coll = coll();
        coll.insert(Column::new(3u64, "age", TypeInfo::Int), None).unwrap();
        coll.insert(Column::new(4u64, "first", TypeInfo::Int), Some(&ColumnOrder::First))
            .unwrap();
        coll.insert(Column::new(5u64, "mid", TypeInfo::Int), Some(&ColumnOrder::After("ID".into())))
            .unwrap();
        assert_eq!(names(&coll), ["first", "id", "mid", "name", "age"]);

        let err = coll
            .insert(Column::new(6u64, "x", TypeInfo::Int), Some(&ColumnOrder::After("nope".into())))
            .unwrap_err();
        assert_eq!(err, SchemaError::InvalidOrderTarget { column: "nope".into() });
    }

    #[test]
    fn insert_rejects_tag_collisions() {
        let mut coll = coll();
        let err = coll.insert(Column::new(2u64, "other", TypeInfo::Int), None).unwrap_err();
        assert_eq!(
            err,
            SchemaError::TagCollision {
                column: "other".into(),
                tag: Tag(2),
                existing: "name".into()
            }
        );
    }

    #[test]
    fn replace_can_move() {
        let mut coll = coll();
        let renamed = Column::new(2u64, "full_name", TypeInfo::Text);
        coll.replace(renamed, Some(&ColumnOrder::First)).unwrap();
        assert_eq!(names(&coll), ["full_name", "id"]);

        // A failed move leaves the collection as it was.
        let before = coll.clone();
        let err = coll.replace(Column::new(1u64, "id", TypeInfo::Int), Some(&ColumnOrder::After("zzz".into())));
        assert!(err.is_err());
        assert_eq!(coll, before);
    }
}
