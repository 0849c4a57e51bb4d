//! The canonical encoding of schemas.
//!
//! Columns are written in declaration order, then the primary key tags,
//! then the indexes sorted by name, so equal schemas always hash equal.

use crate::column::Column;
use crate::index::{Index, IndexCollection};
use crate::schema::Schema;
use strata_primitives::TagList;
use strata_sats::buffer::{BufReader, BufWriter, DecodeError};
use strata_sats::codec::{self, Decode, Encode};
use strata_sats::{hash_bytes, Hash, TypeInfo, Value};

impl Encode for Column {
    fn encode(&self, w: &mut impl BufWriter) {
        self.tag.encode(w);
        self.name.encode(w);
        self.ty.encode(w);
        self.is_part_of_pk.encode(w);
        self.nullable.encode(w);
        self.default.encode(w);
        self.comment.encode(w);
    }
}

impl<'de> Decode<'de> for Column {
    fn decode(r: &mut impl BufReader<'de>) -> Result<Self, DecodeError> {
        Ok(Column {
            tag: Decode::decode(r)?,
            name: Box::<str>::decode(r)?,
            ty: TypeInfo::decode(r)?,
            is_part_of_pk: bool::decode(r)?,
            nullable: bool::decode(r)?,
            default: Option::<Value>::decode(r)?,
            comment: Box::<str>::decode(r)?,
        })
    }
}

impl Encode for Index {
    fn encode(&self, w: &mut impl BufWriter) {
        self.name.encode(w);
        self.tags.encode(w);
        self.unique.encode(w);
        self.comment.encode(w);
    }
}

impl<'de> Decode<'de> for Index {
    fn decode(r: &mut impl BufReader<'de>) -> Result<Self, DecodeError> {
        Ok(Index {
            name: Box::<str>::decode(r)?,
            tags: TagList::decode(r)?,
            unique: bool::decode(r)?,
            comment: Box::<str>::decode(r)?,
        })
    }
}

impl Encode for IndexCollection {
    fn encode(&self, w: &mut impl BufWriter) {
        codec::put_len(w, self.len());
        for index in self.iter() {
            index.encode(w);
        }
    }
}

impl<'de> Decode<'de> for IndexCollection {
    fn decode(r: &mut impl BufReader<'de>) -> Result<Self, DecodeError> {
        Vec::<Index>::decode(r).map(IndexCollection::from_indexes)
    }
}

impl IndexCollection {
    /// The content hash of the registry.
    pub fn hash(&self) -> Hash {
        hash_bytes(codec::to_vec(self))
    }
}

impl Encode for Schema {
    fn encode(&self, w: &mut impl BufWriter) {
        codec::put_len(w, self.columns().len());
        for col in self.columns() {
            col.encode(w);
        }
        self.pk_tags().encode(w);
        self.indexes().encode(w);
    }
}

impl Schema {
    /// Decodes and validates a schema written by its [`Encode`] impl.
    pub fn from_bytes(bytes: &[u8]) -> crate::Result<Schema> {
        let (columns, pk_tags, indexes) = codec::from_slice::<(Vec<Column>, TagList, IndexCollection)>(bytes)?;
        Schema::from_parts(columns, pk_tags, indexes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IndexProperties;
    use pretty_assertions::assert_eq;

    #[test]
    fn schemas_decode() {
        let mut schema = Schema::new(vec![
            Column::primary_key(10u64, "id", TypeInfo::Uint),
            Column::new(11u64, "label", TypeInfo::Varchar { max_len: 8 })
                .with_default("none")
                .with_comment("shown to users"),
        ])
        .unwrap();
        schema
            .add_index_by_col_names("by_label", &["label"], IndexProperties::unique())
            .unwrap();

        let bytes = codec::to_vec(&schema);
        assert_eq!(Schema::from_bytes(&bytes).unwrap(), schema);
    }

    #[test]
    fn invalid_schemas_are_rejected() {
        let bytes = codec::to_vec(&(vec![Column::new(1u64, "a", TypeInfo::Int)], TagList::new(), IndexCollection::default()));
        assert!(matches!(Schema::from_bytes(&bytes), Err(crate::SchemaError::EmptyPrimaryKey)));
    }
}
