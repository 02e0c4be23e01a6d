//! The runtime view of an entity instance.

use crate::value::Value;

/// A trackable entity instance.
///
/// Implementations expose their column values in declaration order; the
/// change tracker and statement rendering work only through this view.
pub trait Entity: Send + Sync + 'static {
    /// Entity type name, used as the key prefix.
    fn type_name(&self) -> &str;

    /// Table the entity is stored in.
    fn table_name(&self) -> &str;

    /// Primary-key column names.
    fn primary_key(&self) -> &[&str];

    /// Column/value pairs in declaration order.
    fn values(&self) -> Vec<(&str, Value)>;

    /// Value of a single column.
    fn value(&self, column: &str) -> Option<Value> {
        self.values()
            .into_iter()
            .find(|(c, _)| *c == column)
            .map(|(_, v)| v)
    }

    /// Values of the primary-key columns, `None` when any of them is unset.
    fn key_values(&self) -> Option<Vec<Value>> {
        let pk = self.primary_key();
        if pk.is_empty() {
            return None;
        }
        let mut out = Vec::with_capacity(pk.len());
        for column in pk {
            let value = self.value(column)?;
            if value.is_zero() {
                return None;
            }
            out.push(value);
        }
        Some(out)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Entity fixture shared by the crate's tests.
    #[derive(Debug, Clone, PartialEq)]
    pub(crate) struct Person {
        pub id: i64,
        pub name: String,
        pub tags: Vec<String>,
    }

    impl Person {
        pub(crate) fn new(id: i64, name: &str) -> Self {
            Self {
                id,
                name: name.to_string(),
                tags: Vec::new(),
            }
        }
    }

    impl Entity for Person {
        fn type_name(&self) -> &str {
            "Person"
        }

        fn table_name(&self) -> &str {
            "people"
        }

        fn primary_key(&self) -> &[&str] {
            &["id"]
        }

        fn values(&self) -> Vec<(&str, Value)> {
            vec![
                ("id", Value::Int(self.id)),
                ("name", Value::from(self.name.as_str())),
                (
                    "tags",
                    Value::List(self.tags.iter().map(|t| Value::from(t.as_str())).collect()),
                ),
            ]
        }
    }

    #[test]
    fn test_value_lookup() {
        let p = Person::new(3, "Ada");
        assert_eq!(p.value("name"), Some(Value::from("Ada")));
        assert_eq!(p.value("missing"), None);
    }

    #[test]
    fn test_key_values() {
        assert_eq!(Person::new(3, "Ada").key_values(), Some(vec![Value::Int(3)]));
        assert_eq!(Person::new(0, "Ada").key_values(), None);
    }
}
