//! `<database>.<collection>` namespace handling.
//!
//! Legacy OP_QUERY carries the namespace pre-joined as `fullCollectionName`
//! (e.g. `"admin.$cmd"`); OP_MSG carries the two halves separately (`$db`
//! plus a per-command collection field). [`Namespace`] is the shared shape
//! both paths normalize into before reaching `executor.rs`.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub database: String,
    pub collection: String,
}

impl Namespace {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }

    /// Splits a legacy `fullCollectionName` such as `"test.trainers"` into
    /// its database and collection halves.
    pub fn parse_full_collection_name(fqn: &str) -> Option<Namespace> {
        fqn.split_once('.')
            .map(|(db, coll)| Namespace::new(db, coll))
    }

    pub fn full(&self) -> String {
        format!("{}.{}", self.database, self.collection)
    }

    pub fn is_admin(&self) -> bool {
        self.database == "admin"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_full_collection_name() {
        let ns = Namespace::parse_full_collection_name("test.trainers").unwrap();
        assert_eq!(ns.database, "test");
        assert_eq!(ns.collection, "trainers");
    }

    #[test]
    fn rejects_name_without_a_dot() {
        assert!(Namespace::parse_full_collection_name("test").is_none());
    }

    #[test]
    fn full_rejoins_the_two_halves() {
        let ns = Namespace::new("test", "trainers");
        assert_eq!(ns.full(), "test.trainers");
    }

    #[test]
    fn admin_cmd_namespace_is_admin() {
        let ns = Namespace::new("admin", "$cmd");
        assert!(ns.is_admin());
    }
}
