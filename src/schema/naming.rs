// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Mapping from schema names to SQL and expression names.

use convert_case::{Case, Casing};

/// Table backing a model: `UserProfile` -> `user_profile`.
pub fn table_name(model: &str) -> String {
    model.to_case(Case::Snake)
}

/// Column backing a field: `emailVerified` -> `email_verified`.
pub fn column_name(field: &str) -> String {
    field.to_case(Case::Snake)
}

/// Name a model is referred to by inside expressions: `UserProfile` -> `userProfile`.
pub fn identifier_root(model: &str) -> String {
    model.to_case(Case::Camel)
}

/// Implicit foreign key field for a belongs-to relationship: `author` -> `authorId`.
pub fn foreign_key_field(field: &str) -> String {
    format!("{field}Id")
}

/// Alias of the table reached by following `field` from `parent`.
pub fn join_alias(parent: &str, field: &str) -> String {
    format!("{parent}${}", column_name(field))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn casing() {
        assert_eq!(table_name("UserProfile"), "user_profile");
        assert_eq!(table_name("Post"), "post");
        assert_eq!(column_name("authorId"), "author_id");
        assert_eq!(column_name("title"), "title");
        assert_eq!(identifier_root("UserProfile"), "userProfile");
        assert_eq!(foreign_key_field("author"), "authorId");
        assert_eq!(join_alias("post$author", "publisher"), "post$author$publisher");
        assert_eq!(join_alias("identity", "userProfile"), "identity$user_profile");
    }
}
