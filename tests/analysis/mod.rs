// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::{anyhow, Result};
use permsql::analysis::{self, AnalysisError, FieldLookup, LookupValue};
use permsql::traversal::SpannedIdent;
use permsql::*;

const SCHEMA: &str = r#"
models:
  - name: Post
    fields:
      - name: title
        type: Text
      - name: site
        type: Number
      - name: author
        type: Author
      - name: public
        type: Boolean
    actions:
      - name: getPost
        type: get
        permissions:
          - expression: post.public == true or post.author.identity == ctx.identity
      - name: listPosts
        type: list
        permissions:
          - expression: post.site == 7 and (post.title == "a" or post.title == "b")
  - name: Author
    fields:
      - name: identity
        type: Identity
        unique: true
"#;

fn rule(schema: &Schema, model: &str, action: &str) -> Result<Expression> {
    schema
        .models
        .iter()
        .find(|m| m.name == model)
        .and_then(|m| m.action(action))
        .and_then(|a| a.permissions.first())
        .and_then(|p| p.expression.clone())
        .ok_or_else(|| anyhow!("no rule for {model}.{action}"))
}

fn describe(lookups: &[FieldLookup]) -> Vec<String> {
    lookups
        .iter()
        .map(|lookup| match &lookup.value {
            LookupValue::Literal(l) => format!("{}={l}", lookup.field),
            LookupValue::Ident(i) => format!("{}={i}", lookup.field),
        })
        .collect()
}

#[test]
fn identifiers_of_schema_rules() -> Result<()> {
    let schema = Schema::from_yaml_str(SCHEMA)?;
    let expression = rule(&schema, "Post", "getPost")?;

    assert_eq!(
        analysis::identifiers(&expression)?,
        vec!["post.public", "post.author.identity", "ctx.identity"]
    );

    let spanned: Vec<SpannedIdent> = analysis::spanned_identifiers(&expression)?;
    assert_eq!(spanned.len(), 3);
    assert_eq!(spanned[2].fragments, vec!["ctx", "identity"]);
    assert_eq!(spanned[2].span.offset, 47);
    Ok(())
}

#[test]
fn lookups_of_schema_rules() -> Result<()> {
    let schema = Schema::from_yaml_str(SCHEMA)?;

    let get = rule(&schema, "Post", "getPost")?;
    let groups = analysis::field_lookups(&get, "post")?;
    assert_eq!(groups.len(), 2);
    assert_eq!(describe(&groups[0]), vec!["post.public=true"]);
    assert_eq!(
        describe(&groups[1]),
        vec!["post.author.identity=ctx.identity"]
    );
    assert!(analysis::definitive_lookups(&get, "post")?.is_empty());

    let list = rule(&schema, "Post", "listPosts")?;
    let groups = analysis::field_lookups(&list, "post")?;
    assert_eq!(
        groups.iter().map(|g| describe(g)).collect::<Vec<_>>(),
        vec![
            vec!["post.site=7", "post.title=\"a\""],
            vec!["post.site=7", "post.title=\"b\""],
        ]
    );
    assert_eq!(
        describe(&analysis::definitive_lookups(&list, "post")?),
        vec!["post.site=7"]
    );
    Ok(())
}

#[test]
fn lookups_for_another_model_are_empty() -> Result<()> {
    let expression = Expression::parse("post.site == 7")?;
    assert_eq!(
        analysis::field_lookups(&expression, "author")?,
        vec![Vec::<FieldLookup>::new()]
    );
    Ok(())
}

#[test]
fn grouped_comparison_operands_have_no_lookups() -> Result<()> {
    for source in [
        "(post.id == 1 or post.id == 2) == false",
        "false == (post.id == 1 or post.id == 2)",
        "(post.site == 7 and post.title == \"a\") != true",
        "true != (post.site == 7 and post.title == \"a\")",
    ] {
        let expression = Expression::parse(source)?;
        assert_eq!(
            analysis::field_lookups(&expression, "post")?,
            vec![Vec::<FieldLookup>::new()],
            "{source}"
        );
        assert!(analysis::definitive_lookups(&expression, "post")?.is_empty());
    }
    Ok(())
}

#[test]
fn condition_counts() -> Result<()> {
    let schema = Schema::from_yaml_str(SCHEMA)?;
    assert_eq!(
        analysis::condition_count(&rule(&schema, "Post", "getPost")?)?,
        2
    );
    assert_eq!(
        analysis::condition_count(&rule(&schema, "Post", "listPosts")?)?,
        3
    );
    assert_eq!(analysis::condition_count(&Expression::parse("true")?)?, 1);
    Ok(())
}

#[test]
fn single_values_and_identifiers() -> Result<()> {
    assert_eq!(analysis::single_value::<i64>(&Expression::parse("-3")?)?, -3);
    assert_eq!(
        analysis::single_value::<String>(&Expression::parse(r#""draft""#)?)?,
        "draft"
    );
    assert_eq!(
        analysis::single_value::<Vec<bool>>(&Expression::parse("[true, false]")?)?,
        vec![true, false]
    );
    assert_eq!(
        analysis::single_value::<bool>(&Expression::parse("1")?),
        Err(AnalysisError::ValueTypeMismatch {
            expected: "boolean",
            found: "number"
        })
    );
    assert_eq!(
        analysis::single_value::<i64>(&Expression::parse("1 + 1")?),
        Err(AnalysisError::NotSingleValue { expected: "integer" })
    );

    let ident: String = analysis::single_identifier(&Expression::parse("post.author")?)?;
    assert_eq!(ident, "post.author");
    assert_eq!(
        analysis::single_identifier::<String>(&Expression::parse("post.a == post.b")?),
        Err(AnalysisError::NotSingleIdentifier)
    );
    Ok(())
}

#[test]
fn rendering_is_idempotent_over_schema_rules() -> Result<()> {
    let schema = Schema::from_yaml_str(SCHEMA)?;
    for model in &schema.models {
        for action in &model.actions {
            for permission in &action.permissions {
                let Some(expression) = &permission.expression else {
                    continue;
                };
                let rendered = analysis::render(expression)?;
                assert_eq!(analysis::render(&Expression::parse(&rendered)?)?, rendered);
            }
        }
    }
    Ok(())
}
