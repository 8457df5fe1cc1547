// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::{bail, Result};
use permsql::*;
use serde::Deserialize;
use test_generator::test_resources;

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct TestCase {
    note: String,
    model: String,
    action: String,
    #[serde(default)]
    sql: Option<String>,
    #[serde(default)]
    values: Option<Vec<String>>,
    #[serde(default)]
    joins: Option<usize>,
    #[serde(default)]
    role_only: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct YamlTest {
    schema: Schema,
    cases: Vec<TestCase>,
}

fn check_predicate(case: &TestCase, predicate: Option<CompiledPredicate>) -> Result<()> {
    let Some(predicate) = predicate else {
        if case.role_only {
            return Ok(());
        }
        bail!("expected a predicate but the permission is role only");
    };
    if case.role_only {
        bail!("expected role only, got {}", predicate.sql);
    }

    if let Some(sql) = &case.sql {
        // Expected sql may be folded across lines for readability.
        let sql = sql.split_whitespace().collect::<Vec<_>>().join(" ");
        if sql != predicate.sql {
            bail!("sql mismatch\nleft  = {}\nright = {sql}", predicate.sql);
        }
    }

    if let Some(values) = &case.values {
        let computed: Vec<String> = predicate.values.iter().map(ToString::to_string).collect();
        assert_eq!(&computed, values, "values mismatch");
    }

    if let Some(joins) = case.joins {
        assert_eq!(predicate.joins.len(), joins, "join count mismatch");
    }

    // Invariants every predicate upholds.
    assert_eq!(predicate.sql.matches('?').count(), predicate.values.len());
    assert_eq!(predicate.values.last(), Some(&QueryParam::RecordIds));
    for join in &predicate.joins {
        assert_eq!(
            predicate.sql.matches(&join.to_string()).count(),
            1,
            "join emitted more than once"
        );
    }
    Ok(())
}

fn yaml_test_impl(file: &str) -> Result<()> {
    println!("\nrunning {file}");

    let yaml_str = std::fs::read_to_string(file)?;
    let test: YamlTest = serde_yaml::from_str(&yaml_str)?;

    for case in &test.cases {
        print!("\ncase {} ", case.note);
        let first = compile_permission(&test.schema, &case.model, &case.action);

        match (first, &case.error) {
            (Ok(predicate), None) => {
                // Compiling again must give byte-identical output.
                let again = compile_permission(&test.schema, &case.model, &case.action)?;
                assert_eq!(predicate, again, "compilation is not deterministic");
                check_predicate(case, predicate)?;
            }
            (Err(e), Some(expected)) => {
                let message = e.to_string();
                if !message.contains(expected.as_str()) {
                    bail!("error `{message}` does not contain `{expected}`");
                }
                assert!(
                    matches!(row_filter(&test.schema, &case.model, &case.action), RowFilter::Deny),
                    "compile errors must deny"
                );
            }
            (Ok(predicate), Some(expected)) => {
                bail!("expected error `{expected}` but compiled {predicate:?}")
            }
            (Err(e), None) => return Err(e.into()),
        }
        println!("passed");
    }

    println!("{} cases passed.", test.cases.len());
    Ok(())
}

fn yaml_test(file: &str) -> Result<()> {
    match yaml_test_impl(file) {
        Ok(_) => Ok(()),
        Err(e) => {
            // If Err is returned, it doesn't always get printed by cargo test.
            // Therefore, panic with the error.
            panic!("{}", e);
        }
    }
}

#[test_resources("tests/compiler/cases/*.yaml")]
fn run(path: &str) {
    yaml_test(path).unwrap()
}
