// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::{bail, Result};
use permsql::analysis::render;
use permsql::*;
use serde::Deserialize;
use test_generator::test_resources;

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct TestCase {
    note: String,
    expr: String,
    #[serde(default)]
    canonical: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct YamlTest {
    cases: Vec<TestCase>,
}

fn yaml_test_impl(file: &str) -> Result<()> {
    println!("\nrunning {file}");

    let yaml_str = std::fs::read_to_string(file)?;
    let test: YamlTest = serde_yaml::from_str(&yaml_str)?;

    for case in &test.cases {
        print!("\ncase {} ", case.note);
        match (Expression::parse(&case.expr), &case.error) {
            (Ok(expression), None) => {
                let rendered = render(&expression)?;
                let expected = case.canonical.as_deref().unwrap_or(&case.expr);
                if rendered != expected {
                    bail!("canonical form mismatch\nleft  = {rendered}\nright = {expected}");
                }
                // The canonical form is a fixed point.
                assert_eq!(render(&Expression::parse(&rendered)?)?, rendered);
            }
            (Err(e), Some(expected)) => {
                let message = e.render(&case.expr);
                if !message.contains(expected.as_str()) {
                    bail!("error `{message}` does not contain `{expected}`");
                }
            }
            (Ok(expression), Some(expected)) => {
                bail!("expected error `{expected}` but parsed {expression:?}")
            }
            (Err(e), None) => bail!("{}", e.render(&case.expr)),
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

#[test_resources("tests/parser/cases/*.yaml")]
fn run(path: &str) {
    yaml_test(path).unwrap()
}
