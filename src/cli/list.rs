//! `esaltest list`: show the available test cases

use std::path::Path;

use colored::Colorize;

use crate::common::Result;
use crate::testing::{suite, TestCase};

pub fn list(cases_dir: &Path) -> Result<()> {
    let names = suite::discover(cases_dir)?;
    if names.is_empty() {
        println!("No test cases in {}", cases_dir.display());
        return Ok(());
    }

    println!("Test cases in {}:", cases_dir.display());
    for name in &names {
        match TestCase::load(&suite::case_path(cases_dir, name)) {
            Ok(case) => {
                let kind = if case.has_traffic() { "traffic" } else { "command" };
                println!(
                    "  {:<48} {:<8} {}",
                    name.white().bold(),
                    kind.dimmed(),
                    case.description.as_deref().unwrap_or("")
                );
            }
            Err(e) => println!("  {:<48} {}", name.white().bold(), e.to_string().red()),
        }
    }
    println!("\n{} test case(s)", names.len());
    Ok(())
}
