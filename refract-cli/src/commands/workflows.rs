//! Workflows command handler

use anyhow::Result;
use colored::*;
use refract_runner::{Toolkit, WorkflowCatalog};
use std::sync::Arc;

use crate::config::Config;

/// Handle `refract workflows`
pub fn handle_workflows_command(config: &Config) -> Result<()> {
    let catalog = WorkflowCatalog::standard(Arc::new(Toolkit::standard(&config.runner)));

    println!("{}", "Workflows:".bold());
    for line in describe(&catalog) {
        println!("{}", line);
    }
    Ok(())
}

fn describe(catalog: &WorkflowCatalog) -> Vec<String> {
    catalog
        .kinds()
        .into_iter()
        .map(|kind| {
            let stages = catalog.stage_names(kind).unwrap_or_default().join(" → ");
            format!("  {}\n    {}", kind.as_str().cyan(), stages.dimmed())
        })
        .collect()
}
