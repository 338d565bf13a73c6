//! `hubstack plan`: the action graph in submission order.

use serde::Serialize;

use super::Context;
use crate::cli::ClusterArgs;
use crate::error::Result;
use crate::output::{Displayable, OutputFormat};
use crate::provision::plan::PlannedAction;
use crate::provision::secrets::SecretMaterializer;
use crate::provision::{SynthEngine, derive};

/// Widest prerequisites cell before truncation.
const PREREQUISITES_WIDTH: usize = 60;

#[derive(Serialize)]
struct PlanRow<'a> {
    wave: usize,
    id: &'a str,
    kind: &'static str,
    prerequisites: Vec<&'a str>,
}

impl<'a> From<&PlannedAction<'a>> for PlanRow<'a> {
    fn from(planned: &PlannedAction<'a>) -> Self {
        Self {
            wave: planned.wave,
            id: planned.id.as_str(),
            kind: planned.action.kind(),
            prerequisites: planned.prerequisites.iter().map(|p| p.as_str()).collect(),
        }
    }
}

impl Displayable for PlanRow<'_> {
    fn table_row(&self) -> Vec<String> {
        let prerequisites =
            if self.prerequisites.is_empty() { "-".to_string() } else { self.prerequisites.join(", ") };
        vec![self.wave.to_string(), self.id.to_string(), self.kind.to_string(), prerequisites]
    }

    fn table_headers() -> Vec<&'static str> {
        vec!["WAVE", "ACTION", "KIND", "PREREQUISITES"]
    }

    fn column_widths() -> Vec<Option<usize>> {
        vec![None, None, None, Some(PREREQUISITES_WIDTH)]
    }
}

/// Print the action graph.
///
/// Table output lists one action per line grouped by wave; structured
/// formats print the whole plan document.
pub async fn plan(ctx: &Context, cluster: ClusterArgs) -> Result<()> {
    let resolved = ctx.resolve(cluster)?;
    let mut materializer = SecretMaterializer::new();
    let derivation = derive(resolved.spec, &SynthEngine::new(), &mut materializer)?;
    let document = derivation.plan()?;

    if ctx.output.format() != OutputFormat::Table {
        return ctx.output.value(&document);
    }

    let mut rows: Vec<PlanRow<'_>> = document.actions.iter().map(PlanRow::from).collect();
    rows.sort_by_key(|row| row.wave);
    ctx.output.table(&rows)?;

    let dependent = document.gate.dependent.map_or("none (dry run)", |id| id.as_str());
    ctx.output.info(&format!(
        "\nGate '{}': {} members, releases {dependent}",
        document.gate.name,
        document.gate.members.len()
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::render_table;

    #[test]
    fn test_long_prerequisites_are_truncated() {
        let names: Vec<String> = (0..12).map(|i| format!("addon-{i}")).collect();
        let rows = [PlanRow {
            wave: 3,
            id: "platform",
            kind: "helmRelease",
            prerequisites: names.iter().map(String::as_str).collect(),
        }];

        let rendered = render_table(&rows);
        let line = rendered.lines().nth(2).unwrap_or_default();
        assert!(line.starts_with("3"));
        assert!(line.trim_end().ends_with("..."));
        assert!(!line.contains("addon-11"));
    }

    #[test]
    fn test_root_action_has_dash() {
        let row = PlanRow { wave: 0, id: "master-role", kind: "masterRole", prerequisites: vec![] };
        assert_eq!(row.table_row()[3], "-");
    }
}
