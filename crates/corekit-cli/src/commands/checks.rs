use crate::support;
use corekit_check::CheckSummary;
use corekit_loader::LoaderConfig;

pub fn run(config: &LoaderConfig, json_output: bool) {
    let validator = support::validator(config);
    let rows: Vec<CheckSummary> = validator
        .registry()
        .checks()
        .iter()
        .map(|check| check.summary())
        .collect();

    if json_output {
        support::print_json(&rows);
        return;
    }

    println!("corekit checks ({})", rows.len());
    for row in &rows {
        let describe = row
            .describe_priority
            .map(|priority| format!(", describes at {priority}"))
            .unwrap_or_default();
        println!("  {} [{}, arity {}{describe}]", row.name, row.kind, row.arity);
    }
}
