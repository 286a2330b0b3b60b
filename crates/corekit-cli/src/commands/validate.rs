use crate::support;
use corekit_loader::LoaderConfig;
use tracing::debug;

/// Exit code for a value that failed validation.
const EXIT_INVALID: i32 = 1;

pub fn run(config: &LoaderConfig, value: &str, instruction: &str, json_output: bool) {
    let value = support::parse_value_or_exit("value", value);
    let instruction = support::parse_instruction_or_exit(instruction);
    let validator = support::validator(config);
    validator
        .compile(&instruction)
        .unwrap_or_else(|e| support::fail(e));

    let result = validator
        .validate(&value, &instruction)
        .unwrap_or_else(|e| support::fail(e));
    debug!(%instruction, success = result.success, "validated");

    if json_output {
        support::print_json(&result);
    } else if result.success {
        println!("valid: {instruction}");
    } else {
        let failures: Vec<String> = result.failures.iter().map(ToString::to_string).collect();
        println!(
            "invalid value: expected {instruction}, got: {}",
            result.actual.as_deref().unwrap_or_default()
        );
        println!("  failing checks: {}", failures.join(", "));
    }

    if !result.success {
        std::process::exit(EXIT_INVALID);
    }
}
