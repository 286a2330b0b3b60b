use crate::support;
use corekit_loader::LoaderConfig;
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Described {
    check: String,
    description: String,
}

pub fn run(config: &LoaderConfig, value: &str, json_output: bool) {
    let value = support::parse_value_or_exit("value", value);
    let validator = support::validator(config);
    let matched = validator
        .registry()
        .first_descriptive_match(&value)
        .unwrap_or_else(|e| support::fail(e));

    if json_output {
        support::print_json(&Described {
            check: matched.check_name().to_string(),
            description: matched.description,
        });
        return;
    }
    println!("{}", matched.description);
}
