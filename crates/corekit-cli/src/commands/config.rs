use crate::support;
use corekit_loader::LoaderConfig;

pub fn run(config: &LoaderConfig, json_output: bool) {
    if json_output {
        support::print_json(config);
        return;
    }
    let rendered = toml::to_string_pretty(config)
        .unwrap_or_else(|e| support::fail(format_args!("failed to render toml: {e}")));
    print!("{rendered}");
}
