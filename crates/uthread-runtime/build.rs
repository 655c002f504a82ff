//! Build script for uthread-runtime
//!
//! Merges compile-time configuration:
//! 1. Library defaults (table below)
//! 2. If `UTH_CONFIG_RS` names a file, its `pub const` lines override them
//! 3. The result is written to `OUT_DIR/uth_merged_config.rs`
//!
//! A user file only lists the values it changes, e.g.
//!
//! ```text
//! pub const STACK_SIZE: usize = 256 * 1024;
//! pub const PREEMPT_PERIOD_US: u64 = 0;
//! ```

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

struct ConfigParam {
    name: &'static str,
    rust_type: &'static str,
    default_value: &'static str,
}

const CONFIG_PARAMS: &[ConfigParam] = &[
    ConfigParam {
        name: "STACK_SIZE",
        rust_type: "usize",
        default_value: "64 * 1024",
    },
    ConfigParam {
        name: "PREEMPT_PERIOD_US",
        rust_type: "u64",
        default_value: "100",
    },
    ConfigParam {
        name: "MAX_THREADS",
        rust_type: "usize",
        default_value: "65_536",
    },
    ConfigParam {
        name: "STACK_CACHE",
        rust_type: "usize",
        default_value: "64",
    },
    ConfigParam {
        name: "DEBUG_LOGGING",
        rust_type: "bool",
        default_value: "false",
    },
];

fn main() {
    let out_dir = env::var("OUT_DIR").expect("OUT_DIR not set");
    let dest_path = Path::new(&out_dir).join("uth_merged_config.rs");

    let mut values: HashMap<&'static str, String> = CONFIG_PARAMS
        .iter()
        .map(|p| (p.name, p.default_value.to_string()))
        .collect();

    let user_path = env::var("UTH_CONFIG_RS").ok();
    if let Some(path) = &user_path {
        println!("cargo:rerun-if-changed={}", path);
        match fs::read_to_string(path) {
            Ok(content) => {
                for unknown in merge_overrides(&content, &mut values) {
                    println!("cargo:warning=Unknown config parameter: {}", unknown);
                }
                println!("cargo:warning=Using custom config: {}", path);
            }
            Err(e) => {
                println!("cargo:warning=Failed to read UTH_CONFIG_RS ({}): {}", path, e);
            }
        }
    }
    println!("cargo:rerun-if-env-changed=UTH_CONFIG_RS");

    let output = render(&values, user_path.is_some());
    fs::write(&dest_path, output).expect("Failed to write merged config");
}

/// Apply every known `pub const` in `content`; returns the unknown names
fn merge_overrides(content: &str, values: &mut HashMap<&'static str, String>) -> Vec<String> {
    let mut unknown = Vec::new();
    for line in content.lines().map(str::trim) {
        if line.starts_with("//") {
            continue;
        }
        let Some((name, value)) = parse_const(line) else {
            continue;
        };
        match CONFIG_PARAMS.iter().find(|p| p.name == name) {
            Some(param) => {
                values.insert(param.name, value);
            }
            None => unknown.push(name),
        }
    }
    unknown
}

/// `pub const NAME: TYPE = VALUE;` -> `(NAME, VALUE)`
fn parse_const(line: &str) -> Option<(String, String)> {
    let rest = line.strip_prefix("pub const ")?;
    let (name, rest) = rest.split_once(':')?;
    let (_ty, value) = rest.split_once('=')?;
    let value = value.trim().trim_end_matches(';').trim();
    if value.is_empty() {
        return None;
    }
    Some((name.trim().to_string(), value.to_string()))
}

fn render(values: &HashMap<&'static str, String>, from_user: bool) -> String {
    let mut out = String::from("// Auto-generated by build.rs - do not edit\n");
    if from_user {
        out.push_str("// Library defaults merged with UTH_CONFIG_RS\n");
    }
    out.push('\n');
    for param in CONFIG_PARAMS {
        let value = values
            .get(param.name)
            .map(String::as_str)
            .unwrap_or(param.default_value);
        out.push_str(&format!(
            "pub const {}: {} = {};\n",
            param.name, param.rust_type, value
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> HashMap<&'static str, String> {
        CONFIG_PARAMS
            .iter()
            .map(|p| (p.name, p.default_value.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_const() {
        assert_eq!(
            parse_const("pub const MAX_THREADS: usize = 128;"),
            Some(("MAX_THREADS".into(), "128".into()))
        );
        assert_eq!(
            parse_const("pub const STACK_SIZE: usize = 256 * 1024;"),
            Some(("STACK_SIZE".into(), "256 * 1024".into()))
        );
        assert_eq!(parse_const("const STACK_SIZE: usize = 1;"), None);
        assert_eq!(parse_const("pub const BROKEN: usize = ;"), None);
    }

    #[test]
    fn test_merge_overrides() {
        let mut values = defaults();
        let unknown = merge_overrides(
            r#"
            // tuned for the demo
            pub const PREEMPT_PERIOD_US: u64 = 0;
            pub const NUM_WORKERS: usize = 4;
            "#,
            &mut values,
        );

        assert_eq!(values.get("PREEMPT_PERIOD_US"), Some(&"0".to_string()));
        assert_eq!(values.get("STACK_SIZE"), Some(&"64 * 1024".to_string()));
        assert_eq!(unknown, vec!["NUM_WORKERS".to_string()]);
    }

    #[test]
    fn test_render_lists_every_param() {
        let text = render(&defaults(), false);
        for param in CONFIG_PARAMS {
            assert!(text.contains(&format!("pub const {}: {}", param.name, param.rust_type)));
        }
        assert!(text.contains("pub const DEBUG_LOGGING: bool = false;"));
    }
}
