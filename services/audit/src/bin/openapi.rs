//! services/audit/src/bin/openapi.rs
//!
//! Writes the OpenAPI document of the sandbox admin-ajax endpoint, the same
//! one `audit-sandbox` serves under `/api-docs/openapi.json`.

use audit_lib::web::ApiDoc;
use clap::Parser;
use std::path::PathBuf;
use utoipa::OpenApi;

#[derive(Parser)]
#[command(name = "openapi")]
#[command(about = "Write the sandbox endpoint's OpenAPI document.")]
struct CommandLine {
    /// Where to write the JSON document
    #[arg(long, default_value = "openapi.json")]
    out: PathBuf,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let commands = CommandLine::parse();
    let document = ApiDoc::openapi().to_pretty_json()?;
    std::fs::write(&commands.out, document)?;
    println!("Wrote {}", commands.out.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path_defaults_and_overrides() {
        let default = CommandLine::try_parse_from(["openapi"]).unwrap();
        assert_eq!(default.out, PathBuf::from("openapi.json"));

        let custom = CommandLine::try_parse_from(["openapi", "--out", "docs/sandbox.json"]).unwrap();
        assert_eq!(custom.out, PathBuf::from("docs/sandbox.json"));
    }

    #[test]
    fn test_document_describes_admin_ajax() {
        let json = ApiDoc::openapi().to_pretty_json().unwrap();
        assert!(json.contains("/wp-admin/admin-ajax.php"));
    }
}
