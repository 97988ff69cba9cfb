use thiserror::Error;
use tracing::debug;

use forgeloop_core::Bundle;

use crate::block::extract_tagged_block;

#[derive(Error, Debug)]
pub enum ProposalParseError {
    #[error("no bundle block found in model reply")]
    NoBundleFound,

    #[error("invalid bundle block: {0}")]
    InvalidFormat(String),

    #[error("failed to parse bundle JSON: {0}")]
    JsonParseError(#[from] serde_json::Error),
}

/// Parse the proposed bundle from a model reply.
///
/// Expected format in the reply:
/// ```text
/// <bundle>
/// {"build_descriptor": "...", "files": [{"path": "...", "content": "..."}]}
/// </bundle>
/// ```
pub fn parse_bundle_reply(reply: &str) -> Result<Bundle, ProposalParseError> {
    debug!(reply_len = reply.len(), "Parsing proposed bundle");

    let block = extract_tagged_block(reply, "bundle")
        .map_err(ProposalParseError::InvalidFormat)?
        .ok_or(ProposalParseError::NoBundleFound)?;

    let bundle: Bundle = serde_json::from_str(block)?;
    Ok(bundle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_bundle() {
        let reply = r##"
Here is the plan, followed by the bundle.

<bundle>
{"build_descriptor": "FROM python:3.10-slim\nENTRYPOINT [\"python\", \"main.py\"]", "files": [{"path": "readme.md", "content": "# plan"}, {"path": "main.py", "content": "print('hi')"}]}
</bundle>
"##;

        let bundle = parse_bundle_reply(reply).unwrap();
        assert!(bundle.build_descriptor.starts_with("FROM python:3.10-slim"));
        assert_eq!(bundle.files.len(), 2);
        assert_eq!(bundle.files[0].path, "readme.md");
    }

    #[test]
    fn test_parse_bundle_without_files() {
        let reply = r#"<bundle>{"build_descriptor": "FROM alpine"}</bundle>"#;
        let bundle = parse_bundle_reply(reply).unwrap();
        assert!(bundle.files.is_empty());
    }

    #[test]
    fn test_missing_block() {
        let result = parse_bundle_reply("I cannot help with that.");
        assert!(matches!(result, Err(ProposalParseError::NoBundleFound)));
    }

    #[test]
    fn test_bad_json() {
        let reply = "<bundle>{not json}</bundle>";
        assert!(matches!(
            parse_bundle_reply(reply),
            Err(ProposalParseError::JsonParseError(_))
        ));
    }
}
