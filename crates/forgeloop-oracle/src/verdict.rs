use thiserror::Error;
use tracing::debug;

use forgeloop_core::Verdict;

use crate::block::extract_tagged_block;

#[derive(Error, Debug)]
pub enum VerdictParseError {
    #[error("no verdict found in model reply")]
    NoVerdictFound,

    #[error("ambiguous verdict: both pass and fail markers found")]
    AmbiguousVerdict,

    #[error("invalid verdict block: {0}")]
    InvalidFormat(String),

    #[error("failed to parse verdict JSON: {0}")]
    JsonParseError(#[from] serde_json::Error),
}

/// Parse the judge's verdict from a model reply.
///
/// Expected format in the reply:
/// ```text
/// <verdict>
/// {"satisfied": false, "patch": {"build_descriptor": "...", "files": [...]}}
/// </verdict>
/// ```
/// Falls back to plain-text markers when no block is present, in which case
/// the verdict carries no patch.
pub fn parse_verdict_reply(reply: &str) -> Result<Verdict, VerdictParseError> {
    debug!(reply_len = reply.len(), "Parsing judge verdict");

    if let Some(block) = extract_tagged_block(reply, "verdict")
        .map_err(VerdictParseError::InvalidFormat)?
    {
        let verdict: Verdict = serde_json::from_str(block)?;
        return Ok(verdict);
    }

    parse_simple_markers(reply)
}

fn parse_simple_markers(reply: &str) -> Result<Verdict, VerdictParseError> {
    let upper = reply.to_uppercase();

    let pass_markers = ["ALL CRITERIA MET", "CRITERIA SATISFIED", "[PASS]"];
    let fail_markers = ["NOT SATISFIED", "CRITERIA NOT MET", "[RETRY]"];

    let has_pass = pass_markers.iter().any(|m| upper.contains(m));
    let has_fail = fail_markers.iter().any(|m| upper.contains(m));

    match (has_pass, has_fail) {
        (true, false) => {
            debug!("Parsed as satisfied via simple markers");
            Ok(Verdict {
                satisfied: true,
                patch: Default::default(),
            })
        }
        (false, true) => {
            debug!("Parsed as not satisfied via simple markers");
            Ok(Verdict::default())
        }
        (true, true) => Err(VerdictParseError::AmbiguousVerdict),
        (false, false) => Err(VerdictParseError::NoVerdictFound),
    }
}
