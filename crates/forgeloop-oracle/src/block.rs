/// Extract the content between `<tag>` and `</tag>` in a model reply.
///
/// Returns `Ok(None)` when no block is present, `Err` when the markers are
/// present but in the wrong order.
pub(crate) fn extract_tagged_block<'a>(
    output: &'a str,
    tag: &str,
) -> Result<Option<&'a str>, String> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);

    match (output.find(&open), output.find(&close)) {
        (Some(start), Some(end)) if start < end => {
            Ok(Some(output[start + open.len()..end].trim()))
        }
        (Some(_), Some(_)) => Err(format!("malformed <{}> block", tag)),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_trimmed_content() {
        let output = "preamble\n<verdict>\n{\"satisfied\": true}\n</verdict>\ntrailer";
        let block = extract_tagged_block(output, "verdict").unwrap().unwrap();
        assert_eq!(block, "{\"satisfied\": true}");
    }

    #[test]
    fn test_missing_block_is_none() {
        assert!(extract_tagged_block("no markers here", "bundle")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_reversed_markers_error() {
        let output = "</bundle>{}<bundle>";
        assert!(extract_tagged_block(output, "bundle").is_err());
    }
}
