//! Word-boundary classification and traversal helpers (spec §4.6), working
//! over grapheme clusters and step columns instead of bytes.

use crate::{EditBuffer, EditError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ClusterKind {
    Word,
    Blank,
    Other,
}

/// Letters, digits, and underscore are word characters; whitespace
/// separates tokens; everything else (`-`, `/`, brackets, quotes, other
/// punctuation) is its own hard-boundary token.
pub(crate) fn classify_cluster(cluster: &str) -> ClusterKind {
    match cluster.chars().next() {
        Some(c) if c == '_' || c.is_alphanumeric() => ClusterKind::Word,
        Some(c) if c.is_whitespace() => ClusterKind::Blank,
        Some(_) => ClusterKind::Other,
        None => ClusterKind::Blank,
    }
}

pub(crate) fn skip_kind_forward(clusters: &[String], mut col: usize, kind: ClusterKind) -> usize {
    while col < clusters.len() && classify_cluster(&clusters[col]) == kind {
        col += 1;
    }
    col
}

/// `col` is the index of a cluster already known to be `kind`; walks
/// backward while the preceding cluster is still `kind`, returning the
/// token's start column.
pub(crate) fn skip_kind_backward(clusters: &[String], mut col: usize, kind: ClusterKind) -> usize {
    while col > 0 && classify_cluster(&clusters[col - 1]) == kind {
        col -= 1;
    }
    col
}

pub(crate) fn skip_blanks_forward(
    edit: &EditBuffer,
    row: &mut usize,
    col: &mut usize,
    clusters: &mut Vec<String>,
) -> Result<bool, EditError> {
    loop {
        if *col >= clusters.len() {
            if !edit.advance_line_forward(row, col, clusters)? {
                return Ok(false);
            }
            if clusters.is_empty() {
                continue;
            }
        }
        if classify_cluster(&clusters[*col]) == ClusterKind::Blank {
            *col += 1;
            continue;
        }
        return Ok(true);
    }
}

pub(crate) fn retreat_line(
    edit: &EditBuffer,
    row: &mut usize,
    col: &mut usize,
    clusters: &mut Vec<String>,
) -> Result<bool, EditError> {
    edit.retreat_line_impl(row, col, clusters)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_matches_word_blank_other() {
        assert_eq!(classify_cluster("a"), ClusterKind::Word);
        assert_eq!(classify_cluster("_"), ClusterKind::Word);
        assert_eq!(classify_cluster("9"), ClusterKind::Word);
        assert_eq!(classify_cluster(" "), ClusterKind::Blank);
        assert_eq!(classify_cluster("\t"), ClusterKind::Blank);
        assert_eq!(classify_cluster(","), ClusterKind::Other);
        assert_eq!(classify_cluster("("), ClusterKind::Other);
    }

    #[test]
    fn skip_kind_forward_and_backward_agree_on_token_bounds() {
        let clusters: Vec<String> = "foo,".chars().map(String::from).collect();
        let end = skip_kind_forward(&clusters, 0, ClusterKind::Word);
        assert_eq!(end, 3);
        let start = skip_kind_backward(&clusters, end - 1, ClusterKind::Word);
        assert_eq!(start, 0);
    }
}
