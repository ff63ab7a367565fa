//! Per-line highlight records and their priority-resolved flattening into
//! renderable spans (spec §3.6).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighlightRecord {
    pub range_id: u64,
    pub col_start: usize,
    pub col_end: usize,
    pub style_id: u32,
    pub priority: u16,
    /// Groups highlights for bulk removal (`removeHighlightsByRef`).
    pub ref_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSpan {
    pub col: usize,
    pub len: usize,
    pub style_id: u32,
}

/// Resolves overlapping highlights on a line of length `line_len` into a
/// run-length-encoded sequence of spans, with higher `priority` winning
/// overlaps and later entries winning ties. Columns past `line_len` are
/// truncated here rather than at store time (spec §4.4's invariant).
pub fn flatten(highlights: &[HighlightRecord], line_len: usize) -> Vec<LineSpan> {
    if highlights.is_empty() || line_len == 0 {
        return Vec::new();
    }
    let mut covering: Vec<Option<(u32, u16)>> = vec![None; line_len];
    for h in highlights {
        let start = h.col_start.min(line_len);
        let end = h.col_end.min(line_len);
        for slot in covering.iter_mut().take(end).skip(start) {
            if slot.is_none_or(|(_, p)| p <= h.priority) {
                *slot = Some((h.style_id, h.priority));
            }
        }
    }
    let mut spans = Vec::new();
    let mut i = 0;
    while i < covering.len() {
        match covering[i] {
            None => i += 1,
            Some((style_id, _)) => {
                let start = i;
                while i < covering.len() && covering[i].map(|(s, _)| s) == Some(style_id) {
                    i += 1;
                }
                spans.push(LineSpan {
                    col: start,
                    len: i - start,
                    style_id,
                });
            }
        }
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(col_start: usize, col_end: usize, style_id: u32, priority: u16) -> HighlightRecord {
        HighlightRecord {
            range_id: 0,
            col_start,
            col_end,
            style_id,
            priority,
            ref_id: 0,
        }
    }

    #[test]
    fn empty_input_yields_no_spans() {
        assert!(flatten(&[], 10).is_empty());
    }

    #[test]
    fn non_overlapping_highlights_each_become_a_span() {
        let spans = flatten(&[rec(0, 2, 1, 0), rec(4, 6, 2, 0)], 8);
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0], LineSpan { col: 0, len: 2, style_id: 1 });
        assert_eq!(spans[1], LineSpan { col: 4, len: 2, style_id: 2 });
    }

    #[test]
    fn higher_priority_wins_overlap() {
        let spans = flatten(&[rec(0, 5, 1, 0), rec(2, 4, 2, 9)], 5);
        assert_eq!(
            spans,
            vec![
                LineSpan { col: 0, len: 2, style_id: 1 },
                LineSpan { col: 2, len: 2, style_id: 2 },
                LineSpan { col: 4, len: 1, style_id: 1 },
            ]
        );
    }

    #[test]
    fn columns_past_line_len_are_truncated_on_read() {
        let spans = flatten(&[rec(2, 100, 1, 0)], 5);
        assert_eq!(spans, vec![LineSpan { col: 2, len: 3, style_id: 1 }]);
    }
}
