// Source edit list and rewrite materializer.
//
// Pass 2 queues every textual mutation as a `SourceEdit`; nothing touches
// the source text until the whole edit set is known. `EditList::apply`
// validates non-overlap and splices the edits into the original text in
// position order.
//
// Ordering at one shared position: InsertAfter edits attach to the preceding
// text and apply last-queued-first — an inner construct's synthesized closer
// or `else` arm must land closer to the text it closes than an enclosing
// construct's. InsertBefore edits attach to the following text in queue
// order, ahead of a Replace starting at the same position.
//
// Preconditions: edit positions are byte offsets into one fixed text.
// Postconditions: `apply` output contains every edit exactly once.
// Failure modes: overlapping replaces, or an insertion strictly inside a
//   replaced range, fail validation.
// Side effects: none.

use std::fmt;

/// How an edit attaches at its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    /// Insert ahead of the text at `pos`.
    InsertBefore,
    /// Insert behind the text ending at `pos`.
    InsertAfter,
    /// Replace `len` bytes starting at `pos`.
    Replace { len: usize },
}

/// One queued textual mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEdit {
    pub pos: usize,
    pub kind: EditKind,
    pub text: String,
    /// Queue sequence number, assigned by the list.
    seq: usize,
}

/// Validation failure over a queued edit set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    OverlappingReplace { first: usize, second: usize },
    InsertInsideReplace { insert_pos: usize, replace_pos: usize },
    OutOfBounds { pos: usize, len: usize },
}

impl fmt::Display for EditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditError::OverlappingReplace { first, second } => {
                write!(f, "overlapping replacements at {first} and {second}")
            }
            EditError::InsertInsideReplace {
                insert_pos,
                replace_pos,
            } => write!(
                f,
                "insertion at {insert_pos} falls inside replacement at {replace_pos}"
            ),
            EditError::OutOfBounds { pos, len } => {
                write!(f, "edit at {pos} exceeds source length {len}")
            }
        }
    }
}

impl std::error::Error for EditError {}

/// Ordered list of queued edits for one file.
#[derive(Debug, Default)]
pub struct EditList {
    edits: Vec<SourceEdit>,
}

impl EditList {
    pub fn new() -> Self {
        EditList { edits: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn insert_before(&mut self, pos: usize, text: impl Into<String>) {
        self.push(pos, EditKind::InsertBefore, text.into());
    }

    pub fn insert_after(&mut self, pos: usize, text: impl Into<String>) {
        self.push(pos, EditKind::InsertAfter, text.into());
    }

    pub fn replace(&mut self, pos: usize, len: usize, text: impl Into<String>) {
        self.push(pos, EditKind::Replace { len }, text.into());
    }

    fn push(&mut self, pos: usize, kind: EditKind, text: String) {
        let seq = self.edits.len();
        self.edits.push(SourceEdit {
            pos,
            kind,
            text,
            seq,
        });
    }

    /// Check bounds, replace overlap, and insert-inside-replace.
    pub fn validate(&self, source_len: usize) -> Result<(), EditError> {
        let mut replaces: Vec<(usize, usize)> = Vec::new();
        for edit in &self.edits {
            let end = match edit.kind {
                EditKind::Replace { len } => edit.pos + len,
                _ => edit.pos,
            };
            if end > source_len {
                return Err(EditError::OutOfBounds {
                    pos: edit.pos,
                    len: source_len,
                });
            }
            if let EditKind::Replace { len } = edit.kind {
                replaces.push((edit.pos, edit.pos + len));
            }
        }
        replaces.sort_unstable();
        for pair in replaces.windows(2) {
            if pair[1].0 < pair[0].1 {
                return Err(EditError::OverlappingReplace {
                    first: pair[0].0,
                    second: pair[1].0,
                });
            }
        }
        for edit in &self.edits {
            if matches!(edit.kind, EditKind::Replace { .. }) {
                continue;
            }
            for &(start, end) in &replaces {
                if edit.pos > start && edit.pos < end {
                    return Err(EditError::InsertInsideReplace {
                        insert_pos: edit.pos,
                        replace_pos: start,
                    });
                }
            }
        }
        Ok(())
    }

    /// Materialize all edits into `source`. Validates first; the original
    /// text is never mutated mid-traversal.
    pub fn apply(&self, source: &str) -> Result<String, EditError> {
        self.validate(source.len())?;

        let mut ordered: Vec<&SourceEdit> = self.edits.iter().collect();
        ordered.sort_by_key(|e| {
            let (rank, tie) = match e.kind {
                // Last-queued InsertAfter applies first (innermost closer).
                EditKind::InsertAfter => (0usize, usize::MAX - e.seq),
                EditKind::InsertBefore => (1, e.seq),
                EditKind::Replace { .. } => (2, e.seq),
            };
            (e.pos, rank, tie)
        });

        let mut out = String::with_capacity(source.len() + source.len() / 2);
        let mut cursor = 0usize;
        for edit in ordered {
            out.push_str(&source[cursor..edit.pos]);
            cursor = edit.pos;
            out.push_str(&edit.text);
            if let EditKind::Replace { len } = edit.kind {
                cursor += len;
            }
        }
        out.push_str(&source[cursor..]);
        Ok(out)
    }
}
