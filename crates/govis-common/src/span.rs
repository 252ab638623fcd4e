use crate::source::SourceId;
use miette::SourceSpan;

/// A byte range inside one source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub source: SourceId,
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(source: SourceId, start: u32, end: u32) -> Self {
        Self { source, start, end }
    }

    pub fn merge(self, other: Span) -> Span {
        debug_assert_eq!(self.source, other.source);
        Span {
            source: self.source,
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl From<Span> for SourceSpan {
    fn from(span: Span) -> Self {
        SourceSpan::new((span.start as usize).into(), span.len() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SourceMap;

    #[test]
    fn test_merge_and_source_span() {
        let map = SourceMap::new();
        let id = map.add_file("a.go", "package a\n".to_string()).unwrap();
        let merged = Span::new(id, 4, 6).merge(Span::new(id, 2, 5));
        assert_eq!((merged.start, merged.end), (2, 6));

        let source: SourceSpan = merged.into();
        assert_eq!(source.offset(), 2);
        assert_eq!(source.len(), 4);
    }
}
