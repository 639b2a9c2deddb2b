use crate::error::IngestError;
use crate::extractor::{join_pages, PageText};
use crate::models::{Chunk, ChunkMetadata, SegmenterOptions};
use text_splitter::{ChunkConfig, Characters, TextSplitter};
use tracing::debug;

const UNKNOWN_TITLE: &str = "unknown";
const BLOCKS_PER_PAGE: usize = 3;

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Splits a regulation document into `<title>`-delimited chunks.
///
/// Pages are joined before scanning so a section that straddles a page
/// break stays in one block. Bodies at or above `max_body_chars` are
/// re-split into overlapping segments that keep the parent's metadata.
pub struct Segmenter {
    options: SegmenterOptions,
    splitter: TextSplitter<Characters>,
}

impl Segmenter {
    pub fn new(options: SegmenterOptions) -> Result<Self, IngestError> {
        if options.split_chars == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "split size must be positive".to_string(),
            ));
        }

        let config = ChunkConfig::new(options.split_chars)
            .with_overlap(options.split_overlap_chars)
            .map_err(|error| IngestError::InvalidChunkConfig(error.to_string()))?
            .with_trim(true);

        Ok(Self {
            options,
            splitter: TextSplitter::new(config),
        })
    }

    pub fn options(&self) -> &SegmenterOptions {
        &self.options
    }

    pub fn segment_pages(&self, pages: &[PageText], document_name: &str) -> Vec<Chunk> {
        self.segment_text(&join_pages(pages), document_name)
    }

    pub fn segment_text(&self, full_text: &str, document_name: &str) -> Vec<Chunk> {
        let blocks = split_blocks(full_text);
        debug!(block_count = blocks.len(), document = %document_name, "split title blocks");

        let mut chunks = Vec::with_capacity(blocks.len());
        for (index, block) in blocks.into_iter().enumerate() {
            let (title, body) = split_title(block);
            let parent = Chunk {
                body,
                metadata: ChunkMetadata {
                    title,
                    page: page_estimate(index),
                    chunk_id: format!("{}-{:05}", self.options.id_prefix, index),
                    source: document_name.to_string(),
                },
            };
            self.push_bounded(parent, &mut chunks);
        }

        chunks
    }

    fn push_bounded(&self, parent: Chunk, target: &mut Vec<Chunk>) {
        if parent.body.chars().count() < self.options.max_body_chars {
            target.push(parent);
            return;
        }

        let before = target.len();
        target.extend(self.splitter.chunks(&parent.body).map(|piece| Chunk {
            body: piece.to_string(),
            metadata: parent.metadata.clone(),
        }));
        debug!(
            chunk_id = %parent.metadata.chunk_id,
            pieces = target.len() - before,
            "re-split oversized chunk"
        );
    }
}

// Sub-chunks produced by a re-split share this estimate with their parent.
fn page_estimate(block_index: usize) -> u32 {
    u32::try_from(block_index / BLOCKS_PER_PAGE + 1).unwrap_or(u32::MAX)
}

/// Byte offsets of every `<...>` marker: a `<` followed by at least one
/// non-`>` character and then a `>`. Markers may start anywhere and may
/// overlap, e.g. `<<A>` yields offsets 0 and 1.
pub fn title_marker_offsets(text: &str) -> Vec<usize> {
    let bytes = text.as_bytes();
    let mut offsets = Vec::new();
    let mut next_close: Option<usize> = None;

    for index in (0..bytes.len()).rev() {
        match bytes[index] {
            b'>' => next_close = Some(index),
            b'<' if next_close.is_some_and(|close| close > index + 1) => offsets.push(index),
            _ => {}
        }
    }

    offsets.reverse();
    offsets
}

/// Cuts the text at each marker so the marker stays attached to the block it
/// introduces. Text before the first marker forms its own block.
pub fn split_blocks(text: &str) -> Vec<&str> {
    let offsets = title_marker_offsets(text);
    if offsets.is_empty() {
        let trimmed = text.trim();
        return if trimmed.is_empty() {
            Vec::new()
        } else {
            vec![trimmed]
        };
    }

    let mut bounds = Vec::with_capacity(offsets.len() + 2);
    bounds.push(0);
    bounds.extend(offsets);
    bounds.push(text.len());
    bounds.dedup();

    bounds
        .windows(2)
        .map(|window| text[window[0]..window[1]].trim())
        .filter(|block| !block.is_empty())
        .collect()
}

/// Reads a leading `<TITLE>` (optionally followed by one newline) off a
/// trimmed block. Blocks that do not open with a title fall back to
/// `"unknown"` with the whole block as body.
pub fn split_title(block: &str) -> (String, String) {
    if let Some(rest) = block.strip_prefix('<') {
        if let Some(close) = rest.find('>').filter(|close| *close > 0) {
            let after = &rest[close + 1..];
            let body = after.strip_prefix('\n').unwrap_or(after);
            return (rest[..close].trim().to_string(), body.trim().to_string());
        }
    }

    (UNKNOWN_TITLE.to_string(), block.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segmenter() -> Segmenter {
        Segmenter::new(SegmenterOptions::default()).expect("default options are valid")
    }

    fn prose(chars: usize) -> String {
        "The inspector shall record every deviation in the maintenance log. "
            .repeat(chars / 60 + 1)
            .chars()
            .take(chars)
            .collect()
    }

    #[test]
    fn whitespace_is_normalized() {
        let input = "A  \t  lot\nof   spacing";
        let normalized = normalize_whitespace(input);
        assert_eq!(normalized, "A lot of spacing");
        assert_eq!(normalize_whitespace("제1항\u{a0}\u{a0}본문"), "제1항 본문");
    }

    #[test]
    fn titled_blocks_become_sequential_chunks() {
        let chunks = segmenter().segment_text("<A>\nfoo<B>\nbar", "regulation.pdf");

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].title(), "A");
        assert_eq!(chunks[0].body, "foo");
        assert_eq!(chunks[0].chunk_id(), "KOR-Regulation-00000");
        assert_eq!(chunks[1].title(), "B");
        assert_eq!(chunks[1].body, "bar");
        assert_eq!(chunks[1].chunk_id(), "KOR-Regulation-00001");
        assert!(chunks.iter().all(|chunk| chunk.metadata.source == "regulation.pdf"));
    }

    #[test]
    fn sections_straddling_pages_stay_together() {
        let pages = vec![
            PageText {
                number: 1,
                text: "<한글 맞춤법 제1항>\n첫 문장".to_string(),
                source: "doc".to_string(),
            },
            PageText {
                number: 2,
                text: "이어지는 문장".to_string(),
                source: "doc".to_string(),
            },
        ];

        let chunks = segmenter().segment_pages(&pages, "doc");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].title(), "한글 맞춤법 제1항");
        assert_eq!(chunks[0].body, "첫 문장\n이어지는 문장");
    }

    #[test]
    fn empty_document_yields_no_chunks() {
        assert!(segmenter().segment_text("", "doc").is_empty());
        assert!(segmenter().segment_text(" \n\t ", "doc").is_empty());
        assert!(segmenter().segment_pages(&[], "doc").is_empty());
    }

    #[test]
    fn untitled_text_falls_back_to_unknown() {
        let chunks = segmenter().segment_text("  plain text only a<>b  ", "doc");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].title(), "unknown");
        assert_eq!(chunks[0].body, "plain text only a<>b");
    }

    #[test]
    fn preamble_before_first_title_is_kept() {
        let chunks = segmenter().segment_text("preface\n<A>\nbody", "doc");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].title(), "unknown");
        assert_eq!(chunks[0].body, "preface");
        assert_eq!(chunks[1].title(), "A");
        assert_eq!(chunks[1].chunk_id(), "KOR-Regulation-00001");
    }

    #[test]
    fn title_without_newline_and_padded_title_are_trimmed() {
        let (title, body) = split_title("< Rule 7 >  text after\nmore");
        assert_eq!(title, "Rule 7");
        assert_eq!(body, "text after\nmore");

        let (title, body) = split_title("<Only>");
        assert_eq!(title, "Only");
        assert_eq!(body, "");
    }

    #[test]
    fn page_is_estimated_from_block_index() {
        let text = (0..7).map(|i| format!("<T{i}>\nbody {i}")).collect::<String>();
        let pages: Vec<u32> = segmenter()
            .segment_text(&text, "doc")
            .iter()
            .map(|chunk| chunk.metadata.page)
            .collect();
        assert_eq!(pages, vec![1, 1, 1, 2, 2, 2, 3]);
    }

    #[test]
    fn marker_offsets_follow_lookahead_semantics() {
        assert_eq!(title_marker_offsets("<A>\nfoo<B>\nbar"), vec![0, 7]);
        assert_eq!(title_marker_offsets("<<A>"), vec![0, 1]);
        assert!(title_marker_offsets("<> and < without close").is_empty());
    }

    #[test]
    fn long_bodies_are_resplit_with_shared_metadata() {
        let body = prose(1_200);
        let text = format!("<Long rule>\n{body}<Short>\ntail");
        let chunks = segmenter().segment_text(&text, "doc");

        let long: Vec<_> = chunks
            .iter()
            .filter(|chunk| chunk.title() == "Long rule")
            .collect();
        assert!(long.len() >= 3, "expected at least 3 pieces, got {}", long.len());
        for piece in &long {
            assert!(piece.body.chars().count() <= 550);
            assert_eq!(piece.chunk_id(), "KOR-Regulation-00000");
            assert_eq!(piece.metadata.page, 1);
        }

        let last = chunks.last().expect("short chunk is present");
        assert_eq!(last.title(), "Short");
        assert_eq!(last.chunk_id(), "KOR-Regulation-00001");
    }

    #[test]
    fn bodies_just_under_the_bound_are_untouched() {
        let body = prose(999);
        let chunks = segmenter().segment_text(&format!("<R>\n{body}"), "doc");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].body.chars().count(), 999);
    }

    #[test]
    fn body_at_the_bound_is_resplit() {
        let body = "가나다라마".repeat(200);
        assert_eq!(body.chars().count(), 1_000);
        let chunks = segmenter().segment_text(&format!("<R>\n{body}"), "doc");
        assert!(chunks.len() >= 2, "expected a re-split, got {}", chunks.len());
        assert!(chunks
            .iter()
            .all(|chunk| chunk.title() == "R" && chunk.body.chars().count() <= 500));
    }

    #[test]
    fn overlap_larger_than_segment_is_rejected() {
        let options = SegmenterOptions {
            split_chars: 50,
            split_overlap_chars: 60,
            ..SegmenterOptions::default()
        };
        assert!(matches!(
            Segmenter::new(options),
            Err(IngestError::InvalidChunkConfig(_))
        ));
    }
}
