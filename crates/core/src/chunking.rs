use crate::error::{IngestError, Result};
use crate::models::{Chunk, ChunkMetadata, PipelineOptions};
use regex::Regex;

#[derive(Debug, Clone, Copy)]
pub struct ChunkerConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl From<&PipelineOptions> for ChunkerConfig {
    fn from(value: &PipelineOptions) -> Self {
        Self {
            max_chars: value.chunk_max_chars,
            overlap_chars: value.chunk_overlap_chars,
        }
    }
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chars: 1_000,
            overlap_chars: 200,
        }
    }
}

/// Split page text into windows of at most `max_chars` characters, with
/// `overlap_chars` of shared text between consecutive windows.
///
/// Window boundaries prefer, in order: a paragraph break, a line break, the
/// end of a sentence, a word gap. A hard character cut happens only when no
/// breakpoint exists inside the window. Concatenating the pieces with the
/// leading `overlap_chars` dropped from every piece after the first
/// reconstructs the input exactly.
pub fn split_text(text: &str, config: &ChunkerConfig) -> Result<Vec<String>> {
    if config.max_chars == 0 {
        return Err(IngestError::InvalidChunkConfig(
            "max_chars must be positive".to_string(),
        ));
    }
    if config.overlap_chars >= config.max_chars {
        return Err(IngestError::InvalidChunkConfig(format!(
            "overlap {} must be smaller than max chunk size {}",
            config.overlap_chars, config.max_chars
        )));
    }

    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let sentence_re = Regex::new(r"[.!?]\s")?;
    let chars: Vec<char> = text.chars().collect();
    let mut pieces = Vec::new();
    let mut start = 0usize;

    loop {
        let cap = (start + config.max_chars).min(chars.len());
        let end = if cap == chars.len() {
            cap
        } else {
            find_breakpoint(&chars, start, cap, config.overlap_chars, &sentence_re)
        };

        pieces.push(chars[start..end].iter().collect());

        if end == chars.len() {
            break;
        }
        // Rewind by the fixed overlap so the next window repeats the tail
        // of this one; the breakpoint floor guarantees forward progress.
        start = end - config.overlap_chars;
    }

    Ok(pieces)
}

fn find_breakpoint(
    chars: &[char],
    start: usize,
    cap: usize,
    overlap: usize,
    sentence_re: &Regex,
) -> usize {
    // Candidates below the floor would make the next window start at or
    // before the current one once the overlap rewind is applied.
    let floor = start + overlap + 1;
    let window: String = chars[start..cap].iter().collect();

    if let Some(byte) = window.rfind("\n\n") {
        let candidate = start + window[..byte + 2].chars().count();
        if candidate >= floor {
            return candidate;
        }
    }

    if let Some(byte) = window.rfind('\n') {
        let candidate = start + window[..byte + 1].chars().count();
        if candidate >= floor {
            return candidate;
        }
    }

    if let Some(found) = sentence_re.find_iter(&window).last() {
        let candidate = start + window[..found.end()].chars().count();
        if candidate >= floor {
            return candidate;
        }
    }

    if let Some(byte) = window.rfind(|c: char| c.is_whitespace()) {
        if let Some(gap) = window[byte..].chars().next() {
            let candidate = start + window[..byte + gap.len_utf8()].chars().count();
            if candidate >= floor {
                return candidate;
            }
        }
    }

    cap
}

/// Wrap split output into chunks carrying provenance. Sequence ids restart
/// at 0 for every page.
pub fn build_chunks(
    text: &str,
    doc_id: &str,
    page_number: u32,
    filename: &str,
    config: &ChunkerConfig,
) -> Result<Vec<Chunk>> {
    let pieces = split_text(text, config)?;

    Ok(pieces
        .into_iter()
        .enumerate()
        .map(|(seq, piece)| Chunk {
            text: piece,
            metadata: ChunkMetadata {
                doc_id: doc_id.to_string(),
                page_number,
                chunk_seq_id: seq as u32,
                filename: filename.to_string(),
            },
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reassemble(pieces: &[String], overlap: usize) -> String {
        let mut out = String::new();
        for (index, piece) in pieces.iter().enumerate() {
            if index == 0 {
                out.push_str(piece);
            } else {
                out.extend(piece.chars().skip(overlap));
            }
        }
        out
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        let config = ChunkerConfig::default();
        assert!(split_text("", &config).unwrap().is_empty());
        assert!(split_text("   \n\t ", &config).unwrap().is_empty());
    }

    #[test]
    fn short_input_is_a_single_chunk() {
        let config = ChunkerConfig::default();
        let pieces = split_text("one short page", &config).unwrap();
        assert_eq!(pieces, vec!["one short page".to_string()]);
    }

    #[test]
    fn overlap_trimmed_concatenation_round_trips() {
        let config = ChunkerConfig {
            max_chars: 80,
            overlap_chars: 16,
        };
        let text = "First sentence of the report. Second sentence follows it closely.\n\n\
                    A new paragraph starts here and keeps going with more detail. \
                    Then another sentence. And a final remark to push past one window."
            .to_string();

        let pieces = split_text(&text, &config).unwrap();
        assert!(pieces.len() > 1);
        assert_eq!(reassemble(&pieces, config.overlap_chars), text);
    }

    #[test]
    fn no_chunk_exceeds_the_configured_maximum() {
        let config = ChunkerConfig {
            max_chars: 50,
            overlap_chars: 10,
        };
        let text = "word ".repeat(200);
        for piece in split_text(&text, &config).unwrap() {
            assert!(piece.chars().count() <= config.max_chars);
        }
    }

    #[test]
    fn hard_cut_applies_when_no_breakpoint_exists() {
        let config = ChunkerConfig {
            max_chars: 30,
            overlap_chars: 5,
        };
        let text = "x".repeat(100);
        let pieces = split_text(&text, &config).unwrap();
        assert!(pieces.len() > 1);
        assert_eq!(pieces[0].chars().count(), 30);
        assert_eq!(reassemble(&pieces, config.overlap_chars), text);
    }

    #[test]
    fn boundary_prefers_paragraph_break_over_hard_cut() {
        let config = ChunkerConfig {
            max_chars: 60,
            overlap_chars: 10,
        };
        let text = format!("{}\n\n{}", "a".repeat(40), "b".repeat(40));
        let pieces = split_text(&text, &config).unwrap();
        assert!(pieces[0].ends_with("\n\n"));
    }

    #[test]
    fn multibyte_text_round_trips() {
        let config = ChunkerConfig {
            max_chars: 40,
            overlap_chars: 8,
        };
        let text = "Der Umsatz stieg um zwölf Prozent über ällen Erwartungen. ".repeat(6);
        let pieces = split_text(&text, &config).unwrap();
        assert_eq!(reassemble(&pieces, config.overlap_chars), text);
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        let config = ChunkerConfig {
            max_chars: 100,
            overlap_chars: 100,
        };
        assert!(matches!(
            split_text("text", &config),
            Err(IngestError::InvalidChunkConfig(_))
        ));
    }

    #[test]
    fn sequence_ids_restart_per_page() {
        let config = ChunkerConfig {
            max_chars: 40,
            overlap_chars: 8,
        };
        let text = "A sentence here. Another sentence there. One more to spill over.";

        let page_one = build_chunks(text, "DOC001", 1, "scan.pdf", &config).unwrap();
        let page_two = build_chunks(text, "DOC001", 2, "scan.pdf", &config).unwrap();

        assert_eq!(page_one[0].metadata.chunk_seq_id, 0);
        assert_eq!(page_two[0].metadata.chunk_seq_id, 0);
        assert_eq!(page_one[1].metadata.chunk_seq_id, 1);
        assert_eq!(page_one[0].metadata.page_number, 1);
        assert_eq!(page_two[0].metadata.page_number, 2);
        assert_eq!(page_one[0].id(), "DOC001_p1_c0");
    }
}
