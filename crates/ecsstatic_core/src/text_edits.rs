use sourcemap::SourceMapBuilder;

use crate::types::Span;
use crate::EditError;

/// Rewritten source text and its source map
#[derive(Debug, PartialEq)]
pub struct EditedSource {
  pub code: String,
  /// Version 3 source map JSON
  pub map: String,
}

/// An ordered set of non-overlapping replacements over one source text
///
/// Edits address byte ranges of the original text and are applied in a single pass, so two
/// edits whose original text is identical never interfere with each other.
#[derive(Clone, Debug, Default)]
pub struct TextEdits {
  edits: Vec<(Span, String)>,
  appended: Vec<String>,
}

impl TextEdits {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn replace(&mut self, span: Span, replacement: impl Into<String>) {
    self.edits.push((span, replacement.into()));
  }

  pub fn remove(&mut self, span: Span) {
    self.replace(span, "");
  }

  /// Text added after the end of the source, in call order
  pub fn append(&mut self, text: impl Into<String>) {
    self.appended.push(text.into());
  }

  pub fn is_empty(&self) -> bool {
    self.edits.is_empty() && self.appended.is_empty()
  }

  fn sorted(&self, source: &str) -> Result<Vec<&(Span, String)>, EditError> {
    let mut edits: Vec<&(Span, String)> = self.edits.iter().collect();
    edits.sort_by_key(|(span, _)| (span.start, span.end));

    for (span, _) in &edits {
      if span.start > span.end || span.end > source.len() {
        return Err(EditError::OutOfBounds {
          span: *span,
          len: source.len(),
        });
      }
      if !source.is_char_boundary(span.start) || !source.is_char_boundary(span.end) {
        return Err(EditError::CharBoundary(*span));
      }
    }

    for pair in edits.windows(2) {
      let (previous, _) = pair[0];
      let (next, _) = pair[1];
      if next.start < previous.end {
        return Err(EditError::Overlap(*previous, *next));
      }
    }

    Ok(edits)
  }

  /// Apply every edit to `source`, mapping the output back to `file_name`
  pub fn apply(&self, source: &str, file_name: &str) -> Result<EditedSource, EditError> {
    let edits = self.sorted(source)?;
    let lines = LineIndex::new(source);

    let mut builder = SourceMapBuilder::new(Some(file_name));
    let source_id = builder.add_source(file_name);
    builder.set_source_contents(source_id, Some(source));

    let mut output = Output::default();
    let mut cursor = 0;

    for (span, replacement) in edits {
      output.copy_unchanged(&source[cursor..span.start], cursor, &lines, |out, src| {
        builder.add_raw(out.0, out.1, src.0, src.1, Some(source_id), None, false);
      });

      if !replacement.is_empty() {
        let (src_line, src_col) = lines.position(span.start);
        builder.add_raw(
          output.line,
          output.column,
          src_line,
          src_col,
          Some(source_id),
          None,
          false,
        );
        output.push(replacement);
      }

      cursor = span.end;
    }

    output.copy_unchanged(&source[cursor..], cursor, &lines, |out, src| {
      builder.add_raw(out.0, out.1, src.0, src.1, Some(source_id), None, false);
    });

    for text in &self.appended {
      if !output.code.is_empty() && !output.code.ends_with('\n') {
        output.push("\n");
      }
      output.push(text);
    }

    let mut buffer = Vec::new();
    builder
      .into_sourcemap()
      .to_writer(&mut buffer)
      .map_err(|error| EditError::SourceMap(error.to_string()))?;
    let map = String::from_utf8(buffer).map_err(|error| EditError::SourceMap(error.to_string()))?;

    Ok(EditedSource {
      code: output.code,
      map,
    })
  }
}

/// Output text with its current zero-based line and UTF-16 column
#[derive(Default)]
struct Output {
  code: String,
  line: u32,
  column: u32,
}

impl Output {
  fn push(&mut self, text: &str) {
    for ch in text.chars() {
      if ch == '\n' {
        self.line += 1;
        self.column = 0;
      } else {
        self.column += ch.len_utf16() as u32;
      }
    }
    self.code.push_str(text);
  }

  /// Copy original text, adding an identity mapping at its start and at each new line
  fn copy_unchanged(
    &mut self,
    text: &str,
    offset: usize,
    lines: &LineIndex,
    mut add_mapping: impl FnMut((u32, u32), (u32, u32)),
  ) {
    if text.is_empty() {
      return;
    }

    add_mapping((self.line, self.column), lines.position(offset));

    let mut line_start = 0;
    for (index, _) in text.match_indices('\n') {
      self.push(&text[line_start..=index]);
      line_start = index + 1;
      if line_start < text.len() {
        add_mapping((self.line, 0), lines.position(offset + line_start));
      }
    }
    self.push(&text[line_start..]);
  }
}

/// Line lookup over the original source
struct LineIndex<'a> {
  source: &'a str,
  starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
  fn new(source: &'a str) -> Self {
    let mut starts = vec![0];
    starts.extend(source.match_indices('\n').map(|(index, _)| index + 1));
    LineIndex { source, starts }
  }

  /// Zero-based line and UTF-16 column of a byte offset
  fn position(&self, offset: usize) -> (u32, u32) {
    let line = match self.starts.binary_search(&offset) {
      Ok(line) => line,
      Err(next) => next - 1,
    };
    let column: usize = self.source[self.starts[line]..offset]
      .chars()
      .map(char::len_utf16)
      .sum();
    (line as u32, column as u32)
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;
  use sourcemap::SourceMap;

  use super::*;

  #[test]
  fn applies_edits_by_position_not_by_text() {
    let source = "a = css`x`;\nb = css`x`;\n";
    let mut edits = TextEdits::new();
    edits.replace(Span::new(16, 22), "\"two\"");
    edits.replace(Span::new(4, 10), "\"one\"");

    let result = edits.apply(source, "file.tsx").unwrap();

    assert_eq!(result.code, "a = \"one\";\nb = \"two\";\n");
  }

  #[test]
  fn removes_and_appends() {
    let source = "import { css } from 'x';\nconst a = 1;";
    let mut edits = TextEdits::new();
    edits.remove(Span::new(0, 25));
    edits.append("import \"./a.acab.css\";\n");

    let result = edits.apply(source, "file.tsx").unwrap();

    assert_eq!(result.code, "const a = 1;\nimport \"./a.acab.css\";\n");
  }

  #[test]
  fn rejects_overlapping_edits() {
    let mut edits = TextEdits::new();
    edits.replace(Span::new(0, 5), "a");
    edits.replace(Span::new(3, 8), "b");

    assert_eq!(
      edits.apply("0123456789", "file.tsx"),
      Err(EditError::Overlap(Span::new(0, 5), Span::new(3, 8)))
    );
  }

  #[test]
  fn rejects_out_of_bounds_edits() {
    let mut edits = TextEdits::new();
    edits.replace(Span::new(2, 20), "a");

    assert!(matches!(
      edits.apply("0123", "file.tsx"),
      Err(EditError::OutOfBounds { .. })
    ));
  }

  #[test]
  fn maps_lines_after_a_replacement_back_to_the_source() {
    let source = "const a = css`\n  color: red;\n`;\nconst b = 2;\n";
    let start = source.find("css`").unwrap();
    let end = source.find("`;").unwrap() + 1;
    let mut edits = TextEdits::new();
    edits.replace(Span::new(start, end), "\"c\"");

    let result = edits.apply(source, "file.tsx").unwrap();
    assert_eq!(result.code, "const a = \"c\";\nconst b = 2;\n");

    let map = SourceMap::from_slice(result.map.as_bytes()).unwrap();
    let token = map.lookup_token(1, 0).unwrap();
    assert_eq!((token.get_src_line(), token.get_src_col()), (3, 0));

    let token = map.lookup_token(0, 10).unwrap();
    assert_eq!((token.get_src_line(), token.get_src_col()), (0, 10));
    assert_eq!(token.get_source(), Some("file.tsx"));
  }
}
