use ecsstatic_core::NormalizeError;

/// Structural check of Sass-like text
///
/// The Sass dialect is handed to the host's Sass toolchain untouched, so only what would
/// make the wrapped rule unparseable is rejected: unbalanced braces, unterminated strings
/// and unterminated block comments.
pub(crate) fn validate(text: &str) -> Result<(), NormalizeError> {
  let mut open_blocks: Vec<(u32, u32)> = Vec::new();
  let mut paren_depth = 0usize;
  let mut line = 1;
  let mut column = 0;
  let mut chars = text.chars().peekable();

  let error = |message: &str, line: u32, column: u32| NormalizeError {
    message: message.to_string(),
    line,
    column,
  };

  while let Some(ch) = chars.next() {
    if ch == '\n' {
      line += 1;
      column = 0;
      continue;
    }
    column += 1;

    match ch {
      '"' | '\'' => {
        let (start_line, start_column) = (line, column);
        let mut closed = false;
        while let Some(next) = chars.next() {
          if next == '\n' {
            break;
          }
          column += 1;
          if next == '\\' {
            chars.next();
            column += 1;
          } else if next == ch {
            closed = true;
            break;
          }
        }
        if !closed {
          return Err(error("Unclosed string", start_line, start_column));
        }
      }
      '/' if chars.peek() == Some(&'*') => {
        let (start_line, start_column) = (line, column);
        chars.next();
        column += 1;
        let mut closed = false;
        while let Some(next) = chars.next() {
          if next == '\n' {
            line += 1;
            column = 0;
            continue;
          }
          column += 1;
          if next == '*' && chars.peek() == Some(&'/') {
            chars.next();
            column += 1;
            closed = true;
            break;
          }
        }
        if !closed {
          return Err(error("Unclosed comment", start_line, start_column));
        }
      }
      // `//` inside parentheses is part of a url
      '/' if chars.peek() == Some(&'/') && paren_depth == 0 => {
        while chars.peek().is_some_and(|next| *next != '\n') {
          chars.next();
        }
      }
      '(' => paren_depth += 1,
      ')' => paren_depth = paren_depth.saturating_sub(1),
      '{' => open_blocks.push((line, column)),
      '}' => {
        if open_blocks.pop().is_none() {
          return Err(error("Unexpected }", line, column));
        }
      }
      _ => {}
    }
  }

  match open_blocks.pop() {
    Some((line, column)) => Err(error("Unclosed block", line, column)),
    None => Ok(()),
  }
}
