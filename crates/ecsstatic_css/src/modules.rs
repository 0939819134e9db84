use indexmap::IndexMap;

/// Style text with its local classes renamed
#[derive(Debug, PartialEq)]
pub struct RenamedClasses {
  pub css: String,
  /// Local class name to generated class name, in order of first appearance
  pub classes: IndexMap<String, String>,
}

fn is_ident_start(ch: char) -> bool {
  ch.is_ascii_alphabetic() || ch == '_' || ch == '-' || !ch.is_ascii()
}

fn is_ident_char(ch: char) -> bool {
  ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' || !ch.is_ascii()
}

/// Rename every local class selector `.name` to `<class_name>_<name>`
///
/// Strings, comments and `url(...)` arguments are copied untouched, and a `.` that is
/// part of a number (`1.5em`) is not a selector.
pub fn rename_local_classes(text: &str, class_name: &str) -> RenamedClasses {
  let mut css = String::with_capacity(text.len());
  let mut classes = IndexMap::new();
  let chars: Vec<char> = text.chars().collect();
  let mut index = 0;

  while index < chars.len() {
    let ch = chars[index];

    match ch {
      '"' | '\'' => {
        let end = skip_string(&chars, index);
        css.extend(&chars[index..end]);
        index = end;
      }
      '/' if chars.get(index + 1) == Some(&'*') => {
        let end = skip_comment(&chars, index);
        css.extend(&chars[index..end]);
        index = end;
      }
      '.' => {
        let previous = index.checked_sub(1).map(|i| chars[i]);
        let is_number = previous.is_some_and(|p| p.is_ascii_digit())
          || chars.get(index + 1).is_some_and(|n| n.is_ascii_digit());
        let starts_ident = match chars.get(index + 1) {
          Some('-') => chars.get(index + 2).is_some_and(|n| is_ident_start(*n)),
          Some(next) => is_ident_start(*next),
          None => false,
        };

        if is_number || !starts_ident {
          css.push(ch);
          index += 1;
          continue;
        }

        let mut end = index + 1;
        while end < chars.len() && is_ident_char(chars[end]) {
          end += 1;
        }

        let local: String = chars[index + 1..end].iter().collect();
        let generated = classes
          .entry(local.clone())
          .or_insert_with(|| format!("{}_{}", class_name, local));
        css.push('.');
        css.push_str(generated);
        index = end;
      }
      _ if starts_with_url(&chars, index) => {
        let end = skip_url(&chars, index);
        css.extend(&chars[index..end]);
        index = end;
      }
      _ => {
        css.push(ch);
        index += 1;
      }
    }
  }

  RenamedClasses { css, classes }
}

fn skip_string(chars: &[char], start: usize) -> usize {
  let quote = chars[start];
  let mut index = start + 1;
  while index < chars.len() {
    match chars[index] {
      '\\' => index += 2,
      ch if ch == quote => return index + 1,
      _ => index += 1,
    }
  }
  chars.len()
}

fn skip_comment(chars: &[char], start: usize) -> usize {
  let mut index = start + 2;
  while index + 1 < chars.len() {
    if chars[index] == '*' && chars[index + 1] == '/' {
      return index + 2;
    }
    index += 1;
  }
  chars.len()
}

fn starts_with_url(chars: &[char], index: usize) -> bool {
  let previous_is_ident = index
    .checked_sub(1)
    .is_some_and(|i| is_ident_char(chars[i]));
  !previous_is_ident
    && chars.len() >= index + 4
    && chars[index..index + 4]
      .iter()
      .collect::<String>()
      .eq_ignore_ascii_case("url(")
}

fn skip_url(chars: &[char], start: usize) -> usize {
  let mut index = start + 4;
  while index < chars.len() {
    match chars[index] {
      '"' | '\'' => index = skip_string(chars, index),
      ')' => return index + 1,
      _ => index += 1,
    }
  }
  chars.len()
}
