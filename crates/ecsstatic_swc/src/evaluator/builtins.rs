use ecsstatic_core::ResolveCause;
use indexmap::IndexMap;

use super::value::number_to_string;
use super::value::parse_float;
use super::value::parse_int;
use super::value::JsValue;

const GLOBAL_OBJECTS: [&str; 4] = ["Math", "JSON", "Object", "Array"];

const GLOBAL_FUNCTIONS: [&str; 26] = [
  "String",
  "Number",
  "Boolean",
  "parseInt",
  "parseFloat",
  "isNaN",
  "Math.abs",
  "Math.ceil",
  "Math.floor",
  "Math.round",
  "Math.trunc",
  "Math.sign",
  "Math.max",
  "Math.min",
  "Math.pow",
  "Math.sqrt",
  "Math.cbrt",
  "Object.keys",
  "Object.values",
  "Object.entries",
  "Object.assign",
  "Object.fromEntries",
  "JSON.stringify",
  "Array.isArray",
  "Number.isInteger",
  "Number.isFinite",
];

/// Value of a global identifier that is not declared anywhere in the snippet
pub(crate) fn global(name: &str) -> Option<JsValue> {
  match name {
    "undefined" => Some(JsValue::Undefined),
    "NaN" => Some(JsValue::Number(f64::NAN)),
    "Infinity" => Some(JsValue::Number(f64::INFINITY)),
    _ => GLOBAL_OBJECTS
      .iter()
      .chain(GLOBAL_FUNCTIONS.iter())
      .find(|global| **global == name)
      .map(|global| JsValue::Builtin(*global)),
  }
}

pub(crate) fn property(builtin: &'static str, key: &str) -> JsValue {
  match (builtin, key) {
    ("Math", "PI") => JsValue::Number(std::f64::consts::PI),
    ("Math", "E") => JsValue::Number(std::f64::consts::E),
    ("Math", "SQRT2") => JsValue::Number(std::f64::consts::SQRT_2),
    ("Number", "MAX_SAFE_INTEGER") => JsValue::Number(9007199254740991.0),
    _ => {
      let path = format!("{}.{}", builtin, key);
      GLOBAL_FUNCTIONS
        .iter()
        .find(|function| **function == path)
        .map(|function| JsValue::Builtin(*function))
        .unwrap_or(JsValue::Undefined)
    }
  }
}

fn arg(args: &[JsValue], index: usize) -> JsValue {
  args.get(index).cloned().unwrap_or(JsValue::Undefined)
}

fn math(args: &[JsValue], op: impl Fn(f64) -> f64) -> JsValue {
  JsValue::Number(op(arg(args, 0).to_number()))
}

fn entries(value: &JsValue) -> Vec<(String, JsValue)> {
  match value {
    JsValue::Object(entries) => entries
      .iter()
      .map(|(key, value)| (key.clone(), value.clone()))
      .collect(),
    JsValue::Array(items) => items
      .iter()
      .enumerate()
      .map(|(index, value)| (index.to_string(), value.clone()))
      .collect(),
    JsValue::String(value) => value
      .chars()
      .enumerate()
      .map(|(index, c)| (index.to_string(), JsValue::String(c.to_string())))
      .collect(),
    _ => Vec::new(),
  }
}

/// Call a global function
pub(crate) fn call(builtin: &str, args: &[JsValue]) -> Result<JsValue, ResolveCause> {
  let value = match builtin {
    "String" => JsValue::String(match args.first() {
      Some(value) => value.to_js_string(),
      None => String::new(),
    }),
    "Number" => JsValue::Number(args.first().map(JsValue::to_number).unwrap_or(0.0)),
    "Boolean" => JsValue::Bool(arg(args, 0).is_truthy()),
    "parseInt" => {
      let radix = match arg(args, 1) {
        JsValue::Undefined => 0,
        radix => radix.to_number() as u32,
      };
      JsValue::Number(parse_int(&arg(args, 0).to_js_string(), radix))
    }
    "parseFloat" => JsValue::Number(parse_float(&arg(args, 0).to_js_string())),
    "isNaN" => JsValue::Bool(arg(args, 0).to_number().is_nan()),
    "Math.abs" => math(args, f64::abs),
    "Math.ceil" => math(args, f64::ceil),
    "Math.floor" => math(args, f64::floor),
    "Math.round" => math(args, |value| (value + 0.5).floor()),
    "Math.trunc" => math(args, f64::trunc),
    "Math.sign" => math(args, |value| {
      if value.is_nan() || value == 0.0 {
        value
      } else {
        value.signum()
      }
    }),
    "Math.sqrt" => math(args, f64::sqrt),
    "Math.cbrt" => math(args, f64::cbrt),
    "Math.pow" => JsValue::Number(arg(args, 0).to_number().powf(arg(args, 1).to_number())),
    "Math.max" => JsValue::Number(args.iter().map(JsValue::to_number).fold(
      f64::NEG_INFINITY,
      |max, value| {
        if max.is_nan() || value.is_nan() {
          f64::NAN
        } else {
          max.max(value)
        }
      },
    )),
    "Math.min" => JsValue::Number(args.iter().map(JsValue::to_number).fold(
      f64::INFINITY,
      |min, value| {
        if min.is_nan() || value.is_nan() {
          f64::NAN
        } else {
          min.min(value)
        }
      },
    )),
    "Object.keys" => JsValue::Array(
      entries(&arg(args, 0))
        .into_iter()
        .map(|(key, _)| JsValue::String(key))
        .collect(),
    ),
    "Object.values" => JsValue::Array(
      entries(&arg(args, 0))
        .into_iter()
        .map(|(_, value)| value)
        .collect(),
    ),
    "Object.entries" => JsValue::Array(
      entries(&arg(args, 0))
        .into_iter()
        .map(|(key, value)| JsValue::Array(vec![JsValue::String(key), value]))
        .collect(),
    ),
    "Object.assign" => {
      let mut target = IndexMap::new();
      for source in args {
        target.extend(entries(source));
      }
      JsValue::Object(target)
    }
    "Object.fromEntries" => {
      let mut object = IndexMap::new();
      if let JsValue::Array(pairs) = arg(args, 0) {
        for pair in pairs {
          if let JsValue::Array(pair) = pair {
            object.insert(arg(&pair, 0).to_js_string(), arg(&pair, 1));
          }
        }
      }
      JsValue::Object(object)
    }
    "JSON.stringify" => match arg(args, 0).to_json() {
      Some(json) => JsValue::String(json),
      None => JsValue::Undefined,
    },
    "Array.isArray" => JsValue::Bool(matches!(arg(args, 0), JsValue::Array(_))),
    "Number.isInteger" => JsValue::Bool(match arg(args, 0) {
      JsValue::Number(value) => value.is_finite() && value.fract() == 0.0,
      _ => false,
    }),
    "Number.isFinite" => JsValue::Bool(matches!(arg(args, 0), JsValue::Number(value) if value.is_finite())),
    _ => {
      return Err(ResolveCause::Runtime(format!(
        "{} is not a function",
        builtin
      )))
    }
  };
  Ok(value)
}

/// Index into a sequence of `len`, counting from the end when negative
fn relative_index(index: &JsValue, len: usize, default: usize) -> usize {
  let index = match index {
    JsValue::Undefined => return default,
    index => index.to_number(),
  };
  if index.is_nan() {
    0
  } else if index < 0.0 {
    (len as f64 + index).max(0.0) as usize
  } else {
    (index as usize).min(len)
  }
}

/// Longest string a JS engine will build, in UTF-16 units
const MAX_STRING_LENGTH: f64 = ((1u32 << 29) - 24) as f64;

fn invalid_string_length() -> ResolveCause {
  ResolveCause::Runtime("Invalid string length".into())
}

fn pad(value: &str, args: &[JsValue], at_start: bool) -> Result<JsValue, ResolveCause> {
  let target = arg(args, 0).to_number();
  let fill = match arg(args, 1) {
    JsValue::Undefined => " ".to_string(),
    fill => fill.to_js_string(),
  };
  let len = value.chars().count();
  if target.is_nan() || target <= len as f64 || fill.is_empty() {
    return Ok(JsValue::String(value.to_string()));
  }
  if target > MAX_STRING_LENGTH {
    return Err(invalid_string_length());
  }

  let padding: String = fill.chars().cycle().take(target as usize - len).collect();
  Ok(JsValue::String(if at_start {
    format!("{}{}", padding, value)
  } else {
    format!("{}{}", value, padding)
  }))
}

fn repeat(value: &str, count: f64) -> Result<JsValue, ResolveCause> {
  if count < 0.0 || count.is_infinite() {
    return Err(ResolveCause::Runtime(format!(
      "Invalid count value: {}",
      number_to_string(count)
    )));
  }
  if count.is_nan() || value.is_empty() {
    return Ok(JsValue::String(String::new()));
  }

  let count = count.trunc();
  if count * value.encode_utf16().count() as f64 > MAX_STRING_LENGTH {
    return Err(invalid_string_length());
  }
  Ok(JsValue::String(value.repeat(count as usize)))
}

/// Call a string method that takes no callback
pub(crate) fn string_method(
  value: &str,
  name: &str,
  args: &[JsValue],
) -> Option<Result<JsValue, ResolveCause>> {
  let chars: Vec<char> = value.chars().collect();
  let string = |value: String| Some(Ok(JsValue::String(value)));
  let search = arg(args, 0).to_js_string();

  match name {
    "toString" | "valueOf" => string(value.to_string()),
    "toUpperCase" => string(value.to_uppercase()),
    "toLowerCase" => string(value.to_lowercase()),
    "trim" => string(value.trim().to_string()),
    "trimStart" => string(value.trim_start().to_string()),
    "trimEnd" => string(value.trim_end().to_string()),
    "padStart" => Some(pad(value, args, true)),
    "padEnd" => Some(pad(value, args, false)),
    "repeat" => Some(repeat(value, arg(args, 0).to_number())),
    "slice" | "substring" => {
      let start = relative_index(&arg(args, 0), chars.len(), 0);
      let end = relative_index(&arg(args, 1), chars.len(), chars.len());
      let (start, end) = if name == "substring" && start > end {
        (end, start)
      } else {
        (start, end)
      };
      string(chars.get(start..end.max(start)).unwrap_or_default().iter().collect())
    }
    "charAt" => string(
      chars
        .get(arg(args, 0).to_number() as usize)
        .map(|c| c.to_string())
        .unwrap_or_default(),
    ),
    "at" => {
      let index = arg(args, 0).to_number();
      let index = if index < 0.0 {
        chars.len() as f64 + index
      } else {
        index
      };
      Some(Ok(
        if index < 0.0 {
          None
        } else {
          chars.get(index as usize)
        }
        .map(|c| JsValue::String(c.to_string()))
        .unwrap_or(JsValue::Undefined),
      ))
    }
    "concat" => string(
      std::iter::once(value.to_string())
        .chain(args.iter().map(JsValue::to_js_string))
        .collect(),
    ),
    "includes" => Some(Ok(JsValue::Bool(value.contains(&search)))),
    "startsWith" => Some(Ok(JsValue::Bool(value.starts_with(&search)))),
    "endsWith" => Some(Ok(JsValue::Bool(value.ends_with(&search)))),
    "indexOf" => Some(Ok(JsValue::Number(
      value
        .find(&search)
        .map(|byte| value[..byte].chars().count() as f64)
        .unwrap_or(-1.0),
    ))),
    "replace" => string(value.replacen(&search, &arg(args, 1).to_js_string(), 1)),
    "replaceAll" => string(value.replace(&search, &arg(args, 1).to_js_string())),
    "split" => {
      let parts: Vec<JsValue> = match arg(args, 0) {
        JsValue::Undefined => vec![JsValue::String(value.to_string())],
        _ if search.is_empty() => chars
          .iter()
          .map(|c| JsValue::String(c.to_string()))
          .collect(),
        _ => value
          .split(search.as_str())
          .map(|part| JsValue::String(part.to_string()))
          .collect(),
      };
      Some(Ok(JsValue::Array(parts)))
    }
    _ => None,
  }
}

/// Call an array method that takes no callback
pub(crate) fn array_method(
  items: &[JsValue],
  name: &str,
  args: &[JsValue],
) -> Option<Result<JsValue, ResolveCause>> {
  let value = match name {
    "join" => {
      let separator = match arg(args, 0) {
        JsValue::Undefined => ",".to_string(),
        separator => separator.to_js_string(),
      };
      JsValue::String(
        items
          .iter()
          .map(|item| {
            if item.is_nullish() {
              String::new()
            } else {
              item.to_js_string()
            }
          })
          .collect::<Vec<_>>()
          .join(&separator),
      )
    }
    "toString" => JsValue::String(JsValue::Array(items.to_vec()).to_js_string()),
    "includes" => {
      let needle = arg(args, 0);
      JsValue::Bool(items.iter().any(|item| {
        item.strict_equals(&needle)
          || matches!((item, &needle), (JsValue::Number(a), JsValue::Number(b)) if a.is_nan() && b.is_nan())
      }))
    }
    "indexOf" => {
      let needle = arg(args, 0);
      JsValue::Number(
        items
          .iter()
          .position(|item| item.strict_equals(&needle))
          .map(|index| index as f64)
          .unwrap_or(-1.0),
      )
    }
    "slice" => {
      let start = relative_index(&arg(args, 0), items.len(), 0);
      let end = relative_index(&arg(args, 1), items.len(), items.len());
      JsValue::Array(items.get(start..end.max(start)).unwrap_or_default().to_vec())
    }
    "concat" => {
      let mut result = items.to_vec();
      for value in args {
        match value {
          JsValue::Array(more) => result.extend(more.iter().cloned()),
          other => result.push(other.clone()),
        }
      }
      JsValue::Array(result)
    }
    "at" => {
      let index = arg(args, 0).to_number();
      let index = if index < 0.0 {
        items.len() as f64 + index
      } else {
        index
      };
      if index < 0.0 {
        JsValue::Undefined
      } else {
        items.get(index as usize).cloned().unwrap_or(JsValue::Undefined)
      }
    }
    "reverse" | "toReversed" => JsValue::Array(items.iter().rev().cloned().collect()),
    "flat" => {
      let mut result = Vec::new();
      for item in items {
        match item {
          JsValue::Array(inner) => result.extend(inner.iter().cloned()),
          other => result.push(other.clone()),
        }
      }
      JsValue::Array(result)
    }
    _ => return None,
  };
  Some(Ok(value))
}

/// Call a number method
pub(crate) fn number_method(
  value: f64,
  name: &str,
  args: &[JsValue],
) -> Option<Result<JsValue, ResolveCause>> {
  match name {
    "toFixed" => {
      let digits = arg(args, 0).to_number();
      let digits = if digits.is_nan() { 0.0 } else { digits };
      if !(0.0..=100.0).contains(&digits) {
        return Some(Err(ResolveCause::Runtime(
          "toFixed() digits argument must be between 0 and 100".into(),
        )));
      }
      if value.abs() >= 1e21 || !value.is_finite() {
        return Some(Ok(JsValue::String(number_to_string(value))));
      }
      Some(Ok(JsValue::String(format!(
        "{:.*}",
        digits as usize,
        value
      ))))
    }
    "toString" | "valueOf" => Some(Ok(JsValue::String(number_to_string(value)))),
    _ => None,
  }
}
