use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use swc_core::ecma::ast::Expr;
use swc_core::ecma::ast::Pat;
use swc_core::ecma::ast::Stmt;

/// A runtime value of the expression interpreter
#[derive(Clone, Debug)]
pub enum JsValue {
  Undefined,
  Null,
  Bool(bool),
  Number(f64),
  String(String),
  Array(Vec<JsValue>),
  Object(IndexMap<String, JsValue>),
  Function(Rc<Closure>),
  /// A global function or namespace such as `Math` or `Math.max`
  Builtin(&'static str),
  /// The namespace object of an inlined module, by module index
  Namespace(usize),
}

#[derive(Debug)]
pub enum ClosureBody {
  Expr(Box<Expr>),
  Block(Vec<Stmt>),
}

#[derive(Debug)]
pub struct Closure {
  pub params: Vec<Pat>,
  pub body: ClosureBody,
  pub module: usize,
  pub scope: Option<Rc<Scope>>,
}

/// Block scope of a function call
#[derive(Debug, Default)]
pub struct Scope {
  pub vars: RefCell<HashMap<String, JsValue>>,
  pub parent: Option<Rc<Scope>>,
}

impl Scope {
  pub fn child(parent: Option<Rc<Scope>>) -> Rc<Scope> {
    Rc::new(Scope {
      vars: RefCell::default(),
      parent,
    })
  }

  pub fn lookup(&self, name: &str) -> Option<JsValue> {
    if let Some(value) = self.vars.borrow().get(name) {
      return Some(value.clone());
    }
    self.parent.as_ref().and_then(|parent| parent.lookup(name))
  }

  pub fn declare(&self, name: String, value: JsValue) {
    self.vars.borrow_mut().insert(name, value);
  }
}

impl JsValue {
  pub fn is_nullish(&self) -> bool {
    matches!(self, JsValue::Undefined | JsValue::Null)
  }

  pub fn is_truthy(&self) -> bool {
    match self {
      JsValue::Undefined | JsValue::Null => false,
      JsValue::Bool(value) => *value,
      JsValue::Number(value) => *value != 0.0 && !value.is_nan(),
      JsValue::String(value) => !value.is_empty(),
      _ => true,
    }
  }

  pub fn type_of(&self) -> &'static str {
    match self {
      JsValue::Undefined => "undefined",
      JsValue::Null => "object",
      JsValue::Bool(_) => "boolean",
      JsValue::Number(_) => "number",
      JsValue::String(_) => "string",
      JsValue::Function(_) => "function",
      JsValue::Builtin(name) => match *name {
        "Math" | "JSON" | "Object" => "object",
        _ => "function",
      },
      JsValue::Array(_) | JsValue::Object(_) | JsValue::Namespace(_) => "object",
    }
  }

  pub fn to_number(&self) -> f64 {
    match self {
      JsValue::Undefined => f64::NAN,
      JsValue::Null => 0.0,
      JsValue::Bool(value) => f64::from(u8::from(*value)),
      JsValue::Number(value) => *value,
      JsValue::String(value) => string_to_number(value),
      JsValue::Array(_) => string_to_number(&self.to_js_string()),
      _ => f64::NAN,
    }
  }

  /// Same result as `String(value)`
  pub fn to_js_string(&self) -> String {
    match self {
      JsValue::Undefined => "undefined".into(),
      JsValue::Null => "null".into(),
      JsValue::Bool(value) => value.to_string(),
      JsValue::Number(value) => number_to_string(*value),
      JsValue::String(value) => value.clone(),
      JsValue::Array(items) => items
        .iter()
        .map(|item| {
          if item.is_nullish() {
            String::new()
          } else {
            item.to_js_string()
          }
        })
        .collect::<Vec<_>>()
        .join(","),
      JsValue::Object(_) => "[object Object]".into(),
      JsValue::Namespace(_) => "[object Module]".into(),
      JsValue::Function(_) => "function () { [code] }".into(),
      JsValue::Builtin(name) => format!("function {}() {{ [native code] }}", name),
    }
  }

  pub fn strict_equals(&self, other: &JsValue) -> bool {
    match (self, other) {
      (JsValue::Undefined, JsValue::Undefined) | (JsValue::Null, JsValue::Null) => true,
      (JsValue::Bool(a), JsValue::Bool(b)) => a == b,
      (JsValue::Number(a), JsValue::Number(b)) => a == b,
      (JsValue::String(a), JsValue::String(b)) => a == b,
      (JsValue::Function(a), JsValue::Function(b)) => Rc::ptr_eq(a, b),
      (JsValue::Builtin(a), JsValue::Builtin(b)) => a == b,
      (JsValue::Namespace(a), JsValue::Namespace(b)) => a == b,
      _ => false,
    }
  }

  pub fn loose_equals(&self, other: &JsValue) -> bool {
    match (self, other) {
      (a, b) if a.is_nullish() && b.is_nullish() => true,
      (a, b) if a.is_nullish() || b.is_nullish() => false,
      (JsValue::Number(_), JsValue::String(_))
      | (JsValue::String(_), JsValue::Number(_))
      | (JsValue::Bool(_), _)
      | (_, JsValue::Bool(_)) => self.to_number() == other.to_number(),
      _ => self.strict_equals(other),
    }
  }

  /// `JSON.stringify` of the value, `None` where the result is `undefined`
  pub fn to_json(&self) -> Option<String> {
    match self {
      JsValue::Undefined | JsValue::Function(_) | JsValue::Builtin(_) => None,
      JsValue::Null => Some("null".into()),
      JsValue::Bool(value) => Some(value.to_string()),
      JsValue::Number(value) if value.is_finite() => Some(number_to_string(*value)),
      JsValue::Number(_) => Some("null".into()),
      JsValue::String(value) => serde_json::to_string(value).ok(),
      JsValue::Array(items) => Some(format!(
        "[{}]",
        items
          .iter()
          .map(|item| item.to_json().unwrap_or_else(|| "null".into()))
          .collect::<Vec<_>>()
          .join(",")
      )),
      JsValue::Object(entries) => Some(format!(
        "{{{}}}",
        entries
          .iter()
          .filter_map(|(key, value)| {
            let value = value.to_json()?;
            Some(format!("{}:{}", serde_json::to_string(key).ok()?, value))
          })
          .collect::<Vec<_>>()
          .join(",")
      )),
      JsValue::Namespace(_) => Some("{}".into()),
    }
  }
}

impl fmt::Display for JsValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.to_js_string())
  }
}

fn string_to_number(value: &str) -> f64 {
  let value = value.trim();
  if value.is_empty() {
    return 0.0;
  }
  if let Some(hex) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
    return i64::from_str_radix(hex, 16)
      .map(|value| value as f64)
      .unwrap_or(f64::NAN);
  }
  match value {
    "Infinity" | "+Infinity" => f64::INFINITY,
    "-Infinity" => f64::NEG_INFINITY,
    _ if value.contains(|c: char| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => f64::NAN,
    _ => value.parse().unwrap_or(f64::NAN),
  }
}

/// Format a number the way JavaScript's `Number.prototype.toString` does
pub fn number_to_string(value: f64) -> String {
  if value.is_nan() {
    return "NaN".into();
  }
  if value.is_infinite() {
    return if value > 0.0 { "Infinity" } else { "-Infinity" }.into();
  }
  if value == 0.0 {
    return "0".into();
  }

  let abs = value.abs();
  if !(1e-6..1e21).contains(&abs) {
    let formatted = format!("{:e}", value);
    return match formatted.split_once('e') {
      Some((mantissa, exponent)) if !exponent.starts_with('-') => {
        format!("{}e+{}", mantissa, exponent)
      }
      _ => formatted,
    };
  }

  if value.fract() == 0.0 {
    format!("{:.0}", value)
  } else {
    format!("{}", value)
  }
}

/// Leading integer of a string, as `parseInt` reads it
pub fn parse_int(value: &str, radix: u32) -> f64 {
  if radix == 1 || radix > 36 {
    return f64::NAN;
  }
  let value = value.trim_start();
  let (negative, digits) = match value.strip_prefix('-') {
    Some(rest) => (true, rest),
    None => (false, value.strip_prefix('+').unwrap_or(value)),
  };
  let (radix, digits) = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
    Some(rest) if radix == 16 || radix == 0 => (16, rest),
    _ => (if radix == 0 { 10 } else { radix }, digits),
  };

  let digits: String = digits.chars().take_while(|c| c.is_digit(radix)).collect();
  if digits.is_empty() {
    return f64::NAN;
  }
  let mut result = 0f64;
  for c in digits.chars() {
    result = result * f64::from(radix) + f64::from(c.to_digit(radix).unwrap_or(0));
  }
  if negative {
    -result
  } else {
    result
  }
}

/// Leading decimal number of a string, as `parseFloat` reads it
pub fn parse_float(value: &str) -> f64 {
  let value = value.trim_start();
  if value.starts_with("Infinity") || value.starts_with("+Infinity") {
    return f64::INFINITY;
  }
  if value.starts_with("-Infinity") {
    return f64::NEG_INFINITY;
  }

  let mut end = 0;
  let mut seen_digit = false;
  let mut seen_dot = false;
  let mut seen_exponent = false;
  let bytes = value.as_bytes();
  while end < bytes.len() {
    match bytes[end] {
      b'0'..=b'9' => seen_digit = true,
      b'+' | b'-' if end == 0 || matches!(bytes[end - 1], b'e' | b'E') => {}
      b'.' if !seen_dot && !seen_exponent => seen_dot = true,
      b'e' | b'E' if seen_digit && !seen_exponent => seen_exponent = true,
      _ => break,
    }
    end += 1;
  }

  let mut candidate = &value[..end];
  while !candidate.is_empty() {
    if let Ok(number) = candidate.parse::<f64>() {
      return number;
    }
    candidate = &candidate[..candidate.len() - 1];
  }
  f64::NAN
}
