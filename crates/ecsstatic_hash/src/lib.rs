//! Hash functions used to derive class names and virtual stylesheet names.
//!
//! Everything here is a pure function of its input so generated names are stable
//! within a build and across builds.

use xxhash_rust::xxh3::xxh3_64;

const BASE36_DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Length of the hash produced by [`short_hash`]
pub const SHORT_HASH_LEN: usize = 8;

/// 36^8, the number of distinct values an 8 character base36 string can hold
const SHORT_HASH_SPACE: u64 = 2_821_109_907_456;

/// Hash `input` into exactly eight lowercase base36 characters.
///
/// The output only contains `[0-9a-z]` so it is safe inside CSS class names and
/// file names.
pub fn short_hash(input: &str) -> String {
  let value = xxh3_64(input.as_bytes()) % SHORT_HASH_SPACE;
  let digits = to_base36(value);

  format!("{:0>width$}", digits, width = SHORT_HASH_LEN)
}

/// Build the scoped class name for a template.
///
/// The content is trimmed before hashing so surrounding template whitespace does not
/// influence the result.
pub fn class_name_for(prefix: &str, content: &str) -> String {
  format!("{}-{}", prefix, short_hash(content.trim()))
}

/// murmurhash2 over the UTF-16 code units of `key`, rendered in base36.
///
/// This matches the hash used by JavaScript CSS-in-JS tooling for atomic class
/// names, so `murmur_hash("color", 0)` yields the same string a JS implementation
/// would.
pub fn murmur_hash(key: &str, seed: u32) -> String {
  let units: Vec<u16> = key.encode_utf16().collect();
  to_base36(u64::from(murmur2(&units, seed)))
}

const M: u32 = 0x5bd1e995;

fn murmur2(units: &[u16], seed: u32) -> u32 {
  let mut remaining = units.len();
  let mut h = seed ^ (remaining as u32);
  let mut i = 0usize;

  while remaining >= 4 {
    let mut k = (u32::from(units[i]) & 0xff)
      | ((u32::from(units[i + 1]) & 0xff) << 8)
      | ((u32::from(units[i + 2]) & 0xff) << 16)
      | ((u32::from(units[i + 3]) & 0xff) << 24);

    k = js_mul(k, M);
    k ^= k >> 24;
    k = js_mul(k, M);
    h = js_mul(h, M) ^ k;

    i += 4;
    remaining -= 4;
  }

  match remaining {
    3 => {
      h ^= (u32::from(units[i + 2]) & 0xff) << 16;
      h ^= (u32::from(units[i + 1]) & 0xff) << 8;
      h ^= u32::from(units[i]) & 0xff;
      h = js_mul(h, M);
    }
    2 => {
      h ^= (u32::from(units[i + 1]) & 0xff) << 8;
      h ^= u32::from(units[i]) & 0xff;
      h = js_mul(h, M);
    }
    1 => {
      h ^= u32::from(units[i]) & 0xff;
      h = js_mul(h, M);
    }
    _ => {}
  }

  h ^= h >> 13;
  h = js_mul(h, M);
  h ^ (h >> 15)
}

/// The JS version splits operands into 16-bit halves to emulate this; the result is
/// the same as a wrapping 32-bit product.
#[inline]
fn js_mul(a: u32, b: u32) -> u32 {
  a.wrapping_mul(b)
}

fn to_base36(mut value: u64) -> String {
  if value == 0 {
    return "0".to_string();
  }

  let mut digits = Vec::with_capacity(13);
  while value > 0 {
    digits.push(BASE36_DIGITS[(value % 36) as usize] as char);
    value /= 36;
  }

  digits.iter().rev().collect()
}
