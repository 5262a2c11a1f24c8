//! Seeded generation of nested JSON documents

use rand::rngs::StdRng;
use rand::Rng;
use serde_json::{Map, Value};

const KEYS: &[&str] = &["id", "data", "items", "user", "content-type", "a.b", "0lead", "with space", "$ref"];

fn leaf(rng: &mut StdRng) -> Value {
    match rng.gen_range(0..5) {
        0 => Value::String(format!("s-{}", rng.gen_range(0..10_000))),
        1 => Value::from(rng.gen_range(-5_000i64..5_000)),
        2 => Value::from(rng.gen_range(0.0f64..100.0)),
        3 => Value::Bool(rng.gen_bool(0.5)),
        _ => Value::Null,
    }
}

/// A random object nested up to `depth` levels, mixing objects, arrays and
/// every scalar kind, including keys that need bracket quoting.
pub fn random_document(rng: &mut StdRng, depth: usize) -> Value {
    let mut map = Map::new();
    for _ in 0..rng.gen_range(1..5) {
        let key = KEYS[rng.gen_range(0..KEYS.len())].to_string();
        map.insert(key, random_value(rng, depth));
    }
    Value::Object(map)
}

fn random_value(rng: &mut StdRng, depth: usize) -> Value {
    if depth == 0 {
        return leaf(rng);
    }
    match rng.gen_range(0..4) {
        0 => random_document(rng, depth - 1),
        1 => Value::Array((0..rng.gen_range(0..4)).map(|_| random_value(rng, depth - 1)).collect()),
        _ => leaf(rng),
    }
}
